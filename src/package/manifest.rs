use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value, ser::PrettyFormatter};
use std::fmt;
use std::path::Path;

use super::local::resolve_local_version;
use crate::runtime::Runtime;

/// File name of a package manifest.
pub const MANIFEST_FILE: &str = "package.json";

/// File name of the npm lock file.
pub const LOCK_FILE: &str = "package-lock.json";

/// Dependency category a package can be declared under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    Runtime,
    Dev,
    Optional,
}

impl DependencyKind {
    pub const ALL: [DependencyKind; 3] = [
        DependencyKind::Runtime,
        DependencyKind::Dev,
        DependencyKind::Optional,
    ];

    /// Manifest key holding this category.
    pub fn field(self) -> &'static str {
        match self {
            DependencyKind::Runtime => "dependencies",
            DependencyKind::Dev => "devDependencies",
            DependencyKind::Optional => "optionalDependencies",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

/// A `package.json` document.
///
/// Unknown fields are kept untouched and key order is preserved, so a manifest
/// that is loaded and saved without changes only differs in formatting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    doc: Map<String, Value>,
}

impl Manifest {
    pub fn parse(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content).context("Invalid manifest JSON")?;
        match value {
            Value::Object(doc) => Ok(Self { doc }),
            other => anyhow::bail!("Manifest must be a JSON object, found {}", type_name(&other)),
        }
    }

    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime.read_to_string(path)?;
        Self::parse(&content).with_context(|| format!("Failed to parse manifest {:?}", path))
    }

    #[tracing::instrument(skip(self, runtime))]
    pub fn save<R: Runtime>(&self, runtime: &R, path: &Path) -> Result<()> {
        let json = self.to_json_string()?;
        runtime
            .write(path, json.as_bytes())
            .with_context(|| format!("Failed to write manifest {:?}", path))
    }

    /// Serialize with four-space indentation and a trailing newline.
    pub fn to_json_string(&self) -> Result<String> {
        to_pretty_json(&self.doc)
    }

    pub fn name(&self) -> Option<&str> {
        self.doc.get("name").and_then(Value::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.doc.get("version").and_then(Value::as_str)
    }

    /// Declared dependencies of one category. Entries whose version is not a
    /// string are ignored.
    pub fn dependencies(&self, kind: DependencyKind) -> Vec<(&str, &str)> {
        self.doc
            .get(kind.field())
            .and_then(Value::as_object)
            .map(|deps| {
                deps.iter()
                    .filter_map(|(name, version)| Some((name.as_str(), version.as_str()?)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn dependency(&self, kind: DependencyKind, name: &str) -> Option<&str> {
        self.doc
            .get(kind.field())
            .and_then(Value::as_object)
            .and_then(|deps| deps.get(name))
            .and_then(Value::as_str)
    }

    /// Set `name` to `version` in the given category, creating the category if needed.
    pub fn set_dependency(&mut self, kind: DependencyKind, name: &str, version: impl Into<String>) {
        let deps = self
            .doc
            .entry(kind.field())
            .or_insert_with(|| Value::Object(Map::new()));
        if !deps.is_object() {
            *deps = Value::Object(Map::new());
        }
        if let Value::Object(deps) = deps {
            deps.insert(name.to_string(), Value::String(version.into()));
        }
    }

    /// Remove every dependency whose version designates a local path.
    /// Returns the number of removed entries.
    pub fn remove_local_dependencies(&mut self) -> usize {
        let mut removed = 0;
        for kind in DependencyKind::ALL {
            if let Some(Value::Object(deps)) = self.doc.get_mut(kind.field()) {
                let before = deps.len();
                deps.retain(|_, version| {
                    !version
                        .as_str()
                        .is_some_and(|v| resolve_local_version(v).is_some())
                });
                removed += before - deps.len();
            }
        }
        removed
    }

    /// Replace every local dependency reference with `rewrite(local_path)`.
    pub fn rewrite_local_dependencies<F>(&mut self, mut rewrite: F)
    where
        F: FnMut(&str) -> String,
    {
        for kind in DependencyKind::ALL {
            if let Some(Value::Object(deps)) = self.doc.get_mut(kind.field()) {
                for version in deps.values_mut() {
                    let replacement = version
                        .as_str()
                        .and_then(resolve_local_version)
                        .map(&mut rewrite);
                    if let Some(replacement) = replacement {
                        *version = Value::String(replacement);
                    }
                }
            }
        }
    }

    /// File name `npm pack` produces for this package.
    ///
    /// Scoped names are flattened the way npm does it:
    /// `@scope/pkg` at `1.0.0` packs to `scope-pkg-1.0.0.tgz`.
    pub fn archive_file_name(&self) -> Result<String> {
        let name = self.name().context("Manifest has no name")?;
        let version = self
            .version()
            .with_context(|| format!("Manifest of {} has no version", name))?;
        let flat_name = name.trim_start_matches('@').replace('/', "-");
        Ok(format!("{}-{}.tgz", flat_name, version))
    }
}

pub(crate) fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .context("Failed to serialize JSON")?;
    buf.push(b'\n');
    Ok(String::from_utf8(buf)?)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::*;
    use std::path::PathBuf;

    const APP: &str = r#"{
        "name": "app",
        "version": "1.0.0",
        "private": true,
        "dependencies": {
            "lib-b": "file:../lib-b",
            "left-pad": "^1.3.0"
        },
        "devDependencies": {
            "lib-test": "../lib-test"
        },
        "optionalDependencies": {
            "weird": 42
        }
    }"#;

    #[test]
    fn test_parse_reads_name_and_version() {
        let manifest = Manifest::parse(APP).unwrap();
        assert_eq!(manifest.name(), Some("app"));
        assert_eq!(manifest.version(), Some("1.0.0"));
    }

    #[test]
    fn test_parse_rejects_non_object() {
        let err = Manifest::parse("[1, 2]").unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_dependencies_skip_non_string_versions() {
        let manifest = Manifest::parse(APP).unwrap();
        assert_eq!(
            manifest.dependencies(DependencyKind::Runtime),
            vec![("lib-b", "file:../lib-b"), ("left-pad", "^1.3.0")]
        );
        assert!(manifest.dependencies(DependencyKind::Optional).is_empty());
    }

    #[test]
    fn test_remove_local_dependencies_keeps_registry_entries() {
        let mut manifest = Manifest::parse(APP).unwrap();
        assert_eq!(manifest.remove_local_dependencies(), 2);
        assert_eq!(manifest.dependency(DependencyKind::Runtime, "lib-b"), None);
        assert_eq!(
            manifest.dependency(DependencyKind::Runtime, "left-pad"),
            Some("^1.3.0")
        );
        assert!(manifest.dependencies(DependencyKind::Dev).is_empty());
    }

    #[test]
    fn test_set_dependency_creates_missing_category() {
        let mut manifest = Manifest::parse(r#"{"name": "app"}"#).unwrap();
        manifest.set_dependency(DependencyKind::Dev, "lib-c", "/tmp/lib-c-1.0.0.tgz");
        assert_eq!(
            manifest.dependency(DependencyKind::Dev, "lib-c"),
            Some("/tmp/lib-c-1.0.0.tgz")
        );
    }

    #[test]
    fn test_rewrite_local_dependencies_passes_stripped_path() {
        let mut manifest = Manifest::parse(APP).unwrap();
        manifest.rewrite_local_dependencies(|local| format!("file:../{}", local));
        assert_eq!(
            manifest.dependency(DependencyKind::Runtime, "lib-b"),
            Some("file:../../lib-b")
        );
        assert_eq!(
            manifest.dependency(DependencyKind::Dev, "lib-test"),
            Some("file:../../lib-test")
        );
        assert_eq!(
            manifest.dependency(DependencyKind::Runtime, "left-pad"),
            Some("^1.3.0")
        );
    }

    #[test]
    fn test_archive_file_name() {
        let manifest = Manifest::parse(r#"{"name": "lib-b", "version": "2.1.0"}"#).unwrap();
        assert_eq!(manifest.archive_file_name().unwrap(), "lib-b-2.1.0.tgz");
    }

    #[test]
    fn test_archive_file_name_scoped_package() {
        let manifest = Manifest::parse(r#"{"name": "@acme/lib-b", "version": "0.1.0"}"#).unwrap();
        assert_eq!(manifest.archive_file_name().unwrap(), "acme-lib-b-0.1.0.tgz");
    }

    #[test]
    fn test_archive_file_name_requires_version() {
        let manifest = Manifest::parse(r#"{"name": "lib-b"}"#).unwrap();
        assert!(manifest.archive_file_name().is_err());
    }

    #[test]
    fn test_to_json_string_preserves_key_order() {
        let manifest =
            Manifest::parse(r#"{"version": "1.0.0", "name": "app", "dependencies": {}}"#).unwrap();
        let json = manifest.to_json_string().unwrap();
        assert_eq!(
            json,
            "{\n    \"version\": \"1.0.0\",\n    \"name\": \"app\",\n    \"dependencies\": {}\n}\n"
        );
    }

    #[test]
    fn test_load_and_save_use_runtime() {
        let path = PathBuf::from("/work/app/package.json");
        let mut runtime = MockRuntime::new();
        runtime
            .expect_read_to_string()
            .with(eq(path.clone()))
            .returning(|_| Ok(r#"{"name": "app"}"#.to_string()));
        runtime
            .expect_write()
            .with(eq(path.clone()), eq(b"{\n    \"name\": \"app\"\n}\n".to_vec()))
            .times(1)
            .returning(|_, _| Ok(()));

        let manifest = Manifest::load(&runtime, &path).unwrap();
        manifest.save(&runtime, &path).unwrap();
    }
}
