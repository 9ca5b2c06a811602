//! Path utility functions for normalization and relative references.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                match result.components().next_back() {
                    Some(Component::Normal(_)) => {
                        result.pop();
                    }
                    // `..` past the root stays at the root
                    Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                    _ => result.push(component),
                }
            }
            _ => result.push(component),
        }
    }
    result
}

/// Resolve `reference` against `base_dir`, returning a normalized path.
/// Absolute references are only normalized.
pub fn resolve_against(base_dir: &Path, reference: &Path) -> PathBuf {
    if reference.is_absolute() {
        normalize_path(reference)
    } else {
        normalize_path(&base_dir.join(reference))
    }
}

/// Path of `to_path` relative to `from_dir`, as used in `file:` references.
///
/// Returns `None` if no relative path exists (e.g. different drive letters on Windows).
pub fn relative_path_from_dir(from_dir: &Path, to_path: &Path) -> Option<PathBuf> {
    let result = pathdiff::diff_paths(to_path, from_dir)?;
    if result.is_absolute() {
        return None;
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_with_dot() {
        assert_eq!(
            normalize_path(Path::new("/work/./app/./package.json")),
            PathBuf::from("/work/app/package.json")
        );
    }

    #[test]
    fn test_normalize_path_with_parent_dir() {
        assert_eq!(
            normalize_path(Path::new("/work/app/../lib-b/package.json")),
            PathBuf::from("/work/lib-b/package.json")
        );
    }

    #[test]
    fn test_normalize_path_relative_keeps_leading_parent() {
        assert_eq!(
            normalize_path(Path::new("../lib-b/./src/..")),
            PathBuf::from("../lib-b")
        );
    }

    #[test]
    fn test_normalize_path_keeps_repeated_leading_parents() {
        assert_eq!(
            normalize_path(Path::new("../../lib-b")),
            PathBuf::from("../../lib-b")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_normalize_path_parent_of_root() {
        assert_eq!(normalize_path(Path::new("/../work")), PathBuf::from("/work"));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_against_relative_reference() {
        assert_eq!(
            resolve_against(Path::new("/work/app"), Path::new("../lib-b")),
            PathBuf::from("/work/lib-b")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_against_absolute_reference() {
        assert_eq!(
            resolve_against(Path::new("/work/app"), Path::new("/opt/lib-c/.")),
            PathBuf::from("/opt/lib-c")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_path_from_dir_sibling() {
        assert_eq!(
            relative_path_from_dir(Path::new("/work/app/build"), Path::new("/work/lib-b")),
            Some(PathBuf::from("../../lib-b"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_path_from_dir_nested() {
        assert_eq!(
            relative_path_from_dir(Path::new("/work"), Path::new("/work/packages/lib-b")),
            Some(PathBuf::from("packages/lib-b"))
        );
    }
}
