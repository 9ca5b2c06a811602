//! Graph of packages linked together through local dependency references.

use anyhow::{Context, Result};
use log::{debug, warn};
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::DfsPostOrder;
use petgraph::Direction;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::local::resolve_local_version;
use super::manifest::{DependencyKind, MANIFEST_FILE, Manifest};
use crate::runtime::{Runtime, normalize_path, resolve_against};

/// A package reachable from the root through local references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageNode {
    pub name: String,
    pub manifest_path: PathBuf,
    /// Category under which the package was first reached from the root.
    /// `None` for the root itself.
    pub kind: Option<DependencyKind>,
}

impl PackageNode {
    pub fn dir(&self) -> &Path {
        self.manifest_path.parent().unwrap_or(Path::new("."))
    }
}

/// Directed graph with `dependent -> dependency` edges.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<PackageNode, ()>,
    index: HashMap<String, NodeIndex>,
    root: NodeIndex,
}

impl DependencyGraph {
    /// Walk manifests starting at `root_manifest`, following only dependencies
    /// whose version resolves to a directory containing a manifest.
    ///
    /// All three categories of the root are followed; below the root only
    /// `dependencies` are. A package reached again (diamond or cycle) gets the
    /// edge but is not descended into a second time.
    #[tracing::instrument(skip(runtime))]
    pub fn build<R: Runtime>(runtime: &R, root_manifest: &Path) -> Result<Self> {
        let mut builder = GraphBuilder {
            runtime,
            manifests: HashMap::new(),
            graph: DiGraph::new(),
            index: HashMap::new(),
            descended: HashSet::new(),
        };

        let root_manifest = normalize_path(root_manifest);
        let root_name = builder.package_name(&root_manifest)?;
        let root = builder.add_node(&root_name, &root_manifest, None);
        builder.descended.insert(root);

        for kind in DependencyKind::ALL {
            builder.walk(root, &root_manifest, kind, kind)?;
        }

        if is_cyclic_directed(&builder.graph) {
            warn!(
                "Local dependencies of {} form a cycle; each package is packed once",
                root_name
            );
        }

        Ok(Self {
            graph: builder.graph,
            index: builder.index,
            root,
        })
    }

    pub fn root(&self) -> &PackageNode {
        &self.graph[self.root]
    }

    pub fn node(&self, name: &str) -> Option<&PackageNode> {
        self.index.get(name).map(|&idx| &self.graph[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn has_edge(&self, dependent: &str, dependency: &str) -> bool {
        match (self.index.get(dependent), self.index.get(dependency)) {
            (Some(&a), Some(&b)) => self.graph.contains_edge(a, b),
            _ => false,
        }
    }

    pub fn direct_dependencies_of(&self, name: &str) -> Vec<&PackageNode> {
        let Some(&idx) = self.index.get(name) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|n| &self.graph[n])
            .collect()
    }

    /// Every package `name` transitively depends on, excluding `name` itself.
    /// In an acyclic graph dependencies come before their dependents.
    pub fn dependencies_of(&self, name: &str) -> Vec<&PackageNode> {
        let Some(&start) = self.index.get(name) else {
            return Vec::new();
        };
        let mut dfs = DfsPostOrder::new(&self.graph, start);
        let mut result = Vec::new();
        while let Some(idx) = dfs.next(&self.graph) {
            if idx != start {
                result.push(&self.graph[idx]);
            }
        }
        result
    }
}

struct GraphBuilder<'a, R: Runtime> {
    runtime: &'a R,
    /// Parsed manifests of this build, keyed by normalized path.
    manifests: HashMap<PathBuf, Manifest>,
    graph: DiGraph<PackageNode, ()>,
    index: HashMap<String, NodeIndex>,
    descended: HashSet<NodeIndex>,
}

impl<R: Runtime> GraphBuilder<'_, R> {
    fn manifest(&mut self, path: &Path) -> Result<&Manifest> {
        if !self.manifests.contains_key(path) {
            let manifest = Manifest::load(self.runtime, path)?;
            self.manifests.insert(path.to_path_buf(), manifest);
        }
        self.manifests
            .get(path)
            .with_context(|| format!("Manifest {:?} missing from cache", path))
    }

    fn package_name(&mut self, manifest_path: &Path) -> Result<String> {
        if let Some(name) = self.manifest(manifest_path)?.name() {
            return Ok(name.to_string());
        }
        manifest_path
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("Cannot determine a package name for {:?}", manifest_path))
    }

    /// First discovery wins: an existing node keeps its path and category.
    fn add_node(
        &mut self,
        name: &str,
        manifest_path: &Path,
        kind: Option<DependencyKind>,
    ) -> NodeIndex {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(PackageNode {
            name: name.to_string(),
            manifest_path: manifest_path.to_path_buf(),
            kind,
        });
        self.index.insert(name.to_string(), idx);
        idx
    }

    fn walk(
        &mut self,
        dependent: NodeIndex,
        manifest_path: &Path,
        scan: DependencyKind,
        assign: DependencyKind,
    ) -> Result<()> {
        let base_dir = manifest_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();

        let local_deps: Vec<(String, PathBuf)> = self
            .manifest(manifest_path)?
            .dependencies(scan)
            .into_iter()
            .filter_map(|(name, version)| {
                let local = resolve_local_version(version)?;
                let dep_manifest = resolve_against(&base_dir, Path::new(local)).join(MANIFEST_FILE);
                Some((name.to_string(), dep_manifest))
            })
            .collect();

        for (name, dep_manifest) in local_deps {
            if !self.runtime.exists(&dep_manifest) {
                debug!("Skipping {}: {:?} does not exist", name, dep_manifest);
                continue;
            }

            let dependency = self.add_node(&name, &dep_manifest, Some(assign));
            self.graph.update_edge(dependent, dependency, ());

            if self.descended.insert(dependency) {
                let path = self.graph[dependency].manifest_path.clone();
                self.walk(dependency, &path, DependencyKind::Runtime, assign)?;
            } else {
                debug!("{} already visited, not descending again", name);
            }
        }

        Ok(())
    }
}
