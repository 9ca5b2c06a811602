//! Package manifests and the local dependency graph
//!
//! This module reads `package.json`/`package-lock.json` documents, classifies
//! dependency references as local or registry, and discovers every package
//! reachable from a root through local references.

mod graph;
mod local;
mod lock;
mod manifest;

pub use graph::{DependencyGraph, PackageNode};
pub use local::{is_local_version, resolve_local_version};
pub use lock::remove_local_deps_from_lock;
pub use manifest::{DependencyKind, LOCK_FILE, MANIFEST_FILE, Manifest};
