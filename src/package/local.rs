/// Prefix npm uses for explicit local file references.
const FILE_PROTOCOL: &str = "file:";

/// Return the filesystem path a dependency version designates, or `None`
/// for registry versions such as `^1.2.3`.
///
/// Recognized local forms:
/// - `file:<path>` (the prefix is stripped)
/// - relative paths starting with `.` (`./lib`, `../lib`)
/// - absolute paths (`/opt/lib`)
pub fn resolve_local_version(version: &str) -> Option<&str> {
    if let Some(path) = version.strip_prefix(FILE_PROTOCOL) {
        return (!path.is_empty()).then_some(path);
    }
    if version.starts_with('.') || version.starts_with('/') {
        return Some(version);
    }
    None
}

pub fn is_local_version(version: &str) -> bool {
    resolve_local_version(version).is_some()
}
