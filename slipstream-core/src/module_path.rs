//! Module path normalization
//!
//! Module paths are `/`-joined hierarchies such as `examples/images/centos-6`.
//! The server addresses them below a `module` prefix and, for a concrete
//! revision, with a trailing version segment.

/// Prefix under which the server exposes the module tree.
pub const MODULE_ROOT: &str = "/module";

/// Normalize a user-supplied module path into a request URL path.
///
/// Leading/trailing slashes and empty segments are dropped, as is a leading
/// literal `module` segment; the result is re-prefixed with `/module/`.
pub fn normalize_module_url(path: &str) -> String {
    let mut parts: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    if parts.first() == Some(&"module") {
        parts.remove(0);
    }

    if parts.is_empty() {
        MODULE_ROOT.to_string()
    } else {
        format!("{}/{}", MODULE_ROOT, parts.join("/"))
    }
}

/// Strip the server-internal first segment of a resource path.
///
/// With `with_version == false` the last (version) segment is dropped as well.
/// Paths too short to carry both segments yield whatever remains.
pub fn strip_version(path: &str, with_version: bool) -> String {
    let parts: Vec<&str> = path.split('/').collect();
    let rest = parts.get(1..).unwrap_or(&[]);

    let rest = if with_version {
        rest
    } else {
        rest.split_last().map(|(_, init)| init).unwrap_or(&[])
    };

    rest.join("/")
}
