//! Slash-separated namespace path algebra.
//!
//! Namespace paths are always absolute, use `/` regardless of the host
//! platform and never contain `.` or `..` elements once cleaned.

/// Clean `path` into its rooted, shortest equivalent.
///
/// The result always starts with `/`; `..` elements at the root are
/// dropped, so a cleaned path can never climb above `/`.
pub fn clean(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }

    let mut out = String::with_capacity(path.len() + 1);
    for part in &parts {
        out.push('/');
        out.push_str(part);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Join `rest` onto `base` and clean the result.
pub fn join(base: &str, rest: &str) -> String {
    clean(&format!("{}/{}", base, rest))
}

/// Parent directory of a cleaned path; the parent of `/` is `/`.
pub fn parent(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => path[..i].to_string(),
    }
}

/// Final element of a path, or `/` for the root.
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    match trimmed.rfind('/') {
        Some(i) => &trimmed[i + 1..],
        None => trimmed,
    }
}

/// Extension of the final element including the dot, or `""`.
pub fn extension(path: &str) -> &str {
    let name = base_name(path);
    match name.rfind('.') {
        Some(i) => &name[i..],
        None => "",
    }
}

/// Reports whether `x == y` or `x` lies below `y`.
pub fn has_path_prefix(x: &str, y: &str) -> bool {
    x == y || (x.starts_with(y) && (y.ends_with('/') || x[y.len()..].starts_with('/')))
}
