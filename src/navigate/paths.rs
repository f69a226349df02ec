//! Remote path helpers
//!
//! Remote paths are always `/`-separated regardless of the local OS.

/// Ensure the path ends with exactly one `/`.
pub fn trim_separator(path: &str) -> String {
    format!("{}/", path.trim_end_matches('/'))
}

/// Join a directory and an entry name with a single `/`.
pub fn join(dir: &str, name: &str) -> String {
    format!("{}{}", trim_separator(dir), name.trim_start_matches('/'))
}

/// Last path component, ignoring trailing separators.
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Non-empty components of a path.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Split `dir/name` at the last separator. `None` when there is no separator
/// or no file name after it.
pub fn split_file_path(path: &str) -> Option<(String, String)> {
    let idx = path.rfind('/')?;
    let name = &path[idx + 1..];
    if name.is_empty() {
        return None;
    }
    let dir = match &path[..idx] {
        "" => "/",
        dir => dir,
    };
    Some((dir.to_string(), name.to_string()))
}

/// Qualify a name returned by a listing with its directory, unless the
/// server already returned a path.
pub fn qualify(dir: &str, name: &str) -> String {
    if name.contains('/') {
        name.to_string()
    } else {
        join(dir, name)
    }
}

/// `.` and `..` entries
pub fn is_dot_entry(name: &str) -> bool {
    matches!(base_name(name), "." | "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_separator_leaves_one_slash() {
        assert_eq!(trim_separator("/incoming/1"), "/incoming/1/");
        assert_eq!(trim_separator("/incoming/1///"), "/incoming/1/");
        assert_eq!(trim_separator("/"), "/");
        assert_eq!(trim_separator(""), "/");
    }

    #[test]
    fn join_and_base_name() {
        assert_eq!(join("/work/a/b", "x.txt"), "/work/a/b/x.txt");
        assert_eq!(join("/work/a/b/", "/x.txt"), "/work/a/b/x.txt");
        assert_eq!(base_name("/work/a/b/"), "b");
        assert_eq!(base_name("x.txt"), "x.txt");
    }

    #[test]
    fn split_file_path_handles_root_and_missing_name() {
        assert_eq!(
            split_file_path("/incoming/1/2/3/a.txt"),
            Some(("/incoming/1/2/3".into(), "a.txt".into()))
        );
        assert_eq!(split_file_path("/a.txt"), Some(("/".into(), "a.txt".into())));
        assert_eq!(split_file_path("a.txt"), None);
        assert_eq!(split_file_path("/incoming/"), None);
    }

    #[test]
    fn qualify_keeps_server_paths() {
        assert_eq!(qualify("/in", "a.txt"), "/in/a.txt");
        assert_eq!(qualify("/in", "/in/a.txt"), "/in/a.txt");
        assert!(is_dot_entry(".."));
        assert!(is_dot_entry("/in/."));
        assert!(!is_dot_entry(".hidden"));
    }
}
