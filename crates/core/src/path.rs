//! Name and key normalization shared by the managers.

use std::path::is_separator;

/// Normalizes a resource name into a relative, `/`-separated path that cannot
/// climb out of the directory it is joined onto.
///
/// Leading separators are stripped, empty and `.` segments dropped, and `..`
/// segments discarded instead of resolved.
pub fn relative_name(name: &str) -> String {
    name.split(is_separator)
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect::<Vec<_>>()
        .join("/")
}

/// Joins an optional folder onto a name, normalizing both.
pub fn folder_name(folder: Option<&str>, name: &str) -> String {
    let name = relative_name(name);
    match folder.map(relative_name) {
        Some(folder) if !folder.is_empty() => {
            if name.is_empty() {
                folder
            } else {
                format!("{folder}/{name}")
            }
        }
        _ => name,
    }
}

/// Builds an object key. Keys are opaque to object storage, so the name is kept
/// as given; only the folder prefix is trimmed and joined with a single `/`.
pub fn object_key(folder: Option<&str>, name: &str) -> String {
    match folder.map(|f| f.trim_matches('/')) {
        Some(folder) if !folder.is_empty() => {
            format!("{folder}/{}", name.trim_start_matches('/'))
        }
        _ => name.to_string(),
    }
}

/// Last `/`-separated segment of a key.
pub fn key_basename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_separators() {
        assert_eq!(relative_name("/a/b.txt"), "a/b.txt");
        assert_eq!(relative_name("///b.txt"), "b.txt");
    }

    #[test]
    fn never_climbs_out() {
        assert_eq!(relative_name("../../etc/passwd"), "etc/passwd");
        assert_eq!(relative_name("a/../../b"), "a/b");
        assert_eq!(relative_name("./a//./b"), "a/b");
        assert_eq!(relative_name(".."), "");
    }

    #[test]
    fn keeps_dots_inside_segments() {
        assert_eq!(relative_name("a/..b/c..d/.e"), "a/..b/c..d/.e");
    }

    #[test]
    fn folder_is_prefixed() {
        assert_eq!(folder_name(Some("/sub/"), "a/b.txt"), "sub/a/b.txt");
        assert_eq!(folder_name(Some(""), "/a.txt"), "a.txt");
        assert_eq!(folder_name(None, "a.txt"), "a.txt");
        assert_eq!(folder_name(Some("../up"), "x"), "up/x");
    }

    #[test]
    fn object_keys_keep_the_name() {
        assert_eq!(object_key(None, "/raw//key"), "/raw//key");
        assert_eq!(object_key(Some("/media/"), "/img.png"), "media/img.png");
        assert_eq!(object_key(Some("/"), "img.png"), "img.png");
    }

    #[test]
    fn basename_of_key() {
        assert_eq!(key_basename("a/b/c.txt"), "c.txt");
        assert_eq!(key_basename("c.txt"), "c.txt");
    }
}
