//! Sidecar files stored inside page directories.
//!
//! Attribute values live in `@<name>` files, type declarations in
//! `=page-type` / `:page-type`, and the category index in `.members` and
//! `.categories_since_last_update`. Directory entries whose names start with
//! one of [`RESERVED_PREFIXES`] are never pages.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::paths;

/// Type marker that applies to its own directory only.
pub const PRIVATE_TYPE_MARKER: &str = "=page-type";

/// Type marker inherited by every descendant directory.
pub const INHERITED_TYPE_MARKER: &str = ":page-type";

/// Marker whose modification time is a post's publication time.
pub const PUBLICATION_DATE_MARKER: &str = ":publication-date";

/// Member list of a category.
pub const MEMBERS_FILE: &str = ".members";

/// Forward category set as of the last reconciliation.
pub const CATEGORY_SNAPSHOT_FILE: &str = ".categories_since_last_update";

/// Forward category set of a categorized page.
pub const CATEGORIES_ATTRIBUTE: &str = "categories";

/// Leading characters that exclude a directory entry from the page tree.
pub const RESERVED_PREFIXES: [char; 4] = ['.', '@', '=', ':'];

/// Whether a directory entry name is reserved for sidecar data.
#[must_use]
pub fn is_reserved(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIXES)
}

/// Path of the `@<name>` file in `dir`.
#[must_use]
pub fn attribute_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("@{name}"))
}

/// Read an attribute file, removing one trailing line break.
pub fn read_attribute(path: &Path) -> std::io::Result<String> {
    let mut content = fs::read_to_string(path)?;
    if content.ends_with('\n') {
        content.pop();
        if content.ends_with('\r') {
            content.pop();
        }
    }
    Ok(content)
}

/// Modification time of a file, `None` when it cannot be stat'ed.
#[must_use]
pub fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Status change time of a directory.
///
/// On Unix this is the inode ctime, which moves on renames and permission
/// changes as well as on content edits. Elsewhere it is the mtime.
#[cfg(unix)]
#[must_use]
pub fn changed(path: &Path) -> Option<SystemTime> {
    use std::os::unix::fs::MetadataExt;
    use std::time::Duration;

    let meta = fs::metadata(path).ok()?;
    let secs = u64::try_from(meta.ctime()).ok()?;
    let nanos = u32::try_from(meta.ctime_nsec()).ok()?;
    SystemTime::UNIX_EPOCH.checked_add(Duration::new(secs, nanos))
}

/// Status change time of a directory.
#[cfg(not(unix))]
#[must_use]
pub fn changed(path: &Path) -> Option<SystemTime> {
    modified(path)
}

/// Parse a newline-delimited list of URL paths into directory form.
///
/// Blank lines are ignored, so hand-edited files with stray whitespace
/// still parse.
#[must_use]
pub fn parse_path_list(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(paths::as_directory)
        .collect()
}

/// Serialize a path list, one path per line.
#[must_use]
pub fn format_path_list(paths: &BTreeSet<String>) -> String {
    let mut out = String::new();
    for path in paths {
        out.push_str(path);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_is_reserved() {
        assert!(is_reserved(".members"));
        assert!(is_reserved("@title"));
        assert!(is_reserved("=page-type"));
        assert!(is_reserved(":page-type"));
        assert!(!is_reserved("hello"));
        assert!(!is_reserved("_drafts"));
    }

    #[test]
    fn test_read_attribute_chomps_one_newline() {
        let temp_dir = TempDir::new().unwrap();
        let path = attribute_path(temp_dir.path(), "title");
        fs::write(&path, "Hello\n\n").unwrap();
        assert_eq!(read_attribute(&path).unwrap(), "Hello\n");

        fs::write(&path, "Windows\r\n").unwrap();
        assert_eq!(read_attribute(&path).unwrap(), "Windows");

        fs::write(&path, "bare").unwrap();
        assert_eq!(read_attribute(&path).unwrap(), "bare");
    }

    #[test]
    fn test_parse_path_list_canonicalizes() {
        let parsed = parse_path_list("/cats/a\n\n  /cats/b/  \n/cats/../cats/a/\n");
        let expected: BTreeSet<String> = ["/cats/a/", "/cats/b/"]
            .into_iter()
            .map(str::to_owned)
            .collect();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_format_path_list() {
        let set: BTreeSet<String> = ["/b/", "/a/"].into_iter().map(str::to_owned).collect();
        assert_eq!(format_path_list(&set), "/a/\n/b/\n");
        assert_eq!(format_path_list(&BTreeSet::new()), "");
    }

    #[test]
    fn test_changed_exists_for_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert!(changed(temp_dir.path()).is_some());
        assert!(changed(&temp_dir.path().join("missing")).is_none());
    }
}
