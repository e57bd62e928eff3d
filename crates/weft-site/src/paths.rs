//! URL-space to filesystem path mapping.
//!
//! URL paths are cleaned lexically: `.` segments and repeated separators are
//! dropped, and `..` pops a segment but never climbs above the root. The
//! filesystem is never consulted, so a symlink inside the root cannot change
//! what a URL maps to.
//!
//! Two spellings of a cleaned URL exist in this crate:
//! - plain form, as returned by [`clean`] (`/blog/hello`, root is `/`)
//! - directory form, as used for page paths (`/blog/hello/`, root is `/`)

use std::path::{Component, Path, PathBuf};

/// Collapse a URL path to its canonical absolute form without a trailing slash.
///
/// Relative inputs are treated as relative to `/`.
#[must_use]
pub fn clean(url: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in url.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        "/".to_owned()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Clean a URL path and spell it in directory form (trailing `/`).
#[must_use]
pub fn as_directory(url: &str) -> String {
    let cleaned = clean(url);
    if cleaned == "/" {
        cleaned
    } else {
        format!("{cleaned}/")
    }
}

/// Directory-form path of the parent page, or `None` for the root.
#[must_use]
pub fn parent(url: &str) -> Option<String> {
    let cleaned = clean(url);
    if cleaned == "/" {
        return None;
    }
    let cut = cleaned.rfind('/').unwrap_or(0);
    Some(as_directory(&cleaned[..cut]))
}

/// Resolve a URL reference against a base page path.
///
/// Absolute references replace the base. Relative references are appended to
/// the base, so `join("/blog/feed/", "..")` is `/blog`.
#[must_use]
pub fn join(base: &str, reference: &str) -> String {
    if reference.starts_with('/') {
        clean(reference)
    } else {
        clean(&format!("{base}/{reference}"))
    }
}

/// Build ancestor chain for a URL path.
///
/// Returns directory-form ancestors from the root to the path itself.
/// E.g., `"/blog/2024/hello"` → `["/", "/blog/", "/blog/2024/", "/blog/2024/hello/"]`
#[must_use]
pub fn ancestor_chain(url: &str) -> Vec<String> {
    let cleaned = clean(url);
    let mut ancestors = vec!["/".to_owned()];
    let mut current = String::from("/");
    for segment in cleaned.split('/').filter(|s| !s.is_empty()) {
        current.push_str(segment);
        current.push('/');
        ancestors.push(current.clone());
    }
    ancestors
}

/// Bidirectional mapping between URL paths and paths under a site root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapper {
    root: PathBuf,
}

impl PathMapper {
    /// Create a mapper rooted at `root`.
    ///
    /// The root is made absolute and lexically normalized once, so later
    /// prefix checks compare like with like.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let absolute = std::path::absolute(&root).unwrap_or(root);
        Self {
            root: normalize(&absolute),
        }
    }

    /// Filesystem root of the site.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a URL path to a filesystem path that always lies under the root.
    #[must_use]
    pub fn url_to_fs(&self, url: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in clean(url).split('/') {
            // Only plain names survive, so prefixes and separators a platform
            // might read out of a segment cannot redirect the join.
            for component in Path::new(segment).components() {
                if let Component::Normal(name) = component {
                    path.push(name);
                }
            }
        }
        path
    }

    /// Map a filesystem path back to URL space.
    ///
    /// Paths outside the root are returned unchanged.
    #[must_use]
    pub fn fs_to_url(&self, fs_path: &Path) -> String {
        let normalized = normalize(fs_path);
        match normalized.strip_prefix(&self.root) {
            Ok(relative) => {
                let segments: Vec<String> = relative
                    .components()
                    .filter_map(|c| match c {
                        Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                        _ => None,
                    })
                    .collect();
                format!("/{}", segments.join("/"))
            }
            Err(_) => fs_path.to_string_lossy().into_owned(),
        }
    }
}

/// Lexically normalize a filesystem path (drop `.`, resolve `..`).
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const INPUTS: &[&str] = &[
        "",
        "/",
        "//",
        "a",
        "/a/b/",
        "a//b/./c",
        "/a/../b",
        "../../etc/passwd",
        "/..",
        "/a/b/../../../..",
        "./x/y/..",
        "/blog/2024/hello world",
    ];

    #[test]
    fn test_clean() {
        assert_eq!(clean(""), "/");
        assert_eq!(clean("/"), "/");
        assert_eq!(clean("a"), "/a");
        assert_eq!(clean("/a/b/"), "/a/b");
        assert_eq!(clean("a//b/./c"), "/a/b/c");
        assert_eq!(clean("/a/../b"), "/b");
        assert_eq!(clean("../../etc/passwd"), "/etc/passwd");
        assert_eq!(clean("/a/b/../../../.."), "/");
    }

    #[test]
    fn test_clean_is_idempotent() {
        for input in INPUTS {
            let once = clean(input);
            assert_eq!(clean(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn test_as_directory() {
        assert_eq!(as_directory("/"), "/");
        assert_eq!(as_directory("blog"), "/blog/");
        assert_eq!(as_directory("/blog/x/"), "/blog/x/");
    }

    #[test]
    fn test_parent() {
        assert_eq!(parent("/"), None);
        assert_eq!(parent("/blog/"), Some("/".to_owned()));
        assert_eq!(parent("/blog/2024/hello/"), Some("/blog/2024/".to_owned()));
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/blog/feed/", ".."), "/blog");
        assert_eq!(join("/blog/feed/", "../posts"), "/blog/posts");
        assert_eq!(join("/blog/feed/", "/other"), "/other");
        assert_eq!(join("/", "../.."), "/");
    }

    #[test]
    fn test_ancestor_chain_root() {
        assert_eq!(ancestor_chain("/"), vec!["/"]);
    }

    #[test]
    fn test_ancestor_chain_multi_segment() {
        assert_eq!(
            ancestor_chain("/blog/2024/hello"),
            vec!["/", "/blog/", "/blog/2024/", "/blog/2024/hello/"]
        );
    }

    #[test]
    fn test_round_trip() {
        let mapper = PathMapper::new("/srv/site");
        for input in INPUTS {
            let fs = mapper.url_to_fs(input);
            assert_eq!(mapper.fs_to_url(&fs), clean(input), "input: {input:?}");
        }
    }

    #[test]
    fn test_containment() {
        let mapper = PathMapper::new("/srv/site");
        for input in INPUTS {
            let fs = mapper.url_to_fs(input);
            assert!(fs.starts_with("/srv/site"), "{input:?} escaped to {fs:?}");
        }
        assert_eq!(
            mapper.url_to_fs("../../etc/passwd"),
            PathBuf::from("/srv/site/etc/passwd")
        );
    }

    #[test]
    fn test_root_is_normalized() {
        let mapper = PathMapper::new("/srv/./site/../site");
        assert_eq!(mapper.root(), Path::new("/srv/site"));
        assert_eq!(mapper.url_to_fs("/"), PathBuf::from("/srv/site"));
    }

    #[test]
    fn test_fs_to_url_outside_root_is_unchanged() {
        let mapper = PathMapper::new("/srv/site");
        assert_eq!(
            mapper.fs_to_url(Path::new("/srv/templates/post.html")),
            "/srv/templates/post.html"
        );
    }

    #[test]
    fn test_fs_to_url_inside_root() {
        let mapper = PathMapper::new("/srv/site");
        assert_eq!(
            mapper.fs_to_url(Path::new("/srv/site/blog/./hello")),
            "/blog/hello"
        );
    }
}
