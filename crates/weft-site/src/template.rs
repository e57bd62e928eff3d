//! Template selection by walking the page type hierarchy.
//!
//! For a page of type `Blog::RSSFeed` the walk tries, in order:
//!
//! 1. `blog/rss_feed`
//! 2. `blog/abstract_feed`
//! 3. `base`
//! 4. `default`
//!
//! The abstract root is never tried. Layouts use the same walk with a
//! `layouts/` prefix. Whether a name exists is up to a [`TemplateStore`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::registry::{PageType, builtin, canonical_name};

/// Template tried after the whole type hierarchy.
pub const DEFAULT_TEMPLATE: &str = "default";

/// Prefix prepended to template names when looking up layouts.
pub const LAYOUT_PREFIX: &str = "layouts/";

static ACRONYM_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z\d]+)([A-Z][a-z])").unwrap());
static WORD_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z\d])([A-Z])").unwrap());

/// Answers whether a named template exists.
pub trait TemplateStore: Send + Sync {
    /// File backing the template `name` (slash-separated, no extension).
    fn locate(&self, name: &str) -> Option<PathBuf>;

    fn exists(&self, name: &str) -> bool {
        self.locate(name).is_some()
    }
}

/// Templates stored as files under a directory.
///
/// `<dir>/<name>` and `<dir>/<name>.<ext>` both count; with several
/// extensions present the alphabetically first file wins.
#[derive(Debug, Clone)]
pub struct FsTemplateStore {
    dir: PathBuf,
}

impl FsTemplateStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TemplateStore for FsTemplateStore {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        let segments: Vec<&str> = name.split('/').collect();
        if segments
            .iter()
            .any(|s| s.is_empty() || *s == "." || *s == "..")
        {
            return None;
        }
        let (stem, parents) = segments.split_last()?;

        let mut dir = self.dir.clone();
        dir.extend(parents);

        let exact = dir.join(stem);
        if exact.is_file() {
            return Some(exact);
        }

        let prefix = format!("{stem}.");
        let mut matches: Vec<PathBuf> = fs::read_dir(&dir)
            .ok()?
            .filter_map(Result::ok)
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|n| n.starts_with(&prefix))
            })
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        matches.sort();
        matches.into_iter().next()
    }
}

/// Template name for a page type name.
///
/// Strips the `PageTypes::` prefix, turns `::` into `/`, and snake-cases each
/// segment: `Blog::RSSFeed` → `blog/rss_feed`.
#[must_use]
pub fn template_name(type_name: &str) -> String {
    canonical_name(type_name)
        .split("::")
        .map(underscore)
        .collect::<Vec<_>>()
        .join("/")
}

fn underscore(word: &str) -> String {
    let word = ACRONYM_BOUNDARY.replace_all(word, "${1}_${2}");
    let word = WORD_BOUNDARY.replace_all(&word, "${1}_${2}");
    word.replace('-', "_").to_lowercase()
}

/// Template names tried for `page_type`, in order, with `prefix` applied.
#[must_use]
pub fn candidates(page_type: &PageType, prefix: &str) -> Vec<String> {
    page_type
        .lineage()
        .take_while(|name| *name != builtin::ROOT)
        .map(|name| format!("{prefix}{}", template_name(name)))
        .chain(std::iter::once(format!("{prefix}{DEFAULT_TEMPLATE}")))
        .collect()
}

/// First existing template along the type hierarchy, then the default.
#[must_use]
pub fn resolve(page_type: &PageType, prefix: &str, store: &dyn TemplateStore) -> Option<String> {
    candidates(page_type, prefix)
        .into_iter()
        .find(|name| store.exists(name))
}
