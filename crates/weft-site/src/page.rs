//! Request-scoped view of a page directory.
//!
//! A [`Page`] is cheap to create and caches what it reads (attributes, times)
//! for its own lifetime only. The filesystem stays the source of truth; two
//! `Page` values for the same path may disagree if the tree changed between
//! their reads.

use std::cell::{OnceCell, RefCell};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::SiteError;
use crate::paths;
use crate::registry::{Mixin, PageType, builtin};
use crate::resolver::TypeDeclaration;
use crate::sidecar::{self, PUBLICATION_DATE_MARKER};
use crate::site::Site;

/// A page of a [`Site`], identified by its directory-form URL path.
#[derive(Clone)]
pub struct Page<'s> {
    site: &'s Site,
    path: String,
    fs_path: PathBuf,
    page_type: Arc<PageType>,
    declaration: TypeDeclaration,
    attributes: RefCell<HashMap<String, Option<String>>>,
    mtime: OnceCell<Option<SystemTime>>,
    pubtime: OnceCell<Option<SystemTime>>,
}

impl<'s> Page<'s> {
    pub(crate) fn new(
        site: &'s Site,
        path: String,
        fs_path: PathBuf,
        page_type: Arc<PageType>,
        declaration: TypeDeclaration,
    ) -> Self {
        Self {
            site,
            path,
            fs_path,
            page_type,
            declaration,
            attributes: RefCell::new(HashMap::new()),
            mtime: OnceCell::new(),
            pubtime: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn site(&self) -> &'s Site {
        self.site
    }

    /// URL path in directory form (`/blog/hello/`, root is `/`).
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Directory backing this page.
    #[must_use]
    pub fn fs_path(&self) -> &Path {
        &self.fs_path
    }

    #[must_use]
    pub fn page_type(&self) -> &Arc<PageType> {
        &self.page_type
    }

    /// Where the page's type was declared.
    #[must_use]
    pub fn declaration(&self) -> &TypeDeclaration {
        &self.declaration
    }

    #[must_use]
    pub fn content_type(&self) -> &str {
        self.page_type.content_type()
    }

    /// Whether the page's type is `type_name` or descends from it.
    #[must_use]
    pub fn is_a(&self, type_name: &str) -> bool {
        self.page_type.is_a(type_name)
    }

    #[must_use]
    pub fn has_mixin(&self, mixin: Mixin) -> bool {
        self.page_type.has_mixin(mixin)
    }

    /// Value of a declared attribute.
    ///
    /// Reads `@<name>` on first access. Returns the declared default when the
    /// file is absent or unreadable, and `None` when the type does not declare
    /// the attribute at all.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        let def = self.page_type.attribute(name)?;
        if let Some(cached) = self.attributes.borrow().get(name) {
            return cached.clone();
        }

        let file = sidecar::attribute_path(&self.fs_path, name);
        let value = match sidecar::read_attribute(&file) {
            Ok(content) => Some(content),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(path = %file.display(), error = %e, "Using default for unreadable attribute");
                }
                def.default.clone()
            }
        };
        self.attributes
            .borrow_mut()
            .insert(name.to_owned(), value.clone());
        value
    }

    /// All declared attributes with their current values.
    #[must_use]
    pub fn attributes(&self) -> BTreeMap<String, Option<String>> {
        self.page_type
            .attributes()
            .iter()
            .map(|def| (def.name.clone(), self.attribute(&def.name)))
            .collect()
    }

    /// Newest modification time among the page's existing attribute files,
    /// falling back to the directory's own.
    #[must_use]
    pub fn mtime(&self) -> Option<SystemTime> {
        *self.mtime.get_or_init(|| {
            self.page_type
                .attributes()
                .iter()
                .filter_map(|def| sidecar::modified(&sidecar::attribute_path(&self.fs_path, &def.name)))
                .max()
                .or_else(|| sidecar::modified(&self.fs_path))
        })
    }

    /// Publication time of a [`Mixin::NewestFirst`] page.
    ///
    /// The mtime of `:publication-date` when present, else [`Page::mtime`].
    /// Always `None` for other pages.
    #[must_use]
    pub fn pubtime(&self) -> Option<SystemTime> {
        if !self.has_mixin(Mixin::NewestFirst) {
            return None;
        }
        *self.pubtime.get_or_init(|| {
            sidecar::modified(&self.fs_path.join(PUBLICATION_DATE_MARKER)).or_else(|| self.mtime())
        })
    }

    /// Parent page; `None` at the root.
    pub fn parent(&self) -> Result<Option<Page<'s>>, SiteError> {
        match paths::parent(&self.path) {
            Some(parent) => self.site.page_for(&parent).map(Some),
            None => Ok(None),
        }
    }

    /// Child pages, sorted with [`Page::compare`].
    ///
    /// Only real subdirectories count. Symlinks, reserved names, entries
    /// that fail to resolve, and `Ignore` pages are left out. An `Ignore` page has no
    /// children.
    pub fn children(&self) -> Result<Vec<Page<'s>>, SiteError> {
        if self.is_a(builtin::IGNORE) {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.fs_path).map_err(|e| SiteError::io(e, &self.path))?;
        let mut children = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(path = %self.path, error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                tracing::debug!(path = %self.path, name = ?entry.file_name(), "Skipping non-UTF-8 entry");
                continue;
            };
            if sidecar::is_reserved(name) {
                continue;
            }
            // Symlinked directories are not followed.
            if !entry.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }

            let child_path = format!("{}{name}/", self.path);
            match self.site.page_for(&child_path) {
                Ok(child) if child.is_a(builtin::IGNORE) => {}
                Ok(child) => children.push(child),
                Err(e) => {
                    tracing::debug!(path = %child_path, error = %e, "Skipping child page");
                }
            }
        }

        sort_pages(&mut children);
        Ok(children)
    }

    /// Ordering used for child lists and other page collections.
    ///
    /// [`Mixin::NewestFirst`] pages with a publication time come first,
    /// newest first. All other pages follow in path order, and path order
    /// also breaks ties.
    #[must_use]
    pub fn compare(&self, other: &Page<'_>) -> Ordering {
        match (self.pubtime(), other.pubtime()) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| self.path.cmp(&other.path))
    }
}

/// Sort pages with [`Page::compare`].
pub fn sort_pages(pages: &mut [Page<'_>]) {
    pages.sort_by(Page::compare);
}

impl PartialEq for Page<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.site, other.site) && self.path == other.path
    }
}

impl Eq for Page<'_> {}

impl std::hash::Hash for Page<'_> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl fmt::Debug for Page<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("path", &self.path)
            .field("type", &self.page_type.name())
            .finish_non_exhaustive()
    }
}
