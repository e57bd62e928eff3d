//! Bidirectional category index.
//!
//! A categorized page lists its categories in `@categories` (the forward
//! set). Each category lists its members in `.members`. The two are kept
//! consistent lazily: reading a categorized page's categories compares the
//! forward set against `.categories_since_last_update`, the snapshot taken at
//! the last reconciliation, and patches member files for the difference.
//!
//! Edits made directly on disk are picked up because reconciliation runs
//! whenever the snapshot is older than `@categories` or than the page
//! directory's change time. Deleted or retyped pages are pruned from member
//! lists the next time a category's members are read.
//!
//! Member files are only ever rewritten under an exclusive lock on the file
//! itself, so concurrent reconciliations of different pages that share a
//! category do not lose each other's writes.

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::SystemTime;

use serde::Serialize;

use crate::error::SiteError;
use crate::page::{Page, sort_pages};
use crate::registry::{Mixin, builtin};
use crate::sidecar::{
    self, CATEGORIES_ATTRIBUTE, CATEGORY_SNAPSHOT_FILE, MEMBERS_FILE, format_path_list,
    parse_path_list,
};

/// What a reconciliation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Category paths the page now belongs to.
    pub categories: Vec<String>,
    /// Categories whose member file gained the page.
    pub added_to: Vec<String>,
    /// Categories whose member file lost the page.
    pub removed_from: Vec<String>,
}

impl<'s> Page<'s> {
    #[must_use]
    pub fn is_category(&self) -> bool {
        self.is_a(builtin::CATEGORY)
    }

    #[must_use]
    pub fn is_categorized(&self) -> bool {
        self.has_mixin(Mixin::Categorized)
    }

    /// Categories of a categorized page, reconciling member files first if
    /// the snapshot is stale. Empty for other pages.
    pub fn categories(&self) -> Result<Vec<Page<'s>>, SiteError> {
        if !self.is_categorized() {
            return Ok(Vec::new());
        }

        let paths: BTreeSet<String> = if self.categories_stale() {
            self.reconcile_categories()?.categories.into_iter().collect()
        } else {
            self.snapshot()?
        };

        let mut categories: Vec<Page<'s>> = paths
            .iter()
            .filter_map(|path| self.category_at(path))
            .collect();
        sort_pages(&mut categories);
        Ok(categories)
    }

    /// Whether the category snapshot of this page is out of date.
    #[must_use]
    pub fn categories_stale(&self) -> bool {
        let dir = self.fs_path();
        is_stale(
            sidecar::modified(&dir.join(CATEGORY_SNAPSHOT_FILE)),
            sidecar::modified(&sidecar::attribute_path(dir, CATEGORIES_ATTRIBUTE)),
            sidecar::changed(dir),
        )
    }

    /// Bring member files in line with `@categories` and refresh the snapshot.
    ///
    /// Runs unconditionally; [`Page::categories`] only calls it when stale.
    /// The snapshot is stamped with the change time observed before
    /// `@categories` was read, so an edit racing this call still leaves the
    /// page stale.
    pub fn reconcile_categories(&self) -> Result<Reconciliation, SiteError> {
        let dir = self.fs_path();
        let snapshot_file = dir.join(CATEGORY_SNAPSHOT_FILE);
        let previous = self.snapshot()?;

        // Snapshot creation must land in the observed directory change time.
        if let Err(e) = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&snapshot_file)
        {
            tracing::warn!(path = %snapshot_file.display(), error = %e, "Failed to create category snapshot");
        }
        let observed = observed_change(dir);

        let forward = self.fresh_forward()?;
        let current: Vec<Page<'s>> = parse_path_list(&forward)
            .iter()
            .filter_map(|path| self.category_at(path))
            .collect();
        let current_paths: BTreeSet<String> =
            current.iter().map(|c| c.path().to_owned()).collect();

        let mut result = Reconciliation {
            categories: current_paths.iter().cloned().collect(),
            ..Reconciliation::default()
        };
        let mut complete = true;

        for category in &current {
            match category.add_member(self.path()) {
                Ok(true) => result.added_to.push(category.path().to_owned()),
                Ok(false) => {}
                Err(e) => {
                    complete = false;
                    tracing::warn!(category = %category.path(), member = %self.path(), error = %e, "Failed to add category member");
                }
            }
        }

        for path in previous.difference(&current_paths) {
            let Some(category) = self.category_at(path) else {
                continue;
            };
            match category.remove_member(self.path()) {
                Ok(true) => result.removed_from.push(category.path().to_owned()),
                Ok(false) => {}
                Err(e) => {
                    complete = false;
                    tracing::warn!(category = %category.path(), member = %self.path(), error = %e, "Failed to remove category member");
                }
            }
        }

        // A partial update leaves the snapshot stale so the next read retries.
        let written = if complete {
            write_snapshot(&snapshot_file, &current_paths, observed)
        } else {
            File::options()
                .write(true)
                .open(&snapshot_file)
                .and_then(|f| f.set_modified(SystemTime::UNIX_EPOCH))
        };
        if let Err(e) = written {
            tracing::warn!(path = %snapshot_file.display(), error = %e, "Failed to write category snapshot");
        }

        if !result.added_to.is_empty() || !result.removed_from.is_empty() {
            tracing::info!(
                path = %self.path(),
                added = result.added_to.len(),
                removed = result.removed_from.len(),
                "Reconciled categories"
            );
        }
        Ok(result)
    }

    /// Members of a category, sorted with [`Page::compare`]. Empty for other
    /// pages.
    ///
    /// Entries that no longer exist or no longer resolve to a categorized
    /// page are dropped from `.members` as a side effect.
    pub fn members(&self) -> Result<Vec<Page<'s>>, SiteError> {
        if !self.is_category() {
            return Ok(Vec::new());
        }

        let file = self.fs_path().join(MEMBERS_FILE);
        let listed = match read_shared(&file) {
            Ok(content) => parse_path_list(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => return Err(SiteError::io(e, self.path())),
        };

        let mut members = Vec::new();
        let mut dangling = BTreeSet::new();
        for path in listed {
            match self.site().page_for(&path) {
                Ok(page) if page.is_categorized() => members.push(page),
                Ok(_) | Err(SiteError::NotFound { .. }) => {
                    dangling.insert(path);
                }
                Err(e) => {
                    tracing::debug!(category = %self.path(), member = %path, error = %e, "Skipping category member");
                }
            }
        }

        if !dangling.is_empty() {
            match update_members(&file, false, |set| set.retain(|p| !dangling.contains(p))) {
                Ok(_) => tracing::info!(
                    category = %self.path(),
                    dropped = dangling.len(),
                    "Dropped dangling category members"
                ),
                Err(e) => tracing::warn!(
                    path = %file.display(),
                    error = %e,
                    "Failed to drop dangling category members"
                ),
            }
        }

        sort_pages(&mut members);
        Ok(members)
    }

    fn add_member(&self, member: &str) -> std::io::Result<bool> {
        update_members(&self.fs_path().join(MEMBERS_FILE), true, |set| {
            set.insert(member.to_owned());
        })
    }

    fn remove_member(&self, member: &str) -> std::io::Result<bool> {
        update_members(&self.fs_path().join(MEMBERS_FILE), false, |set| {
            set.remove(member);
        })
    }

    /// `@categories` read from disk, bypassing the attribute cache.
    fn fresh_forward(&self) -> Result<String, SiteError> {
        let file = sidecar::attribute_path(self.fs_path(), CATEGORIES_ATTRIBUTE);
        match sidecar::read_attribute(&file) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(self
                .page_type()
                .attribute(CATEGORIES_ATTRIBUTE)
                .and_then(|def| def.default.clone())
                .unwrap_or_default()),
            Err(e) => Err(SiteError::io(e, self.path())),
        }
    }

    fn snapshot(&self) -> Result<BTreeSet<String>, SiteError> {
        match fs::read_to_string(self.fs_path().join(CATEGORY_SNAPSHOT_FILE)) {
            Ok(content) => Ok(parse_path_list(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeSet::new()),
            Err(e) => Err(SiteError::io(e, self.path())),
        }
    }

    /// The category page at `path`, or `None` (logged) if it is not one.
    fn category_at(&self, path: &str) -> Option<Page<'s>> {
        match self.site().page_for(path) {
            Ok(page) if page.is_category() => Some(page),
            Ok(page) => {
                tracing::debug!(page = %self.path(), category = %path, actual = %page.page_type().name(), "Skipping non-category");
                None
            }
            Err(e) => {
                tracing::debug!(page = %self.path(), category = %path, error = %e, "Skipping unresolvable category");
                None
            }
        }
    }
}

/// Snapshot staleness rule.
///
/// Stale when there is no snapshot, or when it is older than the forward
/// file or the directory change time.
pub(crate) fn is_stale(
    snapshot: Option<SystemTime>,
    forward: Option<SystemTime>,
    dir_changed: Option<SystemTime>,
) -> bool {
    let Some(snapshot) = snapshot else {
        return true;
    };
    forward.is_some_and(|t| snapshot < t) || dir_changed.is_some_and(|t| snapshot < t)
}

/// Latest of the forward file's mtime and the directory change time.
fn observed_change(dir: &Path) -> Option<SystemTime> {
    let forward = sidecar::modified(&sidecar::attribute_path(dir, CATEGORIES_ATTRIBUTE));
    forward.max(sidecar::changed(dir))
}

/// Overwrite the snapshot in place and stamp it with `as_of`.
fn write_snapshot(
    path: &Path,
    categories: &BTreeSet<String>,
    as_of: Option<SystemTime>,
) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(format_path_list(categories).as_bytes())?;
    if let Some(as_of) = as_of {
        file.set_modified(as_of)?;
    }
    Ok(())
}

fn read_shared(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    file.lock_shared()?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

/// Read-modify-write a member file under an exclusive lock.
///
/// Returns whether the member set changed. With `create` unset a missing
/// file is left missing.
pub(crate) fn update_members(
    path: &Path,
    create: bool,
    edit: impl FnOnce(&mut BTreeSet<String>),
) -> std::io::Result<bool> {
    let mut file = match OpenOptions::new()
        .read(true)
        .write(true)
        .create(create)
        .truncate(false)
        .open(path)
    {
        Ok(file) => file,
        Err(e) if !create && e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    file.lock()?;

    let mut content = String::new();
    file.read_to_string(&mut content)?;
    let mut members = parse_path_list(&content);
    let before = members.clone();
    edit(&mut members);
    if members == before {
        return Ok(false);
    }

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(format_path_list(&members).as_bytes())?;
    Ok(true)
}
