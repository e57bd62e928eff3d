//! Blog page capabilities: folder posts, post comments, feed items.

use crate::error::SiteError;
use crate::page::{Page, sort_pages};
use crate::paths;
use crate::registry::builtin;

/// Feed source used when a feed's `source` attribute is unset.
pub const DEFAULT_FEED_SOURCE: &str = "..";

impl<'s> Page<'s> {
    /// Every post under a folder, including those in nested folders, newest
    /// first. Empty for pages that are not folders.
    pub fn posts(&self) -> Result<Vec<Page<'s>>, SiteError> {
        if !self.is_a(builtin::FOLDER) {
            return Ok(Vec::new());
        }
        let mut posts = Vec::new();
        self.collect_posts(&mut posts)?;
        sort_pages(&mut posts);
        Ok(posts)
    }

    fn collect_posts(&self, out: &mut Vec<Page<'s>>) -> Result<(), SiteError> {
        for child in self.children()? {
            if child.is_a(builtin::POST) {
                out.push(child);
            } else if child.is_a(builtin::FOLDER) {
                if let Err(e) = child.collect_posts(out) {
                    tracing::debug!(folder = %child.path(), error = %e, "Skipping unreadable folder");
                }
            }
        }
        Ok(())
    }

    /// Whether a folder contains at least one post at any depth.
    #[must_use]
    pub fn has_posts(&self) -> bool {
        if !self.is_a(builtin::FOLDER) {
            return false;
        }
        self.children().is_ok_and(|children| {
            children
                .iter()
                .any(|child| child.is_a(builtin::POST) || child.has_posts())
        })
    }

    /// Comments attached to a post, newest first. Empty for pages that are
    /// not posts.
    pub fn comments(&self) -> Result<Vec<Page<'s>>, SiteError> {
        if !self.is_a(builtin::POST) {
            return Ok(Vec::new());
        }
        Ok(self
            .children()?
            .into_iter()
            .filter(|child| child.is_a(builtin::COMMENT))
            .collect())
    }

    /// The page a feed draws its items from.
    ///
    /// `source` is a URL path, relative to the feed unless absolute.
    pub fn feed_source(&self) -> Result<Page<'s>, SiteError> {
        let source = self
            .attribute("source")
            .unwrap_or_else(|| DEFAULT_FEED_SOURCE.to_owned());
        let target = paths::join(self.path(), source.trim());
        self.site().page_for(&target)
    }

    /// Items of a feed: the source folder's posts or the source post's
    /// comments.
    ///
    /// # Errors
    ///
    /// [`SiteError::InvalidFeedSource`] if the source is neither a folder nor
    /// a post; resolution errors of the source itself otherwise.
    pub fn feed_items(&self) -> Result<Vec<Page<'s>>, SiteError> {
        let source = self.feed_source()?;
        if source.is_a(builtin::FOLDER) {
            source.posts()
        } else if source.is_a(builtin::POST) {
            source.comments()
        } else {
            Err(SiteError::InvalidFeedSource {
                feed: self.path().to_owned(),
                source_path: source.path().to_owned(),
            })
        }
    }
}
