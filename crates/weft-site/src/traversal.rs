//! Chronological navigation between blog posts.
//!
//! Starting from a post, the search looks at the post's siblings first and
//! widens one folder level at a time. At each level the candidates are the
//! posts and non-empty folders strictly newer (or older) than the starting
//! post, minus the folder the search just came out of. The closest candidate
//! wins; a folder stands in for its oldest post when moving forward in time
//! and for its newest post when moving backward.

use std::time::SystemTime;

use crate::error::SiteError;
use crate::page::{Page, sort_pages};
use crate::registry::builtin;

/// Direction of travel in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Newer,
    Older,
}

impl Direction {
    fn admits(self, candidate: SystemTime, reference: SystemTime) -> bool {
        match self {
            Self::Newer => candidate > reference,
            Self::Older => candidate < reference,
        }
    }
}

impl<'s> Page<'s> {
    /// The post published right after this one, if any.
    pub fn next_newer(&self) -> Result<Option<Page<'s>>, SiteError> {
        self.adjacent_post(Direction::Newer)
    }

    /// The post published right before this one, if any.
    pub fn next_older(&self) -> Result<Option<Page<'s>>, SiteError> {
        self.adjacent_post(Direction::Older)
    }

    /// Nearest post in `direction`. `None` for pages that are not posts or
    /// whose parent is not a folder.
    pub fn adjacent_post(&self, direction: Direction) -> Result<Option<Page<'s>>, SiteError> {
        if !self.is_a(builtin::POST) {
            return Ok(None);
        }
        let Some(reference) = self.pubtime() else {
            return Ok(None);
        };

        let mut left = self.path().to_owned();
        let mut level = self.parent()?;
        while let Some(folder) = level {
            if !folder.is_a(builtin::FOLDER) {
                return Ok(None);
            }

            if let Some(candidate) = closest(&folder, &left, reference, direction) {
                if candidate.is_a(builtin::POST) {
                    return Ok(Some(candidate));
                }
                return Ok(edge_post(&candidate, direction));
            }

            left = folder.path().to_owned();
            level = match folder.parent() {
                Ok(parent) => parent,
                Err(e) => {
                    tracing::debug!(folder = %folder.path(), error = %e, "Stopping traversal at unresolvable parent");
                    None
                }
            };
        }
        Ok(None)
    }
}

/// Closest child of `folder` in `direction`, skipping the entry at `left`.
fn closest<'s>(
    folder: &Page<'s>,
    left: &str,
    reference: SystemTime,
    direction: Direction,
) -> Option<Page<'s>> {
    let children = match folder.children() {
        Ok(children) => children,
        Err(e) => {
            tracing::debug!(folder = %folder.path(), error = %e, "Skipping unreadable folder");
            return None;
        }
    };

    let mut candidates: Vec<Page<'s>> = children
        .into_iter()
        .filter(|child| child.path() != left)
        .filter(|child| child.is_a(builtin::POST) || child.has_posts())
        .filter(|child| {
            child
                .pubtime()
                .is_some_and(|t| direction.admits(t, reference))
        })
        .collect();

    // Newest first: the closest older candidate is first, the closest newer
    // one is last.
    sort_pages(&mut candidates);
    match direction {
        Direction::Older => candidates.into_iter().next(),
        Direction::Newer => candidates.pop(),
    }
}

/// The post a folder stands in for.
fn edge_post<'s>(folder: &Page<'s>, direction: Direction) -> Option<Page<'s>> {
    let mut posts = match folder.posts() {
        Ok(posts) => posts,
        Err(e) => {
            tracing::debug!(folder = %folder.path(), error = %e, "Skipping unreadable folder");
            return None;
        }
    };
    match direction {
        Direction::Older => posts.into_iter().next(),
        Direction::Newer => posts.pop(),
    }
}
