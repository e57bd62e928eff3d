//! Whole-tree walking.
//!
//! Unlike [`Page::children`], a scan reports pages that fail to resolve
//! instead of skipping them, so tooling can list every problem in a site.
//! Directories with reserved names are not visited and `Ignore` pages are
//! not descended into.

use std::fs;
use std::path::Path;

use crate::error::SiteError;
use crate::page::Page;
use crate::registry::builtin;
use crate::sidecar;
use crate::site::Site;

/// One visited directory.
#[derive(Debug)]
pub struct ScanEntry<'s> {
    /// URL path in directory form.
    pub path: String,
    /// The page, or why it could not be resolved.
    pub page: Result<Page<'s>, SiteError>,
}

impl Site {
    /// Visit every page directory under the root, parents before children,
    /// siblings in name order.
    ///
    /// Returns an empty list if the root does not exist.
    #[must_use]
    pub fn scan(&self) -> Vec<ScanEntry<'_>> {
        let mut entries = Vec::new();
        if self.root().is_dir() {
            self.scan_directory(self.root(), "/", &mut entries);
        }
        entries
    }

    fn scan_directory<'s>(&'s self, dir: &Path, url_path: &str, out: &mut Vec<ScanEntry<'s>>) {
        let page = self.page_for(url_path);
        let descend = !matches!(&page, Ok(p) if p.is_a(builtin::IGNORE));
        out.push(ScanEntry {
            path: url_path.to_owned(),
            page,
        });
        if !descend {
            return;
        }

        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        let mut subdirs: Vec<(String, std::path::PathBuf)> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .filter_map(|e| {
                let name = e.file_name().to_str()?.to_owned();
                (!sidecar::is_reserved(&name)).then(|| (name, e.path()))
            })
            .collect();
        subdirs.sort();

        for (name, path) in subdirs {
            self.scan_directory(&path, &format!("{url_path}{name}/"), out);
        }
    }
}
