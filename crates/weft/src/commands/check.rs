//! `weft check` command implementation.

use clap::Args;
use weft_site::registry::builtin;
use weft_site::{Page, Site};

use super::SiteArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the check command.
#[derive(Args)]
pub(crate) struct CheckArgs {
    #[command(flatten)]
    site: SiteArgs,
}

impl CheckArgs {
    /// Walk the site and list every page that would fail to render.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let site = self.site.open()?;
        output.info(&format!("Checking {}", site.root().display()));

        let entries = site.scan();
        let mut problems = 0;
        for entry in &entries {
            let issue = match &entry.page {
                Err(e) => Some(e.to_string()),
                Ok(page) => page_problem(&site, page),
            };
            if let Some(issue) = issue {
                output.item(&entry.path, &issue);
                problems += 1;
            }
        }

        if problems > 0 {
            output.warning(&format!("{} page(s) checked", entries.len()));
            return Err(CliError::Problems(problems));
        }
        output.success(&format!("{} page(s) checked, no problems", entries.len()));
        Ok(())
    }
}

fn page_problem(site: &Site, page: &Page<'_>) -> Option<String> {
    if page.is_a(builtin::IGNORE) {
        return None;
    }
    if site.template_for(page.page_type()).is_none() {
        return Some(format!(
            "no template for page type `{}`",
            page.page_type().name()
        ));
    }
    if page.is_a(builtin::ABSTRACT_FEED) {
        return page.feed_items().err().map(|e| e.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;
    use weft_site::SiteOptions;

    #[test]
    fn test_page_problems() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("site");
        let templates = temp_dir.path().join("templates");
        fs::create_dir_all(root.join("feed")).unwrap();
        fs::create_dir_all(root.join("drafts")).unwrap();
        fs::create_dir_all(templates.join("blog")).unwrap();
        fs::write(root.join("feed/=page-type"), "Blog::RSSFeed").unwrap();
        fs::write(root.join("drafts/=page-type"), "Ignore").unwrap();
        fs::write(templates.join("plain_page.html"), "").unwrap();
        fs::write(templates.join("blog/rss_feed.xml"), "").unwrap();
        let site = Site::new(SiteOptions::new(&root)).unwrap();

        let root_page = site.page_for("/").unwrap();
        assert_eq!(page_problem(&site, &root_page), None);
        let drafts = site.page_for("/drafts/").unwrap();
        assert_eq!(page_problem(&site, &drafts), None);
        let feed = site.page_for("/feed/").unwrap();
        let problem = page_problem(&site, &feed).unwrap();
        assert!(problem.contains("/feed/"), "got: {problem}");

        fs::remove_file(templates.join("blog/rss_feed.xml")).unwrap();
        let problem = page_problem(&site, &feed).unwrap();
        assert!(problem.contains("Blog::RSSFeed"), "got: {problem}");
    }
}
