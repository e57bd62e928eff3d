//! `weft reindex` command implementation.

use clap::Args;
use weft_site::Site;

use super::SiteArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the reindex command.
#[derive(Args)]
pub(crate) struct ReindexArgs {
    #[command(flatten)]
    site: SiteArgs,

    /// Reconcile every categorized page, not only those whose snapshot is stale.
    #[arg(short, long)]
    force: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Totals {
    reconciled: usize,
    added: usize,
    removed: usize,
    categories: usize,
    members: usize,
    failed: usize,
}

impl ReindexArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let site = self.site.open()?;
        let totals = reindex(&site, self.force, &output);

        output.success(&format!(
            "Reconciled {} page(s): {} addition(s), {} removal(s)",
            totals.reconciled, totals.added, totals.removed
        ));
        output.info(&format!(
            "{} categor(ies) with {} member(s)",
            totals.categories, totals.members
        ));
        if totals.failed > 0 {
            output.warning(&format!("{} page(s) could not be reindexed", totals.failed));
        }
        Ok(())
    }
}

/// Reconcile categorized pages first so that the member lists read
/// afterwards are current; reading them also drops dead entries.
fn reindex(site: &Site, force: bool, output: &Output) -> Totals {
    let mut totals = Totals::default();
    let entries = site.scan();

    for page in entries.iter().filter_map(|e| e.page.as_ref().ok()) {
        if !page.is_categorized() || !(force || page.categories_stale()) {
            continue;
        }
        match page.reconcile_categories() {
            Ok(change) => {
                totals.reconciled += 1;
                totals.added += change.added_to.len();
                totals.removed += change.removed_from.len();
            }
            Err(e) => {
                output.item(page.path(), &e.to_string());
                totals.failed += 1;
            }
        }
    }

    for page in entries.iter().filter_map(|e| e.page.as_ref().ok()) {
        if !page.is_category() {
            continue;
        }
        match page.members() {
            Ok(members) => {
                totals.categories += 1;
                totals.members += members.len();
            }
            Err(e) => {
                output.item(page.path(), &e.to_string());
                totals.failed += 1;
            }
        }
    }
    totals
}
