//! `weft inspect` command implementation.

use clap::Args;
use console::Term;
use serde::Serialize;
use weft_site::{RenderRequest, TypeDeclaration};

use super::SiteArgs;
use crate::error::CliError;

/// Arguments for the inspect command.
#[derive(Args)]
pub(crate) struct InspectArgs {
    /// URL path of the page (e.g. `/blog/2024/hello/`).
    url: String,

    #[command(flatten)]
    site: SiteArgs,

    /// Print compact JSON instead of pretty-printed.
    #[arg(long)]
    compact: bool,
}

#[derive(Serialize)]
struct Inspection<'a> {
    path: &'a str,
    page_type: &'a str,
    declaration: &'a TypeDeclaration,
    #[serde(flatten)]
    plan: RenderRequest,
}

impl InspectArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let site = self.site.open()?;
        let page = site.page_for(&self.url)?;
        let plan = site.plan(page.path())?;

        let inspection = Inspection {
            path: page.path(),
            page_type: page.page_type().name(),
            declaration: page.declaration(),
            plan,
        };
        let json = if self.compact {
            serde_json::to_string(&inspection)?
        } else {
            serde_json::to_string_pretty(&inspection)?
        };
        Term::stdout().write_line(&json)?;
        Ok(())
    }
}
