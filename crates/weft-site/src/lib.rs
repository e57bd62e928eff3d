//! Page tree, page types, templates and category index for weft.
//!
//! weft serves a directory tree as a website. Every directory under the site
//! root is a page; what kind of page it is (plain page, blog post, feed,
//! category, ...) comes from marker files in the tree or from a rule list.
//! The page type decides which `@attribute` files are read, which extra data
//! (posts, comments, categories) is available, and which template renders it.
//!
//! This crate provides:
//! - [`Site`]: page lookup, template and layout selection, render planning
//! - [`Page`]: lazily-read attributes, children, parent, and per-type data
//! - [`PageTypeRegistry`]: the built-in type hierarchy plus user-defined types
//! - [`PathMapper`]: URL-space to filesystem mapping that never leaves the root
//!
//! # Quick Start
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use weft_site::{Site, SiteOptions};
//!
//! let site = Site::new(SiteOptions::new("site"))?;
//! let page = site.page_for("/blog/hello")?;
//! let template = site.template_for(page.page_type());
//! let next = page.next_newer()?;
//! # Ok(())
//! # }
//! ```

mod blog;
mod category;
mod error;
mod page;
pub mod paths;
pub mod registry;
mod render;
mod resolver;
pub mod rules;
mod scan;
pub mod sidecar;
mod site;
pub mod template;
mod traversal;

#[cfg(test)]
mod test_support;

pub use blog::DEFAULT_FEED_SOURCE;
pub use category::Reconciliation;
pub use error::{ErrorKind, InvalidTypeReason, SiteError};
pub use page::{Page, sort_pages};
pub use paths::PathMapper;
pub use registry::{AttributeDef, Mixin, PageType, PageTypeDef, PageTypeRegistry, RegistryError};
pub use render::{
    PageContext, PageSummary, RenderContext, RenderFailure, RenderRequest, RenderedPage, Renderer,
    SiteContext,
};
pub use resolver::{DeclarationSource, TypeDeclaration, TypeSource};
pub use scan::ScanEntry;
pub use site::{DEFAULT_TEMPLATE_DIR, Site, SiteOptions};
pub use template::{FsTemplateStore, TemplateStore};
pub use traversal::Direction;
