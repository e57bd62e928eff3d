//! Render planning and the renderer seam.
//!
//! The template engine is not part of this crate. [`Site::plan`] works out
//! what a page needs (template, optional layout, content type, data context)
//! and [`Site::render`] hands that to a [`Renderer`]. Contexts are plain JSON
//! so any engine can consume them.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;

use crate::error::{ErrorKind, SiteError};
use crate::page::Page;
use crate::registry::{DEFAULT_CONTENT_TYPE, builtin};
use crate::resolver::TypeDeclaration;
use crate::site::Site;

/// Everything a renderer needs to produce a page.
#[derive(Debug, Clone, Serialize)]
pub struct RenderRequest {
    /// Template name (`blog/post`).
    pub template: String,
    /// File backing the template.
    pub template_file: PathBuf,
    /// Layout name, if any (`layouts/default`).
    pub layout: Option<String>,
    /// File backing the layout.
    pub layout_file: Option<PathBuf>,
    /// Content type of the response.
    pub content_type: String,
    /// Data available to the template.
    pub context: Value,
}

/// A renderer-side failure, located in a template when possible.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct RenderFailure {
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
    pub message: String,
}

/// External template engine.
pub trait Renderer {
    fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderFailure>;
}

/// Output of a successful render.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub content_type: String,
    pub template: String,
    pub layout: Option<String>,
    pub body: Vec<u8>,
}

/// Short description of a related page.
#[derive(Debug, Clone, Serialize)]
pub struct PageSummary {
    pub path: String,
    #[serde(rename = "type")]
    pub page_type: String,
    pub title: Option<String>,
    /// Publication time in seconds since the epoch, for newest-first pages.
    pub pubtime: Option<u64>,
}

impl PageSummary {
    #[must_use]
    pub fn of(page: &Page<'_>) -> Self {
        Self {
            path: page.path().to_owned(),
            page_type: page.page_type().name().to_owned(),
            title: page.attribute("title"),
            pubtime: page.pubtime().and_then(unix_seconds),
        }
    }
}

fn unix_seconds(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

fn summaries(pages: &[Page<'_>]) -> Vec<PageSummary> {
    pages.iter().map(PageSummary::of).collect()
}

/// Template data for one page.
///
/// Capability fields are present only for pages that have the capability
/// (e.g. `posts` for folders, `members` for categories).
#[derive(Debug, Clone, Serialize)]
pub struct PageContext {
    pub path: String,
    #[serde(rename = "type")]
    pub page_type: String,
    pub content_type: String,
    pub declaration: TypeDeclaration,
    pub attributes: BTreeMap<String, Option<String>>,
    pub mtime: Option<u64>,
    pub pubtime: Option<u64>,
    pub parent: Option<PageSummary>,
    pub children: Vec<PageSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<PageSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<PageSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posts: Option<Vec<PageSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<PageSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<PageSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_newer: Option<PageSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_older: Option<PageSummary>,
}

impl PageContext {
    /// Gather the page's data, including capability-specific collections.
    ///
    /// Failures of the page itself propagate; failures of related pages are
    /// skipped inside the page methods.
    pub fn of(page: &Page<'_>) -> Result<Self, SiteError> {
        let parent = page.parent().ok().flatten();
        let mut context = Self {
            path: page.path().to_owned(),
            page_type: page.page_type().name().to_owned(),
            content_type: page.content_type().to_owned(),
            declaration: page.declaration().clone(),
            attributes: page.attributes(),
            mtime: page.mtime().and_then(unix_seconds),
            pubtime: page.pubtime().and_then(unix_seconds),
            parent: parent.as_ref().map(PageSummary::of),
            children: summaries(&page.children()?),
            categories: None,
            members: None,
            posts: None,
            comments: None,
            items: None,
            next_newer: None,
            next_older: None,
        };

        if page.is_categorized() {
            context.categories = Some(summaries(&page.categories()?));
        }
        if page.is_category() {
            context.members = Some(summaries(&page.members()?));
        }
        if page.is_a(builtin::FOLDER) {
            context.posts = Some(summaries(&page.posts()?));
        }
        if page.is_a(builtin::POST) {
            context.comments = Some(summaries(&page.comments()?));
            context.next_newer = page.next_newer()?.as_ref().map(PageSummary::of);
            context.next_older = page.next_older()?.as_ref().map(PageSummary::of);
        }
        if page.is_a(builtin::ABSTRACT_FEED) {
            context.items = Some(summaries(&page.feed_items()?));
        }
        Ok(context)
    }
}

/// Site-wide template data.
#[derive(Debug, Clone, Serialize)]
pub struct SiteContext {
    pub root: PathBuf,
    pub template_dir: PathBuf,
}

/// Top-level context handed to page templates.
#[derive(Debug, Clone, Serialize)]
pub struct RenderContext {
    pub page: PageContext,
    pub site: SiteContext,
}

/// Context handed to error templates.
#[derive(Debug, Clone, Serialize)]
struct ErrorContext {
    error: ErrorSummary,
    site: SiteContext,
}

#[derive(Debug, Clone, Serialize)]
struct ErrorSummary {
    kind: ErrorKind,
    status: u16,
    title: String,
    message: String,
}

impl Site {
    fn site_context(&self) -> SiteContext {
        SiteContext {
            root: self.root().to_path_buf(),
            template_dir: self.template_dir().to_path_buf(),
        }
    }

    /// Work out how the page at `url` would be rendered.
    ///
    /// # Errors
    ///
    /// Page resolution errors, [`SiteError::NoTemplate`] when no template
    /// applies, and errors gathering the page's data.
    pub fn plan(&self, url: &str) -> Result<RenderRequest, SiteError> {
        let page = self.page_for(url)?;
        let page_type = page.page_type();

        let template = self
            .template_for(page_type)
            .ok_or_else(|| SiteError::NoTemplate {
                type_name: page_type.name().to_owned(),
            })?;
        let template_file = self
            .templates()
            .locate(&template)
            .unwrap_or_else(|| self.template_dir().join(&template));
        let layout = self.layout_for(page_type);
        let layout_file = layout.as_deref().and_then(|l| self.templates().locate(l));

        let context = RenderContext {
            page: PageContext::of(&page)?,
            site: self.site_context(),
        };

        Ok(RenderRequest {
            template,
            template_file,
            layout,
            layout_file,
            content_type: page.content_type().to_owned(),
            context: to_json(&context)?,
        })
    }

    /// Render the page at `url`.
    pub fn render(&self, url: &str, renderer: &dyn Renderer) -> Result<RenderedPage, SiteError> {
        let request = self.plan(url)?;
        self.run(renderer, request)
    }

    /// Template for an error page of `kind`, if the site provides one.
    #[must_use]
    pub fn error_template_for(&self, kind: ErrorKind) -> Option<String> {
        let name = kind.template_name();
        self.templates().exists(name).then(|| name.to_owned())
    }

    /// Render an error page for `error`.
    ///
    /// Returns `Ok(None)` when the site has no template for the error's kind;
    /// the caller then falls back to a plain response.
    pub fn render_error(
        &self,
        error: &SiteError,
        renderer: &dyn Renderer,
    ) -> Result<Option<RenderedPage>, SiteError> {
        let kind = error.kind();
        let Some(template) = self.error_template_for(kind) else {
            return Ok(None);
        };
        let template_file = self
            .templates()
            .locate(&template)
            .unwrap_or_else(|| self.template_dir().join(&template));

        let context = ErrorContext {
            error: ErrorSummary {
                kind,
                status: kind.status_code(),
                title: kind.to_string(),
                message: error.to_string(),
            },
            site: self.site_context(),
        };
        let request = RenderRequest {
            template,
            template_file,
            layout: None,
            layout_file: None,
            content_type: DEFAULT_CONTENT_TYPE.to_owned(),
            context: to_json(&context)?,
        };
        self.run(renderer, request).map(Some)
    }

    fn run(
        &self,
        renderer: &dyn Renderer,
        request: RenderRequest,
    ) -> Result<RenderedPage, SiteError> {
        let body = renderer
            .render(&request)
            .map_err(|failure| SiteError::Render {
                file: failure.file.as_deref().map(|f| self.mapper().fs_to_url(f)),
                line: failure.line,
                message: failure.message,
            })?;
        Ok(RenderedPage {
            content_type: request.content_type,
            template: request.template,
            layout: request.layout,
            body,
        })
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, SiteError> {
    serde_json::to_value(value).map_err(|e| SiteError::Render {
        file: None,
        line: None,
        message: format!("Failed to serialize template context: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::SiteOptions;
    use crate::test_support::{mark, mkdir, write};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    /// Echoes the template name and the page path.
    struct EchoRenderer;

    impl Renderer for EchoRenderer {
        fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderFailure> {
            let path = request.context["page"]["path"].as_str().unwrap_or("-");
            Ok(format!("{}:{path}", request.template).into_bytes())
        }
    }

    struct FailingRenderer;

    impl Renderer for FailingRenderer {
        fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderFailure> {
            Err(RenderFailure {
                file: Some(request.template_file.clone()),
                line: Some(7),
                message: "undefined variable `titel`".to_owned(),
            })
        }
    }

    fn site_with_templates() -> (TempDir, std::path::PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("site");
        mkdir(&root, "about");
        write(&root, "about/@title", "About\n");
        mark(&root, "blog", "=page-type", "Blog::Folder");
        mark(&root, "blog/hello", "=page-type", "Blog::Post");
        write(&root, "blog/hello/@title", "Hello");
        mark(&root, "blog/feed", "=page-type", "Blog::AtomFeed");
        write(temp_dir.path(), "templates/default.html", "");
        write(temp_dir.path(), "templates/blog/post.html", "");
        write(temp_dir.path(), "templates/layouts/default.html", "");
        write(temp_dir.path(), "templates/not_found.html", "");
        (temp_dir, root)
    }

    #[test]
    fn test_plan_plain_page() {
        let (temp_dir, root) = site_with_templates();
        let site = Site::new(SiteOptions::new(&root)).unwrap();

        let plan = site.plan("/about").unwrap();
        assert_eq!(plan.template, "default");
        assert_eq!(
            plan.template_file,
            temp_dir.path().join("templates/default.html")
        );
        assert_eq!(plan.layout.as_deref(), Some("layouts/default"));
        assert_eq!(plan.content_type, "text/html");
        assert_eq!(plan.context["page"]["attributes"]["title"], "About");
        assert_eq!(plan.context["page"]["type"], "PlainPage");
        assert!(plan.context["page"].get("posts").is_none());
    }

    #[test]
    fn test_plan_post_has_capabilities() {
        let (_temp_dir, root) = site_with_templates();
        let site = Site::new(SiteOptions::new(&root)).unwrap();

        let plan = site.plan("/blog/hello/").unwrap();
        assert_eq!(plan.template, "blog/post");
        let page = &plan.context["page"];
        assert_eq!(page["parent"]["path"], "/blog/");
        assert!(page["categories"].as_array().unwrap().is_empty());
        assert!(page["comments"].as_array().unwrap().is_empty());
        assert_eq!(page["declaration"]["source"]["kind"], "private_marker");
    }

    #[test]
    fn test_plan_folder_and_feed() {
        let (_temp_dir, root) = site_with_templates();
        let site = Site::new(SiteOptions::new(&root)).unwrap();

        let folder = site.plan("/blog/").unwrap();
        let posts = folder.context["page"]["posts"].as_array().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0]["title"], "Hello");

        let feed = site.plan("/blog/feed/").unwrap();
        assert_eq!(feed.content_type, "application/atom+xml");
        assert_eq!(feed.context["page"]["items"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_plan_without_templates() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("site");
        mkdir(&root, "about");
        let site = Site::new(SiteOptions::new(&root)).unwrap();

        let err = site.plan("/about/").unwrap_err();
        assert!(matches!(err, SiteError::NoTemplate { .. }));
        assert_eq!(err.kind(), ErrorKind::Misconfigured);
    }

    #[test]
    fn test_render_success() {
        let (_temp_dir, root) = site_with_templates();
        let site = Site::new(SiteOptions::new(&root)).unwrap();

        let page = site.render("/blog/hello", &EchoRenderer).unwrap();
        assert_eq!(page.body, b"blog/post:/blog/hello/");
        assert_eq!(page.layout.as_deref(), Some("layouts/default"));
    }

    #[test]
    fn test_render_failure_is_located() {
        let (_temp_dir, root) = site_with_templates();
        let site = Site::new(SiteOptions::new(&root)).unwrap();

        let err = site.render("/about", &FailingRenderer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Misconfigured);
        let message = err.to_string();
        assert!(message.contains("default.html`, line 7"), "{message}");
        assert!(message.ends_with("undefined variable `titel`"));
    }

    #[test]
    fn test_render_failure_inside_root_uses_url_path() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("site");
        mkdir(&root, "about");
        write(&root, "_templates/default.html", "");
        let site = Site::new(SiteOptions::new(&root).with_templates(root.join("_templates")))
            .unwrap();

        let err = site.render("/about", &FailingRenderer).unwrap_err();
        assert_eq!(
            err.to_string(),
            "In `/_templates/default.html`, line 7: undefined variable `titel`"
        );
    }

    #[test]
    fn test_error_templates() {
        let (_temp_dir, root) = site_with_templates();
        let site = Site::new(SiteOptions::new(&root)).unwrap();

        assert_eq!(
            site.error_template_for(ErrorKind::NotFound).as_deref(),
            Some("not_found")
        );
        assert_eq!(site.error_template_for(ErrorKind::Forbidden), None);

        let err = site.page_for("/missing").unwrap_err();
        let page = site.render_error(&err, &EchoRenderer).unwrap().unwrap();
        assert_eq!(page.template, "not_found");
        assert_eq!(page.body, b"not_found:-");

        let forbidden = SiteError::Forbidden {
            path: "/secret/".to_owned(),
        };
        assert!(site.render_error(&forbidden, &EchoRenderer).unwrap().is_none());
    }
}
