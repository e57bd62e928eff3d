//! Site: root directory, templates, page types, and page lookup.
//!
//! A [`Site`] is built once and then shared. Everything it holds is immutable
//! except the rule list cache, which sits behind a mutex, so a `Site` can be
//! handed to many request threads at once. The [`Page`]s it creates borrow it
//! and live only as long as the request that asked for them.
//!
//! # Example
//!
//! ```ignore
//! use weft_site::{Site, SiteOptions};
//!
//! let site = Site::new(SiteOptions::new("site"))?;
//! let page = site.page_for("/blog/hello")?;
//! let template = site.template_for(page.page_type());
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{InvalidTypeReason, SiteError};
use crate::page::Page;
use crate::paths::{self, PathMapper};
use crate::registry::{PageType, PageTypeDef, PageTypeRegistry, RegistryError, builtin};
use crate::resolver::{TypeDeclaration, TypeResolver, TypeSource};
use crate::sidecar;
use crate::template::{self, FsTemplateStore, LAYOUT_PREFIX, TemplateStore};

/// Directory name used for templates when none is configured.
pub const DEFAULT_TEMPLATE_DIR: &str = "templates";

/// Options for building a [`Site`].
#[derive(Clone, Debug)]
pub struct SiteOptions {
    /// Root of the content tree.
    pub root: PathBuf,
    /// Template directory.
    ///
    /// If `None`, `templates` next to the root is used.
    pub templates: Option<PathBuf>,
    /// Where page type declarations come from.
    pub type_source: TypeSource,
    /// Type used when nothing declares one.
    pub default_type: String,
    /// Additional page types, registered in order after the built-ins.
    pub page_types: Vec<PageTypeDef>,
}

impl SiteOptions {
    /// Options with defaults for everything but the root.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            templates: None,
            type_source: TypeSource::Markers,
            default_type: builtin::PLAIN_PAGE.to_owned(),
            page_types: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_templates(mut self, dir: impl Into<PathBuf>) -> Self {
        self.templates = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_type_source(mut self, source: TypeSource) -> Self {
        self.type_source = source;
        self
    }

    #[must_use]
    pub fn with_default_type(mut self, name: impl Into<String>) -> Self {
        self.default_type = name.into();
        self
    }

    #[must_use]
    pub fn with_page_type(mut self, def: PageTypeDef) -> Self {
        self.page_types.push(def);
        self
    }
}

/// A content tree and everything needed to turn its directories into pages.
pub struct Site {
    mapper: PathMapper,
    template_dir: PathBuf,
    templates: Box<dyn TemplateStore>,
    registry: PageTypeRegistry,
    resolver: TypeResolver,
    default_type: String,
}

impl Site {
    /// Build a site, registering any additional page types.
    pub fn new(options: SiteOptions) -> Result<Self, RegistryError> {
        let mapper = PathMapper::new(options.root);
        let template_dir = options.templates.unwrap_or_else(|| {
            mapper
                .root()
                .parent()
                .unwrap_or_else(|| mapper.root())
                .join(DEFAULT_TEMPLATE_DIR)
        });

        let mut registry = PageTypeRegistry::builtin();
        for def in options.page_types {
            registry.register(def)?;
        }

        tracing::debug!(
            root = %mapper.root().display(),
            templates = %template_dir.display(),
            "Site created"
        );

        Ok(Self {
            templates: Box::new(FsTemplateStore::new(&template_dir)),
            template_dir,
            mapper,
            registry,
            resolver: TypeResolver::new(options.type_source),
            default_type: options.default_type,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        self.mapper.root()
    }

    #[must_use]
    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }

    #[must_use]
    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    #[must_use]
    pub fn registry(&self) -> &PageTypeRegistry {
        &self.registry
    }

    #[must_use]
    pub fn templates(&self) -> &dyn TemplateStore {
        self.templates.as_ref()
    }

    /// Type name used when nothing else declares one.
    #[must_use]
    pub fn default_type(&self) -> &str {
        &self.default_type
    }

    /// Where the page type for `url` is declared, without validating it.
    pub fn declaration_for(&self, url: &str) -> Result<TypeDeclaration, SiteError> {
        self.resolver.resolve(&self.mapper, url, &self.default_type)
    }

    /// The page at `url`.
    ///
    /// # Errors
    ///
    /// - [`SiteError::NotFound`] / [`SiteError::Forbidden`] when the
    ///   directory is missing, not a directory, or not accessible. This is
    ///   checked before any type declaration is read.
    /// - [`SiteError::InvalidPageType`] when the declared type is unknown,
    ///   not instantiable, or rejects the page.
    /// - [`SiteError::TypeRules`] when the rule list cannot be loaded.
    pub fn page_for(&self, url: &str) -> Result<Page<'_>, SiteError> {
        let path = paths::as_directory(url);
        let fs_path = self.mapper.url_to_fs(&path);

        let meta = fs::metadata(&fs_path).map_err(|e| SiteError::io(e, &path))?;
        if !meta.is_dir() {
            return Err(SiteError::NotFound { path });
        }

        let declaration = self.declaration_for(&path)?;
        let invalid = |reason: InvalidTypeReason| SiteError::InvalidPageType {
            type_name: declaration.type_name.clone(),
            path: path.clone(),
            reason,
            declared_in: declaration.source.clone(),
        };

        let page_type = self.registry.lookup(&declaration.type_name).map_err(invalid)?;
        if let Some(missing) = missing_required(&page_type, &fs_path) {
            return Err(invalid(InvalidTypeReason::Rejected(format!(
                "required attribute file `@{missing}` is missing"
            ))));
        }

        Ok(Page::new(self, path, fs_path, page_type, declaration))
    }

    /// Template for pages of `page_type`, or `None` if neither the hierarchy
    /// nor `default` has one.
    #[must_use]
    pub fn template_for(&self, page_type: &PageType) -> Option<String> {
        template::resolve(page_type, "", self.templates.as_ref())
    }

    /// Layout for pages of `page_type`; optional.
    #[must_use]
    pub fn layout_for(&self, page_type: &PageType) -> Option<String> {
        template::resolve(page_type, LAYOUT_PREFIX, self.templates.as_ref())
    }

    /// Look up a page type by name, abstract ones included.
    #[must_use]
    pub fn page_type(&self, name: &str) -> Option<Arc<PageType>> {
        self.registry.get(name)
    }
}

fn missing_required<'t>(page_type: &'t PageType, dir: &Path) -> Option<&'t str> {
    page_type
        .required()
        .iter()
        .find(|name| !sidecar::attribute_path(dir, name).is_file())
        .map(String::as_str)
}

impl fmt::Debug for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Site")
            .field("root", &self.mapper.root())
            .field("template_dir", &self.template_dir)
            .field("default_type", &self.default_type)
            .finish_non_exhaustive()
    }
}
