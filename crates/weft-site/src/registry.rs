//! Registry of page types.
//!
//! Page types form a single-inheritance hierarchy rooted at the abstract
//! [`builtin::ROOT`]. Each type carries a content type, a table of file-backed
//! attributes with defaults, a set of [`Mixin`]s, and a list of attributes its
//! constructor requires. A registered type inherits all of these from its
//! ancestors; redeclaring an attribute overrides only its default.
//!
//! Besides types, the registry knows two other kinds of names so that a
//! declaration naming them can be rejected with a precise reason: mixins
//! (`Categorized`, `NewestFirst`) and namespaces (`Blog`).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use crate::error::InvalidTypeReason;
use crate::sidecar::CATEGORIES_ATTRIBUTE;

/// Optional namespace prefix accepted in front of any type name.
pub const NAMESPACE_PREFIX: &str = "PageTypes::";

/// Content type of pages whose type does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "text/html";

/// Names of the built-in page types.
pub mod builtin {
    /// Abstract root of the hierarchy.
    pub const ROOT: &str = "AbstractPage";
    pub const BASE: &str = "Base";
    pub const PLAIN_PAGE: &str = "PlainPage";
    pub const FRONT_PAGE: &str = "FrontPage";
    pub const CATEGORY: &str = "Category";
    /// Marks a directory as not being a page at all.
    pub const IGNORE: &str = "Ignore";
    pub const POST: &str = "Blog::Post";
    pub const FOLDER: &str = "Blog::Folder";
    pub const COMMENT: &str = "Blog::Comment";
    pub const ABSTRACT_FEED: &str = "Blog::AbstractFeed";
    pub const RSS_FEED: &str = "Blog::RSSFeed";
    pub const ATOM_FEED: &str = "Blog::AtomFeed";
    /// Namespace holding the blog types.
    pub const BLOG_NAMESPACE: &str = "Blog";
}

/// Behaviour shared across otherwise unrelated page types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mixin {
    /// Page belongs to categories listed in its `@categories` file.
    ///
    /// Implies a `categories` attribute defaulting to the empty list.
    Categorized,
    /// Page sorts by publication time, newest first.
    NewestFirst,
}

impl Mixin {
    /// Registered name of the mixin.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Categorized => "Categorized",
            Self::NewestFirst => "NewestFirst",
        }
    }
}

impl fmt::Display for Mixin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mixin {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match canonical_name(s) {
            "Categorized" | "categorized" => Ok(Self::Categorized),
            "NewestFirst" | "newest_first" => Ok(Self::NewestFirst),
            other => Err(RegistryError::UnknownMixin(other.to_owned())),
        }
    }
}

/// A file-backed attribute and its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeDef {
    /// Attribute name; the sidecar file is `@<name>`.
    pub name: String,
    /// Value used when the sidecar file is absent or unreadable.
    pub default: Option<String>,
}

/// Declarative description of a page type, before registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTypeDef {
    pub name: String,
    pub parent: Option<String>,
    pub instantiable: bool,
    pub content_type: Option<String>,
    pub attributes: Vec<AttributeDef>,
    pub mixins: Vec<Mixin>,
    pub required: Vec<String>,
}

impl PageTypeDef {
    /// Start an instantiable type with the given parent.
    #[must_use]
    pub fn new(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: Some(parent.into()),
            instantiable: true,
            content_type: None,
            attributes: Vec::new(),
            mixins: Vec::new(),
            required: Vec::new(),
        }
    }

    /// Mark the type as abstract.
    #[must_use]
    pub fn abstract_type(mut self) -> Self {
        self.instantiable = false;
        self
    }

    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Declare an attribute without a default.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.attributes.push(AttributeDef {
            name: name.into(),
            default: None,
        });
        self
    }

    /// Declare an attribute with a default value.
    #[must_use]
    pub fn attribute_with_default(
        mut self,
        name: impl Into<String>,
        default: impl Into<String>,
    ) -> Self {
        self.attributes.push(AttributeDef {
            name: name.into(),
            default: Some(default.into()),
        });
        self
    }

    #[must_use]
    pub fn mixin(mut self, mixin: Mixin) -> Self {
        self.mixins.push(mixin);
        self
    }

    /// Require the `@<name>` file to exist for a page of this type.
    #[must_use]
    pub fn require(mut self, name: impl Into<String>) -> Self {
        self.required.push(name.into());
        self
    }
}

/// A registered page type with its ancestry merged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageType {
    name: String,
    lineage: Vec<String>,
    instantiable: bool,
    content_type: String,
    attributes: Vec<AttributeDef>,
    mixins: Vec<Mixin>,
    required: Vec<String>,
}

impl PageType {
    /// Canonical type name (without namespace prefix).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type names from this type up to the root, inclusive.
    pub fn lineage(&self) -> impl Iterator<Item = &str> {
        self.lineage.iter().map(String::as_str)
    }

    /// Name of the direct supertype.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.lineage.get(1).map(String::as_str)
    }

    #[must_use]
    pub fn is_instantiable(&self) -> bool {
        self.instantiable
    }

    /// Whether this type is `name` or descends from it.
    #[must_use]
    pub fn is_a(&self, name: &str) -> bool {
        let name = canonical_name(name);
        self.lineage.iter().any(|n| n == name)
    }

    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// All declared attributes, ancestors' first.
    #[must_use]
    pub fn attributes(&self) -> &[AttributeDef] {
        &self.attributes
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }

    #[must_use]
    pub fn has_mixin(&self, mixin: Mixin) -> bool {
        self.mixins.contains(&mixin)
    }

    #[must_use]
    pub fn mixins(&self) -> &[Mixin] {
        &self.mixins
    }

    /// Attributes whose sidecar file must exist.
    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.required
    }
}

/// Errors from registering page types.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Page type `{0}` is already registered")]
    Duplicate(String),

    #[error("Page type `{name}` names unknown parent `{parent}`")]
    UnknownParent { name: String, parent: String },

    #[error("Page type `{name}` cannot descend from `{parent}`, which is not a page type")]
    InvalidParent { name: String, parent: String },

    #[error("Unknown mixin `{0}`")]
    UnknownMixin(String),

    #[error("Page type name must not be empty")]
    EmptyName,
}

#[derive(Debug, Clone)]
enum Entry {
    Type(Arc<PageType>),
    Mixin,
    Namespace,
}

/// Name-indexed set of page types, mixins, and namespaces.
#[derive(Debug, Clone)]
pub struct PageTypeRegistry {
    entries: HashMap<String, Entry>,
}

impl PageTypeRegistry {
    /// Registry containing only the abstract root.
    #[must_use]
    pub fn empty() -> Self {
        let root = PageType {
            name: builtin::ROOT.to_owned(),
            lineage: vec![builtin::ROOT.to_owned()],
            instantiable: false,
            content_type: DEFAULT_CONTENT_TYPE.to_owned(),
            attributes: Vec::new(),
            mixins: Vec::new(),
            required: Vec::new(),
        };
        let mut entries = HashMap::new();
        entries.insert(builtin::ROOT.to_owned(), Entry::Type(Arc::new(root)));
        for mixin in [Mixin::Categorized, Mixin::NewestFirst] {
            entries.insert(mixin.name().to_owned(), Entry::Mixin);
        }
        Self { entries }
    }

    /// Registry with the built-in page and blog types.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.add_namespace(builtin::BLOG_NAMESPACE);

        let defs = [
            PageTypeDef::new(builtin::BASE, builtin::ROOT),
            PageTypeDef::new(builtin::IGNORE, builtin::BASE),
            PageTypeDef::new(builtin::PLAIN_PAGE, builtin::BASE)
                .attribute("title")
                .attribute("content"),
            PageTypeDef::new(builtin::FRONT_PAGE, builtin::PLAIN_PAGE),
            PageTypeDef::new(builtin::CATEGORY, builtin::PLAIN_PAGE),
            PageTypeDef::new(builtin::POST, builtin::PLAIN_PAGE)
                .attribute("summary")
                .mixin(Mixin::Categorized)
                .mixin(Mixin::NewestFirst),
            PageTypeDef::new(builtin::FOLDER, builtin::PLAIN_PAGE).mixin(Mixin::NewestFirst),
            PageTypeDef::new(builtin::COMMENT, builtin::PLAIN_PAGE)
                .attribute("sender_name")
                .attribute("sender_email")
                .mixin(Mixin::NewestFirst),
            PageTypeDef::new(builtin::ABSTRACT_FEED, builtin::BASE)
                .abstract_type()
                .attribute_with_default("source", ".."),
            PageTypeDef::new(builtin::RSS_FEED, builtin::ABSTRACT_FEED)
                .content_type("application/rss+xml"),
            PageTypeDef::new(builtin::ATOM_FEED, builtin::ABSTRACT_FEED)
                .content_type("application/atom+xml"),
        ];
        for def in defs {
            // Built-in definitions are ordered parent-first and use unique names.
            if let Err(e) = registry.register(def) {
                tracing::error!(error = %e, "Failed to register built-in page type");
            }
        }
        registry
    }

    /// Reserve a namespace name (e.g. `Blog`) so that it is reported as
    /// non-instantiable rather than unknown.
    pub fn add_namespace(&mut self, name: &str) {
        self.entries
            .entry(canonical_name(name).to_owned())
            .or_insert(Entry::Namespace);
    }

    /// Register a page type under an existing parent.
    ///
    /// Namespaced names (`Shop::Product`) reserve their namespace.
    pub fn register(&mut self, def: PageTypeDef) -> Result<Arc<PageType>, RegistryError> {
        let name = canonical_name(&def.name).to_owned();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.entries.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }

        let parent_name = canonical_name(def.parent.as_deref().unwrap_or(builtin::ROOT)).to_owned();
        let parent = match self.entries.get(&parent_name) {
            Some(Entry::Type(parent)) => Arc::clone(parent),
            Some(Entry::Mixin | Entry::Namespace) => {
                return Err(RegistryError::InvalidParent {
                    name,
                    parent: parent_name,
                });
            }
            None => {
                return Err(RegistryError::UnknownParent {
                    name,
                    parent: parent_name,
                });
            }
        };

        let mut lineage = Vec::with_capacity(parent.lineage.len() + 1);
        lineage.push(name.clone());
        lineage.extend(parent.lineage.iter().cloned());

        let mut attributes = parent.attributes.clone();
        for attr in def.attributes {
            match attributes.iter_mut().find(|a| a.name == attr.name) {
                Some(existing) => existing.default = attr.default,
                None => attributes.push(attr),
            }
        }

        let mut mixins = parent.mixins.clone();
        for mixin in def.mixins {
            if !mixins.contains(&mixin) {
                mixins.push(mixin);
            }
        }
        if mixins.contains(&Mixin::Categorized)
            && !attributes.iter().any(|a| a.name == CATEGORIES_ATTRIBUTE)
        {
            attributes.push(AttributeDef {
                name: CATEGORIES_ATTRIBUTE.to_owned(),
                default: Some(String::new()),
            });
        }

        let mut required = parent.required.clone();
        for attr in def.required {
            if !required.contains(&attr) {
                required.push(attr);
            }
        }

        let page_type = Arc::new(PageType {
            name: name.clone(),
            lineage,
            instantiable: def.instantiable,
            content_type: def
                .content_type
                .unwrap_or_else(|| parent.content_type.clone()),
            attributes,
            mixins,
            required,
        });

        if let Some((namespace, _)) = name.rsplit_once("::") {
            self.add_namespace(namespace);
        }
        self.entries
            .insert(name, Entry::Type(Arc::clone(&page_type)));
        Ok(page_type)
    }

    /// Look up an instantiable page type.
    pub fn lookup(&self, name: &str) -> Result<Arc<PageType>, InvalidTypeReason> {
        match self.entries.get(canonical_name(name)) {
            Some(Entry::Type(ty)) if ty.instantiable => Ok(Arc::clone(ty)),
            Some(_) => Err(InvalidTypeReason::NotInstantiable),
            None => Err(InvalidTypeReason::Unknown),
        }
    }

    /// Look up any page type, abstract ones included.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<PageType>> {
        match self.entries.get(canonical_name(name)) {
            Some(Entry::Type(ty)) => Some(Arc::clone(ty)),
            _ => None,
        }
    }

    /// Names of all registered page types, sorted.
    #[must_use]
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .entries
            .iter()
            .filter(|(_, entry)| matches!(entry, Entry::Type(_)))
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

impl Default for PageTypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Strip surrounding whitespace and the optional namespace prefix.
#[must_use]
pub fn canonical_name(name: &str) -> &str {
    let name = name.trim();
    name.strip_prefix(NAMESPACE_PREFIX).unwrap_or(name)
}
