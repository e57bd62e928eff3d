//! Page type declaration lookup.
//!
//! A site takes its page types from exactly one [`TypeSource`]:
//!
//! - **Rules**: an ordered rule list file (see [`crate::rules`]).
//! - **Markers**: a private `=page-type` file in the page's own directory,
//!   else the nearest inheritable `:page-type` file found while ascending from
//!   the page directory to the root.
//!
//! Either way the result is a [`TypeDeclaration`] remembering where the name
//! came from, so a bad name can be traced back to the file that wrote it.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::SiteError;
use crate::paths::{self, PathMapper};
use crate::rules::RulesCache;
use crate::sidecar::{INHERITED_TYPE_MARKER, PRIVATE_TYPE_MARKER};

/// Where a page type declaration came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeclarationSource {
    /// `=page-type` in the page's own directory (URL path of the marker).
    PrivateMarker { file: String },
    /// `:page-type` in the page's directory or an ancestor (URL path of the marker).
    InheritedMarker { file: String },
    /// A rule in the rule list.
    Rule { file: String, pattern: String },
    /// Nothing declared a type.
    Default,
}

impl fmt::Display for DeclarationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrivateMarker { file } | Self::InheritedMarker { file } => {
                write!(f, "`{file}`")
            }
            Self::Rule { file, pattern } => write!(f, "the rule `{pattern}` in `{file}`"),
            Self::Default => f.write_str("a hard-coded default"),
        }
    }
}

/// A page type name and where it was declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeDeclaration {
    pub type_name: String,
    pub source: DeclarationSource,
}

impl TypeDeclaration {
    fn default_type(name: &str) -> Self {
        Self {
            type_name: name.to_owned(),
            source: DeclarationSource::Default,
        }
    }
}

/// Configured source of page type declarations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TypeSource {
    /// Marker files inside the content tree.
    #[default]
    Markers,
    /// An ordered rule list file.
    Rules(PathBuf),
}

/// Resolves URL paths to type declarations.
#[derive(Debug)]
pub(crate) enum TypeResolver {
    Markers,
    Rules(RulesCache),
}

impl TypeResolver {
    pub(crate) fn new(source: TypeSource) -> Self {
        match source {
            TypeSource::Markers => Self::Markers,
            TypeSource::Rules(file) => Self::Rules(RulesCache::new(file)),
        }
    }

    /// Resolve the declaration for `url` (any spelling; matched in directory form).
    pub(crate) fn resolve(
        &self,
        mapper: &PathMapper,
        url: &str,
        default_type: &str,
    ) -> Result<TypeDeclaration, SiteError> {
        let path = paths::as_directory(url);
        match self {
            Self::Markers => Ok(resolve_markers(mapper, &path, default_type)),
            Self::Rules(cache) => {
                let rules = cache.current()?;
                Ok(match rules.first_match(&path) {
                    Some(rule) => TypeDeclaration {
                        type_name: rule.page_type().to_owned(),
                        source: DeclarationSource::Rule {
                            file: mapper.fs_to_url(cache.file()),
                            pattern: rule.pattern().to_owned(),
                        },
                    },
                    None => TypeDeclaration::default_type(default_type),
                })
            }
        }
    }
}

fn resolve_markers(mapper: &PathMapper, path: &str, default_type: &str) -> TypeDeclaration {
    let private = mapper.url_to_fs(path).join(PRIVATE_TYPE_MARKER);
    if let Some(name) = read_marker(&private) {
        return TypeDeclaration {
            type_name: name,
            source: DeclarationSource::PrivateMarker {
                file: mapper.fs_to_url(&private),
            },
        };
    }

    for ancestor in paths::ancestor_chain(path).iter().rev() {
        let marker = mapper.url_to_fs(ancestor).join(INHERITED_TYPE_MARKER);
        if let Some(name) = read_marker(&marker) {
            return TypeDeclaration {
                type_name: name,
                source: DeclarationSource::InheritedMarker {
                    file: mapper.fs_to_url(&marker),
                },
            };
        }
    }

    TypeDeclaration::default_type(default_type)
}

/// Contents of a readable marker file, trimmed.
fn read_marker(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(content) => Some(content.trim().to_owned()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable type marker");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn site_tree() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("blog/2024/hello")).unwrap();
        fs::create_dir_all(root.join("about")).unwrap();
        temp_dir
    }

    #[test]
    fn test_markers_default_when_nothing_declared() {
        let temp_dir = site_tree();
        let mapper = PathMapper::new(temp_dir.path());
        let decl = TypeResolver::Markers
            .resolve(&mapper, "/about", "PlainPage")
            .unwrap();
        assert_eq!(decl, TypeDeclaration::default_type("PlainPage"));
    }

    #[test]
    fn test_markers_inherited_from_ancestor() {
        let temp_dir = site_tree();
        let root = temp_dir.path();
        fs::write(root.join("blog/:page-type"), "Blog::Post\n").unwrap();
        let mapper = PathMapper::new(root);

        let decl = TypeResolver::Markers
            .resolve(&mapper, "/blog/2024/hello/", "PlainPage")
            .unwrap();
        assert_eq!(decl.type_name, "Blog::Post");
        assert_eq!(
            decl.source,
            DeclarationSource::InheritedMarker {
                file: "/blog/:page-type".to_owned()
            }
        );
    }

    #[test]
    fn test_markers_nearest_inherited_wins() {
        let temp_dir = site_tree();
        let root = temp_dir.path();
        fs::write(root.join(":page-type"), "PlainPage").unwrap();
        fs::write(root.join("blog/2024/:page-type"), "Blog::Post").unwrap();
        let mapper = PathMapper::new(root);

        let decl = TypeResolver::Markers
            .resolve(&mapper, "/blog/2024/hello/", "PlainPage")
            .unwrap();
        assert_eq!(decl.type_name, "Blog::Post");
    }

    #[test]
    fn test_markers_private_beats_inherited_in_same_directory() {
        let temp_dir = site_tree();
        let root = temp_dir.path();
        fs::write(root.join("blog/:page-type"), "Blog::Post").unwrap();
        fs::write(root.join("blog/=page-type"), "Blog::Folder").unwrap();
        let mapper = PathMapper::new(root);

        let blog = TypeResolver::Markers
            .resolve(&mapper, "/blog/", "PlainPage")
            .unwrap();
        assert_eq!(blog.type_name, "Blog::Folder");
        assert_eq!(
            blog.source,
            DeclarationSource::PrivateMarker {
                file: "/blog/=page-type".to_owned()
            }
        );

        // The private marker does not leak to children.
        let child = TypeResolver::Markers
            .resolve(&mapper, "/blog/2024/", "PlainPage")
            .unwrap();
        assert_eq!(child.type_name, "Blog::Post");
    }

    #[test]
    fn test_rules_first_match_wins() {
        let temp_dir = site_tree();
        let rules_file = temp_dir.path().join("types.yml");
        fs::write(
            &rules_file,
            "- pattern: ^/blog/$\n  type: Blog::Folder\n- pattern: ^/blog/.+\n  type: Blog::Post\n",
        )
        .unwrap();
        let mapper = PathMapper::new(temp_dir.path());
        let resolver = TypeResolver::new(TypeSource::Rules(rules_file));

        let folder = resolver.resolve(&mapper, "/blog", "PlainPage").unwrap();
        assert_eq!(folder.type_name, "Blog::Folder");
        assert_eq!(
            folder.source,
            DeclarationSource::Rule {
                file: "/types.yml".to_owned(),
                pattern: "^/blog/$".to_owned()
            }
        );

        let post = resolver
            .resolve(&mapper, "/blog/2024/hello", "PlainPage")
            .unwrap();
        assert_eq!(post.type_name, "Blog::Post");

        let other = resolver.resolve(&mapper, "/about/", "PlainPage").unwrap();
        assert_eq!(other.source, DeclarationSource::Default);
    }

    #[test]
    fn test_rules_ignore_markers() {
        let temp_dir = site_tree();
        fs::write(temp_dir.path().join("about/=page-type"), "FrontPage").unwrap();
        let mapper = PathMapper::new(temp_dir.path());
        let resolver = TypeResolver::new(TypeSource::Rules(temp_dir.path().join("none.yml")));
        let decl = resolver.resolve(&mapper, "/about/", "PlainPage").unwrap();
        assert_eq!(decl.type_name, "PlainPage");
    }

    #[test]
    fn test_declaration_source_display() {
        assert_eq!(DeclarationSource::Default.to_string(), "a hard-coded default");
        assert_eq!(
            DeclarationSource::Rule {
                file: "/types.yml".to_owned(),
                pattern: "^/x/$".to_owned()
            }
            .to_string(),
            "the rule `^/x/$` in `/types.yml`"
        );
    }
}
