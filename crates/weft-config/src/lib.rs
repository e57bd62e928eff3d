//! Configuration loading for weft.
//!
//! Reads `weft.toml`, either from an explicit path or by searching the
//! current directory and its parents. Relative paths in the file are
//! resolved against the directory that contains it. Values from the command
//! line are applied last via [`CliSettings`].
//!
//! ```toml
//! [site]
//! root = "site"
//! templates = "templates"
//!
//! [page_types]
//! source = "rules"
//! rules_file = "page-types.yaml"
//! default = "PlainPage"
//!
//! [[page_types.custom]]
//! name = "Recipe"
//! parent = "PlainPage"
//! attributes = ["title", "content", "servings"]
//! defaults = { servings = "2" }
//! mixins = ["categorized"]
//! required = ["title"]
//! ```
//!
//! ## Environment Variable Expansion
//!
//! `site.root`, `site.templates` and `page_types.rules_file` support
//! `${VAR}` (error if unset) and `${VAR:-default}`.

mod expand;

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Configuration filename searched for during discovery.
pub const CONFIG_FILENAME: &str = "weft.toml";

/// Page type used for directories nobody declared a type for.
const DEFAULT_PAGE_TYPE: &str = "PlainPage";

/// Values from the command line that take precedence over the file.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override the site root directory.
    pub root: Option<PathBuf>,
    /// Override the template directory.
    pub templates: Option<PathBuf>,
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `[site]` as written in the file.
    site: SiteConfigRaw,
    /// `[page_types]` section.
    pub page_types: PageTypesConfig,

    /// Site paths, absolute after loading.
    #[serde(skip)]
    pub site_resolved: SiteConfig,
    /// File the configuration was read from, if any.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SiteConfigRaw {
    root: Option<String>,
    templates: Option<String>,
}

/// Resolved site locations.
#[derive(Debug, Default)]
pub struct SiteConfig {
    /// Directory served as the site.
    pub root: PathBuf,
    /// Directory templates are looked up in.
    pub templates: PathBuf,
    /// Rule list file, when `page_types.rules_file` is set.
    pub rules_file: Option<PathBuf>,
}

/// Where page types come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeSourceKind {
    /// Marker files inside the content tree.
    #[default]
    Markers,
    /// An ordered pattern list in `rules_file`.
    Rules,
}

/// `[page_types]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PageTypesConfig {
    /// How page types are declared.
    pub source: TypeSourceKind,
    /// Rule list path, relative to the config file.
    rules_file: Option<String>,
    /// Type for directories without a declaration.
    pub default: String,
    /// Site-specific page types, registered in order.
    pub custom: Vec<CustomPageType>,
}

impl Default for PageTypesConfig {
    fn default() -> Self {
        Self {
            source: TypeSourceKind::default(),
            rules_file: None,
            default: DEFAULT_PAGE_TYPE.to_owned(),
            custom: Vec::new(),
        }
    }
}

/// One `[[page_types.custom]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomPageType {
    /// Type name; `A::B` places it in namespace `A`.
    pub name: String,
    /// Type this one extends.
    #[serde(default = "default_parent")]
    pub parent: String,
    /// Content type of rendered pages, inherited when unset.
    #[serde(default)]
    pub content_type: Option<String>,
    /// Attribute names declared by this type.
    #[serde(default)]
    pub attributes: Vec<String>,
    /// Attribute defaults; naming an attribute here also declares it.
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
    /// Mixin names (`categorized`, `newest_first`).
    #[serde(default)]
    pub mixins: Vec<String>,
    /// Attributes whose files must exist for a page to be valid.
    #[serde(default)]
    pub required: Vec<String>,
    /// Whether the type can only be used as a parent.
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
}

fn default_parent() -> String {
    DEFAULT_PAGE_TYPE.to_owned()
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Explicit config file does not exist.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// A `${NAME}` reference without a fallback names an unset variable.
    #[error("Environment variable ${{{var}}} referenced by {field} is not set")]
    EnvVar {
        /// Config field path (e.g. `site.root`).
        field: String,
        /// Variable name.
        var: String,
    },
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration, then apply CLI settings.
    ///
    /// With `config_path` the file must exist. Without it, `weft.toml` is
    /// searched for in the current directory and its parents; if none is
    /// found, defaults relative to the current directory are used.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit file is missing, or if reading, parsing,
    /// expansion or validation fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Self::load_from_file(path)?,
            None => match Self::discover_config() {
                Some(found) => Self::load_from_file(&found)?,
                None => Self::default_with_cwd(),
            },
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }
        Ok(config)
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(root) = &settings.root {
            self.site_resolved.root.clone_from(root);
        }
        if let Some(templates) = &settings.templates {
            self.site_resolved.templates.clone_from(templates);
        }
    }

    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Defaults with paths relative to `base`.
    fn default_with_base(base: &Path) -> Self {
        Self {
            site: SiteConfigRaw::default(),
            page_types: PageTypesConfig::default(),
            site_resolved: SiteConfig {
                root: base.join("site"),
                templates: base.join("templates"),
                rules_file: None,
            },
            config_path: None,
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;
        config.resolve_paths(path.parent().unwrap_or(Path::new(".")));
        config.config_path = Some(path.to_path_buf());
        config.validate()?;

        Ok(config)
    }

    /// Check the loaded values for consistency.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.page_types.default, "page_types.default")?;
        if self.page_types.source == TypeSourceKind::Rules && self.site_resolved.rules_file.is_none()
        {
            return Err(ConfigError::Validation(
                "page_types.source = \"rules\" requires page_types.rules_file".to_owned(),
            ));
        }
        self.validate_custom_types()
    }

    fn validate_custom_types(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for (index, custom) in self.page_types.custom.iter().enumerate() {
            let field = format!("page_types.custom[{index}]");
            require_non_empty(&custom.name, &format!("{field}.name"))?;
            require_non_empty(&custom.parent, &format!("{field}.parent"))?;
            if !seen.insert(custom.name.trim()) {
                return Err(ConfigError::Validation(format!(
                    "{field}.name: page type `{}` is defined more than once",
                    custom.name
                )));
            }
            if let Some(missing) = custom
                .required
                .iter()
                .find(|r| !custom.attributes.contains(r) && !custom.defaults.contains_key(*r))
            {
                return Err(ConfigError::Validation(format!(
                    "{field}.required: `{missing}` is not one of the type's attributes"
                )));
            }
        }
        Ok(())
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(root) = &self.site.root {
            self.site.root = Some(expand::expand_env(root, "site.root")?);
        }
        if let Some(templates) = &self.site.templates {
            self.site.templates = Some(expand::expand_env(templates, "site.templates")?);
        }
        if let Some(rules_file) = &self.page_types.rules_file {
            self.page_types.rules_file =
                Some(expand::expand_env(rules_file, "page_types.rules_file")?);
        }
        Ok(())
    }

    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: Option<&str>, default: &str| config_dir.join(path.unwrap_or(default));

        self.site_resolved = SiteConfig {
            root: resolve(self.site.root.as_deref(), "site"),
            templates: resolve(self.site.templates.as_deref(), "templates"),
            rules_file: self
                .page_types
                .rules_file
                .as_deref()
                .map(|file| config_dir.join(file)),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn assert_validation_error(config: &Config, expected_substrings: &[&str]) {
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation(_)),
            "Expected ConfigError::Validation, got {err:?}"
        );
        let msg = err.to_string();
        for s in expected_substrings {
            assert!(msg.contains(s), "Expected error to contain '{s}', got: {msg}");
        }
    }

    fn parse(toml: &str, base: &Path) -> Config {
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(base);
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        assert_eq!(config.site_resolved.root, PathBuf::from("/test/site"));
        assert_eq!(config.site_resolved.templates, PathBuf::from("/test/templates"));
        assert_eq!(config.site_resolved.rules_file, None);
        assert_eq!(config.page_types.source, TypeSourceKind::Markers);
        assert_eq!(config.page_types.default, "PlainPage");
        assert!(config.page_types.custom.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resolve_paths_relative_to_config_dir() {
        let config = parse(
            r#"
[site]
root = "content"
templates = "/abs/templates"

[page_types]
source = "rules"
rules_file = "types.yaml"
"#,
            Path::new("/project"),
        );
        assert_eq!(config.site_resolved.root, PathBuf::from("/project/content"));
        assert_eq!(config.site_resolved.templates, PathBuf::from("/abs/templates"));
        assert_eq!(
            config.site_resolved.rules_file,
            Some(PathBuf::from("/project/types.yaml"))
        );
        assert_eq!(config.page_types.source, TypeSourceKind::Rules);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_custom_page_types() {
        let config = parse(
            r#"
[[page_types.custom]]
name = "Recipe"
attributes = ["title", "servings"]
defaults = { servings = "2" }
mixins = ["categorized"]
required = ["title"]

[[page_types.custom]]
name = "Shop::Base"
parent = "AbstractPage"
abstract = true
content_type = "text/plain"
"#,
            Path::new("/p"),
        );
        let custom = &config.page_types.custom;
        assert_eq!(custom.len(), 2);
        assert_eq!(custom[0].parent, "PlainPage");
        assert_eq!(custom[0].attributes, vec!["title", "servings"]);
        assert_eq!(custom[0].defaults.get("servings").map(String::as_str), Some("2"));
        assert_eq!(custom[0].mixins, vec!["categorized"]);
        assert!(!custom[0].is_abstract);
        assert_eq!(custom[1].parent, "AbstractPage");
        assert_eq!(custom[1].content_type.as_deref(), Some("text/plain"));
        assert!(custom[1].is_abstract);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_source_is_parse_error() {
        let result: Result<Config, _> = toml::from_str("[page_types]\nsource = \"database\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_rules_source_requires_rules_file() {
        let config = parse("[page_types]\nsource = \"rules\"\n", Path::new("/p"));
        assert_validation_error(&config, &["rules_file"]);
    }

    #[test]
    fn test_validate_default_type_empty() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.page_types.default = "  ".to_owned();
        assert_validation_error(&config, &["page_types.default", "empty"]);
    }

    #[test]
    fn test_validate_duplicate_custom_type() {
        let config = parse(
            r#"
[[page_types.custom]]
name = "Recipe"

[[page_types.custom]]
name = "Recipe"
"#,
            Path::new("/p"),
        );
        assert_validation_error(&config, &["page_types.custom[1]", "Recipe", "more than once"]);
    }

    #[test]
    fn test_validate_required_must_be_declared() {
        let config = parse(
            r#"
[[page_types.custom]]
name = "Recipe"
attributes = ["title"]
required = ["servings"]
"#,
            Path::new("/p"),
        );
        assert_validation_error(&config, &["page_types.custom[0].required", "servings"]);
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.apply_cli_settings(&CliSettings {
            root: Some(PathBuf::from("/elsewhere")),
            ..Default::default()
        });
        assert_eq!(config.site_resolved.root, PathBuf::from("/elsewhere"));
        assert_eq!(config.site_resolved.templates, PathBuf::from("/test/templates"));

        config.apply_cli_settings(&CliSettings::default());
        assert_eq!(config.site_resolved.root, PathBuf::from("/elsewhere"));
    }

    #[test]
    fn test_expand_env_vars_before_resolution() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("WEFT_CONFIG_TEST_ROOT", "/srv/www");
        }
        let mut config: Config =
            toml::from_str("[site]\nroot = \"${WEFT_CONFIG_TEST_ROOT}/site\"\n").unwrap();
        config.expand_env_vars().unwrap();
        config.resolve_paths(Path::new("/p"));
        assert_eq!(config.site_resolved.root, PathBuf::from("/srv/www/site"));
        unsafe {
            std::env::remove_var("WEFT_CONFIG_TEST_ROOT");
        }
    }

    #[test]
    fn test_load_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[site]\nroot = \"content\"\n").unwrap();

        let config = Config::load(
            Some(&path),
            Some(&CliSettings {
                templates: Some(PathBuf::from("/tpl")),
                ..Default::default()
            }),
        )
        .unwrap();
        assert_eq!(config.site_resolved.root, temp_dir.path().join("content"));
        assert_eq!(config.site_resolved.templates, PathBuf::from("/tpl"));
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.toml");
        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(p) if p == path));
    }

    #[test]
    fn test_load_invalid_file_fails_validation() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[page_types]\nsource = \"rules\"\n").unwrap();
        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
