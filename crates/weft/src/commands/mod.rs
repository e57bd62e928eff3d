//! CLI command implementations.

mod check;
mod inspect;
mod reindex;

pub(crate) use check::CheckArgs;
pub(crate) use inspect::InspectArgs;
pub(crate) use reindex::ReindexArgs;

use std::path::PathBuf;

use clap::Args;
use weft_config::{CliSettings, Config, CustomPageType, TypeSourceKind};
use weft_site::{Mixin, PageTypeDef, RegistryError, Site, SiteOptions, TypeSource};

use crate::error::CliError;

/// Options shared by every command that opens a site.
#[derive(Args)]
pub(crate) struct SiteArgs {
    /// Path to configuration file (default: auto-discover weft.toml).
    #[arg(short, long, env = "WEFT_CONFIG")]
    config: Option<PathBuf>,

    /// Site root directory (overrides config).
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Template directory (overrides config).
    #[arg(short, long)]
    templates: Option<PathBuf>,
}

impl SiteArgs {
    /// Load configuration and build the site it describes.
    pub(crate) fn open(&self) -> Result<Site, CliError> {
        let settings = CliSettings {
            root: self.root.clone(),
            templates: self.templates.clone(),
        };
        let config = Config::load(self.config.as_deref(), Some(&settings))?;
        site_from_config(&config)
    }
}

fn site_from_config(config: &Config) -> Result<Site, CliError> {
    let resolved = &config.site_resolved;
    let type_source = match config.page_types.source {
        TypeSourceKind::Markers => TypeSource::Markers,
        TypeSourceKind::Rules => {
            let file = resolved.rules_file.clone().ok_or_else(|| {
                CliError::Validation("page type rules require page_types.rules_file".to_owned())
            })?;
            TypeSource::Rules(file)
        }
    };

    let mut options = SiteOptions::new(&resolved.root)
        .with_templates(&resolved.templates)
        .with_type_source(type_source)
        .with_default_type(config.page_types.default.trim());
    for custom in &config.page_types.custom {
        options = options.with_page_type(page_type_def(custom)?);
    }

    tracing::debug!(
        root = %resolved.root.display(),
        custom_types = config.page_types.custom.len(),
        "Opening site"
    );
    Ok(Site::new(options)?)
}

/// Translate a `[[page_types.custom]]` entry into a registry definition.
fn page_type_def(custom: &CustomPageType) -> Result<PageTypeDef, RegistryError> {
    let mut def = PageTypeDef::new(custom.name.trim(), custom.parent.trim());
    if custom.is_abstract {
        def = def.abstract_type();
    }
    if let Some(content_type) = &custom.content_type {
        def = def.content_type(content_type.trim());
    }

    for name in &custom.attributes {
        def = match custom.defaults.get(name) {
            Some(default) => def.attribute_with_default(name, default),
            None => def.attribute(name),
        };
    }
    for (name, default) in &custom.defaults {
        if !custom.attributes.contains(name) {
            def = def.attribute_with_default(name, default);
        }
    }

    for mixin in &custom.mixins {
        def = def.mixin(mixin.parse::<Mixin>()?);
    }
    for name in &custom.required {
        def = def.require(name);
    }
    Ok(def)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn load(dir: &TempDir, toml: &str) -> Config {
        let path = dir.path().join("weft.toml");
        fs::write(&path, toml).unwrap();
        Config::load(Some(&path), None).unwrap()
    }

    #[test]
    fn test_custom_page_type_registered() {
        let temp_dir = TempDir::new().unwrap();
        let config = load(
            &temp_dir,
            r#"
[[page_types.custom]]
name = "Recipe"
attributes = ["title", "servings"]
defaults = { servings = "2", cuisine = "any" }
mixins = ["categorized"]
"#,
        );
        let site = site_from_config(&config).unwrap();

        let recipe = site.page_type("Recipe").unwrap();
        assert!(recipe.is_a("PlainPage"));
        assert!(recipe.has_mixin(Mixin::Categorized));
        assert_eq!(
            recipe.attribute("servings").unwrap().default.as_deref(),
            Some("2")
        );
        assert_eq!(
            recipe.attribute("cuisine").unwrap().default.as_deref(),
            Some("any")
        );
        assert!(recipe.attribute("categories").is_some());
    }

    #[test]
    fn test_unknown_mixin_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config = load(
            &temp_dir,
            r#"
[[page_types.custom]]
name = "Recipe"
mixins = ["sparkly"]
"#,
        );
        let err = site_from_config(&config).unwrap_err();
        assert!(matches!(
            err,
            CliError::Registry(RegistryError::UnknownMixin(_))
        ));
    }

    #[test]
    fn test_rules_source_uses_resolved_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("site/about")).unwrap();
        fs::write(
            temp_dir.path().join("rules.yaml"),
            "- pattern: '^/about/$'\n  type: FrontPage\n",
        )
        .unwrap();
        let config = load(
            &temp_dir,
            "[page_types]\nsource = \"rules\"\nrules_file = \"rules.yaml\"\n",
        );
        let site = site_from_config(&config).unwrap();

        let page = site.page_for("/about/").unwrap();
        assert_eq!(page.page_type().name(), "FrontPage");
    }
}
