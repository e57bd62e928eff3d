//! Ordered page type rule list.
//!
//! The rule list is a YAML sequence of `{pattern, type}` mappings:
//!
//! ```yaml
//! - pattern: ^/blog/$
//!   type: Blog::Folder
//! - pattern: ^/blog/[^/]+/$
//!   type: Blog::Post
//! ```
//!
//! Patterns are unanchored regular expressions matched against the page path
//! in directory form. The first matching rule wins.
//!
//! [`RulesCache`] keeps the parsed list and reloads it whenever the file's
//! modification time differs from the one seen at the last load.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use regex::Regex;
use serde::Deserialize;

use crate::error::SiteError;
use crate::sidecar;

#[derive(Deserialize)]
struct RawRule {
    pattern: String,
    #[serde(rename = "type")]
    page_type: String,
}

/// A single compiled rule.
#[derive(Debug, Clone)]
pub struct TypeRule {
    pattern: Regex,
    page_type: String,
}

impl TypeRule {
    /// Source text of the pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Page type name the rule assigns.
    #[must_use]
    pub fn page_type(&self) -> &str {
        &self.page_type
    }
}

/// Compiled rule list, in file order.
#[derive(Debug, Clone, Default)]
pub struct TypeRules {
    rules: Vec<TypeRule>,
}

impl TypeRules {
    /// Parse a rule list from YAML.
    ///
    /// Empty content is an empty list.
    ///
    /// # Errors
    ///
    /// Returns a message naming the offending rule if the YAML is malformed
    /// or a pattern fails to compile.
    pub fn parse(content: &str) -> Result<Self, String> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        let raw: Vec<RawRule> =
            serde_yaml::from_str(trimmed).map_err(|e| format!("Invalid YAML: {e}"))?;
        let rules = raw
            .into_iter()
            .enumerate()
            .map(|(index, rule)| {
                let pattern = Regex::new(&rule.pattern).map_err(|e| {
                    format!("Rule {} has invalid pattern `{}`: {e}", index + 1, rule.pattern)
                })?;
                Ok(TypeRule {
                    pattern,
                    page_type: rule.page_type,
                })
            })
            .collect::<Result<Vec<_>, String>>()?;
        Ok(Self { rules })
    }

    /// First rule whose pattern matches `path`.
    #[must_use]
    pub fn first_match(&self, path: &str) -> Option<&TypeRule> {
        self.rules.iter().find(|rule| rule.pattern.is_match(path))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

struct CachedRules {
    mtime: Option<SystemTime>,
    rules: Arc<TypeRules>,
}

/// Rule list loaded lazily from a file and refreshed on modification.
pub struct RulesCache {
    file: PathBuf,
    state: Mutex<Option<CachedRules>>,
}

impl RulesCache {
    #[must_use]
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            state: Mutex::new(None),
        }
    }

    /// Path of the rule list file.
    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Current rule list, reloading it if the file changed since last load.
    ///
    /// A missing file yields an empty list.
    pub fn current(&self) -> Result<Arc<TypeRules>, SiteError> {
        let mtime = sidecar::modified(&self.file);

        let mut state = self.state.lock().unwrap();
        if let Some(cached) = state.as_ref().filter(|c| c.mtime == mtime) {
            return Ok(Arc::clone(&cached.rules));
        }

        let rules = match fs::read_to_string(&self.file) {
            Ok(content) => TypeRules::parse(&content).map_err(|message| SiteError::TypeRules {
                file: self.file.clone(),
                message,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    file = %self.file.display(),
                    "Page type rule file not found, using default type for every page"
                );
                TypeRules::default()
            }
            Err(e) => {
                return Err(SiteError::TypeRules {
                    file: self.file.clone(),
                    message: e.to_string(),
                });
            }
        };

        tracing::info!(
            file = %self.file.display(),
            rules = rules.len(),
            "Loaded page type rules"
        );
        let rules = Arc::new(rules);
        *state = Some(CachedRules {
            mtime,
            rules: Arc::clone(&rules),
        });
        Ok(rules)
    }
}

impl std::fmt::Debug for RulesCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RulesCache")
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}
