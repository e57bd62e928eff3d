//! Environment references in string settings.
//!
//! `${NAME}` must be set; `${NAME:-fallback}` falls back when it is not.
//! Values without a braced reference are returned as written.

use std::borrow::Cow;

use crate::ConfigError;

/// Expand references in `value` from the process environment.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    expand_with(value, field, |name| std::env::var(name).ok())
}

fn expand_with(
    value: &str,
    field: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }
    shellexpand::env_with_context(value, |name| lookup(name).map(Some).ok_or(NotSet))
        .map(Cow::into_owned)
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            var: e.var_name,
        })
}

#[derive(Debug)]
struct NotSet;
