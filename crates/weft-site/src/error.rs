//! Error types for page resolution and rendering.
//!
//! Every failure that leaves this crate is a [`SiteError`], and every
//! [`SiteError`] falls into one of three [`ErrorKind`]s. The HTTP layer only
//! needs the kind to pick a status; the message is meant for the site author.
//!
//! # Conversion Policy
//!
//! Raw I/O errors never escape. [`SiteError::io`] maps them onto the closed
//! set of kinds:
//! - `ErrorKind::NotFound` (io) -> [`ErrorKind::NotFound`]
//! - `ErrorKind::PermissionDenied` (io) -> [`ErrorKind::Forbidden`]
//! - anything else -> [`ErrorKind::Misconfigured`]

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::resolver::DeclarationSource;

/// Closed set of error categories surfaced to the request layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The path does not correspond to an accessible directory.
    NotFound,
    /// The path exists but may not be read.
    Forbidden,
    /// The site is misconfigured (bad page type, missing template, bad feed
    /// source, template failure). Maps to an internal server error.
    Misconfigured,
}

impl ErrorKind {
    /// HTTP status code conventionally used for this kind.
    #[must_use]
    pub fn status_code(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Forbidden => 403,
            Self::Misconfigured => 500,
        }
    }

    /// Name of the template used to render an error page of this kind.
    #[must_use]
    pub fn template_name(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::Misconfigured => "internal_server_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotFound => "Not Found",
            Self::Forbidden => "Forbidden",
            Self::Misconfigured => "Internal Server Error",
        };
        f.write_str(label)
    }
}

/// Why a declared page type could not be instantiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidTypeReason {
    /// No page type with that name is registered.
    Unknown,
    /// The name is registered but is abstract, a mixin, or a namespace.
    NotInstantiable,
    /// The type exists but refused to construct a page for this path.
    Rejected(String),
}

impl fmt::Display for InvalidTypeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("it does not name a registered page type"),
            Self::NotInstantiable => f.write_str(
                "it names an abstract type, mixin, or namespace rather than an instantiable page type",
            ),
            Self::Rejected(detail) => write!(f, "its constructor rejected the page ({detail})"),
        }
    }
}

/// Error returned by site operations.
#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    /// Requested path has no accessible directory.
    #[error("Not found: {path}")]
    NotFound {
        /// URL path that was requested.
        path: String,
    },

    /// Requested path exists but cannot be read.
    #[error("Forbidden: {path}")]
    Forbidden {
        /// URL path that was requested.
        path: String,
    },

    /// A page type declaration names something that cannot serve as a page type.
    #[error(
        "This site's author specified `{type_name}` as the page type for `{path}`, \
         but that is not a valid page type because {reason}. \
         This page type was specified in {declared_in}."
    )]
    InvalidPageType {
        /// Declared type name, as written.
        type_name: String,
        /// URL path whose resolution triggered the lookup.
        path: String,
        /// Which of the validation steps failed.
        reason: InvalidTypeReason,
        /// Where the declaration came from.
        declared_in: DeclarationSource,
    },

    /// The page type rule list could not be loaded.
    #[error("Invalid page type rules in `{file}`: {message}")]
    TypeRules {
        /// Rule list file.
        file: PathBuf,
        /// Parse or validation message.
        message: String,
    },

    /// Neither the type hierarchy nor the default template matched.
    #[error(
        "This site's author did not provide a template for `{type_name}`, \
         nor is there a default template."
    )]
    NoTemplate {
        /// Concrete page type name.
        type_name: String,
    },

    /// A feed's `source` attribute points at a page without posts or comments.
    #[error("Invalid source for feed `{feed}`: `{source_path}` has neither posts nor comments")]
    InvalidFeedSource {
        /// URL path of the feed page.
        feed: String,
        /// URL path the `source` attribute resolved to.
        source_path: String,
    },

    /// The external renderer failed.
    #[error("{}", render_message(.file.as_deref(), .line.as_ref(), .message))]
    Render {
        /// Offending template, in URL space when it lies inside the site root.
        file: Option<String>,
        /// Line within the template, when known.
        line: Option<u32>,
        /// Renderer message.
        message: String,
    },

    /// Any other filesystem failure.
    #[error("I/O error at `{path}`: {source}")]
    Io {
        /// URL path being processed.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

fn render_message(file: Option<&str>, line: Option<&u32>, message: &str) -> String {
    match (file, line) {
        (Some(file), Some(line)) => format!("In `{file}`, line {line}: {message}"),
        (Some(file), None) => format!("In `{file}`: {message}"),
        _ => message.to_owned(),
    }
}

impl SiteError {
    /// Convert an I/O error encountered while handling `path`.
    #[must_use]
    pub fn io(err: std::io::Error, path: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound {
                path: path.to_owned(),
            },
            std::io::ErrorKind::PermissionDenied => Self::Forbidden {
                path: path.to_owned(),
            },
            _ => Self::Io {
                path: path.to_owned(),
                source: err,
            },
        }
    }

    /// Error category for status selection.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::InvalidPageType { .. }
            | Self::TypeRules { .. }
            | Self::NoTemplate { .. }
            | Self::InvalidFeedSource { .. }
            | Self::Render { .. }
            | Self::Io { .. } => ErrorKind::Misconfigured,
        }
    }
}
