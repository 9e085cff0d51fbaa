//! Notifications sent to the host during a run

use std::path::Path;

/// Non-fatal diagnostic raised during preprocessing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A `define` directive overwrote an existing variable.
    Redefinition {
        name: String,
        old_value: String,
        new_value: String,
    },
    /// Raised by the `warning` directive.
    User(String),
    /// No extension handled a `pragma` directive.
    UnknownPragma(String),
    /// A deprecated built-in variable was read.
    DeprecatedVariable {
        name: String,
        replacement: String,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::Redefinition {
                name,
                old_value,
                new_value,
            } => write!(
                f,
                "variable `{name}` redefined: `{old_value}` replaced by `{new_value}`"
            ),
            Warning::User(message) => write!(f, "{message}"),
            Warning::UnknownPragma(name) => write!(f, "unknown pragma `{name}`"),
            Warning::DeprecatedVariable { name, replacement } => {
                write!(f, "`$({name})` is deprecated, use `$({replacement})`")
            }
        }
    }
}

/// Details of an evaluated `ifdef` or `ifndef` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfDefEvent {
    /// True for `ifdef`, false for `ifndef`.
    pub is_ifdef: bool,
    pub is_defined: bool,
    pub name: String,
}

/// Receives notifications from the preprocessor.
///
/// All methods have default implementations that log through `tracing`,
///     so implementations only override what they care about.
pub trait Observer {
    /// Called when an `ifdef` or `ifndef` condition is evaluated.
    ///
    /// Existence tests inside suppressed branches are never evaluated and are not reported.
    fn if_def(&mut self, event: &IfDefEvent) {
        tracing::debug!(
            name = event.name.as_str(),
            defined = event.is_defined,
            "{} evaluated",
            if event.is_ifdef { "ifdef" } else { "ifndef" },
        );
    }

    /// Called after an included file has been processed.
    fn included_file(&mut self, path: &Path) {
        tracing::debug!(path = %path.display(), "included file");
    }

    /// Called with the complete output of a successful run, before it is returned.
    fn processed_stream(&mut self, source: &Path, output: &[u8]) {
        tracing::debug!(
            source = %source.display(),
            bytes = output.len(),
            "processed stream"
        );
    }

    fn warning(&mut self, warning: &Warning) {
        tracing::warn!("{warning}");
    }
}

/// An observer that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl Observer for LoggingObserver {}
