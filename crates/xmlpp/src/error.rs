//! Error handling
//!
//! Every fatal condition in the preprocessor is reported as an [Error].
//! Errors carry a [Kind], a one-line title, optional notes and,
//!     once they have passed through the pipeline, a [Trace] pointing at the
//!     node of the source document that was being processed.

use std::ops::Range;
use std::rc::Rc;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Box<Error>>;

/// The class of a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// A directive, reference or expression is malformed.
    Syntax,
    /// A variable or function reference could not be resolved.
    UndefinedReference,
    /// A well-formed construct was used in an invalid way.
    Semantic,
    /// A file could not be found or read, or includes nest too deeply.
    Resource,
    /// Raised by the `error` directive.
    User,
    /// Raised by an extension.
    Extension,
    /// The input or output is not well-formed markup.
    Markup,
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Kind::Syntax => "syntax error",
            Kind::UndefinedReference => "undefined reference",
            Kind::Semantic => "semantic error",
            Kind::Resource => "resource error",
            Kind::User => "user error",
            Kind::Extension => "extension error",
            Kind::Markup => "markup error",
        };
        write!(f, "{s}")
    }
}

/// Location of an error in a source document.
#[derive(Debug, Clone)]
pub struct Trace {
    /// Human readable name of the source, usually a file path.
    pub name: String,
    pub source: Rc<str>,
    /// Byte range of the node in the source.
    pub span: Range<usize>,
}

impl Trace {
    /// Returns the 1-indexed line and column of the start of the span.
    pub fn line_and_column(&self) -> (usize, usize) {
        let start = self.span.start.min(self.source.len());
        let prefix = match self.source.get(..start) {
            Some(prefix) => prefix,
            None => return (1, 1),
        };
        let line = prefix.matches('\n').count() + 1;
        let line_start = prefix.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = prefix[line_start..].chars().count() + 1;
        (line, column)
    }
}

/// A fatal preprocessing error.
#[derive(Debug)]
pub struct Error {
    kind: Kind,
    title: String,
    notes: Vec<String>,
    trace: Option<Trace>,
}

impl Error {
    pub fn new<T: Into<String>>(kind: Kind, title: T) -> Box<Error> {
        Box::new(Error {
            kind,
            title: title.into(),
            notes: vec![],
            trace: None,
        })
    }

    pub fn with_note<T: Into<String>>(mut self: Box<Self>, note: T) -> Box<Self> {
        self.notes.push(note.into());
        self
    }

    /// Attaches a trace to the error.
    ///
    /// Errors raised deep inside an include or a foreach iteration are traced at
    ///     the innermost source, so an existing trace is never replaced.
    pub fn with_trace(mut self: Box<Self>, trace: Trace) -> Box<Self> {
        if self.trace.is_none() {
            self.trace = Some(trace);
        }
        self
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn trace(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "error: {}", self.title)?;
        if let Some(trace) = &self.trace {
            let (line, column) = trace.line_and_column();
            writeln!(f, "  --> {}:{}:{}", trace.name, line, column)?;
        }
        for note in &self.notes {
            writeln!(f, "  = note: {note}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}
