//! Preprocessor extensions
//!
//! An extension answers variable references, function calls and pragmas for
//!     one or more prefixes that are not built into the preprocessor.
//! For example, an extension registered for the prefix `build` receives the
//!     reference `$(build.Number)` and the pragma `<?pragma build.stamp ...?>`.

use std::collections::HashMap;

use crate::error::{Error, Kind, Result};
use crate::node;

/// Prefixes handled by the preprocessor itself. Extensions cannot claim these.
pub const RESERVED_PREFIXES: [&str; 4] = ["var", "env", "sys", "fun"];

/// A preprocessor extension.
///
/// Every method except [Extension::prefixes] has a default implementation
///     that handles nothing.
pub trait Extension {
    /// The prefixes this extension handles.
    fn prefixes(&self) -> Vec<String>;

    /// Returns the value of the variable `prefix.name`, or [None] if it is not defined.
    fn get_variable(&self, prefix: &str, name: &str) -> Result<Option<String>> {
        let _ = (prefix, name);
        Ok(None)
    }

    /// Evaluates the function `prefix.name(args)`, or returns [None] if it is not defined.
    fn evaluate_function(
        &self,
        prefix: &str,
        name: &str,
        args: &[String],
    ) -> Result<Option<String>> {
        let _ = (prefix, name, args);
        Ok(None)
    }

    /// Processes the pragma `prefix.name`, optionally writing nodes to the output.
    ///
    /// Returns false if the pragma was not handled.
    fn process_pragma(
        &mut self,
        prefix: &str,
        name: &str,
        args: &str,
        writer: &mut node::Writer,
    ) -> Result<bool> {
        let _ = (prefix, name, args, writer);
        Ok(false)
    }

    /// Called once before a document is preprocessed.
    fn initialize(&mut self) {}

    /// Called once after a document is preprocessed, whether or not the run succeeded.
    fn finalize(&mut self) {}
}

/// The set of registered extensions, indexed by prefix.
#[derive(Default)]
pub struct Registry {
    extensions: Vec<Box<dyn Extension>>,
    by_prefix: HashMap<String, usize>,
}

impl Registry {
    /// Registers an extension.
    ///
    /// Fails if one of the extension's prefixes is reserved or already registered.
    pub fn register(&mut self, extension: Box<dyn Extension>) -> Result<()> {
        let prefixes = extension.prefixes();
        for prefix in &prefixes {
            if RESERVED_PREFIXES.contains(&prefix.as_str()) {
                return Err(Error::new(
                    Kind::Extension,
                    format!("the prefix `{prefix}` is reserved by the preprocessor"),
                ));
            }
            if self.by_prefix.contains_key(prefix) {
                return Err(Error::new(
                    Kind::Extension,
                    format!("the prefix `{prefix}` is already handled by another extension"),
                ));
            }
        }
        let index = self.extensions.len();
        for prefix in prefixes {
            self.by_prefix.insert(prefix, index);
        }
        self.extensions.push(extension);
        Ok(())
    }

    pub fn get(&self, prefix: &str) -> Option<&dyn Extension> {
        self.by_prefix
            .get(prefix)
            .map(|i| self.extensions[*i].as_ref())
    }

    pub fn get_mut(&mut self, prefix: &str) -> Option<&mut Box<dyn Extension>> {
        let i = *self.by_prefix.get(prefix)?;
        self.extensions.get_mut(i)
    }

    pub fn get_variable(&self, prefix: &str, name: &str) -> Result<Option<String>> {
        match self.get(prefix) {
            None => Ok(None),
            Some(extension) => extension.get_variable(prefix, name),
        }
    }

    pub fn evaluate_function(
        &self,
        prefix: &str,
        name: &str,
        args: &[String],
    ) -> Result<Option<String>> {
        match self.get(prefix) {
            None => Ok(None),
            Some(extension) => extension.evaluate_function(prefix, name, args),
        }
    }

    pub fn initialize(&mut self) {
        for extension in &mut self.extensions {
            extension.initialize();
        }
    }

    pub fn finalize(&mut self) {
        for extension in &mut self.extensions {
            extension.finalize();
        }
    }
}
