//! Variables and their resolution
//!
//! References have the form `prefix.name`.
//! The prefix selects the namespace that answers the reference:
//!
//! - `var`: user variables set with `define` and `foreach`.
//! - `env`: the host environment.
//! - `sys`: built-in system values such as `sys.CURRENTDIR` and `sys.BUILDARCH`.
//! - any other prefix: the registered [Extension](crate::extension::Extension) for the prefix.
//!
//! Function calls have the form `prefix.name(args)`.
//! The only built-in function is `fun.AutoVersion`.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Kind, Result};
use crate::extension::Registry;
use crate::observer::{Observer, Warning};
use crate::time::BuildTime;

/// Store of user variables.
#[derive(Debug, Default, Clone)]
pub struct Store {
    values: HashMap<String, String>,
}

impl Store {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Sets a variable, returning its previous value.
    pub fn define<N: Into<String>, V: Into<String>>(
        &mut self,
        name: N,
        value: V,
    ) -> Option<String> {
        self.values.insert(name.into(), value.into())
    }

    /// Removes a variable, returning its value.
    pub fn undefine(&mut self, name: &str) -> Option<String> {
        self.values.remove(name)
    }
}

/// Target architecture reported by `sys.BUILDARCH`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    #[default]
    X86,
    X64,
    Ia64,
    Arm,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Platform::X86 => "x86",
            Platform::X64 => "x64",
            Platform::Ia64 => "ia64",
            Platform::Arm => "arm",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x86" => Ok(Platform::X86),
            "x64" => Ok(Platform::X64),
            "ia64" => Ok(Platform::Ia64),
            "arm" => Ok(Platform::Arm),
            _ => Err(format!(
                "unknown platform `{s}` (expected one of x86, x64, ia64, arm)"
            )),
        }
    }
}

/// Access to environment variables.
pub trait EnvVars {
    fn get(&self, name: &str) -> Option<String>;
}

/// Environment variables of the current process.
pub struct ProcessEnvVars;

impl EnvVars for ProcessEnvVars {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvVars for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).cloned()
    }
}

/// Answers variable references and function calls.
pub trait Resolver {
    /// Returns the value of `prefix.name`, or [None] if it is undefined.
    fn variable(&mut self, prefix: &str, name: &str) -> Result<Option<String>>;

    /// Returns the result of `prefix.name(args)`, or [None] if the function is undefined.
    fn function(&mut self, prefix: &str, name: &str, args: &[String]) -> Result<Option<String>>;
}

/// Resolves a reference of the form `prefix.name`.
///
/// A leading `$(` and its closing paren are ignored.
/// If `allow_missing_prefix` is true, a reference without a prefix is looked up
///     in the `var` namespace, and a dotted reference that does not resolve is
///     retried as a `var` name in full.
pub fn lookup(
    resolver: &mut dyn Resolver,
    reference: &str,
    allow_missing_prefix: bool,
) -> Result<Option<String>> {
    let reference = match reference.strip_prefix("$(") {
        None => reference,
        Some(inner) => inner.strip_suffix(')').unwrap_or(inner),
    };
    match reference.split_once('.') {
        None => {
            if !allow_missing_prefix || reference.is_empty() {
                return Err(invalid_variable(reference));
            }
            resolver.variable("var", reference)
        }
        Some((prefix, name)) => {
            if prefix.is_empty() || name.is_empty() {
                return Err(invalid_variable(reference));
            }
            let value = resolver.variable(prefix, name)?;
            if value.is_none() && allow_missing_prefix {
                return resolver.variable("var", reference);
            }
            Ok(value)
        }
    }
}

fn invalid_variable(reference: &str) -> Box<Error> {
    Error::new(
        Kind::Syntax,
        format!("invalid preprocessor variable `{reference}`"),
    )
    .with_note("variable references have the form `prefix.name`, for example `var.Version`")
}

/// The resolver used during a preprocessing run.
pub struct Environment<'a> {
    pub store: &'a Store,
    pub extensions: &'a Registry,
    pub env_vars: &'a dyn EnvVars,
    pub platform: Platform,
    pub build_time: BuildTime,
    pub working_directory: Option<&'a Path>,
    /// The file currently being processed, if the source is a file.
    pub source_file: Option<&'a Path>,
    pub observer: &'a mut dyn Observer,
}

impl<'a> Environment<'a> {
    fn system_variable(&mut self, name: &str) -> Option<String> {
        match name {
            "CURRENTDIR" => {
                let dir = match self.working_directory {
                    Some(dir) => dir.to_path_buf(),
                    None => std::env::current_dir().ok()?,
                };
                Some(with_trailing_separator(&dir))
            }
            "SOURCEFILEDIR" => {
                let dir = self.source_file.and_then(Path::parent)?;
                Some(with_trailing_separator(dir))
            }
            "PLATFORM" => {
                self.observer.warning(&Warning::DeprecatedVariable {
                    name: "sys.PLATFORM".into(),
                    replacement: "sys.BUILDARCH".into(),
                });
                Some(self.platform.to_string())
            }
            "BUILDARCH" => Some(self.platform.to_string()),
            // SOURCEFILEPATH is reserved and always undefined.
            _ => None,
        }
    }
}

fn with_trailing_separator(dir: &Path) -> String {
    let mut s = dir.display().to_string();
    if !s.ends_with(std::path::MAIN_SEPARATOR) {
        s.push(std::path::MAIN_SEPARATOR);
    }
    s
}

impl<'a> Resolver for Environment<'a> {
    fn variable(&mut self, prefix: &str, name: &str) -> Result<Option<String>> {
        match prefix {
            "var" => Ok(self.store.get(name).map(str::to_string)),
            "env" => Ok(self.env_vars.get(name)),
            "sys" => Ok(self.system_variable(name)),
            _ => self.extensions.get_variable(prefix, name),
        }
    }

    fn function(&mut self, prefix: &str, name: &str, args: &[String]) -> Result<Option<String>> {
        match prefix {
            "fun" => match name {
                "AutoVersion" => {
                    let base = args.first().map(String::as_str).unwrap_or("");
                    if base.is_empty() {
                        return Err(Error::new(
                            Kind::Semantic,
                            "invalid call to `fun.AutoVersion`: the base version is empty",
                        )
                        .with_note("call the function as `$(fun.AutoVersion(1.0))`"));
                    }
                    Ok(Some(self.build_time.auto_version(base)))
                }
                _ => Ok(None),
            },
            _ => self.extensions.evaluate_function(prefix, name, args),
        }
    }
}
