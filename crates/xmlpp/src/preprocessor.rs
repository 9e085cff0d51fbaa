//! The preprocessing pipeline
//!
//! A [Preprocessor] walks a document once, top to bottom.
//! Conditional directives are always interpreted so that nesting is tracked,
//!     even inside branches that are not emitted.
//! Every other node is dropped if the current branch is not emitted.
//! Emitted directives are executed, and emitted markup has its text and
//!     attribute values substituted before it is written.
//!
//! Included files and foreach loop bodies are processed by recursively
//!     re-entering the pipeline with the same variables and the same output.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::conditional;
use crate::directive::{self, Directive};
use crate::error::{Error, Kind, Result, Trace};
use crate::expression;
use crate::extension::{Extension, Registry};
use crate::foreach;
use crate::include::{self, FileSystem, RealFileSystem};
use crate::node::{self, Node};
use crate::observer::{IfDefEvent, LoggingObserver, Observer, Warning};
use crate::substitute;
use crate::time::BuildTime;
use crate::variable::{self, EnvVars, Environment, Platform, ProcessEnvVars, Store};

/// Options of a preprocessing run.
#[derive(Debug, Default, Clone)]
pub struct Options {
    /// Directories searched for included files, in order.
    pub include_paths: Vec<PathBuf>,
    /// Value of `sys.BUILDARCH`.
    pub platform: Platform,
    /// Variables defined before the document is processed.
    pub variables: Vec<(String, String)>,
    /// Time used by `fun.AutoVersion`. Defaults to the time the run starts.
    pub build_time: Option<BuildTime>,
    /// Whether the output must be a document with exactly one root element.
    ///
    /// Off by default: the output may be a fragment that a host parses further.
    pub check_well_formed: bool,
}

/// The preprocessor.
///
/// The file system, environment variables and observer are public so that they
///     can be replaced, for example in unit tests.
pub struct Preprocessor {
    pub options: Options,
    pub file_system: Box<dyn FileSystem>,
    pub env_vars: Box<dyn EnvVars>,
    pub observer: Box<dyn Observer>,
    /// Directory used to resolve relative paths; also the value of `sys.CURRENTDIR`.
    pub working_directory: Option<PathBuf>,
    extensions: Registry,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Preprocessor::new(Options::default())
    }
}

impl Preprocessor {
    pub fn new(options: Options) -> Preprocessor {
        Preprocessor {
            options,
            file_system: Box::new(RealFileSystem),
            env_vars: Box::new(ProcessEnvVars),
            observer: Box::new(LoggingObserver),
            working_directory: std::env::current_dir().ok(),
            extensions: Default::default(),
        }
    }

    /// Registers an extension.
    ///
    /// Fails if another extension already handles one of its prefixes.
    pub fn register_extension(&mut self, extension: Box<dyn Extension>) -> Result<()> {
        self.extensions.register(extension)
    }

    /// Preprocesses the file at the path.
    pub fn process_file(&mut self, path: &Path) -> Result<String> {
        let path = match &self.working_directory {
            None => path.to_path_buf(),
            Some(working_directory) => working_directory.join(path),
        };
        let source = include::read(self.file_system.as_ref(), &path)?;
        let name = path.display().to_string();
        self.run(Some(path), name, &source)
    }

    /// Preprocesses a document held in memory.
    ///
    /// The name is used in error messages.
    /// Relative include paths are resolved against the working directory.
    pub fn process_str(&mut self, name: &str, source: &str) -> Result<String> {
        self.run(None, name.to_string(), source)
    }

    fn run(&mut self, file: Option<PathBuf>, name: String, source: &str) -> Result<String> {
        self.extensions.initialize();
        let result = self.run_with_extensions(file, name, source);
        self.extensions.finalize();
        result
    }

    fn run_with_extensions(
        &mut self,
        file: Option<PathBuf>,
        name: String,
        source: &str,
    ) -> Result<String> {
        tracing::debug!(source = name.as_str(), "preprocessing");
        let mut run = Run {
            options: &self.options,
            file_system: self.file_system.as_ref(),
            env_vars: self.env_vars.as_ref(),
            observer: self.observer.as_mut(),
            extensions: &mut self.extensions,
            working_directory: self.working_directory.as_deref(),
            build_time: self.options.build_time.unwrap_or_else(BuildTime::now),
            include_paths: self
                .options
                .include_paths
                .iter()
                .map(|path| absolute(self.working_directory.as_deref(), path))
                .collect(),
            store: Store::default(),
            includes: include::Stack::new(file.clone()),
        };
        for (variable, value) in &run.options.variables {
            run.store.define(variable.as_str(), value.as_str());
        }
        let mut writer = node::Writer::new();
        run.process_source(&name, Rc::from(source), Mode::Document, &mut writer)?;
        let output = writer.into_string()?;
        let source_path = file.unwrap_or_else(|| PathBuf::from(&name));
        run.observer.processed_stream(&source_path, output.as_bytes());
        if run.options.check_well_formed {
            node::check_well_formed(&output).map_err(|err| {
                err.with_note("the preprocessed output is not a well-formed document")
            })?;
        }
        Ok(output)
    }
}

/// Joins a relative path onto the working directory.
fn absolute(working_directory: Option<&Path>, path: &Path) -> PathBuf {
    match working_directory {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Document,
    Include,
    Fragment,
}

/// A node stream being processed.
struct Stream<'s> {
    name: &'s str,
    source: &'s Rc<str>,
    reader: node::Reader<'s>,
    conditionals: conditional::Stack,
    mode: Mode,
}

impl<'s> Stream<'s> {
    fn trace(&self, span: std::ops::Range<usize>) -> Trace {
        Trace {
            name: self.name.to_string(),
            source: self.source.clone(),
            span,
        }
    }
}

/// State of a single preprocessing run.
struct Run<'p> {
    options: &'p Options,
    file_system: &'p dyn FileSystem,
    env_vars: &'p dyn EnvVars,
    observer: &'p mut dyn Observer,
    extensions: &'p mut Registry,
    working_directory: Option<&'p Path>,
    build_time: BuildTime,
    /// Include search paths, made absolute.
    include_paths: Vec<PathBuf>,
    store: Store,
    includes: include::Stack,
}

impl<'p> Run<'p> {
    fn environment(&mut self) -> Environment<'_> {
        Environment {
            store: &self.store,
            extensions: &*self.extensions,
            env_vars: self.env_vars,
            platform: self.options.platform,
            build_time: self.build_time,
            working_directory: self.working_directory,
            source_file: self.includes.current(),
            observer: &mut *self.observer,
        }
    }

    fn substitute(&mut self, text: &str) -> Result<String> {
        substitute::substitute(text, &mut self.environment())
    }

    fn process_source(
        &mut self,
        name: &str,
        source: Rc<str>,
        mode: Mode,
        writer: &mut node::Writer,
    ) -> Result<()> {
        let mut stream = Stream {
            name,
            source: &source,
            reader: node::Reader::new(&source),
            conditionals: Default::default(),
            mode,
        };
        loop {
            let start = stream.reader.position();
            let (node, span) = match stream.reader.read_node() {
                Ok(Some(next)) => next,
                Ok(None) => break,
                Err(err) => {
                    let end = stream.reader.position();
                    return Err(err.with_trace(stream.trace(start..end)));
                }
            };
            self.process_node(&mut stream, node, writer)
                .map_err(|err| err.with_trace(stream.trace(span)))?;
        }
        stream.conditionals.finish().map_err(|err| {
            let end = source.len();
            err.with_trace(stream.trace(end..end))
        })
    }

    fn process_node(
        &mut self,
        stream: &mut Stream,
        node: Node,
        writer: &mut node::Writer,
    ) -> Result<()> {
        match node {
            Node::ProcessingInstruction { target, data } => match Directive::parse(&target) {
                Some(directive) if directive.is_conditional() => {
                    self.process_conditional(stream, directive, &data)
                }
                Some(_) | None if !stream.conditionals.emitting() => Ok(()),
                Some(directive) => self.process_directive(stream, directive, &data, writer),
                None => writer.write_node(&Node::ProcessingInstruction { target, data }),
            },
            node => self.process_markup(stream, node, writer),
        }
    }

    fn process_conditional(
        &mut self,
        stream: &mut Stream,
        directive: Directive,
        data: &str,
    ) -> Result<()> {
        let conditionals = &mut stream.conditionals;
        match directive {
            Directive::If => conditionals.push_if(|| self.evaluate(data)),
            Directive::IfDef => conditionals.push_if(|| self.is_defined(data, true)),
            Directive::IfNDef => conditionals.push_if(|| self.is_defined(data, false)),
            Directive::ElseIf => conditionals.else_if(|| self.evaluate(data)),
            Directive::Else => conditionals.else_(),
            Directive::EndIf => conditionals.end_if(),
            _ => Ok(()),
        }
    }

    fn evaluate(&mut self, expression: &str) -> Result<bool> {
        expression::evaluate(expression, &mut self.environment())
    }

    fn is_defined(&mut self, name: &str, is_ifdef: bool) -> Result<bool> {
        let name = name.trim();
        let is_defined = variable::lookup(&mut self.environment(), name, true)?.is_some();
        self.observer.if_def(&IfDefEvent {
            is_ifdef,
            is_defined,
            name: name.to_string(),
        });
        Ok(is_defined == is_ifdef)
    }

    fn process_directive(
        &mut self,
        stream: &mut Stream,
        directive: Directive,
        data: &str,
        writer: &mut node::Writer,
    ) -> Result<()> {
        match directive {
            Directive::Define => {
                let (name, value) = directive::parse_define(data)?;
                let value = self.substitute(value)?;
                tracing::debug!(name, value = value.as_str(), "define");
                if let Some(old_value) = self.store.define(name, value.as_str()) {
                    self.observer.warning(&Warning::Redefinition {
                        name: name.to_string(),
                        old_value,
                        new_value: value,
                    });
                }
                Ok(())
            }
            Directive::Undef => {
                let name = self.substitute(data.trim())?;
                let name = name.strip_prefix("var.").unwrap_or(&name);
                tracing::debug!(name, "undef");
                match self.store.undefine(name) {
                    Some(_) => Ok(()),
                    None => Err(Error::new(
                        Kind::Semantic,
                        format!("cannot undefine variable `{name}`: it is not defined"),
                    )),
                }
            }
            Directive::Error => Err(Error::new(Kind::User, self.substitute(data)?)),
            Directive::Warning => {
                let message = self.substitute(data)?;
                self.observer.warning(&Warning::User(message));
                Ok(())
            }
            Directive::Pragma => self.pragma(data, writer),
            Directive::Include => self.include(data, writer),
            Directive::Foreach => self.foreach(stream, data, writer),
            Directive::EndForeach => {
                Err(Error::new(Kind::Semantic, "unmatched `endforeach` directive")
                    .with_note("there is no open `foreach`"))
            }
            _ => Ok(()),
        }
    }

    fn pragma(&mut self, data: &str, writer: &mut node::Writer) -> Result<()> {
        let (name, args) = directive::parse_pragma(data)?;
        let args = self.substitute(args)?;
        let handled = match name.split_once('.') {
            Some((prefix, pragma)) if !prefix.is_empty() && !pragma.is_empty() => {
                match self.extensions.get_mut(prefix) {
                    None => false,
                    Some(extension) => {
                        extension.process_pragma(prefix, pragma, args.trim(), writer)?
                    }
                }
            }
            _ => false,
        };
        if !handled {
            self.observer.warning(&Warning::UnknownPragma(name.to_string()));
        }
        Ok(())
    }

    fn include(&mut self, data: &str, writer: &mut node::Writer) -> Result<()> {
        let path = self.substitute(data)?;
        let path = directive::unquote(path.trim());
        let current_dir = match self.includes.current() {
            Some(file) => file.parent(),
            None => self.working_directory,
        };
        let resolved = include::resolve(self.file_system, path, current_dir, &self.include_paths)?;
        let resolved = absolute(self.working_directory, &resolved);
        self.includes.push(resolved.clone())?;
        tracing::debug!(path = %resolved.display(), depth = self.includes.depth(), "include");
        let result = include::read(self.file_system, &resolved).and_then(|source| {
            let name = resolved.display().to_string();
            self.process_source(&name, Rc::from(source), Mode::Include, writer)
        });
        if result.is_ok() {
            self.observer.included_file(&resolved);
        }
        self.includes.pop();
        result
    }

    fn foreach(
        &mut self,
        stream: &mut Stream,
        data: &str,
        writer: &mut node::Writer,
    ) -> Result<()> {
        let (variable, values) = directive::parse_foreach(data)?;
        let values = self.substitute(values)?;
        let fragment: Rc<str> = Rc::from(foreach::capture(&mut stream.reader)?);
        for value in values.split(';') {
            tracing::debug!(variable, value, "foreach iteration");
            self.store.define(variable, value);
            let name = format!("{} (foreach {variable}={value})", stream.name);
            self.process_source(&name, fragment.clone(), Mode::Fragment, writer)?;
        }
        Ok(())
    }

    fn process_markup(
        &mut self,
        stream: &mut Stream,
        node: Node,
        writer: &mut node::Writer,
    ) -> Result<()> {
        let depth = stream.reader.depth();
        let top_level = match &node {
            Node::StartElement { empty: false, .. } => depth == 1,
            _ => depth == 0,
        };
        if top_level && stream.mode != Mode::Fragment {
            match &node {
                Node::Text(text) if text.trim().is_empty() => return Ok(()),
                Node::StartElement { name, .. } if stream.mode == Mode::Include => {
                    if name != include::INCLUDE_ROOT_ELEMENT {
                        return Err(Error::new(
                            Kind::Semantic,
                            format!("invalid document element `{name}` in included file"),
                        )
                        .with_note(format!(
                            "the root element of an included file must be `{}`",
                            include::INCLUDE_ROOT_ELEMENT
                        )));
                    }
                    return Ok(());
                }
                Node::EndElement { .. } if stream.mode == Mode::Include => return Ok(()),
                _ => {}
            }
        }
        if !stream.conditionals.emitting() {
            return Ok(());
        }
        let node = match node {
            Node::StartElement {
                name,
                attributes,
                empty,
            } => {
                let mut substituted = Vec::with_capacity(attributes.len());
                for attribute in attributes {
                    substituted.push(node::Attribute {
                        value: self.substitute(&attribute.value)?,
                        name: attribute.name,
                    });
                }
                Node::StartElement {
                    name,
                    attributes: substituted,
                    empty,
                }
            }
            Node::Text(text) => Node::Text(self.substitute(&text)?),
            Node::CData(text) => Node::CData(self.substitute(&text)?),
            node => node,
        };
        writer.write_node(&node)
    }
}
