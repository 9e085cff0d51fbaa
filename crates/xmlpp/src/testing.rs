//! Utilities for writing unit tests
//!
//! This module contains utilities (types, helper functions and a Rust macro)
//!     that make it easier to write unit tests for the preprocessor.
//! In general the main tool used in this module is the [test_suite](crate::test_suite)
//!     Rust macro, which generates a suite of unit tests from a list of
//!     input documents and their expected output or error.
//!
//! Tests run against an [InMemoryFileSystem] rooted at [WORKING_DIRECTORY].

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::Kind;
use crate::include::FileSystem;
use crate::observer::{IfDefEvent, Observer, Warning};
use crate::time::BuildTime;
use crate::variable::Platform;
use crate::Preprocessor;

/// Working directory of preprocessors created by [new_preprocessor].
pub const WORKING_DIRECTORY: &str = "/work";

/// In-memory filesystem for use in unit tests.
///
/// It provides an in-memory system to which "files" can be added before the test runs.
#[derive(Default)]
pub struct InMemoryFileSystem {
    working_directory: PathBuf,
    string_files: HashMap<PathBuf, String>,
}

impl InMemoryFileSystem {
    /// Create a new in-memory file system.
    pub fn new(working_directory: &Path) -> Self {
        Self {
            working_directory: working_directory.into(),
            string_files: Default::default(),
        }
    }

    /// Add a string file to the in-memory file system.
    ///
    /// The provided path is relative to the working directory.
    pub fn add_string_file(&mut self, relative_path: &str, content: &str) {
        let mut path = self.working_directory.clone();
        path.push(relative_path);
        self.string_files.insert(path, content.to_string());
    }
}

impl FileSystem for InMemoryFileSystem {
    fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        match self.string_files.get(path) {
            None => Err(std::io::Error::new(std::io::ErrorKind::NotFound, "not found")),
            Some(content) => Ok(content.clone()),
        }
    }

    fn is_file(&self, path: &Path) -> bool {
        self.string_files.contains_key(path)
    }
}

/// Everything reported to a [RecordingObserver].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Recording {
    pub if_defs: Vec<IfDefEvent>,
    pub included_files: Vec<PathBuf>,
    pub processed_streams: Vec<(PathBuf, String)>,
    pub warnings: Vec<Warning>,
}

/// An observer that records every notification.
///
/// Clones share the same recording, so a clone can be handed to the preprocessor
///     and the original inspected after the run.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    recording: Rc<RefCell<Recording>>,
}

impl RecordingObserver {
    pub fn recording(&self) -> Recording {
        self.recording.borrow().clone()
    }
}

impl Observer for RecordingObserver {
    fn if_def(&mut self, event: &IfDefEvent) {
        self.recording.borrow_mut().if_defs.push(event.clone());
    }

    fn included_file(&mut self, path: &Path) {
        self.recording
            .borrow_mut()
            .included_files
            .push(path.to_path_buf());
    }

    fn processed_stream(&mut self, source: &Path, output: &[u8]) {
        self.recording.borrow_mut().processed_streams.push((
            source.to_path_buf(),
            String::from_utf8_lossy(output).into_owned(),
        ));
    }

    fn warning(&mut self, warning: &Warning) {
        self.recording.borrow_mut().warnings.push(warning.clone());
    }
}

/// Option passed to a test runner.
pub enum TestOption<'a> {
    /// A file in the in-memory file system, relative to the working directory.
    File(&'a str, &'a str),

    /// A variable defined before the document is processed.
    Variable(&'a str, &'a str),

    /// An include search path.
    IncludePath(&'a str),

    /// An environment variable.
    EnvVar(&'a str, &'a str),

    Platform(Platform),

    /// Overrides the default build time of day 9000, second 7200.
    BuildTime(BuildTime),

    /// The provided static function is invoked after the preprocessor is created.
    /// This can be used to provide more custom initialization, such as registering extensions.
    CustomInitialization(fn(&mut Preprocessor)),
}

/// Creates a preprocessor configured by the test options.
///
/// The returned observer records all notifications of the preprocessor.
pub fn new_preprocessor(options: &[TestOption]) -> (Preprocessor, RecordingObserver) {
    let mut preprocessor = Preprocessor::default();
    let mut file_system = InMemoryFileSystem::new(Path::new(WORKING_DIRECTORY));
    let mut env_vars: HashMap<String, String> = HashMap::new();
    let observer = RecordingObserver::default();
    preprocessor.options.build_time = Some(BuildTime::new_with_values(9000, 7200));
    let mut custom_initializations = vec![];
    for option in options {
        match option {
            TestOption::File(path, content) => file_system.add_string_file(path, content),
            TestOption::Variable(name, value) => preprocessor
                .options
                .variables
                .push((name.to_string(), value.to_string())),
            TestOption::IncludePath(path) => preprocessor
                .options
                .include_paths
                .push(Path::new(WORKING_DIRECTORY).join(path)),
            TestOption::EnvVar(name, value) => {
                env_vars.insert(name.to_string(), value.to_string());
            }
            TestOption::Platform(platform) => preprocessor.options.platform = *platform,
            TestOption::BuildTime(build_time) => {
                preprocessor.options.build_time = Some(*build_time)
            }
            TestOption::CustomInitialization(f) => custom_initializations.push(*f),
        }
    }
    preprocessor.file_system = Box::new(file_system);
    preprocessor.env_vars = Box::new(env_vars);
    preprocessor.observer = Box::new(observer.clone());
    preprocessor.working_directory = Some(PathBuf::from(WORKING_DIRECTORY));
    for f in custom_initializations {
        f(&mut preprocessor);
    }
    (preprocessor, observer)
}

/// Run an output test.
///
/// The test passes if preprocessing the input succeeds and produces the expected output.
pub fn run_output_test(input: &str, expected: &str, options: &[TestOption]) {
    let (mut preprocessor, _) = new_preprocessor(options);
    let output = match preprocessor.process_str("input.xml", input) {
        Ok(output) => output,
        Err(err) => {
            println!("{err}");
            panic!("preprocessing failed: {}", err.title());
        }
    };
    assert_eq!(output, expected);
}

/// Run a failure test.
///
/// The test passes if preprocessing the input fails with an error of the expected kind.
pub fn run_failure_test(input: &str, kind: Kind, options: &[TestOption]) {
    let (mut preprocessor, _) = new_preprocessor(options);
    match preprocessor.process_str("input.xml", input) {
        Ok(output) => panic!("expected preprocessing to fail, but it produced {output:?}"),
        Err(err) => {
            println!("{err}");
            assert_eq!(err.kind(), kind, "unexpected error: {}", err.title());
        }
    }
}

/// Macro to generate a suite of unit tests
///
/// The general use of this macro is as follows:
/// ```
/// # use xmlpp::testing::*;
/// # use xmlpp::error::Kind;
/// xmlpp::test_suite![
///     options(TestOption::Variable("Name", "world")),
///     output_tests(
///         (case_1, "<a>hello $(var.Name)</a>", "<a>hello world</a>"),
///     ),
///     failure_tests(
///         (case_2, "<a>$(var.Missing)</a>", Kind::UndefinedReference),
///     ),
/// ];
/// ```
/// The options and the list of test kinds are optional.
/// Output tests give a name, an input document and the expected output.
/// Failure tests give a name, an input document and the expected [Kind] of error.
#[macro_export]
macro_rules! test_suite {
    ( options $options: tt, output_tests ( $( ($name: ident, $input: expr, $want: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let options: Vec<$crate::testing::TestOption> = vec! $options;
                $crate::testing::run_output_test($input, $want, &options);
            }
        )*
    );
    ( options $options: tt, output_tests $test_body: tt $(,)? ) => (
        compile_error!("Invalid test cases for output_tests: must be a list of tuples (name, input, expected output)");
    );
    ( options $options: tt, failure_tests ( $( ($name: ident, $input: expr, $kind: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let options: Vec<$crate::testing::TestOption> = vec! $options;
                $crate::testing::run_failure_test($input, $kind, &options);
            }
        )*
    );
    ( options $options: tt, failure_tests $test_body: tt $(,)? ) => (
        compile_error!("Invalid test cases for failure_tests: must be a list of tuples (name, input, error kind)");
    );
    ( options $options: tt, $test_kind: ident $test_cases: tt $(,)? ) => (
        compile_error!("Invalid keyword: test_suite! only accepts the following keywords: `options`, `output_tests`, `failure_tests`");
    );
    ( options $options: tt, $( $test_kind: ident $test_cases: tt ),+ $(,)? ) => (
        $(
            $crate::test_suite![options $options, $test_kind $test_cases,];
        )+
    );
    ( $( $test_kind: ident $test_cases: tt ),+ $(,)? ) => (
        $crate::test_suite![options (), $( $test_kind $test_cases, )+ ];
    );
}
