use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use xmlpp::{Options, Platform, Preprocessor};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .init();

    let cli = Cli::parse();
    // Deeply nested includes recurse deeply.
    let result = std::thread::Builder::new()
        .stack_size(STACK_SIZE)
        .spawn(move || cli.run())
        .map_err(|err| format!("Failed to start the preprocessor: {err}"))
        .and_then(|handle| {
            handle
                .join()
                .unwrap_or_else(|_| Err("The preprocessor panicked".to_string()))
        });
    if let Err(err) = result {
        if !err.is_empty() {
            eprintln!("{err}");
        }
        std::process::exit(1);
    }
}

const STACK_SIZE: usize = 512 * 1024 * 1024;

/// Preprocess an XML document.
///
/// Processing instructions such as `<?define Name = Value?>`, `<?if ...?>`,
///     `<?foreach ...?>` and `<?include ...?>` are executed, and
///     `$(prefix.name)` references in text and attribute values are substituted.
#[derive(Debug, Parser)]
#[command(name = "xmlpp", version, about, long_about, max_term_width(100))]
struct Cli {
    /// Path to the document to preprocess.
    input: PathBuf,

    /// Output path for the preprocessed document.
    ///
    /// If the output path is not specified,
    ///     the preprocessed document is printed to standard out.
    output: Option<PathBuf>,

    /// Directory searched for included files.
    ///
    /// May be given multiple times; directories are searched in order
    ///     after the directory of the including file.
    #[arg(short = 'I', long = "include-path", value_name = "DIR")]
    include_paths: Vec<PathBuf>,

    /// Variable defined before the document is processed.
    #[arg(short = 'd', long = "define", value_name = "NAME=VALUE", value_parser = parse_define)]
    defines: Vec<(String, String)>,

    /// Value of `sys.BUILDARCH`: one of x86, x64, ia64 or arm.
    #[arg(short = 'a', long = "arch", default_value = "x86")]
    arch: Platform,

    /// Allow output that is not a document with a single root element.
    ///
    /// For example, a top-level `foreach` may produce several sibling elements.
    #[arg(long)]
    fragment: bool,
}

fn parse_define(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("`{s}` is not of the form NAME=VALUE")),
    }
}

impl Cli {
    fn run(self) -> Result<(), String> {
        let mut preprocessor = Preprocessor::new(Options {
            include_paths: self.include_paths,
            platform: self.arch,
            variables: self.defines,
            build_time: None,
            check_well_formed: !self.fragment,
        });
        let output = match preprocessor.process_file(&self.input) {
            Ok(output) => output,
            Err(err) => {
                print_error(&err);
                return Err("".into());
            }
        };
        match self.output {
            None => println!("{output}"),
            Some(path) => {
                tracing::debug!(path = %path.display(), "writing output");
                if let Err(err) = std::fs::write(&path, output) {
                    return Err(format!("Failed to write `{}`: {}", path.display(), err));
                }
            }
        }
        Ok(())
    }
}

fn print_error(err: &xmlpp::Error) {
    use ariadne::{Color, Config, IndexType, Label, Report, ReportKind, Source};
    let trace = match err.trace() {
        None => {
            eprintln!("{}: {}", "error".red().bold(), err.title());
            for note in err.notes() {
                eprintln!("  = note: {note}");
            }
            return;
        }
        Some(trace) => trace,
    };
    let name = trace.name.as_str();
    let mut span = trace.span.clone();
    if span.is_empty() && span.start > 0 {
        span.start -= 1;
    }
    let mut builder = Report::build(ReportKind::Error, (name, span.clone()))
        .with_config(Config::default().with_index_type(IndexType::Byte))
        .with_message(format!("{}: {}", err.kind(), err.title()))
        .with_label(
            Label::new((name, span))
                .with_message(err.title())
                .with_color(Color::Red),
        );
    for note in err.notes() {
        builder = builder.with_note(note);
    }
    let source = Source::from(trace.source.to_string());
    if builder.finish().eprint((name, source)).is_err() {
        eprintln!("{err}");
    }
}
