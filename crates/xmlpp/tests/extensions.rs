use std::cell::RefCell;
use std::rc::Rc;

use xmlpp::error::Kind;
use xmlpp::node::{Attribute, Node, Writer};
use xmlpp::testing::*;
use xmlpp::{Extension, Preprocessor, Result, Warning};

/// Extension for the `build` prefix.
///
/// - `$(build.Number)` is 42.
/// - `$(build.Join(a, b))` joins its arguments with `-`.
/// - `<?pragma build.stamp name?>` writes a `<Stamp Name="name"/>` element.
/// - `<?pragma build.note text?>` writes the text `note: text`.
#[derive(Default)]
struct BuildExtension {
    calls: Rc<RefCell<Vec<String>>>,
}

impl Extension for BuildExtension {
    fn prefixes(&self) -> Vec<String> {
        vec!["build".into()]
    }

    fn get_variable(&self, _: &str, name: &str) -> Result<Option<String>> {
        Ok(match name {
            "Number" => Some("42".into()),
            _ => None,
        })
    }

    fn evaluate_function(&self, _: &str, name: &str, args: &[String]) -> Result<Option<String>> {
        Ok(match name {
            "Join" => Some(args.join("-")),
            _ => None,
        })
    }

    fn process_pragma(
        &mut self,
        _: &str,
        name: &str,
        args: &str,
        writer: &mut Writer,
    ) -> Result<bool> {
        match name {
            "stamp" => writer.write_node(&Node::StartElement {
                name: "Stamp".into(),
                attributes: vec![Attribute::new("Name", args)],
                empty: true,
            })?,
            "note" => writer.write_text(&format!("note: {args}"))?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn initialize(&mut self) {
        self.calls.borrow_mut().push("initialize".into());
    }

    fn finalize(&mut self) {
        self.calls.borrow_mut().push("finalize".into());
    }
}

fn register_build_extension(preprocessor: &mut Preprocessor) {
    preprocessor
        .register_extension(Box::<BuildExtension>::default())
        .unwrap();
}

xmlpp::test_suite![
    options(TestOption::CustomInitialization(register_build_extension)),
    output_tests(
        (extension_variable, "<a>$(build.Number)</a>", "<a>42</a>"),
        (extension_variable_in_attribute, "<a n=\"#$(build.Number)\"/>", "<a n=\"#42\"/>"),
        (extension_function, "<a>$(build.Join(x, $(build.Number), y))</a>", "<a>x-42-y</a>"),
        (
            extension_variable_in_condition,
            "<a><?if $(build.Number) >= 40?>big<?endif?></a>",
            "<a>big</a>"
        ),
        (
            ifdef_extension_variable,
            "<a><?ifdef build.Number?>x<?endif?><?ifdef build.Other?>y<?endif?></a>",
            "<a>x</a>"
        ),
        (
            extension_pragma,
            "<a><?define N = one?><?pragma build.stamp $(var.N)?></a>",
            "<a><Stamp Name=\"one\"/></a>"
        ),
        (
            extension_pragma_in_false_branch,
            "<a><?if 1 = 2?><?pragma build.stamp x?><?endif?></a>",
            "<a></a>"
        ),
        (
            extension_pragma_in_foreach,
            "<a><?foreach v in 1;2?><?pragma build.stamp $(var.v)?><?endforeach?></a>",
            "<a><Stamp Name=\"1\"/><Stamp Name=\"2\"/></a>"
        ),
        (unhandled_extension_pragma, "<a><?pragma build.other?></a>", "<a></a>"),
        (extension_pragma_text, "<a><?pragma build.note 1 < 2?></a>", "<a>note: 1 &lt; 2</a>"),
    ),
    failure_tests(
        (undefined_extension_variable, "<a>$(build.Other)</a>", Kind::UndefinedReference),
        (undefined_extension_function, "<a>$(build.Other(1))</a>", Kind::UndefinedReference),
    ),
];

#[test]
fn initialize_and_finalize_once_per_run() {
    let (mut preprocessor, _) = new_preprocessor(&[]);
    let extension = BuildExtension::default();
    let calls = extension.calls.clone();
    preprocessor.register_extension(Box::new(extension)).unwrap();

    preprocessor.process_str("first.xml", "<a/>").unwrap();
    assert_eq!(*calls.borrow(), vec!["initialize", "finalize"]);

    preprocessor.process_str("second.xml", "<a/>").unwrap();
    assert_eq!(calls.borrow().len(), 4);
}

#[test]
fn finalize_after_failed_run() {
    let (mut preprocessor, _) = new_preprocessor(&[]);
    let extension = BuildExtension::default();
    let calls = extension.calls.clone();
    preprocessor.register_extension(Box::new(extension)).unwrap();

    let err = preprocessor
        .process_str("input.xml", "<a><?error stop?></a>")
        .unwrap_err();
    assert_eq!(err.kind(), Kind::User);
    assert_eq!(*calls.borrow(), vec!["initialize", "finalize"]);
}

#[test]
fn unhandled_pragma_warns() {
    let (mut preprocessor, observer) = new_preprocessor(&[]);
    register_build_extension(&mut preprocessor);
    preprocessor
        .process_str("input.xml", "<a><?pragma build.other x?><?pragma build.stamp x?></a>")
        .unwrap();
    assert_eq!(
        observer.recording().warnings,
        vec![Warning::UnknownPragma("build.other".into())]
    );
}

#[test]
fn duplicate_prefix() {
    let (mut preprocessor, _) = new_preprocessor(&[]);
    register_build_extension(&mut preprocessor);
    let err = preprocessor
        .register_extension(Box::<BuildExtension>::default())
        .unwrap_err();
    assert_eq!(err.kind(), Kind::Extension);
}

#[test]
fn reserved_prefix() {
    struct Shadow;
    impl Extension for Shadow {
        fn prefixes(&self) -> Vec<String> {
            vec!["var".into()]
        }
    }
    let (mut preprocessor, _) = new_preprocessor(&[]);
    let err = preprocessor.register_extension(Box::new(Shadow)).unwrap_err();
    assert_eq!(err.kind(), Kind::Extension);
}

#[test]
fn extension_errors_propagate() {
    struct Failing;
    impl Extension for Failing {
        fn prefixes(&self) -> Vec<String> {
            vec!["fail".into()]
        }
        fn get_variable(&self, _: &str, name: &str) -> Result<Option<String>> {
            Err(xmlpp::Error::new(Kind::Extension, format!("cannot compute `{name}`")))
        }
    }
    let (mut preprocessor, _) = new_preprocessor(&[]);
    preprocessor.register_extension(Box::new(Failing)).unwrap();
    let err = preprocessor
        .process_str("input.xml", "<a>\n$(fail.Value)</a>")
        .unwrap_err();
    assert_eq!(err.kind(), Kind::Extension);
    assert_eq!(err.title(), "cannot compute `Value`");
    assert_eq!(err.trace().unwrap().line_and_column().0, 1);
}
