//! Substitution of `$(...)` references in text
//!
//! The substitution engine scans text for `$` characters:
//!
//! - `$$` is replaced by a single `$`.
//! - `$(loc.name)` is left as is. These references are resolved by later tooling.
//! - `$(prefix.name)` is replaced by the value of the variable.
//! - `$(prefix.name(arg1, arg2))` is replaced by the result of the function call.
//!     Arguments are split on commas, trimmed, and substituted before the call.
//! - any other `$` is kept literally.

use crate::error::{Error, Kind, Result};
use crate::variable::{self, Resolver};

/// Substitutes all references in the text.
pub fn substitute(text: &str, resolver: &mut dyn Resolver) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(i) = rest.find('$') {
        out.push_str(&rest[..i]);
        let tail = &rest[i..];
        if tail.starts_with("$$") {
            out.push('$');
            rest = &tail[2..];
        } else if tail.starts_with("$(loc.") {
            let end = tail.find(')').ok_or_else(|| unmatched_parenthesis(tail))?;
            out.push_str(&tail[..=end]);
            rest = &tail[end + 1..];
        } else if tail.starts_with("$(") {
            let end = reference_end(tail).ok_or_else(|| unmatched_parenthesis(tail))?;
            let body = &tail[2..end];
            match expand_reference(body, resolver)? {
                Some(value) => out.push_str(&value),
                None => return Err(undefined(body)),
            }
            rest = &tail[end + 1..];
        } else {
            out.push('$');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Returns the byte index of the paren closing a reference that starts with `$(`.
pub(crate) fn reference_end(s: &str) -> Option<usize> {
    let mut depth = 0_usize;
    for (i, c) in s.char_indices().skip(1) {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Expands the body of a `$(...)` reference.
///
/// Returns [None] if the variable or function is undefined.
pub(crate) fn expand_reference(body: &str, resolver: &mut dyn Resolver) -> Result<Option<String>> {
    if body.contains('(') {
        evaluate_function(body, resolver)
    } else {
        variable::lookup(resolver, body, false)
    }
}

/// Evaluates a function call of the form `prefix.name(args)`.
///
/// If no function matches, the whole call is looked up as a variable.
/// This allows references like `$(env.ProgramFiles(x86))`.
pub fn evaluate_function(call: &str, resolver: &mut dyn Resolver) -> Result<Option<String>> {
    let (prefix, rest) = match call.split_once('.') {
        Some((prefix, rest)) if !prefix.is_empty() && !rest.is_empty() => (prefix, rest),
        _ => return Err(invalid_function(call)),
    };
    let (name, args) = match rest.split_once('(') {
        Some((name, args)) if !name.is_empty() && args.ends_with(')') => {
            (name, &args[..args.len() - 1])
        }
        _ => return Err(invalid_function(call)),
    };
    let args = args
        .split(',')
        .map(|arg| substitute(arg.trim(), resolver))
        .collect::<Result<Vec<String>>>()?;
    match resolver.function(prefix, name, &args)? {
        Some(value) => Ok(Some(value)),
        None => variable::lookup(resolver, call, false),
    }
}

fn invalid_function(call: &str) -> Box<Error> {
    Error::new(
        Kind::Syntax,
        format!("invalid preprocessor function `{call}`"),
    )
    .with_note("function calls have the form `prefix.name(arguments)`")
}

fn unmatched_parenthesis(text: &str) -> Box<Error> {
    Error::new(
        Kind::Syntax,
        format!("unmatched parenthesis in reference `{text}`"),
    )
}

fn undefined(body: &str) -> Box<Error> {
    let what = if body.contains('(') {
        "function"
    } else {
        "variable"
    };
    Error::new(
        Kind::UndefinedReference,
        format!("undefined preprocessor {what} `$({body})`"),
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Resolver with a fixed set of variables and two functions in the `t` namespace.
    #[derive(Default)]
    pub(crate) struct TestResolver {
        pub variables: HashMap<String, String>,
    }

    impl TestResolver {
        pub(crate) fn new(variables: &[(&str, &str)]) -> TestResolver {
            TestResolver {
                variables: variables
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            }
        }
    }

    impl Resolver for TestResolver {
        fn variable(&mut self, prefix: &str, name: &str) -> Result<Option<String>> {
            Ok(self.variables.get(&format!("{prefix}.{name}")).cloned())
        }

        fn function(
            &mut self,
            prefix: &str,
            name: &str,
            args: &[String],
        ) -> Result<Option<String>> {
            Ok(match (prefix, name) {
                ("t", "join") => Some(args.join("|")),
                ("t", "upper") => Some(args.concat().to_uppercase()),
                _ => None,
            })
        }
    }

    fn run(text: &str) -> Result<String> {
        let mut resolver = TestResolver::new(&[
            ("var.A", "alpha"),
            ("var.Csv", "x,y"),
            ("env.ProgramFiles(x86)", "C:\\Program Files (x86)"),
        ]);
        substitute(text, &mut resolver)
    }

    macro_rules! substitute_tests {
        ( $( ($name: ident, $input: expr, $want: expr $(,)? ) ),* $(,)? ) => {
            $(
                #[test]
                fn $name() {
                    assert_eq!(run($input).unwrap(), $want);
                }
            )*
        };
    }

    substitute_tests!(
        (plain_text, "no references", "no references"),
        (variable, "a=$(var.A);", "a=alpha;"),
        (escaped_dollar, "price: $$5", "price: $5"),
        (escaped_reference, "$$(var.A)", "$(var.A)"),
        (floating_dollar, "cost $ 5 and $x", "cost $ 5 and $x"),
        (trailing_dollar, "end$", "end$"),
        (localization_reference_kept, "$(loc.Title) $(var.A)", "$(loc.Title) alpha"),
        (function_call, "$(t.join(a, b ,c))", "a|b|c"),
        (function_arguments_substituted, "$(t.upper($(var.A)))", "ALPHA"),
        (argument_values_not_split, "$(t.join($(var.Csv), z))", "x,y|z"),
        (parens_in_variable_name, "$(env.ProgramFiles(x86))", "C:\\Program Files (x86)"),
        (adjacent_references, "$(var.A)$(var.A)", "alphaalpha"),
        (unicode_text, "é $(var.A) ü", "é alpha ü"),
    );

    #[test]
    fn undefined_variable() {
        let err = run("$(var.Missing)").unwrap_err();
        assert_eq!(err.kind(), Kind::UndefinedReference);
        assert_eq!(err.title(), "undefined preprocessor variable `$(var.Missing)`");
    }

    #[test]
    fn undefined_function() {
        let err = run("$(t.missing(1))").unwrap_err();
        assert_eq!(err.kind(), Kind::UndefinedReference);
        assert_eq!(err.title(), "undefined preprocessor function `$(t.missing(1))`");
    }

    #[test]
    fn missing_prefix() {
        assert_eq!(run("$(A)").unwrap_err().kind(), Kind::Syntax);
    }

    #[test]
    fn unmatched_parenthesis() {
        assert_eq!(run("$(var.A").unwrap_err().kind(), Kind::Syntax);
        assert_eq!(run("$(t.join(a)").unwrap_err().kind(), Kind::Syntax);
        assert_eq!(run("$(loc.A").unwrap_err().kind(), Kind::Syntax);
    }

    #[test]
    fn malformed_function() {
        assert_eq!(run("$(join(a))").unwrap_err().kind(), Kind::Syntax);
        assert_eq!(run("$(t.(a))").unwrap_err().kind(), Kind::Syntax);
        assert_eq!(run("$(t.join(a)b)").unwrap_err().kind(), Kind::Syntax);
    }

    #[test]
    fn reference_end_nested() {
        assert_eq!(reference_end("$(a.b(c(d)))e"), Some(11));
        assert_eq!(reference_end("$(a.b(c)"), None);
    }
}
