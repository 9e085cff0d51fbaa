//! Parsing of directive processing instructions

use crate::error::{Error, Kind, Result};

/// The processing instructions recognized by the preprocessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    If,
    IfDef,
    IfNDef,
    ElseIf,
    Else,
    EndIf,
    Define,
    Undef,
    Include,
    Foreach,
    EndForeach,
    Pragma,
    Error,
    Warning,
}

impl Directive {
    /// Returns the directive for a processing instruction target.
    pub fn parse(target: &str) -> Option<Directive> {
        Some(match target {
            "if" => Directive::If,
            "ifdef" => Directive::IfDef,
            "ifndef" => Directive::IfNDef,
            "elseif" => Directive::ElseIf,
            "else" => Directive::Else,
            "endif" => Directive::EndIf,
            "define" => Directive::Define,
            "undef" => Directive::Undef,
            "include" => Directive::Include,
            "foreach" => Directive::Foreach,
            "endforeach" => Directive::EndForeach,
            "pragma" => Directive::Pragma,
            "error" => Directive::Error,
            "warning" => Directive::Warning,
            _ => return None,
        })
    }

    /// Whether the directive is handled even inside branches that are not emitting.
    pub fn is_conditional(self) -> bool {
        matches!(
            self,
            Directive::If
                | Directive::IfDef
                | Directive::IfNDef
                | Directive::ElseIf
                | Directive::Else
                | Directive::EndIf
        )
    }
}

/// Parses the body of a `define` directive: `[var.]name[=value]`.
///
/// Returns the name without the `var.` prefix and the unsubstituted value
///     with one layer of matching quotes removed.
pub fn parse_define(text: &str) -> Result<(&str, &str)> {
    let (name, value) = match text.split_once('=') {
        Some((name, value)) if !value.trim().is_empty() => (name.trim(), value.trim()),
        _ => (text.trim(), ""),
    };
    let name = name.strip_prefix("var.").unwrap_or(name);
    if name.is_empty() {
        return Err(Error::new(
            Kind::Syntax,
            format!("illegal define `{}`: missing variable name", text.trim()),
        )
        .with_note("define directives have the form `<?define Name = Value?>`"));
    }
    Ok((name, unquote(value)))
}

/// Parses the body of a `pragma` directive: `prefix.name args`.
///
/// The name runs until the first whitespace or opening paren.
/// The arguments are returned unsubstituted and untrimmed.
pub fn parse_pragma(text: &str) -> Result<(&str, &str)> {
    let text = text.trim_start();
    if text.trim().is_empty() {
        return Err(Error::new(Kind::Syntax, "illegal pragma: missing pragma name")
            .with_note("pragma directives have the form `<?pragma prefix.name arguments?>`"));
    }
    Ok(match text.find(|c: char| c.is_whitespace() || c == '(') {
        None => (text, ""),
        Some(i) => text.split_at(i),
    })
}

/// Parses the body of a `foreach` directive: `name in value1;value2`.
///
/// The list of values is returned unsubstituted.
pub fn parse_foreach(text: &str) -> Result<(&str, &str)> {
    let illegal = || {
        Error::new(Kind::Syntax, format!("illegal foreach `{}`", text.trim()))
            .with_note("foreach directives have the form `<?foreach Name in Value1;Value2?>`")
    };
    let (name, values) = text.split_once(" in ").ok_or_else(illegal)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(illegal());
    }
    Ok((name, values.trim()))
}

/// Removes one layer of matching single or double quotes.
pub fn unquote(s: &str) -> &str {
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}
