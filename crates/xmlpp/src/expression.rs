//! Boolean expressions of the `if` and `elseif` directives
//!
//! ```text
//! expression := term (("AND" | "OR") term)*
//! term       := "NOT" term | "(" expression ")" | atomic
//! atomic     := operand [operator operand]
//! operator   := "=" | "!=" | "<" | "<=" | ">" | ">=" | "~="
//! ```
//!
//! Operands are quoted literals (`"1.0"`), references (`$(var.Version)`)
//!     or bare words (`1`).
//! Keywords are case insensitive.
//! `AND` and `OR` have the same precedence and are folded strictly left to right,
//!     so `A OR B AND C` means `(A OR B) AND C`.
//! Every term is evaluated, even when the result is already decided.
//!
//! An atomic expression without an operator must be a reference,
//!     and is true if the reference is defined.

use crate::error::{Error, Kind, Result};
use crate::substitute;
use crate::variable::Resolver;

/// Evaluates a conditional expression.
pub fn evaluate(expression: &str, resolver: &mut dyn Resolver) -> Result<bool> {
    Evaluator { resolver }.expression(expression)
}

struct Evaluator<'a> {
    resolver: &'a mut dyn Resolver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    EqualIgnoreCase,
}

impl Operator {
    const ALL: [(&'static str, Operator); 7] = [
        ("<=", Operator::LessOrEqual),
        (">=", Operator::GreaterOrEqual),
        ("!=", Operator::NotEqual),
        ("~=", Operator::EqualIgnoreCase),
        ("=", Operator::Equal),
        ("<", Operator::Less),
        (">", Operator::Greater),
    ];

    /// Parses an operator at the start of the string.
    fn parse(s: &str) -> Option<(Operator, &str)> {
        Operator::ALL
            .iter()
            .find(|(symbol, _)| s.starts_with(symbol))
            .map(|(symbol, op)| (*op, &s[symbol.len()..]))
    }
}

enum Operand {
    Literal(String),
    Reference {
        text: String,
        value: Option<String>,
    },
}

impl Operand {
    fn value(&self) -> Result<&str> {
        match self {
            Operand::Literal(value) => Ok(value.as_str()),
            Operand::Reference {
                value: Some(value), ..
            } => Ok(value.as_str()),
            Operand::Reference { text, value: None } => Err(Error::new(
                Kind::UndefinedReference,
                format!("undefined preprocessor variable `{text}`"),
            )
            .with_note("use `ifdef` to test whether a variable is defined")),
        }
    }
}

impl<'a> Evaluator<'a> {
    fn expression(&mut self, s: &str) -> Result<bool> {
        if s.trim().is_empty() {
            return Err(Error::new(Kind::Syntax, "unexpected empty subexpression"));
        }
        let (mut value, mut rest) = self.term(s)?;
        loop {
            let trimmed = rest.trim_start();
            if trimmed.is_empty() {
                return Ok(value);
            }
            if let Some(after) = keyword(trimmed, "AND") {
                let (other, r) = self.term(after)?;
                value = value && other;
                rest = r;
            } else if let Some(after) = keyword(trimmed, "OR") {
                let (other, r) = self.term(after)?;
                value = value || other;
                rest = r;
            } else {
                let message = format!("invalid subexpression `{trimmed}`");
                return Err(Error::new(Kind::Syntax, message)
                    .with_note("expected `AND` or `OR`"));
            }
        }
    }

    fn term<'s>(&mut self, s: &'s str) -> Result<(bool, &'s str)> {
        let s = s.trim_start();
        if s.is_empty() {
            return Err(Error::new(Kind::Syntax, "unexpected empty subexpression"));
        }
        if let Some(after) = keyword(s, "NOT") {
            if after.trim().is_empty() {
                return Err(Error::new(Kind::Syntax, "expected an expression after `NOT`"));
            }
            let (value, rest) = self.term(after)?;
            return Ok((!value, rest));
        }
        if s.starts_with('(') {
            let close = matching_paren(s).ok_or_else(|| unmatched_parenthesis(s))?;
            let value = self.expression(&s[1..close])?;
            return Ok((value, &s[close + 1..]));
        }
        self.atomic(s)
    }

    fn atomic<'s>(&mut self, s: &'s str) -> Result<(bool, &'s str)> {
        let (left, rest) = self.operand(s)?;
        let (operator, after) = match Operator::parse(rest.trim_start()) {
            Some(found) => found,
            None => {
                return match left {
                    Operand::Reference { value, .. } => Ok((value.is_some(), rest)),
                    Operand::Literal(literal) => {
                        let message = format!("unexpected literal `{literal}`");
                        Err(Error::new(Kind::Syntax, message)
                            .with_note("a literal must be compared to something with an operator"))
                    }
                };
            }
        };
        let after = after.trim_start();
        if after.is_empty() {
            return Err(Error::new(Kind::Syntax, "expected an operand after the operator"));
        }
        let (right, rest) = self.operand(after)?;
        let value = compare(left.value()?.trim(), operator, right.value()?.trim())?;
        Ok((value, rest))
    }

    fn operand<'s>(&mut self, s: &'s str) -> Result<(Operand, &'s str)> {
        if let Some(quoted) = s.strip_prefix('"') {
            let end = quoted
                .find('"')
                .ok_or_else(|| Error::new(Kind::Syntax, format!("unmatched quotes in `{s}`")))?;
            let value = substitute::substitute(&quoted[..end], self.resolver)?;
            return Ok((Operand::Literal(value), &quoted[end + 1..]));
        }
        if s.starts_with("$(") {
            let end = substitute::reference_end(s).ok_or_else(|| unmatched_parenthesis(s))?;
            let value = substitute::expand_reference(&s[2..end], self.resolver)?;
            let operand = Operand::Reference {
                text: s[..=end].to_string(),
                value,
            };
            return Ok((operand, &s[end + 1..]));
        }
        let end = s
            .char_indices()
            .find(|(i, c)| c.is_whitespace() || Operator::parse(&s[*i..]).is_some())
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        let word = &s[..end];
        if word.is_empty() {
            return Err(Error::new(Kind::Syntax, format!("expected an operand before `{s}`")));
        }
        if word.contains('(') || word.contains(')') {
            return Err(Error::new(Kind::Syntax, format!("unmatched parenthesis in `{word}`")));
        }
        if word.contains('"') {
            return Err(Error::new(Kind::Syntax, format!("unmatched quotes in `{word}`")));
        }
        Ok((Operand::Literal(word.to_string()), &s[end..]))
    }
}

fn compare(left: &str, operator: Operator, right: &str) -> Result<bool> {
    Ok(match operator {
        Operator::Equal => left == right,
        Operator::NotEqual => left != right,
        Operator::EqualIgnoreCase => left.to_uppercase() == right.to_uppercase(),
        Operator::Less => integer(left)? < integer(right)?,
        Operator::LessOrEqual => integer(left)? <= integer(right)?,
        Operator::Greater => integer(left)? > integer(right)?,
        Operator::GreaterOrEqual => integer(left)? >= integer(right)?,
    })
}

fn unmatched_parenthesis(s: &str) -> Box<Error> {
    Error::new(Kind::Syntax, format!("unmatched parenthesis in `{s}`"))
}

fn integer(s: &str) -> Result<i32> {
    s.parse::<i32>().map_err(|_| {
        Error::new(Kind::Semantic, format!("illegal integer `{s}`"))
            .with_note("the operators <, <=, > and >= compare 32-bit integers")
    })
}

/// Matches a case-insensitive keyword followed by whitespace or an opening paren.
fn keyword<'s>(s: &'s str, keyword: &str) -> Option<&'s str> {
    let head = s.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = &s[keyword.len()..];
    match rest.chars().next() {
        Some(c) if c.is_whitespace() || c == '(' => Some(rest),
        _ => None,
    }
}

/// Returns the index of the paren matching the opening paren at the start of the string.
///
/// Parens inside double quotes are ignored.
fn matching_paren(s: &str) -> Option<usize> {
    let mut depth = 0_usize;
    let mut in_quotes = false;
    for (i, c) in s.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
