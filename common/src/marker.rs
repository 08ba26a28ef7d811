//! Environment marker evaluation for `enable_if`.
//!
//! Supports the subset of PEP 508 markers that describe a native build
//! platform: comparisons between `platform_system`, `platform_machine`,
//! `sys_platform` or `os_name` and quoted strings using `==`, `!=`, `in`
//! and `not in`, combined with `and`, `or` and parentheses.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;
use std::vec::IntoIter;

use thiserror::Error;

use crate::platform::Platform;

/// Errors arising from marker parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkerError {
    /// The marker text could not be tokenized or parsed.
    #[error("invalid marker \"{marker}\": {reason}")]
    Syntax {
        /// The rejected marker text.
        marker: String,
        /// Description of the failure.
        reason: String,
    },

    /// The marker refers to a variable that does not describe the platform.
    ///
    /// Markers are evaluated against the target platform rather than the
    /// running interpreter, so only platform variables are available.
    #[error(
        "unsupported marker variable \"{name}\": only platform variables \
         ({}) are available because markers describe the target platform, \
         not the build interpreter",
        SUPPORTED_VARIABLES
    )]
    UnsupportedVariable {
        /// The variable name.
        name: String,
    },
}

/// Values of the marker variables for one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerEnvironment {
    platform_system: String,
    platform_machine: String,
    sys_platform: String,
    os_name: String,
}

impl MarkerEnvironment {
    /// Build the environment Python would report on `platform`.
    #[must_use]
    pub fn for_platform(platform: &Platform) -> Self {
        let (sys_platform, os_name) = match platform.system() {
            "Windows" => ("win32", "nt"),
            "Darwin" => ("darwin", "posix"),
            _ => ("linux", "posix"),
        };
        Self {
            platform_system: platform.system().to_owned(),
            platform_machine: platform.machine().to_owned(),
            sys_platform: sys_platform.to_owned(),
            os_name: os_name.to_owned(),
        }
    }

    fn value(&self, variable: Variable) -> &str {
        match variable {
            Variable::PlatformSystem => &self.platform_system,
            Variable::PlatformMachine => &self.platform_machine,
            Variable::SysPlatform => &self.sys_platform,
            Variable::OsName => &self.os_name,
        }
    }
}

/// Variable names accepted in markers, as listed in error messages.
const SUPPORTED_VARIABLES: &str = "platform_system, platform_machine, sys_platform, os_name";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variable {
    PlatformSystem,
    PlatformMachine,
    SysPlatform,
    OsName,
}

impl Variable {
    fn from_name(name: &str) -> Result<Self, MarkerError> {
        match name {
            "platform_system" => Ok(Self::PlatformSystem),
            "platform_machine" => Ok(Self::PlatformMachine),
            "sys_platform" => Ok(Self::SysPlatform),
            "os_name" => Ok(Self::OsName),
            other => Err(MarkerError::UnsupportedVariable {
                name: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
    Variable(Variable),
    Literal(String),
}

impl Operand {
    fn resolve<'a>(&'a self, env: &'a MarkerEnvironment) -> &'a str {
        match self {
            Self::Variable(variable) => env.value(*variable),
            Self::Literal(value) => value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Equal,
    NotEqual,
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        lhs: Operand,
        op: Comparison,
        rhs: Operand,
    },
}

impl Expr {
    fn evaluate(&self, env: &MarkerEnvironment) -> bool {
        match self {
            Self::And(lhs, rhs) => lhs.evaluate(env) && rhs.evaluate(env),
            Self::Or(lhs, rhs) => lhs.evaluate(env) || rhs.evaluate(env),
            Self::Compare { lhs, op, rhs } => {
                let left = lhs.resolve(env);
                let right = rhs.resolve(env);
                match op {
                    Comparison::Equal => left == right,
                    Comparison::NotEqual => left != right,
                    Comparison::In => right.contains(left),
                    Comparison::NotIn => !right.contains(left),
                }
            }
        }
    }
}

/// A parsed `enable_if` marker.
///
/// # Examples
///
/// ```
/// use robotpy_fetch_common::marker::{Marker, MarkerEnvironment};
/// use robotpy_fetch_common::platform::Platform;
///
/// let marker = Marker::parse("platform_machine == 'roborio'").unwrap();
/// let roborio = Platform::by_name("linux-roborio").unwrap();
/// let desktop = Platform::by_name("linux-x86_64").unwrap();
///
/// assert!(marker.evaluate(&MarkerEnvironment::for_platform(roborio)));
/// assert!(!marker.evaluate(&MarkerEnvironment::for_platform(desktop)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    source: String,
    expr: Expr,
}

impl Marker {
    /// Parse marker text.
    ///
    /// # Errors
    ///
    /// Returns [`MarkerError::Syntax`] for malformed text and
    /// [`MarkerError::UnsupportedVariable`] for variables outside the
    /// supported set.
    pub fn parse(source: &str) -> Result<Self, MarkerError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            source,
            tokens: tokens.into_iter().peekable(),
        };
        let expr = parser.or_expr()?;
        if let Some(token) = parser.tokens.next() {
            return Err(syntax(source, format!("unexpected {token}")));
        }
        Ok(Self {
            source: source.to_owned(),
            expr,
        })
    }

    /// Evaluate the marker against `env`.
    #[must_use]
    pub fn evaluate(&self, env: &MarkerEnvironment) -> bool {
        self.expr.evaluate(env)
    }

    /// The marker text as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    Equal,
    NotEqual,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(name) => write!(f, "'{name}'"),
            Self::Str(value) => write!(f, "string \"{value}\""),
            Self::Equal => f.write_str("'=='"),
            Self::NotEqual => f.write_str("'!='"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
        }
    }
}

fn syntax(marker: &str, reason: impl Into<String>) -> MarkerError {
    MarkerError::Syntax {
        marker: marker.to_owned(),
        reason: reason.into(),
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, MarkerError> {
    let mut chars = source.chars().peekable();
    let mut tokens = Vec::new();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '\'' | '"' => {
                chars.next();
                tokens.push(Token::Str(quoted(source, c, &mut chars)?));
            }
            '=' | '!' => {
                chars.next();
                if chars.next_if_eq(&'=').is_none() {
                    return Err(syntax(source, format!("expected '=' after '{c}'")));
                }
                tokens.push(if c == '=' {
                    Token::Equal
                } else {
                    Token::NotEqual
                });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(next) =
                    chars.next_if(|ch| ch.is_ascii_alphanumeric() || *ch == '_' || *ch == '.')
                {
                    ident.push(next);
                }
                tokens.push(Token::Ident(ident));
            }
            other => {
                return Err(syntax(source, format!("unexpected character '{other}'")));
            }
        }
    }

    Ok(tokens)
}

fn quoted(source: &str, quote: char, chars: &mut Peekable<Chars<'_>>) -> Result<String, MarkerError> {
    let mut value = String::new();
    for c in chars.by_ref() {
        if c == quote {
            return Ok(value);
        }
        value.push(c);
    }
    Err(syntax(source, "unterminated string"))
}

struct Parser<'a> {
    source: &'a str,
    tokens: Peekable<IntoIter<Token>>,
}

impl Parser<'_> {
    fn or_expr(&mut self) -> Result<Expr, MarkerError> {
        let mut expr = self.and_expr()?;
        while self.eat_keyword("or") {
            let rhs = self.and_expr()?;
            expr = Expr::Or(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn and_expr(&mut self) -> Result<Expr, MarkerError> {
        let mut expr = self.atom()?;
        while self.eat_keyword("and") {
            let rhs = self.atom()?;
            expr = Expr::And(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn atom(&mut self) -> Result<Expr, MarkerError> {
        if self.tokens.next_if_eq(&Token::LParen).is_some() {
            let expr = self.or_expr()?;
            if self.tokens.next_if_eq(&Token::RParen).is_none() {
                return Err(syntax(self.source, "expected ')'"));
            }
            return Ok(expr);
        }

        let lhs = self.operand()?;
        let op = self.comparison()?;
        let rhs = self.operand()?;
        Ok(Expr::Compare { lhs, op, rhs })
    }

    fn operand(&mut self) -> Result<Operand, MarkerError> {
        match self.tokens.next() {
            Some(Token::Str(value)) => Ok(Operand::Literal(value)),
            Some(Token::Ident(name)) => Variable::from_name(&name).map(Operand::Variable),
            Some(other) => Err(syntax(
                self.source,
                format!("expected a variable or string, found {other}"),
            )),
            None => Err(syntax(self.source, "unexpected end of marker")),
        }
    }

    fn comparison(&mut self) -> Result<Comparison, MarkerError> {
        match self.tokens.next() {
            Some(Token::Equal) => Ok(Comparison::Equal),
            Some(Token::NotEqual) => Ok(Comparison::NotEqual),
            Some(Token::Ident(word)) if word == "in" => Ok(Comparison::In),
            Some(Token::Ident(word)) if word == "not" => {
                if self.eat_keyword("in") {
                    Ok(Comparison::NotIn)
                } else {
                    Err(syntax(self.source, "expected 'in' after 'not'"))
                }
            }
            Some(other) => Err(syntax(
                self.source,
                format!("expected a comparison operator, found {other}"),
            )),
            None => Err(syntax(self.source, "unexpected end of marker")),
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        self.tokens
            .next_if(|token| matches!(token, Token::Ident(word) if word == keyword))
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn env(name: &str) -> MarkerEnvironment {
        MarkerEnvironment::for_platform(Platform::by_name(name).expect("known platform"))
    }

    #[rstest]
    #[case::system_and_machine(
        "platform_system=='Linux' and platform_machine=='x86_64'",
        "linux-x86_64",
        true
    )]
    #[case::system_and_machine_elsewhere(
        "platform_system=='Linux' and platform_machine=='x86_64'",
        "linux-roborio",
        false
    )]
    #[case::not_equal("platform_machine!='roborio'", "linux-aarch64", true)]
    #[case::or_chain(
        "sys_platform == 'win32' or sys_platform == \"darwin\"",
        "macos-universal",
        true
    )]
    #[case::parentheses(
        "os_name == 'posix' and (platform_machine == 'armv7l' or platform_machine == 'aarch64')",
        "linux-raspbian",
        true
    )]
    #[case::containment("platform_machine in 'x86_64 aarch64'", "linux-aarch64", true)]
    #[case::not_containment("platform_machine not in 'x86_64 aarch64'", "linux-roborio", true)]
    #[case::literal_first("'Windows' == platform_system", "win-amd64", true)]
    fn evaluates_against_platform(
        #[case] marker: &str,
        #[case] platform: &str,
        #[case] expected: bool,
    ) {
        let parsed = Marker::parse(marker).expect("valid marker");
        assert_eq!(parsed.evaluate(&env(platform)), expected, "{marker}");
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let marker = Marker::parse(
            "platform_system == 'Windows' or platform_system == 'Linux' and platform_machine == 'roborio'",
        )
        .expect("valid marker");
        assert!(!marker.evaluate(&env("linux-x86_64")));
        assert!(marker.evaluate(&env("linux-roborio")));
        assert!(marker.evaluate(&env("win-amd64")));
    }

    #[rstest]
    #[case::unterminated("platform_system == 'Linux")]
    #[case::single_equals("platform_system = 'Linux'")]
    #[case::missing_rhs("platform_system ==")]
    #[case::dangling_and("platform_system == 'Linux' and")]
    #[case::unbalanced("(platform_system == 'Linux'")]
    #[case::trailing_token("platform_system == 'Linux' 'x'")]
    #[case::bad_operator("platform_system >= 'Linux'")]
    fn rejects_malformed_markers(#[case] marker: &str) {
        let result = Marker::parse(marker);
        assert!(
            matches!(result, Err(MarkerError::Syntax { .. })),
            "expected syntax error for {marker}, got {result:?}"
        );
    }

    #[test]
    fn rejects_python_specific_variables() {
        let result = Marker::parse("python_version == '3.8'");
        assert_eq!(
            result,
            Err(MarkerError::UnsupportedVariable {
                name: "python_version".to_owned()
            })
        );
    }

    #[test]
    fn unsupported_variable_error_lists_platform_variables() {
        let error = Marker::parse("implementation_name == 'cpython'").expect_err("rejected");
        let message = error.to_string();
        assert!(message.contains("\"implementation_name\""), "{message}");
        assert!(message.contains("only platform variables"), "{message}");
        assert!(
            message.contains("platform_system, platform_machine, sys_platform, os_name"),
            "{message}"
        );
    }

    #[test]
    fn display_round_trips_source_text() {
        let text = "platform_machine == 'roborio'";
        let marker = Marker::parse(text).expect("valid marker");
        assert_eq!(marker.to_string(), text);
        assert_eq!(marker.as_str(), text);
    }
}
