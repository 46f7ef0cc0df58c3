use crate::arguments::Arguments;
use crate::definition::MARKER;
use crate::error::{ExpressionError, ResourceError};
use crate::lexer::{Lexer, Token, Variables};
use crate::value::Value;
use miette::NamedSource;

/// Token that ends the primary call and starts the sub-arguments.
pub const SEPARATOR: &str = "--";

/// Parses expression text into a call object.
///
/// # Errors
/// Fails on malformed quoting or an invalid short option cluster.
pub fn parse_expression(text: &str) -> Result<Arguments, ResourceError> {
    let tokens = Lexer::new(text).lex()?;
    Parser::new(text, &tokens).parse()
}

/// Like [`parse_expression`], expanding `$name` variables while lexing.
///
/// # Errors
/// Fails on malformed quoting, an unknown variable or an invalid option.
pub fn parse_expression_with(
    text: &str,
    variables: Variables<'_>,
) -> Result<Arguments, ResourceError> {
    let tokens = Lexer::new(text).with_variables(variables).lex()?;
    Parser::new(text, &tokens).parse()
}

/// Parses the array form of an expression, where each item is one token.
/// Items that are not text are always values, never options.
///
/// # Errors
/// Fails on an invalid short option cluster.
pub fn parse_tokens(items: &[Value]) -> Result<Arguments, ResourceError> {
    let mut source = String::new();
    let mut tokens = Vec::with_capacity(items.len());
    for item in items {
        if !source.is_empty() {
            source.push(' ');
        }
        let start = source.len();
        source.push_str(&item.to_string());
        tokens.push(Token::new(item.clone(), start, source.len()));
    }
    Parser::new(&source, &tokens).parse()
}

/// A single left-to-right pass over the tokens of an expression. Options
/// pair with at most the immediately following token.
#[derive(Debug)]
pub struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    position: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, tokens: &'a [Token]) -> Self {
        Self {
            source,
            tokens,
            position: 0,
        }
    }

    pub fn parse(&mut self) -> Result<Arguments, ResourceError> {
        let mut arguments = Arguments::new();

        while let Some(token) = self.advance() {
            let Some(text) = token.text() else {
                arguments.push_positional(token.value.clone());
                continue;
            };

            if text == SEPARATOR {
                let rest = &self.tokens[self.position..];
                self.position = self.tokens.len();
                let sub_arguments = Parser::new(self.source, rest).parse()?;
                arguments.set_sub_arguments(sub_arguments);
                break;
            }

            if let Some(option) = text.strip_prefix("--") {
                self.parse_long_option(option, &mut arguments);
            } else if let Some(cluster) = text.strip_prefix('-').filter(|c| !c.is_empty()) {
                self.parse_short_options(cluster, token, &mut arguments)?;
            } else {
                arguments.push_positional(token.value.clone());
            }
        }

        Ok(arguments)
    }

    /// `--name=value`, `--no-name`, `--name value` or `--name`.
    fn parse_long_option(&mut self, option: &str, arguments: &mut Arguments) {
        if let Some((name, value)) = option.split_once('=') {
            arguments.insert(name, value);
            return;
        }

        if let Some(name) = negated(option) {
            arguments.insert(name, false);
            return;
        }

        let takes_next = self
            .peek()
            .is_some_and(|next| !next.text().is_some_and(|t| t.starts_with('-')));
        let value = match self.advance_if(takes_next) {
            Some(next) => next.value.clone(),
            None => Value::Boolean(true),
        };
        arguments.insert(option, value);
    }

    fn parse_short_options(
        &self,
        cluster: &str,
        token: &Token,
        arguments: &mut Arguments,
    ) -> Result<(), ResourceError> {
        // Offset of the cluster within the token, past the dash
        let base = token.pos_start + 1;
        for (offset, flag) in cluster.char_indices() {
            if !(flag.is_ascii_alphanumeric() || flag == '_') {
                return Err(ExpressionError::InvalidOption {
                    src: NamedSource::new("expression", self.source.to_string()),
                    span: (base + offset, flag.len_utf8()).into(),
                    option: format!("-{cluster}"),
                }
                .into());
            }
            arguments.insert(flag.to_string(), true);
        }
        Ok(())
    }

    // === Helper Methods ===

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.position)?;
        self.position += 1;
        Some(token)
    }

    fn advance_if(&mut self, condition: bool) -> Option<&'a Token> {
        if condition {
            self.advance()
        } else {
            None
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.position)
    }
}

/// The option a negated `--no-name` / `--non-name` refers to. A marked name
/// keeps its marker in front: `--@no-verbose` negates `@verbose`.
fn negated(option: &str) -> Option<String> {
    let (marker, name) = match option.strip_prefix(MARKER) {
        Some(rest) => (Some(MARKER), rest),
        None => (None, option),
    };
    let name = name
        .strip_prefix("non-")
        .or_else(|| name.strip_prefix("no-"))
        .filter(|name| !name.is_empty())?;
    Some(match marker {
        Some(marker) => format!("{marker}{name}"),
        None => name.to_string(),
    })
}
