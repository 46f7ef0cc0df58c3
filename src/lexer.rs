use crate::error::{ExpressionError, ResourceError};
use crate::value::Value;
use miette::NamedSource;

/// Looks up the text a `$name` variable expands to.
pub type Variables<'a> = &'a dyn Fn(&str) -> Option<String>;

/// A word of an expression with its byte span in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub value: Value,
    pub pos_start: usize,
    pub pos_end: usize,
}

impl Token {
    pub fn new(value: impl Into<Value>, pos_start: usize, pos_end: usize) -> Token {
        Token {
            value: value.into(),
            pos_start,
            pos_end,
        }
    }

    /// The token text, if the token is textual.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.value.as_str()
    }
}

/// Splits expression text into words the way a POSIX shell does: whitespace
/// separates words, single quotes are literal, double quotes keep escapes
/// and `$` expansion, and a backslash escapes the next character.
pub struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    position: usize,
    variables: Option<Variables<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().peekable(),
            position: 0,
            variables: None,
        }
    }

    /// Enables `$name` and `${name}` expansion. Without variables a `$` is
    /// an ordinary character.
    #[must_use]
    pub fn with_variables(mut self, variables: Variables<'a>) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn lex(&mut self) -> Result<Vec<Token>, ResourceError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    pub fn next_token(&mut self) -> Result<Option<Token>, ResourceError> {
        loop {
            self.skip_whitespace();
            if self.peek().is_none() {
                return Ok(None);
            }
            let start_pos = self.position;
            let mut word = String::new();
            // Quotes make a word even when nothing is inside them
            let mut quoted = false;

            while let Some(&c) = self.peek() {
                if c.is_whitespace() {
                    break;
                }
                let char_pos = self.position;
                self.advance();
                match c {
                    '\'' => {
                        quoted = true;
                        self.read_single_quoted(&mut word, char_pos)?;
                    }
                    '"' => {
                        quoted = true;
                        self.read_double_quoted(&mut word, char_pos)?;
                    }
                    '\\' => match self.advance() {
                        Some(escaped) => word.push(escaped),
                        None => return Err(self.dangling_escape(char_pos)),
                    },
                    '$' if self.variables.is_some() => {
                        let expanded = self.read_variable()?;
                        word.push_str(&expanded);
                    }
                    c => word.push(c),
                }
            }

            // An unquoted expansion to nothing is not a word
            if !word.is_empty() || quoted {
                return Ok(Some(Token::new(word, start_pos, self.position)));
            }
        }
    }

    fn advance(&mut self) -> Option<char> {
        let char = self.chars.next();
        if let Some(c) = char {
            self.position += c.len_utf8();
        }
        char
    }

    fn peek(&mut self) -> Option<&char> {
        self.chars.peek()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn read_single_quoted(&mut self, word: &mut String, open: usize) -> Result<(), ResourceError> {
        loop {
            match self.advance() {
                Some('\'') => return Ok(()),
                Some(c) => word.push(c),
                None => return Err(self.unterminated_quote(open)),
            }
        }
    }

    fn read_double_quoted(&mut self, word: &mut String, open: usize) -> Result<(), ResourceError> {
        loop {
            let char_pos = self.position;
            match self.advance() {
                Some('"') => return Ok(()),
                Some('\\') => match self.advance() {
                    // Inside double quotes only these characters are escapable
                    Some(c @ ('"' | '\\' | '$' | '`')) => word.push(c),
                    Some(c) => {
                        word.push('\\');
                        word.push(c);
                    }
                    None => return Err(self.dangling_escape(char_pos)),
                },
                Some('$') if self.variables.is_some() => {
                    let expanded = self.read_variable()?;
                    word.push_str(&expanded);
                }
                Some(c) => word.push(c),
                None => return Err(self.unterminated_quote(open)),
            }
        }
    }

    /// Reads a variable name after `$` and returns its expansion. A `$` not
    /// followed by a name stands for itself.
    fn read_variable(&mut self) -> Result<String, ResourceError> {
        let braced = self.peek() == Some(&'{');
        if braced {
            self.advance();
        }
        let mut name = String::new();
        while let Some(&c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if braced {
            if self.advance() != Some('}') {
                return Err(ResourceError::UnknownVariable {
                    name: format!("{{{name}"),
                });
            }
        } else if name.is_empty() {
            return Ok("$".to_string());
        }

        let lookup = self.variables.and_then(|variables| variables(&name));
        lookup.ok_or(ResourceError::UnknownVariable { name })
    }

    fn source(&self) -> NamedSource<String> {
        NamedSource::new("expression", self.input.to_string())
    }

    fn unterminated_quote(&self, open: usize) -> ResourceError {
        ExpressionError::UnterminatedQuote {
            src: self.source(),
            span: (open, 1).into(),
        }
        .into()
    }

    fn dangling_escape(&self, at: usize) -> ResourceError {
        ExpressionError::DanglingEscape {
            src: self.source(),
            span: (at, 1).into(),
        }
        .into()
    }
}
