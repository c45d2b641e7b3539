use utf8_chars::BufReadCharsExt;

use crate::grammar;
use crate::{SourcePosition, SourceSpan};

/// Represents a token extracted from a shell script.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    /// A string or numeric literal, carrying both its raw spelling and its
    /// decoded value.
    Literal(String, LiteralValue, SourceSpan),
    /// A bareword: a command name, a bare argument, or a `-Parameter` flag.
    Word(String, SourceSpan),
    /// A `$name` variable reference.
    Variable(String, SourceSpan),
    /// An operator, punctuation, or statement terminator token.
    Operator(String, SourceSpan),
}

impl Token {
    /// Returns the raw string value of the token.
    pub fn to_str(&self) -> &str {
        match self {
            Self::Literal(s, _, _) => s,
            Self::Word(s, _) => s,
            Self::Variable(s, _) => s,
            Self::Operator(s, _) => s,
        }
    }

    /// Returns the location of the token in the source script.
    pub const fn location(&self) -> &SourceSpan {
        match self {
            Self::Literal(_, _, l) => l,
            Self::Word(_, l) => l,
            Self::Variable(_, l) => l,
            Self::Operator(_, l) => l,
        }
    }
}

/// The decoded payload of a literal token.
#[derive(Clone, Debug, PartialEq)]
pub enum LiteralValue {
    /// A decoded string value.
    Str(String),
    /// An integer value.
    Int(i64),
    /// A floating-point value.
    Float(f64),
}

/// Represents an error that occurred during tokenization.
#[derive(thiserror::Error, Debug)]
pub enum TokenizerError {
    /// An unterminated single-quoted string was encountered at the end of the
    /// input stream.
    #[error("unterminated single-quoted string at {0}")]
    UnterminatedSingleQuote(SourcePosition),

    /// An unterminated double-quoted string was encountered at the end of the
    /// input stream.
    #[error("unterminated double-quoted string at {0}")]
    UnterminatedDoubleQuote(SourcePosition),

    /// A backtick escape sequence was cut short by the end of the input stream.
    #[error("unterminated escape sequence at {0}")]
    UnterminatedEscapeSequence(SourcePosition),

    /// A numeric literal could not be decoded.
    #[error("invalid numeric literal '{0}' at {1}")]
    InvalidNumber(String, SourcePosition),

    /// A `$` was not followed by a variable name.
    #[error("missing variable name at {0}")]
    MissingVariableName(SourcePosition),

    /// A character matched no token category.
    #[error("unexpected character '{0}' at {1}")]
    UnexpectedCharacter(char, SourcePosition),

    /// An error occurred decoding UTF-8 characters in the input stream.
    #[error("failed to decode UTF-8 characters")]
    FailedDecoding,

    /// An I/O error occurred while reading from the input stream.
    #[error("failed to read input")]
    ReadError(#[from] std::io::Error),
}

impl TokenizerError {
    /// Returns true if the error represents an error that could possibly be
    /// due to an incomplete input stream.
    pub const fn is_incomplete(&self) -> bool {
        matches!(
            self,
            Self::UnterminatedSingleQuote(..)
                | Self::UnterminatedDoubleQuote(..)
                | Self::UnterminatedEscapeSequence(..)
        )
    }

    /// Returns the position associated with the error, if it has one.
    pub const fn position(&self) -> Option<&SourcePosition> {
        match self {
            Self::UnterminatedSingleQuote(p)
            | Self::UnterminatedDoubleQuote(p)
            | Self::UnterminatedEscapeSequence(p)
            | Self::InvalidNumber(_, p)
            | Self::MissingVariableName(p)
            | Self::UnexpectedCharacter(_, p) => Some(p),
            Self::FailedDecoding | Self::ReadError(_) => None,
        }
    }
}

/// Options controlling how the tokenizer operates.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct TokenizerOptions {
    /// Whether operator names (`-and`, `-eq`, ...) are recognized without
    /// regard to case.
    pub case_insensitive_operators: bool,
}

impl Default for TokenizerOptions {
    fn default() -> Self {
        Self {
            case_insensitive_operators: true,
        }
    }
}

/// A tokenizer for PowerShell-like shell scripts.
pub(crate) struct Tokenizer<'a, R: ?Sized + std::io::BufRead> {
    char_reader: std::iter::Peekable<utf8_chars::Chars<'a, R>>,
    cursor: SourcePosition,
    options: TokenizerOptions,
}

impl<'a, R: ?Sized + std::io::BufRead> Tokenizer<'a, R> {
    pub fn new(reader: &'a mut R, options: &TokenizerOptions) -> Tokenizer<'a, R> {
        Tokenizer {
            char_reader: reader.chars().peekable(),
            cursor: SourcePosition::default(),
            options: options.clone(),
        }
    }

    /// Returns the current position of the tokenizer in the input stream.
    pub const fn current_location(&self) -> SourcePosition {
        self.cursor
    }

    fn next_char(&mut self) -> Result<Option<char>, TokenizerError> {
        let c = self.char_reader.next().transpose()?;
        if let Some(c) = c {
            self.cursor.index += 1;
            if c == '\n' {
                self.cursor.line += 1;
                self.cursor.column = 1;
            } else {
                self.cursor.column += 1;
            }
        }
        Ok(c)
    }

    fn peek_char(&mut self) -> Result<Option<char>, TokenizerError> {
        match self.char_reader.peek() {
            Some(result) => match result {
                Ok(c) => Ok(Some(*c)),
                Err(_) => Err(TokenizerError::FailedDecoding),
            },
            None => Ok(None),
        }
    }

    fn span_from(&self, start: &SourcePosition) -> SourceSpan {
        SourceSpan {
            start: *start,
            end: self.cursor,
        }
    }

    /// Scans the next token from the input stream. Returns `None` once the end
    /// of the input is reached.
    pub fn next_token(&mut self) -> Result<Option<Token>, TokenizerError> {
        self.skip_blanks_and_comments()?;

        let start = self.cursor;
        let c = match self.peek_char()? {
            Some(c) => c,
            None => return Ok(None),
        };

        let token = match c {
            '\n' | ';' | '|' | '(' | ')' | ',' | '+' | '*' | '/' | '%' | '!' => {
                let _ = self.next_char()?;
                Token::Operator(c.to_string(), self.span_from(&start))
            }
            '"' => self.scan_double_quoted(&start)?,
            '\'' => self.scan_single_quoted(&start)?,
            '$' => self.scan_variable(&start)?,
            '-' => self.scan_dash(&start)?,
            c if c.is_ascii_digit() => self.scan_number(&start)?,
            c if is_word_start(c) => self.scan_word(&start)?,
            c => return Err(TokenizerError::UnexpectedCharacter(c, start)),
        };

        Ok(Some(token))
    }

    fn skip_blanks_and_comments(&mut self) -> Result<(), TokenizerError> {
        loop {
            match self.peek_char()? {
                Some(c) if is_blank(c) => {
                    let _ = self.next_char()?;
                }
                Some('#') => {
                    // Consume up to (but not including) the line terminator;
                    // the newline itself is still a statement terminator.
                    while !matches!(self.peek_char()?, Some('\n') | None) {
                        let _ = self.next_char()?;
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn scan_double_quoted(&mut self, start: &SourcePosition) -> Result<Token, TokenizerError> {
        let mut raw = String::new();
        let mut decoded = String::new();

        // Consume the opening quote.
        if let Some(q) = self.next_char()? {
            raw.push(q);
        }

        loop {
            let c = self
                .next_char()?
                .ok_or(TokenizerError::UnterminatedDoubleQuote(*start))?;
            raw.push(c);

            match c {
                '"' => {
                    // A doubled quote embeds a literal quote char; anything
                    // else ends the string.
                    if self.peek_char()? == Some('"') {
                        let _ = self.next_char()?;
                        raw.push('"');
                        decoded.push('"');
                    } else {
                        break;
                    }
                }
                '`' => {
                    let escaped = self
                        .next_char()?
                        .ok_or(TokenizerError::UnterminatedEscapeSequence(*start))?;
                    raw.push(escaped);
                    decoded.push(decode_backtick_escape(escaped));
                }
                _ => decoded.push(c),
            }
        }

        Ok(Token::Literal(
            raw,
            LiteralValue::Str(decoded),
            self.span_from(start),
        ))
    }

    fn scan_single_quoted(&mut self, start: &SourcePosition) -> Result<Token, TokenizerError> {
        let mut raw = String::new();
        let mut decoded = String::new();

        if let Some(q) = self.next_char()? {
            raw.push(q);
        }

        loop {
            let c = self
                .next_char()?
                .ok_or(TokenizerError::UnterminatedSingleQuote(*start))?;
            raw.push(c);

            if c == '\'' {
                if self.peek_char()? == Some('\'') {
                    let _ = self.next_char()?;
                    raw.push('\'');
                    decoded.push('\'');
                } else {
                    break;
                }
            } else {
                decoded.push(c);
            }
        }

        Ok(Token::Literal(
            raw,
            LiteralValue::Str(decoded),
            self.span_from(start),
        ))
    }

    fn scan_variable(&mut self, start: &SourcePosition) -> Result<Token, TokenizerError> {
        let mut text = String::new();

        if let Some(dollar) = self.next_char()? {
            text.push(dollar);
        }

        while let Some(c) = self.peek_char()? {
            if c.is_alphanumeric() || c == '_' {
                let _ = self.next_char()?;
                text.push(c);
            } else {
                break;
            }
        }

        if text.len() <= 1 {
            return Err(TokenizerError::MissingVariableName(*start));
        }

        Ok(Token::Variable(text, self.span_from(start)))
    }

    fn scan_dash(&mut self, start: &SourcePosition) -> Result<Token, TokenizerError> {
        let mut text = String::new();

        if let Some(dash) = self.next_char()? {
            text.push(dash);
        }

        // A bare '-' is the subtraction/negation operator. A dash followed by
        // letters is either a named operator (-and, -eq, ...) or a
        // parameter-style bareword argument (-Recurse).
        if !matches!(self.peek_char()?, Some(c) if c.is_alphabetic()) {
            return Ok(Token::Operator(text, self.span_from(start)));
        }

        while let Some(c) = self.peek_char()? {
            if c.is_alphanumeric() {
                let _ = self.next_char()?;
                text.push(c);
            } else {
                break;
            }
        }

        let span = self.span_from(start);
        if grammar::is_dash_operator(&text, self.options.case_insensitive_operators) {
            Ok(Token::Operator(text, span))
        } else {
            Ok(Token::Word(text, span))
        }
    }

    fn scan_number(&mut self, start: &SourcePosition) -> Result<Token, TokenizerError> {
        let mut text = String::new();

        while let Some(c) = self.peek_char()? {
            if c.is_ascii_digit() {
                let _ = self.next_char()?;
                text.push(c);
            } else {
                break;
            }
        }

        // Hex literals: 0x1F and friends.
        if text == "0" && matches!(self.peek_char()?, Some('x' | 'X')) {
            let _ = self.next_char()?;
            text.push('x');

            let mut digits = String::new();
            while let Some(c) = self.peek_char()? {
                if c.is_ascii_hexdigit() {
                    let _ = self.next_char()?;
                    digits.push(c);
                } else {
                    break;
                }
            }

            text.push_str(&digits);
            let value = i64::from_str_radix(&digits, 16)
                .map_err(|_| TokenizerError::InvalidNumber(text.clone(), *start))?;
            return Ok(Token::Literal(
                text,
                LiteralValue::Int(value),
                self.span_from(start),
            ));
        }

        // A decimal point makes this a real literal.
        if self.peek_char()? == Some('.') {
            let _ = self.next_char()?;
            text.push('.');

            while let Some(c) = self.peek_char()? {
                if c.is_ascii_digit() {
                    let _ = self.next_char()?;
                    text.push(c);
                } else {
                    break;
                }
            }

            let value: f64 = text
                .parse()
                .map_err(|_| TokenizerError::InvalidNumber(text.clone(), *start))?;
            return Ok(Token::Literal(
                text,
                LiteralValue::Float(value),
                self.span_from(start),
            ));
        }

        let value: i64 = text
            .parse()
            .map_err(|_| TokenizerError::InvalidNumber(text.clone(), *start))?;
        Ok(Token::Literal(
            text,
            LiteralValue::Int(value),
            self.span_from(start),
        ))
    }

    fn scan_word(&mut self, start: &SourcePosition) -> Result<Token, TokenizerError> {
        let mut text = String::new();

        while let Some(c) = self.peek_char()? {
            if is_word_char(c) {
                let _ = self.next_char()?;
                text.push(c);
            } else {
                break;
            }
        }

        Ok(Token::Word(text, self.span_from(start)))
    }
}

impl<'a, R: ?Sized + std::io::BufRead> Iterator for Tokenizer<'a, R> {
    type Item = Result<Token, TokenizerError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

const fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

// Embedded dashes and dots keep Verb-Noun command names and simple file names
// as single barewords.
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

const fn decode_backtick_escape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        'a' => '\x07',
        'b' => '\x08',
        other => other,
    }
}

/// Tokenizes a shell script given as a string, using default options.
pub fn tokenize_str(input: &str) -> Result<Vec<Token>, TokenizerError> {
    let mut reader = input.as_bytes();
    let mut tokenizer = Tokenizer::new(&mut reader, &TokenizerOptions::default());

    let mut tokens = vec![];
    while let Some(token) = tokenizer.next_token()? {
        tokens.push(token);
    }

    Ok(tokens)
}
