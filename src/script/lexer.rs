use std::sync::Arc;
use bitflags::bitflags;
use log::trace;
use crate::{Analyser, Diagnostic, Diagnostics, Lexer, NumberFlags, PunctuationTable, ScriptError, ScriptResult, Token, TokenKind, Tokenizer};

pub const DEFAULT_MAX_TOKEN_LENGTH: usize = 1024;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ScriptFlags: u32 {
        const NO_ERRORS              = 0x0001;
        const NO_WARNINGS            = 0x0002;
        /// Adjacent string literals are not merged.
        const NO_STRING_WHITESPACES  = 0x0004;
        const NO_STRING_ESCAPE_CHARS = 0x0008;
        /// Anything other than strings and numbers is read as a whitespace/`;` delimited word.
        const PRIMITIVE              = 0x0010;
        const NO_BINARY_NUMBERS      = 0x0020;
        const NO_NUMBER_VALUES       = 0x0040;
    }
}

/// One buffer being scanned into tokens, with its own line counter and one token of pushback.
#[derive(Debug, Clone)]
pub struct Script {
    filename:         String,
    lexer:            Lexer,
    line:             u32,
    last_line:        u32,
    flags:            ScriptFlags,
    punctuations:     Arc<PunctuationTable>,
    max_token_length: usize,
    last_token:       Option<Token>,
    token_available:  bool,
    started:          bool,
    diagnostics:      Diagnostics
}

impl Script {
    pub fn new<S: Into<String>, B: AsRef<[u8]>>(filename: S, contents: B) -> Self {
        Self {
            filename: filename.into(),
            lexer: Lexer::new(contents),
            line: 1,
            last_line: 1,
            flags: ScriptFlags::empty(),
            punctuations: Arc::new(PunctuationTable::default()),
            max_token_length: DEFAULT_MAX_TOKEN_LENGTH,
            last_token: None,
            token_available: false,
            started: false,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn with_flags(mut self, flags: ScriptFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_punctuations(mut self, punctuations: Arc<PunctuationTable>) -> Self {
        self.punctuations = punctuations;
        self
    }

    pub fn with_max_token_length(mut self, max: usize) -> Self {
        self.max_token_length = max;
        self
    }

    #[inline]
    pub fn filename(&self) -> &str { &self.filename }

    #[inline]
    pub fn line(&self) -> u32 { self.line }

    #[inline]
    pub fn flags(&self) -> ScriptFlags { self.flags }

    #[inline]
    pub fn set_flags(&mut self, flags: ScriptFlags) { self.flags = flags }

    #[inline]
    pub fn last_token(&self) -> Option<&Token> { self.last_token.as_ref() }

    /// True once every byte was consumed and no token is waiting to be re-read.
    #[inline]
    pub fn at_end(&self) -> bool { self.lexer.is_end() && !self.token_available }

    /// Warnings raised since the last call.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> { self.diagnostics.take() }

    /// Hands the last token out again on the next read.
    pub fn unread_token(&mut self) {
        if self.last_token.is_some() {
            self.token_available = true;
        }
    }

    /// Rewinds to the start of the buffer.
    pub fn reset(&mut self) {
        self.lexer.reset();
        self.line = 1;
        self.last_line = 1;
        self.last_token = None;
        self.token_available = false;
        self.started = false;
    }

    pub fn read_token(&mut self) -> ScriptResult<Option<Token>> {
        if self.token_available {
            self.token_available = false;
            return Ok(self.last_token.clone());
        }
        self.last_line = self.line;
        let whitespace_start = self.lexer.pos();
        if !self.skip_whitespace()? {
            return Ok(None)
        }

        let mut token = Token::new(TokenKind::Name, String::new(), self.line);
        token.lines_crossed = self.line - self.last_line;
        token.whitespace_before = self.lexer.pos() > whitespace_start;
        token.line_start = !self.started || token.lines_crossed > 0;
        self.started = true;

        match (self.lexer.peek(), self.lexer.peek_at(1)) {
            (Some(quote @ (b'"' | b'\'')), _) => self.read_string(&mut token, quote)?,
            (Some(b'0'..=b'9'), _) | (Some(b'.'), Some(b'0'..=b'9')) => self.read_number(&mut token)?,
            _ if self.flags.contains(ScriptFlags::PRIMITIVE) => self.read_primitive(&mut token)?,
            (Some(c), _) if c.is_ascii_alphabetic() || c == b'_' => self.read_name(&mut token)?,
            _ => self.read_punctuation(&mut token)?,
        }

        trace!("{}:{} read {} token {}", self.filename, token.line, token.kind, token.text);
        self.last_token = Some(token.clone());
        Ok(Some(token))
    }

    /// Skips whitespace and comments. Returns false at the end of the buffer.
    fn skip_whitespace(&mut self) -> ScriptResult<bool> {
        loop {
            while let Some(c) = self.lexer.peek() {
                if c > b' ' { break }
                if c == b'\n' { self.line += 1 }
                self.lexer.skip(1);
            }
            if self.lexer.is_end() {
                return Ok(false)
            }
            if self.lexer.take_multi(b"//") {
                self.lexer.skip_while(|c| c != b'\n');
                continue
            }
            if self.lexer.take_multi(b"/*") {
                let line = self.line;
                loop {
                    match self.lexer.get() {
                        None => return Err(ScriptError::UnterminatedComment { line }),
                        Some(b'\n') => self.line += 1,
                        Some(b'*') if self.lexer.take(b'/') => break,
                        Some(_) => {}
                    }
                }
                continue
            }
            return Ok(true)
        }
    }

    fn read_string(&mut self, token: &mut Token, quote: u8) -> ScriptResult<()> {
        token.kind = match quote {
            b'"' => TokenKind::String,
            _ => TokenKind::Literal,
        };
        let line = self.line;
        let mut bytes = vec![quote];
        self.lexer.skip(1);
        loop {
            // room for the trailing quote
            if bytes.len() >= self.max_token_length.saturating_sub(2) {
                return Err(ScriptError::TokenTooLong { line, what: "string", max: self.max_token_length })
            }
            match self.lexer.peek() {
                Some(b'\\') if !self.flags.contains(ScriptFlags::NO_STRING_ESCAPE_CHARS) => {
                    let escaped = self.read_escape()?;
                    bytes.push(escaped);
                }
                Some(c) if c == quote => {
                    self.lexer.skip(1);
                    if self.flags.contains(ScriptFlags::NO_STRING_WHITESPACES) { break }

                    let (position, line) = (self.lexer.pos(), self.line);
                    if matches!(self.skip_whitespace(), Ok(true)) && self.lexer.take(quote) {
                        continue
                    }
                    self.lexer.set_cursor(position);
                    self.line = line;
                    break
                }
                None => return Err(ScriptError::MissingTrailingQuote { line: self.line }),
                Some(b'\n') => return Err(ScriptError::NewlineInString { line: self.line, text: decode(bytes) }),
                Some(c) => {
                    bytes.push(c);
                    self.lexer.skip(1);
                }
            }
        }
        bytes.push(quote);
        token.text = decode(bytes);
        Ok(())
    }

    /// Reads one escape sequence, cursor on the backslash. Numeric escapes are decimal, not octal.
    fn read_escape(&mut self) -> ScriptResult<u8> {
        self.lexer.skip(1);
        let escape = match self.lexer.get() {
            Some(c) => c,
            None => return Err(ScriptError::MissingTrailingQuote { line: self.line }),
        };
        let value = match escape {
            b'\\' => b'\\',
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'v' => 0x0b,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'a' => 0x07,
            b'\'' | b'"' | b'?' => escape,
            b'x' => {
                let mut value: u32 = 0;
                while let Some(digit) = self.lexer.peek().and_then(|c| char::from(c).to_digit(16)) {
                    value = value.saturating_mul(16).saturating_add(digit);
                    self.lexer.skip(1);
                }
                self.clamp_escape(value)
            }
            b'0'..=b'9' => {
                let mut value = u32::from(escape - b'0');
                while let Some(digit) = self.lexer.peek().filter(u8::is_ascii_digit) {
                    value = value.saturating_mul(10).saturating_add(u32::from(digit - b'0'));
                    self.lexer.skip(1);
                }
                self.clamp_escape(value)
            }
            other => return Err(ScriptError::UnknownEscape { line: self.line, escape: char::from(other) }),
        };
        Ok(value)
    }

    fn clamp_escape(&mut self, value: u32) -> u8 {
        match u8::try_from(value) {
            Ok(value) => value,
            Err(_) => {
                self.warning("too large value in escape character");
                0xFF
            }
        }
    }

    fn read_number(&mut self, token: &mut Token) -> ScriptResult<()> {
        token.kind = TokenKind::Number;
        let start = self.lexer.pos();
        let mut flags = NumberFlags::empty();

        if self.lexer.take_multi(b"0x") || self.lexer.take_multi(b"0X") {
            self.lexer.skip_while(|c| c.is_ascii_hexdigit());
            flags |= NumberFlags::HEX;
        } else if !self.flags.contains(ScriptFlags::NO_BINARY_NUMBERS) &&
            (self.lexer.take_multi(b"0b") || self.lexer.take_multi(b"0B")) {
            self.lexer.skip_while(|c| c == b'0' || c == b'1');
            flags |= NumberFlags::BINARY;
        } else {
            let mut octal = self.lexer.peek() == Some(b'0');
            let mut dots = 0;
            while let Some(c) = self.lexer.peek() {
                match c {
                    b'.' => dots += 1,
                    b'8' | b'9' => octal = false,
                    b'0'..=b'7' => {}
                    _ => break
                }
                self.lexer.skip(1);
            }
            if dots > 1 {
                let text = String::from_utf8_lossy(self.lexer.slice(start..self.lexer.pos())).into_owned();
                return Err(ScriptError::InvalidNumber { line: self.line, text })
            }
            flags |= match (dots, octal) {
                (1, _) => NumberFlags::FLOAT | NumberFlags::DECIMAL,
                (_, true) => NumberFlags::OCTAL,
                _ => NumberFlags::DECIMAL,
            };
        }

        if self.lexer.pos() - start >= self.max_token_length {
            return Err(ScriptError::TokenTooLong { line: self.line, what: "number", max: self.max_token_length })
        }
        let text = String::from_utf8_lossy(self.lexer.slice(start..self.lexer.pos())).into_owned();

        for _ in 0..2 {
            match self.lexer.peek() {
                Some(b'l' | b'L') if !flags.contains(NumberFlags::LONG) => flags |= NumberFlags::LONG,
                Some(b'u' | b'U') if !flags.intersects(NumberFlags::UNSIGNED | NumberFlags::FLOAT) => flags |= NumberFlags::UNSIGNED,
                _ => break
            }
            self.lexer.skip(1);
        }
        if !flags.contains(NumberFlags::FLOAT) {
            flags |= NumberFlags::INTEGER;
        }
        if !self.flags.contains(ScriptFlags::NO_NUMBER_VALUES) {
            (token.int_value, token.float_value) = number_value(&text, flags);
        }
        token.flags = flags;
        token.text = text;
        Ok(())
    }

    fn read_name(&mut self, token: &mut Token) -> ScriptResult<()> {
        let start = self.lexer.pos();
        let length = self.lexer.skip_while(|c| c.is_ascii_alphanumeric() || c == b'_');
        if length >= self.max_token_length {
            return Err(ScriptError::TokenTooLong { line: self.line, what: "name", max: self.max_token_length })
        }
        token.kind = TokenKind::Name;
        token.text = String::from_utf8_lossy(self.lexer.slice(start..start + length)).into_owned();
        Ok(())
    }

    fn read_primitive(&mut self, token: &mut Token) -> ScriptResult<()> {
        let start = self.lexer.pos();
        if self.lexer.skip_while(|c| c > b' ' && c != b';') == 0 {
            self.lexer.skip(1);
        }
        if self.lexer.pos() - start >= self.max_token_length {
            return Err(ScriptError::TokenTooLong { line: self.line, what: "primitive token", max: self.max_token_length })
        }
        token.kind = TokenKind::Name;
        token.text = String::from_utf8_lossy(self.lexer.slice(start..self.lexer.pos())).into_owned();
        Ok(())
    }

    fn read_punctuation(&mut self, token: &mut Token) -> ScriptResult<()> {
        match self.punctuations.longest_match(self.lexer.remaining()).cloned() {
            Some(entry) => {
                self.lexer.skip(entry.text.len());
                token.kind = TokenKind::Punctuation;
                token.punct = Some(entry.punct);
                token.text = entry.text;
                Ok(())
            }
            None => {
                // step over it so the next read makes progress
                let found = self.lexer.get().map_or('\0', char::from);
                Err(ScriptError::UnreadableToken { line: self.line, found })
            }
        }
    }

    fn warning(&mut self, message: &str) {
        if !self.flags.contains(ScriptFlags::NO_WARNINGS) {
            self.diagnostics.warning(&self.filename, self.line, message);
        }
    }
}

impl Tokenizer for Script {
    type Token = Token;
    type Error = ScriptError;

    fn next_token(&mut self) -> Result<Option<Token>, ScriptError> { self.read_token() }
}

fn decode(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|error| error.into_bytes().into_iter().map(char::from).collect())
}

fn number_value(text: &str, flags: NumberFlags) -> (u64, f64) {
    if flags.contains(NumberFlags::FLOAT) {
        let value = text.parse::<f64>().unwrap_or(0.0);
        return (value as u64, value)
    }
    let (digits, radix) = if flags.contains(NumberFlags::HEX) {
        (&text[2..], 16)
    } else if flags.contains(NumberFlags::BINARY) {
        (&text[2..], 2)
    } else if flags.contains(NumberFlags::OCTAL) {
        (text, 8)
    } else {
        (text, 10)
    };
    let value = digits.chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0u64, |value, digit| value.wrapping_mul(u64::from(radix)).wrapping_add(u64::from(digit)));
    (value, value as f64)
}
