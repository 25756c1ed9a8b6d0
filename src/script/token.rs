use std::fmt;
use bitflags::bitflags;
use crate::{magic_enum, Punct, ScriptError};

magic_enum! {
    /// Broad class of a token. The numeric codes are the ones scripts have always been exchanged with.
    pub TokenKind: u32, ScriptError::UnknownTokenKind {
        String = 1 => "string",
        Literal = 2 => "literal",
        Number = 3 => "number",
        Name = 4 => "name",
        Punctuation = 5 => "punctuation",
    }
}

bitflags! {
    /// Base and decorations of a number token.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NumberFlags: u32 {
        const DECIMAL  = 0x0008;
        const HEX      = 0x0100;
        const OCTAL    = 0x0200;
        const BINARY   = 0x0400;
        const FLOAT    = 0x0800;
        const INTEGER  = 0x1000;
        const LONG     = 0x2000;
        const UNSIGNED = 0x4000;
    }
}

/// One lexical unit.
///
/// String and literal tokens keep their surrounding quotes in `text`; see [`Token::unquoted`].
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind:              TokenKind,
    pub flags:             NumberFlags,
    pub punct:             Option<Punct>,
    pub text:              String,
    pub int_value:         u64,
    pub float_value:       f64,
    pub line:              u32,
    /// Newlines between the previous token of the same script and this one.
    pub lines_crossed:     u32,
    pub whitespace_before: bool,
    /// First token on its line, or first token of its script.
    pub line_start:        bool,
    /// Number of macro expansions this token went through.
    pub depth:             u32,
}

impl Token {
    pub fn new<S: Into<String>>(kind: TokenKind, text: S, line: u32) -> Self {
        Self {
            kind,
            flags: NumberFlags::empty(),
            punct: None,
            text: text.into(),
            int_value: 0,
            float_value: 0.0,
            line,
            lines_crossed: 0,
            whitespace_before: false,
            line_start: false,
            depth: 0,
        }
    }

    pub fn name<S: Into<String>>(text: S, line: u32) -> Self { Self::new(TokenKind::Name, text, line) }

    pub fn punctuation(punct: Punct, line: u32) -> Self {
        Self { punct: Some(punct), ..Self::new(TokenKind::Punctuation, punct.text(), line) }
    }

    /// A string token holding `contents` between double quotes.
    pub fn string(contents: &str, line: u32) -> Self {
        Self::new(TokenKind::String, format!("\"{contents}\""), line)
    }

    pub fn integer(value: u64, line: u32) -> Self {
        Self {
            flags: NumberFlags::INTEGER | NumberFlags::DECIMAL,
            int_value: value,
            float_value: value as f64,
            ..Self::new(TokenKind::Number, value.to_string(), line)
        }
    }

    /// A float token rendered with two decimals.
    pub fn float(value: f64, line: u32) -> Self {
        Self {
            flags: NumberFlags::FLOAT | NumberFlags::DECIMAL,
            int_value: value as u64,
            float_value: value,
            ..Self::new(TokenKind::Number, format!("{value:.2}"), line)
        }
    }

    /// Kind-dependent detail code: number flag bits, the punctuation
    /// code, or the text length for strings, literals and names.
    pub fn subtype(&self) -> u32 {
        match self.kind {
            TokenKind::Number => self.flags.bits(),
            TokenKind::Punctuation => self.punct.map_or(0, Punct::code),
            _ => self.text.len() as u32,
        }
    }

    #[inline]
    pub fn is_punct(&self, punct: Punct) -> bool { self.punct == Some(punct) }

    #[inline]
    pub fn is_name(&self, name: &str) -> bool { self.kind == TokenKind::Name && self.text == name }

    #[inline]
    pub fn is_float(&self) -> bool { self.flags.contains(NumberFlags::FLOAT) }

    /// Text without the surrounding quotes of a string or literal.
    pub fn unquoted(&self) -> &str {
        let quote = match self.kind {
            TokenKind::String => '"',
            TokenKind::Literal => '\'',
            _ => return &self.text,
        };
        let text = self.text.strip_prefix(quote).unwrap_or(&self.text);
        text.strip_suffix(quote).unwrap_or(text)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.text) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtype_follows_kind() {
        let number = Token::integer(12, 1);
        assert_eq!(number.subtype(), 0x1008);
        assert_eq!(Token::punctuation(Punct::ShrAssign, 1).subtype(), 1);
        assert_eq!(Token::string("abc", 1).subtype(), 5);
    }

    #[test]
    fn unquoted_strips_matching_quotes() {
        assert_eq!(Token::string("a b", 1).unquoted(), "a b");
        assert_eq!(Token::new(TokenKind::Literal, "'x'", 1).unquoted(), "x");
        assert_eq!(Token::name("plain", 1).unquoted(), "plain");
    }

    #[test]
    fn float_renders_two_decimals() {
        let token = Token::float(2.5, 3);
        assert_eq!(token.text, "2.50");
        assert_eq!(token.int_value, 2);
        assert!(token.is_float());
    }
}
