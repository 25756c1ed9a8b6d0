use std::error::Error;
use std::ops::Range;
use crate::Analyser;

/// An owned byte buffer with a read cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexer {
    cursor:      usize,
    contents:    Vec<u8>
}

impl Lexer {
    pub fn new<B: AsRef<[u8]>>(contents: B) -> Self {
        Self {
            cursor: 0,
            contents: Vec::from(contents.as_ref()),
        }
    }

    #[inline]
    pub fn slice(&self, range: Range<usize>) -> &[u8] { &self.contents[range] }

    #[inline]
    pub fn reset(&mut self) -> usize { std::mem::replace(&mut self.cursor, 0) }
}

pub trait Tokenizer {
    type Token;
    type Error: Error;

    /// Next token, or `None` once the input is exhausted.
    fn next_token(&mut self) -> Result<Option<Self::Token>, Self::Error>;

    fn tokenize_until_end(&mut self) -> Result<Vec<Self::Token>, Self::Error> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }
}

impl Analyser<u8> for Lexer {

    #[inline]
    fn contents(&self) -> &[u8] { &self.contents }

    #[inline]
    fn pos(&self) -> usize { self.cursor }

    #[inline]
    fn set_cursor(&mut self, cursor: usize) { self.cursor = cursor; }
}
