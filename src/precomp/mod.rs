mod error;     pub use error::*;
pub mod eval; pub use eval::*;
pub mod define; pub use define::*;
pub mod directive; pub use directive::*;
pub mod include; pub use include::*;

use std::fmt;
use std::sync::Arc;
use log::{debug, trace};
use vfs::FileSystem;
use crate::{Arena, ArenaIndex, Diagnostic, Diagnostics, PrecompOptions, Punct, PunctuationTable, Script, ScriptError,
            ScriptFlags, Severity, Token, TokenKind, Tokenizer};

/// A file name and line, as reported for the innermost open script of a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub filename: String,
    pub line:     u32,
}

/// Tokens built by the precompiler obey the scanner's bound: text shorter than `max` bytes.
pub(crate) fn check_token_length(token: &Token, max: usize) -> PrecompResult<()> {
    match token.text.len() < max {
        true => Ok(()),
        false => Err(ScriptError::TokenTooLong { line: token.line, what: token.kind.text(), max }.into()),
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, line {}", self.filename, self.line)
    }
}

/// A precompiling token stream over a stack of scripts.
///
/// The bottom script is the file the source was opened with; `#include` pushes more on top and
/// each is popped when it runs out. Tokens produced by macro expansion, evaluation or unreading
/// wait in a bounded arena and are handed out before anything is read from a script again.
pub struct Source {
    filename:     String,
    fs:           Arc<dyn FileSystem>,
    options:      PrecompOptions,
    punctuations: Arc<PunctuationTable>,
    scripts:      Vec<Script>,
    tokens:       Arena<Token>,
    pending:      Vec<ArenaIndex>,
    macros:       MacroTable,
    indents:      Vec<Indent>,
    skip:         u32,
    last_token:   Option<Token>,
    diagnostics:  Diagnostics
}

impl Source {
    fn empty(filename: &str, fs: Arc<dyn FileSystem>, options: PrecompOptions) -> Self {
        Self {
            filename: filename.to_string(),
            fs,
            punctuations: Arc::new(PunctuationTable::default()),
            scripts: Vec::new(),
            tokens: Arena::new("pending tokens", options.max_pending_tokens),
            pending: Vec::new(),
            macros: MacroTable::with_builtins(),
            indents: Vec::new(),
            skip: 0,
            last_token: None,
            diagnostics: Diagnostics::new(),
            options,
        }
    }

    #[inline]
    pub fn filename(&self) -> &str { &self.filename }

    #[inline]
    pub fn options(&self) -> &PrecompOptions { &self.options }

    #[inline]
    pub fn macros(&self) -> &MacroTable { &self.macros }

    #[inline]
    pub fn is_defined(&self, name: &str) -> bool { self.macros.contains(name) }

    /// Open conditional blocks, innermost last.
    #[inline]
    pub fn indents(&self) -> &[Indent] { &self.indents }

    /// Number of open conditional blocks whose branch is being skipped.
    #[inline]
    pub fn skip_depth(&self) -> u32 { self.skip }

    #[inline]
    pub fn script_depth(&self) -> usize { self.scripts.len() }

    #[inline]
    pub fn pending_tokens(&self) -> usize { self.pending.len() }

    #[inline]
    pub fn last_token(&self) -> Option<&Token> { self.last_token.as_ref() }

    #[inline]
    pub fn diagnostics(&self) -> &[Diagnostic] { self.diagnostics.entries() }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> { self.diagnostics.take() }

    /// File and line of the innermost open script.
    pub fn location(&self) -> SourceLocation {
        match self.scripts.last() {
            Some(script) => SourceLocation { filename: script.filename().to_string(), line: script.line() },
            None => SourceLocation { filename: self.filename.clone(), line: 0 },
        }
    }

    /// Searched for `#include` files that are not found relative to the base folder.
    pub fn set_include_path<S: Into<String>>(&mut self, path: S) { self.options.include_path = path.into() }

    /// Used by every script opened from now on.
    pub fn set_punctuations(&mut self, table: PunctuationTable) { self.punctuations = Arc::new(table) }

    /// Next fully precompiled token, or `None` once the bottom script is exhausted.
    ///
    /// Errors that only affect block structure (a misplaced `#else`, a recursive include, ..) are
    /// recorded as diagnostics and reading carries on. Anything else is recorded and returned.
    pub fn read_token(&mut self) -> PrecompResult<Option<Token>> {
        loop {
            match self.precompile_token(true) {
                Ok(token) => return Ok(token),
                Err(error) => {
                    if error.aborts_expansion() {
                        self.discard_expansions();
                    }
                    self.report(&error);
                    if !error.is_structural() {
                        return Err(error)
                    }
                }
            }
        }
    }

    /// Hands `token` out again before anything else.
    pub fn unread_token(&mut self, token: Token) -> PrecompResult<()> { self.unread_source_token(token) }

    /// Hands the last token returned by [`Source::read_token`] out again. False if there is none.
    pub fn unread_last_token(&mut self) -> PrecompResult<bool> {
        match self.last_token.take() {
            Some(token) => {
                self.unread_source_token(token)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Next token after directives and macro expansion. With `merge`, directly following strings
    /// are joined onto a string token.
    fn precompile_token(&mut self, merge: bool) -> PrecompResult<Option<Token>> {
        loop {
            let Some(token) = self.read_source_token()? else {
                return Ok(None)
            };
            if token.kind == TokenKind::Punctuation {
                if token.depth == 0 && token.line_start && token.is_punct(Punct::Hash) {
                    self.read_directive(&token)?;
                    continue
                }
                if self.skip == 0 && self.options.dollar_directives && token.is_punct(Punct::Dollar) {
                    self.read_dollar_directive(&token)?;
                    continue
                }
            }
            if self.skip > 0 {
                continue
            }
            let token = match token.kind {
                TokenKind::String if merge => self.merge_strings(token)?,
                TokenKind::Name if self.macros.contains(&token.text) => {
                    self.expand_into_source(&token)?;
                    continue
                }
                _ => token,
            };
            trace!("{} {}", token.kind, token.text);
            self.last_token = Some(token.clone());
            return Ok(Some(token))
        }
    }

    /// Joins the string tokens that follow `token` once directives and macros are resolved. When
    /// reading on fails, `token` is handed out again by the next read. A join that grows too long
    /// fails and leaves the string it could not take for the next read.
    fn merge_strings(&mut self, mut token: Token) -> PrecompResult<Token> {
        loop {
            let next = match self.precompile_token(false) {
                Ok(next) => next,
                Err(error) => {
                    self.unread_source_token(token)?;
                    return Err(error)
                }
            };
            match next {
                Some(next) if next.kind == TokenKind::String => {
                    token.text.pop();
                    token.text.push_str(&next.text[1..]);
                    if let Err(error) = check_token_length(&token, self.options.max_token_length) {
                        self.unread_source_token(next)?;
                        return Err(error)
                    }
                }
                Some(next) => {
                    self.unread_source_token(next)?;
                    return Ok(token)
                }
                None => return Ok(token),
            }
        }
    }

    /// Drops every queued token that came out of a macro expansion. Tokens read from a script and
    /// pushed back stay queued.
    fn discard_expansions(&mut self) {
        let before = self.pending.len();
        let tokens = &mut self.tokens;
        self.pending.retain(|&index| {
            let expanded = tokens.get(index).is_some_and(|token| token.depth > 0);
            if expanded {
                tokens.free(index).ok();
            }
            !expanded
        });
        debug!("dropped {} expanded tokens", before - self.pending.len());
    }

    /// Next raw token: pending tokens first, then the innermost script. Scripts that run out are
    /// closed, except the bottom one.
    pub(crate) fn read_source_token(&mut self) -> PrecompResult<Option<Token>> {
        if let Some(index) = self.pending.pop() {
            return Ok(Some(self.tokens.free(index)?))
        }
        loop {
            let Some(script) = self.scripts.last_mut() else {
                return Ok(None)
            };
            let result = script.read_token();
            let reported = script.take_diagnostics();
            self.diagnostics.append(reported);
            if let Some(token) = result? {
                return Ok(Some(token))
            }
            self.close_script_indents();
            if self.scripts.len() <= 1 {
                return Ok(None)
            }
            self.pop_script();
        }
    }

    pub(crate) fn unread_source_token(&mut self, token: Token) -> PrecompResult<()> {
        let index = self.tokens.alloc(token)?;
        self.pending.push(index);
        Ok(())
    }

    /// Queues `tokens` so they are read in order. Nothing is queued if they don't all fit.
    pub(crate) fn push_tokens(&mut self, tokens: Vec<Token>) -> PrecompResult<()> {
        self.tokens.ensure_room(tokens.len())?;
        for token in tokens.into_iter().rev() {
            self.unread_source_token(token)?;
        }
        Ok(())
    }

    /// Next raw token on the current directive line. A `\` carries the line over to the next one.
    pub(crate) fn read_line(&mut self) -> PrecompResult<Option<Token>> {
        let mut crossed = 0;
        loop {
            let Some(token) = self.read_source_token()? else {
                return Ok(None)
            };
            if token.lines_crossed > crossed {
                self.unread_source_token(token)?;
                return Ok(None)
            }
            crossed = 1;
            if !token.is_punct(Punct::Backslash) {
                return Ok(Some(token))
            }
        }
    }

    pub(crate) fn skip_line(&mut self) -> PrecompResult<()> {
        while self.read_line()?.is_some() {}
        Ok(())
    }

    /// Name of the innermost open script.
    pub(crate) fn current_filename(&self) -> &str {
        self.scripts.last().map_or(self.filename.as_str(), Script::filename)
    }

    pub(crate) fn report(&mut self, error: &PrecompError) { self.emit(Severity::Error, error.to_string()) }

    pub(crate) fn warning<M: Into<String>>(&mut self, message: M) { self.emit(Severity::Warning, message) }

    fn emit<M: Into<String>>(&mut self, severity: Severity, message: M) {
        let flags = self.scripts.last().map_or(self.options.script_flags, Script::flags);
        let suppressed = match severity {
            Severity::Message => false,
            Severity::Warning => flags.contains(ScriptFlags::NO_WARNINGS),
            Severity::Error | Severity::Fatal => flags.contains(ScriptFlags::NO_ERRORS),
        };
        if suppressed {
            return
        }
        let (file, line) = match self.scripts.last() {
            Some(script) => (script.filename(), script.line()),
            None => (self.filename.as_str(), 0),
        };
        self.diagnostics.emit(severity, file, line, message);
    }

    /// Reports `error` and hands it back.
    fn fail(&mut self, error: PrecompError) -> PrecompError {
        self.report(&error);
        error
    }

    pub fn expect_any_token(&mut self) -> PrecompResult<Token> {
        match self.read_token()? {
            Some(token) => Ok(token),
            None => Err(self.fail(PrecompError::UnexpectedEnd("token".to_string()))),
        }
    }

    /// Next token, which must read exactly `expected`.
    pub fn expect_token_string(&mut self, expected: &str) -> PrecompResult<Token> {
        let Some(token) = self.read_token()? else {
            return Err(self.fail(PrecompError::UnexpectedEnd(format!("'{expected}'"))))
        };
        if token.text != expected {
            return Err(self.fail(PrecompError::Expected { expected: format!("'{expected}'"), found: token.text }))
        }
        Ok(token)
    }

    pub fn expect_token_kind(&mut self, kind: TokenKind) -> PrecompResult<Token> {
        let Some(token) = self.read_token()? else {
            return Err(self.fail(PrecompError::UnexpectedEnd(kind.to_string())))
        };
        if token.kind != kind {
            let found = format!("{} {}", token.kind, token.text);
            return Err(self.fail(PrecompError::Expected { expected: kind.to_string(), found }))
        }
        Ok(token)
    }

    /// Consumes the next token if it reads `expected`, otherwise leaves it in place.
    pub fn check_token_string(&mut self, expected: &str) -> PrecompResult<bool> {
        match self.read_token()? {
            Some(token) if token.text == expected => Ok(true),
            Some(token) => {
                self.unread_token(token)?;
                Ok(false)
            }
            None => Ok(false),
        }
    }

    /// Reads up to and including a token reading `target`. False if the source ran out first.
    pub fn skip_until_string(&mut self, target: &str) -> PrecompResult<bool> {
        while let Some(token) = self.read_token()? {
            if token.text == target {
                return Ok(true)
            }
        }
        Ok(false)
    }

    /// An integer number, optionally preceded by `-`.
    pub fn read_signed_int(&mut self) -> PrecompResult<i64> {
        let (negative, token) = self.read_signed_number()?;
        if token.kind != TokenKind::Number || token.is_float() {
            return Err(self.fail(PrecompError::ExpectedValue("integer", token.text)))
        }
        let value = token.int_value as i64;
        Ok(if negative { value.wrapping_neg() } else { value })
    }

    /// Any number, optionally preceded by `-`.
    pub fn read_signed_float(&mut self) -> PrecompResult<f64> {
        let (negative, token) = self.read_signed_number()?;
        if token.kind != TokenKind::Number {
            return Err(self.fail(PrecompError::ExpectedValue("float", token.text)))
        }
        Ok(if negative { -token.float_value } else { token.float_value })
    }

    fn read_signed_number(&mut self) -> PrecompResult<(bool, Token)> {
        let token = self.expect_any_token()?;
        match token.is_punct(Punct::Sub) {
            true => Ok((true, self.expect_any_token()?)),
            false => Ok((false, token)),
        }
    }
}

impl Tokenizer for Source {
    type Token = Token;
    type Error = PrecompError;

    fn next_token(&mut self) -> Result<Option<Self::Token>, Self::Error> { self.read_token() }
}
