use thiserror::Error;

pub type ScriptResult<T> = Result<T, ScriptError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("[{line}] Unterminated comment")]
    UnterminatedComment {
        line: u32,
    },
    #[error("[{line}] Missing trailing quote")]
    MissingTrailingQuote {
        line: u32,
    },
    #[error("[{line}] Newline inside string {text}")]
    NewlineInString {
        line: u32,
        text: String,
    },
    #[error("[{line}] Unknown escape char \\{escape}")]
    UnknownEscape {
        line:   u32,
        escape: char,
    },
    #[error("[{line}] {what} longer than {max} characters")]
    TokenTooLong {
        line: u32,
        what: &'static str,
        max:  usize,
    },
    #[error("[{line}] Invalid number \"{text}\"")]
    InvalidNumber {
        line: u32,
        text: String,
    },
    #[error("[{line}] Can't read token starting with '{found}'")]
    UnreadableToken {
        line:  u32,
        found: char,
    },
    #[error("Unknown token kind {0}")]
    UnknownTokenKind(u32),
    #[error("Unknown punctuation code {0}")]
    UnknownPunctuation(u32),
}

impl ScriptError {
    /// Line the error was raised on, when it comes from scanning text.
    pub fn line(&self) -> Option<u32> {
        match self {
            ScriptError::UnterminatedComment { line } |
            ScriptError::MissingTrailingQuote { line } |
            ScriptError::NewlineInString { line, .. } |
            ScriptError::UnknownEscape { line, .. } |
            ScriptError::TokenTooLong { line, .. } |
            ScriptError::InvalidNumber { line, .. } |
            ScriptError::UnreadableToken { line, .. } => Some(*line),
            ScriptError::UnknownTokenKind(_) | ScriptError::UnknownPunctuation(_) => None,
        }
    }
}
