use std::io;
use thiserror::Error;
use vfs::VfsError;
use crate::{ArenaError, EvalError, ScriptError};

pub type PrecompResult<T> = Result<T, PrecompError>;

#[derive(Debug, Error)]
pub enum PrecompError {
    #[error(transparent)]
    IO(#[from] io::Error),
    #[error(transparent)]
    Vfs(#[from] VfsError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Arena(#[from] ArenaError),
    #[error("File {0} not found")]
    FileNotFound(String),
    #[error("{0} recursively included")]
    RecursiveInclude(String),
    #[error("Found {0} without name")]
    DirectiveWithoutName(&'static str),
    #[error("Found {0} at end of line")]
    DirectiveAtEndOfLine(&'static str),
    #[error("Unknown precompiler directive {0}")]
    UnknownDirective(String),
    #[error("#{0} without name")]
    MissingName(&'static str),
    #[error("Expected {expected}, found {found}")]
    Expected {
        expected: String,
        found:    String,
    },
    #[error("Couldn't read expected {0}")]
    UnexpectedEnd(String),
    #[error("#include without file name")]
    IncludeWithoutName,
    #[error("Misplaced #{0}")]
    Misplaced(&'static str),
    #[error("#{0} after #else")]
    AfterElse(&'static str),
    #[error("#{directive} closes a block opened in an including file")]
    IndentMismatch {
        directive: &'static str,
    },
    #[error("Can't redefine {0}")]
    RedefineFixed(String),
    #[error("Expected define parameter")]
    ExpectedParameter,
    #[error("Invalid define parameter {0}")]
    InvalidParameter(String),
    #[error("Two the same define parameters {0}")]
    DuplicateParameter(String),
    #[error("Define parameters not terminated")]
    UnterminatedParameters,
    #[error("Define with more than {0} parameters")]
    TooManyParameters(usize),
    #[error("Recursive define {0} (removed recursion)")]
    RecursiveDefine(String),
    #[error("Define with misplaced ##")]
    MisplacedPaste,
    #[error("Define {0} missing parms")]
    MissingArguments(String),
    #[error("Define {0} incomplete")]
    UnterminatedArguments(String),
    #[error("Define {name} has too many parms, expected {expected}")]
    TooManyArguments {
        name:     String,
        expected: usize,
    },
    #[error("Can't merge {left} with {right}")]
    InvalidPaste {
        left:  String,
        right: String,
    },
    #[error("Expansion of {name} nested deeper than {limit} levels")]
    MacroRecursion {
        name:  String,
        limit: u32,
    },
    #[error("#error directive: {0}")]
    UserError(String),
    #[error("#line directive not supported")]
    LineNotSupported,
    #[error("Expected {0} value, found {1}")]
    ExpectedValue(&'static str, String),
    #[error("Too many open sources, at most {0}")]
    TooManySources(usize),
    #[error("Invalid source handle {0}")]
    InvalidHandle(u32),
}

impl PrecompError {
    /// Errors that leave a macro expansion half done. Its remaining tokens are dropped.
    pub fn aborts_expansion(&self) -> bool {
        matches!(self, PrecompError::MacroRecursion { .. } | PrecompError::Arena(ArenaError::Exhausted { .. }))
    }

    /// Errors after which reading carries on with the next token instead of failing.
    pub fn is_structural(&self) -> bool {
        matches!(self,
            PrecompError::RecursiveInclude(_) |
            PrecompError::Misplaced(_) |
            PrecompError::AfterElse(_) |
            PrecompError::IndentMismatch { .. } |
            PrecompError::RedefineFixed(_)
        )
    }
}
