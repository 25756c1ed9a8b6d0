//! A lexical scanner and C-style precompiler for script and data-definition files.
//!
//! Text is split into typed [`Token`]s by a [`Script`]. A [`Source`] stacks scripts to follow
//! `#include`, keeps a table of `#define`d macros, evaluates `#if` expressions, and hands fully
//! expanded tokens to the caller one at a time. [`Precompiler`] manages several open sources behind
//! small integer handles.

pub mod core;       pub use crate::core::*;
pub mod diagnostic; pub use diagnostic::*;
pub mod options;    pub use options::*;
pub mod script;     pub use script::*;
pub mod precomp;    pub use precomp::*;
pub mod handle;     pub use handle::*;
