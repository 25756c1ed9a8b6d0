mod error;           pub use error::*;
pub mod token;       pub use token::*;
pub mod punctuation; pub use punctuation::*;
mod lexer;           pub use lexer::*;
