pub mod analysis;    pub use analysis::*;
mod lexer;           pub use lexer::*;
