pub mod io;    pub use io::*;
pub mod magic;
pub mod arena; pub use arena::*;
