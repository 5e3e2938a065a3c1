mod chunk;
mod failure;
mod mention;
mod result;

pub use chunk::*;
pub use failure::*;
pub use mention::*;
pub use result::*;
