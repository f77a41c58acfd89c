pub mod campaign;
pub mod common;
pub mod pagination;
pub mod participation;

pub use campaign::*;
pub use common::*;
pub use pagination::*;
pub use participation::*;
