pub mod document;
pub mod enums;
pub mod publication;
pub mod ticket;

pub use document::*;
pub use publication::*;
pub use ticket::*;
