//! Core types and traits for the cgMLST calculation engine.
//!
//! Job documents, query filters, and request DTOs are shared by the store, calculator,
//! scheduler, and API crates.

mod dto;
mod job;
mod path;
mod query;
mod traits;

pub use dto::*;
pub use job::*;
pub use path::*;
pub use query::*;
pub use traits::*;
