//! Core data models, fault taxonomy and the retry combinator

mod credentials;
mod error;
mod metric;
mod retry;
mod vehicle;

pub use credentials::*;
pub use error::*;
pub use metric::*;
pub use retry::*;
pub use vehicle::*;
