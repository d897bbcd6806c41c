// Application layer - ledger use cases and their error types.
// Callers hand in already-authenticated user ids; nothing here deals with
// sessions or transport.

pub mod error;
mod locks;
mod service;

pub use error::*;
pub use locks::*;
pub use service::*;
