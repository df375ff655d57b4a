//! Cooperative cancellation shared by every pipeline of a run.

mod token;

pub use token::CancellationToken;
