//! Cooperative cancellation for builds and the processes they spawn.

mod token;

pub use token::CancellationToken;
