//! Session, dispatch and result handling for salt-api clients.
//!
//! Provides:
//! - `Session` - owns the authentication context (login/logout)
//! - `Client` - dispatcher for local, local_async, local_batch, runner and wheel calls
//! - `BatchResults` - single-pass sequence of staged results
//! - Resource listings (minions, jobs, keys, stats, hooks, key generation)

pub mod batch;
pub mod dispatch;
pub mod envelope;
pub mod resources;
pub mod session;

#[cfg(test)]
mod testing;

pub use batch::BatchResults;
pub use dispatch::Client;
pub use resources::KeyGenOptions;
pub use session::Session;
