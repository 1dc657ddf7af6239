//! Core types for salt-api clients.
//!
//! This crate provides the fundamental building blocks:
//! - `AuthContext` / `AuthOverride` - Session authentication state
//! - `ExecutionRequest` - Wire shape of one unit of work, with builders
//! - `FleetEvent` / `JobHandle` - Results of streaming and async dispatch
//! - `Transport` trait and the `ApiError` taxonomy

pub mod context;
pub mod event;
pub mod job;
pub mod request;
pub mod traits;

pub use context::{AuthContext, AuthOverride, AuthScheme, AuthStrategy};
pub use event::FleetEvent;
pub use job::JobHandle;
pub use request::{ClientKind, Credentials, ExecutionRequest, LocalCall, MasterCall, TargetType};
pub use traits::{ApiError, ApiRequest, ApiResponse, ByteStream, Method, Transport};
