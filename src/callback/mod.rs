//! Callback module - outbound delivery of asynchronous generation results.

pub mod dispatcher;
pub mod models;

pub use dispatcher::CallbackDispatcher;
pub use models::{CallbackKind, CallbackPayload, CallbackStatus};
