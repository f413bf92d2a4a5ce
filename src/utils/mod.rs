// The `utils` module provides utility functions for the agent.

pub mod google_auth;
pub mod template;

pub use crate::utils::template::{TEngine, TEngineError};
