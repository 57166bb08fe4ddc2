//! Shared types for the capability engine

mod error;

pub use error::{CapabilityError, Result};
