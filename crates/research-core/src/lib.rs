//! Core types for the equity research pipeline
//!
//! This crate defines the types every other crate in the workspace shares:
//! the error taxonomy, the validated [`Ticker`] and the request-scoped
//! [`SharedState`] that branch reports are merged into.

pub mod error;
pub mod state;
pub mod ticker;

pub use error::{Error, Result};
pub use state::{BranchSlot, SharedState};
pub use ticker::Ticker;
