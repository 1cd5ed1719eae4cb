//! Tool management for the equity research pipeline
//!
//! This crate provides the [`Tool`] trait, an order-preserving
//! [`ToolRegistry`] and the append-only [`ToolCallLog`] the tool loop keeps
//! of every call it makes.

pub mod record;
pub mod registry;
pub mod tool;

pub use record::{ToolCallLog, ToolCallRecord, ToolOutcome};
pub use registry::ToolRegistry;
pub use tool::Tool;
