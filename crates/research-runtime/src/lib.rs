//! Runtime for the equity research pipeline
//!
//! This crate provides [`ToolCallLoop`], the bounded state machine that lets a
//! reasoning service call tools until it produces a final answer.

pub mod tool_loop;

pub use tool_loop::{
    LoopConfig, LoopEvent, LoopOutcome, LoopState, LoopTermination, ToolCallLoop,
    ToolCallLoopBuilder,
};
