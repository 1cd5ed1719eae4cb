//! Prompt templates
//!
//! - `system`: fixed system prompts, one per reasoning role
//! - `user`: minijinja user message templates filled with the ticker and the
//!   fetched data

mod system;
mod user;

pub use system::*;
pub use user::*;

use crate::error::Result;
use minijinja::Environment;
use serde::Serialize;

/// Render a template string with the given variables
pub fn render(template: &str, vars: impl Serialize) -> Result<String> {
    let mut env = Environment::new();
    env.add_filter("upper", |s: String| s.to_uppercase());
    env.add_filter("trim", |s: String| s.trim().to_string());

    Ok(env.render_str(template, minijinja::Value::from_serialize(vars))?)
}
