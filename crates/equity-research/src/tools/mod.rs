//! Tools offered to the news tool loop

pub mod news_search;

pub use news_search::{NewsSearchTool, SearchDefaults};
