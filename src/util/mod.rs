//! Small helpers shared by the API layer and the terminal shell.
//!
//! - **Text**: stripping terminal control sequences from backend strings,
//!   width-aware truncation, word-limited excerpts
//! - **URLs**: validating article links before handing them to the OS opener
//! - **Time**: "3h ago" style relative timestamps for the article card

mod text;
mod time;
mod url_validator;

pub use text::{display_width, limit_words, strip_control_chars, truncate_to_width};
pub use time::format_time_ago;
pub use url_validator::{validate_url_for_open, UrlValidationError};
