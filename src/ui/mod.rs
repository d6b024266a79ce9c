//! Terminal User Interface module.
//!
//! The terminal front end:
//! - Main event loop (`run`)
//! - Key and mouse-drag handling
//! - Rendering for the article card, weekly breakdown and overlays
//! - Background task event processing
//!
//! # Module Structure
//!
//! - `loop_runner` - Main event loop and terminal management
//! - `input` - Keyboard input and drag gestures
//! - `events` - Background task event processing
//! - `render` - Screen and overlay dispatch
//! - `card` - Article card widget
//! - `weekly` - Weekly list and markdown detail page
//! - `categories` - Category picker overlay
//! - `status` - Status bar widget

mod card;
mod categories;
mod events;
mod input;
mod loop_runner;
mod render;
mod status;
mod weekly;

// Re-export the public API
pub use loop_runner::{run, Action};
