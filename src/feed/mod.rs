//! Feed presentation core.
//!
//! - [`view`]: pure derivation of the presented articles from the raw list,
//!   interaction facts, view mode and category preferences
//! - [`controller`]: owns the raw list and keeps view and position consistent
//! - [`gesture`]: swipe state machine that moves the position by ±1
//! - [`dwell`]: passive "read" detection after continuous focus

mod controller;
mod dwell;
mod gesture;
mod view;

pub use controller::FeedController;
pub use dwell::DwellTimer;
pub use gesture::{Direction, GestureConfig, Navigator, Phase, Release, Settled};
pub use view::{compute_view, current_article, FeedView, FilterMode, Preferences, ViewMode};
