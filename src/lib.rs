//! NineT terminal client.
//!
//! A swipeable feed of AI news briefs backed by the NineT article API, with
//! per-user read/bookmark tracking stored locally and mirrored to Supabase.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod feed;
pub mod interactions;
pub mod storage;
pub mod ui;
pub mod util;
