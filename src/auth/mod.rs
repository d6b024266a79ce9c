//! Authentication against Supabase GoTrue.
//!
//! The rest of the crate only asks "is a user present, and who": an explicit
//! [`UserIdentity`] carried inside a [`Session`]. [`session`] persists that
//! session between runs.

mod client;
mod prompt;
mod session;

pub use client::{AuthClient, AuthError, Profile, Session, SignUpOutcome, UserIdentity};
pub use prompt::prompt_password;
pub use session::{clear_session, load_session, restore_session, save_session, SharedSession};
