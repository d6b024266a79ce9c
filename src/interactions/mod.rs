//! Read/bookmark state store.
//!
//! - [`state`]: the per-article facts and reading counters
//! - [`store`]: the mutation API the app calls, with fire-and-forget persistence
//! - [`sync`]: the background worker that performs the queued writes
//! - [`remote`]: the Supabase `user_interactions` mirror

mod remote;
mod state;
mod store;
mod sync;

pub use remote::{
    InteractionAction, InteractionRow, RemoteChange, RemoteError, RemoteInteractions, RemoteOp,
};
pub use state::{InteractionFacts, InteractionState, READ_CREDIT_MINUTES};
pub use store::InteractionStore;
pub use sync::{run_sync_worker, sync_channel, SyncJob, SyncReceiver, SyncSender, SyncStats};
