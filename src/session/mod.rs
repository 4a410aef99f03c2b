// ABOUTME: Session module — the intent session record, its store, and its lifecycle.
// ABOUTME: One active session per intent directory; closed sessions move to history.

pub mod lifecycle;
pub mod store;
pub mod types;

pub use lifecycle::{
    CloseOutcome, CloseSummary, CommitOutcome, Lifecycle, StartOutcome, blocks_commit,
};
pub use store::{HistoryHint, SessionStore};
pub use types::{CommitRecord, Session, SessionStatus};
