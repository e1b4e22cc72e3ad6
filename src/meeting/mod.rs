//! Client-side meeting lifecycle sync engine.
//!
//! Tracks remote meeting jobs, polls the ones still in progress, merges
//! partial responses without losing fetched notes, and fetches notes once.

pub mod error;
pub mod model;
pub mod note_fetcher;
pub mod poller;
pub mod selection;
pub mod store;

pub use error::{SyncError, SyncResult};
pub use model::{format_duration, Meeting, MeetingStatus, Note, Progress};
pub use note_fetcher::{NoteFetcher, NoteOutcome};
pub use poller::{ActiveSetPoller, TickReport};
pub use selection::{NavigationParam, SelectionOutcome, SelectionParam, SelectionSynchronizer};
pub use store::{MeetingStore, StatusTicket};
