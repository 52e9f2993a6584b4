//! File-backed persistence for the parley client.

mod session_store;

pub use session_store::FileSessionStore;
