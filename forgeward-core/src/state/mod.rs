//! Conversation state: thread model and checkpoint stores

pub mod migrations;
pub mod store;
pub mod thread;

pub use migrations::run_migrations;
pub use store::{MemoryThreadStore, SqliteThreadStore, ThreadStore};
pub use thread::{ConversationThread, Finding, FindingKind, Turn, TurnRole};
