//! Persistence Adapters - JSONL Journal and JSON Snapshots
//!
//! Implements the Repository port using append-only JSONL files for
//! committed events and atomic JSON snapshots for registry state.
//! No database dependency, lightweight and crash-recoverable. An
//! in-memory variant backs tests and the `memory` backend.

pub mod journal;
pub mod memory;
pub mod repository_impl;
pub mod state;

pub use journal::EventJournal;
pub use memory::InMemoryRepository;
pub use repository_impl::RepositoryImpl;
pub use state::StateStore;
