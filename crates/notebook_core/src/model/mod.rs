//! Domain model for the notebook engine.
//!
//! # Responsibility
//! - Define the value types shared by repository, services and hosts.
//! - Keep serialization names stable for settings files and UI bridges.
//!
//! # Invariants
//! - Every open note is identified by a `NoteId` that never changes.
//! - Snapshots handed to callers are copies; mutating them never touches
//!   repository state.

pub mod file_info;
pub mod note;
pub mod settings;
pub mod view_state;
