//! Editor-facing services.
//!
//! # Responsibility
//! - Orchestrate repository calls for the UI adapter.
//! - Publish change events and drive background autosave.
//! - Export notes as standalone HTML.

pub mod autosave;
pub mod editor_service;
pub mod events;
pub mod export;
pub mod markdown;
