//! Persistence collaborator for videos, chunks and appearance timelines.
//!
//! This crate provides:
//! - The `VideoStore` trait, a transactional key-value view keyed by
//!   video and chunk ID
//! - Atomic chunk claims, which act as the per-chunk dispatch lease
//! - Detections recorded with a chunk's `done` transition until folded
//! - An in-memory implementation with JSON seeding

pub mod error;
pub mod memory;
pub mod metrics;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use store::{ChunkClaim, VideoStore};
