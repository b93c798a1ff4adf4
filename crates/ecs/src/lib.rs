//! Minimal archetype ECS with chunked, column-oriented storage.
//!
//! Entities sharing the same component set and tags live in one archetype.
//! Each archetype stores one contiguous `Vec` per component type; queries
//! hand those columns out in fixed-size chunks so consumers (the renderer,
//! the transform update) can work on whole slices at a time.
//!
//! # Invariants
//! - Query iteration order is stable: archetypes in creation order, rows in
//!   insertion order. Only despawning reorders (swap-remove).
//! - Every chunk of a query exposes equal-length slices for all requested
//!   components plus the entity ids they belong to.
//! - Entity counts for a query are computed per archetype, never per entity.

mod archetype;
mod entity;
mod query;
mod store;
mod tags;

pub use archetype::{Bundle, Columns, Component};
pub use entity::EntityId;
pub use query::{Chunk, Filter, Query};
pub use store::{DEFAULT_CHUNK_SIZE, EcsError, EntityStore};
pub use tags::Tags;
