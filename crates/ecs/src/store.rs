use std::any::type_name;
use std::collections::HashMap;

use rayon::prelude::*;
use thiserror::Error;

use crate::archetype::{Archetype, ArchetypeKey, Bundle, Component};
use crate::entity::EntityId;
use crate::query::{Filter, Query};
use crate::tags::Tags;

/// Number of rows per chunk handed out by queries.
pub const DEFAULT_CHUNK_SIZE: usize = 512;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EcsError {
    #[error("entity {0} does not exist")]
    NoSuchEntity(EntityId),
    #[error("entity {entity} has no {component} component")]
    MissingComponent {
        entity: EntityId,
        component: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
struct Location {
    archetype: usize,
    row: usize,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    location: Option<Location>,
}

/// Owner of all entities and their component columns.
pub struct EntityStore {
    archetypes: Vec<Archetype>,
    archetype_index: HashMap<ArchetypeKey, usize>,
    slots: Vec<Slot>,
    free: Vec<u32>,
    chunk_size: usize,
    len: usize,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    /// Store whose queries yield chunks of at most `chunk_size` rows.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be non-zero");
        Self {
            archetypes: Vec::new(),
            archetype_index: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            chunk_size,
            len: 0,
        }
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Create an entity from a component bundle and a tag set.
    pub fn spawn<B: Bundle>(&mut self, bundle: B, tags: Tags) -> EntityId {
        let key = ArchetypeKey::new(B::type_ids(), tags);
        let archetype = match self.archetype_index.get(&key) {
            Some(&index) => index,
            None => {
                let index = self.archetypes.len();
                self.archetypes.push(Archetype::new::<B>(tags));
                self.archetype_index.insert(key, index);
                tracing::debug!(archetype = index, ?tags, "created archetype");
                index
            }
        };

        let id = match self.free.pop() {
            Some(index) => EntityId {
                index,
                generation: self.slots[index as usize].generation,
            },
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    location: None,
                });
                EntityId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };

        let row = self.archetypes[archetype].push(id, bundle);
        self.slots[id.index as usize].location = Some(Location { archetype, row });
        self.len += 1;
        id
    }

    /// Remove an entity and all its components.
    ///
    /// The last row of its archetype moves into the freed row, so iteration
    /// order changes for that one entity.
    pub fn despawn(&mut self, id: EntityId) -> Result<(), EcsError> {
        let location = self.locate(id)?;
        let slot = &mut self.slots[id.index as usize];
        slot.location = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;

        if let Some(moved) = self.archetypes[location.archetype].swap_remove(location.row) {
            self.slots[moved.index as usize].location = Some(location);
        }
        Ok(())
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.locate(id).is_ok()
    }

    pub fn tags(&self, id: EntityId) -> Result<Tags, EcsError> {
        let location = self.locate(id)?;
        Ok(self.archetypes[location.archetype].tags())
    }

    pub fn get<T: Component>(&self, id: EntityId) -> Result<&T, EcsError> {
        let location = self.locate(id)?;
        self.archetypes[location.archetype]
            .columns()
            .get::<T>()
            .map(|column| &column[location.row])
            .ok_or(EcsError::MissingComponent {
                entity: id,
                component: type_name::<T>(),
            })
    }

    pub fn get_mut<T: Component>(&mut self, id: EntityId) -> Result<&mut T, EcsError> {
        let location = self.locate(id)?;
        self.archetypes[location.archetype]
            .columns_mut()
            .get_mut::<T>()
            .map(|column| &mut column[location.row])
            .ok_or(EcsError::MissingComponent {
                entity: id,
                component: type_name::<T>(),
            })
    }

    /// Read-only chunked query over entities carrying both `A` and `B`.
    pub fn query<A: Component, B: Component>(&self, filter: Filter) -> Query<'_, A, B> {
        Query::new(&self.archetypes, filter, self.chunk_size)
    }

    /// Visit every matching chunk with mutable access to two columns.
    pub fn for_each_chunk_mut<A, B, F>(&mut self, filter: Filter, mut f: F)
    where
        A: Component,
        B: Component,
        F: FnMut(&mut [A], &mut [B]),
    {
        let chunk_size = self.chunk_size;
        for archetype in self.matching_mut::<A, B>(filter) {
            if let Some((a, b)) = archetype.columns_mut().split2_mut::<A, B>() {
                for (a, b) in a.chunks_mut(chunk_size).zip(b.chunks_mut(chunk_size)) {
                    f(a, b);
                }
            }
        }
    }

    /// Visit every matching chunk in parallel, reading `A` and `B` and
    /// writing `C`.
    ///
    /// Chunks are distributed over the rayon pool; the call returns only
    /// after every chunk has been processed.
    pub fn par_for_each_chunk<A, B, C, F>(&mut self, filter: Filter, f: F)
    where
        A: Component,
        B: Component,
        C: Component,
        F: Fn(&[A], &[B], &mut [C]) + Send + Sync,
    {
        let chunk_size = self.chunk_size;
        for archetype in self.archetypes.iter_mut() {
            if !filter.matches(archetype.tags())
                || !(archetype.has::<A>() && archetype.has::<B>() && archetype.has::<C>())
            {
                continue;
            }
            if let Some((a, b, c)) = archetype.columns_mut().split3_mut::<A, B, C>() {
                a.par_chunks(chunk_size)
                    .zip(b.par_chunks(chunk_size))
                    .zip(c.par_chunks_mut(chunk_size))
                    .for_each(|((a, b), c)| f(a, b, c));
            }
        }
    }

    fn matching_mut<A: Component, B: Component>(
        &mut self,
        filter: Filter,
    ) -> impl Iterator<Item = &mut Archetype> {
        self.archetypes.iter_mut().filter(move |archetype| {
            filter.matches(archetype.tags()) && archetype.has::<A>() && archetype.has::<B>()
        })
    }

    fn locate(&self, id: EntityId) -> Result<Location, EcsError> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.location)
            .ok_or(EcsError::NoSuchEntity(id))
    }
}
