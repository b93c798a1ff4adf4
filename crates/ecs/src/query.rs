use std::marker::PhantomData;

use crate::archetype::{Archetype, Component};
use crate::entity::EntityId;
use crate::tags::Tags;

/// Tag filter applied to archetypes before component matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Filter {
    all: Tags,
    any: Tags,
}

impl Filter {
    /// Match entities carrying every tag in `tags`.
    pub const fn all(tags: Tags) -> Self {
        Self {
            all: tags,
            any: Tags::NONE,
        }
    }

    /// Match entities carrying at least one tag in `tags`.
    pub const fn any(tags: Tags) -> Self {
        Self {
            all: Tags::NONE,
            any: tags,
        }
    }

    pub fn matches(&self, tags: Tags) -> bool {
        tags.contains(self.all) && (self.any.is_empty() || tags.intersects(self.any))
    }
}

/// Read-only view over every entity that has components `A` and `B` and
/// passes the filter.
///
/// The matching archetypes are resolved once at construction, so `count`
/// costs nothing per entity and `chunks` can be walked any number of times
/// while the store is borrowed.
pub struct Query<'w, A, B> {
    archetypes: &'w [Archetype],
    matched: Vec<usize>,
    count: usize,
    chunk_size: usize,
    _marker: PhantomData<fn() -> (A, B)>,
}

impl<'w, A: Component, B: Component> Query<'w, A, B> {
    pub(crate) fn new(archetypes: &'w [Archetype], filter: Filter, chunk_size: usize) -> Self {
        let matched: Vec<usize> = archetypes
            .iter()
            .enumerate()
            .filter(|(_, archetype)| {
                filter.matches(archetype.tags()) && archetype.has::<A>() && archetype.has::<B>()
            })
            .map(|(index, _)| index)
            .collect();
        let count = matched.iter().map(|&index| archetypes[index].len()).sum();
        Self {
            archetypes,
            matched,
            count,
            chunk_size,
            _marker: PhantomData,
        }
    }

    /// Total number of matching entities.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Matching rows as fixed-size chunks, in stable store order.
    pub fn chunks(&self) -> impl Iterator<Item = Chunk<'w, A, B>> + '_ {
        let archetypes = self.archetypes;
        let chunk_size = self.chunk_size;
        self.matched.iter().flat_map(move |&index| {
            let archetype = &archetypes[index];
            let columns = archetype.columns();
            let a = columns.get::<A>().unwrap_or(&[]);
            let b = columns.get::<B>().unwrap_or(&[]);
            archetype
                .entities()
                .chunks(chunk_size)
                .zip(a.chunks(chunk_size))
                .zip(b.chunks(chunk_size))
                .map(|((entities, first), second)| Chunk {
                    entities,
                    first,
                    second,
                })
        })
    }
}

/// One contiguous batch of rows from a single archetype.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'w, A, B> {
    entities: &'w [EntityId],
    first: &'w [A],
    second: &'w [B],
}

impl<'w, A, B> Chunk<'w, A, B> {
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &'w [EntityId] {
        self.entities
    }

    pub fn first(&self) -> &'w [A] {
        self.first
    }

    pub fn second(&self) -> &'w [B] {
        self.second
    }
}
