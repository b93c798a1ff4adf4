use std::any::{Any, TypeId, type_name};

use crate::entity::EntityId;
use crate::tags::Tags;

/// Anything plain enough to be stored column-wise.
pub trait Component: Copy + Send + Sync + 'static {}

impl<T: Copy + Send + Sync + 'static> Component for T {}

trait Column: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn swap_remove(&mut self, row: usize);
}

impl<T: Component> Column for Vec<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn swap_remove(&mut self, row: usize) {
        Vec::swap_remove(self, row);
    }
}

/// Type-erased set of component columns belonging to one archetype.
#[derive(Default)]
pub struct Columns {
    columns: Vec<(TypeId, Box<dyn Column>)>,
}

impl Columns {
    /// Add an empty column for `T`. Registering the same type twice is a bug
    /// in the bundle definition.
    pub fn register<T: Component>(&mut self) {
        assert!(
            !self.contains(TypeId::of::<T>()),
            "component {} appears twice in one bundle",
            type_name::<T>()
        );
        self.columns
            .push((TypeId::of::<T>(), Box::new(Vec::<T>::new())));
    }

    /// Append one value to the `T` column.
    pub fn push<T: Component>(&mut self, value: T) {
        match self.get_mut::<T>() {
            Some(column) => column.push(value),
            None => unreachable!("column {} was registered with the archetype", type_name::<T>()),
        }
    }

    pub(crate) fn contains(&self, id: TypeId) -> bool {
        self.columns.iter().any(|(column_id, _)| *column_id == id)
    }

    pub(crate) fn get<T: Component>(&self) -> Option<&[T]> {
        self.columns
            .iter()
            .find(|(id, _)| *id == TypeId::of::<T>())
            .and_then(|(_, column)| column.as_any().downcast_ref::<Vec<T>>())
            .map(Vec::as_slice)
    }

    pub(crate) fn get_mut<T: Component>(&mut self) -> Option<&mut Vec<T>> {
        self.columns
            .iter_mut()
            .find(|(id, _)| *id == TypeId::of::<T>())
            .and_then(|(_, column)| column.as_any_mut().downcast_mut::<Vec<T>>())
    }

    /// Disjoint mutable access to two different columns.
    pub(crate) fn split2_mut<A: Component, B: Component>(
        &mut self,
    ) -> Option<(&mut [A], &mut [B])> {
        assert_ne!(TypeId::of::<A>(), TypeId::of::<B>(), "column types must differ");
        let mut a = None;
        let mut b = None;
        for (id, column) in self.columns.iter_mut() {
            if *id == TypeId::of::<A>() {
                a = column.as_any_mut().downcast_mut::<Vec<A>>();
            } else if *id == TypeId::of::<B>() {
                b = column.as_any_mut().downcast_mut::<Vec<B>>();
            }
        }
        Some((a?.as_mut_slice(), b?.as_mut_slice()))
    }

    /// Disjoint mutable access to three different columns.
    pub(crate) fn split3_mut<A: Component, B: Component, C: Component>(
        &mut self,
    ) -> Option<(&mut [A], &mut [B], &mut [C])> {
        let (ta, tb, tc) = (TypeId::of::<A>(), TypeId::of::<B>(), TypeId::of::<C>());
        assert!(ta != tb && tb != tc && ta != tc, "column types must differ");
        let mut a = None;
        let mut b = None;
        let mut c = None;
        for (id, column) in self.columns.iter_mut() {
            if *id == ta {
                a = column.as_any_mut().downcast_mut::<Vec<A>>();
            } else if *id == tb {
                b = column.as_any_mut().downcast_mut::<Vec<B>>();
            } else if *id == tc {
                c = column.as_any_mut().downcast_mut::<Vec<C>>();
            }
        }
        Some((a?.as_mut_slice(), b?.as_mut_slice(), c?.as_mut_slice()))
    }

    fn swap_remove(&mut self, row: usize) {
        for (_, column) in &mut self.columns {
            column.swap_remove(row);
        }
    }
}

/// A tuple of components spawned together.
///
/// Implemented for tuples of one to six distinct component types.
pub trait Bundle: Send + 'static {
    /// Type ids of the bundle's components, in tuple order.
    fn type_ids() -> Vec<TypeId>;
    /// Register one empty column per component.
    fn register(columns: &mut Columns);
    /// Append the bundle's values, one per column.
    fn push(self, columns: &mut Columns);
}

macro_rules! impl_bundle {
    ($($name:ident),+) => {
        impl<$($name: Component),+> Bundle for ($($name,)+) {
            fn type_ids() -> Vec<TypeId> {
                vec![$(TypeId::of::<$name>()),+]
            }

            fn register(columns: &mut Columns) {
                $(columns.register::<$name>();)+
            }

            #[allow(non_snake_case)]
            fn push(self, columns: &mut Columns) {
                let ($($name,)+) = self;
                $(columns.push($name);)+
            }
        }
    };
}

impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);

/// Identity of an archetype: its sorted component set and its tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ArchetypeKey {
    components: Vec<TypeId>,
    tags: Tags,
}

impl ArchetypeKey {
    pub(crate) fn new(mut components: Vec<TypeId>, tags: Tags) -> Self {
        components.sort();
        Self { components, tags }
    }
}

/// All entities with one exact component set and tag set.
pub(crate) struct Archetype {
    tags: Tags,
    columns: Columns,
    entities: Vec<EntityId>,
}

impl Archetype {
    pub(crate) fn new<B: Bundle>(tags: Tags) -> Self {
        let mut columns = Columns::default();
        B::register(&mut columns);
        Self {
            tags,
            columns,
            entities: Vec::new(),
        }
    }

    pub(crate) fn tags(&self) -> Tags {
        self.tags
    }

    pub(crate) fn len(&self) -> usize {
        self.entities.len()
    }

    pub(crate) fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    pub(crate) fn has<T: Component>(&self) -> bool {
        self.columns.contains(TypeId::of::<T>())
    }

    pub(crate) fn columns(&self) -> &Columns {
        &self.columns
    }

    pub(crate) fn columns_mut(&mut self) -> &mut Columns {
        &mut self.columns
    }

    /// Append an entity row and return its index.
    pub(crate) fn push<B: Bundle>(&mut self, entity: EntityId, bundle: B) -> usize {
        bundle.push(&mut self.columns);
        self.entities.push(entity);
        self.entities.len() - 1
    }

    /// Remove a row by swapping the last row into it. Returns the entity
    /// that now occupies `row`, if any moved.
    pub(crate) fn swap_remove(&mut self, row: usize) -> Option<EntityId> {
        self.columns.swap_remove(row);
        self.entities.swap_remove(row);
        self.entities.get(row).copied()
    }
}
