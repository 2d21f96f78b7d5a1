//! Multi-component queries.
//!
//! A query is a tuple of component references, e.g. `(&mut Unit, &Base)`.
//! Matching works on the sparse columns directly:
//!
//! 1. Resolve every requested kind (unregistered kind: error).
//! 2. Take the entity list of the rarest requested column as candidates and
//!    sort it by [`EntityId`], which fixes the visit order.
//! 3. For each candidate, look up every requested column in O(1) and keep
//!    the entity only if all of them hold it.
//!
//! Rows are collected before any visitor runs, so no structural change can
//! add, skip or repeat a visit within one pass. Requesting the same kind
//! twice in one tuple fails with [`EcsError::AliasedQuery`].

use crate::component::{Component, ComponentRegistry, ComponentTypeId};
use crate::entity::EntityId;
use crate::storage::{Columns, SparseColumn};
use crate::EcsError;

// ---------------------------------------------------------------------------
// QueryItem
// ---------------------------------------------------------------------------

/// One element of a query tuple: `&'w T` or `&'w mut T`.
pub trait QueryItem<'w> {
    /// The component kind read or written.
    type Component: Component;
    /// What the visitor receives.
    type Item;
    /// Per-pass state built from the column.
    type Fetch;

    /// Borrow the column for the whole pass. `rows` are the candidates the
    /// pass will fetch, in visit order.
    fn prepare(column: &'w mut SparseColumn<Self::Component>, rows: &[EntityId]) -> Self::Fetch;

    /// Produce the item for `entity`, if it holds the component. Called
    /// exactly once per candidate, in the order given to `prepare`.
    fn fetch(fetch: &mut Self::Fetch, entity: EntityId) -> Option<Self::Item>;
}

impl<'w, T: Component> QueryItem<'w> for &'w T {
    type Component = T;
    type Item = &'w T;
    type Fetch = &'w SparseColumn<T>;

    fn prepare(column: &'w mut SparseColumn<T>, _rows: &[EntityId]) -> Self::Fetch {
        column
    }

    fn fetch(fetch: &mut Self::Fetch, entity: EntityId) -> Option<&'w T> {
        let column: &'w SparseColumn<T> = *fetch;
        column.get(entity)
    }
}

/// Fetch state for `&mut T`: one pre-split reference per candidate row.
pub struct MutFetch<'w, T> {
    rows: std::vec::IntoIter<Option<&'w mut T>>,
}

impl<'w, T: Component> QueryItem<'w> for &'w mut T {
    type Component = T;
    type Item = &'w mut T;
    type Fetch = MutFetch<'w, T>;

    /// Splits out only the dense slots the candidates hold, walking them in
    /// slot order. O(k log k) for k candidates, independent of column size.
    fn prepare(column: &'w mut SparseColumn<T>, rows: &[EntityId]) -> Self::Fetch {
        let (sparse, entities, dense) = column.parts_mut();

        let mut wanted: Vec<(usize, usize)> = rows
            .iter()
            .enumerate()
            .filter_map(|(row, &entity)| {
                let slot = (*sparse.get(entity.index() as usize)?)? as usize;
                (entities[slot] == entity).then_some((slot, row))
            })
            .collect();
        wanted.sort_unstable();

        let mut out: Vec<Option<&'w mut T>> = Vec::with_capacity(rows.len());
        out.resize_with(rows.len(), || None);
        let mut dense = dense.iter_mut();
        let mut next_slot = 0;
        for (slot, row) in wanted {
            // Candidates are distinct entities, so slots are strictly
            // increasing here.
            out[row] = dense.nth(slot - next_slot);
            next_slot = slot + 1;
        }
        MutFetch {
            rows: out.into_iter(),
        }
    }

    fn fetch(fetch: &mut Self::Fetch, _entity: EntityId) -> Option<&'w mut T> {
        fetch.rows.next().flatten()
    }
}

/// Read-only query element. Implemented for `&'w T` only.
pub trait SharedItem<'w>: Sized {
    type Component: Component;

    fn fetch(column: &'w SparseColumn<Self::Component>, entity: EntityId) -> Option<Self>;
}

impl<'w, T: Component> SharedItem<'w> for &'w T {
    type Component = T;

    fn fetch(column: &'w SparseColumn<T>, entity: EntityId) -> Option<Self> {
        column.get(entity)
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// A tuple of [`QueryItem`]s, usable with [`World::each`](crate::world::World::each)
/// and [`World::query_mut`](crate::world::World::query_mut).
pub trait Query<'w> {
    type Item;

    /// Every matching entity with its items, in ascending id order.
    fn fetch_rows(
        registry: &ComponentRegistry,
        columns: &'w mut Columns,
    ) -> Result<Vec<(EntityId, Self::Item)>, EcsError>;
}

/// A tuple of shared references, usable with
/// [`World::query`](crate::world::World::query) on a `&World`.
pub trait ReadOnlyQuery<'w>: Sized {
    fn fetch_rows(
        registry: &ComponentRegistry,
        columns: &'w Columns,
    ) -> Result<Vec<(EntityId, Self)>, EcsError>;
}

fn resolve<T: Component>(registry: &ComponentRegistry) -> Result<ComponentTypeId, EcsError> {
    registry
        .lookup::<T>()
        .ok_or_else(|| EcsError::UnknownComponent {
            name: std::any::type_name::<T>().to_owned(),
            registered: registry.registered_list(),
        })
}

/// Holders of the rarest kind, sorted by id.
fn candidates(columns: &Columns, kinds: &[ComponentTypeId]) -> Vec<EntityId> {
    let rarest = kinds
        .iter()
        .filter_map(|k| columns.erased(*k))
        .min_by_key(|c| c.len());
    let mut out = rarest.map(|c| c.entities().to_vec()).unwrap_or_default();
    out.sort_unstable();
    out
}

macro_rules! impl_query {
    ($(($t:ident, $kind:ident, $fetch:ident, $item:ident)),+) => {
        impl<'w, $($t: QueryItem<'w>),+> Query<'w> for ($($t,)+) {
            type Item = ($(<$t as QueryItem<'w>>::Item,)+);

            fn fetch_rows(
                registry: &ComponentRegistry,
                columns: &'w mut Columns,
            ) -> Result<Vec<(EntityId, Self::Item)>, EcsError> {
                $(let $kind = resolve::<<$t as QueryItem<'w>>::Component>(registry)?;)+
                let rows = candidates(columns, &[$($kind),+]);

                let mut slots = columns.split_mut();
                $(
                    let mut $fetch = <$t as QueryItem<'w>>::prepare(
                        slots.take::<<$t as QueryItem<'w>>::Component>(
                            $kind,
                            registry.name_of($kind),
                        )?,
                        &rows,
                    );
                )+

                let mut out = Vec::with_capacity(rows.len());
                for entity in rows {
                    if let ($(Some($item),)+) =
                        ($(<$t as QueryItem<'w>>::fetch(&mut $fetch, entity),)+)
                    {
                        out.push((entity, ($($item,)+)));
                    }
                }
                Ok(out)
            }
        }

        impl<'w, $($t: SharedItem<'w>),+> ReadOnlyQuery<'w> for ($($t,)+) {
            fn fetch_rows(
                registry: &ComponentRegistry,
                columns: &'w Columns,
            ) -> Result<Vec<(EntityId, Self)>, EcsError> {
                $(
                    let $kind = resolve::<<$t as SharedItem<'w>>::Component>(registry)?;
                    let $fetch = columns
                        .typed::<<$t as SharedItem<'w>>::Component>($kind)
                        .ok_or_else(|| EcsError::ComponentTypeMismatch {
                            component: registry.name_of($kind).to_owned(),
                        })?;
                )+
                let rows = candidates(columns, &[$($kind),+]);

                let mut out = Vec::with_capacity(rows.len());
                for entity in rows {
                    if let ($(Some($item),)+) =
                        ($(<$t as SharedItem<'w>>::fetch($fetch, entity),)+)
                    {
                        out.push((entity, ($($item,)+)));
                    }
                }
                Ok(out)
            }
        }
    };
}

impl_query!((A, ka, fa, ia));
impl_query!((A, ka, fa, ia), (B, kb, fb, ib));
impl_query!((A, ka, fa, ia), (B, kb, fb, ib), (C, kc, fc, ic));
impl_query!((A, ka, fa, ia), (B, kb, fb, ib), (C, kc, fc, ic), (D, kd, fd, id));
impl_query!(
    (A, ka, fa, ia),
    (B, kb, fb, ib),
    (C, kc, fc, ic),
    (D, kd, fd, id),
    (E, ke, fe, ie)
);
impl_query!(
    (A, ka, fa, ia),
    (B, kb, fb, ib),
    (C, kc, fc, ic),
    (D, kd, fd, id),
    (E, ke, fe, ie),
    (F, kf, ff, if_)
);
impl_query!(
    (A, ka, fa, ia),
    (B, kb, fb, ib),
    (C, kc, fc, ic),
    (D, kd, fd, id),
    (E, ke, fe, ie),
    (F, kf, ff, if_),
    (G, kg, fg, ig)
);
impl_query!(
    (A, ka, fa, ia),
    (B, kb, fb, ib),
    (C, kc, fc, ic),
    (D, kd, fd, id),
    (E, ke, fe, ie),
    (F, kf, ff, if_),
    (G, kg, fg, ig),
    (H, kh, fh, ih)
);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
