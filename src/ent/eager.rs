//! Batch edge loaders used by the entities' `EagerLoad` implementations.
//!
//! Each loader issues one query for the whole page of parents, then assigns
//! neighbours back by id. Parents with no neighbour still get a loaded slot.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::client::Client;
use super::context::QueryContext;
use super::entity::{EdgeSlot, Entity};
use super::error::EntError;
use super::predicate::Predicate;
use super::query::EntityQuery;
use super::schema::JoinTableSchema;

/// Load a many-to-one edge whose foreign key lives on the parent.
#[allow(clippy::too_many_arguments)]
pub async fn load_to_one<P: Entity, N: Entity>(
    client: &Client,
    ctx: &QueryContext,
    parents: &mut [P],
    query: EntityQuery<N>,
    edge: &'static str,
    column: &'static str,
    foreign_key: fn(&P) -> Option<i64>,
    slot: fn(&mut P) -> &mut EdgeSlot<Option<N>>,
) -> Result<(), EntError> {
    let mut ids = Vec::new();
    let mut seen = HashSet::new();
    for parent in parents.iter_mut() {
        slot(parent).set(None);
        if let Some(fk) = foreign_key(parent) {
            if seen.insert(fk) {
                ids.push(fk);
            }
        }
    }

    if ids.is_empty() {
        return Ok(());
    }

    let neighbors = query.where_(Predicate::id_in(ids)).all(client, ctx).await?;
    let loaded = neighbors.len();

    let mut by_id = HashMap::with_capacity(neighbors.len());
    for neighbor in neighbors {
        let id = neighbor.id();
        if !seen.contains(&id) {
            return Err(EntError::UnexpectedForeignKey { column, id });
        }
        by_id.insert(id, neighbor);
    }

    for parent in parents.iter_mut() {
        if let Some(neighbor) = foreign_key(parent).and_then(|fk| by_id.get(&fk)) {
            slot(parent).set(Some(neighbor.clone()));
        }
    }

    debug!(
        entity = P::TYPE_NAME,
        edge,
        parents = parents.len(),
        loaded,
        "Loaded to-one edge batch"
    );

    Ok(())
}

/// Load a one-to-many edge whose foreign key lives on the neighbour.
#[allow(clippy::too_many_arguments)]
pub async fn load_to_many<P: Entity, N: Entity>(
    client: &Client,
    ctx: &QueryContext,
    parents: &mut [P],
    query: EntityQuery<N>,
    edge: &'static str,
    column: &'static str,
    foreign_key: fn(&N) -> Option<i64>,
    slot: fn(&mut P) -> &mut EdgeSlot<Vec<N>>,
) -> Result<(), EntError> {
    let mut index = HashMap::with_capacity(parents.len());
    for (i, parent) in parents.iter_mut().enumerate() {
        slot(parent).ensure_loaded();
        index.insert(parent.id(), i);
    }

    let ids: Vec<i64> = parents.iter().map(Entity::id).collect();
    let neighbors = query
        .where_(Predicate::is_in(column, ids))
        .all(client, ctx)
        .await?;
    let loaded = neighbors.len();

    for neighbor in neighbors {
        let fk = foreign_key(&neighbor).ok_or(EntError::NilForeignKey {
            column,
            id: neighbor.id(),
        })?;
        let i = *index
            .get(&fk)
            .ok_or(EntError::UnexpectedForeignKey { column, id: fk })?;
        slot(&mut parents[i]).push(neighbor);
    }

    debug!(
        entity = P::TYPE_NAME,
        edge,
        parents = parents.len(),
        loaded,
        "Loaded to-many edge batch"
    );

    Ok(())
}

/// Load a many-to-many edge through `join`. `parent_column` and
/// `neighbor_column` name the join-table columns holding each side's id.
#[allow(clippy::too_many_arguments)]
pub async fn load_many_to_many<P: Entity, N: Entity>(
    client: &Client,
    ctx: &QueryContext,
    parents: &mut [P],
    query: EntityQuery<N>,
    edge: &'static str,
    join: &JoinTableSchema,
    parent_column: &'static str,
    neighbor_column: &'static str,
    slot: fn(&mut P) -> &mut EdgeSlot<Vec<N>>,
) -> Result<(), EntError> {
    let mut index = HashMap::with_capacity(parents.len());
    for (i, parent) in parents.iter_mut().enumerate() {
        slot(parent).ensure_loaded();
        index.insert(parent.id(), i);
    }

    let placeholders = vec!["?"; parents.len()].join(", ");
    let sql = format!(
        "SELECT {}, {} FROM {} WHERE {} IN ({})",
        parent_column, neighbor_column, join.name, parent_column, placeholders
    );
    debug!(sql = %sql, entity = P::TYPE_NAME, edge, "Executing join table query");

    let mut pairs_query = sqlx::query_as::<_, (i64, i64)>(&sql);
    for parent in parents.iter() {
        pairs_query = pairs_query.bind(parent.id());
    }
    let pairs = ctx.run(pairs_query.fetch_all(client.pool())).await?;

    let mut neighbor_ids = Vec::new();
    let mut seen = HashSet::new();
    for (_, neighbor_id) in &pairs {
        if seen.insert(*neighbor_id) {
            neighbor_ids.push(*neighbor_id);
        }
    }

    if neighbor_ids.is_empty() {
        return Ok(());
    }

    let neighbors: HashMap<i64, N> = query
        .where_(Predicate::id_in(neighbor_ids))
        .all(client, ctx)
        .await?
        .into_iter()
        .map(|n| (n.id(), n))
        .collect();

    for (parent_id, neighbor_id) in pairs {
        let (Some(&i), Some(neighbor)) = (index.get(&parent_id), neighbors.get(&neighbor_id))
        else {
            continue;
        };
        slot(&mut parents[i]).push(neighbor.clone());
    }

    debug!(
        entity = P::TYPE_NAME,
        edge,
        parents = parents.len(),
        loaded = neighbors.len(),
        "Loaded many-to-many edge batch"
    );

    Ok(())
}
