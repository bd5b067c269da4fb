//! Per-relation batch steps: id deduplication and key map construction

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::entity::{EntityDto, RelationKey, ShapeId};
use crate::error::{RelatedError, RelatedResult};
use crate::rule::LoaderRule;

/// Distinct ids in order of first appearance
pub(crate) fn distinct_ids<'a, K, I>(ids: I) -> Vec<K>
where
    K: RelationKey,
    I: IntoIterator<Item = &'a K>,
{
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(*id))
        .cloned()
        .collect()
}

/// Call the rule once for `ids` and index the result by key
///
/// An empty id list never reaches the rule. When two loaded dtos share a key
/// the later one wins.
pub(crate) async fn load_key_map<E: EntityDto>(
    rule: &dyn LoaderRule<E>,
    entity: ShapeId,
    ids: Vec<E::Key>,
    fetch_timeout: Option<Duration>,
) -> RelatedResult<HashMap<E::Key, E>> {
    if ids.is_empty() {
        trace!("No ids to load for {}", entity);
        return Ok(HashMap::new());
    }

    let requested = ids.len();
    let load = rule.load(ids);
    let loaded = match fetch_timeout {
        Some(timeout) => tokio::time::timeout(timeout, load)
            .await
            .map_err(|_| RelatedError::FetchTimeout {
                entity: entity.name(),
                timeout,
            })?,
        None => load.await,
    }
    .map_err(|source| RelatedError::Fetch {
        entity: entity.name(),
        source,
    })?;

    debug!(
        "Loaded {} of {} requested {} dtos",
        loaded.len(),
        requested,
        entity
    );

    let mut key_map = HashMap::with_capacity(loaded.len());
    for dto in loaded {
        let key = rule.key_of(&dto);
        if let Some(previous) = key_map.insert(key, dto) {
            warn!(
                "Loader rule for {} returned more than one dto for key {:?}",
                entity,
                rule.key_of(&previous)
            );
        }
    }

    Ok(key_map)
}
