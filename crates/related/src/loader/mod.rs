//! Resolution engine - fills the related fields of a batch of dtos

pub(crate) mod batch;


use std::any::{Any, TypeId};
use std::sync::Arc;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LoaderConfig;
use crate::descriptor::RelationDescriptor;
use crate::entity::ShapeId;
use crate::error::{RelatedError, RelatedResult};
use crate::profile::{RegisteredShape, RelatedDtoLoaderProfile};
use crate::shape::{IdKind, Prepared, RelationBatch};

/// What a load did, relation by relation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    /// Relations whose related fields were written
    pub relations_resolved: usize,
    /// Relations left untouched: no id field or no loader rule
    pub relations_skipped: usize,
    /// Loader rule calls made
    pub fetch_calls: usize,
    /// Distinct ids passed to loader rules
    pub ids_requested: usize,
    /// Dtos returned by loader rules
    pub dtos_loaded: usize,
}

impl LoadReport {
    fn record<T>(&mut self, prepared: &Prepared<T>) {
        self.relations_resolved += 1;
        if prepared.fetched() {
            self.fetch_calls += 1;
        }
        self.ids_requested += prepared.requested;
        self.dtos_loaded += prepared.loaded;
    }
}

/// One relation whose ids have been read from the key providers
struct PlannedRelation<'a, T> {
    descriptor: &'a RelationDescriptor<T>,
    id_field: String,
    raw_ids: Box<dyn Any + Send>,
}

struct Plan<'a, T> {
    relations: Vec<PlannedRelation<'a, T>>,
    skipped: usize,
}

/// Loads the related dtos of target dtos in one rule call per relation
///
/// Ids for every relation are read before anything is fetched, so
/// configuration errors surface before any rule is called. Relations are
/// then fetched and written back in declaration order, or fetched all at
/// once when [`LoaderConfig::concurrent_fetch`] is set.
#[derive(Debug, Clone)]
pub struct RelatedDtoLoader {
    profile: Arc<RelatedDtoLoaderProfile>,
    config: LoaderConfig,
}

impl RelatedDtoLoader {
    /// Create a loader with the default configuration
    pub fn new(profile: Arc<RelatedDtoLoaderProfile>) -> Self {
        Self {
            profile,
            config: LoaderConfig::default(),
        }
    }

    /// Create a loader with a custom configuration
    pub fn with_config(profile: Arc<RelatedDtoLoaderProfile>, config: LoaderConfig) -> RelatedResult<Self> {
        config.validate()?;
        Ok(Self { profile, config })
    }

    pub fn profile(&self) -> &RelatedDtoLoaderProfile {
        &self.profile
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Fill the related fields of a single dto
    pub async fn load<T: Send + 'static>(&self, target: &mut T) -> RelatedResult<()> {
        self.load_list(std::slice::from_mut(target)).await
    }

    /// Fill the related fields of every dto in `targets`, reading ids from the targets
    pub async fn load_list<T: Send + 'static>(&self, targets: &mut [T]) -> RelatedResult<()> {
        self.load_list_report(targets).await.map(|_| ())
    }

    pub async fn load_list_report<T: Send + 'static>(&self, targets: &mut [T]) -> RelatedResult<LoadReport> {
        let target_shape = self.target_shape::<T>()?;
        let plan = self.plan_same_shape(&target_shape, &target_shape, targets)?;
        self.execute(target_shape.shape(), plan, targets).await
    }

    /// Fill the related fields of `targets`, reading ids from `key_providers`
    ///
    /// `key_providers[i]` supplies the ids of `targets[i]`. When the key
    /// providers are of another type only single relations can be loaded;
    /// their id field is the declared override or the conventional
    /// `<field>_id` on the key provider's registered shape.
    pub async fn load_list_with<T, K>(&self, targets: &mut [T], key_providers: &[K]) -> RelatedResult<()>
    where
        T: Send + 'static,
        K: Sync + 'static,
    {
        self.load_list_with_report(targets, key_providers).await.map(|_| ())
    }

    pub async fn load_list_with_report<T, K>(
        &self,
        targets: &mut [T],
        key_providers: &[K],
    ) -> RelatedResult<LoadReport>
    where
        T: Send + 'static,
        K: Sync + 'static,
    {
        if targets.len() != key_providers.len() {
            return Err(RelatedError::LengthMismatch {
                targets: targets.len(),
                key_providers: key_providers.len(),
            });
        }

        let target_shape = self.target_shape::<T>()?;
        let provider_shape = self.profile.shape::<K>();

        let plan = match provider_shape {
            Some(provider_shape) if TypeId::of::<T>() == TypeId::of::<K>() => {
                self.plan_same_shape(&target_shape, &provider_shape, key_providers)?
            }
            provider_shape => self.plan_cross_shape(&target_shape, provider_shape.as_deref(), key_providers)?,
        };

        let provider = ShapeId::of::<K>();
        self.execute(provider, plan, targets).await
    }

    fn target_shape<T: 'static>(&self) -> RelatedResult<Arc<RegisteredShape<T>>> {
        self.profile
            .shape::<T>()
            .ok_or_else(|| RelatedError::UnsupportedTargetShape {
                shape: ShapeId::of::<T>().name(),
            })
    }

    /// Read ids through the id fields resolved when the target shape was scanned
    fn plan_same_shape<'a, T, K: 'static>(
        &self,
        target: &'a RegisteredShape<T>,
        provider: &RegisteredShape<K>,
        key_providers: &[K],
    ) -> RelatedResult<Plan<'a, T>> {
        let mut plan = Plan {
            relations: Vec::with_capacity(target.descriptors().len()),
            skipped: 0,
        };

        for descriptor in target.descriptors() {
            let id_field = descriptor
                .id_field()
                .and_then(|name| provider.table().id_field(name));

            let Some(id_field) = id_field else {
                debug!(
                    "No id field for {}.{}, skipping",
                    target.shape(),
                    descriptor.related_field()
                );
                plan.skipped += 1;
                continue;
            };

            plan.relations.push(PlannedRelation {
                descriptor,
                id_field: id_field.name().to_string(),
                raw_ids: id_field.extract(key_providers),
            });
        }

        Ok(plan)
    }

    /// Read ids from a key provider of another type
    ///
    /// List relations cannot be resolved this way and fail the whole load.
    fn plan_cross_shape<'a, T, K: 'static>(
        &self,
        target: &'a RegisteredShape<T>,
        provider: Option<&RegisteredShape<K>>,
        key_providers: &[K],
    ) -> RelatedResult<Plan<'a, T>> {
        let provider_id = ShapeId::of::<K>();

        if let Some(descriptor) = target.descriptors().iter().find(|d| d.cardinality().is_list()) {
            return Err(RelatedError::MissingIdField {
                shape: target.shape().name(),
                field: descriptor.related_field().to_string(),
            });
        }

        let mut plan = Plan {
            relations: Vec::with_capacity(target.descriptors().len()),
            skipped: 0,
        };

        for descriptor in target.descriptors() {
            let name = match descriptor.id_field_override() {
                Some(name) => name.to_string(),
                None => self.profile.naming_convention().single_id_field(descriptor.related_field()),
            };

            if !self.profile.rules().contains(descriptor.element()) {
                debug!(
                    "No rule registered for {}, skipping {}.{}",
                    descriptor.element(),
                    target.shape(),
                    descriptor.related_field()
                );
                plan.skipped += 1;
                continue;
            }

            let id_field = provider
                .filter(|_| !name.is_empty())
                .and_then(|provider| provider.table().id_field(&name));

            let Some(id_field) = id_field else {
                debug!(
                    "No id field '{}' on {} for {}.{}, skipping",
                    name,
                    provider_id,
                    target.shape(),
                    descriptor.related_field()
                );
                plan.skipped += 1;
                continue;
            };

            let (key_type, key_type_name) = id_field.key_type();
            let (expected_key, expected_key_name) = descriptor.apply.key_type();
            if id_field.kind() != IdKind::Single || key_type != expected_key {
                return Err(RelatedError::IdFieldMismatch {
                    shape: provider_id.name(),
                    field: name,
                    reason: format!(
                        "{:?} id field of {} cannot feed '{}', which expects one {}",
                        id_field.kind(),
                        key_type_name,
                        descriptor.related_field(),
                        expected_key_name
                    ),
                });
            }

            plan.relations.push(PlannedRelation {
                descriptor,
                id_field: name,
                raw_ids: id_field.extract(key_providers),
            });
        }

        Ok(plan)
    }

    async fn execute<T: Send + 'static>(
        &self,
        provider: ShapeId,
        plan: Plan<'_, T>,
        targets: &mut [T],
    ) -> RelatedResult<LoadReport> {
        let mut report = LoadReport {
            relations_skipped: plan.skipped,
            ..LoadReport::default()
        };

        debug!(
            "Loading {} relations for {} targets keyed by {}",
            plan.relations.len(),
            targets.len(),
            provider
        );

        if *self.config.get_concurrent_fetch() {
            let pending = plan
                .relations
                .into_iter()
                .map(|planned| self.prepare(provider, planned));

            // Nothing is written unless every fetch succeeded
            for (descriptor, prepared) in try_join_all(pending).await? {
                self.distribute(descriptor, prepared, targets, &mut report);
            }
        } else {
            for planned in plan.relations {
                let (descriptor, prepared) = self.prepare(provider, planned).await?;
                self.distribute(descriptor, prepared, targets, &mut report);
            }
        }

        debug!(
            "Resolved {} relations ({} skipped) with {} fetches for {} ids",
            report.relations_resolved, report.relations_skipped, report.fetch_calls, report.ids_requested
        );

        Ok(report)
    }

    async fn prepare<'a, T: Send + 'static>(
        &self,
        provider: ShapeId,
        planned: PlannedRelation<'a, T>,
    ) -> RelatedResult<(&'a RelationDescriptor<T>, Option<Prepared<T>>)> {
        let batch = RelationBatch {
            shape: provider,
            id_field: &planned.id_field,
            rules: self.profile.rules(),
            fetch_timeout: *self.config.get_fetch_timeout(),
        };

        let prepared = planned.descriptor.apply.prepare(batch, planned.raw_ids).await?;
        Ok((planned.descriptor, prepared))
    }

    fn distribute<T>(
        &self,
        descriptor: &RelationDescriptor<T>,
        prepared: Option<Prepared<T>>,
        targets: &mut [T],
        report: &mut LoadReport,
    ) {
        match prepared {
            Some(prepared) => {
                report.record(&prepared);
                prepared.distribute(targets);
            }
            None => {
                debug!("Relation {} left untouched", descriptor.related_field());
                report.relations_skipped += 1;
            }
        }
    }
}
