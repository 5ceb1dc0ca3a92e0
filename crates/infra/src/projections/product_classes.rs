use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use storefront_catalogue::{
    product_class_schema, product_class_sort_key, sort_records, CatalogueRecord, EntitySchema,
    OptionId, ProductClassEvent, ProductClassId, Slug, PRODUCT_CLASS_AGGREGATE_TYPE,
};
use storefront_core::{AggregateId, TenantId};
use storefront_events::{EventEnvelope, TenantScoped};

use crate::read_model::TenantStore;

/// Queryable product class row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductClassReadModel {
    pub product_class_id: ProductClassId,
    pub name: String,
    pub slug: Slug,
    pub requires_shipping: bool,
    pub options: BTreeSet<OptionId>,
}

impl CatalogueRecord for ProductClassReadModel {
    type SortKey = (String, String, ProductClassId);

    fn schema() -> &'static EntitySchema {
        product_class_schema()
    }

    fn sort_key(&self) -> Self::SortKey {
        product_class_sort_key(&self.name, Some(&self.slug), self.product_class_id)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("failed to deserialize product class event: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("slug '{slug}' already belongs to product class {owner}")]
    DuplicateSlug { slug: Slug, owner: ProductClassId },

    #[error("event for unknown product class {0}")]
    UnknownProductClass(ProductClassId),

    #[error("product class projection lock poisoned")]
    LockPoisoned,
}

/// Builds the product class listing and the per-tenant slug index.
///
/// The slug index is what the catalogue service consults to keep slugs
/// unique across a tenant.
#[derive(Debug)]
pub struct ProductClassProjection<S>
where
    S: TenantStore<ProductClassId, ProductClassReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<CursorKey, u64>>,
    slugs: RwLock<HashMap<(TenantId, Slug), ProductClassId>>,
}

impl<S> ProductClassProjection<S>
where
    S: TenantStore<ProductClassId, ProductClassReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
            slugs: RwLock::new(HashMap::new()),
        }
    }

    fn get_cursor(&self, key: CursorKey) -> Result<u64, ProjectionError> {
        let cursors = self.cursors.read().map_err(|_| ProjectionError::LockPoisoned)?;
        Ok(cursors.get(&key).copied().unwrap_or(0))
    }

    fn update_cursor(&self, key: CursorKey, sequence_number: u64) -> Result<(), ProjectionError> {
        let mut cursors = self.cursors.write().map_err(|_| ProjectionError::LockPoisoned)?;
        cursors.insert(key, sequence_number);
        Ok(())
    }

    fn clear_tenant(&self, tenant_id: TenantId) -> Result<(), ProjectionError> {
        self.store.clear_tenant(tenant_id);
        self.cursors
            .write()
            .map_err(|_| ProjectionError::LockPoisoned)?
            .retain(|k, _| k.tenant_id != tenant_id);
        self.slugs
            .write()
            .map_err(|_| ProjectionError::LockPoisoned)?
            .retain(|(t, _), _| *t != tenant_id);
        Ok(())
    }

    pub fn get(&self, tenant_id: TenantId, id: &ProductClassId) -> Option<ProductClassReadModel> {
        self.store.get(tenant_id, id)
    }

    /// All product classes of a tenant, ordered by name.
    pub fn list(&self, tenant_id: TenantId) -> Vec<ProductClassReadModel> {
        let mut rows = self.store.list(tenant_id);
        sort_records(&mut rows);
        rows
    }

    pub fn count(&self, tenant_id: TenantId) -> usize {
        self.store.list(tenant_id).len()
    }

    pub fn by_slug(
        &self,
        tenant_id: TenantId,
        slug: &Slug,
    ) -> Result<Option<ProductClassReadModel>, ProjectionError> {
        Ok(self
            .slug_owner(tenant_id, slug)?
            .and_then(|owner| self.store.get(tenant_id, &owner)))
    }

    pub fn slug_owner(
        &self,
        tenant_id: TenantId,
        slug: &Slug,
    ) -> Result<Option<ProductClassId>, ProjectionError> {
        let slugs = self.slugs.read().map_err(|_| ProjectionError::LockPoisoned)?;
        Ok(slugs.get(&(tenant_id, slug.clone())).copied())
    }

    /// Every slug currently claimed in the tenant.
    pub fn tenant_slugs(&self, tenant_id: TenantId) -> Result<HashSet<Slug>, ProjectionError> {
        let slugs = self.slugs.read().map_err(|_| ProjectionError::LockPoisoned)?;
        Ok(slugs
            .keys()
            .filter(|(t, _)| *t == tenant_id)
            .map(|(_, slug)| slug.clone())
            .collect())
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != PRODUCT_CLASS_AGGREGATE_TYPE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let cursor = CursorKey {
            tenant_id,
            aggregate_id: envelope.aggregate_id(),
        };
        let seq = envelope.sequence_number();

        let last = self.get_cursor(cursor)?;
        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            // Redelivery.
            return Ok(());
        }
        if seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev: ProductClassEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        if ev.tenant_id() != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        let product_class_id = ev.product_class_id();
        if product_class_id.0 != envelope.aggregate_id() {
            return Err(ProjectionError::TenantIsolation(
                "event product_class_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            ProductClassEvent::ProductClassCreated(e) => {
                self.claim_slug(tenant_id, &e.slug, product_class_id)?;
                self.store.upsert(
                    tenant_id,
                    product_class_id,
                    ProductClassReadModel {
                        product_class_id,
                        name: e.name,
                        slug: e.slug,
                        requires_shipping: e.requires_shipping,
                        options: e.options,
                    },
                );
            }
            ProductClassEvent::ProductClassRenamed(e) => {
                self.update_row(tenant_id, product_class_id, |row| row.name = e.name)?;
            }
            ProductClassEvent::ShippingRequirementChanged(e) => {
                self.update_row(tenant_id, product_class_id, |row| {
                    row.requires_shipping = e.requires_shipping
                })?;
            }
            ProductClassEvent::ProductClassOptionAdded(e) => {
                self.update_row(tenant_id, product_class_id, |row| {
                    row.options.insert(e.option_id);
                })?;
            }
            ProductClassEvent::ProductClassOptionRemoved(e) => {
                self.update_row(tenant_id, product_class_id, |row| {
                    row.options.remove(&e.option_id);
                })?;
            }
        }

        tracing::debug!(%tenant_id, %product_class_id, seq, "product class projection updated");
        self.update_cursor(cursor, seq)
    }

    fn update_row(
        &self,
        tenant_id: TenantId,
        product_class_id: ProductClassId,
        change: impl FnOnce(&mut ProductClassReadModel),
    ) -> Result<(), ProjectionError> {
        let mut row = self
            .store
            .get(tenant_id, &product_class_id)
            .ok_or(ProjectionError::UnknownProductClass(product_class_id))?;
        change(&mut row);
        self.store.upsert(tenant_id, product_class_id, row);
        Ok(())
    }

    fn claim_slug(
        &self,
        tenant_id: TenantId,
        slug: &Slug,
        product_class_id: ProductClassId,
    ) -> Result<(), ProjectionError> {
        let mut slugs = self
            .slugs
            .write()
            .map_err(|_| ProjectionError::LockPoisoned)?;
        match slugs.get(&(tenant_id, slug.clone())) {
            Some(owner) if *owner != product_class_id => Err(ProjectionError::DuplicateSlug {
                slug: slug.clone(),
                owner: *owner,
            }),
            _ => {
                slugs.insert((tenant_id, slug.clone()), product_class_id);
                Ok(())
            }
        }
    }

    /// Drop every tenant present in `envelopes` and replay them in stream
    /// order.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();

        let mut tenants: Vec<TenantId> = envs.iter().map(|e| e.tenant_id()).collect();
        tenants.sort();
        tenants.dedup();
        for t in tenants {
            self.clear_tenant(t)?;
        }

        envs.sort_by_key(|e| (e.tenant_id(), e.aggregate_id(), e.sequence_number()));
        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use storefront_catalogue::{ProductClassCreated, ProductClassRenamed};
    use uuid::Uuid;

    use super::*;
    use crate::read_model::InMemoryTenantStore;

    type Projection = ProductClassProjection<InMemoryTenantStore<ProductClassId, ProductClassReadModel>>;

    fn projection() -> Projection {
        ProductClassProjection::new(InMemoryTenantStore::new())
    }

    fn envelope(tenant_id: TenantId, id: ProductClassId, seq: u64, ev: &ProductClassEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            id.0,
            PRODUCT_CLASS_AGGREGATE_TYPE,
            seq,
            serde_json::to_value(ev).unwrap(),
        )
    }

    fn created(tenant_id: TenantId, id: ProductClassId, name: &str, slug: &str) -> ProductClassEvent {
        ProductClassEvent::ProductClassCreated(ProductClassCreated {
            tenant_id,
            product_class_id: id,
            name: name.to_string(),
            slug: Slug::parse(slug).unwrap(),
            requires_shipping: true,
            options: BTreeSet::new(),
            occurred_at: Utc::now(),
        })
    }

    fn renamed(tenant_id: TenantId, id: ProductClassId, name: &str) -> ProductClassEvent {
        ProductClassEvent::ProductClassRenamed(ProductClassRenamed {
            tenant_id,
            product_class_id: id,
            name: name.to_string(),
            occurred_at: Utc::now(),
        })
    }

    fn new_id() -> ProductClassId {
        ProductClassId::new(AggregateId::new())
    }

    #[test]
    fn created_and_renamed_update_row_and_slug_index() {
        let p = projection();
        let tenant_id = TenantId::new();
        let id = new_id();

        p.apply_envelope(&envelope(tenant_id, id, 1, &created(tenant_id, id, "Books", "books")))
            .unwrap();
        p.apply_envelope(&envelope(tenant_id, id, 2, &renamed(tenant_id, id, "Novels")))
            .unwrap();

        let row = p.get(tenant_id, &id).unwrap();
        assert_eq!(row.name, "Novels");
        assert_eq!(row.slug.as_str(), "books");
        let slug = Slug::parse("books").unwrap();
        assert_eq!(p.slug_owner(tenant_id, &slug).unwrap(), Some(id));
        assert_eq!(p.by_slug(tenant_id, &slug).unwrap().unwrap().product_class_id, id);
        assert_eq!(p.slug_owner(TenantId::new(), &slug).unwrap(), None);
        assert!(p.tenant_slugs(tenant_id).unwrap().contains(&slug));
    }

    #[test]
    fn redelivery_is_ignored_and_gaps_are_rejected() {
        let p = projection();
        let tenant_id = TenantId::new();
        let id = new_id();
        let env = envelope(tenant_id, id, 1, &created(tenant_id, id, "Books", "books"));

        p.apply_envelope(&env).unwrap();
        p.apply_envelope(&env).unwrap();
        assert_eq!(p.count(tenant_id), 1);

        let err = p
            .apply_envelope(&envelope(tenant_id, id, 3, &renamed(tenant_id, id, "Novels")))
            .unwrap_err();
        assert_eq!(err, ProjectionError::NonMonotonicSequence { last: 1, found: 3 });
    }

    #[test]
    fn duplicate_slug_from_another_class_is_rejected() {
        let p = projection();
        let tenant_id = TenantId::new();
        let first = new_id();
        let second = new_id();

        p.apply_envelope(&envelope(tenant_id, first, 1, &created(tenant_id, first, "Books", "books")))
            .unwrap();
        let err = p
            .apply_envelope(&envelope(tenant_id, second, 1, &created(tenant_id, second, "Books", "books")))
            .unwrap_err();
        assert!(matches!(err, ProjectionError::DuplicateSlug { owner, .. } if owner == first));
    }

    #[test]
    fn payload_from_other_tenant_is_rejected() {
        let p = projection();
        let id = new_id();
        let err = p
            .apply_envelope(&envelope(TenantId::new(), id, 1, &created(TenantId::new(), id, "Books", "books")))
            .unwrap_err();
        assert!(matches!(err, ProjectionError::TenantIsolation(_)));
    }

    #[test]
    fn list_is_ordered_by_name() {
        let p = projection();
        let tenant_id = TenantId::new();
        for (name, slug) in [("Toys", "toys"), ("Books", "books"), ("DVDs", "dvds")] {
            let id = new_id();
            p.apply_envelope(&envelope(tenant_id, id, 1, &created(tenant_id, id, name, slug)))
                .unwrap();
        }
        let names: Vec<String> = p.list(tenant_id).into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Books", "DVDs", "Toys"]);
    }

    #[test]
    fn rebuild_replays_in_stream_order() {
        let p = projection();
        let tenant_id = TenantId::new();
        let id = new_id();
        let envs = vec![
            envelope(tenant_id, id, 2, &renamed(tenant_id, id, "Novels")),
            envelope(tenant_id, id, 1, &created(tenant_id, id, "Books", "books")),
        ];

        p.rebuild_from_scratch(envs.clone()).unwrap();
        p.rebuild_from_scratch(envs).unwrap();

        assert_eq!(p.count(tenant_id), 1);
        assert_eq!(p.get(tenant_id, &id).unwrap().name, "Novels");
    }

    #[test]
    fn other_aggregate_types_are_skipped() {
        let p = projection();
        let tenant_id = TenantId::new();
        let env = EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            AggregateId::new(),
            "catalogue.something_else",
            1,
            serde_json::json!({ "anything": true }),
        );
        p.apply_envelope(&env).unwrap();
        assert_eq!(p.count(tenant_id), 0);
    }

    #[test]
    fn poisoned_slug_index_is_an_error_not_a_free_slug() {
        let p = std::sync::Arc::new(projection());
        let poisoner = p.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.slugs.write().unwrap();
            panic!("poison the slug index");
        })
        .join();

        let slug = Slug::parse("books").unwrap();
        assert_eq!(p.slug_owner(TenantId::new(), &slug), Err(ProjectionError::LockPoisoned));
        assert_eq!(p.tenant_slugs(TenantId::new()), Err(ProjectionError::LockPoisoned));
    }
}
