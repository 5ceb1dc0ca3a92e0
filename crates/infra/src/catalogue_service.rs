//! Catalogue application service.
//!
//! Ties the product class command pipeline to its projection and owns the
//! join-record stores. Every operation is tenant-scoped; uniqueness (slugs,
//! category membership, recommendation pairs) is enforced here and in the
//! stores, not in the aggregates.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use thiserror::Error;
use tracing::{instrument, warn};

use storefront_catalogue::{
    AddProductClassOption, CategoryId, CreateProductClass, OptionId, ProductCategory, ProductClass,
    ProductClassCommand, ProductClassId, ProductId, ProductRecommendation, Ranking,
    RemoveProductClassOption, RenameProductClass, SetShippingRequirement, Slug,
    PRODUCT_CLASS_AGGREGATE_TYPE,
};
use storefront_core::{AggregateId, DomainError, TenantId};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::error::StoreError;
use crate::event_store::{EventStore, StoredEvent};
use crate::join_store::{
    CategoryMembershipStore, InMemoryCategoryMembershipStore, InMemoryRecommendationStore,
    RecommendationStore,
};
use crate::projections::product_classes::{
    ProductClassProjection, ProductClassReadModel, ProjectionError,
};
use crate::read_model::InMemoryTenantStore;

/// Name of the product class slug unique constraint.
pub const PRODUCT_CLASS_SLUG_UNIQUE: &str = "catalogue_productclass_slug_key";

#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Products cannot be created before the tenant has a product class.
    #[error("tenant {0} has no product class; create one before adding products")]
    NoProductClasses(TenantId),
}

impl CatalogueError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, CatalogueError::Store(err) if err.is_constraint_violation())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CatalogueError::Dispatch(DispatchError::NotFound) | CatalogueError::Store(StoreError::NotFound)
        )
    }
}

pub type CatalogueResult<T> = Result<T, CatalogueError>;

type ProductClassRows = InMemoryTenantStore<ProductClassId, ProductClassReadModel>;

fn make_product_class(_: TenantId, id: AggregateId) -> ProductClass {
    ProductClass::empty(ProductClassId::new(id))
}

pub struct CatalogueService<S, C = InMemoryCategoryMembershipStore, R = InMemoryRecommendationStore>
where
    S: EventStore,
{
    dispatcher: CommandDispatcher<S>,
    product_classes: ProductClassProjection<ProductClassRows>,
    categories: C,
    recommendations: R,
    // Serializes product class writes: held from slug resolution or command
    // dispatch until the committed events are projected.
    writes: Mutex<()>,
}

impl<S> CatalogueService<S>
where
    S: EventStore,
{
    /// Service over `event_store` with in-memory join stores.
    pub fn in_memory(event_store: S) -> Self {
        Self::new(
            event_store,
            InMemoryCategoryMembershipStore::new(),
            InMemoryRecommendationStore::new(),
        )
    }
}

impl<S, C, R> CatalogueService<S, C, R>
where
    S: EventStore,
    C: CategoryMembershipStore,
    R: RecommendationStore,
{
    pub fn new(event_store: S, categories: C, recommendations: R) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(event_store),
            product_classes: ProductClassProjection::new(InMemoryTenantStore::new()),
            categories,
            recommendations,
            writes: Mutex::new(()),
        }
    }

    pub fn event_store(&self) -> &S {
        self.dispatcher.store()
    }

    // ---------------------------------------------------------------------
    // Product classes
    // ---------------------------------------------------------------------

    /// Create a product class.
    ///
    /// An explicit `slug` must be valid and free in the tenant. Without one,
    /// a slug is derived from `name` and suffixed until it is free.
    #[instrument(skip(self, options), fields(tenant_id = %tenant_id), err)]
    pub fn create_product_class(
        &self,
        tenant_id: TenantId,
        name: &str,
        slug: Option<&str>,
        requires_shipping: Option<bool>,
        options: BTreeSet<OptionId>,
    ) -> CatalogueResult<ProductClassReadModel> {
        let writes = self.lock_writes()?;

        let slug = match slug {
            Some(explicit) => {
                let slug = Slug::parse(explicit)?;
                if let Some(owner) = self.product_classes.slug_owner(tenant_id, &slug)? {
                    warn!(%slug, %owner, "product class slug already taken");
                    return Err(StoreError::constraint(
                        PRODUCT_CLASS_SLUG_UNIQUE,
                        format!("slug '{slug}' already belongs to product class {owner}"),
                    )
                    .into());
                }
                slug
            }
            None => {
                let taken = self.product_classes.tenant_slugs(tenant_id)?;
                Slug::unique_from(name, |candidate| taken.contains(candidate))?
            }
        };

        let product_class_id = ProductClassId::new(AggregateId::new());
        let command = ProductClassCommand::CreateProductClass(CreateProductClass {
            tenant_id,
            product_class_id,
            name: name.to_string(),
            slug,
            requires_shipping,
            options,
            occurred_at: Utc::now(),
        });
        self.execute(&writes, tenant_id, product_class_id, command)?;

        self.product_class(tenant_id, product_class_id)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_class_id = %product_class_id), err)]
    pub fn rename_product_class(
        &self,
        tenant_id: TenantId,
        product_class_id: ProductClassId,
        name: &str,
    ) -> CatalogueResult<ProductClassReadModel> {
        let command = ProductClassCommand::RenameProductClass(RenameProductClass {
            tenant_id,
            product_class_id,
            name: name.to_string(),
            occurred_at: Utc::now(),
        });
        let writes = self.lock_writes()?;
        self.execute(&writes, tenant_id, product_class_id, command)?;
        self.product_class(tenant_id, product_class_id)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_class_id = %product_class_id), err)]
    pub fn set_requires_shipping(
        &self,
        tenant_id: TenantId,
        product_class_id: ProductClassId,
        requires_shipping: bool,
    ) -> CatalogueResult<ProductClassReadModel> {
        let command = ProductClassCommand::SetShippingRequirement(SetShippingRequirement {
            tenant_id,
            product_class_id,
            requires_shipping,
            occurred_at: Utc::now(),
        });
        let writes = self.lock_writes()?;
        self.execute(&writes, tenant_id, product_class_id, command)?;
        self.product_class(tenant_id, product_class_id)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_class_id = %product_class_id), err)]
    pub fn add_option(
        &self,
        tenant_id: TenantId,
        product_class_id: ProductClassId,
        option_id: OptionId,
    ) -> CatalogueResult<ProductClassReadModel> {
        let command = ProductClassCommand::AddProductClassOption(AddProductClassOption {
            tenant_id,
            product_class_id,
            option_id,
            occurred_at: Utc::now(),
        });
        let writes = self.lock_writes()?;
        self.execute(&writes, tenant_id, product_class_id, command)?;
        self.product_class(tenant_id, product_class_id)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_class_id = %product_class_id), err)]
    pub fn remove_option(
        &self,
        tenant_id: TenantId,
        product_class_id: ProductClassId,
        option_id: OptionId,
    ) -> CatalogueResult<ProductClassReadModel> {
        let command = ProductClassCommand::RemoveProductClassOption(RemoveProductClassOption {
            tenant_id,
            product_class_id,
            option_id,
            occurred_at: Utc::now(),
        });
        let writes = self.lock_writes()?;
        self.execute(&writes, tenant_id, product_class_id, command)?;
        self.product_class(tenant_id, product_class_id)
    }

    pub fn product_class(
        &self,
        tenant_id: TenantId,
        product_class_id: ProductClassId,
    ) -> CatalogueResult<ProductClassReadModel> {
        self.product_classes
            .get(tenant_id, &product_class_id)
            .ok_or(CatalogueError::Dispatch(DispatchError::NotFound))
    }

    /// Product classes of a tenant, ordered by name.
    pub fn product_classes(&self, tenant_id: TenantId) -> Vec<ProductClassReadModel> {
        self.product_classes.list(tenant_id)
    }

    pub fn product_class_by_slug(
        &self,
        tenant_id: TenantId,
        slug: &str,
    ) -> CatalogueResult<Option<ProductClassReadModel>> {
        let slug = Slug::parse(slug)?;
        Ok(self.product_classes.by_slug(tenant_id, &slug)?)
    }

    /// Gate for product creation: a tenant needs at least one product class.
    pub fn ensure_products_allowed(&self, tenant_id: TenantId) -> CatalogueResult<()> {
        if self.product_classes.count(tenant_id) == 0 {
            return Err(CatalogueError::NoProductClasses(tenant_id));
        }
        Ok(())
    }

    /// Replay the tenant's product class streams into a fresh projection.
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub fn rebuild_product_classes(&self, tenant_id: TenantId) -> CatalogueResult<usize> {
        let _writes = self.lock_writes()?;
        let events = self
            .dispatcher
            .store()
            .load_by_type(tenant_id, PRODUCT_CLASS_AGGREGATE_TYPE)
            .map_err(DispatchError::from)?;
        let replayed = events.len();
        self.product_classes
            .rebuild_from_scratch(events.iter().map(StoredEvent::to_envelope))?;
        Ok(replayed)
    }

    fn lock_writes(&self) -> CatalogueResult<MutexGuard<'_, ()>> {
        Ok(self.writes.lock().map_err(|_| StoreError::poisoned())?)
    }

    /// Dispatch and project. The write guard must be held for both steps so
    /// events reach the projection in stream order.
    fn execute(
        &self,
        _writes: &MutexGuard<'_, ()>,
        tenant_id: TenantId,
        product_class_id: ProductClassId,
        command: ProductClassCommand,
    ) -> CatalogueResult<()> {
        let committed = self.dispatcher.dispatch(
            tenant_id,
            product_class_id.0,
            PRODUCT_CLASS_AGGREGATE_TYPE,
            command,
            make_product_class,
        )?;
        for stored in &committed {
            self.product_classes.apply_envelope(&stored.to_envelope())?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Category membership
    // ---------------------------------------------------------------------

    #[instrument(skip(self), fields(tenant_id = %tenant_id, product = %product, category = %category), err)]
    pub fn assign_category(
        &self,
        tenant_id: TenantId,
        product: ProductId,
        category: CategoryId,
    ) -> CatalogueResult<ProductCategory> {
        self.categories
            .insert(tenant_id, ProductCategory::new(product, category))
            .inspect_err(|err| {
                if err.is_constraint_violation() {
                    warn!(%err, "duplicate category membership rejected");
                }
            })
            .map_err(Into::into)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, product = %product, category = %category), err)]
    pub fn remove_category(
        &self,
        tenant_id: TenantId,
        product: ProductId,
        category: CategoryId,
    ) -> CatalogueResult<ProductCategory> {
        Ok(self.categories.remove(tenant_id, product, category)?)
    }

    pub fn categories_of(
        &self,
        tenant_id: TenantId,
        product: ProductId,
    ) -> CatalogueResult<Vec<ProductCategory>> {
        Ok(self.categories.categories_of(tenant_id, product)?)
    }

    pub fn products_in(
        &self,
        tenant_id: TenantId,
        category: CategoryId,
    ) -> CatalogueResult<Vec<ProductCategory>> {
        Ok(self.categories.products_in(tenant_id, category)?)
    }

    // ---------------------------------------------------------------------
    // Recommendations
    // ---------------------------------------------------------------------

    /// Record that `primary` recommends `recommendation`.
    ///
    /// `ranking` defaults to 0; values above 32767 are a validation error.
    #[instrument(
        skip(self),
        fields(tenant_id = %tenant_id, primary = %primary, recommendation = %recommendation),
        err
    )]
    pub fn recommend(
        &self,
        tenant_id: TenantId,
        primary: ProductId,
        recommendation: ProductId,
        ranking: Option<u16>,
    ) -> CatalogueResult<ProductRecommendation> {
        let ranking = ranking.map(Ranking::new).transpose()?.unwrap_or_default();
        self.recommendations
            .insert(tenant_id, ProductRecommendation::ranked(primary, recommendation, ranking))
            .inspect_err(|err| {
                if err.is_constraint_violation() {
                    warn!(%err, "duplicate recommendation rejected");
                }
            })
            .map_err(Into::into)
    }

    #[instrument(
        skip(self),
        fields(tenant_id = %tenant_id, primary = %primary, recommendation = %recommendation),
        err
    )]
    pub fn rerank(
        &self,
        tenant_id: TenantId,
        primary: ProductId,
        recommendation: ProductId,
        ranking: u16,
    ) -> CatalogueResult<ProductRecommendation> {
        let ranking = Ranking::new(ranking)?;
        Ok(self
            .recommendations
            .set_ranking(tenant_id, primary, recommendation, ranking)?)
    }

    #[instrument(
        skip(self),
        fields(tenant_id = %tenant_id, primary = %primary, recommendation = %recommendation),
        err
    )]
    pub fn remove_recommendation(
        &self,
        tenant_id: TenantId,
        primary: ProductId,
        recommendation: ProductId,
    ) -> CatalogueResult<ProductRecommendation> {
        Ok(self.recommendations.remove(tenant_id, primary, recommendation)?)
    }

    /// Recommendations of `primary`, highest ranking first.
    pub fn recommendations_for(
        &self,
        tenant_id: TenantId,
        primary: ProductId,
    ) -> CatalogueResult<Vec<ProductRecommendation>> {
        Ok(self.recommendations.for_primary(tenant_id, primary)?)
    }
}
