use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use storefront_catalogue::{CategoryId, ProductCategory, ProductCategoryId, ProductId};
use storefront_core::TenantId;

use crate::error::StoreError;

/// Name of the `(product, category)` unique constraint.
pub const PRODUCT_CATEGORY_UNIQUE: &str = "catalogue_productcategory_product_category_uniq";

/// Product ↔ category membership rows.
pub trait CategoryMembershipStore: Send + Sync {
    /// Insert a row; a duplicate `(product, category)` pair is a
    /// `ConstraintViolation`.
    fn insert(&self, tenant_id: TenantId, row: ProductCategory) -> Result<ProductCategory, StoreError>;

    /// Remove the row for a pair, returning it.
    fn remove(
        &self,
        tenant_id: TenantId,
        product: ProductId,
        category: CategoryId,
    ) -> Result<ProductCategory, StoreError>;

    fn get(&self, tenant_id: TenantId, id: ProductCategoryId) -> Result<Option<ProductCategory>, StoreError>;

    /// Every row of the tenant, ordered by `(product, category)`.
    fn list(&self, tenant_id: TenantId) -> Result<Vec<ProductCategory>, StoreError>;

    fn categories_of(&self, tenant_id: TenantId, product: ProductId) -> Result<Vec<ProductCategory>, StoreError> {
        Ok(self
            .list(tenant_id)?
            .into_iter()
            .filter(|row| row.product == product)
            .collect())
    }

    fn products_in(&self, tenant_id: TenantId, category: CategoryId) -> Result<Vec<ProductCategory>, StoreError> {
        Ok(self
            .list(tenant_id)?
            .into_iter()
            .filter(|row| row.category == category)
            .collect())
    }
}

impl<S> CategoryMembershipStore for Arc<S>
where
    S: CategoryMembershipStore + ?Sized,
{
    fn insert(&self, tenant_id: TenantId, row: ProductCategory) -> Result<ProductCategory, StoreError> {
        (**self).insert(tenant_id, row)
    }

    fn remove(
        &self,
        tenant_id: TenantId,
        product: ProductId,
        category: CategoryId,
    ) -> Result<ProductCategory, StoreError> {
        (**self).remove(tenant_id, product, category)
    }

    fn get(&self, tenant_id: TenantId, id: ProductCategoryId) -> Result<Option<ProductCategory>, StoreError> {
        (**self).get(tenant_id, id)
    }

    fn list(&self, tenant_id: TenantId) -> Result<Vec<ProductCategory>, StoreError> {
        (**self).list(tenant_id)
    }
}

/// In-memory membership store.
///
/// `BTreeMap` keyed by the pair, so iteration is already in declared order.
#[derive(Debug, Default)]
pub struct InMemoryCategoryMembershipStore {
    rows: RwLock<HashMap<TenantId, BTreeMap<(ProductId, CategoryId), ProductCategory>>>,
}

impl InMemoryCategoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CategoryMembershipStore for InMemoryCategoryMembershipStore {
    fn insert(&self, tenant_id: TenantId, row: ProductCategory) -> Result<ProductCategory, StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::poisoned())?;
        let tenant_rows = rows.entry(tenant_id).or_default();

        let pair = row.pair();
        if tenant_rows.contains_key(&pair) {
            return Err(StoreError::constraint(
                PRODUCT_CATEGORY_UNIQUE,
                format!("product {} is already in category {}", pair.0, pair.1),
            ));
        }
        tenant_rows.insert(pair, row.clone());
        Ok(row)
    }

    fn remove(
        &self,
        tenant_id: TenantId,
        product: ProductId,
        category: CategoryId,
    ) -> Result<ProductCategory, StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::poisoned())?;
        rows.get_mut(&tenant_id)
            .and_then(|tenant_rows| tenant_rows.remove(&(product, category)))
            .ok_or(StoreError::NotFound)
    }

    fn get(&self, tenant_id: TenantId, id: ProductCategoryId) -> Result<Option<ProductCategory>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::poisoned())?;
        Ok(rows
            .get(&tenant_id)
            .and_then(|tenant_rows| tenant_rows.values().find(|row| row.id == id))
            .cloned())
    }

    fn list(&self, tenant_id: TenantId) -> Result<Vec<ProductCategory>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::poisoned())?;
        Ok(rows
            .get(&tenant_id)
            .map(|tenant_rows| tenant_rows.values().cloned().collect())
            .unwrap_or_default())
    }
}
