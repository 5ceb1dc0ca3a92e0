use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use storefront_catalogue::{
    sort_records, ProductId, ProductRecommendation, ProductRecommendationId, Ranking,
};
use storefront_core::TenantId;

use crate::error::StoreError;

/// Name of the `(primary, recommendation)` unique constraint.
pub const PRODUCT_RECOMMENDATION_UNIQUE: &str =
    "catalogue_productrecommendation_primary_recommendation_uniq";

/// Ranked product → product recommendations.
pub trait RecommendationStore: Send + Sync {
    /// Insert a row; a duplicate `(primary, recommendation)` pair is a
    /// `ConstraintViolation` regardless of ranking.
    fn insert(
        &self,
        tenant_id: TenantId,
        row: ProductRecommendation,
    ) -> Result<ProductRecommendation, StoreError>;

    fn remove(
        &self,
        tenant_id: TenantId,
        primary: ProductId,
        recommendation: ProductId,
    ) -> Result<ProductRecommendation, StoreError>;

    /// Change the ranking of an existing pair, returning the updated row.
    fn set_ranking(
        &self,
        tenant_id: TenantId,
        primary: ProductId,
        recommendation: ProductId,
        ranking: Ranking,
    ) -> Result<ProductRecommendation, StoreError>;

    fn get(
        &self,
        tenant_id: TenantId,
        id: ProductRecommendationId,
    ) -> Result<Option<ProductRecommendation>, StoreError>;

    /// Every row of the tenant: primary ascending, ranking descending.
    fn list(&self, tenant_id: TenantId) -> Result<Vec<ProductRecommendation>, StoreError>;

    /// Recommendations of one product, highest ranking first.
    fn for_primary(
        &self,
        tenant_id: TenantId,
        primary: ProductId,
    ) -> Result<Vec<ProductRecommendation>, StoreError> {
        Ok(self
            .list(tenant_id)?
            .into_iter()
            .filter(|row| row.primary == primary)
            .collect())
    }
}

impl<S> RecommendationStore for Arc<S>
where
    S: RecommendationStore + ?Sized,
{
    fn insert(
        &self,
        tenant_id: TenantId,
        row: ProductRecommendation,
    ) -> Result<ProductRecommendation, StoreError> {
        (**self).insert(tenant_id, row)
    }

    fn remove(
        &self,
        tenant_id: TenantId,
        primary: ProductId,
        recommendation: ProductId,
    ) -> Result<ProductRecommendation, StoreError> {
        (**self).remove(tenant_id, primary, recommendation)
    }

    fn set_ranking(
        &self,
        tenant_id: TenantId,
        primary: ProductId,
        recommendation: ProductId,
        ranking: Ranking,
    ) -> Result<ProductRecommendation, StoreError> {
        (**self).set_ranking(tenant_id, primary, recommendation, ranking)
    }

    fn get(
        &self,
        tenant_id: TenantId,
        id: ProductRecommendationId,
    ) -> Result<Option<ProductRecommendation>, StoreError> {
        (**self).get(tenant_id, id)
    }

    fn list(&self, tenant_id: TenantId) -> Result<Vec<ProductRecommendation>, StoreError> {
        (**self).list(tenant_id)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRecommendationStore {
    rows: RwLock<HashMap<TenantId, BTreeMap<(ProductId, ProductId), ProductRecommendation>>>,
}

impl InMemoryRecommendationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecommendationStore for InMemoryRecommendationStore {
    fn insert(
        &self,
        tenant_id: TenantId,
        row: ProductRecommendation,
    ) -> Result<ProductRecommendation, StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::poisoned())?;
        let tenant_rows = rows.entry(tenant_id).or_default();

        let pair = row.pair();
        if tenant_rows.contains_key(&pair) {
            return Err(StoreError::constraint(
                PRODUCT_RECOMMENDATION_UNIQUE,
                format!("product {} already recommends {}", pair.0, pair.1),
            ));
        }
        tenant_rows.insert(pair, row.clone());
        Ok(row)
    }

    fn remove(
        &self,
        tenant_id: TenantId,
        primary: ProductId,
        recommendation: ProductId,
    ) -> Result<ProductRecommendation, StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::poisoned())?;
        rows.get_mut(&tenant_id)
            .and_then(|tenant_rows| tenant_rows.remove(&(primary, recommendation)))
            .ok_or(StoreError::NotFound)
    }

    fn set_ranking(
        &self,
        tenant_id: TenantId,
        primary: ProductId,
        recommendation: ProductId,
        ranking: Ranking,
    ) -> Result<ProductRecommendation, StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::poisoned())?;
        let row = rows
            .get_mut(&tenant_id)
            .and_then(|tenant_rows| tenant_rows.get_mut(&(primary, recommendation)))
            .ok_or(StoreError::NotFound)?;
        row.ranking = ranking;
        Ok(row.clone())
    }

    fn get(
        &self,
        tenant_id: TenantId,
        id: ProductRecommendationId,
    ) -> Result<Option<ProductRecommendation>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::poisoned())?;
        Ok(rows
            .get(&tenant_id)
            .and_then(|tenant_rows| tenant_rows.values().find(|row| row.id == id))
            .cloned())
    }

    fn list(&self, tenant_id: TenantId) -> Result<Vec<ProductRecommendation>, StoreError> {
        let mut out: Vec<ProductRecommendation> = {
            let rows = self.rows.read().map_err(|_| StoreError::poisoned())?;
            rows.get(&tenant_id)
                .map(|tenant_rows| tenant_rows.values().cloned().collect())
                .unwrap_or_default()
        };
        sort_records(&mut out);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rank(value: u16) -> Ranking {
        Ranking::new(value).unwrap()
    }

    #[test]
    fn duplicate_pair_is_rejected_even_with_other_ranking() {
        let store = InMemoryRecommendationStore::new();
        let tenant_id = TenantId::new();
        let primary = ProductId::new();
        let other = ProductId::new();

        store
            .insert(tenant_id, ProductRecommendation::ranked(primary, other, rank(1)))
            .unwrap();
        let err = store
            .insert(tenant_id, ProductRecommendation::ranked(primary, other, rank(9)))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::ConstraintViolation { constraint: PRODUCT_RECOMMENDATION_UNIQUE, .. }
        ));
    }

    #[test]
    fn reverse_pair_is_a_separate_row() {
        let store = InMemoryRecommendationStore::new();
        let tenant_id = TenantId::new();
        let a = ProductId::new();
        let b = ProductId::new();

        store.insert(tenant_id, ProductRecommendation::new(a, b)).unwrap();
        store.insert(tenant_id, ProductRecommendation::new(b, a)).unwrap();
        assert_eq!(store.list(tenant_id).unwrap().len(), 2);
    }

    #[test]
    fn for_primary_orders_by_ranking_descending() {
        let store = InMemoryRecommendationStore::new();
        let tenant_id = TenantId::new();
        let primary = ProductId::new();
        let five = ProductId::new();
        let ten = ProductId::new();
        let zero = ProductId::new();

        store.insert(tenant_id, ProductRecommendation::ranked(primary, five, rank(5))).unwrap();
        store.insert(tenant_id, ProductRecommendation::ranked(primary, ten, rank(10))).unwrap();
        store.insert(tenant_id, ProductRecommendation::new(primary, zero)).unwrap();
        store.insert(tenant_id, ProductRecommendation::new(ProductId::new(), primary)).unwrap();

        let order: Vec<ProductId> = store
            .for_primary(tenant_id, primary)
            .unwrap()
            .into_iter()
            .map(|row| row.recommendation)
            .collect();
        assert_eq!(order, vec![ten, five, zero]);
    }

    #[test]
    fn set_ranking_reorders() {
        let store = InMemoryRecommendationStore::new();
        let tenant_id = TenantId::new();
        let primary = ProductId::new();
        let first = ProductId::new();
        let second = ProductId::new();

        store.insert(tenant_id, ProductRecommendation::ranked(primary, first, rank(10))).unwrap();
        let row = store.insert(tenant_id, ProductRecommendation::ranked(primary, second, rank(5))).unwrap();

        let updated = store.set_ranking(tenant_id, primary, second, rank(20)).unwrap();
        assert_eq!(updated.id, row.id);
        assert_eq!(updated.ranking, rank(20));

        let top = &store.for_primary(tenant_id, primary).unwrap()[0];
        assert_eq!(top.recommendation, second);

        assert_eq!(
            store.set_ranking(tenant_id, primary, ProductId::new(), rank(1)),
            Err(StoreError::NotFound)
        );
    }

    #[test]
    fn get_and_remove() {
        let store = InMemoryRecommendationStore::new();
        let tenant_id = TenantId::new();
        let a = ProductId::new();
        let b = ProductId::new();

        let row = store.insert(tenant_id, ProductRecommendation::new(a, b)).unwrap();
        assert_eq!(store.get(tenant_id, row.id).unwrap(), Some(row.clone()));
        assert_eq!(store.get(TenantId::new(), row.id).unwrap(), None);

        store.remove(tenant_id, a, b).unwrap();
        assert_eq!(store.get(tenant_id, row.id).unwrap(), None);
        assert_eq!(store.remove(tenant_id, a, b), Err(StoreError::NotFound));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: however pairs are repeated, each is stored once.
            #[test]
            fn each_pair_stored_once(picks in proptest::collection::vec((0usize..4, 0usize..4), 1..40)) {
                let products: Vec<ProductId> = (0..4).map(|_| ProductId::new()).collect();
                let store = InMemoryRecommendationStore::new();
                let tenant_id = TenantId::new();

                let mut accepted = std::collections::BTreeSet::new();
                for (p, r) in picks {
                    let ok = store
                        .insert(tenant_id, ProductRecommendation::new(products[p], products[r]))
                        .is_ok();
                    prop_assert_eq!(ok, accepted.insert((p, r)));
                }
                prop_assert_eq!(store.list(tenant_id).unwrap().len(), accepted.len());
            }
        }
    }
}
