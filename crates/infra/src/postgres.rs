//! Postgres-backed catalogue repository.
//!
//! Uniqueness lives in the database: the tables created by
//! [`crate::sql::catalogue_migration`] carry tenant-scoped unique
//! constraints, and a violation surfaces as
//! `StoreError::ConstraintViolation` naming the constraint.
//!
//! The repository is async and is called directly by code that persists to
//! Postgres, such as the `storefront-migrate` binary. `CatalogueService` is
//! synchronous and keeps its join rows in the in-memory join stores.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `ConstraintViolation` |
//! | Database (other) | Any other | `Backend` |
//! | RowNotFound | N/A | `NotFound` |
//! | Other | N/A | `Backend` |

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{instrument, warn};
use uuid::Uuid;

use storefront_catalogue::{
    product_class_schema, CatalogueRecord, CategoryId, OptionId, ProductCategory,
    ProductCategoryId, ProductClassId, ProductId, ProductRecommendation, ProductRecommendationId,
    Ranking, Slug,
};
use storefront_core::{AggregateId, TenantId};

use crate::error::StoreError;
use crate::projections::product_classes::ProductClassReadModel;
use crate::sql::{catalogue_migration, known_constraint, order_by};

#[derive(Debug, Clone)]
pub struct PostgresCatalogueRepository {
    pool: Arc<PgPool>,
}

impl PostgresCatalogueRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the catalogue tables if they do not exist.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(&catalogue_migration())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    #[instrument(
        skip(self, row),
        fields(tenant_id = %tenant_id, product_class_id = %row.product_class_id),
        err
    )]
    pub async fn insert_product_class(
        &self,
        tenant_id: TenantId,
        row: &ProductClassReadModel,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("insert_product_class", e))?;

        sqlx::query(
            r#"
            INSERT INTO catalogue_productclass (tenant_id, id, name, slug, requires_shipping)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(row.product_class_id.0.as_uuid())
        .bind(&row.name)
        .bind(row.slug.as_str())
        .bind(row.requires_shipping)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product_class", e))?;

        for option_id in &row.options {
            sqlx::query(
                r#"
                INSERT INTO catalogue_productclass_options (tenant_id, productclass_id, option_id)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(tenant_id.as_uuid())
            .bind(row.product_class_id.0.as_uuid())
            .bind(option_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_product_class", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("insert_product_class", e))?;
        Ok(())
    }

    /// Product classes of a tenant, ordered by name.
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub async fn list_product_classes(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<ProductClassReadModel>, StoreError> {
        let query = format!(
            "SELECT id, name, slug, requires_shipping FROM catalogue_productclass \
             WHERE tenant_id = $1 ORDER BY {}, slug, id",
            order_by(product_class_schema())
        );
        let rows = sqlx::query(&query)
            .bind(tenant_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_product_classes", e))?;

        let links = sqlx::query(
            "SELECT productclass_id, option_id FROM catalogue_productclass_options WHERE tenant_id = $1",
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_product_classes", e))?;

        let mut options: HashMap<Uuid, BTreeSet<OptionId>> = HashMap::new();
        for link in &links {
            let class: Uuid = get(link, "productclass_id")?;
            let option: Uuid = get(link, "option_id")?;
            options.entry(class).or_default().insert(OptionId::from_uuid(option));
        }

        rows.iter()
            .map(|row| {
                let id: Uuid = get(row, "id")?;
                let slug: String = get(row, "slug")?;
                Ok(ProductClassReadModel {
                    product_class_id: ProductClassId::new(AggregateId::from_uuid(id)),
                    name: get(row, "name")?,
                    slug: Slug::try_from(slug).map_err(|e| StoreError::InvalidValue(e.to_string()))?,
                    requires_shipping: get(row, "requires_shipping")?,
                    options: options.remove(&id).unwrap_or_default(),
                })
            })
            .collect()
    }

    #[instrument(skip(self, row), fields(tenant_id = %tenant_id, product = %row.product), err)]
    pub async fn insert_product_category(
        &self,
        tenant_id: TenantId,
        row: &ProductCategory,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO catalogue_productcategory (tenant_id, id, product_id, category_id)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(row.id.as_uuid())
        .bind(row.product.as_uuid())
        .bind(row.category.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product_category", e))?;
        Ok(())
    }

    /// Category memberships ordered by `(product, category)`.
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub async fn list_product_categories(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<ProductCategory>, StoreError> {
        let query = format!(
            "SELECT id, product_id, category_id FROM catalogue_productcategory \
             WHERE tenant_id = $1 ORDER BY {}",
            order_by(ProductCategory::schema())
        );
        let rows = sqlx::query(&query)
            .bind(tenant_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_product_categories", e))?;

        rows.iter()
            .map(|row| {
                Ok(ProductCategory {
                    id: ProductCategoryId::from_uuid(get(row, "id")?),
                    product: ProductId::from_uuid(get(row, "product_id")?),
                    category: CategoryId::from_uuid(get(row, "category_id")?),
                })
            })
            .collect()
    }

    #[instrument(skip(self, row), fields(tenant_id = %tenant_id, primary = %row.primary), err)]
    pub async fn insert_product_recommendation(
        &self,
        tenant_id: TenantId,
        row: &ProductRecommendation,
    ) -> Result<(), StoreError> {
        let ranking = ranking_column(row.ranking)?;

        sqlx::query(
            r#"
            INSERT INTO catalogue_productrecommendation
                (tenant_id, id, primary_id, recommendation_id, ranking)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(row.id.as_uuid())
        .bind(row.primary.as_uuid())
        .bind(row.recommendation.as_uuid())
        .bind(ranking)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product_recommendation", e))?;
        Ok(())
    }

    /// Recommendations ordered by primary, then ranking descending.
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub async fn list_product_recommendations(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<ProductRecommendation>, StoreError> {
        let query = format!(
            "SELECT id, primary_id, recommendation_id, ranking FROM catalogue_productrecommendation \
             WHERE tenant_id = $1 ORDER BY {}, recommendation_id",
            order_by(ProductRecommendation::schema())
        );
        let rows = sqlx::query(&query)
            .bind(tenant_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_product_recommendations", e))?;

        rows.iter()
            .map(|row| {
                let ranking: i16 = get(row, "ranking")?;
                let ranking = u16::try_from(ranking)
                    .map_err(|_| StoreError::InvalidValue(format!("negative ranking {ranking}")))
                    .and_then(|r| Ranking::new(r).map_err(|e| StoreError::InvalidValue(e.to_string())))?;
                Ok(ProductRecommendation {
                    id: ProductRecommendationId::from_uuid(get(row, "id")?),
                    primary: ProductId::from_uuid(get(row, "primary_id")?),
                    recommendation: ProductId::from_uuid(get(row, "recommendation_id")?),
                    ranking,
                })
            })
            .collect()
    }

    /// Remove the membership row for a pair.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, product = %product, category = %category), err)]
    pub async fn remove_product_category(
        &self,
        tenant_id: TenantId,
        product: ProductId,
        category: CategoryId,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM catalogue_productcategory
            WHERE tenant_id = $1 AND product_id = $2 AND category_id = $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(product.as_uuid())
        .bind(category.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("remove_product_category", e))?;
        expect_one_row(result.rows_affected())
    }

    #[instrument(
        skip(self),
        fields(tenant_id = %tenant_id, primary = %primary, recommendation = %recommendation),
        err
    )]
    pub async fn remove_product_recommendation(
        &self,
        tenant_id: TenantId,
        primary: ProductId,
        recommendation: ProductId,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM catalogue_productrecommendation
            WHERE tenant_id = $1 AND primary_id = $2 AND recommendation_id = $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(primary.as_uuid())
        .bind(recommendation.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("remove_product_recommendation", e))?;
        expect_one_row(result.rows_affected())
    }

    /// Re-weight an existing recommendation in place.
    #[instrument(
        skip(self),
        fields(tenant_id = %tenant_id, primary = %primary, recommendation = %recommendation),
        err
    )]
    pub async fn set_recommendation_ranking(
        &self,
        tenant_id: TenantId,
        primary: ProductId,
        recommendation: ProductId,
        ranking: Ranking,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE catalogue_productrecommendation SET ranking = $4
            WHERE tenant_id = $1 AND primary_id = $2 AND recommendation_id = $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(primary.as_uuid())
        .bind(recommendation.as_uuid())
        .bind(ranking_column(ranking)?)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_recommendation_ranking", e))?;
        expect_one_row(result.rows_affected())
    }
}

fn ranking_column(ranking: Ranking) -> Result<i16, StoreError> {
    i16::try_from(ranking.value())
        .map_err(|_| StoreError::InvalidValue(format!("ranking {ranking} out of range")))
}

/// Pair-keyed updates and deletes touch at most one row; zero means the pair
/// does not exist.
fn expect_one_row(rows_affected: u64) -> Result<(), StoreError> {
    match rows_affected {
        0 => Err(StoreError::NotFound),
        _ => Ok(()),
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::InvalidValue(format!("column {column}: {e}")))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().and_then(known_constraint);
                warn!(operation, constraint = ?db_err.constraint(), "unique constraint violated");
                return StoreError::ConstraintViolation {
                    constraint: constraint.unwrap_or("unknown"),
                    detail: msg,
                };
            }
            StoreError::Backend(msg)
        }
        sqlx::Error::RowNotFound => StoreError::NotFound,
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert_eq!(map_sqlx_error("get", sqlx::Error::RowNotFound), StoreError::NotFound);
    }

    #[test]
    fn pair_mutations_on_missing_rows_are_not_found() {
        assert_eq!(expect_one_row(0), Err(StoreError::NotFound));
        assert_eq!(expect_one_row(1), Ok(()));
    }

    #[test]
    fn ranking_fits_smallint_column() {
        let max = Ranking::new(Ranking::MAX).unwrap();
        assert_eq!(ranking_column(max), Ok(32_767));
        assert_eq!(ranking_column(Ranking::ZERO), Ok(0));
    }

    #[test]
    fn pool_errors_map_to_backend() {
        let err = map_sqlx_error("list_product_classes", sqlx::Error::PoolClosed);
        assert!(matches!(err, StoreError::Backend(msg) if msg.contains("list_product_classes")));
    }
}
