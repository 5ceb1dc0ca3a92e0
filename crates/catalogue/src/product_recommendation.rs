use core::cmp::Reverse;

use serde::{Deserialize, Serialize};

use storefront_core::Entity;

use crate::ids::{ProductId, ProductRecommendationId};
use crate::ranking::Ranking;
use crate::schema::{
    CatalogueRecord, EntitySchema, FieldDefault, FieldKind, FieldSchema, OrderTerm,
};

/// Join record: `primary` recommends `recommendation`, weighted by `ranking`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductRecommendation {
    pub id: ProductRecommendationId,
    pub primary: ProductId,
    pub recommendation: ProductId,
    #[serde(default)]
    pub ranking: Ranking,
}

impl ProductRecommendation {
    /// New recommendation with the default ranking (0).
    pub fn new(primary: ProductId, recommendation: ProductId) -> Self {
        Self::ranked(primary, recommendation, Ranking::default())
    }

    pub fn ranked(primary: ProductId, recommendation: ProductId, ranking: Ranking) -> Self {
        Self {
            id: ProductRecommendationId::new(),
            primary,
            recommendation,
            ranking,
        }
    }

    /// The uniqueness key.
    pub fn pair(&self) -> (ProductId, ProductId) {
        (self.primary, self.recommendation)
    }
}

impl Entity for ProductRecommendation {
    type Id = ProductRecommendationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

static PRODUCT_RECOMMENDATION_FIELDS: &[FieldSchema] = &[
    FieldSchema::new("id", "ID", FieldKind::Id),
    FieldSchema::new("primary", "Primary product", FieldKind::ForeignKey { target: "catalogue_product" }),
    FieldSchema::new(
        "recommendation",
        "Recommended product",
        FieldKind::ForeignKey { target: "catalogue_product" },
    ),
    FieldSchema::new("ranking", "Ranking", FieldKind::PositiveSmallInt)
        .default(FieldDefault::Int(0))
        .help(
            "Determines order of the products. A product with a higher value will \
             appear before one with a lower ranking.",
        ),
];

static PRODUCT_RECOMMENDATION_SCHEMA: EntitySchema = EntitySchema {
    name: "ProductRecommendation",
    app_label: "catalogue",
    table: "catalogue_productrecommendation",
    verbose_name: "Product recommendation",
    verbose_name_plural: "Product recommendations",
    fields: PRODUCT_RECOMMENDATION_FIELDS,
    ordering: &[OrderTerm::Asc("primary"), OrderTerm::Desc("ranking")],
    unique_together: &[&["primary", "recommendation"]],
};

impl CatalogueRecord for ProductRecommendation {
    /// Primary ascending, ranking descending, then recommended product.
    type SortKey = (ProductId, Reverse<Ranking>, ProductId);

    fn schema() -> &'static EntitySchema {
        &PRODUCT_RECOMMENDATION_SCHEMA
    }

    fn sort_key(&self) -> Self::SortKey {
        (self.primary, Reverse(self.ranking), self.recommendation)
    }
}
