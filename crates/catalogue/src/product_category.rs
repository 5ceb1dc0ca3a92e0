use serde::{Deserialize, Serialize};

use storefront_core::Entity;

use crate::ids::{CategoryId, ProductCategoryId, ProductId};
use crate::schema::{CatalogueRecord, EntitySchema, FieldKind, FieldSchema, OrderTerm};

/// Join record between a product and one of its categories.
///
/// A `(product, category)` pair appears at most once; the stores reject
/// duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductCategory {
    pub id: ProductCategoryId,
    pub product: ProductId,
    pub category: CategoryId,
}

impl ProductCategory {
    pub fn new(product: ProductId, category: CategoryId) -> Self {
        Self {
            id: ProductCategoryId::new(),
            product,
            category,
        }
    }

    /// The uniqueness key.
    pub fn pair(&self) -> (ProductId, CategoryId) {
        (self.product, self.category)
    }
}

impl Entity for ProductCategory {
    type Id = ProductCategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl core::fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "<productcategory for product '{}'>", self.product)
    }
}

static PRODUCT_CATEGORY_FIELDS: &[FieldSchema] = &[
    FieldSchema::new("id", "ID", FieldKind::Id),
    FieldSchema::new("product", "Product", FieldKind::ForeignKey { target: "catalogue_product" }),
    FieldSchema::new("category", "Category", FieldKind::ForeignKey { target: "catalogue_category" }),
];

static PRODUCT_CATEGORY_SCHEMA: EntitySchema = EntitySchema {
    name: "ProductCategory",
    app_label: "catalogue",
    table: "catalogue_productcategory",
    verbose_name: "Product category",
    verbose_name_plural: "Product categories",
    fields: PRODUCT_CATEGORY_FIELDS,
    ordering: &[OrderTerm::Asc("product"), OrderTerm::Asc("category")],
    unique_together: &[&["product", "category"]],
};

impl CatalogueRecord for ProductCategory {
    type SortKey = (ProductId, CategoryId);

    fn schema() -> &'static EntitySchema {
        &PRODUCT_CATEGORY_SCHEMA
    }

    fn sort_key(&self) -> Self::SortKey {
        self.pair()
    }
}
