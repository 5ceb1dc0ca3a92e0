//! Catalogue domain module.
//!
//! Product classes (event-sourced), category membership and product
//! recommendations (join records), plus the value objects and schema
//! descriptors they share. Pure domain logic: no IO, no storage.

pub mod ids;
pub mod product_category;
pub mod product_class;
pub mod product_recommendation;
pub mod ranking;
pub mod schema;
pub mod slug;

pub use ids::{CategoryId, OptionId, ProductCategoryId, ProductClassId, ProductId, ProductRecommendationId};
pub use product_category::ProductCategory;
pub use product_class::{
    AddProductClassOption, CreateProductClass, ProductClass, ProductClassCommand, ProductClassCreated,
    ProductClassEvent, ProductClassOptionAdded, ProductClassOptionRemoved, ProductClassRenamed,
    RemoveProductClassOption, RenameProductClass, SetShippingRequirement, ShippingRequirementChanged,
    product_class_schema, product_class_sort_key, PRODUCT_CLASS_AGGREGATE_TYPE,
};
pub use product_recommendation::ProductRecommendation;
pub use ranking::Ranking;
pub use schema::{
    sort_records, CatalogueRecord, EntitySchema, FieldDefault, FieldKind, FieldSchema, OrderTerm,
};
pub use slug::{slugify, Slug};
