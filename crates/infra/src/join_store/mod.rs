//! Stores for catalogue join records.
//!
//! Each store keys rows by their unique pair, so the check and the insert
//! happen under one write lock: of two concurrent inserts of the same pair,
//! exactly one succeeds.

pub mod categories;
pub mod recommendations;

pub use categories::{CategoryMembershipStore, InMemoryCategoryMembershipStore, PRODUCT_CATEGORY_UNIQUE};
pub use recommendations::{InMemoryRecommendationStore, RecommendationStore, PRODUCT_RECOMMENDATION_UNIQUE};
