//! Postgres DDL rendered from the catalogue schema descriptors.
//!
//! Every table carries a `tenant_id` column and every unique constraint is
//! scoped by it. Foreign keys to products, categories and options are plain
//! UUID columns: those tables belong to other modules.

use storefront_catalogue::{
    product_class_schema, CatalogueRecord, EntitySchema, FieldDefault, FieldKind, FieldSchema,
    ProductCategory, ProductRecommendation,
};

use crate::catalogue_service::PRODUCT_CLASS_SLUG_UNIQUE;
use crate::join_store::{PRODUCT_CATEGORY_UNIQUE, PRODUCT_RECOMMENDATION_UNIQUE};

/// Schemas in dependency order.
pub fn catalogue_schemas() -> [&'static EntitySchema; 3] {
    [
        product_class_schema(),
        ProductCategory::schema(),
        ProductRecommendation::schema(),
    ]
}

/// The full catalogue migration script.
pub fn catalogue_migration() -> String {
    let mut sql = String::from("-- catalogue schema\n\n");
    for schema in catalogue_schemas() {
        sql.push_str(&create_table(schema));
        sql.push('\n');
    }
    sql
}

/// Column name for a field: references get an `_id` suffix.
pub fn column_name(field: &FieldSchema) -> String {
    match field.kind {
        FieldKind::ForeignKey { .. } => format!("{}_id", field.name),
        _ => field.name.to_string(),
    }
}

/// Constraint name for a unique field set.
///
/// Single fields follow Postgres' `{table}_{column}_key`; composites use
/// `{table}_{fields}_uniq`.
pub fn unique_constraint_name(schema: &EntitySchema, fields: &[&str]) -> String {
    match fields {
        [single] => {
            let column = schema
                .field(single)
                .map(column_name)
                .unwrap_or_else(|| single.to_string());
            format!("{}_{}_key", schema.table, column)
        }
        _ => format!("{}_{}_uniq", schema.table, fields.join("_")),
    }
}

/// Map a constraint name reported by Postgres back to its static name.
pub fn known_constraint(name: &str) -> Option<&'static str> {
    [
        PRODUCT_CLASS_SLUG_UNIQUE,
        PRODUCT_CATEGORY_UNIQUE,
        PRODUCT_RECOMMENDATION_UNIQUE,
    ]
    .into_iter()
    .find(|known| *known == name)
}

/// `CREATE TABLE` plus constraints, ordering index and link tables for one
/// entity.
pub fn create_table(schema: &EntitySchema) -> String {
    let mut lines: Vec<String> = vec!["    tenant_id UUID NOT NULL".to_string()];
    lines.extend(
        schema
            .fields
            .iter()
            .filter(|f| !matches!(f.kind, FieldKind::ManyToMany { .. }))
            .map(|f| format!("    {}", column_definition(f))),
    );
    for fields in schema.unique_constraints() {
        let columns: Vec<String> = fields
            .iter()
            .map(|name| schema.field(name).map(column_name).unwrap_or_else(|| name.to_string()))
            .collect();
        lines.push(format!(
            "    CONSTRAINT {} UNIQUE (tenant_id, {})",
            unique_constraint_name(schema, &fields),
            columns.join(", ")
        ));
    }

    let mut sql = format!("-- {}\n", schema.verbose_name_plural);
    sql.push_str(&format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n);\n",
        schema.table,
        lines.join(",\n")
    ));

    if let Some(index) = ordering_index(schema) {
        sql.push_str(&index);
    }

    for field in schema.fields {
        if let FieldKind::ManyToMany { target } = field.kind {
            sql.push_str(&link_table(schema, field, target));
        }
    }
    sql
}

/// The SQL `ORDER BY` clause matching the declared ordering.
pub fn order_by(schema: &EntitySchema) -> String {
    schema
        .ordering
        .iter()
        .map(|term| {
            let column = schema
                .field(term.field())
                .map(column_name)
                .unwrap_or_else(|| term.field().to_string());
            if term.is_descending() {
                format!("{column} DESC")
            } else {
                column
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn column_definition(field: &FieldSchema) -> String {
    let column = column_name(field);
    let mut def = match field.kind {
        FieldKind::Id => return format!("{column} UUID PRIMARY KEY"),
        FieldKind::Text { max_len } | FieldKind::Slug { max_len } => {
            format!("{column} VARCHAR({max_len})")
        }
        FieldKind::Bool => format!("{column} BOOLEAN"),
        FieldKind::PositiveSmallInt => format!("{column} SMALLINT"),
        FieldKind::ForeignKey { .. } | FieldKind::ManyToMany { .. } => format!("{column} UUID"),
    };
    if field.required {
        def.push_str(" NOT NULL");
    }
    match field.default {
        Some(FieldDefault::Bool(b)) => def.push_str(if b { " DEFAULT TRUE" } else { " DEFAULT FALSE" }),
        Some(FieldDefault::Int(n)) => def.push_str(&format!(" DEFAULT {n}")),
        None => {}
    }
    if field.kind == FieldKind::PositiveSmallInt {
        def.push_str(&format!(" CHECK ({column} >= 0)"));
    }
    def
}

fn ordering_index(schema: &EntitySchema) -> Option<String> {
    if schema.ordering.is_empty() {
        return None;
    }
    Some(format!(
        "CREATE INDEX IF NOT EXISTS {table}_ordering_idx ON {table} (tenant_id, {order});\n",
        table = schema.table,
        order = order_by(schema),
    ))
}

fn link_table(schema: &EntitySchema, field: &FieldSchema, target: &str) -> String {
    let owner = schema.name.to_lowercase();
    let prefix = format!("{}_", schema.app_label);
    let other = target.strip_prefix(&prefix).unwrap_or(target);
    format!(
        "CREATE TABLE IF NOT EXISTS {table}_{field} (\n    \
         tenant_id UUID NOT NULL,\n    \
         {owner}_id UUID NOT NULL REFERENCES {table}(id) ON DELETE CASCADE,\n    \
         {other}_id UUID NOT NULL,\n    \
         PRIMARY KEY ({owner}_id, {other}_id)\n\
         );\n",
        table = schema.table,
        field = field.name,
    )
}
