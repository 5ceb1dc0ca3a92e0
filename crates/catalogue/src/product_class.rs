use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Aggregate, AggregateRoot, DomainError, TenantId};
use storefront_events::{Event, TenantScoped};

use crate::ids::{OptionId, ProductClassId};
use crate::schema::{
    CatalogueRecord, EntitySchema, FieldDefault, FieldKind, FieldSchema, OrderTerm,
};
use crate::slug::Slug;

/// Stream type recorded on every product class event.
pub const PRODUCT_CLASS_AGGREGATE_TYPE: &str = "catalogue.product_class";

pub const NAME_MAX_LEN: usize = 128;

/// Aggregate root: ProductClass.
///
/// Groups products that share options and attributes (e.g. Books, DVDs,
/// Toys). A product belongs to exactly one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductClass {
    id: ProductClassId,
    tenant_id: Option<TenantId>,
    name: String,
    slug: Option<Slug>,
    requires_shipping: bool,
    options: BTreeSet<OptionId>,
    version: u64,
    created: bool,
}

impl ProductClass {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductClassId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            slug: None,
            requires_shipping: true,
            options: BTreeSet::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductClassId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `None` until the class has been created.
    pub fn slug(&self) -> Option<&Slug> {
        self.slug.as_ref()
    }

    /// Digital goods skip shipping steps at checkout.
    pub fn requires_shipping(&self) -> bool {
        self.requires_shipping
    }

    pub fn options(&self) -> &BTreeSet<OptionId> {
        &self.options
    }

    pub fn is_created(&self) -> bool {
        self.created
    }
}

impl core::fmt::Display for ProductClass {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name)
    }
}

impl AggregateRoot for ProductClass {
    type Id = ProductClassId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

static PRODUCT_CLASS_FIELDS: &[FieldSchema] = &[
    FieldSchema::new("id", "ID", FieldKind::Id),
    FieldSchema::new("name", "Name", FieldKind::Text { max_len: NAME_MAX_LEN }),
    FieldSchema::new("slug", "Slug", FieldKind::Slug { max_len: Slug::MAX_LEN }).unique(),
    FieldSchema::new("requires_shipping", "Requires shipping?", FieldKind::Bool)
        .default(FieldDefault::Bool(true)),
    FieldSchema::new("options", "Options", FieldKind::ManyToMany { target: "catalogue_option" })
        .optional(),
];

static PRODUCT_CLASS_SCHEMA: EntitySchema = EntitySchema {
    name: "ProductClass",
    app_label: "catalogue",
    table: "catalogue_productclass",
    verbose_name: "Product class",
    verbose_name_plural: "Product classes",
    fields: PRODUCT_CLASS_FIELDS,
    ordering: &[OrderTerm::Asc("name")],
    unique_together: &[],
};

/// Sort key shared by the aggregate and its read models: name, then slug and
/// id so equal names still order deterministically.
pub fn product_class_sort_key(name: &str, slug: Option<&Slug>, id: ProductClassId) -> (String, String, ProductClassId) {
    (
        name.to_string(),
        slug.map(|s| s.as_str().to_string()).unwrap_or_default(),
        id,
    )
}

/// Schema descriptor for product classes.
pub fn product_class_schema() -> &'static EntitySchema {
    &PRODUCT_CLASS_SCHEMA
}

impl CatalogueRecord for ProductClass {
    type SortKey = (String, String, ProductClassId);

    fn schema() -> &'static EntitySchema {
        product_class_schema()
    }

    fn sort_key(&self) -> Self::SortKey {
        product_class_sort_key(&self.name, self.slug.as_ref(), self.id)
    }
}

/// Command: CreateProductClass.
///
/// The slug is resolved (validated or derived, and checked for uniqueness)
/// before the command reaches the aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProductClass {
    pub tenant_id: TenantId,
    pub product_class_id: ProductClassId,
    pub name: String,
    pub slug: Slug,
    /// Defaults to `true` when unspecified.
    pub requires_shipping: Option<bool>,
    #[serde(default)]
    pub options: BTreeSet<OptionId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RenameProductClass. The slug is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameProductClass {
    pub tenant_id: TenantId,
    pub product_class_id: ProductClassId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetShippingRequirement {
    pub tenant_id: TenantId,
    pub product_class_id: ProductClassId,
    pub requires_shipping: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddProductClassOption {
    pub tenant_id: TenantId,
    pub product_class_id: ProductClassId,
    pub option_id: OptionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveProductClassOption {
    pub tenant_id: TenantId,
    pub product_class_id: ProductClassId,
    pub option_id: OptionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductClassCommand {
    CreateProductClass(CreateProductClass),
    RenameProductClass(RenameProductClass),
    SetShippingRequirement(SetShippingRequirement),
    AddProductClassOption(AddProductClassOption),
    RemoveProductClassOption(RemoveProductClassOption),
}

impl ProductClassCommand {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            ProductClassCommand::CreateProductClass(c) => c.tenant_id,
            ProductClassCommand::RenameProductClass(c) => c.tenant_id,
            ProductClassCommand::SetShippingRequirement(c) => c.tenant_id,
            ProductClassCommand::AddProductClassOption(c) => c.tenant_id,
            ProductClassCommand::RemoveProductClassOption(c) => c.tenant_id,
        }
    }

    pub fn product_class_id(&self) -> ProductClassId {
        match self {
            ProductClassCommand::CreateProductClass(c) => c.product_class_id,
            ProductClassCommand::RenameProductClass(c) => c.product_class_id,
            ProductClassCommand::SetShippingRequirement(c) => c.product_class_id,
            ProductClassCommand::AddProductClassOption(c) => c.product_class_id,
            ProductClassCommand::RemoveProductClassOption(c) => c.product_class_id,
        }
    }
}

/// Event: ProductClassCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductClassCreated {
    pub tenant_id: TenantId,
    pub product_class_id: ProductClassId,
    pub name: String,
    pub slug: Slug,
    pub requires_shipping: bool,
    pub options: BTreeSet<OptionId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductClassRenamed {
    pub tenant_id: TenantId,
    pub product_class_id: ProductClassId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingRequirementChanged {
    pub tenant_id: TenantId,
    pub product_class_id: ProductClassId,
    pub requires_shipping: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductClassOptionAdded {
    pub tenant_id: TenantId,
    pub product_class_id: ProductClassId,
    pub option_id: OptionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductClassOptionRemoved {
    pub tenant_id: TenantId,
    pub product_class_id: ProductClassId,
    pub option_id: OptionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductClassEvent {
    ProductClassCreated(ProductClassCreated),
    ProductClassRenamed(ProductClassRenamed),
    ShippingRequirementChanged(ShippingRequirementChanged),
    ProductClassOptionAdded(ProductClassOptionAdded),
    ProductClassOptionRemoved(ProductClassOptionRemoved),
}

impl ProductClassEvent {
    pub fn product_class_id(&self) -> ProductClassId {
        match self {
            ProductClassEvent::ProductClassCreated(e) => e.product_class_id,
            ProductClassEvent::ProductClassRenamed(e) => e.product_class_id,
            ProductClassEvent::ShippingRequirementChanged(e) => e.product_class_id,
            ProductClassEvent::ProductClassOptionAdded(e) => e.product_class_id,
            ProductClassEvent::ProductClassOptionRemoved(e) => e.product_class_id,
        }
    }
}

impl TenantScoped for ProductClassEvent {
    fn tenant_id(&self) -> TenantId {
        match self {
            ProductClassEvent::ProductClassCreated(e) => e.tenant_id,
            ProductClassEvent::ProductClassRenamed(e) => e.tenant_id,
            ProductClassEvent::ShippingRequirementChanged(e) => e.tenant_id,
            ProductClassEvent::ProductClassOptionAdded(e) => e.tenant_id,
            ProductClassEvent::ProductClassOptionRemoved(e) => e.tenant_id,
        }
    }
}

impl Event for ProductClassEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductClassEvent::ProductClassCreated(_) => "catalogue.product_class.created",
            ProductClassEvent::ProductClassRenamed(_) => "catalogue.product_class.renamed",
            ProductClassEvent::ShippingRequirementChanged(_) => {
                "catalogue.product_class.shipping_requirement_changed"
            }
            ProductClassEvent::ProductClassOptionAdded(_) => "catalogue.product_class.option_added",
            ProductClassEvent::ProductClassOptionRemoved(_) => {
                "catalogue.product_class.option_removed"
            }
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductClassEvent::ProductClassCreated(e) => e.occurred_at,
            ProductClassEvent::ProductClassRenamed(e) => e.occurred_at,
            ProductClassEvent::ShippingRequirementChanged(e) => e.occurred_at,
            ProductClassEvent::ProductClassOptionAdded(e) => e.occurred_at,
            ProductClassEvent::ProductClassOptionRemoved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ProductClass {
    type Command = ProductClassCommand;
    type Event = ProductClassEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductClassEvent::ProductClassCreated(e) => {
                self.id = e.product_class_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.slug = Some(e.slug.clone());
                self.requires_shipping = e.requires_shipping;
                self.options = e.options.clone();
                self.created = true;
            }
            ProductClassEvent::ProductClassRenamed(e) => {
                self.name = e.name.clone();
            }
            ProductClassEvent::ShippingRequirementChanged(e) => {
                self.requires_shipping = e.requires_shipping;
            }
            ProductClassEvent::ProductClassOptionAdded(e) => {
                self.options.insert(e.option_id);
            }
            ProductClassEvent::ProductClassOptionRemoved(e) => {
                self.options.remove(&e.option_id);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductClassCommand::CreateProductClass(cmd) => self.handle_create(cmd),
            ProductClassCommand::RenameProductClass(cmd) => self.handle_rename(cmd),
            ProductClassCommand::SetShippingRequirement(cmd) => self.handle_set_shipping(cmd),
            ProductClassCommand::AddProductClassOption(cmd) => self.handle_add_option(cmd),
            ProductClassCommand::RemoveProductClassOption(cmd) => self.handle_remove_option(cmd),
        }
    }
}

fn validate_name(name: &str) -> Result<String, DomainError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    if trimmed.chars().count() > NAME_MAX_LEN {
        return Err(DomainError::validation(format!(
            "name exceeds {NAME_MAX_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

impl ProductClass {
    fn ensure_existing(
        &self,
        tenant_id: TenantId,
        product_class_id: ProductClassId,
    ) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != product_class_id {
            return Err(DomainError::invariant("product_class_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProductClass) -> Result<Vec<ProductClassEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product class already exists"));
        }
        let name = validate_name(&cmd.name)?;

        // Slug uniqueness spans every class of the tenant, so it is checked
        // against the read model before dispatch, not here.
        Ok(vec![ProductClassEvent::ProductClassCreated(ProductClassCreated {
            tenant_id: cmd.tenant_id,
            product_class_id: cmd.product_class_id,
            name,
            slug: cmd.slug.clone(),
            requires_shipping: cmd.requires_shipping.unwrap_or(true),
            options: cmd.options.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_rename(&self, cmd: &RenameProductClass) -> Result<Vec<ProductClassEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.product_class_id)?;
        let name = validate_name(&cmd.name)?;
        if name == self.name {
            return Err(DomainError::conflict("product class already has this name"));
        }

        Ok(vec![ProductClassEvent::ProductClassRenamed(ProductClassRenamed {
            tenant_id: cmd.tenant_id,
            product_class_id: cmd.product_class_id,
            name,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_shipping(
        &self,
        cmd: &SetShippingRequirement,
    ) -> Result<Vec<ProductClassEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.product_class_id)?;
        if cmd.requires_shipping == self.requires_shipping {
            return Err(DomainError::conflict(format!(
                "requires_shipping is already {}",
                self.requires_shipping
            )));
        }

        Ok(vec![ProductClassEvent::ShippingRequirementChanged(
            ShippingRequirementChanged {
                tenant_id: cmd.tenant_id,
                product_class_id: cmd.product_class_id,
                requires_shipping: cmd.requires_shipping,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_add_option(
        &self,
        cmd: &AddProductClassOption,
    ) -> Result<Vec<ProductClassEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.product_class_id)?;
        if self.options.contains(&cmd.option_id) {
            return Err(DomainError::conflict(format!(
                "option {} is already attached",
                cmd.option_id
            )));
        }

        Ok(vec![ProductClassEvent::ProductClassOptionAdded(ProductClassOptionAdded {
            tenant_id: cmd.tenant_id,
            product_class_id: cmd.product_class_id,
            option_id: cmd.option_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_option(
        &self,
        cmd: &RemoveProductClassOption,
    ) -> Result<Vec<ProductClassEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.product_class_id)?;
        if !self.options.contains(&cmd.option_id) {
            return Err(DomainError::not_found());
        }

        Ok(vec![ProductClassEvent::ProductClassOptionRemoved(ProductClassOptionRemoved {
            tenant_id: cmd.tenant_id,
            product_class_id: cmd.product_class_id,
            option_id: cmd.option_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::AggregateId;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_class_id() -> ProductClassId {
        ProductClassId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn create_cmd(tenant_id: TenantId, product_class_id: ProductClassId, name: &str) -> CreateProductClass {
        CreateProductClass {
            tenant_id,
            product_class_id,
            name: name.to_string(),
            slug: Slug::unique_from(name, |_| false).unwrap(),
            requires_shipping: None,
            options: BTreeSet::new(),
            occurred_at: test_time(),
        }
    }

    fn created(tenant_id: TenantId, product_class_id: ProductClassId, name: &str) -> ProductClass {
        let mut class = ProductClass::empty(product_class_id);
        let cmd = create_cmd(tenant_id, product_class_id, name);
        let events = class
            .handle(&ProductClassCommand::CreateProductClass(cmd))
            .unwrap();
        class.apply(&events[0]);
        class
    }

    #[test]
    fn create_emits_created_event_with_shipping_default() {
        let tenant_id = test_tenant_id();
        let product_class_id = test_class_id();
        let class = ProductClass::empty(product_class_id);

        let events = class
            .handle(&ProductClassCommand::CreateProductClass(create_cmd(
                tenant_id,
                product_class_id,
                "Books",
            )))
            .unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            ProductClassEvent::ProductClassCreated(e) => {
                assert_eq!(e.tenant_id, tenant_id);
                assert_eq!(e.product_class_id, product_class_id);
                assert_eq!(e.name, "Books");
                assert_eq!(e.slug.as_str(), "books");
                assert!(e.requires_shipping);
                assert!(e.options.is_empty());
            }
            _ => panic!("Expected ProductClassCreated event"),
        }
    }

    #[test]
    fn create_honours_explicit_shipping_flag_and_options() {
        let product_class_id = test_class_id();
        let class = ProductClass::empty(product_class_id);
        let option = OptionId::new();
        let mut cmd = create_cmd(test_tenant_id(), product_class_id, "E-books");
        cmd.requires_shipping = Some(false);
        cmd.options.insert(option);

        let events = class
            .handle(&ProductClassCommand::CreateProductClass(cmd))
            .unwrap();
        let mut class = class;
        class.apply(&events[0]);

        assert!(!class.requires_shipping());
        assert!(class.options().contains(&option));
    }

    #[test]
    fn create_trims_name() {
        let class = created(test_tenant_id(), test_class_id(), "  Toys  ");
        assert_eq!(class.name(), "Toys");
        assert_eq!(class.to_string(), "Toys");
    }

    #[test]
    fn create_rejects_blank_name() {
        let class = ProductClass::empty(test_class_id());
        let mut cmd = create_cmd(test_tenant_id(), test_class_id(), "Books");
        cmd.name = "   ".to_string();

        let err = class
            .handle(&ProductClassCommand::CreateProductClass(cmd))
            .unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for blank name"),
        }
    }

    #[test]
    fn create_rejects_overlong_name() {
        let class = ProductClass::empty(test_class_id());
        let mut cmd = create_cmd(test_tenant_id(), test_class_id(), "Books");
        cmd.name = "x".repeat(NAME_MAX_LEN + 1);

        let err = class
            .handle(&ProductClassCommand::CreateProductClass(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn create_rejects_duplicate_creation() {
        let tenant_id = test_tenant_id();
        let product_class_id = test_class_id();
        let class = created(tenant_id, product_class_id, "Books");

        let err = class
            .handle(&ProductClassCommand::CreateProductClass(create_cmd(
                tenant_id,
                product_class_id,
                "Books",
            )))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn rename_keeps_slug() {
        let tenant_id = test_tenant_id();
        let product_class_id = test_class_id();
        let mut class = created(tenant_id, product_class_id, "Books");

        let events = class
            .handle(&ProductClassCommand::RenameProductClass(RenameProductClass {
                tenant_id,
                product_class_id,
                name: "Printed Books".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap();
        class.apply(&events[0]);

        assert_eq!(class.name(), "Printed Books");
        assert_eq!(class.slug().map(Slug::as_str), Some("books"));
    }

    #[test]
    fn rename_to_same_name_is_conflict() {
        let tenant_id = test_tenant_id();
        let product_class_id = test_class_id();
        let class = created(tenant_id, product_class_id, "Books");

        let err = class
            .handle(&ProductClassCommand::RenameProductClass(RenameProductClass {
                tenant_id,
                product_class_id,
                name: " Books ".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn set_shipping_toggles_flag() {
        let tenant_id = test_tenant_id();
        let product_class_id = test_class_id();
        let mut class = created(tenant_id, product_class_id, "Software");
        assert!(class.requires_shipping());

        let cmd = SetShippingRequirement {
            tenant_id,
            product_class_id,
            requires_shipping: false,
            occurred_at: test_time(),
        };
        let events = class
            .handle(&ProductClassCommand::SetShippingRequirement(cmd.clone()))
            .unwrap();
        class.apply(&events[0]);
        assert!(!class.requires_shipping());

        let err = class
            .handle(&ProductClassCommand::SetShippingRequirement(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn options_add_and_remove() {
        let tenant_id = test_tenant_id();
        let product_class_id = test_class_id();
        let mut class = created(tenant_id, product_class_id, "Clothing");
        let option_id = OptionId::new();

        let add = AddProductClassOption {
            tenant_id,
            product_class_id,
            option_id,
            occurred_at: test_time(),
        };
        let events = class
            .handle(&ProductClassCommand::AddProductClassOption(add.clone()))
            .unwrap();
        class.apply(&events[0]);
        assert!(class.options().contains(&option_id));

        let err = class
            .handle(&ProductClassCommand::AddProductClassOption(add))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let remove = RemoveProductClassOption {
            tenant_id,
            product_class_id,
            option_id,
            occurred_at: test_time(),
        };
        let events = class
            .handle(&ProductClassCommand::RemoveProductClassOption(remove.clone()))
            .unwrap();
        class.apply(&events[0]);
        assert!(class.options().is_empty());

        let err = class
            .handle(&ProductClassCommand::RemoveProductClassOption(remove))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn commands_on_missing_class_are_not_found() {
        let class = ProductClass::empty(test_class_id());
        let err = class
            .handle(&ProductClassCommand::RenameProductClass(RenameProductClass {
                tenant_id: test_tenant_id(),
                product_class_id: class.id_typed(),
                name: "Anything".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn commands_from_other_tenant_are_rejected() {
        let product_class_id = test_class_id();
        let class = created(test_tenant_id(), product_class_id, "Books");

        let err = class
            .handle(&ProductClassCommand::SetShippingRequirement(SetShippingRequirement {
                tenant_id: test_tenant_id(),
                product_class_id,
                requires_shipping: false,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn version_increments_on_apply() {
        let tenant_id = test_tenant_id();
        let product_class_id = test_class_id();
        let mut class = created(tenant_id, product_class_id, "Books");
        assert_eq!(class.version(), 1);

        let events = class
            .handle(&ProductClassCommand::RenameProductClass(RenameProductClass {
                tenant_id,
                product_class_id,
                name: "Novels".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap();
        class.apply(&events[0]);
        assert_eq!(class.version(), 2);
    }

    #[test]
    fn schema_declares_unique_slug_and_shipping_default() {
        let schema = ProductClass::schema();
        assert_eq!(schema.verbose_name_plural, "Product classes");
        assert_eq!(schema.ordering, &[OrderTerm::Asc("name")]);
        assert!(schema.field("slug").unwrap().unique);
        assert_eq!(
            schema.field("requires_shipping").unwrap().default,
            Some(FieldDefault::Bool(true))
        );
        assert!(!schema.field("options").unwrap().required);
    }

    #[test]
    fn sorts_by_name() {
        let tenant_id = test_tenant_id();
        let mut classes = vec![
            created(tenant_id, test_class_id(), "Toys"),
            created(tenant_id, test_class_id(), "Books"),
            created(tenant_id, test_class_id(), "DVDs"),
        ];
        crate::schema::sort_records(&mut classes);
        let names: Vec<&str> = classes.iter().map(ProductClass::name).collect();
        assert_eq!(names, vec!["Books", "DVDs", "Toys"]);
    }

    #[test]
    fn event_serializes_and_deserializes() {
        let tenant_id = test_tenant_id();
        let product_class_id = test_class_id();
        let class = ProductClass::empty(product_class_id);
        let events = class
            .handle(&ProductClassCommand::CreateProductClass(create_cmd(
                tenant_id,
                product_class_id,
                "Books",
            )))
            .unwrap();

        let json = serde_json::to_value(&events[0]).unwrap();
        let back: ProductClassEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, events[0]);
        assert_eq!(back.event_type(), "catalogue.product_class.created");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: handle never mutates the aggregate.
            #[test]
            fn handle_is_pure(name in "[A-Za-z][A-Za-z0-9 ]{0,60}") {
                let tenant_id = test_tenant_id();
                let product_class_id = test_class_id();
                let class = created(tenant_id, product_class_id, "Seed");
                let before = class.clone();

                let cmd = ProductClassCommand::RenameProductClass(RenameProductClass {
                    tenant_id,
                    product_class_id,
                    name,
                    occurred_at: Utc::now(),
                });
                let first = class.handle(&cmd);
                let second = class.handle(&cmd);

                prop_assert_eq!(&before, &class);
                prop_assert_eq!(first, second);
            }

            /// Property: replaying the same events yields the same state.
            #[test]
            fn apply_is_deterministic(
                name in "[A-Za-z][A-Za-z0-9 ]{0,60}",
                shipping in any::<bool>()
            ) {
                let tenant_id = test_tenant_id();
                let product_class_id = test_class_id();
                let option_id = OptionId::new();
                let events = vec![
                    ProductClassEvent::ProductClassCreated(ProductClassCreated {
                        tenant_id,
                        product_class_id,
                        name: name.clone(),
                        slug: Slug::unique_from(&name, |_| false).unwrap(),
                        requires_shipping: shipping,
                        options: BTreeSet::new(),
                        occurred_at: Utc::now(),
                    }),
                    ProductClassEvent::ProductClassOptionAdded(ProductClassOptionAdded {
                        tenant_id,
                        product_class_id,
                        option_id,
                        occurred_at: Utc::now(),
                    }),
                ];

                let mut a = ProductClass::empty(product_class_id);
                let mut b = ProductClass::empty(product_class_id);
                for e in &events {
                    a.apply(e);
                    b.apply(e);
                }
                prop_assert_eq!(&a, &b);
                prop_assert_eq!(a.version(), 2);
                prop_assert_eq!(a.requires_shipping(), shipping);
            }
        }
    }
}
