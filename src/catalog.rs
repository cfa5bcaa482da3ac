use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::FieldId;

/// Category a shareable data field belongs to.
///
/// Closed enumeration; the wire representation is lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldCategory {
    Basic,
    Contact,
    Personal,
    Professional,
}

impl FieldCategory {
    /// All categories, in presentation order.
    pub const ALL: [FieldCategory; 4] = [
        FieldCategory::Basic,
        FieldCategory::Contact,
        FieldCategory::Personal,
        FieldCategory::Professional,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Contact => "contact",
            Self::Personal => "personal",
            Self::Professional => "professional",
        }
    }

    /// Human-readable group title for consent prompts.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Basic => "Basic Information",
            Self::Contact => "Contact Details",
            Self::Personal => "Personal Information",
            Self::Professional => "Professional Information",
        }
    }
}

impl std::fmt::Display for FieldCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of shareable personal information.
///
/// Immutable, defined by the [`FieldCatalog`]; not created or destroyed at
/// runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataField {
    pub id: FieldId,
    pub label: String,
    pub description: String,
    pub required: bool,
    pub category: FieldCategory,
}

impl DataField {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
        required: bool,
        category: FieldCategory,
    ) -> Self {
        Self {
            id: FieldId::new(id),
            label: label.into(),
            description: description.into(),
            required,
            category,
        }
    }
}

/// Static registry of shareable data-field definitions.
///
/// Loaded once at process start and never mutated. All lookups are pure;
/// iteration order is the declaration order of the field table.
#[derive(Debug, Clone)]
pub struct FieldCatalog {
    fields: Vec<DataField>,
}

impl FieldCatalog {
    /// Build a catalog from a custom field table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if two fields share an id.
    pub fn new(fields: Vec<DataField>) -> Result<Self, Error> {
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.id.clone()) {
                return Err(Error::Config(format!(
                    "duplicate field id in catalog: {}",
                    field.id
                )));
            }
        }
        Ok(Self { fields })
    }

    /// The standard vault field table: nine fields across the four
    /// categories, with full name and email address mandatory.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            fields: vec![
                DataField::new(
                    "name",
                    "Full Name",
                    "First and last name",
                    true,
                    FieldCategory::Basic,
                ),
                DataField::new(
                    "email",
                    "Email Address",
                    "Primary email contact",
                    true,
                    FieldCategory::Contact,
                ),
                DataField::new(
                    "phone",
                    "Mobile Number",
                    "Phone number for contact",
                    false,
                    FieldCategory::Contact,
                ),
                DataField::new(
                    "address",
                    "Residential Address",
                    "Full home address",
                    false,
                    FieldCategory::Contact,
                ),
                DataField::new(
                    "dateOfBirth",
                    "Date of Birth",
                    "Birth date for age verification",
                    false,
                    FieldCategory::Personal,
                ),
                DataField::new(
                    "maritalStatus",
                    "Marital Status",
                    "Current marital status",
                    false,
                    FieldCategory::Personal,
                ),
                DataField::new(
                    "jobPosition",
                    "Job Position",
                    "Current employment title",
                    false,
                    FieldCategory::Professional,
                ),
                DataField::new(
                    "employer",
                    "Employer",
                    "Current company/organization",
                    false,
                    FieldCategory::Professional,
                ),
                DataField::new(
                    "income",
                    "Annual Income",
                    "Yearly income information",
                    false,
                    FieldCategory::Professional,
                ),
            ],
        }
    }

    /// All fields, in stable declaration order.
    #[must_use]
    pub fn fields(&self) -> &[DataField] {
        &self.fields
    }

    /// Fields belonging to one category, in declaration order.
    pub fn fields_by_category(
        &self,
        category: FieldCategory,
    ) -> impl Iterator<Item = &DataField> {
        self.fields.iter().filter(move |f| f.category == category)
    }

    /// The subset of fields the relying party cannot proceed without.
    pub fn required_fields(&self) -> impl Iterator<Item = &DataField> {
        self.fields.iter().filter(|f| f.required)
    }

    /// Look up a field definition by id.
    #[must_use]
    pub fn get(&self, id: &FieldId) -> Option<&DataField> {
        self.fields.iter().find(|f| &f.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &FieldId) -> bool {
        self.get(id).is_some()
    }

    /// All field ids, in declaration order.
    #[must_use]
    pub fn field_ids(&self) -> Vec<FieldId> {
        self.fields.iter().map(|f| f.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_shape() {
        let catalog = FieldCatalog::standard();
        assert_eq!(catalog.fields().len(), 9);

        let required: Vec<_> = catalog
            .required_fields()
            .map(|f| f.id.as_str().to_string())
            .collect();
        assert_eq!(required, ["name", "email"]);
    }

    #[test]
    fn stable_iteration_order() {
        let catalog = FieldCatalog::standard();
        let first_pass: Vec<_> = catalog.field_ids();
        let second_pass: Vec<_> = catalog.field_ids();
        assert_eq!(first_pass, second_pass);
        assert_eq!(first_pass[0].as_str(), "name");
        assert_eq!(first_pass[8].as_str(), "income");
    }

    #[test]
    fn category_grouping() {
        let catalog = FieldCatalog::standard();
        let contact: Vec<_> = catalog
            .fields_by_category(FieldCategory::Contact)
            .map(|f| f.id.as_str().to_string())
            .collect();
        assert_eq!(contact, ["email", "phone", "address"]);

        let basic: Vec<_> = catalog
            .fields_by_category(FieldCategory::Basic)
            .collect();
        assert_eq!(basic.len(), 1);
        assert!(basic[0].required);
    }

    #[test]
    fn lookup_by_id() {
        let catalog = FieldCatalog::standard();
        assert!(catalog.contains(&FieldId::new("income")));
        assert!(!catalog.contains(&FieldId::new("not-a-real-field")));

        let email = catalog.get(&FieldId::new("email")).unwrap();
        assert_eq!(email.label, "Email Address");
        assert_eq!(email.category, FieldCategory::Contact);
    }

    #[test]
    fn duplicate_ids_rejected() {
        let fields = vec![
            DataField::new("name", "Full Name", "", true, FieldCategory::Basic),
            DataField::new("name", "Name Again", "", false, FieldCategory::Basic),
        ];
        assert!(matches!(
            FieldCatalog::new(fields),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn category_serde_is_lowercase() {
        let json = serde_json::to_string(&FieldCategory::Professional).unwrap();
        assert_eq!(json, "\"professional\"");
        let parsed: FieldCategory = serde_json::from_str("\"contact\"").unwrap();
        assert_eq!(parsed, FieldCategory::Contact);
    }
}
