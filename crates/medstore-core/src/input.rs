//! # Write Inputs
//!
//! Request bodies for creating and editing catalog entities, with the
//! normalization every write goes through before it reaches SQL.
//!
//! ## Conventions
//! - Text is trimmed; a blank optional field is stored as `NULL`.
//! - In a patch, an absent field is left alone and an empty string clears it.
//! - Item counters are never part of a patch.

use serde::Deserialize;
use ts_rs::TS;

use crate::barcode::validate_barcode;
use crate::error::ValidationError;
use crate::types::{BarcodeType, CategoryType, ItemLocation, LocationType, Role};
use crate::validation::{
    normalize_optional, validate_email, validate_name, validate_non_negative, validate_password,
    validate_username, ValidationResult,
};

// =============================================================================
// Items
// =============================================================================

/// How the barcode of an item gets decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BarcodeChoice {
    Existing(String),
    Generate,
}

fn barcode_choice(
    barcode_type: Option<BarcodeType>,
    barcode: Option<&str>,
) -> ValidationResult<Option<BarcodeChoice>> {
    let barcode = barcode.map(str::trim).filter(|b| !b.is_empty());
    match (barcode_type, barcode) {
        (Some(BarcodeType::Generate), _) => Ok(Some(BarcodeChoice::Generate)),
        (Some(BarcodeType::Existing), None) => Err(ValidationError::required("barcode")),
        (_, Some(code)) => Ok(Some(BarcodeChoice::Existing(validate_barcode(code)?))),
        (None, None) => Ok(None),
    }
}

fn normalize_location(location: ItemLocation) -> ValidationResult<ItemLocation> {
    let room_id = location.room_id.trim().to_string();
    if room_id.is_empty() {
        return Err(ValidationError::required("location.room"));
    }
    Ok(ItemLocation {
        room_id,
        rack_id: normalize_optional(location.rack_id),
        shelf_id: normalize_optional(location.shelf_id),
    })
}

/// Body of `POST /api/items`.
#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ItemDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    #[serde(default)]
    pub category_type: Option<CategoryType>,
    #[serde(default)]
    pub barcode_type: Option<BarcodeType>,
    #[serde(default)]
    pub barcode: Option<String>,
    pub location: ItemLocation,
    #[serde(default)]
    pub supplier: Option<String>,
    /// Initial stock, all of it available.
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub reorder_level: i64,
    #[serde(default)]
    pub unit_cost: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ItemDraft {
    /// Trims and checks every field.
    pub fn normalize(self) -> ValidationResult<Self> {
        validate_non_negative("quantity", self.quantity)?;
        validate_non_negative("reorderLevel", self.reorder_level)?;
        validate_non_negative("unitCost", self.unit_cost)?;

        Ok(ItemDraft {
            name: validate_name("name", &self.name)?,
            description: normalize_optional(self.description),
            category: validate_name("category", &self.category)?,
            category_type: self.category_type,
            barcode_type: self.barcode_type,
            barcode: self.barcode.map(|b| b.trim().to_string()),
            location: normalize_location(self.location)?,
            supplier: normalize_optional(self.supplier),
            quantity: self.quantity,
            reorder_level: self.reorder_level,
            unit_cost: self.unit_cost,
            notes: normalize_optional(self.notes),
        })
    }

    /// The barcode decision; no barcode and no type means generate.
    pub fn barcode_choice(&self) -> ValidationResult<BarcodeChoice> {
        Ok(barcode_choice(self.barcode_type, self.barcode.as_deref())?
            .unwrap_or(BarcodeChoice::Generate))
    }
}

/// Body of `PUT /api/items/{id}`.
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub category_type: Option<CategoryType>,
    #[serde(default)]
    pub barcode_type: Option<BarcodeType>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub location: Option<ItemLocation>,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub reorder_level: Option<i64>,
    #[serde(default)]
    pub unit_cost: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ItemPatch {
    /// Trims and checks the fields that are present.
    pub fn normalize(self) -> ValidationResult<Self> {
        if let Some(level) = self.reorder_level {
            validate_non_negative("reorderLevel", level)?;
        }
        if let Some(cost) = self.unit_cost {
            validate_non_negative("unitCost", cost)?;
        }

        Ok(ItemPatch {
            name: self.name.map(|n| validate_name("name", &n)).transpose()?,
            description: self.description.map(|d| d.trim().to_string()),
            category: self
                .category
                .map(|c| validate_name("category", &c))
                .transpose()?,
            category_type: self.category_type,
            barcode_type: self.barcode_type,
            barcode: self.barcode.map(|b| b.trim().to_string()),
            location: self.location.map(normalize_location).transpose()?,
            supplier: self.supplier.map(|s| s.trim().to_string()),
            reorder_level: self.reorder_level,
            unit_cost: self.unit_cost,
            notes: self.notes.map(|n| n.trim().to_string()),
        })
    }

    /// `None` keeps the current barcode.
    pub fn barcode_choice(&self) -> ValidationResult<Option<BarcodeChoice>> {
        barcode_choice(self.barcode_type, self.barcode.as_deref())
    }
}

/// Applies a patch value for a clearable text column.
///
/// ```rust
/// use medstore_core::input::patch_text;
///
/// let current = Some("old".to_string());
/// assert_eq!(patch_text(current.clone(), None), current);
/// assert_eq!(patch_text(current.clone(), Some(String::new())), None);
/// assert_eq!(patch_text(current, Some("new".to_string())), Some("new".to_string()));
/// ```
pub fn patch_text(current: Option<String>, patch: Option<String>) -> Option<String> {
    match patch {
        None => current,
        Some(value) => normalize_optional(Some(value)),
    }
}

// =============================================================================
// Locations
// =============================================================================

/// Body of `POST /api/locations`.
#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LocationDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub location_type: LocationType,
    #[serde(default)]
    pub parent: Option<String>,
}

impl LocationDraft {
    pub fn normalize(self) -> ValidationResult<Self> {
        Ok(LocationDraft {
            name: validate_name("name", &self.name)?,
            description: normalize_optional(self.description),
            location_type: self.location_type,
            parent: normalize_optional(self.parent),
        })
    }
}

/// Body of `PUT /api/locations/{id}`. Type and parent are fixed at creation.
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LocationPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl LocationPatch {
    pub fn normalize(self) -> ValidationResult<Self> {
        Ok(LocationPatch {
            name: self.name.map(|n| validate_name("name", &n)).transpose()?,
            description: self.description,
        })
    }
}

// =============================================================================
// Suppliers
// =============================================================================

/// Body of `POST /api/suppliers` and `PUT /api/suppliers/{id}`.
///
/// On update every field is optional; an empty string clears.
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SupplierInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SupplierInput {
    /// Checks a supplier about to be created; `name` is required.
    pub fn normalize_new(self) -> ValidationResult<Self> {
        let name = self.name.clone().unwrap_or_default();
        let mut input = self.normalize_patch()?;
        input.name = Some(validate_name("name", &name)?);
        Ok(input)
    }

    /// Checks the fields of an update that are present.
    pub fn normalize_patch(self) -> ValidationResult<Self> {
        let email = self.email.map(|e| e.trim().to_string());
        if let Some(email) = email.as_deref().filter(|e| !e.is_empty()) {
            validate_email(email)?;
        }
        Ok(SupplierInput {
            name: self.name.map(|n| validate_name("name", &n)).transpose()?,
            contact_person: self.contact_person.map(|v| v.trim().to_string()),
            email,
            phone: self.phone.map(|v| v.trim().to_string()),
            address: self.address.map(|v| v.trim().to_string()),
            website: self.website.map(|v| v.trim().to_string()),
            notes: self.notes.map(|v| v.trim().to_string()),
        })
    }
}

// =============================================================================
// Users
// =============================================================================

/// Body of `POST /api/users`.
#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UserDraft {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Role,
}

impl UserDraft {
    pub fn normalize(self) -> ValidationResult<Self> {
        validate_password(&self.password)?;
        let email = normalize_optional(self.email);
        if let Some(email) = email.as_deref() {
            validate_email(email)?;
        }
        Ok(UserDraft {
            username: validate_username(&self.username)?,
            password: self.password,
            email,
            full_name: normalize_optional(self.full_name),
            role: self.role,
        })
    }
}

/// Body of `PUT /api/users/{id}`.
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl UserPatch {
    pub fn normalize(self) -> ValidationResult<Self> {
        let email = self.email.map(|e| e.trim().to_string());
        if let Some(email) = email.as_deref().filter(|e| !e.is_empty()) {
            validate_email(email)?;
        }
        Ok(UserPatch {
            email,
            full_name: self.full_name.map(|n| n.trim().to_string()),
            role: self.role,
            is_active: self.is_active,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
