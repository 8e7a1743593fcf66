use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{generate_id, Id};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddressType {
    Primary,
    Billing,
    Service,
}

impl AddressType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressType::Primary => "PRIMARY",
            AddressType::Billing => "BILLING",
            AddressType::Service => "SERVICE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PRIMARY" => Some(AddressType::Primary),
            "BILLING" => Some(AddressType::Billing),
            "SERVICE" => Some(AddressType::Service),
            _ => None,
        }
    }
}

/// A persisted customer address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub id: Id,
    pub customer_id: Id,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    #[serde(rename = "type")]
    pub address_type: AddressType,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

impl Address {
    pub fn key(&self) -> AddressKey {
        AddressKey::new(&self.street, &self.city, &self.state, &self.zip)
    }

    /// Copy of the address fields as creation input, retyped
    pub fn to_new_address(&self, address_type: AddressType) -> NewAddress {
        NewAddress {
            street: self.street.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            zip: self.zip.clone(),
            address_type,
            is_primary: None,
        }
    }
}

/// Address input model for creation (id and timestamps are set server-side)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    #[serde(rename = "type")]
    pub address_type: AddressType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_primary: Option<bool>,
}

impl NewAddress {
    pub fn new(
        street: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        zip: impl Into<String>,
        address_type: AddressType,
    ) -> Self {
        Self {
            street: street.into(),
            city: city.into(),
            state: state.into(),
            zip: zip.into(),
            address_type,
            is_primary: None,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.is_primary
            .unwrap_or(self.address_type == AddressType::Primary)
    }

    pub fn key(&self) -> AddressKey {
        AddressKey::new(&self.street, &self.city, &self.state, &self.zip)
    }

    pub fn into_address(self, customer_id: &Id) -> Address {
        let is_primary = self.is_primary();
        Address {
            id: generate_id(),
            customer_id: customer_id.clone(),
            street: self.street,
            city: self.city,
            state: self.state,
            zip: self.zip,
            address_type: self.address_type,
            is_primary,
            created_at: Utc::now(),
        }
    }
}

/// Normalized comparison tuple. Street, city and state are trimmed and
/// lower-cased; postal codes are only trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressKey {
    street: String,
    city: String,
    state: String,
    zip: String,
}

impl AddressKey {
    pub fn new(street: &str, city: &str, state: &str, zip: &str) -> Self {
        Self {
            street: street.trim().to_lowercase(),
            city: city.trim().to_lowercase(),
            state: state.trim().to_lowercase(),
            zip: zip.trim().to_string(),
        }
    }
}

/// Identifier of an address that only exists in form state
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftId(String);

impl DraftId {
    pub fn generate() -> Self {
        Self(generate_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DraftId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PendingOrigin {
    /// Staged by "use same as primary address"
    SameAsPrimary,
    /// Entered through "add new address"
    UserEntered,
}

/// An address held in form state until the owning record is submitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAddress {
    pub draft_id: DraftId,
    pub customer_id: Id,
    pub origin: PendingOrigin,
    pub address: NewAddress,
}

impl PendingAddress {
    pub fn new(customer_id: &Id, origin: PendingOrigin, address: NewAddress) -> Self {
        Self {
            draft_id: DraftId::generate(),
            customer_id: customer_id.clone(),
            origin,
            address,
        }
    }
}

/// Reference from a dependent record to its address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AddressRef {
    Persisted { id: Id },
    Pending { draft_id: DraftId },
}

impl AddressRef {
    pub fn persisted(id: impl Into<Id>) -> Self {
        AddressRef::Persisted { id: id.into() }
    }

    pub fn pending(draft_id: DraftId) -> Self {
        AddressRef::Pending { draft_id }
    }

    pub fn draft_id(&self) -> Option<&DraftId> {
        match self {
            AddressRef::Pending { draft_id } => Some(draft_id),
            AddressRef::Persisted { .. } => None,
        }
    }
}
