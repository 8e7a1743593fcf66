use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{generate_id, Id, NewAddress};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Id,
    pub tenant_id: Id,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Customer input model; addresses listed here are created together with the customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub addresses: Vec<NewAddress>,
}

impl NewCustomer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: None,
            phone: None,
            company_name: None,
            addresses: Vec::new(),
        }
    }

    pub fn with_address(mut self, address: NewAddress) -> Self {
        self.addresses.push(address);
        self
    }

    /// Convert to a full Customer with server-generated fields
    pub fn into_customer(self, tenant_id: &Id) -> Customer {
        Customer {
            id: generate_id(),
            tenant_id: tenant_id.clone(),
            name: self.name.trim().to_string(),
            email: self.email,
            phone: self.phone,
            company_name: self.company_name,
            created_at: Utc::now(),
        }
    }
}

/// Query parameters for listing customers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerFilter {
    /// Case-insensitive substring match on name, email or company
    pub search: Option<String>,
}

impl CustomerFilter {
    pub fn matches(&self, customer: &Customer) -> bool {
        let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return true;
        };
        let needle = search.to_lowercase();
        [
            Some(customer.name.as_str()),
            customer.email.as_deref(),
            customer.company_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}
