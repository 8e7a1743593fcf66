use serde::{Deserialize, Serialize};

use crate::model::{AddressRef, Id};

/// Form state of a dependent record (estimate, job, service request).
/// The address may still point at a pending address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDraft<B> {
    pub customer_id: Id,
    #[serde(default)]
    pub address: Option<AddressRef>,
    #[serde(flatten)]
    pub body: B,
}

impl<B> RecordDraft<B> {
    pub fn new(customer_id: impl Into<Id>, address: Option<AddressRef>, body: B) -> Self {
        Self {
            customer_id: customer_id.into(),
            address,
            body,
        }
    }

    /// Resolve into a payload using the durable address id
    pub fn into_payload(self, address_id: Option<Id>) -> RecordPayload<B> {
        RecordPayload {
            customer_id: self.customer_id,
            address_id,
            body: self.body,
        }
    }
}

/// What is handed to persistence: only durable address ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPayload<B> {
    pub customer_id: Id,
    #[serde(default)]
    pub address_id: Option<Id>,
    #[serde(flatten)]
    pub body: B,
}
