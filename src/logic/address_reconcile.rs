use serde::{Deserialize, Serialize};

use crate::model::{Address, AddressType, Id, PendingAddress, PendingOrigin};

/// Result of "use same as primary address" for one customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Reconciliation {
    /// The customer has no PRIMARY address on file
    NoPrimary,
    /// An existing SERVICE address already matches the primary
    Reuse { address_id: Id },
    /// Nothing matched; a SERVICE copy of the primary must be created on submit
    Stage { pending: PendingAddress },
}

pub fn find_primary(addresses: &[Address]) -> Option<&Address> {
    addresses
        .iter()
        .find(|address| address.address_type == AddressType::Primary)
}

/// SERVICE address whose normalized fields equal the given address
pub fn find_matching_service<'a>(addresses: &'a [Address], target: &Address) -> Option<&'a Address> {
    let key = target.key();
    addresses
        .iter()
        .filter(|address| address.address_type == AddressType::Service)
        .find(|address| address.key() == key)
}

/// Decide whether the customer's primary address can be reused as the
/// service address or must be staged as a new pending one.
pub fn reconcile_same_as_primary(customer_id: &Id, addresses: &[Address]) -> Reconciliation {
    let Some(primary) = find_primary(addresses) else {
        return Reconciliation::NoPrimary;
    };

    match find_matching_service(addresses, primary) {
        Some(existing) => Reconciliation::Reuse {
            address_id: existing.id.clone(),
        },
        None => Reconciliation::Stage {
            pending: PendingAddress::new(
                customer_id,
                PendingOrigin::SameAsPrimary,
                primary.to_new_address(AddressType::Service),
            ),
        },
    }
}
