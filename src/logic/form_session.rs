use serde::{Deserialize, Serialize};

use crate::logic::address_reconcile::{find_primary, reconcile_same_as_primary, Reconciliation};
use crate::model::{
    Address, AddressRef, AddressType, DraftId, Id, NewAddress, PendingAddress, PendingOrigin,
    RecordDraft, TenantContext,
};
use crate::store::traits::AddressStore;

/// Where the service-address field of a form currently stands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ServiceAddressState {
    Unset,
    Searching { generation: u64 },
    ReusingExisting { address_id: Id },
    StagedPending { draft_id: DraftId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionNotice {
    NoPrimaryAddress,
}

/// Handle for an address lookup issued while SEARCHING
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTicket {
    generation: u64,
    customer_id: Id,
}

/// Address state owned by one record form (estimate, job or service request).
/// Nothing here is shared between forms.
#[derive(Debug, Clone)]
pub struct AddressFormSession {
    customer_id: Option<Id>,
    addresses: Vec<Address>,
    pending: Vec<PendingAddress>,
    address: Option<AddressRef>,
    same_as_primary: bool,
    state: ServiceAddressState,
    generation: u64,
    notice: Option<SessionNotice>,
}

impl Default for AddressFormSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressFormSession {
    pub fn new() -> Self {
        Self {
            customer_id: None,
            addresses: Vec::new(),
            pending: Vec::new(),
            address: None,
            same_as_primary: false,
            state: ServiceAddressState::Unset,
            generation: 0,
            notice: None,
        }
    }

    pub fn customer_id(&self) -> Option<&Id> {
        self.customer_id.as_ref()
    }

    pub fn address(&self) -> Option<&AddressRef> {
        self.address.as_ref()
    }

    pub fn state(&self) -> &ServiceAddressState {
        &self.state
    }

    pub fn notice(&self) -> Option<SessionNotice> {
        self.notice
    }

    pub fn same_as_primary(&self) -> bool {
        self.same_as_primary
    }

    pub fn pending_addresses(&self) -> &[PendingAddress] {
        &self.pending
    }

    /// Switch the bound customer. Everything tied to the previous customer
    /// is dropped and in-flight lookups become stale. Reselecting the bound
    /// customer only refreshes its addresses.
    pub fn select_customer(&mut self, customer_id: Id, addresses: Vec<Address>) {
        if self.customer_id.as_ref() == Some(&customer_id) {
            self.set_addresses(addresses);
            return;
        }

        log::debug!("form customer changed to {}", customer_id);
        self.generation += 1;
        self.customer_id = Some(customer_id);
        self.addresses = addresses;
        self.pending.clear();
        self.clear_assignment();

        if self.same_as_primary {
            self.reconcile();
        }
    }

    /// Replace the loaded address set for the current customer
    pub fn set_addresses(&mut self, addresses: Vec<Address>) {
        self.addresses = addresses;
    }

    pub fn set_same_as_primary(&mut self, checked: bool) {
        if checked == self.same_as_primary {
            return;
        }
        self.same_as_primary = checked;

        if checked {
            self.reconcile();
        } else {
            self.generation += 1;
            self.discard_auto_staged();
            self.clear_assignment();
        }
    }

    /// Stage an address typed in by the user and assign it to the record
    pub fn add_pending_address(&mut self, address: NewAddress) -> Option<AddressRef> {
        let customer_id = self.customer_id.clone()?;
        let pending = PendingAddress::new(&customer_id, PendingOrigin::UserEntered, address);
        let reference = AddressRef::pending(pending.draft_id.clone());
        self.pending.push(pending);
        self.assign_manually(reference.clone());
        Some(reference)
    }

    pub fn select_existing_address(&mut self, address_id: Id) {
        self.assign_manually(AddressRef::persisted(address_id));
    }

    /// Enter SEARCHING for a remote lookup of the customer's addresses
    pub fn begin_lookup(&mut self) -> Option<LookupTicket> {
        let customer_id = self.customer_id.clone()?;
        self.generation += 1;
        self.state = ServiceAddressState::Searching {
            generation: self.generation,
        };
        Some(LookupTicket {
            generation: self.generation,
            customer_id,
        })
    }

    /// Apply a lookup result. Returns false when the ticket was superseded
    /// by a newer lookup, a customer change or an uncheck.
    pub fn complete_lookup(&mut self, ticket: LookupTicket, result: anyhow::Result<Vec<Address>>) -> bool {
        let current = self.customer_id.as_ref() == Some(&ticket.customer_id)
            && ticket.generation == self.generation
            && self.same_as_primary;
        if !current {
            log::debug!(
                "discarding stale address lookup for customer {} (generation {})",
                ticket.customer_id,
                ticket.generation
            );
            return false;
        }

        match result {
            Ok(addresses) => {
                self.addresses = addresses;
                self.reconcile();
            }
            Err(e) => {
                log::warn!(
                    "address lookup for customer {} failed, staging a new service address: {}",
                    ticket.customer_id,
                    e
                );
                self.stage_from_loaded_primary();
            }
        }
        true
    }

    /// Fetch the customer's addresses and reconcile against them
    pub async fn refresh_same_as_primary<S: AddressStore + ?Sized>(
        &mut self,
        store: &S,
        tenant: &TenantContext,
    ) -> bool {
        let Some(ticket) = self.begin_lookup() else {
            return false;
        };
        let result = store
            .list_addresses_for_customer(&tenant.tenant_id, &ticket.customer_id)
            .await;
        self.complete_lookup(ticket, result)
    }

    /// Form state for submission; `None` until a customer is selected
    pub fn draft<B>(&self, body: B) -> Option<RecordDraft<B>> {
        let customer_id = self.customer_id.clone()?;
        Some(RecordDraft::new(customer_id, self.address.clone(), body))
    }

    fn reconcile(&mut self) {
        let Some(customer_id) = self.customer_id.clone() else {
            self.state = ServiceAddressState::Unset;
            return;
        };
        self.discard_auto_staged();
        self.notice = None;

        match reconcile_same_as_primary(&customer_id, &self.addresses) {
            Reconciliation::NoPrimary => {
                self.notice = Some(SessionNotice::NoPrimaryAddress);
                self.address = None;
                self.state = ServiceAddressState::Unset;
            }
            Reconciliation::Reuse { address_id } => {
                self.address = Some(AddressRef::persisted(address_id.clone()));
                self.state = ServiceAddressState::ReusingExisting { address_id };
            }
            Reconciliation::Stage { pending } => self.stage(pending),
        }
    }

    /// Fallback when the lookup failed: stage from whatever primary we hold
    fn stage_from_loaded_primary(&mut self) {
        let Some(customer_id) = self.customer_id.clone() else {
            return;
        };
        self.discard_auto_staged();
        match find_primary(&self.addresses) {
            Some(primary) => {
                let pending = PendingAddress::new(
                    &customer_id,
                    PendingOrigin::SameAsPrimary,
                    primary.to_new_address(AddressType::Service),
                );
                self.stage(pending);
            }
            None => {
                self.notice = Some(SessionNotice::NoPrimaryAddress);
                self.address = None;
                self.state = ServiceAddressState::Unset;
            }
        }
    }

    fn stage(&mut self, pending: PendingAddress) {
        let draft_id = pending.draft_id.clone();
        self.pending.push(pending);
        self.address = Some(AddressRef::pending(draft_id.clone()));
        self.state = ServiceAddressState::StagedPending { draft_id };
    }

    fn assign_manually(&mut self, reference: AddressRef) {
        if self.same_as_primary {
            self.same_as_primary = false;
            self.generation += 1;
            self.discard_auto_staged();
        }
        self.notice = None;
        self.state = ServiceAddressState::Unset;
        self.address = Some(reference);
    }

    fn discard_auto_staged(&mut self) {
        self.pending
            .retain(|pending| pending.origin != PendingOrigin::SameAsPrimary);
    }

    fn clear_assignment(&mut self) {
        self.address = None;
        self.notice = None;
        self.state = ServiceAddressState::Unset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::address_reconcile::tests::{address, CUSTOMER};

    fn customer() -> Id {
        CUSTOMER.to_string()
    }

    fn session_with(addresses: Vec<Address>) -> AddressFormSession {
        let mut session = AddressFormSession::new();
        session.select_customer(customer(), addresses);
        session
    }

    #[test]
    fn test_checking_reuses_existing_service_address() {
        let service = address("123 Main St", AddressType::Service);
        let service_id = service.id.clone();
        let mut session = session_with(vec![address("123 Main St", AddressType::Primary), service]);

        session.set_same_as_primary(true);

        assert_eq!(session.address(), Some(&AddressRef::persisted(service_id.clone())));
        assert_eq!(
            session.state(),
            &ServiceAddressState::ReusingExisting { address_id: service_id }
        );
        assert!(session.pending_addresses().is_empty());
    }

    #[test]
    fn test_checking_stages_exactly_one_pending_address() {
        let primary = address("123 Main St", AddressType::Primary);
        let mut session = session_with(vec![primary.clone()]);

        session.set_same_as_primary(true);

        assert_eq!(session.pending_addresses().len(), 1);
        let pending = &session.pending_addresses()[0];
        assert_eq!(pending.address.address_type, AddressType::Service);
        assert_eq!(pending.address.street, primary.street);
        assert_eq!(pending.address.city, primary.city);
        assert_eq!(
            session.address(),
            Some(&AddressRef::pending(pending.draft_id.clone()))
        );
    }

    #[test]
    fn test_unchecking_discards_only_auto_staged_address() {
        let mut session = session_with(vec![address("123 Main St", AddressType::Primary)]);
        let manual = session
            .add_pending_address(NewAddress::new("9 Elm St", "Springfield", "IL", "62702", AddressType::Service))
            .unwrap();
        let manual_id = manual.draft_id().unwrap().clone();

        session.set_same_as_primary(true);
        assert_eq!(session.pending_addresses().len(), 2);

        session.set_same_as_primary(false);
        assert_eq!(session.address(), None);
        assert_eq!(session.state(), &ServiceAddressState::Unset);
        assert_eq!(session.pending_addresses().len(), 1);
        assert_eq!(session.pending_addresses()[0].draft_id, manual_id);
        assert_eq!(session.pending_addresses()[0].origin, PendingOrigin::UserEntered);
    }

    #[test]
    fn test_rechecking_does_not_stack_pending_addresses() {
        let mut session = session_with(vec![address("123 Main St", AddressType::Primary)]);
        session.set_same_as_primary(true);
        session.set_same_as_primary(false);
        session.set_same_as_primary(true);
        assert_eq!(session.pending_addresses().len(), 1);
    }

    #[test]
    fn test_no_primary_sets_notice() {
        let mut session = session_with(vec![address("123 Main St", AddressType::Billing)]);
        session.set_same_as_primary(true);
        assert_eq!(session.notice(), Some(SessionNotice::NoPrimaryAddress));
        assert_eq!(session.address(), None);
        assert!(session.pending_addresses().is_empty());
    }

    #[test]
    fn test_switching_customer_resets_and_reruns() {
        let mut session = session_with(vec![address("123 Main St", AddressType::Primary)]);
        session.set_same_as_primary(true);
        let old_draft = session.address().cloned();

        let mut other_primary = address("77 Oak Ave", AddressType::Primary);
        other_primary.customer_id = "cust-2".to_string();
        let mut other_service = address("77 Oak Ave", AddressType::Service);
        other_service.customer_id = "cust-2".to_string();
        let other_service_id = other_service.id.clone();

        session.select_customer("cust-2".to_string(), vec![other_primary, other_service]);

        assert_ne!(session.address().cloned(), old_draft);
        assert_eq!(session.address(), Some(&AddressRef::persisted(other_service_id)));
        assert!(session.pending_addresses().is_empty());
        assert!(session.same_as_primary());
    }

    #[test]
    fn test_reselecting_same_customer_keeps_pending_addresses() {
        let mut session = session_with(vec![address("123 Main St", AddressType::Primary)]);
        let manual = session
            .add_pending_address(NewAddress::new("9 Elm St", "Springfield", "IL", "62702", AddressType::Service))
            .unwrap();

        let service = address("40 Mill Rd", AddressType::Service);
        session.select_customer(
            customer(),
            vec![address("123 Main St", AddressType::Primary), service],
        );

        assert_eq!(session.pending_addresses().len(), 1);
        assert_eq!(session.address(), Some(&manual));
    }

    #[test]
    fn test_stale_lookup_is_discarded() {
        let mut session = session_with(Vec::new());
        session.set_same_as_primary(true);
        let stale = session.begin_lookup().unwrap();

        session.select_customer("cust-2".to_string(), Vec::new());
        let fresh = session.begin_lookup().unwrap();

        let applied = session.complete_lookup(
            stale,
            Ok(vec![address("123 Main St", AddressType::Primary)]),
        );
        assert!(!applied);
        assert!(matches!(session.state(), ServiceAddressState::Searching { .. }));

        let mut primary = address("77 Oak Ave", AddressType::Primary);
        primary.customer_id = "cust-2".to_string();
        assert!(session.complete_lookup(fresh, Ok(vec![primary])));
        assert!(matches!(session.state(), ServiceAddressState::StagedPending { .. }));
        assert_eq!(session.pending_addresses()[0].customer_id, "cust-2");
    }

    #[test]
    fn test_failed_lookup_falls_back_to_staging() {
        let mut session = session_with(vec![address("123 Main St", AddressType::Primary)]);
        session.set_same_as_primary(true);
        let ticket = session.begin_lookup().unwrap();

        assert!(session.complete_lookup(ticket, Err(anyhow::anyhow!("network down"))));
        assert_eq!(session.pending_addresses().len(), 1);
        assert!(matches!(session.state(), ServiceAddressState::StagedPending { .. }));
    }

    #[test]
    fn test_manual_selection_unchecks_same_as_primary() {
        let mut session = session_with(vec![address("123 Main St", AddressType::Primary)]);
        session.set_same_as_primary(true);
        session.select_existing_address("addr-9".to_string());

        assert!(!session.same_as_primary());
        assert!(session.pending_addresses().is_empty());
        assert_eq!(session.address(), Some(&AddressRef::persisted("addr-9")));
    }

    #[test]
    fn test_draft_carries_address_ref() {
        let mut session = AddressFormSession::new();
        assert!(session.draft(()).is_none());

        session.select_customer(customer(), vec![address("123 Main St", AddressType::Primary)]);
        session.set_same_as_primary(true);
        let draft = session.draft("body").unwrap();
        assert_eq!(draft.customer_id, CUSTOMER);
        assert!(draft.address.unwrap().draft_id().is_some());
    }
}
