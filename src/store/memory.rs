use anyhow::{anyhow, Result};
use chrono::Utc;
use parking_lot::RwLock;

use crate::model::{
    generate_id, Address, Customer, CustomerFilter, Estimate, EstimatePayload, Id, Job, JobPayload,
    NewAddress, NewCustomer, ServiceRequest, ServiceRequestPayload,
};
use crate::store::traits::{
    AddressStore, CustomerStore, EstimateStore, JobStore, ServiceRequestStore, Store,
};

/// Process-local store. Rows are kept in insertion order; every row is
/// tagged with its tenant.
#[derive(Debug, Default)]
pub struct MemoryStore {
    customers: RwLock<Vec<Customer>>,
    addresses: RwLock<Vec<(Id, Address)>>,
    estimates: RwLock<Vec<Estimate>>,
    jobs: RwLock<Vec<Job>>,
    service_requests: RwLock<Vec<ServiceRequest>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn customer_exists(&self, tenant_id: &Id, customer_id: &Id) -> bool {
        self.customers
            .read()
            .iter()
            .any(|c| &c.tenant_id == tenant_id && &c.id == customer_id)
    }

    /// The customer must exist for the tenant, and the address, when given,
    /// must be one of that customer's addresses
    fn check_references(&self, tenant_id: &Id, customer_id: &Id, address_id: Option<&Id>) -> Result<()> {
        if !self.customer_exists(tenant_id, customer_id) {
            return Err(anyhow!("Customer '{}' not found", customer_id));
        }
        if let Some(address_id) = address_id {
            let addresses = self.addresses.read();
            let Some((_, address)) = addresses
                .iter()
                .find(|(tenant, a)| tenant == tenant_id && &a.id == address_id)
            else {
                return Err(anyhow!("Address '{}' not found", address_id));
            };
            if &address.customer_id != customer_id {
                return Err(anyhow!(
                    "Address '{}' does not belong to customer '{}'",
                    address_id,
                    customer_id
                ));
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CustomerStore for MemoryStore {
    async fn get_customer(&self, tenant_id: &Id, id: &Id) -> Result<Option<Customer>> {
        Ok(self
            .customers
            .read()
            .iter()
            .find(|c| &c.tenant_id == tenant_id && &c.id == id)
            .cloned())
    }

    async fn list_customers(&self, tenant_id: &Id, filter: &CustomerFilter) -> Result<Vec<Customer>> {
        Ok(self
            .customers
            .read()
            .iter()
            .filter(|c| &c.tenant_id == tenant_id && filter.matches(c))
            .cloned()
            .collect())
    }

    async fn create_customer(&self, tenant_id: &Id, customer: NewCustomer) -> Result<Customer> {
        let addresses = customer.addresses.clone();
        let created = customer.into_customer(tenant_id);
        self.customers.write().push(created.clone());

        let mut rows = self.addresses.write();
        for address in addresses {
            rows.push((tenant_id.clone(), address.into_address(&created.id)));
        }
        Ok(created)
    }

    async fn delete_customer(&self, tenant_id: &Id, id: &Id) -> Result<bool> {
        let mut customers = self.customers.write();
        let before = customers.len();
        customers.retain(|c| !(&c.tenant_id == tenant_id && &c.id == id));
        if customers.len() == before {
            return Ok(false);
        }

        self.addresses
            .write()
            .retain(|(tenant, a)| !(tenant == tenant_id && &a.customer_id == id));
        self.estimates
            .write()
            .retain(|e| !(&e.tenant_id == tenant_id && &e.customer_id == id));
        self.jobs
            .write()
            .retain(|j| !(&j.tenant_id == tenant_id && &j.customer_id == id));
        self.service_requests
            .write()
            .retain(|r| !(&r.tenant_id == tenant_id && &r.customer_id == id));
        Ok(true)
    }
}

#[async_trait::async_trait]
impl AddressStore for MemoryStore {
    async fn get_address(&self, tenant_id: &Id, id: &Id) -> Result<Option<Address>> {
        Ok(self
            .addresses
            .read()
            .iter()
            .find(|(tenant, a)| tenant == tenant_id && &a.id == id)
            .map(|(_, a)| a.clone()))
    }

    async fn list_addresses_for_customer(&self, tenant_id: &Id, customer_id: &Id) -> Result<Vec<Address>> {
        Ok(self
            .addresses
            .read()
            .iter()
            .filter(|(tenant, a)| tenant == tenant_id && &a.customer_id == customer_id)
            .map(|(_, a)| a.clone())
            .collect())
    }

    async fn create_address(&self, tenant_id: &Id, customer_id: &Id, address: NewAddress) -> Result<Address> {
        self.check_references(tenant_id, customer_id, None)?;
        let created = address.into_address(customer_id);
        self.addresses.write().push((tenant_id.clone(), created.clone()));
        Ok(created)
    }
}

#[async_trait::async_trait]
impl EstimateStore for MemoryStore {
    async fn get_estimate(&self, tenant_id: &Id, id: &Id) -> Result<Option<Estimate>> {
        Ok(self
            .estimates
            .read()
            .iter()
            .find(|e| &e.tenant_id == tenant_id && &e.id == id)
            .cloned())
    }

    async fn list_estimates(&self, tenant_id: &Id, customer_id: Option<&Id>) -> Result<Vec<Estimate>> {
        Ok(self
            .estimates
            .read()
            .iter()
            .filter(|e| &e.tenant_id == tenant_id && customer_id.map_or(true, |c| &e.customer_id == c))
            .cloned()
            .collect())
    }

    async fn create_estimate(&self, tenant_id: &Id, payload: EstimatePayload) -> Result<Estimate> {
        self.check_references(tenant_id, &payload.customer_id, payload.address_id.as_ref())?;
        let now = Utc::now();
        let estimate = Estimate {
            id: generate_id(),
            tenant_id: tenant_id.clone(),
            customer_id: payload.customer_id,
            address_id: payload.address_id,
            body: payload.body,
            created_at: now,
            updated_at: now,
        };
        self.estimates.write().push(estimate.clone());
        Ok(estimate)
    }

    async fn update_estimate(&self, tenant_id: &Id, id: &Id, payload: EstimatePayload) -> Result<Option<Estimate>> {
        self.check_references(tenant_id, &payload.customer_id, payload.address_id.as_ref())?;
        let mut estimates = self.estimates.write();
        let Some(estimate) = estimates
            .iter_mut()
            .find(|e| &e.tenant_id == tenant_id && &e.id == id)
        else {
            return Ok(None);
        };
        estimate.customer_id = payload.customer_id;
        estimate.address_id = payload.address_id;
        estimate.body = payload.body;
        estimate.updated_at = Utc::now();
        Ok(Some(estimate.clone()))
    }

    async fn delete_estimate(&self, tenant_id: &Id, id: &Id) -> Result<bool> {
        let mut estimates = self.estimates.write();
        let before = estimates.len();
        estimates.retain(|e| !(&e.tenant_id == tenant_id && &e.id == id));
        Ok(estimates.len() < before)
    }
}

#[async_trait::async_trait]
impl JobStore for MemoryStore {
    async fn get_job(&self, tenant_id: &Id, id: &Id) -> Result<Option<Job>> {
        Ok(self
            .jobs
            .read()
            .iter()
            .find(|j| &j.tenant_id == tenant_id && &j.id == id)
            .cloned())
    }

    async fn list_jobs(&self, tenant_id: &Id, customer_id: Option<&Id>) -> Result<Vec<Job>> {
        Ok(self
            .jobs
            .read()
            .iter()
            .filter(|j| &j.tenant_id == tenant_id && customer_id.map_or(true, |c| &j.customer_id == c))
            .cloned()
            .collect())
    }

    async fn create_job(&self, tenant_id: &Id, payload: JobPayload) -> Result<Job> {
        self.check_references(tenant_id, &payload.customer_id, payload.address_id.as_ref())?;
        let now = Utc::now();
        let job = Job {
            id: generate_id(),
            tenant_id: tenant_id.clone(),
            customer_id: payload.customer_id,
            address_id: payload.address_id,
            body: payload.body,
            created_at: now,
            updated_at: now,
        };
        self.jobs.write().push(job.clone());
        Ok(job)
    }

    async fn update_job(&self, tenant_id: &Id, id: &Id, payload: JobPayload) -> Result<Option<Job>> {
        self.check_references(tenant_id, &payload.customer_id, payload.address_id.as_ref())?;
        let mut jobs = self.jobs.write();
        let Some(job) = jobs.iter_mut().find(|j| &j.tenant_id == tenant_id && &j.id == id) else {
            return Ok(None);
        };
        job.customer_id = payload.customer_id;
        job.address_id = payload.address_id;
        job.body = payload.body;
        job.updated_at = Utc::now();
        Ok(Some(job.clone()))
    }
}

#[async_trait::async_trait]
impl ServiceRequestStore for MemoryStore {
    async fn get_service_request(&self, tenant_id: &Id, id: &Id) -> Result<Option<ServiceRequest>> {
        Ok(self
            .service_requests
            .read()
            .iter()
            .find(|r| &r.tenant_id == tenant_id && &r.id == id)
            .cloned())
    }

    async fn list_service_requests(&self, tenant_id: &Id, customer_id: Option<&Id>) -> Result<Vec<ServiceRequest>> {
        Ok(self
            .service_requests
            .read()
            .iter()
            .filter(|r| &r.tenant_id == tenant_id && customer_id.map_or(true, |c| &r.customer_id == c))
            .cloned()
            .collect())
    }

    async fn create_service_request(&self, tenant_id: &Id, payload: ServiceRequestPayload) -> Result<ServiceRequest> {
        self.check_references(tenant_id, &payload.customer_id, payload.address_id.as_ref())?;
        let now = Utc::now();
        let request = ServiceRequest {
            id: generate_id(),
            tenant_id: tenant_id.clone(),
            customer_id: payload.customer_id,
            address_id: payload.address_id,
            body: payload.body,
            created_at: now,
            updated_at: now,
        };
        self.service_requests.write().push(request.clone());
        Ok(request)
    }

    async fn update_service_request(
        &self,
        tenant_id: &Id,
        id: &Id,
        payload: ServiceRequestPayload,
    ) -> Result<Option<ServiceRequest>> {
        self.check_references(tenant_id, &payload.customer_id, payload.address_id.as_ref())?;
        let mut requests = self.service_requests.write();
        let Some(request) = requests
            .iter_mut()
            .find(|r| &r.tenant_id == tenant_id && &r.id == id)
        else {
            return Ok(None);
        };
        request.customer_id = payload.customer_id;
        request.address_id = payload.address_id;
        request.body = payload.body;
        request.updated_at = Utc::now();
        Ok(Some(request.clone()))
    }
}

impl Store for MemoryStore {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AddressType, EstimateBody, RecordPayload};

    fn tenant() -> Id {
        "tenant-a".to_string()
    }

    #[tokio::test]
    async fn test_customer_created_with_addresses() {
        let store = MemoryStore::new();
        let customer = store
            .create_customer(
                &tenant(),
                NewCustomer::new("Jane Doe").with_address(NewAddress::new(
                    "123 Main St",
                    "Springfield",
                    "IL",
                    "62701",
                    AddressType::Primary,
                )),
            )
            .await
            .unwrap();

        let addresses = store
            .list_addresses_for_customer(&tenant(), &customer.id)
            .await
            .unwrap();
        assert_eq!(addresses.len(), 1);
        assert!(addresses[0].is_primary);
        assert_eq!(addresses[0].customer_id, customer.id);
    }

    #[tokio::test]
    async fn test_rows_are_isolated_per_tenant() {
        let store = MemoryStore::new();
        let customer = store
            .create_customer(&tenant(), NewCustomer::new("Jane Doe"))
            .await
            .unwrap();
        let other = "tenant-b".to_string();

        assert!(store.get_customer(&other, &customer.id).await.unwrap().is_none());
        assert!(store
            .list_customers(&other, &CustomerFilter::default())
            .await
            .unwrap()
            .is_empty());
        assert!(store
            .create_address(
                &other,
                &customer.id,
                NewAddress::new("1 A St", "Town", "ST", "00001", AddressType::Service)
            )
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_estimate_requires_known_address() {
        let store = MemoryStore::new();
        let customer = store
            .create_customer(&tenant(), NewCustomer::new("Jane Doe"))
            .await
            .unwrap();
        let payload = RecordPayload {
            customer_id: customer.id.clone(),
            address_id: Some("draft-123".to_string()),
            body: EstimateBody::new("Repair"),
        };
        assert!(store.create_estimate(&tenant(), payload).await.is_err());
    }

    #[tokio::test]
    async fn test_records_reject_another_customers_address() {
        let store = MemoryStore::new();
        let owner = store
            .create_customer(
                &tenant(),
                NewCustomer::new("Jane Doe").with_address(NewAddress::new(
                    "123 Main St",
                    "Springfield",
                    "IL",
                    "62701",
                    AddressType::Service,
                )),
            )
            .await
            .unwrap();
        let other = store
            .create_customer(&tenant(), NewCustomer::new("John Roe"))
            .await
            .unwrap();
        let address_id = store
            .list_addresses_for_customer(&tenant(), &owner.id)
            .await
            .unwrap()[0]
            .id
            .clone();

        let payload = |customer_id: &Id| RecordPayload {
            customer_id: customer_id.clone(),
            address_id: Some(address_id.clone()),
            body: EstimateBody::new("Repair"),
        };
        let err = store.create_estimate(&tenant(), payload(&other.id)).await.unwrap_err();
        assert!(err.to_string().contains("does not belong"));

        let estimate = store.create_estimate(&tenant(), payload(&owner.id)).await.unwrap();
        assert!(store
            .update_estimate(&tenant(), &estimate.id, payload(&other.id))
            .await
            .is_err());
        let kept = store.get_estimate(&tenant(), &estimate.id).await.unwrap().unwrap();
        assert_eq!(kept.customer_id, owner.id);
    }

    #[tokio::test]
    async fn test_update_and_delete_cascade() {
        let store = MemoryStore::new();
        let customer = store
            .create_customer(&tenant(), NewCustomer::new("Jane Doe"))
            .await
            .unwrap();
        let estimate = store
            .create_estimate(
                &tenant(),
                RecordPayload {
                    customer_id: customer.id.clone(),
                    address_id: None,
                    body: EstimateBody::new("Repair"),
                },
            )
            .await
            .unwrap();

        let updated = store
            .update_estimate(
                &tenant(),
                &estimate.id,
                RecordPayload {
                    customer_id: customer.id.clone(),
                    address_id: None,
                    body: EstimateBody::new("Replacement"),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.body.title, "Replacement");
        assert!(updated.updated_at >= estimate.updated_at);

        assert!(store.delete_customer(&tenant(), &customer.id).await.unwrap());
        assert!(store.get_estimate(&tenant(), &estimate.id).await.unwrap().is_none());
        assert!(!store.delete_customer(&tenant(), &customer.id).await.unwrap());
    }
}
