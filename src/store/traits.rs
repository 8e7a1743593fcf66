use crate::model::{
    Address, Customer, CustomerFilter, Estimate, EstimatePayload, Id, Job, JobPayload, NewAddress,
    NewCustomer, ServiceRequest, ServiceRequestPayload,
};
use anyhow::Result;

#[async_trait::async_trait]
pub trait CustomerStore: Send + Sync {
    async fn get_customer(&self, tenant_id: &Id, id: &Id) -> Result<Option<Customer>>;
    async fn list_customers(&self, tenant_id: &Id, filter: &CustomerFilter) -> Result<Vec<Customer>>;
    /// Create a customer together with the addresses listed on it
    async fn create_customer(&self, tenant_id: &Id, customer: NewCustomer) -> Result<Customer>;
    async fn delete_customer(&self, tenant_id: &Id, id: &Id) -> Result<bool>;
}

/// Customer/address directory
#[async_trait::async_trait]
pub trait AddressStore: Send + Sync {
    async fn get_address(&self, tenant_id: &Id, id: &Id) -> Result<Option<Address>>;
    /// Every address of the customer, whatever its type
    async fn list_addresses_for_customer(&self, tenant_id: &Id, customer_id: &Id) -> Result<Vec<Address>>;
    /// Persist a new address and return it with its durable id
    async fn create_address(&self, tenant_id: &Id, customer_id: &Id, address: NewAddress) -> Result<Address>;
}

#[async_trait::async_trait]
pub trait EstimateStore: Send + Sync {
    async fn get_estimate(&self, tenant_id: &Id, id: &Id) -> Result<Option<Estimate>>;
    async fn list_estimates(&self, tenant_id: &Id, customer_id: Option<&Id>) -> Result<Vec<Estimate>>;
    /// Persist the whole option/line-item graph in one write
    async fn create_estimate(&self, tenant_id: &Id, payload: EstimatePayload) -> Result<Estimate>;
    async fn update_estimate(&self, tenant_id: &Id, id: &Id, payload: EstimatePayload) -> Result<Option<Estimate>>;
    async fn delete_estimate(&self, tenant_id: &Id, id: &Id) -> Result<bool>;
}

#[async_trait::async_trait]
pub trait JobStore: Send + Sync {
    async fn get_job(&self, tenant_id: &Id, id: &Id) -> Result<Option<Job>>;
    async fn list_jobs(&self, tenant_id: &Id, customer_id: Option<&Id>) -> Result<Vec<Job>>;
    async fn create_job(&self, tenant_id: &Id, payload: JobPayload) -> Result<Job>;
    async fn update_job(&self, tenant_id: &Id, id: &Id, payload: JobPayload) -> Result<Option<Job>>;
}

#[async_trait::async_trait]
pub trait ServiceRequestStore: Send + Sync {
    async fn get_service_request(&self, tenant_id: &Id, id: &Id) -> Result<Option<ServiceRequest>>;
    async fn list_service_requests(&self, tenant_id: &Id, customer_id: Option<&Id>) -> Result<Vec<ServiceRequest>>;
    async fn create_service_request(&self, tenant_id: &Id, payload: ServiceRequestPayload) -> Result<ServiceRequest>;
    async fn update_service_request(
        &self,
        tenant_id: &Id,
        id: &Id,
        payload: ServiceRequestPayload,
    ) -> Result<Option<ServiceRequest>>;
}

pub trait Store:
    CustomerStore + AddressStore + EstimateStore + JobStore + ServiceRequestStore + Send + Sync
{
}
