use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::logic::{
    reconcile_same_as_primary, AddressFailurePolicy, AddressOutcome, Reconciliation,
    SubmissionError, Validate, ValidationErrors,
};
use crate::model::{
    default_tax_rate, Address, Customer, CustomerFilter, Id, NewAddress, NewCustomer,
    TenantContext,
};
use crate::store::traits::Store;

/// Settings the handlers read on every request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiSettings {
    pub address_failure_policy: AddressFailurePolicy,
    pub default_tax_rate: Decimal,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            address_failure_policy: AddressFailurePolicy::default(),
            default_tax_rate: default_tax_rate(),
        }
    }
}

impl ApiSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            address_failure_policy: config.submission.address_failure_policy,
            default_tax_rate: config.pricing.default_tax_rate,
        }
    }
}

pub struct AppState<S> {
    pub store: Arc<S>,
    pub settings: ApiSettings,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            settings: self.settings,
        }
    }
}

impl<S> AppState<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            settings: ApiSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ApiSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<ValidationErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<AddressOutcome>>,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
            fields: None,
            addresses: None,
        }
    }

    pub fn validation(fields: ValidationErrors) -> Self {
        Self {
            error: format!("Validation failed for {} field(s)", fields.len()),
            fields: Some(fields),
            addresses: None,
        }
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn not_found(message: &str) -> ApiError {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new(message)))
}

pub(crate) fn internal_error(context: &str, e: anyhow::Error) -> ApiError {
    log::warn!("{}: {:#}", context, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(&format!("{}: {}", context, e))),
    )
}

pub(crate) fn validation_error(fields: ValidationErrors) -> ApiError {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse::validation(fields)),
    )
}

pub(crate) fn submission_error(e: SubmissionError) -> ApiError {
    match e {
        SubmissionError::Validation(fields) => validation_error(fields),
        SubmissionError::AddressPersistence { outcomes } => {
            let failed = outcomes.iter().filter(|o| o.is_failure()).count();
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: format!("Failed to save {} address(es)", failed),
                    fields: None,
                    addresses: Some(outcomes),
                }),
            )
        }
        SubmissionError::UnresolvedAddress(draft_id) => {
            let mut fields = ValidationErrors::new();
            fields.add("address", format!("Address {} was not saved", draft_id));
            validation_error(fields)
        }
        SubmissionError::NotFound(_) => not_found(&e.to_string()),
        SubmissionError::Persistence(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(&e.to_string())),
        ),
    }
}

/// Fail with 404 unless the customer exists for this tenant
pub(crate) async fn require_customer<S: Store>(
    store: &S,
    tenant: &TenantContext,
    customer_id: &Id,
) -> Result<Customer, ApiError> {
    match store.get_customer(&tenant.tenant_id, customer_id).await {
        Ok(Some(customer)) => Ok(customer),
        Ok(None) => Err(not_found("Customer not found")),
        Err(e) => Err(internal_error("Failed to fetch customer", e)),
    }
}

#[derive(Debug, Serialize)]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub customer: Customer,
    pub addresses: Vec<Address>,
}

pub async fn list_customers<S: Store>(
    State(state): State<AppState<S>>,
    tenant: TenantContext,
    Query(filter): Query<CustomerFilter>,
) -> Result<Json<ListResponse<Customer>>, ApiError> {
    match state.store.list_customers(&tenant.tenant_id, &filter).await {
        Ok(customers) => Ok(Json(customers.into())),
        Err(e) => Err(internal_error("Failed to list customers", e)),
    }
}

pub async fn create_customer<S: Store>(
    State(state): State<AppState<S>>,
    tenant: TenantContext,
    RequestJson(new_customer): RequestJson<NewCustomer>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    new_customer.validate().into_result().map_err(validation_error)?;

    match state.store.create_customer(&tenant.tenant_id, new_customer).await {
        Ok(customer) => {
            log::info!(
                "{} created customer {} for tenant {}",
                tenant.actor(),
                customer.id,
                tenant.tenant_id
            );
            Ok((StatusCode::CREATED, Json(customer)))
        }
        Err(e) => Err(internal_error("Failed to create customer", e)),
    }
}

pub async fn get_customer<S: Store>(
    State(state): State<AppState<S>>,
    tenant: TenantContext,
    Path(customer_id): Path<Id>,
) -> Result<Json<CustomerDetail>, ApiError> {
    let customer = require_customer(&*state.store, &tenant, &customer_id).await?;
    let addresses = state
        .store
        .list_addresses_for_customer(&tenant.tenant_id, &customer_id)
        .await
        .map_err(|e| internal_error("Failed to list addresses", e))?;

    Ok(Json(CustomerDetail {
        customer,
        addresses,
    }))
}

pub async fn delete_customer<S: Store>(
    State(state): State<AppState<S>>,
    tenant: TenantContext,
    Path(customer_id): Path<Id>,
) -> Result<StatusCode, ApiError> {
    match state.store.delete_customer(&tenant.tenant_id, &customer_id).await {
        Ok(true) => {
            log::info!("{} deleted customer {}", tenant.actor(), customer_id);
            Ok(StatusCode::NO_CONTENT)
        }
        Ok(false) => Err(not_found("Customer not found")),
        Err(e) => Err(internal_error("Failed to delete customer", e)),
    }
}

pub async fn list_addresses<S: Store>(
    State(state): State<AppState<S>>,
    tenant: TenantContext,
    Path(customer_id): Path<Id>,
) -> Result<Json<ListResponse<Address>>, ApiError> {
    require_customer(&*state.store, &tenant, &customer_id).await?;

    match state
        .store
        .list_addresses_for_customer(&tenant.tenant_id, &customer_id)
        .await
    {
        Ok(addresses) => Ok(Json(addresses.into())),
        Err(e) => Err(internal_error("Failed to list addresses", e)),
    }
}

pub async fn create_address<S: Store>(
    State(state): State<AppState<S>>,
    tenant: TenantContext,
    Path(customer_id): Path<Id>,
    RequestJson(new_address): RequestJson<NewAddress>,
) -> Result<(StatusCode, Json<Address>), ApiError> {
    new_address.validate().into_result().map_err(validation_error)?;
    require_customer(&*state.store, &tenant, &customer_id).await?;

    match state
        .store
        .create_address(&tenant.tenant_id, &customer_id, new_address)
        .await
    {
        Ok(address) => Ok((StatusCode::CREATED, Json(address))),
        Err(e) => Err(internal_error("Failed to create address", e)),
    }
}

/// Resolve "use same as primary address" against the customer's current addresses.
/// Nothing is persisted; a staged address is created when the record is submitted.
pub async fn same_as_primary<S: Store>(
    State(state): State<AppState<S>>,
    tenant: TenantContext,
    Path(customer_id): Path<Id>,
) -> Result<Json<Reconciliation>, ApiError> {
    require_customer(&*state.store, &tenant, &customer_id).await?;

    let addresses = state
        .store
        .list_addresses_for_customer(&tenant.tenant_id, &customer_id)
        .await
        .map_err(|e| internal_error("Failed to list addresses", e))?;

    let outcome = reconcile_same_as_primary(&customer_id, &addresses);
    match &outcome {
        Reconciliation::NoPrimary => {
            log::info!("Customer {} has no primary address", customer_id)
        }
        Reconciliation::Reuse { address_id } => {
            log::debug!("Reusing service address {} for customer {}", address_id, customer_id)
        }
        Reconciliation::Stage { pending } => {
            log::debug!("Staged pending address {} for customer {}", pending.draft_id, customer_id)
        }
    }

    Ok(Json(outcome))
}
