use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::logic::validate::{Validate, ValidationErrors};
use crate::model::{
    AddressRef, DraftId, Estimate, EstimateBody, Id, Job, JobBody, PendingAddress, RecordDraft,
    RecordPayload, ServiceRequest, ServiceRequestBody, TenantContext,
};
use crate::store::traits::{AddressStore, EstimateStore, JobStore, ServiceRequestStore};

/// What to do when a pending address cannot be created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressFailurePolicy {
    /// Persist no record once any address failed
    #[default]
    FailFast,
    /// Persist the records whose addresses resolved, skip the rest
    BestEffort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitMode {
    Create,
    Update(Id),
}

/// A record draft plus the pending addresses staged in the same form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission<B> {
    pub draft: RecordDraft<B>,
    #[serde(default)]
    pub pending_addresses: Vec<PendingAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AddressStatus {
    Created { address_id: Id },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressOutcome {
    pub draft_id: DraftId,
    #[serde(flatten)]
    pub status: AddressStatus,
}

impl AddressOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, AddressStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReport<R> {
    pub record: R,
    pub addresses: Vec<AddressOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome<R> {
    Saved { record: R },
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport<R> {
    pub addresses: Vec<AddressOutcome>,
    pub records: Vec<RecordOutcome<R>>,
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Validation failed for {} field(s)", .0.len())]
    Validation(ValidationErrors),
    #[error("Failed to save {} address(es)", failed_count(.outcomes))]
    AddressPersistence { outcomes: Vec<AddressOutcome> },
    #[error("Address '{0}' was not resolved before saving")]
    UnresolvedAddress(DraftId),
    #[error("Record not found: {0}")]
    NotFound(Id),
    #[error("Failed to save record: {0}")]
    Persistence(String),
}

fn failed_count(outcomes: &[AddressOutcome]) -> usize {
    outcomes.iter().filter(|o| o.is_failure()).count()
}

/// Persistence target for one kind of dependent record
#[async_trait::async_trait]
pub trait RecordSink<B: Send + 'static>: Send + Sync {
    type Record: Send;

    async fn create_record(&self, tenant_id: &Id, payload: RecordPayload<B>) -> anyhow::Result<Self::Record>;
    async fn update_record(
        &self,
        tenant_id: &Id,
        id: &Id,
        payload: RecordPayload<B>,
    ) -> anyhow::Result<Option<Self::Record>>;
}

#[async_trait::async_trait]
impl<S: EstimateStore + ?Sized> RecordSink<EstimateBody> for S {
    type Record = Estimate;

    async fn create_record(&self, tenant_id: &Id, payload: RecordPayload<EstimateBody>) -> anyhow::Result<Estimate> {
        self.create_estimate(tenant_id, payload).await
    }

    async fn update_record(
        &self,
        tenant_id: &Id,
        id: &Id,
        payload: RecordPayload<EstimateBody>,
    ) -> anyhow::Result<Option<Estimate>> {
        self.update_estimate(tenant_id, id, payload).await
    }
}

#[async_trait::async_trait]
impl<S: JobStore + ?Sized> RecordSink<JobBody> for S {
    type Record = Job;

    async fn create_record(&self, tenant_id: &Id, payload: RecordPayload<JobBody>) -> anyhow::Result<Job> {
        self.create_job(tenant_id, payload).await
    }

    async fn update_record(
        &self,
        tenant_id: &Id,
        id: &Id,
        payload: RecordPayload<JobBody>,
    ) -> anyhow::Result<Option<Job>> {
        self.update_job(tenant_id, id, payload).await
    }
}

#[async_trait::async_trait]
impl<S: ServiceRequestStore + ?Sized> RecordSink<ServiceRequestBody> for S {
    type Record = ServiceRequest;

    async fn create_record(
        &self,
        tenant_id: &Id,
        payload: RecordPayload<ServiceRequestBody>,
    ) -> anyhow::Result<ServiceRequest> {
        self.create_service_request(tenant_id, payload).await
    }

    async fn update_record(
        &self,
        tenant_id: &Id,
        id: &Id,
        payload: RecordPayload<ServiceRequestBody>,
    ) -> anyhow::Result<Option<ServiceRequest>> {
        self.update_service_request(tenant_id, id, payload).await
    }
}

/// Durable ids obtained for pending addresses, plus one outcome per attempt
#[derive(Debug, Default)]
struct AddressResolution {
    ids: HashMap<DraftId, Id>,
    outcomes: Vec<AddressOutcome>,
}

impl AddressResolution {
    fn has_failures(&self) -> bool {
        self.outcomes.iter().any(AddressOutcome::is_failure)
    }

    /// Durable address id for a draft; never hands out a draft id
    fn resolve(&self, address: Option<&AddressRef>) -> Result<Option<Id>, DraftId> {
        match address {
            None => Ok(None),
            Some(AddressRef::Persisted { id }) => Ok(Some(id.clone())),
            Some(AddressRef::Pending { draft_id }) => match self.ids.get(draft_id) {
                Some(id) => Ok(Some(id.clone())),
                None => Err(draft_id.clone()),
            },
        }
    }
}

fn check_draft<B: Validate>(draft: &RecordDraft<B>, pending: &[PendingAddress]) -> ValidationErrors {
    let mut errors = draft.validate();
    if let Some(draft_id) = draft.address.as_ref().and_then(AddressRef::draft_id) {
        match pending.iter().find(|p| &p.draft_id == draft_id) {
            None => errors.add("address", "The selected new address is missing from the submission"),
            Some(p) if p.customer_id != draft.customer_id => {
                errors.add("address", "The selected address belongs to a different customer")
            }
            Some(_) => {}
        }
    }
    errors
}

/// A persisted address must exist for the tenant and belong to the draft's customer
async fn check_persisted_address<S, B>(
    store: &S,
    tenant: &TenantContext,
    draft: &RecordDraft<B>,
) -> Result<ValidationErrors, SubmissionError>
where
    S: AddressStore + ?Sized,
{
    let mut errors = ValidationErrors::new();
    let Some(AddressRef::Persisted { id }) = draft.address.as_ref() else {
        return Ok(errors);
    };

    match store.get_address(&tenant.tenant_id, id).await {
        Ok(Some(address)) if address.customer_id == draft.customer_id => {}
        Ok(Some(_)) => errors.add("address", "The selected address belongs to a different customer"),
        Ok(None) => errors.add("address", "The selected address does not exist"),
        Err(e) => return Err(SubmissionError::Persistence(e.to_string())),
    }
    Ok(errors)
}

/// Pending addresses referenced by the drafts, in pending-list order
fn referenced_pending<'a, B>(
    drafts: &[RecordDraft<B>],
    pending: &'a [PendingAddress],
) -> Vec<&'a PendingAddress> {
    pending
        .iter()
        .filter(|p| {
            drafts
                .iter()
                .any(|d| d.address.as_ref().and_then(AddressRef::draft_id) == Some(&p.draft_id))
        })
        .collect()
}

/// Create the referenced pending addresses one after another. Under
/// fail-fast the loop stops at the first failure.
async fn persist_pending_addresses<S: AddressStore + ?Sized>(
    store: &S,
    tenant: &TenantContext,
    pending: &[&PendingAddress],
    policy: AddressFailurePolicy,
) -> AddressResolution {
    let mut resolution = AddressResolution::default();

    for address in pending {
        let result = store
            .create_address(&tenant.tenant_id, &address.customer_id, address.address.clone())
            .await;
        let status = match result {
            Ok(created) => {
                log::info!(
                    "{} created address {} for customer {} (draft {})",
                    tenant.actor(),
                    created.id,
                    address.customer_id,
                    address.draft_id
                );
                resolution
                    .ids
                    .insert(address.draft_id.clone(), created.id.clone());
                AddressStatus::Created {
                    address_id: created.id,
                }
            }
            Err(e) => {
                log::warn!("Failed to save pending address {}: {}", address.draft_id, e);
                AddressStatus::Failed {
                    error: e.to_string(),
                }
            }
        };
        let failed = matches!(status, AddressStatus::Failed { .. });
        resolution.outcomes.push(AddressOutcome {
            draft_id: address.draft_id.clone(),
            status,
        });
        if failed && policy == AddressFailurePolicy::FailFast {
            break;
        }
    }

    resolution
}

/// Validate, persist the pending addresses the draft references, then
/// persist the record with durable address ids only.
pub async fn submit<S, B>(
    store: &S,
    tenant: &TenantContext,
    mode: SubmitMode,
    submission: Submission<B>,
    policy: AddressFailurePolicy,
) -> Result<SubmissionReport<<S as RecordSink<B>>::Record>, SubmissionError>
where
    S: AddressStore + RecordSink<B> + ?Sized,
    B: Validate + Send + Sync + 'static,
{
    let Submission {
        draft,
        pending_addresses,
    } = submission;

    let mut errors = check_draft(&draft, &pending_addresses);
    errors.merge(check_persisted_address(store, tenant, &draft).await?);
    if !errors.is_empty() {
        return Err(SubmissionError::Validation(errors));
    }

    let drafts = std::slice::from_ref(&draft);
    let referenced = referenced_pending(drafts, &pending_addresses);
    let resolution = persist_pending_addresses(store, tenant, &referenced, policy).await;
    if resolution.has_failures() {
        return Err(SubmissionError::AddressPersistence {
            outcomes: resolution.outcomes,
        });
    }

    let address_id = resolution
        .resolve(draft.address.as_ref())
        .map_err(SubmissionError::UnresolvedAddress)?;
    let payload = draft.into_payload(address_id);

    let record = match mode {
        SubmitMode::Create => store
            .create_record(&tenant.tenant_id, payload)
            .await
            .map_err(|e| SubmissionError::Persistence(e.to_string()))?,
        SubmitMode::Update(id) => store
            .update_record(&tenant.tenant_id, &id, payload)
            .await
            .map_err(|e| SubmissionError::Persistence(e.to_string()))?
            .ok_or(SubmissionError::NotFound(id))?,
    };

    Ok(SubmissionReport {
        record,
        addresses: resolution.outcomes,
    })
}

/// Create several records that share one set of pending addresses
pub async fn submit_batch<S, B>(
    store: &S,
    tenant: &TenantContext,
    drafts: Vec<RecordDraft<B>>,
    pending_addresses: Vec<PendingAddress>,
    policy: AddressFailurePolicy,
) -> Result<BatchReport<<S as RecordSink<B>>::Record>, SubmissionError>
where
    S: AddressStore + RecordSink<B> + ?Sized,
    B: Validate + Send + Sync + 'static,
{
    let mut errors = ValidationErrors::new();
    for (i, draft) in drafts.iter().enumerate() {
        let mut draft_errors = check_draft(draft, &pending_addresses);
        draft_errors.merge(check_persisted_address(store, tenant, draft).await?);
        errors.merge(draft_errors.prefixed(&format!("record-{}-", i)));
    }
    if !errors.is_empty() {
        return Err(SubmissionError::Validation(errors));
    }

    let referenced = referenced_pending(&drafts, &pending_addresses);
    let resolution = persist_pending_addresses(store, tenant, &referenced, policy).await;
    if resolution.has_failures() && policy == AddressFailurePolicy::FailFast {
        return Err(SubmissionError::AddressPersistence {
            outcomes: resolution.outcomes,
        });
    }

    let mut records = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let address_id = match resolution.resolve(draft.address.as_ref()) {
            Ok(address_id) => address_id,
            Err(draft_id) => {
                records.push(RecordOutcome::Skipped {
                    reason: format!("Address {} could not be saved", draft_id),
                });
                continue;
            }
        };
        match store
            .create_record(&tenant.tenant_id, draft.into_payload(address_id))
            .await
        {
            Ok(record) => records.push(RecordOutcome::Saved { record }),
            Err(e) => {
                log::warn!("Failed to save record in batch: {}", e);
                records.push(RecordOutcome::Failed {
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(BatchReport {
        addresses: resolution.outcomes,
        records,
    })
}
