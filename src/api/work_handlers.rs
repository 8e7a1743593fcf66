use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};

use crate::api::estimate_handlers::{submit_record, RecordListQuery};
use crate::api::handlers::{internal_error, not_found, ApiError, AppState, ListResponse};
use crate::logic::{Submission, SubmissionReport, SubmitMode};
use crate::model::{Id, Job, JobBody, ServiceRequest, ServiceRequestBody, TenantContext};
use crate::store::traits::Store;

pub async fn list_jobs<S: Store>(
    State(state): State<AppState<S>>,
    tenant: TenantContext,
    Query(query): Query<RecordListQuery>,
) -> Result<Json<ListResponse<Job>>, ApiError> {
    match state
        .store
        .list_jobs(&tenant.tenant_id, query.customer_id.as_ref())
        .await
    {
        Ok(jobs) => Ok(Json(jobs.into())),
        Err(e) => Err(internal_error("Failed to list jobs", e)),
    }
}

pub async fn get_job<S: Store>(
    State(state): State<AppState<S>>,
    tenant: TenantContext,
    Path(id): Path<Id>,
) -> Result<Json<Job>, ApiError> {
    match state.store.get_job(&tenant.tenant_id, &id).await {
        Ok(Some(job)) => Ok(Json(job)),
        Ok(None) => Err(not_found("Job not found")),
        Err(e) => Err(internal_error("Failed to fetch job", e)),
    }
}

pub async fn create_job<S: Store>(
    State(state): State<AppState<S>>,
    tenant: TenantContext,
    RequestJson(submission): RequestJson<Submission<JobBody>>,
) -> Result<(StatusCode, Json<SubmissionReport<Job>>), ApiError> {
    let report = submit_record(&state, &tenant, SubmitMode::Create, submission).await?;
    log::info!("{} scheduled job {}", tenant.actor(), report.record.id);
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn update_job<S: Store>(
    State(state): State<AppState<S>>,
    tenant: TenantContext,
    Path(id): Path<Id>,
    RequestJson(submission): RequestJson<Submission<JobBody>>,
) -> Result<Json<SubmissionReport<Job>>, ApiError> {
    let report = submit_record(&state, &tenant, SubmitMode::Update(id), submission).await?;
    log::info!("{} updated job {}", tenant.actor(), report.record.id);
    Ok(Json(report))
}

pub async fn list_service_requests<S: Store>(
    State(state): State<AppState<S>>,
    tenant: TenantContext,
    Query(query): Query<RecordListQuery>,
) -> Result<Json<ListResponse<ServiceRequest>>, ApiError> {
    match state
        .store
        .list_service_requests(&tenant.tenant_id, query.customer_id.as_ref())
        .await
    {
        Ok(requests) => Ok(Json(requests.into())),
        Err(e) => Err(internal_error("Failed to list service requests", e)),
    }
}

pub async fn get_service_request<S: Store>(
    State(state): State<AppState<S>>,
    tenant: TenantContext,
    Path(id): Path<Id>,
) -> Result<Json<ServiceRequest>, ApiError> {
    match state.store.get_service_request(&tenant.tenant_id, &id).await {
        Ok(Some(request)) => Ok(Json(request)),
        Ok(None) => Err(not_found("Service request not found")),
        Err(e) => Err(internal_error("Failed to fetch service request", e)),
    }
}

pub async fn create_service_request<S: Store>(
    State(state): State<AppState<S>>,
    tenant: TenantContext,
    RequestJson(submission): RequestJson<Submission<ServiceRequestBody>>,
) -> Result<(StatusCode, Json<SubmissionReport<ServiceRequest>>), ApiError> {
    let report = submit_record(&state, &tenant, SubmitMode::Create, submission).await?;
    log::info!("{} opened service request {}", tenant.actor(), report.record.id);
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn update_service_request<S: Store>(
    State(state): State<AppState<S>>,
    tenant: TenantContext,
    Path(id): Path<Id>,
    RequestJson(submission): RequestJson<Submission<ServiceRequestBody>>,
) -> Result<Json<SubmissionReport<ServiceRequest>>, ApiError> {
    let report = submit_record(&state, &tenant, SubmitMode::Update(id), submission).await?;
    log::info!("{} updated service request {}", tenant.actor(), report.record.id);
    Ok(Json(report))
}
