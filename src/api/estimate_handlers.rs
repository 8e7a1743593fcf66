use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::api::handlers::{
    internal_error, not_found, submission_error, ApiError, AppState, ErrorResponse, ListResponse,
};
use crate::logic::{
    estimate_totals, submit, EstimateTotals, EstimateValidator, PricingError, RecordSink,
    Submission, SubmissionReport, SubmitMode, Validate, ValidationErrors,
};
use crate::model::{Estimate, EstimateBody, EstimateOption, Id, TenantContext};
use crate::store::traits::Store;

#[derive(Debug, Deserialize)]
pub struct RecordListQuery {
    pub customer_id: Option<Id>,
}

/// Stored estimate with totals recomputed from its line items
#[derive(Debug, Serialize)]
pub struct EstimateWithTotals {
    #[serde(flatten)]
    pub estimate: Estimate,
    pub totals: EstimateTotals,
}

impl TryFrom<Estimate> for EstimateWithTotals {
    type Error = PricingError;

    fn try_from(estimate: Estimate) -> Result<Self, PricingError> {
        let totals = estimate_totals(&estimate.body.options, estimate.body.tax_rate)?.rounded();
        Ok(Self { estimate, totals })
    }
}

fn pricing_error(e: PricingError) -> ApiError {
    log::warn!("Failed to price estimate: {}", e);
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse::new(&e.to_string())),
    )
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    /// Falls back to the configured default when absent
    #[serde(default)]
    pub tax_rate: Option<Decimal>,
    #[serde(default)]
    pub options: Vec<EstimateOption>,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub tax_rate: Decimal,
    /// Absent when the amounts cannot be priced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totals: Option<EstimateTotals>,
    pub valid: bool,
    pub errors: ValidationErrors,
}

/// Totals and validation for unsaved options; nothing is persisted
pub async fn preview_estimate<S: Store>(
    State(state): State<AppState<S>>,
    _tenant: TenantContext,
    RequestJson(request): RequestJson<PreviewRequest>,
) -> Json<PreviewResponse> {
    let tax_rate = request.tax_rate.unwrap_or(state.settings.default_tax_rate);
    let mut errors = EstimateValidator::validate_tax_rate(tax_rate);
    errors.merge(EstimateValidator::validate_options(&request.options));

    let totals = match estimate_totals(&request.options, tax_rate) {
        Ok(totals) => Some(totals.rounded()),
        Err(e) => {
            errors.add("totals", e.to_string());
            None
        }
    };

    Json(PreviewResponse {
        tax_rate,
        totals,
        valid: errors.is_empty(),
        errors,
    })
}

pub async fn list_estimates<S: Store>(
    State(state): State<AppState<S>>,
    tenant: TenantContext,
    Query(query): Query<RecordListQuery>,
) -> Result<Json<ListResponse<Estimate>>, ApiError> {
    match state
        .store
        .list_estimates(&tenant.tenant_id, query.customer_id.as_ref())
        .await
    {
        Ok(estimates) => Ok(Json(estimates.into())),
        Err(e) => Err(internal_error("Failed to list estimates", e)),
    }
}

pub async fn get_estimate<S: Store>(
    State(state): State<AppState<S>>,
    tenant: TenantContext,
    Path(id): Path<Id>,
) -> Result<Json<EstimateWithTotals>, ApiError> {
    match state.store.get_estimate(&tenant.tenant_id, &id).await {
        Ok(Some(estimate)) => EstimateWithTotals::try_from(estimate).map(Json).map_err(pricing_error),
        Ok(None) => Err(not_found("Estimate not found")),
        Err(e) => Err(internal_error("Failed to fetch estimate", e)),
    }
}

/// Shared by every record kind: persist staged addresses, then the record
pub(crate) async fn submit_record<S, B>(
    state: &AppState<S>,
    tenant: &TenantContext,
    mode: SubmitMode,
    submission: Submission<B>,
) -> Result<SubmissionReport<<S as RecordSink<B>>::Record>, ApiError>
where
    S: Store + RecordSink<B>,
    B: Validate + Send + Sync + 'static,
{
    submit(
        &*state.store,
        tenant,
        mode,
        submission,
        state.settings.address_failure_policy,
    )
    .await
    .map_err(submission_error)
}

pub async fn create_estimate<S: Store>(
    State(state): State<AppState<S>>,
    tenant: TenantContext,
    RequestJson(submission): RequestJson<Submission<EstimateBody>>,
) -> Result<(StatusCode, Json<SubmissionReport<EstimateWithTotals>>), ApiError> {
    let report = submit_record(&state, &tenant, SubmitMode::Create, submission).await?;
    log::info!(
        "{} created estimate {} for customer {}",
        tenant.actor(),
        report.record.id,
        report.record.customer_id
    );

    Ok((
        StatusCode::CREATED,
        Json(SubmissionReport {
            record: EstimateWithTotals::try_from(report.record).map_err(pricing_error)?,
            addresses: report.addresses,
        }),
    ))
}

pub async fn update_estimate<S: Store>(
    State(state): State<AppState<S>>,
    tenant: TenantContext,
    Path(id): Path<Id>,
    RequestJson(submission): RequestJson<Submission<EstimateBody>>,
) -> Result<Json<SubmissionReport<EstimateWithTotals>>, ApiError> {
    let report = submit_record(&state, &tenant, SubmitMode::Update(id), submission).await?;
    log::info!("{} updated estimate {}", tenant.actor(), report.record.id);

    Ok(Json(SubmissionReport {
        record: EstimateWithTotals::try_from(report.record).map_err(pricing_error)?,
        addresses: report.addresses,
    }))
}

pub async fn delete_estimate<S: Store>(
    State(state): State<AppState<S>>,
    tenant: TenantContext,
    Path(id): Path<Id>,
) -> Result<StatusCode, ApiError> {
    match state.store.delete_estimate(&tenant.tenant_id, &id).await {
        Ok(true) => {
            log::info!("{} deleted estimate {}", tenant.actor(), id);
            Ok(StatusCode::NO_CONTENT)
        }
        Ok(false) => Err(not_found("Estimate not found")),
        Err(e) => Err(internal_error("Failed to delete estimate", e)),
    }
}
