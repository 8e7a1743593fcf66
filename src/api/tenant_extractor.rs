use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};

use crate::model::TenantContext;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_HEADER: &str = "x-user-id";

/// Axum extractor for TenantContext from request headers
///
/// - X-Tenant-Id: Required tenant identifier, 400 when missing or blank
/// - X-User-Id: Optional acting user, only used for logging
#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        tenant_from_headers(&parts.headers).ok_or(StatusCode::BAD_REQUEST)
    }
}

fn tenant_from_headers(headers: &HeaderMap) -> Option<TenantContext> {
    let tenant_id = extract_header_value(headers, TENANT_HEADER)?;
    Some(TenantContext::with_user(
        tenant_id,
        extract_header_value(headers, USER_HEADER),
    ))
}

/// Extract a non-blank header value as string
fn extract_header_value(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|s| s.to_string())
}
