use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::api::{estimate_handlers, handlers, work_handlers, AppState};
use crate::store::traits::Store;

pub fn create_router<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Customer directory
        .route(
            "/customers",
            get(handlers::list_customers::<S>).post(handlers::create_customer::<S>),
        )
        .route(
            "/customers/:customer_id",
            get(handlers::get_customer::<S>).delete(handlers::delete_customer::<S>),
        )
        .route(
            "/customers/:customer_id/addresses",
            get(handlers::list_addresses::<S>).post(handlers::create_address::<S>),
        )
        .route(
            "/customers/:customer_id/addresses/same-as-primary",
            post(handlers::same_as_primary::<S>),
        )
        // Estimates
        .route(
            "/estimates/preview",
            post(estimate_handlers::preview_estimate::<S>),
        )
        .route(
            "/estimates",
            get(estimate_handlers::list_estimates::<S>).post(estimate_handlers::create_estimate::<S>),
        )
        .route(
            "/estimates/:id",
            get(estimate_handlers::get_estimate::<S>)
                .put(estimate_handlers::update_estimate::<S>)
                .delete(estimate_handlers::delete_estimate::<S>),
        )
        // Jobs
        .route(
            "/jobs",
            get(work_handlers::list_jobs::<S>).post(work_handlers::create_job::<S>),
        )
        .route(
            "/jobs/:id",
            get(work_handlers::get_job::<S>).put(work_handlers::update_job::<S>),
        )
        // Service requests
        .route(
            "/service-requests",
            get(work_handlers::list_service_requests::<S>)
                .post(work_handlers::create_service_request::<S>),
        )
        .route(
            "/service-requests/:id",
            get(work_handlers::get_service_request::<S>)
                .put(work_handlers::update_service_request::<S>),
        )
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        create_router().with_state(AppState::new(Arc::new(MemoryStore::new())))
    }

    fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-tenant-id", "tenant-1")
            .header("content-type", "application/json");
        match body {
            Some(json) => builder.body(Body::from(json.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_needs_no_tenant() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_same_as_primary_for_unknown_customer_is_not_found() {
        let response = app()
            .oneshot(request("POST", "/customers/missing/addresses/same-as-primary", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_same_as_primary_without_primary_address() {
        let app = app();
        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/customers",
                Some(serde_json::json!({
                    "name": "Billing Only",
                    "addresses": [
                        {"street": "1 Ledger Way", "city": "Springfield", "state": "IL", "zip": "62701", "type": "BILLING"}
                    ]
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let customer = read_json(response).await;
        let id = customer["id"].as_str().unwrap();

        let response = app
            .oneshot(request(
                "POST",
                &format!("/customers/{}/addresses/same-as-primary", id),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["outcome"], "no_primary");
    }

    #[tokio::test]
    async fn test_blank_customer_name_is_unprocessable() {
        let response = app()
            .oneshot(request("POST", "/customers", Some(serde_json::json!({"name": " "}))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let error = read_json(response).await;
        assert!(error["fields"]["name"].is_string());
    }

    #[tokio::test]
    async fn test_preview_with_unpriceable_amounts_reports_errors() {
        let response = app()
            .oneshot(request(
                "POST",
                "/estimates/preview",
                Some(serde_json::json!({
                    "options": [{
                        "name": "Runaway",
                        "line_items": [{
                            "kind": "MATERIAL",
                            "name": "Pipe",
                            "quantity": "10000000000000000",
                            "unit_price": "10000000000000000"
                        }]
                    }]
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let preview = read_json(response).await;
        assert_eq!(preview["valid"], false);
        assert!(preview["errors"]["item-0-0-quantity"].is_string());
        assert!(preview["errors"]["item-0-0-unitPrice"].is_string());
        assert!(preview.get("totals").is_none());
    }
}
