use field_service_rust::api::{routes::create_router, AppState};
use field_service_rust::store::MemoryStore;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

const TENANT: &str = "tenant-acme";

// Test client wrapper for making API calls as one tenant
struct TestClient {
    client: Client,
    base_url: String,
    tenant_id: String,
}

impl TestClient {
    fn new(base_url: String, tenant_id: &str) -> Self {
        Self {
            client: Client::new(),
            base_url,
            tenant_id: tenant_id.to_string(),
        }
    }

    fn as_tenant(&self, tenant_id: &str) -> Self {
        Self::new(self.base_url.clone(), tenant_id)
    }

    async fn post(&self, path: &str, json: Value) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(&format!("{}{}", self.base_url, path))
            .header("X-Tenant-Id", &self.tenant_id)
            .header("X-User-Id", "dispatcher-1")
            .json(&json)
            .send()
            .await
    }

    async fn put(&self, path: &str, json: Value) -> reqwest::Result<reqwest::Response> {
        self.client
            .put(&format!("{}{}", self.base_url, path))
            .header("X-Tenant-Id", &self.tenant_id)
            .json(&json)
            .send()
            .await
    }

    async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .get(&format!("{}{}", self.base_url, path))
            .header("X-Tenant-Id", &self.tenant_id)
            .send()
            .await
    }

    async fn delete(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .delete(&format!("{}{}", self.base_url, path))
            .header("X-Tenant-Id", &self.tenant_id)
            .send()
            .await
    }
}

/// Serve the router over an ephemeral port backed by a fresh memory store
async fn spawn_server() -> String {
    let app = create_router().with_state(AppState::new(Arc::new(MemoryStore::new())));
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let address = listener.local_addr().expect("No local address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    format!("http://{}", address)
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("Invalid decimal string"),
        other => other.to_string().parse().expect("Invalid decimal number"),
    }
}

async fn json_body(response: reqwest::Response) -> Value {
    response.json().await.expect("Response was not JSON")
}

async fn create_customer(client: &TestClient) -> (String, String) {
    let response = client
        .post(
            "/customers",
            json!({
                "name": "Jane Doe",
                "email": "jane@example.com",
                "addresses": [
                    {"street": "12 Oak Lane", "city": "Springfield", "state": "IL", "zip": "62701", "type": "PRIMARY"}
                ]
            }),
        )
        .await
        .expect("Failed to create customer");
    assert_eq!(response.status(), StatusCode::CREATED);
    let customer = json_body(response).await;
    let customer_id = customer["id"].as_str().unwrap().to_string();

    let detail = json_body(client.get(&format!("/customers/{}", customer_id)).await.unwrap()).await;
    let primary_id = detail["addresses"][0]["id"].as_str().unwrap().to_string();
    (customer_id, primary_id)
}

fn estimate_body(customer_id: &str, address: Value) -> Value {
    json!({
        "customer_id": customer_id,
        "address": address,
        "title": "Furnace replacement",
        "tax_rate": "8.0",
        "options": [
            {
                "name": "Standard",
                "is_recommended": true,
                "discount_type": "PERCENTAGE",
                "discount_value": "10",
                "line_items": [
                    {"kind": "SERVICE", "name": "Service", "quantity": "1", "unit_price": "150.00", "unit_cost": "60.00"},
                    {"kind": "MATERIAL", "name": "Material", "quantity": "2", "unit_price": "25.00", "unit_cost": "10.00"}
                ]
            }
        ]
    })
}

#[tokio::test]
async fn test_estimate_with_same_as_primary_address() {
    let client = TestClient::new(spawn_server().await, TENANT);

    let health = client.get("/health").await.expect("Health check failed");
    assert!(health.status().is_success());

    // 1. Customer with only a primary address
    let (customer_id, primary_id) = create_customer(&client).await;

    // 2. "Same as primary" stages a service copy since no service address matches
    let outcome = json_body(
        client
            .post(&format!("/customers/{}/addresses/same-as-primary", customer_id), json!({}))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(outcome["outcome"], "stage");
    let pending = outcome["pending"].clone();
    assert_eq!(pending["origin"], "SAME_AS_PRIMARY");
    assert_eq!(pending["address"]["type"], "SERVICE");
    let draft_id = pending["draft_id"].as_str().unwrap().to_string();

    // 3. Submit the estimate pointing at the pending address
    let response = client
        .post(
            "/estimates",
            json!({
                "draft": estimate_body(&customer_id, json!({"kind": "pending", "draft_id": draft_id})),
                "pending_addresses": [pending]
            }),
        )
        .await
        .expect("Failed to create estimate");
    assert_eq!(response.status(), StatusCode::CREATED);
    let report = json_body(response).await;

    assert_eq!(report["addresses"][0]["status"], "created");
    let service_address_id = report["addresses"][0]["address_id"].as_str().unwrap().to_string();
    assert_ne!(service_address_id, primary_id);
    assert_eq!(report["record"]["address_id"], service_address_id.as_str());

    let estimate_id = report["record"]["id"].as_str().unwrap().to_string();

    // 4. Totals are recomputed on read
    let estimate = json_body(client.get(&format!("/estimates/{}", estimate_id)).await.unwrap()).await;
    let totals = &estimate["totals"];
    assert_eq!(decimal(&totals["subtotal"]), Decimal::new(200, 0));
    assert_eq!(decimal(&totals["discount_amount"]), Decimal::new(20, 0));
    assert_eq!(decimal(&totals["tax_amount"]), Decimal::new(1440, 2));
    assert_eq!(decimal(&totals["total"]), Decimal::new(19440, 2));
    assert_eq!(decimal(&totals["gross_profit"]), Decimal::new(100, 0));

    // 5. The service copy now exists, so the next reconciliation reuses it
    let outcome = json_body(
        client
            .post(&format!("/customers/{}/addresses/same-as-primary", customer_id), json!({}))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(outcome["outcome"], "reuse");
    assert_eq!(outcome["address_id"], service_address_id.as_str());

    let addresses = json_body(
        client
            .get(&format!("/customers/{}/addresses", customer_id))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(addresses["total"], 2);

    // 6. Update keeps the durable address and applies the new title
    let mut body = estimate_body(&customer_id, json!({"kind": "persisted", "id": service_address_id}));
    body["title"] = json!("Furnace replacement (revised)");
    let updated = client
        .put(&format!("/estimates/{}", estimate_id), json!({"draft": body}))
        .await
        .unwrap();
    assert_eq!(updated.status(), StatusCode::OK);
    let updated = json_body(updated).await;
    assert_eq!(updated["record"]["title"], "Furnace replacement (revised)");
    assert_eq!(updated["addresses"].as_array().unwrap().len(), 0);

    let listed = json_body(
        client
            .get(&format!("/estimates?customer_id={}", customer_id))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(listed["total"], 1);

    // 7. Delete
    let deleted = client.delete(&format!("/estimates/{}", estimate_id)).await.unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    let missing = client.get(&format!("/estimates/{}", estimate_id)).await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_validation_errors_are_reported_per_field() {
    let client = TestClient::new(spawn_server().await, TENANT);
    let (customer_id, _) = create_customer(&client).await;

    let mut body = estimate_body(&customer_id, Value::Null);
    body["title"] = json!("  ");
    body["options"] = json!([
        {"name": "Basic", "line_items": [{"kind": "LABOR", "name": "Labor", "quantity": "1", "unit_price": "90"}]},
        {"name": " basic ", "line_items": [{"kind": "LABOR", "name": "Labor", "quantity": "1", "unit_price": "-5"}]}
    ]);

    let response = client.post("/estimates", json!({"draft": body})).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let error = json_body(response).await;
    let fields = &error["fields"];
    assert!(fields.get("title").is_some());
    assert!(fields.get("duplicateOptions").is_some());
    assert!(fields.get("item-1-0-unitPrice").is_some());

    let listed = json_body(client.get("/estimates").await.unwrap()).await;
    assert_eq!(listed["total"], 0);
}

#[tokio::test]
async fn test_preview_uses_default_tax_rate() {
    let client = TestClient::new(spawn_server().await, TENANT);

    let preview = json_body(
        client
            .post(
                "/estimates/preview",
                json!({
                    "options": [
                        {"name": "Tune-up", "line_items": [
                            {"kind": "SERVICE", "name": "Tune-up", "quantity": "1", "unit_price": "100"}
                        ]}
                    ]
                }),
            )
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(preview["valid"], true);
    assert_eq!(decimal(&preview["tax_rate"]), Decimal::new(75, 1));
    assert_eq!(decimal(&preview["totals"]["total"]), Decimal::new(10750, 2));
}

#[tokio::test]
async fn test_tenants_are_isolated() {
    let client = TestClient::new(spawn_server().await, TENANT);
    let (customer_id, _) = create_customer(&client).await;

    let other = client.as_tenant("tenant-other");
    let response = other.get(&format!("/customers/{}", customer_id)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let listed = json_body(other.get("/customers").await.unwrap()).await;
    assert_eq!(listed["total"], 0);

    let anonymous = Client::new()
        .get(&format!("{}/customers", client.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_job_and_service_request_share_pending_address_flow() {
    let client = TestClient::new(spawn_server().await, TENANT);
    let (customer_id, _) = create_customer(&client).await;

    let pending = json!({
        "draft_id": "draft-garage",
        "customer_id": customer_id,
        "origin": "USER_ENTERED",
        "address": {"street": "40 Mill Rd", "city": "Springfield", "state": "IL", "zip": "62704", "type": "SERVICE"}
    });

    let response = client
        .post(
            "/jobs",
            json!({
                "draft": {
                    "customer_id": customer_id,
                    "address": {"kind": "pending", "draft_id": "draft-garage"},
                    "title": "Install thermostat"
                },
                "pending_addresses": [pending]
            }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let job = json_body(response).await;
    assert_eq!(job["record"]["status"], "SCHEDULED");
    let address_id = job["addresses"][0]["address_id"].as_str().unwrap().to_string();
    assert_eq!(job["record"]["address_id"], address_id.as_str());

    let response = client
        .post(
            "/service-requests",
            json!({
                "draft": {
                    "customer_id": customer_id,
                    "address": {"kind": "persisted", "id": address_id},
                    "title": "No heat upstairs",
                    "priority": "URGENT"
                }
            }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let request = json_body(response).await;
    assert_eq!(request["record"]["priority"], "URGENT");

    let jobs = json_body(client.get("/jobs").await.unwrap()).await;
    assert_eq!(jobs["total"], 1);
    let requests = json_body(client.get("/service-requests").await.unwrap()).await;
    assert_eq!(requests["total"], 1);
}
