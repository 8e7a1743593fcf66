use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, types::Json, PgPool, Row};

use crate::model::{
    generate_id, Address, AddressType, Customer, CustomerFilter, Estimate, EstimateBody,
    EstimateOption, EstimatePayload, EstimateStatus, Id, Job, JobBody, JobPayload, JobStatus,
    NewAddress, NewCustomer, RequestPriority, RequestStatus, ServiceRequest, ServiceRequestBody,
    ServiceRequestPayload,
};
use crate::store::traits::{
    AddressStore, CustomerStore, EstimateStore, JobStore, ServiceRequestStore, Store,
};

const CUSTOMER_COLUMNS: &str = "id, tenant_id, name, email, phone, company_name, created_at";
const ADDRESS_COLUMNS: &str =
    "id, customer_id, street, city, state, zip, address_type, is_primary, created_at";
const ESTIMATE_COLUMNS: &str =
    "id, tenant_id, customer_id, address_id, title, tax_rate, status, options, created_at, updated_at";
const JOB_COLUMNS: &str = "id, tenant_id, customer_id, address_id, title, description, status, scheduled_start, scheduled_end, created_at, updated_at";
const SERVICE_REQUEST_COLUMNS: &str = "id, tenant_id, customer_id, address_id, title, description, priority, status, created_at, updated_at";

/// Record writes bind tenant as $1, customer as $3 and address as $4.
/// The customer must be in the tenant and the address, when set, must be the customer's.
const RECORD_REFERENCES_GUARD: &str = r#"
    EXISTS (SELECT 1 FROM customers WHERE tenant_id = $1 AND id = $3)
    AND ($4::TEXT IS NULL OR EXISTS (
        SELECT 1 FROM addresses WHERE tenant_id = $1 AND id = $4 AND customer_id = $3
    ))"#;

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Explain why a guarded record write matched no row
    async fn check_references(&self, tenant_id: &Id, customer_id: &Id, address_id: Option<&Id>) -> Result<()> {
        let row = sqlx::query(
            r#"
            SELECT
                EXISTS (SELECT 1 FROM customers WHERE tenant_id = $1 AND id = $2) AS customer_known,
                (SELECT customer_id FROM addresses WHERE tenant_id = $1 AND id = $3) AS address_owner
            "#,
        )
        .bind(tenant_id)
        .bind(customer_id)
        .bind(address_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check record references")?;

        let customer_known: bool = row.try_get("customer_known")?;
        if !customer_known {
            return Err(anyhow!("Customer '{}' not found", customer_id));
        }
        if let Some(address_id) = address_id {
            let owner: Option<String> = row.try_get("address_owner")?;
            match owner {
                None => return Err(anyhow!("Address '{}' not found", address_id)),
                Some(owner) if &owner != customer_id => {
                    return Err(anyhow!(
                        "Address '{}' does not belong to customer '{}'",
                        address_id,
                        customer_id
                    ))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// A guarded insert returned nothing: report the broken reference
    async fn rejected_insert<T>(&self, tenant_id: &Id, customer_id: &Id, address_id: Option<&Id>) -> Result<T> {
        self.check_references(tenant_id, customer_id, address_id).await?;
        Err(anyhow!("Customer or address changed while saving"))
    }

    /// A guarded update returned nothing: either the references are broken or the record is missing
    async fn rejected_update<T>(&self, tenant_id: &Id, customer_id: &Id, address_id: Option<&Id>) -> Result<Option<T>> {
        self.check_references(tenant_id, customer_id, address_id).await?;
        Ok(None)
    }
}

fn customer_from_row(row: &PgRow) -> Result<Customer> {
    Ok(Customer {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        company_name: row.try_get("company_name")?,
        created_at: row.try_get("created_at")?,
    })
}

fn address_from_row(row: &PgRow) -> Result<Address> {
    let address_type: String = row.try_get("address_type")?;
    Ok(Address {
        id: row.try_get("id")?,
        customer_id: row.try_get("customer_id")?,
        street: row.try_get("street")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        zip: row.try_get("zip")?,
        address_type: AddressType::parse(&address_type)
            .ok_or_else(|| anyhow!("Unknown address type '{}'", address_type))?,
        is_primary: row.try_get("is_primary")?,
        created_at: row.try_get("created_at")?,
    })
}

fn estimate_from_row(row: &PgRow) -> Result<Estimate> {
    let status: String = row.try_get("status")?;
    let options: Json<Vec<EstimateOption>> = row.try_get("options")?;
    Ok(Estimate {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        customer_id: row.try_get("customer_id")?,
        address_id: row.try_get("address_id")?,
        body: EstimateBody {
            title: row.try_get("title")?,
            tax_rate: row.try_get("tax_rate")?,
            status: EstimateStatus::parse(&status).unwrap_or_default(),
            options: options.0,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn job_from_row(row: &PgRow) -> Result<Job> {
    let status: String = row.try_get("status")?;
    Ok(Job {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        customer_id: row.try_get("customer_id")?,
        address_id: row.try_get("address_id")?,
        body: JobBody {
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            status: JobStatus::parse(&status).unwrap_or_default(),
            scheduled_start: row.try_get("scheduled_start")?,
            scheduled_end: row.try_get("scheduled_end")?,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn service_request_from_row(row: &PgRow) -> Result<ServiceRequest> {
    let priority: String = row.try_get("priority")?;
    let status: String = row.try_get("status")?;
    Ok(ServiceRequest {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        customer_id: row.try_get("customer_id")?,
        address_id: row.try_get("address_id")?,
        body: ServiceRequestBody {
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            priority: RequestPriority::parse(&priority).unwrap_or_default(),
            status: RequestStatus::parse(&status).unwrap_or_default(),
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait::async_trait]
impl CustomerStore for PostgresStore {
    async fn get_customer(&self, tenant_id: &Id, id: &Id) -> Result<Option<Customer>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM customers WHERE tenant_id = $1 AND id = $2",
            CUSTOMER_COLUMNS
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch customer")?;

        row.as_ref().map(customer_from_row).transpose()
    }

    async fn list_customers(&self, tenant_id: &Id, filter: &CustomerFilter) -> Result<Vec<Customer>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM customers
            WHERE tenant_id = $1
              AND ($2::TEXT IS NULL OR name ILIKE $2 OR email ILIKE $2 OR company_name ILIKE $2)
            ORDER BY created_at
            "#,
            CUSTOMER_COLUMNS
        ))
        .bind(tenant_id)
        .bind(search)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list customers")?;

        rows.iter().map(customer_from_row).collect()
    }

    async fn create_customer(&self, tenant_id: &Id, customer: NewCustomer) -> Result<Customer> {
        let addresses = customer.addresses.clone();
        let created = customer.into_customer(tenant_id);

        let mut tx = self.pool.begin().await.context("Failed to start transaction")?;

        sqlx::query(
            r#"
            INSERT INTO customers (id, tenant_id, name, email, phone, company_name, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&created.id)
        .bind(&created.tenant_id)
        .bind(&created.name)
        .bind(&created.email)
        .bind(&created.phone)
        .bind(&created.company_name)
        .bind(created.created_at)
        .execute(&mut *tx)
        .await
        .context("Failed to insert customer")?;

        for address in addresses {
            let address = address.into_address(&created.id);
            sqlx::query(
                r#"
                INSERT INTO addresses (id, tenant_id, customer_id, street, city, state, zip, address_type, is_primary, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(&address.id)
            .bind(tenant_id)
            .bind(&address.customer_id)
            .bind(&address.street)
            .bind(&address.city)
            .bind(&address.state)
            .bind(&address.zip)
            .bind(address.address_type.as_str())
            .bind(address.is_primary)
            .bind(address.created_at)
            .execute(&mut *tx)
            .await
            .context("Failed to insert customer address")?;
        }

        tx.commit().await.context("Failed to commit customer")?;
        Ok(created)
    }

    async fn delete_customer(&self, tenant_id: &Id, id: &Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM customers WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete customer")?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl AddressStore for PostgresStore {
    async fn get_address(&self, tenant_id: &Id, id: &Id) -> Result<Option<Address>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM addresses WHERE tenant_id = $1 AND id = $2",
            ADDRESS_COLUMNS
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch address")?;

        row.as_ref().map(address_from_row).transpose()
    }

    async fn list_addresses_for_customer(&self, tenant_id: &Id, customer_id: &Id) -> Result<Vec<Address>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM addresses WHERE tenant_id = $1 AND customer_id = $2 ORDER BY created_at",
            ADDRESS_COLUMNS
        ))
        .bind(tenant_id)
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list addresses")?;

        rows.iter().map(address_from_row).collect()
    }

    async fn create_address(&self, tenant_id: &Id, customer_id: &Id, address: NewAddress) -> Result<Address> {
        let address = address.into_address(customer_id);

        // Only insert when the customer belongs to the tenant
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO addresses (id, tenant_id, customer_id, street, city, state, zip, address_type, is_primary, created_at)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10
            WHERE EXISTS (SELECT 1 FROM customers WHERE tenant_id = $2 AND id = $3)
            RETURNING {}
            "#,
            ADDRESS_COLUMNS
        ))
        .bind(&address.id)
        .bind(tenant_id)
        .bind(&address.customer_id)
        .bind(&address.street)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.zip)
        .bind(address.address_type.as_str())
        .bind(address.is_primary)
        .bind(address.created_at)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to create address")?;

        match row {
            Some(row) => address_from_row(&row),
            None => Err(anyhow!("Customer '{}' not found", customer_id)),
        }
    }
}

#[async_trait::async_trait]
impl EstimateStore for PostgresStore {
    async fn get_estimate(&self, tenant_id: &Id, id: &Id) -> Result<Option<Estimate>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM estimates WHERE tenant_id = $1 AND id = $2",
            ESTIMATE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch estimate")?;

        row.as_ref().map(estimate_from_row).transpose()
    }

    async fn list_estimates(&self, tenant_id: &Id, customer_id: Option<&Id>) -> Result<Vec<Estimate>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM estimates
            WHERE tenant_id = $1 AND ($2::TEXT IS NULL OR customer_id = $2)
            ORDER BY created_at DESC
            "#,
            ESTIMATE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list estimates")?;

        rows.iter().map(estimate_from_row).collect()
    }

    async fn create_estimate(&self, tenant_id: &Id, payload: EstimatePayload) -> Result<Estimate> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO estimates (tenant_id, id, customer_id, address_id, title, tax_rate, status, options, created_at, updated_at)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $9
            WHERE {}
            RETURNING {}
            "#,
            RECORD_REFERENCES_GUARD, ESTIMATE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(generate_id())
        .bind(&payload.customer_id)
        .bind(&payload.address_id)
        .bind(&payload.body.title)
        .bind(payload.body.tax_rate)
        .bind(payload.body.status.as_str())
        .bind(Json(&payload.body.options))
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to create estimate")?;

        match row {
            Some(row) => estimate_from_row(&row),
            None => {
                self.rejected_insert(tenant_id, &payload.customer_id, payload.address_id.as_ref())
                    .await
            }
        }
    }

    async fn update_estimate(&self, tenant_id: &Id, id: &Id, payload: EstimatePayload) -> Result<Option<Estimate>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE estimates SET
                customer_id = $3,
                address_id = $4,
                title = $5,
                tax_rate = $6,
                status = $7,
                options = $8,
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2 AND {}
            RETURNING {}
            "#,
            RECORD_REFERENCES_GUARD, ESTIMATE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(id)
        .bind(&payload.customer_id)
        .bind(&payload.address_id)
        .bind(&payload.body.title)
        .bind(payload.body.tax_rate)
        .bind(payload.body.status.as_str())
        .bind(Json(&payload.body.options))
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update estimate")?;

        match row {
            Some(row) => estimate_from_row(&row).map(Some),
            None => {
                self.rejected_update(tenant_id, &payload.customer_id, payload.address_id.as_ref())
                    .await
            }
        }
    }

    async fn delete_estimate(&self, tenant_id: &Id, id: &Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM estimates WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete estimate")?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl JobStore for PostgresStore {
    async fn get_job(&self, tenant_id: &Id, id: &Id) -> Result<Option<Job>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM jobs WHERE tenant_id = $1 AND id = $2",
            JOB_COLUMNS
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch job")?;

        row.as_ref().map(job_from_row).transpose()
    }

    async fn list_jobs(&self, tenant_id: &Id, customer_id: Option<&Id>) -> Result<Vec<Job>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM jobs
            WHERE tenant_id = $1 AND ($2::TEXT IS NULL OR customer_id = $2)
            ORDER BY scheduled_start NULLS LAST, created_at
            "#,
            JOB_COLUMNS
        ))
        .bind(tenant_id)
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list jobs")?;

        rows.iter().map(job_from_row).collect()
    }

    async fn create_job(&self, tenant_id: &Id, payload: JobPayload) -> Result<Job> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO jobs (tenant_id, id, customer_id, address_id, title, description, status, scheduled_start, scheduled_end, created_at, updated_at)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10
            WHERE {}
            RETURNING {}
            "#,
            RECORD_REFERENCES_GUARD, JOB_COLUMNS
        ))
        .bind(tenant_id)
        .bind(generate_id())
        .bind(&payload.customer_id)
        .bind(&payload.address_id)
        .bind(&payload.body.title)
        .bind(&payload.body.description)
        .bind(payload.body.status.as_str())
        .bind(payload.body.scheduled_start)
        .bind(payload.body.scheduled_end)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to create job")?;

        match row {
            Some(row) => job_from_row(&row),
            None => {
                self.rejected_insert(tenant_id, &payload.customer_id, payload.address_id.as_ref())
                    .await
            }
        }
    }

    async fn update_job(&self, tenant_id: &Id, id: &Id, payload: JobPayload) -> Result<Option<Job>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE jobs SET
                customer_id = $3,
                address_id = $4,
                title = $5,
                description = $6,
                status = $7,
                scheduled_start = $8,
                scheduled_end = $9,
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2 AND {}
            RETURNING {}
            "#,
            RECORD_REFERENCES_GUARD, JOB_COLUMNS
        ))
        .bind(tenant_id)
        .bind(id)
        .bind(&payload.customer_id)
        .bind(&payload.address_id)
        .bind(&payload.body.title)
        .bind(&payload.body.description)
        .bind(payload.body.status.as_str())
        .bind(payload.body.scheduled_start)
        .bind(payload.body.scheduled_end)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update job")?;

        match row {
            Some(row) => job_from_row(&row).map(Some),
            None => {
                self.rejected_update(tenant_id, &payload.customer_id, payload.address_id.as_ref())
                    .await
            }
        }
    }
}

#[async_trait::async_trait]
impl ServiceRequestStore for PostgresStore {
    async fn get_service_request(&self, tenant_id: &Id, id: &Id) -> Result<Option<ServiceRequest>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM service_requests WHERE tenant_id = $1 AND id = $2",
            SERVICE_REQUEST_COLUMNS
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch service request")?;

        row.as_ref().map(service_request_from_row).transpose()
    }

    async fn list_service_requests(&self, tenant_id: &Id, customer_id: Option<&Id>) -> Result<Vec<ServiceRequest>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM service_requests
            WHERE tenant_id = $1 AND ($2::TEXT IS NULL OR customer_id = $2)
            ORDER BY created_at DESC
            "#,
            SERVICE_REQUEST_COLUMNS
        ))
        .bind(tenant_id)
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list service requests")?;

        rows.iter().map(service_request_from_row).collect()
    }

    async fn create_service_request(&self, tenant_id: &Id, payload: ServiceRequestPayload) -> Result<ServiceRequest> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO service_requests (tenant_id, id, customer_id, address_id, title, description, priority, status, created_at, updated_at)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $9
            WHERE {}
            RETURNING {}
            "#,
            RECORD_REFERENCES_GUARD, SERVICE_REQUEST_COLUMNS
        ))
        .bind(tenant_id)
        .bind(generate_id())
        .bind(&payload.customer_id)
        .bind(&payload.address_id)
        .bind(&payload.body.title)
        .bind(&payload.body.description)
        .bind(payload.body.priority.as_str())
        .bind(payload.body.status.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to create service request")?;

        match row {
            Some(row) => service_request_from_row(&row),
            None => {
                self.rejected_insert(tenant_id, &payload.customer_id, payload.address_id.as_ref())
                    .await
            }
        }
    }

    async fn update_service_request(
        &self,
        tenant_id: &Id,
        id: &Id,
        payload: ServiceRequestPayload,
    ) -> Result<Option<ServiceRequest>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE service_requests SET
                customer_id = $3,
                address_id = $4,
                title = $5,
                description = $6,
                priority = $7,
                status = $8,
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2 AND {}
            RETURNING {}
            "#,
            RECORD_REFERENCES_GUARD, SERVICE_REQUEST_COLUMNS
        ))
        .bind(tenant_id)
        .bind(id)
        .bind(&payload.customer_id)
        .bind(&payload.address_id)
        .bind(&payload.body.title)
        .bind(&payload.body.description)
        .bind(payload.body.priority.as_str())
        .bind(payload.body.status.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update service request")?;

        match row {
            Some(row) => service_request_from_row(&row).map(Some),
            None => {
                self.rejected_update(tenant_id, &payload.customer_id, payload.address_id.as_ref())
                    .await
            }
        }
    }
}

impl Store for PostgresStore {}
