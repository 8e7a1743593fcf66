use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Id, RecordPayload};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl RequestPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestPriority::Low => "LOW",
            RequestPriority::Medium => "MEDIUM",
            RequestPriority::High => "HIGH",
            RequestPriority::Urgent => "URGENT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "LOW" => Some(RequestPriority::Low),
            "MEDIUM" => Some(RequestPriority::Medium),
            "HIGH" => Some(RequestPriority::High),
            "URGENT" => Some(RequestPriority::Urgent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    #[default]
    New,
    InReview,
    Converted,
    Closed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::New => "NEW",
            RequestStatus::InReview => "IN_REVIEW",
            RequestStatus::Converted => "CONVERTED",
            RequestStatus::Closed => "CLOSED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NEW" => Some(RequestStatus::New),
            "IN_REVIEW" => Some(RequestStatus::InReview),
            "CONVERTED" => Some(RequestStatus::Converted),
            "CLOSED" => Some(RequestStatus::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequestBody {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: RequestPriority,
    #[serde(default)]
    pub status: RequestStatus,
}

impl ServiceRequestBody {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority: RequestPriority::Medium,
            status: RequestStatus::New,
        }
    }
}

pub type ServiceRequestPayload = RecordPayload<ServiceRequestBody>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: Id,
    pub tenant_id: Id,
    pub customer_id: Id,
    pub address_id: Option<Id>,
    #[serde(flatten)]
    pub body: ServiceRequestBody,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
