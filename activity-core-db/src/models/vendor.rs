use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A vendor directory row as returned by the search endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorRecord {
    pub id: Uuid,
    pub name: String,
    pub website: Option<String>,
    pub contact_email: Option<String>,
    pub status: String,
    pub risk_score: Option<Decimal>,
    pub risk_grade: Option<String>,
    pub organization_id: Option<Uuid>,
    pub last_assessed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
