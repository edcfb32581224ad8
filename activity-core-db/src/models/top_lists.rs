use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row of the most-active-actors ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorActivityRank {
    pub actor_email: String,
    pub event_count: i64,
    pub last_activity_at: DateTime<Utc>,
}

/// One row of the worst-first vendor risk ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorRiskRank {
    pub vendor_id: Uuid,
    pub name: String,
    pub risk_score: Option<Decimal>,
    pub risk_grade: Option<String>,
    pub last_assessed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// Rankings and status breakdowns over one window. An empty window yields
/// empty lists, never an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopLists {
    pub most_active_actors: Vec<ActorActivityRank>,
    pub riskiest_vendors: Vec<VendorRiskRank>,
    pub vendor_status: Vec<StatusCount>,
    pub task_status: Vec<StatusCount>,
    pub document_status: Vec<StatusCount>,
}

/// Default bound for every ranking.
pub const DEFAULT_TOP_LIMIT: u32 = 10;
