use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// # Documentation
/// The origin tables an activity can be reconstructed from. The `Display`
/// form doubles as the synthetic-id prefix, so the variants must stay
/// prefix-disjoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// security_log: authentication events
    #[serde(rename = "auth")]
    Auth,
    /// users: account records
    #[serde(rename = "user")]
    Users,
    /// organizations
    #[serde(rename = "org")]
    Organizations,
    /// vendors
    #[serde(rename = "vendor")]
    Vendors,
    /// vendor_assessments: risk-assessment snapshots
    #[serde(rename = "scan")]
    Assessments,
    /// assessment_history: point-in-time assessment snapshots
    #[serde(rename = "history")]
    History,
    /// tasks
    #[serde(rename = "task")]
    Tasks,
    /// documents
    #[serde(rename = "document")]
    Documents,
    /// integrations: integration connections
    #[serde(rename = "integration")]
    Integrations,
}

impl SourceKind {
    pub const ALL: [SourceKind; 9] = [
        SourceKind::Auth,
        SourceKind::Users,
        SourceKind::Organizations,
        SourceKind::Vendors,
        SourceKind::Assessments,
        SourceKind::History,
        SourceKind::Tasks,
        SourceKind::Documents,
        SourceKind::Integrations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Auth => "auth",
            SourceKind::Users => "user",
            SourceKind::Organizations => "org",
            SourceKind::Vendors => "vendor",
            SourceKind::Assessments => "scan",
            SourceKind::History => "history",
            SourceKind::Tasks => "task",
            SourceKind::Documents => "document",
            SourceKind::Integrations => "integration",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auth" => Ok(SourceKind::Auth),
            "user" => Ok(SourceKind::Users),
            "org" => Ok(SourceKind::Organizations),
            "vendor" => Ok(SourceKind::Vendors),
            "scan" => Ok(SourceKind::Assessments),
            "history" => Ok(SourceKind::History),
            "task" => Ok(SourceKind::Tasks),
            "document" => Ok(SourceKind::Documents),
            "integration" => Ok(SourceKind::Integrations),
            _ => Err(()),
        }
    }
}

/// Closed taxonomy of reconstructed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityAction {
    #[serde(rename = "user.login")]
    UserLogin,
    #[serde(rename = "user.login_failed")]
    UserLoginFailed,
    #[serde(rename = "user.logout")]
    UserLogout,
    #[serde(rename = "user.create")]
    UserCreate,
    #[serde(rename = "user.update")]
    UserUpdate,
    #[serde(rename = "organization.create")]
    OrganizationCreate,
    #[serde(rename = "organization.update")]
    OrganizationUpdate,
    #[serde(rename = "vendor.create")]
    VendorCreate,
    #[serde(rename = "vendor.update")]
    VendorUpdate,
    #[serde(rename = "vendor.delete")]
    VendorDelete,
    #[serde(rename = "vendor.assign")]
    VendorAssign,
    #[serde(rename = "security.scan_completed")]
    ScanCompleted,
    #[serde(rename = "security.scan_result")]
    ScanResult,
    #[serde(rename = "audit.recorded")]
    AuditRecorded,
    #[serde(rename = "task.create")]
    TaskCreate,
    #[serde(rename = "task.update")]
    TaskUpdate,
    #[serde(rename = "task.complete")]
    TaskComplete,
    #[serde(rename = "document.create")]
    DocumentCreate,
    #[serde(rename = "document.update")]
    DocumentUpdate,
    #[serde(rename = "integration.connect")]
    IntegrationConnect,
    #[serde(rename = "integration.sync")]
    IntegrationSync,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::UserLogin => "user.login",
            ActivityAction::UserLoginFailed => "user.login_failed",
            ActivityAction::UserLogout => "user.logout",
            ActivityAction::UserCreate => "user.create",
            ActivityAction::UserUpdate => "user.update",
            ActivityAction::OrganizationCreate => "organization.create",
            ActivityAction::OrganizationUpdate => "organization.update",
            ActivityAction::VendorCreate => "vendor.create",
            ActivityAction::VendorUpdate => "vendor.update",
            ActivityAction::VendorDelete => "vendor.delete",
            ActivityAction::VendorAssign => "vendor.assign",
            ActivityAction::ScanCompleted => "security.scan_completed",
            ActivityAction::ScanResult => "security.scan_result",
            ActivityAction::AuditRecorded => "audit.recorded",
            ActivityAction::TaskCreate => "task.create",
            ActivityAction::TaskUpdate => "task.update",
            ActivityAction::TaskComplete => "task.complete",
            ActivityAction::DocumentCreate => "document.create",
            ActivityAction::DocumentUpdate => "document.update",
            ActivityAction::IntegrationConnect => "integration.connect",
            ActivityAction::IntegrationSync => "integration.sync",
        }
    }

    /// The dotless tail used inside synthetic ids (`"create"`, `"login_failed"`).
    pub fn subtype(&self) -> &'static str {
        let label = self.as_str();
        match label.split_once('.') {
            Some((_, tail)) => tail,
            None => label,
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user.login" => Ok(ActivityAction::UserLogin),
            "user.login_failed" => Ok(ActivityAction::UserLoginFailed),
            "user.logout" => Ok(ActivityAction::UserLogout),
            "user.create" => Ok(ActivityAction::UserCreate),
            "user.update" => Ok(ActivityAction::UserUpdate),
            "organization.create" => Ok(ActivityAction::OrganizationCreate),
            "organization.update" => Ok(ActivityAction::OrganizationUpdate),
            "vendor.create" => Ok(ActivityAction::VendorCreate),
            "vendor.update" => Ok(ActivityAction::VendorUpdate),
            "vendor.delete" => Ok(ActivityAction::VendorDelete),
            "vendor.assign" => Ok(ActivityAction::VendorAssign),
            "security.scan_completed" => Ok(ActivityAction::ScanCompleted),
            "security.scan_result" => Ok(ActivityAction::ScanResult),
            "audit.recorded" => Ok(ActivityAction::AuditRecorded),
            "task.create" => Ok(ActivityAction::TaskCreate),
            "task.update" => Ok(ActivityAction::TaskUpdate),
            "task.complete" => Ok(ActivityAction::TaskComplete),
            "document.create" => Ok(ActivityAction::DocumentCreate),
            "document.update" => Ok(ActivityAction::DocumentUpdate),
            "integration.connect" => Ok(ActivityAction::IntegrationConnect),
            "integration.sync" => Ok(ActivityAction::IntegrationSync),
            _ => Err(()),
        }
    }
}

/// # Documentation
/// A canonical, reconstructed event. Never persisted: re-derived on every
/// read from the origin tables, which were not designed to record history.
/// For a fixed underlying row and subtype the reconstruction is idempotent
/// (same `id`, `action`, `entity_id`); `metadata` reflects the row's current
/// state, which is an accepted approximation rather than a ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Synthetic and deterministic, see [`crate::identity`].
    pub id: String,
    pub source: SourceKind,
    pub timestamp: DateTime<Utc>,

    /// Absent for system-initiated events (automated scans).
    pub actor_id: Option<Uuid>,
    pub actor_email: Option<String>,
    pub actor_name: Option<String>,

    /// Tenant scoping.
    pub organization_id: Option<Uuid>,

    pub action: ActivityAction,
    pub entity_type: String,
    pub entity_id: String,
    pub entity_name: Option<String>,

    /// Open key→value detail: scores, grades, statuses, descriptive `event` text.
    pub metadata: Map<String, Value>,

    /// Resolved display name, best-effort.
    pub organization_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_labels_round_trip() {
        for action in [
            ActivityAction::UserLogin,
            ActivityAction::VendorUpdate,
            ActivityAction::ScanCompleted,
            ActivityAction::IntegrationSync,
        ] {
            let parsed: ActivityAction = action.as_str().parse().unwrap();
            assert_eq!(parsed, action);
        }
        assert!("vendor.explode".parse::<ActivityAction>().is_err());
    }

    #[test]
    fn subtype_strips_the_namespace() {
        assert_eq!(ActivityAction::UserLoginFailed.subtype(), "login_failed");
        assert_eq!(ActivityAction::VendorAssign.subtype(), "assign");
    }

    #[test]
    fn source_prefixes_are_disjoint() {
        for a in SourceKind::ALL {
            for b in SourceKind::ALL {
                if a != b {
                    assert!(!a.as_str().starts_with(b.as_str()));
                }
            }
        }
    }
}
