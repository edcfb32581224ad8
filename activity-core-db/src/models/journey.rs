use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::activity::{Activity, SourceKind};
use super::filters::MetricWindow;
use super::kpi::ratio_pct;

/// Resolved account record for the journey's actor. The journey's only hard
/// failure is this profile not resolving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorProfile {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: String,
    pub organization_id: Option<Uuid>,
    pub organization_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// A login session estimated from adjacent login pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginSession {
    pub started_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub ip_address: Option<String>,
    /// True when the duration is a heuristic (capped gap or trailing default)
    /// rather than a recorded logout.
    pub estimated: bool,
}

/// Gap between adjacent logins counts as the earlier session's length, capped
/// at the longest plausible sitting.
pub const MAX_SESSION_MINUTES: i64 = 240;
/// The newest login has no successor to measure against.
pub const LAST_SESSION_DEFAULT_MINUTES: i64 = 30;

/// Estimate sessions from login instants ordered newest-first (the way the
/// source query returns them). Output keeps that ordering.
pub fn sessions_from_logins(logins: &[(DateTime<Utc>, Option<String>)]) -> Vec<LoginSession> {
    let mut sessions = Vec::with_capacity(logins.len());
    for (idx, (started_at, ip_address)) in logins.iter().enumerate() {
        let duration_minutes = match idx {
            0 => LAST_SESSION_DEFAULT_MINUTES,
            _ => {
                let next_login = logins[idx - 1].0;
                (next_login - *started_at).num_minutes().min(MAX_SESSION_MINUTES)
            }
        };
        sessions.push(LoginSession {
            started_at: *started_at,
            duration_minutes,
            ip_address: ip_address.clone(),
            estimated: true,
        });
    }
    sessions
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VendorJourney {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    pub high_risk: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskJourney {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    pub completed: i64,
    pub high_priority_open: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentJourney {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SecuritySummary {
    pub total_events: i64,
    pub failed_logins: i64,
    pub high_severity: i64,
}

/// Per-feature event counts over the actor's activity slice, normalized to
/// percentage shares.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureUsage {
    pub counts: BTreeMap<String, i64>,
    pub share_pct: BTreeMap<String, i64>,
    pub most_used: Option<String>,
}

impl FeatureUsage {
    pub fn from_activities(activities: &[Activity]) -> Self {
        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for activity in activities {
            *counts
                .entry(feature_for(activity.source).to_string())
                .or_insert(0) += 1;
        }
        let total: i64 = counts.values().sum();
        let share_pct = counts
            .iter()
            .map(|(feature, count)| (feature.clone(), ratio_pct(*count, total)))
            .collect();
        let most_used = counts
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(feature, _)| feature.clone());
        Self {
            counts,
            share_pct,
            most_used,
        }
    }
}

/// Which product feature a source table's events count toward.
pub fn feature_for(source: SourceKind) -> &'static str {
    match source {
        SourceKind::Auth => "authentication",
        SourceKind::Users | SourceKind::Organizations => "administration",
        SourceKind::Vendors => "vendors",
        SourceKind::Assessments | SourceKind::History => "security",
        SourceKind::Tasks => "tasks",
        SourceKind::Documents => "documents",
        SourceKind::Integrations => "integrations",
    }
}

/// The negative signals the risk score weighs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSignals {
    pub high_risk_vendors: i64,
    pub high_risk_tasks: i64,
    pub high_severity_security_events: i64,
    pub failed_logins: i64,
}

pub const HIGH_RISK_VENDOR_WEIGHT: i64 = 10;
pub const HIGH_RISK_TASK_WEIGHT: i64 = 5;
pub const HIGH_SEVERITY_EVENT_WEIGHT: i64 = 15;
pub const FAILED_LOGIN_WEIGHT: i64 = 2;

/// Heuristic 0–100 score: weighted penalties subtracted from a baseline of
/// 100, clamped. 100 means no negative signals.
pub fn risk_score(signals: &RiskSignals) -> i64 {
    let penalty = HIGH_RISK_VENDOR_WEIGHT * signals.high_risk_vendors
        + HIGH_RISK_TASK_WEIGHT * signals.high_risk_tasks
        + HIGH_SEVERITY_EVENT_WEIGHT * signals.high_severity_security_events
        + FAILED_LOGIN_WEIGHT * signals.failed_logins;
    (100 - penalty).clamp(0, 100)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Threshold buckets over the score: Low ≥ 80, Medium ≥ 60, High ≥ 40.
    pub fn from_score(score: i64) -> Self {
        if score >= 80 {
            RiskLevel::Low
        } else if score >= 60 {
            RiskLevel::Medium
        } else if score >= 40 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
        };
        f.write_str(label)
    }
}

/// Derived, never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskProfile {
    pub score: i64,
    pub level: RiskLevel,
    pub signals: RiskSignals,
}

impl RiskProfile {
    pub fn from_signals(signals: RiskSignals) -> Self {
        let score = risk_score(&signals);
        Self {
            score,
            level: RiskLevel::from_score(score),
            signals,
        }
    }
}

impl Default for RiskProfile {
    fn default() -> Self {
        Self::from_signals(RiskSignals::default())
    }
}

/// The full composed view of one actor over a window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journey {
    pub profile: ActorProfile,
    pub window: MetricWindow,
    pub sessions: Vec<LoginSession>,
    pub activities: Vec<Activity>,
    pub vendors: VendorJourney,
    pub tasks: TaskJourney,
    pub documents: DocumentJourney,
    pub security: SecuritySummary,
    pub feature_usage: FeatureUsage,
    pub risk: RiskProfile,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn risk_score_baseline_and_clamp() {
        assert_eq!(risk_score(&RiskSignals::default()), 100);
        let heavy = RiskSignals {
            high_risk_vendors: 5,
            high_risk_tasks: 4,
            high_severity_security_events: 3,
            failed_logins: 10,
        };
        assert_eq!(risk_score(&heavy), 0);
        let mild = RiskSignals {
            high_risk_vendors: 1,
            failed_logins: 2,
            ..Default::default()
        };
        assert_eq!(risk_score(&mild), 86);
    }

    #[test]
    fn risk_level_thresholds() {
        assert_eq!(RiskLevel::from_score(100), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(80), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(79), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(60), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(59), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(40), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(39), RiskLevel::Critical);
    }

    #[test]
    fn session_durations_come_from_adjacent_logins() {
        let base = Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap();
        // newest-first, 50 minutes apart, with a 9-hour overnight gap at the end
        let logins = vec![
            (base + chrono::Duration::hours(10), None),
            (base + chrono::Duration::minutes(50), Some("10.0.0.8".to_string())),
            (base, None),
        ];
        let sessions = sessions_from_logins(&logins);
        assert_eq!(sessions.len(), 3);
        assert_eq!(sessions[0].duration_minutes, LAST_SESSION_DEFAULT_MINUTES);
        assert_eq!(
            sessions[1].duration_minutes, MAX_SESSION_MINUTES,
            "overnight gap is capped"
        );
        assert_eq!(sessions[2].duration_minutes, 50);
        assert!(sessions.iter().all(|s| s.estimated));
    }

    #[test]
    fn feature_usage_normalizes_and_picks_max() {
        let mut activities = Vec::new();
        let at = Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap();
        for (source, action, n) in [
            (SourceKind::Vendors, super::super::activity::ActivityAction::VendorCreate, 3),
            (SourceKind::Tasks, super::super::activity::ActivityAction::TaskCreate, 1),
        ] {
            for i in 0..n {
                activities.push(Activity {
                    id: format!("{source}-x-{i}"),
                    source,
                    timestamp: at,
                    actor_id: None,
                    actor_email: None,
                    actor_name: None,
                    organization_id: None,
                    action,
                    entity_type: "x".to_string(),
                    entity_id: i.to_string(),
                    entity_name: None,
                    metadata: serde_json::Map::new(),
                    organization_name: None,
                });
            }
        }
        let usage = FeatureUsage::from_activities(&activities);
        assert_eq!(usage.counts["vendors"], 3);
        assert_eq!(usage.share_pct["vendors"], 75);
        assert_eq!(usage.share_pct["tasks"], 25);
        assert_eq!(usage.most_used.as_deref(), Some("vendors"));
    }

    #[test]
    fn empty_activity_slice_yields_empty_usage() {
        let usage = FeatureUsage::from_activities(&[]);
        assert!(usage.counts.is_empty());
        assert_eq!(usage.most_used, None);
    }
}
