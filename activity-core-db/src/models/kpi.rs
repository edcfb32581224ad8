use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Period-over-period percentage change, rounded to the nearest integer.
///
/// Delta law: `previous == 0 && current > 0` is pinned to `100`; both zero is
/// `0`; otherwise `round(((current - previous) / previous) * 100)`.
pub fn delta_pct(current: i64, previous: i64) -> i64 {
    if previous == 0 {
        if current > 0 {
            100
        } else {
            0
        }
    } else {
        (((current - previous) as f64 / previous as f64) * 100.0).round() as i64
    }
}

/// `numerator / denominator` as a rounded percentage; zero denominator is 0.
pub fn ratio_pct(numerator: i64, denominator: i64) -> i64 {
    if denominator == 0 {
        0
    } else {
        ((numerator as f64 / denominator as f64) * 100.0).round() as i64
    }
}

/// Current-window count, equal-length-previous-window count, and the delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpiResult {
    pub current_count: i64,
    pub previous_count: i64,
    pub delta_pct: i64,
}

impl KpiResult {
    pub fn from_counts(current: i64, previous: i64) -> Self {
        Self {
            current_count: current,
            previous_count: previous,
            delta_pct: delta_pct(current, previous),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthenticationKpi {
    pub logins: KpiResult,
    pub successful: i64,
    pub failed: i64,
    pub success_rate_pct: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskKpi {
    pub created: KpiResult,
    pub completed: i64,
    pub completion_rate_pct: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentKpi {
    pub created: KpiResult,
    pub updated: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VendorScanKpi {
    pub completed: KpiResult,
    pub average_score: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestExecutionKpi {
    pub runs: KpiResult,
    pub passed: i64,
    pub failed: i64,
    pub pass_rate_pct: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditKpi {
    pub recorded: KpiResult,
}

/// One entry per tracked metric family, all computed over the same window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardKpis {
    pub authentication: AuthenticationKpi,
    pub tasks: TaskKpi,
    pub documents: DocumentKpi,
    pub vendor_scans: VendorScanKpi,
    pub test_executions: TestExecutionKpi,
    pub audits: AuditKpi,
}

/// Login totals for one window, optionally scoped to one actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginMetrics {
    pub total: i64,
    pub success: i64,
    pub failed: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_law() {
        assert_eq!(delta_pct(0, 0), 0);
        assert_eq!(delta_pct(10, 0), 100);
        assert_eq!(delta_pct(50, 100), -50);
        assert_eq!(delta_pct(150, 100), 50);
        assert_eq!(delta_pct(1, 3), -67);
    }

    #[test]
    fn ratio_guards_zero_denominator() {
        assert_eq!(ratio_pct(5, 0), 0);
        assert_eq!(ratio_pct(1, 3), 33);
        assert_eq!(ratio_pct(2, 3), 67);
        assert_eq!(ratio_pct(3, 3), 100);
    }

    #[test]
    fn kpi_result_carries_both_counts() {
        let kpi = KpiResult::from_counts(30, 20);
        assert_eq!(kpi.current_count, 30);
        assert_eq!(kpi.previous_count, 20);
        assert_eq!(kpi.delta_pct, 50);
    }
}
