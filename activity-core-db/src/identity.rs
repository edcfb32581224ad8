//! Synthetic activity identities.
//!
//! No source table stores activity ids; a reconstructed activity gets a
//! deterministic handle composed from its origin so repeated reconstructions
//! of the same underlying row agree. Source prefixes are disjoint, so ids
//! cannot collide across tables.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::activity::{ActivityAction, SourceKind};

/// `"{source}-{subtype}-{origin}"`, stable for a fixed row and subtype.
pub fn assign(source: SourceKind, action: ActivityAction, origin: Uuid) -> String {
    format!("{source}-{}-{origin}", action.subtype())
}

/// Same as [`assign`] with a millisecond suffix, for subtypes a single row
/// can emit more than once (a vendor updated twice must not reuse one id).
pub fn assign_at(
    source: SourceKind,
    action: ActivityAction,
    origin: Uuid,
    at: DateTime<Utc>,
) -> String {
    format!(
        "{source}-{}-{origin}-{}",
        action.subtype(),
        at.timestamp_millis()
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedActivityId {
    pub source: SourceKind,
    pub subtype: String,
    pub origin: Uuid,
}

/// Recover the origin coordinates from a synthetic id. Returns `None` for
/// anything that was not produced by [`assign`] / [`assign_at`].
pub fn parse(id: &str) -> Option<ParsedActivityId> {
    let mut parts = id.splitn(3, '-');
    let source: SourceKind = parts.next()?.parse().ok()?;
    let subtype = parts.next()?.to_string();
    let rest = parts.next()?;

    // rest is "{uuid}" or "{uuid}-{millis}"
    if rest.len() < 36 {
        return None;
    }
    let (uuid_part, suffix) = rest.split_at(36);
    let origin = Uuid::parse_str(uuid_part).ok()?;
    if !suffix.is_empty() {
        let digits = suffix.strip_prefix('-')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }

    Some(ParsedActivityId {
        source,
        subtype,
        origin,
    })
}
