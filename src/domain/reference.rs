//! Disbursement references
//!
//! Externally visible identifiers used for reconciliation with the bank.
//!
//! Format: `DSB-<unix_seconds>-<user_id>-<disbursement_id>`. The disbursement
//! id comes from the store sequence and is reserved before the row is
//! inserted, so references stay unique even when many are generated within
//! the same second. External reconciliation parses this format; treat it as
//! part of the persisted state.

use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

/// Prefix of every disbursement reference
pub const REFERENCE_PREFIX: &str = "DSB";

/// Errors when parsing a reference string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("reference must start with '{REFERENCE_PREFIX}-'")]
    MissingPrefix,

    #[error("reference has {0} components, expected 4")]
    WrongShape(usize),

    #[error("invalid reference component '{0}'")]
    InvalidComponent(String),
}

/// Builds references for new disbursements
#[derive(Debug, Clone, Default)]
pub struct ReferenceGenerator;

impl ReferenceGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate the reference for a disbursement created at `at`.
    pub fn generate(&self, user_id: i64, disbursement_id: i64, at: DateTime<Utc>) -> Reference {
        Reference {
            issued_at_secs: at.timestamp(),
            user_id,
            disbursement_id,
        }
    }
}

/// Parsed components of a reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reference {
    pub issued_at_secs: i64,
    pub user_id: i64,
    pub disbursement_id: i64,
}

impl Reference {
    pub fn parse(raw: &str) -> Result<Self, ReferenceError> {
        let mut parts = raw.split('-');
        if parts.next() != Some(REFERENCE_PREFIX) {
            return Err(ReferenceError::MissingPrefix);
        }

        let rest: Vec<&str> = parts.collect();
        if rest.len() != 3 {
            return Err(ReferenceError::WrongShape(rest.len() + 1));
        }

        let number = |s: &str| {
            s.parse::<i64>()
                .ok()
                .filter(|n| *n >= 0)
                .ok_or_else(|| ReferenceError::InvalidComponent(s.to_string()))
        };

        Ok(Self {
            issued_at_secs: number(rest[0])?,
            user_id: number(rest[1])?,
            disbursement_id: number(rest[2])?,
        })
    }

    /// When the reference was issued, to the second.
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.issued_at_secs, 0).single()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            REFERENCE_PREFIX, self.issued_at_secs, self.user_id, self.disbursement_id
        )
    }
}
