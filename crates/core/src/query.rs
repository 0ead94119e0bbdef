//! Query identity for the derived-analytics slots.

use std::fmt;

use serde::Serialize;

/// Names an independent unit of query state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKey {
    Catalog,
    Attribution,
    MediaMetrics,
    Budget,
}

impl SlotKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Attribution => "attribution",
            Self::MediaMetrics => "media_metrics",
            Self::Budget => "budget",
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request for a slot's data.
///
/// Two requests are equivalent exactly when all three fields match; a
/// slot holding an equivalent request does not fetch again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct QueryRequest<P> {
    pub slot: SlotKey,
    pub job_id: String,
    pub params: P,
}

impl<P> QueryRequest<P> {
    pub fn new(slot: SlotKey, job_id: impl Into<String>, params: P) -> Self {
        Self {
            slot,
            job_id: job_id.into(),
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equivalence_covers_every_field() {
        let a = QueryRequest::new(SlotKey::Budget, "job-1", 75_000u32);
        assert_eq!(a, QueryRequest::new(SlotKey::Budget, "job-1", 75_000));
        assert_ne!(a, QueryRequest::new(SlotKey::Budget, "job-2", 75_000));
        assert_ne!(a, QueryRequest::new(SlotKey::Budget, "job-1", 75_001));
        assert_ne!(a, QueryRequest::new(SlotKey::Attribution, "job-1", 75_000));
    }
}
