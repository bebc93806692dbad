//! Client-side query cache keyed by the read endpoints a review screen depends on.
//!
//! Writers never name cache keys. They hand the cache a [`ServerEvent`] and the
//! cache decides which of its entries became stale.

use std::collections::HashMap;

use serde_json::Value;
use shared::protocol::{
    ServerEvent, ALL_REVIEWS_ROUTE, COMPANY_SAFETY_RATING_ROUTE, CSR_ROUTE, MY_REVIEWS_ROUTE,
    PENDING_CHECK_ROUTE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    MyReviews,
    AllReviews,
    PendingCheck,
    CsrList,
    CompanySafetyRating,
}

impl QueryKey {
    pub const ALL: [QueryKey; 5] = [
        QueryKey::MyReviews,
        QueryKey::AllReviews,
        QueryKey::PendingCheck,
        QueryKey::CsrList,
        QueryKey::CompanySafetyRating,
    ];

    pub fn path(self) -> &'static str {
        match self {
            QueryKey::MyReviews => MY_REVIEWS_ROUTE,
            QueryKey::AllReviews => ALL_REVIEWS_ROUTE,
            QueryKey::PendingCheck => PENDING_CHECK_ROUTE,
            QueryKey::CsrList => CSR_ROUTE,
            QueryKey::CompanySafetyRating => COMPANY_SAFETY_RATING_ROUTE,
        }
    }

    /// Keys whose cached value no longer reflects the server after `event`.
    pub fn invalidated_by(event: &ServerEvent) -> &'static [QueryKey] {
        match event {
            ServerEvent::ComplianceScoreInvalidated { .. } | ServerEvent::ReviewAssigned { .. } => {
                &Self::ALL
            }
            ServerEvent::ReviewSigned { .. } => &[
                QueryKey::MyReviews,
                QueryKey::AllReviews,
                QueryKey::PendingCheck,
            ],
            ServerEvent::ReviewViewed { .. } => &[QueryKey::MyReviews, QueryKey::AllReviews],
            ServerEvent::Error(_) => &[],
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stale: bool,
}

#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<QueryKey, CacheEntry>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: QueryKey, value: Value) {
        self.entries.insert(key, CacheEntry { value, stale: false });
    }

    /// Fresh value for `key`; stale or missing entries return `None`.
    pub fn get(&self, key: QueryKey) -> Option<&Value> {
        self.entries
            .get(&key)
            .filter(|entry| !entry.stale)
            .map(|entry| &entry.value)
    }

    pub fn is_stale(&self, key: QueryKey) -> bool {
        self.entries.get(&key).map_or(true, |entry| entry.stale)
    }

    pub fn invalidate(&mut self, key: QueryKey) {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.stale = true;
        }
    }

    pub fn apply_event(&mut self, event: &ServerEvent) -> Vec<QueryKey> {
        let keys = QueryKey::invalidated_by(event);
        for key in keys {
            self.invalidate(*key);
        }
        keys.to_vec()
    }
}

#[cfg(test)]
#[path = "tests/cache_tests.rs"]
mod tests;
