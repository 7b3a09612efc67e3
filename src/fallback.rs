//! In-memory fallback for form submissions.
//!
//! Used only when the primary store rejects a write. Records live until the
//! process exits and are never read back except for diagnostics.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::forms::{Admission, Contact};

/// Prefix on every fallback record ID.
pub const FALLBACK_ID_PREFIX: &str = "fallback_";

/// Where a submission came from.
pub const WEBSITE_SOURCE: &str = "website";

/// Review status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Reviewed,
    Closed,
}

/// A submission held in memory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackRecord<T> {
    pub id: String,
    #[serde(flatten)]
    pub data: T,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub source: &'static str,
}

impl<T> FallbackRecord<T> {
    fn new(data: T) -> Self {
        let now = Utc::now();
        Self {
            id: format!("{}{}", FALLBACK_ID_PREFIX, Uuid::new_v4().simple()),
            data,
            status: SubmissionStatus::Pending,
            created_at: now,
            updated_at: now,
            source: WEBSITE_SOURCE,
        }
    }
}

/// Counts for one submission kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KindStats {
    pub total: usize,
    pub by_status: BTreeMap<SubmissionStatus, usize>,
}

impl KindStats {
    fn count<T>(records: &[FallbackRecord<T>]) -> Self {
        let mut by_status = BTreeMap::new();
        for record in records {
            *by_status.entry(record.status).or_insert(0) += 1;
        }
        Self {
            total: records.len(),
            by_status,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FallbackStats {
    pub admissions: KindStats,
    pub contacts: KindStats,
}

/// Copy of every record, for the diagnostics endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct FallbackSnapshot {
    pub admissions: Vec<FallbackRecord<Admission>>,
    pub contacts: Vec<FallbackRecord<Contact>>,
}

#[derive(Default)]
pub struct FallbackStore {
    admissions: Mutex<Vec<FallbackRecord<Admission>>>,
    contacts: Mutex<Vec<FallbackRecord<Contact>>>,
}

impl FallbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_admission(&self, admission: Admission) -> FallbackRecord<Admission> {
        let record = FallbackRecord::new(admission);
        self.admissions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        record
    }

    pub fn add_contact(&self, contact: Contact) -> FallbackRecord<Contact> {
        let record = FallbackRecord::new(contact);
        self.contacts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        record
    }

    pub fn stats(&self) -> FallbackStats {
        FallbackStats {
            admissions: KindStats::count(&self.admissions.lock().unwrap_or_else(|e| e.into_inner())),
            contacts: KindStats::count(&self.contacts.lock().unwrap_or_else(|e| e.into_inner())),
        }
    }

    pub fn snapshot(&self) -> FallbackSnapshot {
        FallbackSnapshot {
            admissions: self
                .admissions
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
            contacts: self
                .contacts
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
        }
    }
}
