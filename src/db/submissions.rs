use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::forms::{Admission, Contact};

/// Stored submission totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubmissionCounts {
    pub admissions: i64,
    pub contacts: i64,
}

#[derive(Clone)]
pub struct SubmissionStore {
    pool: SqlitePool,
}

impl SubmissionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert an admission request. Returns its UUID.
    pub async fn insert_admission(&self, admission: &Admission) -> Result<String, sqlx::Error> {
        let uuid = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO admissions (uuid, student_name, parent_name, email, phone, age, program, experience, message)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&uuid)
        .bind(&admission.student_name)
        .bind(&admission.parent_name)
        .bind(&admission.email)
        .bind(&admission.phone)
        .bind(admission.age.map(i64::from))
        .bind(&admission.program)
        .bind(&admission.experience)
        .bind(&admission.message)
        .execute(&self.pool)
        .await?;
        Ok(uuid)
    }

    /// Insert a contact message. Returns its UUID.
    pub async fn insert_contact(&self, contact: &Contact) -> Result<String, sqlx::Error> {
        let uuid = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO contacts (uuid, name, email, phone, subject, message) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&uuid)
        .bind(&contact.name)
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(&contact.subject)
        .bind(&contact.message)
        .execute(&self.pool)
        .await?;
        Ok(uuid)
    }

    pub async fn counts(&self) -> Result<SubmissionCounts, sqlx::Error> {
        let (admissions,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM admissions")
            .fetch_one(&self.pool)
            .await?;
        let (contacts,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contacts")
            .fetch_one(&self.pool)
            .await?;
        Ok(SubmissionCounts {
            admissions,
            contacts,
        })
    }
}
