//! `Database` trait — async interface for applicant persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::applicant::ApplicantRecord;
use crate::error::DatabaseError;

#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Whether a record with this id has been stored.
    async fn record_exists(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// Store a record, replacing any previous version with the same id.
    async fn upsert_record(&self, record: &ApplicantRecord) -> Result<(), DatabaseError>;

    async fn get_record(&self, id: Uuid) -> Result<Option<ApplicantRecord>, DatabaseError>;

    /// All records for one channel user, newest first.
    async fn list_records_for_user(
        &self,
        channel: &str,
        user_handle: &str,
    ) -> Result<Vec<ApplicantRecord>, DatabaseError>;
}
