//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, Value, params};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::applicant::{ApplicantRecord, IncomeBracket};
use crate::conversation::Stage;
use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations. Writes that
/// span a transaction are serialized by `write_lock`.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    write_lock: Mutex<()>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
            write_lock: Mutex::new(()),
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn opt_text(s: Option<&str>) -> Value {
    match s {
        Some(s) => Value::Text(s.to_string()),
        None => Value::Null,
    }
}

fn opt_int(n: Option<i64>) -> Value {
    match n {
        Some(n) => Value::Integer(n),
        None => Value::Null,
    }
}

fn opt_real(x: Option<f64>) -> Value {
    match x {
        Some(x) => Value::Real(x),
        None => Value::Null,
    }
}

const APPLICANT_COLUMNS: &str = "id, channel, user_handle, name, loan_amount, sex, race, employed, \
     workclass, occupation, hours_per_week, marital_status, home_ownership, education, \
     native_country, loan_grade, prior_default, age, income, default_probability, \
     interest_rate, stage, created_at, completed_at";

/// Map a libsql Row to an ApplicantRecord.
///
/// Column order matches APPLICANT_COLUMNS.
fn row_to_record(row: &libsql::Row) -> Result<ApplicantRecord, DatabaseError> {
    let parse = |e: libsql::Error| DatabaseError::Query(format!("applicant row parse: {e}"));

    let id_str: String = row.get(0).map_err(parse)?;
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| DatabaseError::Serialization(format!("bad applicant id {id_str}: {e}")))?;
    let channel: String = row.get(1).map_err(parse)?;
    let user_handle: String = row.get(2).map_err(parse)?;

    let mut record = ApplicantRecord::with_id(id, channel, user_handle);
    record.name = row.get(3).ok();
    record.loan_amount = row
        .get::<i64>(4)
        .ok()
        .map(u64::try_from)
        .transpose()
        .map_err(|e| DatabaseError::Serialization(format!("bad loan amount: {e}")))?;
    record.sex = row.get(5).ok();
    record.race = row.get(6).ok();
    record.employed = row.get(7).ok();
    record.workclass = row.get(8).ok();
    record.occupation = row.get(9).ok();
    record.hours_per_week = row.get(10).ok();
    record.marital_status = row.get(11).ok();
    record.home_ownership = row.get(12).ok();
    record.education = row.get(13).ok();
    record.native_country = row.get(14).ok();
    record.loan_grade = row.get(15).ok();
    record.prior_default = row.get(16).ok();
    record.age = row
        .get::<i64>(17)
        .ok()
        .map(u8::try_from)
        .transpose()
        .map_err(|e| DatabaseError::Serialization(format!("bad age: {e}")))?;
    record.income = match row.get::<String>(18).ok() {
        Some(label) => Some(IncomeBracket::from_label(&label).ok_or_else(|| {
            DatabaseError::Serialization(format!("bad income bracket {label:?}"))
        })?),
        None => None,
    };
    record.default_probability = row.get::<f64>(19).ok();
    record.interest_rate = row
        .get::<i64>(20)
        .ok()
        .map(u32::try_from)
        .transpose()
        .map_err(|e| DatabaseError::Serialization(format!("bad interest rate: {e}")))?;

    let stage_raw: i64 = row.get(21).map_err(parse)?;
    let stage = u8::try_from(stage_raw)
        .map_err(|_| DatabaseError::Serialization(format!("bad stage {stage_raw}")))
        .and_then(|n| {
            Stage::try_from(n).map_err(|e| DatabaseError::Serialization(e.to_string()))
        })?;
    record.restore_stage(stage);

    let created_str: String = row.get(22).map_err(parse)?;
    record.created_at = parse_datetime(&created_str);
    record.completed_at = row.get::<String>(23).ok().map(|s| parse_datetime(&s));

    Ok(record)
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn record_exists(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT 1 FROM applicants WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("record_exists: {e}")))?;

        match rows.next().await {
            Ok(row) => Ok(row.is_some()),
            Err(e) => Err(DatabaseError::Query(format!("record_exists: {e}"))),
        }
    }

    async fn upsert_record(&self, record: &ApplicantRecord) -> Result<(), DatabaseError> {
        let loan_amount = record
            .loan_amount
            .map(i64::try_from)
            .transpose()
            .map_err(|e| DatabaseError::Serialization(format!("loan amount too large: {e}")))?;

        let _guard = self.write_lock.lock().await;
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_record begin: {e}")))?;

        tx.execute(
            "DELETE FROM applicants WHERE id = ?1",
            params![record.id.to_string()],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("upsert_record delete: {e}")))?;

        tx.execute(
            &format!(
                "INSERT INTO applicants ({APPLICANT_COLUMNS}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, \
                  ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)"
            ),
            vec![
                Value::Text(record.id.to_string()),
                Value::Text(record.channel.clone()),
                Value::Text(record.user_handle.clone()),
                opt_text(record.name.as_deref()),
                opt_int(loan_amount),
                opt_text(record.sex.as_deref()),
                opt_text(record.race.as_deref()),
                opt_text(record.employed.as_deref()),
                opt_text(record.workclass.as_deref()),
                opt_text(record.occupation.as_deref()),
                opt_text(record.hours_per_week.as_deref()),
                opt_text(record.marital_status.as_deref()),
                opt_text(record.home_ownership.as_deref()),
                opt_text(record.education.as_deref()),
                opt_text(record.native_country.as_deref()),
                opt_text(record.loan_grade.as_deref()),
                opt_text(record.prior_default.as_deref()),
                opt_int(record.age.map(i64::from)),
                opt_text(record.income.map(|i| i.label())),
                opt_real(record.default_probability),
                opt_int(record.interest_rate.map(i64::from)),
                Value::Integer(i64::from(record.stage().index())),
                Value::Text(record.created_at.to_rfc3339()),
                opt_text(record.completed_at.map(|t| t.to_rfc3339()).as_deref()),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("upsert_record insert: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_record commit: {e}")))?;

        debug!(record_id = %record.id, stage = %record.stage(), "Applicant record stored");
        Ok(())
    }

    async fn get_record(&self, id: Uuid) -> Result<Option<ApplicantRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {APPLICANT_COLUMNS} FROM applicants WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_record: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_record(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_record: {e}"))),
        }
    }

    async fn list_records_for_user(
        &self,
        channel: &str,
        user_handle: &str,
    ) -> Result<Vec<ApplicantRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {APPLICANT_COLUMNS} FROM applicants \
                     WHERE channel = ?1 AND user_handle = ?2 ORDER BY created_at DESC"
                ),
                params![channel, user_handle],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_records_for_user: {e}")))?;

        let mut records = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_record(&row) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping applicant row: {e}"),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applicant::ApplicationField;

    async fn test_db() -> LibSqlBackend {
        let db = LibSqlBackend::new_memory().await.unwrap();
        db.run_migrations().await.unwrap();
        db
    }

    fn completed(user: &str) -> ApplicantRecord {
        let mut record = ApplicantRecord::new("telegram", user);
        record.name = Some("Ada Lovelace".into());
        record.loan_amount = Some(25_000);
        for field in ApplicationField::ALL {
            record.set_field(field, "N/A");
        }
        record.set_field(ApplicationField::NativeCountry, "United-States");
        record.age = Some(36);
        record.income = Some(IncomeBracket::Above50K);
        record.default_probability = Some(0.125);
        record.interest_rate = Some(2);
        while !record.stage().is_terminal() {
            record.advance().unwrap();
        }
        record
    }

    #[tokio::test]
    async fn upsert_and_get_round_trip() {
        let db = test_db().await;
        let record = completed("u1");

        db.upsert_record(&record).await.unwrap();
        let fetched = db.get_record(record.id).await.unwrap().unwrap();

        assert_eq!(fetched.id, record.id);
        assert_eq!(fetched.stage(), Stage::Complete);
        assert_eq!(fetched.loan_amount, Some(25_000));
        assert_eq!(fetched.native_country.as_deref(), Some("United-States"));
        assert_eq!(fetched.income, Some(IncomeBracket::Above50K));
        assert_eq!(fetched.default_probability, Some(0.125));
        assert_eq!(fetched.interest_rate, Some(2));
        assert!(fetched.completed_at.is_some());
        assert_eq!(
            fetched.created_at.timestamp_millis(),
            record.created_at.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn get_missing_record() {
        let db = test_db().await;
        assert!(db.get_record(Uuid::new_v4()).await.unwrap().is_none());
        assert!(!db.record_exists(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn upsert_overwrites_instead_of_duplicating() {
        let db = test_db().await;
        let mut record = completed("u1");
        db.upsert_record(&record).await.unwrap();

        record.interest_rate = Some(9);
        db.upsert_record(&record).await.unwrap();

        let all = db.list_records_for_user("telegram", "u1").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].interest_rate, Some(9));
        assert!(db.record_exists(record.id).await.unwrap());
    }

    #[tokio::test]
    async fn partial_record_keeps_nulls() {
        let db = test_db().await;
        let record = ApplicantRecord::new("cli", "local-user");
        db.upsert_record(&record).await.unwrap();

        let fetched = db.get_record(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.stage(), Stage::AwaitIdentity);
        assert!(fetched.name.is_none());
        assert!(fetched.loan_amount.is_none());
        assert!(fetched.income.is_none());
        assert!(fetched.completed_at.is_none());
    }

    #[tokio::test]
    async fn list_is_scoped_to_user() {
        let db = test_db().await;
        db.upsert_record(&completed("u1")).await.unwrap();
        db.upsert_record(&completed("u1")).await.unwrap();
        db.upsert_record(&completed("u2")).await.unwrap();

        assert_eq!(db.list_records_for_user("telegram", "u1").await.unwrap().len(), 2);
        assert_eq!(db.list_records_for_user("telegram", "u2").await.unwrap().len(), 1);
        assert!(db.list_records_for_user("cli", "u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_stage_fails_loudly() {
        let db = test_db().await;
        let record = completed("u1");
        db.upsert_record(&record).await.unwrap();
        db.conn()
            .execute(
                "UPDATE applicants SET stage = 9 WHERE id = ?1",
                params![record.id.to_string()],
            )
            .await
            .unwrap();

        let err = db.get_record(record.id).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Serialization(_)));
    }

    #[tokio::test]
    async fn local_file_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("loans.db");
        let record = completed("u1");
        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.run_migrations().await.unwrap();
            db.upsert_record(&record).await.unwrap();
        }
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        db.run_migrations().await.unwrap();
        assert!(db.record_exists(record.id).await.unwrap());
    }
}
