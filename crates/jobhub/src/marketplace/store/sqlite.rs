//! SQLite backend.
//!
//! One connection guarded by a mutex; every unit of work runs inside a
//! `BEGIN IMMEDIATE` transaction so the write lock is taken before the first
//! read. Uniqueness, foreign keys and status/assignment consistency are also
//! declared in `schema.sql`, so the database rejects rows the service should
//! never produce.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{
    ffi, params, Connection, ErrorCode, OptionalExtension, Params, Row, TransactionBehavior,
};
use uuid::Uuid;

use super::{MarketStore, MarketTransaction, StoreError};
use crate::marketplace::domain::{
    CustomerProfile, CustomerProfileId, Job, JobId, JobStatus, JobType, JobTypeId, NewJob,
    NewNotification, NewRating, Notification, NotificationId, NotificationType, Price,
    ProviderProfile, ProviderProfileId, ProviderProfileJob, Rating, RatingId, Role, User, UserId,
};

const SCHEMA: &str = include_str!("schema.sql");

const JOB_COLUMNS: &str = "id, customer_profile_id, job_type_id, title, description, \
     proposed_price_cents, status, assigned_provider_id, provider_marked_done_at, \
     created_at, updated_at";

const PROVIDER_COLUMNS: &str = "id, user_id, bio, address, rating";

const RATING_COLUMNS: &str =
    "id, job_id, provider_profile_id, customer_profile_id, rating, comment, created_at";

const NOTIFICATION_COLUMNS: &str = "id, job_id, user_id, type, message, is_read, created_at";

/// Durable store backed by a single SQLite file.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and applies the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;

        tracing::info!(path = %path.display(), "sqlite store opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl MarketStore for SqliteStore {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn MarketTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".to_string()))?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| classify(err, String::new))?;

        // Dropping `tx` on the error path rolls back.
        let output = work(&mut SqliteTransaction { conn: &tx })?;
        tx.commit().map_err(|err| classify(err, String::new))?;
        Ok(output)
    }
}

/// Maps constraint failures onto the store's error vocabulary. `subject`
/// names the row for uniqueness conflicts.
fn classify(err: rusqlite::Error, subject: impl FnOnce() -> String) -> StoreError {
    if let rusqlite::Error::SqliteFailure(failure, message) = &err {
        match failure.code {
            ErrorCode::ConstraintViolation => {
                return match failure.extended_code {
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        StoreError::Conflict(subject())
                    }
                    _ => StoreError::Constraint(
                        message.clone().unwrap_or_else(|| failure.to_string()),
                    ),
                };
            }
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                return StoreError::Unavailable(failure.to_string());
            }
            _ => {}
        }
    }
    StoreError::Sqlite(err)
}

fn encode_time(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| StoreError::Corrupt(format!("timestamp '{raw}': {err}")))
}

fn decode_user_id(raw: &str) -> Result<UserId, StoreError> {
    Uuid::parse_str(raw)
        .map(UserId)
        .map_err(|err| StoreError::Corrupt(format!("user id '{raw}': {err}")))
}

struct UserRow {
    id: String,
    first_name: String,
    last_name: String,
    email: String,
    phone_number: String,
    role: String,
}

impl UserRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            email: row.get("email")?,
            phone_number: row.get("phone_number")?,
            role: row.get("role")?,
        })
    }

    fn into_domain(self) -> Result<User, StoreError> {
        Ok(User {
            id: decode_user_id(&self.id)?,
            role: Role::parse(&self.role)
                .ok_or_else(|| StoreError::Corrupt(format!("role '{}'", self.role)))?,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone_number: self.phone_number,
        })
    }
}

struct CustomerRow {
    id: u64,
    user_id: String,
    address: String,
    additional_info: Option<String>,
}

impl CustomerRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            address: row.get("address")?,
            additional_info: row.get("additional_info")?,
        })
    }

    fn into_domain(self) -> Result<CustomerProfile, StoreError> {
        Ok(CustomerProfile {
            id: CustomerProfileId(self.id),
            user_id: decode_user_id(&self.user_id)?,
            address: self.address,
            additional_info: self.additional_info,
        })
    }
}

struct ProviderRow {
    id: u64,
    user_id: String,
    bio: Option<String>,
    address: String,
    rating: f64,
}

impl ProviderRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            bio: row.get("bio")?,
            address: row.get("address")?,
            rating: row.get("rating")?,
        })
    }
}

struct JobRow {
    id: u64,
    customer_profile_id: u64,
    job_type_id: u64,
    title: String,
    description: String,
    proposed_price_cents: u64,
    status: String,
    assigned_provider_id: Option<u64>,
    provider_marked_done_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            customer_profile_id: row.get("customer_profile_id")?,
            job_type_id: row.get("job_type_id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            proposed_price_cents: row.get("proposed_price_cents")?,
            status: row.get("status")?,
            assigned_provider_id: row.get("assigned_provider_id")?,
            provider_marked_done_at: row.get("provider_marked_done_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn into_domain(self) -> Result<Job, StoreError> {
        Ok(Job {
            id: JobId(self.id),
            customer_profile_id: CustomerProfileId(self.customer_profile_id),
            job_type_id: JobTypeId(self.job_type_id),
            title: self.title,
            description: self.description,
            proposed_price: Price::from_cents(self.proposed_price_cents),
            status: JobStatus::parse(&self.status)
                .ok_or_else(|| StoreError::Corrupt(format!("job status '{}'", self.status)))?,
            assigned_provider_id: self.assigned_provider_id.map(ProviderProfileId),
            provider_marked_done_at: self
                .provider_marked_done_at
                .as_deref()
                .map(decode_time)
                .transpose()?,
            created_at: decode_time(&self.created_at)?,
            updated_at: decode_time(&self.updated_at)?,
        })
    }
}

struct RatingRow {
    id: u64,
    job_id: u64,
    provider_profile_id: u64,
    customer_profile_id: u64,
    rating: u8,
    comment: Option<String>,
    created_at: String,
}

impl RatingRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            provider_profile_id: row.get("provider_profile_id")?,
            customer_profile_id: row.get("customer_profile_id")?,
            rating: row.get("rating")?,
            comment: row.get("comment")?,
            created_at: row.get("created_at")?,
        })
    }

    fn into_domain(self) -> Result<Rating, StoreError> {
        Ok(Rating {
            id: RatingId(self.id),
            job_id: JobId(self.job_id),
            provider_profile_id: ProviderProfileId(self.provider_profile_id),
            customer_profile_id: CustomerProfileId(self.customer_profile_id),
            rating: self.rating,
            comment: self.comment,
            created_at: decode_time(&self.created_at)?,
        })
    }
}

struct NotificationRow {
    id: u64,
    job_id: u64,
    user_id: String,
    kind: String,
    message: String,
    is_read: bool,
    created_at: String,
}

impl NotificationRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            user_id: row.get("user_id")?,
            kind: row.get("type")?,
            message: row.get("message")?,
            is_read: row.get("is_read")?,
            created_at: row.get("created_at")?,
        })
    }

    fn into_domain(self) -> Result<Notification, StoreError> {
        Ok(Notification {
            id: NotificationId(self.id),
            job_id: JobId(self.job_id),
            user_id: decode_user_id(&self.user_id)?,
            kind: NotificationType::parse(&self.kind).ok_or_else(|| {
                StoreError::Corrupt(format!("notification type '{}'", self.kind))
            })?,
            message: self.message,
            is_read: self.is_read,
            created_at: decode_time(&self.created_at)?,
        })
    }
}

fn provider_job_from_row(row: &Row<'_>) -> Result<ProviderProfileJob, rusqlite::Error> {
    Ok(ProviderProfileJob {
        job_id: JobId(row.get("job_id")?),
        provider_profile_id: ProviderProfileId(row.get("provider_profile_id")?),
        is_interested: row.get("is_interested")?,
        is_selected: row.get("is_selected")?,
    })
}

fn job_type_from_row(row: &Row<'_>) -> Result<JobType, rusqlite::Error> {
    Ok(JobType {
        id: JobTypeId(row.get("id")?),
        name: row.get("name")?,
        baseline_price: Price::from_cents(row.get("baseline_price_cents")?),
    })
}

struct SqliteTransaction<'a> {
    conn: &'a Connection,
}

impl SqliteTransaction<'_> {
    fn rows<T, P, F>(&self, sql: &str, params: P, map: F) -> Result<Vec<T>, StoreError>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> Result<T, rusqlite::Error>,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, map)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    fn row<T, P, F>(&self, sql: &str, params: P, map: F) -> Result<Option<T>, StoreError>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> Result<T, rusqlite::Error>,
    {
        self.conn
            .query_row(sql, params, map)
            .optional()
            .map_err(StoreError::from)
    }

    fn last_id(&self) -> Result<u64, StoreError> {
        let id = self.conn.last_insert_rowid();
        u64::try_from(id).map_err(|_| StoreError::Corrupt(format!("row id {id}")))
    }

    fn with_job_types(&self, row: ProviderRow) -> Result<ProviderProfile, StoreError> {
        let job_types = self.rows(
            "SELECT job_type_id FROM provider_profile_job_types WHERE provider_profile_id = ?1",
            params![row.id],
            |r| r.get::<_, u64>(0).map(JobTypeId),
        )?;
        Ok(ProviderProfile {
            id: ProviderProfileId(row.id),
            user_id: decode_user_id(&row.user_id)?,
            bio: row.bio,
            address: row.address,
            rating: row.rating,
            job_types: job_types.into_iter().collect(),
        })
    }
}

impl MarketTransaction for SqliteTransaction<'_> {
    fn insert_user(&mut self, user: User) -> Result<User, StoreError> {
        self.conn
            .execute(
                "INSERT INTO users (id, first_name, last_name, email, phone_number, role)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user.id.0.to_string(),
                    user.first_name,
                    user.last_name,
                    user.email,
                    user.phone_number,
                    user.role.label(),
                ],
            )
            .map_err(|err| classify(err, || format!("user {}", user.email)))?;
        Ok(user)
    }

    fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.row(
            "SELECT id, first_name, last_name, email, phone_number, role FROM users WHERE id = ?1",
            params![id.0.to_string()],
            UserRow::from_row,
        )?
        .map(UserRow::into_domain)
        .transpose()
    }

    fn insert_job_type(&mut self, name: &str, baseline_price: Price) -> Result<JobType, StoreError> {
        self.conn
            .execute(
                "INSERT INTO job_types (name, baseline_price_cents) VALUES (?1, ?2)",
                params![name, baseline_price.cents()],
            )
            .map_err(|err| classify(err, || format!("job type {name}")))?;
        Ok(JobType {
            id: JobTypeId(self.last_id()?),
            name: name.to_string(),
            baseline_price,
        })
    }

    fn job_type(&self, id: JobTypeId) -> Result<Option<JobType>, StoreError> {
        self.row(
            "SELECT id, name, baseline_price_cents FROM job_types WHERE id = ?1",
            params![id.0],
            job_type_from_row,
        )
    }

    fn job_types(&self) -> Result<Vec<JobType>, StoreError> {
        self.rows(
            "SELECT id, name, baseline_price_cents FROM job_types ORDER BY id",
            [],
            job_type_from_row,
        )
    }

    fn delete_job_type(&mut self, id: JobTypeId) -> Result<(), StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM job_types WHERE id = ?1", params![id.0])
            .map_err(|err| classify(err, String::new))?;
        if removed == 0 {
            return Err(StoreError::NotFound(format!("job type {}", id.0)));
        }
        Ok(())
    }

    fn insert_customer_profile(
        &mut self,
        user_id: UserId,
        address: String,
        additional_info: Option<String>,
    ) -> Result<CustomerProfile, StoreError> {
        self.conn
            .execute(
                "INSERT INTO customer_profiles (user_id, address, additional_info)
                 VALUES (?1, ?2, ?3)",
                params![user_id.0.to_string(), address, additional_info],
            )
            .map_err(|err| classify(err, || format!("customer profile for user {user_id}")))?;
        Ok(CustomerProfile {
            id: CustomerProfileId(self.last_id()?),
            user_id,
            address,
            additional_info,
        })
    }

    fn customer_profile(
        &self,
        id: CustomerProfileId,
    ) -> Result<Option<CustomerProfile>, StoreError> {
        self.row(
            "SELECT id, user_id, address, additional_info FROM customer_profiles WHERE id = ?1",
            params![id.0],
            CustomerRow::from_row,
        )?
        .map(CustomerRow::into_domain)
        .transpose()
    }

    fn customer_profile_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<CustomerProfile>, StoreError> {
        self.row(
            "SELECT id, user_id, address, additional_info FROM customer_profiles WHERE user_id = ?1",
            params![user_id.0.to_string()],
            CustomerRow::from_row,
        )?
        .map(CustomerRow::into_domain)
        .transpose()
    }

    fn delete_customer_profile(&mut self, id: CustomerProfileId) -> Result<(), StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM customer_profiles WHERE id = ?1", params![id.0])
            .map_err(|err| classify(err, String::new))?;
        if removed == 0 {
            return Err(StoreError::NotFound(format!("customer profile {}", id.0)));
        }
        Ok(())
    }

    fn insert_provider_profile(
        &mut self,
        user_id: UserId,
        bio: Option<String>,
        address: String,
    ) -> Result<ProviderProfile, StoreError> {
        self.conn
            .execute(
                "INSERT INTO provider_profiles (user_id, bio, address) VALUES (?1, ?2, ?3)",
                params![user_id.0.to_string(), bio, address],
            )
            .map_err(|err| classify(err, || format!("provider profile for user {user_id}")))?;
        Ok(ProviderProfile {
            id: ProviderProfileId(self.last_id()?),
            user_id,
            bio,
            address,
            rating: 0.0,
            job_types: Default::default(),
        })
    }

    fn provider_profile(
        &self,
        id: ProviderProfileId,
    ) -> Result<Option<ProviderProfile>, StoreError> {
        let sql = format!("SELECT {PROVIDER_COLUMNS} FROM provider_profiles WHERE id = ?1");
        self.row(&sql, params![id.0], ProviderRow::from_row)?
            .map(|row| self.with_job_types(row))
            .transpose()
    }

    fn provider_profile_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<ProviderProfile>, StoreError> {
        let sql = format!("SELECT {PROVIDER_COLUMNS} FROM provider_profiles WHERE user_id = ?1");
        self.row(&sql, params![user_id.0.to_string()], ProviderRow::from_row)?
            .map(|row| self.with_job_types(row))
            .transpose()
    }

    fn set_provider_job_types(
        &mut self,
        id: ProviderProfileId,
        job_types: &[JobTypeId],
    ) -> Result<(), StoreError> {
        let exists = self
            .row(
                "SELECT 1 FROM provider_profiles WHERE id = ?1",
                params![id.0],
                |_| Ok(()),
            )?
            .is_some();
        if !exists {
            return Err(StoreError::NotFound(format!("provider profile {}", id.0)));
        }
        for job_type in job_types {
            if self.job_type(*job_type)?.is_none() {
                return Err(StoreError::Constraint(format!(
                    "unknown job type {}",
                    job_type.0
                )));
            }
        }

        self.conn.execute(
            "DELETE FROM provider_profile_job_types WHERE provider_profile_id = ?1",
            params![id.0],
        )?;
        for job_type in job_types {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO provider_profile_job_types (provider_profile_id, job_type_id)
                     VALUES (?1, ?2)",
                    params![id.0, job_type.0],
                )
                .map_err(|err| classify(err, String::new))?;
        }
        Ok(())
    }

    fn providers_with_job_type(
        &self,
        job_type: JobTypeId,
    ) -> Result<Vec<ProviderProfile>, StoreError> {
        let raw = self.rows(
            "SELECT p.id, p.user_id, p.bio, p.address, p.rating
             FROM provider_profiles p
             JOIN provider_profile_job_types t ON t.provider_profile_id = p.id
             WHERE t.job_type_id = ?1
             ORDER BY p.id",
            params![job_type.0],
            ProviderRow::from_row,
        )?;
        raw.into_iter().map(|row| self.with_job_types(row)).collect()
    }

    fn set_provider_rating(&mut self, id: ProviderProfileId, rating: f64) -> Result<(), StoreError> {
        let updated = self
            .conn
            .execute(
                "UPDATE provider_profiles SET rating = ?2 WHERE id = ?1",
                params![id.0, rating],
            )
            .map_err(|err| classify(err, String::new))?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("provider profile {}", id.0)));
        }
        Ok(())
    }

    fn insert_job(&mut self, job: NewJob) -> Result<Job, StoreError> {
        let created_at = encode_time(&job.created_at);
        self.conn
            .execute(
                "INSERT INTO jobs (customer_profile_id, job_type_id, title, description,
                 proposed_price_cents, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    job.customer_profile_id.0,
                    job.job_type_id.0,
                    job.title,
                    job.description,
                    job.proposed_price.cents(),
                    JobStatus::Open.label(),
                    created_at,
                ],
            )
            .map_err(|err| classify(err, String::new))?;
        Ok(Job {
            id: JobId(self.last_id()?),
            customer_profile_id: job.customer_profile_id,
            job_type_id: job.job_type_id,
            title: job.title,
            description: job.description,
            proposed_price: job.proposed_price,
            status: JobStatus::Open,
            assigned_provider_id: None,
            provider_marked_done_at: None,
            created_at: job.created_at,
            updated_at: job.created_at,
        })
    }

    fn job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1");
        self.row(&sql, params![id.0], JobRow::from_row)?
            .map(JobRow::into_domain)
            .transpose()
    }

    fn update_job(&mut self, job: &Job) -> Result<(), StoreError> {
        let updated = self
            .conn
            .execute(
                "UPDATE jobs SET title = ?2, description = ?3, proposed_price_cents = ?4,
                 status = ?5, assigned_provider_id = ?6, provider_marked_done_at = ?7,
                 updated_at = ?8
                 WHERE id = ?1",
                params![
                    job.id.0,
                    job.title,
                    job.description,
                    job.proposed_price.cents(),
                    job.status.label(),
                    job.assigned_provider_id.map(|id| id.0),
                    job.provider_marked_done_at.as_ref().map(encode_time),
                    encode_time(&job.updated_at),
                ],
            )
            .map_err(|err| classify(err, String::new))?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("job {}", job.id.0)));
        }
        Ok(())
    }

    fn jobs_for_customer(&self, customer: CustomerProfileId) -> Result<Vec<Job>, StoreError> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE customer_profile_id = ?1
             ORDER BY created_at DESC, id DESC"
        );
        self.rows(&sql, params![customer.0], JobRow::from_row)?
            .into_iter()
            .map(JobRow::into_domain)
            .collect()
    }

    fn insert_provider_job(&mut self, row: ProviderProfileJob) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO provider_profile_jobs
                 (job_id, provider_profile_id, is_interested, is_selected)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    row.job_id.0,
                    row.provider_profile_id.0,
                    row.is_interested,
                    row.is_selected,
                ],
            )
            .map_err(|err| {
                classify(err, || {
                    format!("match of {} to {}", row.provider_profile_id, row.job_id)
                })
            })?;
        Ok(())
    }

    fn provider_job(
        &self,
        job_id: JobId,
        provider: ProviderProfileId,
    ) -> Result<Option<ProviderProfileJob>, StoreError> {
        self.row(
            "SELECT job_id, provider_profile_id, is_interested, is_selected
             FROM provider_profile_jobs WHERE job_id = ?1 AND provider_profile_id = ?2",
            params![job_id.0, provider.0],
            provider_job_from_row,
        )
    }

    fn update_provider_job(&mut self, row: &ProviderProfileJob) -> Result<(), StoreError> {
        let updated = self
            .conn
            .execute(
                "UPDATE provider_profile_jobs SET is_interested = ?3, is_selected = ?4
                 WHERE job_id = ?1 AND provider_profile_id = ?2",
                params![
                    row.job_id.0,
                    row.provider_profile_id.0,
                    row.is_interested,
                    row.is_selected,
                ],
            )
            .map_err(|err| classify(err, || format!("selected provider for {}", row.job_id)))?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!(
                "match of {} to {}",
                row.provider_profile_id, row.job_id
            )));
        }
        Ok(())
    }

    fn provider_jobs_for_job(&self, job_id: JobId) -> Result<Vec<ProviderProfileJob>, StoreError> {
        self.rows(
            "SELECT job_id, provider_profile_id, is_interested, is_selected
             FROM provider_profile_jobs WHERE job_id = ?1 ORDER BY provider_profile_id",
            params![job_id.0],
            provider_job_from_row,
        )
    }

    fn provider_jobs_for_provider(
        &self,
        provider: ProviderProfileId,
    ) -> Result<Vec<ProviderProfileJob>, StoreError> {
        self.rows(
            "SELECT job_id, provider_profile_id, is_interested, is_selected
             FROM provider_profile_jobs WHERE provider_profile_id = ?1 ORDER BY job_id",
            params![provider.0],
            provider_job_from_row,
        )
    }

    fn insert_rating(&mut self, rating: NewRating) -> Result<Rating, StoreError> {
        self.conn
            .execute(
                "INSERT INTO ratings
                 (job_id, provider_profile_id, customer_profile_id, rating, comment, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    rating.job_id.0,
                    rating.provider_profile_id.0,
                    rating.customer_profile_id.0,
                    rating.rating,
                    rating.comment,
                    encode_time(&rating.created_at),
                ],
            )
            .map_err(|err| {
                classify(err, || {
                    format!(
                        "rating for {} by customer {}",
                        rating.job_id, rating.customer_profile_id.0
                    )
                })
            })?;
        Ok(Rating {
            id: RatingId(self.last_id()?),
            job_id: rating.job_id,
            provider_profile_id: rating.provider_profile_id,
            customer_profile_id: rating.customer_profile_id,
            rating: rating.rating,
            comment: rating.comment,
            created_at: rating.created_at,
        })
    }

    fn rating_for(
        &self,
        job_id: JobId,
        customer: CustomerProfileId,
    ) -> Result<Option<Rating>, StoreError> {
        let sql = format!(
            "SELECT {RATING_COLUMNS} FROM ratings WHERE job_id = ?1 AND customer_profile_id = ?2"
        );
        self.row(&sql, params![job_id.0, customer.0], RatingRow::from_row)?
            .map(RatingRow::into_domain)
            .transpose()
    }

    fn ratings_for_provider(
        &self,
        provider: ProviderProfileId,
    ) -> Result<Vec<Rating>, StoreError> {
        let sql =
            format!("SELECT {RATING_COLUMNS} FROM ratings WHERE provider_profile_id = ?1 ORDER BY id");
        self.rows(&sql, params![provider.0], RatingRow::from_row)?
            .into_iter()
            .map(RatingRow::into_domain)
            .collect()
    }

    fn insert_notification(
        &mut self,
        notification: NewNotification,
    ) -> Result<Notification, StoreError> {
        self.conn
            .execute(
                "INSERT INTO notifications (job_id, user_id, type, message, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    notification.job_id.0,
                    notification.user_id.0.to_string(),
                    notification.kind.label(),
                    notification.message,
                    encode_time(&notification.created_at),
                ],
            )
            .map_err(|err| classify(err, String::new))?;
        Ok(Notification {
            id: NotificationId(self.last_id()?),
            job_id: notification.job_id,
            user_id: notification.user_id,
            kind: notification.kind,
            message: notification.message,
            is_read: false,
            created_at: notification.created_at,
        })
    }

    fn notification(&self, id: NotificationId) -> Result<Option<Notification>, StoreError> {
        let sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1");
        self.row(&sql, params![id.0], NotificationRow::from_row)?
            .map(NotificationRow::into_domain)
            .transpose()
    }

    fn mark_notification_read(&mut self, id: NotificationId) -> Result<(), StoreError> {
        let updated = self.conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1",
            params![id.0],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("notification {}", id.0)));
        }
        Ok(())
    }

    fn notifications_for(&self, user_id: UserId) -> Result<Vec<Notification>, StoreError> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC"
        );
        self.rows(&sql, params![user_id.0.to_string()], NotificationRow::from_row)?
            .into_iter()
            .map(NotificationRow::into_domain)
            .collect()
    }
}
