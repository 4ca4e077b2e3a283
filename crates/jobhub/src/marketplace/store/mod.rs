//! Storage abstraction for marketplace state.
//!
//! A [`MarketStore`] hands out one [`MarketTransaction`] per unit of work.
//! Whatever the closure writes becomes visible only if it returns `Ok`;
//! transactions never interleave, so a read-check-write sequence inside one
//! closure cannot race with another request.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use super::domain::{
    CustomerProfile, CustomerProfileId, Job, JobId, JobType, JobTypeId, NewJob, NewNotification,
    NewRating, Notification, NotificationId, Price, ProviderProfile, ProviderProfileId,
    ProviderProfileJob, Rating, User, UserId,
};

/// Unit-of-work boundary over the marketplace tables.
pub trait MarketStore: Send + Sync {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn MarketTransaction) -> Result<T, E>,
        E: From<StoreError>;
}

/// Row-level operations available inside a transaction.
pub trait MarketTransaction {
    fn insert_user(&mut self, user: User) -> Result<User, StoreError>;
    fn user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    fn insert_job_type(&mut self, name: &str, baseline_price: Price)
        -> Result<JobType, StoreError>;
    fn job_type(&self, id: JobTypeId) -> Result<Option<JobType>, StoreError>;
    fn job_types(&self) -> Result<Vec<JobType>, StoreError>;
    /// Fails with [`StoreError::Constraint`] while jobs still reference the type.
    fn delete_job_type(&mut self, id: JobTypeId) -> Result<(), StoreError>;

    fn insert_customer_profile(
        &mut self,
        user_id: UserId,
        address: String,
        additional_info: Option<String>,
    ) -> Result<CustomerProfile, StoreError>;
    fn customer_profile(&self, id: CustomerProfileId)
        -> Result<Option<CustomerProfile>, StoreError>;
    fn customer_profile_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<CustomerProfile>, StoreError>;
    /// Removes the profile and cascades to its jobs and their dependent rows.
    fn delete_customer_profile(&mut self, id: CustomerProfileId) -> Result<(), StoreError>;

    fn insert_provider_profile(
        &mut self,
        user_id: UserId,
        bio: Option<String>,
        address: String,
    ) -> Result<ProviderProfile, StoreError>;
    fn provider_profile(&self, id: ProviderProfileId)
        -> Result<Option<ProviderProfile>, StoreError>;
    fn provider_profile_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<ProviderProfile>, StoreError>;
    /// Replaces the provider's declared job types.
    fn set_provider_job_types(
        &mut self,
        id: ProviderProfileId,
        job_types: &[JobTypeId],
    ) -> Result<(), StoreError>;
    /// Providers whose declared job types contain `job_type`, by id.
    fn providers_with_job_type(
        &self,
        job_type: JobTypeId,
    ) -> Result<Vec<ProviderProfile>, StoreError>;
    fn set_provider_rating(&mut self, id: ProviderProfileId, rating: f64)
        -> Result<(), StoreError>;

    fn insert_job(&mut self, job: NewJob) -> Result<Job, StoreError>;
    fn job(&self, id: JobId) -> Result<Option<Job>, StoreError>;
    fn update_job(&mut self, job: &Job) -> Result<(), StoreError>;
    /// Jobs posted by the customer, newest first.
    fn jobs_for_customer(&self, customer: CustomerProfileId) -> Result<Vec<Job>, StoreError>;

    /// Fails with [`StoreError::Conflict`] if the pair already exists.
    fn insert_provider_job(&mut self, row: ProviderProfileJob) -> Result<(), StoreError>;
    fn provider_job(
        &self,
        job_id: JobId,
        provider: ProviderProfileId,
    ) -> Result<Option<ProviderProfileJob>, StoreError>;
    /// Enforces `is_selected => is_interested` and at most one selected row
    /// per job.
    fn update_provider_job(&mut self, row: &ProviderProfileJob) -> Result<(), StoreError>;
    fn provider_jobs_for_job(&self, job_id: JobId) -> Result<Vec<ProviderProfileJob>, StoreError>;
    fn provider_jobs_for_provider(
        &self,
        provider: ProviderProfileId,
    ) -> Result<Vec<ProviderProfileJob>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when the customer already rated
    /// the job.
    fn insert_rating(&mut self, rating: NewRating) -> Result<Rating, StoreError>;
    fn rating_for(
        &self,
        job_id: JobId,
        customer: CustomerProfileId,
    ) -> Result<Option<Rating>, StoreError>;
    fn ratings_for_provider(&self, provider: ProviderProfileId)
        -> Result<Vec<Rating>, StoreError>;

    fn insert_notification(
        &mut self,
        notification: NewNotification,
    ) -> Result<Notification, StoreError>;
    fn notification(&self, id: NotificationId) -> Result<Option<Notification>, StoreError>;
    fn mark_notification_read(&mut self, id: NotificationId) -> Result<(), StoreError>;
    /// Notifications addressed to the user, newest first.
    fn notifications_for(&self, user_id: UserId) -> Result<Vec<Notification>, StoreError>;
}

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("stored value is corrupt: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error for path '{path}': {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests;
