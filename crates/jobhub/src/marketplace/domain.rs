use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity issued by the external authentication collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CustomerProfileId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderProfileId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobTypeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RatingId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NotificationId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

impl fmt::Display for ProviderProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "provider-{}", self.0)
    }
}

/// Account role assigned at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Provider,
    Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Provider => "provider",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "customer" => Some(Role::Customer),
            "provider" => Some(Role::Provider),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub id: CustomerProfileId,
    pub user_id: UserId,
    pub address: String,
    pub additional_info: Option<String>,
}

/// Provider profile with its declared job types and the denormalized average
/// of every rating it has received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub id: ProviderProfileId,
    pub user_id: UserId,
    pub bio: Option<String>,
    pub address: String,
    pub rating: f64,
    pub job_types: BTreeSet<JobTypeId>,
}

/// Monetary amount stored as whole cents; exchanged as a decimal number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "f64", try_from = "f64")]
pub struct Price(u64);

impl Price {
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    pub const fn cents(self) -> u64 {
        self.0
    }

    /// Largest amount any store can hold: SQLite integers are signed 64-bit.
    pub const MAX_CENTS: u64 = i64::MAX as u64;

    /// Accepts only finite, strictly positive amounts up to [`Price::MAX_CENTS`].
    pub fn from_decimal(amount: f64) -> Result<Self, InvalidPrice> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(InvalidPrice(amount));
        }
        let cents = (amount * 100.0).round();
        if cents < 1.0 || cents >= Self::MAX_CENTS as f64 {
            return Err(InvalidPrice(amount));
        }
        Ok(Self(cents as u64))
    }

    pub fn as_decimal(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl From<Price> for f64 {
    fn from(value: Price) -> Self {
        value.as_decimal()
    }
}

impl TryFrom<f64> for Price {
    type Error = InvalidPrice;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Price::from_decimal(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("price must be a positive amount, got {0}")]
pub struct InvalidPrice(pub f64);

/// Category of work with a baseline price; the unit of provider matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobType {
    pub id: JobTypeId,
    pub name: String,
    pub baseline_price: Price,
}

/// Lifecycle status of a job. Transitions are defined in
/// [`super::lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Open,
    InProgress,
    ProviderDone,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub const fn label(self) -> &'static str {
        match self {
            JobStatus::Open => "open",
            JobStatus::InProgress => "in_progress",
            JobStatus::ProviderDone => "provider_done",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(JobStatus::Open),
            "in_progress" => Some(JobStatus::InProgress),
            "provider_done" => Some(JobStatus::ProviderDone),
            "completed" => Some(JobStatus::Completed),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub customer_profile_id: CustomerProfileId,
    pub job_type_id: JobTypeId,
    pub title: String,
    pub description: String,
    pub proposed_price: Price,
    pub status: JobStatus,
    pub assigned_provider_id: Option<ProviderProfileId>,
    pub provider_marked_done_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Customer supplied payload for posting a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDraft {
    pub job_type_id: JobTypeId,
    pub title: String,
    pub description: String,
    pub proposed_price: f64,
}

/// Validated job ready to be inserted; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub customer_profile_id: CustomerProfileId,
    pub job_type_id: JobTypeId,
    pub title: String,
    pub description: String,
    pub proposed_price: Price,
    pub created_at: DateTime<Utc>,
}

/// One provider's relationship to one job, created when the provider is
/// matched at job creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfileJob {
    pub job_id: JobId,
    pub provider_profile_id: ProviderProfileId,
    pub is_interested: bool,
    pub is_selected: bool,
}

impl ProviderProfileJob {
    pub fn matched(job_id: JobId, provider_profile_id: ProviderProfileId) -> Self {
        Self {
            job_id,
            provider_profile_id,
            is_interested: false,
            is_selected: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub id: RatingId,
    pub job_id: JobId,
    pub provider_profile_id: ProviderProfileId,
    pub customer_profile_id: CustomerProfileId,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRating {
    pub job_id: JobId,
    pub provider_profile_id: ProviderProfileId,
    pub customer_profile_id: CustomerProfileId,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Customer supplied review payload. `rating` stays wide so out-of-range
/// values reach validation instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingDraft {
    pub rating: i64,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    NewJob,
    JobSelected,
    StatusChanged,
    ProviderInterested,
    ProviderAssigned,
}

impl NotificationType {
    pub const fn label(self) -> &'static str {
        match self {
            NotificationType::NewJob => "new_job",
            NotificationType::JobSelected => "job_selected",
            NotificationType::StatusChanged => "status_changed",
            NotificationType::ProviderInterested => "provider_interested",
            NotificationType::ProviderAssigned => "provider_assigned",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new_job" => Some(NotificationType::NewJob),
            "job_selected" => Some(NotificationType::JobSelected),
            "status_changed" => Some(NotificationType::StatusChanged),
            "provider_interested" => Some(NotificationType::ProviderInterested),
            "provider_assigned" => Some(NotificationType::ProviderAssigned),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub job_id: JobId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub job_id: JobId,
    pub user_id: UserId,
    pub kind: NotificationType,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfileDraft {
    pub address: String,
    #[serde(default)]
    pub additional_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfileDraft {
    #[serde(default)]
    pub bio: Option<String>,
    pub address: String,
    #[serde(default)]
    pub job_type_ids: Vec<JobTypeId>,
}

/// Caller identity resolved once per request by the profile directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    pub customer_profile: Option<CustomerProfileId>,
    pub provider_profile: Option<ProviderProfileId>,
}

/// Provider summary returned to a job owner reviewing interest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterestedProvider {
    pub provider_profile_id: ProviderProfileId,
    pub is_selected: bool,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub rating: f64,
}

/// Provider-side view of a matched job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderJobView {
    pub job: Job,
    pub is_interested: bool,
    pub is_selected: bool,
}

/// Rating receipt including the provider's recomputed aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatedProvider {
    pub rating: Rating,
    pub provider_rating: f64,
}

/// 1-based page selector for list operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    #[serde(default = "PageRequest::first_page")]
    pub page: usize,
    #[serde(default)]
    pub per_page: Option<usize>,
}

impl PageRequest {
    fn first_page() -> usize {
        1
    }

    pub fn first(per_page: usize) -> Self {
        Self {
            page: 1,
            per_page: Some(per_page),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
}

impl<T> Page<T> {
    /// Slice an already ordered collection. Pages past the end are empty.
    pub fn from_ordered(items: Vec<T>, page: usize, per_page: usize) -> Self {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let total = items.len();
        let items = items
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect();
        Self {
            items,
            page,
            per_page,
            total,
        }
    }
}
