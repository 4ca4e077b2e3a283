use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::{MarketStore, MarketTransaction, StoreError};
use crate::marketplace::domain::{
    CustomerProfile, CustomerProfileId, Job, JobId, JobStatus, JobType, JobTypeId, NewJob,
    NewNotification, NewRating, Notification, NotificationId, Price, ProviderProfile,
    ProviderProfileId, ProviderProfileJob, Rating, RatingId, User, UserId,
};

/// In-process store. Each transaction edits a private copy of the state and
/// swaps it in on success, holding the lock for the whole unit of work.
/// Copying the whole state makes every transaction O(total records), so this
/// backend suits tests, demos and small deployments; use [`SqliteStore`] for
/// anything that accumulates history.
///
/// [`SqliteStore`]: super::SqliteStore
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MarketState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MarketStore for MemoryStore {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn MarketTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;

        let mut draft = guard.clone();
        let output = work(&mut MemoryTransaction { state: &mut draft })?;
        *guard = draft;
        Ok(output)
    }
}

#[derive(Debug, Clone, Default)]
struct Sequences {
    job_type: u64,
    customer_profile: u64,
    provider_profile: u64,
    job: u64,
    rating: u64,
    notification: u64,
}

fn next(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

#[derive(Debug, Clone, Default)]
struct MarketState {
    users: BTreeMap<UserId, User>,
    job_types: BTreeMap<JobTypeId, JobType>,
    customer_profiles: BTreeMap<CustomerProfileId, CustomerProfile>,
    provider_profiles: BTreeMap<ProviderProfileId, ProviderProfile>,
    jobs: BTreeMap<JobId, Job>,
    provider_jobs: BTreeMap<(JobId, ProviderProfileId), ProviderProfileJob>,
    ratings: BTreeMap<RatingId, Rating>,
    notifications: BTreeMap<NotificationId, Notification>,
    sequences: Sequences,
}

impl MarketState {
    fn remove_job_cascade(&mut self, job_id: JobId) {
        self.jobs.remove(&job_id);
        self.provider_jobs.retain(|(job, _), _| *job != job_id);
        self.ratings.retain(|_, rating| rating.job_id != job_id);
        self.notifications
            .retain(|_, notification| notification.job_id != job_id);
    }
}

struct MemoryTransaction<'a> {
    state: &'a mut MarketState,
}

fn check_job_row(job: &Job) -> Result<(), StoreError> {
    if job.assigned_provider_id.is_some() != job.status.holds_assignment() {
        return Err(StoreError::Constraint(format!(
            "assigned provider must be set exactly when status is in progress or later (status {})",
            job.status
        )));
    }
    let marked_done = matches!(job.status, JobStatus::ProviderDone | JobStatus::Completed);
    if job.provider_marked_done_at.is_some() != marked_done {
        return Err(StoreError::Constraint(format!(
            "provider_marked_done_at must be set exactly when the provider finished (status {})",
            job.status
        )));
    }
    Ok(())
}

impl MarketTransaction for MemoryTransaction<'_> {
    fn insert_user(&mut self, user: User) -> Result<User, StoreError> {
        if self.state.users.contains_key(&user.id)
            || self
                .state
                .users
                .values()
                .any(|existing| existing.email == user.email)
        {
            return Err(StoreError::Conflict(format!("user {}", user.email)));
        }
        self.state.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.state.users.get(&id).cloned())
    }

    fn insert_job_type(&mut self, name: &str, baseline_price: Price) -> Result<JobType, StoreError> {
        if self
            .state
            .job_types
            .values()
            .any(|existing| existing.name == name)
        {
            return Err(StoreError::Conflict(format!("job type {name}")));
        }
        let job_type = JobType {
            id: JobTypeId(next(&mut self.state.sequences.job_type)),
            name: name.to_string(),
            baseline_price,
        };
        self.state.job_types.insert(job_type.id, job_type.clone());
        Ok(job_type)
    }

    fn job_type(&self, id: JobTypeId) -> Result<Option<JobType>, StoreError> {
        Ok(self.state.job_types.get(&id).cloned())
    }

    fn job_types(&self) -> Result<Vec<JobType>, StoreError> {
        Ok(self.state.job_types.values().cloned().collect())
    }

    fn delete_job_type(&mut self, id: JobTypeId) -> Result<(), StoreError> {
        if !self.state.job_types.contains_key(&id) {
            return Err(StoreError::NotFound(format!("job type {}", id.0)));
        }
        if self.state.jobs.values().any(|job| job.job_type_id == id) {
            return Err(StoreError::Constraint(format!(
                "job type {} is still referenced by jobs",
                id.0
            )));
        }
        self.state.job_types.remove(&id);
        for profile in self.state.provider_profiles.values_mut() {
            profile.job_types.remove(&id);
        }
        Ok(())
    }

    fn insert_customer_profile(
        &mut self,
        user_id: UserId,
        address: String,
        additional_info: Option<String>,
    ) -> Result<CustomerProfile, StoreError> {
        if !self.state.users.contains_key(&user_id) {
            return Err(StoreError::Constraint(format!("unknown user {user_id}")));
        }
        if self
            .state
            .customer_profiles
            .values()
            .any(|profile| profile.user_id == user_id)
        {
            return Err(StoreError::Conflict(format!(
                "customer profile for user {user_id}"
            )));
        }
        let profile = CustomerProfile {
            id: CustomerProfileId(next(&mut self.state.sequences.customer_profile)),
            user_id,
            address,
            additional_info,
        };
        self.state
            .customer_profiles
            .insert(profile.id, profile.clone());
        Ok(profile)
    }

    fn customer_profile(
        &self,
        id: CustomerProfileId,
    ) -> Result<Option<CustomerProfile>, StoreError> {
        Ok(self.state.customer_profiles.get(&id).cloned())
    }

    fn customer_profile_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<CustomerProfile>, StoreError> {
        Ok(self
            .state
            .customer_profiles
            .values()
            .find(|profile| profile.user_id == user_id)
            .cloned())
    }

    fn delete_customer_profile(&mut self, id: CustomerProfileId) -> Result<(), StoreError> {
        if self.state.customer_profiles.remove(&id).is_none() {
            return Err(StoreError::NotFound(format!("customer profile {}", id.0)));
        }
        let owned: Vec<JobId> = self
            .state
            .jobs
            .values()
            .filter(|job| job.customer_profile_id == id)
            .map(|job| job.id)
            .collect();
        for job_id in owned {
            self.state.remove_job_cascade(job_id);
        }
        self.state
            .ratings
            .retain(|_, rating| rating.customer_profile_id != id);
        Ok(())
    }

    fn insert_provider_profile(
        &mut self,
        user_id: UserId,
        bio: Option<String>,
        address: String,
    ) -> Result<ProviderProfile, StoreError> {
        if !self.state.users.contains_key(&user_id) {
            return Err(StoreError::Constraint(format!("unknown user {user_id}")));
        }
        if self
            .state
            .provider_profiles
            .values()
            .any(|profile| profile.user_id == user_id)
        {
            return Err(StoreError::Conflict(format!(
                "provider profile for user {user_id}"
            )));
        }
        let profile = ProviderProfile {
            id: ProviderProfileId(next(&mut self.state.sequences.provider_profile)),
            user_id,
            bio,
            address,
            rating: 0.0,
            job_types: Default::default(),
        };
        self.state
            .provider_profiles
            .insert(profile.id, profile.clone());
        Ok(profile)
    }

    fn provider_profile(
        &self,
        id: ProviderProfileId,
    ) -> Result<Option<ProviderProfile>, StoreError> {
        Ok(self.state.provider_profiles.get(&id).cloned())
    }

    fn provider_profile_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<ProviderProfile>, StoreError> {
        Ok(self
            .state
            .provider_profiles
            .values()
            .find(|profile| profile.user_id == user_id)
            .cloned())
    }

    fn set_provider_job_types(
        &mut self,
        id: ProviderProfileId,
        job_types: &[JobTypeId],
    ) -> Result<(), StoreError> {
        if let Some(missing) = job_types
            .iter()
            .find(|job_type| !self.state.job_types.contains_key(job_type))
        {
            return Err(StoreError::Constraint(format!(
                "unknown job type {}",
                missing.0
            )));
        }
        let profile = self
            .state
            .provider_profiles
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("provider profile {}", id.0)))?;
        profile.job_types = job_types.iter().copied().collect();
        Ok(())
    }

    fn providers_with_job_type(
        &self,
        job_type: JobTypeId,
    ) -> Result<Vec<ProviderProfile>, StoreError> {
        Ok(self
            .state
            .provider_profiles
            .values()
            .filter(|profile| profile.job_types.contains(&job_type))
            .cloned()
            .collect())
    }

    fn set_provider_rating(&mut self, id: ProviderProfileId, rating: f64) -> Result<(), StoreError> {
        if !(0.0..=5.0).contains(&rating) {
            return Err(StoreError::Constraint(format!(
                "provider rating {rating} outside 0..=5"
            )));
        }
        let profile = self
            .state
            .provider_profiles
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("provider profile {}", id.0)))?;
        profile.rating = rating;
        Ok(())
    }

    fn insert_job(&mut self, job: NewJob) -> Result<Job, StoreError> {
        if !self
            .state
            .customer_profiles
            .contains_key(&job.customer_profile_id)
        {
            return Err(StoreError::Constraint(format!(
                "unknown customer profile {}",
                job.customer_profile_id.0
            )));
        }
        if !self.state.job_types.contains_key(&job.job_type_id) {
            return Err(StoreError::Constraint(format!(
                "unknown job type {}",
                job.job_type_id.0
            )));
        }
        let job = Job {
            id: JobId(next(&mut self.state.sequences.job)),
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
        };
        self.state.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    fn job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.state.jobs.get(&id).cloned())
    }

    fn update_job(&mut self, job: &Job) -> Result<(), StoreError> {
        check_job_row(job)?;
        if let Some(provider) = job.assigned_provider_id {
            if !self.state.provider_profiles.contains_key(&provider) {
                return Err(StoreError::Constraint(format!(
                    "unknown provider profile {}",
                    provider.0
                )));
            }
        }
        let slot = self
            .state
            .jobs
            .get_mut(&job.id)
            .ok_or_else(|| StoreError::NotFound(format!("job {}", job.id.0)))?;
        *slot = job.clone();
        Ok(())
    }

    fn jobs_for_customer(&self, customer: CustomerProfileId) -> Result<Vec<Job>, StoreError> {
        let mut jobs: Vec<Job> = self
            .state
            .jobs
            .values()
            .filter(|job| job.customer_profile_id == customer)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(jobs)
    }

    fn insert_provider_job(&mut self, row: ProviderProfileJob) -> Result<(), StoreError> {
        if !self.state.jobs.contains_key(&row.job_id) {
            return Err(StoreError::Constraint(format!("unknown job {}", row.job_id.0)));
        }
        if !self
            .state
            .provider_profiles
            .contains_key(&row.provider_profile_id)
        {
            return Err(StoreError::Constraint(format!(
                "unknown provider profile {}",
                row.provider_profile_id.0
            )));
        }
        if row.is_selected && !row.is_interested {
            return Err(StoreError::Constraint(
                "a provider must be interested before being selected".to_string(),
            ));
        }
        let key = (row.job_id, row.provider_profile_id);
        if self.state.provider_jobs.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "match of {} to {}",
                row.provider_profile_id, row.job_id
            )));
        }
        if row.is_selected
            && self
                .state
                .provider_jobs
                .iter()
                .any(|(other_key, other)| other_key.0 == row.job_id && other.is_selected)
        {
            return Err(StoreError::Conflict(format!(
                "selected provider for {}",
                row.job_id
            )));
        }
        self.state.provider_jobs.insert(key, row);
        Ok(())
    }

    fn provider_job(
        &self,
        job_id: JobId,
        provider: ProviderProfileId,
    ) -> Result<Option<ProviderProfileJob>, StoreError> {
        Ok(self.state.provider_jobs.get(&(job_id, provider)).cloned())
    }

    fn update_provider_job(&mut self, row: &ProviderProfileJob) -> Result<(), StoreError> {
        if row.is_selected && !row.is_interested {
            return Err(StoreError::Constraint(
                "a provider must be interested before being selected".to_string(),
            ));
        }
        let key = (row.job_id, row.provider_profile_id);
        if !self.state.provider_jobs.contains_key(&key) {
            return Err(StoreError::NotFound(format!(
                "match of {} to {}",
                row.provider_profile_id, row.job_id
            )));
        }
        if row.is_selected
            && self.state.provider_jobs.iter().any(|(other_key, other)| {
                other_key.0 == row.job_id && *other_key != key && other.is_selected
            })
        {
            return Err(StoreError::Conflict(format!(
                "selected provider for {}",
                row.job_id
            )));
        }
        self.state.provider_jobs.insert(key, row.clone());
        Ok(())
    }

    fn provider_jobs_for_job(&self, job_id: JobId) -> Result<Vec<ProviderProfileJob>, StoreError> {
        Ok(self
            .state
            .provider_jobs
            .range((job_id, ProviderProfileId(0))..=(job_id, ProviderProfileId(u64::MAX)))
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn provider_jobs_for_provider(
        &self,
        provider: ProviderProfileId,
    ) -> Result<Vec<ProviderProfileJob>, StoreError> {
        Ok(self
            .state
            .provider_jobs
            .values()
            .filter(|row| row.provider_profile_id == provider)
            .cloned()
            .collect())
    }

    fn insert_rating(&mut self, rating: NewRating) -> Result<Rating, StoreError> {
        if !(1..=5).contains(&rating.rating) {
            return Err(StoreError::Constraint(format!(
                "rating {} outside 1..=5",
                rating.rating
            )));
        }
        if !self.state.jobs.contains_key(&rating.job_id) {
            return Err(StoreError::Constraint(format!(
                "unknown job {}",
                rating.job_id.0
            )));
        }
        if !self
            .state
            .provider_profiles
            .contains_key(&rating.provider_profile_id)
        {
            return Err(StoreError::Constraint(format!(
                "unknown provider profile {}",
                rating.provider_profile_id.0
            )));
        }
        if self.state.ratings.values().any(|existing| {
            existing.job_id == rating.job_id
                && existing.customer_profile_id == rating.customer_profile_id
        }) {
            return Err(StoreError::Conflict(format!(
                "rating for {} by customer {}",
                rating.job_id, rating.customer_profile_id.0
            )));
        }
        let stored = Rating {
            id: RatingId(next(&mut self.state.sequences.rating)),
            job_id: rating.job_id,
            provider_profile_id: rating.provider_profile_id,
            customer_profile_id: rating.customer_profile_id,
            rating: rating.rating,
            comment: rating.comment,
            created_at: rating.created_at,
        };
        self.state.ratings.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn rating_for(
        &self,
        job_id: JobId,
        customer: CustomerProfileId,
    ) -> Result<Option<Rating>, StoreError> {
        Ok(self
            .state
            .ratings
            .values()
            .find(|rating| rating.job_id == job_id && rating.customer_profile_id == customer)
            .cloned())
    }

    fn ratings_for_provider(
        &self,
        provider: ProviderProfileId,
    ) -> Result<Vec<Rating>, StoreError> {
        Ok(self
            .state
            .ratings
            .values()
            .filter(|rating| rating.provider_profile_id == provider)
            .cloned()
            .collect())
    }

    fn insert_notification(
        &mut self,
        notification: NewNotification,
    ) -> Result<Notification, StoreError> {
        if !self.state.jobs.contains_key(&notification.job_id) {
            return Err(StoreError::Constraint(format!(
                "unknown job {}",
                notification.job_id.0
            )));
        }
        if !self.state.users.contains_key(&notification.user_id) {
            return Err(StoreError::Constraint(format!(
                "unknown user {}",
                notification.user_id
            )));
        }
        let stored = Notification {
            id: NotificationId(next(&mut self.state.sequences.notification)),
            job_id: notification.job_id,
            user_id: notification.user_id,
            kind: notification.kind,
            message: notification.message,
            is_read: false,
            created_at: notification.created_at,
        };
        self.state
            .notifications
            .insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn notification(&self, id: NotificationId) -> Result<Option<Notification>, StoreError> {
        Ok(self.state.notifications.get(&id).cloned())
    }

    fn mark_notification_read(&mut self, id: NotificationId) -> Result<(), StoreError> {
        let notification = self
            .state
            .notifications
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("notification {}", id.0)))?;
        notification.is_read = true;
        Ok(())
    }

    fn notifications_for(&self, user_id: UserId) -> Result<Vec<Notification>, StoreError> {
        let mut notifications: Vec<Notification> = self
            .state
            .notifications
            .values()
            .filter(|notification| notification.user_id == user_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notifications)
    }
}
