use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use super::capability::{CapabilityDenied, CapabilityPolicy, Operation};
use super::domain::{
    Actor, InterestedProvider, Job, JobDraft, JobId, NewJob, NewRating, NotificationType,
    PageRequest, Price, ProviderProfileId, ProviderProfileJob, RatedProvider, RatingDraft, UserId,
};
use super::lifecycle::{IllegalTransition, JobTransition};
use super::notifications::{self, emit};
use super::store::{MarketStore, MarketTransaction, StoreError};
use super::{matching, ratings};
use crate::config::{MarketplaceConfig, MAX_PAGE_SIZE};

const MAX_COMMENT_CHARS: usize = 1000;

/// Lifecycle engine over a [`MarketStore`].
///
/// Each public operation authorizes the actor first, then runs its reads,
/// legality checks and writes inside one store transaction. A failing check
/// aborts the transaction, so no operation ever applies half of its effects.
pub struct MarketplaceService<S> {
    store: Arc<S>,
    policy: CapabilityPolicy,
    config: MarketplaceConfig,
}

impl<S> MarketplaceService<S>
where
    S: MarketStore,
{
    pub fn new(store: Arc<S>, config: MarketplaceConfig) -> Self {
        Self {
            store,
            policy: CapabilityPolicy,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> &CapabilityPolicy {
        &self.policy
    }

    pub(crate) fn per_page(&self, page: &PageRequest) -> usize {
        page.per_page
            .unwrap_or(self.config.page_size)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// Post a job and notify every provider whose job types match it.
    pub fn create_job(&self, actor: &Actor, draft: JobDraft) -> Result<Job, JobServiceError> {
        let operation = Operation::CreateJob;
        let customer = self.policy.authorize_customer(actor, operation)?;
        let title = required_text("title", &draft.title)?;
        let description = required_text("description", &draft.description)?;
        let proposed_price = Price::from_decimal(draft.proposed_price)
            .map_err(|err| JobServiceError::Validation(err.to_string()))?;

        let (job, matched) = self
            .store
            .transaction(|tx| {
                if tx.job_type(draft.job_type_id)?.is_none() {
                    return Err(JobServiceError::Validation(format!(
                        "job type {} does not exist",
                        draft.job_type_id.0
                    )));
                }

                let now = Utc::now();
                let job = tx.insert_job(NewJob {
                    customer_profile_id: customer,
                    job_type_id: draft.job_type_id,
                    title,
                    description,
                    proposed_price,
                    created_at: now,
                })?;

                let candidates = matching::find_candidates(tx, &job)?;
                for provider in &candidates {
                    tx.insert_provider_job(ProviderProfileJob::matched(job.id, provider.id))?;
                    emit(
                        tx,
                        provider.user_id,
                        job.id,
                        NotificationType::NewJob,
                        notifications::NEW_JOB,
                        now,
                    )?;
                }
                Ok((job, candidates.len()))
            })
            .inspect_err(|err| rejected(operation, actor, err))?;

        tracing::info!(
            job_id = %job.id,
            customer_profile = job.customer_profile_id.0,
            matched_providers = matched,
            status = %job.status,
            "job posted"
        );
        Ok(job)
    }

    /// Flag the calling provider as interested in a job it was matched to.
    pub fn express_interest(
        &self,
        actor: &Actor,
        job_id: JobId,
    ) -> Result<ProviderProfileJob, JobServiceError> {
        let operation = Operation::ExpressInterest;
        let provider = self.policy.authorize_provider(actor, operation)?;

        let row = self
            .store
            .transaction(|tx| {
                let mut row = tx.provider_job(job_id, provider)?.ok_or_else(|| {
                    JobServiceError::NotFound(format!("{job_id} for {provider}"))
                })?;
                row.is_interested = true;
                tx.update_provider_job(&row)?;

                let owner = match tx.job(job_id)? {
                    Some(job) => tx.customer_profile(job.customer_profile_id)?,
                    None => None,
                };
                if let Some(owner) = owner {
                    emit(
                        tx,
                        owner.user_id,
                        job_id,
                        NotificationType::ProviderInterested,
                        notifications::PROVIDER_INTERESTED,
                        Utc::now(),
                    )?;
                }
                Ok(row)
            })
            .inspect_err(|err| rejected(operation, actor, err))?;

        tracing::info!(job_id = %job_id, provider = %provider, "provider interested");
        Ok(row)
    }

    /// Interested providers for a job, visible to its owner only.
    pub fn list_interested_providers(
        &self,
        actor: &Actor,
        job_id: JobId,
    ) -> Result<Vec<InterestedProvider>, JobServiceError> {
        let operation = Operation::ListInterestedProviders;
        let customer = self.policy.authorize_customer(actor, operation)?;

        self.store
            .transaction(|tx| {
                let job = load_job(tx, job_id)?;
                self.policy.ensure_owner(customer, &job, operation)?;

                let mut interested = Vec::new();
                for row in tx.provider_jobs_for_job(job_id)? {
                    if !row.is_interested {
                        continue;
                    }
                    let profile = tx.provider_profile(row.provider_profile_id)?.ok_or_else(|| {
                        JobServiceError::NotFound(row.provider_profile_id.to_string())
                    })?;
                    let user = tx.user(profile.user_id)?.ok_or_else(|| {
                        JobServiceError::NotFound(format!("user {}", profile.user_id))
                    })?;
                    interested.push(InterestedProvider {
                        provider_profile_id: profile.id,
                        is_selected: row.is_selected,
                        first_name: user.first_name,
                        last_name: user.last_name,
                        bio: profile.bio,
                        rating: profile.rating,
                    });
                }
                Ok(interested)
            })
            .inspect_err(|err| rejected(operation, actor, err))
    }

    /// Assign an interested provider and move the job to `in_progress`.
    pub fn select_provider(
        &self,
        actor: &Actor,
        job_id: JobId,
        provider_profile_id: ProviderProfileId,
    ) -> Result<Job, JobServiceError> {
        let operation = Operation::SelectProvider;
        let customer = self.policy.authorize_customer(actor, operation)?;

        let job = self
            .store
            .transaction(|tx| {
                let mut job = load_job(tx, job_id)?;
                self.policy.ensure_owner(customer, &job, operation)?;

                let mut row = tx
                    .provider_job(job_id, provider_profile_id)?
                    .filter(|row| row.is_interested)
                    .ok_or_else(|| {
                        JobServiceError::Validation(format!(
                            "{provider_profile_id} has not expressed interest in {job_id}"
                        ))
                    })?;

                let next = job.status.apply(JobTransition::SelectProvider)?;
                let now = Utc::now();

                row.is_selected = true;
                tx.update_provider_job(&row)?;

                job.status = next;
                job.assigned_provider_id = Some(provider_profile_id);
                job.updated_at = now;
                tx.update_job(&job)?;

                let provider = tx.provider_profile(provider_profile_id)?.ok_or_else(|| {
                    JobServiceError::NotFound(provider_profile_id.to_string())
                })?;
                emit(
                    tx,
                    provider.user_id,
                    job.id,
                    NotificationType::JobSelected,
                    notifications::JOB_SELECTED,
                    now,
                )?;
                emit(
                    tx,
                    actor.user_id,
                    job.id,
                    NotificationType::ProviderAssigned,
                    notifications::PROVIDER_ASSIGNED,
                    now,
                )?;
                Ok(job)
            })
            .inspect_err(|err| rejected(operation, actor, err))?;

        tracing::info!(
            job_id = %job.id,
            provider = %provider_profile_id,
            status = %job.status,
            "provider selected"
        );
        Ok(job)
    }

    /// The assigned provider reports the work as finished.
    pub fn provider_mark_done(&self, actor: &Actor, job_id: JobId) -> Result<Job, JobServiceError> {
        let operation = Operation::ProviderMarkDone;
        let provider = self.policy.authorize_provider(actor, operation)?;

        let job = self
            .store
            .transaction(|tx| {
                let mut job = load_job(tx, job_id)?;
                let next = job.status.apply(JobTransition::ProviderMarkDone)?;
                self.policy.ensure_assigned(provider, &job, operation)?;

                let now = Utc::now();
                job.status = next;
                job.provider_marked_done_at = Some(now);
                job.updated_at = now;
                tx.update_job(&job)?;

                let owner = owner_user(tx, &job)?;
                emit(
                    tx,
                    owner,
                    job.id,
                    NotificationType::StatusChanged,
                    notifications::PROVIDER_DONE,
                    now,
                )?;
                Ok(job)
            })
            .inspect_err(|err| rejected(operation, actor, err))?;

        tracing::info!(
            job_id = %job.id,
            provider = %provider,
            status = %job.status,
            "provider marked job done"
        );
        Ok(job)
    }

    /// The owner confirms the provider's work, completing the job.
    pub fn customer_confirm_complete(
        &self,
        actor: &Actor,
        job_id: JobId,
    ) -> Result<Job, JobServiceError> {
        let operation = Operation::CustomerConfirmComplete;
        let customer = self.policy.authorize_customer(actor, operation)?;

        let job = self
            .store
            .transaction(|tx| {
                let mut job = load_job(tx, job_id)?;
                self.policy.ensure_owner(customer, &job, operation)?;
                let next = job.status.apply(JobTransition::CustomerConfirmComplete)?;

                let now = Utc::now();
                job.status = next;
                job.updated_at = now;
                tx.update_job(&job)?;

                let provider = assigned_user(tx, &job)?;
                emit(
                    tx,
                    provider,
                    job.id,
                    NotificationType::StatusChanged,
                    notifications::COMPLETION_CONFIRMED,
                    now,
                )?;
                Ok(job)
            })
            .inspect_err(|err| rejected(operation, actor, err))?;

        tracing::info!(job_id = %job.id, status = %job.status, "job completed");
        Ok(job)
    }

    /// Record the owner's review of a completed job and refresh the
    /// provider's aggregate rating.
    pub fn rate_provider(
        &self,
        actor: &Actor,
        job_id: JobId,
        draft: RatingDraft,
    ) -> Result<RatedProvider, JobServiceError> {
        let operation = Operation::RateProvider;
        let customer = self.policy.authorize_customer(actor, operation)?;

        let rated = self
            .store
            .transaction(|tx| {
                let job = load_job(tx, job_id)?;
                self.policy.ensure_owner(customer, &job, operation)?;
                if !job.status.accepts_rating() {
                    return Err(JobServiceError::InvalidState(format!(
                        "cannot rate a job that is {}",
                        job.status
                    )));
                }
                let provider = job.assigned_provider_id.ok_or_else(|| {
                    JobServiceError::InvalidState(format!("{job_id} has no assigned provider"))
                })?;
                if tx.rating_for(job_id, customer)?.is_some() {
                    return Err(JobServiceError::Conflict(format!(
                        "rating for {job_id} already exists"
                    )));
                }

                let value = u8::try_from(draft.rating)
                    .ok()
                    .filter(|value| (1..=5).contains(value))
                    .ok_or_else(|| {
                        JobServiceError::Validation(format!(
                            "rating must be between 1 and 5, got {}",
                            draft.rating
                        ))
                    })?;
                let comment = draft.comment.filter(|comment| !comment.trim().is_empty());
                if comment
                    .as_ref()
                    .is_some_and(|comment| comment.chars().count() > MAX_COMMENT_CHARS)
                {
                    return Err(JobServiceError::Validation(format!(
                        "comment must be at most {MAX_COMMENT_CHARS} characters"
                    )));
                }

                let rating = tx.insert_rating(NewRating {
                    job_id,
                    provider_profile_id: provider,
                    customer_profile_id: customer,
                    rating: value,
                    comment,
                    created_at: Utc::now(),
                })?;
                let provider_rating = ratings::recompute(tx, provider)?;
                Ok(RatedProvider {
                    rating,
                    provider_rating,
                })
            })
            .inspect_err(|err| rejected(operation, actor, err))?;

        tracing::info!(
            job_id = %job_id,
            provider = %rated.rating.provider_profile_id,
            rating = rated.rating.rating,
            provider_rating = rated.provider_rating,
            "provider rated"
        );
        Ok(rated)
    }

    /// Cancel an open or in-progress job, telling the assigned provider if
    /// there is one.
    pub fn cancel_job(&self, actor: &Actor, job_id: JobId) -> Result<Job, JobServiceError> {
        let operation = Operation::CancelJob;
        let customer = self.policy.authorize_customer(actor, operation)?;

        let job = self
            .store
            .transaction(|tx| {
                let mut job = load_job(tx, job_id)?;
                self.policy.ensure_owner(customer, &job, operation)?;
                let next = job.status.apply(JobTransition::Cancel)?;
                let now = Utc::now();

                if job.assigned_provider_id.is_some() {
                    let provider = assigned_user(tx, &job)?;
                    emit(
                        tx,
                        provider,
                        job.id,
                        NotificationType::StatusChanged,
                        notifications::JOB_CANCELLED,
                        now,
                    )?;
                }

                job.status = next;
                job.assigned_provider_id = None;
                job.updated_at = now;
                tx.update_job(&job)?;
                Ok(job)
            })
            .inspect_err(|err| rejected(operation, actor, err))?;

        tracing::info!(job_id = %job.id, status = %job.status, "job cancelled");
        Ok(job)
    }
}

pub(crate) fn load_job(tx: &dyn MarketTransaction, job_id: JobId) -> Result<Job, JobServiceError> {
    tx.job(job_id)?
        .ok_or_else(|| JobServiceError::NotFound(job_id.to_string()))
}

fn owner_user(tx: &dyn MarketTransaction, job: &Job) -> Result<UserId, JobServiceError> {
    tx.customer_profile(job.customer_profile_id)?
        .map(|profile| profile.user_id)
        .ok_or_else(|| {
            JobServiceError::NotFound(format!("customer profile {}", job.customer_profile_id.0))
        })
}

fn assigned_user(
    tx: &dyn MarketTransaction,
    job: &Job,
) -> Result<UserId, JobServiceError> {
    let provider = job.assigned_provider_id.ok_or_else(|| {
        JobServiceError::InvalidState(format!("{} has no assigned provider", job.id))
    })?;
    tx.provider_profile(provider)?
        .map(|profile| profile.user_id)
        .ok_or_else(|| JobServiceError::NotFound(provider.to_string()))
}

fn required_text(field: &str, value: &str) -> Result<String, JobServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(JobServiceError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn rejected(operation: Operation, actor: &Actor, err: &JobServiceError) {
    tracing::debug!(
        operation = operation.label(),
        user = %actor.user_id,
        kind = err.kind().label(),
        error = %err,
        "operation rejected"
    );
}

/// Stable classification of service failures; clients branch on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Forbidden,
    NotFound,
    InvalidState,
    ValidationFailed,
    Conflict,
    Storage,
}

impl ErrorKind {
    pub const fn label(self) -> &'static str {
        match self {
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::ValidationFailed => "validation_failed",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Storage => "storage",
        }
    }
}

/// Error raised by the marketplace service.
#[derive(Debug, thiserror::Error)]
pub enum JobServiceError {
    #[error(transparent)]
    Denied(#[from] CapabilityDenied),
    #[error(transparent)]
    Transition(#[from] IllegalTransition),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Store(StoreError),
}

impl JobServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JobServiceError::Denied(denied) if denied.is_not_found() => ErrorKind::NotFound,
            JobServiceError::Denied(_) | JobServiceError::Forbidden(_) => ErrorKind::Forbidden,
            JobServiceError::Transition(_) | JobServiceError::InvalidState(_) => {
                ErrorKind::InvalidState
            }
            JobServiceError::NotFound(_) => ErrorKind::NotFound,
            JobServiceError::Validation(_) => ErrorKind::ValidationFailed,
            JobServiceError::Conflict(_) => ErrorKind::Conflict,
            JobServiceError::Store(_) => ErrorKind::Storage,
        }
    }
}

impl From<StoreError> for JobServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            conflict @ StoreError::Conflict(_) => JobServiceError::Conflict(conflict.to_string()),
            StoreError::NotFound(subject) => JobServiceError::NotFound(subject),
            other => JobServiceError::Store(other),
        }
    }
}
