//! Profile directory: resolves the calling actor and manages the customer
//! and provider profiles the lifecycle engine authorizes against.

use super::domain::{
    Actor, CustomerProfile, CustomerProfileDraft, JobType, JobTypeId, ProviderProfile,
    ProviderProfileDraft, Role, User, UserId,
};
use super::service::{JobServiceError, MarketplaceService};
use super::store::{MarketStore, MarketTransaction};

impl<S> MarketplaceService<S>
where
    S: MarketStore,
{
    /// Resolve the user's role and owned profiles once per request.
    pub fn current_actor(&self, user_id: UserId) -> Result<Actor, JobServiceError> {
        self.store().transaction(|tx| {
            let user = tx
                .user(user_id)?
                .ok_or_else(|| JobServiceError::NotFound(format!("user {user_id}")))?;
            Ok(Actor {
                user_id,
                role: user.role,
                customer_profile: tx.customer_profile_for_user(user_id)?.map(|p| p.id),
                provider_profile: tx.provider_profile_for_user(user_id)?.map(|p| p.id),
            })
        })
    }

    /// Import an account issued by the identity provider.
    pub fn register_user(&self, user: User) -> Result<User, JobServiceError> {
        let user = self
            .store()
            .transaction(|tx| tx.insert_user(user).map_err(JobServiceError::from))?;
        tracing::info!(user = %user.id, role = user.role.label(), "user registered");
        Ok(user)
    }

    pub fn job_types(&self) -> Result<Vec<JobType>, JobServiceError> {
        self.store()
            .transaction(|tx| tx.job_types().map_err(JobServiceError::from))
    }

    pub fn create_customer_profile(
        &self,
        actor: &Actor,
        draft: CustomerProfileDraft,
    ) -> Result<CustomerProfile, JobServiceError> {
        if actor.role != Role::Customer {
            return Err(JobServiceError::Forbidden(
                "only customers can create customer profiles".to_string(),
            ));
        }
        let address = required_address(&draft.address)?;

        let profile = self.store().transaction(|tx| {
            if tx.customer_profile_for_user(actor.user_id)?.is_some() {
                return Err(JobServiceError::Conflict(
                    "customer profile already exists".to_string(),
                ));
            }
            tx.insert_customer_profile(actor.user_id, address, draft.additional_info)
                .map_err(JobServiceError::from)
        })?;

        tracing::info!(
            user = %actor.user_id,
            customer_profile = profile.id.0,
            "customer profile created"
        );
        Ok(profile)
    }

    pub fn customer_profile(&self, actor: &Actor) -> Result<CustomerProfile, JobServiceError> {
        self.store().transaction(|tx| {
            tx.customer_profile_for_user(actor.user_id)?
                .ok_or_else(|| JobServiceError::NotFound("customer profile".to_string()))
        })
    }

    pub fn create_provider_profile(
        &self,
        actor: &Actor,
        draft: ProviderProfileDraft,
    ) -> Result<ProviderProfile, JobServiceError> {
        if actor.role != Role::Provider {
            return Err(JobServiceError::Forbidden(
                "only providers can create provider profiles".to_string(),
            ));
        }
        let address = required_address(&draft.address)?;

        let profile = self.store().transaction(|tx| {
            if tx.provider_profile_for_user(actor.user_id)?.is_some() {
                return Err(JobServiceError::Conflict(
                    "provider profile already exists".to_string(),
                ));
            }
            ensure_job_types(tx, &draft.job_type_ids)?;
            let profile = tx.insert_provider_profile(actor.user_id, draft.bio, address)?;
            tx.set_provider_job_types(profile.id, &draft.job_type_ids)?;
            reload_provider(tx, actor.user_id)
        })?;

        tracing::info!(
            user = %actor.user_id,
            provider = %profile.id,
            job_types = profile.job_types.len(),
            "provider profile created"
        );
        Ok(profile)
    }

    /// Replace the calling provider's declared job types. Only jobs posted
    /// afterwards are matched against the new set.
    pub fn update_provider_job_types(
        &self,
        actor: &Actor,
        job_type_ids: Vec<JobTypeId>,
    ) -> Result<ProviderProfile, JobServiceError> {
        self.store().transaction(|tx| {
            let profile = reload_provider(tx, actor.user_id)?;
            ensure_job_types(tx, &job_type_ids)?;
            tx.set_provider_job_types(profile.id, &job_type_ids)?;
            reload_provider(tx, actor.user_id)
        })
    }

    pub fn provider_profile(&self, actor: &Actor) -> Result<ProviderProfile, JobServiceError> {
        self.store()
            .transaction(|tx| reload_provider(tx, actor.user_id))
    }
}

fn reload_provider(
    tx: &dyn MarketTransaction,
    user_id: UserId,
) -> Result<ProviderProfile, JobServiceError> {
    tx.provider_profile_for_user(user_id)?
        .ok_or_else(|| JobServiceError::NotFound("provider profile".to_string()))
}

fn ensure_job_types(tx: &dyn MarketTransaction, ids: &[JobTypeId]) -> Result<(), JobServiceError> {
    for id in ids {
        if tx.job_type(*id)?.is_none() {
            return Err(JobServiceError::Validation(format!(
                "job type {} does not exist",
                id.0
            )));
        }
    }
    Ok(())
}

fn required_address(address: &str) -> Result<String, JobServiceError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(JobServiceError::Validation("address is required".to_string()));
    }
    Ok(trimmed.to_string())
}
