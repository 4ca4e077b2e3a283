//! Capability checks run before any lifecycle logic.
//!
//! Every [`Operation`] maps to one [`CapabilityRule`]. The service asks the
//! policy for a [`Principal`] up front and only deals with ownership once the
//! job has been loaded.

use serde::Serialize;

use super::domain::{Actor, CustomerProfileId, Job, ProviderProfileId, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateJob,
    ExpressInterest,
    ListInterestedProviders,
    SelectProvider,
    ProviderMarkDone,
    CustomerConfirmComplete,
    RateProvider,
    CancelJob,
    ListCustomerJobs,
    ShowJob,
    ListRequestedJobs,
    ListSelectedJobs,
}

impl Operation {
    pub const fn label(self) -> &'static str {
        match self {
            Operation::CreateJob => "create_job",
            Operation::ExpressInterest => "express_interest",
            Operation::ListInterestedProviders => "list_interested_providers",
            Operation::SelectProvider => "select_provider",
            Operation::ProviderMarkDone => "provider_mark_done",
            Operation::CustomerConfirmComplete => "customer_confirm_complete",
            Operation::RateProvider => "rate_provider",
            Operation::CancelJob => "cancel_job",
            Operation::ListCustomerJobs => "list_customer_jobs",
            Operation::ShowJob => "show_job",
            Operation::ListRequestedJobs => "list_requested_jobs",
            Operation::ListSelectedJobs => "list_selected_jobs",
        }
    }
}

/// What to report when the actor holds the right role but has no profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingProfile {
    Forbidden,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityRule {
    pub role: Role,
    pub missing_profile: MissingProfile,
}

impl CapabilityRule {
    const fn new(role: Role, missing_profile: MissingProfile) -> Self {
        Self {
            role,
            missing_profile,
        }
    }
}

/// Profile the caller acts through once authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    Customer(CustomerProfileId),
    Provider(ProviderProfileId),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityDenied {
    #[error("{operation} requires the {required} role")]
    WrongRole {
        operation: &'static str,
        required: &'static str,
    },
    #[error("{operation} requires a {required} profile")]
    MissingProfile {
        operation: &'static str,
        required: &'static str,
        reported_as: MissingProfile,
    },
    #[error("only the customer who posted this job may {operation}")]
    NotJobOwner { operation: &'static str },
    #[error("only the assigned provider may {operation}")]
    NotAssignedProvider { operation: &'static str },
}

impl CapabilityDenied {
    /// Whether the denial should surface as "not found" rather than
    /// "forbidden".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CapabilityDenied::MissingProfile {
                reported_as: MissingProfile::NotFound,
                ..
            }
        )
    }
}

/// Role table shared by every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapabilityPolicy;

impl CapabilityPolicy {
    pub const fn rule(operation: Operation) -> CapabilityRule {
        use MissingProfile::{Forbidden, NotFound};
        match operation {
            Operation::CreateJob => CapabilityRule::new(Role::Customer, Forbidden),
            Operation::ExpressInterest => CapabilityRule::new(Role::Provider, NotFound),
            Operation::ListInterestedProviders => CapabilityRule::new(Role::Customer, NotFound),
            Operation::SelectProvider => CapabilityRule::new(Role::Customer, NotFound),
            Operation::ProviderMarkDone => CapabilityRule::new(Role::Provider, Forbidden),
            Operation::CustomerConfirmComplete => CapabilityRule::new(Role::Customer, Forbidden),
            Operation::RateProvider => CapabilityRule::new(Role::Customer, Forbidden),
            Operation::CancelJob => CapabilityRule::new(Role::Customer, NotFound),
            Operation::ListCustomerJobs => CapabilityRule::new(Role::Customer, NotFound),
            Operation::ShowJob => CapabilityRule::new(Role::Customer, NotFound),
            Operation::ListRequestedJobs => CapabilityRule::new(Role::Provider, NotFound),
            Operation::ListSelectedJobs => CapabilityRule::new(Role::Provider, NotFound),
        }
    }

    pub fn authorize(
        &self,
        actor: &Actor,
        operation: Operation,
    ) -> Result<Principal, CapabilityDenied> {
        let rule = Self::rule(operation);
        if actor.role != rule.role {
            return Err(CapabilityDenied::WrongRole {
                operation: operation.label(),
                required: rule.role.label(),
            });
        }

        let principal = match rule.role {
            Role::Customer => actor.customer_profile.map(Principal::Customer),
            Role::Provider => actor.provider_profile.map(Principal::Provider),
            Role::Admin => None,
        };

        principal.ok_or(CapabilityDenied::MissingProfile {
            operation: operation.label(),
            required: rule.role.label(),
            reported_as: rule.missing_profile,
        })
    }

    /// Shorthand for operations whose rule requires a customer profile.
    pub fn authorize_customer(
        &self,
        actor: &Actor,
        operation: Operation,
    ) -> Result<CustomerProfileId, CapabilityDenied> {
        match self.authorize(actor, operation)? {
            Principal::Customer(id) => Ok(id),
            Principal::Provider(_) => Err(CapabilityDenied::WrongRole {
                operation: operation.label(),
                required: Role::Customer.label(),
            }),
        }
    }

    pub fn authorize_provider(
        &self,
        actor: &Actor,
        operation: Operation,
    ) -> Result<ProviderProfileId, CapabilityDenied> {
        match self.authorize(actor, operation)? {
            Principal::Provider(id) => Ok(id),
            Principal::Customer(_) => Err(CapabilityDenied::WrongRole {
                operation: operation.label(),
                required: Role::Provider.label(),
            }),
        }
    }

    pub fn ensure_owner(
        &self,
        customer: CustomerProfileId,
        job: &Job,
        operation: Operation,
    ) -> Result<(), CapabilityDenied> {
        if job.customer_profile_id == customer {
            Ok(())
        } else {
            Err(CapabilityDenied::NotJobOwner {
                operation: operation.label(),
            })
        }
    }

    pub fn ensure_assigned(
        &self,
        provider: ProviderProfileId,
        job: &Job,
        operation: Operation,
    ) -> Result<(), CapabilityDenied> {
        if job.assigned_provider_id == Some(provider) {
            Ok(())
        } else {
            Err(CapabilityDenied::NotAssignedProvider {
                operation: operation.label(),
            })
        }
    }
}
