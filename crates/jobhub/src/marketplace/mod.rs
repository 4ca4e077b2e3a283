//! Job marketplace: lifecycle engine and the collaborators it drives.
//!
//! Every write goes through [`MarketplaceService`], which authorizes the
//! actor with the [`CapabilityPolicy`], asks the [`lifecycle`] state machine
//! for the next status and commits the job change together with its
//! notifications and rating recomputation in one store transaction.

pub mod capability;
pub mod domain;
pub mod lifecycle;
pub mod matching;
pub mod notifications;
pub mod profiles;
pub mod queries;
pub mod ratings;
pub mod router;
pub mod seed;
pub mod service;
pub mod store;

pub use capability::{CapabilityDenied, CapabilityPolicy, Operation};
pub use domain::{
    Actor, CustomerProfile, CustomerProfileDraft, InterestedProvider, Job, JobDraft, JobId,
    JobStatus, JobType, JobTypeId, Notification, NotificationType, Page, PageRequest, Price,
    ProviderJobView, ProviderProfile, ProviderProfileDraft, ProviderProfileId,
    ProviderProfileJob, RatedProvider, Rating, RatingDraft, Role, User, UserId,
};
pub use lifecycle::{IllegalTransition, JobTransition};
pub use router::marketplace_router;
pub use seed::{SeedDocument, SeedError, SeedSummary};
pub use service::{ErrorKind, JobServiceError, MarketplaceService};
pub use store::{MarketStore, MarketTransaction, MemoryStore, SqliteStore, StoreError};

#[cfg(test)]
mod tests;
