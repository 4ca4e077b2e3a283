//! Reference data loader: job types, accounts and their profiles.
//!
//! Applying a document is idempotent. Existing job types (by name), users
//! (by id) and profiles are left as they are, so the same file can be loaded
//! on every start against a persistent store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::domain::{JobTypeId, Price, Role, User, UserId};
use super::store::{MarketStore, MarketTransaction, StoreError};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedDocument {
    #[serde(default)]
    pub job_types: Vec<SeedJobType>,
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedJobType {
    pub name: String,
    pub baseline_price: Price,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub role: Role,
    #[serde(default)]
    pub customer_profile: Option<SeedCustomerProfile>,
    #[serde(default)]
    pub provider_profile: Option<SeedProviderProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedCustomerProfile {
    pub address: String,
    #[serde(default)]
    pub additional_info: Option<String>,
}

/// Provider profile with job types referenced by name.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedProviderProfile {
    #[serde(default)]
    pub bio: Option<String>,
    pub address: String,
    #[serde(default)]
    pub job_types: Vec<String>,
}

/// Rows created by one [`apply`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub job_types: usize,
    pub users: usize,
    pub customer_profiles: usize,
    pub provider_profiles: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("failed to read seed file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed seed document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("user {email} references unknown job type '{job_type}'")]
    UnknownJobType { email: String, job_type: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn load(path: &Path) -> Result<SeedDocument, SeedError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&raw)
}

pub fn parse(raw: &str) -> Result<SeedDocument, SeedError> {
    Ok(serde_json::from_str(raw)?)
}

pub fn apply<S: MarketStore>(store: &S, document: &SeedDocument) -> Result<SeedSummary, SeedError> {
    let summary = store.transaction(|tx| apply_in(tx, document))?;
    tracing::info!(
        job_types = summary.job_types,
        users = summary.users,
        customer_profiles = summary.customer_profiles,
        provider_profiles = summary.provider_profiles,
        "reference data seeded"
    );
    Ok(summary)
}

fn apply_in(
    tx: &mut dyn MarketTransaction,
    document: &SeedDocument,
) -> Result<SeedSummary, SeedError> {
    let mut summary = SeedSummary::default();

    let mut job_types: BTreeMap<String, JobTypeId> = tx
        .job_types()?
        .into_iter()
        .map(|job_type| (job_type.name, job_type.id))
        .collect();
    for seed in &document.job_types {
        if job_types.contains_key(&seed.name) {
            continue;
        }
        let created = tx.insert_job_type(&seed.name, seed.baseline_price)?;
        job_types.insert(created.name, created.id);
        summary.job_types += 1;
    }

    for seed in &document.users {
        if tx.user(seed.id)?.is_none() {
            tx.insert_user(User {
                id: seed.id,
                first_name: seed.first_name.clone(),
                last_name: seed.last_name.clone(),
                email: seed.email.clone(),
                phone_number: seed.phone_number.clone(),
                role: seed.role,
            })?;
            summary.users += 1;
        }

        if let Some(profile) = &seed.customer_profile {
            if tx.customer_profile_for_user(seed.id)?.is_none() {
                tx.insert_customer_profile(
                    seed.id,
                    profile.address.clone(),
                    profile.additional_info.clone(),
                )?;
                summary.customer_profiles += 1;
            }
        }

        if let Some(profile) = &seed.provider_profile {
            if tx.provider_profile_for_user(seed.id)?.is_some() {
                continue;
            }
            let declared = profile
                .job_types
                .iter()
                .map(|name| {
                    job_types
                        .get(name)
                        .copied()
                        .ok_or_else(|| SeedError::UnknownJobType {
                            email: seed.email.clone(),
                            job_type: name.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let created =
                tx.insert_provider_profile(seed.id, profile.bio.clone(), profile.address.clone())?;
            tx.set_provider_job_types(created.id, &declared)?;
            summary.provider_profiles += 1;
        }
    }

    Ok(summary)
}
