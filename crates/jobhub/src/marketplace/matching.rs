//! Provider matching: plain job-type equality, no ranking and no limits.

use super::domain::{Job, ProviderProfile};
use super::store::{MarketTransaction, StoreError};

/// Every provider whose declared job types include the job's type.
pub fn find_candidates(
    tx: &dyn MarketTransaction,
    job: &Job,
) -> Result<Vec<ProviderProfile>, StoreError> {
    tx.providers_with_job_type(job.job_type_id)
}
