//! Provider rating aggregate.

use super::domain::{ProviderProfileId, Rating};
use super::store::{MarketTransaction, StoreError};

/// Arithmetic mean of the given ratings; 0.0 when there are none.
pub fn mean(ratings: &[Rating]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: u32 = ratings.iter().map(|rating| u32::from(rating.rating)).sum();
    f64::from(sum) / ratings.len() as f64
}

/// Reads every rating for the provider and writes the mean back to the
/// profile. Must run in the same transaction as the rating insert so the
/// aggregate never lags its source rows.
pub fn recompute(
    tx: &mut dyn MarketTransaction,
    provider: ProviderProfileId,
) -> Result<f64, StoreError> {
    let ratings = tx.ratings_for_provider(provider)?;
    let average = mean(&ratings);
    tx.set_provider_rating(provider, average)?;
    Ok(average)
}
