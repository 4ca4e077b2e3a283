//! Job marketplace backend.
//!
//! Customers post jobs, matched providers express interest, the customer
//! selects one, and the job moves through `open -> in_progress ->
//! provider_done -> completed` (or `cancelled`). The [`marketplace`] module
//! owns that lifecycle; the remaining modules carry the service plumbing.

pub mod config;
pub mod error;
pub mod marketplace;
pub mod telemetry;
