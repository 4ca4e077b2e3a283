//! Read-only listings for customers and providers.

use super::capability::Operation;
use super::domain::{
    Actor, Job, JobId, JobStatus, Page, PageRequest, ProviderJobView, ProviderProfileJob,
};
use super::service::{JobServiceError, MarketplaceService};
use super::store::{MarketStore, MarketTransaction};

impl<S> MarketplaceService<S>
where
    S: MarketStore,
{
    /// Jobs posted by the calling customer, newest first.
    pub fn list_customer_jobs(
        &self,
        actor: &Actor,
        page: PageRequest,
    ) -> Result<Page<Job>, JobServiceError> {
        let customer = self
            .policy()
            .authorize_customer(actor, Operation::ListCustomerJobs)?;
        let per_page = self.per_page(&page);
        let jobs = self
            .store()
            .transaction(|tx| tx.jobs_for_customer(customer).map_err(JobServiceError::from))?;
        Ok(Page::from_ordered(jobs, page.page, per_page))
    }

    /// A single job, visible to its owner only. Someone else's job is
    /// reported as missing rather than forbidden.
    pub fn show_job(&self, actor: &Actor, job_id: JobId) -> Result<Job, JobServiceError> {
        let customer = self
            .policy()
            .authorize_customer(actor, Operation::ShowJob)?;
        self.store().transaction(|tx| {
            tx.job(job_id)?
                .filter(|job| job.customer_profile_id == customer)
                .ok_or_else(|| JobServiceError::NotFound(job_id.to_string()))
        })
    }

    /// Matched jobs that are still open for the calling provider.
    pub fn list_requested_jobs(
        &self,
        actor: &Actor,
        page: PageRequest,
    ) -> Result<Page<ProviderJobView>, JobServiceError> {
        let provider = self
            .policy()
            .authorize_provider(actor, Operation::ListRequestedJobs)?;
        let per_page = self.per_page(&page);
        let views = self.store().transaction(|tx| {
            provider_views(tx, tx.provider_jobs_for_provider(provider)?, |view| {
                view.job.status == JobStatus::Open
            })
        })?;
        Ok(Page::from_ordered(views, page.page, per_page))
    }

    /// Jobs the calling provider has been selected for, in any status.
    pub fn list_selected_jobs(
        &self,
        actor: &Actor,
        page: PageRequest,
    ) -> Result<Page<ProviderJobView>, JobServiceError> {
        let provider = self
            .policy()
            .authorize_provider(actor, Operation::ListSelectedJobs)?;
        let per_page = self.per_page(&page);
        let views = self.store().transaction(|tx| {
            provider_views(tx, tx.provider_jobs_for_provider(provider)?, |view| {
                view.is_selected
            })
        })?;
        Ok(Page::from_ordered(views, page.page, per_page))
    }
}

fn provider_views(
    tx: &dyn MarketTransaction,
    rows: Vec<ProviderProfileJob>,
    keep: impl Fn(&ProviderJobView) -> bool,
) -> Result<Vec<ProviderJobView>, JobServiceError> {
    let mut views = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(job) = tx.job(row.job_id)? else {
            continue;
        };
        let view = ProviderJobView {
            job,
            is_interested: row.is_interested,
            is_selected: row.is_selected,
        };
        if keep(&view) {
            views.push(view);
        }
    }
    views.sort_by(|a, b| {
        b.job
            .created_at
            .cmp(&a.job.created_at)
            .then(b.job.id.cmp(&a.job.id))
    });
    Ok(views)
}
