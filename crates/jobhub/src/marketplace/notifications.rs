//! Notification sink. Lifecycle operations call [`emit`] inside their own
//! transaction; recipients read and acknowledge through the service.

use chrono::{DateTime, Utc};

use super::domain::{
    Actor, JobId, NewNotification, Notification, NotificationId, NotificationType, Page,
    PageRequest, UserId,
};
use super::service::{JobServiceError, MarketplaceService};
use super::store::{MarketStore, MarketTransaction, StoreError};

pub(crate) const NEW_JOB: &str = "A new job matching your skills has been posted.";
pub(crate) const PROVIDER_INTERESTED: &str = "A provider has expressed interest in your job.";
pub(crate) const JOB_SELECTED: &str = "You have been selected for a job!";
pub(crate) const PROVIDER_ASSIGNED: &str = "A provider has been assigned to your job.";
pub(crate) const PROVIDER_DONE: &str =
    "Provider has marked the job as done. Please confirm completion.";
pub(crate) const COMPLETION_CONFIRMED: &str = "Customer has confirmed job completion.";
pub(crate) const JOB_CANCELLED: &str = "Job has been cancelled by the customer.";

pub fn emit(
    tx: &mut dyn MarketTransaction,
    recipient: UserId,
    job_id: JobId,
    kind: NotificationType,
    message: &str,
    at: DateTime<Utc>,
) -> Result<Notification, StoreError> {
    tx.insert_notification(NewNotification {
        job_id,
        user_id: recipient,
        kind,
        message: message.to_string(),
        created_at: at,
    })
}

impl<S> MarketplaceService<S>
where
    S: MarketStore,
{
    /// The actor's notifications, newest first.
    pub fn list_notifications(
        &self,
        actor: &Actor,
        page: PageRequest,
    ) -> Result<Page<Notification>, JobServiceError> {
        let per_page = self.per_page(&page);
        let notifications = self
            .store()
            .transaction(|tx| tx.notifications_for(actor.user_id).map_err(JobServiceError::from))?;
        Ok(Page::from_ordered(notifications, page.page, per_page))
    }

    pub fn mark_notification_read(
        &self,
        actor: &Actor,
        notification_id: NotificationId,
    ) -> Result<Notification, JobServiceError> {
        self.store().transaction(|tx| {
            let mut notification = tx.notification(notification_id)?.ok_or_else(|| {
                JobServiceError::NotFound(format!("notification {}", notification_id.0))
            })?;
            if notification.user_id != actor.user_id {
                return Err(JobServiceError::Forbidden(
                    "notification belongs to another user".to_string(),
                ));
            }
            tx.mark_notification_read(notification_id)?;
            notification.is_read = true;
            Ok(notification)
        })
    }
}
