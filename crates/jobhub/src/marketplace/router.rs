use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::domain::{
    Actor, CustomerProfileDraft, JobDraft, JobId, JobTypeId, NotificationId, PageRequest,
    ProviderProfileDraft, ProviderProfileId, RatingDraft, UserId,
};
use super::service::{ErrorKind, JobServiceError, MarketplaceService};
use super::store::{MarketStore, StoreError};

/// Header carrying the user id issued by the authentication collaborator.
pub const USER_HEADER: &str = "x-user-id";

type Shared<S> = State<Arc<MarketplaceService<S>>>;

/// Router builder exposing the marketplace under `/api/v1`.
pub fn marketplace_router<S>(service: Arc<MarketplaceService<S>>) -> Router
where
    S: MarketStore + 'static,
{
    Router::new()
        .route("/api/v1/job-types", get(job_types_handler::<S>))
        .route(
            "/api/v1/jobs",
            post(create_job_handler::<S>).get(list_jobs_handler::<S>),
        )
        .route("/api/v1/jobs/:job_id", get(show_job_handler::<S>))
        .route(
            "/api/v1/jobs/:job_id/express-interest",
            post(express_interest_handler::<S>),
        )
        .route(
            "/api/v1/jobs/:job_id/interested-providers",
            get(interested_providers_handler::<S>),
        )
        .route(
            "/api/v1/jobs/:job_id/select-provider",
            post(select_provider_handler::<S>),
        )
        .route(
            "/api/v1/jobs/:job_id/provider-done",
            post(provider_done_handler::<S>),
        )
        .route("/api/v1/jobs/:job_id/complete", post(complete_handler::<S>))
        .route(
            "/api/v1/jobs/:job_id/rate-provider",
            post(rate_provider_handler::<S>),
        )
        .route("/api/v1/jobs/:job_id/cancel", post(cancel_handler::<S>))
        .route("/api/v1/requested-jobs", get(requested_jobs_handler::<S>))
        .route("/api/v1/selected-jobs", get(selected_jobs_handler::<S>))
        .route("/api/v1/notifications", get(notifications_handler::<S>))
        .route(
            "/api/v1/notifications/:notification_id/read",
            post(mark_read_handler::<S>),
        )
        .route(
            "/api/v1/customer-profile",
            get(customer_profile_handler::<S>).post(create_customer_profile_handler::<S>),
        )
        .route(
            "/api/v1/provider-profile",
            get(provider_profile_handler::<S>)
                .post(create_provider_profile_handler::<S>)
                .put(update_provider_job_types_handler::<S>),
        )
        .with_state(service)
}

/// Failure surfaced by a marketplace handler.
#[derive(Debug)]
pub enum ApiError {
    Unauthenticated(String),
    Payload(String),
    Service(JobServiceError),
}

impl From<JobServiceError> for ApiError {
    fn from(value: JobServiceError) -> Self {
        Self::Service(value)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        Self::Payload(value.body_text())
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidState => StatusCode::BAD_REQUEST,
        ErrorKind::ValidationFailed => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::Unauthenticated(message) => {
                (StatusCode::UNAUTHORIZED, "unauthenticated", message)
            }
            ApiError::Payload(message) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::ValidationFailed.label(),
                message,
            ),
            ApiError::Service(error) => {
                let kind = error.kind();
                if kind == ErrorKind::Storage {
                    tracing::error!(error = %error, "marketplace storage failure");
                }
                (status_for(kind), kind.label(), error.to_string())
            }
        };

        let payload = json!({
            "error": message,
            "kind": kind,
        });
        (status, Json(payload)).into_response()
    }
}

fn resolve_actor<S: MarketStore>(
    service: &MarketplaceService<S>,
    headers: &HeaderMap,
) -> Result<Actor, ApiError> {
    let raw = headers
        .get(USER_HEADER)
        .ok_or_else(|| ApiError::Unauthenticated(format!("missing {USER_HEADER} header")))?;
    let user_id = raw
        .to_str()
        .ok()
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .map(UserId)
        .ok_or_else(|| ApiError::Unauthenticated(format!("malformed {USER_HEADER} header")))?;

    service.current_actor(user_id).map_err(|err| match err.kind() {
        ErrorKind::NotFound => ApiError::Unauthenticated(format!("unknown user {user_id}")),
        _ => ApiError::Service(err),
    })
}

#[derive(Debug, Deserialize)]
pub struct SelectProviderRequest {
    pub provider_profile_id: ProviderProfileId,
}

#[derive(Debug, Deserialize)]
pub struct JobTypesRequest {
    pub job_type_ids: Vec<JobTypeId>,
}

/// Runs one unit of marketplace work on the blocking pool. Store calls hold a
/// mutex and may sit in the SQLite busy timeout, so they stay off the async
/// workers.
async fn run_blocking<S, F>(
    service: Arc<MarketplaceService<S>>,
    work: F,
) -> Result<Response, ApiError>
where
    S: MarketStore + 'static,
    F: FnOnce(&MarketplaceService<S>) -> Result<Response, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || work(&service))
        .await
        .map_err(|err| {
            ApiError::Service(JobServiceError::Store(StoreError::Unavailable(format!(
                "marketplace worker failed: {err}"
            ))))
        })?
}

pub(crate) async fn job_types_handler<S: MarketStore + 'static>(
    State(service): Shared<S>,
) -> Result<Response, ApiError> {
    run_blocking(service, |service| Ok(Json(service.job_types()?).into_response())).await
}

pub(crate) async fn create_job_handler<S: MarketStore + 'static>(
    State(service): Shared<S>,
    headers: HeaderMap,
    payload: Result<Json<JobDraft>, JsonRejection>,
) -> Result<Response, ApiError> {
    run_blocking(service, move |service| {
        let actor = resolve_actor(service, &headers)?;
        let Json(draft) = payload?;
        let job = service.create_job(&actor, draft)?;
        let body = json!({
            "message": "Job posted successfully.",
            "job": job,
        });
        Ok((StatusCode::CREATED, Json(body)).into_response())
    })
    .await
}

pub(crate) async fn list_jobs_handler<S: MarketStore + 'static>(
    State(service): Shared<S>,
    headers: HeaderMap,
    Query(page): Query<PageRequest>,
) -> Result<Response, ApiError> {
    run_blocking(service, move |service| {
        let actor = resolve_actor(service, &headers)?;
        Ok(Json(service.list_customer_jobs(&actor, page)?).into_response())
    })
    .await
}

pub(crate) async fn show_job_handler<S: MarketStore + 'static>(
    State(service): Shared<S>,
    headers: HeaderMap,
    Path(job_id): Path<u64>,
) -> Result<Response, ApiError> {
    run_blocking(service, move |service| {
        let actor = resolve_actor(service, &headers)?;
        Ok(Json(service.show_job(&actor, JobId(job_id))?).into_response())
    })
    .await
}

pub(crate) async fn express_interest_handler<S: MarketStore + 'static>(
    State(service): Shared<S>,
    headers: HeaderMap,
    Path(job_id): Path<u64>,
) -> Result<Response, ApiError> {
    run_blocking(service, move |service| {
        let actor = resolve_actor(service, &headers)?;
        let row = service.express_interest(&actor, JobId(job_id))?;
        let body = json!({
            "message": "Interest expressed successfully.",
            "job_id": row.job_id,
            "is_interested": row.is_interested,
        });
        Ok(Json(body).into_response())
    })
    .await
}

pub(crate) async fn interested_providers_handler<S: MarketStore + 'static>(
    State(service): Shared<S>,
    headers: HeaderMap,
    Path(job_id): Path<u64>,
) -> Result<Response, ApiError> {
    run_blocking(service, move |service| {
        let actor = resolve_actor(service, &headers)?;
        Ok(Json(service.list_interested_providers(&actor, JobId(job_id))?).into_response())
    })
    .await
}

pub(crate) async fn select_provider_handler<S: MarketStore + 'static>(
    State(service): Shared<S>,
    headers: HeaderMap,
    Path(job_id): Path<u64>,
    payload: Result<Json<SelectProviderRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    run_blocking(service, move |service| {
        let actor = resolve_actor(service, &headers)?;
        let Json(request) = payload?;
        let job = service.select_provider(&actor, JobId(job_id), request.provider_profile_id)?;
        let body = json!({
            "message": "Provider selected successfully.",
            "job": job,
        });
        Ok(Json(body).into_response())
    })
    .await
}

pub(crate) async fn provider_done_handler<S: MarketStore + 'static>(
    State(service): Shared<S>,
    headers: HeaderMap,
    Path(job_id): Path<u64>,
) -> Result<Response, ApiError> {
    run_blocking(service, move |service| {
        let actor = resolve_actor(service, &headers)?;
        let job = service.provider_mark_done(&actor, JobId(job_id))?;
        let body = json!({
            "message": "Job marked as done. Awaiting customer confirmation.",
            "job": job,
        });
        Ok(Json(body).into_response())
    })
    .await
}

pub(crate) async fn complete_handler<S: MarketStore + 'static>(
    State(service): Shared<S>,
    headers: HeaderMap,
    Path(job_id): Path<u64>,
) -> Result<Response, ApiError> {
    run_blocking(service, move |service| {
        let actor = resolve_actor(service, &headers)?;
        let job = service.customer_confirm_complete(&actor, JobId(job_id))?;
        let body = json!({
            "message": "Job marked as completed.",
            "job": job,
        });
        Ok(Json(body).into_response())
    })
    .await
}

pub(crate) async fn rate_provider_handler<S: MarketStore + 'static>(
    State(service): Shared<S>,
    headers: HeaderMap,
    Path(job_id): Path<u64>,
    payload: Result<Json<RatingDraft>, JsonRejection>,
) -> Result<Response, ApiError> {
    run_blocking(service, move |service| {
        let actor = resolve_actor(service, &headers)?;
        let Json(draft) = payload?;
        let rated = service.rate_provider(&actor, JobId(job_id), draft)?;
        let body = json!({
            "message": "Rating submitted successfully.",
            "rating": rated.rating,
            "provider_rating": rated.provider_rating,
        });
        Ok((StatusCode::CREATED, Json(body)).into_response())
    })
    .await
}

pub(crate) async fn cancel_handler<S: MarketStore + 'static>(
    State(service): Shared<S>,
    headers: HeaderMap,
    Path(job_id): Path<u64>,
) -> Result<Response, ApiError> {
    run_blocking(service, move |service| {
        let actor = resolve_actor(service, &headers)?;
        let job = service.cancel_job(&actor, JobId(job_id))?;
        let body = json!({
            "message": "Job cancelled successfully.",
            "job": job,
        });
        Ok(Json(body).into_response())
    })
    .await
}

pub(crate) async fn requested_jobs_handler<S: MarketStore + 'static>(
    State(service): Shared<S>,
    headers: HeaderMap,
    Query(page): Query<PageRequest>,
) -> Result<Response, ApiError> {
    run_blocking(service, move |service| {
        let actor = resolve_actor(service, &headers)?;
        Ok(Json(service.list_requested_jobs(&actor, page)?).into_response())
    })
    .await
}

pub(crate) async fn selected_jobs_handler<S: MarketStore + 'static>(
    State(service): Shared<S>,
    headers: HeaderMap,
    Query(page): Query<PageRequest>,
) -> Result<Response, ApiError> {
    run_blocking(service, move |service| {
        let actor = resolve_actor(service, &headers)?;
        Ok(Json(service.list_selected_jobs(&actor, page)?).into_response())
    })
    .await
}

pub(crate) async fn notifications_handler<S: MarketStore + 'static>(
    State(service): Shared<S>,
    headers: HeaderMap,
    Query(page): Query<PageRequest>,
) -> Result<Response, ApiError> {
    run_blocking(service, move |service| {
        let actor = resolve_actor(service, &headers)?;
        Ok(Json(service.list_notifications(&actor, page)?).into_response())
    })
    .await
}

pub(crate) async fn mark_read_handler<S: MarketStore + 'static>(
    State(service): Shared<S>,
    headers: HeaderMap,
    Path(notification_id): Path<u64>,
) -> Result<Response, ApiError> {
    run_blocking(service, move |service| {
        let actor = resolve_actor(service, &headers)?;
        let notification =
            service.mark_notification_read(&actor, NotificationId(notification_id))?;
        Ok(Json(notification).into_response())
    })
    .await
}

pub(crate) async fn customer_profile_handler<S: MarketStore + 'static>(
    State(service): Shared<S>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    run_blocking(service, move |service| {
        let actor = resolve_actor(service, &headers)?;
        Ok(Json(service.customer_profile(&actor)?).into_response())
    })
    .await
}

pub(crate) async fn create_customer_profile_handler<S: MarketStore + 'static>(
    State(service): Shared<S>,
    headers: HeaderMap,
    payload: Result<Json<CustomerProfileDraft>, JsonRejection>,
) -> Result<Response, ApiError> {
    run_blocking(service, move |service| {
        let actor = resolve_actor(service, &headers)?;
        let Json(draft) = payload?;
        let profile = service.create_customer_profile(&actor, draft)?;
        Ok((StatusCode::CREATED, Json(profile)).into_response())
    })
    .await
}

pub(crate) async fn provider_profile_handler<S: MarketStore + 'static>(
    State(service): Shared<S>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    run_blocking(service, move |service| {
        let actor = resolve_actor(service, &headers)?;
        Ok(Json(service.provider_profile(&actor)?).into_response())
    })
    .await
}

pub(crate) async fn create_provider_profile_handler<S: MarketStore + 'static>(
    State(service): Shared<S>,
    headers: HeaderMap,
    payload: Result<Json<ProviderProfileDraft>, JsonRejection>,
) -> Result<Response, ApiError> {
    run_blocking(service, move |service| {
        let actor = resolve_actor(service, &headers)?;
        let Json(draft) = payload?;
        let profile = service.create_provider_profile(&actor, draft)?;
        Ok((StatusCode::CREATED, Json(profile)).into_response())
    })
    .await
}

pub(crate) async fn update_provider_job_types_handler<S: MarketStore + 'static>(
    State(service): Shared<S>,
    headers: HeaderMap,
    payload: Result<Json<JobTypesRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    run_blocking(service, move |service| {
        let actor = resolve_actor(service, &headers)?;
        let Json(request) = payload?;
        let profile = service.update_provider_job_types(&actor, request.job_type_ids)?;
        Ok(Json(profile).into_response())
    })
    .await
}
