use super::common::*;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::marketplace::router::USER_HEADER;
use crate::marketplace::{marketplace_router, Actor, JobStatus, MarketStore};

fn request(method: &str, uri: &str, actor: Option<&Actor>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder.header(USER_HEADER, actor.user_id.0.to_string());
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("serializable")))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

async fn send<S: MarketStore + 'static>(
    market: &Market<S>,
    request: Request<Body>,
) -> (StatusCode, Value) {
    let response = marketplace_router(market.service.clone())
        .oneshot(request)
        .await
        .expect("router responds");
    let status = response.status();
    (status, read_json_body(response).await)
}

#[tokio::test]
async fn missing_or_unknown_user_is_unauthenticated() {
    let market = market();

    let (status, body) = send(&market, request("GET", "/api/v1/jobs", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthenticated");

    let stranger = Request::builder()
        .uri("/api/v1/jobs")
        .header(USER_HEADER, uuid::Uuid::new_v4().to_string())
        .body(Body::empty())
        .expect("request");
    let (status, _) = send(&market, stranger).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let garbled = Request::builder()
        .uri("/api/v1/jobs")
        .header(USER_HEADER, "not-a-uuid")
        .body(Body::empty())
        .expect("request");
    let (status, _) = send(&market, garbled).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn job_types_are_public() {
    let market = market();
    let (status, body) = send(&market, request("GET", "/api/v1/job-types", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn lifecycle_over_http() {
    let market = market();

    let (status, body) = send(
        &market,
        request(
            "POST",
            "/api/v1/jobs",
            Some(&market.customer),
            Some(json!({
                "job_type_id": market.plumbing.0,
                "title": "Fix kitchen sink",
                "description": "Drips all night",
                "proposed_price": 120.5
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["job"]["status"], "open");
    assert_eq!(body["job"]["proposed_price"], 120.5);
    let job_id = body["job"]["id"].as_u64().expect("job id");

    let (status, _) = send(
        &market,
        request(
            "POST",
            &format!("/api/v1/jobs/{job_id}/express-interest"),
            Some(&market.provider),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &market,
        request(
            "GET",
            &format!("/api/v1/jobs/{job_id}/interested-providers"),
            Some(&market.customer),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let (status, body) = send(
        &market,
        request(
            "POST",
            &format!("/api/v1/jobs/{job_id}/select-provider"),
            Some(&market.customer),
            Some(json!({ "provider_profile_id": provider_id(&market.provider).0 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["job"]["status"], "in_progress");

    let (status, body) = send(
        &market,
        request(
            "POST",
            &format!("/api/v1/jobs/{job_id}/provider-done"),
            Some(&market.provider),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["job"]["status"], "provider_done");

    let (status, body) = send(
        &market,
        request(
            "POST",
            &format!("/api/v1/jobs/{job_id}/complete"),
            Some(&market.customer),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["job"]["status"], "completed");

    let (status, body) = send(
        &market,
        request(
            "POST",
            &format!("/api/v1/jobs/{job_id}/rate-provider"),
            Some(&market.customer),
            Some(json!({ "rating": 4, "comment": "Solid work" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["provider_rating"], 4.0);

    let (status, body) = send(
        &market,
        request(
            "POST",
            &format!("/api/v1/jobs/{job_id}/rate-provider"),
            Some(&market.customer),
            Some(json!({ "rating": 5 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");
}

#[tokio::test]
async fn service_errors_map_to_statuses() {
    let market = market();
    let job = posted_job(&market);

    let (status, body) = send(
        &market,
        request(
            "POST",
            &format!("/api/v1/jobs/{}/provider-done", job.id.0),
            Some(&market.provider),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_state");

    let (status, body) = send(
        &market,
        request(
            "GET",
            &format!("/api/v1/jobs/{}", job.id.0),
            Some(&market.other_customer),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let (status, body) = send(
        &market,
        request(
            "POST",
            &format!("/api/v1/jobs/{}/complete", job.id.0),
            Some(&market.customer),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_state");

    let (status, body) = send(
        &market,
        request(
            "POST",
            &format!("/api/v1/jobs/{}/select-provider", job.id.0),
            Some(&market.customer),
            Some(json!({ "provider_profile_id": provider_id(&market.provider).0 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "validation_failed");

    let (status, body) = send(
        &market,
        request(
            "POST",
            &format!("/api/v1/jobs/{}/express-interest", job.id.0),
            Some(&market.customer),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "forbidden");
}

#[tokio::test]
async fn malformed_payload_is_a_validation_failure() {
    let market = market();
    let (status, body) = send(
        &market,
        request(
            "POST",
            "/api/v1/jobs",
            Some(&market.customer),
            Some(json!({ "title": "missing fields" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "validation_failed");
}

#[tokio::test]
async fn notifications_can_be_listed_and_read() {
    let market = market();
    posted_job(&market);

    let (status, body) = send(
        &market,
        request(
            "GET",
            "/api/v1/notifications?page=1&per_page=5",
            Some(&market.provider),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["per_page"], 5);
    assert_eq!(body["items"][0]["type"], "new_job");
    let id = body["items"][0]["id"].as_u64().expect("notification id");

    let (status, body) = send(
        &market,
        request(
            "POST",
            &format!("/api/v1/notifications/{id}/read"),
            Some(&market.provider),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_read"], true);
}

#[tokio::test]
async fn provider_profile_job_types_can_be_replaced() {
    let market = market();
    let (status, body) = send(
        &market,
        request(
            "PUT",
            "/api/v1/provider-profile",
            Some(&market.provider),
            Some(json!({ "job_type_ids": [market.electrical.0] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["job_types"], json!([market.electrical.0]));

    let (status, body) = send(
        &market,
        request("GET", "/api/v1/customer-profile", Some(&market.customer), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["address"], "1 Main St");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_http_selections_settle_on_one_provider() {
    let market = sqlite_market();
    let job = posted_job(&market);
    for provider in [&market.provider, &market.second_provider] {
        market
            .service
            .express_interest(provider, job.id)
            .expect("interest");
    }

    let uri = format!("/api/v1/jobs/{}/select-provider", job.id.0);
    let pick = |actor: &Actor| {
        request(
            "POST",
            &uri,
            Some(&market.customer),
            Some(json!({ "provider_profile_id": provider_id(actor).0 })),
        )
    };
    let (first, second) = tokio::join!(
        send(&market, pick(&market.provider)),
        send(&market, pick(&market.second_provider))
    );

    let mut statuses = [first.0.as_u16(), second.0.as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, [200, 400]);

    let job = market
        .service
        .show_job(&market.customer, job.id)
        .expect("visible");
    assert_eq!(job.status, JobStatus::InProgress);
}
