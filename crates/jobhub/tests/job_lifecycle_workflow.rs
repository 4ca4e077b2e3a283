//! End-to-end job lifecycle scenarios driven through the public service
//! facade, on both store backends, with accounts loaded from a seed document.

mod common {
    use std::sync::Arc;

    use jobhub::config::MarketplaceConfig;
    use jobhub::marketplace::seed;
    use jobhub::marketplace::{
        Actor, JobDraft, JobTypeId, MarketStore, MarketplaceService, UserId,
    };
    use uuid::Uuid;

    pub(super) const CUSTOMER: &str = "6f1d2c43-8f0e-4d55-9c1a-0d9b8d3c1a11";
    pub(super) const PROVIDER: &str = "a3c8f0de-5b7a-4f0e-8d44-2b1d7e9f6c22";

    const DOCUMENT: &str = r#"{
        "job_types": [
            { "name": "Plumbing", "baseline_price": 80.0 },
            { "name": "Electrical", "baseline_price": 95.5 }
        ],
        "users": [
            {
                "id": "6f1d2c43-8f0e-4d55-9c1a-0d9b8d3c1a11",
                "first_name": "Casey",
                "last_name": "Jordan",
                "email": "casey@example.com",
                "phone_number": "555-0100",
                "role": "customer",
                "customer_profile": { "address": "1 Main St" }
            },
            {
                "id": "a3c8f0de-5b7a-4f0e-8d44-2b1d7e9f6c22",
                "first_name": "Pat",
                "last_name": "Rivera",
                "email": "pat@example.com",
                "phone_number": "555-0101",
                "role": "provider",
                "provider_profile": {
                    "bio": "Licensed plumber",
                    "address": "2 Side St",
                    "job_types": ["Plumbing"]
                }
            }
        ]
    }"#;

    pub(super) fn seeded<S: MarketStore>(store: S) -> Arc<MarketplaceService<S>> {
        let document = seed::parse(DOCUMENT).expect("valid seed");
        seed::apply(&store, &document).expect("seed applies");
        Arc::new(MarketplaceService::new(
            Arc::new(store),
            MarketplaceConfig::default(),
        ))
    }

    pub(super) fn actor<S: MarketStore>(service: &MarketplaceService<S>, id: &str) -> Actor {
        let user_id = UserId(Uuid::parse_str(id).expect("uuid"));
        service.current_actor(user_id).expect("seeded user")
    }

    pub(super) fn plumbing<S: MarketStore>(service: &MarketplaceService<S>) -> JobTypeId {
        service
            .job_types()
            .expect("job types")
            .into_iter()
            .find(|job_type| job_type.name == "Plumbing")
            .map(|job_type| job_type.id)
            .expect("plumbing seeded")
    }

    pub(super) fn draft(job_type_id: JobTypeId, title: &str) -> JobDraft {
        JobDraft {
            job_type_id,
            title: title.to_string(),
            description: "Water under the sink".to_string(),
            proposed_price: 150.0,
        }
    }
}

use common::*;
use jobhub::marketplace::{
    ErrorKind, JobStatus, MarketStore, MarketplaceService, MemoryStore, PageRequest, RatingDraft,
    SqliteStore,
};

fn complete_two_jobs_and_rate<S: MarketStore>(service: &MarketplaceService<S>) {
    let customer = actor(service, CUSTOMER);
    let provider = actor(service, PROVIDER);
    let provider_profile = provider.provider_profile.expect("provider profile");
    let plumbing = plumbing(service);

    let mut finished = Vec::new();
    for (title, score) in [("Leaky tap", 5), ("Blocked drain", 3)] {
        let job = service
            .create_job(&customer, draft(plumbing, title))
            .expect("job posted");
        assert_eq!(job.status, JobStatus::Open);

        let requested = service
            .list_requested_jobs(&provider, PageRequest::default())
            .expect("requested jobs");
        assert!(requested.items.iter().any(|view| view.job.id == job.id));

        service
            .express_interest(&provider, job.id)
            .expect("interest");
        service
            .select_provider(&customer, job.id, provider_profile)
            .expect("selected");

        let early = service
            .rate_provider(
                &customer,
                job.id,
                RatingDraft {
                    rating: score,
                    comment: None,
                },
            )
            .expect_err("cannot rate before completion");
        assert_eq!(early.kind(), ErrorKind::InvalidState);

        service
            .provider_mark_done(&provider, job.id)
            .expect("marked done");
        let completed = service
            .customer_confirm_complete(&customer, job.id)
            .expect("completed");
        assert_eq!(completed.status, JobStatus::Completed);
        finished.push((completed.id, score));
    }

    let mut last = 0.0;
    for (job_id, score) in finished {
        last = service
            .rate_provider(
                &customer,
                job_id,
                RatingDraft {
                    rating: score,
                    comment: Some("Thanks".to_string()),
                },
            )
            .expect("rated")
            .provider_rating;
    }
    assert_eq!(last, 4.0);

    let selected = service
        .list_selected_jobs(&provider, PageRequest::default())
        .expect("selected jobs");
    assert_eq!(selected.total, 2);
    assert!(selected
        .items
        .iter()
        .all(|view| view.job.status == JobStatus::Completed));
}

#[test]
fn lifecycle_on_memory_store() {
    let service = seeded(MemoryStore::new());
    complete_two_jobs_and_rate(&service);
}

#[test]
fn lifecycle_on_sqlite_file_survives_restart() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("data").join("jobhub.db");

    {
        let service = seeded(SqliteStore::open(&path).expect("sqlite opens"));
        complete_two_jobs_and_rate(&service);
    }

    let reopened = seeded(SqliteStore::open(&path).expect("sqlite reopens"));
    let provider = actor(&reopened, PROVIDER);
    let profile = reopened.provider_profile(&provider).expect("profile");
    assert_eq!(profile.rating, 4.0);

    let customer = actor(&reopened, CUSTOMER);
    let jobs = reopened
        .list_customer_jobs(&customer, PageRequest::default())
        .expect("jobs");
    assert_eq!(jobs.total, 2);
    assert_eq!(jobs.items[0].title, "Blocked drain", "newest first");
}
