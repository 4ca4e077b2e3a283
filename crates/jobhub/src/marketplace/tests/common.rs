use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;
use uuid::Uuid;

use crate::config::MarketplaceConfig;
use crate::marketplace::domain::{
    Actor, CustomerProfileDraft, Job, JobDraft, JobTypeId, Price, ProviderProfileDraft,
    ProviderProfileId, RatingDraft, Role, User, UserId,
};
use crate::marketplace::store::{MarketStore, MemoryStore, SqliteStore, StoreError};
use crate::marketplace::MarketplaceService;

/// Marketplace with two job types, two customers and three providers.
/// `provider` and `second_provider` do plumbing; `electrician` does not.
pub(super) struct Market<S> {
    pub(super) service: Arc<MarketplaceService<S>>,
    pub(super) customer: Actor,
    pub(super) other_customer: Actor,
    pub(super) provider: Actor,
    pub(super) second_provider: Actor,
    pub(super) electrician: Actor,
    pub(super) plumbing: JobTypeId,
    pub(super) electrical: JobTypeId,
}

pub(super) fn market() -> Market<MemoryStore> {
    market_on(MemoryStore::new())
}

pub(super) fn sqlite_market() -> Market<SqliteStore> {
    market_on(SqliteStore::open_in_memory().expect("sqlite opens"))
}

pub(super) fn market_on<S: MarketStore>(store: S) -> Market<S> {
    let service = Arc::new(MarketplaceService::new(
        Arc::new(store),
        MarketplaceConfig::default(),
    ));
    let (plumbing, electrical) = service
        .store()
        .transaction(|tx| {
            let plumbing = tx.insert_job_type("Plumbing", Price::from_cents(8000))?;
            let electrical = tx.insert_job_type("Electrical", Price::from_cents(9550))?;
            Ok::<_, StoreError>((plumbing.id, electrical.id))
        })
        .expect("job types seeded");

    let customer = customer_actor(&service, "casey@example.com");
    let other_customer = customer_actor(&service, "morgan@example.com");
    let provider = provider_actor(&service, "pat@example.com", &[plumbing]);
    let second_provider = provider_actor(&service, "sam@example.com", &[plumbing, electrical]);
    let electrician = provider_actor(&service, "lee@example.com", &[electrical]);

    Market {
        service,
        customer,
        other_customer,
        provider,
        second_provider,
        electrician,
        plumbing,
        electrical,
    }
}

pub(super) fn user(role: Role, email: &str) -> User {
    User {
        id: UserId(Uuid::new_v4()),
        first_name: email.split('@').next().unwrap_or("test").to_string(),
        last_name: "Tester".to_string(),
        email: email.to_string(),
        phone_number: "555-0100".to_string(),
        role,
    }
}

/// Registered user who has not created a profile yet.
pub(super) fn bare_actor<S: MarketStore>(
    service: &MarketplaceService<S>,
    role: Role,
    email: &str,
) -> Actor {
    let user = service
        .register_user(user(role, email))
        .expect("user registers");
    service.current_actor(user.id).expect("actor resolves")
}

pub(super) fn customer_actor<S: MarketStore>(
    service: &MarketplaceService<S>,
    email: &str,
) -> Actor {
    let bare = bare_actor(service, Role::Customer, email);
    service
        .create_customer_profile(
            &bare,
            CustomerProfileDraft {
                address: "1 Main St".to_string(),
                additional_info: None,
            },
        )
        .expect("customer profile");
    service.current_actor(bare.user_id).expect("actor resolves")
}

pub(super) fn provider_actor<S: MarketStore>(
    service: &MarketplaceService<S>,
    email: &str,
    job_types: &[JobTypeId],
) -> Actor {
    let bare = bare_actor(service, Role::Provider, email);
    service
        .create_provider_profile(
            &bare,
            ProviderProfileDraft {
                bio: Some("Ten years in the trade".to_string()),
                address: "2 Side St".to_string(),
                job_type_ids: job_types.to_vec(),
            },
        )
        .expect("provider profile");
    service.current_actor(bare.user_id).expect("actor resolves")
}

pub(super) fn draft(job_type_id: JobTypeId) -> JobDraft {
    JobDraft {
        job_type_id,
        title: "Fix kitchen sink".to_string(),
        description: "The sink drips all night".to_string(),
        proposed_price: 120.0,
    }
}

pub(super) fn rating(value: i64) -> RatingDraft {
    RatingDraft {
        rating: value,
        comment: Some("Quick and tidy".to_string()),
    }
}

pub(super) fn posted_job<S: MarketStore>(market: &Market<S>) -> Job {
    market
        .service
        .create_job(&market.customer, draft(market.plumbing))
        .expect("job posted")
}

/// Plumbing job with `provider` selected.
pub(super) fn assigned_job<S: MarketStore>(market: &Market<S>) -> Job {
    let job = posted_job(market);
    market
        .service
        .express_interest(&market.provider, job.id)
        .expect("interest");
    market
        .service
        .select_provider(&market.customer, job.id, provider_id(&market.provider))
        .expect("selected")
}

pub(super) fn completed_job<S: MarketStore>(market: &Market<S>) -> Job {
    let job = assigned_job(market);
    market
        .service
        .provider_mark_done(&market.provider, job.id)
        .expect("marked done");
    market
        .service
        .customer_confirm_complete(&market.customer, job.id)
        .expect("completed")
}

pub(super) fn provider_id(actor: &Actor) -> ProviderProfileId {
    actor.provider_profile.expect("provider profile")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
