use crate::infra::BUNDLED_SEED;
use clap::Args;
use jobhub::config::MarketplaceConfig;
use jobhub::error::AppError;
use jobhub::marketplace::{
    seed, Actor, Job, JobDraft, JobServiceError, MarketplaceService, MemoryStore, PageRequest,
    RatingDraft,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Seed document to load instead of the bundled reference data.
    #[arg(long)]
    pub(crate) seed: Option<PathBuf>,
    /// Rating the customer gives the provider at the end (1-5).
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(i64).range(1..=5))]
    pub(crate) rating: i64,
    /// Email of the seeded customer posting the job.
    #[arg(long, default_value = "casey@example.com")]
    pub(crate) customer: String,
    /// Email of the seeded provider to select.
    #[arg(long, default_value = "pat@example.com")]
    pub(crate) provider: String,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let document = match &args.seed {
        Some(path) => seed::load(path)?,
        None => seed::parse(BUNDLED_SEED)?,
    };
    let store = MemoryStore::new();
    let summary = seed::apply(&store, &document)?;
    println!(
        "Seeded {} job types, {} users, {} customer and {} provider profiles",
        summary.job_types, summary.users, summary.customer_profiles, summary.provider_profiles
    );

    let service = MarketplaceService::new(Arc::new(store), MarketplaceConfig::default());
    let lookup = |email: &str| -> Result<Actor, AppError> {
        let user = document
            .users
            .iter()
            .find(|user| user.email == email)
            .ok_or_else(|| demo_error(format!("seeded user {email}")))?;
        Ok(service.current_actor(user.id)?)
    };
    let customer = lookup(&args.customer)?;
    let provider = lookup(&args.provider)?;
    let provider_profile = provider
        .provider_profile
        .ok_or_else(|| demo_error(format!("provider profile for {}", args.provider)))?;

    let job_type = service
        .provider_profile(&provider)?
        .job_types
        .into_iter()
        .next()
        .ok_or_else(|| demo_error(format!("job type declared by {}", args.provider)))?;

    println!("\n== Job lifecycle ==");
    let job = service.create_job(
        &customer,
        JobDraft {
            job_type_id: job_type,
            title: "Replace bathroom faucet".to_string(),
            description: "Old faucet leaks at the base; parts on site.".to_string(),
            proposed_price: 140.0,
        },
    )?;
    step("posted", &job);

    service.express_interest(&provider, job.id)?;
    println!("  provider {} expressed interest", provider_profile.0);

    let job = service.select_provider(&customer, job.id, provider_profile)?;
    step("provider selected", &job);

    let job = service.provider_mark_done(&provider, job.id)?;
    step("provider marked done", &job);

    let job = service.customer_confirm_complete(&customer, job.id)?;
    step("customer confirmed", &job);

    let rated = service.rate_provider(
        &customer,
        job.id,
        RatingDraft {
            rating: args.rating,
            comment: Some("Fast and tidy work".to_string()),
        },
    )?;
    println!(
        "  rated {} / 5, provider aggregate now {:.2}",
        rated.rating.rating, rated.provider_rating
    );

    println!("\n== Notifications ==");
    for (label, actor) in [("customer", &customer), ("provider", &provider)] {
        print_notifications(&service, label, actor)?;
    }
    Ok(())
}

fn step(label: &str, job: &Job) {
    let assigned = job
        .assigned_provider_id
        .map(|id| id.0.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  {label:<22} job {:<4} status {:<14} assigned {assigned}",
        job.id.0,
        job.status.label()
    );
}

fn print_notifications(
    service: &MarketplaceService<MemoryStore>,
    label: &str,
    actor: &Actor,
) -> Result<(), AppError> {
    let page = service.list_notifications(actor, PageRequest::default())?;
    println!("  {label} ({}):", page.total);
    for notification in page.items.iter().rev() {
        println!(
            "    [{}] {}",
            notification.kind.label(),
            notification.message
        );
    }
    Ok(())
}

fn demo_error(subject: String) -> AppError {
    AppError::Marketplace(JobServiceError::NotFound(subject))
}
