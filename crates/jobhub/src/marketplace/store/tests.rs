use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use super::*;
use crate::marketplace::domain::{JobStatus, NotificationType, Role};

fn at(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).single().expect("valid timestamp")
        + Duration::minutes(minute)
}

fn user(role: Role, email: &str) -> User {
    User {
        id: UserId(Uuid::new_v4()),
        first_name: "Test".into(),
        last_name: "User".into(),
        email: email.into(),
        phone_number: "555-0100".into(),
        role,
    }
}

struct Fixture {
    customer: CustomerProfile,
    provider: ProviderProfile,
    job_type: JobType,
}

fn fixture(tx: &mut dyn MarketTransaction) -> Result<Fixture, StoreError> {
    let customer_user = tx.insert_user(user(Role::Customer, "casey@example.com"))?;
    let provider_user = tx.insert_user(user(Role::Provider, "pat@example.com"))?;
    let job_type = tx.insert_job_type("Plumbing", Price::from_cents(8000))?;
    let customer = tx.insert_customer_profile(customer_user.id, "1 Main St".into(), None)?;
    let provider =
        tx.insert_provider_profile(provider_user.id, Some("Pipes".into()), "2 Side St".into())?;
    tx.set_provider_job_types(provider.id, &[job_type.id])?;
    Ok(Fixture {
        customer,
        provider,
        job_type,
    })
}

fn new_job(fixture: &Fixture, minute: i64) -> NewJob {
    NewJob {
        customer_profile_id: fixture.customer.id,
        job_type_id: fixture.job_type.id,
        title: format!("Fix sink {minute}"),
        description: "Kitchen sink leaks".into(),
        proposed_price: Price::from_cents(12000),
        created_at: at(minute),
    }
}

fn run_on_backends(
    memory: fn(&MemoryStore) -> Result<(), StoreError>,
    sqlite: fn(&SqliteStore) -> Result<(), StoreError>,
) {
    memory(&MemoryStore::new()).expect("memory backend");
    let store = SqliteStore::open_in_memory().expect("sqlite opens");
    sqlite(&store).expect("sqlite backend");
}

fn failed_transaction_leaves_no_trace<S: MarketStore>(store: &S) -> Result<(), StoreError> {
    let result: Result<(), StoreError> = store.transaction(|tx| {
        tx.insert_user(user(Role::Customer, "ghost@example.com"))?;
        Err(StoreError::Constraint("abort".into()))
    });
    assert!(matches!(result, Err(StoreError::Constraint(_))));

    store.transaction(|tx| {
        // Inserting the same email again must succeed since the first write rolled back.
        tx.insert_user(user(Role::Customer, "ghost@example.com"))?;
        Ok(())
    })
}

#[test]
fn rollback_discards_writes() {
    run_on_backends(
        failed_transaction_leaves_no_trace::<MemoryStore>,
        failed_transaction_leaves_no_trace::<SqliteStore>,
    );
}

fn duplicate_rows_conflict<S: MarketStore>(store: &S) -> Result<(), StoreError> {
    store.transaction(|tx| {
        let fixture = fixture(tx)?;
        assert!(matches!(
            tx.insert_user(user(Role::Customer, "casey@example.com")),
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(
            tx.insert_job_type("Plumbing", Price::from_cents(1)),
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(
            tx.insert_customer_profile(fixture.customer.user_id, "elsewhere".into(), None),
            Err(StoreError::Conflict(_))
        ));

        let job = tx.insert_job(new_job(&fixture, 0))?;
        tx.insert_provider_job(ProviderProfileJob::matched(job.id, fixture.provider.id))?;
        assert!(matches!(
            tx.insert_provider_job(ProviderProfileJob::matched(job.id, fixture.provider.id)),
            Err(StoreError::Conflict(_))
        ));
        Ok(())
    })
}

#[test]
fn duplicates_are_reported_as_conflicts() {
    run_on_backends(
        duplicate_rows_conflict::<MemoryStore>,
        duplicate_rows_conflict::<SqliteStore>,
    );
}

fn assignment_must_match_status<S: MarketStore>(store: &S) -> Result<(), StoreError> {
    store.transaction(|tx| {
        let fixture = fixture(tx)?;
        let mut job = tx.insert_job(new_job(&fixture, 0))?;
        assert_eq!(job.status, JobStatus::Open);
        assert_eq!(job.updated_at, job.created_at);

        job.status = JobStatus::InProgress;
        assert!(matches!(tx.update_job(&job), Err(StoreError::Constraint(_))));

        job.assigned_provider_id = Some(fixture.provider.id);
        tx.update_job(&job)?;

        job.status = JobStatus::ProviderDone;
        assert!(
            matches!(tx.update_job(&job), Err(StoreError::Constraint(_))),
            "provider_done requires a marked-done timestamp"
        );
        job.provider_marked_done_at = Some(at(5));
        tx.update_job(&job)?;

        let stored = tx.job(job.id)?.expect("job exists");
        assert_eq!(stored.status, JobStatus::ProviderDone);
        assert_eq!(stored.assigned_provider_id, Some(fixture.provider.id));
        assert_eq!(stored.provider_marked_done_at, Some(at(5)));
        Ok(())
    })
}

#[test]
fn job_rows_keep_assignment_consistent_with_status() {
    run_on_backends(
        assignment_must_match_status::<MemoryStore>,
        assignment_must_match_status::<SqliteStore>,
    );
}

fn single_selection_per_job<S: MarketStore>(store: &S) -> Result<(), StoreError> {
    store.transaction(|tx| {
        let fixture = fixture(tx)?;
        let other_user = tx.insert_user(user(Role::Provider, "quinn@example.com"))?;
        let other = tx.insert_provider_profile(other_user.id, None, "3 Far Rd".into())?;
        let job = tx.insert_job(new_job(&fixture, 0))?;

        for provider in [fixture.provider.id, other.id] {
            tx.insert_provider_job(ProviderProfileJob {
                job_id: job.id,
                provider_profile_id: provider,
                is_interested: true,
                is_selected: false,
            })?;
        }

        let not_interested = ProviderProfileJob {
            job_id: job.id,
            provider_profile_id: fixture.provider.id,
            is_interested: false,
            is_selected: true,
        };
        assert!(matches!(
            tx.update_provider_job(&not_interested),
            Err(StoreError::Constraint(_))
        ));

        let mut first = tx
            .provider_job(job.id, fixture.provider.id)?
            .expect("row exists");
        first.is_selected = true;
        tx.update_provider_job(&first)?;

        let mut second = tx.provider_job(job.id, other.id)?.expect("row exists");
        second.is_selected = true;
        assert!(matches!(
            tx.update_provider_job(&second),
            Err(StoreError::Conflict(_))
        ));

        let selected: Vec<_> = tx
            .provider_jobs_for_job(job.id)?
            .into_iter()
            .filter(|row| row.is_selected)
            .collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].provider_profile_id, fixture.provider.id);
        Ok(())
    })
}

#[test]
fn at_most_one_selected_provider_per_job() {
    run_on_backends(
        single_selection_per_job::<MemoryStore>,
        single_selection_per_job::<SqliteStore>,
    );
}

fn ratings_are_unique_and_bounded<S: MarketStore>(store: &S) -> Result<(), StoreError> {
    store.transaction(|tx| {
        let fixture = fixture(tx)?;
        let job = tx.insert_job(new_job(&fixture, 0))?;
        let rating = |value: u8| NewRating {
            job_id: job.id,
            provider_profile_id: fixture.provider.id,
            customer_profile_id: fixture.customer.id,
            rating: value,
            comment: None,
            created_at: at(10),
        };

        assert!(matches!(tx.insert_rating(rating(0)), Err(StoreError::Constraint(_))));
        assert!(matches!(tx.insert_rating(rating(6)), Err(StoreError::Constraint(_))));

        let stored = tx.insert_rating(rating(4))?;
        assert_eq!(tx.rating_for(job.id, fixture.customer.id)?, Some(stored));
        assert!(matches!(tx.insert_rating(rating(5)), Err(StoreError::Conflict(_))));
        assert_eq!(tx.ratings_for_provider(fixture.provider.id)?.len(), 1);

        assert!(matches!(
            tx.set_provider_rating(fixture.provider.id, 5.5),
            Err(StoreError::Constraint(_))
        ));
        tx.set_provider_rating(fixture.provider.id, 4.0)?;
        let provider = tx
            .provider_profile(fixture.provider.id)?
            .expect("provider exists");
        assert_eq!(provider.rating, 4.0);
        Ok(())
    })
}

#[test]
fn one_rating_per_job_and_customer() {
    run_on_backends(
        ratings_are_unique_and_bounded::<MemoryStore>,
        ratings_are_unique_and_bounded::<SqliteStore>,
    );
}

fn listings_are_newest_first<S: MarketStore>(store: &S) -> Result<(), StoreError> {
    store.transaction(|tx| {
        let fixture = fixture(tx)?;
        let older = tx.insert_job(new_job(&fixture, 0))?;
        let newer = tx.insert_job(new_job(&fixture, 30))?;
        let ids: Vec<_> = tx
            .jobs_for_customer(fixture.customer.id)?
            .into_iter()
            .map(|job| job.id)
            .collect();
        assert_eq!(ids, vec![newer.id, older.id]);

        for (job, minute) in [(older.id, 1), (newer.id, 31)] {
            tx.insert_notification(NewNotification {
                job_id: job,
                user_id: fixture.provider.user_id,
                kind: NotificationType::NewJob,
                message: "A new job matching your skills has been posted.".into(),
                created_at: at(minute),
            })?;
        }
        let notifications = tx.notifications_for(fixture.provider.user_id)?;
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0].job_id, newer.id);
        assert!(notifications.iter().all(|n| !n.is_read));

        tx.mark_notification_read(notifications[1].id)?;
        let read = tx.notification(notifications[1].id)?.expect("exists");
        assert!(read.is_read);
        assert!(matches!(
            tx.mark_notification_read(NotificationId(9_999)),
            Err(StoreError::NotFound(_))
        ));
        Ok(())
    })
}

#[test]
fn customer_jobs_and_notifications_list_newest_first() {
    run_on_backends(
        listings_are_newest_first::<MemoryStore>,
        listings_are_newest_first::<SqliteStore>,
    );
}

fn referential_rules_hold<S: MarketStore>(store: &S) -> Result<(), StoreError> {
    store.transaction(|tx| {
        let fixture = fixture(tx)?;
        let job = tx.insert_job(new_job(&fixture, 0))?;
        tx.insert_provider_job(ProviderProfileJob::matched(job.id, fixture.provider.id))?;

        assert!(matches!(
            tx.delete_job_type(fixture.job_type.id),
            Err(StoreError::Constraint(_))
        ));
        assert!(matches!(
            tx.set_provider_job_types(fixture.provider.id, &[JobTypeId(404)]),
            Err(StoreError::Constraint(_))
        ));

        let matched = tx.providers_with_job_type(fixture.job_type.id)?;
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, fixture.provider.id);

        tx.delete_customer_profile(fixture.customer.id)?;
        assert_eq!(tx.job(job.id)?, None);
        assert!(tx.provider_jobs_for_provider(fixture.provider.id)?.is_empty());

        tx.delete_job_type(fixture.job_type.id)?;
        assert!(tx.job_types()?.is_empty());
        Ok(())
    })
}

#[test]
fn deletes_cascade_from_customers_and_restrict_on_job_types() {
    run_on_backends(
        referential_rules_hold::<MemoryStore>,
        referential_rules_hold::<SqliteStore>,
    );
}

#[test]
fn sqlite_file_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("data").join("jobhub.db");

    {
        let store = SqliteStore::open(&path).expect("opens");
        store
            .transaction(|tx| {
                tx.insert_job_type("Gardening", Price::from_cents(4500))?;
                Ok::<_, StoreError>(())
            })
            .expect("writes");
    }

    let reopened = SqliteStore::open(&path).expect("reopens");
    let names = reopened
        .transaction(|tx| tx.job_types())
        .expect("reads")
        .into_iter()
        .map(|job_type| job_type.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Gardening".to_string()]);
}
