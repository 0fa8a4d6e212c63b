//! Runs against a live database:
//! `DATABASE_URL=postgres://... cargo test --test postgres -- --ignored`

use chrono::Utc;
use rental_service::store::postgres::run_migrations;
use rental_service::store::Filter;
use rental_service::{DocStore, EntityStore, PgStore, StoreError, WriteMode};
use rental_shared::{BookingStatus, DocStatus, Document, RentalBooking};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::OnceCell;

static MIGRATED: OnceCell<()> = OnceCell::const_new();

fn database_url() -> String {
    std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a scratch database")
}

/// Tests share one database; the first caller migrates it.
async fn migrate() {
    MIGRATED
        .get_or_init(|| async { run_migrations(&database_url()).await.unwrap() })
        .await;
}

async fn connect() -> (Arc<PgStore>, DocStore) {
    migrate().await;
    let url = database_url();
    let pg = Arc::new(PgStore::connect(&url).await.unwrap());
    let store = DocStore::new(pg.clone());
    (pg, store)
}

/// Vehicle name no other run has used.
fn unique_vehicle() -> String {
    format!("TEST-{}", Utc::now().format("%Y%m%d%H%M%S%f"))
}

fn sequence(name: &str) -> u32 {
    name.rsplit('-').next().unwrap().parse().unwrap()
}

#[tokio::test]
#[ignore]
async fn migrations_are_recorded_once() {
    migrate().await;
    // every migration is already recorded, so this applies nothing
    run_migrations(&database_url()).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn naming_series_hands_out_increasing_names() {
    let (_, store) = connect().await;
    let first = store.insert(&RentalBooking::default()).await.unwrap();
    let second = store.insert(&RentalBooking::default()).await.unwrap();

    let month = Utc::now().format("RB-%Y-%m-").to_string();
    assert!(first.name.starts_with(&month), "{}", first.name);
    assert!(sequence(&second.name) > sequence(&first.name));
}

#[tokio::test]
#[ignore]
async fn docstatus_column_follows_the_lifecycle() {
    let (pg, store) = connect().await;
    let mut booking = store.insert(&RentalBooking::default()).await.unwrap();
    assert_eq!(booking.docstatus, DocStatus::Draft);

    store.submit(&mut booking).await.unwrap();
    let stored = pg.fetch(RentalBooking::DOCTYPE, &booking.name).await.unwrap();
    assert_eq!(stored.docstatus, DocStatus::Submitted);

    booking.customer = "Jane Roe".into();
    assert!(matches!(
        store.save(&booking, WriteMode::Normal).await,
        Err(StoreError::SubmittedImmutable { .. })
    ));
    store.save(&booking, WriteMode::AfterSubmit).await.unwrap();
    assert!(matches!(
        store.delete::<RentalBooking>(&booking.name).await,
        Err(StoreError::NotDeletable { .. })
    ));

    store.cancel(&mut booking).await.unwrap();
    let reloaded: RentalBooking = store.load(&booking.name).await.unwrap();
    assert_eq!(reloaded.docstatus, DocStatus::Cancelled);
    assert_eq!(reloaded.customer, "Jane Roe");
}

#[tokio::test]
#[ignore]
async fn list_filters_run_in_the_database() {
    let (_, store) = connect().await;
    let vehicle = unique_vehicle();
    let mut names = Vec::new();
    for status in [BookingStatus::Confirmed, BookingStatus::Out, BookingStatus::Cancelled] {
        let booking = store
            .insert(&RentalBooking {
                vehicle: vehicle.clone(),
                status,
                ..Default::default()
            })
            .await
            .unwrap();
        names.push(booking.name);
    }
    let mut submitted: RentalBooking = store.load(&names[1]).await.unwrap();
    store.submit(&mut submitted).await.unwrap();

    let by_vehicle = store
        .list::<RentalBooking>(&[Filter::eq("vehicle", &vehicle)])
        .await
        .unwrap();
    assert_eq!(by_vehicle.len(), 3);

    let running = store
        .list::<RentalBooking>(&[
            Filter::eq("vehicle", &vehicle),
            Filter::not_in("status", &[BookingStatus::Cancelled, BookingStatus::Completed]),
            Filter::ne("name", &names[0]),
        ])
        .await
        .unwrap();
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].name, names[1]);

    let live = store
        .list::<RentalBooking>(&[
            Filter::eq("vehicle", &vehicle),
            Filter::eq("docstatus", DocStatus::Submitted),
        ])
        .await
        .unwrap();
    assert_eq!(live.len(), 1);

    let unbilled = store
        .list::<RentalBooking>(&[
            Filter::eq("vehicle", &vehicle),
            Filter::eq("sales_invoice", Option::<String>::None),
        ])
        .await
        .unwrap();
    assert_eq!(unbilled.len(), 3);
}

#[tokio::test]
#[ignore]
async fn concurrent_field_updates_are_not_lost() {
    let (pg, store) = connect().await;
    let booking = store.insert(&RentalBooking::default()).await.unwrap();

    let writers: Vec<_> = (0..8)
        .map(|i| {
            let pg = pg.clone();
            let name = booking.name.clone();
            tokio::spawn(async move {
                pg.set_value(
                    RentalBooking::DOCTYPE,
                    &name,
                    &format!("note_{i}"),
                    json!(i),
                    WriteMode::Normal,
                )
                .await
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap().unwrap();
    }

    let stored = pg.fetch(RentalBooking::DOCTYPE, &booking.name).await.unwrap();
    for i in 0..8 {
        assert_eq!(stored.data[format!("note_{i}")], json!(i));
    }
}
