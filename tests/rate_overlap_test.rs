//! Rate repository behavior: the effective-window overlap guard, the
//! update path re-checking windows, and deletion integrity guards.

mod common;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use common::TestApp;
use forwarder_api::errors::ServiceError;
use forwarder_api::services::rates::{NewRate, RatePatch};
use forwarder_api::services::zones::NewZone;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn rate_input(
    app: &TestApp,
    warehouse_id: Uuid,
    zone_id: Uuid,
    tier: &str,
    from: NaiveDate,
    until: Option<NaiveDate>,
) -> NewRate {
    NewRate {
        tenant_id: app.tenant_id,
        warehouse_id,
        zone_id,
        service_tier: tier.to_string(),
        base_rate: dec!(15),
        per_kg_rate: dec!(3),
        min_charge: dec!(25),
        max_weight_kg: None,
        currency: "USD".to_string(),
        is_active: true,
        effective_from: from,
        effective_until: until,
    }
}

async fn setup() -> (TestApp, Uuid, Uuid) {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse().await;
    let zone = app
        .services()
        .zones
        .create_zone(NewZone {
            tenant_id: app.tenant_id,
            name: "North America".to_string(),
            countries: vec!["US".to_string(), "CA".to_string()],
            is_active: true,
        })
        .await
        .unwrap();
    (app, warehouse.id, zone.id)
}

#[tokio::test]
async fn open_ended_rate_conflicts_with_closed_window() {
    let (app, warehouse_id, zone_id) = setup().await;

    let first = app
        .services()
        .rates
        .create_rate(rate_input(
            &app,
            warehouse_id,
            zone_id,
            "standard",
            date(2025, 1, 1),
            Some(date(2025, 6, 30)),
        ))
        .await
        .unwrap();

    let err = app
        .services()
        .rates
        .create_rate(rate_input(
            &app,
            warehouse_id,
            zone_id,
            "standard",
            date(2025, 6, 15),
            None,
        ))
        .await
        .unwrap_err();

    assert_matches!(
        err,
        ServiceError::RateOverlap { conflicting_rate_id, .. } if conflicting_rate_id == first.id
    );
}

#[tokio::test]
async fn adjacent_windows_do_not_conflict() {
    let (app, warehouse_id, zone_id) = setup().await;

    app.services()
        .rates
        .create_rate(rate_input(
            &app,
            warehouse_id,
            zone_id,
            "standard",
            date(2025, 1, 1),
            Some(date(2025, 6, 30)),
        ))
        .await
        .unwrap();

    // Starts the day after the first window closes.
    app.services()
        .rates
        .create_rate(rate_input(
            &app,
            warehouse_id,
            zone_id,
            "standard",
            date(2025, 7, 1),
            None,
        ))
        .await
        .expect("adjacent window should be accepted");
}

#[tokio::test]
async fn inactive_rates_do_not_participate_in_overlap_check() {
    let (app, warehouse_id, zone_id) = setup().await;

    let mut inactive = rate_input(&app, warehouse_id, zone_id, "standard", date(2025, 1, 1), None);
    inactive.is_active = false;
    app.services().rates.create_rate(inactive).await.unwrap();

    app.services()
        .rates
        .create_rate(rate_input(
            &app,
            warehouse_id,
            zone_id,
            "standard",
            date(2025, 1, 1),
            None,
        ))
        .await
        .expect("inactive rate must not block the window");
}

#[tokio::test]
async fn different_tier_or_zone_never_conflicts() {
    let (app, warehouse_id, zone_id) = setup().await;

    app.services()
        .rates
        .create_rate(rate_input(&app, warehouse_id, zone_id, "standard", date(2025, 1, 1), None))
        .await
        .unwrap();

    app.services()
        .rates
        .create_rate(rate_input(&app, warehouse_id, zone_id, "express", date(2025, 1, 1), None))
        .await
        .expect("another tier is a different scope");

    let other_zone = app
        .services()
        .zones
        .create_zone(NewZone {
            tenant_id: app.tenant_id,
            name: "Europe".to_string(),
            countries: vec!["DE".to_string()],
            is_active: true,
        })
        .await
        .unwrap();
    app.services()
        .rates
        .create_rate(rate_input(&app, warehouse_id, other_zone.id, "standard", date(2025, 1, 1), None))
        .await
        .expect("another zone is a different scope");
}

#[tokio::test]
async fn update_recheck_excludes_the_rate_itself() {
    let (app, warehouse_id, zone_id) = setup().await;

    let rate = app
        .services()
        .rates
        .create_rate(rate_input(
            &app,
            warehouse_id,
            zone_id,
            "standard",
            date(2025, 1, 1),
            Some(date(2025, 6, 30)),
        ))
        .await
        .unwrap();

    // Widening its own window is fine; it only conflicts with *other* rates.
    let updated = app
        .services()
        .rates
        .update_rate(
            rate.id,
            RatePatch {
                effective_until: Some(Some(date(2025, 9, 30))),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.effective_until, Some(date(2025, 9, 30)));
}

#[tokio::test]
async fn update_into_anothers_window_is_rejected() {
    let (app, warehouse_id, zone_id) = setup().await;

    app.services()
        .rates
        .create_rate(rate_input(
            &app,
            warehouse_id,
            zone_id,
            "standard",
            date(2025, 1, 1),
            Some(date(2025, 6, 30)),
        ))
        .await
        .unwrap();
    let second = app
        .services()
        .rates
        .create_rate(rate_input(
            &app,
            warehouse_id,
            zone_id,
            "standard",
            date(2025, 7, 1),
            Some(date(2025, 12, 31)),
        ))
        .await
        .unwrap();

    let err = app
        .services()
        .rates
        .update_rate(
            second.id,
            RatePatch {
                effective_from: Some(date(2025, 6, 1)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::RateOverlap { .. });
}

#[tokio::test]
async fn reactivating_into_a_claimed_window_is_rejected() {
    let (app, warehouse_id, zone_id) = setup().await;

    let mut inactive = rate_input(&app, warehouse_id, zone_id, "standard", date(2025, 1, 1), None);
    inactive.is_active = false;
    let dormant = app.services().rates.create_rate(inactive).await.unwrap();

    app.services()
        .rates
        .create_rate(rate_input(&app, warehouse_id, zone_id, "standard", date(2025, 3, 1), None))
        .await
        .unwrap();

    let err = app
        .services()
        .rates
        .update_rate(
            dormant.id,
            RatePatch {
                is_active: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::RateOverlap { .. });
}

#[tokio::test]
async fn inverted_window_is_invalid() {
    let (app, warehouse_id, zone_id) = setup().await;

    let err = app
        .services()
        .rates
        .create_rate(rate_input(
            &app,
            warehouse_id,
            zone_id,
            "standard",
            date(2025, 6, 30),
            Some(date(2025, 1, 1)),
        ))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidRange(_));
}

#[tokio::test]
async fn create_rejects_unknown_warehouse_and_zone() {
    let (app, warehouse_id, zone_id) = setup().await;

    let err = app
        .services()
        .rates
        .create_rate(rate_input(&app, Uuid::new_v4(), zone_id, "standard", date(2025, 1, 1), None))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    let err = app
        .services()
        .rates
        .create_rate(rate_input(&app, warehouse_id, Uuid::new_v4(), "standard", date(2025, 1, 1), None))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn delete_blocked_while_shipment_references_zone() {
    let (app, warehouse_id, zone_id) = setup().await;

    let rate = app
        .services()
        .rates
        .create_rate(rate_input(&app, warehouse_id, zone_id, "standard", date(2025, 1, 1), None))
        .await
        .unwrap();

    let package = app.seed_package(warehouse_id, dec!(2)).await;
    app.seed_shipment(package.id, zone_id).await;

    let err = app.services().rates.delete_rate(rate.id).await.unwrap_err();
    assert_matches!(err, ServiceError::InUse(_));

    // Still present.
    app.services().rates.get_rate(rate.id).await.unwrap();
}

#[tokio::test]
async fn delete_removes_unreferenced_rate() {
    let (app, warehouse_id, zone_id) = setup().await;

    let rate = app
        .services()
        .rates
        .create_rate(rate_input(&app, warehouse_id, zone_id, "standard", date(2025, 1, 1), None))
        .await
        .unwrap();

    app.services().rates.delete_rate(rate.id).await.unwrap();
    let err = app.services().rates.get_rate(rate.id).await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn zone_delete_refused_while_active_rate_references_it() {
    let (app, warehouse_id, zone_id) = setup().await;

    let rate = app
        .services()
        .rates
        .create_rate(rate_input(&app, warehouse_id, zone_id, "standard", date(2025, 1, 1), None))
        .await
        .unwrap();

    let err = app.services().zones.delete_zone(zone_id).await.unwrap_err();
    assert_matches!(err, ServiceError::InUse(_));

    // Remove the rate and the zone becomes deletable.
    app.services().rates.delete_rate(rate.id).await.unwrap();
    app.services().zones.delete_zone(zone_id).await.unwrap();
}

#[tokio::test]
async fn concurrent_creates_into_empty_scope_admit_exactly_one() {
    let (app, warehouse_id, zone_id) = setup().await;

    // No existing rate in the scope: serialization must come from the zone
    // anchor, not from locking matching rate rows.
    let mut tasks = Vec::new();
    for month in [1u32, 3] {
        let rates = app.services().rates.clone();
        let input = rate_input(
            &app,
            warehouse_id,
            zone_id,
            "standard",
            date(2025, month, 1),
            None,
        );
        tasks.push(tokio::spawn(async move { rates.create_rate(input).await }));
    }

    let mut created = 0;
    let mut overlaps = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => created += 1,
            Err(ServiceError::RateOverlap { .. }) => overlaps += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(overlaps, 1);
}

#[tokio::test]
async fn list_rates_paginates() {
    let (app, warehouse_id, zone_id) = setup().await;

    for year in 2020..2025 {
        app.services()
            .rates
            .create_rate(rate_input(
                &app,
                warehouse_id,
                zone_id,
                "standard",
                date(year, 1, 1),
                Some(date(year, 12, 31)),
            ))
            .await
            .unwrap();
    }

    let (page1, total) = app
        .services()
        .rates
        .list_rates(warehouse_id, 1, 2)
        .await
        .unwrap();
    assert_eq!(total, 5);
    assert_eq!(page1.len(), 2);

    let (page3, _) = app
        .services()
        .rates
        .list_rates(warehouse_id, 3, 2)
        .await
        .unwrap();
    assert_eq!(page3.len(), 1);
}
