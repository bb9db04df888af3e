//! Storage billing: policy windows, the free-day split, bin premiums, the
//! double-billing guard, and invoicing flags.

mod common;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use common::TestApp;
use forwarder_api::errors::ServiceError;
use forwarder_api::services::storage::NewPolicy;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn policy_input(app: &TestApp, warehouse_id: Uuid, free_days: i32) -> NewPolicy {
    NewPolicy {
        tenant_id: app.tenant_id,
        warehouse_id,
        free_days,
        daily_rate: dec!(2.00),
        currency: "USD".to_string(),
        is_active: true,
        effective_from: date(2025, 1, 1),
        effective_until: None,
    }
}

#[tokio::test]
async fn ten_day_range_with_seven_free_days_bills_three() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse().await;
    let package = app.seed_package(warehouse.id, dec!(2)).await;
    app.services()
        .storage
        .create_policy(policy_input(&app, warehouse.id, 7))
        .await
        .unwrap();

    let charge = app
        .services()
        .storage
        .calculate_charge(package.id, warehouse.id, date(2025, 3, 1), date(2025, 3, 11))
        .await
        .unwrap();

    assert_eq!(charge.total_days, 10);
    assert_eq!(charge.free_days_applied, 7);
    assert_eq!(charge.chargeable_days, 3);
    assert_eq!(charge.base_fee, dec!(6.00));
    assert_eq!(charge.bin_fee, dec!(0));
    assert_eq!(charge.total_amount, dec!(6.00));
    assert_eq!(charge.currency, "USD");
    assert!(charge.notes.contains("3 chargeable"));
    assert!(!charge.is_invoiced);
}

#[tokio::test]
async fn active_bin_assignment_adds_daily_premium() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse().await;
    let package = app.seed_package(warehouse.id, dec!(2)).await;
    let bin = app
        .seed_bin(warehouse.id, "A-01", Some(5), dec!(1.50))
        .await;
    app.services()
        .storage
        .create_policy(policy_input(&app, warehouse.id, 7))
        .await
        .unwrap();
    app.services()
        .bins
        .assign(package.id, bin.id, None, Uuid::new_v4())
        .await
        .unwrap();

    let charge = app
        .services()
        .storage
        .calculate_charge(package.id, warehouse.id, date(2025, 3, 1), date(2025, 3, 11))
        .await
        .unwrap();

    assert_eq!(charge.base_fee, dec!(6.00));
    assert_eq!(charge.bin_fee, dec!(4.50));
    assert_eq!(charge.total_amount, dec!(10.50));
}

#[tokio::test]
async fn stay_within_free_period_costs_nothing() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse().await;
    let package = app.seed_package(warehouse.id, dec!(2)).await;
    app.services()
        .storage
        .create_policy(policy_input(&app, warehouse.id, 7))
        .await
        .unwrap();

    let charge = app
        .services()
        .storage
        .calculate_charge(package.id, warehouse.id, date(2025, 3, 1), date(2025, 3, 6))
        .await
        .unwrap();

    assert_eq!(charge.total_days, 5);
    assert_eq!(charge.free_days_applied, 5);
    assert_eq!(charge.chargeable_days, 0);
    assert_eq!(charge.total_amount, dec!(0));
}

#[tokio::test]
async fn non_positive_range_is_invalid() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse().await;
    let package = app.seed_package(warehouse.id, dec!(2)).await;
    app.services()
        .storage
        .create_policy(policy_input(&app, warehouse.id, 7))
        .await
        .unwrap();

    let err = app
        .services()
        .storage
        .calculate_charge(package.id, warehouse.id, date(2025, 3, 11), date(2025, 3, 11))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidRange(_));

    let err = app
        .services()
        .storage
        .calculate_charge(package.id, warehouse.id, date(2025, 3, 11), date(2025, 3, 1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidRange(_));
}

#[tokio::test]
async fn missing_policy_is_fatal_for_the_call() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse().await;
    let package = app.seed_package(warehouse.id, dec!(2)).await;

    let err = app
        .services()
        .storage
        .calculate_charge(package.id, warehouse.id, date(2025, 3, 1), date(2025, 3, 11))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::PolicyNotFound { .. });
}

#[tokio::test]
async fn policy_window_must_contain_whole_range() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse().await;
    let package = app.seed_package(warehouse.id, dec!(2)).await;

    let mut bounded = policy_input(&app, warehouse.id, 7);
    bounded.effective_until = Some(date(2025, 3, 5));
    app.services().storage.create_policy(bounded).await.unwrap();

    // Range runs past the policy's end.
    let err = app
        .services()
        .storage
        .calculate_charge(package.id, warehouse.id, date(2025, 3, 1), date(2025, 3, 11))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::PolicyNotFound { .. });
}

#[tokio::test]
async fn overlapping_active_policies_are_rejected() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse().await;

    let first = app
        .services()
        .storage
        .create_policy(policy_input(&app, warehouse.id, 7))
        .await
        .unwrap();

    let mut second = policy_input(&app, warehouse.id, 10);
    second.effective_from = date(2025, 6, 1);
    let err = app
        .services()
        .storage
        .create_policy(second)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::PolicyOverlap(id) if id == first.id);
}

#[tokio::test]
async fn rebilling_a_covered_range_is_a_conflict() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse().await;
    let package = app.seed_package(warehouse.id, dec!(2)).await;
    app.services()
        .storage
        .create_policy(policy_input(&app, warehouse.id, 7))
        .await
        .unwrap();

    app.services()
        .storage
        .calculate_charge(package.id, warehouse.id, date(2025, 3, 1), date(2025, 3, 11))
        .await
        .unwrap();

    // Starts inside the billed range.
    let err = app
        .services()
        .storage
        .calculate_charge(package.id, warehouse.id, date(2025, 3, 10), date(2025, 3, 20))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    // Starting exactly where the previous charge ended is the expected
    // billing cadence.
    let next = app
        .services()
        .storage
        .calculate_charge(package.id, warehouse.id, date(2025, 3, 11), date(2025, 3, 21))
        .await
        .unwrap();
    assert_eq!(next.charge_from, date(2025, 3, 11));
}

#[tokio::test]
async fn concurrent_first_charges_bill_the_range_once() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse().await;
    let package = app.seed_package(warehouse.id, dec!(2)).await;
    app.services()
        .storage
        .create_policy(policy_input(&app, warehouse.id, 0))
        .await
        .unwrap();

    // The package has no prior charge row to lock; the guard must anchor on
    // the package row instead.
    let mut tasks = Vec::new();
    for _ in 0..2 {
        let storage = app.services().storage.clone();
        let package_id = package.id;
        let warehouse_id = warehouse.id;
        tasks.push(tokio::spawn(async move {
            storage
                .calculate_charge(package_id, warehouse_id, date(2025, 3, 1), date(2025, 3, 11))
                .await
        }));
    }

    let mut billed = 0;
    let mut conflicts = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => billed += 1,
            Err(ServiceError::Conflict(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(billed, 1);
    assert_eq!(conflicts, 1);

    let charges = app.services().storage.list_charges(package.id).await.unwrap();
    assert_eq!(charges.len(), 1);
}

#[tokio::test]
async fn mark_invoiced_claims_each_charge_once() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse().await;
    let package = app.seed_package(warehouse.id, dec!(2)).await;
    app.services()
        .storage
        .create_policy(policy_input(&app, warehouse.id, 0))
        .await
        .unwrap();

    let charge = app
        .services()
        .storage
        .calculate_charge(package.id, warehouse.id, date(2025, 3, 1), date(2025, 3, 11))
        .await
        .unwrap();

    let invoice_id = Uuid::new_v4();
    let claimed = app
        .services()
        .storage
        .mark_invoiced(vec![charge.id], invoice_id)
        .await
        .unwrap();
    assert_eq!(claimed, 1);

    // Second claim is a no-op.
    let reclaimed = app
        .services()
        .storage
        .mark_invoiced(vec![charge.id], Uuid::new_v4())
        .await
        .unwrap();
    assert_eq!(reclaimed, 0);

    let charges = app.services().storage.list_charges(package.id).await.unwrap();
    assert_eq!(charges.len(), 1);
    assert!(charges[0].is_invoiced);
    assert_eq!(charges[0].invoice_id, Some(invoice_id));
}

#[tokio::test]
async fn unknown_package_is_not_found() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse().await;
    app.services()
        .storage
        .create_policy(policy_input(&app, warehouse.id, 7))
        .await
        .unwrap();

    let err = app
        .services()
        .storage
        .calculate_charge(Uuid::new_v4(), warehouse.id, date(2025, 3, 1), date(2025, 3, 11))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}
