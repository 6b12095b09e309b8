//! Vault accounting and ledger invariant tests against a real database

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sqlx::PgPool;
    use uuid::Uuid;

    use ridevault_server::config::FareConfig;
    use ridevault_server::error::ApiError;
    use ridevault_server::fare::VehicleClass;
    use ridevault_server::ride::{CreateRideRequest, Ride, RideService};
    use ridevault_server::routing::StaticRouteLookup;
    use ridevault_server::vault::{
        HistoryQuery, LedgerEntryKind, LedgerStatus, TransactionCategory, VaultService,
    };

    /// Helper to create a test database pool
    async fn setup_test_db() -> PgPool {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/ridevault_test".to_string());

        sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database")
    }

    /// A ride to settle against; holds require a persisted ride
    async fn create_ride(pool: &PgPool, rider_id: Uuid) -> Ride {
        let service = RideService::new(
            pool.clone(),
            Arc::new(StaticRouteLookup::new()),
            FareConfig::default(),
        );
        service
            .create_ride(
                rider_id,
                CreateRideRequest {
                    pickup: "123 Main St".to_string(),
                    destination: "456 Oak Ave".to_string(),
                    vehicle_class: VehicleClass::Auto,
                    negotiated_fare: None,
                },
            )
            .await
            .expect("Ride creation should succeed")
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_deposit_credits_balance_and_ledger() {
        let pool = setup_test_db().await;
        let service = VaultService::new(pool);
        let rider_id = Uuid::new_v4();

        let vault = service.add_money(rider_id, 500, None).await.unwrap();
        assert_eq!(vault.balance, 500);
        assert_eq!(vault.hold_amount, 0);

        let vault = service
            .add_money(rider_id, 250, Some("Top up".to_string()))
            .await
            .unwrap();
        assert_eq!(vault.balance, 750);

        let history = service
            .history(rider_id, HistoryQuery::default())
            .await
            .unwrap();
        assert_eq!(history.total, 2);
        assert!(history
            .transactions
            .iter()
            .all(|t| t.entry == LedgerEntryKind::Credit
                && t.category == TransactionCategory::WalletRecharge
                && t.status == LedgerStatus::Completed));
        // Newest first
        assert_eq!(history.transactions[0].amount, 250);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_hold_rejects_insufficient_balance() {
        let pool = setup_test_db().await;
        let service = VaultService::new(pool.clone());
        let rider_id = Uuid::new_v4();
        let ride = create_ride(&pool, rider_id).await;

        service.add_money(rider_id, 50, None).await.unwrap();

        let err = service
            .hold_for_ride(rider_id, ride.id, 110)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::InsufficientBalance {
                required: 110,
                available: 50
            }
        ));

        // Balance untouched by the failed hold
        let balance = service.balance(rider_id).await.unwrap();
        assert_eq!(balance.balance, 50);
        assert_eq!(balance.hold_amount, 0);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_hold_moves_funds_out_of_spendable() {
        let pool = setup_test_db().await;
        let service = VaultService::new(pool.clone());
        let rider_id = Uuid::new_v4();
        let ride = create_ride(&pool, rider_id).await;

        service.add_money(rider_id, 200, None).await.unwrap();
        let vault = service
            .hold_for_ride(rider_id, ride.id, 110)
            .await
            .unwrap();

        assert_eq!(vault.balance, 90);
        assert_eq!(vault.hold_amount, 110);

        let balance = service.balance(rider_id).await.unwrap();
        assert_eq!(balance.available_balance, 90);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_release_settles_once() {
        let pool = setup_test_db().await;
        let service = VaultService::new(pool.clone());
        let rider_id = Uuid::new_v4();
        let ride = create_ride(&pool, rider_id).await;

        service.add_money(rider_id, 200, None).await.unwrap();
        service
            .hold_for_ride(rider_id, ride.id, 110)
            .await
            .unwrap();

        let vault = service.release_to_captain(ride.id).await.unwrap();
        assert_eq!(vault.balance, 90);
        assert_eq!(vault.hold_amount, 0);

        // The hold entry stays as written; settlement is its own entry
        let history = service
            .history(rider_id, HistoryQuery::default())
            .await
            .unwrap();
        let hold = history
            .transactions
            .iter()
            .find(|t| t.entry == LedgerEntryKind::Hold)
            .unwrap();
        assert_eq!(hold.status, LedgerStatus::Pending);
        assert!(history
            .transactions
            .iter()
            .any(|t| t.entry == LedgerEntryKind::Release
                && t.category == TransactionCategory::DriverPayment));

        // Second settlement attempt conflicts
        let err = service.release_to_captain(ride.id).await.unwrap_err();
        assert!(matches!(err, ApiError::StateConflict(_)));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_refund_restores_balance() {
        let pool = setup_test_db().await;
        let service = VaultService::new(pool.clone());
        let rider_id = Uuid::new_v4();
        let ride = create_ride(&pool, rider_id).await;

        service.add_money(rider_id, 200, None).await.unwrap();
        service
            .hold_for_ride(rider_id, ride.id, 110)
            .await
            .unwrap();

        let vault = service.refund_cancelled(ride.id).await.unwrap();
        assert_eq!(vault.balance, 200);
        assert_eq!(vault.hold_amount, 0);

        // Refund closes the hold; a later release must not pay out too
        let err = service.release_to_captain(ride.id).await.unwrap_err();
        assert!(matches!(err, ApiError::StateConflict(_)));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_release_without_hold_is_not_found() {
        let pool = setup_test_db().await;
        let service = VaultService::new(pool.clone());
        let rider_id = Uuid::new_v4();
        let ride = create_ride(&pool, rider_id).await;

        let err = service.release_to_captain(ride.id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_history_filters_and_pagination() {
        let pool = setup_test_db().await;
        let service = VaultService::new(pool.clone());
        let rider_id = Uuid::new_v4();
        let ride = create_ride(&pool, rider_id).await;

        service.add_money(rider_id, 300, None).await.unwrap();
        service.add_money(rider_id, 100, None).await.unwrap();
        service
            .hold_for_ride(rider_id, ride.id, 110)
            .await
            .unwrap();

        let recharges = service
            .history(
                rider_id,
                HistoryQuery {
                    category: Some(TransactionCategory::WalletRecharge),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(recharges.total, 2);

        let page = service
            .history(
                rider_id,
                HistoryQuery {
                    limit: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.transactions.len(), 2);
        assert_eq!(page.total, 3);
        assert!(page.has_more);

        let rest = service
            .history(
                rider_id,
                HistoryQuery {
                    limit: Some(2),
                    skip: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(rest.transactions.len(), 1);
        assert!(!rest.has_more);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_transaction_lookup_is_owner_scoped() {
        let pool = setup_test_db().await;
        let service = VaultService::new(pool);
        let rider_id = Uuid::new_v4();

        service.add_money(rider_id, 100, None).await.unwrap();
        let history = service
            .history(rider_id, HistoryQuery::default())
            .await
            .unwrap();
        let entry_id = history.transactions[0].id;

        let entry = service.transaction(rider_id, entry_id).await.unwrap();
        assert_eq!(entry.amount, 100);

        // Another rider cannot see it
        let err = service
            .transaction(Uuid::new_v4(), entry_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_stats_aggregate_by_category() {
        let pool = setup_test_db().await;
        let service = VaultService::new(pool.clone());
        let rider_id = Uuid::new_v4();
        let ride = create_ride(&pool, rider_id).await;

        service.add_money(rider_id, 300, None).await.unwrap();
        service.add_money(rider_id, 200, None).await.unwrap();
        service
            .hold_for_ride(rider_id, ride.id, 110)
            .await
            .unwrap();

        let stats = service.stats(rider_id).await.unwrap();

        let recharge = stats
            .by_category
            .iter()
            .find(|s| s.category == TransactionCategory::WalletRecharge)
            .unwrap();
        assert_eq!(recharge.total, 500);
        assert_eq!(recharge.count, 2);

        assert!(!stats.monthly.is_empty());
        assert_eq!(stats.monthly[0].count, 3);
    }

    #[tokio::test]
    async fn test_amount_validation_rejects_non_positive() {
        // Validation happens before any database access, so a lazily
        // connecting pool is never touched
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/unused")
            .expect("lazy pool");
        let service = VaultService::new(pool);

        let err = service.add_money(Uuid::new_v4(), 0, None).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let err = service
            .hold_for_ride(Uuid::new_v4(), Uuid::new_v4(), -5)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
