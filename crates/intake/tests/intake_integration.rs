//! End-to-end tests for the intake service against the in-memory store.

use std::sync::Arc;

use domain::{ErrorKind, OrderSubmission, SubmittedCustomer};
use intake::{
    InMemoryDispatcher, IntakeConfig, IntakeError, IntakeService, NotificationKind, OutcomeKind,
    SubmissionKind,
};
use order_store::{
    CatalogItem, CustomerStore, EmailAddress, ErrorLog, ErrorSeverity, InMemoryStore, LineItem,
    OrderStatus, OrderStore, StoreError,
};

struct Harness {
    store: Arc<InMemoryStore>,
    dispatcher: InMemoryDispatcher,
    service: IntakeService<InMemoryStore>,
}

async fn harness(catalog: Vec<CatalogItem>) -> Harness {
    let store = Arc::new(InMemoryStore::with_catalog(catalog).await);
    let dispatcher = InMemoryDispatcher::new();
    let service = IntakeService::new(store.clone(), IntakeConfig::default())
        .with_dispatcher(Arc::new(dispatcher.clone()));
    Harness {
        store,
        dispatcher,
        service,
    }
}

async fn default_harness() -> Harness {
    harness(vec![
        CatalogItem::new("iPhone 15", 5),
        CatalogItem::new("MacBook Pro", 1),
        CatalogItem::new("AirPods", 10),
    ])
    .await
}

fn customer(email: &str) -> SubmittedCustomer {
    SubmittedCustomer::new("Ada Lovelace", email, "555-0100", "12 Analytical St")
}

fn submission(email: &str, time: &str) -> OrderSubmission {
    OrderSubmission::new(email, "2024-03-01", time).with_customer(customer(email))
}

fn email(s: &str) -> EmailAddress {
    EmailAddress::parse(s).unwrap()
}

mod create {
    use super::*;

    #[tokio::test]
    async fn test_misspelled_product_reserves_then_duplicate_is_caught() {
        let h = default_harness().await;

        let first = h
            .service
            .process_submission(submission("ada@x.com", "10:00:00").with_line("ifone 15", 2))
            .await
            .unwrap();
        assert_eq!(first.kind, OutcomeKind::Created);
        assert_eq!(first.status, Some(OrderStatus::PendingFulfillment));
        let order_id = first.order_id.unwrap();
        assert_eq!(
            first.tracking_link.as_deref(),
            Some(format!("http://localhost:3000/track-order/{order_id}").as_str())
        );
        assert_eq!(h.store.catalog_snapshot().await["iPhone 15"], 3);

        let order = h.store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.line_items, vec![LineItem::new("iPhone 15", 2)]);

        let second = h
            .service
            .process_submission(submission("ada@x.com", "10:00:30").with_line("ifone 15", 2))
            .await
            .unwrap();
        assert_eq!(second.kind, OutcomeKind::Duplicate);
        assert_eq!(second.order_id, Some(order_id));
        assert_eq!(second.error_kind, Some(ErrorKind::DuplicateSubmission));
        assert_eq!(h.store.catalog_snapshot().await["iPhone 15"], 3);
        assert_eq!(h.store.order_count().await, 1);

        let errors = h.store.recent_errors(10).await.unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].severity, ErrorSeverity::Medium);
        assert_eq!(errors[0].order_id, Some(order_id));
    }

    #[tokio::test]
    async fn test_short_stock_creates_pending_inventory_without_reserving() {
        let h = default_harness().await;

        let outcome = h
            .service
            .process_submission(submission("ada@x.com", "10:00:00").with_line("MacBook Pro", 2))
            .await
            .unwrap();

        assert_eq!(outcome.kind, OutcomeKind::Created);
        assert_eq!(outcome.status, Some(OrderStatus::PendingInventory));
        assert_eq!(h.store.catalog_snapshot().await["MacBook Pro"], 1);

        let sent = h.dispatcher.sent_to("ada@x.com").await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::NeedsInfo);
    }

    #[tokio::test]
    async fn test_empty_order_rejected_without_mutation() {
        let h = default_harness().await;

        let outcome = h
            .service
            .process_submission(submission("ada@x.com", "10:00:00"))
            .await
            .unwrap();

        assert_eq!(outcome.kind, OutcomeKind::Rejected);
        assert_eq!(outcome.error_kind, Some(ErrorKind::EmptyOrder));
        assert_eq!(h.store.order_count().await, 0);
        assert_eq!(h.store.customer_count().await, 0);
        assert_eq!(h.store.catalog_snapshot().await["iPhone 15"], 5);
    }

    #[tokio::test]
    async fn test_unknown_product_rejected() {
        let h = default_harness().await;

        let outcome = h
            .service
            .process_submission(
                submission("ada@x.com", "10:00:00")
                    .with_line("AirPods", 1)
                    .with_line("Zune", 1),
            )
            .await
            .unwrap();

        assert_eq!(outcome.kind, OutcomeKind::Rejected);
        assert_eq!(outcome.error_kind, Some(ErrorKind::UnknownProducts));
        assert_eq!(h.store.catalog_snapshot().await["AirPods"], 10);
    }

    #[tokio::test]
    async fn test_new_customer_missing_details_rejected() {
        let h = default_harness().await;
        let submission = OrderSubmission::new("bob@x.com", "2024-03-01", "10:00:00")
            .with_customer(SubmittedCustomer::new("Bob", "bob@x.com", "", ""))
            .with_line("AirPods", 1);

        let outcome = h.service.process_submission(submission).await.unwrap();

        assert_eq!(outcome.error_kind, Some(ErrorKind::MissingCustomerFields));
        assert!(outcome.errors.iter().any(|e| e.contains("phone")));
        assert_eq!(h.store.order_count().await, 0);
        assert_eq!(h.store.catalog_snapshot().await["AirPods"], 10);
    }

    #[tokio::test]
    async fn test_returning_customer_needs_no_details() {
        let h = default_harness().await;
        h.service
            .process_submission(submission("ada@x.com", "10:00:00").with_line("AirPods", 1))
            .await
            .unwrap();

        let bare = OrderSubmission::new("ADA@x.com", "2024-03-01", "12:00:00")
            .with_line("AirPods", 3);
        let outcome = h.service.process_submission(bare).await.unwrap();

        assert_eq!(outcome.kind, OutcomeKind::Created);
        let customer = h
            .store
            .find_customer(&email("ada@x.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(customer.past_orders.len(), 2);
        assert_eq!(h.store.customer_count().await, 1);
    }

    #[tokio::test]
    async fn test_same_lines_outside_window_are_a_new_order() {
        let h = default_harness().await;
        for time in ["10:00:00", "10:10:00"] {
            let outcome = h
                .service
                .process_submission(submission("ada@x.com", time).with_line("AirPods", 1))
                .await
                .unwrap();
            assert_eq!(outcome.kind, OutcomeKind::Created);
        }
        assert_eq!(h.store.order_count().await, 2);
        assert_eq!(h.store.catalog_snapshot().await["AirPods"], 8);
    }

    #[tokio::test]
    async fn test_resubmission_is_idempotent() {
        let h = default_harness().await;
        let doc = submission("ada@x.com", "10:00:00").with_line("AirPods", 4);

        let first = h.service.process_submission(doc.clone()).await.unwrap();
        let stock_after_first = h.store.catalog_snapshot().await;
        let second = h.service.process_submission(doc).await.unwrap();

        assert_eq!(first.kind, OutcomeKind::Created);
        assert_eq!(second.kind, OutcomeKind::Duplicate);
        assert_eq!(h.store.catalog_snapshot().await, stock_after_first);
        assert_eq!(h.store.order_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_orders_never_oversell() {
        let h = Arc::new(harness(vec![CatalogItem::new("AirPods", 3)]).await);

        let tasks = ["a@x.com", "b@x.com"].map(|to| {
            let h = h.clone();
            tokio::spawn(async move {
                h.service
                    .process_submission(submission(to, "10:00:00").with_line("AirPods", 3))
                    .await
                    .unwrap()
            })
        });
        let outcomes: Vec<_> = futures_util::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let statuses: Vec<_> = outcomes.iter().filter_map(|o| o.status).collect();
        assert_eq!(
            statuses
                .iter()
                .filter(|s| **s == OrderStatus::PendingFulfillment)
                .count(),
            1
        );
        assert_eq!(
            statuses
                .iter()
                .filter(|s| **s == OrderStatus::PendingInventory)
                .count(),
            1
        );
        assert_eq!(h.store.catalog_snapshot().await["AirPods"], 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_identical_submissions_create_once() {
        let h = Arc::new(default_harness().await);

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let h = h.clone();
                tokio::spawn(async move {
                    h.service
                        .process_submission(
                            submission("ada@x.com", "10:00:00").with_line("AirPods", 1),
                        )
                        .await
                        .unwrap()
                })
            })
            .collect();
        let outcomes: Vec<_> = futures_util::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let created = outcomes
            .iter()
            .filter(|o| o.kind == OutcomeKind::Created)
            .count();
        assert_eq!(created, 1);
        assert_eq!(h.store.order_count().await, 1);
        assert_eq!(h.store.catalog_snapshot().await["AirPods"], 9);
    }
}

mod amendments {
    use super::*;

    #[tokio::test]
    async fn test_amendment_merges_into_latest_order() {
        let h = harness(vec![
            CatalogItem::new("A", 10),
            CatalogItem::new("B", 10),
            CatalogItem::new("C", 10),
        ])
        .await;
        let created = h
            .service
            .process_submission(
                submission("ada@x.com", "10:00:00")
                    .with_line("A", 2)
                    .with_line("B", 1),
            )
            .await
            .unwrap();

        let amendment = OrderSubmission::new("ada@x.com", "2024-03-01", "11:00:00")
            .with_line("B", 0)
            .with_line("C", 3);
        let outcome = h.service.process_amendment(amendment).await.unwrap();

        assert_eq!(outcome.kind, OutcomeKind::Amended);
        assert_eq!(outcome.order_id, created.order_id);
        let order = h
            .store
            .get_order(created.order_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            order.line_items,
            vec![LineItem::new("A", 2), LineItem::new("C", 3)]
        );

        let stock = h.store.catalog_snapshot().await;
        assert_eq!(stock["A"], 8);
        assert_eq!(stock["B"], 10);
        assert_eq!(stock["C"], 7);

        let updated = h.dispatcher.sent_to("ada@x.com").await;
        assert_eq!(updated.last().unwrap().kind, NotificationKind::Updated);
    }

    #[tokio::test]
    async fn test_amendment_beyond_stock_is_rejected_with_order() {
        let h = harness(vec![CatalogItem::new("A", 3)]).await;
        let created = h
            .service
            .process_submission(submission("ada@x.com", "10:00:00").with_line("A", 2))
            .await
            .unwrap();

        let amendment =
            OrderSubmission::new("ada@x.com", "2024-03-01", "11:00:00").with_line("A", 5);
        let outcome = h.service.process_amendment(amendment).await.unwrap();

        assert_eq!(outcome.kind, OutcomeKind::Rejected);
        assert_eq!(outcome.error_kind, Some(ErrorKind::AmendmentExceedsStock));
        assert_eq!(outcome.order_id, created.order_id);
        assert_eq!(h.store.catalog_snapshot().await["A"], 1);

        let errors = h.store.recent_errors(1).await.unwrap();
        assert_eq!(errors[0].severity, ErrorSeverity::High);
    }

    #[tokio::test]
    async fn test_amendment_without_order_falls_back_to_create() {
        let h = default_harness().await;

        let outcome = h
            .service
            .process_amendment(submission("ada@x.com", "10:00:00").with_line("AirPods", 2))
            .await
            .unwrap();

        assert_eq!(outcome.kind, OutcomeKind::Created);
        assert_eq!(h.store.catalog_snapshot().await["AirPods"], 8);
    }

    #[tokio::test]
    async fn test_amendment_after_fulfillment_creates_new_order() {
        let h = default_harness().await;
        let first = h
            .service
            .process_submission(submission("ada@x.com", "10:00:00").with_line("AirPods", 1))
            .await
            .unwrap();
        h.service
            .advance(first.order_id.unwrap(), OrderStatus::Fulfilled)
            .await
            .unwrap();

        let outcome = h
            .service
            .process_amendment(
                OrderSubmission::new("ada@x.com", "2024-03-01", "11:00:00")
                    .with_line("AirPods", 2),
            )
            .await
            .unwrap();

        assert_eq!(outcome.kind, OutcomeKind::Created);
        assert_ne!(outcome.order_id, first.order_id);
        assert_eq!(h.store.order_count().await, 2);
    }

    #[tokio::test]
    async fn test_fallback_rejects_removal_lines() {
        let h = default_harness().await;

        let outcome = h
            .service
            .process_amendment(submission("ada@x.com", "10:00:00").with_line("AirPods", 0))
            .await
            .unwrap();

        assert_eq!(outcome.kind, OutcomeKind::Rejected);
        assert_eq!(outcome.error_kind, Some(ErrorKind::InvalidLineItem));
        assert_eq!(h.store.order_count().await, 0);
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_retry_reservation_after_restock() {
        use order_store::CatalogStore;

        let h = default_harness().await;
        let outcome = h
            .service
            .process_submission(submission("ada@x.com", "10:00:00").with_line("MacBook Pro", 2))
            .await
            .unwrap();
        let order_id = outcome.order_id.unwrap();

        let still_short = h.service.retry_reservation(order_id).await.unwrap();
        assert_eq!(still_short.status, OrderStatus::PendingInventory);

        h.store.restock("MacBook Pro", 1).await.unwrap();
        let reserved = h.service.retry_reservation(order_id).await.unwrap();
        assert_eq!(reserved.status, OrderStatus::PendingFulfillment);
        assert_eq!(h.store.catalog_snapshot().await["MacBook Pro"], 0);
    }

    #[tokio::test]
    async fn test_advance_rejects_backward_moves() {
        let h = default_harness().await;
        let outcome = h
            .service
            .process_submission(submission("ada@x.com", "10:00:00").with_line("AirPods", 1))
            .await
            .unwrap();
        let order_id = outcome.order_id.unwrap();

        h.service
            .advance(order_id, OrderStatus::Fulfilled)
            .await
            .unwrap();
        let result = h
            .service
            .advance(order_id, OrderStatus::PendingFulfillment)
            .await;

        assert!(matches!(result, Err(IntakeError::InvalidTransition { .. })));
    }
}

mod json {
    use super::*;

    #[tokio::test]
    async fn test_json_document_processed() {
        let h = default_harness().await;
        let doc = r#"{
            "customerEmail": "ada@x.com",
            "submittedDate": "2024-03-01",
            "submittedTime": "10:00:00",
            "customer": {
                "name": "Ada Lovelace",
                "email": "ada@x.com",
                "phone": "555-0100",
                "address": "12 Analytical St"
            },
            "orders": [{ "product": "airpods", "quantity": "2" }]
        }"#;

        let outcome = h
            .service
            .process_json(doc, SubmissionKind::New)
            .await
            .unwrap();

        assert_eq!(outcome.kind, OutcomeKind::Created);
        assert_eq!(h.store.catalog_snapshot().await["AirPods"], 8);
    }

    #[tokio::test]
    async fn test_outcome_json_shape() {
        let h = default_harness().await;
        let outcome = h
            .service
            .process_submission(submission("ada@x.com", "10:00:00").with_line("AirPods", 1))
            .await
            .unwrap();

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "Created");
        assert_eq!(json["status"], "PendingFulfillment");
        assert!(json["trackingLink"].as_str().unwrap().contains("/track-order/"));
        assert_eq!(json["notify"]["to"], "ada@x.com");
    }
}

mod failures {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_store_is_an_error_without_notification() {
        let h = default_harness().await;
        h.store.set_unavailable(true);

        let result = h
            .service
            .process_submission(submission("ada@x.com", "10:00:00").with_line("AirPods", 1))
            .await;

        assert!(matches!(
            result,
            Err(IntakeError::Store(StoreError::Unavailable(_)))
        ));
        assert!(h.dispatcher.sent().await.is_empty());

        h.store.set_unavailable(false);
        assert_eq!(h.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_timestamp_rejected() {
        let h = default_harness().await;
        let outcome = h
            .service
            .process_submission(
                OrderSubmission::new("ada@x.com", "yesterday", "10:00:00")
                    .with_customer(customer("ada@x.com"))
                    .with_line("AirPods", 1),
            )
            .await
            .unwrap();

        assert_eq!(outcome.error_kind, Some(ErrorKind::InvalidTimestamp));
        assert_eq!(h.store.catalog_snapshot().await["AirPods"], 10);
    }
}
