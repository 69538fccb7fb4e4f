//! Host lifecycle: eager startup and bounded shutdown
//!
//! Run with: cargo test --test lifecycle

mod common;

use common::{init_tracing, CloseBehavior, MockConnection, MockFactory};
use conduit_lifecycle::{
    factory_fn, options_fn, ConnectionConfig, ConnectionError, ConnectionLifecycle,
    ConnectionRegistry, ConnectionState, Error,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_test::{assert_err, assert_ok};

fn fast(uri: &str, name: &str) -> ConnectionConfig {
    ConnectionConfig::builder(uri)
        .name(name)
        .retry_attempts(1)
        .retry_delay(Duration::ZERO)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_on_start_reports_failing_connection_by_name() {
    init_tracing();
    let factory = factory_fn(|config: ConnectionConfig| async move {
        if config.uri.contains("analytics") {
            return Err(ConnectionError::msg("connection refused"));
        }
        Ok(MockConnection::new(1))
    });
    let lifecycle = ConnectionLifecycle::builder(ConnectionRegistry::new(factory))
        .connection(fast("mongodb://localhost/app", "default"))
        .connection(fast("cassandra://localhost/analytics", "analytics"))
        .build()
        .unwrap();

    let err = assert_err!(lifecycle.on_start(&["default", "analytics"]).await);

    match err {
        Error::Startup { name, source } => {
            assert_eq!(name, "analytics");
            assert!(matches!(*source, Error::RetryExhausted { attempts: 2, .. }));
        }
        other => panic!("expected Startup, got {:?}", other),
    }
    // The healthy connection is still usable; the host decides whether to stop
    assert_eq!(
        lifecycle.registry().state("default"),
        Some(ConnectionState::Ready)
    );
    assert_eq!(
        lifecycle.registry().state("analytics"),
        Some(ConnectionState::Failed)
    );
}

#[tokio::test]
async fn test_on_start_unknown_name_is_config_error() {
    let lifecycle = ConnectionLifecycle::builder(ConnectionRegistry::new(MockFactory::healthy()))
        .connection(fast("mongodb://localhost/app", "default"))
        .build()
        .unwrap();

    let err = assert_err!(lifecycle.on_start(&["default", "reports"]).await);

    assert!(matches!(err, Error::Config(_)));
    assert_eq!(lifecycle.registry().factory().calls(), 0);
}

#[tokio::test]
async fn test_on_start_all_resolves_deferred_options() {
    let resolved = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&resolved);

    let lifecycle = ConnectionLifecycle::builder(ConnectionRegistry::new(MockFactory::healthy()))
        .connection(fast("mongodb://localhost/app", "default"))
        .connection_from(
            "oauth",
            options_fn(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    ConnectionConfig::builder("cassandra://localhost:9042/oauth")
                        .name("oauth")
                        .retry_delay(Duration::ZERO)
                        .build()
                }
            }),
        )
        .build()
        .unwrap();

    assert_ok!(lifecycle.on_start_all().await);

    assert_eq!(resolved.load(Ordering::SeqCst), 1);
    assert_eq!(
        lifecycle.registry().names(),
        vec!["default".to_string(), "oauth".to_string()]
    );
    assert_eq!(lifecycle.registry().factory().calls(), 2);
}

#[tokio::test]
async fn test_options_failure_surfaces_as_startup_error() {
    let lifecycle = ConnectionLifecycle::builder(ConnectionRegistry::new(MockFactory::healthy()))
        .connection_from(
            "oauth",
            options_fn(|| async { Err(Error::Config("secret not found".into())) }),
        )
        .build()
        .unwrap();

    let err = assert_err!(lifecycle.on_start_all().await);

    match err {
        Error::Startup { name, source } => {
            assert_eq!(name, "oauth");
            assert!(matches!(*source, Error::Config(_)));
        }
        other => panic!("expected Startup, got {:?}", other),
    }
    assert_eq!(lifecycle.registry().factory().calls(), 0);
}

#[tokio::test]
async fn test_on_stop_releases_everything() {
    init_tracing();
    let lifecycle = ConnectionLifecycle::builder(ConnectionRegistry::new(MockFactory::healthy()))
        .connection(fast("mongodb://localhost/app", "default"))
        .connection(fast("mongodb://localhost/reports", "reports"))
        .build()
        .unwrap();
    assert_ok!(lifecycle.on_start_all().await);

    let report = lifecycle.on_stop().await;

    assert!(report.is_clean());
    assert_eq!(
        report.released,
        vec!["default".to_string(), "reports".to_string()]
    );
    assert!(lifecycle.registry().names().is_empty());
    for probe in lifecycle.registry().factory().created() {
        assert!(probe.is_closed());
        assert_eq!(probe.close_calls(), 1);
    }
    assert!(lifecycle.registry().is_shut_down());
}

#[tokio::test]
async fn test_on_stop_is_bounded_by_shutdown_timeout() {
    let lifecycle = ConnectionLifecycle::builder(ConnectionRegistry::new(
        MockFactory::healthy().with_close(CloseBehavior::Hang),
    ))
    .connection(fast("mongodb://localhost/app", "default"))
    .shutdown_timeout(Duration::from_millis(50))
    .build()
    .unwrap();
    assert_ok!(lifecycle.on_start_all().await);

    let start = Instant::now();
    let report = lifecycle.on_stop().await;

    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(report.abandoned, vec!["default".to_string()]);
    assert!(!report.is_clean());
}

#[tokio::test]
async fn test_on_stop_cancels_startup_in_progress() {
    let lifecycle = ConnectionLifecycle::builder(ConnectionRegistry::new(
        MockFactory::always_failing(),
    ))
    .connection(
        ConnectionConfig::builder("mongodb://localhost/app")
            .retry_attempts(5)
            .retry_delay(Duration::from_secs(30))
            .build()
            .unwrap(),
    )
    .build()
    .unwrap();

    let (started, report) = tokio::join!(lifecycle.on_start(&["default"]), async {
        lifecycle.registry().factory().wait_for_calls(1).await;
        lifecycle.on_stop().await
    });

    match assert_err!(started) {
        Error::Startup { name, source } => {
            assert_eq!(name, "default");
            assert!(matches!(*source, Error::Cancelled));
        }
        other => panic!("expected Startup, got {:?}", other),
    }
    assert_eq!(report.pending, vec!["default".to_string()]);
    // Only the attempt made before shutdown
    assert_eq!(lifecycle.registry().factory().calls(), 1);
}

#[tokio::test]
async fn test_on_start_after_stop_is_cancelled() {
    let lifecycle = ConnectionLifecycle::builder(ConnectionRegistry::new(MockFactory::healthy()))
        .connection(fast("mongodb://localhost/app", "default"))
        .build()
        .unwrap();

    let report = lifecycle.on_stop().await;
    assert!(report.is_clean());

    let err = assert_err!(lifecycle.on_start_all().await);
    assert!(matches!(err, Error::Startup { ref source, .. } if matches!(**source, Error::Cancelled)));
    assert_eq!(lifecycle.registry().factory().calls(), 0);
}

#[tokio::test]
async fn test_on_start_prefers_fatal_failure_over_cancellation() {
    init_tracing();
    let lifecycle = ConnectionLifecycle::builder(ConnectionRegistry::new(
        MockFactory::always_failing(),
    ))
    .connection(
        ConnectionConfig::builder("mongodb://localhost/app")
            .name("primary")
            .retry_attempts(5)
            .retry_delay(Duration::from_secs(30))
            .build()
            .unwrap(),
    )
    .connection_from(
        "oauth",
        options_fn(|| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Err(Error::Config("secret not found".into()))
        }),
    )
    .build()
    .unwrap();

    let (started, ()) = tokio::join!(lifecycle.on_start(&["primary", "oauth"]), async {
        lifecycle.registry().factory().wait_for_calls(1).await;
        lifecycle.registry().shutdown();
    });

    // "primary" comes first but was only cancelled; the real failure is reported
    match assert_err!(started) {
        Error::Startup { name, source } => {
            assert_eq!(name, "oauth");
            assert!(matches!(*source, Error::Config(_)));
        }
        other => panic!("expected Startup, got {:?}", other),
    }
}
