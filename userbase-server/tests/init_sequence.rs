//! Startup sequence tests against the mock connector

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use userbase_server::db::{
    Connector, ConnectorStep, InitOptions, InitStage, Initializer, MockConnector, MockDatabase,
};
use userbase_server::{DatabaseConfig, DbError, DbResult};

const URL: &str = "postgres://userbase:secret@db:5432/userbase";

fn config() -> DbResult<DatabaseConfig> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    DatabaseConfig::with_url(URL)
}

#[tokio::test]
async fn runs_steps_in_order() {
    let connector = Arc::new(MockConnector::new(MockDatabase::new()));

    let ctx = Initializer::new(Arc::clone(&connector))
        .run_with(config)
        .await
        .unwrap();

    assert_eq!(
        connector.calls(),
        vec![
            ConnectorStep::Open,
            ConnectorStep::Ping,
            ConnectorStep::MigrateDown,
            ConnectorStep::MigrateUp,
        ]
    );
    assert_eq!(connector.connection_string().as_deref(), Some(URL));
    ctx.db().ping().await.unwrap();
}

#[tokio::test]
async fn missing_url_fails_before_any_call() {
    let connector = Arc::new(MockConnector::new(MockDatabase::new()));

    let err = Initializer::new(Arc::clone(&connector))
        .run_with(|| DatabaseConfig::from_lookup(|_| None))
        .await
        .unwrap_err();

    assert_eq!(err.stage, InitStage::Unstarted);
    assert!(matches!(err.source, DbError::Config { .. }));
    assert!(connector.calls().is_empty());
}

#[tokio::test]
async fn open_failure_stops_at_config_loaded() {
    let connector = Arc::new(
        MockConnector::new(MockDatabase::new())
            .fail_at(ConnectorStep::Open, DbError::connection("connection refused")),
    );

    let err = Initializer::new(Arc::clone(&connector))
        .run_with(config)
        .await
        .unwrap_err();

    assert_eq!(err.stage, InitStage::ConfigLoaded);
    assert!(err.source.is_connection_error());
    assert_eq!(connector.calls(), vec![ConnectorStep::Open]);
}

#[tokio::test]
async fn ping_failure_skips_migrations_and_closes_handle() {
    let db = MockDatabase::new();
    let connector = Arc::new(
        MockConnector::new(db.clone())
            .fail_at(ConnectorStep::Ping, DbError::connection("no route to host")),
    );

    let err = Initializer::new(Arc::clone(&connector))
        .run_with(config)
        .await
        .unwrap_err();

    assert_eq!(err.stage, InitStage::Opened);
    assert_eq!(
        connector.calls(),
        vec![ConnectorStep::Open, ConnectorStep::Ping]
    );
    assert!(db.is_closed());
}

#[tokio::test]
async fn migrate_up_failure_after_migrate_down() {
    let db = MockDatabase::new();
    let connector = Arc::new(MockConnector::new(db.clone()).fail_at(
        ConnectorStep::MigrateUp,
        DbError::migration("syntax error at or near \"CREAT\""),
    ));

    let err = Initializer::new(Arc::clone(&connector))
        .run_with(config)
        .await
        .unwrap_err();

    assert_eq!(err.stage, InitStage::MigratedDown);
    assert!(err.source.is_migration_error());
    assert_eq!(
        connector.calls(),
        vec![
            ConnectorStep::Open,
            ConnectorStep::Ping,
            ConnectorStep::MigrateDown,
            ConnectorStep::MigrateUp,
        ]
    );
    assert!(db.is_closed());
}

#[tokio::test(start_paused = true)]
async fn ping_retried_with_backoff() {
    let connector = Arc::new(
        MockConnector::new(MockDatabase::new())
            .fail_at(ConnectorStep::Ping, DbError::connection("starting up")),
    );
    let options = InitOptions {
        ping_attempts: 3,
        ..InitOptions::default()
    };

    Initializer::new(Arc::clone(&connector))
        .with_options(options)
        .run_with(config)
        .await
        .unwrap();

    assert_eq!(
        connector.calls(),
        vec![
            ConnectorStep::Open,
            ConnectorStep::Ping,
            ConnectorStep::Ping,
            ConnectorStep::MigrateDown,
            ConnectorStep::MigrateUp,
        ]
    );
}

#[tokio::test]
async fn single_attempt_does_not_retry() {
    let connector = Arc::new(
        MockConnector::new(MockDatabase::new())
            .fail_at(ConnectorStep::Ping, DbError::connection("starting up")),
    );

    let err = Initializer::new(Arc::clone(&connector))
        .run_with(config)
        .await
        .unwrap_err();

    assert_eq!(err.stage, InitStage::Opened);
    assert_eq!(
        connector.calls(),
        vec![ConnectorStep::Open, ConnectorStep::Ping]
    );
}

/// Connector whose ping never answers
struct HangingConnector {
    db: MockDatabase,
}

#[async_trait]
impl Connector for HangingConnector {
    type Handle = MockDatabase;

    async fn open(&self, _connection_string: &str) -> DbResult<MockDatabase> {
        Ok(self.db.clone())
    }

    async fn ping(&self, _handle: &MockDatabase) -> DbResult<()> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }

    async fn migrate_down(&self, _handle: &MockDatabase) -> DbResult<()> {
        Ok(())
    }

    async fn migrate_up(&self, _handle: &MockDatabase) -> DbResult<()> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn hung_step_times_out() {
    let db = MockDatabase::new();
    let options = InitOptions {
        step_timeout: Duration::from_secs(5),
        ..InitOptions::default()
    };

    let err = Initializer::new(HangingConnector { db: db.clone() })
        .with_options(options)
        .run_with(config)
        .await
        .unwrap_err();

    assert_eq!(err.stage, InitStage::Opened);
    assert!(matches!(
        err.source,
        DbError::Timeout {
            operation: "ping",
            ..
        }
    ));
    assert_eq!(err.source.to_string(), "ping timed out after 5s");
    assert!(db.is_closed());
}
