//! End-to-end CLI integration tests: wire up a real (temp-dir) `Context`
//! through `avesa::wiring::build` and drive it through the command
//! handlers the same way `main.rs` does, rather than unit-testing each
//! handler against a mock.

use avesa::commands::service::{self, ServiceAction, ServiceArgs};
use avesa::commands::tenant::{self, TenantAction, TenantArgs};
use avesa::commands::{run, RunArgs};
use avesa::config::AppConfig;
use avesa::wiring;
use avesa_observability::UnifiedLogger;
use std::sync::Arc;

fn test_config(tmp: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.state_store_endpoint = tmp.join("state.db").to_string_lossy().to_string();
    config.blob_store_endpoint = tmp.join("blobs").to_string_lossy().to_string();
    config.secret_store_endpoint = tmp.join("does-not-exist-secrets.json").to_string_lossy().to_string();
    config.mapping_dir = tmp.join("no-mappings");
    config
}

#[tokio::test]
async fn tenant_add_then_list_round_trips() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let built = wiring::build(&config, Arc::new(UnifiedLogger::disabled())).await.unwrap();

    let code = tenant::run(
        TenantArgs { action: TenantAction::Add { id: "acme".to_string(), name: "Acme Corp".to_string() } },
        &built,
    )
    .await
    .unwrap();
    assert_eq!(code, 0);

    let tenants = built.ctx.state.get_tenants().await.unwrap();
    assert_eq!(tenants.len(), 1);
    assert_eq!(tenants[0].tenant_id, "acme");

    let code = tenant::run(TenantArgs { action: TenantAction::List }, &built).await.unwrap();
    assert_eq!(code, 0);
}

#[tokio::test]
async fn service_add_then_disable() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let built = wiring::build(&config, Arc::new(UnifiedLogger::disabled())).await.unwrap();

    tenant::run(TenantArgs { action: TenantAction::Add { id: "acme".to_string(), name: "Acme Corp".to_string() } }, &built)
        .await
        .unwrap();

    let code = service::run(
        ServiceArgs {
            action: ServiceAction::Add {
                tenant: "acme".to_string(),
                service: "connectwise".to_string(),
                credentials_ref: "acme-cw-token".to_string(),
                endpoint_overrides: vec![],
            },
        },
        &built,
    )
    .await
    .unwrap();
    assert_eq!(code, 0);

    let config_row = built.ctx.state.get_service_config("acme", "connectwise").await.unwrap();
    assert!(config_row.enabled);

    let code = service::run(
        ServiceArgs { action: ServiceAction::Disable { tenant: "acme".to_string(), service: "connectwise".to_string() } },
        &built,
    )
    .await
    .unwrap();
    assert_eq!(code, 0);

    let config_row = built.ctx.state.get_service_config("acme", "connectwise").await.unwrap();
    assert!(!config_row.enabled);
}

#[tokio::test]
async fn run_with_no_tenants_exits_success() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let built = wiring::build(&config, Arc::new(UnifiedLogger::disabled())).await.unwrap();

    let code = run::run(RunArgs { tenants: vec![], table: None, force_full_sync: false, run_kind: run::RunKindArg::Manual }, &built)
        .await
        .unwrap();
    assert_eq!(code, 0);
}

#[tokio::test]
async fn run_fails_fast_for_an_unknown_tenant_service() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let built = wiring::build(&config, Arc::new(UnifiedLogger::disabled())).await.unwrap();

    built
        .ctx
        .state
        .create_tenant(avesa_core::Tenant {
            tenant_id: "acme".to_string(),
            company_name: "Acme Corp".to_string(),
            created_at: chrono::Utc::now(),
            deleted_at: None,
        })
        .await
        .unwrap();
    built
        .ctx
        .state
        .upsert_service_config(avesa_core::ServiceConfig {
            tenant_id: "acme".to_string(),
            service_name: "unregistered-service".to_string(),
            enabled: true,
            credentials_ref: "ref".to_string(),
            endpoint_overrides: Default::default(),
        })
        .await
        .unwrap();

    let err = run::run(RunArgs { tenants: vec![], table: None, force_full_sync: false, run_kind: run::RunKindArg::Manual }, &built)
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), 2);
}
