/*!
 * `avesa service add` (`spec` §6): enable one external service for one
 * tenant, pointing it at a `SecretStore` credentials ref and optionally
 * overriding individual endpoint paths.
 */

use crate::error::Result;
use crate::wiring::Wiring;
use avesa_core::ServiceConfig;
use clap::{Args, Subcommand};
use console::style;
use std::collections::BTreeMap;

#[derive(Args, Debug)]
pub struct ServiceArgs {
    #[command(subcommand)]
    pub action: ServiceAction,
}

#[derive(Subcommand, Debug)]
pub enum ServiceAction {
    /// Enable a service for a tenant.
    Add {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        service: String,
        #[arg(long = "credentials-ref")]
        credentials_ref: String,
        /// Repeatable `endpoint_path=override_path` pair.
        #[arg(long = "endpoint-override", value_parser = parse_override)]
        endpoint_overrides: Vec<(String, String)>,
    },
    /// Disable a previously-enabled service without deleting its config.
    Disable {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        service: String,
    },
}

fn parse_override(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}

pub async fn run(args: ServiceArgs, wiring: &Wiring) -> Result<i32> {
    match args.action {
        ServiceAction::Add { tenant, service, credentials_ref, endpoint_overrides } => {
            wiring
                .ctx
                .state
                .upsert_service_config(ServiceConfig {
                    tenant_id: tenant.clone(),
                    service_name: service.clone(),
                    enabled: true,
                    credentials_ref,
                    endpoint_overrides: endpoint_overrides.into_iter().collect::<BTreeMap<_, _>>(),
                })
                .await?;
            println!(
                "{} {} enabled for tenant {}",
                style("✓").green().bold(),
                style(&service).cyan(),
                style(&tenant).cyan()
            );
            Ok(0)
        }
        ServiceAction::Disable { tenant, service } => {
            let mut config = wiring.ctx.state.get_service_config(&tenant, &service).await?;
            config.enabled = false;
            wiring.ctx.state.upsert_service_config(config).await?;
            println!("{} {} disabled for tenant {}", style("✓").green().bold(), style(&service).cyan(), style(&tenant).cyan());
            Ok(0)
        }
    }
}

