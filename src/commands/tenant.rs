/*!
 * `avesa tenant add` (`spec` §6): onboard a new tenant into the State
 * Store. Idempotent in spirit but not in mechanism — a second `add` with
 * the same id is rejected by the backend's primary key, which the caller
 * sees as a `StateError::Conflict`.
 */

use crate::error::Result;
use crate::wiring::Wiring;
use avesa_core::Tenant;
use clap::{Args, Subcommand};
use console::style;

#[derive(Args, Debug)]
pub struct TenantArgs {
    #[command(subcommand)]
    pub action: TenantAction,
}

#[derive(Subcommand, Debug)]
pub enum TenantAction {
    /// Register a new tenant.
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
    },
    /// List every known tenant.
    List,
}

pub async fn run(args: TenantArgs, wiring: &Wiring) -> Result<i32> {
    match args.action {
        TenantAction::Add { id, name } => {
            wiring
                .ctx
                .state
                .create_tenant(Tenant {
                    tenant_id: id.clone(),
                    company_name: name,
                    created_at: chrono::Utc::now(),
                    deleted_at: None,
                })
                .await?;
            println!("{} tenant {} created", style("✓").green().bold(), style(&id).cyan());
            Ok(0)
        }
        TenantAction::List => {
            let tenants = wiring.ctx.state.get_tenants().await?;
            let mut table = comfy_table::Table::new();
            table.set_header(vec!["tenant_id", "company_name", "deleted"]);
            for tenant in &tenants {
                table.add_row(vec![
                    tenant.tenant_id.clone(),
                    tenant.company_name.clone(),
                    tenant.deleted_at.is_some().to_string(),
                ]);
            }
            println!("{table}");
            Ok(0)
        }
    }
}
