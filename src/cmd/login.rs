use crate::cmd::progress;
use crate::config::{AuthType, ConfigManager, TenantConfig};
use crate::error::Result;
use crate::graph::auth::GraphAuth;
use clap::Args;
use colored::Colorize;
use dialoguer::Password;
use std::io::IsTerminal;

/// Safely truncate a string to n characters (not bytes) to prevent panics on non-ASCII
fn truncate_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Tenant name; checks tenants.toml, then tenants.env, then {name}.env
    #[arg(index = 1)]
    name: Option<String>,

    /// Tenant name (alias for the positional argument)
    #[arg(short, long)]
    tenant: Option<String>,

    /// Prompt for the client secret instead of reading it from the environment
    #[arg(long)]
    prompt_secret: bool,
}

#[derive(Args, Debug)]
pub struct LogoutArgs {
    /// Tenant name
    #[arg(short, long)]
    tenant: Option<String>,

    /// Logout from all tenants
    #[arg(long)]
    all: bool,
}

/// Ask for a client secret when none is configured and a terminal is attached.
/// The secret is only used for this run.
pub fn prompt_secret_if_needed(tenant: &mut TenantConfig, force: bool) -> Result<()> {
    if tenant.auth_type != AuthType::ClientSecret {
        return Ok(());
    }

    let missing = tenant.resolve_client_secret().is_none();
    if force || (missing && std::io::stdin().is_terminal()) {
        let secret = Password::new()
            .with_prompt(format!("Client secret for '{}'", tenant.name))
            .interact()?;
        tenant.client_secret = Some(secret);
    }

    Ok(())
}

pub async fn login(args: LoginArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let auth = GraphAuth::new(config_manager.clone());

    let tenant_name = args.name.as_deref().or(args.tenant.as_deref());
    let mut tenant = config_manager.resolve_tenant(tenant_name)?;

    println!(
        "{} Loaded tenant: {} ({})",
        "✓".green(),
        tenant.name.bold(),
        tenant.description.as_deref().unwrap_or("")
    );
    println!("  Tenant ID: {}...", truncate_chars(&tenant.tenant_id, 8));
    println!("  Client ID: {}...", truncate_chars(&tenant.client_id, 8));
    println!("  Auth: {}", tenant.auth_type);

    prompt_secret_if_needed(&mut tenant, args.prompt_secret)?;

    let spinner = progress::create_spinner(&format!("Authenticating to {}...", tenant.name));
    match auth.login(&tenant).await {
        Ok(token) => {
            progress::finish_spinner_success(&spinner, "Authenticated");
            config_manager.set_active_tenant(&tenant.name)?;

            println!(
                "  Token valid until {}",
                token.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            println!("\n{} Active tenant: {}", "→".cyan(), tenant.name.bold());
            Ok(())
        }
        Err(e) => {
            progress::finish_spinner_error(&spinner, "Authentication failed");
            Err(e)
        }
    }
}

pub async fn logout(args: LogoutArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let auth = GraphAuth::new(config_manager.clone());

    if args.all {
        let tenants = config_manager.load_tenants()?;

        for tenant in &tenants {
            auth.logout(&tenant.name)?;
        }

        println!("{} Logged out from all tenants", "✓".green());
    } else if let Some(tenant_name) = &args.tenant {
        auth.logout(tenant_name)?;
        println!("{} Logged out from '{}'", "✓".green(), tenant_name);
    } else {
        let settings = config_manager.load_settings()?;

        if let Some(current_tenant) = settings.current_tenant {
            auth.logout(&current_tenant)?;
            println!("{} Logged out from '{}'", "✓".green(), current_tenant);
        } else {
            println!("{} No active tenant", "!".yellow());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("c59151ed-4414", 8), "c59151ed");
        assert_eq!(truncate_chars("äöü", 2), "äö");
        assert_eq!(truncate_chars("ab", 8), "ab");
    }

    #[test]
    fn test_certificate_tenant_is_never_prompted() {
        let mut tenant = TenantConfig {
            name: "contoso".into(),
            tenant_id: "contoso.onmicrosoft.com".into(),
            client_id: "3c54f805-db0a-4f83-be24-6744ab9fd758".into(),
            auth_type: AuthType::Certificate,
            client_secret: None,
            certificate_thumbprint: Some("A".repeat(40)),
            certificate_key_path: Some("key.pem".into()),
            description: None,
        };
        prompt_secret_if_needed(&mut tenant, true).unwrap();
        assert!(tenant.client_secret.is_none());
    }
}
