//! `infinigpt check`: validate a config without joining any rooms.

use std::path::Path;

use anyhow::Result;
use infinigpt_config::{collect_redacted_paths, load_raw, prepare, validate};
use infinigpt_core::{BotError, GatewayClient};
use infinigpt_gateway::HttpGateway;
use infinigpt_security::TokenIssuer;

/// Runs every check and prints a report. Fails if any check failed.
pub async fn run(path: &Path, probe: bool) -> Result<()> {
    println!("\nChecking InfiniGPT config at {}\n", path.display());

    let raw = load_raw(path).await?;
    let masked = collect_redacted_paths(&raw);
    if !masked.is_empty() {
        println!("  Secrets present (masked in logs): {}", masked.join(", "));
    }

    let config = match prepare(raw) {
        Ok(config) => config,
        Err(e) => {
            println!("  🔴 {e}");
            anyhow::bail!("config check failed");
        }
    };
    let report = validate(&config);
    for warning in &report.warnings {
        println!("  🟡 {}: {}", warning.path, warning.message);
    }
    println!("  🟢 Config is valid");

    let issuer = match TokenIssuer::from_config(&config.jwt) {
        Ok(issuer) => issuer,
        Err(e) => {
            println!("  🔴 {e}");
            anyhow::bail!("signing key check failed");
        }
    };
    let token = issuer.issue(&config.matrix.user_id)?;
    println!("  🟢 Signing key loaded, test token minted ({} bytes)", token.len());

    if probe {
        let gateway = HttpGateway::from_config(&config.gateway)?;
        match gateway.list_models(&token).await {
            Ok(models) => {
                let names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
                println!("  🟢 Gateway lists {} models: {}", names.len(), names.join(", "));
            }
            Err(e @ BotError::Gateway(_)) => {
                println!("  🔴 {e}");
                anyhow::bail!("gateway probe failed");
            }
            Err(e) => return Err(e.into()),
        }
    }

    println!("\n✅ All checks passed.");
    Ok(())
}
