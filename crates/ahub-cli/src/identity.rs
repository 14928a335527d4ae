//! # Identity Subcommand
//!
//! Compare a resource against its recorded identity, or re-record it.

use ahub_identity::CompareError;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::CliContext;

/// Arguments for the `ahub identity` subcommand.
#[derive(Args, Debug)]
pub struct IdentityArgs {
    #[command(subcommand)]
    pub command: IdentityCommand,
}

#[derive(Subcommand, Debug)]
pub enum IdentityCommand {
    /// Check whether a resource still matches its recorded hash.
    Compare {
        /// Resource ref, e.g. `/resources/textures/rock.png`.
        #[arg(value_name = "REF")]
        reference: String,
    },
    /// Hash a resource and rewrite its identity sidecar.
    Refresh {
        #[arg(value_name = "REF")]
        reference: String,
    },
}

/// Execute the identity subcommand.
///
/// Returns exit code: 0 when the resource matches (or was refreshed), 1 when
/// it changed, 2 when the identity or the resource is missing.
pub async fn run_identity(args: &IdentityArgs, ctx: &CliContext) -> Result<u8> {
    let store = ctx.graph.identity();
    match &args.command {
        IdentityCommand::Compare { reference } => match store.compare(reference).await {
            Ok(same) => {
                report(ctx, reference, if same { "UNCHANGED" } else { "CHANGED" }, None)?;
                Ok(u8::from(!same))
            }
            Err(CompareError::Store(e)) => {
                Err(e).with_context(|| format!("failed to compare {reference}"))
            }
            Err(e) => {
                let status = match e.code() {
                    CompareError::NO_IDENTITY => "NO_IDENTITY",
                    _ => "NO_RESOURCE",
                };
                report(ctx, reference, status, None)?;
                Ok(2)
            }
        },
        IdentityCommand::Refresh { reference } => {
            let (hash, _write) = store
                .refresh(reference)
                .await
                .with_context(|| format!("failed to refresh {reference}"))?;
            report(ctx, reference, "RECORDED", Some(&hash.to_hex()))?;
            Ok(0)
        }
    }
}

fn report(ctx: &CliContext, reference: &str, status: &str, hash: Option<&str>) -> Result<()> {
    if ctx.json {
        let mut value = serde_json::json!({ "ref": reference, "status": status });
        if let Some(hash) = hash {
            value["hash"] = serde_json::Value::from(hash);
        }
        ctx.print_json(&value)
    } else {
        match hash {
            Some(hash) => println!("{status}: {reference} {hash}"),
            None => println!("{status}: {reference}"),
        }
        Ok(())
    }
}
