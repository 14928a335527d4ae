//! # Validate Subcommand
//!
//! Runs full or bare validation over a namespace and prints one record per
//! asset examined.

use ahub_graph::{ValidationMode, ValidationRecord};
use anyhow::{Context, Result};
use clap::Args;

use crate::CliContext;

/// Arguments for the `ahub validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Check dependency existence only, without recursing into asset
    /// dependencies.
    #[arg(long)]
    pub bare: bool,

    /// Namespace to validate.
    #[arg(value_name = "NAMESPACE", default_value = "/assets/")]
    pub namespace: String,
}

/// Execute the validate subcommand.
///
/// Returns exit code: 0 when every record is VALID, 1 otherwise.
pub async fn run_validate(args: &ValidateArgs, ctx: &CliContext) -> Result<u8> {
    let mode = if args.bare {
        ValidationMode::Bare
    } else {
        ValidationMode::Full
    };
    let records = ctx
        .graph
        .validate_namespace(&args.namespace, mode)
        .await
        .with_context(|| format!("failed to validate {}", args.namespace))?;

    if ctx.json {
        ctx.print_json(&serde_json::to_value(&records)?)?;
    } else {
        print_records(&records);
    }

    let invalid = records.iter().filter(|r| !r.is_valid()).count();
    tracing::info!(total = records.len(), invalid, "validation finished");
    Ok(u8::from(invalid > 0))
}

fn print_records(records: &[ValidationRecord]) {
    for record in records {
        match &record.error {
            Some(error) => println!("  FAIL: {} ({}) {error}", record.reference, record.version),
            None => println!("  OK:   {} ({})", record.reference, record.version),
        }
    }
    let passed = records.iter().filter(|r| r.is_valid()).count();
    println!("Assets: {passed}/{} passed", records.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[tokio::test]
    async fn valid_tree_exits_zero() {
        let (_dir, ctx) = testing::context(false).await;
        let args = ValidateArgs {
            bare: false,
            namespace: "/assets/".into(),
        };
        assert_eq!(run_validate(&args, &ctx).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_dependency_exits_one() {
        let (dir, ctx) = testing::context(true).await;
        std::fs::remove_file(dir.path().join("textures/rock.png")).unwrap();
        let args = ValidateArgs {
            bare: true,
            namespace: "/assets/props/".into(),
        };
        assert_eq!(run_validate(&args, &ctx).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn malformed_namespace_is_an_error() {
        let (_dir, ctx) = testing::context(false).await;
        let args = ValidateArgs {
            bare: false,
            namespace: "/assets/props".into(),
        };
        assert!(run_validate(&args, &ctx).await.is_err());
    }
}
