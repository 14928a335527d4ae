//! # Equivalent Subcommand
//!
//! Reports asset and resource refs whose names collide on a
//! case-insensitive filesystem.

use std::collections::BTreeSet;

use ahub_graph::are_equivalent_refs;
use anyhow::{Context, Result};
use clap::Args;

use crate::CliContext;

/// Arguments for the `ahub equivalent` subcommand.
#[derive(Args, Debug)]
pub struct EquivalentArgs {
    /// Namespace whose assets (and their dependencies) are checked.
    #[arg(value_name = "NAMESPACE", default_value = "/assets/")]
    pub namespace: String,
}

/// Execute the equivalent subcommand.
///
/// Returns exit code: 0 when nothing collides, 1 otherwise.
pub async fn run_equivalent(args: &EquivalentArgs, ctx: &CliContext) -> Result<u8> {
    let assets = ctx
        .graph
        .list_all(&args.namespace)
        .await
        .with_context(|| format!("failed to list {}", args.namespace))?;
    let mut candidates: BTreeSet<String> = BTreeSet::new();
    for asset in &assets {
        candidates.insert(asset.meta.reference.clone());
        candidates.extend(asset.references().map(str::to_string));
    }
    let candidates: Vec<String> = candidates.into_iter().collect();
    let collisions = are_equivalent_refs(&candidates);

    if ctx.json {
        ctx.print_json(&serde_json::json!({ "collisions": collisions }))?;
    } else if collisions.is_empty() {
        println!("No case collisions among {} refs", candidates.len());
    } else {
        for reference in &collisions {
            println!("  COLLIDES: {reference}");
        }
    }
    Ok(u8::from(!collisions.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use ahub_core::AssetDraft;

    #[tokio::test]
    async fn clean_tree_exits_zero() {
        let (_dir, ctx) = testing::context(false).await;
        let args = EquivalentArgs {
            namespace: "/assets/".into(),
        };
        assert_eq!(run_equivalent(&args, &ctx).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn case_variant_exits_one() {
        let (_dir, ctx) = testing::context(false).await;
        ctx.graph
            .create("/assets/other/Rock.mesh", AssetDraft::default())
            .await
            .unwrap();
        let args = EquivalentArgs {
            namespace: "/assets/".into(),
        };
        assert_eq!(run_equivalent(&args, &ctx).await.unwrap(), 1);
    }
}
