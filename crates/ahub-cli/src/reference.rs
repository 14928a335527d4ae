//! # Refs Subcommand
//!
//! Translate between refs and working-tree paths with the configured codec.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::CliContext;

/// Arguments for the `ahub refs` subcommand.
#[derive(Args, Debug)]
pub struct RefsArgs {
    #[command(subcommand)]
    pub command: RefsCommand,
}

#[derive(Subcommand, Debug)]
pub enum RefsCommand {
    /// Print the working-tree path of a ref.
    Encode {
        #[arg(value_name = "REF")]
        reference: String,
    },
    /// Print the ref of a working-tree path.
    Decode {
        #[arg(value_name = "PATH")]
        path: String,
    },
}

/// Execute the refs subcommand.
///
/// Returns exit code 0; a ref or path the codec rejects is an error.
pub fn run_refs(args: &RefsArgs, ctx: &CliContext) -> Result<u8> {
    let codec = ctx.graph.codec();
    let (reference, path) = match &args.command {
        RefsCommand::Encode { reference } => {
            (reference.clone(), codec.ref_to_relative_path(reference)?)
        }
        RefsCommand::Decode { path } => (codec.relative_path_to_ref(path)?, path.clone()),
    };
    if ctx.json {
        ctx.print_json(&serde_json::json!({ "ref": reference, "path": path }))?;
    } else {
        match args.command {
            RefsCommand::Encode { .. } => println!("{path}"),
            RefsCommand::Decode { .. } => println!("{reference}"),
        }
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[tokio::test]
    async fn encode_and_decode_succeed() {
        let (_dir, ctx) = testing::context(false).await;
        let encode = RefsArgs {
            command: RefsCommand::Encode {
                reference: "/assets/props/rock.mesh".into(),
            },
        };
        assert_eq!(run_refs(&encode, &ctx).unwrap(), 0);
        let decode = RefsArgs {
            command: RefsCommand::Decode {
                path: "textures/rock.png".into(),
            },
        };
        assert_eq!(run_refs(&decode, &ctx).unwrap(), 0);
    }

    #[tokio::test]
    async fn foreign_refs_are_rejected() {
        let (_dir, ctx) = testing::context(false).await;
        let encode = RefsArgs {
            command: RefsCommand::Encode {
                reference: "/elsewhere/x".into(),
            },
        };
        assert!(run_refs(&encode, &ctx).is_err());
    }
}
