//! Thin CLI front-end for the pgweave migration runner.
//!
//! The shipped binary handles `migrate:make` and `--help` standalone;
//! applications embed their migration registry via [`run_with_registry`]
//! to get working `migrate:up` / `migrate:down` commands.

mod cli;
mod migrate_cmd;

pub use cli::{Command, parse_args};
pub use migrate_cmd::Registry;

/// Run the CLI with an empty migration registry.
pub async fn run(args: Vec<String>) -> anyhow::Result<()> {
    run_with_registry(args, Vec::new()).await
}

/// Run the CLI with the embedding application's migration registry.
pub async fn run_with_registry(args: Vec<String>, registry: Registry) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cmd = parse_args(&args)?;
    migrate_cmd::run(cmd, registry).await
}
