use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use pgweave::driver::PgDriver;
use pgweave::migrate::{self, MigrationModule, MigrationRunner};

use crate::cli::{Command, HELP};

/// Modules keyed by migration file name, supplied by the embedding binary.
pub type Registry = Vec<(String, Arc<dyn MigrationModule>)>;

fn migrations_dir() -> PathBuf {
    std::env::var("MIGRATIONS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("migrations"))
}

async fn runner(registry: Registry) -> anyhow::Result<MigrationRunner> {
    let url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let driver = PgDriver::connect(&url)
        .await
        .context("failed to connect to the database")?;

    let mut runner = MigrationRunner::new(Arc::new(driver)).directory(migrations_dir());
    if let Ok(table) = std::env::var("MIGRATIONS_TABLE") {
        runner = runner.table(table);
    }
    for (name, module) in registry {
        runner = runner.register(name, module);
    }
    Ok(runner)
}

pub async fn run(cmd: Command, registry: Registry) -> anyhow::Result<()> {
    match cmd {
        Command::Help => {
            print!("{HELP}");
            Ok(())
        }
        Command::Make(name) => {
            // Scaffolding is pure file work; no connection needed.
            let path = migrate::scaffold(&migrations_dir(), &name)?;
            println!("created {}", path.display());
            Ok(())
        }
        Command::Up => {
            let applied = runner(registry).await?.up().await?;
            if applied.is_empty() {
                println!("nothing to migrate");
            } else {
                for name in &applied {
                    println!("applied {name}");
                }
            }
            Ok(())
        }
        Command::Down => {
            let rolled = runner(registry).await?.down().await?;
            if rolled.is_empty() {
                println!("nothing to roll back");
            } else {
                for name in &rolled {
                    println!("reverted {name}");
                }
            }
            Ok(())
        }
    }
}
