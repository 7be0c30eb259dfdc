#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Make(String),
    Up,
    Down,
}

pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter().skip(1);
    let Some(first) = it.next() else {
        return Ok(Command::Help);
    };

    match first.as_str() {
        "--help" | "-h" | "help" => Ok(Command::Help),
        "migrate:make" => {
            let name = it
                .next()
                .ok_or_else(|| anyhow::anyhow!("migrate:make requires a migration name"))?;
            Ok(Command::Make(name.clone()))
        }
        "migrate:up" => Ok(Command::Up),
        "migrate:down" => Ok(Command::Down),
        other => anyhow::bail!("unknown command: {other} (try --help)"),
    }
}

pub const HELP: &str = "\
pgweave migration runner

USAGE:
    pgweave <command>

COMMANDS:
    migrate:make <name>    scaffold a new migration file
    migrate:up             apply all pending migrations as one batch
    migrate:down           roll back the latest batch

ENVIRONMENT:
    DATABASE_URL           PostgreSQL connection string (up/down)
    MIGRATIONS_DIR         migrations directory (default: migrations)
    MIGRATIONS_TABLE       tracking table name (default: migrations)
";
