use std::path::PathBuf;

use anyhow::{bail, Result};

#[derive(Debug, PartialEq)]
pub enum Command {
    /// List boards available in the source account.
    Boards,
    Migrate(MigrateArgs),
    Help,
}

#[derive(Debug, Default, PartialEq)]
pub struct MigrateArgs {
    pub board: String,
    /// Reuse an existing destination project instead of creating one.
    pub project: Option<String>,
    pub mapping: Option<PathBuf>,
    pub default_assignee: Option<String>,
}

pub fn parse(args: &[String]) -> Result<Command> {
    let Some((command, rest)) = args.split_first() else {
        return Ok(Command::Help);
    };
    match command.as_str() {
        "boards" => Ok(Command::Boards),
        "migrate" => parse_migrate(rest).map(Command::Migrate),
        "help" | "--help" | "-h" => Ok(Command::Help),
        other => bail!("Unknown command '{other}'. Run `cardlift help` for usage."),
    }
}

fn parse_migrate(args: &[String]) -> Result<MigrateArgs> {
    let mut parsed = MigrateArgs::default();
    let mut i = 0;

    while i < args.len() {
        let flag = args[i].as_str();
        let value = |i: usize| -> Result<String> {
            match args.get(i + 1) {
                Some(v) => Ok(v.clone()),
                None => bail!("Missing value for {flag}"),
            }
        };
        match flag {
            "--board" | "-b" => {
                parsed.board = value(i)?;
                i += 2;
            }
            "--project" | "-p" => {
                parsed.project = Some(value(i)?);
                i += 2;
            }
            "--mapping" | "-m" => {
                parsed.mapping = Some(PathBuf::from(value(i)?));
                i += 2;
            }
            "--default-assignee" => {
                parsed.default_assignee = Some(value(i)?);
                i += 2;
            }
            other => bail!("Unknown flag '{other}' for migrate"),
        }
    }

    if parsed.board.is_empty() {
        bail!("Missing --board <id>. Run `cardlift boards` to see available boards.");
    }
    Ok(parsed)
}

pub fn print_help() {
    println!("cardlift — migrate Trello boards to YouTrack\n");
    println!("USAGE:");
    println!("  cardlift boards                 List Trello boards available to your token");
    println!("  cardlift migrate --board <id>   Migrate a board into a new YouTrack project");
    println!();
    println!("MIGRATE OPTIONS:");
    println!("  -b, --board <id>             Source board id (required)");
    println!("  -p, --project <id>           Import into an existing YouTrack project");
    println!("  -m, --mapping <path>         User mapping JSON (source user -> login)");
    println!("      --default-assignee <login>  Assignee for unmapped members");
    println!();
    println!("Credentials come from ~/.cardlift/config.toml or the TRELLO_API_KEY,");
    println!("TRELLO_API_TOKEN, YOUTRACK_URL and YOUTRACK_API_TOKEN environment variables.");
    println!();
    println!("Re-running a migration creates duplicate entities in the destination;");
    println!("the tool never updates or deletes anything it finds there.");
}
