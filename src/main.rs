mod cli;
mod clients;
mod config;
mod correlate;
mod error;
mod mapping;
mod migrate;
mod model;
mod report;
mod retry;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use clients::{trello::TrelloClient, youtrack::YouTrackClient, Source};
use mapping::IdentityMapper;
use migrate::Migrator;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cardlift=info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match cli::parse(&args)? {
        cli::Command::Help => {
            cli::print_help();
            Ok(())
        }
        cli::Command::Boards => list_boards().await,
        cli::Command::Migrate(args) => run_migration(args).await,
    }
}

async fn list_boards() -> Result<()> {
    let config = config::load_config()?;
    let trello_cfg = config.trello()?;
    let source = TrelloClient::new(trello_cfg.api_key.clone(), trello_cfg.token.clone());

    let boards = source.list_boards().await?;
    if boards.is_empty() {
        println!("No open boards found.");
        return Ok(());
    }
    for board in boards {
        println!("{}  {}", board.id, board.name);
    }
    Ok(())
}

async fn run_migration(args: cli::MigrateArgs) -> Result<()> {
    let config = config::load_config()?;
    let trello_cfg = config.trello()?;
    let youtrack_cfg = config.youtrack()?;

    let source = TrelloClient::new(trello_cfg.api_key.clone(), trello_cfg.token.clone());
    let dest = YouTrackClient::new(youtrack_cfg.base_url.clone(), youtrack_cfg.token.clone());

    let default_assignee = args
        .default_assignee
        .or_else(|| config.migration.default_assignee.clone());
    let mapping_path = args
        .mapping
        .or_else(|| config.migration.user_mapping.clone());
    let users = match mapping_path {
        Some(path) => IdentityMapper::load(&path, default_assignee)?,
        None => IdentityMapper::unmapped(default_assignee),
    };

    let migrator = Migrator::new(&source, &dest, &users);
    let outcome = migrator.run(&args.board, args.project.as_deref()).await?;

    print!("{}", outcome.report);
    if !outcome.report.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}
