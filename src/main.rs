use clap::Parser;

use courtside::cli::{self, Cli, Command, ConfigCommand};
use courtside::{config, logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    // These do not need the typed config (or a valid one).
    match &cli.command {
        Some(Command::Version) => {
            cli::handle_version();
            return Ok(());
        }
        Some(Command::Config(sub)) => {
            return match sub {
                ConfigCommand::Show => cli::handle_config_show(),
                ConfigCommand::Get { key } => cli::handle_config_get(key),
                ConfigCommand::Path => {
                    cli::handle_config_path();
                    Ok(())
                }
            };
        }
        _ => {}
    }

    let cfg = config::load()?;
    logging::init(&cfg.logging)?;

    match cli.command {
        None => cli::handle_serve(cfg, None, None).await,
        Some(Command::Serve { bind, port }) => cli::handle_serve(cfg, bind, port).await,
        Some(Command::Analyze { path, json }) => cli::handle_analyze(&cfg, &path, json).await,
        Some(Command::Version) | Some(Command::Config(_)) => Ok(()),
    }
}
