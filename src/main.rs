use clap::Parser;
use switchboard::cli::{handle_config_init, Cli, Commands, ConfigCommands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => switchboard::cli::serve::run_serve(args).await,
        Commands::Status(args) => switchboard::cli::status::run_status(args).await,
        Commands::Config(ConfigCommands::Init(args)) => handle_config_init(&args),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
