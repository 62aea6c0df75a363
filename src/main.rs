mod cli;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = cli.config.log_level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Demo { target_id, threshold } => {
            cli::run_demo(
                target_id,
                threshold,
                cli.config.seed_deposit_cents,
                cli.config.audit_every_call,
                cli.config.aggressive_buy_ceiling_cents,
            );
        }
    }
    Ok(())
}
