use anyhow::Context;
use clap::{Parser, Subcommand};

use shelf_kernel::settings::Settings;

#[derive(Parser)]
#[command(name = "shelf", version, about = "Personal-library service control")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Apply pending module migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load shelf settings")?;
    shelf_telemetry::init(&settings.telemetry);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => shelf_app::bootstrap::run(settings).await,
        Command::Migrate => shelf_app::bootstrap::migrate(settings).await,
    }
}
