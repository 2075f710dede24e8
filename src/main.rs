mod docker;
mod monitor;
mod server;
mod shared;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::docker::{ContainerRuntime, DockerClient};
use crate::shared::Settings;

#[derive(Parser)]
#[command(name = "dockyard")]
#[command(about = "Dockyard - Docker container orchestration API", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server (default command)
    Serve,

    /// Check that the Docker engine is reachable and print the effective configuration
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env values feed the env fallbacks of every flag
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = cli.settings;

    let _log_guards = shared::logging::init_logging(&settings.log_dir, "dockyard")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            server::rest::server::run_rest_server(settings).await?;
        }
        Commands::Check => {
            check(&settings).await?;
        }
    }

    Ok(())
}

async fn check(settings: &Settings) -> Result<()> {
    let range = settings.port_range()?;

    println!("API bind address:  {}", settings.bind_addr());
    println!("Host port range:   {} ({} ports)", range, range.capacity());
    println!(
        "Docker host:       {}",
        settings.docker_host.as_deref().unwrap_or("local default")
    );
    println!("Default image:     {}", settings.default_image);
    println!("Container port:    {}", settings.container_port);
    println!("Reconcile ports:   {}", settings.reconcile_ports);

    let docker = DockerClient::connect(&settings.docker())?;
    match docker.ping().await {
        Ok(()) => {
            println!("Docker engine:     reachable");
            Ok(())
        }
        Err(e) => {
            println!("Docker engine:     unreachable ({e})");
            Err(anyhow::anyhow!("Docker engine is not reachable"))
        }
    }
}
