use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use cloudvault::progress::{follow, summary_line, FollowOutcome, ProgressView};
use cloudvault::{select_paths, Config, Database, DriveRepository, Result, Uploader, WebServer};

#[derive(Parser)]
#[command(name = "cloudvault", version, about = "Batch uploads for a personal cloud drive")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload files and directories, recreating the directory structure
    Upload {
        /// Files or directories to upload
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Destination folder id (drive root when omitted)
        #[arg(short, long)]
        folder: Option<String>,
    },
    /// Run the drive server (folder and upload routes plus the finalize webhook)
    Serve,
    /// Issue a bearer session token for a user
    Session {
        /// User id the token authenticates as
        user_id: String,
    },
}

fn load_config(path: &Path) -> Config {
    match Config::load_with_env(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", path.display());
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = load_config(&cli.config);

    let result = match cli.command {
        Command::Upload { paths, folder } => {
            // Console output belongs to the progress bars.
            if let Err(e) = cloudvault::logging::init(&config.logging, false) {
                eprintln!("Failed to initialize logging: {e}");
                cloudvault::logging::init_console_only(&config.logging.level);
            }
            upload(&config, &paths, folder).await
        }
        Command::Serve => {
            if let Err(e) = cloudvault::logging::init(&config.logging, true) {
                eprintln!("Failed to initialize logging: {e}");
                cloudvault::logging::init_console_only(&config.logging.level);
            }
            serve(&config).await.map(|()| ExitCode::SUCCESS)
        }
        Command::Session { user_id } => {
            cloudvault::logging::init_console_only(&config.logging.level);
            session(&config, &user_id).await.map(|()| ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn upload(config: &Config, paths: &[PathBuf], folder: Option<String>) -> Result<ExitCode> {
    config.validate()?;

    let files = select_paths(paths).await?;
    if files.is_empty() {
        println!("No files to upload.");
        return Ok(ExitCode::SUCCESS);
    }

    let uploader = Uploader::from_config(config)?;
    let mut view = ProgressView::new()?;
    let mut snapshots = uploader.tracker().subscribe();

    info!(files = files.len(), folder = ?folder, "Uploading");
    uploader.upload(files, folder);

    // Installed once for the whole run; a failing handler never fires.
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    let outcome = match follow(&mut view, &mut snapshots, uploader.wait_idle(), interrupt).await {
        FollowOutcome::Finished(outcome) => outcome,
        FollowOutcome::Interrupted => {
            let summary = uploader.tracker().summary();
            let aborted = uploader.clear();
            view.finish();
            warn!(aborted, "Upload interrupted");
            eprintln!("Interrupted: {aborted} active transfer(s) aborted.");
            println!("{}", summary_line(&summary));
            return Ok(ExitCode::from(130));
        }
    };

    view.render(&uploader.tracker().snapshot());
    view.finish();

    let summary = uploader.tracker().summary();
    println!("{}", summary_line(&summary));
    info!(
        done = summary.done,
        failed = summary.error,
        aborted = summary.abort,
        "Upload finished"
    );

    if let Err(e) = outcome {
        eprintln!("Some folders could not be created: {e}");
        return Ok(ExitCode::FAILURE);
    }
    if summary.error > 0 || summary.abort > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

async fn serve(config: &Config) -> Result<()> {
    config.server.validate()?;

    info!("CloudVault drive server");
    let db = Database::open(&config.database.path).await?;
    let server = WebServer::new(&config.server, db.clone())?;
    info!("Server configured on {}", server.addr());

    server.run().await?;
    db.close().await;
    Ok(())
}

async fn session(config: &Config, user_id: &str) -> Result<()> {
    let db = Database::open(&config.database.path).await?;
    let token = DriveRepository::new(db.pool()).create_session(user_id).await?;
    db.close().await;

    info!(user_id, "Session issued");
    println!("{token}");
    Ok(())
}
