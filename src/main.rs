mod import;
mod library;
mod logging;
mod matcher;
mod ports;
mod report;
mod spotify;
mod sync;

use std::path::PathBuf;

use clap::Parser;
use color_eyre::{Result, eyre::WrapErr};

use crate::import::{Mode, Target};
use crate::logging::setup_logging;
use crate::spotify::auth;
use crate::spotify::client::SpotifyClient;

#[derive(Parser, Debug)]
#[command(author, version, about = "Create a Spotify playlist from an Apple Music XML export.")]
struct Args {
    /// Path to the Apple Music XML (playlist export or full library)
    #[arg(long)]
    xml: PathBuf,

    /// Name of the Apple Music playlist inside the XML (if using a full library)
    #[arg(long)]
    apple_playlist: Option<String>,

    /// Name for the new Spotify playlist (ignored if --use-existing is set)
    #[arg(long)]
    spotify_name: Option<String>,

    /// Make the Spotify playlist public (default: private)
    #[arg(long)]
    public: bool,

    /// CSV file to log tracks that were not found
    #[arg(long, default_value = "not_found.csv")]
    log_not_found: PathBuf,

    /// Use an existing Spotify playlist by name instead of creating a new one
    #[arg(long)]
    use_existing: Option<String>,

    /// How to modify the existing playlist
    #[arg(long, value_enum, default_value_t = Mode::Append)]
    mode: Mode,

    /// Console log level (default: off)
    #[arg(long, default_value = "off", env = "LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Path to log file
    #[arg(long, env = "APPLE_TO_SPOTIFY_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// File log level (default: debug)
    #[arg(long, default_value = "debug")]
    log_file_level: log::LevelFilter,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_logging(args.log_level, args.log_file.clone(), args.log_file_level)?;

    let target = match (&args.use_existing, &args.spotify_name) {
        (Some(name), _) => Target::Reuse {
            name: name.clone(),
            mode: args.mode,
        },
        (None, Some(name)) => Target::Create {
            name: name.clone(),
            public: args.public,
        },
        (None, None) => {
            eprintln!("You must provide either --spotify-name or --use-existing.");
            std::process::exit(1);
        }
    };

    let credentials = match auth::Credentials::from_env() {
        Ok(credentials) => credentials,
        Err(err) => {
            eprintln!("ERROR: {err}.");
            std::process::exit(2);
        }
    };

    let records = library::load_library(&args.xml, args.apple_playlist.as_deref())
        .wrap_err_with(|| format!("Failed to load {}", args.xml.display()))?;
    if records.is_empty() {
        eprintln!("No tracks found in XML (check file and playlist name).");
        std::process::exit(1);
    }
    log::info!(
        "loaded {} unique tracks from {}",
        records.len(),
        args.xml.display()
    );

    let token = auth::access_token(&credentials)
        .await
        .wrap_err("Spotify authentication failed")?;
    let api = SpotifyClient::new(token);

    import::run(&api, &records, &target, &args.log_not_found).await?;

    Ok(())
}
