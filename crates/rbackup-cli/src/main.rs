mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rbackup")]
#[command(about = "Upload, list and rotate backup files on a remote store")]
#[command(version)]
struct Cli {
    /// Remote type: local, s3, s3-encrypted
    #[arg(long, global = true, env = "RBACKUP_REMOTE_TYPE", default_value = "local")]
    remote_type: String,

    /// Remote connection string: inline JSON or a path to a JSON file.
    /// Missing keys fall back to RBACKUP_* environment variables.
    #[arg(
        long,
        short = 'r',
        global = true,
        env = "REMOTE_CONNECTION_STRING",
        default_value = "{}",
        hide_env_values = true
    )]
    remote: String,

    /// Verbose logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a local file to the remote
    Upload {
        /// Local file as a source
        src: PathBuf,
        /// Destination name at the remote (default: timestamped name)
        dest: Option<String>,
    },

    /// Keep only the newest versions on the remote
    Rotate {
        #[command(flatten)]
        retention: RetentionArgs,
        /// Only print what would be deleted
        #[arg(long)]
        dry_run: bool,
    },

    /// Download a remote file to a local path
    Download {
        /// Remote name
        src: String,
        /// Target local path
        dest: PathBuf,
    },

    /// List files on the remote, newest first
    List,

    /// Rotate, upload, then rotate again
    Backup {
        /// Local file as a source
        src: PathBuf,
        /// Destination name at the remote (default: timestamped name)
        dest: Option<String>,
        #[command(flatten)]
        retention: RetentionArgs,
    },
}

#[derive(clap::Args)]
pub struct RetentionArgs {
    /// How many versions to keep
    #[arg(long, short = 'm')]
    max_versions: usize,

    /// Files pattern whitelist (regex anchored at the start of the name)
    #[arg(long, short = 'p', default_value = ".*")]
    pattern: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let directive = if cli.debug { "rbackup=debug" } else { "rbackup=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    let remote = commands::Remote {
        kind: &cli.remote_type,
        connection: &cli.remote,
    };

    match cli.command {
        Commands::Upload { ref src, ref dest } => rt.block_on(commands::upload::run(
            &remote,
            src,
            dest.as_deref().unwrap_or_default(),
        )),
        Commands::Rotate {
            ref retention,
            dry_run,
        } => rt.block_on(commands::rotate::run(&remote, retention, dry_run)),
        Commands::Download { ref src, ref dest } => {
            rt.block_on(commands::download::run(&remote, src, dest))
        }
        Commands::List => rt.block_on(commands::list::run(&remote)),
        Commands::Backup {
            ref src,
            ref dest,
            ref retention,
        } => rt.block_on(commands::backup::run(
            &remote,
            src,
            dest.as_deref().unwrap_or_default(),
            retention,
        )),
    }
}
