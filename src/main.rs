use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use regex::Regex;
use reqwest::Client;
use tracing_subscriber::EnvFilter;

use mvnfetch::downloader::{
    self, DownloadDescriptor, FetchConfig, Fetcher, Planer, RepositoryConfig, SuspendWriter,
};

#[derive(Parser)]
#[command(name = "mvnfetch")]
#[command(about = "Download the latest published artifacts of a Maven repository group")]
#[command(version)]
struct Cli {
    #[arg(short, long, global = true, help = "log progress of every step")]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct RepositoryArgs {
    #[arg(long, help = "repository host, e.g. https://repo1.maven.org")]
    server_url: String,
    #[arg(long, default_value = "maven2", help = "repository, proxy or group path")]
    repository_path: String,
    #[arg(short, long, help = "dotted group id, e.g. org.springframework.cloud")]
    group_id: String,
}

#[derive(Args)]
struct FetchArgs {
    #[arg(short, long, default_value = ".", help = "directory to save files in")]
    output_dir: PathBuf,
    #[arg(long, default_value_t = 60, help = "seconds allowed for probing every file")]
    probe_timeout: u64,
    #[arg(long, default_value_t = 1200, help = "seconds allowed for downloading every file")]
    download_timeout: u64,
    #[arg(long, help = "do not draw progress bars")]
    no_progress: bool,
}

impl FetchArgs {
    fn config(&self) -> FetchConfig {
        FetchConfig {
            output_dir: self.output_dir.clone(),
            probe_timeout: Duration::from_secs(self.probe_timeout),
            download_timeout: Duration::from_secs(self.download_timeout),
            show_progress: !self.no_progress,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the latest version of every artifact in a group and download it
    Fetch {
        #[command(flatten)]
        repository: RepositoryArgs,
        #[arg(short, long, default_value = ".jar", help = "suffix after {artifactId}-{version}")]
        extension: String,
        #[arg(short, long, help = "only artifact ids matching this regex")]
        filter: Option<Regex>,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Download the given URLs
    Get {
        #[arg(required = true)]
        urls: Vec<String>,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Show the versioning metadata of one artifact
    Metadata {
        #[command(flatten)]
        repository: RepositoryArgs,
        #[arg(short, long)]
        artifact_id: String,
    },
}

fn repository_config(args: RepositoryArgs) -> RepositoryConfig {
    RepositoryConfig::new(&args.server_url, &args.repository_path, &args.group_id)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(|| {
            SuspendWriter::new(downloader::progress_terminal().clone(), std::io::stderr())
        })
        .init();

    match cli.command {
        Some(Commands::Fetch {
            repository,
            extension,
            filter,
            fetch,
        }) => {
            let repository = RepositoryConfig {
                extension,
                filter,
                ..repository_config(repository)
            };
            let report = downloader::download(repository, fetch.config()).await?;
            println!("{}", report);
        }

        Some(Commands::Get { urls, fetch }) => {
            let mut descriptors = Vec::new();
            for url in urls {
                match DownloadDescriptor::from_url(&url) {
                    Some(descriptor) => descriptors.push(descriptor),
                    None => return Err(format!("cannot derive a file name from {}", url).into()),
                }
            }
            let report = Fetcher::new(Client::new(), fetch.config())
                .fetch(descriptors)
                .await;
            println!("{}", report);
        }

        Some(Commands::Metadata {
            repository,
            artifact_id,
        }) => {
            let planer = Planer::new(Client::new(), repository_config(repository));
            println!("{}", planer.repository().metadata_url(&artifact_id));
            let metadata = planer.fetch_metadata(&artifact_id).await?;
            let versioning = &metadata.versioning;
            println!(
                "{}:{}",
                metadata.group_id.as_deref().unwrap_or("?"),
                metadata.artifact_id
            );
            println!("latest: {}", versioning.latest.as_deref().unwrap_or("-"));
            println!("release: {}", versioning.release.as_deref().unwrap_or("-"));
            println!(
                "last updated: {}",
                versioning.last_updated.as_deref().unwrap_or("-")
            );
            println!("versions: {}", versioning.versions.join(", "));
        }

        None => {
            println!("Use --help for available commands");
        }
    }

    Ok(())
}
