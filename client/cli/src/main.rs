use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod filters;
mod query;
mod tui;

use api::ApiClient;
use config::Config;
use filters::{FilterController, FilterField, SortOrder};

#[derive(Parser)]
#[command(name = "vault")]
#[command(about = "File vault client", long_about = None)]
struct Cli {
    /// API base URL (overrides VAULT_API_URL and the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse files interactively
    Browse,
    /// List files, optionally filtered
    Ls(ListArgs),
    /// Show storage usage and deduplication savings
    Summary,
    /// Upload one or more files
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Delete a file by id
    Rm {
        id: String,
    },
    /// Download a file by id
    Download {
        id: String,
        /// Destination file or directory (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Save the API URL to the config file
    Setup {
        /// e.g. localhost:8000/api
        url: String,
    },
}

#[derive(Args, Debug, Default)]
struct ListArgs {
    /// Match against the original filename
    #[arg(long)]
    search: Option<String>,
    /// MIME type, e.g. application/pdf
    #[arg(long = "type")]
    file_type: Option<String>,
    /// Minimum size in KB
    #[arg(long)]
    min_size: Option<String>,
    /// Maximum size in KB
    #[arg(long)]
    max_size: Option<String>,
    /// asc (oldest first) or desc (newest first)
    #[arg(long)]
    sort: Option<SortOrder>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;
    let client = ApiClient::new(&config.resolve_api_url(cli.api_url.as_deref()));

    // The browser owns the terminal; no log output there
    if matches!(cli.command, None | Some(Commands::Browse)) {
        return tui::run_browser(&client, &tui::default_download_dir()).await;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vault=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    tracing::debug!(api_url = %client.base_url(), "using API");

    match cli.command {
        Some(Commands::Ls(args)) => {
            list(&client, &filters_from_args(args)).await?;
        }
        Some(Commands::Summary) => {
            summary(&client).await?;
        }
        Some(Commands::Upload { paths }) => {
            upload(&client, &paths).await?;
        }
        Some(Commands::Rm { id }) => {
            client.delete_file(&id).await?;
            println!("deleted {}", id);
        }
        Some(Commands::Download { id, output }) => {
            let entry = client.get_file(&id).await?;
            let dest = output.unwrap_or_else(|| PathBuf::from("."));
            let path = client.download_to(&entry, &dest).await?;
            println!("saved {}", path.display());
        }
        Some(Commands::Setup { url }) => {
            setup(config, &url).await?;
        }
        Some(Commands::Browse) | None => unreachable!(),
    }

    Ok(())
}

/// Command-line filters go through the same draft/commit cycle as the browser.
fn filters_from_args(args: ListArgs) -> FilterController {
    let mut controller = FilterController::new();
    let fields = [
        (FilterField::SearchTerm, args.search),
        (FilterField::FileType, args.file_type),
        (FilterField::MinSize, args.min_size),
        (FilterField::MaxSize, args.max_size),
    ];
    for (field, value) in fields {
        if let Some(value) = value {
            if matches!(field, FilterField::MinSize | FilterField::MaxSize)
                && query::kilobytes_to_bytes(&value).is_none()
            {
                tracing::warn!(%field, %value, "not a usable number of KB, ignoring");
            }
            controller.set_draft(field, value);
        }
    }
    if let Some(order) = args.sort {
        controller.set_draft(FilterField::Ordering, order.as_str());
    }
    controller.commit();
    controller
}

async fn list(client: &ApiClient, controller: &FilterController) -> anyhow::Result<()> {
    let applied = controller.applied();
    let files = client.list_files(applied).await?;

    if applied.is_filtering() {
        let labels: Vec<String> = applied.active_filters().into_iter().map(|(_, l)| l).collect();
        println!("filters: {}", labels.join(", "));
    }
    if applied.ordering() != SortOrder::default() {
        println!("sort: {}", applied.ordering().label().to_lowercase());
    }

    if files.is_empty() {
        if applied.is_filtering() {
            println!("no files match your filters");
        } else {
            println!("no files. run: vault upload <path>");
        }
        return Ok(());
    }

    for file in files {
        println!(
            "{:<36}  {:>10}  {:<6}  {}  {}",
            file.id,
            format_size(file.size),
            filters::file_type_label(&file.file_type),
            format_timestamp(&file.uploaded_at),
            file.original_filename
        );
    }

    Ok(())
}

async fn summary(client: &ApiClient) -> anyhow::Result<()> {
    let s = client.storage_summary().await?;
    println!("total files:  {}", s.total_files);
    println!("unique files: {}", s.unique_files);
    println!("total size:   {}", format_megabytes(s.total_size));
    println!("unique size:  {}", format_megabytes(s.unique_size));
    println!("saved:        {}", format_megabytes(s.savings));
    Ok(())
}

async fn upload(client: &ApiClient, paths: &[PathBuf]) -> anyhow::Result<()> {
    let progress = indicatif::ProgressBar::new(paths.len() as u64).with_style(
        indicatif::ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")?,
    );

    let mut failed = 0;
    for path in paths {
        progress.set_message(path.display().to_string());
        match client.upload_file(path).await {
            Ok(entry) => progress.println(format!(
                "uploaded {} ({}, id {})",
                entry.original_filename,
                format_size(entry.size),
                entry.id
            )),
            Err(e) => {
                failed += 1;
                progress.println(format!("! {}: {}", path.display(), e));
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    if failed > 0 {
        anyhow::bail!("{} of {} uploads failed", failed, paths.len());
    }
    Ok(())
}

async fn setup(mut config: Config, url: &str) -> anyhow::Result<()> {
    let url = config::normalize_url(url);
    let client = ApiClient::new(&url);
    match client.storage_summary().await {
        Ok(s) => println!("* connected to {} ({} files)", url, s.total_files),
        Err(e) => println!("! could not reach {}: {}", url, e),
    }

    config.api_url = Some(url);
    config.save()?;
    println!("saved to {}", Config::config_path()?.display());
    Ok(())
}

pub(crate) fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

pub(crate) fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

pub(crate) fn format_timestamp(raw: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_format_megabytes() {
        assert_eq!(format_megabytes(0), "0.00 MB");
        assert_eq!(format_megabytes(1536 * 1024), "1.50 MB");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp("2025-03-01T10:05:00Z"), "2025-03-01 10:05");
        assert_eq!(format_timestamp("2025-03-01T10:05:00.123456+02:00"), "2025-03-01 10:05");
        assert_eq!(format_timestamp("yesterday"), "yesterday");
    }

    #[test]
    fn test_filters_from_args() {
        let controller = filters_from_args(ListArgs {
            search: Some("invoice".to_string()),
            min_size: Some("10".to_string()),
            sort: Some(SortOrder::Asc),
            ..ListArgs::default()
        });
        let applied = controller.applied();
        assert_eq!(applied.search_term(), "invoice");
        assert_eq!(applied.min_size(), "10");
        assert!(applied.is_filtering());
        assert_eq!(
            query::to_query_string(applied),
            "search=invoice&min_size=10240&sort=asc"
        );
    }

    #[test]
    fn test_filters_from_args_decimal_size() {
        let controller = filters_from_args(ListArgs {
            max_size: Some("4.5".to_string()),
            ..ListArgs::default()
        });
        assert_eq!(controller.applied().max_size(), "4.5");
        assert_eq!(query::to_query_string(controller.applied()), "max_size=4096");
    }

    #[test]
    fn test_filters_from_no_args() {
        let controller = filters_from_args(ListArgs::default());
        assert!(!controller.applied().is_filtering());
        assert_eq!(query::to_query_string(controller.applied()), "");
    }

    #[test]
    fn test_cli_parses_list_filters() {
        let cli = Cli::try_parse_from([
            "vault", "ls", "--search", "a", "--type", "image/png", "--sort", "asc",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Ls(args)) => {
                assert_eq!(args.file_type.as_deref(), Some("image/png"));
                assert_eq!(args.sort, Some(SortOrder::Asc));
            }
            _ => panic!("expected ls"),
        }

        assert!(Cli::try_parse_from(["vault", "ls", "--sort", "sideways"]).is_err());
    }
}
