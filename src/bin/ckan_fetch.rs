use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use ckan_fetch::app::{App, ProgressSinkKind};
use ckan_fetch::catalog::CatalogHttpClient;
use ckan_fetch::config::{ConfigLoader, ResolvedConfig};
use ckan_fetch::error::CatalogError;
use ckan_fetch::input::read_identifiers;
use ckan_fetch::output::{JsonOutput, OutputMode, print_bulk_summary, print_fetch_summary};
use ckan_fetch::store::Store;
use ckan_fetch::tui::Tui;

#[derive(Parser)]
#[command(name = "ckan-fetch")]
#[command(about = "Download datasets and resources from a CKAN open-data catalog")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    /// JSON config file (defaults to ./ckan-fetch.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Catalog action API base, e.g. https://host/api/action/
    #[arg(long, global = true)]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download every resource of the datasets listed in a CSV file")]
    Fetch(FetchArgs),
    #[command(about = "Export all search results to CSV and download one format")]
    Bulk(BulkArgs),
}

#[derive(Args)]
struct FetchArgs {
    #[arg(long)]
    csv: Option<String>,

    #[arg(long)]
    id_field: Option<String>,

    #[arg(long)]
    data_dir: Option<String>,
}

#[derive(Args)]
struct BulkArgs {
    #[arg(long)]
    query: Option<String>,

    #[arg(long)]
    format: Option<String>,

    #[arg(long)]
    download_dir: Option<String>,

    #[arg(long)]
    export_csv: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<CatalogError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CatalogError) -> u8 {
    match error {
        CatalogError::InvalidDatasetId(_)
        | CatalogError::MissingColumn { .. }
        | CatalogError::CsvRead { .. }
        | CatalogError::ConfigRead(_)
        | CatalogError::ConfigParse(_)
        | CatalogError::InvalidConfig(_) => 2,
        CatalogError::CatalogHttp(_)
        | CatalogError::CatalogPayload(_)
        | CatalogError::DownloadHttp(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(api_base) = cli.api_base {
        config.api_base = api_base;
    }

    match cli.command {
        Commands::Fetch(args) => run_fetch(args, config, output_mode),
        Commands::Bulk(args) => run_bulk(args, config, output_mode),
    }
}

fn build_app(config: &ResolvedConfig) -> miette::Result<App<CatalogHttpClient>> {
    let client = CatalogHttpClient::new(&config.api_base, &config.user_agent)?;
    Ok(App::new(Store::new(config.data_dir.clone()), client))
}

fn run_fetch(
    args: FetchArgs,
    mut config: ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    if let Some(csv) = args.csv {
        config.csv_file = csv.into();
    }
    if let Some(id_field) = args.id_field {
        config.id_field = id_field;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir.into();
    }

    let ids = read_identifiers(config.csv_file.as_std_path(), &config.id_field)?;
    let app = build_app(&config)?;

    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.fetch(&ids, &JsonOutput)?;
            JsonOutput::print_fetch(&result).into_diagnostic()?;
            Ok(())
        }
        OutputMode::Interactive => {
            let mut tui = Tui::new(ProgressSinkKind::Fetch);
            let result = tui.run(move |sink| app.fetch(&ids, sink))?;
            print_fetch_summary(&result);
            Ok(())
        }
    }
}

fn run_bulk(
    args: BulkArgs,
    mut config: ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    if let Some(query) = args.query {
        config.bulk.query = query;
    }
    if let Some(format) = args.format {
        config.bulk.format = format;
    }
    if let Some(download_dir) = args.download_dir {
        config.bulk.download_dir = download_dir.into();
    }
    if let Some(export_csv) = args.export_csv {
        config.bulk.export_csv = export_csv.into();
    }

    let app = build_app(&config)?;
    let settings = config.bulk;

    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.bulk(&settings, &JsonOutput)?;
            JsonOutput::print_bulk(&result).into_diagnostic()?;
            Ok(())
        }
        OutputMode::Interactive => {
            let mut tui = Tui::new(ProgressSinkKind::Bulk);
            let result = tui.run(move |sink| app.bulk(&settings, sink))?;
            print_bulk_summary(&result);
            Ok(())
        }
    }
}
