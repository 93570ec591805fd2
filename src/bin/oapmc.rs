use std::fs;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use oapmc_packager::config::ConfigLoader;
use oapmc_packager::error::OapmcError;
use oapmc_packager::fetch::PmcHttpClient;
use oapmc_packager::metadata::extract_record;
use oapmc_packager::output::{JsonOutput, StderrProgress};
use oapmc_packager::pipeline::{Pipeline, ProgressSink};
use oapmc_packager::render::HtmlRenderer;

#[derive(Parser)]
#[command(name = "oapmc")]
#[command(about = "Turn a PubMed Central open-access article into a metadata package")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch an article and assemble its package")]
    Fetch(FetchArgs),
    #[command(about = "Print the metadata record extracted from a local JATS file")]
    Inspect(InspectArgs),
}

#[derive(Args)]
struct FetchArgs {
    /// Open-access service uri, e.g. https://www.ncbi.nlm.nih.gov/pmc/utils/oa/oa.fcgi?id=PMC3010060
    uri: String,

    #[arg(long, default_value = ".")]
    root: Utf8PathBuf,

    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    no_pubmed: bool,

    /// Package document path, instead of `<root>/package.jsonld`
    #[arg(long)]
    output: Option<Utf8PathBuf>,

    #[arg(long)]
    quiet: bool,
}

#[derive(Args)]
struct InspectArgs {
    xml: Utf8PathBuf,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<OapmcError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &OapmcError) -> u8 {
    match error {
        OapmcError::UnrecognizedUri(_)
        | OapmcError::MissingYear
        | OapmcError::ConfigRead(_)
        | OapmcError::ConfigParse(_) => 2,
        OapmcError::Http(_) | OapmcError::HttpStatus { .. } | OapmcError::IdConversion(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Commands::Fetch(args) => run_fetch(args),
        Commands::Inspect(args) => run_inspect(args),
    }
}

fn run_fetch(args: FetchArgs) -> miette::Result<()> {
    let mut options = ConfigLoader::resolve(args.config.as_deref(), args.root)?;
    if args.no_pubmed {
        options.no_pubmed = true;
    }
    if args.output.is_some() {
        options.output = args.output;
    }

    let client = PmcHttpClient::new(options.timeout_secs)?;
    let renderer = HtmlRenderer::new(options.root.as_std_path());
    let pipeline = Pipeline::new(client, renderer, options);

    let sink: &dyn ProgressSink = if args.quiet {
        &JsonOutput
    } else {
        &StderrProgress
    };
    let result = pipeline.fetch(&args.uri, sink)?;
    JsonOutput::print_fetch(&result).into_diagnostic()?;
    Ok(())
}

fn run_inspect(args: InspectArgs) -> miette::Result<()> {
    let source = fs::read_to_string(&args.xml).into_diagnostic()?;
    let record = extract_record(&source)?;
    JsonOutput::print_record(&record).into_diagnostic()?;
    Ok(())
}
