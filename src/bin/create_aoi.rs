use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use aoi_builder::browse::HttpBrowseClient;
use aoi_builder::config::{AoiConfig, ConfigLoader};
use aoi_builder::error::AoiError;
use aoi_builder::notify::SmtpMailer;
use aoi_builder::output::{JsonOutput, OutputMode};
use aoi_builder::pipeline::{JobInputs, Pipeline, RunSummary};
use aoi_builder::tools::{ImageryTools, SystemImageryTools};

#[derive(Parser)]
#[command(name = "create-aoi")]
#[command(about = "Build an AOI dataset and metadata product from a job context")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Validate the context, write the product and send notifications")]
    Run(RunArgs),
    #[command(about = "Validate the context and print the records without writing them")]
    Validate(InputArgs),
    #[command(about = "Show the external imaging tools that were found")]
    Tools(ConfigArgs),
}

#[derive(Args, Clone)]
struct ConfigArgs {
    /// JSON config file (defaults to ./create-aoi.json when present)
    #[arg(long)]
    config: Option<String>,
}

#[derive(Args, Clone)]
struct InputArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Job context file
    #[arg(long)]
    context: Option<Utf8PathBuf>,

    /// Directory holding the record and email templates
    #[arg(long)]
    templates: Option<Utf8PathBuf>,
}

#[derive(Args, Clone)]
struct RunArgs {
    #[command(flatten)]
    inputs: InputArgs,

    /// Job description file carrying job_id and task_id
    #[arg(long)]
    job: Option<Utf8PathBuf>,

    /// Directory under which the product directory is created
    #[arg(long)]
    output: Option<Utf8PathBuf>,

    #[arg(long)]
    no_email: bool,

    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<AoiError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &AoiError) -> u8 {
    match error {
        _ if error.is_validation() => 3,
        AoiError::ContextRead(_)
        | AoiError::ContextParse(_)
        | AoiError::TemplateRead(_)
        | AoiError::TemplateParse { .. }
        | AoiError::ConfigRead(_)
        | AoiError::ConfigParse(_) => 2,
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
    match cli.command {
        Commands::Run(args) => run_create(args),
        Commands::Validate(args) => run_validate(args),
        Commands::Tools(args) => {
            let config = ConfigLoader::resolve(args.config.as_deref())?;
            let tools = SystemImageryTools::new(&config.tools);
            JsonOutput::print_tools(&tools.tool_info()).into_diagnostic()?;
            Ok(())
        }
    }
}

fn resolve_inputs(args: &InputArgs) -> Result<AoiConfig, AoiError> {
    let mut config = ConfigLoader::resolve(args.config.config.as_deref())?;
    if let Some(context) = &args.context {
        config.context_file = context.clone();
    }
    if let Some(templates) = &args.templates {
        config.templates_dir = templates.clone();
    }
    Ok(config)
}

fn run_create(args: RunArgs) -> miette::Result<()> {
    let mut config = resolve_inputs(&args.inputs)?;
    if let Some(job) = args.job {
        config.job_file = job;
    }
    if let Some(output) = args.output {
        config.output_root = output;
    }
    if args.no_email {
        config.notifications = false;
    }
    let output_mode = if args.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let browse = HttpBrowseClient::new()?;
    let tools = SystemImageryTools::new(&config.tools);
    let mailer = SmtpMailer::new(config.smtp.clone());
    let pipeline = Pipeline::new(config, browse, tools, mailer);
    let summary = pipeline.run()?;

    match output_mode {
        OutputMode::Json => JsonOutput::print_summary(&summary).into_diagnostic()?,
        OutputMode::Human => print_summary(&summary),
    }
    Ok(())
}

fn run_validate(args: InputArgs) -> miette::Result<()> {
    let config = resolve_inputs(&args)?;
    let inputs = JobInputs::load(&config)?;
    let (ds, met) = inputs.build()?;
    JsonOutput::print_preview(&ds, &met).into_diagnostic()?;
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}AOI {}{reset}", summary.label);
    println!("{green}   dataset: {}{reset}", summary.dataset_path);
    println!("{green}   metadata: {}{reset}", summary.metadata_path);
    for (name, done) in [
        ("browse image", summary.browse),
        ("map tiles", summary.tiles),
        ("notification", summary.notified),
    ] {
        let (mark, color) = if done { ("ok", green) } else { ("skipped", yellow) };
        println!("{color}   {name}: {mark}{reset}");
    }
}
