use clap::{Parser, ValueEnum};
use cube_validator::classify::{classify, ClassifiedResult};
use cube_validator::playground::{playground_link, DEFAULT_PLAYGROUND};
use cube_validator::rdf::{to_ntriples, to_turtle};
use cube_validator::{
    until_cancelled, CubeReference, CubeValidator, HttpConfig, PageFailurePolicy, ProfileKey,
    ValidationLimits, ValidationProfile, ValidationReport, PROFILES,
};
use log::info;
use oxigraph::model::NamedNode;
use std::time::Duration;
use url::Url;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser, Debug)]
struct CubeArgs {
    /// SPARQL endpoint serving the cube
    #[arg(short, long, value_name = "URL")]
    endpoint: String,

    /// IRI of the cube
    #[arg(short, long, value_name = "IRI")]
    cube: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout: u64,
}

#[derive(ValueEnum, Clone, Debug, Default)]
enum ReportFormat {
    #[default]
    Turtle,
    #[value(name = "ntriples")]
    NTriples,
    Dump,
}

#[derive(Parser, Debug)]
struct OutputArgs {
    /// The output format for the validation report
    #[arg(long, value_enum, default_value_t = ReportFormat::Turtle)]
    format: ReportFormat,

    /// Also print a SHACL playground link holding the shapes and the data
    #[arg(long)]
    playground: bool,
}

#[derive(Parser)]
#[clap(group(
    clap::ArgGroup::new("profile_source")
        .args(&["profile", "shapes"]),
))]
struct CubeValidationArgs {
    #[clap(flatten)]
    cube: CubeArgs,

    /// Profile to validate against (visualize, opendataswiss, default); resolved from the
    /// cube's metadata when omitted
    #[arg(long, value_name = "KEY")]
    profile: Option<String>,

    /// IRI of a shape graph to validate against instead of a profile
    #[arg(long, value_name = "IRI")]
    shapes: Option<String>,

    #[clap(flatten)]
    output: OutputArgs,
}

#[derive(Parser)]
struct ObservationArgs {
    #[clap(flatten)]
    cube: CubeArgs,

    /// Observations per page
    #[arg(long, default_value_t = 10)]
    chunk_size: u64,

    /// Stop after this many pages
    #[arg(long, default_value_t = 10)]
    max_pages: u64,

    /// Stop once this many violations have been found
    #[arg(long, default_value_t = 20)]
    max_violations: u64,

    /// Fetch the next page while the current one is validated
    #[arg(long)]
    prefetch: bool,

    /// Report what was found so far when a page cannot be fetched
    #[arg(long)]
    keep_partial: bool,

    #[clap(flatten)]
    output: OutputArgs,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Check that the endpoint answers
    Ping(CubeArgs),
    /// List the profiles applicable to the cube and the one it resolves to
    Profiles(CubeArgs),
    /// Validate the cube's metadata against a profile
    Cube(CubeValidationArgs),
    /// Validate the cube's observations page by page against its observation constraint
    Observations(ObservationArgs),
}

fn connect(args: &CubeArgs) -> Result<(CubeValidator, CubeReference), Box<dyn std::error::Error>> {
    let cube = CubeReference::parse(&args.endpoint, &args.cube)?;
    let validator = CubeValidator::over_http(HttpConfig {
        timeout: Duration::from_secs(args.timeout),
        ..HttpConfig::default()
    })?;
    Ok((validator, cube))
}

async fn pick_profile(
    validator: &CubeValidator,
    cube: &CubeReference,
    args: &CubeValidationArgs,
) -> Result<ValidationProfile, Box<dyn std::error::Error>> {
    if let Some(shapes) = &args.shapes {
        let iri = NamedNode::new(shapes.as_str())
            .map_err(|e| format!("Invalid shape graph IRI {}: {}", shapes, e))?;
        return Ok(ValidationProfile::manual(iri));
    }
    if let Some(key) = &args.profile {
        let key = ProfileKey::parse(key).ok_or_else(|| format!("Unknown profile '{}'", key))?;
        return PROFILES
            .get(key)
            .cloned()
            .ok_or_else(|| format!("No profile configured for '{}'", key).into());
    }
    let metadata = validator.cube_metadata(cube).await?;
    Ok(validator.resolve_profile(&metadata))
}

fn print_classified(result: &ClassifiedResult, depth: usize) {
    let indent = "  ".repeat(depth);
    let subject = match &result.dimension {
        Some(dimension) => dimension.label(),
        None => result.result.focus_node.to_string(),
    };
    println!(
        "{}[{}] {}: {}",
        indent,
        result.level,
        subject,
        result.result.message.as_deref().unwrap_or("(no message)")
    );
    for detail in &result.detail {
        print_classified(detail, depth + 1);
    }
}

fn print_report(
    report: &ValidationReport,
    output: &OutputArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    match output.format {
        ReportFormat::Turtle => {
            println!("{}", to_turtle(&report.to_report_graph())?);
        }
        ReportFormat::NTriples => {
            println!("{}", to_ntriples(&report.to_report_graph())?);
        }
        ReportFormat::Dump => {
            print!("{}", report.dump());
            let classification = classify(report);
            for (title, results) in [
                ("Cube", &classification.cube),
                ("Dimensions", &classification.dimensions),
                ("Other", &classification.other),
            ] {
                if results.is_empty() {
                    continue;
                }
                println!("\n{} ({}):", title, results.len());
                for result in results {
                    print_classified(result, 1);
                }
            }
        }
    }
    if output.playground {
        let base = Url::parse(DEFAULT_PLAYGROUND)?;
        let link = playground_link(&base, report.shape_graph.graph(), &report.data_graph)?;
        println!("\nPlayground: {}", link);
    }
    Ok(())
}

/// Resolves when the user interrupts the process.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Ping(args) => {
            let (validator, cube) = connect(&args)?;
            validator.ping(&cube).await?;
            println!("{} is reachable", cube.endpoint);
        }
        Commands::Profiles(args) => {
            let (validator, cube) = connect(&args)?;
            let metadata = validator.cube_metadata(&cube).await?;
            if let Some(name) = &metadata.name {
                println!("{} ({})", name, metadata.iri);
            }
            let resolved = validator.resolve_profile(&metadata);
            for profile in validator.available_profiles(&metadata) {
                let marker = if profile == resolved { "*" } else { " " };
                println!(
                    "{} {}\t{}\t{}",
                    marker, profile.key, profile.label, profile.shape_graph_iri
                );
            }
        }
        Commands::Cube(args) => {
            let (validator, cube) = connect(&args.cube)?;
            let profile = pick_profile(&validator, &cube, &args).await?;
            info!("Validating {} against profile '{}'", cube, profile.key);
            let Some(report) =
                until_cancelled(validator.validate_cube(&cube, &profile), interrupted()).await
            else {
                return Err("Validation cancelled".into());
            };
            print_report(&report?, &args.output)?;
        }
        Commands::Observations(args) => {
            let (validator, cube) = connect(&args.cube)?;
            let policy = if args.keep_partial {
                PageFailurePolicy::KeepPartial
            } else {
                PageFailurePolicy::Discard
            };
            let validator = validator.with_limits(
                ValidationLimits::default()
                    .with_chunk_size(args.chunk_size)
                    .with_max_pages(args.max_pages)
                    .with_max_violations(args.max_violations)
                    .with_prefetch(args.prefetch)
                    .with_page_failure_policy(policy),
            );
            let Some(report) =
                until_cancelled(validator.validate_observations(&cube), interrupted()).await
            else {
                return Err("Validation cancelled".into());
            };
            let report = report?;
            info!(
                "{} violation(s), {}",
                report.violations.len(),
                report.termination
            );
            print_report(&report, &args.output)?;
        }
    }
    Ok(())
}
