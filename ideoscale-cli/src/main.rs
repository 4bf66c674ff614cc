mod client;
mod config;
mod data;
mod output;
mod prompts;

use clap::Parser;
use ideoscale_core::{ProgressFn, Session, SessionConfig};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::client::OpenAiClient;
use crate::prompts::{politician_type_for_chamber, TemplateOverrides, TemplateSet};

pub fn bail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}

#[derive(Parser)]
#[command(
    name = "ideoscale",
    version,
    about = "Rank legislators on an ideological scale using LLM pairwise comparisons"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Generate a comparison tournament and run it against a model
    Run(RunArgs),
    /// Create a default config file at ~/.config/ideoscale/config.toml
    Init,
}

#[derive(Parser)]
struct RunArgs {
    /// Congress number; members are fetched from voteview.com (needs --chamber)
    #[arg(long)]
    congress: Option<u32>,

    /// Chamber code: S (Senate), H (House), or HS (both)
    #[arg(long)]
    chamber: Option<String>,

    /// Local member file (voteview CSV or JSON entity array) instead of fetching
    #[arg(long)]
    members: Option<PathBuf>,

    /// OpenAI-compatible base URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Bearer token for the API (also reads OPENAI_API_KEY env var)
    #[arg(long)]
    api_key: Option<String>,

    /// Model ID for the API
    #[arg(long)]
    model: Option<String>,

    /// Max concurrent requests (1-200)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Comparison-phase sampling temperature. Extraction always runs at 0.
    #[arg(long)]
    temperature: Option<f64>,

    /// Nucleus sampling parameter
    #[arg(long)]
    top_p: Option<f64>,

    /// Seed for sampling draws and presentation-order shuffles. Default: 42.
    #[arg(long)]
    seed: Option<u64>,

    /// Matchups sampled per entity. Omit to run every pairwise comparison.
    #[arg(long)]
    sample_per_entity: Option<usize>,

    /// Ask Republican-vs-Republican matchups in the conservative direction
    #[arg(long)]
    bidirectional: bool,

    /// Put preferred (more liberal) entities on the right of the scale
    #[arg(long)]
    scale_increasing: bool,

    /// What to call the entities inside prompts. Defaults from --chamber.
    #[arg(long)]
    politician_type: Option<String>,

    /// Custom comparison prompt template file
    #[arg(long)]
    prompt: Option<PathBuf>,

    /// Custom extraction prompt template file (required with --prompt)
    #[arg(long)]
    extraction_prompt: Option<PathBuf>,

    /// Conservative-direction comparison template (bidirectional runs only)
    #[arg(long)]
    conservative_prompt: Option<PathBuf>,

    /// Conservative-direction extraction template (bidirectional runs only)
    #[arg(long)]
    conservative_extraction_prompt: Option<PathBuf>,

    /// Total attempts per request before the run aborts. Default: 3.
    #[arg(long)]
    max_tries: Option<u32>,

    /// Linear backoff base in seconds between attempts. Default: 2.0.
    #[arg(long)]
    backoff: Option<f64>,

    /// Single-item retries for an invalid extraction answer. Default: 5.
    #[arg(long)]
    extraction_retries: Option<u32>,

    /// CSV output path
    #[arg(long, default_value = "matchup_results.csv")]
    output: PathBuf,

    /// Print JSON to stdout instead of writing CSV
    #[arg(long)]
    json: bool,

    /// Show progress detail during execution
    #[arg(short, long)]
    verbose: bool,

    /// Path to config file (default: ~/.config/ideoscale/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn read_template(path: Option<&PathBuf>) -> Option<String> {
    path.map(|p| {
        std::fs::read_to_string(p)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_else(|e| bail(format!("Failed to read template {}: {e}", p.display())))
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_comparisons(args).await,
        Commands::Init => {
            let path = config::create_default_config();
            println!("Created config at {}", path.display());
            println!("Edit it to set your default endpoint, model, etc.");
        }
    }
}

async fn run_comparisons(args: RunArgs) {
    // Load config file, merge with CLI args (CLI wins)
    let config_path = args.config.clone().unwrap_or_else(config::config_path);
    let cfg = config::load_config(&config_path);

    let endpoint = args
        .endpoint
        .clone()
        .or(cfg.endpoint)
        .unwrap_or_else(|| "https://api.openai.com".to_string());
    let model = args.model.clone().or(cfg.model).unwrap_or_else(|| {
        bail(format!("No model specified. Pass --model or set it in {}", config_path.display()));
    });
    let api_key = args
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok());

    if let Some(ref chamber) = args.chamber {
        if !matches!(chamber.as_str(), "S" | "H" | "HS") {
            bail(format!("Unknown chamber \"{chamber}\". Use \"S\", \"H\", or \"HS\"."));
        }
    }

    // Prompt configuration is validated before any remote call is made.
    let politician_type = args
        .politician_type
        .clone()
        .or(cfg.politician_type)
        .unwrap_or_else(|| politician_type_for_chamber(args.chamber.as_deref()).to_string());

    let overrides = TemplateOverrides {
        comparison: read_template(args.prompt.as_ref()),
        extraction: read_template(args.extraction_prompt.as_ref()),
        conservative_comparison: read_template(args.conservative_prompt.as_ref()),
        conservative_extraction: read_template(args.conservative_extraction_prompt.as_ref()),
    };
    let templates = TemplateSet::resolve(overrides, args.bidirectional, politician_type)
        .unwrap_or_else(|e| bail(e));

    // Member data: local file wins over a voteview fetch.
    let member_text = if let Some(ref path) = args.members {
        std::fs::read_to_string(path)
            .unwrap_or_else(|e| bail(format!("Failed to read members file {}: {e}", path.display())))
    } else if let (Some(congress), Some(chamber)) = (args.congress, args.chamber.as_deref()) {
        data::fetch_members(chamber, congress)
            .await
            .unwrap_or_else(|e| bail(e))
    } else {
        bail("No member data. Pass --members <file>, or --congress with --chamber.");
    };

    let entities = data::load_entities(&member_text).unwrap_or_else(|e| bail(e));

    let mut session_config = SessionConfig::new(model.clone());
    if let Some(concurrency) = args.concurrency.or(cfg.concurrency) {
        session_config.concurrency = concurrency;
    }
    if let Some(temperature) = args.temperature.or(cfg.temperature) {
        session_config.temperature = temperature;
    }
    if let Some(top_p) = args.top_p.or(cfg.top_p) {
        session_config.top_p = top_p;
    }
    if let Some(seed) = args.seed {
        session_config.seed = seed;
    }
    if let Some(max_tries) = args.max_tries {
        session_config.max_tries = max_tries;
    }
    if let Some(backoff) = args.backoff {
        session_config.backoff_base = backoff;
    }
    if let Some(retries) = args.extraction_retries {
        session_config.extraction_retry_limit = retries;
    }
    session_config.sample_per_entity = args.sample_per_entity;

    if args.verbose {
        eprintln!(
            "Comparing {} entities ({} mode) | Endpoint: {} | Model: {}",
            entities.len(),
            match args.sample_per_entity {
                Some(k) => format!("{k} samples per entity"),
                None => "exhaustive".to_string(),
            },
            endpoint,
            model,
        );
    }

    let session = Session::new(entities, session_config).unwrap_or_else(|e| bail(e));
    let client = Arc::new(OpenAiClient::new(endpoint, api_key));

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len}").expect("static template is valid"),
    );
    let bar_handle = bar.clone();
    let progress: ProgressFn = Arc::new(move |done, total| {
        if bar_handle.length() != Some(total as u64) {
            bar_handle.set_length(total as u64);
        }
        bar_handle.set_position(done as u64);
    });

    let verdicts = session
        .run(&templates, client, Some(progress))
        .await
        .unwrap_or_else(|e| bail(e));
    bar.finish_and_clear();

    let rows = output::assemble_rows(session.entities(), &verdicts, args.scale_increasing);

    if args.json {
        output::print_json(&rows);
    } else {
        let file = std::fs::File::create(&args.output)
            .unwrap_or_else(|e| bail(format!("Failed to create {}: {e}", args.output.display())));
        let mut writer = std::io::BufWriter::new(file);
        output::write_csv(&rows, &mut writer)
            .unwrap_or_else(|e| bail(format!("Failed to write {}: {e}", args.output.display())));
        output::print_summary(&rows);
        println!("Results written to {}", args.output.display());
    }
}
