use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use scriptloom_engine::{Engine, EngineConfig};
use scriptloom_provider::draft_provider_from_config;
use scriptloom_retrieval::{embedding_provider_from_config, DualIndex};
use scriptloom_schema::{Blueprint, PipelineConfig};
use scriptloom_splitter::{split, SplitterConfig};
use scriptloom_validator::{Validator, ValidatorConfig};

#[derive(Parser)]
#[command(name = "scriptloom", version, about = "novel-to-screenplay adaptation pipeline")]
struct Cli {
    #[arg(long, help = "YAML config file (defaults apply when omitted)")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the full adaptation pipeline over a blueprint")]
    Run {
        #[arg(help = "Blueprint JSON file enumerating episode specs")]
        blueprint: PathBuf,
        #[arg(help = "Style corpus text file")]
        style_corpus: PathBuf,
        #[arg(help = "Novel text file")]
        novel_text: PathBuf,
        #[arg(long, help = "Directory for episode files and the run summary")]
        output_dir: Option<PathBuf>,
        #[arg(long, help = "Rewrite attempts per episode before escalation")]
        max_retries: Option<u32>,
        #[arg(long, help = "Minimum characters per scene unit")]
        min_scene_chars: Option<usize>,
        #[arg(long, help = "Maximum characters per scene unit")]
        max_scene_chars: Option<usize>,
        #[arg(long, help = "Episodes processed in parallel")]
        max_concurrent: Option<usize>,
    },
    #[command(about = "Validate an existing draft against the screenplay rules")]
    Check {
        #[arg(help = "Draft file to validate")]
        draft: PathBuf,
    },
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))
}

fn apply_overrides(
    mut config: PipelineConfig,
    output_dir: Option<PathBuf>,
    max_retries: Option<u32>,
    min_scene_chars: Option<usize>,
    max_scene_chars: Option<usize>,
    max_concurrent: Option<usize>,
) -> PipelineConfig {
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }
    if let Some(retries) = max_retries {
        config.max_retries = retries;
    }
    if let Some(min) = min_scene_chars {
        config.min_scene_chars = min;
    }
    if let Some(max) = max_scene_chars {
        config.max_scene_chars = max;
    }
    if let Some(limit) = max_concurrent {
        config.max_concurrent_episodes = limit;
    }
    config
}

async fn run_pipeline(
    config: PipelineConfig,
    blueprint_path: &Path,
    style_path: &Path,
    novel_path: &Path,
) -> Result<()> {
    let blueprint: Blueprint = serde_json::from_str(&load_text(blueprint_path)?)
        .with_context(|| format!("malformed blueprint: {}", blueprint_path.display()))?;
    let novel_text = load_text(novel_path)?;
    let style_text = load_text(style_path)?;

    let splitter_config = SplitterConfig {
        min_chars: config.min_scene_chars,
        max_chars: config.max_scene_chars,
        lookback_chars: config.lookback_chars,
    };
    let content_units = split(&novel_text, &splitter_config, "novel");
    let style_units = split(&style_text, &splitter_config, "style");
    tracing::info!(
        content_units = content_units.len(),
        style_units = style_units.len(),
        "corpora split into scene units"
    );

    let embedder = embedding_provider_from_config(&config.embedding)?;
    let index = DualIndex::build(content_units, style_units, embedder)
        .await
        .context("failed to build retrieval indices")?;

    let writer = draft_provider_from_config(
        &config.writer,
        (config.min_draft_chars, config.max_draft_chars),
    )?;
    let validator = Arc::new(Validator::new(ValidatorConfig::from_pipeline(&config)));
    let engine = Engine::new(
        Arc::new(index),
        writer,
        validator,
        EngineConfig::from_pipeline(&config),
    );

    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received; finishing in-flight episodes");
            cancel.cancel();
        }
    });

    let summary = engine.run(&blueprint).await?;
    for outcome in &summary.episodes {
        let artifact = outcome
            .artifact_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "episode {:>3}  {:<12}  retries {}  {}",
            outcome.episode_number,
            format!("{:?}", outcome.status).to_lowercase(),
            outcome.retry_count,
            artifact
        );
    }
    println!(
        "{} approved, {} escalated, summary at {}",
        summary.approved_count(),
        summary.escalated_count(),
        config.output_dir.join("run_summary.json").display()
    );
    Ok(())
}

fn check_draft(config: &PipelineConfig, draft_path: &Path) -> Result<()> {
    let draft = load_text(draft_path)?;
    let validator = Validator::new(ValidatorConfig::from_pipeline(config));
    let report = validator.validate(&draft);
    if report.passed {
        println!("{}: ok", draft_path.display());
        return Ok(());
    }
    for violation in &report.violations {
        match violation.line {
            Some(line) => println!("line {line}: {:?}: {}", violation.kind, violation.message),
            None => println!("{:?}: {}", violation.kind, violation.message),
        }
    }
    anyhow::bail!(
        "{} failed validation with {} violation(s)",
        draft_path.display(),
        report.violations.len()
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Run {
            blueprint,
            style_corpus,
            novel_text,
            output_dir,
            max_retries,
            min_scene_chars,
            max_scene_chars,
            max_concurrent,
        } => {
            let config = apply_overrides(
                config,
                output_dir,
                max_retries,
                min_scene_chars,
                max_scene_chars,
                max_concurrent,
            );
            run_pipeline(config, &blueprint, &style_corpus, &novel_text).await
        }
        Commands::Check { draft } => check_draft(&config, &draft),
    }
}
