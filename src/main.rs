//! postwright - CLI entry point.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use postwright::config::{BatchSettings, DEFAULT_CONFIG_FILE, Settings};
use postwright::generation::{CommandGenerator, check_program_installed};
use postwright::metrics::{JsonlSink, MetricsSink, MetricsSummary, read_events};
use postwright::post::{
    AffiliatePosts, NormalPosts, plan_requests, read_products, read_prompts, render_posts, write_posts,
};
use postwright::retry::{BatchReconciler, BatchReport, CallExecutor, ErrorClassifier, WorkItem};

/// Generate social media posts through an external model CLI, with retries.
#[derive(Parser, Debug)]
#[command(name = "postwright")]
#[command(about = "Generate social media posts with retries and batch reconciliation")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate posts from a file of prompts, one prompt per line
    Normal {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Print posts instead of writing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate affiliate posts from a name<TAB>short_url file
    Affiliate {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Print posts instead of writing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Summarize a metrics file
    Report {
        /// Metrics file (defaults to the configured path)
        #[arg(long)]
        metrics: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = Settings::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    match cli.command {
        Command::Normal {
            input,
            output,
            dry_run,
        } => run_normal(&settings, &input, &output, dry_run).await,
        Command::Affiliate {
            input,
            output,
            dry_run,
        } => run_affiliate(&settings, &input, &output, dry_run).await,
        Command::Report { metrics } => {
            let path = metrics.unwrap_or_else(|| settings.metrics.path.clone());
            run_report(&path)
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("postwright=debug")
        } else {
            EnvFilter::new("postwright=info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

/// Cancel the returned token on Ctrl-C so running batches wind down.
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted: finishing current calls and writing partial output...");
            trigger.cancel();
        }
    });
    token
}

/// Executor and reconciler wired from settings. `batch` is the pipeline's
/// effective batch section.
fn build_pipeline(
    settings: &Settings,
    batch: &BatchSettings,
    cancel: &CancellationToken,
) -> Result<(CallExecutor<CommandGenerator>, BatchReconciler)> {
    if !check_program_installed(&settings.command.program) {
        bail!(
            "Backend program '{}' not found on PATH. Set [command].program in the config.",
            settings.command.program
        );
    }

    let metrics: Arc<dyn MetricsSink> = Arc::new(JsonlSink::new(&settings.metrics.path));
    let executor = CallExecutor::new(CommandGenerator::from_settings(&settings.command), metrics)
        .with_classifier(ErrorClassifier::from_settings(&settings.classifier))
        .with_cancellation(cancel.clone());
    let reconciler = BatchReconciler::from_settings(batch).with_cancellation(cancel.clone());

    Ok((executor, reconciler))
}

async fn run_normal(settings: &Settings, input: &Path, output: &Path, dry_run: bool) -> Result<()> {
    // Step 1: Read prompts
    let prompts = read_prompts(input).context("Failed to read prompts")?;
    if prompts.is_empty() {
        println!("No prompts in {}. Nothing to do.", input.display());
        return Ok(());
    }

    let (policy, batch) = settings.normal_pipeline();
    let mut items = plan_requests(&prompts, settings.normal.posts_per_prompt, &policy);
    println!(
        "Generating {} posts from {} prompt(s)...",
        items.len(),
        prompts.len()
    );

    // Step 2: Generate
    let cancel = shutdown_token();
    let (executor, reconciler) = build_pipeline(settings, &batch, &cancel)?;
    let report = reconciler
        .reconcile(&mut items, &NormalPosts::new(&executor))
        .await;

    // Step 3: Write or display
    finish(&items, &report, output, dry_run)
}

async fn run_affiliate(settings: &Settings, input: &Path, output: &Path, dry_run: bool) -> Result<()> {
    // Step 1: Read products
    let products = read_products(input).context("Failed to read products")?;
    if products.is_empty() {
        println!("No products in {}. Nothing to do.", input.display());
        return Ok(());
    }

    let mut items: Vec<WorkItem<_>> = products.into_iter().map(WorkItem::new).collect();
    println!("Generating {} affiliate post(s)...", items.len());

    // Step 2: Generate
    let (policy, batch) = settings.affiliate_pipeline();
    let cancel = shutdown_token();
    let (executor, reconciler) = build_pipeline(settings, &batch, &cancel)?;
    let generator = AffiliatePosts::new(
        &executor,
        policy,
        settings.affiliate.max_product_name_length,
    );
    let report = reconciler.reconcile(&mut items, &generator).await;

    // Step 3: Write or display
    finish(&items, &report, output, dry_run)
}

fn finish<P>(items: &[WorkItem<P>], report: &BatchReport, output: &Path, dry_run: bool) -> Result<()> {
    if dry_run {
        println!("\n--- Dry Run Output ---\n");
        print!("{}", render_posts(items));
    } else {
        write_posts(output, items).context("Failed to write posts")?;
    }

    if report.is_complete() {
        println!("✓ {} post(s) generated", report.resolved);
    } else {
        println!(
            "✓ {} of {} post(s) generated, {} left empty",
            report.resolved, report.total, report.unresolved
        );
    }
    if report.cancelled {
        println!("Stopped early by interrupt.");
    }

    Ok(())
}

fn run_report(path: &Path) -> Result<()> {
    let events = read_events(path).context("Failed to read metrics")?;
    if events.is_empty() {
        println!("No events in {}.", path.display());
        return Ok(());
    }

    println!("{}", MetricsSummary::from_events(&events));
    Ok(())
}
