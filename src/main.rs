use clap::Parser;
use std::{fs, path::PathBuf, process, time::Instant};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod artifact;
mod cli;
mod complexity;
mod config;
mod error;
mod execution;
mod notify;
mod output;
mod report;
mod task;
mod util;

use artifact::{to_json_string, write_json_artifact};
use cli::{Cli, Command, DepsArgs, ReportArgs, ScoreArgs, ValidateArgs, ValidatorArgs};
use complexity::{ComplexityScorer, TaskMetrics};
use config::{AuditConfiguration, load_config};
use error::Result;
use execution::{Classifier, ExecutionValidator, LocalFiles, normalize_task_type};
use notify::{RunSummary, TaskOutcome, WebhookNotifier, build_payload};
use output::OutputMode;
use report::ExecutionRecord;
use task::{DependencyReport, FailedSet, TaskGraph, TaskStatus, analyze, load_snapshot, render_dependency_report};
use util::{expand_globs, parse_timeout};

const DEFAULT_NOTIFY_TIMEOUT: &str = "10s";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    match run_audit(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_audit(args: Cli) -> Result<()> {
    let (config_path, explicit) = args.config_path();
    let config = load_config(config_path, explicit)?;

    match args.command {
        Command::Deps(deps) => run_deps(deps),
        Command::Validate(validate) => run_validate(validate, &config),
        Command::Score(score) => run_score(score, &config),
        Command::Report(report) => run_report(report, &config).await,
    }
}

fn run_deps(args: DepsArgs) -> Result<()> {
    let tasks = load_snapshot(&args.snapshot)?;
    let graph = TaskGraph::new(&tasks);

    let failed: FailedSet = if args.failed.is_empty() {
        graph.failed_ids()
    } else {
        args.failed.into_iter().collect()
    };

    for id in failed.iter().filter(|id| !graph.contains(id)) {
        warn!("Failed task '{}' is not in the snapshot", id);
    }

    let analysis = analyze(&tasks, &failed);
    let report = DependencyReport::new(&graph, &analysis, &failed);

    match args.output {
        OutputMode::Text => println!("{}", render_dependency_report(&report)),
        OutputMode::Json => println!("{}", to_json_string(&report)?),
    }

    if let Some(path) = &args.json {
        write_json_artifact(&report, path)?;
    }

    Ok(())
}

fn build_validator(config: &AuditConfiguration, root: Option<PathBuf>) -> Result<ExecutionValidator> {
    let settings = &config.validator;
    let classifier = Classifier::with_overrides(
        settings.implementation_patterns.as_deref(),
        settings.avoidance_patterns.as_deref(),
        settings.path_patterns.as_deref(),
    )?;

    let root = root
        .or_else(|| settings.root.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    debug!("Resolving claimed files against {}", root.display());

    Ok(ExecutionValidator::new(classifier, LocalFiles::new(root)))
}

fn validate_outputs(args: ValidatorArgs, config: &AuditConfiguration) -> Result<Vec<ExecutionRecord>> {
    let validator = build_validator(config, args.root)?;
    let task_type = normalize_task_type(
        args.task_type
            .as_deref()
            .or(config.validator.task_type.as_deref())
            .unwrap_or_default(),
    );

    let files = expand_globs(&args.outputs)?;
    if files.is_empty() {
        warn!("No worker outputs matched the given paths");
    }

    let mut records = Vec::with_capacity(files.len());
    for file in files {
        let output = fs::read_to_string(&file)?;
        let validation = validator.validate(&output, &task_type);
        records.push(ExecutionRecord {
            source: file.display().to_string(),
            task_type: task_type.clone(),
            validation,
        });
    }

    Ok(records)
}

fn run_validate(args: ValidateArgs, config: &AuditConfiguration) -> Result<()> {
    let records = validate_outputs(args.validator, config)?;

    match args.output {
        OutputMode::Json => println!("{}", to_json_string(&records)?),
        OutputMode::Text => {
            for record in &records {
                let result = &record.validation;
                let verdict = if result.executed { "executed" } else { "only analyzed" };
                println!(
                    "{}: {} (confidence {:.2})",
                    record.source, verdict, result.confidence
                );
                for file in &result.files_created {
                    println!("  created: {}", file.display());
                }
                for issue in &result.issues {
                    println!("  issue: {}", issue);
                }
            }
        }
    }

    Ok(())
}

fn run_score(args: ScoreArgs, config: &AuditConfiguration) -> Result<()> {
    let scorer = match &config.weights {
        Some(weights) => ComplexityScorer::default().update_weights(weights)?,
        None => ComplexityScorer::default(),
    };
    debug!("Scoring with weights {:?}", scorer.weights());

    let metrics = TaskMetrics {
        input_size: args.input_size,
        compute_intensity: args.compute_intensity,
        output_size: args.output_size,
        time_sensitivity: args.time_sensitivity,
        resource_dependencies: args.resource_dependencies,
    };
    let result = scorer.score(&metrics);

    match args.output {
        OutputMode::Json => println!("{}", to_json_string(&result)?),
        OutputMode::Text => {
            println!("Score: {:.2} ({})", result.score, result.level);
            for (factor, contribution) in &result.breakdown {
                println!("  {:<9} {:>6.2}", factor, contribution);
            }
        }
    }

    Ok(())
}

async fn run_report(args: ReportArgs, config: &AuditConfiguration) -> Result<()> {
    let started = Instant::now();
    let records = validate_outputs(args.validator, config)?;

    println!("{}", report::generate(&records));

    let Some(webhook) = args.webhook.as_deref().or(config.notify.webhook.as_deref()) else {
        return Ok(());
    };

    let timeout = parse_timeout(config.notify.timeout.as_deref(), Some(DEFAULT_NOTIFY_TIMEOUT));
    let notifier = WebhookNotifier::new(webhook, timeout)?;

    let summary = RunSummary {
        title: "Execution report".to_string(),
        tasks: records
            .iter()
            .enumerate()
            .map(|(index, record)| TaskOutcome {
                id: (index + 1).to_string(),
                title: record.source.clone(),
                status: if record.validation.executed {
                    TaskStatus::Done
                } else {
                    TaskStatus::from("analyzed")
                },
            })
            .collect(),
        follow_ups: args.follow_ups,
        elapsed: started.elapsed(),
    };

    let payload = build_payload(&summary, config.notify.icon_emoji.as_deref());
    notifier.send_required(&payload).await?;
    println!("Notification sent to {}", webhook);

    Ok(())
}
