use anyhow::{anyhow, Context, Result};
use clap::Parser;
use screenflow::config::{
    default_config, default_config_path, resolve_config, resolve_engine_command, write_config,
    ScreenflowConfig,
};
use screenflow::session::{ReviewSession, SessionOptions};
use screenflow::status::StageView;
use screenflow::{
    DecisionQueue, EditSession, Operation, QueueKind, ReviewEngine, ReviewPipeline, StdioEngine,
    StdioEngineConfig,
};
use std::collections::BTreeMap;
use std::io;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Command, EditScreenArgs, GlobalArgs, InfoArgs, RootArgs, StatusArgs};

const LOG_ENV: &str = "SCREENFLOW_LOG";

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(args.global.verbose);

    if let Command::InitConfig(init) = &args.command {
        return cmd_init_config(&args.global, init.force);
    }

    let config = resolve_config(args.global.config.as_deref())?;
    let mut engine = connect(&args.global, &config)?;
    let started = Instant::now();
    let result = match args.command {
        Command::Ping => cmd_ping(&mut engine),
        Command::Status(status) => cmd_status(&mut engine, &config, &status),
        Command::Info(info) => cmd_info(&mut engine, &info),
        Command::Prescreen(prescreen) => cmd_review(
            &mut engine,
            QueueKind::Prescreen,
            prescreen.limit.unwrap_or(config.queue_limit),
            SessionOptions {
                enrich_ahead: prescreen.enrich_ahead,
            },
        ),
        Command::Screen(screen) => cmd_review(
            &mut engine,
            QueueKind::Screen,
            screen.limit.unwrap_or(config.queue_limit),
            SessionOptions::default(),
        ),
        Command::EditScreen(edit) => cmd_edit_screen(&mut engine, &edit),
        Command::Enrich(enrich) => cmd_enrich(&mut engine, &enrich.ids),
        Command::InitConfig(_) => Ok(()),
    };
    engine.shutdown();
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        ok = result.is_ok(),
        "command finished"
    );
    result
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .init();
}

fn connect(global: &GlobalArgs, config: &ScreenflowConfig) -> Result<StdioEngine> {
    let command = resolve_engine_command(global.engine.as_deref(), config)?;
    let project_id = global
        .project
        .clone()
        .or_else(|| config.project_id.clone())
        .ok_or_else(|| anyhow!("no project id; pass --project or set project_id in the config"))?;
    let base_path = global
        .base_path
        .clone()
        .or_else(|| config.base_path.clone())
        .ok_or_else(|| anyhow!("no base path; pass --base-path or set base_path in the config"))?;
    let engine_config = StdioEngineConfig::new(command, project_id, base_path)
        .with_call_timeout(config.call_timeout());
    StdioEngine::spawn(engine_config).context("start review engine")
}

fn cmd_init_config(global: &GlobalArgs, force: bool) -> Result<()> {
    let path = global
        .config
        .clone()
        .or_else(default_config_path)
        .ok_or_else(|| anyhow!("no config directory on this platform; pass --config"))?;
    if path.exists() && !force {
        return Err(anyhow!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    let config = ScreenflowConfig {
        engine_command: global.engine.clone(),
        project_id: global.project.clone(),
        base_path: global.base_path.clone(),
        ..default_config()
    };
    write_config(&path, &config)?;
    println!("wrote: {}", path.display());
    Ok(())
}

fn cmd_ping(engine: &mut StdioEngine) -> Result<()> {
    let started = Instant::now();
    engine.ping().context("ping engine")?;
    println!("engine: ok");
    println!("elapsed_ms: {}", started.elapsed().as_millis());
    Ok(())
}

fn cmd_status(
    engine: &mut StdioEngine,
    config: &ScreenflowConfig,
    args: &StatusArgs,
) -> Result<()> {
    let report = engine.get_status().context("get status")?;
    let snapshot = report.snapshot();
    let facts = engine.operation_facts();
    let view = ReviewPipeline::new(config.exemptions.clone()).view(Some(&snapshot), &facts);
    let blocked: BTreeMap<&str, &str> = facts
        .iter()
        .filter_map(|(name, facts)| Some((name.as_str(), facts.block_reason()?)))
        .collect();

    if args.json {
        let payload = serde_json::json!({
            "pipeline": view,
            "blocked": blocked,
            "completeness_condition": report.completeness_condition,
            "has_changes": report.has_changes,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("total_records: {}", view.total_records);
    println!("import_complete: {}", view.import_complete);
    println!(
        "next_operation: {}",
        view.next_operation
            .map(|operation| operation.as_str())
            .unwrap_or("none")
    );
    println!("stages:");
    for stage in &view.stages {
        print_stage(stage, 1);
    }
    for (name, reason) in &blocked {
        println!("blocked: {name}: {reason}");
    }
    if report.has_changes {
        println!("uncommitted_changes: true");
    }
    Ok(())
}

fn print_stage(stage: &StageView, depth: usize) {
    println!("{}{}: {}", "  ".repeat(depth), stage.id, stage.status);
    for sub in &stage.sub_stages {
        print_stage(sub, depth + 1);
    }
}

fn cmd_info(engine: &mut StdioEngine, args: &InfoArgs) -> Result<()> {
    let operation = Operation::parse(&args.operation).ok_or_else(|| {
        let known: Vec<&str> = Operation::ALL.iter().map(Operation::as_str).collect();
        anyhow!(
            "unknown operation {:?} (expected one of: {})",
            args.operation,
            known.join(", ")
        )
    })?;
    let facts = engine
        .get_operation_info(operation)
        .with_context(|| format!("get info for {operation}"))?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&facts)?);
        return Ok(());
    }
    println!("operation: {operation}");
    println!(
        "description: {}",
        facts
            .description
            .as_deref()
            .unwrap_or(operation.description())
    );
    println!("can_run: {}", facts.can_run);
    println!("affected_records: {}", facts.affected_records);
    if let Some(reason) = facts.block_reason() {
        println!("blocked: {reason}");
    }
    Ok(())
}

fn cmd_review(
    engine: &mut StdioEngine,
    kind: QueueKind,
    limit: usize,
    options: SessionOptions,
) -> Result<()> {
    let queue = DecisionQueue::load(engine, kind, limit)
        .with_context(|| format!("load {kind} queue"))?;
    if queue.is_empty() {
        println!("{kind}: no records waiting");
        return Ok(());
    }
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut session = ReviewSession::new(engine, queue, options);
    session.run(stdin.lock(), &mut stdout)?;
    Ok(())
}

fn cmd_edit_screen(engine: &mut StdioEngine, args: &EditScreenArgs) -> Result<()> {
    let mut session = EditSession::load(engine).context("load screen decisions")?;
    for record_id in &args.toggle {
        let decision = session.toggle(record_id)?;
        tracing::debug!(record_id = %record_id, decision = decision.as_str(), "toggled");
    }
    let changes = session.changeset();
    if args.dry_run {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&changes)?);
        } else {
            for change in &changes {
                println!("would_set: {} {}", change.record_id, change.decision);
            }
            println!("changes: {}", changes.len());
        }
        session.close();
        return Ok(());
    }

    let report = session.save(engine).context("save screen decisions")?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for record_id in &report.applied {
            println!("applied: {record_id}");
        }
        for record_id in &report.unchanged {
            println!("unchanged: {record_id}");
        }
        for skip in &report.skipped {
            println!("skipped: {} ({})", skip.record_id, skip.reason);
        }
    }
    let unsaved = session.close();
    if let Some(class) = report.class() {
        return Err(anyhow!("{class}: {unsaved} change(s) were skipped by the engine"));
    }
    Ok(())
}

fn cmd_enrich(engine: &mut StdioEngine, ids: &[String]) -> Result<()> {
    let report = engine.batch_enrich_records(ids).context("enrich records")?;
    for result in &report.records {
        if result.success {
            println!("enriched: {}", result.record_id);
        } else {
            let error = result.error.as_deref().unwrap_or("no reason given");
            println!("failed: {} ({error})", result.record_id);
        }
    }
    println!("enriched_count: {}", report.enriched_count);
    println!("failed_count: {}", report.failed_count);
    Ok(())
}
