use crate::cli::skills::skill_source;
use crate::cli::{load_config, RunArgs};
use crate::config::Provider;
use crate::output::{build_summary, render_summary, write_run_report};
use crate::provider::create_reasoner;
use crate::runner::{Orchestrator, RunOptions};
use crate::state::{Checkpointer, FileCheckpointer, MemoryCheckpointer};
use crate::telemetry::{FanoutSink, LogSink, MetricsSink, TraceSink};
use std::sync::Arc;
use tracing::{info, warn};

pub async fn execute(args: RunArgs, verbose: bool) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    // Apply CLI overrides
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(timeout_sec) = args.timeout_sec {
        config.timeout_sec = timeout_sec;
    }
    if let Some(provider) = args.provider {
        config.provider = provider;
    }
    if let Some(fixture) = args.fixture {
        config.provider = Provider::Fixture;
        config.providers.fixture.path = Some(fixture);
    }
    if let Some(root) = args.skills_root {
        config.skills.root = root;
    }
    if let Some(report_dir) = args.report_dir {
        config.report_dir = report_dir;
    }

    config.validate()?;

    let metrics = Arc::new(MetricsSink::default());
    let sink: Arc<dyn TraceSink> =
        Arc::new(FanoutSink::new(vec![Arc::new(LogSink), metrics.clone()]));

    let reasoner = create_reasoner(&config)?;
    info!("Using provider {} in {} mode", reasoner.name(), config.mode);

    let checkpointer: Arc<dyn Checkpointer> = if args.no_write {
        Arc::new(MemoryCheckpointer::default())
    } else {
        Arc::new(FileCheckpointer::new(&config.checkpoint_dir))
    };

    let orchestrator = Orchestrator::new(reasoner, skill_source(&config), sink, checkpointer)
        .with_repair_estimate(config.valuation.repair_estimate);
    let options = RunOptions {
        mode: config.mode,
        thread_id: args.thread_id,
        resume: args.resume,
    };

    let report = tokio::select! {
        result = orchestrator.run(&args.parcel, &options) => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; discarding run for {}", args.parcel);
            anyhow::bail!("run for {} cancelled", args.parcel);
        }
    };

    if let Some(markdown) = &report.state.report {
        println!("{}", markdown);
    }

    let summary = build_summary(&report, verbose.then(|| metrics.summary()));
    eprintln!("\n{}", render_summary(&summary));

    if !args.no_write {
        let path = write_run_report(&config.report_dir, &report.state)?;
        eprintln!("Report written to {}", path.display());
    }

    // analysis outcome never affects the exit code
    Ok(())
}
