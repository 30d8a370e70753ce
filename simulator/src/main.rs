use anyhow::Context;
use bridge::server::{bridge_bind_address, TelemetryBridge};
use clap::Parser;
use generator::profile::ScenarioKind;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::runner::{Runner, ScenarioSummary};

mod bridge;
mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Adversarial batch driver for the telemetry guard")]
struct Args {
    /// Replay every configured scenario on a fresh state and emit a summary
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long, default_value_t = 240)]
    max_buffer: usize,
    #[arg(long, default_value_t = 64)]
    batch_size: usize,
    #[arg(long, default_value_t = 4)]
    batches: usize,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Keep the HTTP bridge alive for incoming batches
    #[arg(long, default_value_t = false)]
    serve: bool,
}

fn summary_line(summary: &ScenarioSummary) -> String {
    format!(
        "scenario={} batches={} offered={} emitted={} rejected={} filtered={} evicted={} backpressure={} sustained={} center={:.3} spread={:.3} buffer={} max={}",
        summary.scenario.name(),
        summary.batches,
        summary.offered,
        summary.emitted,
        summary.rejected,
        summary.filtered,
        summary.evicted,
        summary.backpressure_calls,
        summary.sustained,
        summary.center,
        summary.spread,
        summary.buffer_len,
        summary
            .max_emitted
            .map_or_else(|| "-".to_string(), |max| format!("{:.3}", max)),
    )
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = if let Some(path) = args.workflow {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::from_args(args.max_buffer, args.batch_size, args.batches, args.seed)
    };

    let runner = Arc::new(Runner::new(workflow_config.clone())?);
    let bridge = TelemetryBridge::new(runner.clone());

    if args.offline {
        let summaries = runner.run_workflow().context("running offline workflow")?;
        let mut report = String::new();
        for summary in &summaries {
            let line = summary_line(summary);
            println!("Offline run -> {}", line);
            report.push_str(&line);
            report.push('\n');
        }

        // the shared state gets one heavy-tail batch so the bridge has a view
        let probe = workflow_config.generator_for(ScenarioKind::HeavyTail, 0);
        let result = runner.execute_generated(&probe)?;
        bridge.publish(&result)?;
        bridge.publish_status("Offline workflow results ready.");

        let report_path = PathBuf::from("tools/data/guard_report.log");
        if let Some(parent) = report_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&report_path)
            .with_context(|| format!("opening {}", report_path.display()))?;
        file.write_all(report.as_bytes())
            .context("appending offline report")?;
    }
    if args.serve {
        let _server = bridge.serve(bridge_bind_address())?;
        bridge.publish_status("HTTP bridge running (Ctrl+C to stop)...");
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}
