//! Wayfarer - 多智能体旅行规划命令行
//!
//! 入口：解析参数、初始化日志、构建 TripPlanner，生成行程后打印或写入 Markdown 文件。

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use wayfarer::coordinator::PlanEvent;
use wayfarer::plan::document_file_name;
use wayfarer::{observability, TripPlanner, TripRequest};

#[derive(Parser, Debug)]
#[command(name = "wayfarer", version, about = "Plan a trip with a team of AI travel agents")]
struct Cli {
    /// Destination, e.g. "Tokyo"
    destination: String,

    /// Number of days
    #[arg(short, long, default_value_t = 3)]
    days: u32,

    /// Budget in USD
    #[arg(short, long, default_value_t = 1000.0)]
    budget: f64,

    /// Special preferences (food, pace, interests...)
    #[arg(short, long)]
    preferences: Option<String>,

    /// Extra config file layered over config/default.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the plan to this file, or into this directory under the suggested name
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    observability::init(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Failed to generate trip plan: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let request = TripRequest::new(&cli.destination, cli.days, cli.budget, cli.preferences.clone())?;
    let planner = TripPlanner::from_config(cli.config.clone()).context("Failed to set up planner")?;

    // Ctrl-C 取消当前请求
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<PlanEvent>();
    let progress = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            print_progress(&event);
        }
    });

    let result = planner.generate_with(&request, Some(&event_tx), cancel).await;
    drop(event_tx);
    let _ = progress.await;
    let plan = result?;

    let document = plan.to_document();
    match cli.output {
        Some(path) => {
            let path = if path.is_dir() {
                path.join(document_file_name(&plan.destination))
            } else {
                path
            };
            std::fs::write(&path, &document)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Trip plan saved to {}", path.display());
        }
        None => print!("{}", document),
    }
    Ok(())
}

fn print_progress(event: &PlanEvent) {
    match event {
        PlanEvent::TurnUpdate { turn, max_turns } => eprintln!("[turn {}/{}]", turn, max_turns),
        PlanEvent::SpecialistStarted { role } => eprintln!("  {} working...", role.display_name()),
        PlanEvent::SpecialistFinished { role, degraded, .. } => {
            let status = if *degraded { "failed" } else { "done" };
            eprintln!("  {} {}", role.display_name(), status);
        }
        PlanEvent::Recovery { action, .. } => eprintln!("  retrying ({})", action),
        PlanEvent::Finished { .. } | PlanEvent::Error { .. } => {}
    }
}
