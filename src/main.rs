//! taskloop：把一个自然语言任务拆成计划，逐步用工具执行
//!
//! 入口：加载配置、初始化日志、构建编排器，后台任务把过程事件打印到控制台。
//! 退出码：0 = 完成或计划执行完；2 = 规划失败；1 = 致命错误。

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use taskloop::config::{load_config, WireFormat};
use taskloop::react::ReactEvent;
use taskloop::{AgentBuilder, RunOutcome};

#[derive(Parser, Debug)]
#[command(name = "taskloop", version, about = "Plan a task, then execute it step by step with tools")]
struct Cli {
    /// 要完成的任务
    #[arg(short, long)]
    task: String,

    /// 额外的配置文件（覆盖 config/default.toml）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 动作线格式
    #[arg(long, value_enum)]
    format: Option<WireFormat>,

    /// 每步最大迭代数
    #[arg(long)]
    max_loops: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut cfg = load_config(cli.config.clone()).context("Failed to load configuration")?;
    if let Some(format) = cli.format {
        cfg.agent.wire_format = format;
    }
    if let Some(max_loops) = cli.max_loops {
        cfg.agent.max_loops_per_step = max_loops;
    }

    let log_file = taskloop::observability::init(&cfg.logging).context("Failed to initialize logging")?;

    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(ev) = event_rx.recv().await {
            print_event(&ev);
        }
    });

    let orchestrator = AgentBuilder::new(cfg)
        .with_event_tx(event_tx)
        .build()
        .context("Failed to build agent")?;

    let result = orchestrator.run(&cli.task).await;
    let (prompt_tokens, completion_tokens, total_tokens) = orchestrator.token_usage();
    tracing::info!(prompt_tokens, completion_tokens, total_tokens, "token usage");
    // 关闭事件通道，等待打印任务把剩余事件输出完
    drop(orchestrator);
    let _ = printer.await;

    let outcome = result.context("Run aborted")?;
    let code = match &outcome {
        RunOutcome::Finished { steps_run, .. } => {
            println!("\n=== Task finished after {} step(s) ===", steps_run);
            ExitCode::SUCCESS
        }
        RunOutcome::PlanExhausted { steps_run, .. } => {
            println!(
                "\n=== Plan executed ({} step(s)) without an explicit finish; full transcript follows ===",
                steps_run
            );
            ExitCode::SUCCESS
        }
        RunOutcome::PlanningFailed { .. } => ExitCode::from(2),
    };
    println!("{}", outcome.result_text());
    eprintln!(
        "Tokens: {} prompt + {} completion = {}",
        prompt_tokens, completion_tokens, total_tokens
    );
    eprintln!("Log file: {}", log_file.display());
    Ok(code)
}

fn print_event(ev: &ReactEvent) {
    match ev {
        ReactEvent::PlanReady { steps } => {
            println!("Plan:");
            for (i, s) in steps.iter().enumerate() {
                println!("  {}. {}", i + 1, s);
            }
        }
        ReactEvent::StepStarted {
            step,
            total,
            description,
        } => println!("\n[step {}/{}] {}", step, total, description),
        ReactEvent::Thinking {
            iteration,
            max_loops,
        } => println!("  thinking ({}/{})...", iteration, max_loops),
        ReactEvent::Thought { text } => println!("  thought: {}", text),
        ReactEvent::ToolCall { tool, args } => println!("  action: {} {}", tool, args),
        ReactEvent::Observation { preview, .. } => println!("  observation: {}", preview),
        ReactEvent::Recoverable { kind, detail } => println!("  recovered from {}: {}", kind, detail),
        ReactEvent::StepFinished {
            step,
            signal,
            iterations,
        } => println!("[step {}] {} after {} iteration(s)", step, signal, iterations),
    }
}
