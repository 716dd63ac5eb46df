//! 编排器：一次运行 = 一次规划 + 按顺序逐步执行
//!
//! 计划为空时直接返回 PlanningFailed，不执行任何步骤；每一步的历史无论是否完成都追加到完整历史，
//! 并按值传给后续步骤。任一步调用终止工具即结束运行，后续步骤不再执行。

use tokio::sync::mpsc::UnboundedSender;

use crate::core::{AgentError, CompletionSignal};
use crate::llm::in_band_error;
use crate::memory::History;
use crate::react::{parse_plan, Planner, ReactEvent, StepExecutor};

/// 一次运行的最终结果；不会以错误形式表达“计划执行完但没有显式结束”
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// 终止工具给出的摘要
    Finished { summary: String, steps_run: usize },
    /// 所有步骤执行完但没有终止信号，返回完整记录
    PlanExhausted { transcript: String, steps_run: usize },
    /// 规划失败（单行消息）
    PlanningFailed { message: String },
}

impl RunOutcome {
    /// 面向用户的结果文本
    pub fn result_text(&self) -> &str {
        match self {
            RunOutcome::Finished { summary, .. } => summary,
            RunOutcome::PlanExhausted { transcript, .. } => transcript,
            RunOutcome::PlanningFailed { message } => message,
        }
    }

    pub fn steps_run(&self) -> usize {
        match self {
            RunOutcome::Finished { steps_run, .. } | RunOutcome::PlanExhausted { steps_run, .. } => *steps_run,
            RunOutcome::PlanningFailed { .. } => 0,
        }
    }
}

pub struct Orchestrator {
    planner: Planner,
    executor: StepExecutor,
    event_tx: Option<UnboundedSender<ReactEvent>>,
}

impl Orchestrator {
    pub fn new(planner: Planner, executor: StepExecutor) -> Self {
        Self {
            planner,
            executor,
            event_tx: None,
        }
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn executor(&self) -> &StepExecutor {
        &self.executor
    }

    /// 规划与执行共用同一个 LLM，返回本次运行累计的 (prompt, completion, total) token
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.planner.token_usage()
    }

    fn send(&self, ev: ReactEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ev);
        }
    }

    pub async fn run(&self, task: &str) -> Result<RunOutcome, AgentError> {
        self.run_with_history(task).await.map(|(outcome, _)| outcome)
    }

    /// 同 run，另外返回完整历史（审计用）
    pub async fn run_with_history(&self, task: &str) -> Result<(RunOutcome, History), AgentError> {
        let mut history = History::new();

        let plan_text = self.planner.create_plan(task).await?;
        let plan = parse_plan(&plan_text);
        if plan.is_empty() {
            let reason = in_band_error(&plan_text)
                .map(|e| e.split_whitespace().collect::<Vec<_>>().join(" "))
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "the planner returned an empty plan".to_string());
            let message = format!("Planning failed: {}", reason);
            tracing::error!(%message, "aborting run");
            return Ok((RunOutcome::PlanningFailed { message }, history));
        }

        tracing::info!(steps = plan.len(), "plan ready");
        for (i, step) in plan.iter().enumerate() {
            tracing::info!(step = i + 1, description = %step, "plan step");
        }
        self.send(ReactEvent::PlanReady { steps: plan.clone() });

        for (i, description) in plan.iter().enumerate() {
            let step = i + 1;
            tracing::info!(step, total = plan.len(), description = %description, "step started");
            self.send(ReactEvent::StepStarted {
                step,
                total: plan.len(),
                description: description.clone(),
            });

            let outcome = self
                .executor
                .run_step(task, &plan, step, history.entries())
                .await?;
            tracing::info!(
                step,
                signal = outcome.signal.label(),
                iterations = outcome.iterations,
                "step concluded"
            );
            history.extend(outcome.entries);

            if let CompletionSignal::Finished { summary } = outcome.signal {
                tracing::info!(step, "run finished by terminal tool");
                return Ok((RunOutcome::Finished { summary, steps_run: step }, history));
            }
        }

        tracing::warn!("plan exhausted without an explicit finish");
        let outcome = RunOutcome::PlanExhausted {
            transcript: history.render(),
            steps_run: plan.len(),
        };
        Ok((outcome, history))
    }
}
