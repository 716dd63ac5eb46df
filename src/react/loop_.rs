//! 单步 ReAct 循环
//!
//! Thinking（调用 LLM）-> Acting（分发工具）-> Observing（记录观察、判断是否结束），最多 max_loops 轮。
//! 传输失败、格式错误、未知工具、工具失败都写成 Observation 继续下一轮；只有配置级错误会以 Err 返回。
//! 结束方式：终止工具（Finished）、启发式命中（Continuing）、预算耗尽（Exhausted）。

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::core::{AgentError, CompletionSignal, LoopPhase};
use crate::llm::{in_band_error, LlmClient, LlmError};
use crate::memory::{EntryKind, HistoryEntry, HistoryWindow};
use crate::react::parser::{JsonFenceParser, ResponseParser};
use crate::react::termination::{CompletionHeuristic, KeywordHeuristic};
use crate::react::{prompt, ReactEvent};
use crate::tools::ToolExecutor;

/// 默认每步最大迭代数
pub const DEFAULT_MAX_LOOPS: usize = 10;
/// Observation 事件预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// 一个步骤的执行结果
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// 本步新增的历史（按产生顺序）
    pub entries: Vec<HistoryEntry>,
    pub signal: CompletionSignal,
    pub iterations: usize,
    /// 启发式提前结束时命中的标记
    pub completion_marker: Option<String>,
}

impl StepOutcome {
    pub fn is_finished(&self) -> bool {
        self.signal.is_finished()
    }

    pub fn summary(&self) -> Option<&str> {
        match &self.signal {
            CompletionSignal::Finished { summary } => Some(summary),
            _ => None,
        }
    }
}

/// 步骤执行器：持有 LLM、工具执行器、解析策略与完成启发式
pub struct StepExecutor {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolExecutor>,
    parser: Arc<dyn ResponseParser>,
    heuristic: Arc<dyn CompletionHeuristic>,
    window: HistoryWindow,
    max_loops: usize,
    event_tx: Option<UnboundedSender<ReactEvent>>,
}

impl StepExecutor {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolExecutor>) -> Self {
        Self {
            llm,
            tools,
            parser: Arc::new(JsonFenceParser),
            heuristic: Arc::new(KeywordHeuristic::default()),
            window: HistoryWindow::unbounded(),
            max_loops: DEFAULT_MAX_LOOPS,
            event_tx: None,
        }
    }

    pub fn with_parser(mut self, parser: Arc<dyn ResponseParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_heuristic(mut self, heuristic: Arc<dyn CompletionHeuristic>) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn with_window(mut self, window: HistoryWindow) -> Self {
        self.window = window;
        self
    }

    /// 至少 1 轮
    pub fn with_max_loops(mut self, max_loops: usize) -> Self {
        self.max_loops = max_loops.max(1);
        self
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn max_loops(&self) -> usize {
        self.max_loops
    }

    fn send(&self, ev: ReactEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ev);
        }
    }

    /// 执行计划中的第 step_index 步（1 起）；prior 为之前所有步骤的历史，只读
    pub async fn run_step(
        &self,
        task: &str,
        plan: &[String],
        step_index: usize,
        prior: &[HistoryEntry],
    ) -> Result<StepOutcome, AgentError> {
        if step_index == 0 || step_index > plan.len() {
            return Err(AgentError::Planning(format!(
                "step {} is outside a plan of {} steps",
                step_index,
                plan.len()
            )));
        }

        let registry = self.tools.registry();
        let tool_names = registry.names();
        let tools_list = tool_names.join(", ");
        let instructions = prompt::executor_instructions(
            &registry.describe_for_prompt(),
            &registry.to_schema_json(),
            &self.parser.format_instructions(),
        );

        let mut local: Vec<HistoryEntry> = Vec::new();

        for iteration in 1..=self.max_loops {
            tracing::debug!(step = step_index, iteration, phase = %LoopPhase::Thinking, "react phase");
            self.send(ReactEvent::Thinking {
                iteration,
                max_loops: self.max_loops,
            });

            let history = self.window.render(prior, &local);
            let user_prompt = prompt::step_prompt(task, plan, step_index, &history, &tools_list);

            let reply = match self.llm.complete(&user_prompt, &instructions, &[]).await {
                Ok(text) => match in_band_error(&text).map(str::to_string) {
                    Some(detail) => Err(detail),
                    None => Ok(text),
                },
                Err(LlmError::Config(msg)) => return Err(AgentError::Config(msg)),
                Err(e) => Err(e.to_string()),
            };
            let reply = match reply {
                Ok(text) => text,
                Err(detail) => {
                    tracing::warn!(step = step_index, iteration, error = %detail, "reasoning engine call failed");
                    self.recoverable("transport", &detail);
                    local.push(HistoryEntry::observation_only(
                        step_index,
                        iteration,
                        EntryKind::TransportFailure,
                        format!("Error: the reasoning engine call failed: {}", detail),
                    ));
                    continue;
                }
            };

            let parsed = match self.parser.parse(&reply) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!(step = step_index, iteration, parser = self.parser.name(), error = %e, "unparsable response");
                    self.recoverable("parse", &e.to_string());
                    local.push(HistoryEntry::observation_only(
                        step_index,
                        iteration,
                        EntryKind::ParseFailure,
                        format!("Error: {} ({}).", self.parser.correction_hint(), e),
                    ));
                    continue;
                }
            };

            let action = parsed.action;
            let thought = parsed.thought;
            tracing::info!(step = step_index, iteration, thought = %thought, "thought");
            tracing::info!(step = step_index, iteration, tool = %action.name, args = %serde_json::Value::Object(action.args.clone()), "action");
            self.send(ReactEvent::Thought {
                text: thought.clone(),
            });
            self.send(ReactEvent::ToolCall {
                tool: action.name.clone(),
                args: serde_json::Value::Object(action.args.clone()),
            });

            if !self.tools.contains(&action.name) {
                let observation = format!(
                    "Error: tool '{}' does not exist. Available tools: {}",
                    action.name, tools_list
                );
                tracing::warn!(step = step_index, iteration, tool = %action.name, "unknown tool");
                self.recoverable("unknown_tool", &action.name);
                local.push(HistoryEntry {
                    step: step_index,
                    iteration,
                    kind: EntryKind::UnknownTool,
                    thought: Some(thought),
                    action: Some(action),
                    observation,
                });
                continue;
            }

            tracing::debug!(step = step_index, iteration, phase = %LoopPhase::Acting, "react phase");
            let inv = self.tools.invoke(&action).await;

            tracing::debug!(step = step_index, iteration, phase = %LoopPhase::Observing, "react phase");
            tracing::info!(step = step_index, iteration, tool = %action.name, observation = %inv.observation, "observation");
            self.send(ReactEvent::Observation {
                tool: action.name.clone(),
                preview: preview(&inv.observation),
            });

            let kind = if inv.terminal_summary.is_some() {
                EntryKind::Terminal
            } else if inv.is_ok() {
                EntryKind::ToolObservation
            } else {
                EntryKind::ToolFailure
            };
            let completion_marker = if kind == EntryKind::ToolObservation {
                self.heuristic.step_complete(&inv.observation)
            } else {
                None
            };
            local.push(HistoryEntry {
                step: step_index,
                iteration,
                kind,
                thought: Some(thought),
                action: Some(action),
                observation: inv.observation,
            });

            if let Some(summary) = inv.terminal_summary {
                tracing::info!(step = step_index, iteration, "terminal tool invoked, run finished");
                return Ok(self.conclude(step_index, local, CompletionSignal::Finished { summary }, iteration, None));
            }
            if let Some(marker) = completion_marker {
                tracing::info!(step = step_index, iteration, marker = %marker, "observation suggests the step is complete");
                return Ok(self.conclude(step_index, local, CompletionSignal::Continuing, iteration, Some(marker)));
            }
        }

        tracing::warn!(step = step_index, max_loops = self.max_loops, "iteration budget exhausted");
        Ok(self.conclude(step_index, local, CompletionSignal::Exhausted, self.max_loops, None))
    }

    fn recoverable(&self, kind: &str, detail: &str) {
        self.send(ReactEvent::Recoverable {
            kind: kind.to_string(),
            detail: detail.to_string(),
        });
    }

    fn conclude(
        &self,
        step: usize,
        entries: Vec<HistoryEntry>,
        signal: CompletionSignal,
        iterations: usize,
        completion_marker: Option<String>,
    ) -> StepOutcome {
        self.send(ReactEvent::StepFinished {
            step,
            signal: signal.label().to_string(),
            iterations,
        });
        StepOutcome {
            entries,
            signal,
            iterations,
            completion_marker,
        }
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > OBSERVATION_PREVIEW_CHARS {
        format!(
            "{}...",
            text.chars().take(OBSERVATION_PREVIEW_CHARS).collect::<String>()
        )
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use crate::react::parser::XmlTagParser;
    use crate::react::termination::NoHeuristic;
    use crate::tools::params::{ParamKind, ParamSpec};
    use crate::tools::{FinishTool, Tool, ToolArgs, ToolRegistry};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 记录调用次数的回显工具
    struct Echo(Arc<AtomicUsize>);

    const ECHO_PARAMS: &[ParamSpec] = &[ParamSpec::required("text", ParamKind::String, "text")];

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo text back"
        }
        fn parameters(&self) -> &[ParamSpec] {
            ECHO_PARAMS
        }
        async fn execute(&self, args: ToolArgs) -> Result<String, String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(args["text"].as_str().unwrap_or_default().to_string())
        }
    }

    fn executor(replies: Vec<String>) -> (StepExecutor, Arc<ScriptedLlmClient>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut reg = ToolRegistry::new();
        reg.register(Echo(calls.clone())).unwrap();
        reg.register(FinishTool::new()).unwrap();
        let llm = Arc::new(ScriptedLlmClient::new(replies));
        let exec = StepExecutor::new(llm.clone(), Arc::new(ToolExecutor::new(reg, 10)));
        (exec, llm, calls)
    }

    fn act(tool: &str, args: &str) -> String {
        format!(
            "```json\n{{\"thought\": \"use {tool}\", \"action\": {{\"name\": \"{tool}\", \"args\": {args}}}}}\n```"
        )
    }

    fn plan() -> Vec<String> {
        vec!["say hi".to_string(), "finish".to_string()]
    }

    #[tokio::test]
    async fn test_terminal_tool_finishes_with_summary() {
        let (exec, _, _) = executor(vec![act("finish", r#"{"summary": "wrote X"}"#)]);
        let out = exec.run_step("t", &plan(), 2, &[]).await.unwrap();
        assert_eq!(out.summary(), Some("wrote X"));
        assert_eq!(out.iterations, 1);
        assert_eq!(out.entries[0].kind, EntryKind::Terminal);
    }

    #[tokio::test]
    async fn test_garbage_exhausts_budget_without_dispatch() {
        let (exec, llm, calls) = executor(vec!["garbage".to_string(); 10]);
        let out = exec.run_step("t", &plan(), 1, &[]).await.unwrap();
        assert_eq!(out.signal, CompletionSignal::Exhausted);
        assert_eq!(out.entries.len(), 10);
        assert!(out.entries.iter().all(|e| e.kind == EntryKind::ParseFailure));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(llm.call_count(), 10);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_never_invoked() {
        let (exec, _, calls) = executor(vec![
            act("teleport", "{}"),
            act("finish", r#"{"summary": "ok"}"#),
        ]);
        let out = exec.run_step("t", &plan(), 1, &[]).await.unwrap();
        assert!(out.is_finished());
        assert_eq!(out.entries[0].kind, EntryKind::UnknownTool);
        assert!(out.entries[0].observation.contains("'teleport'"));
        assert!(out.entries[0].observation.contains("echo, finish"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_heuristic_exit_is_not_finished() {
        let (exec, _, _) = executor(vec![act("echo", r#"{"text": "Task DONE"}"#)]);
        let out = exec.run_step("t", &plan(), 1, &[]).await.unwrap();
        assert_eq!(out.signal, CompletionSignal::Continuing);
        assert_eq!(out.completion_marker.as_deref(), Some("done"));
        assert_eq!(out.iterations, 1);
    }

    #[tokio::test]
    async fn test_heuristic_can_be_disabled() {
        let (exec, _, calls) = executor(vec![act("echo", r#"{"text": "done"}"#); 3]);
        let exec = exec.with_heuristic(Arc::new(NoHeuristic)).with_max_loops(3);
        let out = exec.run_step("t", &plan(), 1, &[]).await.unwrap();
        assert_eq!(out.signal, CompletionSignal::Exhausted);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_heuristic_ignores_failed_tools() {
        // 缺少必需参数：观察里虽有 "complete" 字样也不提前结束
        let (exec, _, _) = executor(vec![act("echo", r#"{"note": "complete"}"#)]);
        let out = exec.with_max_loops(1).run_step("t", &plan(), 1, &[]).await.unwrap();
        assert_eq!(out.signal, CompletionSignal::Exhausted);
        assert_eq!(out.entries[0].kind, EntryKind::ToolFailure);
        assert!(out.entries[0].observation.starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_transport_errors_are_recoverable() {
        let llm = Arc::new(
            ScriptedLlmClient::new(["Error: upstream 503"])
                .then_error(LlmError::Timeout(30))
                .then_reply(act("finish", r#"{"summary": "recovered"}"#)),
        );
        let mut reg = ToolRegistry::new();
        reg.register(FinishTool::new()).unwrap();
        let exec = StepExecutor::new(llm, Arc::new(ToolExecutor::new(reg, 10)));
        let out = exec.run_step("t", &plan(), 1, &[]).await.unwrap();
        assert_eq!(out.summary(), Some("recovered"));
        assert_eq!(out.entries[0].kind, EntryKind::TransportFailure);
        assert!(out.entries[0].observation.contains("upstream 503"));
        assert_eq!(out.entries[1].kind, EntryKind::TransportFailure);
        assert_eq!(out.iterations, 3);
    }

    #[tokio::test]
    async fn test_config_error_aborts() {
        let llm = Arc::new(
            ScriptedLlmClient::new(Vec::<String>::new())
                .with_fallback_error(LlmError::Config("no api key".into())),
        );
        let exec = StepExecutor::new(llm, Arc::new(ToolExecutor::new(ToolRegistry::new(), 10)));
        let err = exec.run_step("t", &plan(), 1, &[]).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_prompt_carries_prior_history_and_step() {
        let (exec, llm, _) = executor(vec![act("finish", r#"{"summary": "s"}"#)]);
        let prior = vec![HistoryEntry::observation_only(
            1,
            1,
            EntryKind::ToolObservation,
            "earlier observation",
        )];
        exec.run_step("the task", &plan(), 2, &prior).await.unwrap();
        let call = &llm.calls()[0];
        assert!(call.prompt.contains("earlier observation"));
        assert!(call.prompt.contains("Current step to accomplish:\n2. finish"));
        assert!(call.instructions.contains("- echo(text: string): Echo text back"));
    }

    #[tokio::test]
    async fn test_xml_parser_strategy() {
        let (exec, llm, _) = executor(vec![
            "<response><thought>wrap up</thought><action><tool_name>finish</tool_name><parameters><summary>via xml</summary></parameters></action></response>".to_string(),
        ]);
        let exec = exec.with_parser(Arc::new(XmlTagParser));
        let out = exec.run_step("t", &plan(), 2, &[]).await.unwrap();
        assert_eq!(out.summary(), Some("via xml"));
        assert!(llm.calls()[0].instructions.contains("<tool_name>"));
    }

    #[tokio::test]
    async fn test_events_are_emitted() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let (exec, _, _) = executor(vec![act("finish", r#"{"summary": "s"}"#)]);
        exec.with_event_tx(tx).run_step("t", &plan(), 2, &[]).await.unwrap();
        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(serde_json::to_value(&ev).unwrap()["type"].as_str().unwrap().to_string());
        }
        assert_eq!(
            kinds,
            vec!["thinking", "thought", "tool_call", "observation", "step_finished"]
        );
    }

    #[tokio::test]
    async fn test_step_index_out_of_range() {
        let (exec, _, _) = executor(vec![]);
        assert!(exec.run_step("t", &plan(), 0, &[]).await.is_err());
        assert!(exec.run_step("t", &plan(), 3, &[]).await.is_err());
    }
}
