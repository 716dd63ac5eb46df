//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时。invoke(action) 永远返回一个 Invocation：参数错误、工具返回 Err、
//! 超时、甚至 panic 都被转成以 `Error:` 开头的 observation 字符串；每次调用输出结构化审计日志（JSON）。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tokio::time::timeout;

use crate::core::AgentError;
use crate::tools::{Action, ToolRegistry};

/// 单次调用的结果分类（审计日志 outcome 字段）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationOutcome {
    Ok,
    Error,
    InvalidArgs,
    UnknownTool,
    Timeout,
    Panic,
}

impl InvocationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationOutcome::Ok => "ok",
            InvocationOutcome::Error => "error",
            InvocationOutcome::InvalidArgs => "invalid_args",
            InvocationOutcome::UnknownTool => "unknown_tool",
            InvocationOutcome::Timeout => "timeout",
            InvocationOutcome::Panic => "panic",
        }
    }
}

/// 一次工具调用的结果；observation 永远非空
#[derive(Debug, Clone)]
pub struct Invocation {
    pub observation: String,
    pub outcome: InvocationOutcome,
    /// 仅当终止工具成功执行时为 Some
    pub terminal_summary: Option<String>,
}

impl Invocation {
    pub fn is_ok(&self) -> bool {
        self.outcome == InvocationOutcome::Ok
    }

    fn failed(observation: String, outcome: InvocationOutcome) -> Self {
        Self {
            observation,
            outcome,
            terminal_summary: None,
        }
    }
}

/// 工具执行器：对每次调用施加超时并隔离失败
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn with_timeout(registry: ToolRegistry, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// 校验参数后执行工具；任何失败都转为 observation，不会向上传播
    pub async fn invoke(&self, action: &Action) -> Invocation {
        let start = Instant::now();
        let tool_name = action.name.as_str();
        let mut args = action.args.clone();

        let tool = match self.registry.validate_args(tool_name, &mut args) {
            Ok(tool) => tool,
            Err(e) => {
                let outcome = match e {
                    AgentError::UnknownTool(_) => InvocationOutcome::UnknownTool,
                    _ => InvocationOutcome::InvalidArgs,
                };
                let inv = Invocation::failed(format!("Error: {}", e), outcome);
                audit(tool_name, &action.args, &inv, start);
                return inv;
            }
        };

        let summary = tool.terminal_summary(&args);
        let guarded = AssertUnwindSafe(tool.execute(args)).catch_unwind();
        let inv = match timeout(self.timeout, guarded).await {
            Ok(Ok(Ok(content))) => Invocation {
                observation: non_empty(content),
                outcome: InvocationOutcome::Ok,
                terminal_summary: summary,
            },
            Ok(Ok(Err(reason))) => Invocation::failed(
                format!("Error: {}", AgentError::ToolExecution(format!("{}: {}", tool_name, reason))),
                InvocationOutcome::Error,
            ),
            Ok(Err(payload)) => {
                tracing::error!(tool = %tool_name, "tool panicked");
                Invocation::failed(
                    format!(
                        "Error: {}",
                        AgentError::ToolExecution(format!(
                            "{} panicked: {}",
                            tool_name,
                            panic_message(payload.as_ref())
                        ))
                    ),
                    InvocationOutcome::Panic,
                )
            }
            Err(_) => Invocation::failed(
                format!(
                    "Error: {}",
                    AgentError::ToolTimeout {
                        tool: tool_name.to_string(),
                        secs: self.timeout.as_secs(),
                    }
                ),
                InvocationOutcome::Timeout,
            ),
        };
        audit(tool_name, &action.args, &inv, start);
        inv
    }
}

fn non_empty(content: String) -> String {
    if content.trim().is_empty() {
        "(the tool produced no output)".to_string()
    } else {
        content
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn audit(tool: &str, args: &serde_json::Map<String, serde_json::Value>, inv: &Invocation, start: Instant) {
    let audit = serde_json::json!({
        "event": "tool_audit",
        "tool": tool,
        "ok": inv.is_ok(),
        "outcome": inv.outcome.as_str(),
        "duration_ms": start.elapsed().as_millis() as u64,
        "args_preview": args_preview(args),
    });
    tracing::info!(audit = %audit, "tool");
}

fn args_preview(args: &serde_json::Map<String, serde_json::Value>) -> String {
    let s = serde_json::Value::Object(args.clone()).to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::params::{ParamKind, ParamSpec};
    use crate::tools::{FinishTool, Tool, ToolArgs};
    use async_trait::async_trait;
    use serde_json::json;

    struct Flaky;

    const FLAKY_PARAMS: &[ParamSpec] = &[ParamSpec::required("mode", ParamKind::String, "behaviour")];

    #[async_trait]
    impl Tool for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }
        fn description(&self) -> &str {
            "Misbehaves on demand"
        }
        fn parameters(&self) -> &[ParamSpec] {
            FLAKY_PARAMS
        }
        async fn execute(&self, args: ToolArgs) -> Result<String, String> {
            match args.get("mode").and_then(|v| v.as_str()) {
                Some("ok") => Ok("fine".into()),
                Some("empty") => Ok("   ".into()),
                Some("err") => Err("disk full".into()),
                Some("panic") => panic!("boom"),
                Some("slow") => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok("late".into())
                }
                _ => Ok(String::new()),
            }
        }
    }

    fn executor() -> ToolExecutor {
        let mut reg = ToolRegistry::new();
        reg.register(Flaky).unwrap();
        reg.register(FinishTool::new()).unwrap();
        ToolExecutor::with_timeout(reg, Duration::from_millis(300))
    }

    fn action(name: &str, args: serde_json::Value) -> Action {
        Action::new(name, args.as_object().cloned().unwrap_or_default())
    }

    #[tokio::test]
    async fn test_ok_and_empty_output() {
        let ex = executor();
        let inv = ex.invoke(&action("flaky", json!({"mode": "ok"}))).await;
        assert!(inv.is_ok());
        assert_eq!(inv.observation, "fine");
        let inv = ex.invoke(&action("flaky", json!({"mode": "empty"}))).await;
        assert!(!inv.observation.trim().is_empty());
    }

    #[tokio::test]
    async fn test_failures_become_error_observations() {
        let ex = executor();
        for (mode, outcome) in [
            ("err", InvocationOutcome::Error),
            ("panic", InvocationOutcome::Panic),
            ("slow", InvocationOutcome::Timeout),
        ] {
            let inv = ex.invoke(&action("flaky", json!({ "mode": mode }))).await;
            assert_eq!(inv.outcome, outcome, "mode {mode}");
            assert!(inv.observation.starts_with("Error:"), "{}", inv.observation);
        }
    }

    #[tokio::test]
    async fn test_timeout_observation_names_timeout() {
        let ex = executor();
        let inv = ex.invoke(&action("flaky", json!({"mode": "slow"}))).await;
        assert!(inv.observation.contains("timed out"));
    }

    #[tokio::test]
    async fn test_invalid_args_never_reach_tool() {
        let ex = executor();
        let inv = ex.invoke(&action("flaky", json!({"mode": 7}))).await;
        assert_eq!(inv.outcome, InvocationOutcome::InvalidArgs);
        assert!(inv.observation.contains("must be of type string"));
    }

    #[tokio::test]
    async fn test_terminal_summary_only_on_success() {
        let ex = executor();
        let inv = ex.invoke(&action("finish", json!({"summary": "all set"}))).await;
        assert_eq!(inv.terminal_summary.as_deref(), Some("all set"));
        let inv = ex.invoke(&action("finish", json!({}))).await;
        assert!(inv.terminal_summary.is_none());
        assert_eq!(inv.outcome, InvocationOutcome::InvalidArgs);
    }
}
