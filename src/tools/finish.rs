//! 终止工具：finish(summary) 与别名 terminate(message)
//!
//! 执行后照常产生 observation，同时通过 terminal_summary 把摘要交给循环，由循环结束本步与整个运行。

use async_trait::async_trait;

use crate::tools::params::{str_arg, ParamKind, ParamSpec};
use crate::tools::{Tool, ToolArgs};

const FINISH_PARAMS: &[ParamSpec] = &[ParamSpec::required(
    "summary",
    ParamKind::String,
    "final summary or result of the whole task",
)];

const TERMINATE_PARAMS: &[ParamSpec] = &[ParamSpec::required(
    "message",
    ParamKind::String,
    "final message describing the outcome of the task",
)];

/// 摘要为空时的最终结果
pub const NO_SUMMARY: &str = "Task finished, but no summary was provided.";

pub struct FinishTool {
    name: &'static str,
    arg: &'static str,
    params: &'static [ParamSpec],
}

impl FinishTool {
    pub fn new() -> Self {
        Self {
            name: "finish",
            arg: "summary",
            params: FINISH_PARAMS,
        }
    }

    /// `terminate(message)` 形式的别名
    pub fn terminate() -> Self {
        Self {
            name: "terminate",
            arg: "message",
            params: TERMINATE_PARAMS,
        }
    }

    /// 去掉首尾空白；空摘要返回 None
    fn summary(&self, args: &ToolArgs) -> Option<String> {
        let text = str_arg(args, self.arg).unwrap_or_default().trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

impl Default for FinishTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FinishTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Call this with a final summary once the entire task is complete; it ends the run."
    }

    fn parameters(&self) -> &[ParamSpec] {
        self.params
    }

    fn terminal_summary(&self, args: &ToolArgs) -> Option<String> {
        Some(self.summary(args).unwrap_or_else(|| NO_SUMMARY.to_string()))
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, String> {
        tracing::info!(tool = %self.name, "terminal tool invoked");
        match self.summary(&args) {
            Some(summary) => Ok(format!("Task finished successfully. Final summary: {}", summary)),
            None => Ok(NO_SUMMARY.to_string()),
        }
    }
}
