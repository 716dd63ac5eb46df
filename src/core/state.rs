//! 单步 ReAct 循环的状态定义
//!
//! LoopPhase 描述一次迭代内部的阶段（Thinking -> Acting -> Observing）；
//! CompletionSignal 是一个步骤结束时返回给 Orchestrator 的三态结果。

use std::fmt;

use serde::Serialize;

/// 单次迭代内部阶段，仅用于日志与事件
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    Thinking,
    Acting,
    Observing,
}

impl fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoopPhase::Thinking => "thinking",
            LoopPhase::Acting => "acting",
            LoopPhase::Observing => "observing",
        };
        f.write_str(s)
    }
}

/// 步骤结束信号
///
/// - `Continuing`：步骤已结束（启发式判定完成），运行应继续下一步
/// - `Finished`：调用了终止工具，携带最终摘要，运行结束
/// - `Exhausted`：迭代预算耗尽且没有任何结束信号
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum CompletionSignal {
    Continuing,
    Finished { summary: String },
    Exhausted,
}

impl CompletionSignal {
    pub fn is_finished(&self) -> bool {
        matches!(self, CompletionSignal::Finished { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            CompletionSignal::Continuing => "continuing",
            CompletionSignal::Finished { .. } => "finished",
            CompletionSignal::Exhausted => "exhausted",
        }
    }
}
