//! 运行过程事件：用于控制台等前端展示计划、思考、工具调用与观察

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactEvent {
    /// 计划已生成
    PlanReady { steps: Vec<String> },
    /// 开始执行第几步
    StepStarted {
        step: usize,
        total: usize,
        description: String,
    },
    /// 正在调用 LLM（第几轮 / 上限）
    Thinking { iteration: usize, max_loops: usize },
    /// 模型给出的思考
    Thought { text: String },
    /// 调用工具
    ToolCall {
        tool: String,
        args: serde_json::Value,
    },
    /// 工具返回（预览，避免过长）
    Observation { tool: String, preview: String },
    /// 可恢复错误（传输失败、格式错误、未知工具）
    Recoverable { kind: String, detail: String },
    /// 本步结束
    StepFinished {
        step: usize,
        signal: String,
        iterations: usize,
    },
}
