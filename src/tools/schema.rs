//! 动作线格式的 JSON Schema（schemars 自动生成）
//!
//! 拼入执行器的 system prompt，减少模型输出格式错误。

use std::collections::HashMap;

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

/// 模型每轮应输出的对象：`{"thought": "...", "action": {"name": "...", "args": {...}}}`（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ActionFormat {
    /// 选择动作前的推理
    pub thought: String,
    /// 要调用的工具
    pub action: ActionCall,
}

#[allow(dead_code)]
#[derive(JsonSchema)]
struct ActionCall {
    /// 已注册的工具名，如 read_file、shell、finish
    pub name: String,
    /// 工具参数，依工具声明而定
    pub args: HashMap<String, Value>,
}

/// 返回动作格式的 JSON Schema 字符串
pub fn action_schema_json() -> String {
    let schema = schema_for!(ActionFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
