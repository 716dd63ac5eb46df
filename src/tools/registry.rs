//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters / execute），由 ToolRegistry 按名注册与查找；
//! 注册时检查静态参数声明，调用前按声明校验参数。ToolExecutor 在此之上加超时、panic 隔离与审计日志。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::AgentError;
use crate::tools::params::{self, ParamSpec};

/// 工具参数：参数名到 JSON 值的映射
pub type ToolArgs = Map<String, Value>;

/// 模型选择的一次动作：工具名 + 参数。不保证工具存在，存在性在分发时检查
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    #[serde(default)]
    pub args: ToolArgs,
}

impl Action {
    pub fn new(name: impl Into<String>, args: ToolArgs) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// 工具 trait：名称、描述（供 LLM 理解）、静态参数声明、异步执行
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（动作中的 name / tool_name 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 静态参数声明
    fn parameters(&self) -> &[ParamSpec];

    /// 终止工具返回 Some(摘要)；普通工具保持默认
    fn terminal_summary(&self, _args: &ToolArgs) -> Option<String> {
        None
    }

    /// 执行工具；args 已按 parameters() 校验
    async fn execute(&self, args: ToolArgs) -> Result<String, String>;
}

/// 供 prompt 构建使用的工具描述
#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
}

/// 工具注册表：按名称存储 Arc<dyn Tool>，并记住注册顺序，保证 prompt 中工具列表稳定
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), AgentError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), AgentError> {
        let name = tool.name().to_string();
        if !params::is_identifier(&name) {
            return Err(AgentError::Registration(format!(
                "invalid tool name '{}' (expected [a-z0-9_]+)",
                name
            )));
        }
        if self.tools.contains_key(&name) {
            return Err(AgentError::Registration(format!(
                "tool '{}' is already registered",
                name
            )));
        }
        params::check_declaration(&name, tool.parameters())?;
        tracing::debug!(tool = %name, "tool registered");
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// 按注册顺序返回工具名
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.ordered()
            .map(|tool| ToolSchema {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters().to_vec(),
            })
            .collect()
    }

    /// 查找工具并校验参数（就地规范化）
    pub fn validate_args(&self, name: &str, args: &mut ToolArgs) -> Result<Arc<dyn Tool>, AgentError> {
        let tool = self
            .get(name)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))?;
        params::validate_args(name, tool.parameters(), args)?;
        Ok(tool)
    }

    /// 每个工具一行：`- name(arg: type, opt?: type): description`
    pub fn describe_for_prompt(&self) -> String {
        self.ordered()
            .map(|tool| {
                let args: Vec<String> = tool
                    .parameters()
                    .iter()
                    .map(|p| {
                        format!(
                            "{}{}: {}",
                            p.name,
                            if p.required { "" } else { "?" },
                            p.kind.as_str()
                        )
                    })
                    .collect();
                format!("- {}({}): {}", tool.name(), args.join(", "), tool.description())
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// JSON Schema 风格的工具描述，拼入执行器 instructions
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<Value> = self
            .schemas()
            .into_iter()
            .map(|tool| {
                let mut properties = Map::new();
                for p in &tool.parameters {
                    properties.insert(
                        p.name.to_string(),
                        serde_json::json!({ "type": p.kind.as_str(), "description": p.description }),
                    );
                }
                let required: Vec<&str> = tool
                    .parameters
                    .iter()
                    .filter(|p| p.required)
                    .map(|p| p.name)
                    .collect();
                serde_json::json!({
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": {
                        "type": "object",
                        "properties": properties,
                        "required": required
                    }
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }

    fn ordered(&self) -> impl Iterator<Item = &Arc<dyn Tool>> + '_ {
        self.order.iter().filter_map(|n| self.tools.get(n))
    }
}
