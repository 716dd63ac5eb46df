//! Agent 错误类型
//!
//! 单步循环内的错误（传输、解析、未知工具、工具失败）都会被转成 Observation 喂回模型；
//! 只有配置级错误（如缺少凭据）是致命的，会中止整个运行。

use thiserror::Error;

use crate::llm::LlmError;

/// 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Planning failed: {0}")]
    Planning(String),

    #[error("LLM transport failure: {0}")]
    Transport(String),

    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    #[error("Tool '{tool}' timed out after {secs}s")]
    ToolTimeout { tool: String, secs: u64 },

    #[error("Path escape attempt: {0}")]
    PathEscape(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Tool registration failed: {0}")]
    Registration(String),
}

impl AgentError {
    /// 是否必须中止整个运行
    pub fn is_fatal(&self) -> bool {
        matches!(self, AgentError::Config(_))
    }
}

impl From<LlmError> for AgentError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Config(msg) => AgentError::Config(msg),
            other => AgentError::Transport(other.to_string()),
        }
    }
}

impl From<config::ConfigError> for AgentError {
    fn from(e: config::ConfigError) -> Self {
        AgentError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_config_errors_are_fatal() {
        assert!(AgentError::Config("no key".into()).is_fatal());
        assert!(!AgentError::Transport("reset".into()).is_fatal());
        assert!(!AgentError::UnknownTool("fly".into()).is_fatal());
        assert!(!AgentError::Planning("empty".into()).is_fatal());
    }

    #[test]
    fn test_llm_error_conversion() {
        let fatal: AgentError = LlmError::Config("missing api key".into()).into();
        assert!(fatal.is_fatal());
        let recoverable: AgentError = LlmError::Transport("connection refused".into()).into();
        assert!(matches!(recoverable, AgentError::Transport(ref m) if m.contains("connection refused")));
    }
}
