//! LLM 客户端抽象
//!
//! complete(prompt, instructions, history)：instructions 作为 system 消息，history 为可选的前置对话，
//! prompt 作为最后一条 user 消息。部分引擎以 `Error:` 前缀的文本在带内报告错误，调用方用 in_band_error 识别。

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::Message;

/// 带内错误标记：以此开头的回复视为传输失败
pub const ERROR_MARKER: &str = "Error:";

/// LLM 调用错误；只有 Config 是致命的
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("LLM returned an empty response")]
    EmptyResponse,

    #[error("LLM client misconfigured: {0}")]
    Config(String),
}

impl LlmError {
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, LlmError::Config(_))
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(
        &self,
        prompt: &str,
        instructions: &str,
        history: &[Message],
    ) -> Result<String, LlmError>;

    /// 累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 若回复是带内错误，返回去掉标记后的错误详情
pub fn in_band_error(reply: &str) -> Option<&str> {
    reply.trim_start().strip_prefix(ERROR_MARKER).map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_band_error_requires_prefix() {
        assert_eq!(in_band_error("Error: rate limited"), Some("rate limited"));
        assert_eq!(in_band_error("  Error:timeout"), Some("timeout"));
        assert_eq!(in_band_error("1. Grep the logs for Error: lines"), None);
        assert_eq!(in_band_error("all good"), None);
    }

    #[test]
    fn test_only_config_is_unrecoverable() {
        assert!(LlmError::Transport("reset".into()).is_recoverable());
        assert!(LlmError::Timeout(60).is_recoverable());
        assert!(LlmError::EmptyResponse.is_recoverable());
        assert!(!LlmError::Config("no key".into()).is_recoverable());
    }
}
