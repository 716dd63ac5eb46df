//! Scripted LLM 客户端（用于测试，无需 API）
//!
//! 按顺序回放预设回复；队列耗尽后返回 fallback。每次调用的 prompt / instructions 都会被记录，便于断言。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, Message};

/// 一次被记录的调用
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub instructions: String,
}

/// 回放客户端：replies 依次消费，耗尽后使用 fallback
#[derive(Debug)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Result<String, LlmError>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|s| Ok(s.into())).collect()),
            fallback: Err(LlmError::Transport("scripted replies exhausted".to_string())),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 队列耗尽后一直返回该文本
    pub fn with_fallback(mut self, reply: impl Into<String>) -> Self {
        self.fallback = Ok(reply.into());
        self
    }

    /// 队列耗尽后一直返回该错误
    pub fn with_fallback_error(mut self, err: LlmError) -> Self {
        self.fallback = Err(err);
        self
    }

    /// 在队尾追加一次错误回复
    pub fn then_error(self, err: LlmError) -> Self {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(Err(err));
        }
        self
    }

    /// 在队尾追加一次文本回复
    pub fn then_reply(self, reply: impl Into<String>) -> Self {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(Ok(reply.into()));
        }
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(
        &self,
        prompt: &str,
        instructions: &str,
        _history: &[Message],
    ) -> Result<String, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                prompt: prompt.to_string(),
                instructions: instructions.to_string(),
            });
        }
        let next = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        next.unwrap_or_else(|| self.fallback.clone())
    }
}
