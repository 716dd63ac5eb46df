//! Planner：把任务交给 LLM 一次，得到原始计划文本；parse_plan 负责把文本拆成步骤
//!
//! 规划失败（传输错误、空回复）不会抛出，而是以带 `Error:` 标记的文本返回，由 parse_plan 得到空计划；
//! 只有配置级错误（缺少凭据等）以 Err 返回。

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::core::AgentError;
use crate::llm::{in_band_error, LlmClient, LlmError, ERROR_MARKER};
use crate::react::prompt;

pub struct Planner {
    llm: Arc<dyn LlmClient>,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 只调用一次 LLM，不重试
    pub async fn create_plan(&self, task: &str) -> Result<String, AgentError> {
        tracing::info!(task = %task, "creating plan");
        match self
            .llm
            .complete(&prompt::planning_prompt(task), prompt::PLANNING_INSTRUCTIONS, &[])
            .await
        {
            Ok(text) => {
                if let Some(err) = in_band_error(&text) {
                    tracing::warn!(error = %err, "planner reply carries an error marker");
                }
                tracing::debug!(plan = %text, "raw plan text");
                Ok(text)
            }
            Err(LlmError::Config(msg)) => Err(AgentError::Config(msg)),
            Err(e) => {
                tracing::warn!(error = %e, "planning call failed");
                Ok(format!("{} {}", ERROR_MARKER, e))
            }
        }
    }

    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }
}

fn step_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:\d+[.)]\s*|[-*]\s+)(.*)$").unwrap())
}

/// 纯函数：识别 `1.`、`1)`、`- `、`* ` 开头的行并去掉标记；不含字母数字的描述（分隔线等）丢弃。
/// 没有任何行匹配时整段文本作为唯一步骤；空文本或以错误标记开头时返回空计划
pub fn parse_plan(plan_text: &str) -> Vec<String> {
    let trimmed = plan_text.trim();
    if trimmed.is_empty() || in_band_error(trimmed).is_some() {
        return Vec::new();
    }
    let steps: Vec<String> = trimmed
        .lines()
        .filter_map(|line| step_marker().captures(line.trim()))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .collect();
    if steps.is_empty() {
        vec![trimmed.to_string()]
    } else {
        steps
    }
}
