//! 步骤完成的启发式判断
//!
//! 标准终止信号是调用终止工具；这里的关键词匹配只是兼容旧行为的近似判断，
//! 会有误判（无关文本中出现 "done"）与漏判（措辞不同的完成）。可用 NoHeuristic 关闭。

/// 根据一次成功工具调用的观察判断当前步骤是否已完成
pub trait CompletionHeuristic: Send + Sync {
    /// 命中时返回命中的标记
    fn step_complete(&self, observation: &str) -> Option<String>;
}

/// 观察文本（忽略大小写）包含任一标记即视为步骤完成
#[derive(Debug, Clone)]
pub struct KeywordHeuristic {
    markers: Vec<String>,
}

impl KeywordHeuristic {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.into().trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }
}

impl Default for KeywordHeuristic {
    fn default() -> Self {
        Self::new(["successfully", "done", "complete"])
    }
}

impl CompletionHeuristic for KeywordHeuristic {
    fn step_complete(&self, observation: &str) -> Option<String> {
        let lower = observation.to_lowercase();
        self.markers.iter().find(|m| lower.contains(m.as_str())).cloned()
    }
}

/// 从不提前结束步骤
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHeuristic;

impl CompletionHeuristic for NoHeuristic {
    fn step_complete(&self, _observation: &str) -> Option<String> {
        None
    }
}
