//! 执行历史：Thought / Action / Observation 的追加式日志
//!
//! History 只追加不修改，既是审计记录，也是后续推理的上下文；跨步骤由编排器拼接，按值传入下一步。
//! 构建 prompt 时经 HistoryWindow 截断：只保留最近 K 条，每条观察截到上限，并显式注明省略了多少条。

use std::fmt;

use serde::Serialize;

use crate::tools::Action;

/// 一条历史记录的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// 工具正常执行后的观察
    ToolObservation,
    /// 工具执行失败（参数错误、超时、panic 等）
    ToolFailure,
    /// 推理引擎调用失败
    TransportFailure,
    /// 模型输出无法解析
    ParseFailure,
    UnknownTool,
    /// 终止工具
    Terminal,
}

/// 一次循环迭代产生的记录；解析失败和传输失败没有 thought / action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub step: usize,
    pub iteration: usize,
    pub kind: EntryKind,
    pub thought: Option<String>,
    pub action: Option<Action>,
    pub observation: String,
}

impl HistoryEntry {
    /// 只有观察、没有动作的记录
    pub fn observation_only(step: usize, iteration: usize, kind: EntryKind, observation: impl Into<String>) -> Self {
        Self {
            step,
            iteration,
            kind,
            thought: None,
            action: None,
            observation: observation.into(),
        }
    }

    fn render_clipped(&self, max_observation_chars: Option<usize>) -> String {
        let mut out = String::new();
        if let Some(thought) = &self.thought {
            out.push_str(&format!("Thought: {}\n", thought));
        }
        if let Some(action) = &self.action {
            let args = serde_json::Value::Object(action.args.clone());
            out.push_str(&format!("Action: {} {}\n", action.name, args));
        }
        let observation = match max_observation_chars {
            Some(limit) => clip(&self.observation, limit),
            None => self.observation.clone(),
        };
        out.push_str(&format!("Observation: {}", observation));
        out
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_clipped(None))
    }
}

/// 追加式历史
#[derive(Debug, Clone, Default, Serialize)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = HistoryEntry>) {
        self.entries.extend(entries);
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 完整记录（不截断），用作计划耗尽时的最终结果
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("[step {} / iteration {}]\n{}", e.step, e.iteration, e))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// prompt 侧的历史截断策略；None 表示不限制
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryWindow {
    pub max_entries: Option<usize>,
    pub max_observation_chars: Option<usize>,
}

impl HistoryWindow {
    /// 0 表示不限制
    pub fn new(max_entries: usize, max_observation_chars: usize) -> Self {
        Self {
            max_entries: (max_entries > 0).then_some(max_entries),
            max_observation_chars: (max_observation_chars > 0).then_some(max_observation_chars),
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// 渲染 prior（之前步骤）+ local（本步）拼接后的最近部分
    pub fn render(&self, prior: &[HistoryEntry], local: &[HistoryEntry]) -> String {
        let total = prior.len() + local.len();
        if total == 0 {
            return "(no previous actions)".to_string();
        }
        let keep = self.max_entries.map_or(total, |k| k.min(total));
        let skipped = total - keep;

        let mut parts = Vec::with_capacity(keep + 1);
        if skipped > 0 {
            parts.push(format!("[{} earlier entries omitted]", skipped));
        }
        parts.extend(
            prior
                .iter()
                .chain(local.iter())
                .skip(skipped)
                .map(|e| e.render_clipped(self.max_observation_chars)),
        );
        parts.join("\n")
    }
}

/// 按字符截断，截断时注明原长度
fn clip(text: &str, limit: usize) -> String {
    let count = text.chars().count();
    if count <= limit {
        return text.to_string();
    }
    let head: String = text.chars().take(limit).collect();
    format!("{}... [truncated, {} chars total]", head, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(step: usize, i: usize, obs: &str) -> HistoryEntry {
        HistoryEntry {
            step,
            iteration: i,
            kind: EntryKind::ToolObservation,
            thought: Some(format!("t{}", i)),
            action: Some(Action::new(
                "write_file",
                json!({"path": "a.txt"}).as_object().cloned().unwrap(),
            )),
            observation: obs.to_string(),
        }
    }

    #[test]
    fn test_entry_renders_triple() {
        let text = entry(1, 1, "ok").to_string();
        assert_eq!(text, "Thought: t1\nAction: write_file {\"path\":\"a.txt\"}\nObservation: ok");
        let bare = HistoryEntry::observation_only(1, 2, EntryKind::ParseFailure, "bad format");
        assert_eq!(bare.to_string(), "Observation: bad format");
    }

    #[test]
    fn test_empty_window_has_placeholder() {
        assert_eq!(HistoryWindow::unbounded().render(&[], &[]), "(no previous actions)");
    }

    #[test]
    fn test_window_keeps_tail_across_prior_and_local() {
        let prior = vec![entry(1, 1, "a"), entry(1, 2, "b")];
        let local = vec![entry(2, 1, "c")];
        let text = HistoryWindow::new(2, 0).render(&prior, &local);
        assert!(text.starts_with("[1 earlier entries omitted]"));
        assert!(!text.contains("Observation: a"));
        assert!(text.contains("Observation: b"));
        assert!(text.ends_with("Observation: c"));
    }

    #[test]
    fn test_window_clips_observations_only_in_prompt() {
        let mut history = History::new();
        history.push(entry(1, 1, &"x".repeat(50)));
        let clipped = HistoryWindow::new(0, 10).render(history.entries(), &[]);
        assert!(clipped.contains("[truncated, 50 chars total]"));
        assert!(history.render().contains(&"x".repeat(50)));
    }
}
