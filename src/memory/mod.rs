//! 记忆层：单次运行内的执行历史（追加式日志 + prompt 截断策略）

pub mod history;

pub use history::{EntryKind, History, HistoryEntry, HistoryWindow};
