//! 本地工作区环境
//!
//! 命令通过 `sh -c` 在工作区目录下运行（kill_on_drop，超时返回部分输出）；
//! 文件操作先做词法越界校验，再对已存在的最深祖先做 canonicalize，防止符号链接逃逸。

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::core::AgentError;
use crate::sandbox::{drain_child, resolve_within, CommandOutput, Environment};

/// 绑定到宿主机某个目录的工作区
#[derive(Debug, Clone)]
pub struct LocalWorkspace {
    root: PathBuf,
}

impl LocalWorkspace {
    /// 目录不存在时创建
    pub fn new(root: impl AsRef<Path>) -> Result<Self, AgentError> {
        let root = root.as_ref();
        if !root.exists() {
            tracing::info!(path = %root.display(), "creating workspace directory");
            std::fs::create_dir_all(root)?;
        }
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    /// 词法校验 + 符号链接校验，返回工作区内的绝对路径
    fn jail(&self, path: &str) -> Result<PathBuf, AgentError> {
        let resolved = resolve_within(&self.root, path)?;
        let mut probe = resolved.as_path();
        while !probe.exists() {
            match probe.parent() {
                Some(parent) => probe = parent,
                None => break,
            }
        }
        let canonical = probe.canonicalize()?;
        if canonical.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(AgentError::PathEscape(path.to_string()))
        }
    }
}

#[async_trait]
impl Environment for LocalWorkspace {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn run_command(&self, cmd: &str, timeout: Duration) -> Result<CommandOutput, AgentError> {
        tracing::info!(command = %cmd, cwd = %self.root.display(), "running command");
        let child = Command::new("sh")
            .args(["-c", cmd])
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        drain_child(child, timeout).await
    }

    async fn read_file(&self, path: &str) -> Result<String, AgentError> {
        let full = self.jail(path)?;
        if !full.is_file() {
            return Err(AgentError::NotFound(path.to_string()));
        }
        Ok(tokio::fs::read_to_string(&full).await?)
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), AgentError> {
        let full = self.jail(path)?;
        if full == self.root {
            return Err(AgentError::ToolExecution("cannot write to the workspace root".into()));
        }
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, content).await?;
        Ok(())
    }

    async fn list_files(&self, path: &str) -> Result<Vec<String>, AgentError> {
        let full = self.jail(path)?;
        if !full.is_dir() {
            return Err(AgentError::NotFound(path.to_string()));
        }
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&full).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            entries.push(if is_dir { format!("{}/", name) } else { name });
        }
        entries.sort();
        Ok(entries)
    }

    async fn remove_file(&self, path: &str) -> Result<(), AgentError> {
        let full = self.jail(path)?;
        if !full.is_file() {
            return Err(AgentError::NotFound(path.to_string()));
        }
        tokio::fs::remove_file(&full).await?;
        Ok(())
    }
}
