//! Docker 容器终端
//!
//! 在一个已运行的容器里通过 `docker exec` 执行命令与文件操作。命令输出按块流式读取，
//! 超时后取消读取并返回已收集的部分输出（timed_out = true），而不是丢弃。

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::DockerSection;
use crate::core::AgentError;
use crate::sandbox::{collect_child, resolve_within, CommandOutput, Environment, RawOutput};

/// 文件类操作（cat / ls / 写入）的固定超时
const FILE_OP_TIMEOUT: Duration = Duration::from_secs(30);

/// 容器内执行环境；workdir 为容器内工作区根目录
#[derive(Debug, Clone)]
pub struct DockerTerminal {
    binary: String,
    container: String,
    workdir: PathBuf,
}

impl DockerTerminal {
    pub fn new(container: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            binary: "docker".to_string(),
            container: container.into(),
            workdir: workdir.into(),
        }
    }

    pub fn from_config(cfg: &DockerSection) -> Self {
        Self {
            binary: cfg.binary.clone(),
            container: cfg.container.clone(),
            workdir: cfg.workdir.clone(),
        }
    }

    /// 组装 `docker exec [-i] -w <workdir> <container> <argv...>` 的参数
    fn exec_args(&self, interactive: bool, argv: &[&str]) -> Vec<String> {
        let mut args = vec!["exec".to_string()];
        if interactive {
            args.push("-i".to_string());
        }
        args.push("-w".to_string());
        args.push(self.workdir.to_string_lossy().to_string());
        args.push(self.container.clone());
        args.extend(argv.iter().map(|s| s.to_string()));
        args
    }

    async fn exec(
        &self,
        argv: &[&str],
        stdin: Option<&str>,
        timeout: Duration,
    ) -> Result<RawOutput, AgentError> {
        let mut child = Command::new(&self.binary)
            .args(self.exec_args(stdin.is_some(), argv))
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
            pipe.shutdown().await?;
        }
        collect_child(child, timeout).await
    }

    fn container_path(&self, path: &str) -> Result<String, AgentError> {
        Ok(resolve_within(&self.workdir, path)?.to_string_lossy().to_string())
    }
}

#[async_trait]
impl Environment for DockerTerminal {
    fn root(&self) -> &Path {
        &self.workdir
    }

    async fn run_command(&self, cmd: &str, timeout: Duration) -> Result<CommandOutput, AgentError> {
        tracing::info!(container = %self.container, command = %cmd, "docker exec");
        Ok(self.exec(&["sh", "-c", cmd], None, timeout).await?.into_command_output())
    }

    async fn read_file(&self, path: &str) -> Result<String, AgentError> {
        let target = self.container_path(path)?;
        let out = self.exec(&["cat", "--", &target], None, FILE_OP_TIMEOUT).await?;
        if !out.success() {
            return Err(AgentError::NotFound(path.to_string()));
        }
        Ok(out.stdout_text())
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), AgentError> {
        let target = self.container_path(path)?;
        let script = "mkdir -p \"$(dirname \"$1\")\" && cat > \"$1\"";
        let out = self
            .exec(&["sh", "-c", script, "sh", &target], Some(content), FILE_OP_TIMEOUT)
            .await?;
        if out.success() {
            Ok(())
        } else {
            Err(AgentError::ToolExecution(format!(
                "write to '{}' failed: {}",
                path,
                String::from_utf8_lossy(&out.stderr).trim()
            )))
        }
    }

    async fn list_files(&self, path: &str) -> Result<Vec<String>, AgentError> {
        let target = self.container_path(path)?;
        let out = self.exec(&["ls", "-1Ap", "--", &target], None, FILE_OP_TIMEOUT).await?;
        if !out.success() {
            return Err(AgentError::NotFound(path.to_string()));
        }
        let mut entries: Vec<String> = out
            .stdout_text()
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        entries.sort();
        Ok(entries)
    }

    async fn remove_file(&self, path: &str) -> Result<(), AgentError> {
        let target = self.container_path(path)?;
        let out = self.exec(&["rm", "-f", "--", &target], None, FILE_OP_TIMEOUT).await?;
        if out.success() {
            Ok(())
        } else {
            Err(AgentError::ToolExecution(
                String::from_utf8_lossy(&out.stderr).trim().to_string(),
            ))
        }
    }
}
