//! 执行环境：工具对文件系统与命令的所有访问都经过 Environment
//!
//! 所有路径都相对于唯一的工作区根目录解析；resolve_within 在任何文件系统调用之前拒绝越界路径。
//! 环境实例每次运行构建一次，以 Arc<dyn Environment> 显式传给各工具。

pub mod docker;
pub mod local;

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;

use crate::core::AgentError;

pub use docker::DockerTerminal;
pub use local::LocalWorkspace;

/// 命令执行结果；超时时 exit_code 为 None，output 为已收集到的部分输出
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub output: String,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[async_trait]
pub trait Environment: Send + Sync {
    /// 工作区根目录（容器环境为容器内路径）
    fn root(&self) -> &Path;

    async fn run_command(&self, cmd: &str, timeout: Duration) -> Result<CommandOutput, AgentError>;

    async fn read_file(&self, path: &str) -> Result<String, AgentError>;

    /// 覆盖写入；父目录不存在时自动创建
    async fn write_file(&self, path: &str, content: &str) -> Result<(), AgentError>;

    /// 列出目录下的条目名（目录以 `/` 结尾），已排序
    async fn list_files(&self, path: &str) -> Result<Vec<String>, AgentError>;

    async fn remove_file(&self, path: &str) -> Result<(), AgentError>;
}

/// 纯词法解析：拒绝绝对路径与任何越过根目录的 `..`，不访问文件系统
pub fn resolve_within(root: &Path, path: &str) -> Result<PathBuf, AgentError> {
    let trimmed = path.trim();
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(p) => parts.push(p),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(AgentError::PathEscape(trimmed.to_string()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(AgentError::PathEscape(trimmed.to_string()));
            }
        }
    }
    let mut resolved = root.to_path_buf();
    resolved.extend(parts);
    Ok(resolved)
}

/// 未合并的进程输出；文件类操作直接使用原始 stdout
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawOutput {
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
}

impl RawOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// 合并为带 `STDOUT:` / `STDERR:` 段头的命令输出
    pub fn into_command_output(self) -> CommandOutput {
        CommandOutput {
            exit_code: self.exit_code,
            output: combine_output(&self.stdout, &self.stderr),
            timed_out: self.timed_out,
        }
    }
}

/// 同时读取 stdout / stderr，直到进程退出或超时；超时后杀掉进程并保留已读到的部分输出
pub(crate) async fn collect_child(mut child: Child, limit: Duration) -> Result<RawOutput, AgentError> {
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let mut out_buf = Vec::new();
    let mut err_buf = Vec::new();

    let status = {
        let work = async {
            tokio::try_join!(
                pump(stdout.as_mut(), &mut out_buf),
                pump(stderr.as_mut(), &mut err_buf)
            )?;
            child.wait().await
        };
        tokio::time::timeout(limit, work).await
    };

    let (exit_code, timed_out) = match status {
        Ok(Ok(st)) => (st.code(), false),
        Ok(Err(e)) => return Err(AgentError::Io(e)),
        Err(_) => {
            tracing::warn!(timeout_secs = limit.as_secs(), "command timed out, returning partial output");
            let _ = child.start_kill();
            (None, true)
        }
    };

    Ok(RawOutput {
        exit_code,
        stdout: out_buf,
        stderr: err_buf,
        timed_out,
    })
}

pub(crate) async fn drain_child(child: Child, limit: Duration) -> Result<CommandOutput, AgentError> {
    Ok(collect_child(child, limit).await?.into_command_output())
}

/// 逐块读取；被取消时已读到的数据保留在 buf 中
async fn pump<R: AsyncRead + Unpin>(reader: Option<&mut R>, buf: &mut Vec<u8>) -> std::io::Result<()> {
    let Some(reader) = reader else {
        return Ok(());
    };
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    let mut out = String::new();
    if !stdout.trim().is_empty() {
        out.push_str("STDOUT:\n");
        out.push_str(stdout.trim_end());
    }
    if !stderr.trim().is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("STDERR:\n");
        out.push_str(stderr.trim_end());
    }
    out
}
