//! Shell 工具：在执行环境中运行命令，禁止危险操作
//!
//! 命令通过 Environment::run_command 执行（本地 `sh -c` 或容器内 `docker exec`），带独立超时；
//! 超时时返回已收集的部分输出。禁止 rm -rf、wget、chmod 777 等子串；allowed_commands 非空时只允许其中的命令名（首词）。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::sandbox::Environment;
use crate::tools::params::{str_arg, ParamKind, ParamSpec};
use crate::tools::{Tool, ToolArgs};

/// 禁止的命令/子串（即使白名单中有同名，也不允许带这些参数）
const FORBIDDEN_SUBSTR: &[&str] = &[
    "rm -rf /",
    "rm -fr /",
    "wget ",
    "curl | sh",
    "chmod 777",
    "chmod +s",
    "mkfs",
    "dd if=",
    "> /dev/sd",
    ":(){ :|:& };:", // fork bomb
];

const SHELL_PARAMS: &[ParamSpec] = &[ParamSpec::required(
    "command",
    ParamKind::String,
    "the shell command to run inside the workspace",
)];

pub struct ShellTool {
    env: Arc<dyn Environment>,
    allowed_commands: HashSet<String>,
    timeout: Duration,
}

impl ShellTool {
    pub fn new(env: Arc<dyn Environment>, allowed_commands: Vec<String>, timeout_secs: u64) -> Self {
        let allowed_commands = allowed_commands
            .into_iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            env,
            allowed_commands,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn is_allowed(&self, raw: &str) -> Result<(), String> {
        let raw_lower = raw.to_lowercase();
        for forbidden in FORBIDDEN_SUBSTR {
            if raw_lower.contains(forbidden) {
                return Err(format!("Forbidden pattern: {}", forbidden));
            }
        }
        let name = raw_lower.split_whitespace().next().unwrap_or("");
        if name.is_empty() {
            return Err("Empty command".to_string());
        }
        if self.allowed_commands.is_empty() || self.allowed_commands.contains(name) {
            return Ok(());
        }
        Err(format!("Command '{}' not in allowlist", name))
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Run a shell command in the workspace and return its combined stdout/stderr."
    }

    fn parameters(&self) -> &[ParamSpec] {
        SHELL_PARAMS
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, String> {
        let command = str_arg(&args, "command").unwrap_or_default().trim();
        self.is_allowed(command)?;

        tracing::info!(command = %command, "shell tool execute");
        let out = self
            .env
            .run_command(command, self.timeout)
            .await
            .map_err(|e| format!("Execution failed: {}", e))?;

        if out.timed_out {
            let partial = if out.output.trim().is_empty() {
                "(no output before timeout)".to_string()
            } else {
                out.output
            };
            return Err(format!(
                "command '{}' timed out after {}s. Partial output:\n{}",
                command,
                self.timeout.as_secs(),
                partial
            ));
        }
        if !out.success() {
            return Err(format!(
                "command '{}' exited with code {:?}\n{}",
                command, out.exit_code, out.output
            ));
        }
        if out.output.trim().is_empty() {
            Ok(format!("Command '{}' finished with no output.", command))
        } else {
            Ok(out.output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::LocalWorkspace;
    use serde_json::json;

    fn shell(allowed: Vec<&str>, secs: u64) -> (tempfile::TempDir, ShellTool) {
        let dir = tempfile::tempdir().unwrap();
        let env: Arc<dyn Environment> = Arc::new(LocalWorkspace::new(dir.path()).unwrap());
        let allowed = allowed.into_iter().map(String::from).collect();
        (dir, ShellTool::new(env, allowed, secs))
    }

    fn cmd(c: &str) -> ToolArgs {
        json!({ "command": c }).as_object().cloned().unwrap()
    }

    #[test]
    fn test_forbidden_patterns_and_allowlist() {
        let (_d, tool) = shell(vec![], 5);
        assert!(tool.is_allowed("rm -rf / --no-preserve-root").is_err());
        assert!(tool.is_allowed("ls -la").is_ok());
        assert!(tool.is_allowed("   ").is_err());

        let (_d, tool) = shell(vec!["ls", "cat"], 5);
        assert!(tool.is_allowed("LS -la").is_ok());
        assert!(tool.is_allowed("python3 x.py").unwrap_err().contains("not in allowlist"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_in_workspace() {
        let (_d, tool) = shell(vec![], 10);
        let out = tool.execute(cmd("echo hi > a.txt && cat a.txt")).await.unwrap();
        assert!(out.contains("hi"));
        let out = tool.execute(cmd("true")).await.unwrap();
        assert_eq!(out, "Command 'true' finished with no output.");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_error() {
        let (_d, tool) = shell(vec![], 10);
        let err = tool.execute(cmd("echo oops >&2; exit 3")).await.unwrap_err();
        assert!(err.contains("Some(3)"));
        assert!(err.contains("oops"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_returns_partial_output() {
        let (_d, tool) = shell(vec![], 1);
        let err = tool.execute(cmd("echo begin; sleep 5")).await.unwrap_err();
        assert!(err.contains("timed out after 1s"), "{err}");
        assert!(err.contains("begin"));
    }
}
