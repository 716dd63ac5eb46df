//! Python 代码执行工具
//!
//! 代码写入工作区内一个 uuid 命名的临时脚本，用配置的解释器在执行环境中运行，结束后删除脚本。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::sandbox::Environment;
use crate::tools::params::{str_arg, ParamKind, ParamSpec};
use crate::tools::{Tool, ToolArgs};

const PYTHON_PARAMS: &[ParamSpec] = &[ParamSpec::required(
    "code",
    ParamKind::String,
    "Python source to execute; use print() to produce output",
)];

pub struct PythonTool {
    env: Arc<dyn Environment>,
    interpreter: String,
    timeout: Duration,
}

impl PythonTool {
    pub fn new(env: Arc<dyn Environment>, interpreter: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            env,
            interpreter: interpreter.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl Tool for PythonTool {
    fn name(&self) -> &str {
        "python"
    }

    fn description(&self) -> &str {
        "Execute a Python snippet inside the workspace and return its stdout/stderr."
    }

    fn parameters(&self) -> &[ParamSpec] {
        PYTHON_PARAMS
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, String> {
        let code = str_arg(&args, "code").unwrap_or_default();
        if code.trim().is_empty() {
            return Err("code cannot be empty".to_string());
        }

        let script = format!(".taskloop_snippet_{}.py", Uuid::new_v4().simple());
        self.env
            .write_file(&script, code)
            .await
            .map_err(|e| e.to_string())?;
        tracing::info!(script = %script, interpreter = %self.interpreter, "python tool execute");

        let result = self
            .env
            .run_command(&format!("{} {}", self.interpreter, script), self.timeout)
            .await;
        if let Err(e) = self.env.remove_file(&script).await {
            tracing::warn!(script = %script, error = %e, "failed to remove snippet");
        }
        let out = result.map_err(|e| format!("Execution failed: {}", e))?;

        if out.timed_out {
            return Err(format!(
                "python snippet timed out after {}s. Partial output:\n{}",
                self.timeout.as_secs(),
                out.output
            ));
        }
        if !out.success() {
            return Err(format!(
                "python exited with code {:?}\n{}",
                out.exit_code, out.output
            ));
        }
        if out.output.trim().is_empty() {
            Ok("Code ran with no output.".to_string())
        } else {
            Ok(format!("Code execution output:\n{}", out.output))
        }
    }
}
