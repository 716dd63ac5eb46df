//! 工作区文件工具
//!
//! ReadFileTool / WriteFileTool / ListFilesTool 都只经由 Environment 访问文件，
//! 路径越界与不存在等错误由环境统一报告。

use std::sync::Arc;

use async_trait::async_trait;

use crate::sandbox::Environment;
use crate::tools::params::{str_arg, ParamKind, ParamSpec};
use crate::tools::{Tool, ToolArgs};

const READ_PARAMS: &[ParamSpec] = &[ParamSpec::required(
    "path",
    ParamKind::String,
    "file path relative to the workspace",
)];

const WRITE_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("path", ParamKind::String, "file path relative to the workspace"),
    ParamSpec::required("content", ParamKind::String, "full file content (overwrites)"),
];

const LIST_PARAMS: &[ParamSpec] = &[ParamSpec::optional(
    "path",
    ParamKind::String,
    "directory relative to the workspace, default '.'",
)];

/// 读取文件内容
pub struct ReadFileTool {
    env: Arc<dyn Environment>,
}

impl ReadFileTool {
    pub fn new(env: Arc<dyn Environment>) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the full content of a file in the workspace."
    }

    fn parameters(&self) -> &[ParamSpec] {
        READ_PARAMS
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, String> {
        let path = str_arg(&args, "path").unwrap_or_default();
        tracing::info!(path = %path, "read_file");
        let content = self.env.read_file(path).await.map_err(|e| e.to_string())?;
        // 正文放在分隔线之间，避免与完成标记等控制词混淆
        Ok(format!("Contents of '{}':\n---\n{}\n---", path, content))
    }
}

/// 覆盖写入文件，父目录自动创建
pub struct WriteFileTool {
    env: Arc<dyn Environment>,
}

impl WriteFileTool {
    pub fn new(env: Arc<dyn Environment>) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file in the workspace, replacing any existing content."
    }

    fn parameters(&self) -> &[ParamSpec] {
        WRITE_PARAMS
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, String> {
        let path = str_arg(&args, "path").unwrap_or_default();
        let content = str_arg(&args, "content").unwrap_or_default();
        tracing::info!(path = %path, bytes = content.len(), "write_file");
        self.env
            .write_file(path, content)
            .await
            .map_err(|e| e.to_string())?;
        Ok(format!(
            "Content successfully written to '{}' ({} bytes).",
            path,
            content.len()
        ))
    }
}

/// 列出目录条目（目录以 `/` 结尾）
pub struct ListFilesTool {
    env: Arc<dyn Environment>,
}

impl ListFilesTool {
    pub fn new(env: Arc<dyn Environment>) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List the entries of a workspace directory."
    }

    fn parameters(&self) -> &[ParamSpec] {
        LIST_PARAMS
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, String> {
        let path = str_arg(&args, "path")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(".");
        tracing::info!(path = %path, "list_files");
        let entries = self.env.list_files(path).await.map_err(|e| e.to_string())?;
        if entries.is_empty() {
            return Ok(format!("Directory '{}' is empty.", path));
        }
        let lines: Vec<String> = entries.iter().map(|e| format!("- {}", e)).collect();
        Ok(format!("Files in '{}':\n{}", path, lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::LocalWorkspace;
    use serde_json::json;

    fn args(v: serde_json::Value) -> ToolArgs {
        v.as_object().cloned().unwrap()
    }

    fn workspace() -> (tempfile::TempDir, Arc<dyn Environment>) {
        let dir = tempfile::tempdir().unwrap();
        let env: Arc<dyn Environment> = Arc::new(LocalWorkspace::new(dir.path()).unwrap());
        (dir, env)
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (_dir, env) = workspace();
        let write = WriteFileTool::new(env.clone());
        let out = write
            .execute(args(json!({"path": "out/file.txt", "content": "hello"})))
            .await
            .unwrap();
        assert_eq!(out, "Content successfully written to 'out/file.txt' (5 bytes).");

        let read = ReadFileTool::new(env);
        let out = read.execute(args(json!({"path": "out/file.txt"}))).await.unwrap();
        assert!(out.contains("\nhello\n"));
    }

    #[tokio::test]
    async fn test_read_missing_file_errors() {
        let (_dir, env) = workspace();
        let err = ReadFileTool::new(env)
            .execute(args(json!({"path": "ghost.txt"})))
            .await
            .unwrap_err();
        assert!(err.contains("Not found"));
    }

    #[tokio::test]
    async fn test_list_files_defaults_to_root() {
        let (_dir, env) = workspace();
        let list = ListFilesTool::new(env.clone());
        assert_eq!(list.execute(ToolArgs::new()).await.unwrap(), "Directory '.' is empty.");
        env.write_file("a.txt", "x").await.unwrap();
        env.write_file("sub/b.txt", "y").await.unwrap();
        assert_eq!(
            list.execute(ToolArgs::new()).await.unwrap(),
            "Files in '.':\n- a.txt\n- sub/"
        );
    }

    #[tokio::test]
    async fn test_escape_reported_as_error() {
        let (_dir, env) = workspace();
        let err = WriteFileTool::new(env)
            .execute(args(json!({"path": "../x.txt", "content": "x"})))
            .await
            .unwrap_err();
        assert!(err.contains("Path escape"));
    }
}
