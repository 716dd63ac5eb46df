//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `TASKLOOP__*` 覆盖（双下划线表示嵌套，如 `TASKLOOP__LLM__MODEL=gpt-4o`）。
//! API Key 额外支持 `LLM_API_KEY` / `OPENAI_API_KEY`，优先级高于文件中的值。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::AgentError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub agent: AgentSection,
    pub tools: ToolsSection,
    pub sandbox: SandboxSection,
    pub logging: LoggingSection,
}

/// [llm] 段：OpenAI 兼容端点、模型与采样参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            base_url: None,
            api_key: None,
            max_tokens: 4096,
            temperature: 0.1,
            request_timeout_secs: 60,
        }
    }
}

impl LlmSection {
    /// 环境变量优先：LLM_API_KEY > OPENAI_API_KEY > 配置文件
    pub fn resolved_api_key(&self) -> Option<String> {
        ["LLM_API_KEY", "OPENAI_API_KEY"]
            .into_iter()
            .find_map(|k| std::env::var(k).ok().filter(|v| !v.trim().is_empty()))
            .or_else(|| self.api_key.clone().filter(|v| !v.trim().is_empty()))
    }
}

/// 动作输出的线格式：fenced JSON 或 XML 标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    #[default]
    Json,
    Xml,
}

/// [agent] 段：循环预算、历史窗口、完成启发式
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// 每个计划步骤最多的思考-行动轮数
    pub max_loops_per_step: usize,
    /// prompt 中保留的最近历史条数，0 表示不截断
    pub history_window: usize,
    /// prompt 中单条 observation 的最大字符数，0 表示不截断
    pub max_observation_chars: usize,
    /// 是否启用「observation 含完成关键词即结束当前步骤」的兼容启发式
    pub completion_heuristic: bool,
    pub completion_markers: Vec<String>,
    pub wire_format: WireFormat,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_loops_per_step: 10,
            history_window: 30,
            max_observation_chars: 4000,
            completion_heuristic: true,
            completion_markers: default_completion_markers(),
            wire_format: WireFormat::Json,
        }
    }
}

fn default_completion_markers() -> Vec<String> {
    vec!["successfully".into(), "done".into(), "complete".into()]
}

/// [tools] 段：工具超时、Python 解释器、Shell 白名单
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 执行器对单次工具调用施加的外层超时（秒）
    pub tool_timeout_secs: u64,
    pub shell_timeout_secs: u64,
    pub python_timeout_secs: u64,
    pub python_interpreter: String,
    pub shell: ShellSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 90,
            shell_timeout_secs: 60,
            python_timeout_secs: 60,
            python_interpreter: "python3".to_string(),
            shell: ShellSection::default(),
        }
    }
}

/// [tools.shell] 段：允许执行的命令名（仅首词）；为空表示不限制
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ShellSection {
    pub allowed_commands: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SandboxKind {
    #[default]
    Local,
    Docker,
}

/// [sandbox] 段：执行环境类型与工作区
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SandboxSection {
    pub kind: SandboxKind,
    /// 本地工作区根目录，不存在时自动创建
    pub workspace_dir: PathBuf,
    pub docker: DockerSection,
}

impl Default for SandboxSection {
    fn default() -> Self {
        Self {
            kind: SandboxKind::Local,
            workspace_dir: PathBuf::from("workspace"),
            docker: DockerSection::default(),
        }
    }
}

/// [sandbox.docker] 段：已运行的容器名与容器内工作目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DockerSection {
    pub container: String,
    pub workdir: PathBuf,
    pub binary: String,
}

impl Default for DockerSection {
    fn default() -> Self {
        Self {
            container: String::new(),
            workdir: PathBuf::from("/workspace"),
            binary: "docker".to_string(),
        }
    }
}

/// [logging] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub log_dir: PathBuf,
    /// RUST_LOG 未设置时使用的过滤级别
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// 校验运行必需项（含 LLM 凭据）；任何缺失都是致命配置错误
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.llm.model.trim().is_empty() {
            return Err(AgentError::Config("llm.model is not configured".into()));
        }
        if self.llm.resolved_api_key().is_none() {
            return Err(AgentError::Config(
                "LLM API key is not configured; set llm.api_key or the LLM_API_KEY environment variable"
                    .into(),
            ));
        }
        self.validate_runtime()
    }

    /// 与 LLM 凭据无关的校验；注入 LLM 时同样适用
    pub fn validate_runtime(&self) -> Result<(), AgentError> {
        if self.agent.max_loops_per_step == 0 {
            return Err(AgentError::Config("agent.max_loops_per_step must be at least 1".into()));
        }
        if self.sandbox.kind == SandboxKind::Docker && self.sandbox.docker.container.trim().is_empty() {
            return Err(AgentError::Config(
                "sandbox.docker.container is required when sandbox.kind = \"docker\"".into(),
            ));
        }
        Ok(())
    }
}

/// 从 config 目录加载配置，环境变量 TASKLOOP__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path，则追加该文件（必须存在，可覆盖前面的键）
/// 3. 最后叠加环境变量 TASKLOOP__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TASKLOOP")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
