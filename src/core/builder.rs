//! Agent 构建器：从 AppConfig 组装执行环境、工具、解析策略、启发式、Planner 与 Orchestrator
//!
//! 执行环境每次 build 构建一次，以 Arc 显式传给各工具；LLM 与环境都可注入，测试时用 ScriptedLlmClient + 临时目录。

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::config::{AppConfig, SandboxKind};
use crate::core::{AgentError, Orchestrator};
use crate::llm::{LlmClient, OpenAiClient};
use crate::memory::HistoryWindow;
use crate::react::{
    parser_for, CompletionHeuristic, KeywordHeuristic, NoHeuristic, Planner, ReactEvent, StepExecutor,
};
use crate::sandbox::{DockerTerminal, Environment, LocalWorkspace};
use crate::tools::{
    FinishTool, ListFilesTool, PythonTool, ReadFileTool, ShellTool, ToolExecutor, ToolRegistry, WriteFileTool,
};

/// 从配置创建 OpenAI 兼容客户端；缺少凭据等配置问题是致命错误
pub fn create_llm_from_config(cfg: &AppConfig) -> Result<Arc<dyn LlmClient>, AgentError> {
    cfg.validate()?;
    let client = OpenAiClient::from_config(&cfg.llm)?;
    tracing::info!(model = %cfg.llm.model, "using OpenAI-compatible LLM");
    Ok(Arc::new(client))
}

pub struct AgentBuilder {
    config: AppConfig,
    llm: Option<Arc<dyn LlmClient>>,
    environment: Option<Arc<dyn Environment>>,
    event_tx: Option<UnboundedSender<ReactEvent>>,
}

impl AgentBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            llm: None,
            environment: None,
            event_tx: None,
        }
    }

    /// 注入 LLM（不设置时按配置创建）
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// 注入执行环境（不设置时按 sandbox 配置创建）
    pub fn with_environment(mut self, env: Arc<dyn Environment>) -> Self {
        self.environment = Some(env);
        self
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn build_environment(&self) -> Result<Arc<dyn Environment>, AgentError> {
        if let Some(env) = &self.environment {
            return Ok(env.clone());
        }
        let sandbox = &self.config.sandbox;
        match sandbox.kind {
            SandboxKind::Local => {
                let ws = LocalWorkspace::new(&sandbox.workspace_dir)?;
                tracing::info!(workspace = %ws.root().display(), "using local workspace");
                Ok(Arc::new(ws))
            }
            SandboxKind::Docker => {
                if sandbox.docker.container.trim().is_empty() {
                    return Err(AgentError::Config("sandbox.docker.container is not configured".into()));
                }
                tracing::info!(container = %sandbox.docker.container, "using docker terminal");
                Ok(Arc::new(DockerTerminal::from_config(&sandbox.docker)))
            }
        }
    }

    /// 所有内置工具；终止工具同时以 finish 与 terminate 两个名字注册
    pub fn build_tool_registry(&self, env: Arc<dyn Environment>) -> Result<ToolRegistry, AgentError> {
        let tools_cfg = &self.config.tools;
        let mut tools = ToolRegistry::new();
        tools.register(ReadFileTool::new(env.clone()))?;
        tools.register(WriteFileTool::new(env.clone()))?;
        tools.register(ListFilesTool::new(env.clone()))?;
        tools.register(ShellTool::new(
            env.clone(),
            tools_cfg.shell.allowed_commands.clone(),
            tools_cfg.shell_timeout_secs,
        ))?;
        tools.register(PythonTool::new(
            env,
            tools_cfg.python_interpreter.clone(),
            tools_cfg.python_timeout_secs,
        ))?;
        tools.register(FinishTool::new())?;
        tools.register(FinishTool::terminate())?;
        Ok(tools)
    }

    pub fn build_heuristic(&self) -> Arc<dyn CompletionHeuristic> {
        let agent = &self.config.agent;
        if agent.completion_heuristic {
            Arc::new(KeywordHeuristic::new(agent.completion_markers.clone()))
        } else {
            Arc::new(NoHeuristic)
        }
    }

    pub fn build(self) -> Result<Orchestrator, AgentError> {
        let llm = match &self.llm {
            Some(llm) => {
                self.config.validate_runtime()?;
                llm.clone()
            }
            None => create_llm_from_config(&self.config)?,
        };
        let env = self.build_environment()?;
        let registry = self.build_tool_registry(env)?;
        let agent = &self.config.agent;

        let tools = Arc::new(ToolExecutor::new(registry, self.config.tools.tool_timeout_secs));
        let mut executor = StepExecutor::new(llm.clone(), tools)
            .with_parser(parser_for(agent.wire_format))
            .with_heuristic(self.build_heuristic())
            .with_window(HistoryWindow::new(agent.history_window, agent.max_observation_chars))
            .with_max_loops(agent.max_loops_per_step);
        let mut orchestrator_tx = None;
        if let Some(tx) = self.event_tx {
            executor = executor.with_event_tx(tx.clone());
            orchestrator_tx = Some(tx);
        }

        let mut orchestrator = Orchestrator::new(Planner::new(llm), executor);
        if let Some(tx) = orchestrator_tx {
            orchestrator = orchestrator.with_event_tx(tx);
        }
        Ok(orchestrator)
    }
}
