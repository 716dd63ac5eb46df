//! Taskloop - 计划驱动的自主任务执行器
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、循环状态、Orchestrator 编排与 AgentBuilder 组装
//! - **llm**: 推理引擎客户端抽象与实现（OpenAI 兼容 / Scripted Mock）
//! - **memory**: 追加式执行历史与 prompt 截断策略
//! - **observability**: tracing 日志初始化（控制台 + 按次运行的日志文件）
//! - **react**: Planner、响应解析器、完成启发式、单步 ReAct 循环
//! - **sandbox**: 执行环境（本地工作区 / Docker 容器），路径越界校验
//! - **tools**: 工具箱（read_file、write_file、list_files、shell、python、finish）与执行器

pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod sandbox;
pub mod tools;

pub use crate::core::{AgentBuilder, AgentError, Orchestrator, RunOutcome};
