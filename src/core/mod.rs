//! 核心编排层：错误类型、循环状态、Orchestrator 与组件构建器

pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod state;

pub use builder::{create_llm_from_config, AgentBuilder};
pub use error::AgentError;
pub use orchestrator::{Orchestrator, RunOutcome};
pub use state::{CompletionSignal, LoopPhase};
