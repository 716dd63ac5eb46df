//! LLM 层：推理引擎客户端抽象与实现（OpenAI 兼容 / Scripted Mock）

pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;

pub use message::{Message, Role};
pub use mock::{RecordedCall, ScriptedLlmClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{in_band_error, LlmClient, LlmError, ERROR_MARKER};
