//! 认知层：Planner、响应解析策略、完成启发式、单步 ReAct 循环

pub mod events;
pub mod loop_;
pub mod parser;
pub mod planner;
pub mod prompt;
pub mod termination;

pub use events::ReactEvent;
pub use loop_::{StepExecutor, StepOutcome, DEFAULT_MAX_LOOPS};
pub use parser::{parser_for, JsonFenceParser, ParseError, ParsedResponse, ResponseParser, XmlTagParser};
pub use planner::{parse_plan, Planner};
pub use termination::{CompletionHeuristic, KeywordHeuristic, NoHeuristic};
