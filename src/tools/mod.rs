pub mod executor;
pub mod filesystem;
pub mod finish;
pub mod params;
pub mod python;
pub mod registry;
pub mod schema;
pub mod shell;

pub use executor::{Invocation, InvocationOutcome, ToolExecutor};
pub use filesystem::{ListFilesTool, ReadFileTool, WriteFileTool};
pub use finish::{FinishTool, NO_SUMMARY};
pub use params::{ParamKind, ParamSpec};
pub use python::PythonTool;
pub use registry::{Action, Tool, ToolArgs, ToolRegistry, ToolSchema};
pub use schema::action_schema_json;
pub use shell::ShellTool;
