//! 规划与执行的 prompt 模板
//!
//! 执行器的格式说明段由当前 ResponseParser 提供，保证 prompt 与解析约定一致。

/// 规划阶段的 instructions
pub const PLANNING_INSTRUCTIONS: &str = "\
You are an expert project planner. Break the user's goal down into a clear, concise and executable list of steps.
The plan will be carried out by another agent that can read and write files, run shell commands and Python code, and finish the task.

Rules:
1. Be concise: every step must be specific and actionable.
2. Be comprehensive: cover everything from start to finish, including verification.
3. The final step MUST use the `finish` tool to summarize the work and formally end the task.
4. Output ONLY the ordered list of steps, one per line, numbered `1.`, `2.`, ... with no introduction or explanation.";

/// 规划阶段的用户 prompt
pub fn planning_prompt(task: &str) -> String {
    format!("User task:\n{}\n\nWrite the plan now.", task.trim())
}

/// 执行阶段的 instructions：角色、工具列表、参数 schema、格式约定
pub fn executor_instructions(tools_description: &str, tool_schemas: &str, format_section: &str) -> String {
    format!(
        "You are an autonomous problem-solving agent following a plan to accomplish a larger task.
At each turn you receive the current step, the overall plan, and the history of your previous actions.
You work in a cycle of Thought and Action, choosing exactly ONE tool per response.

Available tools:
{tools}

Tool argument schemas (JSON):
{schemas}

{format}

Rules:
1. One action per response.
2. Focus on the current step; use the plan and history to guide your decisions.
3. When the current step and the entire task are complete, call the `finish` tool with a detailed summary.",
        tools = tools_description,
        schemas = tool_schemas,
        format = format_section
    )
}

/// 执行阶段每轮的用户 prompt
pub fn step_prompt(task: &str, plan: &[String], step_index: usize, history: &str, tools_list: &str) -> String {
    let current = plan
        .get(step_index.saturating_sub(1))
        .map(String::as_str)
        .unwrap_or_default();
    format!(
        "Overall task:
{task}

Full plan:
{plan}

History (your previous thoughts, actions and observations):
{history}

Current step to accomplish:
{step}. {current}

Decide your next thought and action. Choose one tool from: {tools}",
        task = task.trim(),
        plan = render_plan(plan),
        history = history,
        step = step_index,
        current = current,
        tools = tools_list
    )
}

/// 计划按 `1. xxx` 逐行编号
pub fn render_plan(plan: &[String]) -> String {
    plan.iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n")
}
