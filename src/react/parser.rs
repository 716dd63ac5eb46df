//! 模型输出解析：从自由文本中提取 `{thought, action{name, args}}`
//!
//! 两种线格式作为可替换的策略：JsonFenceParser（```json 围栏，失败时整段按 JSON 解析）
//! 与 XmlTagParser（`<thought>` / `<action><tool_name>` / `<parameters>`）。
//! 解析失败显式返回 ParseError，不做猜测；循环把它当作可恢复错误。

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::WireFormat;
use crate::tools::{action_schema_json, Action, ToolArgs};

/// 模型未给出 thought 时的占位
pub const MISSING_THOUGHT: &str = "[no thought provided]";

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub thought: String,
    pub action: Action,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("no structured block found")]
    NoStructuredBlock,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("malformed XML: {0}")]
    InvalidXml(String),

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
}

/// 解析策略：解析逻辑与 prompt 中的格式说明成对提供
pub trait ResponseParser: Send + Sync {
    fn name(&self) -> &'static str;

    fn parse(&self, output: &str) -> Result<ParsedResponse, ParseError>;

    /// 拼入执行器 instructions 的格式说明
    fn format_instructions(&self) -> String;

    /// 解析失败后写入历史的纠正提示
    fn correction_hint(&self) -> &'static str;
}

pub fn parser_for(format: WireFormat) -> Arc<dyn ResponseParser> {
    match format {
        WireFormat::Json => Arc::new(JsonFenceParser),
        WireFormat::Xml => Arc::new(XmlTagParser),
    }
}

// ---------- JSON ----------

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFenceParser;

fn json_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)```json\s*(\{.*?\})\s*```").unwrap())
}

impl JsonFenceParser {
    fn from_value(value: Value) -> Result<ParsedResponse, ParseError> {
        let Value::Object(mut root) = value else {
            return Err(ParseError::WrongType {
                field: "response",
                expected: "an object",
            });
        };
        let thought = match root.remove("thought") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => MISSING_THOUGHT.to_string(),
        };
        let action = match root.remove("action") {
            Some(Value::Object(a)) => a,
            Some(_) => {
                return Err(ParseError::WrongType {
                    field: "action",
                    expected: "an object",
                })
            }
            None => return Err(ParseError::MissingField("action")),
        };
        Ok(ParsedResponse {
            thought,
            action: action_from_map(action)?,
        })
    }
}

fn action_from_map(mut action: Map<String, Value>) -> Result<Action, ParseError> {
    let name = match action.remove("name") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::String(_)) | None => return Err(ParseError::MissingField("action.name")),
        Some(_) => {
            return Err(ParseError::WrongType {
                field: "action.name",
                expected: "a string",
            })
        }
    };
    let args = match action.remove("args") {
        Some(Value::Object(m)) => m,
        Some(Value::Null) | None => ToolArgs::new(),
        Some(_) => {
            return Err(ParseError::WrongType {
                field: "action.args",
                expected: "an object",
            })
        }
    };
    Ok(Action::new(name, args))
}

impl ResponseParser for JsonFenceParser {
    fn name(&self) -> &'static str {
        "json"
    }

    fn parse(&self, output: &str) -> Result<ParsedResponse, ParseError> {
        if let Some(block) = json_fence().captures(output).and_then(|c| c.get(1)) {
            match serde_json::from_str::<Value>(block.as_str()) {
                Ok(value) => return Self::from_value(value),
                Err(e) => tracing::debug!(error = %e, "fenced block is not valid JSON, trying whole text"),
            }
        }
        let trimmed = output.trim();
        if !trimmed.starts_with('{') {
            return Err(ParseError::NoStructuredBlock);
        }
        let value: Value =
            serde_json::from_str(trimmed).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
        Self::from_value(value)
    }

    fn format_instructions(&self) -> String {
        format!(
            "Response format:
Output exactly one JSON object inside a ```json fenced block with two keys: `thought` (your reasoning) and `action` (an object with the tool `name` and its `args`).

```json
{{
    \"thought\": \"Why I am choosing this tool and what I expect from it.\",
    \"action\": {{
        \"name\": \"tool_name\",
        \"args\": {{ \"arg_name\": \"value\" }}
    }}
}}
```

JSON Schema of the object:
{}",
            action_schema_json()
        )
    }

    fn correction_hint(&self) -> &'static str {
        "Invalid response format. Reply with exactly one ```json fenced block containing the keys `thought` and `action` (with `name` and `args`)."
    }
}

// ---------- XML ----------

#[derive(Debug, Clone, Copy, Default)]
pub struct XmlTagParser;

impl ResponseParser for XmlTagParser {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn parse(&self, output: &str) -> Result<ParsedResponse, ParseError> {
        let action_body = match element(output, "action")? {
            Some(body) => body,
            None if output.contains('<') => return Err(ParseError::MissingField("action")),
            None => return Err(ParseError::NoStructuredBlock),
        };
        let thought = element(output, "thought")?
            .map(text_content)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| MISSING_THOUGHT.to_string());
        let name = element(action_body, "tool_name")?
            .map(text_content)
            .filter(|n| !n.is_empty())
            .ok_or(ParseError::MissingField("action.tool_name"))?;

        let mut args = ToolArgs::new();
        if let Some(params) = element(action_body, "parameters")? {
            for (key, value) in children(params)? {
                args.insert(key, Value::String(value));
            }
        }
        Ok(ParsedResponse {
            thought,
            action: Action::new(name, args),
        })
    }

    fn format_instructions(&self) -> String {
        "Response format:
Every response must follow this XML layout exactly, with no text outside it. Parameter values are plain text; wrap values containing `<` or `&` in <![CDATA[ ... ]]>.

<response>
    <thought>Why I am choosing this tool and what I expect from it.</thought>
    <action>
        <tool_name>tool_name</tool_name>
        <parameters>
            <arg_name>value</arg_name>
        </parameters>
    </action>
</response>"
            .to_string()
    }

    fn correction_hint(&self) -> &'static str {
        "Invalid response format. Reply with a single <response> containing <thought> and <action> with <tool_name> and <parameters>."
    }
}

/// 找到第一个 `<tag>...</tag>`（或 `<tag/>`），返回内部原文
fn element<'a>(src: &'a str, tag: &str) -> Result<Option<&'a str>, ParseError> {
    let open = format!("<{}>", tag);
    let Some(start) = src.find(&open) else {
        let self_closing = [format!("<{}/>", tag), format!("<{} />", tag)];
        return Ok(self_closing.iter().any(|s| src.contains(s.as_str())).then_some(""));
    };
    let body = &src[start + open.len()..];
    let close = format!("</{}>", tag);
    match body.find(&close) {
        Some(end) => Ok(Some(&body[..end])),
        None => Err(ParseError::InvalidXml(format!("unclosed <{}>", tag))),
    }
}

/// 依次读取直接子元素 `<name>value</name>`；注释与空白跳过
fn children(src: &str) -> Result<Vec<(String, String)>, ParseError> {
    let mut out = Vec::new();
    let mut rest = src;
    while let Some(lt) = rest.find('<') {
        let after = &rest[lt + 1..];
        if let Some(comment) = after.strip_prefix("!--") {
            let end = comment
                .find("-->")
                .ok_or_else(|| ParseError::InvalidXml("unclosed comment".into()))?;
            rest = &comment[end + 3..];
            continue;
        }
        let gt = after
            .find('>')
            .ok_or_else(|| ParseError::InvalidXml("unterminated tag".into()))?;
        let raw = after[..gt].trim();
        if raw.starts_with('/') {
            return Err(ParseError::InvalidXml(format!("unexpected <{}>", raw)));
        }
        if let Some(name) = raw.strip_suffix('/') {
            out.push((name.trim().to_string(), String::new()));
            rest = &after[gt + 1..];
            continue;
        }
        let name = raw.split_whitespace().next().unwrap_or_default();
        if name.is_empty() {
            return Err(ParseError::InvalidXml("empty tag name".into()));
        }
        let body = &after[gt + 1..];
        let close = format!("</{}>", name);
        let end = body
            .find(&close)
            .ok_or_else(|| ParseError::InvalidXml(format!("unclosed <{}>", name)))?;
        out.push((name.to_string(), text_content(&body[..end])));
        rest = &body[end + close.len()..];
    }
    Ok(out)
}

/// CDATA 原样返回，否则反转义实体并去掉首尾空白
fn text_content(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(inner) = trimmed
        .strip_prefix("<![CDATA[")
        .and_then(|s| s.strip_suffix("]]>"))
    {
        return inner.to_string();
    }
    trimmed
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FENCED: &str = "```json\n{\"thought\": \"write it\", \"action\": {\"name\": \"write_file\", \"args\": {\"path\": \"a.txt\", \"content\": \"{x}\"}}}\n```";

    #[test]
    fn test_json_fence_ignores_surrounding_prose() {
        let bare = JsonFenceParser.parse(FENCED).unwrap();
        let wrapped = JsonFenceParser
            .parse(&format!("Sure! Here you go:\n{}\nLet me know.", FENCED))
            .unwrap();
        assert_eq!(bare, wrapped);
        assert_eq!(bare.thought, "write it");
        assert_eq!(bare.action.name, "write_file");
        assert_eq!(bare.action.args["content"], json!("{x}"));
    }

    #[test]
    fn test_json_whole_text_fallback() {
        let parsed = JsonFenceParser
            .parse(r#" {"action": {"name": "list_files"}} "#)
            .unwrap();
        assert_eq!(parsed.thought, MISSING_THOUGHT);
        assert!(parsed.action.args.is_empty());
    }

    #[test]
    fn test_json_failures_are_explicit() {
        assert_eq!(
            JsonFenceParser.parse("I think I'm done."),
            Err(ParseError::NoStructuredBlock)
        );
        assert!(matches!(
            JsonFenceParser.parse("{not json"),
            Err(ParseError::InvalidJson(_))
        ));
        assert_eq!(
            JsonFenceParser.parse(r#"{"thought": "x"}"#),
            Err(ParseError::MissingField("action"))
        );
        assert_eq!(
            JsonFenceParser.parse(r#"{"action": {"name": "", "args": {}}}"#),
            Err(ParseError::MissingField("action.name"))
        );
        assert!(matches!(
            JsonFenceParser.parse(r#"{"action": {"name": "x", "args": [1]}}"#),
            Err(ParseError::WrongType { field: "action.args", .. })
        ));
    }

    #[test]
    fn test_xml_parses_tool_and_parameters() {
        let out = "<response>\n  <thought>list first</thought>\n  <action>\n    <tool_name> shell </tool_name>\n    <parameters>\n      <command>ls -la &amp;&amp; echo ok</command>\n      <!-- note -->\n      <script><![CDATA[if a < b: print(1)]]></script>\n    </parameters>\n  </action>\n</response>";
        let parsed = XmlTagParser.parse(out).unwrap();
        assert_eq!(parsed.thought, "list first");
        assert_eq!(parsed.action.name, "shell");
        assert_eq!(parsed.action.args["command"], json!("ls -la && echo ok"));
        assert_eq!(parsed.action.args["script"], json!("if a < b: print(1)"));
    }

    #[test]
    fn test_xml_without_parameters_and_thought() {
        let parsed = XmlTagParser
            .parse("<action><tool_name>list_files</tool_name><parameters/></action>")
            .unwrap();
        assert_eq!(parsed.thought, MISSING_THOUGHT);
        assert!(parsed.action.args.is_empty());
    }

    #[test]
    fn test_xml_failures_are_explicit() {
        assert_eq!(XmlTagParser.parse("plain words"), Err(ParseError::NoStructuredBlock));
        assert_eq!(
            XmlTagParser.parse("<thought>hm</thought>"),
            Err(ParseError::MissingField("action"))
        );
        assert!(matches!(
            XmlTagParser.parse("<action><tool_name>x</tool_name>"),
            Err(ParseError::InvalidXml(_))
        ));
        assert_eq!(
            XmlTagParser.parse("<action><parameters></parameters></action>"),
            Err(ParseError::MissingField("action.tool_name"))
        );
    }

    #[test]
    fn test_format_instructions_match_parser() {
        assert!(parser_for(WireFormat::Json).format_instructions().contains("```json"));
        assert!(parser_for(WireFormat::Xml).format_instructions().contains("<tool_name>"));
        assert_eq!(parser_for(WireFormat::Xml).name(), "xml");
    }
}
