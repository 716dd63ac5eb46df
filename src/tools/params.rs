//! 工具参数的静态声明与校验
//!
//! 每个工具以 ParamSpec 列表声明参数（名称、类型、是否必需）；注册时检查声明本身，
//! 调用前检查参数的存在性与类型。XML 线格式的参数全是字符串，数值与布尔参数会按声明做一次转换。

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::core::AgentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Object => "object",
            ParamKind::Array => "array",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Object => value.is_object(),
            ParamKind::Array => value.is_array(),
        }
    }

    /// 字符串形式的标量按声明类型转换；无法转换时返回 None
    fn coerce(&self, raw: &str) -> Option<Value> {
        let raw = raw.trim();
        match self {
            ParamKind::Integer => raw.parse::<i64>().ok().map(Value::from),
            ParamKind::Number => raw
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            ParamKind::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        }
    }
}

/// 单个参数的静态声明
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
}

impl ParamSpec {
    pub const fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
        }
    }
}

/// 注册时检查声明：参数名非空、合法且不重复
pub fn check_declaration(tool: &str, params: &[ParamSpec]) -> Result<(), AgentError> {
    for (i, p) in params.iter().enumerate() {
        if !is_identifier(p.name) {
            return Err(AgentError::Registration(format!(
                "tool '{}' declares an invalid parameter name '{}'",
                tool, p.name
            )));
        }
        if params[..i].iter().any(|q| q.name == p.name) {
            return Err(AgentError::Registration(format!(
                "tool '{}' declares parameter '{}' twice",
                tool, p.name
            )));
        }
    }
    Ok(())
}

/// 调用前校验并就地规范化参数：缺少必需参数或类型不符即失败；
/// 可选参数为 null 视为未提供；未声明的额外参数保留不动
pub fn validate_args(tool: &str, params: &[ParamSpec], args: &mut Map<String, Value>) -> Result<(), AgentError> {
    for spec in params {
        let present = matches!(args.get(spec.name), Some(v) if !v.is_null());
        if !present {
            if spec.required {
                return Err(invalid(tool, format!("missing required argument '{}'", spec.name)));
            }
            args.remove(spec.name);
            continue;
        }
        let Some(value) = args.get_mut(spec.name) else {
            continue;
        };
        if spec.kind.matches(value) {
            continue;
        }
        let coerced = value.as_str().and_then(|s| spec.kind.coerce(s));
        match coerced {
            Some(v) => *value = v,
            None => {
                return Err(invalid(
                    tool,
                    format!(
                        "argument '{}' must be of type {}, got {}",
                        spec.name,
                        spec.kind.as_str(),
                        json_type_name(value)
                    ),
                ))
            }
        }
    }
    Ok(())
}

/// 取已校验过的字符串参数
pub fn str_arg<'a>(args: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    args.get(name).and_then(Value::as_str)
}

pub(crate) fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn invalid(tool: &str, reason: String) -> AgentError {
    AgentError::InvalidArguments {
        tool: tool.to_string(),
        reason,
    }
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PARAMS: &[ParamSpec] = &[
        ParamSpec::required("path", ParamKind::String, "file path"),
        ParamSpec::optional("limit", ParamKind::Integer, "max lines"),
        ParamSpec::optional("verbose", ParamKind::Boolean, "chatty"),
    ];

    fn args(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_missing_required_rejected() {
        let mut a = args(json!({"limit": 3}));
        let err = validate_args("read", PARAMS, &mut a).unwrap_err();
        assert!(err.to_string().contains("missing required argument 'path'"));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let mut a = args(json!({"path": 42}));
        let err = validate_args("read", PARAMS, &mut a).unwrap_err();
        assert!(err.to_string().contains("must be of type string, got number"));
    }

    #[test]
    fn test_string_scalars_are_coerced() {
        let mut a = args(json!({"path": "a.txt", "limit": "10", "verbose": "TRUE"}));
        validate_args("read", PARAMS, &mut a).unwrap();
        assert_eq!(a["limit"], json!(10));
        assert_eq!(a["verbose"], json!(true));
    }

    #[test]
    fn test_uncoercible_string_rejected() {
        let mut a = args(json!({"path": "a.txt", "limit": "ten"}));
        assert!(validate_args("read", PARAMS, &mut a).is_err());
    }

    #[test]
    fn test_null_optional_is_dropped_and_extras_kept() {
        let mut a = args(json!({"path": "a.txt", "limit": null, "note": "x"}));
        validate_args("read", PARAMS, &mut a).unwrap();
        assert!(!a.contains_key("limit"));
        assert_eq!(a["note"], json!("x"));
    }

    #[test]
    fn test_declaration_checks() {
        assert!(check_declaration("t", PARAMS).is_ok());
        let dup = [
            ParamSpec::required("path", ParamKind::String, ""),
            ParamSpec::optional("path", ParamKind::String, ""),
        ];
        assert!(matches!(check_declaration("t", &dup), Err(AgentError::Registration(_))));
        let bad = [ParamSpec::required("File Path", ParamKind::String, "")];
        assert!(check_declaration("t", &bad).is_err());
    }
}
