use crate::catalog::{self, OperationKind, OperationSpec, ParamKind, ParamSpec};
use crate::error::{Result, ToolError};
use crate::table::Table;
use serde_json::{Map, Value};

/// One model-chosen call, resolved against the catalog and validated.
///
/// Built once per request and consumed by a single dispatch.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub kind: OperationKind,
    pub arguments: Map<String, Value>,
}

impl ToolInvocation {
    /// Resolve `name` and validate the raw JSON argument text the model produced.
    pub fn from_call(name: &str, arguments: &str) -> Result<Self> {
        let Some(spec) = catalog::lookup(name) else {
            return Err(ToolError::UnknownOperation {
                name: name.to_string(),
                available: catalog::operation_names(),
            });
        };
        let arguments = parse_arguments(arguments)?;
        Self::new(spec.kind, arguments)
    }

    pub fn new(kind: OperationKind, arguments: Map<String, Value>) -> Result<Self> {
        let arguments = validate_arguments(kind.spec(), arguments)?;
        Ok(Self { kind, arguments })
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub(crate) fn table(&self) -> Result<Table> {
        let raw = self.require_str("table")?;
        Table::parse(raw)
    }

    pub(crate) fn integer(&self, key: &str) -> Result<i64> {
        self.arguments
            .get(key)
            .and_then(Value::as_i64)
            .ok_or_else(|| ToolError::InvalidArguments(format!("missing key: {key}")))
    }

    pub(crate) fn optional_str(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }

    pub(crate) fn optional_f64(&self, key: &str) -> Option<f64> {
        self.arguments.get(key).and_then(Value::as_f64)
    }

    fn require_str(&self, key: &str) -> Result<&str> {
        self.optional_str(key)
            .ok_or_else(|| ToolError::InvalidArguments(format!("missing key: {key}")))
    }
}

fn parse_arguments(raw: &str) -> Result<Map<String, Value>> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(ToolError::InvalidArguments(format!(
            "arguments must be a JSON object, got {other}"
        ))),
        Err(e) => Err(ToolError::InvalidArguments(format!(
            "arguments are not valid JSON: {e}"
        ))),
    }
}

/// Apply the catalog's validation policy.
///
/// A `table` argument must name an allowed table, even when the operation does
/// not declare one. Bounded integers are clamped, never rejected; record ids
/// pass through unchanged. Missing
/// optional integers take their declared default. Undeclared keys are dropped.
pub fn validate_arguments(
    spec: &OperationSpec,
    mut arguments: Map<String, Value>,
) -> Result<Map<String, Value>> {
    if let Some(raw) = arguments.get("table") {
        let table = match raw {
            Value::String(s) => Table::parse(s)?,
            other => {
                return Err(ToolError::InvalidTable {
                    table: other.to_string(),
                });
            }
        };
        arguments.insert("table".to_string(), Value::from(table.as_str()));
    }

    let mut out = Map::new();
    for param in &spec.params {
        let value = arguments.remove(param.name).filter(|v| !v.is_null());
        if let Some(value) = validate_param(spec, param, value)? {
            out.insert(param.name.to_string(), value);
        }
    }
    if !arguments.is_empty() {
        tracing::debug!(
            tool_name = spec.name,
            dropped = ?arguments.keys().collect::<Vec<_>>(),
            "dropping undeclared tool arguments"
        );
    }
    Ok(out)
}

fn validate_param(
    spec: &OperationSpec,
    param: &ParamSpec,
    value: Option<Value>,
) -> Result<Option<Value>> {
    let Some(value) = value else {
        if let ParamKind::Integer {
            default: Some(default),
            ..
        } = param.kind
        {
            return Ok(Some(Value::from(default)));
        }
        if param.required {
            return Err(ToolError::InvalidArguments(format!(
                "missing key: {}",
                param.name
            )));
        }
        return Ok(None);
    };

    match &param.kind {
        ParamKind::Table => Ok(Some(value)),
        ParamKind::Integer { default, min, max } => {
            let n = match coerce_integer(&value) {
                Some(n) => n,
                None => match default {
                    Some(default) => {
                        tracing::warn!(
                            tool_name = spec.name,
                            param = param.name,
                            value = %value,
                            fallback = *default,
                            "non-numeric tool argument replaced by default"
                        );
                        *default
                    }
                    None => {
                        return Err(ToolError::InvalidArguments(format!(
                            "key {} must be an integer, got {value}",
                            param.name
                        )));
                    }
                },
            };
            let clamped = n.clamp(*min, *max);
            if clamped != n {
                tracing::info!(
                    tool_name = spec.name,
                    param = param.name,
                    requested = n,
                    clamped,
                    "tool argument clamped into range"
                );
            }
            Ok(Some(Value::from(clamped)))
        }
        ParamKind::Key => match coerce_integer(&value) {
            Some(id) => Ok(Some(Value::from(id))),
            None => Err(ToolError::InvalidArguments(format!(
                "key {} must be an integer id, got {value}",
                param.name
            ))),
        },
        ParamKind::Number => match coerce_number(&value) {
            Some(n) => Ok(Some(Value::from(n))),
            None => Err(ToolError::InvalidArguments(format!(
                "key {} must be a number, got {value}",
                param.name
            ))),
        },
        ParamKind::Text | ParamKind::Date => match value {
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => Ok(Some(Value::String(s.trim().to_string()))),
            other => Err(ToolError::InvalidArguments(format!(
                "key {} must be string, got {other}",
                param.name
            ))),
        },
    }
}

fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|_| i64::MAX))
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|f| f.is_finite())
}
