//! Turns an operation result into a display hint.
//!
//! The category comes from the catalog entry, not from sniffing the value,
//! so a stats object is a chart even when one of its numbers is zero.

use ia_tools::ShapeCategory;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Visualization {
    Stat {
        value: Value,
    },
    Table {
        data: Vec<Value>,
        columns: Vec<String>,
    },
    Chart {
        chart_type: ChartType,
        data: Map<String, Value>,
        labels: Vec<String>,
        values: Vec<Value>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
}

/// Response body of a successful `POST /chat`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShapedResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub tool_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization: Option<Visualization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl ShapedResponse {
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            answer: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn tool_result(tool_name: &str, category: ShapeCategory, result: Value) -> Self {
        let visualization = shape(category, &result);
        Self {
            tool_used: Some(tool_name.to_string()),
            result: Some(result),
            visualization,
            ..Self::default()
        }
    }

    pub fn with_explanation(mut self, text: &str) -> Self {
        let text = text.trim();
        if !text.is_empty() {
            self.explanation = Some(text.to_string());
        }
        self
    }
}

pub fn shape(category: ShapeCategory, result: &Value) -> Option<Visualization> {
    match category {
        ShapeCategory::Stat => shape_stat(result),
        ShapeCategory::Table => shape_table(result),
        ShapeCategory::Chart => shape_chart(result),
        ShapeCategory::Record => match result {
            Value::Object(_) => single_row_table(result),
            _ => None,
        },
    }
}

fn shape_stat(result: &Value) -> Option<Visualization> {
    match result {
        Value::Null => None,
        Value::Object(map) if map.len() == 1 => map.values().next().map(|v| Visualization::Stat {
            value: v.clone(),
        }),
        Value::Object(_) => shape_chart(result),
        Value::Array(_) => shape_table(result),
        scalar => Some(Visualization::Stat {
            value: scalar.clone(),
        }),
    }
}

fn shape_table(result: &Value) -> Option<Visualization> {
    match result {
        Value::Array(rows) if !rows.is_empty() => {
            let columns = rows
                .first()
                .and_then(Value::as_object)
                .map(|first| first.keys().cloned().collect())
                .unwrap_or_default();
            Some(Visualization::Table {
                data: rows.clone(),
                columns,
            })
        }
        Value::Object(_) => single_row_table(result),
        _ => None,
    }
}

fn shape_chart(result: &Value) -> Option<Visualization> {
    let Value::Object(map) = result else {
        return shape_table(result);
    };
    if map.len() == 1 {
        return shape_stat(result);
    }
    let numeric: Vec<(&String, &Value)> = map.iter().filter(|(_, v)| v.is_number()).collect();
    if numeric.is_empty() {
        return single_row_table(result);
    }
    Some(Visualization::Chart {
        chart_type: ChartType::Bar,
        data: map.clone(),
        labels: numeric.iter().map(|(k, _)| (*k).clone()).collect(),
        values: numeric.iter().map(|(_, v)| (*v).clone()).collect(),
    })
}

fn single_row_table(result: &Value) -> Option<Visualization> {
    let map = result.as_object()?;
    if map.is_empty() {
        return None;
    }
    Some(Visualization::Table {
        data: vec![result.clone()],
        columns: map.keys().cloned().collect(),
    })
}
