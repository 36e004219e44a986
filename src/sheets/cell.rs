use crate::error::{AppError, Result};
use serde_json::Value;

/// A single spreadsheet cell as returned by the values API.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

pub type Row = Vec<CellValue>;

/// Rows in the order the API returned them. Rows may differ in length because
/// the API drops trailing empty cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Decode the raw `values` grid of a values response.
    pub fn from_values(values: &[Vec<Value>]) -> Result<Self> {
        let rows = values
            .iter()
            .enumerate()
            .map(|(row_idx, row)| {
                row.iter()
                    .enumerate()
                    .map(|(col_idx, value)| decode_cell(value, row_idx + 1, col_idx + 1))
                    .collect::<Result<Row>>()
            })
            .collect::<Result<Vec<Row>>>()?;

        Ok(Self::new(rows))
    }
}

fn decode_cell(value: &Value, row: usize, column: usize) -> Result<CellValue> {
    match value {
        Value::String(s) => Ok(CellValue::Text(s.clone())),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(CellValue::Integer(i)),
            None => n
                .as_f64()
                .map(CellValue::Float)
                .ok_or_else(|| type_mismatch(value, row, column)),
        },
        // Sheets displays booleans as TRUE/FALSE
        Value::Bool(true) => Ok(CellValue::Text("TRUE".to_string())),
        Value::Bool(false) => Ok(CellValue::Text("FALSE".to_string())),
        Value::Null => Ok(CellValue::Text(String::new())),
        Value::Array(_) | Value::Object(_) => Err(type_mismatch(value, row, column)),
    }
}

fn type_mismatch(value: &Value, row: usize, column: usize) -> AppError {
    AppError::TypeMismatch {
        row,
        column,
        value: value.to_string(),
    }
}
