//! Translation between spreadsheet rows and JSON records.
//!
//! Rows carry no key of their own, so a record id is derived from the row's
//! position: `id = id_base + offset`, where `id_base` is the sheet row number
//! of the first fetched row. With the header on row 1 and data fetched from
//! row 2, a record id is simply its sheet row number. Inserting or deleting a
//! sheet row shifts the id of every record below it; ids are never stored.

use serde_json::{Map, Number, Value};

use crate::error::AppError;
use crate::sheets::CellRow;

pub type Record = Map<String, Value>;

pub const ID_FIELD: &str = "id";

/// How fields missing from a request body are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// New row: missing fields become empty cells.
    Create,
    /// Partial update: missing fields are `None` and the cell is left as is.
    Update,
}

pub fn is_blank(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}

/// Map one row onto the schema. Short rows are padded with empty strings and
/// unnamed columns are dropped. The positional id wins over a column named `id`.
pub fn row_to_record(row: &[String], schema: &[String], id: u64) -> Record {
    let mut record = Map::with_capacity(schema.len() + 1);
    record.insert(ID_FIELD.to_string(), Value::from(id));

    for (index, name) in schema.iter().enumerate() {
        if name.is_empty() {
            continue;
        }
        let cell = row.get(index).cloned().unwrap_or_default();
        record.insert(name.clone(), Value::String(cell));
    }

    record.insert(ID_FIELD.to_string(), Value::from(id));
    record
}

/// Map every non-blank row to a record. Blank rows are skipped but still
/// consume their id.
pub fn rows_to_records(rows: &[CellRow], schema: &[String], id_base: u64) -> Vec<Record> {
    rows.iter()
        .enumerate()
        .filter(|(_, row)| !is_blank(row))
        .map(|(offset, row)| row_to_record(row, schema, id_base + offset as u64))
        .collect()
}

/// Parse an item id from the request path. Ids below `id_base` can never
/// address a record.
pub fn parse_item_id(raw: &str, id_base: u64) -> Result<u64, AppError> {
    match raw.parse::<u64>() {
        Ok(id) if id >= id_base && id > 0 => Ok(id),
        _ => Err(AppError::InvalidInput(format!(
            "Invalid item id '{raw}': expected an integer greater than or equal to {id_base}"
        ))),
    }
}

/// The record with `item_id`, given rows fetched starting at `id_base`.
pub fn record_at(
    rows: &[CellRow],
    schema: &[String],
    id_base: u64,
    item_id: u64,
) -> Result<Record, AppError> {
    let row = item_id
        .checked_sub(id_base)
        .and_then(|offset| usize::try_from(offset).ok())
        .and_then(|offset| rows.get(offset))
        .filter(|row| !is_blank(row))
        .ok_or_else(|| AppError::NotFound("Record not found".to_string()))?;

    Ok(row_to_record(row, schema, item_id))
}

/// Lay a JSON body out as a row in schema order.
///
/// Strings are written as is, numbers and booleans as their text; `null`
/// counts as missing. Keys outside the schema are ignored, but a body naming
/// no schema field at all is rejected in either mode: as a create it would
/// only append a blank row. With [`WriteMode::Create`] every cell is `Some`.
pub fn record_to_row(
    body: &Value,
    schema: &[String],
    mode: WriteMode,
) -> Result<Vec<Option<String>>, AppError> {
    let object = body
        .as_object()
        .ok_or_else(|| AppError::InvalidInput("Request body must be a JSON object".to_string()))?;

    let mut known_fields = 0;
    let mut row = Vec::with_capacity(schema.len());

    for name in schema {
        let cell = match object.get(name.as_str()) {
            Some(value) if !name.is_empty() && name != ID_FIELD => cell_text(name, value)?,
            _ => None,
        };

        if cell.is_some() {
            known_fields += 1;
        }

        row.push(match mode {
            WriteMode::Create => Some(cell.unwrap_or_default()),
            WriteMode::Update => cell,
        });
    }

    if known_fields == 0 {
        return Err(AppError::InvalidInput(format!(
            "Request body contains none of the endpoint fields: {}",
            schema
                .iter()
                .filter(|name| !name.is_empty())
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    Ok(row)
}

fn cell_text(name: &str, value: &Value) -> Result<Option<String>, AppError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Array(_) | Value::Object(_) => Err(AppError::InvalidInput(format!(
            "Field '{name}' must be a string, number or boolean"
        ))),
    }
}

/// Opt-in typing of raw cell text: `true`/`false` become booleans and text
/// that fully parses as a finite number becomes a number.
pub fn format_record(record: Record) -> Record {
    record
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) if key != ID_FIELD => format_cell(s),
                other => other,
            };
            (key, value)
        })
        .collect()
}

fn format_cell(text: String) -> Value {
    if text.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if text.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(int) = text.parse::<i64>() {
        return Value::from(int);
    }
    if let Some(number) = text
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
    {
        return Value::Number(number);
    }
    Value::String(text)
}
