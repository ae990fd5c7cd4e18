//! DDL rendering per dialect.

use serde_json::Value;

use super::{Field, FieldKind, ModelDefinition};
use crate::db::Dialect;

/// Double-quotes an identifier.
#[must_use]
pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn column_type(kind: FieldKind, dialect: Dialect) -> String {
    match (kind, dialect) {
        (FieldKind::PrimaryKey, Dialect::Sqlite) => "INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
        (FieldKind::PrimaryKey, Dialect::Postgres) => "BIGSERIAL PRIMARY KEY".to_string(),
        (FieldKind::Integer, _) => "BIGINT".to_string(),
        (FieldKind::Real, Dialect::Sqlite) => "REAL".to_string(),
        (FieldKind::Real, Dialect::Postgres) => "DOUBLE PRECISION".to_string(),
        (FieldKind::Char { max_length }, _) => format!("VARCHAR({max_length})"),
        (FieldKind::Text, _) => "TEXT".to_string(),
        (FieldKind::Boolean, _) => "BOOLEAN".to_string(),
    }
}

fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}

fn column_sql(field: &Field, dialect: Dialect) -> String {
    let mut sql = format!("{} {}", quote(&field.name), column_type(field.kind, dialect));
    if !field.is_primary_key() {
        if !field.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &field.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&literal(default));
        }
    }
    sql
}

/// `CREATE TABLE IF NOT EXISTS` statement for `model`.
#[must_use]
pub fn create_table_sql(model: &ModelDefinition, dialect: Dialect) -> String {
    let columns: Vec<String> = model
        .fields()
        .iter()
        .map(|field| column_sql(field, dialect))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote(model.table()),
        columns.join(", ")
    )
}

/// `DROP TABLE IF EXISTS` statement for `model`.
#[must_use]
pub fn drop_table_sql(model: &ModelDefinition) -> String {
    format!("DROP TABLE IF EXISTS {}", quote(model.table()))
}
