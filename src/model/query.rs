//! Row-level data access for declared models.
//!
//! Every operation takes an explicit connection so handlers run it inside
//! their request transaction. The `*_all` helpers acquire a pooled
//! connection from the bound database instead.

use serde_json::Value;
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, AnyConnection, Row};

use super::schema::quote;
use super::{Field, FieldKind, Model, ModelDefinition, Record};
use crate::db::Dialect;
use crate::error::OrmError;

/// A validated value ready to bind.
#[derive(Debug, Clone, PartialEq)]
enum Bind {
    Integer(Option<i64>),
    Real(Option<f64>),
    Text(Option<String>),
    Boolean(Option<bool>),
}

impl Bind {
    fn apply<'q>(self, query: Query<'q, Any, AnyArguments<'q>>) -> Query<'q, Any, AnyArguments<'q>> {
        match self {
            Self::Integer(v) => query.bind(v),
            Self::Real(v) => query.bind(v),
            Self::Text(v) => query.bind(v),
            Self::Boolean(v) => query.bind(v),
        }
    }
}

fn validate(field: &Field, value: &Value) -> Result<Bind, OrmError> {
    let mismatch = |expected: &str| {
        OrmError::Validation(format!("field `{}` must be {expected}", field.name))
    };

    if value.is_null() {
        if !field.nullable && !field.is_primary_key() {
            return Err(OrmError::Validation(format!(
                "field `{}` may not be null",
                field.name
            )));
        }
        return Ok(match field.kind {
            FieldKind::PrimaryKey | FieldKind::Integer => Bind::Integer(None),
            FieldKind::Real => Bind::Real(None),
            FieldKind::Char { .. } | FieldKind::Text => Bind::Text(None),
            FieldKind::Boolean => Bind::Boolean(None),
        });
    }

    match field.kind {
        FieldKind::PrimaryKey | FieldKind::Integer => value
            .as_i64()
            .map(|v| Bind::Integer(Some(v)))
            .ok_or_else(|| mismatch("an integer")),
        FieldKind::Real => value
            .as_f64()
            .map(|v| Bind::Real(Some(v)))
            .ok_or_else(|| mismatch("a number")),
        FieldKind::Char { max_length } => {
            let s = value.as_str().ok_or_else(|| mismatch("a string"))?;
            if s.chars().count() > max_length as usize {
                return Err(OrmError::Validation(format!(
                    "field `{}` is longer than {max_length} characters",
                    field.name
                )));
            }
            Ok(Bind::Text(Some(s.to_string())))
        }
        FieldKind::Text => value
            .as_str()
            .map(|s| Bind::Text(Some(s.to_string())))
            .ok_or_else(|| mismatch("a string")),
        FieldKind::Boolean => value
            .as_bool()
            .map(|v| Bind::Boolean(Some(v)))
            .ok_or_else(|| mismatch("a boolean")),
    }
}

/// Checks `record` against `model` and returns the columns to insert.
fn prepare_insert(
    model: &ModelDefinition,
    record: &Record,
) -> Result<Vec<(String, Bind)>, OrmError> {
    if let Some(unknown) = record.keys().find(|key| model.field(key).is_none()) {
        return Err(OrmError::Validation(format!(
            "unknown field `{unknown}` for {}",
            model.name()
        )));
    }

    let mut columns = Vec::with_capacity(model.fields().len());
    for field in model.fields() {
        match record.get(&field.name) {
            Some(value) if !(field.is_primary_key() && value.is_null()) => {
                columns.push((field.name.clone(), validate(field, value)?));
            }
            _ if field.is_primary_key() => {}
            _ => match &field.default {
                Some(default) => columns.push((field.name.clone(), validate(field, default)?)),
                None if field.nullable => {}
                None => {
                    return Err(OrmError::Validation(format!(
                        "missing field `{}`",
                        field.name
                    )));
                }
            },
        }
    }
    Ok(columns)
}

fn column_list(model: &ModelDefinition) -> String {
    model
        .fields()
        .iter()
        .map(|f| quote(&f.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn insert_sql(model: &ModelDefinition, columns: &[(String, Bind)], dialect: Dialect) -> String {
    let returning = column_list(model);
    if columns.is_empty() {
        return format!(
            "INSERT INTO {} DEFAULT VALUES RETURNING {returning}",
            quote(model.table())
        );
    }
    let names: Vec<String> = columns.iter().map(|(name, _)| quote(name)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| dialect.placeholder(i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {returning}",
        quote(model.table()),
        names.join(", "),
        placeholders.join(", ")
    )
}

fn decode_field(row: &AnyRow, field: &Field) -> Result<Value, sqlx::Error> {
    let name = field.name.as_str();
    Ok(match field.kind {
        FieldKind::PrimaryKey | FieldKind::Integer => row
            .try_get::<Option<i64>, _>(name)?
            .map_or(Value::Null, Value::from),
        FieldKind::Real => row
            .try_get::<Option<f64>, _>(name)?
            .map_or(Value::Null, Value::from),
        FieldKind::Char { .. } | FieldKind::Text => row
            .try_get::<Option<String>, _>(name)?
            .map_or(Value::Null, Value::from),
        // SQLite hands booleans back as integers
        FieldKind::Boolean => match row.try_get::<Option<bool>, _>(name) {
            Ok(v) => v.map_or(Value::Null, Value::from),
            Err(_) => row
                .try_get::<Option<i64>, _>(name)?
                .map_or(Value::Null, |n| Value::from(n != 0)),
        },
    })
}

fn decode_row(model: &ModelDefinition, row: &AnyRow) -> Result<Record, OrmError> {
    let mut record = Record::new();
    for field in model.fields() {
        let value = decode_field(row, field)
            .map_err(|e| OrmError::Query(format!("decoding {}.{}: {e}", model.table(), field.name)))?;
        record.insert(field.name.clone(), value);
    }
    Ok(record)
}

impl Model {
    /// Validates and inserts `record`, returning the stored row (with its
    /// generated primary key).
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Validation`] for unknown, missing or mistyped
    /// fields and [`OrmError::Query`] when the insert fails.
    pub async fn insert(&self, conn: &mut AnyConnection, record: Record) -> Result<Record, OrmError> {
        let model = self.definition();
        let columns = prepare_insert(model, &record)?;
        let dialect = Dialect::from_backend_name(conn.backend_name());
        let sql = insert_sql(model, &columns, dialect);

        let mut query = sqlx::query::<Any>(&sql);
        for (_, bind) in columns {
            query = bind.apply(query);
        }
        let row = query
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| OrmError::Query(format!("insert into {}: {e}", model.table())))?;

        let stored = decode_row(model, &row)?;
        tracing::debug!(table = model.table(), "row inserted");
        Ok(stored)
    }

    /// All rows ordered by primary key.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Query`] when the select or decoding fails.
    pub async fn select_all(&self, conn: &mut AnyConnection) -> Result<Vec<Record>, OrmError> {
        let model = self.definition();
        let order = model
            .primary_key()
            .map(|pk| format!(" ORDER BY {}", quote(&pk.name)))
            .unwrap_or_default();
        let sql = format!(
            "SELECT {} FROM {}{order}",
            column_list(model),
            quote(model.table())
        );

        let rows = sqlx::query::<Any>(&sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| OrmError::Query(format!("select from {}: {e}", model.table())))?;

        rows.iter().map(|row| decode_row(model, row)).collect()
    }

    /// Number of rows.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Query`] when the count fails.
    pub async fn count(&self, conn: &mut AnyConnection) -> Result<i64, OrmError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote(self.table()));
        sqlx::query_scalar::<Any, i64>(&sql)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| OrmError::Query(format!("count {}: {e}", self.table())))
    }

    /// All rows, read through a fresh pooled connection of the bound
    /// database.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Configuration`] when nothing is bound and
    /// [`OrmError::Query`] when the select fails.
    pub async fn all(&self) -> Result<Vec<Record>, OrmError> {
        let db = self.database()?;
        let mut conn = db
            .pool()
            .acquire()
            .await
            .map_err(|e| OrmError::Transaction(format!("cannot acquire connection: {e}")))?;
        self.select_all(&mut conn).await
    }

    /// Row count through a fresh pooled connection of the bound database.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Configuration`] when nothing is bound and
    /// [`OrmError::Query`] when the count fails.
    pub async fn count_all(&self) -> Result<i64, OrmError> {
        let db = self.database()?;
        let mut conn = db
            .pool()
            .acquire()
            .await
            .map_err(|e| OrmError::Transaction(format!("cannot acquire connection: {e}")))?;
        self.count(&mut conn).await
    }
}
