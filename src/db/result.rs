use chrono::{DateTime, NaiveDate, NaiveDateTime};
use duckdb::types::{TimeUnit, Value};
use duckdb::Connection;
use std::fmt;

/// A single cell decoded from the driver's native value type.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i128),
    Float(f64),
    Decimal(String),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Other(String),
}

impl SqlValue {
    /// Writes the value as it appears inside a row tuple: text-like values are quoted.
    fn write_quoted(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Text(s) | SqlValue::Other(s) => {
                write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
            }
            SqlValue::Date(_) | SqlValue::Timestamp(_) => write!(f, "'{}'", self),
            _ => write!(f, "{}", self),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::Int(n) => write!(f, "{}", n),
            // Debug keeps the fractional part of whole numbers: 2.0, not 2
            SqlValue::Float(x) => write!(f, "{:?}", x),
            SqlValue::Decimal(d) => f.write_str(d),
            SqlValue::Text(s) | SqlValue::Other(s) => f.write_str(s),
            SqlValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            SqlValue::Timestamp(ts) => write!(f, "{}", ts),
        }
    }
}

impl From<Value> for SqlValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Boolean(b) => SqlValue::Bool(b),
            Value::TinyInt(n) => SqlValue::Int(n.into()),
            Value::SmallInt(n) => SqlValue::Int(n.into()),
            Value::Int(n) => SqlValue::Int(n.into()),
            Value::BigInt(n) => SqlValue::Int(n.into()),
            Value::HugeInt(n) => SqlValue::Int(n),
            Value::UTinyInt(n) => SqlValue::Int(n.into()),
            Value::USmallInt(n) => SqlValue::Int(n.into()),
            Value::UInt(n) => SqlValue::Int(n.into()),
            Value::UBigInt(n) => SqlValue::Int(n.into()),
            Value::Float(x) => SqlValue::Float(x.into()),
            Value::Double(x) => SqlValue::Float(x),
            Value::Decimal(d) => SqlValue::Decimal(d.to_string()),
            Value::Text(s) => SqlValue::Text(s),
            Value::Date32(days) => date_from_days(days)
                .map(SqlValue::Date)
                .unwrap_or_else(|| SqlValue::Other(format!("date({})", days))),
            Value::Timestamp(unit, raw) => timestamp_from_raw(unit, raw)
                .map(SqlValue::Timestamp)
                .unwrap_or_else(|| SqlValue::Other(format!("timestamp({})", raw))),
            other => SqlValue::Other(format!("{:?}", other)),
        }
    }
}

fn date_from_days(days: i32) -> Option<NaiveDate> {
    DateTime::from_timestamp(i64::from(days) * 86_400, 0).map(|dt| dt.date_naive())
}

fn timestamp_from_raw(unit: TimeUnit, raw: i64) -> Option<NaiveDateTime> {
    let micros = match unit {
        TimeUnit::Second => raw.checked_mul(1_000_000)?,
        TimeUnit::Millisecond => raw.checked_mul(1_000)?,
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw / 1_000,
    };
    DateTime::from_timestamp_micros(micros).map(|dt| dt.naive_utc())
}

/// Rows returned by a query, every row the same width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    rows: Vec<Vec<SqlValue>>,
}

impl ResultSet {
    pub fn new(rows: Vec<Vec<SqlValue>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<SqlValue>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The string handed to the answer prompt.
    ///
    /// An empty result is `[]`. A single row with a single column (the usual
    /// `COUNT(*)` / `SUM(..)` shape) is unwrapped to its bare value. Anything
    /// else, including several rows of one column, keeps the full row form.
    pub fn canonical(&self) -> String {
        match self.rows.as_slice() {
            [] => "[]".to_string(),
            [row] if row.len() == 1 => row[0].to_string(),
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str("(")?;
            for (j, value) in row.iter().enumerate() {
                if j > 0 {
                    f.write_str(", ")?;
                }
                value.write_quoted(f)?;
            }
            if row.len() == 1 {
                f.write_str(",")?;
            }
            f.write_str(")")?;
        }
        f.write_str("]")
    }
}

/// Runs `sql` and decodes every row.
pub fn query_rows(conn: &Connection, sql: &str) -> duckdb::Result<ResultSet> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;

    let mut collected = Vec::new();
    while let Some(row) = rows.next()? {
        let width = row.as_ref().column_count();
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(SqlValue::from(row.get::<_, Value>(i)?));
        }
        collected.push(values);
    }

    Ok(ResultSet::new(collected))
}
