/// SQL connectors (mysql, postgresql, sqlite)
///
/// One implementation over sqlx's `Any` driver, parameterised by dialect.
///
/// Expected config:
/// ```json
/// {
///   "host": "localhost", "port": 3306, "user": "root", "password": "", "database": "app",
///   "table": "users", "method": "create",
///   "inputMapping": { "name": "payload.body.name" },
///   "where": { "id": "payload.params.id" }
/// }
/// ```
/// A `url` key overrides the individual connection fields. Each invocation
/// opens its own connection and closes it before returning.

use crate::connectors::path::resolve_source;
use crate::connectors::Connector;
use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use sqlx::any::{Any, AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{AnyConnection, Column, Connection, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Postgres,
    Sqlite,
}

impl Dialect {
    pub const ALL: [Dialect; 3] = [Dialect::MySql, Dialect::Postgres, Dialect::Sqlite];

    /// Connector type this dialect is registered under
    pub fn connector_type(self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgresql",
            Dialect::Sqlite => "sqlite",
        }
    }

    fn scheme(self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    fn default_port(self) -> u16 {
        match self {
            Dialect::MySql => 3306,
            Dialect::Postgres => 5432,
            Dialect::Sqlite => 0,
        }
    }

    fn default_user(self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            _ => "root",
        }
    }

    /// Bind placeholder for the `n`th (1-based) parameter
    fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", n),
            _ => "?".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    fn parse(method: Option<&str>) -> anyhow::Result<Self> {
        match method.map(str::to_lowercase).as_deref() {
            None | Some("read") => Ok(Operation::Read),
            Some("create") => Ok(Operation::Create),
            Some("update") => Ok(Operation::Update),
            Some("delete") => Ok(Operation::Delete),
            Some(other) => anyhow::bail!("Unsupported SQL method: {}", other),
        }
    }
}

/// A parameterised statement ready to bind
#[derive(Debug, Clone, PartialEq)]
struct Statement {
    operation: Operation,
    sql: String,
    values: Vec<Value>,
}

/// Accumulates SQL text and bound values with dialect placeholders
struct StatementBuilder {
    dialect: Dialect,
    values: Vec<Value>,
}

impl StatementBuilder {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            values: Vec::new(),
        }
    }

    fn bind(&mut self, value: Value) -> String {
        self.values.push(value);
        self.dialect.placeholder(self.values.len())
    }

    /// `col = ?` pairs for every mapped column, resolved against `payload`
    fn assignments(&mut self, mapping: &Map<String, Value>, payload: &Value) -> anyhow::Result<Vec<String>> {
        mapping
            .iter()
            .map(|(column, source)| {
                validate_identifier(column)?;
                let value = source_value(source, payload);
                Ok(format!("{} = {}", column, self.bind(value)))
            })
            .collect()
    }

    fn where_clause(&mut self, config: &Value, payload: &Value) -> anyhow::Result<String> {
        match config.get("where") {
            Some(Value::Object(conditions)) if !conditions.is_empty() => {
                let parts = self.assignments(conditions, payload)?;
                Ok(format!(" WHERE {}", parts.join(" AND ")))
            }
            _ => Ok(String::new()),
        }
    }
}

/// A string source is a payload path; anything else is a literal
fn source_value(source: &Value, payload: &Value) -> Value {
    match source {
        Value::String(path) => resolve_source(payload, path),
        literal => literal.clone(),
    }
}

/// Table and column names are interpolated, so only plain identifiers
/// (optionally schema-qualified) are accepted
fn validate_identifier(name: &str) -> anyhow::Result<()> {
    let valid = !name.is_empty()
        && name.split('.').all(|part| {
            part.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if valid {
        Ok(())
    } else {
        anyhow::bail!("Invalid SQL identifier: {}", name)
    }
}

fn build_statement(dialect: Dialect, config: &Value, payload: &Value) -> anyhow::Result<Statement> {
    let operation = Operation::parse(config.get("method").and_then(Value::as_str))?;
    let table = config
        .get("table")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("SQL connector requires a table"))?;
    validate_identifier(table)?;

    let empty = Map::new();
    let mapping = match config.get("inputMapping") {
        Some(Value::Object(map)) => map,
        _ => &empty,
    };

    let mut builder = StatementBuilder::new(dialect);
    let sql = match operation {
        Operation::Create => {
            if mapping.is_empty() {
                anyhow::bail!("create requires a non-empty inputMapping");
            }
            let mut columns = Vec::new();
            let mut placeholders = Vec::new();
            for (column, source) in mapping {
                validate_identifier(column)?;
                columns.push(column.as_str());
                placeholders.push(builder.bind(source_value(source, payload)));
            }
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders.join(", ")
            )
        }
        Operation::Read => {
            format!("SELECT * FROM {}{}", table, builder.where_clause(config, payload)?)
        }
        Operation::Update => {
            if mapping.is_empty() {
                anyhow::bail!("update requires a non-empty inputMapping");
            }
            let set = builder.assignments(mapping, payload)?;
            format!(
                "UPDATE {} SET {}{}",
                table,
                set.join(", "),
                builder.where_clause(config, payload)?
            )
        }
        Operation::Delete => {
            let clause = builder.where_clause(config, payload)?;
            if clause.is_empty() {
                tracing::warn!("⚠️ DELETE on {} without a where clause", table);
            }
            format!("DELETE FROM {}{}", table, clause)
        }
    };

    Ok(Statement {
        operation,
        sql,
        values: builder.values,
    })
}

/// Connection URL from config; `url` wins over the individual fields
fn connection_url(dialect: Dialect, config: &Value) -> anyhow::Result<String> {
    if let Some(url) = config.get("url").and_then(Value::as_str) {
        return Ok(url.to_string());
    }

    let database = config.get("database").and_then(Value::as_str).unwrap_or("");

    if dialect == Dialect::Sqlite {
        if database.is_empty() {
            anyhow::bail!("sqlite connector requires a database file");
        }
        return Ok(format!("sqlite://{}", database));
    }

    let host = config.get("host").and_then(Value::as_str).unwrap_or("localhost");
    let port = config
        .get("port")
        .and_then(Value::as_u64)
        .and_then(|p| u16::try_from(p).ok())
        .unwrap_or(dialect.default_port());
    let user = config
        .get("user")
        .and_then(Value::as_str)
        .unwrap_or(dialect.default_user());
    let password = config.get("password").and_then(Value::as_str).unwrap_or("");

    // Let the url crate percent-encode credentials
    let mut url = reqwest::Url::parse(&format!("{}://{}", dialect.scheme(), host))
        .with_context(|| format!("Invalid database host: {}", host))?;
    url.set_port(Some(port))
        .map_err(|_| anyhow::anyhow!("Invalid database port: {}", port))?;
    url.set_username(user)
        .map_err(|_| anyhow::anyhow!("Invalid database user: {}", user))?;
    if !password.is_empty() {
        url.set_password(Some(password))
            .map_err(|_| anyhow::anyhow!("Invalid database password"))?;
    }
    url.set_path(database);

    Ok(url.to_string())
}

fn bind_json<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: &Value,
) -> Query<'q, Any, AnyArguments<'q>> {
    match value {
        Value::String(s) => query.bind(s.clone()),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64().unwrap_or_default()),
        },
        Value::Bool(b) => query.bind(*b),
        Value::Null => query.bind(None::<String>),
        other => query.bind(other.to_string()),
    }
}

fn row_to_json(row: &AnyRow) -> Value {
    let record: Map<String, Value> = row
        .columns()
        .iter()
        .enumerate()
        .map(|(i, column)| (column.name().to_string(), column_value(row, i)))
        .collect();
    Value::Object(record)
}

/// Decode a column by trying the scalar types `Any` supports
fn column_value(row: &AnyRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map(|f| json!(f)).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v.map(Value::Bool).unwrap_or(Value::Null);
    }
    Value::Null
}

pub struct SqlConnector {
    dialect: Dialect,
}

impl SqlConnector {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    async fn run(&self, config: &Value, payload: Value) -> anyhow::Result<Value> {
        let statement = build_statement(self.dialect, config, &payload)?;
        let url = connection_url(self.dialect, config)?;

        sqlx::any::install_default_drivers();
        let mut conn = AnyConnection::connect(&url)
            .await
            .context("Failed to connect to database")?;

        tracing::debug!("📝 SQL Query: {}", statement.sql);
        tracing::debug!("📊 Values: {:?}", statement.values);

        let mut query = sqlx::query(&statement.sql);
        for value in &statement.values {
            query = bind_json(query, value);
        }

        let db_result = match statement.operation {
            Operation::Read => {
                let rows = query.fetch_all(&mut conn).await.context("Database query failed")?;
                let rows: Vec<Value> = rows.iter().map(row_to_json).collect();
                tracing::info!("✅ Retrieved {} records", rows.len());
                json!({ "count": rows.len(), "rows": rows })
            }
            Operation::Create => {
                let result = query.execute(&mut conn).await.context("Database insert failed")?;
                tracing::info!("✅ Created record with ID: {:?}", result.last_insert_id());
                json!({
                    "insertId": result.last_insert_id(),
                    "affectedRows": result.rows_affected(),
                })
            }
            Operation::Update | Operation::Delete => {
                let result = query.execute(&mut conn).await.context("Database statement failed")?;
                tracing::info!("✅ {} rows affected", result.rows_affected());
                json!({ "affectedRows": result.rows_affected() })
            }
        };

        if let Err(e) = conn.close().await {
            tracing::warn!("⚠️ Failed to close database connection: {}", e);
        }

        let mut payload = match payload {
            Value::Object(map) => Value::Object(map),
            _ => Value::Object(Map::new()),
        };
        if statement.operation == Operation::Create {
            payload["insertedId"] = db_result["insertId"].clone();
        }
        payload["dbResult"] = db_result;
        Ok(payload)
    }
}

#[async_trait]
impl Connector for SqlConnector {
    async fn execute(&self, config: &Value, payload: Value) -> anyhow::Result<Value> {
        tracing::debug!("🗄️ {}: executing database operation", self.dialect.connector_type());
        self.run(config, payload)
            .await
            .map_err(|e| anyhow::anyhow!("{} connector failed: {:#}", self.dialect.connector_type(), e))
    }
}
