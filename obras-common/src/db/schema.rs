//! Schema Manager
//!
//! Declarative table definitions for the star schema, the create-if-absent
//! initialization phase, and the FK-safe clear step of a full refresh.
//!
//! # Usage
//!
//! ```rust,ignore
//! let ready = ensure_schema(&pool).await?;
//! let mut tx = pool.begin().await?;
//! clear_all(&mut tx, &ready).await?;
//! // ... load ...
//! assert_no_foreign_key_violations(&mut tx).await?;
//! tx.commit().await?;
//! ```
//!
//! Existing tables are never altered: missing columns, type mismatches and
//! dropped NOT NULL constraints are reported as drift and left for a
//! deployment-time migration.

use crate::{Error, Result};
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

/// Column definition with SQL constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,
    /// SQL type (e.g., "TEXT", "INTEGER")
    pub sql_type: String,
    /// NOT NULL constraint
    pub not_null: bool,
    /// Part of the PRIMARY KEY
    pub primary_key: bool,
}

impl ColumnDefinition {
    /// Create new column definition
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            primary_key: false,
        }
    }

    /// Mark column as (part of) the PRIMARY KEY; implies NOT NULL
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true;
        self
    }
}

/// Enforced foreign key from one column to a parent table's key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: &'static str,
    pub parent_table: &'static str,
    pub parent_column: &'static str,
}

impl ForeignKey {
    pub const fn new(
        column: &'static str,
        parent_table: &'static str,
        parent_column: &'static str,
    ) -> Self {
        Self {
            column,
            parent_table,
            parent_column,
        }
    }
}

/// Defines expected schema for a database table
pub trait TableSchema {
    /// Table name in database
    fn table_name() -> &'static str;

    /// Expected column definitions (order matters for table creation)
    fn expected_columns() -> Vec<ColumnDefinition>;

    /// Enforced foreign keys; informational back-references are not listed
    fn foreign_keys() -> Vec<ForeignKey> {
        Vec::new()
    }

    /// `CREATE TABLE IF NOT EXISTS` statement generated from the declaration
    fn create_table_sql() -> String {
        let columns = Self::expected_columns();
        let pk: Vec<&str> = columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect();

        let mut parts: Vec<String> = columns
            .iter()
            .map(|c| {
                let mut def = format!("{} {}", c.name, c.sql_type);
                if c.not_null {
                    def.push_str(" NOT NULL");
                }
                def
            })
            .collect();

        if !pk.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", pk.join(", ")));
        }

        for fk in Self::foreign_keys() {
            parts.push(format!(
                "FOREIGN KEY ({}) REFERENCES {}({})",
                fk.column, fk.parent_table, fk.parent_column
            ));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            Self::table_name(),
            parts.join(",\n    ")
        )
    }
}

pub struct AxesTable;

impl TableSchema for AxesTable {
    fn table_name() -> &'static str {
        "eixos"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("id_eixo", "INTEGER").primary_key(),
            ColumnDefinition::new("descricao_eixo", "TEXT"),
        ]
    }
}

pub struct TypesTable;

impl TableSchema for TypesTable {
    fn table_name() -> &'static str {
        "tipos"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("id_tipo", "INTEGER").primary_key(),
            ColumnDefinition::new("descricao_tipo", "TEXT"),
            // Informational link to eixos, deliberately unenforced
            ColumnDefinition::new("id_eixo", "INTEGER"),
        ]
    }
}

pub struct SubtypesTable;

impl TableSchema for SubtypesTable {
    fn table_name() -> &'static str {
        "subtipos"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("id_subtipo", "INTEGER").primary_key(),
            ColumnDefinition::new("descricao_subtipo", "TEXT"),
            // Informational link to tipos, deliberately unenforced
            ColumnDefinition::new("id_tipo", "INTEGER"),
        ]
    }
}

/// Fact table. `valor_investimento_previsto` holds centavos.
pub struct OperationsTable;

impl TableSchema for OperationsTable {
    fn table_name() -> &'static str {
        "operacoes"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("id_operacao", "TEXT").primary_key(),
            ColumnDefinition::new("valor_investimento_previsto", "INTEGER"),
            ColumnDefinition::new("tomador_nome", "TEXT"),
            ColumnDefinition::new("tomador_codigo", "INTEGER"),
            ColumnDefinition::new("executor_nome", "TEXT"),
            ColumnDefinition::new("executor_codigo", "INTEGER"),
            ColumnDefinition::new("repassador_nome", "TEXT"),
            ColumnDefinition::new("repassador_codigo", "INTEGER"),
            ColumnDefinition::new("origem_fontes_de_recurso", "TEXT"),
        ]
    }
}

pub struct OperationAxisTable;

impl TableSchema for OperationAxisTable {
    fn table_name() -> &'static str {
        "operacao_eixo_rel"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("id_operacao", "TEXT").primary_key(),
            ColumnDefinition::new("id_eixo", "INTEGER").primary_key(),
        ]
    }

    fn foreign_keys() -> Vec<ForeignKey> {
        vec![
            ForeignKey::new("id_operacao", "operacoes", "id_operacao"),
            ForeignKey::new("id_eixo", "eixos", "id_eixo"),
        ]
    }
}

pub struct OperationTypeTable;

impl TableSchema for OperationTypeTable {
    fn table_name() -> &'static str {
        "operacao_tipo_rel"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("id_operacao", "TEXT").primary_key(),
            ColumnDefinition::new("id_tipo", "INTEGER").primary_key(),
        ]
    }

    fn foreign_keys() -> Vec<ForeignKey> {
        vec![
            ForeignKey::new("id_operacao", "operacoes", "id_operacao"),
            ForeignKey::new("id_tipo", "tipos", "id_tipo"),
        ]
    }
}

pub struct OperationSubtypeTable;

impl TableSchema for OperationSubtypeTable {
    fn table_name() -> &'static str {
        "operacao_subtipo_rel"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("id_operacao", "TEXT").primary_key(),
            ColumnDefinition::new("id_subtipo", "INTEGER").primary_key(),
        ]
    }

    fn foreign_keys() -> Vec<ForeignKey> {
        vec![
            ForeignKey::new("id_operacao", "operacoes", "id_operacao"),
            ForeignKey::new("id_subtipo", "subtipos", "id_subtipo"),
        ]
    }
}

/// Clear order: associations → fact → dimensions
pub const CLEAR_ORDER: [&str; 7] = [
    "operacao_subtipo_rel",
    "operacao_tipo_rel",
    "operacao_eixo_rel",
    "operacoes",
    "subtipos",
    "tipos",
    "eixos",
];

/// Read-only presentation view consumed by the dashboard
pub const DASHBOARD_VIEW: &str = "vw_operacoes_dashboard";

/// Presentation sentinel for operations without axis/type associations
pub const NOT_CATEGORIZED: &str = "Not Categorized";

/// Presentation sentinel for operations without a funding origin
pub const NOT_INFORMED: &str = "Not Informed";

fn create_dashboard_view_sql() -> String {
    format!(
        r#"
        CREATE VIEW IF NOT EXISTS {view} AS
        SELECT
            op.id_operacao,
            op.valor_investimento_previsto / 100.0 AS valor_investimento_previsto,
            op.tomador_nome,
            COALESCE(op.origem_fontes_de_recurso, '{not_informed}') AS origem_fontes_de_recurso,
            COALESCE(
                (SELECT GROUP_CONCAT(d.descricao_eixo, ', ')
                   FROM (SELECT DISTINCT ex.descricao_eixo
                           FROM operacao_eixo_rel oe
                           JOIN eixos ex ON ex.id_eixo = oe.id_eixo
                          WHERE oe.id_operacao = op.id_operacao
                            AND ex.descricao_eixo IS NOT NULL
                          ORDER BY ex.descricao_eixo) d),
                '{not_categorized}'
            ) AS eixo_descricao,
            COALESCE(
                (SELECT GROUP_CONCAT(d.descricao_tipo, ', ')
                   FROM (SELECT DISTINCT tp.descricao_tipo
                           FROM operacao_tipo_rel otr
                           JOIN tipos tp ON tp.id_tipo = otr.id_tipo
                          WHERE otr.id_operacao = op.id_operacao
                            AND tp.descricao_tipo IS NOT NULL
                          ORDER BY tp.descricao_tipo) d),
                '{not_categorized}'
            ) AS tipo_descricao
        FROM operacoes op
        "#,
        view = DASHBOARD_VIEW,
        not_informed = NOT_INFORMED,
        not_categorized = NOT_CATEGORIZED,
    )
}

/// Proof that [`ensure_schema`] completed on this store.
///
/// Clearing and loading take a reference to it, so neither can run
/// against a store whose tables were never created.
#[derive(Debug)]
pub struct SchemaReady {
    _private: (),
}

/// Actual column from database introspection (PRAGMA table_info result)
#[derive(Debug, Clone)]
pub struct ActualColumn {
    pub cid: i32,
    pub name: String,
    pub type_name: String,
    pub not_null: bool,
    pub pk: bool,
}

/// Schema introspection - read actual database schema
pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// Read actual columns from database table using PRAGMA table_info
    ///
    /// Returns columns in database order (by cid)
    pub async fn introspect_table(pool: &SqlitePool, table_name: &str) -> Result<Vec<ActualColumn>> {
        let query = format!("PRAGMA table_info({})", table_name);
        let rows = sqlx::query(&query).fetch_all(pool).await?;

        let mut columns: Vec<ActualColumn> = rows
            .iter()
            .map(|row| ActualColumn {
                cid: row.get("cid"),
                name: row.get("name"),
                type_name: row.get("type"),
                not_null: row.get::<i32, _>("notnull") != 0,
                pk: row.get::<i32, _>("pk") != 0,
            })
            .collect();

        columns.sort_by_key(|c| c.cid);

        Ok(columns)
    }

    /// Check if table exists
    pub async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM sqlite_master
                WHERE type='table' AND name = ?
            )
            "#,
        )
        .bind(table_name)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }
}

/// Difference between a table declaration and the live table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaDrift {
    MissingColumn {
        column: String,
    },
    TypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },
    /// Declared NOT NULL, nullable in the live table
    NullableColumn {
        column: String,
    },
}

/// Compare the declaration of `T` with the live table
pub async fn schema_drift<T: TableSchema>(pool: &SqlitePool) -> Result<Vec<SchemaDrift>> {
    let actual = SchemaIntrospector::introspect_table(pool, T::table_name()).await?;
    Ok(compare_columns(&T::expected_columns(), &actual))
}

fn compare_columns(expected: &[ColumnDefinition], actual: &[ActualColumn]) -> Vec<SchemaDrift> {
    let mut drift = Vec::new();

    for column in expected {
        let Some(live) = actual.iter().find(|a| a.name == column.name) else {
            drift.push(SchemaDrift::MissingColumn {
                column: column.name.clone(),
            });
            continue;
        };

        // SQLite keeps declared type names verbatim
        if !live.type_name.eq_ignore_ascii_case(&column.sql_type) {
            drift.push(SchemaDrift::TypeMismatch {
                column: column.name.clone(),
                expected: column.sql_type.clone(),
                actual: live.type_name.clone(),
            });
        }

        // A rowid-alias primary key reports notnull = 0 but never holds NULL
        if column.not_null && !live.not_null && !live.pk {
            drift.push(SchemaDrift::NullableColumn {
                column: column.name.clone(),
            });
        }
    }

    drift
}

async fn ensure_table<T: TableSchema>(pool: &SqlitePool) -> Result<()> {
    sqlx::query(&T::create_table_sql()).execute(pool).await?;

    for change in schema_drift::<T>(pool).await? {
        match change {
            SchemaDrift::MissingColumn { column } => warn!(
                table = T::table_name(),
                column = %column,
                "Schema drift: expected column missing (not altered)"
            ),
            SchemaDrift::TypeMismatch { column, expected, actual } => warn!(
                table = T::table_name(),
                column = %column,
                "Schema drift: type mismatch, expected '{}', found '{}'. Manual migration required.",
                expected,
                actual
            ),
            SchemaDrift::NullableColumn { column } => warn!(
                table = T::table_name(),
                column = %column,
                "Schema drift: column lacks NOT NULL. Manual migration required."
            ),
        }
    }

    debug!(table = T::table_name(), "Table ready");
    Ok(())
}

/// Create the seven tables and the dashboard view if absent
///
/// Idempotent. Parents are created before the association tables that
/// reference them.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<SchemaReady> {
    info!("Ensuring schema");

    ensure_table::<AxesTable>(pool).await?;
    ensure_table::<TypesTable>(pool).await?;
    ensure_table::<SubtypesTable>(pool).await?;
    ensure_table::<OperationsTable>(pool).await?;
    ensure_table::<OperationAxisTable>(pool).await?;
    ensure_table::<OperationTypeTable>(pool).await?;
    ensure_table::<OperationSubtypeTable>(pool).await?;

    sqlx::query(&create_dashboard_view_sql()).execute(pool).await?;

    info!("Schema ready");
    Ok(SchemaReady { _private: () })
}

/// Delete every row of the seven tables, associations first.
///
/// Must run inside the refresh transaction: foreign-key enforcement is
/// deferred to COMMIT, and SQLite resets `defer_foreign_keys` when the
/// transaction ends, so the suspension cannot leak past it.
pub async fn clear_all(conn: &mut SqliteConnection, _ready: &SchemaReady) -> Result<()> {
    sqlx::query("PRAGMA defer_foreign_keys = ON")
        .execute(&mut *conn)
        .await?;

    for table in CLEAR_ORDER {
        let result = sqlx::query(&format!("DELETE FROM {}", table))
            .execute(&mut *conn)
            .await?;
        debug!(table, rows = result.rows_affected(), "Cleared table");
    }

    Ok(())
}

/// One row of `PRAGMA foreign_key_check`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyViolation {
    pub table: String,
    pub rowid: Option<i64>,
    pub parent: String,
}

/// List rows whose foreign keys point at missing parents
pub async fn foreign_key_violations(conn: &mut SqliteConnection) -> Result<Vec<ForeignKeyViolation>> {
    let rows = sqlx::query("PRAGMA foreign_key_check")
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows
        .iter()
        .map(|row| ForeignKeyViolation {
            table: row.get("table"),
            rowid: row.get("rowid"),
            parent: row.get("parent"),
        })
        .collect())
}

/// Fail with [`Error::Integrity`] if any foreign key is dangling
pub async fn assert_no_foreign_key_violations(conn: &mut SqliteConnection) -> Result<()> {
    let violations = foreign_key_violations(conn).await?;
    if violations.is_empty() {
        return Ok(());
    }

    let summary: Vec<String> = violations
        .iter()
        .take(10)
        .map(|v| format!("{} row {:?} → {}", v.table, v.rowid, v.parent))
        .collect();

    Err(Error::Integrity(format!(
        "{} foreign key violation(s): {}",
        violations.len(),
        summary.join("; ")
    )))
}
