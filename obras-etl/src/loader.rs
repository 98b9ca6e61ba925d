//! Loader
//!
//! Writes the normalized tables inside the refresh transaction:
//! dimensions and fact table first, then the association tables.
//! Any failure propagates and rolls the whole refresh back, so the store
//! keeps the previous run's snapshot and the next full run starts clean.

use obras_common::db::schema::{assert_no_foreign_key_violations, clear_all, SchemaReady};
use obras_common::db::{Link, StarSchema, TableCounts};
use obras_common::{Error, Result};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{error, info};

/// Insert every row of `schema` into empty tables, in dependency order
pub async fn write_tables(
    conn: &mut SqliteConnection,
    schema: &StarSchema,
    _ready: &SchemaReady,
) -> Result<TableCounts> {
    for axis in &schema.axes {
        sqlx::query("INSERT INTO eixos (id_eixo, descricao_eixo) VALUES (?, ?)")
            .bind(axis.id_eixo)
            .bind(&axis.descricao_eixo)
            .execute(&mut *conn)
            .await
            .map_err(|e| failed("eixos", e))?;
    }

    for tipo in &schema.types {
        sqlx::query("INSERT INTO tipos (id_tipo, descricao_tipo, id_eixo) VALUES (?, ?, ?)")
            .bind(tipo.id_tipo)
            .bind(&tipo.descricao_tipo)
            .bind(tipo.id_eixo)
            .execute(&mut *conn)
            .await
            .map_err(|e| failed("tipos", e))?;
    }

    for subtipo in &schema.subtypes {
        sqlx::query("INSERT INTO subtipos (id_subtipo, descricao_subtipo, id_tipo) VALUES (?, ?, ?)")
            .bind(subtipo.id_subtipo)
            .bind(&subtipo.descricao_subtipo)
            .bind(subtipo.id_tipo)
            .execute(&mut *conn)
            .await
            .map_err(|e| failed("subtipos", e))?;
    }

    for op in &schema.operations {
        sqlx::query(
            r#"
            INSERT INTO operacoes (
                id_operacao, valor_investimento_previsto,
                tomador_nome, tomador_codigo,
                executor_nome, executor_codigo,
                repassador_nome, repassador_codigo,
                origem_fontes_de_recurso
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&op.id_operacao)
        .bind(op.valor_investimento_previsto.map(|v| v.0))
        .bind(&op.tomador_nome)
        .bind(op.tomador_codigo)
        .bind(&op.executor_nome)
        .bind(op.executor_codigo)
        .bind(&op.repassador_nome)
        .bind(op.repassador_codigo)
        .bind(&op.origem_fontes_de_recurso)
        .execute(&mut *conn)
        .await
        .map_err(|e| failed("operacoes", e))?;
    }

    insert_links(conn, "operacao_eixo_rel", "id_eixo", &schema.operation_axes).await?;
    insert_links(conn, "operacao_tipo_rel", "id_tipo", &schema.operation_types).await?;
    insert_links(conn, "operacao_subtipo_rel", "id_subtipo", &schema.operation_subtypes).await?;

    Ok(schema.counts())
}

async fn insert_links(
    conn: &mut SqliteConnection,
    table: &'static str,
    dimension_column: &str,
    links: &[Link],
) -> Result<()> {
    let sql = format!(
        "INSERT INTO {} (id_operacao, {}) VALUES (?, ?)",
        table, dimension_column
    );

    for link in links {
        sqlx::query(&sql)
            .bind(&link.id_operacao)
            .bind(link.dimension_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| failed(table, e))?;
    }

    Ok(())
}

fn failed(table: &str, err: sqlx::Error) -> Error {
    error!(table, error = %err, "Load failed");
    Error::Database(err)
}

/// Full refresh: clear and reload all seven tables in one transaction
///
/// **Steps:**
/// 1. Reject a schema that violates referential integrity (normalizer bug)
/// 2. BEGIN, defer FK checks, delete associations → fact → dimensions
/// 3. Insert dimensions → fact → associations
/// 4. `PRAGMA foreign_key_check`; any violation aborts
/// 5. COMMIT
///
/// On error the transaction is dropped (rolled back) and the previous
/// contents remain.
pub async fn refresh(pool: &SqlitePool, ready: &SchemaReady, schema: &StarSchema) -> Result<TableCounts> {
    if let Err(violations) = schema.check_integrity() {
        error!(count = violations.len(), "Normalized data violates referential integrity");
        return Err(Error::Integrity(violations.join("; ")));
    }

    let mut tx = pool.begin().await?;

    clear_all(&mut tx, ready).await?;
    let counts = write_tables(&mut tx, schema, ready).await?;
    assert_no_foreign_key_violations(&mut tx).await?;

    tx.commit().await?;

    info!(
        operacoes = counts.operacoes,
        eixos = counts.eixos,
        tipos = counts.tipos,
        subtipos = counts.subtipos,
        operacao_eixo_rel = counts.operacao_eixo_rel,
        operacao_tipo_rel = counts.operacao_tipo_rel,
        operacao_subtipo_rel = counts.operacao_subtipo_rel,
        "Refresh committed"
    );

    Ok(counts)
}
