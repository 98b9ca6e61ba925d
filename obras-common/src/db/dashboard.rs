//! Query Facade: typed, read-only access to the dashboard view
//!
//! Sentinel strings ("Not Categorized", "Not Informed") are produced by
//! the view; normalized tables never contain them.

use crate::db::models::Centavos;
use crate::db::schema::{SchemaIntrospector, DASHBOARD_VIEW};
use crate::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

/// One presentation row per operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardRow {
    pub id_operacao: String,
    pub valor_investimento_previsto: Option<Centavos>,
    pub tomador_nome: Option<String>,
    pub origem_fontes_de_recurso: String,
    /// Distinct axis descriptions joined with ", "
    pub eixo_descricao: String,
    /// Distinct type descriptions joined with ", "
    pub tipo_descricao: String,
}

fn select_sql(suffix: &str) -> String {
    format!(
        "SELECT id_operacao, \
                CAST(ROUND(valor_investimento_previsto * 100) AS INTEGER) AS centavos, \
                tomador_nome, origem_fontes_de_recurso, eixo_descricao, tipo_descricao \
         FROM {} ORDER BY id_operacao {}",
        DASHBOARD_VIEW, suffix
    )
}

fn map_row(row: &sqlx::sqlite::SqliteRow) -> DashboardRow {
    DashboardRow {
        id_operacao: row.get("id_operacao"),
        valor_investimento_previsto: row.get::<Option<i64>, _>("centavos").map(Centavos),
        tomador_nome: row.get("tomador_nome"),
        origem_fontes_de_recurso: row.get("origem_fontes_de_recurso"),
        eixo_descricao: row.get("eixo_descricao"),
        tipo_descricao: row.get("tipo_descricao"),
    }
}

/// All view rows, ordered by operation id
pub async fn fetch_dashboard_rows(pool: &SqlitePool) -> Result<Vec<DashboardRow>> {
    let rows = sqlx::query(&select_sql("")).fetch_all(pool).await?;
    Ok(rows.iter().map(map_row).collect())
}

/// One page of view rows, ordered by operation id
pub async fn fetch_dashboard_page(
    pool: &SqlitePool,
    limit: i64,
    offset: i64,
) -> Result<Vec<DashboardRow>> {
    let rows = sqlx::query(&select_sql("LIMIT ? OFFSET ?"))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(map_row).collect())
}

pub async fn count_dashboard_rows(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", DASHBOARD_VIEW))
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Whether the ETL has created the schema on this store
pub async fn dashboard_view_exists(pool: &SqlitePool) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'view' AND name = ?)",
    )
    .bind(DASHBOARD_VIEW)
    .fetch_one(pool)
    .await?;

    Ok(exists && SchemaIntrospector::table_exists(pool, "operacoes").await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::open_memory_store;
    use crate::db::schema::{ensure_schema, NOT_CATEGORIZED, NOT_INFORMED};

    async fn seed(pool: &SqlitePool) {
        for sql in [
            "INSERT INTO eixos VALUES (1, 'Saneamento'), (2, 'Saneamento'), (3, 'Transporte')",
            "INSERT INTO tipos VALUES (10, 'Obra', 1)",
            "INSERT INTO operacoes (id_operacao, valor_investimento_previsto, tomador_nome, origem_fontes_de_recurso) \
             VALUES ('A1', 100000, 'GDF', 'Federal'), ('B2', NULL, NULL, NULL)",
            "INSERT INTO operacao_eixo_rel VALUES ('A1', 1), ('A1', 2), ('A1', 3)",
            "INSERT INTO operacao_tipo_rel VALUES ('A1', 10)",
        ] {
            sqlx::query(sql).execute(pool).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_view_concatenates_distinct_descriptions() {
        let pool = open_memory_store().await.unwrap();
        ensure_schema(&pool).await.unwrap();
        seed(&pool).await;

        let rows = fetch_dashboard_rows(&pool).await.unwrap();
        assert_eq!(rows.len(), 2);

        let a1 = &rows[0];
        assert_eq!(a1.id_operacao, "A1");
        assert_eq!(a1.valor_investimento_previsto, Some(Centavos(100_000)));
        let mut axes: Vec<&str> = a1.eixo_descricao.split(", ").collect();
        axes.sort();
        assert_eq!(axes, vec!["Saneamento", "Transporte"]);
        assert_eq!(a1.tipo_descricao, "Obra");
        assert_eq!(a1.origem_fontes_de_recurso, "Federal");
    }

    #[tokio::test]
    async fn test_view_substitutes_sentinels_for_missing_values() {
        let pool = open_memory_store().await.unwrap();
        ensure_schema(&pool).await.unwrap();
        seed(&pool).await;

        let rows = fetch_dashboard_rows(&pool).await.unwrap();
        let b2 = &rows[1];
        assert_eq!(b2.valor_investimento_previsto, None);
        assert_eq!(b2.tomador_nome, None);
        assert_eq!(b2.origem_fontes_de_recurso, NOT_INFORMED);
        assert_eq!(b2.eixo_descricao, NOT_CATEGORIZED);
        assert_eq!(b2.tipo_descricao, NOT_CATEGORIZED);

        // Sentinels live only in the view
        let raw: Option<String> = sqlx::query_scalar(
            "SELECT origem_fontes_de_recurso FROM operacoes WHERE id_operacao = 'B2'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(raw, None);
    }

    #[tokio::test]
    async fn test_pagination_and_count() {
        let pool = open_memory_store().await.unwrap();
        assert!(!dashboard_view_exists(&pool).await.unwrap());

        ensure_schema(&pool).await.unwrap();
        seed(&pool).await;

        assert!(dashboard_view_exists(&pool).await.unwrap());
        assert_eq!(count_dashboard_rows(&pool).await.unwrap(), 2);

        let page = fetch_dashboard_page(&pool, 1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id_operacao, "B2");
    }
}
