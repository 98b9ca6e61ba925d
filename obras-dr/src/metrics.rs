//! Dashboard aggregations over view rows
//!
//! Pure functions; handlers load the rows and serialize the results.
//! Missing values are skipped by sums and means, never treated as zero.

use obras_common::db::{Centavos, DashboardRow};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Number of borrowers listed by [`top_borrowers`] by default
pub const TOP_BORROWERS: usize = 10;

/// Headline figures for the whole snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub total_value: Centavos,
    pub operation_count: usize,
    /// Mean over operations that have a predicted value
    pub mean_value: Option<Centavos>,
    pub distinct_axes: usize,
    pub distinct_types: usize,
    pub distinct_origins: usize,
}

/// Summed predicted value for one label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueBucket {
    pub label: String,
    pub value: Centavos,
}

/// Operation count for one label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountBucket {
    pub label: String,
    pub count: usize,
}

pub fn kpis(rows: &[DashboardRow]) -> Kpis {
    let values: Vec<i64> = rows
        .iter()
        .filter_map(|r| r.valor_investimento_previsto)
        .map(|v| v.0)
        .collect();
    let total: i64 = values.iter().sum();

    let mean_value = if values.is_empty() {
        None
    } else {
        Some(Centavos((total as f64 / values.len() as f64).round() as i64))
    };

    let distinct = |label: fn(&DashboardRow) -> &str| {
        rows.iter().map(label).collect::<HashSet<_>>().len()
    };

    Kpis {
        total_value: Centavos(total),
        operation_count: rows.len(),
        mean_value,
        distinct_axes: distinct(|r| r.eixo_descricao.as_str()),
        distinct_types: distinct(|r| r.tipo_descricao.as_str()),
        distinct_origins: distinct(|r| r.origem_fontes_de_recurso.as_str()),
    }
}

/// Sum values per label; largest first, ties by label
fn sum_by<'a, F>(rows: &'a [DashboardRow], label: F) -> Vec<ValueBucket>
where
    F: Fn(&'a DashboardRow) -> Option<&'a str>,
{
    let mut sums: HashMap<&str, i64> = HashMap::new();
    for row in rows {
        if let Some(key) = label(row) {
            let entry = sums.entry(key).or_insert(0);
            *entry += row.valor_investimento_previsto.map_or(0, |v| v.0);
        }
    }

    let mut buckets: Vec<ValueBucket> = sums
        .into_iter()
        .map(|(label, value)| ValueBucket {
            label: label.to_string(),
            value: Centavos(value),
        })
        .collect();
    buckets.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.label.cmp(&b.label)));
    buckets
}

/// Predicted value per joined type label
pub fn value_by_type(rows: &[DashboardRow]) -> Vec<ValueBucket> {
    sum_by(rows, |r| Some(r.tipo_descricao.as_str()))
}

/// Predicted value per joined axis label
pub fn value_by_axis(rows: &[DashboardRow]) -> Vec<ValueBucket> {
    sum_by(rows, |r| Some(r.eixo_descricao.as_str()))
}

/// Borrowers with the largest summed value; operations without a
/// borrower are excluded
pub fn top_borrowers(rows: &[DashboardRow], limit: usize) -> Vec<ValueBucket> {
    let mut buckets = sum_by(rows, |r| r.tomador_nome.as_deref());
    buckets.truncate(limit);
    buckets
}

/// Operation count per joined axis label; largest first, ties by label
pub fn count_by_axis(rows: &[DashboardRow]) -> Vec<CountBucket> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        *counts.entry(row.eixo_descricao.as_str()).or_insert(0) += 1;
    }

    let mut buckets: Vec<CountBucket> = counts
        .into_iter()
        .map(|(label, count)| CountBucket {
            label: label.to_string(),
            count,
        })
        .collect();
    buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use obras_common::db::{NOT_CATEGORIZED, NOT_INFORMED};

    fn row(id: &str, value: Option<i64>, borrower: Option<&str>, axis: &str, tipo: &str) -> DashboardRow {
        DashboardRow {
            id_operacao: id.to_string(),
            valor_investimento_previsto: value.map(Centavos),
            tomador_nome: borrower.map(str::to_string),
            origem_fontes_de_recurso: NOT_INFORMED.to_string(),
            eixo_descricao: axis.to_string(),
            tipo_descricao: tipo.to_string(),
        }
    }

    fn sample() -> Vec<DashboardRow> {
        vec![
            row("A", Some(100_000), Some("DF"), "Saneamento", "Obra"),
            row("B", Some(50_000), Some("GDF"), "Mobilidade", "Obra"),
            row("C", None, None, "Saneamento", NOT_CATEGORIZED),
            row("D", Some(25_001), Some("DF"), "Mobilidade, Saneamento", "Estudo"),
        ]
    }

    #[test]
    fn test_kpis_skip_missing_values() {
        let k = kpis(&sample());
        assert_eq!(k.total_value, Centavos(175_001));
        assert_eq!(k.operation_count, 4);
        // 175001 / 3 = 58333.67 → 58334
        assert_eq!(k.mean_value, Some(Centavos(58_334)));
        assert_eq!(k.distinct_axes, 3);
        assert_eq!(k.distinct_types, 3);
        assert_eq!(k.distinct_origins, 1);
    }

    #[test]
    fn test_kpis_without_any_value_have_no_mean() {
        let k = kpis(&[row("X", None, None, NOT_CATEGORIZED, NOT_CATEGORIZED)]);
        assert_eq!(k.total_value, Centavos(0));
        assert_eq!(k.mean_value, None);
    }

    #[test]
    fn test_value_by_type_sorted_descending() {
        let buckets = value_by_type(&sample());
        let labels: Vec<&str> = buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["Obra", "Estudo", NOT_CATEGORIZED]);
        assert_eq!(buckets[0].value, Centavos(150_000));
        assert_eq!(buckets[2].value, Centavos(0));
    }

    #[test]
    fn test_value_by_axis_keeps_joined_labels_separate() {
        let buckets = value_by_axis(&sample());
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0], ValueBucket { label: "Saneamento".into(), value: Centavos(100_000) });
    }

    #[test]
    fn test_top_borrowers_excludes_missing_and_truncates() {
        let buckets = top_borrowers(&sample(), 1);
        assert_eq!(buckets, vec![ValueBucket { label: "DF".into(), value: Centavos(125_001) }]);

        let all = top_borrowers(&sample(), TOP_BORROWERS);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_count_by_axis_ties_break_by_label() {
        let buckets = count_by_axis(&sample());
        assert_eq!(
            buckets,
            vec![
                CountBucket { label: "Saneamento".into(), count: 2 },
                CountBucket { label: "Mobilidade".into(), count: 1 },
                CountBucket { label: "Mobilidade, Saneamento".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(value_by_type(&[]).is_empty());
        assert!(count_by_axis(&[]).is_empty());
        assert_eq!(kpis(&[]).operation_count, 0);
    }
}
