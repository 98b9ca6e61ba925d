//! Normalized row models (star schema)
//!
//! One fact table (`operacoes`), three dimensions (`eixos`, `tipos`,
//! `subtipos`) and three operation↔dimension association tables.

use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Fixed-point monetary value with two decimal places, stored as centavos
///
/// Serializes as reais (a JSON number), the unit consumers display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Centavos(pub i64);

impl Centavos {
    /// Value in reais, for presentation only
    pub fn as_reais(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Convert a float, rounding half away from zero to the nearest centavo
    pub fn from_reais_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scaled = (value * 100.0).round();
        if scaled.abs() > i64::MAX as f64 {
            return None;
        }
        Some(Centavos(scaled as i64))
    }
}

impl FromStr for Centavos {
    type Err = String;

    /// Parse a decimal string exactly ("1000", "1000.5", "-12.345").
    ///
    /// Digits beyond the second decimal place round half-up on magnitude.
    /// Exponent notation falls back to float conversion.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || format!("not a decimal amount: {:?}", s);

        if s.contains(|c: char| c == 'e' || c == 'E') {
            let value: f64 = s.parse().map_err(|_| invalid())?;
            return Centavos::from_reais_f64(value).ok_or_else(invalid);
        }

        let (negative, unsigned) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };

        let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: i64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| invalid())?
        };

        let mut frac_digits = frac_part.bytes().map(|b| (b - b'0') as i64);
        let tenths = frac_digits.next().unwrap_or(0);
        let hundredths = frac_digits.next().unwrap_or(0);
        let round_up = frac_digits.next().map_or(false, |d| d >= 5);

        let magnitude = whole
            .checked_mul(100)
            .and_then(|v| v.checked_add(tenths * 10 + hundredths + round_up as i64))
            .ok_or_else(invalid)?;

        Ok(Centavos(if negative { -magnitude } else { magnitude }))
    }
}

impl fmt::Display for Centavos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Serialize for Centavos {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_reais())
    }
}

/// Fact row: one public-works investment operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Operation {
    pub id_operacao: String,
    pub valor_investimento_previsto: Option<Centavos>,
    pub tomador_nome: Option<String>,
    pub tomador_codigo: Option<i64>,
    pub executor_nome: Option<String>,
    pub executor_codigo: Option<i64>,
    pub repassador_nome: Option<String>,
    pub repassador_codigo: Option<i64>,
    pub origem_fontes_de_recurso: Option<String>,
}

/// Dimension row: investment axis
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Axis {
    pub id_eixo: i64,
    pub descricao_eixo: Option<String>,
}

/// Dimension row: operation type, with an informational axis back-reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationType {
    pub id_tipo: i64,
    pub descricao_tipo: Option<String>,
    pub id_eixo: Option<i64>,
}

/// Dimension row: operation subtype, with an informational type back-reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subtype {
    pub id_subtipo: i64,
    pub descricao_subtipo: Option<String>,
    pub id_tipo: Option<i64>,
}

/// Association row binding an operation to a dimension identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Link {
    pub id_operacao: String,
    pub dimension_id: i64,
}

impl Link {
    pub fn new(id_operacao: impl Into<String>, dimension_id: i64) -> Self {
        Self {
            id_operacao: id_operacao.into(),
            dimension_id,
        }
    }
}

/// Row counts per table, in load order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub operacoes: usize,
    pub eixos: usize,
    pub tipos: usize,
    pub subtipos: usize,
    pub operacao_eixo_rel: usize,
    pub operacao_tipo_rel: usize,
    pub operacao_subtipo_rel: usize,
}

/// The seven normalized tables produced by one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StarSchema {
    pub operations: Vec<Operation>,
    pub axes: Vec<Axis>,
    pub types: Vec<OperationType>,
    pub subtypes: Vec<Subtype>,
    pub operation_axes: Vec<Link>,
    pub operation_types: Vec<Link>,
    pub operation_subtypes: Vec<Link>,
}

impl StarSchema {
    pub fn counts(&self) -> TableCounts {
        TableCounts {
            operacoes: self.operations.len(),
            eixos: self.axes.len(),
            tipos: self.types.len(),
            subtipos: self.subtypes.len(),
            operacao_eixo_rel: self.operation_axes.len(),
            operacao_tipo_rel: self.operation_types.len(),
            operacao_subtipo_rel: self.operation_subtypes.len(),
        }
    }

    /// Verify keys are unique and every association row references an
    /// existing operation and dimension row.
    ///
    /// Returns a description of every violation found.
    pub fn check_integrity(&self) -> Result<(), Vec<String>> {
        let mut violations = Vec::new();

        let operation_ids = unique_keys(
            "operacoes",
            self.operations.iter().map(|o| o.id_operacao.clone()),
            &mut violations,
        );
        let axis_ids = unique_keys("eixos", self.axes.iter().map(|a| a.id_eixo), &mut violations);
        let type_ids = unique_keys("tipos", self.types.iter().map(|t| t.id_tipo), &mut violations);
        let subtype_ids = unique_keys(
            "subtipos",
            self.subtypes.iter().map(|s| s.id_subtipo),
            &mut violations,
        );

        for (table, links, dimension_ids) in [
            ("operacao_eixo_rel", &self.operation_axes, &axis_ids),
            ("operacao_tipo_rel", &self.operation_types, &type_ids),
            ("operacao_subtipo_rel", &self.operation_subtypes, &subtype_ids),
        ] {
            let mut seen = HashSet::new();
            for link in links {
                if !seen.insert(link) {
                    violations.push(format!(
                        "{}: duplicate row ({}, {})",
                        table, link.id_operacao, link.dimension_id
                    ));
                }
                if !operation_ids.contains(link.id_operacao.as_str()) {
                    violations.push(format!(
                        "{}: unknown id_operacao {:?}",
                        table, link.id_operacao
                    ));
                }
                if !dimension_ids.contains(&link.dimension_id) {
                    violations.push(format!(
                        "{}: unknown dimension id {} (operation {:?})",
                        table, link.dimension_id, link.id_operacao
                    ));
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

fn unique_keys<K, I>(table: &str, keys: I, violations: &mut Vec<String>) -> HashSet<K>
where
    K: std::hash::Hash + Eq + fmt::Debug,
    I: Iterator<Item = K>,
{
    let mut set = HashSet::new();
    for key in keys {
        if set.contains(&key) {
            violations.push(format!("{}: duplicate primary key {:?}", table, key));
        } else {
            set.insert(key);
        }
    }
    set
}
