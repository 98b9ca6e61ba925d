//! Normalizer
//!
//! Turns the raw record sequence into the seven star-schema tables.
//!
//! **Rules:**
//! - Single-valued parties (tomador, executor, repassador, fonte de recurso)
//!   take the first list entry; an empty list yields NULL attributes
//! - Each axis/type/subtype entry yields one dimension row and one
//!   association row, in source order
//! - Fact and dimension rows deduplicate by key, first occurrence wins
//! - Association rows deduplicate as exact (operation, dimension) pairs
//!
//! **Structural errors:** a record is validated completely before it
//! contributes anything. Invalid records are skipped and reported with
//! index, identifier and field; the rest of the batch proceeds.

pub mod extract;

pub use extract::{first_or_null, Reason};

use extract::Object;
use obras_common::db::{Axis, Centavos, Link, Operation, OperationType, StarSchema, Subtype};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use tracing::{info, warn};

pub const FIELD_ID: &str = "idUnico";
pub const FIELD_BORROWERS: &str = "tomadores";
pub const FIELD_EXECUTORS: &str = "executores";
pub const FIELD_TRANSFER_AGENTS: &str = "repassadores";
pub const FIELD_FUNDING_SOURCES: &str = "fontesDeRecurso";
pub const FIELD_AXES: &str = "eixos";
pub const FIELD_TYPES: &str = "tipos";
pub const FIELD_SUBTYPES: &str = "subTipos";

/// A rejected raw record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordError {
    /// Position in the fetched sequence
    pub index: usize,
    /// `idUnico`, when it could be read
    pub id: Option<String>,
    /// Offending field
    pub field: &'static str,
    pub reason: Reason,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "record #{} ({}) field `{}`: {}", self.index, id, self.field, self.reason),
            None => write!(f, "record #{} field `{}`: {}", self.index, self.field, self.reason),
        }
    }
}

impl std::error::Error for RecordError {}

/// Everything one raw record contributes, before deduplication
#[derive(Debug, Clone, PartialEq)]
struct ParsedRecord {
    operation: Operation,
    axes: Vec<Axis>,
    types: Vec<OperationType>,
    subtypes: Vec<Subtype>,
}

/// Name and code of the first entry of a party list (tomadores, ...)
fn party(record: &Object, field: &str) -> Result<(Option<String>, Option<i64>), Reason> {
    match extract::first_entry(record, field)? {
        Some(entry) => Ok((
            extract::opt_string(entry, "nome")?,
            extract::opt_integer(entry, "codigo")?,
        )),
        None => Ok((None, None)),
    }
}

/// Origin and predicted value of the first funding source.
///
/// Multiple funding sources collapse to the first one.
fn funding(record: &Object) -> Result<(Option<String>, Option<Centavos>), Reason> {
    match extract::first_entry(record, FIELD_FUNDING_SOURCES)? {
        Some(entry) => Ok((
            extract::opt_string(entry, "origem")?,
            extract::opt_amount(entry, "valorInvestimentoPrevisto")?,
        )),
        None => Ok((None, None)),
    }
}

/// One dimension row per entry of a list field, in source order
fn dimension_rows<T, F>(record: &Object, field: &str, build: F) -> Result<Vec<T>, Reason>
where
    F: Fn(&Object) -> Result<T, Reason>,
{
    extract::list(record, field)?
        .iter()
        .map(|v| build(extract::as_object(v)?))
        .collect()
}

fn parse_record(index: usize, value: &Value) -> Result<ParsedRecord, RecordError> {
    let record: &Object = value.as_object().ok_or_else(|| RecordError {
        index,
        id: None,
        field: "<record>",
        reason: Reason::NotAnObject,
    })?;

    let id = extract::identifier(record, FIELD_ID).map_err(|reason| RecordError {
        index,
        id: None,
        field: FIELD_ID,
        reason,
    })?;

    let at = |field: &'static str| {
        let id = id.clone();
        move |reason: Reason| RecordError {
            index,
            id: Some(id),
            field,
            reason,
        }
    };

    let (tomador_nome, tomador_codigo) = party(record, FIELD_BORROWERS).map_err(at(FIELD_BORROWERS))?;
    let (executor_nome, executor_codigo) = party(record, FIELD_EXECUTORS).map_err(at(FIELD_EXECUTORS))?;
    let (repassador_nome, repassador_codigo) =
        party(record, FIELD_TRANSFER_AGENTS).map_err(at(FIELD_TRANSFER_AGENTS))?;
    let (origem, valor) = funding(record).map_err(at(FIELD_FUNDING_SOURCES))?;

    let axes = dimension_rows(record, FIELD_AXES, |e| {
        Ok(Axis {
            id_eixo: extract::integer(e, "id")?,
            descricao_eixo: extract::opt_string(e, "descricao")?,
        })
    })
    .map_err(at(FIELD_AXES))?;

    let types = dimension_rows(record, FIELD_TYPES, |e| {
        Ok(OperationType {
            id_tipo: extract::integer(e, "id")?,
            descricao_tipo: extract::opt_string(e, "descricao")?,
            id_eixo: extract::opt_integer(e, "idEixo")?,
        })
    })
    .map_err(at(FIELD_TYPES))?;

    let subtypes = dimension_rows(record, FIELD_SUBTYPES, |e| {
        Ok(Subtype {
            id_subtipo: extract::integer(e, "id")?,
            descricao_subtipo: extract::opt_string(e, "descricao")?,
            id_tipo: extract::opt_integer(e, "idTipo")?,
        })
    })
    .map_err(at(FIELD_SUBTYPES))?;

    Ok(ParsedRecord {
        operation: Operation {
            id_operacao: id,
            valor_investimento_previsto: valor,
            tomador_nome,
            tomador_codigo,
            executor_nome,
            executor_codigo,
            repassador_nome,
            repassador_codigo,
            origem_fontes_de_recurso: origem,
        },
        axes,
        types,
        subtypes,
    })
}

/// Insertion-ordered rows deduplicated by key, first occurrence wins
#[derive(Debug)]
struct FirstWins<K, V> {
    seen: HashSet<K>,
    rows: Vec<V>,
}

impl<K: Hash + Eq, V> FirstWins<K, V> {
    fn new() -> Self {
        Self {
            seen: HashSet::new(),
            rows: Vec::new(),
        }
    }

    /// Returns false if `key` was already present (row discarded)
    fn push(&mut self, key: K, row: V) -> bool {
        if self.seen.insert(key) {
            self.rows.push(row);
            true
        } else {
            false
        }
    }
}

/// Output of one normalization pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub schema: StarSchema,
    pub rejected: Vec<RecordError>,
    /// Accepted records whose `idUnico` had already been seen
    pub duplicate_operations: usize,
}

/// Incremental normalizer; feed records in source order, then `finish`
pub struct Normalizer {
    operations: FirstWins<String, Operation>,
    axes: FirstWins<i64, Axis>,
    types: FirstWins<i64, OperationType>,
    subtypes: FirstWins<i64, Subtype>,
    operation_axes: FirstWins<Link, Link>,
    operation_types: FirstWins<Link, Link>,
    operation_subtypes: FirstWins<Link, Link>,
    rejected: Vec<RecordError>,
    duplicate_operations: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self {
            operations: FirstWins::new(),
            axes: FirstWins::new(),
            types: FirstWins::new(),
            subtypes: FirstWins::new(),
            operation_axes: FirstWins::new(),
            operation_types: FirstWins::new(),
            operation_subtypes: FirstWins::new(),
            rejected: Vec::new(),
            duplicate_operations: 0,
        }
    }

    /// Add one raw record; returns false if it was rejected
    pub fn push(&mut self, index: usize, record: &Value) -> bool {
        let parsed = match parse_record(index, record) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(
                    index = err.index,
                    id = err.id.as_deref().unwrap_or("-"),
                    field = err.field,
                    reason = %err.reason,
                    "Skipping malformed record"
                );
                self.rejected.push(err);
                return false;
            }
        };

        let id = parsed.operation.id_operacao.clone();

        if !self.operations.push(id.clone(), parsed.operation) {
            self.duplicate_operations += 1;
        }

        for axis in parsed.axes {
            let link = Link::new(id.clone(), axis.id_eixo);
            self.axes.push(axis.id_eixo, axis);
            self.operation_axes.push(link.clone(), link);
        }

        for tipo in parsed.types {
            let link = Link::new(id.clone(), tipo.id_tipo);
            self.types.push(tipo.id_tipo, tipo);
            self.operation_types.push(link.clone(), link);
        }

        for subtipo in parsed.subtypes {
            let link = Link::new(id.clone(), subtipo.id_subtipo);
            self.subtypes.push(subtipo.id_subtipo, subtipo);
            self.operation_subtypes.push(link.clone(), link);
        }

        true
    }

    pub fn finish(self) -> Normalized {
        Normalized {
            schema: StarSchema {
                operations: self.operations.rows,
                axes: self.axes.rows,
                types: self.types.rows,
                subtypes: self.subtypes.rows,
                operation_axes: self.operation_axes.rows,
                operation_types: self.operation_types.rows,
                operation_subtypes: self.operation_subtypes.rows,
            },
            rejected: self.rejected,
            duplicate_operations: self.duplicate_operations,
        }
    }
}

/// Normalize a full batch of raw records
pub fn normalize(records: &[Value]) -> Normalized {
    let mut normalizer = Normalizer::new();
    for (index, record) in records.iter().enumerate() {
        normalizer.push(index, record);
    }
    let normalized = normalizer.finish();

    let counts = normalized.schema.counts();
    info!(
        records = records.len(),
        rejected = normalized.rejected.len(),
        duplicate_operations = normalized.duplicate_operations,
        operacoes = counts.operacoes,
        eixos = counts.eixos,
        tipos = counts.tipos,
        subtipos = counts.subtipos,
        "Normalization complete"
    );

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_wins_keeps_first_row() {
        let mut table = FirstWins::new();
        assert!(table.push(1, "first"));
        assert!(!table.push(1, "second"));
        assert!(table.push(2, "other"));
        assert_eq!(table.rows, vec!["first", "other"]);
    }

    #[test]
    fn test_record_error_display() {
        let err = RecordError {
            index: 3,
            id: Some("A1".into()),
            field: FIELD_AXES,
            reason: Reason::NotAList("string"),
        };
        assert_eq!(err.to_string(), "record #3 (A1) field `eixos`: expected a list, found string");

        let err = RecordError { index: 0, id: None, field: FIELD_ID, reason: Reason::MissingIdentifier };
        assert_eq!(err.to_string(), "record #0 field `idUnico`: identifier missing");
    }

    #[test]
    fn test_parse_record_collects_every_party() {
        let parsed = parse_record(
            0,
            &json!({
                "idUnico": "50379.53-54",
                "tomadores": [{"nome": "Distrito Federal", "codigo": 5300108}],
                "executores": [{"nome": "NOVACAP", "codigo": "123"}],
                "repassadores": [{"nome": "Ministério das Cidades", "codigo": 56000}],
                "fontesDeRecurso": [
                    {"origem": "Federal", "valorInvestimentoPrevisto": 2500.5},
                    {"origem": "Estadual", "valorInvestimentoPrevisto": 1.0}
                ],
                "eixos": [], "tipos": [], "subTipos": []
            }),
        )
        .unwrap();

        let op = parsed.operation;
        assert_eq!(op.tomador_nome.as_deref(), Some("Distrito Federal"));
        assert_eq!(op.tomador_codigo, Some(5_300_108));
        assert_eq!(op.executor_codigo, Some(123));
        assert_eq!(op.repassador_nome.as_deref(), Some("Ministério das Cidades"));
        assert_eq!(op.origem_fontes_de_recurso.as_deref(), Some("Federal"));
        assert_eq!(op.valor_investimento_previsto.unwrap().to_string(), "2500.50");
    }

    #[test]
    fn test_malformed_nested_entry_names_field() {
        let err = parse_record(
            5,
            &json!({"idUnico": "B", "tipos": [{"descricao": "sem id"}]}),
        )
        .unwrap_err();

        assert_eq!(err.index, 5);
        assert_eq!(err.id.as_deref(), Some("B"));
        assert_eq!(err.field, FIELD_TYPES);
        assert!(matches!(err.reason, Reason::MalformedEntry(_)));
    }

    #[test]
    fn test_non_object_record_rejected() {
        let err = parse_record(2, &json!(["idUnico", "A1"])).unwrap_err();
        assert_eq!(err.reason, Reason::NotAnObject);
        assert_eq!(err.id, None);
    }
}
