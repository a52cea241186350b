//! In-memory store backend.
//!
//! Interprets the structured side of [`BoundStatement`]s, covering exactly
//! the statement shapes the crate's own builders generate. Backs the test
//! suites and the node's devnet mode; production deployments plug a wire
//! driver into [`StoreClient`](crate::StoreClient) instead.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::statement::{BoundStatement, CmpOp, SelectSpec, StatementKind, WhereTerm};
use crate::table::{SortOrder, Table};
use crate::value::CqlValue;
use crate::{ExecProfile, Row, StoreClient, StoreError};

#[derive(Default)]
pub struct MemBackend {
    tables: RwLock<HashMap<&'static str, Vec<Row>>>,
}

impl MemBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A backend with every table already created, skipping schema init.
    pub fn open_for_testing() -> Arc<Self> {
        let backend = Self::default();
        {
            let mut tables = backend.tables.write().expect("poisoned lock");
            for table in Table::ALL {
                tables.insert(table.name(), Vec::new());
            }
        }
        Arc::new(backend)
    }

    /// Rows of a table, ordered by its clustering key. Test helper.
    pub fn rows(&self, table: Table) -> Vec<Row> {
        let tables = self.tables.read().expect("poisoned lock");
        let mut rows = tables.get(table.name()).cloned().unwrap_or_default();
        sort_rows(&mut rows, table);
        rows
    }

    pub fn row_count(&self, table: Table) -> usize {
        let tables = self.tables.read().expect("poisoned lock");
        tables.get(table.name()).map(Vec::len).unwrap_or(0)
    }

    fn insert(
        &self,
        table: Table,
        columns: &[&'static str],
        params: &[CqlValue],
        if_not_exists: bool,
    ) -> Result<(), StoreError> {
        let candidate = Row(columns.iter().zip(params).map(|(name, value)| (name.to_string(), value.clone())).collect());
        let key_columns = table.primary_key_columns();
        let key = |row: &Row| -> Vec<CqlValue> {
            key_columns.iter().map(|column| row.get(column).cloned().unwrap_or(CqlValue::Null)).collect()
        };
        let candidate_key = key(&candidate);

        let mut tables = self.tables.write().expect("poisoned lock");
        let rows = tables.get_mut(table.name()).ok_or(StoreError::UnconfiguredTable(table.name()))?;
        match rows.iter_mut().find(|row| key(row) == candidate_key) {
            Some(existing) => {
                // Single-writer-wins for conditional inserts, upsert otherwise.
                if !if_not_exists {
                    for (name, value) in candidate.0 {
                        match existing.0.iter_mut().find(|(existing_name, _)| *existing_name == name) {
                            Some((_, existing_value)) => *existing_value = value,
                            None => existing.0.push((name, value)),
                        }
                    }
                }
            }
            None => rows.push(candidate),
        }
        Ok(())
    }

    fn select(&self, spec: &SelectSpec, params: &[CqlValue]) -> Result<Vec<Row>, StoreError> {
        let tables = self.tables.read().expect("poisoned lock");
        let rows = tables.get(spec.table.name()).ok_or(StoreError::UnconfiguredTable(spec.table.name()))?;

        let mut matched: Vec<Row> = rows.iter().filter(|row| matches_where(row, &spec.where_terms, params)).cloned().collect();
        sort_rows(&mut matched, spec.table);

        if let Some(limit) = spec.limit {
            matched.truncate(limit.max(0) as usize);
        }

        if spec.count {
            return Ok(vec![Row(vec![("count".to_string(), CqlValue::Bigint(matched.len() as i64))])]);
        }

        if spec.columns.is_empty() {
            return Ok(matched);
        }
        Ok(matched
            .into_iter()
            .map(|row| {
                Row(spec
                    .columns
                    .iter()
                    .map(|column| (column.to_string(), row.get(column).cloned().unwrap_or(CqlValue::Null)))
                    .collect())
            })
            .collect())
    }

    fn delete(
        &self,
        table: Table,
        columns: &[&'static str],
        params: &[CqlValue],
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().expect("poisoned lock");
        let rows = tables.get_mut(table.name()).ok_or(StoreError::UnconfiguredTable(table.name()))?;
        rows.retain(|row| {
            !columns
                .iter()
                .zip(params)
                .all(|(column, value)| row.get(column).map(|actual| actual == value).unwrap_or(false))
        });
        Ok(())
    }
}

fn matches_where(row: &Row, terms: &[WhereTerm], params: &[CqlValue]) -> bool {
    let mut cursor = 0usize;
    for term in terms {
        match term {
            WhereTerm::Eq(column) => {
                let expected = &params[cursor];
                cursor += 1;
                if row.get(column) != Some(expected) {
                    return false;
                }
            }
            WhereTerm::In(column, arity) => {
                let expected = &params[cursor..cursor + arity];
                cursor += arity;
                match row.get(column) {
                    Some(actual) if expected.contains(actual) => {}
                    _ => return false,
                }
            }
            WhereTerm::Cmp(column, op) => {
                let expected = &params[cursor];
                cursor += 1;
                let Some(actual) = row.get(column) else { return false };
                if std::mem::discriminant(actual) != std::mem::discriminant(expected) {
                    return false;
                }
                let ordering = actual.cmp(expected);
                let holds = match op {
                    CmpOp::Lt => ordering == Ordering::Less,
                    CmpOp::Le => ordering != Ordering::Greater,
                    CmpOp::Ge => ordering != Ordering::Less,
                    CmpOp::Gt => ordering == Ordering::Greater,
                };
                if !holds {
                    return false;
                }
            }
        }
    }
    true
}

fn sort_rows(rows: &mut [Row], table: Table) {
    let clustering = table.clustering_key();
    if clustering.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for (column, order) in clustering {
            let va = a.get(column).cloned().unwrap_or(CqlValue::Null);
            let vb = b.get(column).cloned().unwrap_or(CqlValue::Null);
            let ordering = match order {
                SortOrder::Asc => va.cmp(&vb),
                SortOrder::Desc => vb.cmp(&va),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

#[async_trait]
impl StoreClient for MemBackend {
    async fn execute(&self, statement: &BoundStatement, _profile: ExecProfile) -> Result<Vec<Row>, StoreError> {
        match &statement.kind {
            StatementKind::CreateKeyspace => Ok(Vec::new()),
            StatementKind::CreateTable(table) => {
                self.tables.write().expect("poisoned lock").entry(table.name()).or_default();
                Ok(Vec::new())
            }
            StatementKind::Insert { table, columns, if_not_exists } => {
                self.insert(*table, columns, &statement.params, *if_not_exists)?;
                Ok(Vec::new())
            }
            StatementKind::Select(spec) => self.select(spec, &statement.params),
            StatementKind::Delete { table, where_columns } => {
                self.delete(*table, where_columns, &statement.params)?;
                Ok(Vec::new())
            }
        }
    }
}
