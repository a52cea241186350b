//! Parameterized statement builders.
//!
//! Statements carry both the rendered CQL text (what a wire driver prepares
//! and executes) and a structured description of the operation, which is what
//! the in-memory backend interprets. Insert builders construct the statement
//! text from the surviving column list only, so absent values never turn
//! into tombstones.

use crate::table::{Table, KEYSPACE};
use crate::value::CqlValue;

#[derive(Debug, Clone)]
pub struct BoundStatement {
    pub cql: String,
    pub params: Vec<CqlValue>,
    pub kind: StatementKind,
    /// Idempotent statements may be retried by the driver on timeout.
    pub is_idempotent: bool,
}

#[derive(Debug, Clone)]
pub enum StatementKind {
    CreateKeyspace,
    CreateTable(Table),
    Insert { table: Table, columns: Vec<&'static str>, if_not_exists: bool },
    Select(SelectSpec),
    Delete { table: Table, where_columns: Vec<&'static str> },
}

#[derive(Debug, Clone)]
pub struct SelectSpec {
    pub table: Table,
    /// Empty means `*`.
    pub columns: Vec<&'static str>,
    pub count: bool,
    pub where_terms: Vec<WhereTerm>,
    pub limit: Option<i64>,
    pub allow_filtering: bool,
}

/// One WHERE term. Parameter values live in [`BoundStatement::params`], in
/// term order; `In` records how many of them it consumes.
#[derive(Debug, Clone)]
pub enum WhereTerm {
    Eq(&'static str),
    In(&'static str, usize),
    Cmp(&'static str, CmpOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Ge,
    Gt,
}

impl CmpOp {
    pub fn as_cql(&self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Ge => ">=",
            CmpOp::Gt => ">",
        }
    }
}

pub struct InsertBuilder {
    table: Table,
    if_not_exists: bool,
    columns: Vec<(&'static str, CqlValue)>,
}

impl InsertBuilder {
    pub fn new(table: Table) -> Self {
        Self { table, if_not_exists: false, columns: Vec::new() }
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    /// Adds a column unless its value is absent (non-null filtering).
    pub fn column(mut self, name: &'static str, value: CqlValue) -> Self {
        if !value.is_absent() {
            self.columns.push((name, value));
        }
        self
    }

    /// Adds a key column unconditionally. Key material is part of the row
    /// identity and is written even when empty.
    pub fn key_column(mut self, name: &'static str, value: CqlValue) -> Self {
        self.columns.push((name, value));
        self
    }

    pub fn build(self) -> BoundStatement {
        let names: Vec<&'static str> = self.columns.iter().map(|(name, _)| *name).collect();
        let placeholders = vec!["?"; names.len()].join(", ");
        let mut cql = format!(
            "INSERT INTO {}.{} ({}) VALUES ({placeholders})",
            KEYSPACE,
            self.table.name(),
            names.join(", ")
        );
        if self.if_not_exists {
            cql.push_str(" IF NOT EXISTS");
        }
        BoundStatement {
            cql,
            params: self.columns.into_iter().map(|(_, value)| value).collect(),
            kind: StatementKind::Insert { table: self.table, columns: names, if_not_exists: self.if_not_exists },
            is_idempotent: true,
        }
    }
}

pub struct SelectBuilder {
    table: Table,
    columns: Vec<&'static str>,
    count: bool,
    where_terms: Vec<WhereTerm>,
    params: Vec<CqlValue>,
    limit: Option<i64>,
    allow_filtering: bool,
}

impl SelectBuilder {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            columns: Vec::new(),
            count: false,
            where_terms: Vec::new(),
            params: Vec::new(),
            limit: None,
            allow_filtering: false,
        }
    }

    pub fn columns(mut self, columns: &[&'static str]) -> Self {
        self.columns = columns.to_vec();
        self
    }

    pub fn count(mut self) -> Self {
        self.count = true;
        self
    }

    pub fn and_where_eq(mut self, column: &'static str, value: impl Into<CqlValue>) -> Self {
        self.where_terms.push(WhereTerm::Eq(column));
        self.params.push(value.into());
        self
    }

    pub fn and_where_in(mut self, column: &'static str, values: Vec<CqlValue>) -> Self {
        self.where_terms.push(WhereTerm::In(column, values.len()));
        self.params.extend(values);
        self
    }

    pub fn and_where_cmp(mut self, column: &'static str, op: CmpOp, value: impl Into<CqlValue>) -> Self {
        self.where_terms.push(WhereTerm::Cmp(column, op));
        self.params.push(value.into());
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn allow_filtering(mut self) -> Self {
        self.allow_filtering = true;
        self
    }

    pub fn build(self) -> BoundStatement {
        let projection = if self.count {
            "COUNT(*)".to_string()
        } else if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        let mut cql = format!("SELECT {projection} FROM {}.{}", KEYSPACE, self.table.name());
        if !self.where_terms.is_empty() {
            let terms = self
                .where_terms
                .iter()
                .map(|term| match term {
                    WhereTerm::Eq(column) => format!("{column} = ?"),
                    WhereTerm::In(column, arity) => format!("{column} IN ({})", vec!["?"; *arity].join(", ")),
                    WhereTerm::Cmp(column, op) => format!("{column} {} ?", op.as_cql()),
                })
                .collect::<Vec<_>>()
                .join(" AND ");
            cql.push_str(" WHERE ");
            cql.push_str(&terms);
        }
        if let Some(limit) = self.limit {
            cql.push_str(&format!(" LIMIT {limit}"));
        }
        if self.allow_filtering {
            cql.push_str(" ALLOW FILTERING");
        }
        BoundStatement {
            cql,
            params: self.params,
            kind: StatementKind::Select(SelectSpec {
                table: self.table,
                columns: self.columns,
                count: self.count,
                where_terms: self.where_terms,
                limit: self.limit,
                allow_filtering: self.allow_filtering,
            }),
            is_idempotent: true,
        }
    }
}

pub struct DeleteBuilder {
    table: Table,
    where_columns: Vec<(&'static str, CqlValue)>,
}

impl DeleteBuilder {
    pub fn new(table: Table) -> Self {
        Self { table, where_columns: Vec::new() }
    }

    pub fn and_where_eq(mut self, column: &'static str, value: impl Into<CqlValue>) -> Self {
        self.where_columns.push((column, value.into()));
        self
    }

    pub fn build(self) -> BoundStatement {
        let terms =
            self.where_columns.iter().map(|(column, _)| format!("{column} = ?")).collect::<Vec<_>>().join(" AND ");
        let cql = format!("DELETE FROM {}.{} WHERE {terms}", KEYSPACE, self.table.name());
        let columns = self.where_columns.iter().map(|(column, _)| *column).collect();
        BoundStatement {
            cql,
            params: self.where_columns.into_iter().map(|(_, value)| value).collect(),
            kind: StatementKind::Delete { table: self.table, where_columns: columns },
            is_idempotent: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_skips_absent_columns() {
        let statement = InsertBuilder::new(Table::Block)
            .column("indep_hash", "h1".into())
            .column("height", CqlValue::Bigint(1))
            .column("previous_block", CqlValue::Text(String::new()))
            .column("reward_addr", CqlValue::Null)
            .build();
        assert_eq!(statement.cql, "INSERT INTO gateway.block (indep_hash, height) VALUES (?, ?)");
        assert_eq!(statement.params, vec![CqlValue::Text("h1".to_string()), CqlValue::Bigint(1)]);
        assert!(statement.is_idempotent);
    }

    #[test]
    fn insert_key_column_survives_empty_value() {
        let statement = InsertBuilder::new(Table::TxTag)
            .key_column("name", "App".into())
            .key_column("value", CqlValue::Text(String::new()))
            .key_column("tx_id", "tx-a".into())
            .key_column("tag_index", CqlValue::Bigint(0))
            .build();
        assert!(statement.cql.contains("(name, value, tx_id, tag_index)"));
        assert_eq!(statement.params.len(), 4);
    }

    #[test]
    fn insert_if_not_exists() {
        let statement = InsertBuilder::new(Table::BlockByTxId)
            .key_column("tx_id", "tx-a".into())
            .column("block_height", CqlValue::Bigint(3))
            .if_not_exists()
            .build();
        assert!(statement.cql.ends_with("IF NOT EXISTS"));
    }

    #[test]
    fn select_with_terms() {
        let statement = SelectBuilder::new(Table::Transaction)
            .columns(&["id"])
            .and_where_eq("target", "wallet")
            .and_where_cmp("block_height", CmpOp::Ge, 0i64)
            .and_where_in("id", vec!["a".into(), "b".into()])
            .allow_filtering()
            .build();
        assert_eq!(
            statement.cql,
            "SELECT id FROM gateway.transaction WHERE target = ? AND block_height >= ? AND id IN (?, ?) ALLOW FILTERING"
        );
        assert_eq!(statement.params.len(), 4);
    }

    #[test]
    fn select_count_and_limit() {
        let statement = SelectBuilder::new(Table::Block).count().build();
        assert_eq!(statement.cql, "SELECT COUNT(*) FROM gateway.block");

        let statement = SelectBuilder::new(Table::BlockGqlDesc)
            .columns(&["height", "indep_hash"])
            .and_where_eq("partition_id", "gql2")
            .limit(1)
            .build();
        assert_eq!(
            statement.cql,
            "SELECT height, indep_hash FROM gateway.block_gql_desc WHERE partition_id = ? LIMIT 1"
        );
    }

    #[test]
    fn delete_statement() {
        let statement = DeleteBuilder::new(Table::Block)
            .and_where_eq("indep_hash", "h9")
            .build();
        assert_eq!(statement.cql, "DELETE FROM gateway.block WHERE indep_hash = ?");
        assert_eq!(statement.params, vec![CqlValue::Text("h9".to_string())]);
    }
}
