//! Builds parameterized SELECT statements for the GraphQL layer.
//!
//! The physical table choice encodes the block sort order; transaction
//! queries deliberately do not emit one.

use wc_db::projector::{GQL_ASC_PARTITION, GQL_DESC_PARTITION};
use wc_db::value::time_uuid_unix_secs;
use wc_db::{BoundStatement, CmpOp, CqlValue, SelectBuilder, SortOrder, Table};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Confirmed,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionQueryParams {
    /// Exact id; takes precedence over `ids`.
    pub id: Option<String>,
    pub ids: Option<Vec<String>>,
    /// Recipient wallet, exact match.
    pub to: Option<String>,
    /// A time-based UUID string; rows older than its embedded time match.
    pub since: Option<String>,
    pub status: Option<TxStatus>,
    pub min_height: Option<i64>,
    pub max_height: Option<i64>,
}

/// All WHERE terms are anded; `ALLOW FILTERING` is always set because the
/// terms cut across the partition key.
pub fn generate_transaction_query(params: &TransactionQueryParams) -> BoundStatement {
    let mut builder = SelectBuilder::new(Table::Transaction);

    if let Some(id) = &params.id {
        builder = builder.and_where_eq("id", id.as_str());
    } else if let Some(ids) = &params.ids {
        let values = ids.iter().map(|id| CqlValue::Text(id.clone())).collect();
        builder = builder.and_where_in("id", values);
    }
    if let Some(to) = &params.to {
        builder = builder.and_where_eq("target", to.as_str());
    }
    if let Some(since) = &params.since {
        if let Some(seconds) = time_uuid_unix_secs(since) {
            builder = builder.and_where_cmp("block_timestamp", CmpOp::Lt, seconds);
        }
    }
    if params.status == Some(TxStatus::Confirmed) {
        builder = builder.and_where_cmp("block_height", CmpOp::Ge, 0i64);
    }
    if let Some(min_height) = params.min_height {
        builder = builder.and_where_cmp("block_height", CmpOp::Ge, min_height);
    }
    if let Some(max_height) = params.max_height {
        builder = builder.and_where_cmp("block_height", CmpOp::Le, max_height);
    }

    builder.allow_filtering().build()
}

#[derive(Debug, Clone)]
pub struct BlockQueryParams {
    pub sort_order: SortOrder,
    pub min_height: i64,
    pub max_height: i64,
    /// Client paging offset, folded into the height window.
    pub offset: i64,
    pub fetch_size: i64,
}

/// The sort order picks the physical table; the offset shifts the effective
/// height window in the scan direction.
pub fn generate_block_query(params: &BlockQueryParams) -> BoundStatement {
    let (table, partition, min_height, max_height) = match params.sort_order {
        SortOrder::Asc => {
            (Table::BlockGqlAsc, GQL_ASC_PARTITION, params.min_height + params.offset, params.max_height)
        }
        SortOrder::Desc => {
            (Table::BlockGqlDesc, GQL_DESC_PARTITION, params.min_height, params.max_height - params.offset)
        }
    };

    SelectBuilder::new(table)
        .columns(&["height", "indep_hash", "timestamp"])
        .and_where_eq("partition_id", partition)
        .and_where_cmp("height", CmpOp::Ge, min_height)
        .and_where_cmp("height", CmpOp::Le, max_height)
        .limit(params.fetch_size)
        .build()
}

/// Tag lookup returning the `tx_id` projection. Each filter appends
/// `name = ?` plus a value constraint, `IN` when several values are given.
pub fn generate_tag_query(filters: &[TagFilter]) -> BoundStatement {
    let mut builder = SelectBuilder::new(Table::TxTag).columns(&["tx_id"]);
    for filter in filters {
        builder = builder.and_where_eq("name", filter.name.as_str());
        match filter.values.as_slice() {
            [single] => builder = builder.and_where_eq("value", single.as_str()),
            values => {
                builder = builder
                    .and_where_in("value", values.iter().map(|v| CqlValue::Text(v.clone())).collect());
            }
        }
    }
    builder.build()
}
