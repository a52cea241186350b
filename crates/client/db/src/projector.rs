//! Projects one upstream block and its transactions into the insert
//! statements for every denormalized table.

use serde_json::Value;
use wp_chain::{ChainBlock, ChainError, ChainTransaction};

use crate::statement::{BoundStatement, InsertBuilder};
use crate::table::Table;
use crate::value::{adapt, tag_set, time_uuid, ColType, CqlValue};

/// Synthetic partition ids of the single-partition GraphQL scan tables.
pub const GQL_ASC_PARTITION: &str = "gql1";
pub const GQL_DESC_PARTITION: &str = "gql2";

#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Known columns of the `block` table. `poa` is detached into its own table
/// and is deliberately not listed here.
const BLOCK_COLUMNS: &[(&str, ColType)] = &[
    ("indep_hash", ColType::Text),
    ("height", ColType::Bigint),
    ("previous_block", ColType::Text),
    ("timestamp", ColType::Bigint),
    ("nonce", ColType::Text),
    ("diff", ColType::Text),
    ("cumulative_diff", ColType::Text),
    ("last_retarget", ColType::Bigint),
    ("hash", ColType::Text),
    ("block_size", ColType::Bigint),
    ("weave_size", ColType::Bigint),
    ("reward_addr", ColType::Text),
    ("reward_pool", ColType::Bigint),
    ("tx_root", ColType::Text),
    ("wallet_list", ColType::Text),
    ("txs", ColType::TextList),
    ("tags", ColType::TagSet),
];

/// Known columns of the `transaction` table that come straight from the
/// upstream transaction object. Tags and the denormalized block columns are
/// derived separately.
const TX_COLUMNS: &[(&str, ColType)] = &[
    ("id", ColType::Text),
    ("last_tx", ColType::Text),
    ("owner", ColType::Text),
    ("target", ColType::Text),
    ("quantity", ColType::Bigint),
    ("reward", ColType::Bigint),
    ("signature", ColType::Text),
    ("data_root", ColType::Text),
    ("data_size", ColType::Bigint),
    ("format", ColType::Bigint),
];

/// Projects a block and its transactions into one logical write unit.
pub fn project_block(
    block: &ChainBlock,
    txs: &[ChainTransaction],
) -> Result<Vec<BoundStatement>, ProjectionError> {
    let mut statements = block_statements(block)?;
    for tx in txs {
        statements.extend(transaction_statements(block, tx)?);
    }
    Ok(statements)
}

fn block_statements(block: &ChainBlock) -> Result<Vec<BoundStatement>, ProjectionError> {
    let indep_hash = block.indep_hash()?.to_string();
    let height = block.height()? as i64;
    let timestamp = block.timestamp();

    let mut block_row = InsertBuilder::new(Table::Block);
    for (field, raw) in block.fields() {
        if field == "poa" {
            continue;
        }
        match BLOCK_COLUMNS.iter().find(|(name, _)| name == field) {
            Some((name, ty)) => block_row = block_row.column(name, adapt(*ty, raw)),
            None => tracing::debug!("Unknown block field `{field}`, skipping"),
        }
    }

    let gql_row = |partition: &'static str, table: Table| {
        InsertBuilder::new(table)
            .key_column("partition_id", partition.into())
            .key_column("height", CqlValue::Bigint(height))
            .key_column("indep_hash", indep_hash.as_str().into())
            .column("timestamp", CqlValue::Bigint(timestamp))
            .column("timestamp_uuid", time_uuid(timestamp).into())
            .build()
    };

    let mut statements = vec![
        block_row.build(),
        gql_row(GQL_ASC_PARTITION, Table::BlockGqlAsc),
        gql_row(GQL_DESC_PARTITION, Table::BlockGqlDesc),
        InsertBuilder::new(Table::BlockHeightByBlockHash)
            .key_column("block_hash", indep_hash.as_str().into())
            .column("block_height", CqlValue::Bigint(height))
            .if_not_exists()
            .build(),
    ];

    if let Some(poa) = block.poa() {
        let text = |field: &str| adapt(ColType::Text, poa.get(field).unwrap_or(&Value::Null));
        statements.push(
            InsertBuilder::new(Table::Poa)
                .key_column("block_hash", indep_hash.as_str().into())
                .key_column("block_height", CqlValue::Bigint(height))
                .column("option", text("option"))
                .column("tx_path", text("tx_path"))
                .column("data_path", text("data_path"))
                .column("chunk", text("chunk"))
                .build(),
        );
    }

    Ok(statements)
}

fn transaction_statements(
    block: &ChainBlock,
    tx: &ChainTransaction,
) -> Result<Vec<BoundStatement>, ProjectionError> {
    let block_hash = block.indep_hash()?.to_string();
    let block_height = block.height()? as i64;
    let tx_id = tx.id()?.to_string();
    let tags = tx.tags();

    let mut tx_row = InsertBuilder::new(Table::Transaction);
    for (field, raw) in tx.fields() {
        if field == "tags" {
            continue;
        }
        match TX_COLUMNS.iter().find(|(name, _)| name == field) {
            Some((name, ty)) => tx_row = tx_row.column(name, adapt(*ty, raw)),
            None => tracing::debug!("Unknown transaction field `{field}`, skipping"),
        }
    }
    tx_row = tx_row
        .column("block_height", CqlValue::Bigint(block_height))
        .column("block_hash", block_hash.as_str().into())
        .column("block_timestamp", CqlValue::Bigint(block.timestamp()))
        .column("tag_count", CqlValue::Bigint(tags.len() as i64))
        .column("tags", tag_set(&tags));

    let mut statements = vec![
        tx_row.build(),
        InsertBuilder::new(Table::BlockByTxId)
            .key_column("tx_id", tx_id.as_str().into())
            .column("block_height", CqlValue::Bigint(block_height))
            .column("block_hash", block_hash.as_str().into())
            .if_not_exists()
            .build(),
    ];

    // Forward-linked tag rows: each one names the index of its successor,
    // the last one leaves it unset.
    let last_index = tags.len().saturating_sub(1);
    for (index, tag) in tags.iter().enumerate() {
        let mut row = InsertBuilder::new(Table::TxTag)
            .key_column("name", tag.name.as_str().into())
            .key_column("value", tag.value.as_str().into())
            .key_column("tx_id", tx_id.as_str().into())
            .key_column("tag_index", CqlValue::Bigint(index as i64));
        if index < last_index {
            row = row.column("next_tag_index", CqlValue::Bigint(index as i64 + 1));
        }
        statements.push(row.build());
    }

    if tx.data_size() > 0 {
        statements.push(
            InsertBuilder::new(Table::TxOffset)
                .key_column("tx_id", tx_id.as_str().into())
                .column("size", CqlValue::Bigint(tx.data_size()))
                .column("offset", adapt(ColType::Bigint, tx.0.get("offset").unwrap_or(&Value::Null)))
                .build(),
        );
    }

    Ok(statements)
}
