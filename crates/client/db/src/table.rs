//! Catalog of the denormalized tables one upstream block fans out into.

use std::fmt;

/// Keyspace holding every weavegate table.
pub const KEYSPACE: &str = "gateway";

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// Canonical block row, keyed by `indep_hash`.
    Block,
    /// Forward height scan for GraphQL, single `gql1` partition.
    BlockGqlAsc,
    /// Reverse height scan for GraphQL, single `gql2` partition.
    BlockGqlDesc,
    /// Hash to height lookup.
    BlockHeightByBlockHash,
    /// Tx id to containing block.
    BlockByTxId,
    /// Detached proof-of-access payload.
    Poa,
    /// Canonical transaction row, `tag_count` cached.
    Transaction,
    /// Tag lookup by name, optionally filtered by value set.
    TxTag,
    /// Present only for transactions carrying data.
    TxOffset,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Table {
    pub const ALL: &'static [Self] = {
        use Table::*;
        &[Block, BlockGqlAsc, BlockGqlDesc, BlockHeightByBlockHash, BlockByTxId, Poa, Transaction, TxTag, TxOffset]
    };
    pub const NUM_TABLES: usize = Self::ALL.len();

    pub fn name(&self) -> &'static str {
        use Table::*;
        match self {
            Block => "block",
            BlockGqlAsc => "block_gql_asc",
            BlockGqlDesc => "block_gql_desc",
            BlockHeightByBlockHash => "block_height_by_block_hash",
            BlockByTxId => "block_by_tx_id",
            Poa => "poa",
            Transaction => "transaction",
            TxTag => "tx_tag",
            TxOffset => "tx_offset",
        }
    }

    pub fn qualified_name(&self) -> String {
        format!("{KEYSPACE}.{}", self.name())
    }

    pub fn partition_key(&self) -> &'static [&'static str] {
        use Table::*;
        match self {
            Block => &["indep_hash"],
            BlockGqlAsc | BlockGqlDesc => &["partition_id"],
            BlockHeightByBlockHash => &["block_hash"],
            BlockByTxId => &["tx_id"],
            Poa => &["block_hash"],
            Transaction => &["id"],
            TxTag => &["name"],
            TxOffset => &["tx_id"],
        }
    }

    pub fn clustering_key(&self) -> &'static [(&'static str, SortOrder)] {
        use SortOrder::*;
        use Table::*;
        match self {
            Block => &[("height", Desc)],
            BlockGqlAsc => &[("height", Asc), ("indep_hash", Asc)],
            BlockGqlDesc => &[("height", Desc), ("indep_hash", Asc)],
            Poa => &[("block_height", Desc)],
            TxTag => &[("value", Asc), ("tx_id", Asc), ("tag_index", Asc)],
            BlockHeightByBlockHash | BlockByTxId | Transaction | TxOffset => &[],
        }
    }

    pub fn ddl(&self) -> String {
        use Table::*;
        let columns = match self {
            Block => {
                "indep_hash text, height bigint, previous_block text, timestamp bigint, \
                 nonce text, diff text, cumulative_diff text, last_retarget bigint, hash text, \
                 block_size bigint, weave_size bigint, reward_addr text, reward_pool bigint, \
                 tx_root text, wallet_list text, txs list<text>, tags set<frozen<tuple<text, text>>>"
            }
            BlockGqlAsc | BlockGqlDesc => {
                "partition_id text, height bigint, indep_hash text, timestamp bigint, timestamp_uuid timeuuid"
            }
            BlockHeightByBlockHash => "block_hash text, block_height bigint",
            BlockByTxId => "tx_id text, block_height bigint, block_hash text",
            Poa => "block_hash text, block_height bigint, option text, tx_path text, data_path text, chunk text",
            Transaction => {
                "id text, block_height bigint, block_hash text, block_timestamp bigint, \
                 last_tx text, owner text, target text, quantity bigint, reward bigint, \
                 signature text, data_root text, data_size bigint, format bigint, \
                 tag_count bigint, tags set<frozen<tuple<text, text>>>"
            }
            TxTag => "name text, value text, tx_id text, tag_index bigint, next_tag_index bigint",
            TxOffset => "tx_id text, size bigint, offset bigint",
        };

        let mut primary_key = self.partition_key().join(", ");
        if self.partition_key().len() > 1 {
            primary_key = format!("({primary_key})");
        }
        for (column, _) in self.clustering_key() {
            primary_key.push_str(", ");
            primary_key.push_str(column);
        }

        let mut ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} ({columns}, PRIMARY KEY ({primary_key}))",
            self.qualified_name()
        );
        if !self.clustering_key().is_empty() {
            let order = self
                .clustering_key()
                .iter()
                .map(|(column, order)| match order {
                    SortOrder::Asc => format!("{column} ASC"),
                    SortOrder::Desc => format!("{column} DESC"),
                })
                .collect::<Vec<_>>()
                .join(", ");
            ddl.push_str(&format!(" WITH CLUSTERING ORDER BY ({order})"));
        }
        ddl
    }

    /// Partition key followed by clustering columns, identifying one row.
    pub fn primary_key_columns(&self) -> Vec<&'static str> {
        self.partition_key()
            .iter()
            .copied()
            .chain(self.clustering_key().iter().map(|(column, _)| *column))
            .collect()
    }
}
