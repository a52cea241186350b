//! One-shot keyspace and table creation.

use std::sync::Arc;

use crate::statement::{BoundStatement, StatementKind};
use crate::table::{Table, KEYSPACE};
use crate::{ExecProfile, StoreClient, StoreError};

pub struct SchemaInitializer {
    store: Arc<dyn StoreClient>,
    replication_factor: u32,
}

pub fn keyspace_ddl(replication_factor: u32) -> BoundStatement {
    BoundStatement {
        cql: format!(
            "CREATE KEYSPACE IF NOT EXISTS {KEYSPACE} WITH REPLICATION = \
             {{'class': 'SimpleStrategy', 'replication_factor': {replication_factor}}}"
        ),
        params: Vec::new(),
        kind: StatementKind::CreateKeyspace,
        is_idempotent: true,
    }
}

fn table_ddl(table: Table) -> BoundStatement {
    BoundStatement {
        cql: table.ddl(),
        params: Vec::new(),
        kind: StatementKind::CreateTable(table),
        is_idempotent: true,
    }
}

impl SchemaInitializer {
    pub fn new(store: Arc<dyn StoreClient>, replication_factor: u32) -> Self {
        Self { store, replication_factor }
    }

    /// Creates the keyspace, then every table, serially. DDL must not race
    /// the store's schema agreement, so there is no fan-out here.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        tracing::info!("🛠  Creating keyspace `{KEYSPACE}` and {} tables", Table::NUM_TABLES);
        self.store.execute(&keyspace_ddl(self.replication_factor), ExecProfile::Full).await?;
        for table in Table::ALL {
            tracing::debug!("Creating table {}", table.qualified_name());
            self.store.execute(&table_ddl(*table), ExecProfile::Full).await?;
        }
        Ok(())
    }
}
