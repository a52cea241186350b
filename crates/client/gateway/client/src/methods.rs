use serde_json::Value;
use wp_chain::{ChainBlock, ChainTransaction, NodeInfo};

use crate::builder::NodeProvider;
use crate::error::NodeError;

impl NodeProvider {
    /// Current tip and height of the remote node.
    pub async fn get_node_info(&self) -> Result<NodeInfo, NodeError> {
        self.get_json(self.url(&["info"])?).await
    }

    /// The authoritative ordered list of block hashes, index = height.
    /// The node serves it newest-first; callers get it oldest-first so the
    /// vector index is the height.
    pub async fn get_hash_list(&self) -> Result<Vec<String>, NodeError> {
        let mut hashes: Vec<String> = self.get_json(self.url(&["hash_list"])?).await?;
        hashes.reverse();
        Ok(hashes)
    }

    pub async fn get_block_by_hash(&self, hash: &str) -> Result<ChainBlock, NodeError> {
        let value: Value = self.get_json(self.url(&["block", "hash", hash])?).await?;
        ChainBlock::from_value(value).map_err(|e| NodeError::DeserializeBody(serde::de::Error::custom(e)))
    }

    pub async fn get_block_by_height(&self, height: u64) -> Result<ChainBlock, NodeError> {
        let value: Value = self.get_json(self.url(&["block", "height", &height.to_string()])?).await?;
        ChainBlock::from_value(value).map_err(|e| NodeError::DeserializeBody(serde::de::Error::custom(e)))
    }

    pub async fn get_transaction(&self, id: &str) -> Result<ChainTransaction, NodeError> {
        let value: Value = self.get_json(self.url(&["tx", id])?).await?;
        ChainTransaction::from_value(value).map_err(|e| NodeError::DeserializeBody(serde::de::Error::custom(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;
    use serde_json::json;

    fn provider(server: &MockServer) -> NodeProvider {
        NodeProvider::new(server.base_url().parse().unwrap())
    }

    #[tokio::test]
    async fn get_node_info_ignores_unknown_fields() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/info");
            then.status(200).header("content-type", "application/json").json_body(json!({
                "network": "weavenet.1",
                "height": 10,
                "current": "h10",
                "peers": 14,
            }));
        });

        let info = provider(&server).get_node_info().await.unwrap();
        assert_eq!(info, NodeInfo { current: "h10".to_string(), height: 10 });
    }

    #[tokio::test]
    async fn get_hash_list_is_returned_oldest_first() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/hash_list");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!(["h2", "h1", "h0"]));
        });

        let hashes = provider(&server).get_hash_list().await.unwrap();
        assert_eq!(hashes, vec!["h0".to_string(), "h1".to_string(), "h2".to_string()]);
    }

    #[tokio::test]
    async fn get_block_by_hash() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/block/hash/h3");
            then.status(200).header("content-type", "application/json").json_body(json!({
                "indep_hash": "h3",
                "height": 3,
                "previous_block": "h2",
            }));
        });

        let block = provider(&server).get_block_by_hash("h3").await.unwrap();
        assert_eq!(block.indep_hash().unwrap(), "h3");
        assert_eq!(block.height().unwrap(), 3);
    }

    #[tokio::test]
    async fn missing_block_is_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/block/height/99");
            then.status(404).body("Block not found.");
        });

        let err = provider(&server).get_block_by_height(99).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/info");
            then.status(503).body("overloaded");
        });

        let err = provider(&server).get_node_info().await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn get_transaction() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/tx/tx-a");
            then.status(200).header("content-type", "application/json").json_body(json!({
                "id": "tx-a",
                "data_size": "0",
                "tags": [],
            }));
        });

        let tx = provider(&server).get_transaction("tx-a").await.unwrap();
        assert_eq!(tx.id().unwrap(), "tx-a");
    }
}
