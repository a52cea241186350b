mod db;
mod sync;

pub use db::DbParams;
pub use sync::SyncParams;

use url::Url;

#[derive(Clone, Debug, clap::Parser)]
#[clap(name = "weavegate", about = "Mirrors an Arweave-style chain into a wide-column store")]
pub struct RunCmd {
    /// Base URL of the remote chain node.
    #[clap(long, env = "NODE_URL", default_value = "https://arweave.net", value_name = "URL")]
    pub node_url: Url,

    /// Run against an in-memory store instead of a wire driver. Nothing is
    /// persisted across restarts.
    #[clap(long)]
    pub devnet: bool,

    /// Initialize the keyspace and tables, then exit.
    #[clap(long)]
    pub schema_init_only: bool,

    #[clap(flatten)]
    pub db_params: DbParams,

    #[clap(flatten)]
    pub sync_params: SyncParams,
}
