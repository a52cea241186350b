use anyhow::Context;
use wc_sync::SyncConfig;

#[derive(Clone, Debug, clap::Args)]
pub struct SyncParams {
    /// Number of parallel import workers.
    #[clap(long, env = "PARALLEL_WORKERS", default_value = "1", value_name = "COUNT")]
    pub parallel_workers: usize,

    /// Development-only: truncate the unsynced block list starting at this
    /// index. Kept as a string so a bad value can be diagnosed properly.
    #[clap(long, env = "DEVELOPMENT_SYNC_LENGTH", value_name = "INDEX")]
    pub development_sync_length: Option<String>,

    /// Stop once caught up instead of polling for new blocks.
    #[clap(long)]
    pub stop_on_sync: bool,
}

impl SyncParams {
    pub fn sync_config(&self) -> anyhow::Result<SyncConfig> {
        let development_sync_length = self
            .development_sync_length
            .as_deref()
            .map(|raw| raw.parse::<usize>().with_context(|| format!("DEVELOPMENT_SYNC_LENGTH is not a number: {raw}")))
            .transpose()?;
        Ok(SyncConfig {
            parallel_workers: self.parallel_workers.max(1),
            development_sync_length,
            stop_on_sync: self.stop_on_sync,
            ..Default::default()
        })
    }
}
