#[derive(Clone, Debug, clap::Args)]
pub struct DbParams {
    /// Store contact points, a JSON array of "host:port".
    #[clap(
        long,
        env = "CASSANDRA_CONTACT_POINTS",
        default_value = r#"["localhost:9042"]"#,
        value_name = "JSON ARRAY"
    )]
    pub contact_points: String,

    /// Seconds to wait for schema agreement during initialization.
    #[clap(long, env = "DB_TIMEOUT", default_value = "30", value_name = "SECONDS")]
    pub db_timeout: u64,

    /// Replication factor of the keyspace.
    #[clap(long, default_value = "1", value_name = "FACTOR")]
    pub replication_factor: u32,
}
