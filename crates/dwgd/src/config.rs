//! Daemon configuration.

/// Configuration of one dwgd daemon instance.
#[derive(Clone, Debug)]
pub struct Config {
    /// Path to the state database, `":memory:"` for a transient store.
    pub db: String,
    /// Whether trace logging is enabled.
    pub verbose: bool,
    /// Whether to maintain plugin sockets for rootless engines.
    pub rootless: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db: "/var/lib/dwgd.db".to_string(),
            verbose: false,
            rootless: true,
        }
    }
}
