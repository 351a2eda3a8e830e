/// Engine configuration for the journal.
#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Minimum Risk:Reward ratio for admission (waivable via checklist override).
    pub minimum_rr: f64,
    /// How many recent trades the advisory pattern detector looks at.
    pub advisory_lookback: u32,
    /// Whether the rule-based advisory detector is enabled at all.
    pub advisory_enabled: bool,
    /// HTTP bind address.
    pub bind_addr: String,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            minimum_rr: 2.0,
            advisory_lookback: 20,
            advisory_enabled: true,
            bind_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

impl JournalConfig {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let minimum_rr = std::env::var("MINIMUM_RR")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.minimum_rr);

        let advisory_lookback = std::env::var("ADVISORY_LOOKBACK")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.advisory_lookback);

        let advisory_enabled = std::env::var("ADVISORY_ENABLED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.advisory_enabled);

        let bind_addr = std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr);

        Self {
            minimum_rr,
            advisory_lookback,
            advisory_enabled,
            bind_addr,
        }
    }
}
