//! Engine-wide tunables, parsed via `clap` derive for the demo binary. The
//! library itself never reaches for global state: every constructor here
//! takes its configuration as plain arguments, the way the teacher builds
//! `AppState` from a path argument rather than a global.

use clap::Args;

#[derive(Debug, Clone, Args)]
pub struct EngineConfig {
    /// Run the auditor after every state-changing Coordinator call. Off by
    /// default in a hot loop; the demo binary turns it on.
    #[arg(long, default_value_t = true)]
    pub audit_every_call: bool,

    /// Starting deposit (in cents) credited to each user the demo CLI
    /// seeds with `--seed-user`.
    #[arg(long, default_value_t = 10_000)]
    pub seed_deposit_cents: i64,

    /// `tracing` log level for the demo binary.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Worst-case price (cents) a caller may post when simulating an
    /// "aggressive" buy fill, since market orders aren't supported (spec
    /// §4.2.2): a contract never prices above $1.00, so 100 cents always
    /// crosses every resting ask.
    #[arg(long, default_value_t = 100)]
    pub aggressive_buy_ceiling_cents: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            audit_every_call: true,
            seed_deposit_cents: 10_000,
            log_level: "info".to_string(),
            aggressive_buy_ceiling_cents: 100,
        }
    }
}
