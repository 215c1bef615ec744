use clap::Parser;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "rategate")]
#[command(about = "Request throttling and account lockout gate")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Rate limit max requests per window
    #[arg(long, default_value_t = 100)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, default_value_t = 60)]
    pub rate_window: u64,

    // Key prefix for the middleware's counters
    #[arg(long, default_value = "api")]
    pub rate_prefix: String,

    // Seconds between background sweeps of expired entries
    #[arg(long, default_value_t = 60)]
    pub sweep_interval: u64,
}
