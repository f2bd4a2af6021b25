use clap::Parser;

/// Runs data driven HTTP API cases against a live service
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the settings file, case files are looked up next to it
    #[arg(short, long, default_value = "ddt/ddt.toml")]
    pub config: String,

    /// Only run these case files, by file name or stem. Can be repeated
    #[arg(long = "case")]
    pub cases: Vec<String>,

    /// Overrides `setup.base_url` from the settings file
    #[arg(long)]
    pub base_url: Option<String>,

    /// Overrides `setup.concurrency`, the number of requests in flight
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Log every case and raw response body to stderr
    #[arg(short, long)]
    pub verbose: bool,
}
