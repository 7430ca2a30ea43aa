use clap::Parser;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(version)]
#[command(
    about = "Keeps the hardware watchdog alive while health-check probes pass",
    long_about = None
)]
pub struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, env = "VIGIL_CONFIG")]
    pub config: String,

    /// Don't touch the watchdog device; log kicks instead
    #[arg(long)]
    pub dry_run: bool,
}
