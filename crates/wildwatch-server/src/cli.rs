//! Command line interface

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "wildwatch-server")]
#[command(about = "Wildlife threat detection service", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "wildwatch.yaml")]
    pub config: String,

    /// Listen address
    #[arg(short = 'l', long, default_value = "0.0.0.0")]
    pub listen: String,

    /// Listen port
    #[arg(short = 'P', long, default_value = "8000")]
    pub port: u16,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Store backend: `memory`, `disabled`, or a path to a JSONL journal
    #[arg(short, long)]
    pub store: Option<String>,

    /// Ranger phone number that receives alerts
    #[arg(short, long, env = "RANGER_PHONE")]
    pub recipient: Option<String>,

    /// Twilio account SID
    #[arg(long, env = "TWILIO_ACCOUNT_SID", hide_env_values = true)]
    pub twilio_account_sid: Option<String>,

    /// Twilio auth token
    #[arg(long, env = "TWILIO_AUTH_TOKEN", hide_env_values = true)]
    pub twilio_auth_token: Option<String>,

    /// Twilio sender number
    #[arg(long, env = "TWILIO_PHONE_NUMBER")]
    pub twilio_phone_number: Option<String>,
}
