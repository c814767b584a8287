//! FlightLink Node
//!
//! Process wrapper around `flightlink-core`:
//!
//! 1. **Bootstrap**: loads the local private key. A missing or invalid key
//!    is fatal and the process exits non-zero before doing anything else.
//!
//! 2. **run**: keeps the peer directory (and, when configured, this
//!    service's own configuration) fresh in the background until Ctrl-C.
//!
//! 3. **seal / open**: encrypts a payload for a peer and prints the
//!    envelope plus destination queue as JSON, or decrypts an envelope read
//!    from a file or stdin. Delivery is left to an external transport.
//!
//! Logs go to stderr so stdout carries only command output.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::WrapErr;
use flightlink_core::config::{
    DEFAULT_CONFIG_SERVER_URL, DEFAULT_LOCAL_PEER_ID, DEFAULT_MAX_RECORD_AGE_SECS,
    DEFAULT_PRIVATE_KEY_PATH, DEFAULT_REFRESH_INTERVAL_SECS, DEFAULT_SERVICE_NAME,
};
use flightlink_core::{
    CipherConfig, ConfigServerConfig, DirectoryConfig, FlightLinkConfig, KeyWrapScheme,
};

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "flightlink", version, about = "FlightLink secure envelope node")]
struct Args {
    /// Participant directory base URL
    #[arg(long, default_value = "http://localhost:8080", env = "FLIGHTLINK_DIRECTORY_URL")]
    directory_url: String,

    /// Bearer token for the participant directory
    #[arg(long, env = "FLIGHTLINK_DIRECTORY_TOKEN", hide_env_values = true)]
    directory_token: Option<String>,

    /// This service's peer id (IATA code)
    #[arg(long, default_value = DEFAULT_LOCAL_PEER_ID, env = "FLIGHTLINK_PEER_ID")]
    peer_id: String,

    /// Directory sweep interval in seconds
    #[arg(long, default_value_t = DEFAULT_REFRESH_INTERVAL_SECS, env = "FLIGHTLINK_DIRECTORY_REFRESH_SECS")]
    refresh_secs: u64,

    /// Revalidate records older than this on lookup (0 disables)
    #[arg(long, default_value_t = DEFAULT_MAX_RECORD_AGE_SECS, env = "FLIGHTLINK_DIRECTORY_MAX_AGE_SECS")]
    max_record_age_secs: u64,

    /// Fetch own configuration from this config server
    #[arg(long, env = "FLIGHTLINK_CONFIG_SERVER_URL")]
    config_server_url: Option<String>,

    /// Application name on the config server
    #[arg(long, default_value = DEFAULT_SERVICE_NAME, env = "FLIGHTLINK_SERVICE_NAME")]
    service_name: String,

    /// Config server client id
    #[arg(long, env = "FLIGHTLINK_CLIENT_ID")]
    client_id: Option<String>,

    /// Config server client secret
    #[arg(long, env = "FLIGHTLINK_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Local RSA private key (PKCS#1 or PKCS#8 PEM)
    #[arg(long, default_value = DEFAULT_PRIVATE_KEY_PATH, env = "FLIGHTLINK_PRIVATE_KEY_PATH")]
    private_key: PathBuf,

    /// Key wrap scheme: pkcs1v15 or oaep-sha256
    #[arg(long, default_value = "pkcs1v15", env = "FLIGHTLINK_KEY_WRAP")]
    key_wrap: KeyWrapScheme,

    /// Emit logs as JSON
    #[arg(long, env = "FLIGHTLINK_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Keep the peer directory fresh until interrupted
    Run,

    /// Encrypt a payload for a peer and print the envelope as JSON
    Seal(commands::SealArgs),

    /// Decrypt an envelope and print its payload
    Open(commands::OpenArgs),
}

impl Args {
    fn core_config(&self) -> FlightLinkConfig {
        let refresh_interval = std::time::Duration::from_secs(self.refresh_secs);

        FlightLinkConfig {
            directory: DirectoryConfig {
                base_url: self.directory_url.clone(),
                bearer_token: self.directory_token.clone().filter(|t| !t.is_empty()),
                local_peer_id: self.peer_id.clone(),
                refresh_interval,
                max_record_age: (self.max_record_age_secs > 0)
                    .then(|| std::time::Duration::from_secs(self.max_record_age_secs)),
            },
            cipher: CipherConfig {
                key_wrap: self.key_wrap,
                private_key_path: self.private_key.clone(),
            },
            config_server: self.config_server_url.as_ref().map(|url| ConfigServerConfig {
                url: url.clone(),
                service_name: self.service_name.clone(),
                client_id: self.client_id.clone(),
                client_secret: self.client_secret.clone(),
                refresh_interval,
            }),
        }
    }
}

// ── Entry Point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    init_tracing(args.log_json);

    let config = args.core_config();
    if let Some(ref server) = config.config_server {
        tracing::debug!(url = %server.url, service = %server.service_name, "Config server enabled");
    } else {
        tracing::debug!(default_url = DEFAULT_CONFIG_SERVER_URL, "No config server configured");
    }

    let link = flightlink_core::FlightLink::bootstrap(config).wrap_err("Bootstrap failed")?;

    match args.command {
        Command::Run => commands::run(&link).await,
        Command::Seal(seal) => commands::seal(&link, seal).await,
        Command::Open(open) => commands::open(&link, open),
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "flightlink_node=info,flightlink_core=info".into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
