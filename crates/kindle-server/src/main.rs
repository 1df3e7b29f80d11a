//! Kindle - entry point.

use std::path::PathBuf;

use anyhow::Context;
use tracing::{info, warn};

use kindle_config::ConfigLoader;
use kindle_server::Server;
use kindle_telemetry::{init_logging, LogConfig};

/// Environment prefix for configuration overrides.
const ENV_PREFIX: &str = "KINDLE";

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: Option<PathBuf>,
    /// Document root override.
    root: Option<PathBuf>,
    /// Listen address override.
    listen: Option<String>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut parsed = Self {
            config: None,
            root: None,
            listen: None,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => parsed.config = args.next().map(PathBuf::from),
                "--root" | "-r" => parsed.root = args.next().map(PathBuf::from),
                "--listen" | "-l" => parsed.listen = args.next(),
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("kindle {}", kindle_server::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        parsed
    }
}

fn print_help() {
    println!(
        r"Kindle - serves Container Linux Configs as Ignition

USAGE:
    kindle [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML or JSON)
    -r, --root <DIR>       Directory to serve (default: .)
    -l, --listen <ADDR>    Listen address (default: 127.0.0.1:8080)
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    KINDLE__SERVER__LISTEN           Listen address
    KINDLE__SERVER__ROOT             Directory to serve
    KINDLE__SERVER__MAX_BODY_BYTES   Buffer limit per config response, or none
    KINDLE__SERVER__TRUST_REQUEST_ID Reuse incoming X-Request-ID (true/false)
    KINDLE__GATE__STRICT             Reject configs with warnings (true/false)
    KINDLE__GATE__MIME_TYPES         Comma-separated content types to transpile
    KINDLE__GATE__PLATFORM           Target platform for dynamic data
    KINDLE__LOGGING__LEVEL           Log filter (default: info)
    KINDLE__LOGGING__JSON            JSON log output (true/false)

EXAMPLES:
    kindle --config /etc/kindle/kindle.toml
    KINDLE__GATE__PLATFORM=ec2 kindle --root /srv/configs
"
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader
            .with_file(path)
            .with_context(|| format!("loading {}", path.display()))?;
    }
    let mut config = loader
        .with_env_prefix(ENV_PREFIX)
        .load()
        .context("invalid configuration")?;

    if let Some(root) = args.root {
        config.server.root = root;
    }
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }

    init_logging(&LogConfig::new(config.logging.level.clone(), config.logging.json))
        .context("initializing logging")?;

    info!(version = kindle_server::VERSION, "starting kindle");
    if config.server.max_body_bytes.is_none() {
        warn!("response buffering is unbounded");
    }

    let server = Server::new(&config).context("building server")?;
    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("server error")?;

    info!("kindle stopped");
    Ok(())
}
