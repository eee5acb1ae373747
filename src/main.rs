use anyhow::{Context, Result};
use barcode_bridge::bridge::{serve_lines, Bridge, BridgeNotification, BridgeRequest};
use barcode_bridge::decode::parse_script;
use barcode_bridge::device::ElementRef;
use barcode_bridge::events::ScanEvent;
use barcode_bridge::platform::{DecoderEngine, MockMediaPlatform, ScriptedDecoder};
use barcode_bridge::{BarcodeScanner, BarcodeScannerBuilder, BridgeConfig};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "barcode-bridge")]
#[command(about = "Camera barcode scanning bridge with debounced found/lost events")]
#[command(version)]
#[command(long_about = "Drives a camera and barcode decoder behind a small JSON bridge \
protocol. Successive decode attempts are debounced into BarcodeFound, BarcodeLost and \
DecodeError notifications. Without a real camera backend the bridge runs on a mock \
platform, which the --simulate and --stdio modes use.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "barcode-bridge.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", help = "Write logs to a file through a non-blocking writer")]
    log_file: Option<String>,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// List cameras and exit
    #[arg(long, help = "List video input devices of the mock platform and exit")]
    list_devices: bool,

    /// Replay a decode script and print notifications
    #[arg(
        long,
        value_name = "SCRIPT",
        help = "Comma separated attempts: '-' not found, '!msg' error, 'format:content' or 'content'"
    )]
    simulate: Option<String>,

    /// Delay between simulated frames
    #[arg(long, default_value_t = 50, value_name = "MS", help = "Milliseconds between simulated frames")]
    frame_interval_ms: u64,

    /// Serve bridge requests as JSON lines on stdin/stdout
    #[arg(
        long,
        help = "Read bridge requests from stdin and write responses and notifications to stdout; \
                sessions replay the --simulate script"
    )]
    stdio: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let _log_guard = init_logging(&args)?;

    info!("Starting barcode-bridge v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match BridgeConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    let frame_interval = Duration::from_millis(args.frame_interval_ms);

    if args.list_devices {
        let bridge = mock_bridge(config, Arc::new(ScriptedDecoder::new(Vec::new(), frame_interval)))?;
        let response = bridge.handle(BridgeRequest::ListVideoInputDevices).await;
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if args.stdio {
        // Every session started over stdio replays the --simulate script
        let attempts = args.simulate.as_deref().map(parse_script).unwrap_or_default();
        if attempts.is_empty() {
            warn!("No --simulate script given; stdio sessions will report no decode attempts");
        }
        let bridge = mock_bridge(config, Arc::new(ScriptedDecoder::new(attempts, frame_interval)))?;
        return serve_stdio(bridge).await;
    }

    if let Some(script) = args.simulate.as_deref() {
        return simulate(config, script, frame_interval).await;
    }

    warn!("Nothing to do; pass --simulate, --stdio or --list-devices");
    println!("Nothing to do. See --help for available modes.");
    Ok(())
}

fn mock_bridge(config: BridgeConfig, decoder: Arc<dyn DecoderEngine>) -> Result<Bridge> {
    let scanner: BarcodeScanner = BarcodeScannerBuilder::new()
        .config(config)
        .platform(Arc::new(MockMediaPlatform::with_default_devices()))
        .decoder(decoder)
        .build()
        .context("Failed to build scanner")?;
    Ok(Bridge::new(Arc::new(scanner)))
}

async fn simulate(config: BridgeConfig, script: &str, frame_interval: Duration) -> Result<()> {
    let attempts = parse_script(script);
    info!("Simulating {} decode attempts", attempts.len());

    let decoder = Arc::new(ScriptedDecoder::new(attempts, frame_interval));
    let bridge = mock_bridge(config, decoder.clone())?;

    bridge.scanner().subscribe(|event: &ScanEvent| {
        match serde_json::to_string(&BridgeNotification::from(event)) {
            Ok(line) => println!("{}", line),
            Err(e) => error!("Failed to render notification: {}", e),
        }
    });

    let response = bridge
        .handle(BridgeRequest::StartDecoding {
            video: ElementRef::new("simulator"),
            width: None,
            height: None,
        })
        .await;
    if !response.ok {
        anyhow::bail!("Failed to start decoding: {}", serde_json::to_string(&response)?);
    }

    tokio::select! {
        _ = decoder.wait_finished() => info!("Script replayed"),
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    bridge.handle(BridgeRequest::StopDecoding).await;
    Ok(())
}

async fn serve_stdio(bridge: Bridge) -> Result<()> {
    info!("Serving bridge requests on stdin");
    let stdin = BufReader::new(tokio::io::stdin());

    tokio::select! {
        served = serve_lines(&bridge, stdin, tokio::io::stdout()) => {
            served.context("Bridge serving failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            bridge.handle(BridgeRequest::StopDecoding).await;
        }
    }
    Ok(())
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("barcode_bridge={}", log_level)));

    // stdout carries protocol output, so console logs go to stderr
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .boxed()
        }
    };

    let (file_layer, guard) = match args.log_file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("Invalid log file path: {}", path.display()))?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# barcode-bridge configuration file");
    println!("# Every option is shown with its default value");
    println!("# Environment overrides use BARCODE_BRIDGE_<SECTION>__<KEY>");
    println!();
    println!("{}", BridgeConfig::default().to_toml()?);
    Ok(())
}
