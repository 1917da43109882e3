use anyhow::{Context, Result};
use biocapture::platform::simulated;
use biocapture::platform::{FsFilePicker, Platform, PlatformInfo};
use biocapture::{
    capture_with_retry, BiocaptureConfig, CaptureSession, Modality, RetryPolicy, SessionError,
    SessionEvent, Transport,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "biocapture")]
#[command(about = "Capture one biometric sample from whatever hardware the host exposes")]
#[command(version)]
#[command(long_about = "Discovers the capture transports available on this host (platform \
authenticator, camera, native bridge, image upload), picks the best one for the requested \
modality and prints the canonically encoded sample as JSON.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "biocapture.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Biometric modality to capture
    #[arg(short, long, default_value = "fingerprint", help = "fingerprint, face or palmprint")]
    modality: Modality,

    /// Force a transport instead of the priority order
    #[arg(short, long, help = "webauthn, camera, native or upload")]
    transport: Option<Transport>,

    /// Image file offered to the upload transport
    #[arg(short, long, value_name = "PATH", help = "Image file to use for upload capture")]
    file: Option<PathBuf>,

    /// List detected devices and exit
    #[arg(long, help = "Detect devices for the modality, print them and exit")]
    list_devices: bool,

    /// Retry budget for retryable failures
    #[arg(long, value_name = "N", help = "Override the configured retry count")]
    retries: Option<u32>,

    /// Write the canonical payload here instead of printing JSON
    #[arg(short, long, value_name = "PATH", help = "Write the Base64 payload to a file")]
    output: Option<PathBuf>,

    /// Pretend the host lacks these transports
    #[arg(long, value_name = "TRANSPORT", num_args = 1.., help = "Transports to hide from detection")]
    simulate_missing: Vec<Transport>,

    /// Report a handheld form factor
    #[arg(long, help = "Simulate a handheld device with a native biometric bridge")]
    handheld: bool,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

const EXIT_FAILED: i32 = 1;
const EXIT_CANCELLED: i32 = 2;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting biocapture v{}", env!("CARGO_PKG_VERSION"));

    let config = BiocaptureConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(EXIT_FAILED);
            }
        }
    }

    let platform = build_platform(&args, &config);
    info!("Host platform: {:?}", platform);

    let mut builder = CaptureSession::builder()
        .config(config.clone())
        .platform(platform);
    if let Some(transport) = args.transport {
        builder = builder.prefer(transport);
    }
    let session = builder.build()?;

    if args.list_devices {
        let devices = session.request_capture(args.modality).await.unwrap_or_default();
        if devices.is_empty() {
            println!("No capture device available for {}", args.modality);
        }
        for device in devices {
            println!("{:<10} {}", device.transport.as_str(), device.display_name);
        }
        return Ok(());
    }

    spawn_event_logger(&session);
    spawn_interrupt_handler(&session);

    let mut policy = RetryPolicy::from(&config.recovery);
    if let Some(retries) = args.retries {
        policy = policy.with_max_retries(retries);
    }

    match capture_with_retry(&session, args.modality, &policy).await {
        Ok(result) => {
            match &args.output {
                Some(path) => {
                    tokio::fs::write(path, &result.canonical_encoding)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Wrote canonical payload to {}", path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&result)?),
            }
            Ok(())
        }
        Err(SessionError::Cancelled) => {
            eprintln!("Capture cancelled");
            std::process::exit(EXIT_CANCELLED);
        }
        Err(e) => {
            match e.capture_error() {
                Some(capture_error) => {
                    eprintln!("✗ {}", capture_error);
                    eprintln!("  {}", capture_error.hint());
                }
                None => eprintln!("✗ {}", e),
            }
            std::process::exit(EXIT_FAILED);
        }
    }
}

/// Simulated host, minus the transports hidden on the command line
fn build_platform(args: &Args, config: &BiocaptureConfig) -> Platform {
    let mut info = PlatformInfo::current();
    if args.handheld {
        info.is_mobile = true;
    }

    let mut platform = simulated::platform(info, config.native.simulated_delay());
    platform = match &args.file {
        Some(path) => platform.with_files(Arc::new(
            FsFilePicker::new(path).with_max_bytes(config.upload.max_bytes),
        )),
        None => platform.with_files(Arc::new(simulated::SimulatedFilePicker::new(None))),
    };

    for transport in &args.simulate_missing {
        match transport {
            Transport::Webauthn => platform.authenticator = None,
            Transport::Camera => platform.media = None,
            Transport::Native => platform.native = None,
            Transport::Upload => platform.files = None,
        }
    }

    platform
}

fn spawn_event_logger(session: &CaptureSession) {
    let mut events = session.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match &event {
                SessionEvent::Failed { error } => {
                    warn!("{} ({})", event.description(), error.hint())
                }
                _ => info!("{}", event.description()),
            }
        }
    });
}

fn spawn_interrupt_handler(session: &CaptureSession) {
    let session = session.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling capture");
            session.cancel().await;
        }
    });
}

fn init_logging(args: &Args) -> Result<()> {
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
        .unwrap_or_else(|_| EnvFilter::new(format!("biocapture={}", log_level)));

    // Logs go to stderr; stdout carries the result
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
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
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer().with_writer(std::io::stderr).boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Biocapture Configuration File");
    println!("# This is the default configuration with all available options");
    println!();
    println!("{}", toml::to_string_pretty(&BiocaptureConfig::default())?);
    Ok(())
}
