//! tactile-pad
//!
//! Replays a key script through the input engine and reports what each
//! key did. Gestures go to a dry-run host that logs them, or on Windows
//! with `--inject` to real touch injection.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::runtime::Handle;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tactile_pad::app::{HostCapabilities, InputController, parse_script, replay};
use tactile_pad::config::Settings;
use tactile_pad::domain::core::{DisplayInfo, Rotation, ScreenDimensions};
use tactile_pad::gesture::{
    PointerInjector, PrivilegedConnection, PrivilegedHost, ServiceStatus, StrokeDispatcher,
};
use tactile_pad::platform::tracing_host::TracingHost;

const DEFAULT_WIDTH: u32 = 1920;
const DEFAULT_HEIGHT: u32 = 1080;

/// Replays a key script through the grid and cursor engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Screen width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Screen height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Screen rotation in degrees (0, 90, 180, 270)
    #[arg(long, default_value_t = 0)]
    rotation: u32,

    /// Route gestures through privileged pointer injection
    #[arg(long, default_value_t = false)]
    privileged: bool,

    /// Inject real touch input instead of logging gestures (Windows only)
    #[arg(long, default_value_t = false)]
    inject: bool,

    /// Key script to replay
    script: PathBuf,
}

/// Gesture host chosen on the command line
trait Host: StrokeDispatcher + PointerInjector {
    fn dispatcher(self: Arc<Self>) -> Arc<dyn StrokeDispatcher>;

    fn injector(self: Arc<Self>) -> Arc<dyn PointerInjector>;

    /// Logs what the host did once the script is over
    fn report(&self);
}

impl Host for TracingHost {
    fn dispatcher(self: Arc<Self>) -> Arc<dyn StrokeDispatcher> {
        self
    }

    fn injector(self: Arc<Self>) -> Arc<dyn PointerInjector> {
        self
    }

    fn report(&self) {
        let summary = self.summary();
        info!(
            gestures = summary.gestures,
            pointer_events = summary.pointer_events,
            "dry run finished"
        );
    }
}

#[cfg(windows)]
impl Host for tactile_pad::platform::win32::TouchInjectionHost {
    fn dispatcher(self: Arc<Self>) -> Arc<dyn StrokeDispatcher> {
        self
    }

    fn injector(self: Arc<Self>) -> Arc<dyn PointerInjector> {
        self
    }

    fn report(&self) {
        info!("touch injection finished");
    }
}

#[cfg(windows)]
fn injection_host() -> Result<(Arc<dyn Host>, Option<DisplayInfo>)> {
    use tactile_pad::platform::win32::{TouchInjectionHost, primary_display};

    let host = TouchInjectionHost::initialize().context("Touch injection unavailable")?;
    Ok((Arc::new(host), Some(primary_display())))
}

#[cfg(not(windows))]
fn injection_host() -> Result<(Arc<dyn Host>, Option<DisplayInfo>)> {
    bail!("--inject needs Windows touch injection")
}

fn display_from_args(args: &CliArgs, detected: Option<DisplayInfo>) -> Result<DisplayInfo> {
    let Some(rotation) = Rotation::from_degrees(args.rotation) else {
        bail!("Rotation must be 0, 90, 180 or 270, got {}", args.rotation);
    };
    let detected = detected.map(|info| info.dimensions);
    let width = args
        .width
        .or(detected.map(|d| d.width()))
        .unwrap_or(DEFAULT_WIDTH);
    let height = args
        .height
        .or(detected.map(|d| d.height()))
        .unwrap_or(DEFAULT_HEIGHT);
    Ok(DisplayInfo::new(ScreenDimensions::new(width, height), rotation))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    let mut settings = match &args.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if args.privileged {
        settings.privileged_enabled = true;
    }

    let source = std::fs::read_to_string(&args.script)
        .with_context(|| format!("Failed to read script {}", args.script.display()))?;
    let steps = parse_script(&source)?;

    let (host, detected): (Arc<dyn Host>, Option<DisplayInfo>) = if args.inject {
        injection_host()?
    } else {
        (Arc::new(TracingHost::new(true)), None)
    };
    let display = display_from_args(&args, detected)?;

    let privileged = args.privileged.then(|| {
        let connection = Arc::new(PrivilegedConnection::new());
        connection.set_status(ServiceStatus::Ready);
        PrivilegedHost {
            connection,
            injector: host.clone().injector(),
        }
    });

    let controller = InputController::new(
        Handle::current(),
        settings,
        display,
        HostCapabilities {
            dispatcher: host.clone().dispatcher(),
            privileged,
        },
    );
    info!(steps = steps.len(), script = %args.script.display(), "replaying key script");

    let summary = replay(&controller, &steps).await;
    controller.shutdown();
    controller.gestures().close().await;

    info!(
        events = summary.events,
        consumed = summary.consumed,
        "script finished"
    );
    host.report();
    Ok(())
}
