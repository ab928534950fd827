use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum, ValueHint};

use ddc_osd_control::command::Command;
use ddc_osd_control::config::Config;
use ddc_osd_control::control::AudioFeedback;
use ddc_osd_control::monitor::{Action, DisplayBackend, DisplayHandle, DisplayManager, OsdEvent};
use ddc_osd_control::protocols::ddc_ci::DdcHiChannel;
use ddc_osd_control::protocols::direct::DirectTransport;
use ddc_osd_control::protocols::framed::FramedTransport;
use ddc_osd_control::protocols::retry::RetryPolicy;
use ddc_osd_control::quantize::{Direction, Quantizer};
use ddc_osd_control::store::{MemoryStore, PollingMode};

#[macro_use]
extern crate tracing;

#[derive(Parser, Debug)]
#[command(name = "ddc-osd", version, about = "Monitor volume and brightness over DDC/CI")]
struct Cli {
    /// Index of the display, as printed by `list`
    #[arg(short, long, default_value_t = 0)]
    display: usize,

    /// Drive the display through this i2c-dev node with checksum framing
    #[arg(long, value_hint = ValueHint::FilePath)]
    i2c_bus: Option<PathBuf>,

    /// Step by one raw unit instead of one chiclet
    #[arg(long)]
    small: bool,

    /// Ring the terminal bell as volume feedback
    #[arg(long)]
    feedback: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List DDC/CI displays
    List,
    /// Toggle speaker mute
    Mute,
    /// Step speaker volume
    Volume {
        #[arg(value_enum)]
        direction: Step,
    },
    /// Step brightness
    Brightness {
        #[arg(value_enum)]
        direction: Step,
    },
    /// Write a register, e.g. `set contrast 50` or `set 0x10 30`
    Set { command: Command, value: u16 },
    /// Read a register from the display into the values file
    Sync { command: Command },
    /// Set how hard a register is polled (none, minimal, normal, heavy, custom)
    Polling {
        command: Command,
        mode: PollingMode,
        /// Read tries for the custom mode
        #[arg(default_value_t = 0)]
        count: u16,
    },
    /// Hide the monitor's own OSD
    HideOsd,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Step {
    Up,
    Down,
}

impl From<Step> for Direction {
    fn from(step: Step) -> Self {
        match step {
            Step::Up => Direction::Up,
            Step::Down => Direction::Down,
        }
    }
}

impl Cmd {
    fn action(&self, small_increment: bool) -> Option<Action> {
        let action = match *self {
            Cmd::List => return None,
            Cmd::Mute => Action::ToggleMute,
            Cmd::Volume { direction } => Action::StepVolume {
                direction: direction.into(),
                small_increment,
            },
            Cmd::Brightness { direction } => Action::StepBrightness {
                direction: direction.into(),
                small_increment,
            },
            Cmd::Set { command, value } => Action::SetValue { command, value },
            Cmd::Sync { command } => Action::Sync(command),
            Cmd::Polling {
                command,
                mode,
                count,
            } => Action::SetPolling {
                command,
                mode,
                count,
            },
            Cmd::HideOsd => Action::HideOsd,
        };
        Some(action)
    }

    /// Registers read back from the display before the action runs
    fn syncs(&self) -> &'static [Command] {
        match self {
            Cmd::Mute | Cmd::Volume { .. } => {
                &[Command::AudioSpeakerVolume, Command::AudioMuteScreenBlank]
            }
            Cmd::Brightness { .. } => &[Command::Brightness, Command::Contrast],
            _ => &[],
        }
    }
}

/// Rings the terminal bell when asked for a feedback cue
struct BellFeedback {
    enabled: bool,
}

impl AudioFeedback for BellFeedback {
    fn is_system_feedback_enabled(&self) -> bool {
        self.enabled
    }

    fn play_feedback_cue(&self) {
        let mut stderr = std::io::stderr();
        let _ = stderr.write_all(b"\x07");
        let _ = stderr.flush();
    }
}

fn setup_logs() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new(format!(
        "warn,{}=warn",
        env!("CARGO_CRATE_NAME")
    )));

    if let Ok(journal_layer) = tracing_journald::layer() {
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .with(journal_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .init();
    }
}

#[cfg(target_os = "linux")]
fn framed_transport(path: Option<&Path>, policy: RetryPolicy) -> anyhow::Result<Option<FramedTransport>> {
    use ddc_osd_control::protocols::i2c_dev::I2cDevBus;

    let Some(path) = path else {
        return Ok(None);
    };
    let bus = I2cDevBus::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(Some(FramedTransport::new(Box::new(bus), policy)))
}

#[cfg(not(target_os = "linux"))]
fn framed_transport(path: Option<&Path>, _policy: RetryPolicy) -> anyhow::Result<Option<FramedTransport>> {
    match path {
        Some(path) => bail!("i2c-dev is not available here: {}", path.display()),
        None => Ok(None),
    }
}

/// One OSD line: command, chiclet bar and raw value
fn render(quantizer: &Quantizer, event: &OsdEvent) -> String {
    let position = quantizer.chiclet_from_value(event.value, event.max);
    let filled = if event.round_chiclet {
        position.round()
    } else {
        position.floor()
    } as usize;
    let total = usize::from(quantizer.chiclet_count());
    let filled = filled.min(total);

    format!(
        "{:<24} [{}{}] {}/{}",
        event.command,
        "#".repeat(filled),
        "-".repeat(total - filled),
        event.value,
        event.max
    )
}

fn load_values(path: Option<&Path>) -> MemoryStore {
    let Some(path) = path else {
        warn!("no config directory, values will not be persisted");
        return MemoryStore::new();
    };
    match MemoryStore::load(path) {
        Ok(store) => store,
        Err(e) => {
            error!("errors loading values {}: {}", path.display(), e);
            MemoryStore::new()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logs();
    let cli = Cli::parse();

    let mut channels = tokio::task::spawn_blocking(DdcHiChannel::enumerate).await?;

    let Some(action) = cli.command.action(cli.small) else {
        for (index, channel) in channels.iter().enumerate() {
            println!("{}: {} ({})", index, channel.name(), channel.id());
        }
        return Ok(());
    };

    if cli.display >= channels.len() {
        bail!(
            "display {} not found, {} DDC/CI displays detected",
            cli.display,
            channels.len()
        );
    }
    let channel = channels.swap_remove(cli.display);
    let id = channel.id();
    let name = channel.name();

    let config = Config::load();
    let quantizer = Quantizer::new(config.chiclet_count);

    let framed = framed_transport(cli.i2c_bus.as_deref(), config.framed.clone())?;
    let direct = DirectTransport::new(Box::new(channel), config.direct.clone());
    let backend =
        tokio::task::spawn_blocking(move || DisplayBackend::select(framed, direct)).await?;

    let values_path = MemoryStore::default_path();
    let mut values = load_values(values_path.as_deref());

    let (manager, mut osd_events) = DisplayManager::new(
        config,
        Arc::new(BellFeedback {
            enabled: cli.feedback,
        }),
    );
    manager
        .register(DisplayHandle::new(id.clone(), name, backend), values.partition(&id))
        .await;

    for &command in cli.command.syncs() {
        if let Err(e) = manager.run(&id, Action::Sync(command)).await {
            warn!("could not read {} from {}: {}", command, id, e);
        }
    }

    let result = manager.run(&id, action).await;

    while let Ok(event) = osd_events.try_recv() {
        println!("{}", render(&quantizer, &event));
    }

    values.merge(manager.unregister(&id).await?);
    if let Some(path) = values_path {
        values
            .save(&path)
            .with_context(|| format!("saving {}", path.display()))?;
    }

    result.with_context(|| format!("{:?} on {}", action, id))
}
