use clap::{Parser, Subcommand};
use lx90_mount::config::ConfigLoader;
use lx90_mount::{logging, AxisRole, GuideDirection, MountDriver};
use serde_json::json;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

const WAIT_STEP: Duration = Duration::from_millis(10);

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Manual test harness for Meade #497 (LX90/ETX) mounts.",
    long_about = "Connects to the mount on the configured serial port, runs one command and disconnects. Status and position are printed as JSON."
)]
struct Args {
    /// Configuration file. Defaults to the standard search path.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port, overriding the configuration.
    #[arg(short, long)]
    port: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print axis states and flags.
    Status,
    /// Print RA/Dec, Alt/Az, sidereal time, site and handbox clock.
    Position,
    /// Start a goto to RA (hours) / Dec (degrees).
    Goto {
        #[arg(long)]
        ra: f64,
        #[arg(long, allow_hyphen_values = true)]
        dec: f64,
        /// Block until the mount stops slewing.
        #[arg(long)]
        wait: bool,
    },
    /// Start a goto to azimuth / altitude in degrees.
    GotoAltaz {
        #[arg(long)]
        az: f64,
        #[arg(long, allow_hyphen_values = true)]
        alt: f64,
        #[arg(long)]
        wait: bool,
    },
    /// Move one axis at a rate for a while, then stop.
    Move {
        #[arg(long)]
        axis: AxisRole,
        /// Degrees per second; negative moves east or south.
        #[arg(long, allow_hyphen_values = true)]
        rate: f64,
        /// How long to move before stopping.
        #[arg(long, default_value = "1", value_parser = parse_seconds)]
        seconds: Duration,
    },
    /// Issue one or more pulse guides and time them.
    Guide {
        #[arg(long)]
        direction: GuideDirection,
        #[arg(long)]
        ms: i64,
        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },
    /// Stop all motion.
    Abort,
    /// Park the mount. It must be power cycled afterwards.
    Park,
    /// Sync the mount to RA (hours) / Dec (degrees).
    Sync {
        #[arg(long)]
        ra: f64,
        #[arg(long, allow_hyphen_values = true)]
        dec: f64,
    },
    /// Print the effective configuration, or write it to a file.
    Config {
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut loader = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    if let Some(port) = args.port {
        loader.config_mut().serial.port = port;
    }
    let _guard = logging::init(&loader.config().logging)?;

    if let Command::Config { write } = &args.command {
        match write {
            Some(path) => {
                loader.save_to(path)?;
                println!("Configuration written to {}", path.display());
            }
            None => print!("{}", toml::to_string_pretty(loader.config())?),
        }
        return Ok(());
    }

    let driver = MountDriver::new(loader.into_config())?;
    driver.connect_default()?;
    run(&driver, args.command)
}

fn run(driver: &MountDriver, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&driver.status()?)?);
        }
        Command::Position => {
            let report = json!({
                "position": driver.position()?,
                "utc": driver.utc_date()?,
                "site_latitude": driver.site_latitude()?,
                "site_longitude": driver.site_longitude()?,
                "alignment": driver.alignment_mode()?,
                "optics": driver.optics(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Goto { ra, dec, wait } => {
            driver.slew_to_coordinates_async(ra, dec)?;
            if wait {
                wait_for_slew(driver)?;
            }
        }
        Command::GotoAltaz { az, alt, wait } => {
            driver.slew_to_altaz_async(az, alt)?;
            if wait {
                wait_for_slew(driver)?;
            }
        }
        Command::Move {
            axis,
            rate,
            seconds,
        } => {
            driver.move_axis(axis, rate)?;
            thread::sleep(seconds);
            driver.stop_move_axis(axis)?;
        }
        Command::Guide {
            direction,
            ms,
            repeat,
        } => {
            for attempt in 1..=repeat {
                let started = Instant::now();
                driver.pulse_guide(direction, ms)?;
                while driver.is_pulse_guiding()? {
                    thread::sleep(WAIT_STEP);
                }
                println!(
                    "guide {attempt}/{repeat} {direction} {ms} ms finished after {} ms",
                    started.elapsed().as_millis()
                );
            }
        }
        Command::Abort => driver.abort_slew()?,
        Command::Park => {
            driver.park()?;
            println!("Parked. Power cycle the mount before reconnecting.");
        }
        Command::Sync { ra, dec } => driver.sync_to_coordinates(ra, dec)?,
        Command::Config { .. } => {}
    }
    Ok(())
}

fn wait_for_slew(driver: &MountDriver) -> Result<(), Box<dyn std::error::Error>> {
    let started = Instant::now();
    while driver.is_slewing()? {
        thread::sleep(Duration::from_millis(500));
        info!(
            tag = "Goto",
            "slewing for {} s",
            started.elapsed().as_secs()
        );
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&driver.position()?)?
    );
    Ok(())
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number of seconds"))?;
    Duration::try_from_secs_f64(seconds)
        .map_err(|_| format!("'{value}' must be a finite, non-negative number of seconds"))
}
