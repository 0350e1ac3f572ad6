//! # TVC Control Unit
//!
//! Runs one control policy on the thrust-vectoring rig.
//!
//! Loads the rig TOML, performs RT setup, wires the simulated actuator bus
//! and RC receiver, builds the configured policy and enters the fixed-period
//! loop until the policy completes or SIGINT/SIGTERM requests a stop.

use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;
use tvc_common::config::LogLevel;
use tvc_common::consts::DEFAULT_CONFIG_PATH;
use tvc_control_unit::config::{RigConfig, build_policy};
use tvc_control_unit::cycle::CycleScheduler;
use tvc_control_unit::pwm::RcChannels;
use tvc_control_unit::rt::{pin_current_thread, rt_setup};
use tvc_control_unit::telemetry::CsvRecordSink;
use tvc_hal::{SimulatedBus, SimulatedBusConfig, SimulatedGpio};

/// TVC Control Unit: fixed-period rig control loop
#[derive(Parser, Debug)]
#[command(name = "tvc_control_unit")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Fixed-period control loop for the thrust-vectoring actuator rig")]
struct Args {
    /// Path to the rig configuration TOML.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Write per-tick telemetry to this CSV file (overrides [telemetry]).
    #[arg(long, value_name = "PATH")]
    csv: Option<PathBuf>,

    /// CPU core to pin the control thread to (overrides [rt].main_cpu).
    #[arg(long)]
    cpu_core: Option<usize>,

    /// SCHED_FIFO priority (overrides [rt].priority).
    #[arg(long)]
    rt_priority: Option<i32>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let config = RigConfig::from_file(&args.config);
    let level = config
        .as_ref()
        .map(|c| c.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, level);

    info!("TVC Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("FATAL: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run(&args, config) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("TVC Control Unit shutdown complete");
}

fn run(args: &Args, config: RigConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "Config OK: service={}, period={}s, actuators={}, policy={}",
        config.shared.service_name,
        config.cycle.period_s,
        config.actuators.len(),
        config.policy.kind()
    );

    // RC receiver. Pins are only claimed when the policy reads them.
    let channels = RcChannels::new();
    let mut gpio = SimulatedGpio::new();
    if config.policy.uses_pwm() {
        channels.attach(&mut gpio, config.pwm.as_array())?;
        gpio.start()?;
        info!("RC receiver attached on pins {:?}", config.pwm.as_array());
    }

    // Configuration errors end the process here, before anything moves.
    let mut policy = build_policy(&config.policy, &channels)?;

    let cpu = args.cpu_core.unwrap_or(config.rt.main_cpu);
    let priority = args.rt_priority.unwrap_or(config.rt.priority);
    rt_setup(cpu, priority)?;
    info!("RT setup complete (cpu_core={}, priority={})", cpu, priority);

    let bus_cpu = config.rt.bus_cpu;
    let bus = SimulatedBus::spawn(
        &config.actuators,
        SimulatedBusConfig {
            worker_hook: Some(Box::new(move || {
                if let Err(e) = pin_current_thread(bus_cpu) {
                    warn!("Bus worker pinning to CPU {} failed: {}", bus_cpu, e);
                }
            })),
            ..SimulatedBusConfig::default()
        },
    )?;

    let mut scheduler =
        CycleScheduler::new(config.cycle.scheduler_config()?, &config.actuators, bus)?;
    if let Some(path) = args.csv.as_ref().or(config.telemetry.csv_path.as_ref()) {
        scheduler = scheduler.with_record_sink(Box::new(CsvRecordSink::create(path)?));
        info!("Recording telemetry to {}", path.display());
    }

    let stop = scheduler.stop_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        stop.request();
    })?;

    let report = scheduler.run(policy.as_mut())?;
    info!(
        "Run finished: {:?} after {} ticks, {} skipped, max dispatch wait {:?}",
        report.exit, report.ticks, report.skipped_cycles, report.max_dispatch_wait
    );
    if report.skipped_cycles > 0 {
        warn!("{} cycles skipped during the run", report.skipped_cycles);
    }

    scheduler.shutdown()?;
    gpio.stop();
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::from(configured)
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
