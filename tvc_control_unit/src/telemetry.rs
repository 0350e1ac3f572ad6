//! Per-tick telemetry records.
//!
//! When a [`RecordSink`] is attached to the scheduler it receives one
//! [`TelemetryRecord`] per reply per tick. Without a sink nothing is
//! recorded and the control path is unchanged.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tvc_common::actuator::{ActuatorAddress, ActuatorCommand, ActuatorReply, Mode};

/// Errors raised by a record sink.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Output could not be created or written.
    #[error("telemetry I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One actuator's telemetry and commanded setpoints for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryRecord {
    /// Microseconds since the run started.
    pub timestamp_us: u64,
    /// Reporting actuator.
    pub address: ActuatorAddress,
    /// Reported mode.
    pub mode: Mode,
    /// Reported position [rev].
    pub position: f64,
    /// Reported velocity [rev/s].
    pub velocity: f64,
    /// Reported torque [Nm].
    pub torque: f64,
    /// Reported bus voltage [V].
    pub voltage: f64,
    /// Reported temperature [°C].
    pub temperature: f64,
    /// Reported fault code.
    pub fault: u8,
    /// Commanded velocity [rev/s].
    pub cmd_velocity: f64,
    /// Commanded oscillation amplitude.
    pub cmd_amplitude: f64,
    /// Commanded oscillation phase [rad].
    pub cmd_phase: f64,
}

impl TelemetryRecord {
    /// Combine a reply with the command sent to the same actuator.
    pub fn new(timestamp_us: u64, reply: &ActuatorReply, command: Option<&ActuatorCommand>) -> Self {
        let (cmd_velocity, cmd_amplitude, cmd_phase) = command
            .map(|c| {
                (
                    c.position.velocity,
                    c.position.sinusoidal_amplitude,
                    c.position.sinusoidal_phase,
                )
            })
            .unwrap_or((f64::NAN, f64::NAN, f64::NAN));
        Self {
            timestamp_us,
            address: reply.address,
            mode: reply.mode,
            position: reply.position,
            velocity: reply.velocity,
            torque: reply.torque,
            voltage: reply.voltage,
            temperature: reply.temperature,
            fault: reply.fault,
            cmd_velocity,
            cmd_amplitude,
            cmd_phase,
        }
    }
}

/// Append-only destination for telemetry records.
pub trait RecordSink: Send {
    /// Append one record.
    fn append(&mut self, record: &TelemetryRecord) -> Result<(), TelemetryError>;

    /// Push buffered records to the underlying storage.
    fn flush(&mut self) -> Result<(), TelemetryError>;
}

/// Column names written as the first CSV line.
pub const CSV_HEADER: &str = "timestamp_us,id,bus,mode,position,velocity,torque,voltage,temperature,fault,cmd_velocity,cmd_amplitude,cmd_phase";

/// Buffered CSV writer.
pub struct CsvRecordSink<W: Write + Send = BufWriter<File>> {
    out: W,
    records: u64,
}

impl CsvRecordSink<BufWriter<File>> {
    /// Create (or truncate) `path` and write the header.
    pub fn create(path: &Path) -> Result<Self, TelemetryError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Self::from_writer(BufWriter::new(file))
    }
}

impl<W: Write + Send> CsvRecordSink<W> {
    /// Wrap an arbitrary writer and write the header.
    pub fn from_writer(mut out: W) -> Result<Self, TelemetryError> {
        writeln!(out, "{CSV_HEADER}")?;
        Ok(Self { out, records: 0 })
    }

    /// Records appended so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(mut self) -> Result<W, TelemetryError> {
        self.out.flush()?;
        Ok(self.out)
    }
}

impl<W: Write + Send> RecordSink for CsvRecordSink<W> {
    fn append(&mut self, r: &TelemetryRecord) -> Result<(), TelemetryError> {
        writeln!(
            self.out,
            "{},{},{},{},{:.6},{:.6},{:.6},{:.2},{:.1},{},{:.6},{:.6},{:.6}",
            r.timestamp_us,
            r.address.id,
            r.address.bus,
            r.mode.code(),
            r.position,
            r.velocity,
            r.torque,
            r.voltage,
            r.temperature,
            r.fault,
            r.cmd_velocity,
            r.cmd_amplitude,
            r.cmd_phase,
        )?;
        self.records += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TelemetryError> {
        self.out.flush()?;
        Ok(())
    }
}
