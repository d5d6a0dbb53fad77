use chrono::{DateTime, Local};
use serde::Serialize;

/// Timestamp layout shared by the session CSVs and the live readout, chosen
/// so external consumers can parse rows without caring which file they came
/// from.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Header row written at the top of every session CSV and the rolling file.
pub const CSV_HEADER: &str = "timestamp,heart_rate,breathing_rate,temperature,humidity,pressure";

/// One completed acquisition cycle: radar vitals merged with the most
/// recent environmental snapshot. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VitalsSample {
    pub timestamp: DateTime<Local>,
    /// Beats per minute.
    pub heart_rate: f64,
    /// Breaths per minute.
    pub breathing_rate: f64,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity, percent.
    pub humidity: f64,
    /// Hectopascals.
    pub pressure: f64,
}

impl VitalsSample {
    /// Render the sample as one CSV row (no trailing newline), in the column
    /// order of [`CSV_HEADER`].
    pub fn csv_row(&self) -> String {
        format!(
            "{},{:.2},{:.2},{:.2},{:.2},{:.2}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.heart_rate,
            self.breathing_rate,
            self.temperature,
            self.humidity,
            self.pressure,
        )
    }

    /// The live-readout line uses the identical layout to the CSV rows.
    pub fn live_line(&self) -> String {
        self.csv_row()
    }
}
