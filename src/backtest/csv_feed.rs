use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::error::EngineError;
use crate::models::Bar;
use crate::Result;

/// Row layout of a daily OHLCV export; extra columns are ignored
#[derive(Debug, Deserialize)]
struct BarRow {
    #[serde(rename = "Date Time", alias = "timestamp", alias = "date", alias = "Date")]
    timestamp: String,
    #[serde(rename = "Open", alias = "open")]
    open: f64,
    #[serde(rename = "High", alias = "high")]
    high: f64,
    #[serde(rename = "Low", alias = "low")]
    low: f64,
    #[serde(rename = "Close", alias = "close")]
    close: f64,
    #[serde(rename = "Volume", alias = "volume", default)]
    volume: f64,
}

/// Load bars from a CSV file, oldest first
pub fn load_bars(path: &Path) -> Result<Vec<Bar>> {
    let file = File::open(path).map_err(|e| {
        EngineError::Feed(format!("cannot open {}: {}", path.display(), e))
    })?;
    let bars = read_bars(BufReader::new(file))?;

    tracing::info!("Loaded {} bars from {}", bars.len(), path.display());
    Ok(bars)
}

/// Parse bars from any CSV source
///
/// Timestamps must be strictly increasing; a repeated or earlier row halts
/// the load with `OutOfOrderBar`.
pub fn read_bars<R: io::Read>(reader: R) -> Result<Vec<Bar>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut bars: Vec<Bar> = Vec::new();

    for (line, result) in csv_reader.deserialize::<BarRow>().enumerate() {
        let row = result?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| {
            EngineError::Feed(format!(
                "row {}: unrecognized timestamp '{}'",
                line + 1,
                row.timestamp
            ))
        })?;

        if let Some(previous) = bars.last() {
            if timestamp <= previous.timestamp {
                return Err(EngineError::OutOfOrderBar {
                    previous: previous.timestamp.to_rfc3339(),
                    current: timestamp.to_rfc3339(),
                });
            }
        }

        let bar = Bar {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        };
        validate_row(&bar, line + 1)?;
        bars.push(bar);
    }

    Ok(bars)
}

fn validate_row(bar: &Bar, line: usize) -> Result<()> {
    let prices = [bar.open, bar.high, bar.low, bar.close];
    if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
        return Err(EngineError::Feed(format!(
            "row {}: prices must be positive",
            line
        )));
    }
    if bar.high < bar.low {
        return Err(EngineError::Feed(format!(
            "row {}: high {} below low {}",
            line, bar.high, bar.low
        )));
    }
    Ok(())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
