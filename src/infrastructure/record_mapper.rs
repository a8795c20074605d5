// Mapper from battery API records to domain telemetry samples
use crate::domain::telemetry::TelemetrySample;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

/// Plausible cell temperatures in °C; anything else is a sensor fault.
const TEMPERATURE_RANGE: std::ops::RangeInclusive<f64> = -50.0..=150.0;

/// One row as returned by `/api/snapshots`. Every field is optional and
/// numbers may arrive as strings, so only a non-object row fails to decode.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSampleRecord {
    #[serde(default, alias = "time", alias = "recorded_at")]
    pub timestamp: Option<String>,
    #[serde(default, alias = "cycle", alias = "cycle_id", deserialize_with = "cycle")]
    pub cycle_number: Option<u32>,
    #[serde(default, deserialize_with = "number")]
    pub speed: Option<f64>,
    #[serde(default, alias = "temp", deserialize_with = "number")]
    pub temperature: Option<f64>,
    #[serde(default, alias = "state_of_charge", deserialize_with = "number")]
    pub soc: Option<f64>,
    #[serde(default, alias = "state_of_health", deserialize_with = "number")]
    pub soh: Option<f64>,
    #[serde(default, deserialize_with = "number")]
    pub voltage: Option<f64>,
    #[serde(default, deserialize_with = "number")]
    pub current: Option<f64>,
    #[serde(default, alias = "is_warning", deserialize_with = "flag")]
    pub warning: Option<bool>,
    #[serde(default, alias = "is_protection", deserialize_with = "flag")]
    pub protection: Option<bool>,
    #[serde(default, alias = "is_charging", deserialize_with = "flag")]
    pub charging: Option<bool>,
}

#[derive(Debug, Error, PartialEq)]
pub enum RecordRejection {
    #[error("malformed record: {0}")]
    Malformed(String),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("unparseable timestamp `{0}`")]
    BadTimestamp(String),
    #[error("field `{0}` is not a finite number")]
    NotFinite(&'static str),
    #[error("state of charge {0} outside 0..=100")]
    SocOutOfRange(f64),
    #[error("temperature {0} outside the plausible range")]
    TemperatureOutOfRange(f64),
}

/// Numbers arrive as JSON numbers or numeric strings.
fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Cycle numbers sometimes come through as `12.0` or `"12"`.
fn cycle<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(raw
        .filter(|v| v.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(v))
        .map(|v| v as u32))
}

/// Flags arrive as booleans, 0/1 or strings depending on the firmware.
fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // Zone-less timestamps are UTC
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn required(value: Option<f64>, field: &'static str) -> Result<f64, RecordRejection> {
    let v = value.ok_or(RecordRejection::MissingField(field))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(RecordRejection::NotFinite(field))
    }
}

/// Decode and validate one row of a page.
pub fn value_to_sample(value: Value) -> Result<TelemetrySample, RecordRejection> {
    let record: RawSampleRecord =
        serde_json::from_value(value).map_err(|e| RecordRejection::Malformed(e.to_string()))?;
    record_to_sample(&record)
}

pub fn record_to_sample(record: &RawSampleRecord) -> Result<TelemetrySample, RecordRejection> {
    let raw_ts = record
        .timestamp
        .as_deref()
        .ok_or(RecordRejection::MissingField("timestamp"))?;
    let timestamp =
        parse_timestamp(raw_ts).ok_or_else(|| RecordRejection::BadTimestamp(raw_ts.to_string()))?;
    let cycle_id = record
        .cycle_number
        .ok_or(RecordRejection::MissingField("cycle_number"))?;

    let soc = required(record.soc, "soc")?;
    if !(0.0..=100.0).contains(&soc) {
        return Err(RecordRejection::SocOutOfRange(soc));
    }

    let temperature = required(record.temperature, "temperature")?;
    if !TEMPERATURE_RANGE.contains(&temperature) {
        return Err(RecordRejection::TemperatureOutOfRange(temperature));
    }

    let mut sample = TelemetrySample::new(
        timestamp,
        cycle_id,
        // A missing speed reading means the vehicle reported no GPS fix
        record.speed.filter(|v| v.is_finite()).unwrap_or(0.0),
        temperature,
        soc,
        required(record.voltage, "voltage")?,
        required(record.current, "current")?,
    )
    .with_flags(
        record.warning.unwrap_or(false),
        record.protection.unwrap_or(false),
        record.charging.unwrap_or(false),
    );
    if let Some(soh) = record.soh.filter(|v| v.is_finite()) {
        sample = sample.with_soh(soh);
    }
    Ok(sample)
}
