// Cycle metrics - Per-cycle statistics computed from the sample table

use super::options::{AnalyticsOptions, BucketWidth};
use super::telemetry::{Cycle, CycleId, TelemetrySample};
use chrono::{DateTime, Utc};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;
const MILLIS_PER_MINUTE: f64 = 60_000.0;
/// Readings beyond the last bin are folded into it.
const MAX_TEMPERATURE_BINS: usize = 200;

/// Mean, minimum and maximum of one measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryStats {
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

impl SummaryStats {
    /// `None` when the iterator is empty.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        if count == 0 {
            return None;
        }
        Some(Self {
            average: sum / count as f64,
            min,
            max,
        })
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleBounds {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CycleBounds {
    pub fn duration_hours(&self) -> f64 {
        hours_between(self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceStats {
    pub distance_km: f64,
    pub average_speed: Option<f64>,
    pub max_speed: Option<f64>,
    /// Zero distance over a non-empty cycle usually means GPS dropped out.
    pub possible_data_gap: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    pub minutes: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureDistribution {
    pub bucket_width: BucketWidth,
    pub average: Option<f64>,
    pub bins: Vec<TemperatureBin>,
}

impl TemperatureDistribution {
    pub fn total_count(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SohStats {
    pub average: f64,
    pub min: f64,
    /// First minus last reading in time order.
    pub drop: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElectricalStats {
    pub voltage_avg: f64,
    pub voltage_min: f64,
    pub voltage_max: f64,
    pub voltage_range: f64,
    pub current_avg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlertCounts {
    pub warnings: usize,
    pub protections: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargePattern {
    Normal,
    DeepDischarge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChargingInstance {
    pub started_at: DateTime<Utc>,
    pub start_soc: f64,
    /// Lowest SOC seen since the previous charge ended (or the cycle began).
    pub lowest_soc_before: f64,
    pub deep_discharge: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChargingInsights {
    pub instances: Vec<ChargingInstance>,
    pub average_start_soc: Option<f64>,
    pub pattern: ChargePattern,
}

impl ChargingInsights {
    pub fn count(&self) -> usize {
        self.instances.len()
    }

    pub fn deep_discharge_count(&self) -> usize {
        self.instances.iter().filter(|i| i.deep_discharge).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleMetrics {
    pub cycle_id: CycleId,
    pub has_data: bool,
    pub data_points: usize,
    pub bounds: Option<CycleBounds>,
    pub duration_hours: f64,
    pub performance: PerformanceStats,
    pub temperature: TemperatureDistribution,
    pub soc: Option<SummaryStats>,
    pub soh: Option<SohStats>,
    pub electrical: Option<ElectricalStats>,
    pub alerts: AlertCounts,
    pub charging: ChargingInsights,
}

impl CycleMetrics {
    /// The metrics of a cycle without samples.
    pub fn no_data(cycle_id: CycleId, bucket_width: BucketWidth) -> Self {
        Self {
            cycle_id,
            has_data: false,
            data_points: 0,
            bounds: None,
            duration_hours: 0.0,
            performance: PerformanceStats {
                distance_km: 0.0,
                average_speed: None,
                max_speed: None,
                possible_data_gap: false,
            },
            temperature: TemperatureDistribution {
                bucket_width,
                average: None,
                bins: Vec::new(),
            },
            soc: None,
            soh: None,
            electrical: None,
            alerts: AlertCounts::default(),
            charging: ChargingInsights {
                instances: Vec::new(),
                average_start_soc: None,
                pattern: ChargePattern::Normal,
            },
        }
    }

    pub fn soc_consumed(&self) -> Option<f64> {
        self.soc.map(|s| s.range())
    }

    /// Distance per percent of SOC consumed; `None` when no SOC was consumed.
    pub fn efficiency_proxy(&self) -> Option<f64> {
        match self.soc_consumed() {
            Some(consumed) if consumed > 0.0 => Some(self.performance.distance_km / consumed),
            _ => None,
        }
    }

    pub fn voltage_range(&self) -> Option<f64> {
        self.electrical.map(|e| e.voltage_range)
    }
}

pub fn compute_cycle_metrics(
    all_samples: &[TelemetrySample],
    cycle_id: CycleId,
    options: &AnalyticsOptions,
) -> CycleMetrics {
    let cycle = Cycle::select(all_samples, cycle_id);
    metrics_for_cycle(&cycle, options)
}

pub fn metrics_for_cycle(cycle: &Cycle<'_>, options: &AnalyticsOptions) -> CycleMetrics {
    let (Some(start), Some(end)) = (cycle.start(), cycle.end()) else {
        return CycleMetrics::no_data(cycle.id, options.bucket_width);
    };
    let samples = cycle.samples();
    let bounds = CycleBounds { start, end };

    CycleMetrics {
        cycle_id: cycle.id,
        has_data: true,
        data_points: cycle.len(),
        bounds: Some(bounds),
        duration_hours: bounds.duration_hours(),
        performance: performance_stats(samples),
        temperature: temperature_distribution(samples, options.bucket_width),
        soc: SummaryStats::from_values(samples.iter().map(|s| s.soc)),
        soh: soh_stats(samples),
        electrical: electrical_stats(samples),
        alerts: AlertCounts {
            warnings: samples.iter().filter(|s| s.warning).count(),
            protections: samples.iter().filter(|s| s.protection).count(),
        },
        charging: charging_insights(samples, options.deep_discharge_soc),
    }
}

fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    ((to - from).num_milliseconds() as f64 / MILLIS_PER_HOUR).max(0.0)
}

/// Trapezoidal integration of speed (km/h) over time (h).
fn integrate_distance(samples: &[&TelemetrySample]) -> f64 {
    samples
        .windows(2)
        .map(|pair| {
            let hours = hours_between(pair[0].timestamp, pair[1].timestamp);
            (pair[0].speed.max(0.0) + pair[1].speed.max(0.0)) / 2.0 * hours
        })
        .sum()
}

fn performance_stats(samples: &[&TelemetrySample]) -> PerformanceStats {
    let distance_km = integrate_distance(samples);
    let speed = SummaryStats::from_values(samples.iter().map(|s| s.speed));
    PerformanceStats {
        distance_km,
        average_speed: speed.map(|s| s.average),
        max_speed: speed.map(|s| s.max),
        possible_data_gap: !samples.is_empty() && distance_km == 0.0,
    }
}

fn temperature_distribution(
    samples: &[&TelemetrySample],
    bucket_width: BucketWidth,
) -> TemperatureDistribution {
    let Some(stats) = SummaryStats::from_values(samples.iter().map(|s| s.temperature)) else {
        return TemperatureDistribution {
            bucket_width,
            average: None,
            bins: Vec::new(),
        };
    };

    let width = bucket_width.degrees();
    let origin = (stats.min / width).floor() * width;
    let span = ((stats.max - origin) / width).floor();
    let bin_count = if span.is_finite() && span < MAX_TEMPERATURE_BINS as f64 {
        span as usize + 1
    } else {
        MAX_TEMPERATURE_BINS
    };

    let mut bins: Vec<TemperatureBin> = (0..bin_count)
        .map(|i| TemperatureBin {
            lower: origin + i as f64 * width,
            upper: origin + (i + 1) as f64 * width,
            count: 0,
            minutes: 0.0,
        })
        .collect();

    for (i, sample) in samples.iter().enumerate() {
        // `as usize` saturates negative rounding noise to the first bin
        let idx = (((sample.temperature - origin) / width).floor() as usize).min(bin_count - 1);
        let bin = &mut bins[idx];
        bin.count += 1;
        if let Some(next) = samples.get(i + 1) {
            let millis = (next.timestamp - sample.timestamp).num_milliseconds().max(0);
            bin.minutes += millis as f64 / MILLIS_PER_MINUTE;
        }
    }

    TemperatureDistribution {
        bucket_width,
        average: Some(stats.average),
        bins,
    }
}

fn soh_stats(samples: &[&TelemetrySample]) -> Option<SohStats> {
    let readings: Vec<f64> = samples.iter().filter_map(|s| s.soh).collect();
    let stats = SummaryStats::from_values(readings.iter().copied())?;
    let first = readings.first()?;
    let last = readings.last()?;
    Some(SohStats {
        average: stats.average,
        min: stats.min,
        drop: first - last,
    })
}

fn electrical_stats(samples: &[&TelemetrySample]) -> Option<ElectricalStats> {
    let voltage = SummaryStats::from_values(samples.iter().map(|s| s.voltage))?;
    let current = SummaryStats::from_values(samples.iter().map(|s| s.current))?;
    Some(ElectricalStats {
        voltage_avg: voltage.average,
        voltage_min: voltage.min,
        voltage_max: voltage.max,
        voltage_range: voltage.range(),
        current_avg: current.average,
    })
}

fn charging_insights(samples: &[&TelemetrySample], deep_discharge_soc: f64) -> ChargingInsights {
    let mut instances = Vec::new();
    let mut was_charging = false;
    let mut lowest_since_charge: Option<f64> = None;

    for sample in samples {
        if sample.charging && !was_charging {
            let lowest = lowest_since_charge.map_or(sample.soc, |low| low.min(sample.soc));
            instances.push(ChargingInstance {
                started_at: sample.timestamp,
                start_soc: sample.soc,
                lowest_soc_before: lowest,
                deep_discharge: lowest < deep_discharge_soc,
            });
        }

        lowest_since_charge = if sample.charging {
            None
        } else {
            Some(lowest_since_charge.map_or(sample.soc, |low| low.min(sample.soc)))
        };
        was_charging = sample.charging;
    }

    let average_start_soc = SummaryStats::from_values(instances.iter().map(|i| i.start_soc))
        .map(|s| s.average);
    let pattern = if instances.iter().any(|i| i.deep_discharge) {
        ChargePattern::DeepDischarge
    } else {
        ChargePattern::Normal
    };

    ChargingInsights {
        instances,
        average_start_soc,
        pattern,
    }
}
