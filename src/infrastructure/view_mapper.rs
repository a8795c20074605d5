// Mapper to convert domain analytics to JSON views for the dashboard
use crate::application::analytics_service::CycleReport;
use crate::domain::aggregates::{CycleTrendPoint, DatasetAggregates};
use crate::domain::battery::Battery;
use crate::domain::metrics::{
    ChargePattern, ChargingInsights, CycleMetrics, SohStats, SummaryStats, TemperatureDistribution,
};
use crate::domain::telemetry::{CycleId, TelemetryDataset};
use chrono::{DateTime, Utc};
use serde::Serialize;

const DATA_GAP_NOTICE: &str = "GPS data may have gaps - zero distance recorded for this cycle";

#[derive(Debug, Serialize)]
pub struct BatteryView {
    pub imei: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CyclesView {
    pub imei: String,
    pub cycles: Vec<CycleId>,
    pub latest: Option<CycleId>,
}

#[derive(Debug, Serialize)]
pub struct RefreshView {
    pub imei: String,
    pub samples: usize,
    pub cycles: usize,
    pub fetched_at: String,
}

#[derive(Debug, Serialize)]
pub struct StatsView {
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Serialize)]
pub struct SohView {
    pub average: f64,
    pub min: f64,
    pub drop: f64,
}

#[derive(Debug, Serialize)]
pub struct PerformanceView {
    pub total_distance_km: f64,
    pub average_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub possible_data_gap: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct TemperatureBinView {
    pub label: String,
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    pub minutes: f64,
    pub share_percent: f64,
}

#[derive(Debug, Serialize)]
pub struct TemperatureView {
    pub bucket_width: f64,
    pub average: Option<f64>,
    pub bins: Vec<TemperatureBinView>,
}

#[derive(Debug, Serialize)]
pub struct ElectricalView {
    pub voltage_avg: f64,
    pub voltage_min: f64,
    pub voltage_max: f64,
    pub voltage_range: f64,
    pub current_avg: f64,
}

#[derive(Debug, Serialize)]
pub struct AlertsView {
    pub warnings: usize,
    pub protections: usize,
}

#[derive(Debug, Serialize)]
pub struct ChargingInstanceView {
    pub started_at: String,
    pub start_soc: f64,
    pub lowest_soc_before: f64,
    pub deep_discharge: bool,
}

#[derive(Debug, Serialize)]
pub struct ChargingView {
    pub instances_count: usize,
    pub deep_discharge_count: usize,
    pub average_start_soc: Option<f64>,
    pub pattern: &'static str,
    pub instances: Vec<ChargingInstanceView>,
}

#[derive(Debug, Serialize)]
pub struct CycleMetricsView {
    pub cycle_number: CycleId,
    pub has_data: bool,
    pub data_points: usize,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub duration_hours: f64,
    pub performance: PerformanceView,
    pub temperature: TemperatureView,
    pub soc: Option<StatsView>,
    pub soh: Option<SohView>,
    pub electrical: Option<ElectricalView>,
    pub alerts: AlertsView,
    pub charging: ChargingView,
    pub soc_consumed: Option<f64>,
    pub efficiency_proxy: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct CycleTrendView {
    pub cycle_number: CycleId,
    pub distance_km: f64,
    pub duration_hours: f64,
    pub soc_consumed: Option<f64>,
    pub average_temperature: Option<f64>,
    pub voltage_range: Option<f64>,
    pub efficiency_proxy: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct TrendsView {
    pub total_cycles: usize,
    pub total_distance_km: f64,
    pub average_temperature: Option<f64>,
    pub average_voltage_range: Option<f64>,
    pub cycles: Vec<CycleTrendView>,
}

#[derive(Debug, Serialize)]
pub struct CycleReportView {
    pub imei: String,
    pub metrics: CycleMetricsView,
    pub trends: TrendsView,
}

pub fn format_datetime(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

pub fn battery_to_view(battery: Battery) -> BatteryView {
    BatteryView {
        imei: battery.imei,
        name: battery.name,
    }
}

/// `cycles` must be ascending, as returned by the analytics service.
pub fn cycles_to_view(imei: String, cycles: Vec<CycleId>) -> CyclesView {
    CyclesView {
        latest: cycles.last().copied(),
        imei,
        cycles,
    }
}

pub fn dataset_to_refresh_view(dataset: &TelemetryDataset) -> RefreshView {
    RefreshView {
        imei: dataset.imei.clone(),
        samples: dataset.samples.len(),
        cycles: dataset.cycle_ids().len(),
        fetched_at: dataset.fetched_at.to_rfc3339(),
    }
}

pub fn report_to_view(report: CycleReport) -> CycleReportView {
    CycleReportView {
        imei: report.imei,
        metrics: metrics_to_view(&report.metrics),
        trends: aggregates_to_view(&report.aggregates),
    }
}

pub fn metrics_to_view(metrics: &CycleMetrics) -> CycleMetricsView {
    let performance = &metrics.performance;

    CycleMetricsView {
        cycle_number: metrics.cycle_id,
        has_data: metrics.has_data,
        data_points: metrics.data_points,
        start_time: metrics.bounds.map(|b| format_datetime(b.start)),
        end_time: metrics.bounds.map(|b| format_datetime(b.end)),
        duration_hours: metrics.duration_hours,
        performance: PerformanceView {
            total_distance_km: performance.distance_km,
            average_speed: performance.average_speed,
            max_speed: performance.max_speed,
            possible_data_gap: performance.possible_data_gap,
            notice: performance.possible_data_gap.then_some(DATA_GAP_NOTICE),
        },
        temperature: temperature_to_view(&metrics.temperature),
        soc: metrics.soc.map(stats_to_view),
        soh: metrics.soh.map(soh_to_view),
        electrical: metrics.electrical.map(|e| ElectricalView {
            voltage_avg: e.voltage_avg,
            voltage_min: e.voltage_min,
            voltage_max: e.voltage_max,
            voltage_range: e.voltage_range,
            current_avg: e.current_avg,
        }),
        alerts: AlertsView {
            warnings: metrics.alerts.warnings,
            protections: metrics.alerts.protections,
        },
        charging: charging_to_view(&metrics.charging),
        soc_consumed: metrics.soc_consumed(),
        efficiency_proxy: metrics.efficiency_proxy(),
    }
}

pub fn aggregates_to_view(aggregates: &DatasetAggregates) -> TrendsView {
    TrendsView {
        total_cycles: aggregates.total_cycles,
        total_distance_km: aggregates.total_distance_km,
        average_temperature: aggregates.average_temperature,
        average_voltage_range: aggregates.average_voltage_range,
        cycles: aggregates.cycles.iter().map(trend_point_to_view).collect(),
    }
}

fn trend_point_to_view(point: &CycleTrendPoint) -> CycleTrendView {
    CycleTrendView {
        cycle_number: point.cycle_id,
        distance_km: point.distance_km,
        duration_hours: point.duration_hours,
        soc_consumed: point.soc_consumed,
        average_temperature: point.average_temperature,
        voltage_range: point.voltage_range,
        efficiency_proxy: point.efficiency_proxy,
    }
}

fn stats_to_view(stats: SummaryStats) -> StatsView {
    StatsView {
        average: stats.average,
        min: stats.min,
        max: stats.max,
    }
}

fn soh_to_view(stats: SohStats) -> SohView {
    SohView {
        average: stats.average,
        min: stats.min,
        drop: stats.drop,
    }
}

fn temperature_to_view(dist: &TemperatureDistribution) -> TemperatureView {
    let total = dist.total_count();
    let bins = dist
        .bins
        .iter()
        .map(|bin| TemperatureBinView {
            label: format!("{}–{}°C", bin.lower, bin.upper),
            lower: bin.lower,
            upper: bin.upper,
            count: bin.count,
            minutes: bin.minutes,
            share_percent: if total == 0 {
                0.0
            } else {
                bin.count as f64 / total as f64 * 100.0
            },
        })
        .collect();

    TemperatureView {
        bucket_width: dist.bucket_width.degrees(),
        average: dist.average,
        bins,
    }
}

fn charging_to_view(charging: &ChargingInsights) -> ChargingView {
    ChargingView {
        instances_count: charging.count(),
        deep_discharge_count: charging.deep_discharge_count(),
        average_start_soc: charging.average_start_soc,
        pattern: match charging.pattern {
            ChargePattern::Normal => "normal",
            ChargePattern::DeepDischarge => "deep_discharge",
        },
        instances: charging
            .instances
            .iter()
            .map(|i| ChargingInstanceView {
                started_at: format_datetime(i.started_at),
                start_soc: i.start_soc,
                lowest_soc_before: i.lowest_soc_before,
                deep_discharge: i.deep_discharge,
            })
            .collect(),
    }
}
