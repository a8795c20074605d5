// Cross-cycle aggregates over the whole telemetry table
use super::metrics::{CycleMetrics, metrics_for_cycle};
use super::options::AnalyticsOptions;
use super::telemetry::{Cycle, CycleId, TelemetrySample};

/// One cycle's contribution to the long-term trend charts.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleTrendPoint {
    pub cycle_id: CycleId,
    pub distance_km: f64,
    pub duration_hours: f64,
    pub soc_consumed: Option<f64>,
    pub average_temperature: Option<f64>,
    pub voltage_range: Option<f64>,
    pub efficiency_proxy: Option<f64>,
}

impl From<&CycleMetrics> for CycleTrendPoint {
    fn from(metrics: &CycleMetrics) -> Self {
        Self {
            cycle_id: metrics.cycle_id,
            distance_km: metrics.performance.distance_km,
            duration_hours: metrics.duration_hours,
            soc_consumed: metrics.soc_consumed(),
            average_temperature: metrics.temperature.average,
            voltage_range: metrics.voltage_range(),
            efficiency_proxy: metrics.efficiency_proxy(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetAggregates {
    pub total_cycles: usize,
    pub total_distance_km: f64,
    /// Mean of the per-cycle average temperatures.
    pub average_temperature: Option<f64>,
    pub average_voltage_range: Option<f64>,
    pub cycles: Vec<CycleTrendPoint>,
}

pub fn compute_dataset_aggregates(
    all_samples: &[TelemetrySample],
    options: &AnalyticsOptions,
) -> DatasetAggregates {
    let cycles: Vec<CycleTrendPoint> = Cycle::group(all_samples)
        .iter()
        .map(|cycle| CycleTrendPoint::from(&metrics_for_cycle(cycle, options)))
        .collect();

    DatasetAggregates {
        total_cycles: cycles.len(),
        total_distance_km: cycles.iter().map(|c| c.distance_km).sum(),
        average_temperature: mean(cycles.iter().filter_map(|c| c.average_temperature)),
        average_voltage_range: mean(cycles.iter().filter_map(|c| c.voltage_range)),
        cycles,
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::test_support::sample;

    fn with_temperature_and_voltage(
        mut s: TelemetrySample,
        temperature: f64,
        voltage: f64,
    ) -> TelemetrySample {
        s.temperature = temperature;
        s.voltage = voltage;
        s
    }

    #[test]
    fn test_empty_dataset() {
        let aggregates = compute_dataset_aggregates(&[], &AnalyticsOptions::default());
        assert_eq!(aggregates.total_cycles, 0);
        assert_eq!(aggregates.total_distance_km, 0.0);
        assert_eq!(aggregates.average_temperature, None);
        assert!(aggregates.cycles.is_empty());
    }

    #[test]
    fn test_aggregates_reduce_per_cycle_metrics() {
        let samples = vec![
            with_temperature_and_voltage(sample(1, 0, 10.0, 80.0), 20.0, 50.0),
            with_temperature_and_voltage(sample(1, 60, 20.0, 60.0), 30.0, 53.0),
            with_temperature_and_voltage(sample(2, 120, 30.0, 70.0), 40.0, 51.0),
            with_temperature_and_voltage(sample(2, 180, 30.0, 70.0), 40.0, 51.0),
        ];

        let aggregates = compute_dataset_aggregates(&samples, &AnalyticsOptions::default());

        assert_eq!(aggregates.total_cycles, 2);
        assert!((aggregates.total_distance_km - 45.0).abs() < 1e-9);
        assert_eq!(aggregates.average_temperature, Some(32.5));
        let voltage_ranges: Vec<_> = aggregates
            .cycles
            .iter()
            .map(|c| (c.cycle_id, c.voltage_range))
            .collect();
        assert_eq!(voltage_ranges, vec![(1, Some(3.0)), (2, Some(0.0))]);
        assert_eq!(aggregates.average_voltage_range, Some(1.5));

        // Cycle 2 consumed no SOC, so its efficiency is undefined
        let efficiency = aggregates.cycles[0].efficiency_proxy.unwrap();
        assert!((efficiency - 15.0 / 20.0).abs() < 1e-9);
        assert_eq!(aggregates.cycles[1].efficiency_proxy, None);
    }
}
