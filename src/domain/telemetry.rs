// Telemetry data domain models
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

pub type CycleId = u32;

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySample {
    pub timestamp: DateTime<Utc>,
    pub cycle_id: CycleId,
    /// km/h
    pub speed: f64,
    /// °C
    pub temperature: f64,
    /// Percent, always within [0, 100]
    pub soc: f64,
    pub soh: Option<f64>,
    pub voltage: f64,
    pub current: f64,
    pub warning: bool,
    pub protection: bool,
    pub charging: bool,
}

impl TelemetrySample {
    pub fn new(
        timestamp: DateTime<Utc>,
        cycle_id: CycleId,
        speed: f64,
        temperature: f64,
        soc: f64,
        voltage: f64,
        current: f64,
    ) -> Self {
        Self {
            timestamp,
            cycle_id,
            speed,
            temperature,
            soc,
            soh: None,
            voltage,
            current,
            warning: false,
            protection: false,
            charging: false,
        }
    }

    pub fn with_soh(mut self, soh: f64) -> Self {
        self.soh = Some(soh);
        self
    }

    pub fn with_flags(mut self, warning: bool, protection: bool, charging: bool) -> Self {
        self.warning = warning;
        self.protection = protection;
        self.charging = charging;
        self
    }
}

/// A read-only view of the samples belonging to one cycle, in time order.
#[derive(Debug, Clone)]
pub struct Cycle<'a> {
    pub id: CycleId,
    samples: Vec<&'a TelemetrySample>,
}

impl<'a> Cycle<'a> {
    pub fn select(all_samples: &'a [TelemetrySample], id: CycleId) -> Self {
        let mut samples: Vec<&TelemetrySample> =
            all_samples.iter().filter(|s| s.cycle_id == id).collect();
        samples.sort_by_key(|s| s.timestamp);
        Self { id, samples }
    }

    /// Every cycle in the table, ascending by id, in a single pass.
    pub fn group(all_samples: &'a [TelemetrySample]) -> Vec<Self> {
        let mut by_cycle: BTreeMap<CycleId, Vec<&'a TelemetrySample>> = BTreeMap::new();
        for sample in all_samples {
            by_cycle.entry(sample.cycle_id).or_default().push(sample);
        }
        by_cycle
            .into_iter()
            .map(|(id, mut samples)| {
                samples.sort_by_key(|s| s.timestamp);
                Self { id, samples }
            })
            .collect()
    }

    pub fn samples(&self) -> &[&'a TelemetrySample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.samples.first().map(|s| s.timestamp)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.samples.last().map(|s| s.timestamp)
    }
}

/// The full sample table fetched for one battery, sorted by cycle then time.
#[derive(Debug, Clone)]
pub struct TelemetryDataset {
    pub imei: String,
    pub samples: Arc<[TelemetrySample]>,
    pub fetched_at: DateTime<Utc>,
    cycles: Arc<BTreeMap<CycleId, Range<usize>>>,
}

impl TelemetryDataset {
    pub fn new(imei: String, mut samples: Vec<TelemetrySample>, fetched_at: DateTime<Utc>) -> Self {
        samples.sort_by_key(|s| (s.cycle_id, s.timestamp));

        let mut cycles = BTreeMap::new();
        let mut start = 0;
        for (i, sample) in samples.iter().enumerate() {
            if samples.get(i + 1).map(|next| next.cycle_id) != Some(sample.cycle_id) {
                cycles.insert(sample.cycle_id, start..i + 1);
                start = i + 1;
            }
        }

        Self {
            imei,
            samples: samples.into(),
            fetched_at,
            cycles: Arc::new(cycles),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Distinct cycle numbers, ascending.
    pub fn cycle_ids(&self) -> Vec<CycleId> {
        self.cycles.keys().copied().collect()
    }

    pub fn latest_cycle_id(&self) -> Option<CycleId> {
        self.cycles.keys().next_back().copied()
    }

    /// The samples of one cycle in time order; empty when the cycle is absent.
    pub fn cycle_samples(&self, id: CycleId) -> &[TelemetrySample] {
        match self.cycles.get(&id) {
            Some(range) => &self.samples[range.clone()],
            None => &[],
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_cycle_select_orders_by_timestamp() {
        let samples = vec![
            sample(2, 30, 5.0, 50.0),
            sample(1, 10, 5.0, 90.0),
            sample(2, 0, 5.0, 60.0),
            sample(2, 15, 5.0, 55.0),
        ];

        let cycle = Cycle::select(&samples, 2);
        assert_eq!(cycle.len(), 3);
        assert_eq!(cycle.start(), Some(at_minutes(0)));
        assert_eq!(cycle.end(), Some(at_minutes(30)));
        let socs: Vec<f64> = cycle.samples().iter().map(|s| s.soc).collect();
        assert_eq!(socs, vec![60.0, 55.0, 50.0]);
    }

    #[test]
    fn test_cycle_select_missing_cycle_is_empty() {
        let samples = vec![sample(1, 0, 5.0, 90.0)];
        let cycle = Cycle::select(&samples, 7);
        assert_eq!(cycle.len(), 0);
        assert_eq!(cycle.start(), None);
    }

    #[test]
    fn test_group_matches_select() {
        let samples = vec![
            sample(2, 30, 5.0, 50.0),
            sample(1, 10, 5.0, 90.0),
            sample(2, 0, 5.0, 60.0),
        ];

        let cycles = Cycle::group(&samples);
        assert_eq!(cycles.len(), 2);
        for cycle in &cycles {
            assert_eq!(cycle.samples(), Cycle::select(&samples, cycle.id).samples());
        }
    }

    #[test]
    fn test_dataset_cycle_lookup_is_ordered() {
        let dataset = TelemetryDataset::new(
            "865044073967657".to_string(),
            vec![
                sample(4, 20, 0.0, 70.0),
                sample(3, 0, 0.0, 80.0),
                sample(4, 5, 0.0, 75.0),
            ],
            at_minutes(0),
        );

        let cycle = dataset.cycle_samples(4);
        assert_eq!(cycle.len(), 2);
        assert_eq!(cycle[0].timestamp, at_minutes(5));
        assert_eq!(cycle[1].timestamp, at_minutes(20));
        assert_eq!(dataset.cycle_samples(3).len(), 1);
        assert!(dataset.cycle_samples(9).is_empty());
    }

    #[test]
    fn test_dataset_cycle_ids_are_sorted_and_unique() {
        let dataset = TelemetryDataset::new(
            "865044073967657".to_string(),
            vec![
                sample(3, 0, 0.0, 80.0),
                sample(1, 0, 0.0, 80.0),
                sample(3, 5, 0.0, 79.0),
                sample(2, 0, 0.0, 80.0),
            ],
            at_minutes(0),
        );

        assert_eq!(dataset.cycle_ids(), vec![1, 2, 3]);
        assert_eq!(dataset.latest_cycle_id(), Some(3));
    }
}
