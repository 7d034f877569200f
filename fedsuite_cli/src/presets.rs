//! Ready-made tests for common federated-learning setups.

use crate::error::CliError;
use fedsuite_core::{
    DatasetId, DatasetUpdate, DistributionFn, PatternKind, Store, TestUpdate,
};
use std::num::{NonZeroU32, NonZeroUsize};
use tracing::info;

/// Preset identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuitePreset {
    /// Even split, empty default timeline
    Baseline,

    /// Strong label skew with the normal curve
    LabelSkew,

    /// Moderate label skew with the linear curve
    LinearSkew,

    /// 30% of clients report back two aggregations late
    Stragglers,
}

/// Overrides applied before the preset's own settings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PresetOptions {
    pub clients: Option<NonZeroUsize>,
    pub rounds: Option<NonZeroU32>,
    pub dataset: Option<DatasetId>,
}

impl SuitePreset {
    /// Returns a list of all presets.
    pub fn all() -> Vec<SuitePreset> {
        vec![
            SuitePreset::Baseline,
            SuitePreset::LabelSkew,
            SuitePreset::LinearSkew,
            SuitePreset::Stragglers,
        ]
    }

    /// Returns the preset name, also used as the test name.
    pub fn name(&self) -> &'static str {
        match self {
            SuitePreset::Baseline => "baseline",
            SuitePreset::LabelSkew => "label_skew",
            SuitePreset::LinearSkew => "linear_skew",
            SuitePreset::Stragglers => "stragglers",
        }
    }

    /// Returns a description of the preset.
    pub fn description(&self) -> &'static str {
        match self {
            SuitePreset::Baseline => "Even split of every class, no scheduled events",
            SuitePreset::LabelSkew => "Skewed indices, normal curve with bias 0.8",
            SuitePreset::LinearSkew => "Skewed indices, linear curve with bias 0.5",
            SuitePreset::Stragglers => "Even Latency schedule, 30% of clients 2 aggregations late",
        }
    }

    /// Adds this preset's test to `store` and returns its name.
    ///
    /// The test is named after the preset when that name is free.
    pub fn apply(&self, store: &mut Store, options: &PresetOptions) -> Result<String, CliError> {
        let mut name = store.add_default_test();
        if !store.contains(self.name()) {
            store.rename_test(&name, self.name())?;
            name = self.name().to_string();
        }

        if let Some(dataset) = options.dataset {
            store.set_dataset_field(&name, DatasetUpdate::Name(dataset))?;
        }
        if let Some(clients) = options.clients {
            store.set_test_field(&name, TestUpdate::NClients(clients))?;
        }
        if let Some(rounds) = options.rounds {
            store.set_test_field(&name, TestUpdate::Rounds(rounds))?;
        }

        match self {
            SuitePreset::Baseline => {}
            SuitePreset::LabelSkew => {
                store.set_dataset_field(&name, DatasetUpdate::DistributionFn(DistributionFn::Normal))?;
                store.set_dataset_field(&name, DatasetUpdate::Bias(0.8))?;
                store.reset_knowledge_amount(&name)?;
                store.apply_skewed_indices(&name)?;
            }
            SuitePreset::LinearSkew => {
                store.set_dataset_field(&name, DatasetUpdate::DistributionFn(DistributionFn::Linear))?;
                store.set_dataset_field(&name, DatasetUpdate::Bias(0.5))?;
                store.reset_knowledge_amount(&name)?;
                store.apply_skewed_indices(&name)?;
            }
            SuitePreset::Stragglers => {
                let generator = PatternKind::EvenLatency.configure(&["0.3", "2"])?;
                store.apply_pattern(&name, 0, generator.as_ref())?;
            }
        }

        info!(preset = self.name(), test = %name, "applied preset");
        Ok(name)
    }
}

impl std::fmt::Display for SuitePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for SuitePreset {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "baseline" | "even" => Ok(SuitePreset::Baseline),
            "label_skew" | "labelskew" => Ok(SuitePreset::LabelSkew),
            "linear_skew" | "linearskew" => Ok(SuitePreset::LinearSkew),
            "stragglers" | "latency" => Ok(SuitePreset::Stragglers),
            _ => Err(CliError::UnknownPreset(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedsuite_core::{EventKind, Participant};

    #[test]
    fn test_preset_names_round_trip() {
        for preset in SuitePreset::all() {
            assert_eq!(preset.name().parse::<SuitePreset>().unwrap(), preset);
        }
        assert!("chaos".parse::<SuitePreset>().is_err());
    }

    #[test]
    fn test_baseline_is_even_split() {
        let mut store = Store::new();
        let name = SuitePreset::Baseline.apply(&mut store, &PresetOptions::default()).unwrap();

        assert_eq!(name, "baseline");
        let test = store.get_test(&name).unwrap();
        assert_eq!(test.dataset.indices.range(3, 0).map(|r| r.len()), Some(592));
        assert!(test.timelines[0].timeline.is_empty());
    }

    #[test]
    fn test_skew_presets_respect_class_sizes() {
        for preset in [SuitePreset::LabelSkew, SuitePreset::LinearSkew] {
            let mut store = Store::new();
            let options = PresetOptions {
                clients: NonZeroUsize::new(5),
                dataset: Some(DatasetId::Cifar10),
                ..Default::default()
            };
            let name = preset.apply(&mut store, &options).unwrap();

            let test = store.get_test(&name).unwrap();
            assert_eq!(test.dataset.indices.client_count(), 5);
            assert_eq!(test.dataset.knowledge_amount, 0.2);
            for &(class_id, size) in test.dataset.dataset().classes {
                assert!(test.dataset.indices.class_total(class_id) <= size);
            }
        }
    }

    #[test]
    fn test_stragglers_schedule() {
        let mut store = Store::new();
        let name = SuitePreset::Stragglers.apply(&mut store, &PresetOptions::default()).unwrap();

        let named = store.get_timeline(&name, 0).unwrap();
        assert_eq!(named.rounds, 5);
        // 3 of 10 clients are late
        assert_eq!(named.timeline.event_for(4, Participant::Client(2)), Some(EventKind::Comm));
        assert_eq!(named.timeline.event_for(1, Participant::Client(2)), None);
        assert_eq!(named.timeline.event_for(1, Participant::Client(3)), Some(EventKind::Comm));
    }

    #[test]
    fn test_second_application_keeps_generated_name() {
        let mut store = Store::new();
        let options = PresetOptions::default();
        SuitePreset::Baseline.apply(&mut store, &options).unwrap();
        let second = SuitePreset::Baseline.apply(&mut store, &options).unwrap();

        assert_eq!(second, "Test 2");
        assert_eq!(store.test_names(), vec!["baseline", "Test 2"]);
    }
}
