//! Sensor group membership and per-test exclusions.

use crate::config::SensorGroup;
use crate::core::loaders::{DataTable, TestDescriptor};

use super::sensors::{classify, SensorKind};

/// True if the test excludes the whole group.
///
/// A group is excluded when an excluded-group token equals one of its members.
pub fn is_group_excluded(group: &SensorGroup, descriptor: &TestDescriptor) -> bool {
    descriptor
        .excluded_groups
        .iter()
        .any(|token| group.members.iter().any(|m| m == token))
}

/// True if the test excludes the channel.
///
/// A channel is excluded when it contains any excluded-channel token.
pub fn is_channel_excluded(channel: &str, descriptor: &TestDescriptor) -> bool {
    descriptor
        .excluded_channels
        .iter()
        .any(|token| channel.contains(token.as_str()))
}

/// Channels of `table` that belong to `group` and can be converted.
///
/// A channel qualifies when it matches a group member, is not excluded by the
/// test, classifies to a known sensor kind, and, for hose channels, carries
/// `hose_size_tag`. The time column never qualifies.
pub fn eligible_channels(
    table: &DataTable,
    group: &SensorGroup,
    descriptor: &TestDescriptor,
    time_column: &str,
    hose_size_tag: &str,
) -> Vec<(String, SensorKind)> {
    table
        .column_names()
        .filter(|&name| name != time_column)
        .filter(|&name| group.matches(name))
        .filter(|&name| !is_channel_excluded(name, descriptor))
        .filter_map(|name| classify(name).map(|kind| (name, kind)))
        .filter(|(name, kind)| {
            *kind != SensorKind::HosePressure || name.contains(hose_size_tag)
        })
        .map(|(name, kind)| (name.to_string(), kind))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::Column;
    use std::collections::HashMap;

    fn descriptor(channels: &[&str], groups: &[&str]) -> TestDescriptor {
        TestDescriptor {
            name: "Test_1".to_string(),
            start: 0.0,
            end: 100.0,
            excluded_channels: channels.iter().map(|s| s.to_string()).collect(),
            excluded_groups: groups.iter().map(|s| s.to_string()).collect(),
            axis_scales: HashMap::new(),
        }
    }

    fn table(names: &[&str]) -> DataTable {
        DataTable {
            index_name: "TimeStamp(s)".to_string(),
            index: vec!["0".to_string()],
            columns: names.iter().map(|n| Column::new(*n, vec![0.0])).collect(),
        }
    }

    #[test]
    fn test_group_exclusion() {
        let gas = SensorGroup::new(["GAS_", "CO_", "CO2_", "O2_"]);
        assert!(is_group_excluded(&gas, &descriptor(&[], &["CO2_"])));
        assert!(!is_group_excluded(&gas, &descriptor(&[], &["HOSE_"])));
        assert!(!is_group_excluded(&gas, &descriptor(&[], &[])));
    }

    #[test]
    fn test_eligible_channels_respects_exclusions() {
        let data = table(&["Time", "TC_A1_1", "TC_A1_2", "TC_A1_3", "TC_A10_1"]);
        let group = SensorGroup::new(["TC_A1_"]);
        let desc = descriptor(&["TC_A1_2"], &[]);

        let channels = eligible_channels(&data, &group, &desc, "Time", "2p5");
        let names: Vec<&str> = channels.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["TC_A1_1", "TC_A1_3"]);
    }

    #[test]
    fn test_eligible_channels_hose_tag() {
        let data = table(&["HOSE_2p5_A", "HOSE_1p75_A", "HOSE_2p5_B"]);
        let group = SensorGroup::new(["HOSE_"]);

        let channels = eligible_channels(&data, &group, &descriptor(&[], &[]), "Time", "2p5");
        assert_eq!(
            channels,
            vec![
                ("HOSE_2p5_A".to_string(), SensorKind::HosePressure),
                ("HOSE_2p5_B".to_string(), SensorKind::HosePressure),
            ]
        );
    }

    #[test]
    fn test_eligible_channels_skips_unclassified() {
        let data = table(&["HF_A1", "RAD_A1", "Note_HF_"]);
        let group = SensorGroup::new(["HF_", "RAD_"]);

        let channels = eligible_channels(&data, &group, &descriptor(&[], &[]), "Time", "2p5");
        let names: Vec<&str> = channels.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["HF_A1", "RAD_A1"]);
    }
}
