use std::collections::BTreeSet;

use crate::physical::PhysicalTable;

/// Adds derived metric columns to a physical table and names them.
pub trait MetricsEnricher {
    fn add_standard_metrics(&self, table: &mut PhysicalTable) -> Vec<String>;
}

const PER_90_PREFIXES: &[&str] = &[
    "total_distance",
    "running_distance",
    "hsr_distance",
    "sprint_distance",
    "hi_distance",
    "count_hsr",
    "count_sprint",
    "count_hi",
    "count_medium_acceleration",
    "count_high_acceleration",
    "count_medium_deceleration",
    "count_high_deceleration",
];

const PASS_THROUGH: &[&str] = &["psv99", "top_5_psv_99"];

/// Per-90 rates for `*_full_all` volumes and metres per minute in/out of possession.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardMetrics;

impl MetricsEnricher for StandardMetrics {
    fn add_standard_metrics(&self, table: &mut PhysicalTable) -> Vec<String> {
        let mut derived = BTreeSet::new();

        for row in &mut table.rows {
            let mut added = Vec::new();

            if let Some(minutes) = row.value("minutes_full_all").filter(|m| *m > 0.0) {
                for (column, value) in &row.values {
                    let Some(base) = column.strip_suffix("_full_all") else {
                        continue;
                    };
                    if PER_90_PREFIXES.iter().any(|p| base == *p) {
                        added.push((format!("{column}_per_90"), value / minutes * 90.0));
                    }
                }
            }

            for phase in ["tip", "otip"] {
                let distance = row.value(&format!("total_distance_full_{phase}"));
                let minutes = row
                    .value(&format!("minutes_full_{phase}"))
                    .filter(|m| *m > 0.0);
                if let (Some(distance), Some(minutes)) = (distance, minutes) {
                    added.push((format!("meters_per_minute_{phase}"), distance / minutes));
                }
            }

            for (name, value) in added {
                derived.insert(name.clone());
                row.values.insert(name, value);
            }
        }

        let mut metrics: Vec<String> = PASS_THROUGH
            .iter()
            .filter(|name| table.rows.iter().any(|row| row.value(name).is_some()))
            .map(|name| name.to_string())
            .collect();
        metrics.extend(derived);
        metrics
    }
}

pub fn metric_unit(metric: &str) -> &'static str {
    if metric.contains("psv") {
        "km/h"
    } else if metric.starts_with("meters_per_minute") {
        "m/min"
    } else if metric.starts_with("count_") {
        "per 90"
    } else if metric.contains("distance") && metric.ends_with("_per_90") {
        "m per 90"
    } else {
        ""
    }
}

pub fn metric_label(metric: &str) -> String {
    metric.replace('_', " ")
}
