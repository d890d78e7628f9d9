use std::cmp::Ordering;
use std::collections::HashSet;

use crate::physical::PhysicalRow;

#[derive(Debug, Clone, PartialEq)]
pub struct BarDatum {
    pub id: String,
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarChartData {
    pub metric: String,
    pub label: String,
    pub unit: String,
    pub show_values: bool,
    /// Sorted by value, highest first.
    pub bars: Vec<BarDatum>,
}

impl BarChartData {
    pub fn max_value(&self) -> f64 {
        self.bars.iter().map(|b| b.value).fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
    Primary,
    Secondary,
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPoint {
    pub id: String,
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub highlight: Highlight,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterData {
    pub x_metric: String,
    pub y_metric: String,
    pub points: Vec<ScatterPoint>,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub x_mean: f64,
    pub y_mean: f64,
}

impl ScatterData {
    pub fn coords(&self, highlight: Highlight) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .filter(|p| p.highlight == highlight)
            .map(|p| (p.x, p.y))
            .collect()
    }
}

/// One bar per distinct `id_column` value; rows without the metric are skipped.
pub fn plot_bar(
    rows: &[&PhysicalRow],
    metric: &str,
    label: &str,
    unit: &str,
    show_values: bool,
    id_column: &str,
    label_column: &str,
) -> BarChartData {
    let mut seen = HashSet::new();
    let mut bars: Vec<BarDatum> = rows
        .iter()
        .filter_map(|row| {
            let value = row.value(metric)?;
            let id = row.field(id_column)?;
            if !seen.insert(id.clone()) {
                return None;
            }
            Some(BarDatum {
                label: row.field(label_column).unwrap_or_else(|| id.clone()),
                id,
                value,
            })
        })
        .collect();
    bars.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));

    BarChartData {
        metric: metric.to_string(),
        label: label.to_string(),
        unit: unit.to_string(),
        show_values,
        bars,
    }
}

/// Points whose `id_column` value is in `primary` / `secondary` are highlighted;
/// primary wins when a value is in both.
pub fn plot_scatter(
    rows: &[&PhysicalRow],
    x_metric: &str,
    y_metric: &str,
    id_column: &str,
    label_column: &str,
    primary: &[String],
    secondary: &[String],
) -> ScatterData {
    let points: Vec<ScatterPoint> = rows
        .iter()
        .filter_map(|row| {
            let x = row.value(x_metric)?;
            let y = row.value(y_metric)?;
            let id = row.field(id_column).unwrap_or_default();
            let highlight = if primary.contains(&id) {
                Highlight::Primary
            } else if secondary.contains(&id) {
                Highlight::Secondary
            } else {
                Highlight::None
            };
            Some(ScatterPoint {
                label: row.field(label_column).unwrap_or_default(),
                id,
                x,
                y,
                highlight,
            })
        })
        .collect();

    let x_bounds = padded_bounds(points.iter().map(|p| p.x));
    let y_bounds = padded_bounds(points.iter().map(|p| p.y));
    let n = points.len().max(1) as f64;
    let x_mean = points.iter().map(|p| p.x).sum::<f64>() / n;
    let y_mean = points.iter().map(|p| p.y).sum::<f64>() / n;

    ScatterData {
        x_metric: x_metric.to_string(),
        y_metric: y_metric.to_string(),
        points,
        x_bounds,
        y_bounds,
        x_mean,
        y_mean,
    }
}

fn padded_bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return [0.0, 1.0];
    }
    let pad = ((max - min) * 0.05).max(0.5);
    [min - pad, max + pad]
}

#[cfg(test)]
mod tests {
    use super::padded_bounds;

    #[test]
    fn bounds_fall_back_when_empty() {
        assert_eq!(padded_bounds(std::iter::empty()), [0.0, 1.0]);
    }

    #[test]
    fn bounds_pad_single_value() {
        let [lo, hi] = padded_bounds([10.0].into_iter());
        assert!(lo < 10.0 && hi > 10.0);
    }
}
