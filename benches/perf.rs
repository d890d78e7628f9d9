use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::{Value, json};
use std::hint::black_box;

use sc_explorer::chart::{plot_bar, plot_scatter};
use sc_explorer::matches::{filter_matches, parse_match_rows};
use sc_explorer::metrics::{MetricsEnricher, StandardMetrics};
use sc_explorer::physical::{PhysicalRow, PhysicalTable};
use sc_explorer::reference::{normalize, parse_competition_editions};
use sc_explorer::table::Table;

fn synthetic_editions(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            json!({
                "id": i,
                "competition": {"id": i / 4, "name": format!("Competition {}", i / 4)},
                "season": {"id": i % 4, "start_year": 2020 + (i % 4), "end_year": 2021 + (i % 4)}
            })
        })
        .collect()
}

fn synthetic_matches(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            json!({
                "id": i,
                "competition_id": i % 20,
                "season_id": i % 3,
                "date_time": "2024-03-09T12:30:00Z",
                "home_team": {"short_name": format!("Home {i}")},
                "away_team": {"short_name": format!("Away {i}")}
            })
        })
        .collect()
}

fn synthetic_physical(n: usize) -> PhysicalTable {
    let records: Vec<Value> = (0..n)
        .map(|i| {
            json!({
                "player_id": i,
                "player_short_name": format!("P. {i}"),
                "team_name": format!("Team {}", i % 20),
                "position_group": "Midfield",
                "minutes_full_all": 900 + i,
                "total_distance_full_all": 99000 + i * 10,
                "sprint_distance_full_all": 4000 + i,
                "count_sprint_full_all": 150 + i % 50,
                "minutes_full_tip": 450,
                "total_distance_full_tip": 50000,
                "minutes_full_otip": 450,
                "total_distance_full_otip": 49000,
                "psv99": 28.0 + (i % 70) as f64 / 10.0,
                "top_5_psv_99": 27.0 + (i % 70) as f64 / 10.0
            })
        })
        .collect();
    PhysicalTable::from_records(&records).expect("synthetic rows are complete")
}

fn synthetic_csv(rows: usize) -> String {
    let mut out = String::from("event_id,frame_start,event_type,player_name,team_shortname\n");
    for i in 0..rows {
        out.push_str(&format!("{i},{},player_possession,\"Player, {i}\",Team\n", i * 10));
    }
    out
}

fn bench_reference_normalize(c: &mut Criterion) {
    let raw = json!({ "results": synthetic_editions(400) }).to_string();
    c.bench_function("reference_normalize", |b| {
        b.iter(|| {
            let results = parse_competition_editions(black_box(&raw), "bench").unwrap();
            let rows = normalize(&results).unwrap();
            black_box(rows.len());
        })
    });
}

fn bench_match_filter(c: &mut Criterion) {
    let rows = parse_match_rows(synthetic_matches(5000)).unwrap();
    c.bench_function("match_filter", |b| {
        b.iter(|| {
            let scoped = filter_matches(black_box(&rows), 7, 1);
            black_box(scoped.len());
        })
    });
}

fn bench_table_parse(c: &mut Criterion) {
    let csv = synthetic_csv(5000);
    c.bench_function("dynamic_events_parse", |b| {
        b.iter(|| {
            let table = Table::from_delimited(black_box(&csv)).unwrap();
            black_box(table.len());
        })
    });
}

fn bench_standard_metrics(c: &mut Criterion) {
    let table = synthetic_physical(600);
    c.bench_function("standard_metrics", |b| {
        b.iter(|| {
            let mut table = table.clone();
            let metrics = StandardMetrics.add_standard_metrics(&mut table);
            black_box(metrics.len());
        })
    });
}

fn bench_plots(c: &mut Criterion) {
    let mut table = synthetic_physical(600);
    StandardMetrics.add_standard_metrics(&mut table);
    let rows: Vec<&PhysicalRow> = table.rows.iter().collect();
    let primary = vec!["Team 1".to_string()];
    let secondary = vec!["Team 2".to_string()];

    c.bench_function("plot_bar", |b| {
        b.iter(|| {
            let data = plot_bar(
                black_box(&rows),
                "psv99",
                "psv99 Metric",
                "km/h",
                true,
                "player_id",
                "plot_label",
            );
            black_box(data.bars.len());
        })
    });
    c.bench_function("plot_scatter", |b| {
        b.iter(|| {
            let data = plot_scatter(
                black_box(&rows),
                "psv99",
                "total_distance_full_all_per_90",
                "team_name",
                "player_short_name",
                &primary,
                &secondary,
            );
            black_box(data.points.len());
        })
    });
}

criterion_group!(
    perf,
    bench_reference_normalize,
    bench_match_filter,
    bench_table_parse,
    bench_standard_metrics,
    bench_plots
);
criterion_main!(perf);
