use std::fs;
use std::path::PathBuf;

use mockito::Server;
use serde_json::{Value, json};

use sc_explorer::api::ApiClient;
use sc_explorer::config::ApiConfig;
use sc_explorer::error::FetchError;
use sc_explorer::reference::{normalize, parse_competition_editions};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn edition(competition: u64, name: &str, season: u64, start: Value, end: Value) -> Value {
    json!({
        "competition": {"id": competition, "name": name},
        "season": {"id": season, "start_year": start, "end_year": end}
    })
}

#[test]
fn fixture_flattens_one_row_per_edition() {
    let raw = read_fixture("competition_editions.json");
    let results = parse_competition_editions(&raw, "fixture").expect("fixture should parse");
    let rows = normalize(&results).expect("fixture rows are complete");

    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].competition_id, 5);
    assert_eq!(rows[0].competition_name, "Premier League");
    assert_eq!(rows[0].season_id, 10);
    assert_eq!(rows[0].season_name, "2023/2024");
    assert_eq!(rows[2].season_name, "2023/2024");
    assert_eq!(rows[3].season_name, "2024/2024");
}

#[test]
fn season_name_joins_start_and_end_year() {
    let rows = normalize(&[edition(1, "Ligue 1", 3, json!(2023), json!(2024))])
        .expect("record is complete");
    assert_eq!(rows[0].season_name, "2023/2024");
}

#[test]
fn malformed_record_fails_fast_with_field_path() {
    let raw = vec![
        edition(1, "Ligue 1", 3, json!(2023), json!(2024)),
        json!({"competition": {"id": 2, "name": "Serie A"}, "season": {"start_year": 2023, "end_year": 2024}}),
        edition(4, "Eredivisie", 5, json!(2023), json!(2024)),
    ];

    let err = normalize(&raw).expect_err("second record has no season id");
    match err {
        FetchError::MalformedRecord { index, field } => {
            assert_eq!(index, 1);
            assert_eq!(field, "season.id");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn null_competition_name_is_malformed() {
    let raw = vec![json!({
        "competition": {"id": 2, "name": null},
        "season": {"id": 3, "start_year": 2023, "end_year": 2024}
    })];
    let err = normalize(&raw).expect_err("name is null");
    assert!(matches!(err, FetchError::MalformedRecord { ref field, .. } if field == "competition.name"));
}

#[test]
fn repeated_pairs_keep_first_occurrence() {
    let raw = vec![
        edition(1, "Ligue 1", 3, json!(2023), json!(2024)),
        edition(1, "Ligue 1 (dup)", 3, json!(2023), json!(2024)),
    ];
    let rows = normalize(&raw).expect("records are complete");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].competition_name, "Ligue 1");
}

#[test]
fn missing_or_empty_results_is_empty_result_set() {
    let missing = parse_competition_editions(r#"{"count": 0}"#, "u").expect_err("no results");
    assert!(matches!(missing, FetchError::EmptyResultSet { .. }));

    let empty = parse_competition_editions(r#"{"results": []}"#, "u").expect_err("empty results");
    assert!(matches!(empty, FetchError::EmptyResultSet { .. }));

    let garbage = parse_competition_editions("not json", "u").expect_err("garbage");
    assert!(matches!(garbage, FetchError::Decode { .. }));
}

#[test]
fn client_fetches_and_normalizes_editions() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/competition_editions/?user=true")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(read_fixture("competition_editions.json"))
        .expect(1)
        .create();

    let api = ApiClient::new(ApiConfig::new(&server.url(), "user", "pass"))
        .expect("client should build");
    let rows = api.fetch_competition_editions().expect("editions should load");

    assert_eq!(rows.len(), 4);
    mock.assert();
}

#[test]
fn client_follows_every_editions_page() {
    let mut server = Server::new();
    let base = server.url();
    let edition = |competition: u32, season: u32| {
        json!({
            "id": competition * 100 + season,
            "competition": {"id": competition, "name": format!("Competition {competition}")},
            "season": {"id": season, "start_year": 2023, "end_year": 2024}
        })
    };

    let first = server
        .mock("GET", "/competition_editions/?user=true")
        .with_status(200)
        .with_body(
            json!({
                "results": [edition(5, 10)],
                "next": format!("{base}/competition_editions/?user=true&offset=1")
            })
            .to_string(),
        )
        .expect(1)
        .create();
    let second = server
        .mock("GET", "/competition_editions/?user=true&offset=1")
        .with_status(200)
        .with_body(json!({"results": [edition(7, 10)], "next": null}).to_string())
        .expect(1)
        .create();

    let api = ApiClient::new(ApiConfig::new(&base, "user", "pass")).expect("client should build");
    let rows = api.fetch_competition_editions().expect("editions should load");

    let ids: Vec<u32> = rows.iter().map(|r| r.competition_id).collect();
    assert_eq!(ids, vec![5, 7]);
    first.assert();
    second.assert();
}

#[test]
fn client_reports_empty_editions() {
    let mut server = Server::new();
    server
        .mock("GET", "/competition_editions/?user=true")
        .with_status(200)
        .with_body(r#"{"count": 0, "next": null, "results": []}"#)
        .create();

    let api = ApiClient::new(ApiConfig::new(&server.url(), "user", "pass"))
        .expect("client should build");
    let err = api
        .fetch_competition_editions()
        .expect_err("account has no editions");

    assert!(matches!(err, FetchError::EmptyResultSet { .. }));
}
