use std::time::Duration;

use mockito::{Matcher, Server};
use serde_json::json;

use sc_explorer::api::ApiClient;
use sc_explorer::config::{ApiConfig, RetryPolicy};
use sc_explorer::error::FetchError;

fn client_for(base_url: &str) -> ApiClient {
    let mut config = ApiConfig::new(base_url, "user", "pass");
    config.timeout = Duration::from_secs(5);
    ApiClient::new(config).expect("client should build")
}

fn page(results: serde_json::Value, next: Option<String>) -> String {
    json!({ "results": results, "next": next }).to_string()
}

#[test]
fn fetch_all_concatenates_every_page_in_order() {
    let mut server = Server::new();
    let base = server.url();

    let first = server
        .mock("GET", "/matches/?user=true")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(page(
            json!([{"id": 1}, {"id": 2}]),
            Some(format!("{base}/matches/?user=true&offset=2")),
        ))
        .expect(1)
        .create();
    let second = server
        .mock("GET", "/matches/?user=true&offset=2")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(page(
            json!([{"id": 3}]),
            Some(format!("{base}/matches/?user=true&offset=3")),
        ))
        .expect(1)
        .create();
    let third = server
        .mock("GET", "/matches/?user=true&offset=3")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(page(json!([{"id": 4}, {"id": 5}]), None))
        .expect(1)
        .create();

    let api = client_for(&base);
    let results = api.fetch_all(&api.matches_url()).expect("pages should load");

    let ids: Vec<u64> = results.iter().filter_map(|v| v["id"].as_u64()).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    first.assert();
    second.assert();
    third.assert();
}

#[test]
fn single_page_without_next_key_terminates() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/matches/?user=true")
        .with_status(200)
        .with_body(json!({"results": [{"id": 7}]}).to_string())
        .expect(1)
        .create();

    let api = client_for(&server.url());
    let results = api.fetch_all(&api.matches_url()).expect("page should load");

    assert_eq!(results.len(), 1);
    mock.assert();
}

#[test]
fn empty_next_string_terminates() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/matches/?user=true")
        .with_status(200)
        .with_body(page(json!([{"id": 1}]), Some(String::new())))
        .expect(1)
        .create();

    let api = client_for(&server.url());
    let results = api.fetch_all(&api.matches_url()).expect("page should load");

    assert_eq!(results.len(), 1);
    mock.assert();
}

#[test]
fn failure_on_a_later_page_discards_everything() {
    let mut server = Server::new();
    let base = server.url();

    server
        .mock("GET", "/matches/?user=true")
        .with_status(200)
        .with_body(page(
            json!([{"id": 1}, {"id": 2}]),
            Some(format!("{base}/matches/?user=true&offset=2")),
        ))
        .create();
    server
        .mock("GET", "/matches/?user=true&offset=2")
        .with_status(500)
        .with_body("upstream exploded")
        .create();

    let api = client_for(&base);
    let err = api
        .fetch_all(&api.matches_url())
        .expect_err("second page fails");

    match err {
        FetchError::Http { status, body, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn unreachable_host_is_a_transport_error() {
    let mut config = ApiConfig::new("http://127.0.0.1:1", "user", "pass");
    config.timeout = Duration::from_secs(2);
    let api = ApiClient::new(config).expect("client should build");

    let err = api
        .fetch_all(&api.matches_url())
        .expect_err("nothing listens on port 1");

    assert!(matches!(err, FetchError::Transport { .. }));
    assert!(err.is_retryable());
}

#[test]
fn undecodable_page_is_a_decode_error() {
    let mut server = Server::new();
    server
        .mock("GET", "/matches/?user=true")
        .with_status(200)
        .with_body("<html>maintenance</html>")
        .create();

    let api = client_for(&server.url());
    let err = api
        .fetch_all(&api.matches_url())
        .expect_err("html is not a page");

    assert!(matches!(err, FetchError::Decode { .. }));
}

#[test]
fn repeated_cursor_is_rejected() {
    let mut server = Server::new();
    let base = server.url();

    let looping = server
        .mock("GET", "/matches/?user=true")
        .with_status(200)
        .with_body(page(
            json!([{"id": 1}]),
            Some(format!("{base}/matches/?user=true")),
        ))
        .expect(1)
        .create();

    let api = client_for(&base);
    let err = api
        .fetch_all(&api.matches_url())
        .expect_err("cursor points back at itself");

    assert!(matches!(err, FetchError::CursorLoop { .. }));
    looping.assert();
}

#[test]
fn requests_carry_basic_auth() {
    let mut server = Server::new();
    // base64("user:pass")
    let mock = server
        .mock("GET", "/matches/?user=true")
        .match_header("authorization", "Basic dXNlcjpwYXNz")
        .match_header("accept", "application/json")
        .with_status(200)
        .with_body(page(json!([]), None))
        .expect(1)
        .create();

    let api = client_for(&server.url());
    let results = api.fetch_all(&api.matches_url()).expect("authorized");

    assert!(results.is_empty());
    mock.assert();
}

#[test]
fn unauthorized_is_not_retried() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/matches/?user=true")
        .with_status(401)
        .with_body("bad credentials")
        .expect(1)
        .create();

    let mut config = ApiConfig::new(&server.url(), "user", "wrong");
    config.retry = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
    };
    let api = ApiClient::new(config).expect("client should build");

    let err = api
        .fetch_all(&api.matches_url())
        .expect_err("credentials rejected");

    assert_eq!(err.status(), Some(401));
    mock.assert();
}

#[test]
fn transient_server_error_is_retried() {
    let mut server = Server::new();
    let unavailable = server
        .mock("GET", "/matches/?user=true")
        .with_status(503)
        .expect(1)
        .create();
    let ok = server
        .mock("GET", "/matches/?user=true")
        .with_status(200)
        .with_body(page(json!([{"id": 9}]), None))
        .expect(1)
        .create();

    let mut config = ApiConfig::new(&server.url(), "user", "pass");
    config.retry = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
    };
    let api = ApiClient::new(config).expect("client should build");

    let results = api
        .fetch_all(&api.matches_url())
        .expect("second attempt succeeds");

    assert_eq!(results.len(), 1);
    unavailable.assert();
    ok.assert();
}

#[test]
fn default_policy_surfaces_first_server_error() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/matches/?user=true")
        .with_status(503)
        .expect(1)
        .create();

    let api = client_for(&server.url());
    let err = api
        .fetch_all(&api.matches_url())
        .expect_err("no retries by default");

    assert_eq!(err.status(), Some(503));
    mock.assert();
}

#[test]
fn fetch_all_matches_validates_records() {
    let mut server = Server::new();
    server
        .mock("GET", "/matches/?user=true")
        .with_status(200)
        .with_body(page(
            json!([
                {
                    "id": 11,
                    "competition_id": 5,
                    "season_id": 10,
                    "date_time": "2024-03-09T12:30:00Z",
                    "home_team": {"short_name": "Arsenal", "id": 1},
                    "away_team": {"short_name": "Chelsea", "id": 2},
                    "status": "closed"
                },
                {
                    "id": 12,
                    "competition_id": 5,
                    "season_id": 10,
                    "date_time": "2024-03-10T12:30:00Z",
                    "home_team": {"short_name": "Leeds"}
                }
            ]),
            None,
        ))
        .create();

    let api = client_for(&server.url());
    let err = api.fetch_all_matches().expect_err("second record has no away team");

    match err {
        FetchError::MalformedRecord { index, field } => {
            assert_eq!(index, 1);
            assert_eq!(field, "away_team");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn physical_query_carries_season_filters() {
    use sc_explorer::physical::{PerformanceSource, PhysicalParams};

    let mut server = Server::new();
    let mock = server
        .mock("GET", Matcher::Regex(r"^/physical/".to_string()))
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("competition".into(), "5".into()),
            Matcher::UrlEncoded("season".into(), "10".into()),
            Matcher::UrlEncoded("group_by".into(), "player,team,competition,season,group".into()),
            Matcher::UrlEncoded("possession".into(), "all,tip,otip".into()),
            Matcher::UrlEncoded("playing_time__gte".into(), "60".into()),
            Matcher::UrlEncoded("count_match__gte".into(), "8".into()),
            Matcher::UrlEncoded("data_version".into(), "3".into()),
        ]))
        .with_status(200)
        .with_body(page(
            json!([{"player_id": 1, "player_short_name": "B. Saka", "team_name": "Arsenal", "position_group": "Wide Attacker", "psv99": 33.1}]),
            None,
        ))
        .expect(1)
        .create();

    let api = client_for(&server.url());
    let table = api
        .get_physical(&PhysicalParams::for_season(5, 10))
        .expect("physical data");

    assert_eq!(table.len(), 1);
    assert_eq!(table.rows[0].plot_label, "B. Saka | Wide Attacker");
    mock.assert();
}

#[test]
fn physical_query_values_are_encoded() {
    use sc_explorer::physical::{PhysicalParams, physical_url};

    let api = client_for("https://api.test");
    let mut params = PhysicalParams::for_season(5, 10);
    params.possession = "all&season=99".to_string();

    let url = physical_url(&api, &params).expect("valid url");
    assert_eq!(url.path(), "/physical/");

    let seasons: Vec<String> = url
        .query_pairs()
        .filter(|(k, _)| k == "season")
        .map(|(_, v)| v.into_owned())
        .collect();
    assert_eq!(seasons, vec!["10"]);
    let possession = url
        .query_pairs()
        .find(|(k, _)| k == "possession")
        .map(|(_, v)| v.into_owned());
    assert_eq!(possession.as_deref(), Some("all&season=99"));
}
