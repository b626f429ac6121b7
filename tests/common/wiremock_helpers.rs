use std::time::Duration;
use wiremock::matchers::{header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const STORE_KEY: &str = "test-service-key";

/// Creates a mock site that answers HEAD with 200 for each of `live_paths`
/// and 404 for anything else.
pub async fn mock_site(live_paths: &[&str]) -> MockServer {
    let server = MockServer::start().await;

    for live in live_paths {
        Mock::given(method("HEAD"))
            .and(path(*live))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html"))
            .mount(&server)
            .await;
    }

    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(404))
        .with_priority(10)
        .mount(&server)
        .await;

    server
}

/// HEAD on `url_path` answers 405; GET answers `get_status` and must be
/// requested exactly once.
pub async fn mount_head_not_allowed(server: &MockServer, url_path: &str, get_status: u16) {
    Mock::given(method("HEAD"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(405))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(get_status).set_body_string("<html></html>"))
        .expect(1)
        .mount(server)
        .await;
}

/// `from` permanently redirects to `to`, which is live.
pub async fn mount_redirect(server: &MockServer, from: &str, to: &str) {
    Mock::given(method("HEAD"))
        .and(path(from))
        .respond_with(ResponseTemplate::new(301).insert_header("location", to))
        .mount(server)
        .await;

    Mock::given(method("HEAD"))
        .and(path(to))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

/// HEAD on `url_path` answers 200 after `delay_ms`, expected `hits` times.
pub async fn mount_slow_head(server: &MockServer, url_path: &str, delay_ms: u64, hits: u64) {
    Mock::given(method("HEAD"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(delay_ms)))
        .expect(hits)
        .mount(server)
        .await;
}

/// Creates a mock PostgREST store where every table is empty unless a more
/// specific mock is mounted.
pub async fn mock_store() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/rest/v1/[a-z_]+$"))
        .and(header("apikey", STORE_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .with_priority(10)
        .mount(&server)
        .await;

    server
}

/// Serve `rows` for `table` at the given page offset.
pub async fn mount_table_page(server: &MockServer, table: &str, offset: usize, rows: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/rest/v1/{}", table)))
        .and(query_param("offset", offset.to_string()))
        .and(header("apikey", STORE_KEY))
        .and(header("authorization", format!("Bearer {}", STORE_KEY).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

/// `table` answers `status` for the first `times` requests (all requests when
/// `times` is `None`).
pub async fn mount_table_failure(server: &MockServer, table: &str, status: u16, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path(format!("/rest/v1/{}", table)))
        .respond_with(ResponseTemplate::new(status).set_body_string("upstream unavailable"))
        .with_priority(1);

    let mock = match times {
        Some(n) => mock.up_to_n_times(n),
        None => mock,
    };
    mock.mount(server).await;
}

/// `table` always answers `status` with `body`.
pub async fn mount_table_error_body(server: &MockServer, table: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/rest/v1/{}", table)))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .with_priority(1)
        .mount(server)
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_site_serves_live_and_missing() {
        let server = mock_site(&["/pricing"]).await;
        let client = reqwest::Client::new();

        let live = client.head(format!("{}/pricing", server.uri())).send().await.unwrap();
        assert_eq!(live.status(), 200);

        let missing = client.head(format!("{}/nope", server.uri())).send().await.unwrap();
        assert_eq!(missing.status(), 404);
    }

    #[tokio::test]
    async fn test_mock_store_defaults_to_empty_tables() {
        let server = mock_store().await;
        let body: serde_json::Value = reqwest::Client::new()
            .get(format!("{}/rest/v1/pseo_roles", server.uri()))
            .header("apikey", STORE_KEY)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, serde_json::json!([]));
    }
}
