use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

use urlmatrix::config::AppConfig;
use urlmatrix::model::SiteData;
use urlmatrix::paths::RuleSet;

pub fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

pub fn load_fixture(relative: &str) -> String {
    fs::read_to_string(fixture_path(relative))
        .unwrap_or_else(|_| panic!("Failed to load fixture: {}", relative))
}

pub fn load_json_fixture<T: DeserializeOwned>(relative: &str) -> T {
    let content = load_fixture(relative);
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse JSON fixture {}: {}", relative, e))
}

pub fn site_data() -> SiteData {
    load_json_fixture("site_data.json")
}

/// Production rules without the literal route list and static tool list, so
/// every path in a test comes from the fixture rows.
pub fn fixture_rules() -> RuleSet {
    let config = AppConfig::embedded_default().expect("embedded config");
    let mut rules = RuleSet::from_config(&config);
    rules.static_paths.clear();
    rules.fallback_tools.clear();
    rules
}

/// A small configuration for end-to-end binary runs: two literal routes, one
/// matrix framework and no static tool list.
pub fn small_config(snapshot: &Path, report: &Path) -> String {
    format!(
        r#"
[site]
base_url = "https://risclens.com"
base_url_env = "URLMATRIX_TEST_UNSET_BASE_URL"

[store]
url_env = "URLMATRIX_TEST_STORE_URL"
key_env = "URLMATRIX_TEST_STORE_KEY"
page_size = 1000
request_timeout_ms = 5000

[http]
user_agent = "urlmatrix-tests/1.0"
accept = "text/html,application/xhtml+xml"
timeout_ms = 2000
concurrency = 4
method_fallback_statuses = [405, 501]
max_redirects = 5
progress_every_batches = 1

[retry]
strategy = "linear"
fetch_max_attempts = 2
fetch_backoff_ms = 10
verify_max_attempts = 2
verify_backoff_ms = 10

[rules]
matrix_frameworks = ["soc-2"]
role_matrix_frameworks = []
compliance_frameworks = ["soc-2"]
ai_framework_slug = "ai-governance"
ai_categories = []
top_tools = []

[routes]
static_paths = ["/", "/pricing"]
fallback_tools = []

[report]
output_file = {report:?}
snapshot_file = {snapshot:?}
failure_sample_size = 30
"#,
        report = report.display().to_string(),
        snapshot = snapshot.display().to_string(),
    )
}

/// One framework in the matrix, one decision, one industry.
pub const SMALL_DATASET: &str = r#"{
  "frameworks": [{"slug": "soc-2"}, {"slug": "nist-csf"}],
  "decisions": [{"slug": "cost"}],
  "industries": [{"slug": "fintech"}]
}"#;

/// Paths generated from [`small_config`] + [`SMALL_DATASET`]
pub const SMALL_DATASET_PATHS: [&str; 3] = ["/", "/pricing", "/soc-2/cost/fintech"];
