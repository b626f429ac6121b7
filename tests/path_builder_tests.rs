//! Address space properties of the path builder over a fixture dataset.

mod common;

use common::fixtures::{fixture_rules, site_data};
use std::collections::BTreeSet;
use urlmatrix::config::UnmappedPolicy;
use urlmatrix::model::{DecisionType, Framework, Industry, SiteData, Tool};
use urlmatrix::paths::{build_paths, RuleSet};

#[test]
fn test_build_is_deterministic() {
    let data = site_data();
    let rules = fixture_rules();

    let first = build_paths(&data, &rules);
    let second = build_paths(&data, &rules);

    assert_eq!(first.paths, second.paths);
    assert_eq!(first.counts, second.counts);
}

#[test]
fn test_reordered_rows_produce_same_paths() {
    let data = site_data();
    let mut reversed = data.clone();
    reversed.frameworks.reverse();
    reversed.industries.reverse();
    reversed.tools.reverse();
    reversed.pseo_pages.reverse();

    let rules = fixture_rules();
    assert_eq!(build_paths(&data, &rules).paths, build_paths(&reversed, &rules).paths);
}

#[test]
fn test_no_duplicates_and_sorted() {
    let output = build_paths(&site_data(), &fixture_rules());
    let unique: BTreeSet<&String> = output.paths.iter().collect();
    assert_eq!(unique.len(), output.paths.len());

    let mut sorted = output.paths.clone();
    sorted.sort();
    assert_eq!(sorted, output.paths);
}

#[test]
fn test_no_malformed_paths() {
    let output = build_paths(&site_data(), &fixture_rules());
    for path in &output.paths {
        assert!(path.starts_with('/'), "{} must start with /", path);
        assert!(!path.contains("undefined"), "{} contains undefined", path);
        assert!(!path.contains("//"), "{} has an empty segment", path);
        assert!(path == "/" || !path.ends_with('/'), "{} has a trailing slash", path);
    }
}

#[test]
fn test_pair_canonicalization() {
    let output = build_paths(&site_data(), &fixture_rules());
    assert!(output.paths.contains(&"/compare/drata-vs-vanta".to_string()));
    assert!(!output.paths.iter().any(|p| p.contains("vanta-vs-drata")));
    assert!(output.paths.contains(&"/compare/drata-vs-vanta/for/fintech".to_string()));
}

#[test]
fn test_category_coverage() {
    let output = build_paths(&site_data(), &fixture_rules());
    let has = |p: &str| output.paths.iter().any(|x| x == p);

    assert!(has("/pricing/acme"));
    assert!(has("/soc-2/for/cto"));
    assert!(has("/compliance/soc-2/checklist"));
    assert!(has("/ai-governance/mapping"));
    assert!(has("/ai-governance/model-cards"));

    // Nested slug and the unrecognized category produce nothing
    assert!(!output.paths.iter().any(|p| p.contains("guides")));
    assert!(!output.paths.iter().any(|p| p.ends_with("/mystery")));
}

#[test]
fn test_unmapped_pages_reported() {
    let output = build_paths(&site_data(), &fixture_rules());
    assert_eq!(output.unmapped.len(), 1);
    let page = &output.unmapped[0];
    assert_eq!(page.slug, "mystery");
    assert_eq!(page.category.as_deref(), Some("widgets"));
    assert_eq!(page.framework.as_deref(), Some("iso-27001"));
}

#[test]
fn test_unmapped_pages_listed_under_ignore_policy() {
    let mut rules = fixture_rules();
    rules.unmapped_policy = UnmappedPolicy::Ignore;
    let output = build_paths(&site_data(), &rules);
    assert_eq!(output.unmapped.len(), 1);
}

#[test]
fn test_route_family_counts() {
    let output = build_paths(&site_data(), &fixture_rules());
    let counts = &output.counts;

    assert_eq!(counts.static_routes, 0);
    assert_eq!(counts.directory_companies, 2);
    assert_eq!(counts.migrations, 1);
    assert_eq!(counts.auditor_locations, 1);
    assert_eq!(counts.pseo_mapped, 5);
    assert_eq!(counts.framework_matrix, 12);
    assert_eq!(counts.role_matrix, 4);
    assert_eq!(counts.compare_industry_matrix, 12);
    // vanta-alternatives/for/* already came from the company rule
    assert_eq!(counts.compare_tool_core, 7);

    assert_eq!(counts.total(), output.paths.len());
    assert_eq!(output.paths.len(), 44);
}

#[test]
fn test_last_modified_tracked_for_dated_records() {
    let output = build_paths(&site_data(), &fixture_rules());
    assert_eq!(
        output.last_modified.get("/compliance/directory/acme").map(String::as_str),
        Some("2024-05-01T12:00:00+00:00")
    );
    assert!(output.last_modified.contains_key("/pricing/acme"));
    assert!(!output.last_modified.contains_key("/compliance/directory/vanta"));
}

#[test]
fn test_matrix_respects_allow_list() {
    let data = SiteData {
        frameworks: vec![
            Framework { slug: "soc-2".into() },
            Framework { slug: "nist-csf".into() },
        ],
        decisions: vec![
            DecisionType { slug: "cost".into() },
            DecisionType { slug: "timeline".into() },
        ],
        industries: vec![
            Industry { slug: "fintech".into() },
            Industry { slug: "saas".into() },
        ],
        ..SiteData::default()
    };

    let rules = RuleSet {
        matrix_frameworks: ["soc-2".to_string()].into_iter().collect(),
        ..RuleSet::default()
    };

    let output = build_paths(&data, &rules);
    assert_eq!(output.counts.framework_matrix, 4);
    assert_eq!(
        output.paths,
        vec![
            "/soc-2/cost/fintech",
            "/soc-2/cost/saas",
            "/soc-2/timeline/fintech",
            "/soc-2/timeline/saas",
        ]
    );
}

#[test]
fn test_tool_universe_unions_fallback_list() {
    let data = SiteData {
        tools: vec![Tool { slug: "vanta".into() }],
        ..SiteData::default()
    };
    let rules = RuleSet {
        fallback_tools: vec!["drata".to_string(), "vanta".to_string()],
        ..RuleSet::default()
    };

    let output = build_paths(&data, &rules);
    assert_eq!(
        output.paths,
        vec![
            "/compare/drata-alternatives",
            "/compare/drata-vs-vanta",
            "/compare/vanta-alternatives",
            "/pricing/drata",
            "/pricing/vanta",
        ]
    );
}
