//! Path builder: expands store records into the site's canonical paths.
//!
//! Every rule is applied independently to the full record collections and all
//! output goes through one [`PathSet`], so a path produced by two rules is
//! counted once, under the rule that produced it first. The rule set (matrix
//! allow-lists, AI categories, top tools, static routes) is injected through
//! [`RuleSet`] rather than read from globals.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::config::{AppConfig, UnmappedPolicy};
use crate::model::{ContentPage, SiteData};
use crate::normalize::{is_publishable, normalize_path};

/// Injected rule set for the builder.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub matrix_frameworks: BTreeSet<String>,
    pub role_matrix_frameworks: BTreeSet<String>,
    pub compliance_frameworks: BTreeSet<String>,
    pub ai_framework_slug: String,
    pub ai_categories: BTreeSet<String>,
    pub top_tools: Vec<String>,
    pub static_paths: Vec<String>,
    pub fallback_tools: Vec<String>,
    pub unmapped_policy: UnmappedPolicy,
    pub expected_unmapped: BTreeSet<String>,
}

impl RuleSet {
    pub fn from_config(config: &AppConfig) -> Self {
        let rules = &config.rules;
        Self {
            matrix_frameworks: rules.matrix_frameworks.iter().cloned().collect(),
            role_matrix_frameworks: rules.role_matrix_frameworks.iter().cloned().collect(),
            compliance_frameworks: rules.compliance_frameworks.iter().cloned().collect(),
            ai_framework_slug: rules.ai_framework_slug.clone(),
            ai_categories: rules.ai_categories.iter().cloned().collect(),
            top_tools: rules.top_tools.clone(),
            static_paths: config.routes.static_paths.clone(),
            fallback_tools: config.routes.fallback_tools.clone(),
            unmapped_policy: rules.unmapped.policy,
            expected_unmapped: rules.unmapped.expected_categories.iter().cloned().collect(),
        }
    }

    /// Whether a dropped content page with `category` is logged as a warning.
    pub fn warns_on_unmapped(&self, category: Option<&str>) -> bool {
        self.unmapped_policy == UnmappedPolicy::Warn
            && !category.is_some_and(|c| self.expected_unmapped.contains(c))
    }
}

/// Generation rule a path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteFamily {
    StaticRoutes,
    DirectoryCompanies,
    Migrations,
    AuditorLocations,
    PseoMapped,
    FrameworkMatrix,
    RoleMatrix,
    CompareIndustryMatrix,
    CompareToolCore,
}

/// Newly inserted paths per generation rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteFamilyCounts {
    pub static_routes: usize,
    pub directory_companies: usize,
    pub migrations: usize,
    pub auditor_locations: usize,
    pub pseo_mapped: usize,
    pub framework_matrix: usize,
    pub role_matrix: usize,
    pub compare_industry_matrix: usize,
    pub compare_tool_core: usize,
}

impl RouteFamilyCounts {
    fn slot(&mut self, family: RouteFamily) -> &mut usize {
        match family {
            RouteFamily::StaticRoutes => &mut self.static_routes,
            RouteFamily::DirectoryCompanies => &mut self.directory_companies,
            RouteFamily::Migrations => &mut self.migrations,
            RouteFamily::AuditorLocations => &mut self.auditor_locations,
            RouteFamily::PseoMapped => &mut self.pseo_mapped,
            RouteFamily::FrameworkMatrix => &mut self.framework_matrix,
            RouteFamily::RoleMatrix => &mut self.role_matrix,
            RouteFamily::CompareIndustryMatrix => &mut self.compare_industry_matrix,
            RouteFamily::CompareToolCore => &mut self.compare_tool_core,
        }
    }

    pub fn get(&self, family: RouteFamily) -> usize {
        match family {
            RouteFamily::StaticRoutes => self.static_routes,
            RouteFamily::DirectoryCompanies => self.directory_companies,
            RouteFamily::Migrations => self.migrations,
            RouteFamily::AuditorLocations => self.auditor_locations,
            RouteFamily::PseoMapped => self.pseo_mapped,
            RouteFamily::FrameworkMatrix => self.framework_matrix,
            RouteFamily::RoleMatrix => self.role_matrix,
            RouteFamily::CompareIndustryMatrix => self.compare_industry_matrix,
            RouteFamily::CompareToolCore => self.compare_tool_core,
        }
    }

    pub fn total(&self) -> usize {
        self.static_routes
            + self.directory_companies
            + self.migrations
            + self.auditor_locations
            + self.pseo_mapped
            + self.framework_matrix
            + self.role_matrix
            + self.compare_industry_matrix
            + self.compare_tool_core
    }
}

/// Deduplicating, ordered set of canonical paths.
#[derive(Debug, Clone, Default)]
pub struct PathSet {
    paths: BTreeSet<String>,
}

impl PathSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize and insert. Returns `true` only when a new, publishable path
    /// was added.
    pub fn insert(&mut self, raw: &str) -> bool {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return false;
        }
        let normalized = normalize_path(trimmed);
        if !is_publishable(&normalized) {
            debug!("Dropping unpublishable path: {}", raw);
            return false;
        }
        self.paths.insert(normalized)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Sorted paths
    pub fn into_sorted(self) -> Vec<String> {
        self.paths.into_iter().collect()
    }
}

/// Join path segments, or `None` if any segment is blank.
fn join_segments(segments: &[&str]) -> Option<String> {
    let mut path = String::new();
    for segment in segments {
        let segment = segment.trim();
        if segment.is_empty() {
            return None;
        }
        path.push('/');
        path.push_str(segment);
    }
    Some(path)
}

/// `{a}-vs-{b}` with the two slugs in lexical order.
pub fn pair_slug(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}-vs-{}", a, b)
    } else {
        format!("{}-vs-{}", b, a)
    }
}

/// Template a content page resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRoute {
    Mapped(String),
    /// Record has no slug
    MissingSlug,
    /// Slug has an embedded `/` and is served by a nested route elsewhere
    NestedSlug,
    /// No template matches the page's category
    Unmapped,
}

/// Resolve a content page to its single template by category.
pub fn resolve_page(page: &ContentPage, rules: &RuleSet) -> PageRoute {
    let slug = page.slug.trim();
    if slug.is_empty() {
        return PageRoute::MissingSlug;
    }
    if slug.contains('/') {
        return PageRoute::NestedSlug;
    }

    let framework = page.framework_slug();
    let category = page.category.as_deref().unwrap_or("");

    let path = match category {
        "role" => join_segments(&["soc-2", "for", slug]),
        "industry" => join_segments(&["soc-2", "industries", slug]),
        "pricing" => join_segments(&["pricing", slug]),
        "alternatives" => join_segments(&["compare", slug]),
        "directory" => join_segments(&["auditor-directory", slug]),
        "stack" => join_segments(&["soc-2", "stack", slug]),
        "compliance" => match framework {
            Some(fw) if rules.compliance_frameworks.contains(fw) => {
                join_segments(&["compliance", fw, slug])
            }
            _ => join_segments(&["ai-governance", slug]),
        },
        other => {
            if framework == Some(rules.ai_framework_slug.as_str())
                || rules.ai_categories.contains(other)
            {
                join_segments(&["ai-governance", slug])
            } else {
                None
            }
        }
    };

    match path {
        Some(path) => PageRoute::Mapped(path),
        None => PageRoute::Unmapped,
    }
}

/// A content page no template matched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmappedPage {
    pub slug: String,
    pub category: Option<String>,
    pub framework: Option<String>,
}

/// Builder output: sorted unique paths plus provenance
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub paths: Vec<String>,
    pub counts: RouteFamilyCounts,
    pub unmapped: Vec<UnmappedPage>,
    /// `updated_at` of the record that produced a path, where one exists
    pub last_modified: BTreeMap<String, String>,
}

/// Expands [`SiteData`] into canonical paths under a [`RuleSet`].
pub struct PathBuilder<'a> {
    rules: &'a RuleSet,
    set: PathSet,
    counts: RouteFamilyCounts,
    unmapped: Vec<UnmappedPage>,
    last_modified: BTreeMap<String, String>,
}

impl<'a> PathBuilder<'a> {
    pub fn new(rules: &'a RuleSet) -> Self {
        Self {
            rules,
            set: PathSet::new(),
            counts: RouteFamilyCounts::default(),
            unmapped: Vec::new(),
            last_modified: BTreeMap::new(),
        }
    }

    fn add(&mut self, family: RouteFamily, path: Option<String>) -> bool {
        let Some(path) = path else {
            return false;
        };
        let added = self.set.insert(&path);
        if added {
            *self.counts.slot(family) += 1;
        }
        added
    }

    fn add_dated(&mut self, family: RouteFamily, path: Option<String>, updated_at: Option<&str>) {
        let Some(path) = path else {
            return;
        };
        if self.add(family, Some(path.clone())) {
            if let Some(ts) = updated_at.filter(|ts| !ts.is_empty()) {
                self.last_modified.insert(normalize_path(&path), ts.to_string());
            }
        }
    }

    /// Run every rule over `data`.
    pub fn build(mut self, data: &SiteData) -> BuildOutput {
        let rules = self.rules;

        for route in &rules.static_paths {
            self.add(RouteFamily::StaticRoutes, Some(route.clone()));
        }

        for company in &data.companies {
            let path = join_segments(&["compliance", "directory", &company.slug]);
            self.add_dated(RouteFamily::DirectoryCompanies, path, company.updated_at.as_deref());
        }

        for migration in &data.migrations {
            let path = join_segments(&["compliance", "migrate", &migration.slug]);
            self.add(RouteFamily::Migrations, path);
        }

        for location in &data.locations {
            let path = join_segments(&["auditor-directory", &location.slug]);
            self.add(RouteFamily::AuditorLocations, path);
        }

        self.add_content_pages(data);
        self.add_framework_matrix(data);
        self.add_role_matrix(data);
        self.add_company_comparisons(data);
        self.add_tool_comparisons(data);

        BuildOutput {
            paths: self.set.into_sorted(),
            counts: self.counts,
            unmapped: self.unmapped,
            last_modified: self.last_modified,
        }
    }

    fn add_content_pages(&mut self, data: &SiteData) {
        for page in &data.pseo_pages {
            match resolve_page(page, self.rules) {
                PageRoute::Mapped(path) => {
                    self.add_dated(RouteFamily::PseoMapped, Some(path), page.updated_at.as_deref());
                }
                PageRoute::NestedSlug => {
                    debug!("Skipping nested content slug: {}", page.slug);
                }
                PageRoute::MissingSlug => {
                    debug!("Skipping content page without slug (category: {:?})", page.category);
                }
                PageRoute::Unmapped => self.record_unmapped(page),
            }
        }
    }

    fn record_unmapped(&mut self, page: &ContentPage) {
        let category = page.category.clone();

        if self.rules.warns_on_unmapped(category.as_deref()) {
            warn!(
                "Content page '{}' (category: {}, framework: {}) matches no route template and will not be verified",
                page.slug,
                category.as_deref().unwrap_or("<none>"),
                page.framework_slug().unwrap_or("<none>")
            );
        }

        self.unmapped.push(UnmappedPage {
            slug: page.slug.clone(),
            category,
            framework: page.framework_slug().map(str::to_string),
        });
    }

    fn add_framework_matrix(&mut self, data: &SiteData) {
        let rules = self.rules;
        for framework in data.frameworks.iter().filter(|f| rules.matrix_frameworks.contains(&f.slug)) {
            for decision in &data.decisions {
                for industry in &data.industries {
                    let path = join_segments(&[&framework.slug, &decision.slug, &industry.slug]);
                    self.add(RouteFamily::FrameworkMatrix, path);
                }
            }
        }
    }

    fn add_role_matrix(&mut self, data: &SiteData) {
        let rules = self.rules;
        for framework in data
            .frameworks
            .iter()
            .filter(|f| rules.role_matrix_frameworks.contains(&f.slug))
        {
            for role in &data.roles {
                for industry in &data.industries {
                    let path = join_segments(&[&framework.slug, "for", &role.slug, &industry.slug]);
                    self.add(RouteFamily::RoleMatrix, path);
                }
            }
        }
    }

    fn add_company_comparisons(&mut self, data: &SiteData) {
        let rules = self.rules;
        for company in &data.companies {
            let slug = company.slug.trim();
            let is_top = rules.top_tools.iter().any(|t| t == slug);

            for industry in &data.industries {
                let alternatives = format!("{}-alternatives", slug);
                let path = if slug.is_empty() {
                    None
                } else {
                    join_segments(&["compare", &alternatives, "for", &industry.slug])
                };
                self.add(RouteFamily::CompareIndustryMatrix, path);

                if !is_top {
                    continue;
                }
                for peer in rules.top_tools.iter().filter(|p| p.as_str() != slug) {
                    let pair = pair_slug(slug, peer);
                    let path = join_segments(&["compare", &pair, "for", &industry.slug]);
                    self.add(RouteFamily::CompareIndustryMatrix, path);
                }
            }
        }
    }

    /// Union of database tools and the static pricing list, sorted.
    fn tool_universe(&self, data: &SiteData) -> Vec<String> {
        data.tools
            .iter()
            .map(|t| t.slug.trim().to_string())
            .chain(self.rules.fallback_tools.iter().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn add_tool_comparisons(&mut self, data: &SiteData) {
        let tools = self.tool_universe(data);

        for tool in &tools {
            self.add(RouteFamily::CompareToolCore, join_segments(&["pricing", tool]));
            let alternatives = format!("{}-alternatives", tool);
            self.add(RouteFamily::CompareToolCore, join_segments(&["compare", &alternatives]));
        }

        for (i, a) in tools.iter().enumerate() {
            for b in &tools[i + 1..] {
                let pair = pair_slug(a, b);
                self.add(RouteFamily::CompareToolCore, join_segments(&["compare", &pair]));
            }
        }

        for tool in &tools {
            let alternatives = format!("{}-alternatives", tool);
            for industry in &data.industries {
                let path = join_segments(&["compare", &alternatives, "for", &industry.slug]);
                self.add(RouteFamily::CompareToolCore, path);
            }
        }
    }
}

/// Build the full path set for `data` under `rules`.
pub fn build_paths(data: &SiteData, rules: &RuleSet) -> BuildOutput {
    PathBuilder::new(rules).build(data)
}
