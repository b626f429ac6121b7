//! Typed records read from the content store.
//!
//! Each dimension table gets its own record type so a schema change on the
//! store side shows up as a decode error instead of a silently missing path.
//! Slugs that are absent or `null` decode as empty strings; the path builder
//! skips them.

use serde::{Deserialize, Deserializer, Serialize};

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A compliance standard, e.g. `soc-2`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Framework {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub slug: String,
}

/// A topic/intent axis, e.g. `cost`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionType {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub slug: String,
}

/// A vertical, e.g. `fintech`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Industry {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub slug: String,
}

/// A persona, e.g. `cto`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub slug: String,
}

/// A tracked vendor from `company_signals`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub slug: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// A migration guide target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub slug: String,
}

/// A city node in the auditor directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub slug: String,
}

/// An active record from `compliance_tools`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub slug: String,
}

/// The embedded framework of a content page.
///
/// PostgREST returns a to-one embed as an object, but older views returned an
/// array; both shapes are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrameworkRef {
    One(FrameworkSlug),
    Many(Vec<FrameworkSlug>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkSlug {
    #[serde(default)]
    pub slug: Option<String>,
}

impl FrameworkRef {
    pub fn slug(&self) -> Option<&str> {
        let slug = match self {
            FrameworkRef::One(inner) => inner.slug.as_deref(),
            FrameworkRef::Many(items) => items.first().and_then(|f| f.slug.as_deref()),
        };
        slug.filter(|s| !s.is_empty())
    }
}

/// A generic templated content record from `pseo_pages`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPage {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub slug: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub framework: Option<FrameworkRef>,
}

impl ContentPage {
    pub fn framework_slug(&self) -> Option<&str> {
        self.framework.as_ref().and_then(FrameworkRef::slug)
    }
}

/// The dimension tables consumed by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Companies,
    Migrations,
    ContentPages,
    Frameworks,
    Decisions,
    Industries,
    Roles,
    Locations,
    Tools,
}

impl Dimension {
    pub const ALL: [Dimension; 9] = [
        Dimension::Companies,
        Dimension::Migrations,
        Dimension::ContentPages,
        Dimension::Frameworks,
        Dimension::Decisions,
        Dimension::Industries,
        Dimension::Roles,
        Dimension::Locations,
        Dimension::Tools,
    ];

    /// Backing table name in the content store.
    pub fn table(&self) -> &'static str {
        match self {
            Dimension::Companies => "company_signals",
            Dimension::Migrations => "framework_migrations",
            Dimension::ContentPages => "pseo_pages",
            Dimension::Frameworks => "pseo_frameworks",
            Dimension::Decisions => "pseo_decision_types",
            Dimension::Industries => "pseo_industries",
            Dimension::Roles => "pseo_roles",
            Dimension::Locations => "pseo_locations",
            Dimension::Tools => "compliance_tools",
        }
    }
}

/// Everything read from the store for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteData {
    pub companies: Vec<Company>,
    pub migrations: Vec<Migration>,
    #[serde(alias = "pseoPages")]
    pub pseo_pages: Vec<ContentPage>,
    pub frameworks: Vec<Framework>,
    pub decisions: Vec<DecisionType>,
    pub industries: Vec<Industry>,
    pub roles: Vec<Role>,
    pub locations: Vec<Location>,
    pub tools: Vec<Tool>,
}

impl SiteData {
    pub fn count(&self, dimension: Dimension) -> usize {
        match dimension {
            Dimension::Companies => self.companies.len(),
            Dimension::Migrations => self.migrations.len(),
            Dimension::ContentPages => self.pseo_pages.len(),
            Dimension::Frameworks => self.frameworks.len(),
            Dimension::Decisions => self.decisions.len(),
            Dimension::Industries => self.industries.len(),
            Dimension::Roles => self.roles.len(),
            Dimension::Locations => self.locations.len(),
            Dimension::Tools => self.tools.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framework_ref_object_and_array() {
        let page: ContentPage = serde_json::from_str(
            r#"{"slug":"a","category":"compliance","framework":{"slug":"hipaa"}}"#,
        )
        .unwrap();
        assert_eq!(page.framework_slug(), Some("hipaa"));

        let page: ContentPage = serde_json::from_str(
            r#"{"slug":"a","category":"compliance","framework":[{"slug":"gdpr"},{"slug":"soc-2"}]}"#,
        )
        .unwrap();
        assert_eq!(page.framework_slug(), Some("gdpr"));

        let page: ContentPage =
            serde_json::from_str(r#"{"slug":"a","category":null,"framework":[]}"#).unwrap();
        assert_eq!(page.framework_slug(), None);
        assert_eq!(page.category, None);
    }

    #[test]
    fn test_null_slug_decodes_as_empty() {
        let company: Company = serde_json::from_str(r#"{"slug":null,"updated_at":null}"#).unwrap();
        assert!(company.slug.is_empty());

        let tool: Tool = serde_json::from_str("{}").unwrap();
        assert!(tool.slug.is_empty());
    }

    #[test]
    fn test_site_data_counts() {
        let data: SiteData = serde_json::from_str(
            r#"{"frameworks":[{"slug":"soc-2"},{"slug":"gdpr"}],"pseoPages":[{"slug":"x"}]}"#,
        )
        .unwrap();
        assert_eq!(data.count(Dimension::Frameworks), 2);
        assert_eq!(data.count(Dimension::ContentPages), 1);
        assert_eq!(data.count(Dimension::Tools), 0);
    }
}
