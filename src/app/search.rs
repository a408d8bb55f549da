//! Feed projection: category filter, structured filters, smart text search
//! and ordering over an already-loaded resource list.
//!
//! Everything here is a pure function of its inputs. Callers own the
//! snapshot; nothing in this module holds or mutates state.

use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::resource::{Audience, Category, Cost, Resource, TimeCommitment, UnknownLabel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    #[default]
    Newest,
    Top,
}

impl FromStr for SortMode {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "newest" | "new" => Ok(Self::Newest),
            "top" => Ok(Self::Top),
            _ => Err(UnknownLabel {
                kind: "SortMode",
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl FromStr for CategoryFilter {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        value.parse().map(Self::Only)
    }
}

/// Accepted values per attribute. An empty set places no constraint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredFilters {
    pub cost: BTreeSet<Cost>,
    pub time: BTreeSet<TimeCommitment>,
    pub audience: BTreeSet<Audience>,
    pub location: Option<String>,
}

impl StructuredFilters {
    pub fn is_empty(&self) -> bool {
        self.cost.is_empty()
            && self.time.is_empty()
            && self.audience.is_empty()
            && self.location.as_deref().map_or(true, str::is_empty)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedQuery {
    pub category: CategoryFilter,
    pub filters: StructuredFilters,
    pub text: Option<String>,
    pub sort: SortMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmartTarget {
    Cost(&'static [Cost]),
    Time(&'static [TimeCommitment]),
    Audience(&'static [Audience]),
}

impl SmartTarget {
    fn matches(&self, resource: &Resource) -> bool {
        match self {
            Self::Cost(values) => values.contains(&resource.cost),
            Self::Time(values) => values.contains(&resource.time_commitment),
            Self::Audience(values) => values.contains(&resource.audience),
        }
    }
}

pub struct SmartRule {
    pub keywords: &'static [&'static str],
    pub target: SmartTarget,
}

pub const SMART_RULES: &[SmartRule] = &[
    SmartRule {
        keywords: &["cheap", "free", "budget", "no cost"],
        target: SmartTarget::Cost(&[Cost::Free, Cost::LowCost]),
    },
    SmartRule {
        keywords: &["quick", "short", "fast", "brief", "hour"],
        target: SmartTarget::Time(&[TimeCommitment::Quick]),
    },
    SmartRule {
        keywords: &["kids", "children", "primary", "young"],
        target: SmartTarget::Audience(&[Audience::PrimarySchool]),
    },
    SmartRule {
        keywords: &["adults", "grownups", "parents", "community"],
        target: SmartTarget::Audience(&[Audience::Adults]),
    },
    SmartRule {
        keywords: &["high school", "teens", "youth"],
        target: SmartTarget::Audience(&[Audience::HighSchool]),
    },
];

/// Attribute constraints implied by the keywords found in `query`.
pub fn smart_targets(query: &str) -> Vec<SmartTarget> {
    let query = query.to_lowercase();
    SMART_RULES
        .iter()
        .filter(|rule| rule.keywords.iter().any(|keyword| query.contains(keyword)))
        .map(|rule| rule.target)
        .collect()
}

pub fn matches_category(resource: &Resource, category: CategoryFilter) -> bool {
    match category {
        CategoryFilter::All => true,
        CategoryFilter::Only(category) => resource.has_tag(category.label()),
    }
}

/// AND across attributes, OR within one attribute. Location is exact.
pub fn matches_filters(resource: &Resource, filters: &StructuredFilters) -> bool {
    if !filters.cost.is_empty() && !filters.cost.contains(&resource.cost) {
        return false;
    }
    if !filters.time.is_empty() && !filters.time.contains(&resource.time_commitment) {
        return false;
    }
    if !filters.audience.is_empty() && !filters.audience.contains(&resource.audience) {
        return false;
    }
    match filters.location.as_deref() {
        Some(location) if !location.is_empty() => resource.location.as_deref() == Some(location),
        _ => true,
    }
}

/// Literal substring match OR smart keyword match.
pub fn matches_search(resource: &Resource, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }

    let text_match = resource.title.to_lowercase().contains(&needle)
        || resource.description.to_lowercase().contains(&needle)
        || resource
            .location
            .as_deref()
            .is_some_and(|location| location.to_lowercase().contains(&needle));
    if text_match {
        return true;
    }

    smart_targets(&needle)
        .iter()
        .any(|target| target.matches(resource))
}

/// Orders in place. Both modes use a stable sort, so ties keep input order.
pub fn sort(resources: &mut [Resource], mode: SortMode) {
    match mode {
        SortMode::Top => resources.sort_by(|a, b| b.upvotes.cmp(&a.upvotes)),
        SortMode::Newest => resources.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }
}

/// Derives the rendered feed from the full collection.
pub fn apply(resources: &[Resource], query: &FeedQuery) -> Vec<Resource> {
    let text = query.text.as_deref().unwrap_or_default();
    let mut view: Vec<Resource> = resources
        .iter()
        .filter(|resource| matches_category(resource, query.category))
        .filter(|resource| matches_filters(resource, &query.filters))
        .filter(|resource| matches_search(resource, text))
        .cloned()
        .collect();
    sort(&mut view, query.sort);
    view
}

/// Resources whose liker set contains `viewer_id`, newest first.
pub fn liked_by(resources: &[Resource], viewer_id: Uuid) -> Vec<Resource> {
    let mut view: Vec<Resource> = resources
        .iter()
        .filter(|resource| resource.liked_by.contains(&viewer_id))
        .cloned()
        .collect();
    sort(&mut view, SortMode::Newest);
    view
}
