use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

/// Enumerations stored and served by their display label. Parsing accepts the
/// label or any of the short aliases, case-insensitively.
macro_rules! labeled_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $label:literal $(| $alias:literal)*),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "&'static str")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn label(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }

            pub fn from_label(value: &str) -> Option<Self> {
                let value = value.trim();
                $(
                    if value.eq_ignore_ascii_case($label)
                        $(|| value.eq_ignore_ascii_case($alias))*
                    {
                        return Some(Self::$variant);
                    }
                )+
                None
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = UnknownLabel;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Self::from_label(value).ok_or_else(|| UnknownLabel {
                    kind: stringify!($name),
                    value: value.to_string(),
                })
            }
        }

        impl TryFrom<String> for $name {
            type Error = UnknownLabel;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for &'static str {
            fn from(value: $name) -> Self {
                value.label()
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

labeled_enum! {
    pub enum Category {
        Camps => "Camps" | "camp",
        Clubs => "Clubs" | "club",
        EeLessonPlans => "EE Lesson Plans" | "ee" | "lesson plans",
        CdResources => "CD Resources" | "cd",
    }
}

labeled_enum! {
    pub enum TimeCommitment {
        Quick => "Quick (< 1 hour)" | "quick",
        Medium => "Medium (Half-day)" | "medium",
        High => "High (Multi-day project)" | "high",
    }
}

labeled_enum! {
    pub enum Cost {
        Free => "Free (0 MKD)" | "free",
        LowCost => "Low Cost (Self-funded)" | "low cost" | "low",
        GrantRequired => "Grant Required" | "grant",
    }
}

labeled_enum! {
    pub enum Audience {
        PrimarySchool => "Primary School" | "primary",
        HighSchool => "High School" | "high school",
        Adults => "Adults / Community" | "adults" | "community",
        MixedGroup => "Mixed Group" | "mixed",
    }
}

impl Default for TimeCommitment {
    fn default() -> Self {
        Self::Quick
    }
}

impl Default for Cost {
    fn default() -> Self {
        Self::Free
    }
}

impl Default for Audience {
    fn default() -> Self {
        Self::MixedGroup
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    pub url: String,
    pub name: String,
    pub size_mb: f64,
    pub content_type: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reaction {
    Like,
    Upvote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub tags: BTreeSet<String>,
    pub author_name: String,
    pub author_id: Option<Uuid>,
    pub file: Option<FileRef>,
    pub time_commitment: TimeCommitment,
    pub cost: Cost,
    pub audience: Audience,
    pub location: Option<String>,
    pub likes: i64,
    pub liked_by: BTreeSet<Uuid>,
    pub upvotes: i64,
    pub upvoted_by: BTreeSet<Uuid>,
    pub downloads: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Resource {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn is_authored_by(&self, viewer_id: Uuid) -> bool {
        self.author_id == Some(viewer_id)
    }

    pub fn reactors(&self, reaction: Reaction) -> &BTreeSet<Uuid> {
        match reaction {
            Reaction::Like => &self.liked_by,
            Reaction::Upvote => &self.upvoted_by,
        }
    }
}

/// A resource as it sits in the document store: every attribute except the
/// id and creation time may be absent.
#[derive(Debug, Clone, Default)]
pub struct ResourceDocument {
    pub id: Uuid,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub author_name: Option<String>,
    pub author_id: Option<Uuid>,
    pub file: Option<FileRef>,
    pub time_commitment: Option<String>,
    pub cost: Option<String>,
    pub audience: Option<String>,
    pub location: Option<String>,
    pub likes: Option<i64>,
    pub liked_by: Option<Vec<Uuid>>,
    pub upvotes: Option<i64>,
    pub upvoted_by: Option<Vec<Uuid>>,
    pub downloads: Option<i64>,
    pub created_at: Option<OffsetDateTime>,
}

impl ResourceDocument {
    /// Resolves every optional field to its default once, at load time.
    /// Returns `None` when the category is missing or unknown, since such a
    /// document can never appear under any feed filter.
    pub fn into_resource(self) -> Option<Resource> {
        let category = self.category.as_deref().and_then(Category::from_label)?;
        let tags = normalize_tags(self.tags.unwrap_or_default(), category);
        let liked_by: BTreeSet<Uuid> = self.liked_by.unwrap_or_default().into_iter().collect();
        let upvoted_by: BTreeSet<Uuid> = self.upvoted_by.unwrap_or_default().into_iter().collect();

        Some(Resource {
            id: self.id,
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            category,
            tags,
            author_name: normalize_author_name(self.author_name.as_deref()),
            author_id: self.author_id,
            file: self.file,
            time_commitment: self
                .time_commitment
                .as_deref()
                .and_then(TimeCommitment::from_label)
                .unwrap_or_default(),
            cost: self.cost.as_deref().and_then(Cost::from_label).unwrap_or_default(),
            audience: self
                .audience
                .as_deref()
                .and_then(Audience::from_label)
                .unwrap_or_default(),
            location: normalize_location(self.location),
            likes: self.likes.unwrap_or(liked_by.len() as i64),
            liked_by,
            upvotes: self.upvotes.unwrap_or(upvoted_by.len() as i64),
            upvoted_by,
            downloads: self.downloads.unwrap_or(0),
            created_at: self.created_at.unwrap_or(OffsetDateTime::UNIX_EPOCH),
        })
    }
}

/// Metadata for a resource that is about to be stored.
#[derive(Debug, Clone)]
pub struct NewResource {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub tags: BTreeSet<String>,
    pub author_name: String,
    pub author_id: Option<Uuid>,
    pub file: FileRef,
    pub time_commitment: TimeCommitment,
    pub cost: Cost,
    pub audience: Audience,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ResourceUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub tags: Option<Vec<String>>,
    pub time_commitment: Option<TimeCommitment>,
    pub cost: Option<Cost>,
    pub audience: Option<Audience>,
    pub location: Option<String>,
}

impl ResourceUpdate {
    /// Without new tags the current set is kept, minus the old category
    /// label when the category changes.
    pub fn apply_to(self, resource: &mut Resource) {
        let previous_category = resource.category;
        if let Some(title) = self.title {
            resource.title = title;
        }
        if let Some(description) = self.description {
            resource.description = description;
        }
        if let Some(category) = self.category {
            resource.category = category;
        }
        if let Some(time_commitment) = self.time_commitment {
            resource.time_commitment = time_commitment;
        }
        if let Some(cost) = self.cost {
            resource.cost = cost;
        }
        if let Some(audience) = self.audience {
            resource.audience = audience;
        }
        if self.location.is_some() {
            resource.location = normalize_location(self.location);
        }
        let tags = match self.tags {
            Some(tags) => tags,
            None => resource
                .tags
                .iter()
                .filter(|tag| {
                    previous_category == resource.category
                        || tag.as_str() != previous_category.label()
                })
                .cloned()
                .collect(),
        };
        resource.tags = normalize_tags(tags, resource.category);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReactionState {
    pub active: bool,
    pub count: i64,
}

/// Trims labels, drops blanks and duplicates, and always includes the
/// category label.
pub fn normalize_tags<I>(tags: I, category: Category) -> BTreeSet<String>
where
    I: IntoIterator<Item = String>,
{
    let mut normalized: BTreeSet<String> = tags
        .into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect();
    normalized.insert(category.label().to_string());
    normalized
}

pub fn normalize_author_name(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => ANONYMOUS_AUTHOR.to_string(),
    }
}

pub fn normalize_location(location: Option<String>) -> Option<String> {
    location
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
