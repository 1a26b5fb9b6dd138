//! Data scope: which records a role may see.
//!
//! A role's [`DataScope`] assigns a [`ScopeLevel`] per [`ResourceCategory`].
//! Combined with the caller's [`ScopeClaims`] it yields either an object-level
//! decision ([`check_access`]) or a list-level predicate ([`build_filter`]) for
//! the query engine. Both modes resolve the level through the same fallback
//! rules and must agree on every input.
//!
//! Default-deny discipline: unknown resources map to the strictest category,
//! unknown or missing levels resolve to [`ScopeLevel::Own`]. Only an explicit
//! `all` lifts the restriction.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use warden_core::SubjectId;

// ─────────────────────────────────────────────────────────────────────────────
// Categories and ownership fields
// ─────────────────────────────────────────────────────────────────────────────

/// Ownership-related field of a scoped record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Owner,
    Creator,
    Region,
    Team,
}

/// Resource categories that carry a data scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    Campaigns,
    Leads,
    Contacts,
}

impl ResourceCategory {
    /// Fallback for unmodeled resources: owner and creator only, no region.
    pub const STRICTEST: Self = Self::Contacts;

    pub const ALL: [Self; 3] = [Self::Campaigns, Self::Leads, Self::Contacts];

    /// Map a free-form resource name onto a category.
    pub fn from_resource(resource: &str) -> Self {
        match resource.trim().to_ascii_lowercase().as_str() {
            "campaign" | "campaigns" | "marketing_campaigns" => Self::Campaigns,
            "lead" | "leads" | "prospects" => Self::Leads,
            "contact" | "contacts" | "customers" => Self::Contacts,
            other => {
                debug!(resource = other, "unmodeled resource; using strictest scope category");
                Self::STRICTEST
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Campaigns => "campaigns",
            Self::Leads => "leads",
            Self::Contacts => "contacts",
        }
    }

    /// Column name of an ownership field in this category's records, if modeled.
    pub fn column(&self, kind: FieldKind) -> Option<&'static str> {
        match (self, kind) {
            (Self::Campaigns, FieldKind::Owner) => Some("owner_id"),
            (Self::Campaigns, FieldKind::Creator) => Some("created_by"),
            (Self::Campaigns, FieldKind::Region) => Some("region"),
            (Self::Campaigns, FieldKind::Team) => Some("team_id"),

            (Self::Leads, FieldKind::Owner) => Some("assigned_to"),
            (Self::Leads, FieldKind::Creator) => Some("created_by"),
            (Self::Leads, FieldKind::Region) => Some("region"),
            (Self::Leads, FieldKind::Team) => None,

            (Self::Contacts, FieldKind::Owner) => Some("owner_id"),
            (Self::Contacts, FieldKind::Creator) => Some("created_by"),
            (Self::Contacts, FieldKind::Region | FieldKind::Team) => None,
        }
    }
}

impl core::fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform view over any record subject to data scope.
///
/// Every record variant exposes the same ownership accessors so scope checks
/// never dispatch on concrete record types.
pub trait ScopedRecord {
    fn owner_id(&self) -> Option<&str>;

    fn creator_id(&self) -> Option<&str>;

    fn region(&self) -> Option<&str> {
        None
    }

    fn team_id(&self) -> Option<&str> {
        None
    }

    fn field(&self, kind: FieldKind) -> Option<&str> {
        match kind {
            FieldKind::Owner => self.owner_id(),
            FieldKind::Creator => self.creator_id(),
            FieldKind::Region => self.region(),
            FieldKind::Team => self.team_id(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Levels and descriptors
// ─────────────────────────────────────────────────────────────────────────────

/// Visibility level for one resource category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScopeLevel {
    /// Deny all records.
    None,
    /// No restriction.
    All,
    /// Records the subject owns or created.
    #[default]
    Own,
    /// Records owned or created by any member of the subject's team.
    Team,
    /// Records tagged with the subject's region.
    Region,
}

impl ScopeLevel {
    /// Lenient parse: unrecognized values resolve to [`ScopeLevel::Own`].
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" => Self::None,
            "all" => Self::All,
            "own" => Self::Own,
            "team" => Self::Team,
            "region" => Self::Region,
            other => {
                debug!(level = other, "unrecognized scope level; treating as own");
                Self::Own
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::All => "all",
            Self::Own => "own",
            Self::Team => "team",
            Self::Region => "region",
        }
    }
}

impl From<String> for ScopeLevel {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<ScopeLevel> for String {
    fn from(value: ScopeLevel) -> Self {
        value.as_str().to_string()
    }
}

/// Per-category scope levels granted by a role, e.g. `{"campaigns": "own"}`.
///
/// Keys are canonical category names. Keys that are not canonical are kept
/// (so the descriptor round-trips) but never consulted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataScope(BTreeMap<String, ScopeLevel>);

impl DataScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, category: ResourceCategory, level: ScopeLevel) -> Self {
        self.0.insert(category.as_str().to_string(), level);
        self
    }

    /// Level applying to `resource`; unset categories resolve to `own`.
    pub fn level_for(&self, resource: &str) -> ScopeLevel {
        let category = ResourceCategory::from_resource(resource);
        self.0.get(category.as_str()).copied().unwrap_or_default()
    }

    pub fn decision_for(&self, resource: &str, claims: &ScopeClaims) -> ScopeDecision {
        ScopeDecision::new(resource, self.level_for(resource), claims)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Subject attributes consulted by scope rules, resolved per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeClaims {
    pub subject_id: SubjectId,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub team_member_ids: BTreeSet<SubjectId>,
}

impl ScopeClaims {
    pub fn new(subject_id: SubjectId) -> Self {
        Self {
            subject_id,
            team: None,
            region: None,
            team_member_ids: BTreeSet::new(),
        }
    }

    pub fn with_team(
        mut self,
        team: impl Into<String>,
        members: impl IntoIterator<Item = SubjectId>,
    ) -> Self {
        self.team = Some(team.into());
        self.team_member_ids.extend(members);
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    fn team(&self) -> Option<&str> {
        self.team.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    fn region(&self) -> Option<&str> {
        self.region.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Effective rule (shared by both evaluation modes)
// ─────────────────────────────────────────────────────────────────────────────

enum Rule<'a> {
    DenyAll,
    Unrestricted,
    Own(&'a str),
    Team {
        members: BTreeSet<&'a str>,
        team: &'a str,
    },
    Region(&'a str),
}

fn effective_rule<'a>(category: ResourceCategory, level: ScopeLevel, claims: &'a ScopeClaims) -> Rule<'a> {
    let own = Rule::Own(claims.subject_id.as_str());
    match level {
        ScopeLevel::None => Rule::DenyAll,
        ScopeLevel::All => Rule::Unrestricted,
        ScopeLevel::Own => own,
        ScopeLevel::Team => match claims.team() {
            Some(team) => {
                let mut members: BTreeSet<&str> =
                    claims.team_member_ids.iter().map(SubjectId::as_str).collect();
                members.insert(claims.subject_id.as_str());
                Rule::Team { members, team }
            }
            None => own,
        },
        ScopeLevel::Region => match (claims.region(), category.column(FieldKind::Region)) {
            (Some(region), Some(_)) => Rule::Region(region),
            _ => own,
        },
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Object-level mode
// ─────────────────────────────────────────────────────────────────────────────

/// Decide whether the subject may access a materialized record.
pub fn check_access<R: ScopedRecord + ?Sized>(
    resource: &str,
    record: &R,
    level: ScopeLevel,
    claims: &ScopeClaims,
) -> bool {
    let category = ResourceCategory::from_resource(resource);
    match effective_rule(category, level, claims) {
        Rule::DenyAll => false,
        Rule::Unrestricted => true,
        Rule::Own(subject) => {
            record.owner_id() == Some(subject) || record.creator_id() == Some(subject)
        }
        Rule::Team { members, team } => {
            let member = |v: Option<&str>| v.is_some_and(|v| members.contains(v));
            member(record.owner_id())
                || member(record.creator_id())
                || (category.column(FieldKind::Team).is_some() && record.team_id() == Some(team))
        }
        Rule::Region(region) => record.region() == Some(region),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// List-level mode
// ─────────────────────────────────────────────────────────────────────────────

/// Single comparison against an ownership column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    Eq {
        field: String,
        kind: FieldKind,
        value: String,
    },
    In {
        field: String,
        kind: FieldKind,
        values: Vec<String>,
    },
}

impl Condition {
    fn matches<R: ScopedRecord + ?Sized>(&self, record: &R) -> bool {
        match self {
            Self::Eq { kind, value, .. } => record.field(*kind) == Some(value.as_str()),
            Self::In { kind, values, .. } => record
                .field(*kind)
                .is_some_and(|v| values.iter().any(|candidate| candidate == v)),
        }
    }
}

/// Declarative predicate for bulk filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    /// No restriction.
    MatchAll,
    /// Matches nothing.
    MatchNone,
    /// Disjunction of conditions.
    Any { conditions: Vec<Condition> },
}

impl Filter {
    /// Evaluate the predicate against a materialized record.
    pub fn matches<R: ScopedRecord + ?Sized>(&self, record: &R) -> bool {
        match self {
            Self::MatchAll => true,
            Self::MatchNone => false,
            Self::Any { conditions } => conditions.iter().any(|c| c.matches(record)),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Self::MatchAll)
    }
}

/// Synthesize the list-level predicate for `resource` at `level`.
pub fn build_filter(resource: &str, level: ScopeLevel, claims: &ScopeClaims) -> Filter {
    let category = ResourceCategory::from_resource(resource);

    let eq = |kind: FieldKind, value: &str| {
        category.column(kind).map(|field| Condition::Eq {
            field: field.to_string(),
            kind,
            value: value.to_string(),
        })
    };

    let conditions: Vec<Condition> = match effective_rule(category, level, claims) {
        Rule::DenyAll => return Filter::MatchNone,
        Rule::Unrestricted => return Filter::MatchAll,
        Rule::Own(subject) => [eq(FieldKind::Owner, subject), eq(FieldKind::Creator, subject)]
            .into_iter()
            .flatten()
            .collect(),
        Rule::Team { members, team } => {
            let values: Vec<String> = members.iter().map(|m| m.to_string()).collect();
            let within = |kind: FieldKind| {
                category.column(kind).map(|field| Condition::In {
                    field: field.to_string(),
                    kind,
                    values: values.clone(),
                })
            };
            [within(FieldKind::Owner), within(FieldKind::Creator), eq(FieldKind::Team, team)]
                .into_iter()
                .flatten()
                .collect()
        }
        Rule::Region(region) => eq(FieldKind::Region, region).into_iter().collect(),
    };

    if conditions.is_empty() {
        Filter::MatchNone
    } else {
        Filter::Any { conditions }
    }
}

/// Outcome of applying a role's data scope to one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ScopeDecision {
    Allow { category: ResourceCategory, filter: Filter },
    DenyAll { category: ResourceCategory },
}

impl ScopeDecision {
    pub fn new(resource: &str, level: ScopeLevel, claims: &ScopeClaims) -> Self {
        let category = ResourceCategory::from_resource(resource);
        match build_filter(resource, level, claims) {
            Filter::MatchNone => Self::DenyAll { category },
            filter => Self::Allow { category, filter },
        }
    }

    pub fn is_deny_all(&self) -> bool {
        matches!(self, Self::DenyAll { .. })
    }

    pub fn category(&self) -> ResourceCategory {
        match self {
            Self::Allow { category, .. } | Self::DenyAll { category } => *category,
        }
    }

    /// The predicate to hand to the query engine.
    pub fn filter(&self) -> Filter {
        match self {
            Self::Allow { filter, .. } => filter.clone(),
            Self::DenyAll { .. } => Filter::MatchNone,
        }
    }

    pub fn permits<R: ScopedRecord + ?Sized>(&self, record: &R) -> bool {
        match self {
            Self::Allow { filter, .. } => filter.matches(record),
            Self::DenyAll { .. } => false,
        }
    }
}
