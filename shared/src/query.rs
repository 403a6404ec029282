//! In-memory member queries
//!
//! Pure functions over a mirrored snapshot: search, exact-match filters,
//! stable sorting, service-month grouping and dashboard counts. None of
//! them keep state between calls.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{Member, MemberStatus, ServiceMonth};

// ============================================================================
// Search
// ============================================================================

/// Fields a free-text search can look at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    FullName,
    Phone,
    Email,
    MemberIdentifier,
    ClergyRank,
    Status,
}

impl SearchField {
    fn value<'a>(&self, member: &'a Member) -> &'a str {
        match self {
            SearchField::FullName => &member.profile.full_name,
            SearchField::Phone => &member.profile.phone,
            SearchField::Email => &member.profile.email,
            SearchField::MemberIdentifier => &member.member_identifier,
            SearchField::ClergyRank => &member.profile.clergy_rank,
            SearchField::Status => member.profile.status.as_str(),
        }
    }
}

/// Default search scope: name, phone, email
pub const DEFAULT_SEARCH_FIELDS: [SearchField; 3] =
    [SearchField::FullName, SearchField::Phone, SearchField::Email];

/// Case-insensitive substring search across `fields`.
///
/// An empty (or all-whitespace) term returns the collection unchanged.
pub fn search(members: &[Member], term: &str, fields: &[SearchField]) -> Vec<Member> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return members.to_vec();
    }

    members
        .iter()
        .filter(|m| {
            fields
                .iter()
                .any(|f| f.value(m).to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

// ============================================================================
// Filter
// ============================================================================

/// Exact-match filters; `None` passes everything through
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberFilter {
    pub status: Option<MemberStatus>,
    pub service_month: Option<ServiceMonth>,
    pub gender: Option<String>,
    pub job_status: Option<String>,
    pub address_region: Option<String>,
    pub served_before: Option<bool>,
}

impl MemberFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: MemberStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_service_month(mut self, month: ServiceMonth) -> Self {
        self.service_month = Some(month);
        self
    }

    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    pub fn with_job_status(mut self, job_status: impl Into<String>) -> Self {
        self.job_status = Some(job_status.into());
        self
    }

    pub fn with_address_region(mut self, region: impl Into<String>) -> Self {
        self.address_region = Some(region.into());
        self
    }

    pub fn with_served_before(mut self, served: bool) -> Self {
        self.served_before = Some(served);
        self
    }

    pub fn matches(&self, member: &Member) -> bool {
        let p = &member.profile;
        self.status.is_none_or(|s| p.status == s)
            && self
                .service_month
                .is_none_or(|month| p.service_month() == Some(month))
            && self.gender.as_deref().is_none_or(|g| p.gender == g)
            && self.job_status.as_deref().is_none_or(|j| p.job_status == j)
            && self
                .address_region
                .as_deref()
                .is_none_or(|r| p.address_region == r)
            && self.served_before.is_none_or(|s| p.served_before == s)
    }
}

pub fn filter_by(members: &[Member], filter: &MemberFilter) -> Vec<Member> {
    members.iter().filter(|m| filter.matches(m)).cloned().collect()
}

// ============================================================================
// Sort
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    FullName,
    MemberIdentifier,
    Status,
    ServiceMonth,
    DateOfBirth,
    MembershipDate,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

fn compare(a: &Member, b: &Member, key: SortKey) -> Ordering {
    match key {
        SortKey::FullName => a
            .profile
            .full_name
            .to_lowercase()
            .cmp(&b.profile.full_name.to_lowercase()),
        SortKey::MemberIdentifier => a.member_identifier.cmp(&b.member_identifier),
        SortKey::Status => a.profile.status.as_str().cmp(b.profile.status.as_str()),
        // Unset months sort after every valid month
        SortKey::ServiceMonth => {
            let code = |m: &Member| m.service_month().map_or(u8::MAX, |s| s.code());
            code(a).cmp(&code(b))
        }
        SortKey::DateOfBirth => a.profile.date_of_birth.cmp(&b.profile.date_of_birth),
        SortKey::MembershipDate => a.profile.membership_date.cmp(&b.profile.membership_date),
        SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
    }
}

/// Stable sort; equal keys keep their input order in both directions.
pub fn sort_by(members: &[Member], key: SortKey, direction: SortDirection) -> Vec<Member> {
    let mut sorted = members.to_vec();
    match direction {
        SortDirection::Ascending => sorted.sort_by(|a, b| compare(a, b, key)),
        SortDirection::Descending => sorted.sort_by(|a, b| compare(b, a, key)),
    }
    sorted
}

/// Default mirror order: newest `createdAt` first, unknown timestamps last
pub fn sort_newest_first(members: &mut [Member]) {
    members.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

// ============================================================================
// Grouping and summary
// ============================================================================

/// Partition into the 12 service-month buckets keyed by month code.
///
/// Every bucket is present (possibly empty). Members without a valid month
/// code appear in no bucket.
pub fn group_by_service_month(members: &[Member]) -> BTreeMap<u8, Vec<Member>> {
    let mut buckets: BTreeMap<u8, Vec<Member>> = ServiceMonth::ALL
        .iter()
        .map(|m| (m.code(), Vec::new()))
        .collect();

    for member in members {
        if let Some(month) = member.service_month()
            && let Some(bucket) = buckets.get_mut(&month.code())
        {
            bucket.push(member.clone());
        }
    }
    buckets
}

/// Dashboard counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipSummary {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub suspended: usize,
}

pub fn summarize(members: &[Member]) -> MembershipSummary {
    members
        .iter()
        .fold(MembershipSummary::default(), |mut acc, m| {
            acc.total += 1;
            match m.profile.status {
                MemberStatus::Active => acc.active += 1,
                MemberStatus::Inactive => acc.inactive += 1,
                MemberStatus::Suspended => acc.suspended += 1,
            }
            acc
        })
}
