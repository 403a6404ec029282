//! Member Model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Membership status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MemberStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "Active",
            MemberStatus::Inactive => "Inactive",
            MemberStatus::Suspended => "Suspended",
        }
    }

    /// Parse the stored label (case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(MemberStatus::Active),
            "inactive" => Some(MemberStatus::Inactive),
            "suspended" => Some(MemberStatus::Suspended),
            _ => None,
        }
    }
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Language proficiency level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Proficiency {
    #[default]
    Poor,
    Fair,
    Good,
    Excellent,
}

impl Proficiency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Proficiency::Poor => "Poor",
            Proficiency::Fair => "Fair",
            Proficiency::Good => "Good",
            Proficiency::Excellent => "Excellent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "poor" => Some(Proficiency::Poor),
            "fair" => Some(Proficiency::Fair),
            "good" => Some(Proficiency::Good),
            "excellent" => Some(Proficiency::Excellent),
            _ => None,
        }
    }
}

/// Proficiency per tracked language. Absent skills default to `Poor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LanguageSkills {
    pub amharic: Proficiency,
    pub oromo: Proficiency,
    pub english: Proficiency,
}

impl LanguageSkills {
    /// Wire keys of the tracked languages
    pub const KEYS: [&'static str; 3] = ["amharic", "oromo", "english"];

    pub fn get(&self, key: &str) -> Option<Proficiency> {
        match key {
            "amharic" => Some(self.amharic),
            "oromo" => Some(self.oromo),
            "english" => Some(self.english),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, level: Proficiency) -> bool {
        match key {
            "amharic" => self.amharic = level,
            "oromo" => self.oromo = level,
            "english" => self.english = level,
            _ => return false,
        }
        true
    }
}

/// Emergency contact. Name and phone are required on every committed record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    pub address: String,
}

/// Service month in the church calendar cycle (1 = September .. 12 = August)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ServiceMonth {
    September = 1,
    October,
    November,
    December,
    January,
    February,
    March,
    April,
    May,
    June,
    July,
    August,
}

impl ServiceMonth {
    pub const ALL: [ServiceMonth; 12] = [
        ServiceMonth::September,
        ServiceMonth::October,
        ServiceMonth::November,
        ServiceMonth::December,
        ServiceMonth::January,
        ServiceMonth::February,
        ServiceMonth::March,
        ServiceMonth::April,
        ServiceMonth::May,
        ServiceMonth::June,
        ServiceMonth::July,
        ServiceMonth::August,
    ];

    /// Numeric month code (1..=12)
    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1..=12 => Some(Self::ALL[usize::from(code) - 1]),
            _ => None,
        }
    }

    /// Canonical stored label, e.g. `"1 - September (መስከረም)"`
    pub fn label(&self) -> &'static str {
        match self {
            ServiceMonth::September => "1 - September (መስከረም)",
            ServiceMonth::October => "2 - October (ጥቅምት)",
            ServiceMonth::November => "3 - November (ኅዳር)",
            ServiceMonth::December => "4 - December (ታኅሣሥ)",
            ServiceMonth::January => "5 - January (ጥር)",
            ServiceMonth::February => "6 - February (የካቲት)",
            ServiceMonth::March => "7 - March (መጋቢት)",
            ServiceMonth::April => "8 - April (ሚያዝያ)",
            ServiceMonth::May => "9 - May (ግንቦት)",
            ServiceMonth::June => "10 - June (ሰኔ)",
            ServiceMonth::July => "11 - July (ሐምሌ)",
            ServiceMonth::August => "12 - August (ነሐሴ)",
        }
    }

    /// Label without the leading code, e.g. `"September (መስከረም)"`
    pub fn display_name(&self) -> &'static str {
        let label = self.label();
        label.split_once(" - ").map_or(label, |(_, name)| name)
    }

    /// Parse a stored value by its leading integer.
    ///
    /// `"7"` and `"7 - March (መጋቢት)"` both map to March; anything whose
    /// leading integer is outside 1..=12 (or missing) is rejected.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim_start();
        let digits: &str = {
            let end = trimmed
                .char_indices()
                .find(|(_, c)| !c.is_ascii_digit())
                .map_or(trimmed.len(), |(i, _)| i);
            &trimmed[..end]
        };
        if digits.is_empty() || digits.len() > 2 {
            return None;
        }
        digits.parse::<u8>().ok().and_then(Self::from_code)
    }
}

impl std::fmt::Display for ServiceMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Descriptive member fields, shared by committed records and drafts
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MemberProfile {
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: String,
    pub phone: String,
    pub email: String,
    pub address_region: String,
    pub address_details: String,
    pub job_status: String,
    pub employer_name: String,
    pub language_skills: LanguageSkills,
    pub served_before: bool,
    pub previous_service_location: String,
    pub baptismal_name: String,
    pub baptism_church: String,
    pub baptism_date: Option<NaiveDate>,
    pub clergy_rank: String,
    pub clergy_date: Option<NaiveDate>,
    pub clergy_church: String,
    pub membership_date: Option<NaiveDate>,
    pub status: MemberStatus,
    /// Stored service month label; see [`ServiceMonth::parse`]
    pub service_month: String,
    pub emergency_contact: EmergencyContact,
    pub notes: String,
}

impl MemberProfile {
    pub fn service_month(&self) -> Option<ServiceMonth> {
        ServiceMonth::parse(&self.service_month)
    }
}

/// Member entity as mirrored from the directory store
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Member {
    /// Store-assigned document key
    pub id: String,
    /// Human-readable sequential code (e.g. "UR0001"), immutable after creation
    pub member_identifier: String,
    #[serde(flatten)]
    pub profile: MemberProfile,
    pub photo_url: String,
    pub id_photo_url: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Member {
    pub fn service_month(&self) -> Option<ServiceMonth> {
        self.profile.service_month()
    }
}

/// A staged binary file that has not reached the blob host yet
#[derive(Clone, PartialEq, Eq)]
pub struct PendingAsset {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PendingAsset {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

impl std::fmt::Debug for PendingAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingAsset")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Asset slot state
///
/// A pending file is never confused with a persisted URL: only `Persisted`
/// carries a blob-host address.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AssetSlot {
    #[default]
    Empty,
    Pending(PendingAsset),
    Persisted(String),
}

impl AssetSlot {
    /// Slot for a stored URL (empty string means no asset)
    pub fn from_url(url: &str) -> Self {
        if url.is_empty() {
            AssetSlot::Empty
        } else {
            AssetSlot::Persisted(url.to_string())
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, AssetSlot::Pending(_))
    }

    pub fn persisted_url(&self) -> Option<&str> {
        match self {
            AssetSlot::Persisted(url) => Some(url),
            _ => None,
        }
    }
}

/// Create/update payload: profile fields plus the two asset slots
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MemberDraft {
    pub profile: MemberProfile,
    pub photo: AssetSlot,
    pub id_photo: AssetSlot,
}

impl MemberDraft {
    pub fn new(profile: MemberProfile) -> Self {
        Self {
            profile,
            photo: AssetSlot::Empty,
            id_photo: AssetSlot::Empty,
        }
    }

    /// Draft for editing an existing member, keeping its persisted assets
    pub fn from_member(member: &Member) -> Self {
        Self {
            profile: member.profile.clone(),
            photo: AssetSlot::from_url(&member.photo_url),
            id_photo: AssetSlot::from_url(&member.id_photo_url),
        }
    }

    pub fn with_photo(mut self, slot: AssetSlot) -> Self {
        self.photo = slot;
        self
    }

    pub fn with_id_photo(mut self, slot: AssetSlot) -> Self {
        self.id_photo = slot;
        self
    }
}
