//! Record codec
//!
//! Converts between the store's document representation (a flat map of
//! field name to JSON value, keyed positionally) and the typed [`Member`].
//!
//! Decoding is lenient: dates arrive as store timestamps, epoch
//! milliseconds, RFC 3339 instants or `YYYY-MM-DD` strings and are all
//! normalized to a calendar date; every field other than the identity key
//! degrades to its default instead of failing.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::CodecError;
use crate::models::{
    EmergencyContact, LanguageSkills, Member, MemberProfile, MemberStatus, Proficiency,
};

/// Document body: field name -> value
pub type Fields = Map<String, Value>;

/// A document as delivered by the store
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawDocument {
    /// Positional document key (never part of `fields`)
    pub key: Option<String>,
    pub fields: Fields,
}

impl RawDocument {
    pub fn new(key: impl Into<String>, fields: Fields) -> Self {
        Self {
            key: Some(key.into()),
            fields,
        }
    }
}

/// Wire field names
pub mod field {
    pub const MEMBER_IDENTIFIER: &str = "memberid";
    pub const FULL_NAME: &str = "fullName";
    pub const DATE_OF_BIRTH: &str = "dateOfBirth";
    pub const GENDER: &str = "gender";
    pub const PHONE: &str = "phone";
    pub const EMAIL: &str = "email";
    pub const ADDRESS_REGION: &str = "addressRegion";
    pub const ADDRESS_DETAILS: &str = "addressDetails";
    pub const PHOTO_URL: &str = "photoURL";
    pub const ID_PHOTO_URL: &str = "idPhotoURL";
    pub const JOB_STATUS: &str = "jobStatus";
    pub const EMPLOYER_NAME: &str = "employerName";
    pub const LANGUAGE_SKILLS: &str = "languageSkills";
    pub const SERVED_BEFORE: &str = "servedBefore";
    pub const PREVIOUS_SERVICE_LOCATION: &str = "previousServiceLocation";
    pub const BAPTISMAL_NAME: &str = "baptismalName";
    pub const BAPTISM_CHURCH: &str = "baptismChurch";
    pub const BAPTISM_DATE: &str = "baptismDate";
    pub const CLERGY_RANK: &str = "clergyRank";
    pub const CLERGY_DATE: &str = "clergyDate";
    pub const CLERGY_CHURCH: &str = "clergyChurch";
    pub const SERVICE_MONTH: &str = "serviceMonth";
    pub const MEMBERSHIP_DATE: &str = "membershipDate";
    pub const STATUS: &str = "status";
    pub const EMERGENCY_CONTACT: &str = "emergencyContact";
    pub const NOTES: &str = "notes";
    pub const USER_ID: &str = "userId";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
}

// ============================================================================
// Temporal values
// ============================================================================

/// Store-native timestamp value: `{"seconds": i64, "nanos": u32}`
pub fn timestamp_value(at: DateTime<Utc>) -> Value {
    json!({
        "seconds": at.timestamp(),
        "nanos": at.timestamp_subsec_nanos(),
    })
}

fn date_value(date: Option<NaiveDate>) -> Value {
    match date {
        Some(d) => timestamp_value(Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN))),
        None => Value::Null,
    }
}

/// Parse any supported temporal representation into an instant
pub fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Object(obj) => {
            let seconds = obj
                .get("seconds")
                .or_else(|| obj.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = obj
                .get("nanos")
                .or_else(|| obj.get("nanoseconds"))
                .or_else(|| obj.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            Utc.timestamp_opt(seconds, u32::try_from(nanos).ok()?).single()
        }
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            Utc.timestamp_millis_opt(millis).single()
        }
        Value::String(s) => {
            if let Ok(at) = DateTime::parse_from_rfc3339(s) {
                return Some(at.with_timezone(&Utc));
            }
            parse_date_prefix(s).map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)))
        }
        _ => None,
    }
}

/// Parse a date field; `YYYY-MM-DD…` strings are taken verbatim
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    if let Value::String(s) = value
        && let Some(date) = parse_date_prefix(s)
    {
        return Some(date);
    }
    parse_instant(value).map(|at| at.date_naive())
}

fn parse_date_prefix(s: &str) -> Option<NaiveDate> {
    let prefix = s.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

// ============================================================================
// Field accessors (lenient)
// ============================================================================

fn get_string(fields: &Fields, name: &str) -> String {
    match fields.get(name) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn get_bool(fields: &Fields, name: &str) -> bool {
    match fields.get(name) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn get_date(fields: &Fields, name: &str) -> Option<NaiveDate> {
    fields.get(name).and_then(parse_date)
}

fn decode_language_skills(value: Option<&Value>) -> LanguageSkills {
    let mut skills = LanguageSkills::default();
    if let Some(Value::Object(obj)) = value {
        for key in LanguageSkills::KEYS {
            if let Some(level) = obj.get(key).and_then(Value::as_str).and_then(Proficiency::parse) {
                skills.set(key, level);
            }
        }
    }
    skills
}

fn decode_emergency_contact(value: Option<&Value>) -> EmergencyContact {
    match value {
        Some(Value::Object(obj)) => EmergencyContact {
            name: get_string(obj, "name"),
            phone: get_string(obj, "phone"),
            address: get_string(obj, "address"),
        },
        _ => EmergencyContact::default(),
    }
}

// ============================================================================
// Decode / encode
// ============================================================================

/// Decode a store document into a member.
///
/// Fails only when the identity key is absent or blank.
pub fn decode(raw: &RawDocument) -> Result<Member, CodecError> {
    // Non-blank keys are kept verbatim
    let id = match raw.key.as_deref() {
        Some(key) if !key.trim().is_empty() => key.to_string(),
        _ => return Err(CodecError::malformed("document has no identity key")),
    };
    let f = &raw.fields;

    let profile = MemberProfile {
        full_name: get_string(f, field::FULL_NAME),
        date_of_birth: get_date(f, field::DATE_OF_BIRTH),
        gender: get_string(f, field::GENDER),
        phone: get_string(f, field::PHONE),
        email: get_string(f, field::EMAIL),
        address_region: get_string(f, field::ADDRESS_REGION),
        address_details: get_string(f, field::ADDRESS_DETAILS),
        job_status: get_string(f, field::JOB_STATUS),
        employer_name: get_string(f, field::EMPLOYER_NAME),
        language_skills: decode_language_skills(f.get(field::LANGUAGE_SKILLS)),
        served_before: get_bool(f, field::SERVED_BEFORE),
        previous_service_location: get_string(f, field::PREVIOUS_SERVICE_LOCATION),
        baptismal_name: get_string(f, field::BAPTISMAL_NAME),
        baptism_church: get_string(f, field::BAPTISM_CHURCH),
        baptism_date: get_date(f, field::BAPTISM_DATE),
        clergy_rank: get_string(f, field::CLERGY_RANK),
        clergy_date: get_date(f, field::CLERGY_DATE),
        clergy_church: get_string(f, field::CLERGY_CHURCH),
        membership_date: get_date(f, field::MEMBERSHIP_DATE),
        status: MemberStatus::parse(&get_string(f, field::STATUS)).unwrap_or_default(),
        service_month: get_string(f, field::SERVICE_MONTH),
        emergency_contact: decode_emergency_contact(f.get(field::EMERGENCY_CONTACT)),
        notes: get_string(f, field::NOTES),
    };

    Ok(Member {
        id,
        member_identifier: get_string(f, field::MEMBER_IDENTIFIER),
        profile,
        photo_url: get_string(f, field::PHOTO_URL),
        id_photo_url: get_string(f, field::ID_PHOTO_URL),
        created_at: f.get(field::CREATED_AT).and_then(parse_instant),
        updated_at: f.get(field::UPDATED_AT).and_then(parse_instant),
    })
}

/// Write the descriptive fields of a profile into `out`
pub fn encode_profile(profile: &MemberProfile, out: &mut Fields) {
    let skills = &profile.language_skills;
    let contact = &profile.emergency_contact;

    out.insert(field::FULL_NAME.into(), profile.full_name.clone().into());
    out.insert(field::DATE_OF_BIRTH.into(), date_value(profile.date_of_birth));
    out.insert(field::GENDER.into(), profile.gender.clone().into());
    out.insert(field::PHONE.into(), profile.phone.clone().into());
    out.insert(field::EMAIL.into(), profile.email.clone().into());
    out.insert(field::ADDRESS_REGION.into(), profile.address_region.clone().into());
    out.insert(field::ADDRESS_DETAILS.into(), profile.address_details.clone().into());
    out.insert(field::JOB_STATUS.into(), profile.job_status.clone().into());
    out.insert(field::EMPLOYER_NAME.into(), profile.employer_name.clone().into());
    out.insert(
        field::LANGUAGE_SKILLS.into(),
        json!({
            "amharic": skills.amharic.as_str(),
            "oromo": skills.oromo.as_str(),
            "english": skills.english.as_str(),
        }),
    );
    out.insert(field::SERVED_BEFORE.into(), profile.served_before.into());
    out.insert(
        field::PREVIOUS_SERVICE_LOCATION.into(),
        profile.previous_service_location.clone().into(),
    );
    out.insert(field::BAPTISMAL_NAME.into(), profile.baptismal_name.clone().into());
    out.insert(field::BAPTISM_CHURCH.into(), profile.baptism_church.clone().into());
    out.insert(field::BAPTISM_DATE.into(), date_value(profile.baptism_date));
    out.insert(field::CLERGY_RANK.into(), profile.clergy_rank.clone().into());
    out.insert(field::CLERGY_DATE.into(), date_value(profile.clergy_date));
    out.insert(field::CLERGY_CHURCH.into(), profile.clergy_church.clone().into());
    out.insert(field::MEMBERSHIP_DATE.into(), date_value(profile.membership_date));
    out.insert(field::STATUS.into(), profile.status.as_str().into());
    out.insert(field::SERVICE_MONTH.into(), profile.service_month.clone().into());
    out.insert(
        field::EMERGENCY_CONTACT.into(),
        json!({
            "name": contact.name,
            "phone": contact.phone,
            "address": contact.address,
        }),
    );
    out.insert(field::NOTES.into(), profile.notes.clone().into());
}

/// Encode a member into a document body.
///
/// The identity key and the store-owned `createdAt`/`updatedAt` are never
/// written.
pub fn encode(member: &Member) -> Fields {
    let mut out = Fields::new();
    out.insert(
        field::MEMBER_IDENTIFIER.into(),
        member.member_identifier.clone().into(),
    );
    encode_profile(&member.profile, &mut out);
    out.insert(field::PHOTO_URL.into(), member.photo_url.clone().into());
    out.insert(field::ID_PHOTO_URL.into(), member.id_photo_url.clone().into());
    out
}

/// Decode a whole snapshot, skipping documents that cannot be identified
pub fn decode_snapshot(docs: &[RawDocument]) -> Vec<Member> {
    docs.iter()
        .filter_map(|doc| match decode(doc) {
            Ok(member) => Some(member),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping undecodable document");
                None
            }
        })
        .collect()
}
