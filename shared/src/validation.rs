//! Draft validation
//!
//! Checks required scalar fields and the emergency contact before any
//! upload or write is attempted.

use crate::codec::field;
use crate::error::ValidationError;
use crate::models::{MemberProfile, ServiceMonth};

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Validate a profile, collecting every failing field
pub fn validate_profile(profile: &MemberProfile) -> Result<(), ValidationError> {
    let mut missing = Vec::new();

    let required: [(&'static str, &str); 7] = [
        (field::FULL_NAME, profile.full_name.as_str()),
        (field::PHONE, profile.phone.as_str()),
        (field::GENDER, profile.gender.as_str()),
        (field::ADDRESS_REGION, profile.address_region.as_str()),
        (field::ADDRESS_DETAILS, profile.address_details.as_str()),
        (field::JOB_STATUS, profile.job_status.as_str()),
        ("emergencyContact.name", profile.emergency_contact.name.as_str()),
    ];
    for (name, value) in required {
        if blank(value) {
            missing.push(name);
        }
    }
    if blank(&profile.emergency_contact.phone) {
        missing.push("emergencyContact.phone");
    }
    if profile.date_of_birth.is_none() {
        missing.push(field::DATE_OF_BIRTH);
    }
    if profile.membership_date.is_none() {
        missing.push(field::MEMBERSHIP_DATE);
    }
    if ServiceMonth::parse(&profile.service_month).is_none() {
        missing.push(field::SERVICE_MONTH);
    }
    if profile.served_before && blank(&profile.previous_service_location) {
        missing.push(field::PREVIOUS_SERVICE_LOCATION);
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { missing })
    }
}
