use lazy_static::lazy_static;
use regex::Regex;
use time::{Date, OffsetDateTime};

use crate::error::ApiError;

use super::dto::SignupRequest;
use super::repo_types::IdType;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    // unicode letters plus space, apostrophe, hyphen
    static ref NAME_RE: Regex = Regex::new(r"^[\p{L}\s'-]+$").unwrap();
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 50 && EMAIL_RE.is_match(email)
}

/// Validates a whole signup candidate after normalization. Rules that read
/// sibling fields (the id-number format depends on id_type) live here rather
/// than in per-field hooks, so one call sees the whole record.
pub fn validate_signup(req: &SignupRequest) -> Result<(), ApiError> {
    validate_name("name", &req.name)?;
    validate_name("last name", &req.last_name)?;
    if !is_valid_email(&req.email) {
        return Err(ApiError::Validation("Please provide a valid email".into()));
    }
    validate_new_password(&req.password, &req.password_confirm)?;
    validate_id_number(req.id_type, &req.id_number)?;
    if !is_at_least_years_old(req.birth_date, OffsetDateTime::now_utc().date(), 18) {
        return Err(ApiError::Validation(
            "User must be at least 18 years old".into(),
        ));
    }
    Ok(())
}

pub fn validate_new_password(password: &str, confirm: &str) -> Result<(), ApiError> {
    if password.len() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters long".into(),
        ));
    }
    if password != confirm {
        return Err(ApiError::Validation("Passwords do not match".into()));
    }
    Ok(())
}

pub fn validate_name(field: &str, value: &str) -> Result<(), ApiError> {
    if value.is_empty() || value.chars().count() > 50 || !NAME_RE.is_match(value) {
        return Err(ApiError::Validation(format!(
            "Invalid {}: up to 50 letters only",
            field
        )));
    }
    Ok(())
}

pub fn validate_id_number(id_type: IdType, id_number: &str) -> Result<(), ApiError> {
    let ok = !id_number.is_empty()
        && id_number.len() <= 20
        && match id_type {
            IdType::NationalId => id_number.chars().all(|c| c.is_ascii_digit()),
            IdType::Passport => id_number.chars().all(|c| c.is_ascii_alphanumeric()),
        };
    if !ok {
        return Err(ApiError::Validation(
            "Invalid ID number for the selected ID type".into(),
        ));
    }
    Ok(())
}

fn is_at_least_years_old(birth: Date, today: Date, years: i32) -> bool {
    let mut age = today.year() - birth.year();
    if (today.month() as u8, today.day()) < (birth.month() as u8, birth.day()) {
        age -= 1;
    }
    age >= years
}
