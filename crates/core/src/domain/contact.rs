use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ContactError {
    #[error("patient name is required")]
    MissingName,
    #[error("a valid email address is required")]
    InvalidEmail,
    #[error("phone must contain 10 digits, or 11 digits starting with 1")]
    InvalidPhone,
}

/// Patient details snapshot stored on an appointment. Fields are always normalized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientContact {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl PatientContact {
    pub fn normalize(name: &str, email: &str, phone: &str) -> Result<Self, ContactError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ContactError::MissingName);
        }

        Ok(Self {
            name: name.to_string(),
            email: normalize_email(email)?,
            phone: normalize_phone(phone)?,
        })
    }
}

/// Accepts `local@domain.tld` shaped addresses: no whitespace, one `@`, a dot inside the
/// domain with text on both sides of it.
pub fn normalize_email(raw: &str) -> Result<String, ContactError> {
    let email = raw.trim();
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return Err(ContactError::InvalidEmail);
    }

    let (local, domain) = email.split_once('@').ok_or(ContactError::InvalidEmail)?;
    if local.is_empty() || domain.contains('@') {
        return Err(ContactError::InvalidEmail);
    }

    let has_dotted_domain = domain
        .char_indices()
        .any(|(index, ch)| ch == '.' && index > 0 && index + 1 < domain.len());
    if !has_dotted_domain {
        return Err(ContactError::InvalidEmail);
    }

    Ok(email.to_string())
}

/// Reduces a phone number to the canonical 11-digit form with a leading `1`.
pub fn normalize_phone(raw: &str) -> Result<String, ContactError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        10 => Ok(format!("1{digits}")),
        11 if digits.starts_with('1') => Ok(digits),
        _ => Err(ContactError::InvalidPhone),
    }
}
