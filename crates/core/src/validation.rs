//! Boundary validation for write inputs.
//!
//! Inputs are checked here before any store or remote call sees them, so a
//! rejected write never leaves a partial mutation behind.
//!
//! | Field | Rule |
//! |---|---|
//! | `name` | at least 3 characters |
//! | `document` | 11 (CPF) or 14 (CNPJ) digits, masks ignored |
//! | `email` | see [`Email::parse`] |
//! | `phone` | at least 14 characters, mask included |
//! | `addresses` | at least one on registration |
//! | `street`, `number`, `neighborhood`, `city` | non-empty |
//! | `state` | at least 2 characters |
//! | `zipcode` | 8 digits, masks ignored |

use serde::Serialize;

use crate::types::{
    AddressPatch, CustomerPatch, DocumentKind, Email, NewAddress, NewCustomer, digits_only,
};

const MIN_NAME_CHARS: usize = 3;
const MIN_PHONE_CHARS: usize = 14;
const MIN_STATE_CHARS: usize = 2;
const ZIPCODE_DIGITS: usize = 8;

/// A field that failed validation and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    /// Field path, e.g. `email` or `addresses[1].zipcode`.
    pub field: String,
    /// Human-readable reason.
    pub reason: String,
}

impl ValidationError {
    /// Create a new validation error.
    #[must_use]
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Types that can be checked before they are merged into a record.
pub trait Validate {
    /// Check every rule that applies to the fields present.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered.
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for NewCustomer {
    fn validate(&self) -> Result<(), ValidationError> {
        check_name(&self.name)?;
        check_document(&self.document)?;
        check_email(&self.email)?;
        check_phone(&self.phone)?;
        if self.addresses.is_empty() {
            return Err(ValidationError::new(
                "addresses",
                "at least one address is required",
            ));
        }
        check_address_list(&self.addresses)
    }
}

impl Validate for CustomerPatch {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            check_name(name)?;
        }
        if let Some(document) = &self.document {
            check_document(document)?;
        }
        if let Some(email) = &self.email {
            check_email(email)?;
        }
        if let Some(phone) = &self.phone {
            check_phone(phone)?;
        }
        if let Some(addresses) = &self.addresses {
            check_address_list(addresses)?;
        }
        Ok(())
    }
}

impl Validate for NewAddress {
    fn validate(&self) -> Result<(), ValidationError> {
        check_address(self, "")
    }
}

impl Validate for AddressPatch {
    fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("street", &self.street),
            ("number", &self.number),
            ("neighborhood", &self.neighborhood),
            ("city", &self.city),
        ];
        for (field, value) in required {
            if let Some(value) = value {
                check_required(field, value)?;
            }
        }
        if let Some(state) = &self.state {
            check_state("state", state)?;
        }
        if let Some(zipcode) = &self.zipcode {
            check_zipcode("zipcode", zipcode)?;
        }
        Ok(())
    }
}

fn check_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().chars().count() < MIN_NAME_CHARS {
        return Err(ValidationError::new(
            "name",
            format!("must be at least {MIN_NAME_CHARS} characters"),
        ));
    }
    Ok(())
}

fn check_document(document: &str) -> Result<(), ValidationError> {
    if DocumentKind::classify(document).is_none() {
        return Err(ValidationError::new(
            "document",
            "must be a CPF (11 digits) or CNPJ (14 digits)",
        ));
    }
    Ok(())
}

fn check_email(email: &str) -> Result<(), ValidationError> {
    Email::parse(email)
        .map(|_| ())
        .map_err(|e| ValidationError::new("email", e.to_string()))
}

fn check_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.trim().chars().count() < MIN_PHONE_CHARS {
        return Err(ValidationError::new(
            "phone",
            format!("must be at least {MIN_PHONE_CHARS} characters, e.g. (11) 90000-0000"),
        ));
    }
    Ok(())
}

fn check_address_list(addresses: &[NewAddress]) -> Result<(), ValidationError> {
    for (index, address) in addresses.iter().enumerate() {
        check_address(address, &format!("addresses[{index}]."))?;
    }
    Ok(())
}

fn check_address(address: &NewAddress, prefix: &str) -> Result<(), ValidationError> {
    let required = [
        ("street", &address.street),
        ("number", &address.number),
        ("neighborhood", &address.neighborhood),
        ("city", &address.city),
    ];
    for (field, value) in required {
        check_required(&format!("{prefix}{field}"), value)?;
    }
    check_state(&format!("{prefix}state"), &address.state)?;
    check_zipcode(&format!("{prefix}zipcode"), &address.zipcode)
}

fn check_required(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "is required"));
    }
    Ok(())
}

fn check_state(field: &str, state: &str) -> Result<(), ValidationError> {
    if state.trim().chars().count() < MIN_STATE_CHARS {
        return Err(ValidationError::new(
            field,
            format!("must be at least {MIN_STATE_CHARS} characters"),
        ));
    }
    Ok(())
}

fn check_zipcode(field: &str, zipcode: &str) -> Result<(), ValidationError> {
    if digits_only(zipcode).len() != ZIPCODE_DIGITS {
        return Err(ValidationError::new(
            field,
            format!("must have {ZIPCODE_DIGITS} digits"),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid_address() -> NewAddress {
        NewAddress {
            id: None,
            street: "Rua X".to_string(),
            number: "1".to_string(),
            neighborhood: "N".to_string(),
            city: "C".to_string(),
            state: "SP".to_string(),
            zipcode: "00000-000".to_string(),
        }
    }

    fn valid_customer() -> NewCustomer {
        NewCustomer {
            name: "Ana Lima".to_string(),
            document: "11111111111".to_string(),
            email: "a@a.com".to_string(),
            phone: "(11)90000-0000".to_string(),
            addresses: vec![valid_address()],
        }
    }

    #[test]
    fn test_valid_registration_passes() {
        assert!(valid_customer().validate().is_ok());
    }

    #[test]
    fn test_short_name_rejected() {
        let input = NewCustomer {
            name: "Al".to_string(),
            ..valid_customer()
        };
        assert_eq!(input.validate().unwrap_err().field, "name");
    }

    #[test]
    fn test_document_accepts_masked_cnpj() {
        let input = NewCustomer {
            document: "12.345.678/0001-90".to_string(),
            ..valid_customer()
        };
        assert!(input.validate().is_ok());

        let input = NewCustomer {
            document: "123".to_string(),
            ..valid_customer()
        };
        assert_eq!(input.validate().unwrap_err().field, "document");
    }

    #[test]
    fn test_registration_requires_an_address() {
        let input = NewCustomer {
            addresses: vec![],
            ..valid_customer()
        };
        assert_eq!(input.validate().unwrap_err().field, "addresses");
    }

    #[test]
    fn test_nested_address_errors_carry_path() {
        let mut second = valid_address();
        second.zipcode = "1234".to_string();
        let input = NewCustomer {
            addresses: vec![valid_address(), second],
            ..valid_customer()
        };
        let err = input.validate().unwrap_err();
        assert_eq!(err.field, "addresses[1].zipcode");
        assert_eq!(err.to_string(), "addresses[1].zipcode: must have 8 digits");
    }

    #[test]
    fn test_patch_validates_only_present_fields() {
        assert!(CustomerPatch::default().validate().is_ok());

        let patch = CustomerPatch {
            email: Some("invalid".to_string()),
            ..CustomerPatch::default()
        };
        assert_eq!(patch.validate().unwrap_err().field, "email");
    }

    #[test]
    fn test_address_patch_rules() {
        let patch = AddressPatch {
            zipcode: Some("01310-100".to_string()),
            ..AddressPatch::default()
        };
        assert!(patch.validate().is_ok());

        let patch = AddressPatch {
            street: Some("   ".to_string()),
            ..AddressPatch::default()
        };
        assert_eq!(patch.validate().unwrap_err().field, "street");
    }

    #[test]
    fn test_standalone_address_has_no_prefix() {
        let address = NewAddress {
            state: "S".to_string(),
            ..valid_address()
        };
        assert_eq!(address.validate().unwrap_err().field, "state");
    }
}
