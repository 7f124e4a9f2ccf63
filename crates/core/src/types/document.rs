//! Brazilian tax document helpers (CPF / CNPJ).

use serde::{Deserialize, Serialize};

/// Kind of tax document, derived from its digit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentKind {
    /// Individual taxpayer registry, 11 digits.
    Cpf,
    /// Company registry, 14 digits.
    Cnpj,
}

impl DocumentKind {
    /// Number of digits a CPF carries.
    pub const CPF_DIGITS: usize = 11;
    /// Number of digits a CNPJ carries.
    pub const CNPJ_DIGITS: usize = 14;

    /// Classify a document by its digits, ignoring mask punctuation.
    ///
    /// ```
    /// use cadastro_core::DocumentKind;
    ///
    /// assert_eq!(DocumentKind::classify("123.456.789-01"), Some(DocumentKind::Cpf));
    /// assert_eq!(DocumentKind::classify("12.345.678/0001-90"), Some(DocumentKind::Cnpj));
    /// assert_eq!(DocumentKind::classify("1234"), None);
    /// ```
    #[must_use]
    pub fn classify(document: &str) -> Option<Self> {
        match digits_only(document).len() {
            Self::CPF_DIGITS => Some(Self::Cpf),
            Self::CNPJ_DIGITS => Some(Self::Cnpj),
            _ => None,
        }
    }
}

/// Strip everything but ASCII digits from a masked value.
#[must_use]
pub fn digits_only(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}
