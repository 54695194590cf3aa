use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::{DomainError, DomainResult};

const INDIVIDUAL_DIGITS: usize = 11;
const ORGANIZATION_DIGITS: usize = 14;
const ORGANIZATION_FIRST_WEIGHTS: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const ORGANIZATION_SECOND_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxIdKind {
    /// 11-digit individual identifier (CPF).
    Individual,
    /// 14-digit organisation identifier (CNPJ).
    Organization,
}

/// National tax identifier with verified check digits.
///
/// Only the digits are kept; punctuation in the input is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaxId {
    digits: String,
    kind: TaxIdKind,
}

impl TaxId {
    pub fn new(raw: &str) -> DomainResult<Self> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(DomainError::validation("tax_id", "tax id is required"));
        }
        if value
            .chars()
            .any(|c| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '/' | ' ')))
        {
            return Err(DomainError::validation(
                "tax_id",
                "tax id may only contain digits and the separators . - /",
            ));
        }

        let digits: Vec<u32> = value.chars().filter_map(|c| c.to_digit(10)).collect();
        let kind = match digits.len() {
            INDIVIDUAL_DIGITS => TaxIdKind::Individual,
            ORGANIZATION_DIGITS => TaxIdKind::Organization,
            n => {
                return Err(DomainError::validation(
                    "tax_id",
                    format!("tax id must have 11 or 14 digits, got {}", n),
                ))
            }
        };

        if digits.iter().all(|d| *d == digits[0]) {
            return Err(DomainError::validation(
                "tax_id",
                "tax id cannot repeat a single digit",
            ));
        }

        let valid = match kind {
            TaxIdKind::Individual => individual_check_digits_match(&digits),
            TaxIdKind::Organization => organization_check_digits_match(&digits),
        };
        if !valid {
            return Err(DomainError::validation(
                "tax_id",
                "tax id check digits do not match",
            ));
        }

        Ok(Self {
            digits: digits.iter().map(|d| char::from(b'0' + *d as u8)).collect(),
            kind,
        })
    }

    pub fn digits(&self) -> &str {
        &self.digits
    }

    pub fn kind(&self) -> TaxIdKind {
        self.kind
    }

    /// `000.000.000-00` for individuals, `00.000.000/0000-00` for organisations.
    pub fn formatted(&self) -> String {
        let d = &self.digits;
        match self.kind {
            TaxIdKind::Individual => {
                format!("{}.{}.{}-{}", &d[0..3], &d[3..6], &d[6..9], &d[9..11])
            }
            TaxIdKind::Organization => format!(
                "{}.{}.{}/{}-{}",
                &d[0..2],
                &d[2..5],
                &d[5..8],
                &d[8..12],
                &d[12..14]
            ),
        }
    }
}

fn check_digit(sum: u32) -> u32 {
    let remainder = sum % 11;
    if remainder < 2 {
        0
    } else {
        11 - remainder
    }
}

fn individual_check_digits_match(digits: &[u32]) -> bool {
    let first: u32 = digits[..9]
        .iter()
        .enumerate()
        .map(|(i, d)| d * (10 - i as u32))
        .sum();
    if check_digit(first) != digits[9] {
        return false;
    }
    let second: u32 = digits[..10]
        .iter()
        .enumerate()
        .map(|(i, d)| d * (11 - i as u32))
        .sum();
    check_digit(second) == digits[10]
}

fn organization_check_digits_match(digits: &[u32]) -> bool {
    let first: u32 = digits[..12]
        .iter()
        .zip(ORGANIZATION_FIRST_WEIGHTS)
        .map(|(d, w)| d * w)
        .sum();
    if check_digit(first) != digits[12] {
        return false;
    }
    let second: u32 = digits[..13]
        .iter()
        .zip(ORGANIZATION_SECOND_WEIGHTS)
        .map(|(d, w)| d * w)
        .sum();
    check_digit(second) == digits[13]
}

impl fmt::Display for TaxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

impl TryFrom<String> for TaxId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<TaxId> for String {
    fn from(tax_id: TaxId) -> Self {
        tax_id.formatted()
    }
}
