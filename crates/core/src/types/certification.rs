//! Certification identifiers and quiz keys.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`CertificationId`] or [`QuizKey`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CertificationIdError {
    #[error("certification id must be {min}-{max} characters")]
    Length { min: usize, max: usize },
    #[error("certification id may only contain lowercase letters, digits and '-'")]
    InvalidCharacter,
    #[error("certification id cannot start or end with '-'")]
    EdgeHyphen,
    #[error("quiz number must be at least 1")]
    InvalidQuizNumber,
    #[error("malformed quiz key: {0}")]
    MalformedQuizKey(String),
}

/// Known exam codes and their display names.
///
/// Unknown but well-formed ids are accepted; they render with the upper-cased
/// code as their name.
const KNOWN_CERTIFICATIONS: &[(&str, &str)] = &[
    ("clf-c02", "AWS Certified Cloud Practitioner"),
    ("aif-c01", "AWS Certified AI Practitioner"),
    ("saa-c03", "AWS Certified Solutions Architect - Associate"),
    ("dva-c02", "AWS Certified Developer - Associate"),
    ("soa-c02", "AWS Certified SysOps Administrator - Associate"),
    ("dea-c01", "AWS Certified Data Engineer - Associate"),
    ("mla-c01", "AWS Certified Machine Learning Engineer - Associate"),
    ("sap-c02", "AWS Certified Solutions Architect - Professional"),
    ("dop-c02", "AWS Certified DevOps Engineer - Professional"),
    ("ans-c01", "AWS Certified Advanced Networking - Specialty"),
    ("scs-c02", "AWS Certified Security - Specialty"),
    ("mls-c01", "AWS Certified Machine Learning - Specialty"),
];

/// An exam code such as `saa-c03`.
///
/// Input is trimmed and lower-cased before validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CertificationId(String);

impl CertificationId {
    pub const MIN_LENGTH: usize = 3;
    pub const MAX_LENGTH: usize = 32;

    /// Parse a certification id.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is the wrong length, contains characters
    /// other than `[a-z0-9-]`, or starts/ends with a hyphen.
    pub fn parse(s: &str) -> Result<Self, CertificationIdError> {
        let normalized = s.trim().to_ascii_lowercase();

        if !(Self::MIN_LENGTH..=Self::MAX_LENGTH).contains(&normalized.len()) {
            return Err(CertificationIdError::Length {
                min: Self::MIN_LENGTH,
                max: Self::MAX_LENGTH,
            });
        }

        if !normalized
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(CertificationIdError::InvalidCharacter);
        }

        if normalized.starts_with('-') || normalized.ends_with('-') {
            return Err(CertificationIdError::EdgeHyphen);
        }

        Ok(Self(normalized))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human readable certification name used on certificates.
    #[must_use]
    pub fn display_name(&self) -> String {
        KNOWN_CERTIFICATIONS
            .iter()
            .find(|(code, _)| *code == self.0)
            .map_or_else(|| self.0.to_ascii_uppercase(), |(_, name)| (*name).to_string())
    }

    /// Build the progress key for a quiz within this certification.
    ///
    /// # Errors
    ///
    /// Returns [`CertificationIdError::InvalidQuizNumber`] for quiz numbers below 1.
    pub fn quiz(&self, quiz_number: i32) -> Result<QuizKey, CertificationIdError> {
        QuizKey::new(self.clone(), quiz_number)
    }
}

impl fmt::Display for CertificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CertificationId {
    type Err = CertificationIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CertificationId {
    type Error = CertificationIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CertificationId> for String {
    fn from(id: CertificationId) -> Self {
        id.0
    }
}

impl AsRef<str> for CertificationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The sort key of a progress record: `"{certification}#{quiz_number}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuizKey {
    certification: CertificationId,
    quiz_number: i32,
}

impl QuizKey {
    /// # Errors
    ///
    /// Returns [`CertificationIdError::InvalidQuizNumber`] for quiz numbers below 1.
    pub fn new(
        certification: CertificationId,
        quiz_number: i32,
    ) -> Result<Self, CertificationIdError> {
        if quiz_number < 1 {
            return Err(CertificationIdError::InvalidQuizNumber);
        }
        Ok(Self {
            certification,
            quiz_number,
        })
    }

    #[must_use]
    pub const fn certification(&self) -> &CertificationId {
        &self.certification
    }

    #[must_use]
    pub const fn quiz_number(&self) -> i32 {
        self.quiz_number
    }
}

impl fmt::Display for QuizKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.certification, self.quiz_number)
    }
}

impl std::str::FromStr for QuizKey {
    type Err = CertificationIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (cert, quiz) = s
            .rsplit_once('#')
            .ok_or_else(|| CertificationIdError::MalformedQuizKey(s.to_string()))?;
        let quiz_number = quiz
            .parse::<i32>()
            .map_err(|_| CertificationIdError::MalformedQuizKey(s.to_string()))?;
        Self::new(CertificationId::parse(cert)?, quiz_number)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        let id = CertificationId::parse(" SAA-C03 ").unwrap();
        assert_eq!(id.as_str(), "saa-c03");
    }

    #[test]
    fn test_parse_rejects_bad_ids() {
        assert!(matches!(
            CertificationId::parse("ab"),
            Err(CertificationIdError::Length { .. })
        ));
        assert_eq!(
            CertificationId::parse("saa_c03"),
            Err(CertificationIdError::InvalidCharacter)
        );
        assert_eq!(
            CertificationId::parse("-saa"),
            Err(CertificationIdError::EdgeHyphen)
        );
    }

    #[test]
    fn test_display_name() {
        let known = CertificationId::parse("dva-c02").unwrap();
        assert_eq!(known.display_name(), "AWS Certified Developer - Associate");

        let unknown = CertificationId::parse("xyz-c09").unwrap();
        assert_eq!(unknown.display_name(), "XYZ-C09");
    }

    #[test]
    fn test_quiz_key_format() {
        let key = CertificationId::parse("clf-c02").unwrap().quiz(3).unwrap();
        assert_eq!(key.to_string(), "clf-c02#3");

        let parsed: QuizKey = "clf-c02#3".parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_quiz_key_rejects_zero() {
        let cert = CertificationId::parse("clf-c02").unwrap();
        assert_eq!(cert.quiz(0), Err(CertificationIdError::InvalidQuizNumber));
        assert!("clf-c02#x".parse::<QuizKey>().is_err());
        assert!("clf-c02".parse::<QuizKey>().is_err());
    }
}
