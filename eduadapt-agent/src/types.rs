//! Common types for the eduadapt-agent crate.
//!
//! Profiles and per-run options are shared with the orchestration core, which
//! re-exports them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a profile or option value cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind} value: {value}")]
pub struct ParseOptionError {
    /// Which option failed to parse
    pub kind: &'static str,
    /// The rejected input
    pub value: String,
}

impl ParseOptionError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Accessibility profile selecting both scheduling strategy and rendering treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Dyslexia,
    Adhd,
    Autism,
    /// Generic simplification for any other profile name
    #[default]
    Default,
}

impl Profile {
    /// Parse a profile selection coming from the UI.
    ///
    /// Returns `None` for the "no profile" sentinel (`"none"` or blank).
    /// Unknown names fall back to [`Profile::Default`].
    pub fn from_selection(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("none") {
            return None;
        }
        Some(value.parse().unwrap_or(Profile::Default))
    }

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Dyslexia => "dyslexia",
            Profile::Adhd => "adhd",
            Profile::Autism => "autism",
            Profile::Default => "default",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dyslexia" => Ok(Profile::Dyslexia),
            "adhd" => Ok(Profile::Adhd),
            "autism" => Ok(Profile::Autism),
            "default" | "generic" => Ok(Profile::Default),
            _ => Err(ParseOptionError::new("profile", s)),
        }
    }
}

/// How strongly text is simplified for the dyslexia profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DyslexiaLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for DyslexiaLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DyslexiaLevel::Low => "low",
            DyslexiaLevel::Medium => "medium",
            DyslexiaLevel::High => "high",
        })
    }
}

impl FromStr for DyslexiaLevel {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(DyslexiaLevel::Low),
            "medium" => Ok(DyslexiaLevel::Medium),
            "high" => Ok(DyslexiaLevel::High),
            _ => Err(ParseOptionError::new("dyslexia level", s)),
        }
    }
}

/// Length of ADHD summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdhdSummaryLength {
    #[default]
    Short,
    Long,
}

impl fmt::Display for AdhdSummaryLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AdhdSummaryLength::Short => "short",
            AdhdSummaryLength::Long => "long",
        })
    }
}

impl FromStr for AdhdSummaryLength {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(AdhdSummaryLength::Short),
            "long" => Ok(AdhdSummaryLength::Long),
            _ => Err(ParseOptionError::new("summary length", s)),
        }
    }
}

/// Reader grade band. Controls which formatted elements are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeLevel {
    Lower,
    #[default]
    Middle,
    Upper,
}

impl fmt::Display for GradeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GradeLevel::Lower => "lower",
            GradeLevel::Middle => "middle",
            GradeLevel::Upper => "upper",
        })
    }
}

impl FromStr for GradeLevel {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lower" => Ok(GradeLevel::Lower),
            "middle" => Ok(GradeLevel::Middle),
            "upper" => Ok(GradeLevel::Upper),
            _ => Err(ParseOptionError::new("grade level", s)),
        }
    }
}

/// Per-run adaptation options. Immutable for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdaptationOptions {
    pub dyslexia_level: DyslexiaLevel,
    pub adhd_summary_length: AdhdSummaryLength,
    pub grade_level: GradeLevel,
}

impl AdaptationOptions {
    /// Set the dyslexia level.
    pub fn with_dyslexia_level(mut self, level: DyslexiaLevel) -> Self {
        self.dyslexia_level = level;
        self
    }

    /// Set the ADHD summary length.
    pub fn with_summary_length(mut self, length: AdhdSummaryLength) -> Self {
        self.adhd_summary_length = length;
        self
    }

    /// Set the grade level.
    pub fn with_grade_level(mut self, grade: GradeLevel) -> Self {
        self.grade_level = grade;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_selection() {
        assert_eq!(Profile::from_selection("ADHD"), Some(Profile::Adhd));
        assert_eq!(Profile::from_selection("none"), None);
        assert_eq!(Profile::from_selection("  "), None);
        assert_eq!(Profile::from_selection("visual"), Some(Profile::Default));
    }

    #[test]
    fn test_options_wire_names() {
        let options: AdaptationOptions =
            serde_json::from_str(r#"{"gradeLevel":"lower","dyslexiaLevel":"high"}"#).unwrap();
        assert_eq!(options.grade_level, GradeLevel::Lower);
        assert_eq!(options.dyslexia_level, DyslexiaLevel::High);
        assert_eq!(options.adhd_summary_length, AdhdSummaryLength::Short);
    }

    #[test]
    fn test_parse_rejects_unknown_level() {
        let err = "extreme".parse::<DyslexiaLevel>().unwrap_err();
        assert_eq!(err.kind, "dyslexia level");
    }
}
