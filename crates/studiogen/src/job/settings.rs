//! Typed per-kind generation settings.
//!
//! Settings are validated once when a job is created and then stored
//! verbatim, so regenerating a job reuses exactly the same configuration.

use serde::{Deserialize, Serialize};

use super::model::JobKind;
use crate::error::ValidationError;

const MAX_LANGUAGE_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum GenerationSettings {
    SlideDeck(SlideDeckSettings),
    MindMap(MindMapSettings),
    Quiz(QuizSettings),
    Report(ReportSettings),
    Flashcards(FlashcardSettings),
    Infographic(InfographicSettings),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SlideDeckSettings {
    pub language: String,
    pub slide_count: u32,
    pub style: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
}

impl Default for SlideDeckSettings {
    fn default() -> Self {
        Self {
            language: default_language(),
            slide_count: 10,
            style: "professional".to_string(),
            audience: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MindMapSettings {
    pub language: String,
    pub branch_count: u32,
    pub max_depth: u32,
}

impl Default for MindMapSettings {
    fn default() -> Self {
        Self {
            language: default_language(),
            branch_count: 6,
            max_depth: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuizSettings {
    pub language: String,
    pub question_count: u32,
    pub difficulty: Difficulty,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            language: default_language(),
            question_count: 10,
            difficulty: Difficulty::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportFormat {
    #[default]
    Briefing,
    StudyGuide,
    BlogPost,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReportSettings {
    pub language: String,
    pub section_count: u32,
    pub format: ReportFormat,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            language: default_language(),
            section_count: 5,
            format: ReportFormat::Briefing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlashcardSettings {
    pub language: String,
    pub card_count: u32,
}

impl Default for FlashcardSettings {
    fn default() -> Self {
        Self {
            language: default_language(),
            card_count: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    #[default]
    Portrait,
    Square,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InfographicSettings {
    pub language: String,
    pub panel_count: u32,
    pub orientation: Orientation,
    pub style: String,
}

impl Default for InfographicSettings {
    fn default() -> Self {
        Self {
            language: default_language(),
            panel_count: 4,
            orientation: Orientation::Portrait,
            style: "flat".to_string(),
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

impl GenerationSettings {
    pub fn kind(&self) -> JobKind {
        match self {
            GenerationSettings::SlideDeck(_) => JobKind::SlideDeck,
            GenerationSettings::MindMap(_) => JobKind::MindMap,
            GenerationSettings::Quiz(_) => JobKind::Quiz,
            GenerationSettings::Report(_) => JobKind::Report,
            GenerationSettings::Flashcards(_) => JobKind::Flashcards,
            GenerationSettings::Infographic(_) => JobKind::Infographic,
        }
    }

    pub fn language(&self) -> &str {
        match self {
            GenerationSettings::SlideDeck(s) => &s.language,
            GenerationSettings::MindMap(s) => &s.language,
            GenerationSettings::Quiz(s) => &s.language,
            GenerationSettings::Report(s) => &s.language,
            GenerationSettings::Flashcards(s) => &s.language,
            GenerationSettings::Infographic(s) => &s.language,
        }
    }

    /// Number of sub-items requested from the planner.
    pub fn item_count(&self) -> u32 {
        match self {
            GenerationSettings::SlideDeck(s) => s.slide_count,
            GenerationSettings::MindMap(s) => s.branch_count,
            GenerationSettings::Quiz(s) => s.question_count,
            GenerationSettings::Report(s) => s.section_count,
            GenerationSettings::Flashcards(s) => s.card_count,
            GenerationSettings::Infographic(s) => s.panel_count,
        }
    }

    /// Shared style hint handed to the renderer for every item.
    pub fn style_hint(&self) -> Option<String> {
        match self {
            GenerationSettings::SlideDeck(s) => Some(s.style.clone()),
            GenerationSettings::Infographic(s) => {
                Some(format!("{} ({:?})", s.style, s.orientation).to_lowercase())
            }
            GenerationSettings::Report(s) => Some(format!("{:?}", s.format).to_lowercase()),
            GenerationSettings::Quiz(s) => Some(format!("{:?}", s.difficulty).to_lowercase()),
            GenerationSettings::MindMap(_) | GenerationSettings::Flashcards(_) => None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_language(self.language())?;

        match self {
            GenerationSettings::SlideDeck(s) => {
                check_range("slideCount", s.slide_count, 1, 40)?;
                check_not_blank("style", &s.style)
            }
            GenerationSettings::MindMap(s) => {
                check_range("branchCount", s.branch_count, 1, 20)?;
                check_range("maxDepth", s.max_depth, 1, 6)
            }
            GenerationSettings::Quiz(s) => check_range("questionCount", s.question_count, 1, 50),
            GenerationSettings::Report(s) => check_range("sectionCount", s.section_count, 1, 20),
            GenerationSettings::Flashcards(s) => check_range("cardCount", s.card_count, 1, 100),
            GenerationSettings::Infographic(s) => {
                check_range("panelCount", s.panel_count, 1, 12)?;
                check_not_blank("style", &s.style)
            }
        }
    }
}

fn validate_language(language: &str) -> Result<(), ValidationError> {
    let valid = !language.is_empty()
        && language.len() <= MAX_LANGUAGE_LEN
        && language
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidSetting {
            field: "language".to_string(),
            reason: format!("'{}' is not a language tag", language),
        })
    }
}

fn check_range(field: &str, value: u32, min: u32, max: u32) -> Result<(), ValidationError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidSetting {
            field: field.to_string(),
            reason: format!("{} is outside {}..={}", value, min, max),
        })
    }
}

fn check_not_blank(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::InvalidSetting {
            field: field.to_string(),
            reason: "must not be blank".to_string(),
        })
    } else {
        Ok(())
    }
}
