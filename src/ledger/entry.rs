use crate::api::Identified;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Minimum description length accepted for a draft.
pub const MIN_DESCRIPTION_LEN: usize = 3;

// ============================================================================
// Category
// ============================================================================

/// Fixed set of spending categories.
///
/// Serialized lowercase on the wire; `FromStr` accepts any casing so CLI
/// input like `Groceries` parses too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Utilities,
    Groceries,
    Transport,
    Entertainment,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Utilities,
        Category::Groceries,
        Category::Transport,
        Category::Entertainment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Utilities => "utilities",
            Category::Groceries => "groceries",
            Category::Transport => "transport",
            Category::Entertainment => "entertainment",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown category: {0} (expected one of utilities, groceries, transport, entertainment)")]
pub struct ParseCategoryError(String);

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utilities" => Ok(Category::Utilities),
            "groceries" => Ok(Category::Groceries),
            "transport" => Ok(Category::Transport),
            "entertainment" => Ok(Category::Entertainment),
            other => Err(ParseCategoryError(other.to_owned())),
        }
    }
}

// ============================================================================
// Entry
// ============================================================================

/// A single expense entry in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Unique within a collection; server-assigned once synced.
    pub id: u64,
    pub description: String,
    pub amount: f64,
    pub category: Category,
}

impl Identified for Entry {
    fn id(&self) -> u64 {
        self.id
    }
}

// ============================================================================
// EntryDraft
// ============================================================================

/// Candidate entry before an identifier is assigned.
#[derive(Debug, Clone)]
pub struct EntryDraft {
    pub description: String,
    pub amount: f64,
    pub category: Category,
}

/// Validation failures for a draft entry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("Description is required")]
    EmptyDescription,
    #[error("Description must be at least {} characters", MIN_DESCRIPTION_LEN)]
    DescriptionTooShort,
    #[error("Amount must be a positive number")]
    InvalidAmount,
}

impl EntryDraft {
    pub fn new(description: impl Into<String>, amount: f64, category: Category) -> Self {
        Self {
            description: description.into(),
            amount,
            category,
        }
    }

    /// Check the draft against the ledger's acceptance rules.
    ///
    /// The description must be non-blank and at least
    /// [`MIN_DESCRIPTION_LEN`] characters after trimming; the amount must be
    /// finite and strictly positive.
    pub fn validate(&self) -> Result<(), DraftError> {
        let trimmed = self.description.trim();
        if trimmed.is_empty() {
            return Err(DraftError::EmptyDescription);
        }
        if trimmed.chars().count() < MIN_DESCRIPTION_LEN {
            return Err(DraftError::DescriptionTooShort);
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(DraftError::InvalidAmount);
        }
        Ok(())
    }

    pub(crate) fn into_entry(self, id: u64) -> Entry {
        Entry {
            id,
            description: self.description.trim().to_string(),
            amount: self.amount,
            category: self.category,
        }
    }
}
