//! Quick prompt templates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named, reusable prompt template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickPrompt {
    pub id: i64,
    /// Unique display name
    pub name: String,
    pub prompt_text: String,
    pub description: Option<String>,
    /// Marks templates seeded at first startup. Seeds are deletable like any
    /// other prompt.
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
