//! Image catalog constants, categories and structured caption contract.
//!
//! Shared by the serving path (random sample / similarity search) and the
//! ingestion tooling that populates the catalog.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Query suffix appended to every catalog image URL so clients receive a
/// display-sized rendition instead of the full-resolution original.
pub const DISPLAY_URL_SUFFIX: &str = "?fm=jpg&q=80&w=640&h=640&fit=max";

/// Dimensionality of `nomic-embed-text` embeddings stored in `images.embedding`.
pub const EMBEDDING_DIMENSION: usize = 768;

/// Task prefix the embedding model expects for stored documents.
pub const DOCUMENT_PREFIX: &str = "search_document: ";

/// Task prefix the embedding model expects for search queries.
pub const QUERY_PREFIX: &str = "search_query: ";

/// Default number of records returned by random sample and search.
pub const DEFAULT_CATALOG_LIMIT: i64 = 20;

/// Upper bound on records returned by random sample and search.
pub const MAX_CATALOG_LIMIT: i64 = 100;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Fixed set of catalog categories. Wire strings match the labels the
/// captioning model is asked to choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "3D Renders")]
    Renders3d,
    #[serde(rename = "Animals")]
    Animals,
    #[serde(rename = "Architecture & Interiors")]
    Architecture,
    #[serde(rename = "Experimental")]
    Experimental,
    #[serde(rename = "Fashion & Beauty")]
    Fashion,
    #[serde(rename = "Film")]
    Film,
    #[serde(rename = "Food & Drink")]
    Food,
    #[serde(rename = "Nature")]
    Nature,
    #[serde(rename = "People")]
    People,
    #[serde(rename = "Sports")]
    Sports,
    #[serde(rename = "Travel")]
    Travel,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Self::Renders3d,
        Self::Animals,
        Self::Architecture,
        Self::Experimental,
        Self::Fashion,
        Self::Film,
        Self::Food,
        Self::Nature,
        Self::People,
        Self::Sports,
        Self::Travel,
    ];

    /// Label stored in the `images.category` column.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Renders3d => "3D Renders",
            Self::Animals => "Animals",
            Self::Architecture => "Architecture & Interiors",
            Self::Experimental => "Experimental",
            Self::Fashion => "Fashion & Beauty",
            Self::Film => "Film",
            Self::Food => "Food & Drink",
            Self::Nature => "Nature",
            Self::People => "People",
            Self::Sports => "Sports",
            Self::Travel => "Travel",
        }
    }

    /// Resolve a stored label back to its category.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }

    /// Parse a user-supplied category filter.
    pub fn parse(label: &str) -> Result<Self, CoreError> {
        Self::from_label(label.trim()).ok_or_else(|| {
            CoreError::InvalidInput(format!("Unknown category '{label}'"))
        })
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Caption contract
// ---------------------------------------------------------------------------

/// Structured caption produced by the vision model during ingestion and
/// persisted as `<id>.json` between the describe and embed steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDescription {
    pub description: String,
    pub category: Category,
}

impl ImageDescription {
    /// Reject captions that deserialized but carry no usable text.
    pub fn validate(self) -> Result<Self, CoreError> {
        let description = self.description.trim().to_string();
        if description.is_empty() {
            return Err(CoreError::InvalidInput(
                "Image description must not be empty".into(),
            ));
        }
        Ok(Self {
            description,
            category: self.category,
        })
    }

    /// JSON schema handed to the model as its response format.
    pub fn json_schema() -> serde_json::Value {
        let labels: Vec<&str> = Category::ALL.iter().map(Category::label).collect();
        serde_json::json!({
            "type": "object",
            "properties": {
                "description": { "type": "string" },
                "category": { "type": "string", "enum": labels },
            },
            "required": ["description", "category"],
            "additionalProperties": false,
        })
    }
}

/// Captioning prompt listing the allowed categories.
pub fn caption_prompt() -> String {
    let labels = Category::ALL
        .iter()
        .map(|c| format!("'{}'", c.label()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Describe this image in detail, including the category it belongs to. \
         The category should be one of the following: {labels}"
    )
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Append the display-size suffix to a stored image URL.
pub fn display_url(url: &str) -> String {
    format!("{url}{DISPLAY_URL_SUFFIX}")
}

/// Clamp a user-provided limit to `[1, MAX_CATALOG_LIMIT]`.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(DEFAULT_CATALOG_LIMIT)
        .clamp(1, MAX_CATALOG_LIMIT)
}

/// Validate that an embedding vector has the expected dimensionality.
pub fn validate_embedding_dimension(embedding: &[f32]) -> Result<(), CoreError> {
    if embedding.len() != EMBEDDING_DIMENSION {
        return Err(CoreError::InvalidInput(format!(
            "Embedding must be {EMBEDDING_DIMENSION}-dimensional, got {}",
            embedding.len()
        )));
    }
    Ok(())
}

/// Render an embedding as a pgvector literal (`[0.1,0.2,...]`).
pub fn vector_literal(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn labels_round_trip_through_from_label() {
        for category in Category::ALL {
            assert_eq!(Category::from_label(category.label()), Some(category));
        }
        assert_eq!(Category::from_label("Cars"), None);
    }

    #[test]
    fn serde_uses_display_labels() {
        let json = serde_json::to_string(&Category::Architecture).unwrap();
        assert_eq!(json, "\"Architecture & Interiors\"");
        let parsed: Category = serde_json::from_str("\"3D Renders\"").unwrap();
        assert_eq!(parsed, Category::Renders3d);
    }

    #[test]
    fn parse_trims_and_rejects_unknown() {
        assert_eq!(Category::parse(" Nature ").unwrap(), Category::Nature);
        assert_matches!(Category::parse("nature"), Err(CoreError::InvalidInput(_)));
    }

    #[test]
    fn description_validation_trims_text() {
        let caption = ImageDescription {
            description: "  a red fox in snow \n".into(),
            category: Category::Animals,
        };
        assert_eq!(caption.validate().unwrap().description, "a red fox in snow");

        let blank = ImageDescription {
            description: "   ".into(),
            category: Category::Animals,
        };
        assert_matches!(blank.validate(), Err(CoreError::InvalidInput(_)));
    }

    #[test]
    fn caption_schema_lists_every_category() {
        let schema = ImageDescription::json_schema();
        let labels = schema["properties"]["category"]["enum"].as_array().unwrap();
        assert_eq!(labels.len(), Category::ALL.len());
        assert!(caption_prompt().contains("'Food & Drink'"));
    }

    #[test]
    fn clamp_limit_uses_default_and_bounds() {
        assert_eq!(clamp_limit(None), DEFAULT_CATALOG_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(-3)), 1);
        assert_eq!(clamp_limit(Some(5)), 5);
        assert_eq!(clamp_limit(Some(10_000)), MAX_CATALOG_LIMIT);
    }

    #[test]
    fn display_url_appends_suffix() {
        assert_eq!(
            display_url("https://images.example/photo-1"),
            "https://images.example/photo-1?fm=jpg&q=80&w=640&h=640&fit=max"
        );
    }

    #[test]
    fn embedding_dimension_is_checked() {
        assert!(validate_embedding_dimension(&vec![0.0; EMBEDDING_DIMENSION]).is_ok());
        assert_matches!(
            validate_embedding_dimension(&[0.1, 0.2]),
            Err(CoreError::InvalidInput(_))
        );
    }

    #[test]
    fn vector_literal_formats_values() {
        assert_eq!(vector_literal(&[0.5, -1.0, 2.25]), "[0.5,-1,2.25]");
        assert_eq!(vector_literal(&[]), "[]");
    }
}
