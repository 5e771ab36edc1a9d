//! YAML manifest describing the drafts of one submission.
//!
//! ```yaml
//! drafts:
//!   - title: Rattan chair
//!     description: Solid, no scratches
//!     price: 120
//!     title_style: sloppy_malay
//!     images: [chair-front.jpg, chair-side.jpg]
//! ```
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::draft::{DraftBatch, DraftError, DraftField};
use crate::model::Style;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("manifest lists no drafts")]
    Empty,
    #[error(transparent)]
    Draft(#[from] DraftError),
}

/// Prices may be written as YAML numbers or strings; both are kept as text
/// and parsed at validation like typed input.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawNumber {
    Number(f64),
    Text(String),
}

impl RawNumber {
    fn into_text(self) -> String {
        match self {
            RawNumber::Number(n) => n.to_string(),
            RawNumber::Text(s) => s,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ManifestDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: Option<RawNumber>,
    #[serde(default)]
    pub price_modifier: Option<RawNumber>,
    #[serde(default)]
    pub title_style: Option<Style>,
    #[serde(default, alias = "desc_style")]
    pub description_style: Option<Style>,
    #[serde(default)]
    pub images: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DraftManifest {
    pub drafts: Vec<ManifestDraft>,
}

impl DraftManifest {
    pub fn from_yaml(content: &str) -> Result<Self, ManifestError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Build the batch through the regular builder operations. Relative
    /// image paths are resolved against `base_dir`.
    pub fn into_batch(self, base_dir: &Path) -> Result<DraftBatch, ManifestError> {
        if self.drafts.is_empty() {
            return Err(ManifestError::Empty);
        }
        let mut batch = DraftBatch::new();
        for (i, entry) in self.drafts.into_iter().enumerate() {
            let index = if i == 0 { 0 } else { batch.add_draft() };
            let mut fields = vec![
                DraftField::Title(entry.title),
                DraftField::Description(entry.description),
                DraftField::TitleStyle(entry.title_style),
                DraftField::DescriptionStyle(entry.description_style),
            ];
            if let Some(price) = entry.price {
                fields.push(DraftField::Price(price.into_text()));
            }
            if let Some(modifier) = entry.price_modifier {
                fields.push(DraftField::PriceModifier(modifier.into_text()));
            }
            for field in fields {
                batch.update_draft(index, field)?;
            }

            let images = entry
                .images
                .into_iter()
                .map(|p| if p.is_absolute() { p } else { base_dir.join(p) })
                .collect();
            batch.set_images(index, images)?;
        }
        Ok(batch)
    }
}

/// Read a manifest file and turn it into a batch.
pub fn load_batch(path: &Path) -> Result<DraftBatch, ManifestError> {
    let content = fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    DraftManifest::from_yaml(&content)?.into_batch(base_dir)
}
