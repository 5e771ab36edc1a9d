//! In-memory drafts composed before a batch submission.
//!
//! The batch owns its drafts until a submission commits; mutation goes
//! through index-checked operations so a bad index is reported rather than
//! silently ignored. Validation runs only at submission time.
use std::path::PathBuf;
use thiserror::Error;

use crate::model::Style;

pub const MIN_BATCH: usize = 3;
pub const MAX_BATCH: usize = 10;
pub const MAX_IMAGES: usize = 10;

/// Price modifier text meaning "unset".
pub const UNSET_PRICE_MODIFIER: &str = "-1";

#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub title: String,
    pub description: String,
    /// Raw user input, parsed at validation.
    pub price: String,
    pub price_modifier: String,
    pub title_style: Option<Style>,
    pub description_style: Option<Style>,
    pub images: Vec<PathBuf>,
}

impl Default for Draft {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            price: String::new(),
            price_modifier: UNSET_PRICE_MODIFIER.to_string(),
            title_style: None,
            description_style: None,
            images: Vec::new(),
        }
    }
}

/// One field assignment for `DraftBatch::update_draft`.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftField {
    Title(String),
    Description(String),
    Price(String),
    PriceModifier(String),
    TitleStyle(Option<Style>),
    DescriptionStyle(Option<Style>),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("draft index {index} out of range (batch has {len} drafts)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("cannot remove the last remaining draft")]
    LastDraft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldName {
    Title,
    Description,
    Price,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub draft: usize,
    pub field: FieldName,
    pub message: &'static str,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("batch has {0} drafts; between {} and {} are required", MIN_BATCH, MAX_BATCH)]
    BatchSize(usize),
    #[error("{} draft field(s) need attention", .0.len())]
    Fields(Vec<FieldError>),
}

/// A draft that passed validation, with numbers parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidDraft {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub price_modifier: f64,
    pub title_style: Option<Style>,
    pub description_style: Option<Style>,
    pub images: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DraftBatch {
    drafts: Vec<Draft>,
}

impl Default for DraftBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl DraftBatch {
    /// A batch holding one empty draft.
    pub fn new() -> Self {
        Self {
            drafts: vec![Draft::default()],
        }
    }

    pub fn drafts(&self) -> &[Draft] {
        &self.drafts
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    /// Append an empty draft and return its index. The batch size limit is
    /// enforced at submission, not here.
    pub fn add_draft(&mut self) -> usize {
        self.drafts.push(Draft::default());
        self.drafts.len() - 1
    }

    fn draft_mut(&mut self, index: usize) -> Result<&mut Draft, DraftError> {
        let len = self.drafts.len();
        self.drafts
            .get_mut(index)
            .ok_or(DraftError::IndexOutOfRange { index, len })
    }

    pub fn update_draft(&mut self, index: usize, field: DraftField) -> Result<(), DraftError> {
        let draft = self.draft_mut(index)?;
        match field {
            DraftField::Title(v) => draft.title = v,
            DraftField::Description(v) => draft.description = v,
            DraftField::Price(v) => draft.price = v,
            DraftField::PriceModifier(v) => draft.price_modifier = v,
            DraftField::TitleStyle(v) => draft.title_style = v,
            DraftField::DescriptionStyle(v) => draft.description_style = v,
        }
        Ok(())
    }

    pub fn remove_draft(&mut self, index: usize) -> Result<Draft, DraftError> {
        let len = self.drafts.len();
        if index >= len {
            return Err(DraftError::IndexOutOfRange { index, len });
        }
        if len == 1 {
            return Err(DraftError::LastDraft);
        }
        Ok(self.drafts.remove(index))
    }

    /// Replace a draft's images; anything past `MAX_IMAGES` is dropped.
    /// Returns how many images were kept.
    pub fn set_images(&mut self, index: usize, files: Vec<PathBuf>) -> Result<usize, DraftError> {
        let draft = self.draft_mut(index)?;
        draft.images = files;
        draft.images.truncate(MAX_IMAGES);
        Ok(draft.images.len())
    }

    /// Append images after the existing ones, with the same cap.
    pub fn add_images(&mut self, index: usize, files: Vec<PathBuf>) -> Result<usize, DraftError> {
        let draft = self.draft_mut(index)?;
        draft.images.extend(files);
        draft.images.truncate(MAX_IMAGES);
        Ok(draft.images.len())
    }

    /// Check the whole batch and return parsed drafts in batch order.
    pub fn validate(&self) -> Result<Vec<ValidDraft>, ValidationError> {
        let n = self.drafts.len();
        if !(MIN_BATCH..=MAX_BATCH).contains(&n) {
            return Err(ValidationError::BatchSize(n));
        }

        let mut errors = Vec::new();
        let mut valid = Vec::with_capacity(n);
        for (i, draft) in self.drafts.iter().enumerate() {
            if draft.title.trim().is_empty() {
                errors.push(FieldError {
                    draft: i,
                    field: FieldName::Title,
                    message: "title is required",
                });
            }
            if draft.description.trim().is_empty() {
                errors.push(FieldError {
                    draft: i,
                    field: FieldName::Description,
                    message: "description is required",
                });
            }
            let price = parse_price(&draft.price);
            if price.is_none() {
                errors.push(FieldError {
                    draft: i,
                    field: FieldName::Price,
                    message: "price must be a non-negative number",
                });
            }
            if let Some(price) = price {
                valid.push(ValidDraft {
                    title: draft.title.clone(),
                    description: draft.description.clone(),
                    price,
                    price_modifier: parse_price_modifier(&draft.price_modifier),
                    title_style: draft.title_style,
                    description_style: draft.description_style,
                    images: draft.images.clone(),
                });
            }
        }

        if errors.is_empty() {
            Ok(valid)
        } else {
            Err(ValidationError::Fields(errors))
        }
    }

    /// Start over with one empty draft that keeps the first draft's styles
    /// and price modifier as defaults.
    pub fn reset_after_commit(&mut self) {
        let mut next = Draft::default();
        if let Some(first) = self.drafts.first() {
            next.title_style = first.title_style;
            next.description_style = first.description_style;
            next.price_modifier = first.price_modifier.clone();
        }
        self.drafts = vec![next];
    }
}

fn parse_price(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Unparseable modifiers count as 0, matching what the seller portal stores.
fn parse_price_modifier(text: &str) -> f64 {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(title: &str, price: &str) -> Vec<DraftField> {
        vec![
            DraftField::Title(title.into()),
            DraftField::Description(format!("{} desc", title)),
            DraftField::Price(price.into()),
        ]
    }

    fn batch_of(n: usize) -> DraftBatch {
        let mut batch = DraftBatch::new();
        for _ in 1..n {
            batch.add_draft();
        }
        for i in 0..n {
            for field in filled(&format!("item {}", i), "10") {
                batch.update_draft(i, field).unwrap();
            }
        }
        batch
    }

    #[test]
    fn new_batch_has_one_empty_draft() {
        let batch = DraftBatch::new();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.drafts()[0].price_modifier, UNSET_PRICE_MODIFIER);
        assert!(batch.drafts()[0].images.is_empty());
    }

    #[test]
    fn update_out_of_range_is_an_error() {
        let mut batch = DraftBatch::new();
        let err = batch
            .update_draft(3, DraftField::Title("x".into()))
            .unwrap_err();
        assert_eq!(err, DraftError::IndexOutOfRange { index: 3, len: 1 });
        assert_eq!(batch, DraftBatch::new());
    }

    #[test]
    fn remove_guards_index_and_last_draft() {
        let mut batch = DraftBatch::new();
        assert_eq!(batch.remove_draft(0), Err(DraftError::LastDraft));
        batch.add_draft();
        batch
            .update_draft(1, DraftField::Title("second".into()))
            .unwrap();
        assert!(matches!(
            batch.remove_draft(5),
            Err(DraftError::IndexOutOfRange { index: 5, len: 2 })
        ));
        let removed = batch.remove_draft(1).unwrap();
        assert_eq!(removed.title, "second");
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn images_are_clamped_to_ten() {
        let mut batch = DraftBatch::new();
        let files: Vec<PathBuf> = (0..14).map(|i| PathBuf::from(format!("{}.jpg", i))).collect();
        assert_eq!(batch.set_images(0, files).unwrap(), MAX_IMAGES);
        assert_eq!(batch.drafts()[0].images[9], PathBuf::from("9.jpg"));

        batch
            .set_images(0, vec![PathBuf::from("a.jpg"), PathBuf::from("b.jpg")])
            .unwrap();
        let more: Vec<PathBuf> = (0..9).map(|i| PathBuf::from(format!("m{}.jpg", i))).collect();
        assert_eq!(batch.add_images(0, more).unwrap(), MAX_IMAGES);
        assert_eq!(batch.drafts()[0].images[0], PathBuf::from("a.jpg"));
        assert_eq!(batch.drafts()[0].images[9], PathBuf::from("m7.jpg"));
        assert!(batch.set_images(2, vec![]).is_err());
    }

    #[test]
    fn batch_size_bounds() {
        for n in [1, 2, 11] {
            assert_eq!(batch_of(n).validate(), Err(ValidationError::BatchSize(n)));
        }
        for n in [3, 7, 10] {
            assert_eq!(batch_of(n).validate().unwrap().len(), n);
        }
    }

    #[test]
    fn missing_fields_are_reported_per_draft() {
        let mut batch = batch_of(3);
        batch.update_draft(0, DraftField::Title("  ".into())).unwrap();
        batch.update_draft(2, DraftField::Price("abc".into())).unwrap();
        batch.update_draft(2, DraftField::Description("".into())).unwrap();

        let Err(ValidationError::Fields(errors)) = batch.validate() else {
            panic!("expected field errors");
        };
        let found: Vec<(usize, FieldName)> = errors.iter().map(|e| (e.draft, e.field)).collect();
        assert_eq!(
            found,
            vec![
                (0, FieldName::Title),
                (2, FieldName::Description),
                (2, FieldName::Price)
            ]
        );
    }

    #[test]
    fn price_parsing() {
        assert_eq!(parse_price(" 12.50 "), Some(12.5));
        assert_eq!(parse_price("0"), Some(0.0));
        assert_eq!(parse_price("-3"), None);
        assert_eq!(parse_price("NaN"), None);
        assert_eq!(parse_price("inf"), None);
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price_modifier("-1"), -1.0);
        assert_eq!(parse_price_modifier("1.5"), 1.5);
        assert_eq!(parse_price_modifier("oops"), 0.0);
    }

    #[test]
    fn valid_drafts_carry_parsed_values() {
        let mut batch = batch_of(3);
        batch
            .update_draft(1, DraftField::PriceModifier("2.5".into()))
            .unwrap();
        batch
            .update_draft(1, DraftField::TitleStyle(Some(Style::SloppyMalay)))
            .unwrap();
        let valid = batch.validate().unwrap();
        assert_eq!(valid[1].price, 10.0);
        assert_eq!(valid[1].price_modifier, 2.5);
        assert_eq!(valid[1].title_style, Some(Style::SloppyMalay));
        assert_eq!(valid[0].price_modifier, -1.0);
    }

    #[test]
    fn reset_keeps_first_draft_preferences() {
        let mut batch = batch_of(3);
        batch
            .update_draft(0, DraftField::TitleStyle(Some(Style::SloppyEnglish)))
            .unwrap();
        batch
            .update_draft(0, DraftField::DescriptionStyle(Some(Style::SloppyMalay)))
            .unwrap();
        batch
            .update_draft(0, DraftField::PriceModifier("5".into()))
            .unwrap();
        batch.set_images(0, vec![PathBuf::from("a.jpg")]).unwrap();

        batch.reset_after_commit();
        assert_eq!(batch.len(), 1);
        let draft = &batch.drafts()[0];
        assert!(draft.title.is_empty());
        assert!(draft.price.is_empty());
        assert!(draft.images.is_empty());
        assert_eq!(draft.title_style, Some(Style::SloppyEnglish));
        assert_eq!(draft.description_style, Some(Style::SloppyMalay));
        assert_eq!(draft.price_modifier, "5");
    }
}
