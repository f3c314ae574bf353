//! The assessment aggregate: segments, their items, strands, forms, and the
//! accommodation constraints that gate which items a student may see.
//!
//! Everything here is read-only input to assembly, normally supplied by an
//! [`AssessmentProvider`](crate::provider::AssessmentProvider).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Item property name holding a language code.
pub const LANGUAGE_PROPERTY: &str = "Language";

/// A full assessment definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub key: String,
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub item_constraints: Vec<ItemConstraint>,
    /// Assessment-wide field-test eligibility dates.
    #[serde(default)]
    pub field_test_window: TimeWindow,
}

impl Assessment {
    /// An assessment is segmented when it has more than one segment.
    pub fn is_segmented(&self) -> bool {
        self.segments.len() > 1
    }

    /// Segments sorted by their configured position.
    pub fn segments_in_order(&self) -> Vec<&Segment> {
        let mut segments: Vec<&Segment> = self.segments.iter().collect();
        segments.sort_by_key(|s| s.position);
        segments
    }

    pub fn segment(&self, key: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.key == key)
    }
}

/// How a segment's content is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionAlgorithm {
    /// A pre-assembled form is administered as-is.
    FixedForm,
    /// Items are drawn adaptively from a filtered pool.
    Adaptive,
}

impl std::fmt::Display for SelectionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FixedForm => write!(f, "fixedform"),
            Self::Adaptive => write!(f, "adaptive"),
        }
    }
}

/// A separately-timed portion of an assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub key: String,
    pub id: String,
    pub position: u32,
    pub algorithm: SelectionAlgorithm,
    #[serde(default)]
    pub min_items: u32,
    #[serde(default)]
    pub max_items: u32,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub strands: Vec<Strand>,
    #[serde(default)]
    pub forms: Vec<Form>,
    #[serde(default)]
    pub field_test: FieldTestSettings,
}

impl Segment {
    /// Forms administered in the given language, in declaration order.
    pub fn forms_for_language(&self, language: &str) -> Vec<&Form> {
        self.forms.iter().filter(|f| f.language_code == language).collect()
    }

    /// Field-test items available in the given language.
    pub fn field_test_items(&self, language: &str) -> impl Iterator<Item = &Item> {
        self.items
            .iter()
            .filter(move |i| i.is_field_test && i.is_in_language(language))
    }

    pub fn strand(&self, key: &str) -> Option<&Strand> {
        self.strands.iter().find(|s| s.key == key)
    }
}

/// Field-test (embedded pilot) configuration for one segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTestSettings {
    #[serde(default)]
    pub window: TimeWindow,
    #[serde(default)]
    pub start_position: Option<i64>,
    #[serde(default)]
    pub end_position: Option<i64>,
    #[serde(default)]
    pub min_items: i64,
    #[serde(default)]
    pub max_items: i64,
}

/// An eligibility window where either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// Unbounded on both sides.
    pub fn open() -> Self {
        Self::default()
    }

    /// Both bounds are exclusive; an unset bound always passes.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| now > start) && self.end.is_none_or(|end| now < end)
    }
}

/// Blueprint targets for one content strand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strand {
    pub key: String,
    #[serde(default)]
    pub min_items: u32,
    #[serde(default)]
    pub max_items: u32,
}

impl Strand {
    pub fn new(key: impl Into<String>, min_items: u32, max_items: u32) -> Self {
        Self {
            key: key.into(),
            min_items,
            max_items,
        }
    }
}

/// A pre-assembled form for fixed-form segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    pub key: String,
    pub id: String,
    /// Forms sharing a cohort are administered together across segments.
    pub cohort: String,
    pub language_code: String,
    pub length: u32,
}

/// A name/value pair attached to an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemProperty {
    pub name: String,
    pub value: String,
}

impl ItemProperty {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A single test item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub strand: String,
    pub group_id: String,
    pub block_id: String,
    #[serde(default)]
    pub is_field_test: bool,
    #[serde(default)]
    pub properties: Vec<ItemProperty>,
}

impl Item {
    pub fn new(
        id: impl Into<String>,
        strand: impl Into<String>,
        group_id: impl Into<String>,
        block_id: impl Into<String>,
        is_field_test: bool,
        properties: Vec<ItemProperty>,
    ) -> Self {
        Self {
            id: id.into(),
            strand: strand.into(),
            group_id: group_id.into(),
            block_id: block_id.into(),
            is_field_test,
            properties,
        }
    }

    /// `"{group_id}_{block_id}"`, identifying an item group within a segment.
    pub fn group_key(&self) -> String {
        format!("{}_{}", self.group_id, self.block_id)
    }

    pub fn has_property(&self, name: &str, value: &str) -> bool {
        self.properties.iter().any(|p| p.name == name && p.value == value)
    }

    pub fn is_in_language(&self, language: &str) -> bool {
        self.has_property(LANGUAGE_PROPERTY, language)
    }
}

/// Ties an item property to an accommodation.
///
/// An inclusive constraint admits items carrying the property; an exclusive
/// one removes them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemConstraint {
    pub property_name: String,
    pub property_value: String,
    pub inclusive: bool,
}

impl ItemConstraint {
    pub fn inclusive(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property_name: name.into(),
            property_value: value.into(),
            inclusive: true,
        }
    }

    pub fn exclusive(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property_name: name.into(),
            property_value: value.into(),
            inclusive: false,
        }
    }

    pub fn matches(&self, item: &Item) -> bool {
        item.has_property(&self.property_name, &self.property_value)
    }
}
