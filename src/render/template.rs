//! Template schema.
//!
//! Templates are stored as free-form JSON owned by the company that authored
//! them. Each section is classified into a closed set of variants when the
//! template is loaded; anything that cannot be classified becomes
//! [`Section::Unsupported`] so a single bad section never poisons the rest.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KeyValueItem {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChecklistQuestion {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, rename = "passValues")]
    pub pass_values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Field kinds understood by the pre-section template format.
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyFieldKind {
    Photo,
    Table(Vec<Column>),
    Plain,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyField {
    /// Nameless fields still render their label row, with no data.
    pub name: Option<String>,
    pub label: Option<String>,
    pub kind: LegacyFieldKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    KeyValue {
        title: String,
        items: Vec<KeyValueItem>,
    },
    Checklist {
        title: String,
        questions: Vec<ChecklistQuestion>,
    },
    Table {
        title: String,
        /// Data key holding the row set; falls back to the section id.
        field: Option<String>,
        columns: Vec<Column>,
    },
    Photos {
        title: String,
        field: Option<String>,
    },
    Notes {
        title: String,
        field: Option<String>,
    },
    Legacy {
        title: String,
        fields: Vec<LegacyField>,
    },
    Unsupported {
        title: String,
        kind: Option<String>,
    },
}

impl Section {
    pub fn title(&self) -> &str {
        match self {
            Section::KeyValue { title, .. }
            | Section::Checklist { title, .. }
            | Section::Table { title, .. }
            | Section::Photos { title, .. }
            | Section::Notes { title, .. }
            | Section::Legacy { title, .. }
            | Section::Unsupported { title, .. } => title,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Section::Legacy { .. })
    }

    /// Classify one raw JSON section. Never fails.
    pub fn from_value(raw: &Value) -> Self {
        let title = string_field(raw, "title").unwrap_or_default();
        let kind = string_field(raw, "type");
        let field = string_field(raw, "field");

        let Some(kind) = kind else {
            return match raw.get("fields").and_then(Value::as_array) {
                Some(fields) => Section::Legacy {
                    title,
                    fields: fields.iter().filter_map(LegacyField::from_value).collect(),
                },
                None => Section::Unsupported { title, kind: None },
            };
        };

        let classified = match kind.as_str() {
            "key_value" => list_field(raw, "items").map(|items| Section::KeyValue {
                title: title.clone(),
                items,
            }),
            "checklist" => list_field(raw, "questions").map(|questions| Section::Checklist {
                title: title.clone(),
                questions,
            }),
            "table" => list_field(raw, "columns").map(|columns| Section::Table {
                title: title.clone(),
                field: field.clone().or_else(|| string_field(raw, "id")),
                columns,
            }),
            "photos" => Some(Section::Photos {
                title: title.clone(),
                field: field.clone(),
            }),
            "notes" => Some(Section::Notes {
                title: title.clone(),
                field: field.clone(),
            }),
            _ => None,
        };

        classified.unwrap_or(Section::Unsupported {
            title,
            kind: Some(kind),
        })
    }
}

impl LegacyField {
    fn from_value(raw: &Value) -> Option<Self> {
        if !raw.is_object() {
            return None;
        }
        let name = string_field(raw, "name");
        let kind = match raw.get("type").and_then(Value::as_str) {
            Some("photo") => LegacyFieldKind::Photo,
            Some("table") => LegacyFieldKind::Table(list_field(raw, "columns").unwrap_or_default()),
            _ => LegacyFieldKind::Plain,
        };
        Some(Self {
            name,
            label: string_field(raw, "label"),
            kind,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Template {
    pub sections: Vec<Section>,
}

impl Template {
    /// Load a template from its stored JSON. A missing or malformed
    /// `sections` array yields an empty template.
    pub fn from_value(raw: &Value) -> Self {
        let sections = raw
            .get("sections")
            .and_then(Value::as_array)
            .map(|sections| {
                sections
                    .iter()
                    .filter(|s| !s.is_null())
                    .map(Section::from_value)
                    .collect()
            })
            .unwrap_or_default();
        Self { sections }
    }

    /// Older templates carry `fields[]` instead of a section `type`.
    pub fn uses_legacy_format(&self) -> bool {
        self.sections.iter().any(Section::is_legacy)
    }
}

fn string_field(raw: &Value, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Missing lists are empty; lists that are present but malformed are `None`.
fn list_field<T: serde::de::DeserializeOwned>(raw: &Value, key: &str) -> Option<Vec<T>> {
    match raw.get(key) {
        None | Some(Value::Null) => Some(Vec::new()),
        Some(value) => serde_json::from_value(value.clone()).ok(),
    }
}
