//! Section renderers.
//!
//! Every renderer is total: missing data renders the placeholder and an
//! unclassifiable section renders a notice in its own box.

use serde_json::{Map, Value};

use super::html::{escape_html, format_value, unit_suffix, value_text, PLACEHOLDER};
use super::template::{
    ChecklistQuestion, Column, KeyValueItem, LegacyField, LegacyFieldKind, Section, Template,
};

const UNSUPPORTED_NOTICE: &str = "Desteklenmeyen bölüm türü";
const DEFAULT_PHOTO_ALT: &str = "photo";

pub type InspectionData = Map<String, Value>;

/// Render all sections of `template` against inspection `data`.
pub fn render_template(template: &Template, data: &InspectionData, photos: &[String]) -> String {
    if template.uses_legacy_format() {
        return render_legacy(template, data, photos);
    }

    template
        .sections
        .iter()
        .map(|section| render_section(section, data, photos))
        .collect()
}

fn render_section(section: &Section, data: &InspectionData, photos: &[String]) -> String {
    let inner = match section {
        Section::KeyValue { items, .. } => render_key_value(items, data),
        Section::Checklist { questions, .. } => render_checklist(questions, data),
        Section::Table { field, columns, .. } => {
            let rows = field.as_deref().and_then(|f| data.get(f));
            render_table(columns, rows)
        }
        Section::Photos { title, field } => {
            let urls = field
                .as_deref()
                .and_then(|f| data.get(f))
                .and_then(Value::as_array)
                .map(|items| items.iter().map(value_text).collect::<Vec<_>>())
                .unwrap_or_else(|| photos.to_vec());
            let alt = if title.is_empty() {
                field.as_deref().unwrap_or(DEFAULT_PHOTO_ALT)
            } else {
                title.as_str()
            };
            format!(r#"<div class="photo-grid">{}</div>"#, render_images(&urls, alt))
        }
        Section::Notes { field, .. } => {
            let value = field.as_deref().and_then(|f| data.get(f));
            format!(r#"<div class="notes">{}</div>"#, format_value(value))
        }
        // Only reachable through `render_legacy`.
        Section::Legacy { fields, .. } => render_legacy_fields(fields, data, photos),
        Section::Unsupported { kind, .. } => {
            if let Some(kind) = kind {
                log::debug!("Rendering placeholder for unsupported section type '{}'", kind);
            }
            format!(r#"<div class="notes">{}</div>"#, UNSUPPORTED_NOTICE)
        }
    };
    wrap_section(section.title(), &inner)
}

fn render_key_value(items: &[KeyValueItem], data: &InspectionData) -> String {
    let mut html = String::from(r#"<table class="data-table">"#);
    for item in items {
        let value = data.get(&item.name);
        html.push_str(&format!(
            r#"<tr><td class="label">{}:</td><td class="value">{}{}</td></tr>"#,
            escape_html(item.label.as_deref().unwrap_or(&item.name)),
            format_value(value),
            unit_suffix(value, item.unit.as_deref()),
        ));
    }
    html.push_str("</table>");
    html
}

/// Pass iff the value is present and exactly equal to one of `pass_values`.
pub fn is_passing(question: &ChecklistQuestion, value: Option<&Value>) -> bool {
    match value {
        Some(value) => question.pass_values.iter().any(|pass| pass == value),
        None => false,
    }
}

fn render_checklist(questions: &[ChecklistQuestion], data: &InspectionData) -> String {
    let mut html = String::from(r#"<table class="data-table">"#);
    for question in questions {
        let value = data.get(&question.name);
        let badge = if is_passing(question, value) {
            "badge badge-pass"
        } else {
            "badge badge-fail"
        };
        html.push_str(&format!(
            r#"<tr><td class="label">{}:</td><td class="value"><span class="{}">{}</span></td></tr>"#,
            escape_html(question.label.as_deref().unwrap_or(&question.name)),
            badge,
            format_value(value),
        ));
    }
    html.push_str("</table>");
    html
}

fn render_table(columns: &[Column], rows: Option<&Value>) -> String {
    let rows: &[Value] = rows.and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);

    let mut html = String::from(r#"<table class="inner-table">"#);
    if !columns.is_empty() {
        html.push_str("<tr>");
        for column in columns {
            html.push_str(&format!(
                "<th>{}</th>",
                escape_html(column.label.as_deref().unwrap_or(&column.name))
            ));
        }
        html.push_str("</tr>");
    }
    for row in rows {
        html.push_str("<tr>");
        for column in columns {
            let cell = row.get(&column.name);
            html.push_str(&format!(
                "<td>{}{}</td>",
                format_value(cell),
                unit_suffix(cell, column.unit.as_deref())
            ));
        }
        html.push_str("</tr>");
    }
    html.push_str("</table>");
    html
}

fn render_images(urls: &[String], alt: &str) -> String {
    let images: String = urls
        .iter()
        .map(|url| {
            format!(
                r#"<img src="{}" alt="{}" class="photo-item">"#,
                escape_html(url),
                escape_html(alt)
            )
        })
        .collect();
    if images.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        images
    }
}

/// Field-by-field rendering for templates predating typed sections.
fn render_legacy(template: &Template, data: &InspectionData, photos: &[String]) -> String {
    template
        .sections
        .iter()
        .filter(|section| section.is_legacy())
        .map(|section| render_section(section, data, photos))
        .collect()
}

fn render_legacy_fields(fields: &[LegacyField], data: &InspectionData, photos: &[String]) -> String {
    let mut html = String::from(r#"<table class="data-table">"#);
    for field in fields {
        let label = field
            .label
            .as_deref()
            .or(field.name.as_deref())
            .unwrap_or_default();
        let value = field.name.as_deref().and_then(|name| data.get(name));
        let rendered = match &field.kind {
            LegacyFieldKind::Table(columns) => match value.and_then(Value::as_array) {
                Some(rows) => render_legacy_table(columns, rows),
                None => format_value(value),
            },
            LegacyFieldKind::Photo => {
                let urls = match field.name.as_deref() {
                    Some(name) => legacy_photo_urls(name, value, photos),
                    None => Vec::new(),
                };
                render_images(&urls, label)
            }
            LegacyFieldKind::Plain => format_value(value),
        };
        html.push_str(&format!(
            r#"<tr><td class="label">{}:</td><td class="value">{}</td></tr>"#,
            escape_html(label),
            rendered
        ));
    }
    html.push_str("</table>");
    html
}

fn render_legacy_table(columns: &[Column], rows: &[Value]) -> String {
    let mut html = String::from(r#"<table class="inner-table">"#);
    if !columns.is_empty() && !rows.is_empty() {
        html.push_str("<tr>");
        for column in columns {
            // Older templates print an empty header for unlabeled columns.
            html.push_str(&format!(
                "<th>{}</th>",
                escape_html(column.label.as_deref().unwrap_or_default())
            ));
        }
        html.push_str("</tr>");
        for row in rows {
            html.push_str("<tr>");
            for column in columns {
                html.push_str(&format!("<td>{}</td>", format_value(row.get(&column.name))));
            }
            html.push_str("</tr>");
        }
    }
    html.push_str("</table>");
    html
}

/// Photo references for a legacy photo field.
///
/// Explicit references in the data win. Otherwise the inspection photo list is
/// matched by substring, so `valve` also claims photos of `valve_closed`.
pub fn legacy_photo_urls(field_name: &str, value: Option<&Value>, photos: &[String]) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().map(value_text).collect(),
        Some(Value::String(url)) => vec![url.clone()],
        _ => photos
            .iter()
            .filter(|url| url.contains(field_name))
            .cloned()
            .collect(),
    }
}

fn wrap_section(title: &str, inner: &str) -> String {
    format!(
        r#"<div class="section"><h3>{}</h3>{}</div>"#,
        escape_html(title),
        inner
    )
}
