//! Full printable report document.

use chrono::NaiveDate;
use serde_json::Value;

use super::html::escape_html;
use super::sections::{render_template, InspectionData};
use super::template::Template;

const DATE_FORMAT: &str = "%d.%m.%Y";

/// Everything the printed report needs, already joined from collaborators.
#[derive(Debug, Clone, Default)]
pub struct ReportDocument {
    pub company_name: String,
    pub customer_name: String,
    pub work_order_number: String,
    pub inspection_date: Option<NaiveDate>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub technician_name: String,
    pub technician_surname: String,
    pub equipment_name: String,
    pub equipment_type: String,
    pub qr_token: String,
    pub template: Value,
    pub inspection_data: Value,
    pub photo_urls: Vec<String>,
}

impl ReportDocument {
    /// Render the complete HTML document.
    ///
    /// `generated_on` is printed in the footer; pass a fixed date for
    /// byte-identical output.
    pub fn to_html(&self, generated_on: NaiveDate) -> String {
        let template = Template::from_value(&self.template);
        let empty = InspectionData::new();
        let data = self.inspection_data.as_object().unwrap_or(&empty);
        let sections = render_template(&template, data, &self.photo_urls);

        let inspection_date = self
            .inspection_date
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default();
        let technician = format!("{} {}", self.technician_name, self.technician_surname);
        let company = escape_html(&self.company_name);

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<title>Muayene Raporu</title>
<style>{styles}</style>
</head>
<body>
<div class="header">
<h1>{company}</h1>
<h2>MUAYENE RAPORU</h2>
</div>
<div class="company-info">
<table class="data-table">
<tr><td class="label">Müşteri Firma:</td><td class="value">{customer}</td></tr>
<tr><td class="label">İş Emri No:</td><td class="value">{work_order}</td></tr>
<tr><td class="label">Muayene Tarihi:</td><td class="value">{inspection_date}</td></tr>
<tr><td class="label">Muayene Saati:</td><td class="value">{start} - {end}</td></tr>
<tr><td class="label">Muayene Teknisyeni:</td><td class="value">{technician}</td></tr>
</table>
</div>
<div class="equipment-info">
<h3>EKIPMAN BİLGİLERİ</h3>
<table class="data-table">
<tr><td class="label">Ekipman Adı:</td><td class="value">{equipment_name}</td></tr>
<tr><td class="label">Ekipman Türü:</td><td class="value">{equipment_type}</td></tr>
</table>
</div>
{sections}
<div class="qr-section">
<p><strong>Rapor Doğrulama:</strong></p>
<p>QR Token: {qr_token}</p>
<p>Bu raporu doğrulamak için QR kodu okutunuz.</p>
</div>
<div class="footer">
<p>Bu rapor {company} tarafından oluşturulmuştur.</p>
<p>Rapor Oluşturma Tarihi: {generated_on}</p>
</div>
</body>
</html>
"#,
            styles = BASE_STYLES,
            company = company,
            customer = escape_html(&self.customer_name),
            work_order = escape_html(&self.work_order_number),
            inspection_date = escape_html(&inspection_date),
            start = escape_html(self.start_time.as_deref().unwrap_or_default()),
            end = escape_html(self.end_time.as_deref().unwrap_or_default()),
            technician = escape_html(technician.trim()),
            equipment_name = escape_html(&self.equipment_name),
            equipment_type = escape_html(&self.equipment_type),
            sections = sections,
            qr_token = escape_html(&self.qr_token),
            generated_on = generated_on.format(DATE_FORMAT),
        )
    }
}

const BASE_STYLES: &str = r#"
body { font-family: Arial, sans-serif; margin: 20px; color: #333; }
.header { text-align: center; margin-bottom: 30px; padding: 20px; border-bottom: 2px solid #333; }
.company-info { margin-bottom: 20px; }
.equipment-info { background: #f5f5f5; padding: 15px; margin-bottom: 20px; }
.section { margin-bottom: 25px; }
.section h3 { background: #333; color: white; padding: 10px; margin: 0; }
.data-table { width: 100%; border-collapse: collapse; margin-bottom: 15px; }
.data-table td { padding: 8px; border: 1px solid #ddd; vertical-align: top; }
.label { font-weight: bold; background: #f9f9f9; width: 30%; }
.value { width: 70%; }
.inner-table { width: 100%; border-collapse: collapse; }
.inner-table th, .inner-table td { padding: 5px; border: 1px solid #ccc; text-align: left; }
.inner-table th { background: #e9e9e9; font-weight: bold; }
.badge { display: inline-block; padding: 3px 8px; border-radius: 8px; font-size: 12px; }
.badge-pass { background: #16a34a; color: #fff; }
.badge-fail { background: #ef4444; color: #fff; }
.photo-grid { display: grid; grid-template-columns: repeat(3, 1fr); gap: 8px; }
.photo-item { max-width: 100%; height: auto; border: 1px solid #ddd; padding: 2px; }
.notes { white-space: pre-wrap; }
.qr-section { text-align: center; margin: 20px 0; }
.footer { margin-top: 40px; text-align: center; font-size: 12px; color: #666; }
"#;
