//! Template-driven report rendering.
//!
//! Turns a stored template schema plus an inspection's data map into the HTML
//! that the PDF engine prints. Pure computation, no I/O:
//! - `template` - schema classification into a closed set of section kinds
//! - `sections` - per-section renderers, including the legacy field path
//! - `document` - the full page with header, equipment block and footer

pub mod document;
pub mod html;
pub mod sections;
pub mod template;

pub use document::ReportDocument;
pub use html::{escape_html, PLACEHOLDER};
pub use sections::{render_template, InspectionData};
pub use template::{Section, Template};
