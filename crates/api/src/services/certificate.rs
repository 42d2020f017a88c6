//! PDF certificate rendering.
//!
//! Certificates are A4 landscape, text only, using the PDF built-in
//! Helvetica faces so no font files ship with the binary. Built-in fonts
//! carry no metrics we can query, so centring uses an average glyph width.

use chrono::{DateTime, Utc};
use printpdf::{BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Rgb};
use thiserror::Error;
use tracing::instrument;

const PAGE_WIDTH_MM: f32 = 297.0;
const PAGE_HEIGHT_MM: f32 = 210.0;
const SIDE_MARGIN_MM: f32 = 20.0;
const PT_TO_MM: f32 = 0.3528;
/// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_WIDTH_EM: f32 = 0.52;

/// Certificate rendering errors.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("PDF rendering failed: {0}")]
    Render(String),
}

/// What gets stamped on a certificate.
#[derive(Debug, Clone)]
pub struct CertificateData<'a> {
    pub recipient: &'a str,
    pub certification_name: &'a str,
    pub certification_code: &'a str,
    pub score: i32,
    pub completed_at: DateTime<Utc>,
}

/// Render a certificate to PDF bytes.
///
/// # Errors
///
/// Returns `CertificateError::Render` if the PDF cannot be produced.
#[instrument(skip(data), fields(certification = data.certification_code))]
pub fn render(data: &CertificateData<'_>) -> Result<Vec<u8>, CertificateError> {
    let title = format!("{} Certificate", data.certification_name);
    let (doc, page, layer) =
        PdfDocument::new(&title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Certificate");

    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| CertificateError::Render(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| CertificateError::Render(e.to_string()))?;

    let layer = doc.get_page(page).get_layer(layer);

    set_color(&layer, 0.42, 0.45, 0.50);
    centered(&layer, "CERTPREP", 12.0, 182.0, &bold);

    set_color(&layer, 0.07, 0.15, 0.30);
    centered(&layer, "Certificate of Completion", 34.0, 160.0, &bold);

    set_color(&layer, 0.20, 0.20, 0.20);
    centered(&layer, "This certifies that", 14.0, 138.0, &regular);

    set_color(&layer, 0.07, 0.15, 0.30);
    centered(&layer, data.recipient, 28.0, 120.0, &bold);

    set_color(&layer, 0.20, 0.20, 0.20);
    centered(
        &layer,
        "has passed a practice exam for",
        14.0,
        102.0,
        &regular,
    );

    set_color(&layer, 0.07, 0.15, 0.30);
    centered(&layer, data.certification_name, 22.0, 86.0, &bold);

    set_color(&layer, 0.20, 0.20, 0.20);
    centered(
        &layer,
        &format!("Score: {}%", data.score),
        14.0,
        66.0,
        &regular,
    );
    centered(
        &layer,
        &format!("Completed on {}", data.completed_at.format("%B %-d, %Y")),
        12.0,
        56.0,
        &regular,
    );

    set_color(&layer, 0.42, 0.45, 0.50);
    centered(
        &layer,
        &format!(
            "Practice certificate {} - not an official AWS credential",
            data.certification_code.to_uppercase()
        ),
        9.0,
        24.0,
        &regular,
    );

    doc.save_to_bytes()
        .map_err(|e| CertificateError::Render(e.to_string()))
}

/// Download file name for a certification's certificate.
#[must_use]
pub fn file_name(certification_code: &str) -> String {
    format!("{certification_code}-certificate.pdf")
}

fn set_color(layer: &PdfLayerReference, r: f32, g: f32, b: f32) {
    layer.set_fill_color(Color::Rgb(Rgb::new(r, g, b, None)));
}

/// Write `text` horizontally centred at `y_mm`, shrinking it to fit the margins.
fn centered(
    layer: &PdfLayerReference,
    text: &str,
    font_size: f32,
    y_mm: f32,
    font: &IndirectFontRef,
) {
    let size = fitted_font_size(text, font_size);
    let x = centered_x(text, size);
    layer.use_text(text, size, Mm(x), Mm(y_mm), font);
}

/// Estimated rendered width of `text` in millimetres.
#[allow(clippy::cast_precision_loss)] // char counts are tiny
fn estimated_width_mm(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * AVG_GLYPH_WIDTH_EM * PT_TO_MM
}

/// Largest size up to `font_size` whose estimated width fits between the margins.
fn fitted_font_size(text: &str, font_size: f32) -> f32 {
    let usable = 2.0_f32.mul_add(-SIDE_MARGIN_MM, PAGE_WIDTH_MM);
    let width = estimated_width_mm(text, font_size);
    if width <= usable || width <= 0.0 {
        font_size
    } else {
        font_size * usable / width
    }
}

/// Left edge that centres `text` on the page.
fn centered_x(text: &str, font_size: f32) -> f32 {
    ((PAGE_WIDTH_MM - estimated_width_mm(text, font_size)) / 2.0).max(SIDE_MARGIN_MM)
}
