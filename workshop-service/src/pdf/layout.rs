//! Backend-independent page model.
//!
//! Coordinates are millimetres on an A4 portrait page with the origin at the
//! bottom-left corner, which is what the PDF backend expects.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::logo::LogoImage;

pub const PAGE_WIDTH: f32 = 210.0;
pub const PAGE_HEIGHT: f32 = 297.0;
pub const MARGIN: f32 = 15.0;

const PT_TO_MM: f32 = 0.3528;
/// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_WIDTH: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Regular,
    Bold,
}

/// RGB colour, components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f32, pub f32, pub f32);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0.0, 0.0, 0.0);
    pub const WHITE: Rgb = Rgb(1.0, 1.0, 1.0);
    pub const GREY: Rgb = Rgb(0.45, 0.45, 0.45);
    pub const LIGHT_GREY: Rgb = Rgb(0.92, 0.92, 0.92);
    pub const ACCENT: Rgb = Rgb(0.11, 0.23, 0.42);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text {
        text: String,
        x: f32,
        y: f32,
        size: f32,
        weight: FontWeight,
        color: Rgb,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        thickness: f32,
        color: Rgb,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Option<Rgb>,
        stroke: Option<Rgb>,
    },
    /// Square QR symbol; `modules` is row-major, `true` for dark.
    QrCode {
        payload: String,
        x: f32,
        y: f32,
        size: f32,
        width: usize,
        modules: Vec<bool>,
    },
    /// The document logo, scaled into the given box.
    Logo {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub elements: Vec<Element>,
}

impl Page {
    pub fn text(&mut self, text: impl Into<String>, x: f32, y: f32, size: f32, weight: FontWeight) {
        self.colored_text(text, x, y, size, weight, Rgb::BLACK);
    }

    pub fn colored_text(
        &mut self,
        text: impl Into<String>,
        x: f32,
        y: f32,
        size: f32,
        weight: FontWeight,
        color: Rgb,
    ) {
        self.elements.push(Element::Text {
            text: text.into(),
            x,
            y,
            size,
            weight,
            color,
        });
    }

    /// Text whose right edge sits at `right`.
    pub fn right_text(&mut self, text: impl Into<String>, right: f32, y: f32, size: f32, weight: FontWeight) {
        let text = text.into();
        let x = right - text_width(&text, size);
        self.text(text, x, y, size, weight);
    }

    pub fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, thickness: f32, color: Rgb) {
        self.elements.push(Element::Line {
            x1,
            y1,
            x2,
            y2,
            thickness,
            color,
        });
    }

    pub fn rect(&mut self, x: f32, y: f32, width: f32, height: f32, fill: Option<Rgb>, stroke: Option<Rgb>) {
        self.elements.push(Element::Rect {
            x,
            y,
            width,
            height,
            fill,
            stroke,
        });
    }

    /// All text on the page, in insertion order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().filter_map(|e| match e {
            Element::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// A laid-out document ready for a rendering backend.
#[derive(Debug, Clone)]
pub struct DocumentLayout {
    pub title: String,
    pub pages: Vec<Page>,
    pub logo: Option<LogoImage>,
}

impl DocumentLayout {
    pub fn contains_text(&self, needle: &str) -> bool {
        self.pages
            .iter()
            .any(|page| page.texts().any(|text| text.contains(needle)))
    }
}

/// Estimated rendered width of `text` in millimetres.
pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * AVG_GLYPH_WIDTH * PT_TO_MM
}

/// Cuts `text` to at most `max_chars` characters, marking the cut with "...".
pub fn truncate(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

/// French money format: `1 234,56 €`.
pub fn format_money(amount: Decimal) -> String {
    let rounded = crate::pricing::round2(amount);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let digits = rounded.abs().to_string();
    let (int_part, dec_part) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    format!("{}{},{} €", if negative { "-" } else { "" }, grouped, dec_part)
}

/// Quantities and rates without trailing zeros, French decimal comma.
pub fn format_number(value: Decimal) -> String {
    value.normalize().to_string().replace('.', ",")
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(Decimal::from_str("1234.5").unwrap()), "1 234,50 €");
        assert_eq!(format_money(Decimal::from_str("0").unwrap()), "0,00 €");
        assert_eq!(format_money(Decimal::from_str("999").unwrap()), "999,00 €");
        assert_eq!(format_money(Decimal::from_str("1000000").unwrap()), "1 000 000,00 €");
        assert_eq!(format_money(Decimal::from_str("-12.345").unwrap()), "-12,35 €");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(Decimal::from_str("2.000").unwrap()), "2");
        assert_eq!(format_number(Decimal::from_str("5.50").unwrap()), "5,5");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("court", 10), "court");
        assert_eq!(truncate("une adresse beaucoup trop longue", 12), "une adres...");
        assert!(truncate("une adresse beaucoup trop longue", 12).chars().count() <= 12);
    }

    #[test]
    fn test_right_text_ends_at_edge() {
        let mut page = Page::default();
        page.right_text("120,00 €", 195.0, 100.0, 10.0, FontWeight::Regular);
        match &page.elements[0] {
            Element::Text { text, x, size, .. } => {
                assert!((x + text_width(text, *size) - 195.0).abs() < 0.001);
            }
            other => panic!("unexpected element {:?}", other),
        }
    }
}
