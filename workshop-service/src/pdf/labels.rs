//! Wheel identification labels: five QR labels on one page.

use std::io::Cursor;

use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, Luma};
use qrcode::QrCode;
use serde::Serialize;

use super::layout::{text_width, DocumentLayout, Element, FontWeight, Page, Rgb, MARGIN, PAGE_HEIGHT, PAGE_WIDTH};
use super::PdfError;
use crate::models::DocumentKind;

/// Label slots, in print order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelPosition {
    FrontLeft,
    FrontRight,
    RearLeft,
    RearRight,
    VehicleKey,
}

impl LabelPosition {
    pub const ALL: [LabelPosition; 5] = [
        LabelPosition::FrontLeft,
        LabelPosition::FrontRight,
        LabelPosition::RearLeft,
        LabelPosition::RearRight,
        LabelPosition::VehicleKey,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            LabelPosition::FrontLeft => "AVG",
            LabelPosition::FrontRight => "AVD",
            LabelPosition::RearLeft => "ARG",
            LabelPosition::RearRight => "ARD",
            LabelPosition::VehicleKey => "CLÉ",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LabelPosition::FrontLeft => "Avant gauche",
            LabelPosition::FrontRight => "Avant droite",
            LabelPosition::RearLeft => "Arrière gauche",
            LabelPosition::RearRight => "Arrière droite",
            LabelPosition::VehicleKey => "Clé du véhicule",
        }
    }

    /// Accepts the code with or without accent, any case.
    pub fn from_code(code: &str) -> Option<Self> {
        let normalized = code.trim().to_uppercase().replace('É', "E");
        Self::ALL
            .into_iter()
            .find(|p| p.code().replace('É', "E") == normalized)
    }

    pub fn payload(&self, document_number: &str) -> String {
        format!("{}-{}", document_number, self.code())
    }
}

/// One label of a sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub position: LabelPosition,
    pub code: &'static str,
    pub payload: String,
}

pub fn labels_for(document_number: &str) -> Vec<Label> {
    LabelPosition::ALL
        .into_iter()
        .map(|position| Label {
            position,
            code: position.code(),
            payload: position.payload(document_number),
        })
        .collect()
}

const BAND_HEIGHT: f32 = PAGE_HEIGHT / 5.0;
const BAND_INSET: f32 = 5.0;
const QR_SIZE: f32 = 42.0;

/// Lays out the label sheet. Any QR encoding failure fails the whole sheet.
pub fn layout_label_sheet(document_number: &str, kind: DocumentKind) -> Result<DocumentLayout, PdfError> {
    let mut page = Page::default();

    for (index, label) in labels_for(document_number).into_iter().enumerate() {
        let band_bottom = PAGE_HEIGHT - (index as f32 + 1.0) * BAND_HEIGHT;
        let code = QrCode::new(label.payload.as_bytes())?;
        let width = code.width();
        let modules = code
            .to_colors()
            .into_iter()
            .map(|c| c == qrcode::Color::Dark)
            .collect();

        page.rect(
            MARGIN,
            band_bottom + BAND_INSET,
            PAGE_WIDTH - 2.0 * MARGIN,
            BAND_HEIGHT - 2.0 * BAND_INSET,
            None,
            Some(Rgb::GREY),
        );
        if index > 0 {
            let top = band_bottom + BAND_HEIGHT;
            page.line(0.0, top, PAGE_WIDTH, top, 0.2, Rgb::LIGHT_GREY);
        }

        let qr_y = band_bottom + (BAND_HEIGHT - QR_SIZE) / 2.0;
        page.elements.push(Element::QrCode {
            payload: label.payload.clone(),
            x: MARGIN + 6.0,
            y: qr_y,
            size: QR_SIZE,
            width,
            modules,
        });

        let text_x = MARGIN + 6.0 + QR_SIZE + 10.0;
        let mid = band_bottom + BAND_HEIGHT / 2.0;
        page.colored_text(kind.title(), text_x, mid + 12.0, 9.0, FontWeight::Bold, Rgb::GREY);
        page.text(document_number, text_x, mid + 4.0, 14.0, FontWeight::Bold);
        page.text(label.position.label(), text_x, mid - 4.0, 12.0, FontWeight::Regular);

        let code_size = 28.0;
        let code_x = PAGE_WIDTH - MARGIN - 6.0 - text_width(label.code, code_size);
        page.colored_text(label.code, code_x, mid - 4.0, code_size, FontWeight::Bold, Rgb::ACCENT);
    }

    Ok(DocumentLayout {
        title: format!("Étiquettes {}", document_number),
        pages: vec![page],
        logo: None,
    })
}

/// Base64 PNG of one label's QR code.
pub fn label_qr_png(document_number: &str, position: LabelPosition) -> Result<String, PdfError> {
    let code = QrCode::new(position.payload(document_number).as_bytes())?;
    let image = code.render::<Luma<u8>>().min_dimensions(240, 240).build();

    let dynamic_image = DynamicImage::ImageLuma8(image);
    let mut buffer = Cursor::new(Vec::new());
    dynamic_image.write_to(&mut buffer, image::ImageOutputFormat::Png)?;

    Ok(general_purpose::STANDARD.encode(buffer.get_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payloads_in_fixed_order() {
        let payloads: Vec<_> = labels_for("DEV-2024-00007")
            .into_iter()
            .map(|l| l.payload)
            .collect();
        assert_eq!(
            payloads,
            vec![
                "DEV-2024-00007-AVG",
                "DEV-2024-00007-AVD",
                "DEV-2024-00007-ARG",
                "DEV-2024-00007-ARD",
                "DEV-2024-00007-CLÉ",
            ]
        );
    }

    #[test]
    fn test_sheet_has_five_equal_bands() {
        let layout = layout_label_sheet("DEV-2024-00007", DocumentKind::Quote).unwrap();
        assert_eq!(layout.pages.len(), 1);

        let qr: Vec<_> = layout.pages[0]
            .elements
            .iter()
            .filter_map(|e| match e {
                Element::QrCode { payload, y, size, width, modules, .. } => {
                    Some((payload.clone(), *y, *size, *width, modules.len()))
                }
                _ => None,
            })
            .collect();
        assert_eq!(qr.len(), 5);
        assert_eq!(qr[4].0, "DEV-2024-00007-CLÉ");
        for (i, (_, y, size, width, modules)) in qr.iter().enumerate() {
            assert_eq!(*modules, width * width);
            let band_bottom = PAGE_HEIGHT - (i as f32 + 1.0) * BAND_HEIGHT;
            assert!(*y >= band_bottom && y + size <= band_bottom + BAND_HEIGHT);
        }
        for pair in qr.windows(2) {
            assert!((pair[0].1 - pair[1].1 - BAND_HEIGHT).abs() < 0.001);
        }
    }

    #[test]
    fn test_position_codes() {
        assert_eq!(LabelPosition::from_code("avg"), Some(LabelPosition::FrontLeft));
        assert_eq!(LabelPosition::from_code("CLE"), Some(LabelPosition::VehicleKey));
        assert_eq!(LabelPosition::from_code("clé"), Some(LabelPosition::VehicleKey));
        assert_eq!(LabelPosition::from_code("XYZ"), None);
    }

    #[test]
    fn test_qr_png_is_png() {
        let encoded = label_qr_png("FAC-2024-00001", LabelPosition::RearRight).unwrap();
        let bytes = general_purpose::STANDARD.decode(encoded).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
