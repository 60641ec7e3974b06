//! printpdf backend for [`DocumentLayout`].

use std::io::BufWriter;

use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfLayerReference, Point, Rect,
};

use super::layout::{DocumentLayout, Element, FontWeight, Rgb, PAGE_HEIGHT, PAGE_WIDTH};
use super::PdfError;

const LOGO_DPI: f32 = 300.0;
const MM_PER_INCH: f32 = 25.4;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

impl Fonts {
    fn get(&self, weight: FontWeight) -> &IndirectFontRef {
        match weight {
            FontWeight::Regular => &self.regular,
            FontWeight::Bold => &self.bold,
        }
    }
}

fn color(rgb: Rgb) -> Color {
    Color::Rgb(printpdf::Rgb::new(rgb.0, rgb.1, rgb.2, None))
}

/// Serializes a layout to PDF bytes.
pub fn render_pdf(layout: &DocumentLayout) -> Result<Vec<u8>, PdfError> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(&layout.title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");

    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| PdfError::Render(e.to_string()))?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| PdfError::Render(e.to_string()))?,
    };

    for (index, page) in layout.pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_index, layer_index) =
                doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), format!("Layer {}", index + 1));
            doc.get_page(page_index).get_layer(layer_index)
        };

        for element in &page.elements {
            draw(&layer, &fonts, layout, element);
        }
    }

    let mut writer = BufWriter::new(Vec::<u8>::new());
    doc.save(&mut writer)
        .map_err(|e| PdfError::Render(e.to_string()))?;
    writer
        .into_inner()
        .map_err(|e| PdfError::Render(e.to_string()))
}

fn draw(layer: &PdfLayerReference, fonts: &Fonts, layout: &DocumentLayout, element: &Element) {
    match element {
        Element::Text {
            text,
            x,
            y,
            size,
            weight,
            color: rgb,
        } => {
            layer.set_fill_color(color(*rgb));
            layer.use_text(builtin_font_text(text), *size, Mm(*x), Mm(*y), fonts.get(*weight));
        }
        Element::Line {
            x1,
            y1,
            x2,
            y2,
            thickness,
            color: rgb,
        } => {
            layer.set_outline_color(color(*rgb));
            layer.set_outline_thickness(*thickness * 2.835);
            layer.add_line(Line {
                points: vec![
                    (Point::new(Mm(*x1), Mm(*y1)), false),
                    (Point::new(Mm(*x2), Mm(*y2)), false),
                ],
                is_closed: false,
            });
        }
        Element::Rect {
            x,
            y,
            width,
            height,
            fill,
            stroke,
        } => {
            let mode = match (fill, stroke) {
                (Some(_), Some(_)) => PaintMode::FillStroke,
                (Some(_), None) => PaintMode::Fill,
                (None, Some(_)) => PaintMode::Stroke,
                (None, None) => return,
            };
            if let Some(fill) = fill {
                layer.set_fill_color(color(*fill));
            }
            if let Some(stroke) = stroke {
                layer.set_outline_color(color(*stroke));
                layer.set_outline_thickness(0.8);
            }
            layer.add_rect(
                Rect::new(Mm(*x), Mm(*y), Mm(x + width), Mm(y + height)).with_mode(mode),
            );
        }
        Element::QrCode {
            x,
            y,
            size,
            width,
            modules,
            ..
        } => draw_qr(layer, *x, *y, *size, *width, modules),
        Element::Logo {
            x,
            y,
            width,
            height: _,
        } => {
            let Some(logo) = layout.logo.as_ref() else {
                return;
            };
            let natural_width = logo.image().width() as f32 / LOGO_DPI * MM_PER_INCH;
            let scale = if natural_width > 0.0 { width / natural_width } else { 1.0 };
            Image::from_dynamic_image(logo.image()).add_to_layer(
                layer.clone(),
                ImageTransform {
                    translate_x: Some(Mm(*x)),
                    translate_y: Some(Mm(*y)),
                    dpi: Some(LOGO_DPI),
                    scale_x: Some(scale),
                    scale_y: Some(scale),
                    ..Default::default()
                },
            );
        }
    }
}

/// Dark modules as filled rectangles, one per horizontal run, inside a white
/// quiet zone.
fn draw_qr(layer: &PdfLayerReference, x: f32, y: f32, size: f32, width: usize, modules: &[bool]) {
    if width == 0 {
        return;
    }
    let quiet = 2.0;
    let module = size / (width as f32 + 2.0 * quiet);

    layer.set_fill_color(color(Rgb::WHITE));
    layer.add_rect(Rect::new(Mm(x), Mm(y), Mm(x + size), Mm(y + size)).with_mode(PaintMode::Fill));

    layer.set_fill_color(color(Rgb::BLACK));
    for (row_index, row) in modules.chunks(width).enumerate() {
        let top = y + size - (quiet + row_index as f32) * module;
        let mut col = 0;
        while col < width {
            if !row[col] {
                col += 1;
                continue;
            }
            let start = col;
            while col < width && row[col] {
                col += 1;
            }
            let left = x + (quiet + start as f32) * module;
            let right = x + (quiet + col as f32) * module;
            layer.add_rect(
                Rect::new(Mm(left), Mm(top - module), Mm(right), Mm(top)).with_mode(PaintMode::Fill),
            );
        }
    }
}

/// The built-in PDF fonts cover ASCII reliably; fold the French characters
/// the layouts use.
pub fn builtin_font_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            'à' | 'â' | 'ä' => out.push('a'),
            'À' | 'Â' | 'Ä' => out.push('A'),
            'é' | 'è' | 'ê' | 'ë' => out.push('e'),
            'É' | 'È' | 'Ê' | 'Ë' => out.push('E'),
            'î' | 'ï' => out.push('i'),
            'Î' | 'Ï' => out.push('I'),
            'ô' | 'ö' => out.push('o'),
            'Ô' | 'Ö' => out.push('O'),
            'ù' | 'û' | 'ü' => out.push('u'),
            'Ù' | 'Û' | 'Ü' => out.push('U'),
            'ç' => out.push('c'),
            'Ç' => out.push('C'),
            'œ' => out.push_str("oe"),
            'Œ' => out.push_str("OE"),
            '€' => out.push_str("EUR"),
            '°' => out.push('o'),
            '\u{a0}' | '\u{202f}' => out.push(' '),
            '’' => out.push('\''),
            c if c.is_ascii() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}
