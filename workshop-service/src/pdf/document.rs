//! Quote and invoice page layout.

use chrono::NaiveDate;

use super::company::CompanyInfo;
use super::layout::{
    format_date, format_money, format_number, truncate, DocumentLayout, FontWeight, Page, Rgb,
    MARGIN, PAGE_HEIGHT, PAGE_WIDTH,
};
use super::logo::LogoImage;
use crate::models::{Client, DocumentKind};
use crate::pricing::DocumentLines;

/// Character budget of one line in an info box.
pub const INFO_LINE_CHARS: usize = 42;
/// Character budget of an item description cell.
pub const DESCRIPTION_CHARS: usize = 58;

const CONTENT_RIGHT: f32 = PAGE_WIDTH - MARGIN;
const HEADER_TOP: f32 = PAGE_HEIGHT - MARGIN;
const INFO_BOX_TOP: f32 = 248.0;
const INFO_BOX_HEIGHT: f32 = 42.0;
const INFO_BOX_WIDTH: f32 = 87.0;
const INFO_LINE_HEIGHT: f32 = 4.4;
const TABLE_HEADER_HEIGHT: f32 = 8.0;
const ROW_HEIGHT: f32 = 7.0;
const TOTALS_HEIGHT: f32 = 30.0;
const FOOTER_TOP: f32 = 32.0;
/// Lowest y a table row or the totals block may reach.
const BODY_BOTTOM: f32 = FOOTER_TOP + 6.0;

const COL_QTY_RIGHT: f32 = 128.0;
const COL_UNIT_RIGHT: f32 = 160.0;
const COL_TOTAL_RIGHT: f32 = CONTENT_RIGHT - 2.0;
const NOTE_LINES: usize = 3;
const NOTE_LINE_CHARS: usize = 70;
const FOOTER_LINE_CHARS: usize = 110;

/// Everything the layout needs about one quote or invoice.
#[derive(Debug, Clone)]
pub struct DocumentContent<'a> {
    pub kind: DocumentKind,
    pub number: &'a str,
    pub issue_date: NaiveDate,
    /// Validity end for quotes, due date for invoices.
    pub deadline: Option<NaiveDate>,
    pub client: &'a Client,
    pub lines: &'a DocumentLines,
    pub notes: Option<&'a str>,
    /// Reference of the originating quote, printed on invoices.
    pub quote_reference: Option<&'a str>,
}

/// One table row, whatever the document shape.
struct Row {
    description: String,
    quantity: String,
    unit_price: String,
    total: String,
}

fn rows(lines: &DocumentLines) -> Vec<Row> {
    match lines {
        DocumentLines::SingleLine(line) => {
            let totals = line.totals();
            vec![Row {
                description: line.description.clone(),
                quantity: format_number(line.quantity),
                unit_price: format_money(line.unit_price_excluding_tax),
                total: format_money(totals.total_excluding_tax),
            }]
        }
        DocumentLines::Itemized(items) => items
            .iter()
            .map(|item| Row {
                description: item.description.clone(),
                quantity: format_number(item.quantity),
                unit_price: format_money(item.unit_price_excluding_tax),
                total: format_money(item.total_excluding_tax),
            })
            .collect(),
    }
}

/// Recipient lines: display name first, then whichever details are set.
pub fn recipient_lines(client: &Client) -> Vec<String> {
    let mut lines = vec![client.display_name()];
    let non_blank = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    if let Some(siret) = non_blank(&client.siret) {
        lines.push(format!("SIRET : {}", siret));
    }
    if let Some(tva) = non_blank(&client.tva_number) {
        lines.push(format!("TVA : {}", tva));
    }
    if !client.email.trim().is_empty() {
        lines.push(client.email.trim().to_string());
    }
    if let Some(phone) = non_blank(&client.phone) {
        lines.push(format!("Tél : {}", phone));
    }
    if let Some(address) = non_blank(&client.address) {
        lines.push(address);
    }
    let city_line = [non_blank(&client.postal_code), non_blank(&client.city)]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if !city_line.is_empty() {
        lines.push(city_line);
    }

    lines
        .into_iter()
        .map(|line| truncate(&line, INFO_LINE_CHARS))
        .collect()
}

fn issuer_lines(company: &CompanyInfo) -> Vec<String> {
    [
        company.name.clone(),
        company.address.clone(),
        company.city_line(),
        format!("Tél : {}", company.phone),
        company.email.clone(),
        format!("SIRET : {}", company.siret),
    ]
    .iter()
    .map(|line| truncate(line, INFO_LINE_CHARS))
    .collect()
}

fn deadline_line(kind: DocumentKind, deadline: Option<NaiveDate>) -> String {
    match (kind, deadline) {
        (DocumentKind::Quote, Some(date)) => format!("Devis valable jusqu'au {}", format_date(date)),
        (DocumentKind::Quote, None) => "Devis valable 30 jours".to_string(),
        (DocumentKind::Invoice, Some(date)) => format!("Date d'échéance : {}", format_date(date)),
        (DocumentKind::Invoice, None) => "Paiement à réception".to_string(),
    }
}

fn header(page: &mut Page, content: &DocumentContent<'_>, company: &CompanyInfo, logo: Option<&LogoImage>) {
    match logo {
        Some(logo) => {
            let (width, height) = logo.fit(60.0, 24.0);
            page.elements.push(super::layout::Element::Logo {
                x: MARGIN,
                y: HEADER_TOP - height,
                width,
                height,
            });
        }
        None => {
            page.colored_text(
                truncate(&company.name, 28),
                MARGIN,
                HEADER_TOP - 9.0,
                18.0,
                FontWeight::Bold,
                Rgb::ACCENT,
            );
        }
    }

    let box_x = 122.0;
    let box_y = HEADER_TOP - 28.0;
    page.rect(box_x, box_y, CONTENT_RIGHT - box_x, 28.0, None, Some(Rgb::ACCENT));
    page.colored_text(
        content.kind.title(),
        box_x + 4.0,
        box_y + 19.0,
        18.0,
        FontWeight::Bold,
        Rgb::ACCENT,
    );
    page.text(
        format!("N° {}", content.number),
        box_x + 4.0,
        box_y + 11.0,
        10.0,
        FontWeight::Bold,
    );
    page.text(
        format!("Date : {}", format_date(content.issue_date)),
        box_x + 4.0,
        box_y + 5.0,
        9.0,
        FontWeight::Regular,
    );
}

fn info_box(page: &mut Page, x: f32, label: &str, lines: &[String]) {
    let bottom = INFO_BOX_TOP - INFO_BOX_HEIGHT;
    page.rect(x, bottom, INFO_BOX_WIDTH, INFO_BOX_HEIGHT, None, Some(Rgb::GREY));
    page.colored_text(label, x + 3.0, INFO_BOX_TOP - 5.5, 8.0, FontWeight::Bold, Rgb::GREY);

    let max_lines = ((INFO_BOX_HEIGHT - 9.0) / INFO_LINE_HEIGHT) as usize;
    let mut y = INFO_BOX_TOP - 11.0;
    for (i, line) in lines.iter().take(max_lines).enumerate() {
        let weight = if i == 0 { FontWeight::Bold } else { FontWeight::Regular };
        page.text(line.clone(), x + 3.0, y, 9.0, weight);
        y -= INFO_LINE_HEIGHT;
    }
}

/// Draws the column header; returns the y of the first row baseline area.
fn table_header(page: &mut Page, top: f32) -> f32 {
    let bottom = top - TABLE_HEADER_HEIGHT;
    page.rect(MARGIN, bottom, CONTENT_RIGHT - MARGIN, TABLE_HEADER_HEIGHT, Some(Rgb::ACCENT), None);
    let text_y = bottom + 2.8;
    page.colored_text("Désignation", MARGIN + 2.0, text_y, 9.0, FontWeight::Bold, Rgb::WHITE);
    for (label, right) in [
        ("Qté", COL_QTY_RIGHT),
        ("PU HT", COL_UNIT_RIGHT),
        ("Total HT", COL_TOTAL_RIGHT),
    ] {
        let x = right - super::layout::text_width(label, 9.0);
        page.colored_text(label, x, text_y, 9.0, FontWeight::Bold, Rgb::WHITE);
    }
    bottom
}

fn table_row(page: &mut Page, top: f32, row: &Row) -> f32 {
    let bottom = top - ROW_HEIGHT;
    let text_y = bottom + 2.3;
    page.text(truncate(&row.description, DESCRIPTION_CHARS), MARGIN + 2.0, text_y, 9.0, FontWeight::Regular);
    page.right_text(row.quantity.clone(), COL_QTY_RIGHT, text_y, 9.0, FontWeight::Regular);
    page.right_text(row.unit_price.clone(), COL_UNIT_RIGHT, text_y, 9.0, FontWeight::Regular);
    page.right_text(row.total.clone(), COL_TOTAL_RIGHT, text_y, 9.0, FontWeight::Regular);
    page.line(MARGIN, bottom, CONTENT_RIGHT, bottom, 0.2, Rgb::LIGHT_GREY);
    bottom
}

fn totals_block(page: &mut Page, top: f32, lines: &DocumentLines) {
    let totals = lines.totals();
    let vat_label = match lines.uniform_tax_rate() {
        Some(rate) => format!("TVA ({} %)", format_number(rate)),
        None => "TVA".to_string(),
    };
    let label_x = 125.0;

    let mut y = top - 6.0;
    page.text("Total HT", label_x, y, 10.0, FontWeight::Regular);
    page.right_text(format_money(totals.total_ht), COL_TOTAL_RIGHT, y, 10.0, FontWeight::Regular);
    y -= 6.0;
    page.text(vat_label, label_x, y, 10.0, FontWeight::Regular);
    page.right_text(format_money(totals.total_vat), COL_TOTAL_RIGHT, y, 10.0, FontWeight::Regular);

    let box_bottom = y - 12.0;
    page.rect(label_x - 3.0, box_bottom, CONTENT_RIGHT - label_x + 3.0, 9.0, Some(Rgb::ACCENT), None);
    page.colored_text("Total TTC", label_x, box_bottom + 3.0, 11.0, FontWeight::Bold, Rgb::WHITE);
    let ttc = format_money(totals.total_ttc);
    let x = COL_TOTAL_RIGHT - super::layout::text_width(&ttc, 11.0);
    page.colored_text(ttc, x, box_bottom + 3.0, 11.0, FontWeight::Bold, Rgb::WHITE);
}

fn footer(page: &mut Page, company: &CompanyInfo, page_number: usize, page_count: usize) {
    page.line(MARGIN, FOOTER_TOP, CONTENT_RIGHT, FOOTER_TOP, 0.3, Rgb::GREY);
    let lines = [
        format!(
            "{} - {}, {} - Tél : {} - {}",
            company.name,
            company.address,
            company.city_line(),
            company.phone,
            company.website
        ),
        format!("SIRET : {} - N° TVA : {}", company.siret, company.tva_number),
        format!(
            "{} - IBAN : {} - BIC/SWIFT : {}",
            company.bank_name, company.iban, company.bic
        ),
    ];
    let mut y = FOOTER_TOP - 5.0;
    for line in lines {
        page.colored_text(truncate(&line, FOOTER_LINE_CHARS), MARGIN, y, 7.5, FontWeight::Regular, Rgb::GREY);
        y -= 4.0;
    }
    page.right_text(
        format!("Page {} / {}", page_number, page_count),
        CONTENT_RIGHT,
        MARGIN - 5.0,
        7.5,
        FontWeight::Regular,
    );
}

/// Lays out a quote or invoice. Rows that do not fit move to a new page with
/// the column header repeated; the totals block follows the last row and the
/// footer is printed on every page.
pub fn layout_document(
    content: &DocumentContent<'_>,
    company: &CompanyInfo,
    logo: Option<LogoImage>,
) -> DocumentLayout {
    let mut pages = Vec::new();
    let mut page = Page::default();

    header(&mut page, content, company, logo.as_ref());
    info_box(&mut page, MARGIN, "ÉMETTEUR", &issuer_lines(company));
    info_box(
        &mut page,
        CONTENT_RIGHT - INFO_BOX_WIDTH,
        "DESTINATAIRE",
        &recipient_lines(content.client),
    );

    let mut y = INFO_BOX_TOP - INFO_BOX_HEIGHT - 8.0;
    page.text(deadline_line(content.kind, content.deadline), MARGIN, y, 9.5, FontWeight::Regular);
    if let Some(reference) = content.quote_reference {
        page.right_text(
            format!("Réf. devis : {}", reference),
            CONTENT_RIGHT,
            y,
            9.5,
            FontWeight::Regular,
        );
    }
    y -= 6.0;

    y = table_header(&mut page, y);
    for row in rows(content.lines) {
        if y - ROW_HEIGHT < BODY_BOTTOM {
            pages.push(std::mem::take(&mut page));
            y = table_header(&mut page, HEADER_TOP);
        }
        y = table_row(&mut page, y, &row);
    }

    let notes = content.notes.map(note_lines).unwrap_or_default();
    let notes_height = if notes.is_empty() { 0.0 } else { 6.0 + notes.len() as f32 * 4.5 };

    if y - TOTALS_HEIGHT - notes_height < BODY_BOTTOM {
        pages.push(std::mem::take(&mut page));
        y = HEADER_TOP;
    }
    totals_block(&mut page, y, content.lines);
    y -= TOTALS_HEIGHT;

    if !notes.is_empty() {
        page.text("Notes :", MARGIN, y, 9.0, FontWeight::Bold);
        for line in notes {
            y -= 4.5;
            page.text(line, MARGIN, y, 9.0, FontWeight::Regular);
        }
    }
    pages.push(page);

    let page_count = pages.len();
    for (i, page) in pages.iter_mut().enumerate() {
        footer(page, company, i + 1, page_count);
    }

    DocumentLayout {
        title: format!("{} {}", content.kind.title(), content.number),
        pages,
        logo,
    }
}

/// At most `NOTE_LINES` lines of notes. When lines are dropped, the last
/// kept line ends with "...".
fn note_lines(notes: &str) -> Vec<String> {
    let all: Vec<&str> = notes.trim().lines().collect();
    let mut kept: Vec<String> = all
        .iter()
        .take(NOTE_LINES)
        .map(|l| truncate(l, NOTE_LINE_CHARS))
        .collect();
    if all.len() > NOTE_LINES {
        if let Some(last) = kept.last_mut() {
            if !last.ends_with("...") {
                let room = NOTE_LINE_CHARS.saturating_sub(3);
                let cut: String = last.chars().take(room).collect();
                *last = format!("{}...", cut.trim_end());
            }
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentItem;
    use crate::pdf::company::merge_with_defaults;
    use crate::pdf::layout::Element;
    use crate::pricing::SingleLine;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn client() -> Client {
        Client {
            id: Uuid::new_v4(),
            email: "contact@garage-central.fr".to_string(),
            company_name: Some("Garage Central".to_string()),
            siret: Some("123 456 789 00012".to_string()),
            address: Some("4 avenue des Frères Lumière, zone artisanale du Moulin à Vent".to_string()),
            postal_code: Some("69008".to_string()),
            city: Some("Lyon".to_string()),
            role: "professional".to_string(),
            ..Default::default()
        }
    }

    fn items(count: usize) -> DocumentLines {
        let document_id = Uuid::new_v4();
        DocumentLines::Itemized(
            (0..count)
                .map(|i| {
                    DocumentItem::new(
                        document_id,
                        format!("Prestation {}", i + 1),
                        Decimal::from(2),
                        Decimal::from(50),
                        Decimal::from(20),
                        i as i32,
                        Utc::now(),
                    )
                })
                .collect(),
        )
    }

    fn content<'a>(client: &'a Client, lines: &'a DocumentLines) -> DocumentContent<'a> {
        DocumentContent {
            kind: DocumentKind::Quote,
            number: "DEV-2024-00007",
            issue_date: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
            deadline: NaiveDate::from_ymd_opt(2024, 4, 13),
            client,
            lines,
            notes: None,
            quote_reference: None,
        }
    }

    #[test]
    fn test_single_page_quote() {
        let client = client();
        let lines = items(2);
        let layout = layout_document(&content(&client, &lines), &merge_with_defaults(None), None);

        assert_eq!(layout.pages.len(), 1);
        assert!(layout.contains_text("DEVIS"));
        assert!(layout.contains_text("N° DEV-2024-00007"));
        assert!(layout.contains_text("Date : 14/03/2024"));
        assert!(layout.contains_text("Devis valable jusqu'au 13/04/2024"));
        assert!(layout.contains_text("Garage Central"));
        assert!(layout.contains_text("TVA (20 %)"));
        assert!(layout.contains_text("240,00 €"));
        assert!(layout.contains_text("Page 1 / 1"));
        assert!(layout.contains_text("IBAN : "));
    }

    #[test]
    fn test_company_name_when_no_logo() {
        let client = client();
        let lines = items(1);
        let layout = layout_document(&content(&client, &lines), &merge_with_defaults(None), None);
        assert!(!layout.pages[0]
            .elements
            .iter()
            .any(|e| matches!(e, Element::Logo { .. })));
        assert!(layout.contains_text(crate::pdf::company::DEFAULT_COMPANY_NAME));
    }

    #[test]
    fn test_single_line_fallback_row() {
        let client = client();
        let lines = DocumentLines::SingleLine(SingleLine {
            description: "Rénovation complète - 4 jantes".to_string(),
            quantity: Decimal::ONE,
            unit_price_excluding_tax: Decimal::from(320),
            tax_rate: Decimal::from(20),
        });
        let layout = layout_document(&content(&client, &lines), &merge_with_defaults(None), None);
        assert!(layout.contains_text("Rénovation complète - 4 jantes"));
        assert!(layout.contains_text("320,00 €"));
        assert!(layout.contains_text("384,00 €"));
    }

    #[test]
    fn test_long_tables_paginate_with_repeated_header() {
        let client = client();
        let lines = items(60);
        let layout = layout_document(&content(&client, &lines), &merge_with_defaults(None), None);

        assert!(layout.pages.len() >= 3);
        let count = layout.pages.len();
        for (i, page) in layout.pages.iter().enumerate() {
            assert!(page.texts().any(|t| t == format!("Page {} / {}", i + 1, count)));
        }
        for page in &layout.pages[..count - 1] {
            assert!(page.texts().any(|t| t == "Désignation"));
        }
        let rows: usize = layout
            .pages
            .iter()
            .map(|p| p.texts().filter(|t| t.starts_with("Prestation ")).count())
            .sum();
        assert_eq!(rows, 60);
        assert!(layout.pages[count - 1].texts().any(|t| t == "Total TTC"));
    }

    #[test]
    fn test_nothing_drawn_below_body_in_table() {
        let client = client();
        let lines = items(45);
        let layout = layout_document(&content(&client, &lines), &merge_with_defaults(None), None);
        for page in &layout.pages {
            for element in &page.elements {
                if let Element::Text { text, y, .. } = element {
                    if text.starts_with("Prestation ") {
                        assert!(*y >= BODY_BOTTOM);
                    }
                }
            }
        }
    }

    #[test]
    fn test_recipient_lines_truncated() {
        let lines = recipient_lines(&client());
        assert_eq!(lines[0], "Garage Central");
        assert!(lines.iter().all(|l| l.chars().count() <= INFO_LINE_CHARS));
        assert!(lines.iter().any(|l| l.starts_with("4 avenue des Frères") && l.ends_with("...")));
        assert!(lines.contains(&"69008 Lyon".to_string()));
    }

    #[test]
    fn test_dropped_note_lines_are_marked() {
        assert!(note_lines("   ").is_empty());
        assert_eq!(note_lines("Jantes 18\nPeinture noire"), vec!["Jantes 18", "Peinture noire"]);

        let cut = note_lines("un\ndeux\ntrois\nquatre");
        assert_eq!(cut, vec!["un", "deux", "trois..."]);

        let long = "x".repeat(NOTE_LINE_CHARS + 10);
        let cut = note_lines(&format!("{}\n{}", long, long));
        assert!(cut.iter().all(|l| l.ends_with("...") && l.chars().count() <= NOTE_LINE_CHARS));
    }

    #[test]
    fn test_notes_and_footer_mark_cut_text() {
        let client = client();
        let lines = items(1);
        let mut company = merge_with_defaults(None);
        company.name = "Atelier de rénovation de jantes ".repeat(5);
        let document = DocumentContent {
            notes: Some("Prévoir valves neuves\nCache-moyeux fournis\nRetrait vendredi\nPayé d'avance"),
            ..content(&client, &lines)
        };

        let layout = layout_document(&document, &company, None);
        assert!(layout.contains_text("Retrait vendredi..."));
        assert!(!layout.contains_text("Payé d'avance"));
        assert!(layout.pages[0]
            .texts()
            .any(|t| t.starts_with("Atelier de rénovation") && t.ends_with("...")));
    }

    #[test]
    fn test_mixed_rates_label() {
        let client = client();
        let document_id = Uuid::new_v4();
        let lines = DocumentLines::Itemized(vec![
            DocumentItem::new(document_id, "A".into(), Decimal::ONE, Decimal::from(10), Decimal::from(20), 0, Utc::now()),
            DocumentItem::new(document_id, "B".into(), Decimal::ONE, Decimal::from(10), Decimal::from(10), 1, Utc::now()),
        ]);
        let layout = layout_document(&content(&client, &lines), &merge_with_defaults(None), None);
        assert!(layout.pages[0].texts().any(|t| t == "TVA"));
    }

    #[test]
    fn test_invoice_deadline_and_quote_reference() {
        let client = client();
        let lines = items(1);
        let mut invoice = content(&client, &lines);
        invoice.kind = DocumentKind::Invoice;
        invoice.number = "FAC-2024-00002";
        invoice.deadline = None;
        invoice.quote_reference = Some("DEV-2024-00007");
        let layout = layout_document(&invoice, &merge_with_defaults(None), None);
        assert!(layout.contains_text("FACTURE"));
        assert!(layout.contains_text("Paiement à réception"));
        assert!(layout.contains_text("Réf. devis : DEV-2024-00007"));
    }
}
