//! English PDF rendering of a completed form. Each field is drawn at its
//! layout box: a thin frame, the label in small type along the top edge and
//! the answer below it.

use crate::domain::model::{EnglishAnswers, FieldBox, FormSchema};
use crate::utils::error::Result;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::collections::HashMap;

const LABEL_SIZE: f32 = 7.0;
const VALUE_SIZE: f32 = 10.0;
const TITLE_SIZE: f32 = 13.0;
const SECTION_SIZE: f32 = 9.0;
const PADDING: f32 = 3.0;
/// Rough Helvetica advance width as a fraction of the font size.
const AVG_CHAR_WIDTH: f32 = 0.5;

/// Encodes text for a WinAnsi Type1 font. Latin-1 maps to itself, the
/// typographic characters WinAnsi keeps in 0x80-0x9F map to their slots, and
/// anything else becomes `?`.
pub fn to_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{0192}' => 0x83,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2020}' => 0x86,
            '\u{2021}' => 0x87,
            '\u{02C6}' => 0x88,
            '\u{2030}' => 0x89,
            '\u{0160}' => 0x8A,
            '\u{2039}' => 0x8B,
            '\u{0152}' => 0x8C,
            '\u{017D}' => 0x8E,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{02DC}' => 0x98,
            '\u{2122}' => 0x99,
            '\u{0161}' => 0x9A,
            '\u{203A}' => 0x9B,
            '\u{0153}' => 0x9C,
            '\u{017E}' => 0x9E,
            '\u{0178}' => 0x9F,
            c if (c as u32) < 0x20 => b' ',
            // DEL and C1 controls would land on the glyphs above.
            '\u{7F}'..='\u{9F}' => b'?',
            c if (c as u32) <= 0xFF => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

/// Greedy word wrap to lines of at most `max_chars` characters.
pub fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let needed = if line.is_empty() {
                word.chars().count()
            } else {
                line.chars().count() + 1 + word.chars().count()
            };
            if needed > max_chars && !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
            while line.chars().count() > max_chars {
                let head: String = line.chars().take(max_chars).collect();
                let tail: String = line.chars().skip(max_chars).collect();
                lines.push(head);
                line = tail;
            }
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines
}

fn text_op(ops: &mut Vec<Operation>, font: &str, size: f32, x: f32, y: f32, text: &str) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("Tf", vec![font.into(), size.into()]));
    ops.push(Operation::new("Td", vec![x.into(), y.into()]));
    ops.push(Operation::new("Tj", vec![Object::string_literal(to_latin1(text))]));
    ops.push(Operation::new("ET", vec![]));
}

fn frame_op(ops: &mut Vec<Operation>, layout: &FieldBox) {
    ops.push(Operation::new("w", vec![0.5_f32.into()]));
    ops.push(Operation::new(
        "re",
        vec![
            layout.x.into(),
            layout.y.into(),
            layout.width.into(),
            layout.height.into(),
        ],
    ));
    ops.push(Operation::new("S", vec![]));
}

fn max_chars(width: f32, size: f32) -> usize {
    ((width - 2.0 * PADDING) / (size * AVG_CHAR_WIDTH)).floor().max(1.0) as usize
}

fn page_operations(
    schema: &FormSchema,
    answers: &HashMap<&str, &str>,
    footer: &str,
    page_index: usize,
) -> Vec<Operation> {
    let page = schema.pages[page_index];
    let mut ops = Vec::new();

    text_op(
        &mut ops,
        "F2",
        TITLE_SIZE,
        48.0,
        page.height - 48.0,
        &format!("{} - {}", schema.code, schema.title),
    );
    text_op(
        &mut ops,
        "F1",
        LABEL_SIZE,
        page.width - 100.0,
        page.height - 48.0,
        &format!("Page {} of {}", page_index + 1, schema.pages.len()),
    );

    for section in &schema.sections {
        let on_page: Vec<_> = section
            .fields
            .iter()
            .filter(|f| f.layout.page == page_index)
            .collect();
        let Some(top) = on_page
            .iter()
            .map(|f| f.layout.y + f.layout.height)
            .reduce(f32::max)
        else {
            continue;
        };
        let left = on_page.iter().map(|f| f.layout.x).fold(f32::MAX, f32::min);
        text_op(&mut ops, "F2", SECTION_SIZE, left, top + 6.0, &section.title);

        for field in on_page {
            let layout = &field.layout;
            frame_op(&mut ops, layout);

            let label_chars = max_chars(layout.width, LABEL_SIZE);
            let label = wrap(&field.label, label_chars)
                .into_iter()
                .next()
                .unwrap_or_default();
            text_op(
                &mut ops,
                "F1",
                LABEL_SIZE,
                layout.x + PADDING,
                layout.y + layout.height - PADDING - LABEL_SIZE,
                &label,
            );

            let Some(value) = answers.get(field.id.as_str()) else {
                continue;
            };
            let line_height = VALUE_SIZE + 2.0;
            let available = layout.height - 2.0 * PADDING - LABEL_SIZE - 2.0;
            let max_lines = ((available / line_height).floor() as usize).max(1);
            let lines = wrap(value, max_chars(layout.width, VALUE_SIZE));
            let truncated = lines.len() > max_lines;
            for (i, line) in lines.iter().take(max_lines).enumerate() {
                let text = if truncated && i + 1 == max_lines {
                    format!("{}...", line)
                } else {
                    line.clone()
                };
                let y = layout.y + layout.height - PADDING - LABEL_SIZE - 2.0
                    - line_height * (i as f32 + 1.0);
                text_op(&mut ops, "F1", VALUE_SIZE, layout.x + PADDING, y, &text);
            }
        }
    }

    text_op(&mut ops, "F1", LABEL_SIZE, 48.0, 28.0, footer);
    ops
}

/// Renders the completed form. Returns the PDF file bytes.
pub fn render_pdf(schema: &FormSchema, answers: &EnglishAnswers) -> Result<Vec<u8>> {
    let values: HashMap<&str, &str> = answers
        .answers
        .iter()
        .map(|a| (a.field_id.as_str(), a.value.as_str()))
        .collect();
    let footer = format!(
        "Generated {} from an application completed in '{}'. All answers are in English.",
        answers.generated_at.format("%Y-%m-%d %H:%M UTC"),
        answers.source_language
    );

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular,
            "F2" => bold,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(schema.pages.len());
    for (index, size) in schema.pages.iter().enumerate() {
        let content = Content {
            operations: page_operations(schema, &values, &footer, index),
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), size.width.into(), size.height.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::pr_card_form;
    use crate::domain::model::Answer;
    use chrono::Utc;
    use uuid::Uuid;

    fn answers(values: &[(&str, &str)]) -> EnglishAnswers {
        EnglishAnswers {
            session_id: Uuid::new_v4(),
            form_id: "pr-card".to_string(),
            form_code: "IMM 5444".to_string(),
            source_language: "es".to_string(),
            answers: values
                .iter()
                .map(|(id, value)| Answer {
                    field_id: id.to_string(),
                    label: id.to_string(),
                    value: value.to_string(),
                    original: None,
                })
                .collect(),
            generated_at: Utc::now(),
        }
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_to_latin1() {
        assert_eq!(to_latin1("Müller"), vec![b'M', 0xFC, b'l', b'l', b'e', b'r']);
        assert_eq!(to_latin1("Çelik – İstanbul"), b"\xC7elik \x96 ?stanbul".to_vec());
        assert_eq!(to_latin1("王"), b"?".to_vec());
    }

    #[test]
    fn test_to_latin1_winansi_extras() {
        assert_eq!(to_latin1("Fee: 50 €"), b"Fee: 50 \x80".to_vec());
        assert_eq!(to_latin1("etc…"), b"etc\x85".to_vec());
        assert_eq!(to_latin1("“Œuvre” ‘Škoda’"), b"\x93\x8Cuvre\x94 \x91\x8Akoda\x92".to_vec());
        assert_eq!(to_latin1("a\u{85}b\u{80}c\u{9F}"), b"a?b?c?".to_vec());
        assert_eq!(to_latin1("\u{7F}\u{A0}"), b"?\xA0".to_vec());
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("one two three", 7), vec!["one two", "three"]);
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap("a\nb", 10), vec!["a", "b"]);
        assert!(wrap("   ", 5).is_empty());
    }

    #[test]
    fn test_render_has_one_page_per_schema_page() {
        let schema = pr_card_form();
        let bytes = render_pdf(&schema, &answers(&[("family_name", "Tremblay")])).unwrap();

        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), schema.pages.len());
        assert!(contains(&bytes, b"(Tremblay) Tj"));
        assert!(contains(&bytes, b"(Family name) Tj"));
    }

    #[test]
    fn test_long_values_are_truncated_to_box() {
        let schema = pr_card_form();
        let long = "word ".repeat(400);
        let bytes = render_pdf(&schema, &answers(&[("absences", long.trim())])).unwrap();
        assert!(contains(&bytes, b"...) Tj"));
    }
}
