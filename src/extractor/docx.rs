use fancy_regex::Regex;
use std::io::{Cursor, Read};

use super::{Clause, non_blank};
use crate::{LexiqError, Result};

const DOCUMENT_PART: &str = "word/document.xml";
const TAG_PATTERN: &str = r"<(/?)([^\s/>!?]+)[^>]*?(/?)>";
const BODY: &str = "w:body";
const PARAGRAPH: &str = "w:p";
const TEXT: &str = "w:t";
const TEXT_BOX: &str = "w:txbxContent";

/// One clause per non-blank paragraph, indexed over all paragraphs of the body
pub(super) fn extract_docx(file_name: &str, bytes: &[u8]) -> Result<Vec<Clause>> {
    let xml = read_document_xml(bytes)?;
    let paragraphs = paragraphs(&xml)?;

    Ok(paragraphs
        .iter()
        .enumerate()
        .filter_map(|(index, paragraph)| {
            non_blank(paragraph).map(|text| Clause {
                text,
                clause_id: format!("{}_para{}", file_name, index),
                page: None,
                file: file_name.to_string(),
            })
        })
        .collect())
}

fn read_document_xml(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| LexiqError::Extraction(format!("Invalid DOCX archive: {}", e)))?;

    let mut part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| LexiqError::Extraction(format!("Missing {}: {}", DOCUMENT_PART, e)))?;

    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| LexiqError::Extraction(format!("Failed to read {}: {}", DOCUMENT_PART, e)))?;

    Ok(xml)
}

/// Plain text of every `<w:p>` that is a direct child of `<w:body>`, empty ones included.
///
/// Table cells and text boxes are skipped, and their paragraphs take no index.
fn paragraphs(xml: &str) -> Result<Vec<String>> {
    let tag_regex = Regex::new(TAG_PATTERN).map_err(regex_error)?;

    let mut paragraphs = Vec::new();
    let mut stack: Vec<&str> = Vec::new();
    // Stack depth of the open body-level paragraph and its text so far
    let mut current: Option<(usize, String)> = None;
    let mut text_start = 0;

    for captures in tag_regex.captures_iter(xml) {
        let captures = captures.map_err(regex_error)?;
        let (Some(tag), Some(name)) = (captures.get(0), captures.get(2)) else {
            continue;
        };
        let closing = captures.get(1).is_some_and(|m| !m.as_str().is_empty());
        let empty = captures.get(3).is_some_and(|m| !m.as_str().is_empty());
        let name = name.as_str();

        let in_text_box = stack.contains(&TEXT_BOX);
        if let Some((_, text)) = current.as_mut() {
            if stack.last() == Some(&TEXT) && !in_text_box {
                if let Some(raw) = xml.get(text_start..tag.start()) {
                    text.push_str(&unescape_xml(raw));
                }
            }
        }
        text_start = tag.end();

        if closing {
            if let Some(position) = stack.iter().rposition(|open| *open == name) {
                let closes_current = current
                    .as_ref()
                    .is_some_and(|(depth, _)| *depth == position + 1);
                if name == PARAGRAPH && closes_current {
                    if let Some((_, text)) = current.take() {
                        paragraphs.push(text);
                    }
                }
                stack.truncate(position);
            }
            continue;
        }

        let body_level = stack.last() == Some(&BODY);
        if empty {
            if name == PARAGRAPH && body_level {
                paragraphs.push(String::new());
            } else if let Some((_, text)) = current.as_mut() {
                if !in_text_box {
                    match name {
                        "w:tab" => text.push('\t'),
                        "w:br" | "w:cr" => text.push('\n'),
                        _ => {}
                    }
                }
            }
            continue;
        }

        stack.push(name);
        if name == PARAGRAPH && body_level {
            current = Some((stack.len(), String::new()));
        }
    }

    Ok(paragraphs)
}

fn unescape_xml(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('&') {
        result.push_str(&rest[..start]);
        let after = &rest[start..];

        let decoded = after.find(';').and_then(|end| {
            let entity = &after[1..end];
            decode_entity(entity).map(|ch| (ch, end + 1))
        });

        match decoded {
            Some((ch, consumed)) => {
                result.push(ch);
                rest = &after[consumed..];
            }
            None => {
                result.push('&');
                rest = &after[1..];
            }
        }
    }

    result.push_str(rest);
    result
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

fn regex_error(e: fancy_regex::Error) -> LexiqError {
    LexiqError::Extraction(format!("DOCX parsing error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescapes_named_and_numeric_entities() {
        assert_eq!(unescape_xml("A &amp; B"), "A & B");
        assert_eq!(unescape_xml("&lt;tag&gt; &quot;q&quot; &apos;"), "<tag> \"q\" '");
        assert_eq!(unescape_xml("&#167; 4 &#x2014;"), "§ 4 —");
        assert_eq!(unescape_xml("AT&T; & co"), "AT&T; & co");
    }

    #[test]
    fn splits_paragraphs_and_joins_runs() {
        let xml = concat!(
            r#"<w:body><w:p w:rsidR="00A1"><w:pPr><w:pStyle w:val="Title"/></w:pPr>"#,
            r#"<w:r><w:t>Master </w:t></w:r><w:r><w:t xml:space="preserve">Agreement</w:t></w:r></w:p>"#,
            r#"<w:p/>"#,
            r#"<w:p><w:r><w:t>Term</w:t><w:tab/><w:t>12 months</w:t><w:br/><w:t>renewable</w:t></w:r></w:p>"#,
            r#"</w:body>"#
        );

        let paragraphs = paragraphs(xml).expect("should parse paragraphs");
        assert_eq!(
            paragraphs,
            vec![
                "Master Agreement".to_string(),
                String::new(),
                "Term\t12 months\nrenewable".to_string(),
            ]
        );
    }

    #[test]
    fn table_paragraphs_take_no_index() {
        let xml = concat!(
            r#"<w:body><w:p><w:r><w:t>A</w:t></w:r></w:p>"#,
            r#"<w:tbl><w:tblPr/><w:tr><w:tc><w:p><w:r><w:t>CELL</w:t></w:r></w:p>"#,
            r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>NESTED</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
            r#"</w:tc></w:tr></w:tbl>"#,
            r#"<w:p><w:r><w:t>C</w:t></w:r></w:p></w:body>"#
        );

        let paragraphs = paragraphs(xml).expect("should parse paragraphs");
        assert_eq!(paragraphs, vec!["A".to_string(), "C".to_string()]);
    }

    #[test]
    fn text_box_content_is_skipped_without_losing_outer_text() {
        let xml = concat!(
            r#"<w:body><w:p><w:r><w:t xml:space="preserve">Outer start </w:t></w:r>"#,
            r#"<w:r><mc:AlternateContent><mc:Choice><w:drawing><wps:txbx><w:txbxContent>"#,
            r#"<w:p><w:r><w:t>Inner box</w:t></w:r></w:p>"#,
            r#"</w:txbxContent></wps:txbx></w:drawing></mc:Choice></mc:AlternateContent></w:r>"#,
            r#"<w:r><w:t>outer end</w:t></w:r></w:p>"#,
            r#"<w:p><w:r><w:t>Next</w:t></w:r></w:p></w:body>"#
        );

        let paragraphs = paragraphs(xml).expect("should parse paragraphs");
        assert_eq!(
            paragraphs,
            vec!["Outer start outer end".to_string(), "Next".to_string()]
        );
    }
}
