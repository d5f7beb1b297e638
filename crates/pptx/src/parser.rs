//! PPTX file parser implementation.
//!
//! Walks the slides of a presentation in deck order and turns each one into
//! a [`SlideRecord`]: the title placeholder's text becomes the heading and
//! every other text-bearing shape contributes its non-empty paragraphs as
//! bullets.

use deck_core::{Error, ExtractedDeck, Result, SlideRecord};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use zip::ZipArchive;

const PRESENTATION_PATH: &str = "ppt/presentation.xml";
const PRESENTATION_RELS_PATH: &str = "ppt/_rels/presentation.xml.rels";
const SLIDE_REL_TYPE_SUFFIX: &str = "/relationships/slide";

/// Parser for PPTX (Office Open XML) files.
pub struct PptxParser;

impl PptxParser {
    /// Create a new PPTX parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse a PPTX file from a reader.
    pub fn parse<R: Read + Seek>(&self, reader: R) -> Result<ExtractedDeck> {
        let mut archive =
            ZipArchive::new(reader).map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let mut deck = ExtractedDeck::new();

        let slide_order = self.get_slide_order(&mut archive)?;
        log::debug!("Presentation lists {} slides", slide_order.len());

        for slide_path in &slide_order {
            let slide = self.parse_slide(&mut archive, slide_path)?;
            deck.push(slide);
        }

        Ok(deck)
    }

    /// Get the ordered list of slide part paths.
    ///
    /// Order comes from `p:sldIdLst` in presentation.xml; each entry's `r:id`
    /// is resolved through the presentation relationships.
    fn get_slide_order<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<Vec<String>> {
        let rels_content = self.read_file_from_archive(archive, PRESENTATION_RELS_PATH)?;
        let targets = parse_slide_relationships(&rels_content)?;

        let presentation = self.read_file_from_archive(archive, PRESENTATION_PATH)?;
        let rel_ids = parse_slide_id_list(&presentation)?;

        rel_ids
            .into_iter()
            .map(|rel_id| {
                targets.get(&rel_id).cloned().ok_or_else(|| {
                    Error::PptxParseError(format!("Slide relationship '{}' is not defined", rel_id))
                })
            })
            .collect()
    }

    /// Parse a single slide from the archive.
    fn parse_slide<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        slide_path: &str,
    ) -> Result<SlideRecord> {
        let content = self.read_file_from_archive(archive, slide_path)?;
        let shapes = extract_shapes_from_xml(&content)
            .map_err(|e| Error::XmlError(format!("{}: {}", slide_path, e)))?;

        let title_index = shapes.iter().position(|s| s.is_title);

        let mut slide = SlideRecord::default();
        if let Some(idx) = title_index {
            slide.heading = shapes[idx].paragraphs.join("\n").trim().to_string();
        }

        for (idx, shape) in shapes.iter().enumerate() {
            if Some(idx) == title_index || !shape.has_text_frame {
                continue;
            }
            for paragraph in &shape.paragraphs {
                let text = paragraph.trim();
                if !text.is_empty() {
                    slide.add_bullet(text);
                }
            }
        }

        log::debug!(
            "{}: heading {:?}, {} bullets",
            slide_path,
            slide.heading,
            slide.bullet_points.len()
        );

        Ok(slide)
    }

    /// Read a file from the ZIP archive.
    fn read_file_from_archive<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        path: &str,
    ) -> Result<String> {
        let mut file = archive
            .by_name(path)
            .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

        Ok(content)
    }
}

impl Default for PptxParser {
    fn default() -> Self {
        Self::new()
    }
}

/// A top-level shape of a slide's shape tree.
#[derive(Debug, Default)]
struct ShapeInfo {
    /// Placeholder with idx 0, i.e. the slide title.
    is_title: bool,
    has_text_frame: bool,
    paragraphs: Vec<String>,
}

/// Map relationship ids to slide part paths.
fn parse_slide_relationships(xml: &str) -> Result<HashMap<String, String>> {
    let mut targets = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                let mut rel_type = String::new();
                let mut target = String::new();
                let mut id = String::new();

                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).to_string();
                    match attr.key.as_ref() {
                        b"Type" => rel_type = value,
                        b"Target" => target = value,
                        b"Id" => id = value,
                        _ => {}
                    }
                }

                if rel_type.ends_with(SLIDE_REL_TYPE_SUFFIX) {
                    targets.insert(id, resolve_target(&target));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!("Error parsing relationships: {}", e)));
            }
            _ => {}
        }
    }

    Ok(targets)
}

/// Collect the `r:id` of every `p:sldId`, in deck order.
fn parse_slide_id_list(xml: &str) -> Result<Vec<String>> {
    let mut rel_ids = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"sldId" =>
            {
                // The relationship id is the namespaced `r:id`; the bare `id`
                // is the numeric slide id.
                let rel_id = e.attributes().flatten().find_map(|attr| {
                    let key = attr.key.as_ref();
                    (key != b"id" && local_name(key) == b"id")
                        .then(|| String::from_utf8_lossy(&attr.value).to_string())
                });
                if let Some(rel_id) = rel_id {
                    rel_ids.push(rel_id);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!("Error parsing presentation: {}", e)));
            }
            _ => {}
        }
    }

    Ok(rel_ids)
}

/// Extract the top-level shapes and their paragraph text from slide XML.
///
/// Shapes nested inside group shapes or `mc:AlternateContent` wrappers are
/// not visited.
fn extract_shapes_from_xml(xml_content: &str) -> std::result::Result<Vec<ShapeInfo>, quick_xml::Error> {
    let mut shapes = Vec::new();
    let mut reader = Reader::from_str(xml_content);
    // Run text keeps its surrounding spaces ("Hello " + "world").
    reader.trim_text(false);

    let mut nested_depth = 0usize;
    let mut current_shape: Option<ShapeInfo> = None;
    let mut current_paragraph: Option<String> = None;
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => match local_name(e.name().as_ref()) {
                b"grpSp" | b"AlternateContent" => nested_depth += 1,
                b"sp" if nested_depth == 0 => current_shape = Some(ShapeInfo::default()),
                b"ph" => mark_placeholder(&mut current_shape, e),
                b"txBody" => {
                    if let Some(ref mut shape) = current_shape {
                        shape.has_text_frame = true;
                    }
                }
                b"p" if in_text_frame(&current_shape) => current_paragraph = Some(String::new()),
                b"t" if current_paragraph.is_some() => in_text = true,
                _ => {}
            },
            Event::Empty(ref e) => match local_name(e.name().as_ref()) {
                b"ph" => mark_placeholder(&mut current_shape, e),
                b"p" if in_text_frame(&current_shape) => {
                    if let Some(ref mut shape) = current_shape {
                        shape.paragraphs.push(String::new());
                    }
                }
                b"br" => {
                    if let Some(ref mut paragraph) = current_paragraph {
                        paragraph.push('\n');
                    }
                }
                _ => {}
            },
            Event::Text(ref e) if in_text => {
                if let Some(ref mut paragraph) = current_paragraph {
                    paragraph.push_str(&e.unescape()?);
                }
            }
            Event::CData(ref e) if in_text => {
                if let Some(ref mut paragraph) = current_paragraph {
                    paragraph.push_str(&String::from_utf8_lossy(e));
                }
            }
            Event::End(ref e) => match local_name(e.name().as_ref()) {
                b"t" => in_text = false,
                b"p" => {
                    if let (Some(paragraph), Some(shape)) =
                        (current_paragraph.take(), current_shape.as_mut())
                    {
                        shape.paragraphs.push(paragraph);
                    }
                }
                b"sp" if nested_depth == 0 => {
                    if let Some(shape) = current_shape.take() {
                        shapes.push(shape);
                    }
                }
                b"grpSp" | b"AlternateContent" => nested_depth = nested_depth.saturating_sub(1),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(shapes)
}

fn in_text_frame(shape: &Option<ShapeInfo>) -> bool {
    shape.as_ref().is_some_and(|s| s.has_text_frame)
}

/// Flag the current shape as the title if its placeholder index is 0.
fn mark_placeholder(shape: &mut Option<ShapeInfo>, ph: &BytesStart) {
    let Some(shape) = shape else {
        return;
    };

    // An absent idx means 0.
    let idx = ph
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == b"idx")
        .and_then(|attr| String::from_utf8_lossy(&attr.value).parse::<u32>().ok())
        .unwrap_or(0);

    shape.is_title = idx == 0;
}

/// Resolve a relationship target relative to the `ppt/` directory.
fn resolve_target(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_string()
    } else {
        format!("ppt/{}", target)
    }
}

/// Extract the local name from a potentially namespaced XML element name.
fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

    /// Assemble a minimal package. `order` lists slide file numbers in deck order.
    fn package(slides: &[(usize, String)], order: &[usize]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();

        let mut rels = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        rels.push_str(r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="slideMasters/slideMaster1.xml"/>"#);
        for (num, _) in slides {
            rels.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide{}.xml"/>"#,
                num + 10,
                num
            ));
        }
        rels.push_str("</Relationships>");

        let ids: String = order
            .iter()
            .enumerate()
            .map(|(i, num)| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, num + 10))
            .collect();
        let presentation = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><p:presentation {NS}><p:sldIdLst>{ids}</p:sldIdLst></p:presentation>"#
        );

        zip.start_file(PRESENTATION_RELS_PATH, options).unwrap();
        zip.write_all(rels.as_bytes()).unwrap();
        zip.start_file(PRESENTATION_PATH, options).unwrap();
        zip.write_all(presentation.as_bytes()).unwrap();
        for (num, body) in slides {
            zip.start_file(format!("ppt/slides/slide{}.xml", num), options).unwrap();
            zip.write_all(slide_xml(body).as_bytes()).unwrap();
        }

        zip.finish().unwrap().into_inner()
    }

    fn slide_xml(shapes: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><p:sld {NS}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{shapes}</p:spTree></p:cSld></p:sld>"#
        )
    }

    fn text_shape(ph: &str, paragraphs: &[&str]) -> String {
        let paras: String = paragraphs
            .iter()
            .map(|p| format!("<a:p><a:r><a:rPr lang=\"en-US\"/><a:t>{}</a:t></a:r></a:p>", p))
            .collect();
        format!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Shape"/><p:cNvSpPr/><p:nvPr>{ph}</p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/>{paras}</p:txBody></p:sp>"#
        )
    }

    fn picture() -> String {
        r#"<p:pic><p:nvPicPr><p:cNvPr id="5" name="Picture"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill/><p:spPr/></p:pic>"#.to_string()
    }

    fn parse(bytes: Vec<u8>) -> ExtractedDeck {
        PptxParser::new().parse(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn test_title_and_bullets() {
        let body = text_shape(r#"<p:ph type="title"/>"#, &["  Quarterly Review  "])
            + &text_shape(r#"<p:ph type="body" idx="1"/>"#, &["Revenue up", "", "   ", "Costs down "]);
        let deck = parse(package(&[(1, body)], &[1]));

        assert_eq!(deck.len(), 1);
        assert_eq!(deck.slides[0].heading, "Quarterly Review");
        assert_eq!(deck.slides[0].bullet_points, vec!["Revenue up", "Costs down"]);
        assert_eq!(deck.slides[0].chart_type, None);
    }

    #[test]
    fn test_slides_follow_presentation_order() {
        let slides = vec![
            (1, text_shape(r#"<p:ph type="ctrTitle"/>"#, &["First file"])),
            (2, text_shape(r#"<p:ph type="title"/>"#, &["Second file"])),
            (3, text_shape(r#"<p:ph type="title"/>"#, &["Third file"])),
        ];
        let deck = parse(package(&slides, &[3, 1, 2]));

        let headings: Vec<&str> = deck.slides.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(headings, vec!["Third file", "First file", "Second file"]);
    }

    #[test]
    fn test_slide_without_text_shapes() {
        let deck = parse(package(&[(1, picture())], &[1]));
        assert_eq!(deck.slides[0], SlideRecord::default());
    }

    #[test]
    fn test_missing_title_defaults_to_empty_heading() {
        let body = text_shape("", &["Loose text"]);
        let deck = parse(package(&[(1, body)], &[1]));
        assert_eq!(deck.slides[0].heading, "");
        assert_eq!(deck.slides[0].bullet_points, vec!["Loose text"]);
    }

    #[test]
    fn test_runs_breaks_and_entities() {
        let body = r#"<p:sp><p:nvSpPr><p:cNvPr id="3" name="TextBox"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:p><a:r><a:t>Fish </a:t></a:r><a:r><a:t>&amp; chips</a:t></a:r><a:br/><a:r><a:t>second line</a:t></a:r></a:p><a:p/></p:txBody></p:sp>"#;
        let deck = parse(package(&[(1, body.to_string())], &[1]));
        assert_eq!(deck.slides[0].bullet_points, vec!["Fish & chips\nsecond line"]);
    }

    #[test]
    fn test_grouped_shapes_are_not_visited() {
        let grouped = format!(
            r#"<p:grpSp><p:nvGrpSpPr><p:cNvPr id="9" name="Group"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}</p:grpSp>"#,
            text_shape("", &["inside group"])
        );
        let body = text_shape(r#"<p:ph type="title"/>"#, &["Heading"]) + &grouped + &text_shape("", &["outside"]);
        let deck = parse(package(&[(1, body)], &[1]));
        assert_eq!(deck.slides[0].bullet_points, vec!["outside"]);
    }

    #[test]
    fn test_alternate_content_is_not_visited() {
        let wrapped = format!(
            r#"<mc:AlternateContent><mc:Choice Requires="a14">{}</mc:Choice><mc:Fallback>{}</mc:Fallback></mc:AlternateContent>"#,
            text_shape("", &["E=mc2"]),
            text_shape("", &["E=mc2"])
        );
        let body = text_shape(r#"<p:ph type="title"/>"#, &["Physics"]) + &wrapped + &text_shape("", &["after"]);
        let deck = parse(package(&[(1, body)], &[1]));
        assert_eq!(deck.slides[0].heading, "Physics");
        assert_eq!(deck.slides[0].bullet_points, vec!["after"]);
    }

    #[test]
    fn test_first_title_placeholder_wins() {
        let body = text_shape(r#"<p:ph type="title"/>"#, &["Real title"])
            + &text_shape(r#"<p:ph type="ctrTitle"/>"#, &["Second title"]);
        let deck = parse(package(&[(1, body)], &[1]));
        assert_eq!(deck.slides[0].heading, "Real title");
        assert_eq!(deck.slides[0].bullet_points, vec!["Second title"]);
    }

    #[test]
    fn test_multi_paragraph_title_is_joined() {
        let body = text_shape(r#"<p:ph type="title"/>"#, &["Line one", "Line two"]);
        let deck = parse(package(&[(1, body)], &[1]));
        assert_eq!(deck.slides[0].heading, "Line one\nLine two");
    }

    #[test]
    fn test_not_a_zip() {
        let err = PptxParser::new().parse(Cursor::new(b"plain text".to_vec())).unwrap_err();
        assert!(matches!(err, Error::ZipError(_)));
    }

    #[test]
    fn test_dangling_slide_reference() {
        let bytes = package(&[(1, picture())], &[1, 7]);
        let err = PptxParser::new().parse(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, Error::PptxParseError(_)));
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("slides/slide1.xml"), "ppt/slides/slide1.xml");
        assert_eq!(resolve_target("/ppt/slides/slide2.xml"), "ppt/slides/slide2.xml");
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"p:sp"), b"sp");
        assert_eq!(local_name(b"a:t"), b"t");
        assert_eq!(local_name(b"sp"), b"sp");
    }
}
