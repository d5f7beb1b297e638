//! Styled PPTX generation from an [`EnhancedDeck`].
//!
//! The output has a cover slide (title layout) followed by one blank-layout
//! slide per record: light-blue background, a dark-blue rounded heading bar,
//! a word-wrapped bullet box, and, when the record carries a chart tag, a gray
//! label where a chart would go. No chart is ever drawn.

use crate::parts::{self, NS_A, NS_P, NS_PACKAGE_RELS, NS_R};
use deck_core::{EnhancedDeck, Error, Result, SlideRecord};
use quick_xml::escape::escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Subtitle placed under the cover title.
pub const DEFAULT_ATTRIBUTION: &str = "Enhanced by GPT-4";

const EMU_PER_INCH: f64 = 914_400.0;

const BACKGROUND_COLOR: &str = "F0F8FF";
const HEADING_FILL: &str = "0066CC";
const HEADING_COLOR: &str = "FFFFFF";
const CHART_FILL: &str = "E6E6E6";
const CHART_COLOR: &str = "505050";

const HEADING_FRAME: Frame = Frame::inches(0.5, 0.4, 9.0, 1.0);
const BULLET_FRAME: Frame = Frame::inches(0.8, 1.6, 8.5, 4.5);
const CHART_FRAME: Frame = Frame::inches(5.5, 5.0, 3.5, 1.0);

const HEADING_STYLE: RunStyle = RunStyle {
    size_pt: 28,
    bold: true,
    color: Some(HEADING_COLOR),
};
const BULLET_STYLE: RunStyle = RunStyle {
    size_pt: 18,
    bold: false,
    color: None,
};
const CHART_STYLE: RunStyle = RunStyle {
    size_pt: 14,
    bold: false,
    color: Some(CHART_COLOR),
};

/// Position and size of a shape, in inches.
#[derive(Debug, Clone, Copy)]
struct Frame {
    x: f64,
    y: f64,
    cx: f64,
    cy: f64,
}

impl Frame {
    const fn inches(x: f64, y: f64, cx: f64, cy: f64) -> Self {
        Self { x, y, cx, cy }
    }
}

fn emu(inches: f64) -> String {
    ((inches * EMU_PER_INCH).round() as i64).to_string()
}

/// Character formatting applied to every run of a shape.
#[derive(Debug, Clone, Copy)]
struct RunStyle {
    size_pt: u32,
    bold: bool,
    color: Option<&'static str>,
}

/// A free-standing shape on a content slide.
struct ShapeSpec<'a> {
    name: &'a str,
    /// Preset geometry: "roundRect" or "rect".
    geometry: &'a str,
    frame: Frame,
    fill: Option<&'a str>,
    /// Text boxes wrap and keep their paragraphs left-aligned at the top;
    /// autoshapes center their text.
    text_box: bool,
    style: RunStyle,
}

/// Builder for styled PPTX files.
#[derive(Debug, Clone)]
pub struct PptxBuilder {
    attribution: String,
}

impl PptxBuilder {
    /// Create a builder with the default cover subtitle.
    pub fn new() -> Self {
        Self {
            attribution: DEFAULT_ATTRIBUTION.to_string(),
        }
    }

    /// Set the cover slide's subtitle.
    pub fn with_attribution(mut self, attribution: impl Into<String>) -> Self {
        self.attribution = attribution.into();
        self
    }

    /// Render `deck` as a PPTX package into `writer`, returning the writer.
    pub fn build<W: Write + Seek>(&self, deck: &EnhancedDeck, writer: W) -> Result<W> {
        let slide_count = deck.rendered_slide_count();
        let mut zip = ZipWriter::new(writer);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        let add = |zip: &mut ZipWriter<W>, path: &str, content: &[u8]| -> Result<()> {
            zip.start_file(path, options).map_err(zip_err)?;
            zip.write_all(content)
                .map_err(|e| Error::RenderFailure(format!("Failed to write '{}': {}", path, e)))
        };

        add(&mut zip, "[Content_Types].xml", content_types(slide_count).as_bytes())?;
        add(&mut zip, "_rels/.rels", PACKAGE_RELS.as_bytes())?;
        add(&mut zip, "docProps/core.xml", core_properties(deck.title_or_default()).as_bytes())?;
        add(&mut zip, "ppt/presentation.xml", presentation(slide_count).as_bytes())?;
        add(
            &mut zip,
            "ppt/_rels/presentation.xml.rels",
            presentation_rels(slide_count).as_bytes(),
        )?;
        for (path, content) in parts::STATIC_PARTS {
            add(&mut zip, path, content.as_bytes())?;
        }

        let cover = title_slide(deck.title_or_default(), &self.attribution).map_err(xml_err)?;
        add(&mut zip, "ppt/slides/slide1.xml", &cover)?;
        add(
            &mut zip,
            "ppt/slides/_rels/slide1.xml.rels",
            slide_rels(parts::TITLE_LAYOUT).as_bytes(),
        )?;

        for (idx, record) in deck.slides.iter().enumerate() {
            let number = idx + 2;
            let xml = content_slide(record).map_err(xml_err)?;
            add(&mut zip, &format!("ppt/slides/slide{}.xml", number), &xml)?;
            add(
                &mut zip,
                &format!("ppt/slides/_rels/slide{}.xml.rels", number),
                slide_rels(parts::BLANK_LAYOUT).as_bytes(),
            )?;
        }

        log::debug!("Rendered {} slides", slide_count);

        zip.finish().map_err(zip_err)
    }

    /// Render `deck` to a file at `path`.
    pub fn save(&self, deck: &EnhancedDeck, path: &Path) -> Result<PathBuf> {
        let file = File::create(path)?;
        let mut writer = self.build(deck, BufWriter::new(file))?;
        writer.flush()?;

        log::info!("Saved presentation to {}", path.display());
        Ok(path.to_path_buf())
    }
}

impl Default for PptxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn zip_err(e: zip::result::ZipError) -> Error {
    Error::RenderFailure(format!("ZIP error: {}", e))
}

fn xml_err(e: quick_xml::Error) -> Error {
    Error::RenderFailure(format!("XML error: {}", e))
}

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/></Relationships>"#;

fn content_types(slide_count: usize) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/>"#,
    );
    for (part, content_type) in parts::STATIC_CONTENT_TYPES {
        xml.push_str(&format!(
            r#"<Override PartName="{}" ContentType="{}"/>"#,
            part, content_type
        ));
    }
    for number in 1..=slide_count {
        xml.push_str(&format!(
            r#"<Override PartName="/ppt/slides/slide{}.xml" ContentType="{}"/>"#,
            number,
            parts::CT_SLIDE
        ));
    }
    xml.push_str("</Types>");
    xml
}

fn core_properties(title: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:title>{}</dc:title></cp:coreProperties>"#,
        escape(&sanitize(title))
    )
}

fn presentation(slide_count: usize) -> String {
    let slide_ids: String = (0..slide_count)
        .map(|i| {
            format!(
                r#"<p:sldId id="{}" r:id="rId{}"/>"#,
                256 + i,
                parts::FIRST_SLIDE_REL_ID + i
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" saveSubsetFonts="1"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst>{slide_ids}</p:sldIdLst><p:sldSz cx="{}" cy="{}" type="screen4x3"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#,
        parts::SLIDE_WIDTH,
        parts::SLIDE_HEIGHT
    )
}

fn presentation_rels(slide_count: usize) -> String {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{NS_PACKAGE_RELS}"><Relationship Id="rId1" Type="{}" Target="slideMasters/slideMaster1.xml"/><Relationship Id="rId2" Type="{}" Target="theme/theme1.xml"/><Relationship Id="rId3" Type="{}" Target="presProps.xml"/><Relationship Id="rId4" Type="{}" Target="tableStyles.xml"/>"#,
        parts::REL_SLIDE_MASTER,
        parts::REL_THEME,
        parts::REL_PRES_PROPS,
        parts::REL_TABLE_STYLES
    );
    for i in 0..slide_count {
        xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="{}" Target="slides/slide{}.xml"/>"#,
            parts::FIRST_SLIDE_REL_ID + i,
            parts::REL_SLIDE,
            i + 1
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

fn slide_rels(layout: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{NS_PACKAGE_RELS}"><Relationship Id="rId1" Type="{}" Target="{}"/></Relationships>"#,
        parts::REL_SLIDE_LAYOUT,
        layout
    )
}

/// Drop characters XML 1.0 cannot carry. Tabs and newlines survive.
fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|&c| !c.is_control() || c == '\t' || c == '\n')
        .filter(|&c| c != '\u{FFFE}' && c != '\u{FFFF}')
        .collect()
}

fn title_slide(title: &str, attribution: &str) -> quick_xml::Result<Vec<u8>> {
    let mut slide = SlideWriter::begin(None)?;
    slide.placeholder("Title 1", &[("type", "ctrTitle")], title)?;
    slide.placeholder("Subtitle 2", &[("type", "subTitle"), ("idx", "1")], attribution)?;
    slide.finish()
}

fn content_slide(record: &SlideRecord) -> quick_xml::Result<Vec<u8>> {
    let mut slide = SlideWriter::begin(Some(BACKGROUND_COLOR))?;

    slide.shape(
        &ShapeSpec {
            name: "Rounded Rectangle",
            geometry: "roundRect",
            frame: HEADING_FRAME,
            fill: Some(HEADING_FILL),
            text_box: false,
            style: HEADING_STYLE,
        },
        &[record.heading.as_str()],
    )?;

    let bullets: Vec<&str> = record.bullet_points.iter().map(String::as_str).collect();
    slide.shape(
        &ShapeSpec {
            name: "TextBox",
            geometry: "rect",
            frame: BULLET_FRAME,
            fill: None,
            text_box: true,
            style: BULLET_STYLE,
        },
        &bullets,
    )?;

    if let Some(chart_type) = record.chart_label() {
        let label = format!("[{} chart placeholder]", chart_type);
        slide.shape(
            &ShapeSpec {
                name: "Rectangle",
                geometry: "rect",
                frame: CHART_FRAME,
                fill: Some(CHART_FILL),
                text_box: false,
                style: CHART_STYLE,
            },
            &[label.as_str()],
        )?;
    }

    slide.finish()
}

/// Streams one slide part.
struct SlideWriter {
    writer: Writer<Vec<u8>>,
    next_id: u32,
}

impl SlideWriter {
    /// Open `p:sld` through the shape tree's group properties.
    fn begin(background: Option<&str>) -> quick_xml::Result<Self> {
        let mut slide = Self {
            writer: Writer::new(Vec::new()),
            next_id: 2,
        };

        slide
            .writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        slide.start("p:sld", &[("xmlns:a", NS_A), ("xmlns:r", NS_R), ("xmlns:p", NS_P)])?;
        slide.start("p:cSld", &[])?;

        if let Some(color) = background {
            slide.start("p:bg", &[])?;
            slide.start("p:bgPr", &[])?;
            slide.solid_fill(color)?;
            slide.empty("a:effectLst", &[])?;
            slide.end("p:bgPr")?;
            slide.end("p:bg")?;
        }

        slide.start("p:spTree", &[])?;
        slide.start("p:nvGrpSpPr", &[])?;
        slide.empty("p:cNvPr", &[("id", "1"), ("name", "")])?;
        slide.empty("p:cNvGrpSpPr", &[])?;
        slide.empty("p:nvPr", &[])?;
        slide.end("p:nvGrpSpPr")?;
        slide.empty("p:grpSpPr", &[])?;

        Ok(slide)
    }

    /// A layout placeholder filled with one paragraph; geometry is inherited.
    fn placeholder(&mut self, name: &str, ph: &[(&str, &str)], text: &str) -> quick_xml::Result<()> {
        let id = self.take_id();
        self.start("p:sp", &[])?;
        self.start("p:nvSpPr", &[])?;
        self.empty("p:cNvPr", &[("id", id.as_str()), ("name", name)])?;
        self.start("p:cNvSpPr", &[])?;
        self.empty("a:spLocks", &[("noGrp", "1")])?;
        self.end("p:cNvSpPr")?;
        self.start("p:nvPr", &[])?;
        self.empty("p:ph", ph)?;
        self.end("p:nvPr")?;
        self.end("p:nvSpPr")?;
        self.empty("p:spPr", &[])?;
        self.start("p:txBody", &[])?;
        self.empty("a:bodyPr", &[])?;
        self.empty("a:lstStyle", &[])?;
        self.paragraph(text, None, None)?;
        self.end("p:txBody")?;
        self.end("p:sp")
    }

    /// A positioned shape with one paragraph per entry of `paragraphs`.
    fn shape(&mut self, spec: &ShapeSpec, paragraphs: &[&str]) -> quick_xml::Result<()> {
        let id = self.take_id();
        let name = format!("{} {}", spec.name, id);

        self.start("p:sp", &[])?;
        self.start("p:nvSpPr", &[])?;
        self.empty("p:cNvPr", &[("id", id.as_str()), ("name", name.as_str())])?;
        if spec.text_box {
            self.empty("p:cNvSpPr", &[("txBox", "1")])?;
        } else {
            self.empty("p:cNvSpPr", &[])?;
        }
        self.empty("p:nvPr", &[])?;
        self.end("p:nvSpPr")?;

        self.start("p:spPr", &[])?;
        self.start("a:xfrm", &[])?;
        self.empty(
            "a:off",
            &[("x", emu(spec.frame.x).as_str()), ("y", emu(spec.frame.y).as_str())],
        )?;
        self.empty(
            "a:ext",
            &[("cx", emu(spec.frame.cx).as_str()), ("cy", emu(spec.frame.cy).as_str())],
        )?;
        self.end("a:xfrm")?;
        self.start("a:prstGeom", &[("prst", spec.geometry)])?;
        self.empty("a:avLst", &[])?;
        self.end("a:prstGeom")?;
        match spec.fill {
            Some(color) => self.solid_fill(color)?,
            None => self.empty("a:noFill", &[])?,
        }
        self.end("p:spPr")?;

        self.start("p:txBody", &[])?;
        if spec.text_box {
            self.start("a:bodyPr", &[("wrap", "square"), ("rtlCol", "0")])?;
            self.empty("a:spAutoFit", &[])?;
            self.end("a:bodyPr")?;
        } else {
            self.empty("a:bodyPr", &[("rtlCol", "0"), ("anchor", "ctr")])?;
        }
        self.empty("a:lstStyle", &[])?;

        let align = (!spec.text_box).then_some("ctr");
        if paragraphs.is_empty() {
            self.paragraph("", align, Some(spec.style))?;
        }
        for text in paragraphs {
            self.paragraph(text, align, Some(spec.style))?;
        }

        self.end("p:txBody")?;
        self.end("p:sp")
    }

    /// One `a:p`. Embedded newlines become line breaks within the paragraph.
    fn paragraph(
        &mut self,
        text: &str,
        align: Option<&str>,
        style: Option<RunStyle>,
    ) -> quick_xml::Result<()> {
        let text = sanitize(text);
        self.start("a:p", &[])?;
        if let Some(align) = align {
            self.empty("a:pPr", &[("algn", align)])?;
        }

        if text.is_empty() {
            self.run_properties("a:endParaRPr", style)?;
        } else {
            for (i, line) in text.split('\n').enumerate() {
                if i > 0 {
                    self.empty("a:br", &[])?;
                }
                if line.is_empty() {
                    continue;
                }
                self.start("a:r", &[])?;
                self.run_properties("a:rPr", style)?;
                self.start("a:t", &[])?;
                self.writer.write_event(Event::Text(BytesText::new(line)))?;
                self.end("a:t")?;
                self.end("a:r")?;
            }
        }

        self.end("a:p")
    }

    fn run_properties(&mut self, tag: &str, style: Option<RunStyle>) -> quick_xml::Result<()> {
        let Some(style) = style else {
            return self.empty(tag, &[("lang", "en-US"), ("dirty", "0")]);
        };

        let size = (style.size_pt * 100).to_string();
        let mut attrs = vec![("lang", "en-US"), ("sz", size.as_str())];
        if style.bold {
            attrs.push(("b", "1"));
        }
        attrs.push(("dirty", "0"));

        match style.color {
            Some(color) => {
                self.start(tag, &attrs)?;
                self.solid_fill(color)?;
                self.end(tag)
            }
            None => self.empty(tag, &attrs),
        }
    }

    fn solid_fill(&mut self, color: &str) -> quick_xml::Result<()> {
        self.start("a:solidFill", &[])?;
        self.empty("a:srgbClr", &[("val", color)])?;
        self.end("a:solidFill")
    }

    fn finish(mut self) -> quick_xml::Result<Vec<u8>> {
        self.end("p:spTree")?;
        self.end("p:cSld")?;
        self.start("p:clrMapOvr", &[])?;
        self.empty("a:masterClrMapping", &[])?;
        self.end("p:clrMapOvr")?;
        self.end("p:sld")?;
        Ok(self.writer.into_inner())
    }

    fn take_id(&mut self) -> String {
        let id = self.next_id;
        self.next_id += 1;
        id.to_string()
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> quick_xml::Result<()> {
        let mut element = BytesStart::new(name);
        element.extend_attributes(attrs.iter().copied());
        self.writer.write_event(Event::Start(element))
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> quick_xml::Result<()> {
        let mut element = BytesStart::new(name);
        element.extend_attributes(attrs.iter().copied());
        self.writer.write_event(Event::Empty(element))
    }

    fn end(&mut self, name: &str) -> quick_xml::Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))
    }
}
