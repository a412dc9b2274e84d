//! PDF report: the source abstract with attributed sentences highlighted in
//! their source's color, followed by the list of sources.
//!
//! The page is laid out into positioned [`Item`]s first and only then encoded
//! with `lopdf`, so layout can be checked without parsing PDF content streams.

mod font;

use lopdf::{
    content::{Content, Operation},
    dictionary, Object, Stream,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use self::font::{info_string, FontFace, GlyphUsage, StandardFont};
use super::{AttributedSentence, ReportError, Rgb, SourceIndex};
use crate::document::Document;

const PAGE_WIDTH: f32 = 595.28;
const PAGE_HEIGHT: f32 = 841.89;
const MARGIN: f32 = 56.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const BODY_TOP: f32 = PAGE_HEIGHT - 100.0;
const BODY_BOTTOM: f32 = 60.0;
const HEADING_SIZE: f32 = 12.0;
const SMALL_SIZE: f32 = 8.0;
const SWATCH: f32 = 8.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PdfOptions {
    pub font_size_title: f32,
    pub font_size_abstract: f32,
    pub font_size_sources: f32,
    /// TrueType file for body text, embedded with its full Unicode cmap.
    /// Standard Times fonts (WinAnsi only) are used when unset.
    pub font_regular: Option<PathBuf>,
    pub font_bold: Option<PathBuf>,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            font_size_title: 16.0,
            font_size_abstract: 11.0,
            font_size_sources: 10.0,
            font_regular: None,
            font_bold: None,
        }
    }
}

/// Renders the report to `path`.
///
/// Configured font assets are read before anything is written, so a missing
/// asset leaves no partial file behind.
pub fn write_pdf(
    path: &Path,
    source: &Document,
    sentences: &[AttributedSentence],
    index: &SourceIndex,
    options: &PdfOptions,
) -> Result<(), ReportError> {
    let fonts = FontSet::load(options)?;
    let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let pages = layout(source, sentences, index, options, &fonts, &generated_at);
    debug!(pages = pages.len(), sources = index.len(), "laid out PDF report");

    let mut doc = encode(&pages, &fonts, &source.title)?;
    let io_err = |source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut file = fs::File::create(path).map_err(io_err)?;
    doc.save_to(&mut file)
        .map_err(|e| ReportError::Pdf(e.to_string()))?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Face {
    Regular,
    Bold,
}

impl Face {
    fn resource_name(self) -> &'static str {
        match self {
            Face::Regular => "F1",
            Face::Bold => "F2",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Item {
    Text {
        x: f32,
        y: f32,
        size: f32,
        face: Face,
        text: String,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Rgb,
        outlined: bool,
    },
}

#[derive(Debug, Default)]
struct Page {
    items: Vec<Item>,
}

struct Layout<'a> {
    pages: Vec<Page>,
    y: f32,
    fonts: &'a FontSet,
    generated_at: &'a str,
}

impl<'a> Layout<'a> {
    fn new(fonts: &'a FontSet, generated_at: &'a str) -> Self {
        let mut layout = Self {
            pages: Vec::new(),
            y: BODY_TOP,
            fonts,
            generated_at,
        };
        layout.new_page();
        layout
    }

    fn new_page(&mut self) {
        let number = self.pages.len() + 1;
        let mut page = Page::default();
        let fonts = self.fonts;
        page.items
            .push(fonts.centered("Semantic Similarity Report", PAGE_HEIGHT - 42.0, HEADING_SIZE, Face::Bold));
        page.items.push(fonts.centered(
            &format!("Generated on: {}", self.generated_at),
            PAGE_HEIGHT - 56.0,
            SMALL_SIZE,
            Face::Regular,
        ));
        page.items
            .push(fonts.centered(&format!("Page {number}"), 30.0, SMALL_SIZE, Face::Regular));
        self.pages.push(page);
        self.y = BODY_TOP;
    }

    fn push(&mut self, item: Item) {
        if let Some(page) = self.pages.last_mut() {
            page.items.push(item);
        }
    }

    fn ensure(&mut self, height: f32) {
        if self.y - height < BODY_BOTTOM {
            self.new_page();
        }
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
    }

    fn paragraph(&mut self, text: &str, face: Face, size: f32, indent: f32, fill: Option<Rgb>) {
        let line_height = size * 1.35;
        let width = CONTENT_WIDTH - indent;
        for line in wrap(text, size, self.fonts.face(face), width) {
            self.ensure(line_height);
            self.y -= line_height;
            if let Some(color) = fill {
                self.push(Item::Rect {
                    x: MARGIN + indent,
                    y: self.y,
                    width,
                    height: line_height,
                    color,
                    outlined: false,
                });
            }
            self.push(Item::Text {
                x: MARGIN + indent,
                y: self.y + line_height * 0.28,
                size,
                face,
                text: line,
            });
        }
    }
}

fn layout(
    source: &Document,
    sentences: &[AttributedSentence],
    index: &SourceIndex,
    options: &PdfOptions,
    fonts: &FontSet,
    generated_at: &str,
) -> Vec<Page> {
    let mut layout = Layout::new(fonts, generated_at);

    layout.paragraph(&source.title, Face::Bold, options.font_size_title, 0.0, None);
    layout.gap(12.0);
    layout.paragraph("Abstract", Face::Bold, HEADING_SIZE, 0.0, None);
    layout.gap(4.0);

    for sentence in sentences {
        match &sentence.attribution {
            Some(attribution) => layout.paragraph(
                &format!("{} [{}]", sentence.text, attribution.marker.number),
                Face::Regular,
                options.font_size_abstract,
                0.0,
                Some(attribution.marker.color),
            ),
            None => layout.paragraph(&sentence.text, Face::Regular, options.font_size_abstract, 0.0, None),
        }
        layout.gap(2.0);
    }

    if index.is_empty() {
        return layout.pages;
    }

    layout.gap(20.0);
    layout.ensure(HEADING_SIZE * 4.0);
    layout.paragraph("Sources of Similar Content", Face::Bold, HEADING_SIZE, 0.0, None);
    layout.gap(6.0);

    let size = options.font_size_sources;
    for entry in index.entries() {
        layout.ensure(size * 1.35 * 2.0);
        let top = layout.y;
        layout.push(Item::Rect {
            x: MARGIN,
            y: top - size * 1.35 + (size * 1.35 - SWATCH) / 2.0,
            width: SWATCH,
            height: SWATCH,
            color: entry.marker.color,
            outlined: true,
        });
        layout.paragraph(
            &format!(
                "[{}] [Similarity: {:.0}%] {}",
                entry.marker.number,
                entry.best_score * 100.0,
                entry.title
            ),
            Face::Regular,
            size,
            SWATCH + 6.0,
            None,
        );
        layout.paragraph(&format!("(Source: {})", entry.url), Face::Regular, size, SWATCH + 18.0, None);
        layout.gap(4.0);
    }
    layout.pages
}

/// Greedy word wrap; words wider than a full line are broken across lines.
fn wrap(text: &str, size: f32, font: &FontFace, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if font.text_width(&candidate, size) <= max_width {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        for c in word.chars() {
            current.push(c);
            if font.text_width(&current, size) > max_width && current.chars().count() > 1 {
                current.pop();
                lines.push(std::mem::replace(&mut current, c.to_string()));
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

struct FontSet {
    regular: FontFace,
    bold: FontFace,
}

impl FontSet {
    fn load(options: &PdfOptions) -> Result<Self, ReportError> {
        Ok(Self {
            regular: FontFace::load(options.font_regular.as_deref(), StandardFont::TimesRoman, "PaperlensRegular")?,
            bold: FontFace::load(options.font_bold.as_deref(), StandardFont::TimesBold, "PaperlensBold")?,
        })
    }

    fn face(&self, face: Face) -> &FontFace {
        match face {
            Face::Regular => &self.regular,
            Face::Bold => &self.bold,
        }
    }

    fn centered(&self, text: &str, y: f32, size: f32, face: Face) -> Item {
        Item::Text {
            x: (PAGE_WIDTH - self.face(face).text_width(text, size)) / 2.0,
            y,
            size,
            face,
            text: text.to_string(),
        }
    }
}

#[derive(Default)]
struct Usage {
    regular: GlyphUsage,
    bold: GlyphUsage,
}

impl Usage {
    fn face(&mut self, face: Face) -> &mut GlyphUsage {
        match face {
            Face::Regular => &mut self.regular,
            Face::Bold => &mut self.bold,
        }
    }
}

fn operations(page: &Page, fonts: &FontSet, usage: &mut Usage) -> Vec<Operation> {
    let mut ops = Vec::new();
    for item in &page.items {
        match item {
            Item::Rect {
                x,
                y,
                width,
                height,
                color,
                outlined,
            } => {
                let [r, g, b] = color.components();
                ops.push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
                ops.push(Operation::new(
                    "re",
                    vec![(*x).into(), (*y).into(), (*width).into(), (*height).into()],
                ));
                if *outlined {
                    ops.push(Operation::new("w", vec![0.5_f32.into()]));
                    ops.push(Operation::new("RG", vec![0.0_f32.into(), 0.0_f32.into(), 0.0_f32.into()]));
                    ops.push(Operation::new("B", vec![]));
                } else {
                    ops.push(Operation::new("f", vec![]));
                }
            }
            Item::Text { x, y, size, face, text } => {
                ops.push(Operation::new("rg", vec![0.0_f32.into(), 0.0_f32.into(), 0.0_f32.into()]));
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new("Tf", vec![face.resource_name().into(), (*size).into()]));
                ops.push(Operation::new("Td", vec![(*x).into(), (*y).into()]));
                ops.push(Operation::new(
                    "Tj",
                    vec![fonts.face(*face).encode(text, usage.face(*face))],
                ));
                ops.push(Operation::new("ET", vec![]));
            }
        }
    }
    ops
}

fn encode(pages: &[Page], fonts: &FontSet, title: &str) -> Result<lopdf::Document, ReportError> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut usage = Usage::default();

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in pages {
        let content = Content {
            operations: operations(page, fonts, &mut usage),
        };
        let bytes = content
            .encode()
            .map_err(|e| ReportError::Pdf(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, bytes));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let replaced = usage.regular.replaced + usage.bold.replaced;
    if replaced > 0 {
        warn!(replaced, "characters missing from the report fonts were replaced");
    }
    let regular_id = fonts.regular.add_to(&mut doc, &usage.regular);
    let bold_id = fonts.bold.add_to(&mut doc, &usage.bold);
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            Face::Regular.resource_name() => regular_id,
            Face::Bold.resource_name() => bold_id,
        },
    });

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Real(PAGE_WIDTH), Object::Real(PAGE_HEIGHT)],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let info_id = doc.add_object(dictionary! {
        "Title" => info_string(title),
        "Producer" => Object::string_literal("paperlens"),
    });
    doc.trailer.set("Info", info_id);
    doc.compress();
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{attribute_sentences, tests::finding};

    fn standard_fonts() -> FontSet {
        FontSet::load(&PdfOptions::default()).unwrap()
    }

    fn texts(pages: &[Page]) -> Vec<&str> {
        pages
            .iter()
            .flat_map(|p| &p.items)
            .filter_map(|item| match item {
                Item::Text { text, .. } => Some(text.as_str()),
                Item::Rect { .. } => None,
            })
            .collect()
    }

    fn attributed_fixture() -> (Document, Vec<AttributedSentence>, SourceIndex) {
        let source = Document::new(
            "source.txt",
            "Deep Learning Survey",
            "Neural networks are powerful. Cooking is fun. They require large datasets.",
        );
        let findings = vec![finding(0, "a", 0.91), finding(2, "b", 0.7), finding(1, "a", 0.5)];
        let index = SourceIndex::from_findings(&findings);
        let sentences = attribute_sentences(&source, &findings, 0.65, &index);
        (source, sentences, index)
    }

    #[test]
    fn wrap_keeps_words_and_width() {
        let text = "Semantic similarity between scientific abstracts is measured with sentence embeddings \
                    and cosine similarity over every pair of sentences in both documents.";
        let fonts = standard_fonts();
        let regular = fonts.face(Face::Regular);
        let lines = wrap(text, 11.0, regular, 200.0);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| regular.text_width(l, 11.0) <= 200.0));
        assert_eq!(lines.join(" "), text.split_whitespace().collect::<Vec<_>>().join(" "));

        let url = format!("https://example.org/{}", "x".repeat(200));
        let broken = wrap(&url, 10.0, regular, 150.0);
        assert!(broken.len() > 1);
        assert_eq!(broken.concat(), url);
        assert!(wrap("   ", 10.0, regular, 150.0).is_empty());
    }

    #[test]
    fn attributed_sentences_are_highlighted_and_cited() {
        let (source, sentences, index) = attributed_fixture();
        let pages = layout(
            &source,
            &sentences,
            &index,
            &PdfOptions::default(),
            &standard_fonts(),
            "2024-01-01 00:00:00",
        );
        assert_eq!(pages.len(), 1);

        let all = texts(&pages);
        assert!(all.contains(&"Semantic Similarity Report"));
        assert!(all.contains(&"Generated on: 2024-01-01 00:00:00"));
        assert!(all.contains(&"Neural networks are powerful. [1]"));
        assert!(all.contains(&"Cooking is fun."));
        assert!(all.contains(&"They require large datasets. [2]"));
        assert!(all.contains(&"Sources of Similar Content"));
        assert!(all.contains(&"[1] [Similarity: 91%] Title of a"));
        assert!(all.contains(&"(Source: b)"));
        assert!(all.contains(&"Page 1"));

        let fills: Vec<Rgb> = pages[0]
            .items
            .iter()
            .filter_map(|item| match item {
                Item::Rect { color, outlined: false, .. } => Some(*color),
                _ => None,
            })
            .collect();
        assert_eq!(fills, vec![index.entries()[0].marker.color, index.entries()[1].marker.color]);
    }

    #[test]
    fn long_abstracts_break_across_pages() {
        let abstract_text = (0..120)
            .map(|i| format!("Sentence number {i} repeats a fairly long clause to fill the line."))
            .collect::<Vec<_>>()
            .join(" ");
        let source = Document::new("long.txt", "Long", abstract_text);
        let sentences = attribute_sentences(&source, &[], 0.65, &SourceIndex::default());
        let pages = layout(
            &source,
            &sentences,
            &SourceIndex::default(),
            &PdfOptions::default(),
            &standard_fonts(),
            "now",
        );

        assert!(pages.len() >= 2);
        let all = texts(&pages);
        assert!(all.contains(&"Page 2"));
        assert!(!all.contains(&"Sources of Similar Content"));
        for page in &pages {
            for item in &page.items {
                if let Item::Text { y, .. } = item {
                    assert!(*y >= 20.0 && *y <= PAGE_HEIGHT);
                }
            }
        }
    }

    #[test]
    fn writes_a_loadable_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/similarity_report.pdf");
        let (source, sentences, index) = attributed_fixture();
        write_pdf(&path, &source, &sentences, &index, &PdfOptions::default()).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let loaded = lopdf::Document::load(&path).unwrap();
        assert_eq!(loaded.get_pages().len(), 1);
    }

    #[test]
    fn missing_font_asset_fails_before_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        let (source, sentences, index) = attributed_fixture();
        let options = PdfOptions {
            font_regular: Some(dir.path().join("fonts/Times New Roman.ttf")),
            ..PdfOptions::default()
        };
        let err = write_pdf(&path, &source, &sentences, &index, &options).unwrap_err();
        assert!(matches!(err, ReportError::MissingAsset { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn unreadable_font_file_fails_before_output() {
        let dir = tempfile::tempdir().unwrap();
        let font = dir.path().join("regular.ttf");
        std::fs::write(&font, b"\x00\x01\x00\x00fake-truetype").unwrap();
        let path = dir.path().join("report.pdf");
        let (source, sentences, index) = attributed_fixture();
        let options = PdfOptions {
            font_regular: Some(font),
            ..PdfOptions::default()
        };
        let err = write_pdf(&path, &source, &sentences, &index, &options).unwrap_err();
        assert!(matches!(err, ReportError::InvalidAsset { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn embedded_fonts_render_non_latin_text() {
        let dir = tempfile::tempdir().unwrap();
        let font = dir.path().join("regular.ttf");
        std::fs::write(&font, font::tests::math_font()).unwrap();
        let path = dir.path().join("report.pdf");
        let source = Document::new("bound.txt", "Bounds", "We bound \u{3b1} \u{2264} \u{3b2} for all inputs.");
        let sentences = attribute_sentences(&source, &[], 0.65, &SourceIndex::default());
        let options = PdfOptions {
            font_regular: Some(font),
            ..PdfOptions::default()
        };
        write_pdf(&path, &source, &sentences, &SourceIndex::default(), &options).unwrap();

        let loaded = lopdf::Document::load(&path).unwrap();
        let is_name = |dict: &lopdf::Dictionary, key: &[u8], name: &[u8]| {
            dict.get(key).and_then(Object::as_name).map_or(false, |n| n == name)
        };
        let regular = loaded
            .objects
            .values()
            .filter_map(|object| object.as_dict().ok())
            .find(|dict| is_name(dict, b"Subtype", b"Type0"))
            .unwrap();
        assert!(is_name(regular, b"Encoding", b"Identity-H"));

        let descendants = regular.get(b"DescendantFonts").unwrap().as_array().unwrap();
        let cid_font = loaded
            .get_dictionary(descendants[0].as_reference().unwrap())
            .unwrap();
        assert!(is_name(cid_font, b"CIDToGIDMap", b"Identity"));
        // Glyph 96 is alpha, 1234 units at 2000 per em.
        let widths = cid_font.get(b"W").unwrap().as_array().unwrap();
        let alpha = widths
            .chunks(2)
            .find(|pair| pair[0].as_i64().unwrap() == 96)
            .unwrap();
        assert_eq!(alpha[1].as_array().unwrap()[0].as_i64().unwrap(), 617);

        let to_unicode = loaded
            .get_object(regular.get(b"ToUnicode").unwrap().as_reference().unwrap())
            .unwrap()
            .as_stream()
            .unwrap();
        let cmap = String::from_utf8(to_unicode.decompressed_content().unwrap()).unwrap();
        assert!(cmap.contains("<0060> <03B1>"));
        assert!(cmap.contains("<0062> <2264>"));

        let page_id = loaded.get_pages()[&1];
        let content = loaded.get_and_decode_page_content(page_id).unwrap();
        let drawn: Vec<&Vec<u8>> = content
            .operations
            .iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match op.operands.first() {
                Some(Object::String(bytes, _)) => Some(bytes),
                _ => None,
            })
            .collect();
        assert!(drawn.iter().any(|bytes| bytes.windows(2).any(|w| w == [0, 96])));
        assert!(drawn.iter().all(|bytes| !bytes.contains(&b'?')));
    }
}
