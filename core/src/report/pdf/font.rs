//! Fonts for the PDF report.
//!
//! Without configured files the report uses the standard Times fonts with
//! WinAnsi encoding. Configured TrueType files are embedded as Type0 fonts
//! with Identity-H encoding, so any character present in the font's Unicode
//! cmap renders, and text is measured with the font's own advances.

use lopdf::{dictionary, Object, ObjectId, Stream, StringFormat};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::report::ReportError;

// Entries per bfchar block allowed in a CMap.
const BFCHAR_CHUNK: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StandardFont {
    TimesRoman,
    TimesBold,
}

impl StandardFont {
    fn base_name(self) -> &'static str {
        match self {
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::TimesBold => "Times-Bold",
        }
    }

    // Approximate Times advance widths in 1/1000 em.
    fn advance(self, c: char) -> f32 {
        let units: f32 = match c {
            ' ' => 250.0,
            'i' | 'j' | 'l' | 't' | 'f' | 'r' | '.' | ',' | ':' | ';' | '\'' | '!' | '|' | '(' | ')' | '[' | ']' => {
                300.0
            }
            'm' | 'w' | 'M' | 'W' | '%' | '@' => 860.0,
            'A'..='Z' => 680.0,
            '0'..='9' => 500.0,
            _ => 480.0,
        };
        match self {
            StandardFont::TimesRoman => units,
            StandardFont::TimesBold => units * 1.06,
        }
    }
}

/// A parsed TrueType file. Metrics are stored in 1/1000 em.
#[derive(Debug, Clone)]
pub(crate) struct EmbeddedFont {
    name: &'static str,
    bytes: Vec<u8>,
    glyphs: HashMap<char, Glyph>,
    notdef_width: i64,
    ascent: i64,
    descent: i64,
    cap_height: i64,
    bbox: [i64; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Glyph {
    id: u16,
    width: i64,
}

impl EmbeddedFont {
    pub(crate) fn parse(name: &'static str, bytes: Vec<u8>) -> Result<Self, String> {
        let face = ttf_parser::Face::parse(&bytes, 0).map_err(|e| e.to_string())?;
        let upem = f32::from(face.units_per_em());
        let scale = |v: f32| (v * 1000.0 / upem).round() as i64;
        let advance = |id: ttf_parser::GlyphId| scale(f32::from(face.glyph_hor_advance(id).unwrap_or(0)));

        let mut glyphs = HashMap::new();
        if let Some(cmap) = face.tables().cmap {
            for subtable in cmap.subtables {
                if !subtable.is_unicode() {
                    continue;
                }
                subtable.codepoints(|cp| {
                    let (Some(c), Some(id)) = (char::from_u32(cp), subtable.glyph_index(cp)) else {
                        return;
                    };
                    if id.0 != 0 {
                        glyphs.entry(c).or_insert(Glyph {
                            id: id.0,
                            width: advance(id),
                        });
                    }
                });
            }
        }
        if glyphs.is_empty() {
            return Err("font has no Unicode character map".to_string());
        }

        let bbox = face.global_bounding_box();
        Ok(Self {
            name,
            notdef_width: advance(ttf_parser::GlyphId(0)),
            ascent: scale(f32::from(face.ascender())),
            descent: scale(f32::from(face.descender())),
            cap_height: scale(f32::from(face.capital_height().unwrap_or_else(|| face.ascender()))),
            bbox: [bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max].map(|v| scale(f32::from(v))),
            glyphs,
            bytes,
        })
    }

    fn advance(&self, c: char) -> f32 {
        self.glyphs.get(&c).map_or(self.notdef_width, |g| g.width) as f32
    }

    fn width_of(&self, id: u16) -> i64 {
        self.glyphs
            .values()
            .find(|g| g.id == id)
            .map_or(self.notdef_width, |g| g.width)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum FontFace {
    Standard(StandardFont),
    Embedded(EmbeddedFont),
}

/// Glyphs a document draws with one face, and how many characters it could not draw.
#[derive(Debug, Default)]
pub(crate) struct GlyphUsage {
    glyphs: BTreeMap<u16, char>,
    pub(crate) replaced: usize,
}

impl FontFace {
    /// Loads `path` if set, falling back to `standard`.
    pub(crate) fn load(path: Option<&Path>, standard: StandardFont, name: &'static str) -> Result<Self, ReportError> {
        let Some(path) = path else {
            return Ok(FontFace::Standard(standard));
        };
        if !path.is_file() {
            return Err(ReportError::MissingAsset {
                path: path.to_path_buf(),
            });
        }
        let bytes = fs::read(path).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let font = EmbeddedFont::parse(name, bytes).map_err(|reason| ReportError::InvalidAsset {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(FontFace::Embedded(font))
    }

    pub(crate) fn text_width(&self, text: &str, size: f32) -> f32 {
        let units: f32 = match self {
            FontFace::Standard(font) => text.chars().map(|c| font.advance(c)).sum(),
            FontFace::Embedded(font) => text.chars().map(|c| font.advance(c)).sum(),
        };
        units * size / 1000.0
    }

    /// Encodes `text` as a string operand for this face, recording used glyphs.
    pub(crate) fn encode(&self, text: &str, usage: &mut GlyphUsage) -> Object {
        match self {
            FontFace::Standard(_) => {
                let (bytes, replaced) = encode_winansi(text);
                usage.replaced += replaced;
                Object::String(bytes, StringFormat::Literal)
            }
            FontFace::Embedded(font) => {
                let mut bytes = Vec::with_capacity(text.len() * 2);
                for c in text.chars() {
                    let id = match font.glyphs.get(&c) {
                        Some(glyph) => {
                            usage.glyphs.entry(glyph.id).or_insert(c);
                            glyph.id
                        }
                        None => {
                            usage.replaced += 1;
                            0
                        }
                    };
                    bytes.extend_from_slice(&id.to_be_bytes());
                }
                Object::String(bytes, StringFormat::Hexadecimal)
            }
        }
    }

    /// Adds the font dictionary and its dependent objects to `doc`.
    pub(crate) fn add_to(&self, doc: &mut lopdf::Document, usage: &GlyphUsage) -> ObjectId {
        match self {
            FontFace::Standard(font) => doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => font.base_name(),
                "Encoding" => "WinAnsiEncoding",
            }),
            FontFace::Embedded(font) => add_type0(doc, font, usage),
        }
    }
}

fn add_type0(doc: &mut lopdf::Document, font: &EmbeddedFont, usage: &GlyphUsage) -> ObjectId {
    let file_id = doc.add_object(Stream::new(
        dictionary! { "Length1" => font.bytes.len() as i64 },
        font.bytes.clone(),
    ));
    let [x_min, y_min, x_max, y_max] = font.bbox;
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => font.name,
        "Flags" => 32_i64,
        "FontBBox" => vec![Object::Integer(x_min), Object::Integer(y_min), Object::Integer(x_max), Object::Integer(y_max)],
        "ItalicAngle" => 0_i64,
        "Ascent" => font.ascent,
        "Descent" => font.descent,
        "CapHeight" => font.cap_height,
        "StemV" => 80_i64,
        "FontFile2" => file_id,
    });

    let mut widths: Vec<Object> = Vec::with_capacity(usage.glyphs.len() * 2);
    for &id in usage.glyphs.keys() {
        widths.push(Object::Integer(i64::from(id)));
        widths.push(Object::Array(vec![Object::Integer(font.width_of(id))]));
    }
    let cid_font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => font.name,
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0_i64,
        },
        "FontDescriptor" => descriptor_id,
        "DW" => font.notdef_width,
        "W" => widths,
        "CIDToGIDMap" => "Identity",
    });
    let to_unicode_id = doc.add_object(Stream::new(dictionary! {}, to_unicode_cmap(&usage.glyphs).into_bytes()));

    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => font.name,
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![Object::Reference(cid_font_id)],
        "ToUnicode" => to_unicode_id,
    })
}

/// A CMap mapping each used glyph id back to its character, for text extraction.
fn to_unicode_cmap(glyphs: &BTreeMap<u16, char>) -> String {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );
    let entries: Vec<(&u16, &char)> = glyphs.iter().collect();
    for chunk in entries.chunks(BFCHAR_CHUNK) {
        let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
        for (id, c) in chunk {
            let mut units = [0u16; 2];
            let hex: String = c.encode_utf16(&mut units).iter().map(|u| format!("{u:04X}")).collect();
            let _ = writeln!(cmap, "<{id:04X}> <{hex}>");
        }
        cmap.push_str("endbfchar\n");
    }
    cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    cmap
}

/// Encodes text for a WinAnsi font; characters outside it become `?`.
/// Returns the bytes and the number of replaced characters.
pub(crate) fn encode_winansi(text: &str) -> (Vec<u8>, usize) {
    let mut replaced = 0;
    let bytes = text
        .chars()
        .map(|c| match c {
            '\u{20ac}' => 0x80,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201c}' => 0x93,
            '\u{201d}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            c if u32::from(c) < 0x80 || (0xa0..=0xff).contains(&u32::from(c)) => c as u8,
            _ => {
                replaced += 1;
                b'?'
            }
        })
        .collect();
    (bytes, replaced)
}

/// Info dictionary string: literal when ASCII, UTF-16BE with a byte order mark otherwise.
pub(crate) fn info_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xfe, 0xff];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a minimal TrueType file mapping `chars` to glyphs 1..=n with the
    /// given advances, at 2000 units per em. Glyph 0 advances 1000 units.
    pub(crate) fn test_font(chars: &[(char, u16)]) -> Vec<u8> {
        let num_glyphs = u16::try_from(chars.len() + 1).unwrap();
        let be16 = |out: &mut Vec<u8>, v: u16| out.extend_from_slice(&v.to_be_bytes());

        let mut head = Vec::new();
        head.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        head.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        head.extend_from_slice(&0u32.to_be_bytes());
        head.extend_from_slice(&0x5F0F_3CF5u32.to_be_bytes());
        be16(&mut head, 0);
        be16(&mut head, 2000);
        head.extend_from_slice(&[0; 16]);
        for v in [-200i16, -500, 2200, 1800] {
            head.extend_from_slice(&v.to_be_bytes());
        }
        be16(&mut head, 0);
        be16(&mut head, 8);
        be16(&mut head, 2);
        be16(&mut head, 0);
        be16(&mut head, 0);
        assert_eq!(head.len(), 54);

        let mut hhea = Vec::new();
        hhea.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        for v in [1600i16, -400, 0] {
            hhea.extend_from_slice(&v.to_be_bytes());
        }
        hhea.extend_from_slice(&[0; 22]);
        be16(&mut hhea, 0);
        be16(&mut hhea, num_glyphs);
        assert_eq!(hhea.len(), 36);

        let mut maxp = Vec::new();
        maxp.extend_from_slice(&0x0000_5000u32.to_be_bytes());
        be16(&mut maxp, num_glyphs);

        let mut hmtx = Vec::new();
        for advance in std::iter::once(1000).chain(chars.iter().map(|&(_, a)| a)) {
            be16(&mut hmtx, advance);
            be16(&mut hmtx, 0);
        }

        let mut sorted: Vec<(u16, u16)> = chars
            .iter()
            .enumerate()
            .map(|(i, &(c, _))| (u16::try_from(u32::from(c)).unwrap(), u16::try_from(i + 1).unwrap()))
            .collect();
        sorted.sort_unstable();
        let seg_count = u16::try_from(sorted.len() + 1).unwrap();
        let mut sub = Vec::new();
        be16(&mut sub, 4);
        be16(&mut sub, 16 + 8 * seg_count);
        be16(&mut sub, 0);
        be16(&mut sub, seg_count * 2);
        let search_range = 2 * (1u16 << (15 - seg_count.leading_zeros()));
        be16(&mut sub, search_range);
        be16(&mut sub, u16::try_from(search_range.trailing_zeros() - 1).unwrap());
        be16(&mut sub, seg_count * 2 - search_range);
        for &(code, _) in &sorted {
            be16(&mut sub, code);
        }
        be16(&mut sub, 0xFFFF);
        be16(&mut sub, 0);
        for &(code, _) in &sorted {
            be16(&mut sub, code);
        }
        be16(&mut sub, 0xFFFF);
        for &(code, gid) in &sorted {
            be16(&mut sub, gid.wrapping_sub(code));
        }
        be16(&mut sub, 1);
        for _ in 0..seg_count {
            be16(&mut sub, 0);
        }
        let mut cmap = Vec::new();
        be16(&mut cmap, 0);
        be16(&mut cmap, 1);
        be16(&mut cmap, 3);
        be16(&mut cmap, 1);
        cmap.extend_from_slice(&12u32.to_be_bytes());
        cmap.extend_from_slice(&sub);

        let tables: [(&[u8; 4], Vec<u8>); 5] =
            [(b"cmap", cmap), (b"head", head), (b"hhea", hhea), (b"hmtx", hmtx), (b"maxp", maxp)];
        let mut font = Vec::new();
        font.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        be16(&mut font, 5);
        be16(&mut font, 64);
        be16(&mut font, 2);
        be16(&mut font, 16);
        let mut offset = 12 + 16 * tables.len();
        let mut body = Vec::new();
        for (tag, data) in &tables {
            font.extend_from_slice(*tag);
            font.extend_from_slice(&0u32.to_be_bytes());
            font.extend_from_slice(&u32::try_from(offset).unwrap().to_be_bytes());
            font.extend_from_slice(&u32::try_from(data.len()).unwrap().to_be_bytes());
            body.extend_from_slice(data);
            while body.len() % 4 != 0 {
                body.push(0);
            }
            offset = 12 + 16 * tables.len() + body.len();
        }
        font.extend_from_slice(&body);
        font
    }

    /// Printable ASCII at 1000 units (500/1000 em) plus a few math symbols.
    pub(crate) fn math_font() -> Vec<u8> {
        let mut chars: Vec<(char, u16)> = (' '..='~').map(|c| (c, 1000)).collect();
        chars.extend([('\u{3b1}', 1234), ('\u{3b2}', 1100), ('\u{2264}', 1300)]);
        test_font(&chars)
    }

    fn math_face() -> FontFace {
        FontFace::Embedded(EmbeddedFont::parse("PaperlensRegular", math_font()).unwrap())
    }

    #[test]
    fn embedded_font_metrics_come_from_the_file() {
        let FontFace::Embedded(font) = math_face() else {
            unreachable!()
        };
        assert_eq!(font.advance('a'), 500.0);
        assert_eq!(font.advance('\u{3b1}'), 617.0);
        assert_eq!(font.notdef_width, 500);
        assert_eq!(font.ascent, 800);
        assert_eq!(font.descent, -200);
        assert_eq!(font.bbox, [-100, -250, 1100, 900]);
        assert_eq!(math_face().text_width("ab", 10.0), 10.0);
    }

    #[test]
    fn non_latin_text_maps_to_glyph_ids() {
        let face = math_face();
        let mut usage = GlyphUsage::default();
        let Object::String(bytes, StringFormat::Hexadecimal) = face.encode("We bound \u{3b1} \u{2264} \u{3b2}.", &mut usage)
        else {
            panic!("expected a hex string");
        };
        assert_eq!(usage.replaced, 0);
        assert_eq!(bytes.len(), 2 * 15);
        // 'W' is the 56th printable character, after glyph 0.
        assert_eq!(&bytes[..2], &[0, 56]);
        assert_eq!(&bytes[18..20], &[0, 96]);
        assert!(usage.glyphs.values().any(|&c| c == '\u{2264}'));

        let mut missing = GlyphUsage::default();
        face.encode("\u{4e2d}x", &mut missing);
        assert_eq!(missing.replaced, 1);
    }

    #[test]
    fn to_unicode_maps_glyphs_back_to_characters() {
        let glyphs = BTreeMap::from([(1, 'a'), (96, '\u{3b1}'), (300, '\u{1d400}')]);
        let cmap = to_unicode_cmap(&glyphs);
        assert!(cmap.contains("3 beginbfchar"));
        assert!(cmap.contains("<0001> <0061>"));
        assert!(cmap.contains("<0060> <03B1>"));
        assert!(cmap.contains("<012C> <D835DC00>"));

        let many: BTreeMap<u16, char> = (1..=150u16).map(|id| (id, 'x')).collect();
        let cmap = to_unicode_cmap(&many);
        assert!(cmap.contains("100 beginbfchar"));
        assert!(cmap.contains("50 beginbfchar"));
    }

    #[test]
    fn unparseable_font_file_is_an_invalid_asset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regular.ttf");
        std::fs::write(&path, b"\x00\x01\x00\x00fake-truetype").unwrap();
        let err = FontFace::load(Some(&path), StandardFont::TimesRoman, "PaperlensRegular").unwrap_err();
        assert!(matches!(err, ReportError::InvalidAsset { .. }));
    }

    #[test]
    fn text_outside_winansi_is_replaced() {
        assert_eq!(
            encode_winansi("Caf\u{e9} \u{201c}x\u{201d} \u{3b1}"),
            (b"Caf\xe9 \x93x\x94 ?".to_vec(), 1)
        );
        let face = FontFace::Standard(StandardFont::TimesRoman);
        let mut usage = GlyphUsage::default();
        face.encode("\u{3b1} \u{2264} \u{3b2}", &mut usage);
        assert_eq!(usage.replaced, 3);
    }

    #[test]
    fn non_ascii_titles_use_utf16() {
        assert!(matches!(info_string("Plain"), Object::String(bytes, StringFormat::Literal) if bytes == b"Plain"));
        let Object::String(bytes, StringFormat::Hexadecimal) = info_string("\u{3b1}-stable") else {
            panic!("expected a hex string");
        };
        assert_eq!(bytes[..6], [0xfe, 0xff, 0x03, 0xb1, 0, b'-']);
        assert_eq!(bytes.len(), 2 + 2 * 8);
    }
}
