//! Layout analysis for PDF pages.
//!
//! The analyzer interprets a page's content stream once and records positioned
//! text spans (for line grouping and table cell filling) together with the
//! straight path segments the page paints (for ruled-table detection). All
//! coordinates are in default user space, with y growing upwards.

use std::collections::{BTreeMap, HashMap};

use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId, Stream};

use crate::error::{Error, Result};

/// Glyph advance used when a font carries no width table, in 1/1000 em.
const FALLBACK_GLYPH_WIDTH: f32 = 500.0;

/// TJ adjustment (1/1000 em) beyond which a word break is assumed.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

/// A text span with position and style information.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    /// The text content
    pub text: String,
    /// X position (left edge)
    pub x: f32,
    /// Y position (baseline)
    pub y: f32,
    /// Advance width of the text
    pub width: f32,
    /// Rendered font size in points
    pub font_size: f32,
    /// Base font name (e.g., "Helvetica-Bold")
    pub font_name: String,
}

impl TextSpan {
    /// Create a span whose width is estimated from its character count.
    pub fn new(text: impl Into<String>, x: f32, y: f32, font_size: f32) -> Self {
        let text = text.into();
        let width = text.chars().count() as f32 * font_size * FALLBACK_GLYPH_WIDTH / 1000.0;
        Self {
            text,
            x,
            y,
            width,
            font_size,
            font_name: String::new(),
        }
    }

    /// Replace the estimated width.
    pub fn with_width(mut self, width: f32) -> Self {
        self.width = width;
        self
    }

    /// Right edge of the span.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Get the bottom Y coordinate (approximate, based on font size).
    pub fn bottom(&self) -> f32 {
        self.y - self.font_size * 0.2
    }

    /// Get the top Y coordinate (approximate, based on font size).
    pub fn top(&self) -> f32 {
        self.y + self.font_size * 0.8
    }
}

/// A text line composed of spans sharing a baseline.
#[derive(Debug, Clone)]
pub struct TextLine {
    /// The spans in this line, sorted by X position
    pub spans: Vec<TextSpan>,
    /// Y position (baseline)
    pub y: f32,
    /// Leftmost X position
    pub x: f32,
    /// Dominant font size in this line
    pub font_size: f32,
}

impl TextLine {
    /// Create a new text line from spans.
    pub fn from_spans(mut spans: Vec<TextSpan>) -> Self {
        if spans.is_empty() {
            return Self {
                spans,
                y: 0.0,
                x: 0.0,
                font_size: 0.0,
            };
        }

        spans.sort_by(|a, b| a.x.total_cmp(&b.x));

        // Dominant size, weighted by text length
        let total_chars: usize = spans.iter().map(|s| s.text.chars().count()).sum();
        let weighted: f32 = spans
            .iter()
            .map(|s| s.font_size * s.text.chars().count() as f32)
            .sum();
        let font_size = if total_chars > 0 {
            weighted / total_chars as f32
        } else {
            spans[0].font_size
        };

        let y = spans[0].y;
        let x = spans[0].x;

        Self {
            spans,
            y,
            x,
            font_size,
        }
    }

    /// Get the combined text of all spans.
    ///
    /// A space is inserted between two spans when the horizontal gap between
    /// them exceeds a tenth of the font size and neither side already carries
    /// whitespace.
    pub fn text(&self) -> String {
        let mut result = String::new();

        for (i, span) in self.spans.iter().enumerate() {
            if i > 0 {
                let prev = &self.spans[i - 1];
                let gap = span.x - prev.right();
                let needs_space = gap > span.font_size.max(1.0) * 0.1
                    && !result.ends_with(char::is_whitespace)
                    && !span.text.starts_with(char::is_whitespace);
                if needs_space {
                    result.push(' ');
                }
            }
            result.push_str(&span.text);
        }

        result
    }
}

/// A block of consecutive lines (a paragraph or table region).
#[derive(Debug, Clone)]
pub struct TextBlock {
    /// The lines in this block, top to bottom
    pub lines: Vec<TextLine>,
}

impl TextBlock {
    /// Create a new text block.
    pub fn new(lines: Vec<TextLine>) -> Self {
        Self { lines }
    }

    /// Lines of the block joined by line breaks.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(TextLine::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Check if the block is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.text().trim().is_empty())
    }
}

/// Join blocks into page text, separating blocks by a blank line.
pub fn blocks_to_text(blocks: &[TextBlock]) -> String {
    blocks
        .iter()
        .filter(|b| !b.is_empty())
        .map(TextBlock::text)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// How a path segment was constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Built with `m`/`l`/`h`
    Line,
    /// One side of an `re` rectangle
    RectEdge,
}

/// A painted straight path segment in user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    pub kind: SegmentKind,
}

impl Segment {
    /// Create a segment between two points.
    pub fn new(from: (f32, f32), to: (f32, f32), kind: SegmentKind) -> Self {
        Self {
            x0: from.0,
            y0: from.1,
            x1: to.0,
            y1: to.1,
            kind,
        }
    }

    /// Check if both endpoints share a y within `tolerance`.
    pub fn is_horizontal(&self, tolerance: f32) -> bool {
        (self.y0 - self.y1).abs() <= tolerance
    }

    /// Check if both endpoints share an x within `tolerance`.
    pub fn is_vertical(&self, tolerance: f32) -> bool {
        (self.x0 - self.x1).abs() <= tolerance
    }

    /// Euclidean length.
    pub fn length(&self) -> f32 {
        (self.x1 - self.x0).hypot(self.y1 - self.y0)
    }
}

/// Everything the table strategies need from one page.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    /// 1-based page number
    pub page: u32,
    /// Text spans in content-stream order
    pub spans: Vec<TextSpan>,
    /// Painted path segments
    pub segments: Vec<Segment>,
}

impl PageContent {
    /// Create empty content for a page.
    pub fn new(page: u32) -> Self {
        Self {
            page,
            ..Default::default()
        }
    }

    /// Check if the page produced neither text nor paths.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty() && self.segments.is_empty()
    }
}

/// Layout analyzer for extracting positioned content from PDF pages.
pub struct LayoutAnalyzer<'a> {
    doc: &'a LopdfDocument,
}

impl<'a> LayoutAnalyzer<'a> {
    /// Create a new layout analyzer.
    pub fn new(doc: &'a LopdfDocument) -> Self {
        Self { doc }
    }

    /// Interpret a page's content stream into spans and path segments.
    ///
    /// Fails when the page does not exist or its content stream cannot be
    /// decoded.
    pub fn extract_page_content(&self, page_num: u32) -> Result<PageContent> {
        let pages = self.doc.get_pages();
        let page_id = *pages
            .get(&page_num)
            .ok_or(Error::PageOutOfRange(page_num, pages.len() as u32))?;

        let fonts = self
            .doc
            .get_page_fonts(page_id)
            .map_err(|e| Error::PdfParse(e.to_string()))?;

        let data = self.get_page_content(page_id)?;
        let content = lopdf::content::Content::decode(&data)
            .map_err(|e| Error::PdfParse(format!("page {}: {}", page_num, e)))?;

        let mut interpreter = ContentInterpreter::new(self.doc, page_num, fonts);
        for op in &content.operations {
            interpreter.apply(&op.operator, &op.operands);
        }

        let page = interpreter.finish();
        log::debug!(
            "Page {}: {} spans, {} segments",
            page_num,
            page.spans.len(),
            page.segments.len()
        );
        Ok(page)
    }

    /// Extract paragraph blocks from a page.
    pub fn extract_page_blocks(&self, page_num: u32) -> Result<Vec<TextBlock>> {
        let content = self.extract_page_content(page_num)?;
        let lines = group_spans_into_lines(content.spans);
        Ok(group_lines_into_blocks(lines))
    }

    /// Get page content stream.
    fn get_page_content(&self, page_id: ObjectId) -> Result<Vec<u8>> {
        let page_dict = self
            .doc
            .get_dictionary(page_id)
            .map_err(|e| Error::PdfParse(e.to_string()))?;

        // A page without Contents is blank.
        let Ok(contents) = page_dict.get(b"Contents") else {
            return Ok(Vec::new());
        };

        match contents {
            Object::Reference(r) => match self.doc.get_object(*r) {
                Ok(Object::Stream(s)) => stream_content(s),
                Ok(Object::Array(arr)) => Ok(self.concat_streams(arr)),
                _ => Err(Error::PdfParse("Invalid content stream".to_string())),
            },
            Object::Array(arr) => Ok(self.concat_streams(arr)),
            _ => Err(Error::PdfParse("Invalid content stream".to_string())),
        }
    }

    fn concat_streams(&self, refs: &[Object]) -> Vec<u8> {
        let mut content = Vec::new();
        for obj in refs {
            if let Object::Reference(r) = obj {
                if let Ok(Object::Stream(s)) = self.doc.get_object(*r) {
                    if let Ok(data) = stream_content(s) {
                        content.extend_from_slice(&data);
                        content.push(b' ');
                    }
                }
            }
        }
        content
    }
}

/// Decoded bytes of a content stream.
///
/// lopdf refuses to decompress a stream without `/Filter`; such a stream is
/// stored as-is.
fn stream_content(stream: &Stream) -> Result<Vec<u8>> {
    if !stream.dict.has(b"Filter") {
        return Ok(stream.content.clone());
    }
    stream
        .decompressed_content()
        .map_err(|e| Error::PdfParse(e.to_string()))
}

/// Group spans into lines by baseline, top to bottom.
pub fn group_spans_into_lines(mut spans: Vec<TextSpan>) -> Vec<TextLine> {
    if spans.is_empty() {
        return vec![];
    }

    // PDF y grows upwards, so descending y is reading order
    spans.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut lines: Vec<TextLine> = Vec::new();
    let mut current: Vec<TextSpan> = Vec::new();
    let mut current_y: Option<f32> = None;

    for span in spans {
        let tolerance = span.font_size * 0.3;
        match current_y {
            Some(y) if (span.y - y).abs() <= tolerance => current.push(span),
            _ => {
                if !current.is_empty() {
                    lines.push(TextLine::from_spans(std::mem::take(&mut current)));
                }
                current_y = Some(span.y);
                current.push(span);
            }
        }
    }

    if !current.is_empty() {
        lines.push(TextLine::from_spans(current));
    }

    lines
}

/// Group lines into blocks based on vertical spacing, size and indentation.
pub fn group_lines_into_blocks(lines: Vec<TextLine>) -> Vec<TextBlock> {
    let avg_spacing = average_line_spacing(&lines);
    let mut blocks: Vec<TextBlock> = Vec::new();
    let mut current: Vec<TextLine> = Vec::new();

    for line in lines {
        let breaks = current
            .last()
            .is_some_and(|prev| should_break_block(prev, &line, avg_spacing));
        if breaks {
            blocks.push(TextBlock::new(std::mem::take(&mut current)));
        }
        current.push(line);
    }

    if !current.is_empty() {
        blocks.push(TextBlock::new(current));
    }

    blocks
}

/// Average baseline distance between consecutive lines.
fn average_line_spacing(lines: &[TextLine]) -> f32 {
    let spacings: Vec<f32> = lines
        .windows(2)
        .map(|w| (w[0].y - w[1].y).abs())
        .filter(|s| *s > 0.1)
        .collect();

    if spacings.is_empty() {
        return 12.0;
    }

    spacings.iter().sum::<f32>() / spacings.len() as f32
}

/// Determine if a new block should start between two lines.
fn should_break_block(prev: &TextLine, curr: &TextLine, avg_spacing: f32) -> bool {
    let spacing = (prev.y - curr.y).abs();
    if spacing > avg_spacing * 1.5 {
        return true;
    }

    if (prev.font_size - curr.font_size).abs() > 1.0 {
        return true;
    }

    // Indentation change
    (prev.x - curr.x).abs() > 20.0
}

/// Affine transform `[a b c d e f]`, applied to row vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix([f32; 6]);

impl Matrix {
    pub const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self([a, b, c, d, e, f])
    }

    pub fn translation(tx: f32, ty: f32) -> Self {
        Self([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        let [oa, ob, oc, od, oe, of] = other.0;
        Matrix([
            a * oa + b * oc,
            a * ob + b * od,
            c * oa + d * oc,
            c * ob + d * od,
            e * oa + f * oc + oe,
            e * ob + f * od + of,
        ])
    }

    /// Transform a point.
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    fn horizontal_scale(&self) -> f32 {
        self.0[0].hypot(self.0[1])
    }

    fn vertical_scale(&self) -> f32 {
        self.0[2].hypot(self.0[3])
    }
}

/// Glyph metrics of one font resource.
#[derive(Debug, Clone)]
struct FontMetrics {
    first_char: u32,
    widths: Vec<f32>,
    cid_widths: HashMap<u32, f32>,
    default_width: f32,
    two_byte: bool,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: FALLBACK_GLYPH_WIDTH,
            two_byte: false,
        }
    }
}

impl FontMetrics {
    fn from_font(doc: &LopdfDocument, font: &Dictionary) -> Self {
        let is_type0 = font
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            .is_some_and(|n| n == b"Type0");

        if is_type0 {
            let mut metrics = FontMetrics {
                two_byte: true,
                default_width: 1000.0,
                ..Default::default()
            };
            let descendant = font
                .get(b"DescendantFonts")
                .ok()
                .map(|o| resolve(doc, o))
                .and_then(|o| o.as_array().ok())
                .and_then(|a| a.first())
                .map(|o| resolve(doc, o))
                .and_then(|o| o.as_dict().ok());
            if let Some(cid_font) = descendant {
                if let Some(dw) = cid_font.get(b"DW").ok().and_then(get_number) {
                    metrics.default_width = dw;
                }
                if let Some(w) = cid_font
                    .get(b"W")
                    .ok()
                    .map(|o| resolve(doc, o))
                    .and_then(|o| o.as_array().ok())
                {
                    metrics.cid_widths = parse_cid_widths(doc, w);
                }
            }
            return metrics;
        }

        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(get_number)
            .map_or(0, |n| n.max(0.0) as u32);
        let widths = font
            .get(b"Widths")
            .ok()
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
            .map(|arr| {
                arr.iter()
                    .map(|o| get_number(resolve(doc, o)).unwrap_or(FALLBACK_GLYPH_WIDTH))
                    .collect()
            })
            .unwrap_or_default();

        FontMetrics {
            first_char,
            widths,
            ..Default::default()
        }
    }

    fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|c| match c {
                    [hi, lo] => (u32::from(*hi) << 8) | u32::from(*lo),
                    [single] => u32::from(*single),
                    _ => 0,
                })
                .collect()
        } else {
            bytes.iter().map(|b| u32::from(*b)).collect()
        }
    }

    fn glyph_width(&self, code: u32) -> f32 {
        if self.two_byte {
            return self
                .cid_widths
                .get(&code)
                .copied()
                .unwrap_or(self.default_width);
        }
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .unwrap_or(self.default_width)
    }
}

/// Parse a CIDFont `W` array: `c [w1 w2 ...]` or `c_first c_last w` entries.
fn parse_cid_widths(doc: &LopdfDocument, w: &[Object]) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let mut i = 0;

    while i < w.len() {
        let Some(first) = get_number(resolve(doc, &w[i])) else {
            break;
        };
        let first = first.max(0.0) as u32;

        match w.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (k, o) in list.iter().enumerate() {
                    if let Some(v) = get_number(resolve(doc, o)) {
                        widths.insert(first + k as u32, v);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let value = w.get(i + 2).map(|o| resolve(doc, o)).and_then(get_number);
                let (Some(last), Some(value)) = (get_number(last), value) else {
                    break;
                };
                let last = (last.max(0.0) as u32).min(first.saturating_add(0xFFFF));
                for code in first..=last {
                    widths.insert(code, value);
                }
                i += 3;
            }
            None => break,
        }
    }

    widths
}

/// Graphics state saved and restored by `q`/`Q`.
#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font_key: Vec<u8>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horiz_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            font_key: Vec::new(),
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horiz_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

/// Path under construction, already in user space.
#[derive(Debug, Default)]
struct PathBuilder {
    current: Option<(f32, f32)>,
    start: Option<(f32, f32)>,
    pending: Vec<Segment>,
}

impl PathBuilder {
    fn move_to(&mut self, p: (f32, f32)) {
        self.current = Some(p);
        self.start = Some(p);
    }

    fn line_to(&mut self, p: (f32, f32)) {
        if let Some(from) = self.current {
            self.pending.push(Segment::new(from, p, SegmentKind::Line));
        }
        self.current = Some(p);
    }

    fn curve_to(&mut self, p: (f32, f32)) {
        self.current = Some(p);
    }

    fn close(&mut self) {
        if let (Some(from), Some(start)) = (self.current, self.start) {
            if from != start {
                self.pending.push(Segment::new(from, start, SegmentKind::Line));
            }
            self.current = Some(start);
        }
    }

    fn rect(&mut self, corners: [(f32, f32); 4]) {
        for i in 0..4 {
            self.pending.push(Segment::new(
                corners[i],
                corners[(i + 1) % 4],
                SegmentKind::RectEdge,
            ));
        }
        self.move_to(corners[0]);
    }

    fn take(&mut self) -> Vec<Segment> {
        self.current = None;
        self.start = None;
        std::mem::take(&mut self.pending)
    }
}

/// Single-pass content stream interpreter for one page.
struct ContentInterpreter<'a> {
    doc: &'a LopdfDocument,
    fonts: BTreeMap<Vec<u8>, &'a Dictionary>,
    metrics: HashMap<Vec<u8>, FontMetrics>,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    path: PathBuilder,
    page: PageContent,
}

impl<'a> ContentInterpreter<'a> {
    fn new(doc: &'a LopdfDocument, page: u32, fonts: BTreeMap<Vec<u8>, &'a Dictionary>) -> Self {
        let metrics = fonts
            .iter()
            .map(|(key, font)| (key.clone(), FontMetrics::from_font(doc, font)))
            .collect();

        Self {
            doc,
            fonts,
            metrics,
            state: GraphicsState::default(),
            stack: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            path: PathBuilder::default(),
            page: PageContent::new(page),
        }
    }

    fn finish(self) -> PageContent {
        self.page
    }

    fn apply(&mut self, operator: &str, operands: &[Object]) {
        let num = |i: usize| operands.get(i).and_then(get_number).unwrap_or(0.0);

        match operator {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(state) = self.stack.pop() {
                    self.state = state;
                }
            }
            "cm" if operands.len() >= 6 => {
                let m = Matrix::new(num(0), num(1), num(2), num(3), num(4), num(5));
                self.state.ctm = m.multiply(&self.state.ctm);
            }

            "BT" => {
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            "Tf" if operands.len() >= 2 => {
                if let Object::Name(key) = &operands[0] {
                    self.state.font_key = key.clone();
                }
                self.state.font_size = num(1);
            }
            "Tc" => self.state.char_spacing = num(0),
            "Tw" => self.state.word_spacing = num(0),
            "Tz" => self.state.horiz_scale = num(0) / 100.0,
            "TL" => self.state.leading = num(0),
            "Ts" => self.state.rise = num(0),
            "Td" => self.translate_line(num(0), num(1)),
            "TD" => {
                self.state.leading = -num(1);
                self.translate_line(num(0), num(1));
            }
            "Tm" if operands.len() >= 6 => {
                self.line_matrix = Matrix::new(num(0), num(1), num(2), num(3), num(4), num(5));
                self.text_matrix = self.line_matrix;
            }
            "T*" => self.next_line(),
            "Tj" => self.show_text(operands.get(..1).unwrap_or_default()),
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    self.show_text(items);
                }
            }
            "'" => {
                self.next_line();
                self.show_text(operands.get(..1).unwrap_or_default());
            }
            "\"" if operands.len() >= 3 => {
                self.state.word_spacing = num(0);
                self.state.char_spacing = num(1);
                self.next_line();
                self.show_text(&operands[2..3]);
            }

            "m" => {
                let p = self.to_user(num(0), num(1));
                self.path.move_to(p);
            }
            "l" => {
                let p = self.to_user(num(0), num(1));
                self.path.line_to(p);
            }
            "c" => {
                let p = self.to_user(num(4), num(5));
                self.path.curve_to(p);
            }
            "v" | "y" => {
                let p = self.to_user(num(2), num(3));
                self.path.curve_to(p);
            }
            "h" => self.path.close(),
            "re" if operands.len() >= 4 => {
                let (x, y, w, h) = (num(0), num(1), num(2), num(3));
                let corners = [
                    self.to_user(x, y),
                    self.to_user(x + w, y),
                    self.to_user(x + w, y + h),
                    self.to_user(x, y + h),
                ];
                self.path.rect(corners);
            }
            "S" | "f" | "F" | "f*" | "B" | "B*" => {
                let segments = self.path.take();
                self.page.segments.extend(segments);
            }
            "s" | "b" | "b*" => {
                self.path.close();
                let segments = self.path.take();
                self.page.segments.extend(segments);
            }
            "n" => {
                self.path.take();
            }
            _ => {}
        }
    }

    fn to_user(&self, x: f32, y: f32) -> (f32, f32) {
        self.state.ctm.apply(x, y)
    }

    fn translate_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translation(tx, ty).multiply(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.translate_line(0.0, -self.state.leading);
    }

    /// Show strings and TJ adjustments as one span, advancing the text matrix.
    fn show_text(&mut self, items: &[Object]) {
        let rendering = self.text_matrix.multiply(&self.state.ctm);
        let mut text = String::new();
        let mut advance = 0.0;

        for item in items {
            match item {
                Object::String(bytes, _) => {
                    text.push_str(&self.decode(bytes));
                    advance += self.string_advance(bytes);
                }
                other => {
                    if let Some(adjust) = get_number(other) {
                        advance -= adjust / 1000.0 * self.state.font_size * self.state.horiz_scale;
                        if -adjust > TJ_SPACE_THRESHOLD
                            && !text.is_empty()
                            && !text.ends_with(char::is_whitespace)
                        {
                            text.push(' ');
                        }
                    }
                }
            }
        }

        self.text_matrix = Matrix::translation(advance, 0.0).multiply(&self.text_matrix);

        if text.trim().is_empty() {
            return;
        }

        let (x, y) = rendering.apply(0.0, self.state.rise);
        let font_name = self
            .fonts
            .get(&self.state.font_key)
            .and_then(|f| f.get(b"BaseFont").ok())
            .and_then(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).to_string())
            .unwrap_or_else(|| String::from_utf8_lossy(&self.state.font_key).to_string());

        self.page.spans.push(TextSpan {
            text,
            x,
            y,
            width: (advance * rendering.horizontal_scale()).max(0.0),
            font_size: (self.state.font_size * rendering.vertical_scale()).abs(),
            font_name,
        });
    }

    /// Text-space advance of one string operand.
    fn string_advance(&self, bytes: &[u8]) -> f32 {
        let fallback = FontMetrics::default();
        let metrics = self.metrics.get(&self.state.font_key).unwrap_or(&fallback);
        let state = &self.state;

        metrics
            .codes(bytes)
            .into_iter()
            .map(|code| {
                let mut w = metrics.glyph_width(code) / 1000.0 * state.font_size + state.char_spacing;
                if !metrics.two_byte && code == 32 {
                    w += state.word_spacing;
                }
                w * state.horiz_scale
            })
            .sum()
    }

    fn decode(&self, bytes: &[u8]) -> String {
        let encoding = self
            .fonts
            .get(&self.state.font_key)
            .and_then(|f| f.get_font_encoding(self.doc).ok());

        match encoding {
            Some(ref enc) => LopdfDocument::decode_text(enc, bytes)
                .unwrap_or_else(|_| decode_text_simple(bytes)),
            None => decode_text_simple(bytes),
        }
    }
}

fn resolve<'d>(doc: &'d LopdfDocument, obj: &'d Object) -> &'d Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Helper to extract number from PDF object.
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Decode string bytes when the font has no usable encoding.
fn decode_text_simple(bytes: &[u8]) -> String {
    if let [0xFE, 0xFF, rest @ ..] = bytes {
        let utf16: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    // Latin-1
    bytes.iter().map(|&b| b as char).collect()
}
