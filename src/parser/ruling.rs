//! Table detection from ruled lines.
//!
//! Orthogonal path segments are turned into edges, snapped and joined, then
//! intersected. Cells are the smallest rectangles whose four corners are
//! intersections connected by edges; cells that share corners form a table.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::model::{RawTable, TableStrategy};

use super::layout::{group_spans_into_lines, PageContent, Segment, SegmentKind, TextLine, TextSpan};

/// Pages with more edges than this are not analysed.
pub const MAX_EDGES: usize = 5000;

/// Segments whose endpoints differ by less than this on one axis count as
/// axis-aligned.
const ORIENTATION_TOLERANCE: f32 = 0.5;

/// Thresholds for one ruled-line pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RulingSettings {
    /// Parallel edges closer than this are moved onto one line
    pub snap_tolerance: f32,
    /// Collinear edges with gaps up to this are merged
    pub join_tolerance: f32,
    /// Slack when testing whether a horizontal and a vertical edge cross
    pub intersection_tolerance: f32,
    /// Edges shorter than this are dropped after joining
    pub edge_min_length: f32,
    /// Whether `re` rectangle sides count as ruling
    pub include_rect_edges: bool,
}

impl RulingSettings {
    /// Tolerant pass over stroked lines and rectangle edges.
    pub fn tolerant() -> Self {
        Self {
            snap_tolerance: 3.0,
            join_tolerance: 3.0,
            intersection_tolerance: 5.0,
            edge_min_length: 3.0,
            include_rect_edges: true,
        }
    }

    /// Strict pass over stroked line segments only.
    pub fn strict() -> Self {
        Self {
            snap_tolerance: 3.0,
            join_tolerance: 3.0,
            intersection_tolerance: 3.0,
            edge_min_length: 3.0,
            include_rect_edges: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    Horizontal,
    Vertical,
}

/// An axis-aligned edge. `position` is y for horizontal edges and x for
/// vertical ones; `start < end` along the other axis.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Edge {
    orientation: Orientation,
    position: f32,
    start: f32,
    end: f32,
}

impl Edge {
    fn from_segment(segment: &Segment) -> Option<Self> {
        if segment.length() < f32::EPSILON {
            return None;
        }
        if segment.is_horizontal(ORIENTATION_TOLERANCE) {
            Some(Self {
                orientation: Orientation::Horizontal,
                position: (segment.y0 + segment.y1) / 2.0,
                start: segment.x0.min(segment.x1),
                end: segment.x0.max(segment.x1),
            })
        } else if segment.is_vertical(ORIENTATION_TOLERANCE) {
            Some(Self {
                orientation: Orientation::Vertical,
                position: (segment.x0 + segment.x1) / 2.0,
                start: segment.y0.min(segment.y1),
                end: segment.y0.max(segment.y1),
            })
        } else {
            None
        }
    }

    fn length(&self) -> f32 {
        self.end - self.start
    }
}

/// An exact point, hashable once coordinates have been snapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PointKey(u32, u32);

impl PointKey {
    fn new(x: f32, y: f32) -> Self {
        // -0.0 and 0.0 must collide
        Self((x + 0.0).to_bits(), (y + 0.0).to_bits())
    }
}

/// Edges meeting at one intersection point.
#[derive(Debug, Clone)]
struct Corner {
    x: f32,
    y: f32,
    horizontal: Vec<usize>,
    vertical: Vec<usize>,
}

/// A cell rectangle; `top > bottom` in PDF space.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Cell {
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
}

impl Cell {
    fn corners(&self) -> [PointKey; 4] {
        [
            PointKey::new(self.left, self.top),
            PointKey::new(self.right, self.top),
            PointKey::new(self.left, self.bottom),
            PointKey::new(self.right, self.bottom),
        ]
    }

    fn contains(&self, x: f32, y: f32) -> bool {
        x > self.left && x < self.right && y > self.bottom && y < self.top
    }
}

/// Ruled-line table finder.
#[derive(Debug, Clone)]
pub struct RulingTableFinder {
    settings: RulingSettings,
    strategy: TableStrategy,
}

impl RulingTableFinder {
    /// Create a finder reporting tables under `strategy`.
    pub fn new(settings: RulingSettings, strategy: TableStrategy) -> Self {
        Self { settings, strategy }
    }

    /// Finder for [`TableStrategy::Lines`].
    pub fn lines() -> Self {
        Self::new(RulingSettings::tolerant(), TableStrategy::Lines)
    }

    /// Finder for [`TableStrategy::LinesStrict`].
    pub fn lines_strict() -> Self {
        Self::new(RulingSettings::strict(), TableStrategy::LinesStrict)
    }

    /// Find ruled tables on a page.
    pub fn find_tables(&self, page: &PageContent) -> Result<Vec<RawTable>> {
        let edges = self.collect_edges(&page.segments);
        if edges.len() > MAX_EDGES {
            return Err(Error::TableDetect(format!(
                "page {}: {} edges exceeds limit of {}",
                page.page,
                edges.len(),
                MAX_EDGES
            )));
        }

        let edges = self.merge_edges(edges);
        if edges.is_empty() {
            return Ok(Vec::new());
        }

        let corners = self.intersections(&edges);
        let cells = build_cells(&corners);
        let groups = group_cells(&cells);

        log::debug!(
            "Ruling[{}] page {}: {} edges, {} intersections, {} cells, {} tables",
            self.strategy,
            page.page,
            edges.len(),
            corners.len(),
            cells.len(),
            groups.len()
        );

        Ok(groups
            .into_iter()
            .map(|group| layout_table(page.page, self.strategy, &group, &page.spans))
            .collect())
    }

    fn collect_edges(&self, segments: &[Segment]) -> Vec<Edge> {
        segments
            .iter()
            .filter(|s| self.settings.include_rect_edges || s.kind == SegmentKind::Line)
            .filter_map(Edge::from_segment)
            .collect()
    }

    /// Snap, join and length-filter edges.
    fn merge_edges(&self, edges: Vec<Edge>) -> Vec<Edge> {
        let (horizontal, vertical): (Vec<Edge>, Vec<Edge>) = edges
            .into_iter()
            .partition(|e| e.orientation == Orientation::Horizontal);

        let mut merged = Vec::new();
        for group in [horizontal, vertical] {
            let snapped = snap_edges(group, self.settings.snap_tolerance);
            merged.extend(join_edges(snapped, self.settings.join_tolerance));
        }

        merged.retain(|e| e.length() >= self.settings.edge_min_length);
        merged
    }

    fn intersections(&self, edges: &[Edge]) -> HashMap<PointKey, Corner> {
        let tol = self.settings.intersection_tolerance;
        let mut corners: HashMap<PointKey, Corner> = HashMap::new();

        for (vi, v) in edges.iter().enumerate() {
            if v.orientation != Orientation::Vertical {
                continue;
            }
            for (hi, h) in edges.iter().enumerate() {
                if h.orientation != Orientation::Horizontal {
                    continue;
                }
                let crosses = h.position >= v.start - tol
                    && h.position <= v.end + tol
                    && v.position >= h.start - tol
                    && v.position <= h.end + tol;
                if !crosses {
                    continue;
                }

                let corner = corners
                    .entry(PointKey::new(v.position, h.position))
                    .or_insert_with(|| Corner {
                        x: v.position,
                        y: h.position,
                        horizontal: Vec::new(),
                        vertical: Vec::new(),
                    });
                corner.horizontal.push(hi);
                corner.vertical.push(vi);
            }
        }

        corners
    }
}

/// Move clustered parallel edges onto their mean position.
fn snap_edges(mut edges: Vec<Edge>, tolerance: f32) -> Vec<Edge> {
    edges.sort_by(|a, b| a.position.total_cmp(&b.position));

    let mut start = 0;
    while start < edges.len() {
        let mut end = start + 1;
        while end < edges.len() && edges[end].position - edges[end - 1].position <= tolerance {
            end += 1;
        }

        let cluster = &mut edges[start..end];
        let mean = cluster.iter().map(|e| e.position).sum::<f32>() / cluster.len() as f32;
        for edge in cluster.iter_mut() {
            edge.position = mean;
        }
        start = end;
    }

    edges
}

/// Merge collinear edges that overlap or nearly touch.
fn join_edges(mut edges: Vec<Edge>, tolerance: f32) -> Vec<Edge> {
    edges.sort_by(|a, b| {
        a.position
            .total_cmp(&b.position)
            .then(a.start.total_cmp(&b.start))
    });

    let mut joined: Vec<Edge> = Vec::with_capacity(edges.len());
    for edge in edges {
        match joined.last_mut() {
            Some(last) if last.position == edge.position && edge.start <= last.end + tolerance => {
                last.end = last.end.max(edge.end);
            }
            _ => joined.push(edge),
        }
    }

    joined
}

fn shares_edge(a: &[usize], b: &[usize]) -> bool {
    a.iter().any(|i| b.contains(i))
}

/// Build the smallest closed cell anchored at each intersection.
fn build_cells(corners: &HashMap<PointKey, Corner>) -> Vec<Cell> {
    let mut points: Vec<&Corner> = corners.values().collect();
    // Top to bottom, then left to right
    points.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut cells = Vec::new();
    for (i, top_left) in points.iter().enumerate() {
        let rest = &points[i + 1..];

        let cell = rest
            .iter()
            .filter(|p| p.x == top_left.x && shares_edge(&p.vertical, &top_left.vertical))
            .find_map(|below| {
                rest.iter()
                    .filter(|p| p.y == top_left.y && shares_edge(&p.horizontal, &top_left.horizontal))
                    .find_map(|right| {
                        let bottom_right = corners.get(&PointKey::new(right.x, below.y))?;
                        let closed = shares_edge(&bottom_right.vertical, &right.vertical)
                            && shares_edge(&bottom_right.horizontal, &below.horizontal);
                        closed.then_some(Cell {
                            left: top_left.x,
                            top: top_left.y,
                            right: right.x,
                            bottom: below.y,
                        })
                    })
            });

        if let Some(cell) = cell {
            cells.push(cell);
        }
    }

    cells
}

/// Group cells that share at least one corner; keep groups of 2+ cells.
fn group_cells(cells: &[Cell]) -> Vec<Vec<Cell>> {
    let mut parent: Vec<usize> = (0..cells.len()).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    let mut by_corner: HashMap<PointKey, usize> = HashMap::new();
    for (i, cell) in cells.iter().enumerate() {
        for corner in cell.corners() {
            match by_corner.get(&corner) {
                Some(&other) => {
                    let (a, b) = (find(&mut parent, i), find(&mut parent, other));
                    if a != b {
                        parent[b] = a;
                    }
                }
                None => {
                    by_corner.insert(corner, i);
                }
            }
        }
    }

    let mut groups: HashMap<usize, Vec<Cell>> = HashMap::new();
    for (i, cell) in cells.iter().enumerate() {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(*cell);
    }

    let mut tables: Vec<Vec<Cell>> = groups.into_values().filter(|g| g.len() > 1).collect();
    tables.sort_by(|a, b| {
        let top = |g: &Vec<Cell>| g.iter().map(|c| c.top).fold(f32::MIN, f32::max);
        let left = |g: &Vec<Cell>| g.iter().map(|c| c.left).fold(f32::MAX, f32::min);
        top(b).total_cmp(&top(a)).then(left(a).total_cmp(&left(b)))
    });
    tables
}

/// Lay a group of cells out as rows and columns and fill in their text.
fn layout_table(page: u32, strategy: TableStrategy, cells: &[Cell], spans: &[TextSpan]) -> RawTable {
    let mut tops: Vec<f32> = cells.iter().map(|c| c.top).collect();
    tops.sort_by(|a, b| b.total_cmp(a));
    tops.dedup();

    let mut lefts: Vec<f32> = cells.iter().map(|c| c.left).collect();
    lefts.sort_by(|a, b| a.total_cmp(b));
    lefts.dedup();

    let mut table = RawTable::new(page, strategy);
    for top in &tops {
        let row = lefts
            .iter()
            .map(|left| {
                cells
                    .iter()
                    .find(|c| c.top == *top && c.left == *left)
                    .map(|c| cell_text(c, spans))
                    .unwrap_or_default()
            })
            .collect();
        table.push_row(row);
    }

    table
}

/// Text of the spans anchored inside a cell, one line per baseline.
fn cell_text(cell: &Cell, spans: &[TextSpan]) -> String {
    let inside: Vec<TextSpan> = spans
        .iter()
        .filter(|s| cell.contains(s.x + 0.5, s.y + s.font_size * 0.25))
        .cloned()
        .collect();

    group_spans_into_lines(inside)
        .iter()
        .map(TextLine::text)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
