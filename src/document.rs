use std::fs;
use std::path::{Path, PathBuf};
use std::str::Lines;

use tracing::debug;

use crate::error::ConvertError;
use crate::model::{Envelope, GeoTransform, GridExtent, NODATA};
use crate::tree::{find_node, XmlTree};

const ENVELOPE: &str = "gml:Envelope";
const LOWER_CORNER: &str = "gml:lowerCorner";
const UPPER_CORNER: &str = "gml:upperCorner";
const GRID_ENVELOPE: &str = "gml:GridEnvelope";
const HIGH_CORNER: &str = "gml:high";
const TUPLE_LIST: &str = "gml:tupleList";
// 旧形式。gml:Envelope 直下に low/high を書く文書は変換対象外。
const LEGACY_LOW: &str = "gml:low";

/// One parsed source document. Construction is parsing: a `GridDocument`
/// only exists after the markup was read successfully, so the accessors can
/// never run against an unparsed file.
pub struct GridDocument {
    tree: XmlTree,
    path: PathBuf,
}

impl GridDocument {
    pub fn open(path: &Path) -> Result<Self, ConvertError> {
        let xml = fs::read_to_string(path)?;
        Self::from_xml(&xml, path)
    }

    pub fn from_xml(xml: &str, path: impl Into<PathBuf>) -> Result<Self, ConvertError> {
        let tree = XmlTree::parse(xml)?;
        Ok(Self {
            tree,
            path: path.into(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bounding coordinates from the two envelope corner pairs. Each pair is
    /// written latitude first, longitude second; assuming longitude-first
    /// order here would flip the output onto the wrong hemisphere.
    pub fn envelope(&self) -> Result<Envelope, ConvertError> {
        let envelope = find_node(self.tree.root(), ENVELOPE)
            .ok_or(ConvertError::StructureNotFound(ENVELOPE))?;

        let lower = match envelope.child(LOWER_CORNER) {
            Some(node) => node,
            None if envelope.child(LEGACY_LOW).is_some() => {
                return Err(ConvertError::UnsupportedVariant(LEGACY_LOW));
            }
            None => return Err(ConvertError::StructureNotFound(LOWER_CORNER)),
        };
        let upper = envelope
            .child(UPPER_CORNER)
            .ok_or(ConvertError::StructureNotFound(UPPER_CORNER))?;

        let (lat_min, lon_min) = parse_coordinate_pair(lower.text(), LOWER_CORNER)?;
        let (lat_max, lon_max) = parse_coordinate_pair(upper.text(), UPPER_CORNER)?;

        Ok(Envelope {
            lat_min,
            lon_min,
            lat_max,
            lon_max,
        })
    }

    /// Cell counts, derived from the inclusive 0-based high corner indices
    /// plus one per axis.
    pub fn grid_extent(&self) -> Result<GridExtent, ConvertError> {
        let grid = find_node(self.tree.root(), GRID_ENVELOPE)
            .ok_or(ConvertError::StructureNotFound(GRID_ENVELOPE))?;
        let high = grid
            .child(HIGH_CORNER)
            .ok_or(ConvertError::StructureNotFound(HIGH_CORNER))?;

        let (x, y) = parse_index_pair(high.text(), HIGH_CORNER)?;

        Ok(GridExtent {
            cols: (x + 1) as usize,
            rows: (y + 1) as usize,
        })
    }

    pub fn geo_transform(&self) -> Result<GeoTransform, ConvertError> {
        let envelope = self.envelope()?;
        let extent = self.grid_extent()?;
        Ok(envelope.geo_transform(&extent))
    }

    /// Lazy row-by-row decoder over the value table. The table's first line
    /// is a header and is discarded.
    pub fn row_values(&self) -> Result<RowValues<'_>, ConvertError> {
        let extent = self.grid_extent()?;
        let tuple_list = find_node(self.tree.root(), TUPLE_LIST)
            .ok_or(ConvertError::StructureNotFound(TUPLE_LIST))?;

        let mut lines = tuple_list.text().lines();
        lines.next();

        Ok(RowValues {
            lines,
            extent,
            next_row: 0,
        })
    }
}

/// Forward-only producer of `rows` decoded rows of `cols` values each.
/// Borrowed from the document during one write pass; not restartable.
pub struct RowValues<'a> {
    lines: Lines<'a>,
    extent: GridExtent,
    next_row: usize,
}

impl Iterator for RowValues<'_> {
    type Item = Vec<f32>;

    fn next(&mut self) -> Option<Vec<f32>> {
        if self.next_row >= self.extent.rows {
            return None;
        }
        self.next_row += 1;

        match self.lines.next() {
            Some(line) => Some(decode_row(line, self.extent.cols)),
            // Short tables are filled up with nodata rows, not rejected.
            None => Some(vec![NODATA; self.extent.cols]),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.extent.rows - self.next_row;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RowValues<'_> {}

/// One line holds `cols` whitespace-separated `quality,elevation` pairs;
/// only the elevation field is kept. A missing or unreadable cell becomes
/// nodata so that one corrupt token cannot sink the whole file.
fn decode_row(line: &str, cols: usize) -> Vec<f32> {
    let mut values = vec![NODATA; cols];
    for (col, pair) in line.split_whitespace().take(cols).enumerate() {
        match pair.split(',').nth(1).and_then(|t| t.parse::<f32>().ok()) {
            Some(elevation) => values[col] = elevation,
            None => debug!("unreadable cell {:?} at column {}, using nodata", pair, col),
        }
    }
    values
}

fn parse_coordinate_pair(text: &str, element: &'static str) -> Result<(f64, f64), ConvertError> {
    let mut tokens = text.split_whitespace();
    let first = parse_token::<f64>(tokens.next(), text, element)?;
    let second = parse_token::<f64>(tokens.next(), text, element)?;
    Ok((first, second))
}

fn parse_index_pair(text: &str, element: &'static str) -> Result<(i64, i64), ConvertError> {
    let mut tokens = text.split_whitespace();
    let first = parse_token::<i64>(tokens.next(), text, element)?;
    let second = parse_token::<i64>(tokens.next(), text, element)?;
    if first < 0 || second < 0 {
        return Err(ConvertError::MalformedToken {
            element,
            token: text.trim().to_string(),
        });
    }
    Ok((first, second))
}

fn parse_token<T: std::str::FromStr>(
    token: Option<&str>,
    text: &str,
    element: &'static str,
) -> Result<T, ConvertError> {
    let token = token.ok_or_else(|| ConvertError::MalformedToken {
        element,
        token: text.trim().to_string(),
    })?;
    token.parse().map_err(|_| ConvertError::MalformedToken {
        element,
        token: token.to_string(),
    })
}
