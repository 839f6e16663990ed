/// Sentinel for cells without a valid measurement.
pub const NODATA: f32 = -9999.0;

/// Geographic bounding box of a grid, taken from the document's two corner
/// coordinate pairs. The source format writes each pair latitude first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub lat_min: f64,
    pub lon_min: f64,
    pub lat_max: f64,
    pub lon_max: f64,
}

/// Cell counts per axis. Derived from the inclusive 0-based high corner, so
/// both counts are at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridExtent {
    pub cols: usize,
    pub rows: usize,
}

/// GDAL-ordered affine coefficients: `(x0, dx, 0, y0, 0, dy)`.
pub type GeoTransform = [f64; 6];

impl Envelope {
    /// Raster row 0 is the northern edge, so the y step is negative.
    /// The format never encodes rotated grids.
    pub fn geo_transform(&self, extent: &GridExtent) -> GeoTransform {
        let dx = (self.lon_max - self.lon_min) / extent.cols as f64;
        let dy = (self.lat_min - self.lat_max) / extent.rows as f64;
        [self.lon_min, dx, 0.0, self.lat_max, 0.0, dy]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_transform_origin_and_steps() {
        let envelope = Envelope {
            lat_min: 35.0,
            lon_min: 138.0,
            lat_max: 36.0,
            lon_max: 139.0,
        };
        let extent = GridExtent { cols: 10, rows: 20 };

        let transform = envelope.geo_transform(&extent);
        assert_eq!(transform[0], 138.0);
        assert_eq!(transform[1], 0.1);
        assert_eq!(transform[2], 0.0);
        assert_eq!(transform[3], 36.0);
        assert_eq!(transform[4], 0.0);
        assert_eq!(transform[5], -0.05);
    }

    #[test]
    fn test_geo_transform_is_deterministic() {
        let envelope = Envelope {
            lat_min: 35.833333333,
            lon_min: 138.25,
            lat_max: 35.841666667,
            lon_max: 138.2625,
        };
        let extent = GridExtent {
            cols: 225,
            rows: 150,
        };

        let first = envelope.geo_transform(&extent);
        let second = envelope.geo_transform(&extent);
        assert_eq!(first, second);
        assert!(first[5] < 0.0);
    }
}
