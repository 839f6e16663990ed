use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::DriverManager;
use std::fs;
use std::path::{Path, PathBuf};

use crate::document::GridDocument;
use crate::error::ConvertError;

const NODATA_VALUE: f64 = -9999.0;

/// Output file stem for a source path. The batch layer uses the same
/// derivation to reject sources that would collide on one output name.
pub(crate) fn output_stem(path: &Path) -> &str {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("grid")
}

/// Streams one document's decoded rows into a single-band float32 GeoTIFF.
/// The spatial reference is fixed at construction and shared by every file
/// the rasterizer touches.
pub struct Rasterizer {
    epsg: u32,
}

impl Rasterizer {
    pub fn new(epsg: u32) -> Self {
        Self { epsg }
    }

    /// Writes `<source stem>.tif` into `target_dir`, creating the directory
    /// if needed. The dataset is assembled under a `.part` name and renamed
    /// only after it was closed, so a failed conversion never leaves a
    /// half-written file under the final name.
    pub fn convert(&self, doc: &GridDocument, target_dir: &Path) -> Result<PathBuf, ConvertError> {
        fs::create_dir_all(target_dir)?;

        let stem = output_stem(doc.path());
        let output_path = target_dir.join(format!("{stem}.tif"));
        let part_path = target_dir.join(format!("{stem}.tif.part"));

        match self.write_dataset(doc, &part_path) {
            Ok(()) => {
                fs::rename(&part_path, &output_path)?;
                Ok(output_path)
            }
            Err(e) => {
                let _ = fs::remove_file(&part_path);
                Err(e)
            }
        }
    }

    fn write_dataset(&self, doc: &GridDocument, out_path: &Path) -> Result<(), ConvertError> {
        let extent = doc.grid_extent()?;
        let transform = doc.geo_transform()?;
        let rows = doc.row_values()?;

        tracing::debug!(
            "Creating GeoTIFF dataset: {} x {} pixels",
            extent.cols,
            extent.rows
        );

        // GTiffドライバーを取得
        let driver = DriverManager::get_driver_by_name("GTiff")?;

        let mut dataset =
            driver.create_with_band_type::<f32, _>(out_path, extent.cols, extent.rows, 1)?;

        dataset.set_geo_transform(&transform)?;

        let srs = SpatialRef::from_epsg(self.epsg)?;
        dataset.set_projection(&srs.to_wkt()?)?;

        {
            let mut band = dataset.rasterband(1)?;
            band.set_no_data_value(Some(NODATA_VALUE))?;

            // 1行ずつ書き込む
            for (row, values) in rows.enumerate() {
                let mut buffer = Buffer::new((extent.cols, 1), values);
                band.write((0, row as isize), (extent.cols, 1), &mut buffer)?;
            }
        }

        dataset.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdal::Dataset;
    use tempfile::TempDir;

    fn gtiff_available() -> bool {
        DriverManager::get_driver_by_name("GTiff").is_ok()
    }

    fn sample_doc() -> GridDocument {
        let xml = r#"<Dataset xmlns:gml="http://www.opengis.net/gml/3.2">
  <DEM>
    <gml:boundedBy>
      <gml:Envelope>
        <gml:lowerCorner>35.0 135.0</gml:lowerCorner>
        <gml:upperCorner>35.01 135.01</gml:upperCorner>
      </gml:Envelope>
    </gml:boundedBy>
    <gml:GridEnvelope>
      <gml:low>0 0</gml:low>
      <gml:high>2 1</gml:high>
    </gml:GridEnvelope>
    <gml:tupleList>counts
q,100.0 q,101.0 q,102.0
q,103.0 q,104.0 q,105.0</gml:tupleList>
  </DEM>
</Dataset>"#;
        GridDocument::from_xml(xml, "sample_tile.xml").unwrap()
    }

    #[test]
    fn test_convert_writes_single_band_float_raster() {
        if !gtiff_available() {
            eprintln!("Skipping test: GTiff driver not available");
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let rasterizer = Rasterizer::new(6668);

        let output = rasterizer.convert(&sample_doc(), temp_dir.path()).unwrap();
        assert_eq!(output.file_name().unwrap(), "sample_tile.tif");
        assert!(output.exists());

        let dataset = Dataset::open(&output).unwrap();
        assert_eq!(dataset.raster_size(), (3, 2));
        assert_eq!(dataset.raster_count(), 1);

        let transform = dataset.geo_transform().unwrap();
        assert_eq!(transform[0], 135.0); // lon_min
        assert_eq!(transform[3], 35.01); // lat_max
        assert!(transform[5] < 0.0);

        let band = dataset.rasterband(1).unwrap();
        assert_eq!(band.no_data_value().unwrap(), NODATA_VALUE);

        let buffer = band.read_band_as::<f32>().unwrap();
        assert_eq!(buffer.data(), &[100.0, 101.0, 102.0, 103.0, 104.0, 105.0]);
    }

    #[test]
    fn test_failed_conversion_leaves_no_output_file() {
        if !gtiff_available() {
            eprintln!("Skipping test: GTiff driver not available");
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let rasterizer = Rasterizer::new(6668);

        // 値テーブルが無い文書
        let xml = r#"<Dataset>
  <gml:Envelope>
    <gml:lowerCorner>35.0 135.0</gml:lowerCorner>
    <gml:upperCorner>36.0 136.0</gml:upperCorner>
  </gml:Envelope>
  <gml:GridEnvelope><gml:high>1 1</gml:high></gml:GridEnvelope>
</Dataset>"#;
        let doc = GridDocument::from_xml(xml, "broken.xml").unwrap();

        let result = rasterizer.convert(&doc, temp_dir.path());
        assert!(result.is_err());
        assert!(!temp_dir.path().join("broken.tif").exists());
        assert!(!temp_dir.path().join("broken.tif.part").exists());
    }

    #[test]
    fn test_convert_creates_missing_target_directory() {
        if !gtiff_available() {
            eprintln!("Skipping test: GTiff driver not available");
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        let rasterizer = Rasterizer::new(6668);

        let output = rasterizer.convert(&sample_doc(), &nested).unwrap();
        assert!(output.starts_with(&nested));
        assert!(output.exists());
    }
}
