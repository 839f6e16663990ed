use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::document::GridDocument;
use crate::error::ConvertError;
use crate::writer::{output_stem, Rasterizer};

const SOURCE_EXTENSION: &str = "xml";

/// Discovery plus fan-out over a bounded worker pool. Each source file is an
/// independent unit of work; nothing is shared between units except the
/// read-only options.
pub struct BatchConverter {
    epsg: u32,
    workers: usize,
}

/// Per-batch results, correlated by source path. A failed unit never affects
/// its siblings.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Output files written, one per successful source.
    pub succeeded: Vec<PathBuf>,
    /// Source path and failure for each unit that did not convert.
    pub failed: Vec<(PathBuf, ConvertError)>,
}

impl BatchConverter {
    /// `epsg` identifies the spatial reference stamped on every output.
    /// Workers default to hardware concurrency.
    pub fn new(epsg: u32) -> Self {
        Self { epsg, workers: 0 }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Enumerates source documents under `source_dir`, flat or recursive.
    /// Filesystem order is platform-dependent, so the result is sorted.
    pub fn discover(source_dir: &Path, recursive: bool) -> Result<Vec<PathBuf>, ConvertError> {
        let mut sources = Vec::new();
        collect_sources(source_dir, recursive, &mut sources)?;
        sources.sort();
        Ok(sources)
    }

    /// Converts every source into `target_dir`, blocking until all units
    /// finished. Units run in no particular order; the outcome records each
    /// failure without cancelling the rest.
    ///
    /// Output names are derived from the source stem, so two sources with
    /// the same stem (possible with recursive discovery) would fight over
    /// one output file. Only the first such source is converted; the rest
    /// fail with `DuplicateOutput`.
    pub fn run(&self, sources: &[PathBuf], target_dir: &Path) -> Result<BatchOutcome, ConvertError> {
        fs::create_dir_all(target_dir)?;

        let mut outcome = BatchOutcome::default();
        let mut seen_stems = HashSet::new();
        let mut unique: Vec<&PathBuf> = Vec::with_capacity(sources.len());
        for source in sources {
            let stem = output_stem(source).to_string();
            if seen_stems.insert(stem.clone()) {
                unique.push(source);
            } else {
                outcome
                    .failed
                    .push((source.clone(), ConvertError::DuplicateOutput(stem)));
            }
        }

        let pool = ThreadPoolBuilder::new().num_threads(self.workers).build()?;
        let rasterizer = Rasterizer::new(self.epsg);

        let results: Vec<(PathBuf, Result<PathBuf, ConvertError>)> = pool.install(|| {
            unique
                .par_iter()
                .map(|source| {
                    let result = convert_one(&rasterizer, source, target_dir);
                    ((*source).clone(), result)
                })
                .collect()
        });

        for (source, result) in results {
            match result {
                Ok(output) => outcome.succeeded.push(output),
                Err(e) => outcome.failed.push((source, e)),
            }
        }
        Ok(outcome)
    }
}

fn convert_one(
    rasterizer: &Rasterizer,
    source: &Path,
    target_dir: &Path,
) -> Result<PathBuf, ConvertError> {
    info!("Processing file: {:?}", source);
    let doc = GridDocument::open(source)?;
    let output = rasterizer.convert(&doc, target_dir)?;
    info!("Written GeoTIFF: {:?}", output);
    Ok(output)
}

fn collect_sources(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if recursive {
                collect_sources(&path, true, out)?;
            }
        } else if path.extension().and_then(|s| s.to_str()) == Some(SOURCE_EXTENSION) {
            out.push(path);
        }
    }
    Ok(())
}
