use std::fs;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use rayon::iter::{ParallelBridge, ParallelIterator};

use crate::core::{Environment, Hash32};
use crate::paths::Paths;
use crate::task::{Action, OutputClaim};

/// Re-encodes raster images into the output image directory, keeping names
/// and formats. Optimized artifacts are cached by source content hash, so an
/// unchanged image costs one hash and one copy on subsequent builds. Formats
/// the optimizer does not handle pass through verbatim.
pub struct OptimizeImages {
    sources: String,
    base: Utf8PathBuf,
    out: Utf8PathBuf,
    cache: Utf8PathBuf,
}

impl OptimizeImages {
    pub fn new(paths: &Paths) -> Self {
        Self {
            sources: paths.images.sources.clone(),
            base: paths.images.dir.clone(),
            out: paths.images_out(),
            cache: paths.image_cache(),
        }
    }

    fn process(&self, path: &Utf8Path, verbose: bool) -> anyhow::Result<()> {
        let buffer = fs::read(path)?;
        let hash = Hash32::hash(&buffer);

        let rel = path.strip_prefix(&self.base).unwrap_or(path);
        let target = self.out.join(rel);
        let cached = self.cache.join(hash.to_hex()).with_extension(
            path.extension().unwrap_or_default(),
        );

        // A cache hit means the optimization work is already done.
        if !cached.exists() {
            let optimized = optimize(&buffer, path.extension());

            if verbose {
                tracing::debug!("{path}: {} -> {} bytes", buffer.len(), optimized.len());
            }

            fs::create_dir_all(&self.cache)?;
            fs::write(&cached, optimized)?;
        }

        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::copy(&cached, &target)?;

        Ok(())
    }
}

impl Action for OptimizeImages {
    fn run(&self, env: &Environment) -> anyhow::Result<()> {
        let s = Instant::now();

        let optimized = glob::glob(&self.sources)?
            .par_bridge()
            .map(|entry| -> anyhow::Result<usize> {
                let path = Utf8PathBuf::try_from(entry?)?;
                if path.is_dir() {
                    return Ok(0);
                }
                self.process(&path, env.verbose)?;
                Ok(1)
            })
            .try_reduce(|| 0, |a, b| Ok(a + b))?;

        tracing::info!("optimized {} images {}", optimized, crate::io::as_overhead(s));
        Ok(())
    }

    fn claims(&self) -> Vec<OutputClaim> {
        vec![OutputClaim::tree(self.out.clone())]
    }
}

/// Re-encode the formats we can improve; keep the original bytes whenever
/// re-encoding does not help or the format is unknown.
fn optimize(buffer: &[u8], ext: Option<&str>) -> Vec<u8> {
    let reencoded = match ext {
        Some("png") => reencode_png(buffer),
        Some("jpg") | Some("jpeg") => reencode_jpeg(buffer),
        _ => None,
    };

    match reencoded {
        Some(out) if out.len() < buffer.len() => out,
        _ => buffer.to_vec(),
    }
}

fn reencode_png(buffer: &[u8]) -> Option<Vec<u8>> {
    use image::codecs::png::{CompressionType, FilterType, PngEncoder};
    use image::ImageEncoder;

    let img = image::load_from_memory(buffer).ok()?;
    let (w, h) = (img.width(), img.height());

    let mut out = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive);
    encoder
        .write_image(&img.to_rgba8(), w, h, image::ExtendedColorType::Rgba8)
        .ok()?;

    Some(out)
}

fn reencode_jpeg(buffer: &[u8]) -> Option<Vec<u8>> {
    use image::codecs::jpeg::JpegEncoder;
    use image::ImageEncoder;

    let img = image::load_from_memory(buffer).ok()?;
    let (w, h) = (img.width(), img.height());

    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, 85);
    encoder
        .write_image(&img.to_rgb8(), w, h, image::ExtendedColorType::Rgb8)
        .ok()?;

    Some(out)
}
