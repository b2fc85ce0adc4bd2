/// Reference big-map matcher based on zero-mean normalised cross-correlation.
///
/// The reference map is kept as a halving pyramid. A fragment is searched
/// exhaustively on the coarsest level where it still keeps some texture, with a
/// bounded number of sampled points, then the hit is refined at full
/// resolution in a small window. The pyramid is built once and only read
/// afterwards, so one matcher can serve many threads.
use std::path::Path;

use image::imageops::{self, FilterType};
use image::GrayImage;

use crate::errors::{MapFixError, MapFixResult};
use crate::recognition::matcher::BigMapMatcher;
use crate::recognition::types::ImageCoordinate;

/// Smallest scaled fragment side that still gives a meaningful correlation.
const MIN_COARSE_SIDE: u32 = 8;
/// Upper bound on sampled fragment points per axis in any pass.
const SAMPLES_PER_AXIS: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatcherOptions {
    /// Best correlation below this is reported as "not found".
    pub min_score: f64,
    /// Longest side of the coarsest pyramid level.
    pub coarse_max_dimension: u32,
}

impl Default for TemplateMatcherOptions {
    fn default() -> Self {
        Self {
            min_score: 0.6,
            coarse_max_dimension: 256,
        }
    }
}

struct Level {
    image: GrayImage,
    /// Level width over full-resolution width.
    scale: f64,
}

pub struct TemplateMatcher {
    /// Full resolution first, each next level half the size of the previous.
    levels: Vec<Level>,
    options: TemplateMatcherOptions,
}

impl TemplateMatcher {
    pub fn new(reference: GrayImage, options: TemplateMatcherOptions) -> MapFixResult<Self> {
        let (w, h) = reference.dimensions();
        if w == 0 || h == 0 {
            return Err(MapFixError::Matcher("reference map is empty".into()));
        }

        let target = options.coarse_max_dimension.max(1);
        let mut levels = vec![Level {
            image: reference,
            scale: 1.0,
        }];
        loop {
            let prev = &levels[levels.len() - 1].image;
            let (pw, ph) = prev.dimensions();
            if pw.max(ph) <= target || pw.min(ph) < 2 {
                break;
            }
            let (nw, nh) = (pw.div_ceil(2), ph.div_ceil(2));
            let image = imageops::resize(prev, nw, nh, FilterType::Triangle);
            levels.push(Level {
                image,
                scale: nw as f64 / w as f64,
            });
        }

        tracing::debug!(width = w, height = h, levels = levels.len(), "reference map prepared");
        Ok(Self { levels, options })
    }

    /// Load and convert a reference map image from disk.
    pub fn open(path: impl AsRef<Path>, options: TemplateMatcherOptions) -> MapFixResult<Self> {
        let path = path.as_ref();
        let reference = image::ImageReader::open(path)?
            .with_guessed_format()?
            .decode()?
            .into_luma8();
        tracing::info!(path = %path.display(), "reference map loaded");
        Self::new(reference, options)
    }

    fn reference(&self) -> &GrayImage {
        &self.levels[0].image
    }

    pub fn reference_size(&self) -> (u32, u32) {
        self.reference().dimensions()
    }

    /// Coarsest level on which the fragment keeps at least `MIN_COARSE_SIDE` pixels.
    fn level_for(&self, fw: u32, fh: u32) -> &Level {
        self.levels
            .iter()
            .rev()
            .find(|level| scaled(fw.min(fh), level.scale) >= MIN_COARSE_SIDE)
            .unwrap_or(&self.levels[0])
    }

    /// Best position in full-resolution pixels, with the scale it was found at.
    fn coarse_search(&self, fragment: &GrayImage) -> Option<(u32, u32, f64, f64)> {
        let (fw, fh) = fragment.dimensions();
        let level = self.level_for(fw, fh);

        let small;
        let template = if level.scale < 1.0 {
            let (cw, ch) = (scaled(fw, level.scale).max(1), scaled(fh, level.scale).max(1));
            small = imageops::resize(fragment, cw, ch, FilterType::Triangle);
            &small
        } else {
            fragment
        };

        let probe = Probe::sample(template, sample_step(template))?;
        let (x, y, score) =
            best_in_window(&level.image, &probe, (0, 0), level.image.dimensions())?;
        let fx = (x as f64 / level.scale).round() as u32;
        let fy = (y as f64 / level.scale).round() as u32;
        Some((fx, fy, score, level.scale))
    }

    fn refine(&self, fragment: &GrayImage, x: u32, y: u32, scale: f64) -> Option<(u32, u32, f64)> {
        let (fw, fh) = fragment.dimensions();
        let probe = Probe::sample(fragment, sample_step(fragment))?;

        let radius = (2.0 / scale).ceil() as u32;
        let (rw, rh) = self.reference_size();
        let max_x = rw - fw;
        let max_y = rh - fh;
        let from = (
            x.saturating_sub(radius).min(max_x),
            y.saturating_sub(radius).min(max_y),
        );
        let to = ((x + radius).min(max_x) + fw, (y + radius).min(max_y) + fh);
        best_in_window(self.reference(), &probe, from, to)
    }
}

fn scaled(side: u32, scale: f64) -> u32 {
    (side as f64 * scale).round() as u32
}

/// Sampling stride keeping at most `SAMPLES_PER_AXIS` points per axis.
fn sample_step(template: &GrayImage) -> u32 {
    let (w, h) = template.dimensions();
    w.max(h).div_ceil(SAMPLES_PER_AXIS).max(1)
}

impl BigMapMatcher for TemplateMatcher {
    fn match_position(&self, fragment: &GrayImage) -> MapFixResult<ImageCoordinate> {
        let (fw, fh) = fragment.dimensions();
        let (rw, rh) = self.reference_size();
        if fw == 0 || fh == 0 || fw > rw || fh > rh {
            tracing::debug!(fw, fh, rw, rh, "fragment does not fit on reference map");
            return Ok(ImageCoordinate::SENTINEL);
        }

        let Some((cx, cy, coarse_score, scale)) = self.coarse_search(fragment) else {
            tracing::debug!("fragment has no texture to correlate");
            return Ok(ImageCoordinate::SENTINEL);
        };

        let (x, y, score) = if scale < 1.0 {
            self.refine(fragment, cx, cy, scale)
                .unwrap_or((cx, cy, coarse_score))
        } else {
            (cx, cy, coarse_score)
        };

        tracing::debug!(x, y, score, coarse_score, scale, "best template position");
        if score < self.options.min_score {
            return Ok(ImageCoordinate::SENTINEL);
        }

        Ok(ImageCoordinate::new(
            x as f64 + fw as f64 / 2.0,
            y as f64 + fh as f64 / 2.0,
        ))
    }
}

/// Sparse, mean-centred template samples.
struct Probe {
    points: Vec<(u32, u32, f64)>,
    norm: f64,
    width: u32,
    height: u32,
}

impl Probe {
    /// `None` when the sampled template is flat.
    fn sample(template: &GrayImage, step: u32) -> Option<Self> {
        let (width, height) = template.dimensions();
        let mut raw = Vec::new();
        for y in (0..height).step_by(step as usize) {
            for x in (0..width).step_by(step as usize) {
                raw.push((x, y, template.get_pixel(x, y)[0] as f64));
            }
        }
        let n = raw.len() as f64;
        let mean = raw.iter().map(|p| p.2).sum::<f64>() / n;
        let points: Vec<_> = raw.into_iter().map(|(x, y, v)| (x, y, v - mean)).collect();
        let norm = points.iter().map(|p| p.2 * p.2).sum::<f64>().sqrt();
        if norm < 1e-9 {
            return None;
        }
        Some(Self {
            points,
            norm,
            width,
            height,
        })
    }

    /// ZNCC of the probe placed at `(ox, oy)`; flat reference windows score 0.
    fn score(&self, reference: &GrayImage, ox: u32, oy: u32) -> f64 {
        let n = self.points.len() as f64;
        let (mut sum, mut sum_sq, mut cross) = (0.0, 0.0, 0.0);
        for &(x, y, t) in &self.points {
            let r = reference.get_pixel(ox + x, oy + y)[0] as f64;
            sum += r;
            sum_sq += r * r;
            cross += r * t;
        }
        let var = sum_sq - sum * sum / n;
        if var <= 1e-9 {
            return 0.0;
        }
        cross / (var.sqrt() * self.norm)
    }
}

/// Best placement whose top-left lies in `from..` and whose extent stays below `to`.
fn best_in_window(
    reference: &GrayImage,
    probe: &Probe,
    from: (u32, u32),
    to: (u32, u32),
) -> Option<(u32, u32, f64)> {
    let (rw, rh) = reference.dimensions();
    let to = (to.0.min(rw), to.1.min(rh));
    if probe.width > to.0 || probe.height > to.1 {
        return None;
    }
    let last_x = to.0 - probe.width;
    let last_y = to.1 - probe.height;

    let mut best: Option<(u32, u32, f64)> = None;
    for y in from.1..=last_y {
        for x in from.0..=last_x {
            let s = probe.score(reference, x, y);
            if best.map_or(true, |(_, _, b)| s > b) {
                best = Some((x, y, s));
            }
        }
    }
    best
}
