//! Masked similarity between a split image and a frame
//!
//! Both metrics weight every colour channel of a pixel by the same mask value
//! `w = alpha / 255` and ignore the frame's own alpha. Results are clamped to
//! `[0, 1]`, with 1 meaning identical under the mask.

use image::{GrayImage, RgbaImage};

use crate::config::SimilarityMetric;
use crate::error::{Result, SplitterError};
use crate::frame::Frame;
use crate::splits::SplitImage;

/// Score `frame` against a split image with the chosen metric
pub fn similarity(metric: SimilarityMetric, image: &SplitImage, frame: &Frame) -> Result<f64> {
    match metric {
        SimilarityMetric::Correlation => masked_correlation(image.pixels(), image.mask(), frame.image()),
        SimilarityMetric::L2 => masked_l2(image.pixels(), image.mask(), frame.image()),
    }
}

/// `Σ w²·T·I / sqrt(Σ w²·T² · Σ w²·I²)`
///
/// A template with nothing visible under its mask cannot be scored and is an
/// error. A frame with no energy under the mask scores 0.
pub fn masked_correlation(template: &RgbaImage, mask: &GrayImage, frame: &RgbaImage) -> Result<f64> {
    check_dimensions(template, mask, frame)?;

    let mut cross = 0.0f64;
    let mut template_energy = 0.0f64;
    let mut frame_energy = 0.0f64;

    for ((t, m), f) in template.pixels().zip(mask.pixels()).zip(frame.pixels()) {
        let w = m.0[0] as f64 / 255.0;
        let w2 = w * w;
        if w2 == 0.0 {
            continue;
        }
        for c in 0..3 {
            let tv = t.0[c] as f64;
            let fv = f.0[c] as f64;
            cross += w2 * tv * fv;
            template_energy += w2 * tv * tv;
            frame_energy += w2 * fv * fv;
        }
    }

    if template_energy == 0.0 {
        return Err(SplitterError::SimilarityCompute(
            "split image has no signal under its mask".to_string(),
        ));
    }
    if frame_energy == 0.0 {
        return Ok(0.0);
    }

    Ok((cross / (template_energy * frame_energy).sqrt()).clamp(0.0, 1.0))
}

/// `1 - sqrt(Σ w²·(T-I)²) / sqrt(Σ w²·255²)` over the three colour channels
pub fn masked_l2(template: &RgbaImage, mask: &GrayImage, frame: &RgbaImage) -> Result<f64> {
    check_dimensions(template, mask, frame)?;

    let mut distance = 0.0f64;
    let mut max_distance = 0.0f64;

    for ((t, m), f) in template.pixels().zip(mask.pixels()).zip(frame.pixels()) {
        let w = m.0[0] as f64 / 255.0;
        let w2 = w * w;
        if w2 == 0.0 {
            continue;
        }
        for c in 0..3 {
            let diff = t.0[c] as f64 - f.0[c] as f64;
            distance += w2 * diff * diff;
            max_distance += w2 * 255.0 * 255.0;
        }
    }

    if max_distance == 0.0 {
        return Err(SplitterError::SimilarityCompute(
            "split image is fully transparent".to_string(),
        ));
    }

    Ok((1.0 - (distance / max_distance).sqrt()).clamp(0.0, 1.0))
}

fn check_dimensions(template: &RgbaImage, mask: &GrayImage, frame: &RgbaImage) -> Result<()> {
    if template.dimensions() != frame.dimensions() || template.dimensions() != mask.dimensions() {
        return Err(SplitterError::SimilarityCompute(format!(
            "size mismatch: split image {:?}, mask {:?}, frame {:?}",
            template.dimensions(),
            mask.dimensions(),
            frame.dimensions()
        )));
    }
    Ok(())
}
