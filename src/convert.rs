//! Frame to ASCII conversion.
//!
//! A [`RawFrame`] is reduced to brightness, area-resampled to the character
//! grid, contrast-stretched per frame into an [`IntensityGrid`], and finally
//! mapped onto [`CHARACTER_RAMP`] to give a [`TextFrame`].

use std::fmt;

use image::{GrayImage, RgbImage};

use crate::error::{PlayerError, Result};

/// Characters ordered from darkest to lightest.
pub const CHARACTER_RAMP: &str = "@%#*+=-:. ";

const RAMP: &[u8] = CHARACTER_RAMP.as_bytes();

/// One decoded video frame as RGB samples.
#[derive(Debug, Clone)]
pub struct RawFrame {
    image: RgbImage,
}

impl RawFrame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// Wrap packed `rgb24` bytes. Returns `None` when `data` does not hold
    /// exactly `width * height * 3` bytes.
    pub fn from_rgb24(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(Self::new)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}

/// Brightness samples resampled to the output grid and stretched so the
/// darkest sample is 0 and the brightest is 255.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntensityGrid {
    width: u32,
    height: u32,
    samples: Vec<u8>,
}

impl IntensityGrid {
    /// Build the normalized grid for `frame` at `width x height` samples.
    pub fn from_frame(frame: &RawFrame, width: u32, height: u32) -> Result<Self> {
        check_dimensions(width, height)?;
        if frame.width() == 0 || frame.height() == 0 {
            return Err(PlayerError::InvalidArgument(
                "source frame has no pixels".to_string(),
            ));
        }

        let gray = image::imageops::grayscale(frame.image());
        let mut samples = area_resample(&gray, width, height);
        normalize(&mut samples);

        Ok(Self {
            width,
            height,
            samples,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Samples in row-major order.
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.samples
            .get((y * self.width + x) as usize)
            .copied()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.samples.chunks_exact(self.width as usize)
    }
}

/// One frame of ASCII art, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFrame {
    rows: Vec<String>,
}

impl TextFrame {
    /// Map every sample of `grid` onto the character ramp.
    pub fn from_intensity(grid: &IntensityGrid) -> Self {
        let rows = grid
            .rows()
            .map(|row| row.iter().map(|&p| ramp_char(p)).collect::<String>())
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.first().map(|r| r.len()).unwrap_or(0)
    }
}

impl fmt::Display for TextFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            f.write_str(row)?;
        }
        Ok(())
    }
}

/// Convert one decoded frame into a `width x height` grid of characters.
///
/// # Example
///
/// ```
/// use asciireel::convert::{convert, RawFrame};
///
/// let frame = RawFrame::from_rgb24(2, 1, vec![0, 0, 0, 255, 255, 255]).unwrap();
/// let text = convert(&frame, 2, 1).unwrap();
/// assert_eq!(text.rows(), ["@ "]);
/// ```
pub fn convert(frame: &RawFrame, width: u32, height: u32) -> Result<TextFrame> {
    let grid = IntensityGrid::from_frame(frame, width, height)?;
    Ok(TextFrame::from_intensity(&grid))
}

/// Ramp character for a normalized brightness value.
pub fn ramp_char(value: u8) -> char {
    let last = RAMP.len() - 1;
    let idx = (value as usize * last / 255).min(last);
    RAMP[idx] as char
}

fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(PlayerError::InvalidArgument(format!(
            "output dimensions must be positive, got {}x{}",
            width, height
        )));
    }
    Ok(())
}

/// Source pixels covering each output index along one axis, with the
/// fraction of each pixel that falls inside the output cell.
fn axis_coverage(src: u32, dst: u32) -> Vec<Vec<(usize, f64)>> {
    let scale = src as f64 / dst as f64;
    (0..dst)
        .map(|d| {
            let start = d as f64 * scale;
            let end = (start + scale).min(src as f64);
            let first = start.floor() as u32;
            let last = (end.ceil() as u32).min(src);
            (first..last)
                .filter_map(|s| {
                    let lo = start.max(s as f64);
                    let hi = end.min(s as f64 + 1.0);
                    let w = hi - lo;
                    (w > 0.0).then_some((s as usize, w))
                })
                .collect()
        })
        .collect()
}

/// Area-averaging resize. Each output sample is the coverage-weighted mean of
/// the source pixels under its cell, for both shrinking and enlarging.
fn area_resample(gray: &GrayImage, width: u32, height: u32) -> Vec<u8> {
    let cols = axis_coverage(gray.width(), width);
    let rows = axis_coverage(gray.height(), height);
    let src_w = gray.width() as usize;
    let pixels = gray.as_raw();

    let mut out = Vec::with_capacity(width as usize * height as usize);
    for row in &rows {
        for col in &cols {
            let mut sum = 0.0;
            let mut total = 0.0;
            for &(sy, wy) in row {
                let line = sy * src_w;
                for &(sx, wx) in col {
                    let w = wy * wx;
                    sum += pixels[line + sx] as f64 * w;
                    total += w;
                }
            }
            let value = if total > 0.0 { sum / total } else { 0.0 };
            out.push(value.round().clamp(0.0, 255.0) as u8);
        }
    }
    out
}

/// Min-max stretch to [0, 255]. A uniform grid maps entirely to 0.
fn normalize(samples: &mut [u8]) {
    let (Some(&min), Some(&max)) = (samples.iter().min(), samples.iter().max()) else {
        return;
    };
    if min == max {
        samples.fill(0);
        return;
    }
    let range = (max - min) as u32;
    for p in samples.iter_mut() {
        let shifted = (*p - min) as u32;
        *p = ((shifted * 255 + range / 2) / range) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> RawFrame {
        let img = RgbImage::from_fn(width, height, |x, y| {
            let v = ((x + y) * 255 / (width + height - 2).max(1)) as u8;
            image::Rgb([v, v, v])
        });
        RawFrame::new(img)
    }

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> RawFrame {
        RawFrame::new(RgbImage::from_pixel(width, height, image::Rgb(rgb)))
    }

    #[test]
    fn test_output_has_requested_shape() {
        let frame = gradient(64, 48);
        for (w, h) in [(1, 1), (7, 3), (40, 12), (120, 40), (200, 90)] {
            let text = convert(&frame, w, h).unwrap();
            assert_eq!(text.height(), h as usize);
            for row in text.rows() {
                assert_eq!(row.chars().count(), w as usize);
                assert!(row.chars().all(|c| CHARACTER_RAMP.contains(c)));
            }
        }
    }

    #[test]
    fn test_extremes_hit_both_ends_of_ramp() {
        let text = convert(&gradient(50, 30), 25, 10).unwrap();
        let all: String = text.rows().concat();
        assert!(all.contains('@'));
        assert!(all.contains(' '));
    }

    #[test]
    fn test_normalization_spans_full_range() {
        // Low-contrast input still stretches to 0..=255.
        let img = RgbImage::from_fn(10, 10, |x, _| {
            let v = 100 + (x as u8) * 2;
            image::Rgb([v, v, v])
        });
        let grid = IntensityGrid::from_frame(&RawFrame::new(img), 10, 10).unwrap();
        assert_eq!(grid.samples().iter().min(), Some(&0));
        assert_eq!(grid.samples().iter().max(), Some(&255));
    }

    #[test]
    fn test_uniform_frame_is_all_darkest() {
        for rgb in [[0, 0, 0], [128, 128, 128], [255, 255, 255], [10, 200, 30]] {
            let text = convert(&solid(33, 17, rgb), 12, 5).unwrap();
            for row in text.rows() {
                assert_eq!(row, &"@".repeat(12));
            }
        }
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let frame = gradient(8, 8);
        assert!(matches!(
            convert(&frame, 0, 4),
            Err(PlayerError::InvalidArgument(_))
        ));
        assert!(matches!(
            convert(&frame, 4, 0),
            Err(PlayerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_empty_source_frame_rejected() {
        let frame = RawFrame::new(RgbImage::new(0, 0));
        assert!(matches!(
            convert(&frame, 4, 4),
            Err(PlayerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_rows_keep_source_order() {
        // Top half white, bottom half black.
        let img = RgbImage::from_fn(4, 4, |_, y| {
            if y < 2 {
                image::Rgb([255, 255, 255])
            } else {
                image::Rgb([0, 0, 0])
            }
        });
        let text = convert(&RawFrame::new(img), 4, 2).unwrap();
        assert_eq!(text.rows(), ["    ", "@@@@"]);
    }

    #[test]
    fn test_area_resample_averages_blocks() {
        // 4x1 -> 2x1 averages neighbouring pairs.
        let gray = GrayImage::from_raw(4, 1, vec![0, 100, 200, 250]).unwrap();
        assert_eq!(area_resample(&gray, 2, 1), vec![50, 225]);
    }

    #[test]
    fn test_area_resample_enlarges_without_gaps() {
        let gray = GrayImage::from_raw(2, 1, vec![10, 90]).unwrap();
        assert_eq!(area_resample(&gray, 4, 1), vec![10, 10, 90, 90]);
        // Odd ratio: the middle cell straddles both pixels.
        assert_eq!(area_resample(&gray, 3, 1), vec![10, 50, 90]);
    }

    #[test]
    fn test_area_resample_is_not_nearest_neighbour() {
        // Alternating columns would alias to a single value under skipping.
        let gray = GrayImage::from_fn(8, 1, |x, _| image::Luma([if x % 2 == 0 { 0 } else { 200 }]));
        assert_eq!(area_resample(&gray, 4, 1), vec![100; 4]);
    }

    #[test]
    fn test_ramp_char_bounds() {
        assert_eq!(ramp_char(0), '@');
        assert_eq!(ramp_char(255), ' ');
        assert_eq!(ramp_char(28), '@');
        assert_eq!(ramp_char(29), '%');
        assert_eq!(ramp_char(254), '.');
    }

    #[test]
    fn test_display_joins_rows() {
        let frame = RawFrame::from_rgb24(2, 2, vec![0, 0, 0, 255, 255, 255, 255, 255, 255, 0, 0, 0])
            .unwrap();
        let text = convert(&frame, 2, 2).unwrap();
        assert_eq!(text.to_string(), "@ \n @");
    }
}
