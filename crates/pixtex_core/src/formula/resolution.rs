//! Maps the editor font size to a raster resolution for the converter.

use crate::formula::RenderError;

/// Baseline display density assumed by the TeX toolchain, in dots per inch.
const BASE_DPI: f64 = 72.0;

/// Glyph size in points at which the rendered image matches the buffer
/// font 1:1 at the baseline density.
const REFERENCE_GLYPH_PT: f64 = 10.0;

/// Estimates the dvipng resolution matching a font of `font_px` pixel height.
///
/// Returns [`RenderError::HostMetrics`] when the reported height is not a
/// positive finite number, e.g. a GUI-less Vim that cannot measure its font.
pub fn estimate_resolution(font_px: f64) -> Result<u32, RenderError> {
    if !font_px.is_finite() || font_px <= 0.0 {
        return Err(RenderError::HostMetrics { reported: font_px });
    }

    // Two chained ratios: pixels the reference glyph occupies at the
    // baseline density, then the scale factor from there to `font_px`.
    // Folding the constants into one ratio rounds differently for some
    // inputs, so the intermediate step is kept.
    let reference_glyph_px = BASE_DPI * (REFERENCE_GLYPH_PT / BASE_DPI);
    let resolution = BASE_DPI * (font_px / reference_glyph_px);

    Ok(resolution.ceil() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_font_sizes() {
        assert_eq!(estimate_resolution(20.0).unwrap(), 144);
        assert_eq!(estimate_resolution(10.0).unwrap(), 72);
        assert_eq!(estimate_resolution(16.0).unwrap(), 116);
        // Fractional heights round up.
        assert_eq!(estimate_resolution(13.5).unwrap(), 98);
    }

    #[test]
    fn test_resolution_grows_with_font_size() {
        let resolutions: Vec<u32> = [8.0, 11.0, 14.0, 20.0, 28.0, 40.0]
            .iter()
            .map(|&px| estimate_resolution(px).unwrap())
            .collect();
        let mut sorted = resolutions.clone();
        sorted.sort_unstable();
        assert_eq!(resolutions, sorted);
    }

    #[test]
    fn test_unusable_host_metrics() {
        assert!(matches!(
            estimate_resolution(0.0),
            Err(RenderError::HostMetrics { .. })
        ));
        assert!(matches!(
            estimate_resolution(-12.0),
            Err(RenderError::HostMetrics { .. })
        ));
        assert!(matches!(
            estimate_resolution(f64::NAN),
            Err(RenderError::HostMetrics { .. })
        ));
        assert!(matches!(
            estimate_resolution(f64::INFINITY),
            Err(RenderError::HostMetrics { .. })
        ));
    }
}
