//! Registered conversion chains and per-call converter command building.

use crate::formula::{estimate_resolution, RenderError};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// One registered image conversion chain.
///
/// The templates use `%`-placeholders substituted at render time:
///
/// - `%o`: scratch directory
/// - `%f`: input file of the stage
/// - `%O`: final image file
/// - `%B`: output base path, extension stripped
/// - `%D`: raster resolution in dpi
#[derive(Debug, Clone)]
pub struct ConvertProcess {
    /// Executables required on `$PATH`, in pipeline order.
    pub programs: &'static [&'static str],
    /// Extension of the compiler stage output.
    pub image_input_type: &'static str,
    /// Extension of the final image.
    pub image_output_type: &'static str,
    /// Scale applied by the host when sizing the displayed image.
    pub image_size_adjust: f64,
    /// Compiles the TeX snippet into `image_input_type`.
    pub compiler_template: &'static str,
    /// Converts the compiler output into the final image.
    pub converter_template: &'static str,
}

static CONVERT_PROCESSES: Lazy<HashMap<&'static str, ConvertProcess>> = Lazy::new(|| {
    HashMap::from([(
        "dvipng",
        ConvertProcess {
            programs: &["latex", "dvipng", "convert"],
            image_input_type: "dvi",
            image_output_type: "png",
            image_size_adjust: 1.0,
            compiler_template: "latex -interaction nonstopmode -output-directory %o %f",
            converter_template: "dvipng -D %D -T tight -bg Transparent -o %B-page1.png %f \
                                 && convert -trim %B-page1.png %O && rm -f %B-page1.png",
        },
    )])
});

/// Looks up a conversion chain registered under `name`.
pub fn convert_process(name: &str) -> Result<&'static ConvertProcess, RenderError> {
    CONVERT_PROCESSES
        .get(name)
        .ok_or_else(|| RenderError::UnknownProcess(name.to_string()))
}

/// Substitutes the resolution for the single `%D` in `converter_template`,
/// leaving every other byte untouched.
pub fn build_converter_command(converter_template: &str, resolution: u32) -> String {
    converter_template.replacen("%D", &resolution.to_string(), 1)
}

/// Converter configuration captured for a single render call.
///
/// Rebuilt on every call so that the substituted resolution always reflects
/// the font metrics of the moment.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub process: &'static ConvertProcess,
    pub resolution: u32,
    pub converter_command: String,
}

impl RendererConfig {
    pub fn new(process: &'static ConvertProcess, font_px: f64) -> Result<Self, RenderError> {
        let resolution = estimate_resolution(font_px)?;
        Ok(Self {
            process,
            resolution,
            converter_command: build_converter_command(process.converter_template, resolution),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dvipng_process_registered() {
        let process = convert_process("dvipng").unwrap();
        assert_eq!(process.programs, ["latex", "dvipng", "convert"]);
        assert_eq!(process.image_input_type, "dvi");
        assert_eq!(process.image_output_type, "png");
        assert_eq!(process.image_size_adjust, 1.0);
    }

    #[test]
    fn test_unknown_process_is_an_error() {
        assert!(matches!(
            convert_process("dvisvgm"),
            Err(RenderError::UnknownProcess(name)) if name == "dvisvgm"
        ));
    }

    #[test]
    fn test_converter_command_substitutes_resolution_only() {
        let process = convert_process("dvipng").unwrap();
        let command = build_converter_command(process.converter_template, 144);
        assert_eq!(
            command,
            "dvipng -D 144 -T tight -bg Transparent -o %B-page1.png %f \
             && convert -trim %B-page1.png %O && rm -f %B-page1.png"
        );
        // Every byte other than the substituted resolution is untouched.
        assert_eq!(command.replacen("144", "%D", 1), process.converter_template);
    }

    #[test]
    fn test_renderer_config_uses_estimated_resolution() {
        let process = convert_process("dvipng").unwrap();
        let config = RendererConfig::new(process, 20.0).unwrap();
        assert_eq!(config.resolution, 144);
        assert!(config.converter_command.contains("-D 144"));
        assert!(!config.converter_command.contains("%D"));
    }
}
