//! Overlay placement and opacity for watermarked encodes.

use crate::modules::conversion::dto::WatermarkConfig;

/// Corner margin: 2% of the main video width, on both axes.
const MARGIN: &str = "W*0.02";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatermarkPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    Center,
    #[default]
    BottomRight,
}

impl WatermarkPosition {
    /// Unrecognized labels fall back to bottom-right.
    pub fn from_label(label: &str) -> Self {
        match label {
            "top-left" => Self::TopLeft,
            "top-right" => Self::TopRight,
            "bottom-left" => Self::BottomLeft,
            "center" => Self::Center,
            _ => Self::BottomRight,
        }
    }

    /// `x:y` arguments of the ffmpeg `overlay` filter.
    pub fn overlay_expr(self) -> String {
        match self {
            Self::TopLeft => format!("{MARGIN}:{MARGIN}"),
            Self::TopRight => format!("W-w-{MARGIN}:{MARGIN}"),
            Self::BottomLeft => format!("{MARGIN}:H-h-{MARGIN}"),
            Self::Center => "(W-w)/2:(H-h)/2".to_string(),
            Self::BottomRight => format!("W-w-{MARGIN}:H-h-{MARGIN}"),
        }
    }
}

/// Maps an opacity percentage onto an alpha in `[0, 1]`.
pub fn alpha(opacity: f64) -> f64 {
    if opacity.is_nan() {
        return 1.0;
    }
    (opacity / 100.0).clamp(0.0, 1.0)
}

/// Resolved watermark parameters for one encode.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkFilter {
    pub position: WatermarkPosition,
    /// Watermark width as a percentage of the main video width.
    pub size_percent: u32,
    pub alpha: f64,
}

impl WatermarkFilter {
    pub fn from_config(config: &WatermarkConfig) -> Self {
        Self {
            position: WatermarkPosition::from_label(&config.position),
            size_percent: config.size.clamp(1, 100),
            alpha: alpha(config.opacity),
        }
    }

    /// Complex filter graph compositing input 1 over input 0 scaled with
    /// `scale`. The composited stream is labeled `[outv]`.
    pub fn graph(&self, scale: &str) -> String {
        format!(
            "[0:v]scale={scale}[base];\
             [1:v]format=rgba,colorchannelmixer=aa={alpha:.2}[wmraw];\
             [wmraw][base]scale2ref=w=main_w*{size}/100:h=ow/a[wm][ref];\
             [ref][wm]overlay={pos}:eof_action=pass[outv]",
            alpha = self.alpha,
            size = self.size_percent,
            pos = self.position.overlay_expr(),
        )
    }
}
