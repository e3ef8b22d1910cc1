// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Parameters that control a frame.

use lineopt_encoding::{
    DEFAULT_BINS, HistogramMode, MAX_BINS, MIN_BINS, Mat4, RenderConfig, SegmentError, Segments,
    pack_color,
};
use peniko::Color;
use peniko::color::palette;

/// Camera transforms, in the right handed convention of [`Mat4::look_at`].
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Camera {
    pub view: Mat4,
    /// Projection mapping visible depths to `[0, 1]`.
    pub projection: Mat4,
}

impl Camera {
    pub fn view_proj(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Parameters used in a single render that are configurable by the client.
#[derive(Copy, Clone, Debug)]
pub struct RenderParams {
    /// Dimensions of the rasterization target
    pub width: u32,
    pub height: u32,
    pub camera: Camera,
    /// Seconds since the previous frame, drives the temporal damping of the CDF.
    pub dt: f32,
    /// The color behind all lines.
    pub background: Color,
}

/// Parameters of the opacity solver.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OpacityParams {
    /// Penalty for fragments occluding important ones behind them.
    pub q: f32,
    /// Penalty for fragments behind important ones.
    pub r: f32,
    /// Exponent of the importance blend, larger values keep more of the unimportant lines.
    pub lambda: f32,
    pub smoothing_iterations: u32,
    /// Relaxation factor of one smoothing round.
    pub laplace_weight: f32,
    /// Step of the displayed alpha toward the solved alpha per frame.
    pub fade_rate: f32,
    /// Factor by which the opacity targets are computed at a lower resolution.
    pub resolution_downscale: u32,
}

impl Default for OpacityParams {
    fn default() -> Self {
        Self {
            q: 60.0,
            r: 500.0,
            lambda: 1.0,
            smoothing_iterations: 10,
            laplace_weight: 0.1,
            fade_rate: 0.1,
            resolution_downscale: 1,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StyleParams {
    /// Line width in pixels, including the halo.
    pub line_width: f32,
    /// Portion of the half width drawn with the line color, the rest is halo.
    pub halo_portion: f32,
    /// Color of lines when no colormap is applied.
    pub line_color: Color,
    pub halo_color: Color,
}

impl Default for StyleParams {
    fn default() -> Self {
        Self {
            line_width: 3.0,
            halo_portion: 0.7,
            line_color: Color::from_rgb8(255, 163, 0),
            halo_color: palette::css::BLACK,
        }
    }
}

/// Parameters of the histogram equalization.
#[derive(Clone, Debug, PartialEq)]
pub struct HistogramParams {
    pub mode: HistogramMode,
    /// Number of histogram bins, clamped to `MIN_BINS..=MAX_BINS`.
    pub bins: u32,
    /// Breakpoints of [`HistogramMode::SegmentedEqualization`].
    pub segments: Vec<f32>,
    /// Seconds after which a change of the CDF is halfway applied.
    ///
    /// Zero or less disables damping.
    pub damping_halflife: f32,
    /// Also compute the histogram and CDF of the equalized values, for display.
    pub normalized_diagnostics: bool,
}

impl Default for HistogramParams {
    fn default() -> Self {
        Self {
            mode: HistogramMode::Equalization,
            bins: DEFAULT_BINS,
            segments: Segments::default().as_slice().to_vec(),
            damping_halflife: 0.8,
            normalized_diagnostics: false,
        }
    }
}

/// Histogram parameters after validation.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct HistogramSettings {
    pub mode: HistogramMode,
    pub bins: u32,
    pub segments: Segments,
    pub damping_halflife: f32,
    pub normalized_diagnostics: bool,
}

impl HistogramSettings {
    pub fn new(params: &HistogramParams) -> Result<Self, SegmentError> {
        Ok(Self {
            mode: params.mode,
            bins: params.bins.clamp(MIN_BINS, MAX_BINS),
            segments: Segments::new(&params.segments)?,
            damping_halflife: params.damping_halflife,
            normalized_diagnostics: params.normalized_diagnostics,
        })
    }

    /// Weight of the previous damped CDF after `dt` seconds.
    pub fn damping(&self, dt: f32) -> f32 {
        if self.damping_halflife > 0.0 {
            (-dt.max(0.0) / self.damping_halflife).exp2()
        } else {
            0.0
        }
    }
}

impl Default for HistogramSettings {
    fn default() -> Self {
        Self::new(&HistogramParams::default()).expect("default segments are valid")
    }
}

/// All settings of the frame pipeline besides the per-frame [`RenderParams`].
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Settings {
    pub opacity: OpacityParams,
    pub style: StyleParams,
    pub histogram: HistogramSettings,
}

impl Settings {
    /// Sizes and configures a frame.
    pub fn render_config(
        &self,
        n_vertices: u32,
        n_control_points: u32,
        colormap_len: u32,
        params: &RenderParams,
    ) -> RenderConfig {
        let opacity = &self.opacity;
        let style = &self.style;
        let histogram = &self.histogram;
        let downscale = opacity.resolution_downscale.max(1);
        let mut config = RenderConfig::new(
            n_vertices,
            n_control_points,
            params.width,
            params.height,
            downscale,
            histogram.bins,
        );
        let half_width = 0.5 * style.line_width.max(0.0);
        let gpu = &mut config.gpu;
        gpu.view_proj = params.camera.view_proj().0;
        gpu.q = opacity.q;
        gpu.r = opacity.r;
        gpu.lambda = opacity.lambda;
        gpu.fade_rate = opacity.fade_rate.clamp(0.0, 1.0);
        gpu.half_width = half_width;
        gpu.low_half_width = half_width / downscale as f32;
        gpu.halo_portion = style.halo_portion.clamp(0.0, 1.0);
        gpu.histogram_mode = histogram.mode as u32;
        gpu.line_color = pack_color(style.line_color);
        gpu.halo_color = pack_color(style.halo_color);
        gpu.background = pack_color(params.background);
        gpu.colormap_len = colormap_len.max(1);
        gpu.damping = histogram.damping(params.dt);
        config
    }
}

/// The colormap used until one is set, a perceptually ordered ramp from dark blue
/// over green to yellow.
pub fn default_colormap() -> Vec<Color> {
    [
        (68, 1, 84),
        (59, 82, 139),
        (33, 145, 140),
        (94, 201, 98),
        (253, 231, 37),
    ]
    .into_iter()
    .map(|(r, g, b)| Color::from_rgb8(r, g, b))
    .collect()
}

/// Packs a colormap for upload, an empty colormap is replaced by the default one.
pub(crate) fn pack_colormap(colors: &[Color]) -> Vec<u32> {
    if colors.is_empty() {
        return pack_colormap(&default_colormap());
    }
    colors.iter().copied().map(pack_color).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damping_halves_after_halflife() {
        let settings = HistogramSettings::default();
        let k = settings.damping(settings.damping_halflife);
        assert!((k - 0.5).abs() < 1e-6);
        assert_eq!(settings.damping(0.0), 1.0);
    }

    #[test]
    fn no_damping_without_halflife() {
        let settings = HistogramSettings::new(&HistogramParams {
            damping_halflife: 0.0,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(settings.damping(1.0 / 60.0), 0.0);
    }

    #[test]
    fn bins_are_clamped() {
        let settings = HistogramSettings::new(&HistogramParams {
            bins: 1 << 20,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(settings.bins, MAX_BINS);
    }

    #[test]
    fn invalid_segments_are_rejected() {
        let params = HistogramParams {
            segments: vec![0.0, 0.6, 0.4, 1.0],
            ..Default::default()
        };
        assert_eq!(
            HistogramSettings::new(&params),
            Err(SegmentError::NotIncreasing)
        );
    }

    #[test]
    fn empty_colormap_uses_default() {
        assert_eq!(pack_colormap(&[]).len(), default_colormap().len());
    }
}
