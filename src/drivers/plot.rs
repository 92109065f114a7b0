use std::collections::BTreeMap;
use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use log::warn;
use plotters::prelude::*;

use crate::drivers::ViewerError;

/// Handle the core uses to address a primitive on the surface.
pub type PrimitiveId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    /// Trigger event entering the window.
    Event,
    /// First click of an annotation gesture that is still armed.
    Provisional,
}

/// Opaque drawable the viewer core pushes primitives into. All calls are
/// fire-and-forget; x positions are plot-window seconds.
pub trait RenderSurface {
    fn set_viewport(&mut self, x_range: f64, y_range: (f64, f64));
    fn add_line(&mut self, id: PrimitiveId, x: f64, kind: LineKind, label: &str);
    fn update_line(&mut self, id: PrimitiveId, x: f64);
    fn remove_line(&mut self, id: PrimitiveId);
    fn add_region(&mut self, id: PrimitiveId, left: f64, right: f64, label: &str);
    fn update_region(&mut self, id: PrimitiveId, left: f64, right: f64);
    fn remove_region(&mut self, id: PrimitiveId);
    fn set_waveform(&mut self, channel: usize, samples: &[f32]);
    fn remove_waveform(&mut self, channel: usize);
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneLine {
    pub x: f64,
    pub kind: LineKind,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneRegion {
    pub left: f64,
    pub right: f64,
    pub label: String,
}

/// Running totals of what has been pushed to a [`SceneSurface`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfaceStats {
    pub lines_added: usize,
    pub lines_removed: usize,
    pub regions_added: usize,
    pub regions_removed: usize,
    pub updates: usize,
    pub waveform_refreshes: usize,
    /// Adds for an id that was already on the surface.
    pub duplicate_adds: usize,
    /// Updates or removes for an id that was not on the surface.
    pub orphan_calls: usize,
}

/// Render surface that keeps the current scene in memory and can export it
/// as a PNG snapshot.
#[derive(Debug)]
pub struct SceneSurface {
    x_range: f64,
    y_range: (f64, f64),
    lines: BTreeMap<PrimitiveId, SceneLine>,
    regions: BTreeMap<PrimitiveId, SceneRegion>,
    waveforms: BTreeMap<usize, Vec<f32>>,
    stats: SurfaceStats,
}

impl Default for SceneSurface {
    fn default() -> Self {
        Self {
            x_range: 10.0,
            y_range: (-100.0, 100.0),
            lines: BTreeMap::new(),
            regions: BTreeMap::new(),
            waveforms: BTreeMap::new(),
            stats: SurfaceStats::default(),
        }
    }
}

impl SceneSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn x_range(&self) -> f64 {
        self.x_range
    }

    pub fn y_range(&self) -> (f64, f64) {
        self.y_range
    }

    pub fn lines(&self) -> &BTreeMap<PrimitiveId, SceneLine> {
        &self.lines
    }

    pub fn regions(&self) -> &BTreeMap<PrimitiveId, SceneRegion> {
        &self.regions
    }

    pub fn waveform(&self, channel: usize) -> Option<&[f32]> {
        self.waveforms.get(&channel).map(Vec::as_slice)
    }

    pub fn waveform_channels(&self) -> Vec<usize> {
        self.waveforms.keys().copied().collect()
    }

    pub fn stats(&self) -> SurfaceStats {
        self.stats
    }

    fn orphan(&mut self, what: &str, id: PrimitiveId) {
        self.stats.orphan_calls += 1;
        warn!("{what} for unknown primitive {id}");
    }
}

impl RenderSurface for SceneSurface {
    fn set_viewport(&mut self, x_range: f64, y_range: (f64, f64)) {
        self.x_range = x_range;
        self.y_range = y_range;
    }

    fn add_line(&mut self, id: PrimitiveId, x: f64, kind: LineKind, label: &str) {
        self.stats.lines_added += 1;
        let line = SceneLine {
            x,
            kind,
            label: label.to_owned(),
        };
        if self.lines.insert(id, line).is_some() {
            self.stats.duplicate_adds += 1;
        }
    }

    fn update_line(&mut self, id: PrimitiveId, x: f64) {
        match self.lines.get_mut(&id) {
            Some(line) => {
                line.x = x;
                self.stats.updates += 1;
            }
            None => self.orphan("line update", id),
        }
    }

    fn remove_line(&mut self, id: PrimitiveId) {
        self.stats.lines_removed += 1;
        if self.lines.remove(&id).is_none() {
            self.orphan("line removal", id);
        }
    }

    fn add_region(&mut self, id: PrimitiveId, left: f64, right: f64, label: &str) {
        self.stats.regions_added += 1;
        let region = SceneRegion {
            left,
            right,
            label: label.to_owned(),
        };
        if self.regions.insert(id, region).is_some() {
            self.stats.duplicate_adds += 1;
        }
    }

    fn update_region(&mut self, id: PrimitiveId, left: f64, right: f64) {
        match self.regions.get_mut(&id) {
            Some(region) => {
                region.left = left;
                region.right = right;
                self.stats.updates += 1;
            }
            None => self.orphan("region update", id),
        }
    }

    fn remove_region(&mut self, id: PrimitiveId) {
        self.stats.regions_removed += 1;
        if self.regions.remove(&id).is_none() {
            self.orphan("region removal", id);
        }
    }

    fn set_waveform(&mut self, channel: usize, samples: &[f32]) {
        self.stats.waveform_refreshes += 1;
        self.waveforms.insert(channel, samples.to_vec());
    }

    fn remove_waveform(&mut self, channel: usize) {
        self.waveforms.remove(&channel);
    }
}

#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub palette: Vec<RGBColor>,
    pub event_color: RGBColor,
    pub provisional_color: RGBColor,
    pub region_color: RGBColor,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 900,
            height: 400,
            background: RGBColor(10, 10, 10),
            palette: vec![BLUE, RED, CYAN, MAGENTA, YELLOW, WHITE],
            event_color: GREEN,
            provisional_color: RGBColor(255, 165, 0),
            region_color: GREEN,
        }
    }
}

/// Draw the current scene: waveforms, then annotation regions, then lines.
pub fn render_scene_png(scene: &SceneSurface, style: &PlotStyle) -> Result<Vec<u8>, ViewerError> {
    if style.width == 0 || style.height == 0 {
        return Err(ViewerError::Plot("snapshot size must be non-zero".into()));
    }
    let x_range = scene.x_range.max(f64::EPSILON);
    let (y_min, y_max) = if scene.y_range.0 < scene.y_range.1 {
        scene.y_range
    } else {
        (-1.0, 1.0)
    };
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .build_cartesian_2d(0f64..x_range, y_min..y_max)?;
        for (idx, (_, samples)) in scene.waveforms.iter().enumerate() {
            if samples.is_empty() {
                continue;
            }
            let color = match style.palette.len() {
                0 => WHITE,
                n => style.palette[idx % n],
            };
            let dx = x_range / samples.len() as f64;
            let series = samples
                .iter()
                .enumerate()
                .map(|(i, v)| (i as f64 * dx, *v as f64));
            chart.draw_series(LineSeries::new(series, color.stroke_width(1)))?;
        }
        chart.draw_series(scene.regions.values().map(|region| {
            Rectangle::new(
                [(region.left, y_max), (region.right, y_min)],
                style.region_color.mix(0.2).filled(),
            )
        }))?;
        chart.draw_series(scene.lines.values().map(|line| {
            let color = match line.kind {
                LineKind::Event => style.event_color,
                LineKind::Provisional => style.provisional_color,
            };
            PathElement::new(vec![(line.x, y_min), (line.x, y_max)], color.stroke_width(1))
        }))?;
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}

fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ViewerError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| ViewerError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_tracks_primitives_and_orphans() {
        let mut scene = SceneSurface::new();
        scene.add_line(1, 2.0, LineKind::Event, "5");
        scene.update_line(1, 1.5);
        scene.add_region(2, 0.5, 3.0, "bad");
        scene.remove_line(1);
        scene.remove_line(1);
        assert!(scene.lines().is_empty());
        assert_eq!(scene.regions()[&2].right, 3.0);
        let stats = scene.stats();
        assert_eq!(stats.lines_added, 1);
        assert_eq!(stats.lines_removed, 2);
        assert_eq!(stats.orphan_calls, 1);
        assert_eq!(stats.updates, 1);
    }

    #[test]
    fn snapshot_renders_png() {
        let mut scene = SceneSurface::new();
        scene.set_viewport(4.0, (-50.0, 50.0));
        scene.set_waveform(0, &[0.0, 10.0, -10.0, 0.0]);
        scene.add_line(1, 1.0, LineKind::Event, "3");
        scene.add_line(2, 2.0, LineKind::Provisional, "");
        scene.add_region(3, 0.5, 1.5, "bad");
        let style = PlotStyle {
            width: 120,
            height: 60,
            ..PlotStyle::default()
        };
        let png = render_scene_png(&scene, &style).unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }
}
