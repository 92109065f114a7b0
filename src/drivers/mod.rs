// src/drivers/mod.rs
// Acquisition, buffering and drawing collaborators of the viewer core.
pub mod buffer;
pub mod error;
pub mod plot;
pub mod scope;
pub mod source;

pub use buffer::SignalBuffer;
pub use error::ViewerError;
pub use plot::{
    render_scene_png, LineKind, PlotStyle, PrimitiveId, RenderSurface, SceneLine, SceneRegion,
    SceneSurface, SurfaceStats,
};
pub use scope::{Scope, StreamScope};
pub use source::{make_batch, ManualSource, SignalBatch, SignalSource, SimulatedSource};
