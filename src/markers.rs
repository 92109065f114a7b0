//! Trigger events and annotations tracked while they scroll through the
//! buffer, and the store that ages, culls and draws them.

use log::debug;

use crate::coords;
use crate::drivers::{LineKind, PrimitiveId, RenderSurface};
use crate::window::WindowParameters;

pub type MarkerId = PrimitiveId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Nonzero value on the scope's trigger channel.
    Trigger,
}

/// Shared aging and visibility behavior of everything the store tracks.
pub trait TimedMarker {
    fn id(&self) -> MarkerId;
    fn buffer_age(&self) -> f64;
    fn plot_age(&self) -> f64;
    /// Set the buffer age and re-derive the plot age from it.
    fn set_buffer_age(&mut self, buffer_age: f64, buffer_plot_offset: f64);
    /// Whether the marker belongs on screen under `params`.
    fn wants_render(&self, params: &WindowParameters) -> bool;
    fn is_rendered(&self) -> bool;
    fn show(&mut self, surface: &mut dyn RenderSurface);
    fn hide(&mut self, surface: &mut dyn RenderSurface);
    /// Move an already drawn marker; no call if it has not moved.
    fn reposition(&mut self, surface: &mut dyn RenderSurface);

    fn rebase(&mut self, buffer_plot_offset: f64) {
        self.set_buffer_age(self.buffer_age(), buffer_plot_offset);
    }

    /// Evicted from the buffer. An age of exactly zero is still buffered.
    fn is_expired(&self) -> bool {
        self.buffer_age() < 0.0
    }
}

#[derive(Clone, Debug)]
pub struct Event {
    id: MarkerId,
    kind: EventKind,
    value: f32,
    buffer_age: f64,
    plot_age: f64,
    drawn_at: Option<f64>,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn visible(&self) -> bool {
        self.drawn_at.is_some()
    }
}

impl TimedMarker for Event {
    fn id(&self) -> MarkerId {
        self.id
    }

    fn buffer_age(&self) -> f64 {
        self.buffer_age
    }

    fn plot_age(&self) -> f64 {
        self.plot_age
    }

    fn set_buffer_age(&mut self, buffer_age: f64, buffer_plot_offset: f64) {
        self.buffer_age = buffer_age;
        self.plot_age = coords::to_plot_age(buffer_age, buffer_plot_offset);
    }

    fn wants_render(&self, params: &WindowParameters) -> bool {
        self.plot_age >= 0.0 && self.buffer_age >= 0.0 && params.shows(self.kind)
    }

    fn is_rendered(&self) -> bool {
        self.drawn_at.is_some()
    }

    fn show(&mut self, surface: &mut dyn RenderSurface) {
        if self.drawn_at.is_some() {
            return;
        }
        surface.add_line(self.id, self.plot_age, LineKind::Event, &self.value.to_string());
        self.drawn_at = Some(self.plot_age);
    }

    fn hide(&mut self, surface: &mut dyn RenderSurface) {
        if self.drawn_at.take().is_some() {
            surface.remove_line(self.id);
        }
    }

    fn reposition(&mut self, surface: &mut dyn RenderSurface) {
        if let Some(drawn) = self.drawn_at {
            if drawn != self.plot_age {
                surface.update_line(self.id, self.plot_age);
                self.drawn_at = Some(self.plot_age);
            }
        }
    }
}

/// User-marked span. `buffer_age` and `plot_age` refer to the onset (left
/// edge); the span runs `duration` seconds to the right of it.
#[derive(Clone, Debug)]
pub struct Annotation {
    id: MarkerId,
    label: String,
    duration: f64,
    buffer_age: f64,
    plot_age: f64,
    drawn_at: Option<f64>,
}

impl Annotation {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn rendered(&self) -> bool {
        self.drawn_at.is_some()
    }

    /// Visible extent in plot time, clipped at the window's left edge.
    pub fn span(&self) -> (f64, f64) {
        (self.plot_age.max(0.0), self.plot_age + self.duration)
    }
}

impl TimedMarker for Annotation {
    fn id(&self) -> MarkerId {
        self.id
    }

    fn buffer_age(&self) -> f64 {
        self.buffer_age
    }

    fn plot_age(&self) -> f64 {
        self.plot_age
    }

    fn set_buffer_age(&mut self, buffer_age: f64, buffer_plot_offset: f64) {
        self.buffer_age = buffer_age;
        self.plot_age = coords::to_plot_age(buffer_age, buffer_plot_offset);
    }

    // Drawn while any part of the span is inside the window.
    fn wants_render(&self, _params: &WindowParameters) -> bool {
        self.plot_age + self.duration >= 0.0 && self.buffer_age >= 0.0
    }

    fn is_rendered(&self) -> bool {
        self.drawn_at.is_some()
    }

    fn show(&mut self, surface: &mut dyn RenderSurface) {
        if self.drawn_at.is_some() {
            return;
        }
        let (left, right) = self.span();
        surface.add_region(self.id, left, right, &self.label);
        self.drawn_at = Some(self.plot_age);
    }

    fn hide(&mut self, surface: &mut dyn RenderSurface) {
        if self.drawn_at.take().is_some() {
            surface.remove_region(self.id);
        }
    }

    fn reposition(&mut self, surface: &mut dyn RenderSurface) {
        if let Some(drawn) = self.drawn_at {
            if drawn != self.plot_age {
                let (left, right) = self.span();
                surface.update_region(self.id, left, right);
                self.drawn_at = Some(self.plot_age);
            }
        }
    }
}

#[derive(Clone, Debug)]
pub enum Marker {
    Event(Event),
    Annotation(Annotation),
}

impl Marker {
    fn inner(&self) -> &dyn TimedMarker {
        match self {
            Marker::Event(event) => event,
            Marker::Annotation(annotation) => annotation,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn TimedMarker {
        match self {
            Marker::Event(event) => event,
            Marker::Annotation(annotation) => annotation,
        }
    }
}

impl TimedMarker for Marker {
    fn id(&self) -> MarkerId {
        self.inner().id()
    }

    fn buffer_age(&self) -> f64 {
        self.inner().buffer_age()
    }

    fn plot_age(&self) -> f64 {
        self.inner().plot_age()
    }

    fn set_buffer_age(&mut self, buffer_age: f64, buffer_plot_offset: f64) {
        self.inner_mut().set_buffer_age(buffer_age, buffer_plot_offset);
    }

    fn wants_render(&self, params: &WindowParameters) -> bool {
        self.inner().wants_render(params)
    }

    fn is_rendered(&self) -> bool {
        self.inner().is_rendered()
    }

    fn show(&mut self, surface: &mut dyn RenderSurface) {
        self.inner_mut().show(surface);
    }

    fn hide(&mut self, surface: &mut dyn RenderSurface) {
        self.inner_mut().hide(surface);
    }

    fn reposition(&mut self, surface: &mut dyn RenderSurface) {
        self.inner_mut().reposition(surface);
    }
}

/// Owns every live marker. Single-writer: all mutation happens on the
/// viewer's timeline, so no internal locking.
#[derive(Debug)]
pub struct MarkerStore {
    markers: Vec<Marker>,
    buffer_plot_offset: f64,
    next_id: MarkerId,
}

impl MarkerStore {
    pub fn new(buffer_plot_offset: f64) -> Self {
        Self {
            markers: Vec::new(),
            buffer_plot_offset,
            next_id: 1,
        }
    }

    pub fn buffer_plot_offset(&self) -> f64 {
        self.buffer_plot_offset
    }

    /// Fresh id for a marker or any other primitive drawn next to markers.
    pub fn allocate_id(&mut self) -> MarkerId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn add_event(&mut self, kind: EventKind, value: f32, buffer_age: f64) -> MarkerId {
        let id = self.allocate_id();
        self.markers.push(Marker::Event(Event {
            id,
            kind,
            value,
            buffer_age,
            plot_age: coords::to_plot_age(buffer_age, self.buffer_plot_offset),
            drawn_at: None,
        }));
        id
    }

    pub fn add_annotation(&mut self, label: &str, duration: f64, buffer_age: f64) -> MarkerId {
        let id = self.allocate_id();
        self.markers.push(Marker::Annotation(Annotation {
            id,
            label: label.to_owned(),
            duration,
            buffer_age,
            plot_age: coords::to_plot_age(buffer_age, self.buffer_plot_offset),
            drawn_at: None,
        }));
        id
    }

    /// Age every marker by `elapsed` seconds of new samples.
    pub fn advance_all(&mut self, elapsed: f64) {
        let offset = self.buffer_plot_offset;
        for marker in &mut self.markers {
            let age = coords::advance(marker.buffer_age(), elapsed);
            marker.set_buffer_age(age, offset);
        }
    }

    /// Drop markers that left the buffer, taking their visuals down first.
    pub fn cull_expired(&mut self, surface: &mut dyn RenderSurface) -> usize {
        let before = self.markers.len();
        self.markers.retain_mut(|marker| {
            if marker.is_expired() {
                marker.hide(surface);
                false
            } else {
                true
            }
        });
        let culled = before - self.markers.len();
        if culled > 0 {
            debug!("culled {culled} expired markers");
        }
        culled
    }

    /// Bring the surface in line with the markers' current positions.
    /// Calling it again without an age change emits nothing.
    pub fn sync_visibility(&mut self, params: &WindowParameters, surface: &mut dyn RenderSurface) {
        for marker in &mut self.markers {
            match (marker.wants_render(params), marker.is_rendered()) {
                (true, false) => marker.show(surface),
                (false, true) => marker.hide(surface),
                (true, true) => marker.reposition(surface),
                (false, false) => {}
            }
        }
    }

    /// Window parameters changed: re-derive every plot age against the new
    /// offset, then resync visibility.
    pub fn rebase(
        &mut self,
        params: &WindowParameters,
        buffer_plot_offset: f64,
        surface: &mut dyn RenderSurface,
    ) {
        self.buffer_plot_offset = buffer_plot_offset;
        for marker in &mut self.markers {
            marker.rebase(buffer_plot_offset);
        }
        self.sync_visibility(params, surface);
    }

    /// Remove every marker and its visuals.
    pub fn clear(&mut self, surface: &mut dyn RenderSurface) {
        for marker in &mut self.markers {
            marker.hide(surface);
        }
        self.markers.clear();
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.iter()
    }

    pub fn get(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.iter().find(|marker| marker.id() == id)
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.markers.iter().filter_map(|marker| match marker {
            Marker::Event(event) => Some(event),
            Marker::Annotation(_) => None,
        })
    }

    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.markers.iter().filter_map(|marker| match marker {
            Marker::Annotation(annotation) => Some(annotation),
            Marker::Event(_) => None,
        })
    }
}
