//! Ordered event timelines and their JSON file format.
//!
//! A timeline file is a top-level JSON array. Each element names its device,
//! its delay since the previous element and a device-specific `data` object:
//!
//! ```json
//! [
//!   { "device": "mouse", "time": 0.5,
//!     "data": { "button": "left", "pressed": true, "x": 100, "y": 200 } },
//!   { "device": "keyboard", "time": 0.3,
//!     "data": { "key": 65, "action": "down" } }
//! ]
//! ```
//!
//! Loading is strict: any element that does not match this shape rejects the
//! whole file.

use crate::{Device, EventPayload, InputEvent, KeyEvent, MacroError, MouseClick, Result};
use serde::{Deserialize, Serialize};
use std::{io::Write, path::Path, time::Duration};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// An ordered, append-only sequence of input events
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    events: Vec<InputEvent>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. Negative, non-finite or unrepresentable deltas are clamped to zero.
    pub fn push(&mut self, mut event: InputEvent) {
        if !is_valid_delta(event.delta_seconds) {
            warn!(
                "Clamping invalid delta {} to 0 for {} event",
                event.delta_seconds,
                event.device()
            );
            event.delta_seconds = 0.0;
        }
        self.events.push(event);
    }

    pub fn events(&self) -> &[InputEvent] {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InputEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Sum of all recorded deltas
    pub fn total_duration(&self) -> Duration {
        self.events
            .iter()
            .fold(Duration::ZERO, |total, e| total.saturating_add(e.delay()))
    }

    /// Serialize the timeline to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        let wire: Vec<WireEventRef<'_>> = self.events.iter().map(WireEventRef::from).collect();
        serde_json::to_string_pretty(&wire)
            .map_err(|e| MacroError::Format(format!("failed to encode timeline: {e}")))
    }

    /// Parse a timeline from JSON, rejecting anything that does not match the schema
    pub fn from_json(json: &str) -> Result<Self> {
        let elements: Vec<serde_json::Value> = serde_json::from_str(json)
            .map_err(|e| MacroError::Format(format!("expected an array of events: {e}")))?;

        let mut events = Vec::with_capacity(elements.len());
        for (index, element) in elements.into_iter().enumerate() {
            let wire: WireEvent = serde_json::from_value(element)
                .map_err(|e| MacroError::Format(format!("event {index}: {e}")))?;
            let event = wire
                .into_event()
                .map_err(|reason| MacroError::Format(format!("event {index}: {reason}")))?;
            events.push(event);
        }

        Ok(Self { events })
    }

    /// Write the timeline to `path`.
    ///
    /// The JSON goes to a temporary file next to the destination which is then
    /// renamed over it, so readers never observe a half-written timeline.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!("Saving timeline with {} events to {:?}", self.len(), path);

        let json = self.to_json()?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = NamedTempFile::new_in(dir).map_err(|e| MacroError::io(path, e))?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.as_file().sync_all())
            .map_err(|e| MacroError::io(path, e))?;
        file.persist(path).map_err(|e| MacroError::io(path, e.error))?;

        debug!("Timeline written to {:?}", path);
        Ok(())
    }

    /// Read and validate a timeline from `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading timeline from {:?}", path);

        let json = std::fs::read_to_string(path).map_err(|e| MacroError::io(path, e))?;
        let timeline = Self::from_json(&json)?;

        debug!(
            "Loaded {} events spanning {:.3}s",
            timeline.len(),
            timeline.total_duration().as_secs_f64()
        );
        Ok(timeline)
    }
}

impl FromIterator<InputEvent> for Timeline {
    fn from_iter<I: IntoIterator<Item = InputEvent>>(iter: I) -> Self {
        let mut timeline = Timeline::new();
        for event in iter {
            timeline.push(event);
        }
        timeline
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a InputEvent;
    type IntoIter = std::slice::Iter<'a, InputEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// On-disk shape of one event, borrowed for writing
#[derive(Serialize)]
struct WireEventRef<'a> {
    device: Device,
    time: f64,
    data: WireDataRef<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireDataRef<'a> {
    Mouse(&'a MouseClick),
    Keyboard(&'a KeyEvent),
}

impl<'a> From<&'a InputEvent> for WireEventRef<'a> {
    fn from(event: &'a InputEvent) -> Self {
        let data = match &event.payload {
            EventPayload::MouseClick(click) => WireDataRef::Mouse(click),
            EventPayload::Key(key) => WireDataRef::Keyboard(key),
        };
        Self {
            device: event.device(),
            time: event.delta_seconds,
            data,
        }
    }
}

/// A delta is usable when it is a non-negative number of seconds a `Duration` can hold
fn is_valid_delta(seconds: f64) -> bool {
    seconds >= 0.0 && Duration::try_from_secs_f64(seconds).is_ok()
}

/// On-disk shape of one event, owned for reading. `data` is decoded once the
/// device tag is known.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WireEvent {
    device: Device,
    time: f64,
    data: serde_json::Value,
}

impl WireEvent {
    fn into_event(self) -> std::result::Result<InputEvent, String> {
        if !is_valid_delta(self.time) {
            return Err(format!(
                "time must be a non-negative number of seconds that fits a duration, got {}",
                self.time
            ));
        }

        let payload = match self.device {
            Device::Mouse => serde_json::from_value::<MouseClick>(self.data)
                .map(EventPayload::MouseClick)
                .map_err(|e| format!("invalid mouse data: {e}"))?,
            Device::Keyboard => serde_json::from_value::<KeyEvent>(self.data)
                .map(EventPayload::Key)
                .map_err(|e| format!("invalid keyboard data: {e}"))?,
        };

        Ok(InputEvent {
            delta_seconds: self.time,
            payload,
        })
    }
}
