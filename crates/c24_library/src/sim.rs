//! Software surface backend.
//!
//! Keeps the full model of what the physical surface would currently show
//! (fader positions, knob rings, display lines, meter fills, button LEDs),
//! the same way the hardware keeps it across its own link. Event injection
//! stands in for the driver's I/O thread, and an opt-in operation log lets
//! tests assert the exact setter traffic a scenario produces.

use crate::controls::{BUTTON_COUNT, TRACK_COUNT};
use crate::surface::{Surface, SurfaceError, SurfaceEvents};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

pub const DISPLAY_LINES: usize = 2;
pub const VUMETERS_PER_TRACK: usize = 2;

/// One setter call, as recorded by the op log.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    SliderPos { track: u8, position: u16 },
    KnobLedMask { track: u8, mask: u16 },
    ButtonLed { button: u16, lit: bool },
    Display { track: u8, line: u8, text: String },
    VumeterMask { track: u8, vumeter: u8, mask: u16 },
}

#[derive(Debug, Clone, Default)]
pub struct TrackState {
    pub slider_pos: u16,
    pub knob_mask: u16,
    pub display: [String; DISPLAY_LINES],
    pub vumeter_masks: [u16; VUMETERS_PER_TRACK],
}

struct SimState {
    tracks: [TrackState; TRACK_COUNT],
    button_leds: [bool; BUTTON_COUNT],
}

pub struct SimSurface {
    state: Mutex<SimState>,
    handler: RwLock<Option<Arc<dyn SurfaceEvents>>>,
    ops: Mutex<Vec<SurfaceOp>>,
    record_ops: AtomicBool,
    closed: AtomicBool,
}

impl SimSurface {
    /// `capacity` is the event-queue depth a transport backend would
    /// allocate; the software model only uses it to size the op log, but
    /// rejects zero the way a real open would.
    pub fn open(capacity: usize) -> Result<Arc<Self>, SurfaceError> {
        if capacity == 0 {
            return Err(SurfaceError::Open("zero event-queue capacity".into()));
        }
        Ok(Arc::new(Self {
            state: Mutex::new(SimState {
                tracks: std::array::from_fn(|_| TrackState::default()),
                button_leds: [false; BUTTON_COUNT],
            }),
            handler: RwLock::new(None),
            ops: Mutex::new(Vec::with_capacity(capacity)),
            record_ops: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }))
    }

    pub fn record_ops(&self, enable: bool) {
        self.record_ops.store(enable, Ordering::SeqCst);
    }

    pub fn drain_ops(&self) -> Vec<SurfaceOp> {
        std::mem::take(&mut *self.ops.lock().unwrap())
    }

    pub fn track_state(&self, track: u8) -> Option<TrackState> {
        self.state.lock().unwrap().tracks.get(track as usize).cloned()
    }

    pub fn button_led(&self, button: u16) -> Option<bool> {
        self.state.lock().unwrap().button_leds.get(button as usize).copied()
    }

    // Event injection, standing in for the driver's delivery thread.

    pub fn inject_button(&self, button: u16, state: u8) {
        if let Some(handler) = self.current_handler() {
            handler.button_event(button, state);
        }
    }

    pub fn inject_knob(&self, knob: u16, state: u8) {
        if let Some(handler) = self.current_handler() {
            handler.knob_rotate(knob, state);
        }
    }

    pub fn inject_slider(&self, track: u8, position: u16) {
        if let Some(handler) = self.current_handler() {
            handler.slider_move(track, position);
        }
    }

    pub fn inject_reconnect(&self) {
        if let Some(handler) = self.current_handler() {
            handler.reconnected();
        }
    }

    fn current_handler(&self) -> Option<Arc<dyn SurfaceEvents>> {
        self.handler.read().unwrap().clone()
    }

    fn record(&self, op: SurfaceOp) {
        if self.record_ops.load(Ordering::SeqCst) {
            self.ops.lock().unwrap().push(op);
        }
    }

    fn rejected(&self, what: &str) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            debug!("surface closed, dropping {what}");
            return true;
        }
        false
    }
}

impl Surface for SimSurface {
    fn set_event_handler(&self, handler: Arc<dyn SurfaceEvents>) {
        *self.handler.write().unwrap() = Some(handler);
    }

    fn set_slider_pos(&self, track: u8, position: u16) {
        if self.rejected("slider position") {
            return;
        }
        let mut state = self.state.lock().unwrap();
        let Some(strip) = state.tracks.get_mut(track as usize) else {
            warn!("slider position for unmapped track {track}");
            return;
        };
        strip.slider_pos = position.min(1023);
        drop(state);
        self.record(SurfaceOp::SliderPos { track, position });
    }

    fn set_knob_led_mask(&self, track: u8, mask: u16) {
        if self.rejected("knob ring mask") {
            return;
        }
        let mut state = self.state.lock().unwrap();
        let Some(strip) = state.tracks.get_mut(track as usize) else {
            warn!("knob ring mask for unmapped track {track}");
            return;
        };
        strip.knob_mask = mask;
        drop(state);
        self.record(SurfaceOp::KnobLedMask { track, mask });
    }

    fn set_button_led_state(&self, button: u16, lit: bool) {
        if self.rejected("button LED") {
            return;
        }
        let mut state = self.state.lock().unwrap();
        let Some(led) = state.button_leds.get_mut(button as usize) else {
            warn!("LED state for unmapped button {button}");
            return;
        };
        *led = lit;
        drop(state);
        self.record(SurfaceOp::ButtonLed { button, lit });
    }

    fn display(&self, text: &str, track: u8, line: u8) {
        if self.rejected("display write") {
            return;
        }
        let mut state = self.state.lock().unwrap();
        let Some(strip) = state.tracks.get_mut(track as usize) else {
            warn!("display write for unmapped track {track}");
            return;
        };
        let Some(slot) = strip.display.get_mut(line as usize) else {
            warn!("display write for unmapped line {line}");
            return;
        };
        *slot = text.to_string();
        drop(state);
        self.record(SurfaceOp::Display {
            track,
            line,
            text: text.to_string(),
        });
    }

    fn display_float(&self, value: f32, track: u8, line: u8) {
        self.display(&format!("{value:.2}"), track, line);
    }

    fn set_vumeter_mask(&self, track: u8, vumeter: u8, mask: u16) {
        if self.rejected("meter mask") {
            return;
        }
        let mut state = self.state.lock().unwrap();
        let Some(strip) = state.tracks.get_mut(track as usize) else {
            warn!("meter mask for unmapped track {track}");
            return;
        };
        let Some(slot) = strip.vumeter_masks.get_mut(vumeter as usize) else {
            warn!("meter mask for unmapped meter channel {vumeter}");
            return;
        };
        *slot = mask;
        drop(state);
        self.record(SurfaceOp::VumeterMask {
            track,
            vumeter,
            mask,
        });
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("surface closed");
        }
    }
}
