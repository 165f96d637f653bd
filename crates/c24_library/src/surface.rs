//! Driver-facing boundary of the control surface.
//!
//! `Surface` is the synchronous setter half (LEDs, motors, displays, meters)
//! and `SurfaceEvents` the asynchronous callback half (button, knob, slider
//! and reconnect events delivered on the driver's own I/O context). Handlers
//! must not block: every event is answered with bounded numeric work and
//! setter calls only.

use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("failed to open control surface: {0}")]
    Open(String),
}

/// Hardware event sink, registered once after the surface is opened.
pub trait SurfaceEvents: Send + Sync {
    /// Raw button transition; `state` is nonzero while pressed.
    fn button_event(&self, button: u16, state: u8);
    /// Relative encoder step, centered at 64.
    fn knob_rotate(&self, knob: u16, state: u8);
    /// Absolute fader position, 0..=1023.
    fn slider_move(&self, track: u8, position: u16);
    /// The physical link dropped and came back; cached state must be
    /// re-asserted by the handler.
    fn reconnected(&self);
}

/// Synchronous command surface of the device driver.
///
/// Setters are fire-and-forget: the driver owns delivery, buffering and
/// reconnection, so a setter on a momentarily absent device is simply
/// absorbed. Indices outside the surface's address space are ignored.
pub trait Surface: Send + Sync {
    fn set_event_handler(&self, handler: Arc<dyn SurfaceEvents>);

    /// Move a motorized fader to an 11-bit position.
    fn set_slider_pos(&self, track: u8, position: u16);
    /// Light the 11-LED ring above a pan knob from a 16-bit mask.
    fn set_knob_led_mask(&self, track: u8, mask: u16);
    fn set_button_led_state(&self, button: u16, lit: bool);
    /// Write one line (0 or 1) of a strip's two-line text display.
    fn display(&self, text: &str, track: u8, line: u8);
    /// Convenience formatting of a float onto a display line.
    fn display_float(&self, value: f32, track: u8, line: u8);
    /// Fill a strip's level meter (channel 0 or 1) from a 16-bit mask.
    fn set_vumeter_mask(&self, track: u8, vumeter: u8, mask: u16);

    /// Release the device. Idempotent.
    fn close(&self);
}
