//! Per-control value transforms.
//!
//! One parameter object per physical control, binding a hardware address to
//! a tree node. Construction creates the node with the control's declared
//! policy and installs the device hook that re-renders the node value as the
//! control's raw encoding. The transforms themselves are free functions so
//! their numeric edges stay pinned by the tests below.

use crate::tree::{AccessMode, BoundingMode, Domain, Node, Tree, TreeError, Value};
use c24_library::controls;
use c24_library::surface::Surface;
use std::sync::Arc;

/// Shared capability of all surface parameters: re-assert the node's
/// current value on the hardware.
pub trait DeviceParameter: Send + Sync {
    fn node(&self) -> &Arc<Node>;
    fn push_to_device(&self);
}

/// [0, 1] float to an 11-bit motorized fader position.
pub(crate) fn slider_raw(value: f32) -> u16 {
    (1023.0 * value).round().clamp(0.0, 1023.0) as u16
}

/// [-1, 1] float to a single lit LED out of the 11-LED pan ring.
/// The scale can reach index 11 for exactly 1.0; the clamp keeps the
/// observed hardware behavior of stopping at the second-to-top position.
pub(crate) fn pan_led_mask(value: f32) -> u16 {
    let index = (5.5 * (value + 1.0)).round().clamp(0.0, 10.0) as u32;
    0x8000u16 >> index
}

/// [0, 1] float to a 15-segment bar-graph fill; larger values shift less
/// and light more segments.
pub(crate) fn vumeter_mask(value: f32) -> u16 {
    let index = (14.0 * (1.0 - value)).round().clamp(0.0, 14.0) as u32;
    0xffffu16 >> index
}

pub struct SliderParameter {
    surface: Arc<dyn Surface>,
    track: u8,
    node: Arc<Node>,
}

impl SliderParameter {
    pub fn create(
        tree: &Tree,
        path: &str,
        initial: f32,
        surface: &Arc<dyn Surface>,
        track: u8,
    ) -> Result<Arc<Self>, TreeError> {
        let node = tree.create(
            path,
            Value::Float(initial),
            AccessMode::Bi,
            BoundingMode::Clip,
            Domain::Range { min: 0.0, max: 1.0 },
        )?;
        let hook_surface = Arc::clone(surface);
        node.set_device_hook(move |value| Self::apply(&hook_surface, track, value));
        Ok(Arc::new(Self {
            surface: Arc::clone(surface),
            track,
            node,
        }))
    }

    fn apply(surface: &Arc<dyn Surface>, track: u8, value: &Value) {
        if let Some(v) = value.as_float() {
            surface.set_slider_pos(track, slider_raw(v));
        }
    }
}

impl DeviceParameter for SliderParameter {
    fn node(&self) -> &Arc<Node> {
        &self.node
    }

    fn push_to_device(&self) {
        Self::apply(&self.surface, self.track, &self.node.value());
    }
}

pub struct PanKnobParameter {
    surface: Arc<dyn Surface>,
    track: u8,
    node: Arc<Node>,
}

impl PanKnobParameter {
    pub fn create(
        tree: &Tree,
        path: &str,
        initial: f32,
        surface: &Arc<dyn Surface>,
        track: u8,
    ) -> Result<Arc<Self>, TreeError> {
        let node = tree.create(
            path,
            Value::Float(initial),
            AccessMode::Bi,
            BoundingMode::Clip,
            Domain::Range {
                min: -1.0,
                max: 1.0,
            },
        )?;
        let hook_surface = Arc::clone(surface);
        node.set_device_hook(move |value| Self::apply(&hook_surface, track, value));
        Ok(Arc::new(Self {
            surface: Arc::clone(surface),
            track,
            node,
        }))
    }

    fn apply(surface: &Arc<dyn Surface>, track: u8, value: &Value) {
        if let Some(v) = value.as_float() {
            surface.set_knob_led_mask(track, pan_led_mask(v));
        }
    }
}

impl DeviceParameter for PanKnobParameter {
    fn node(&self) -> &Arc<Node> {
        &self.node
    }

    fn push_to_device(&self) {
        Self::apply(&self.surface, self.track, &self.node.value());
    }
}

pub struct ButtonParameter {
    surface: Arc<dyn Surface>,
    button: u16,
    node: Arc<Node>,
}

impl ButtonParameter {
    /// Buttons without an LED have nothing the network could usefully set,
    /// so their nodes are created read-only.
    pub fn create(
        tree: &Tree,
        path: &str,
        initial: bool,
        surface: &Arc<dyn Surface>,
        button: u16,
    ) -> Result<Arc<Self>, TreeError> {
        let access = if controls::button_has_led(button) {
            AccessMode::Bi
        } else {
            AccessMode::Get
        };
        let node = tree.create(
            path,
            Value::Bool(initial),
            access,
            BoundingMode::Clip,
            Domain::Unbounded,
        )?;
        let hook_surface = Arc::clone(surface);
        node.set_device_hook(move |value| Self::apply(&hook_surface, button, value));
        Ok(Arc::new(Self {
            surface: Arc::clone(surface),
            button,
            node,
        }))
    }

    fn apply(surface: &Arc<dyn Surface>, button: u16, value: &Value) {
        if let Some(v) = value.as_bool() {
            surface.set_button_led_state(button, v);
        }
    }
}

impl DeviceParameter for ButtonParameter {
    fn node(&self) -> &Arc<Node> {
        &self.node
    }

    fn push_to_device(&self) {
        Self::apply(&self.surface, self.button, &self.node.value());
    }
}

pub struct DisplayParameter {
    surface: Arc<dyn Surface>,
    track: u8,
    node: Arc<Node>,
}

impl DisplayParameter {
    /// Owns line 0 of the strip display. Line 1 is transient feedback
    /// written by the orchestrator directly; it has no network identity.
    pub fn create(
        tree: &Tree,
        path: &str,
        initial: &str,
        surface: &Arc<dyn Surface>,
        track: u8,
    ) -> Result<Arc<Self>, TreeError> {
        let node = tree.create(
            path,
            Value::Str(initial.to_string()),
            AccessMode::Set,
            BoundingMode::Free,
            Domain::Unbounded,
        )?;
        let hook_surface = Arc::clone(surface);
        node.set_device_hook(move |value| Self::apply(&hook_surface, track, value));
        Ok(Arc::new(Self {
            surface: Arc::clone(surface),
            track,
            node,
        }))
    }

    fn apply(surface: &Arc<dyn Surface>, track: u8, value: &Value) {
        if let Some(text) = value.as_str() {
            surface.display(text, track, 0);
        }
    }
}

impl DeviceParameter for DisplayParameter {
    fn node(&self) -> &Arc<Node> {
        &self.node
    }

    fn push_to_device(&self) {
        Self::apply(&self.surface, self.track, &self.node.value());
    }
}

pub struct VumeterParameter {
    surface: Arc<dyn Surface>,
    track: u8,
    vumeter: u8,
    node: Arc<Node>,
}

impl VumeterParameter {
    pub fn create(
        tree: &Tree,
        path: &str,
        initial: f32,
        surface: &Arc<dyn Surface>,
        track: u8,
        vumeter: u8,
    ) -> Result<Arc<Self>, TreeError> {
        let node = tree.create(
            path,
            Value::Float(initial),
            AccessMode::Set,
            BoundingMode::Clip,
            Domain::Range { min: 0.0, max: 1.0 },
        )?;
        let hook_surface = Arc::clone(surface);
        node.set_device_hook(move |value| Self::apply(&hook_surface, track, vumeter, value));
        Ok(Arc::new(Self {
            surface: Arc::clone(surface),
            track,
            vumeter,
            node,
        }))
    }

    fn apply(surface: &Arc<dyn Surface>, track: u8, vumeter: u8, value: &Value) {
        if let Some(v) = value.as_float() {
            surface.set_vumeter_mask(track, vumeter, vumeter_mask(v));
        }
    }
}

impl DeviceParameter for VumeterParameter {
    fn node(&self) -> &Arc<Node> {
        &self.node
    }

    fn push_to_device(&self) {
        Self::apply(&self.surface, self.track, self.vumeter, &self.node.value());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use c24_library::sim::SimSurface;

    #[test]
    fn slider_raw_covers_the_11_bit_range() {
        assert_eq!(slider_raw(0.0), 0);
        assert_eq!(slider_raw(0.5), 512);
        assert_eq!(slider_raw(0.75), 767);
        assert_eq!(slider_raw(1.0), 1023);
        assert_eq!(slider_raw(-0.3), 0);
        assert_eq!(slider_raw(1.4), 1023);
    }

    #[test]
    fn pan_mask_lights_a_single_ring_led() {
        assert_eq!(pan_led_mask(-1.0), 0x8000);
        assert_eq!(pan_led_mask(0.0), 0x0200);
        assert_eq!(pan_led_mask(1.0), 0x0020);
        assert_eq!(pan_led_mask(-0.2), 0x0800);
        assert_eq!(pan_led_mask(-3.0), 0x8000);
        assert_eq!(pan_led_mask(3.0), 0x0020);
    }

    #[test]
    fn vumeter_mask_fills_with_level() {
        assert_eq!(vumeter_mask(1.0), 0xffff);
        assert_eq!(vumeter_mask(0.0), 0x0003);
        assert_eq!(vumeter_mask(2.0), 0xffff);
        assert_eq!(vumeter_mask(-1.0), 0x0003);
    }

    #[test]
    fn tree_pushes_drive_the_hardware_encoding() {
        let tree = Tree::new();
        let sim = SimSurface::open(16).unwrap();
        let surface: Arc<dyn Surface> = sim.clone();

        let slider = SliderParameter::create(&tree, "/s", 0.0, &surface, 1).unwrap();
        let pan = PanKnobParameter::create(&tree, "/p", 0.0, &surface, 1).unwrap();
        let display = DisplayParameter::create(&tree, "/d", "ch-2", &surface, 1).unwrap();
        VumeterParameter::create(&tree, "/v", 0.0, &surface, 1, 1).unwrap();
        let button = ButtonParameter::create(&tree, "/b", false, &surface, 11).unwrap();

        slider.node().push(Value::Float(0.75));
        pan.node().push(Value::Float(-0.2));
        display.node().push(Value::Str("vox".into()));
        tree.find("/v").unwrap().push(Value::Float(1.0));
        button.node().push(Value::Bool(true));

        let strip = sim.track_state(1).unwrap();
        assert_eq!(strip.slider_pos, 767);
        assert_eq!(strip.knob_mask, 0x0800);
        assert_eq!(strip.display[0], "vox");
        assert_eq!(strip.vumeter_masks[1], 0xffff);
        assert_eq!(sim.button_led(11), Some(true));
    }

    #[test]
    fn led_capability_selects_the_button_access_mode() {
        let tree = Tree::new();
        let sim = SimSurface::open(16).unwrap();
        let surface: Arc<dyn Surface> = sim.clone();

        // Button 0 is a fader touch sensor, button 1 a select switch.
        let touch = ButtonParameter::create(&tree, "/t", false, &surface, 0).unwrap();
        let select = ButtonParameter::create(&tree, "/sel", false, &surface, 1).unwrap();
        assert_eq!(touch.node().access(), AccessMode::Get);
        assert_eq!(select.node().access(), AccessMode::Bi);
        assert!(touch.node().remote_push(Value::Bool(true)).is_err());
        select.node().remote_push(Value::Bool(true)).unwrap();
        assert_eq!(sim.button_led(1), Some(true));
    }
}
