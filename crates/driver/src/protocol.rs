//! Synchronization orchestrator.
//!
//! Binds every physical control to its tree node at device-attach time,
//! translates driver callbacks into tree pushes, and re-asserts the whole
//! persistent surface state after a reconnect. Also carries the degenerate
//! device-protocol shim the tree host requires: this surface is event
//! driven, so pull/push succeed without work and observe/push_raw report
//! unsupported.

use crate::parameter::{
    ButtonParameter, DeviceParameter, DisplayParameter, PanKnobParameter, SliderParameter,
    VumeterParameter,
};
use crate::tree::{
    AccessMode, BoundingMode, DeviceProtocol, Domain, Node, Tree, TreeError, Value,
};
use c24_library::controls::{self, BUTTON_COUNT, PITCH_WHEEL, TRACK_COUNT};
use c24_library::surface::{Surface, SurfaceEvents};
use log::{debug, info, warn};
use std::sync::Arc;

/// Relative encoders report 0..=127 centered at 64; one detent step moves
/// the value by this much.
const KNOB_STEP: f32 = 0.025;

pub struct C24Protocol {
    surface: Arc<dyn Surface>,
    sliders: Vec<Arc<SliderParameter>>,
    pan_knobs: Vec<Arc<PanKnobParameter>>,
    displays: Vec<Arc<DisplayParameter>>,
    buttons: Vec<Arc<ButtonParameter>>,
    pitch_wheel: Arc<Node>,
}

impl C24Protocol {
    /// Build the full parameter set for an attached surface and assert the
    /// initial tree state on the hardware.
    pub fn bind(surface: Arc<dyn Surface>, tree: &Tree) -> Result<Arc<Self>, TreeError> {
        let mut sliders = Vec::with_capacity(TRACK_COUNT);
        let mut pan_knobs = Vec::with_capacity(TRACK_COUNT);
        let mut displays = Vec::with_capacity(TRACK_COUNT);

        for track in 0..TRACK_COUNT as u8 {
            let prefix = format!("/Channel-{}", track + 1);

            sliders.push(SliderParameter::create(
                tree,
                &format!("{prefix}/slider"),
                0.0,
                &surface,
                track,
            )?);
            pan_knobs.push(PanKnobParameter::create(
                tree,
                &format!("{prefix}/panKnob"),
                0.0,
                &surface,
                track,
            )?);
            displays.push(DisplayParameter::create(
                tree,
                &format!("{prefix}/trackName"),
                &format!("ch-{}", track + 1),
                &surface,
                track,
            )?);

            // Meters are write-only telemetry; the tree and the device hook
            // keep them alive, nothing resyncs them.
            VumeterParameter::create(tree, &format!("{prefix}/vuMeter1"), 0.0, &surface, track, 0)?;
            VumeterParameter::create(tree, &format!("{prefix}/vuMeter2"), 0.0, &surface, track, 1)?;
        }

        let pitch_wheel = tree.create(
            "/pitchWheel",
            Value::Float(0.0),
            AccessMode::Get,
            BoundingMode::Free,
            Domain::Unbounded,
        )?;

        let mut buttons = Vec::with_capacity(BUTTON_COUNT);
        for button in 0..BUTTON_COUNT as u16 {
            let Some(name) = controls::button_name(button) else {
                continue;
            };
            let path = match controls::button_track(button) {
                Some(track) => format!("/Channel-{}/{name}", track + 1),
                None => format!("/{name}"),
            };
            buttons.push(ButtonParameter::create(tree, &path, false, &surface, button)?);
        }

        let protocol = Arc::new(Self {
            surface,
            sliders,
            pan_knobs,
            displays,
            buttons,
            pitch_wheel,
        });
        protocol.resync();
        info!(
            "surface bound: {} strips, {} buttons",
            TRACK_COUNT,
            protocol.buttons.len()
        );
        Ok(protocol)
    }

    /// Re-assert every persistent control from the cached tree state.
    /// Meters and the pitch wheel have no persistent hardware image.
    pub fn resync(&self) {
        for slider in &self.sliders {
            slider.push_to_device();
        }
        for pan_knob in &self.pan_knobs {
            pan_knob.push_to_device();
        }
        for display in &self.displays {
            display.push_to_device();
        }
        for button in &self.buttons {
            button.push_to_device();
        }
    }
}

impl SurfaceEvents for C24Protocol {
    fn button_event(&self, button: u16, state: u8) {
        // Button indices come straight off the wire; never trust them.
        let Some(param) = self.buttons.get(button as usize) else {
            warn!("button event for unmapped button {button}");
            return;
        };

        if controls::button_is_slider(button) {
            if state == 0 {
                // The touch gesture borrowed the display for fader
                // feedback; give the line back on release.
                if let Some(track) = controls::button_track(button) {
                    self.surface.display("", track, 1);
                }
            }
            param.node().push(Value::Bool(state != 0));
        } else if state != 0 {
            let current = param.node().value().as_bool().unwrap_or(false);
            param.node().push(Value::Bool(!current));
        }
    }

    fn knob_rotate(&self, knob: u16, state: u8) {
        let delta = KNOB_STEP * (f32::from(state) - 64.0);

        if controls::knob_is_pan_knob(knob) {
            let Some(param) = controls::knob_track(knob)
                .and_then(|track| self.pan_knobs.get(track as usize))
            else {
                warn!("knob event for unmapped knob {knob}");
                return;
            };
            let current = param.node().value().as_float().unwrap_or(0.0);
            let next = (current + delta).clamp(-1.0, 1.0);
            param.node().push(Value::Float(next));
        } else if knob == PITCH_WHEEL {
            let current = self.pitch_wheel.value().as_float().unwrap_or(0.0);
            self.pitch_wheel.push(Value::Float(current + delta));
        } else {
            debug!("knob event for unmapped knob {knob}");
        }
    }

    fn slider_move(&self, track: u8, position: u16) {
        let Some(param) = self.sliders.get(track as usize) else {
            warn!("slider event for unmapped track {track}");
            return;
        };
        let value = f32::from(position.min(1023)) / 1023.0;
        // Live fader feedback on the display's scratch line.
        self.surface.display_float(value, track, 1);
        // The motor already sits at this position; only the tree side moves.
        param.node().push_from_device(Value::Float(value));
    }

    fn reconnected(&self) {
        info!("surface link restored, resyncing");
        self.resync();
    }
}

impl DeviceProtocol for C24Protocol {
    fn pull(&self, _node: &Node) -> bool {
        // Event-driven surface: values arrive on their own, a poll has
        // nothing to do.
        true
    }

    fn push(&self, _node: &Node, _value: &Value) -> bool {
        // The per-node device hooks already drove the hardware.
        true
    }

    fn observe(&self, _node: &Node, _enable: bool) -> bool {
        false
    }

    fn push_raw(&self, path: &str, _value: &Value) -> bool {
        debug!("raw push for {path} not supported");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use c24_library::controls::{GlobalButton, TRACK_BUTTON_KINDS};
    use c24_library::sim::{SimSurface, SurfaceOp};

    fn bind_sim() -> (Arc<Tree>, Arc<SimSurface>, Arc<C24Protocol>) {
        let tree = Arc::new(Tree::new());
        let sim = SimSurface::open(1024).unwrap();
        let surface: Arc<dyn Surface> = sim.clone();
        let protocol = C24Protocol::bind(surface, &tree).unwrap();
        sim.set_event_handler(protocol.clone());
        tree.set_device_protocol(protocol.clone());
        (tree, sim, protocol)
    }

    #[test]
    fn bind_creates_the_full_namespace() {
        let (tree, _sim, _protocol) = bind_sim();
        assert!(tree.find("/Channel-1/slider").is_some());
        assert!(tree.find("/Channel-24/panKnob").is_some());
        assert!(tree.find("/Channel-24/vuMeter2").is_some());
        assert!(tree.find("/Channel-3/faderTouch").is_some());
        assert!(tree.find("/play").is_some());
        assert!(tree.find("/pitchWheel").is_some());
        // 5 strip controls + 5 strip buttons per track, 6 globals, 1 wheel.
        assert_eq!(tree.nodes().len(), TRACK_COUNT * 10 + 7);
        assert_eq!(
            tree.find("/Channel-3/trackName").unwrap().value(),
            Value::Str("ch-3".into())
        );
    }

    #[test]
    fn bind_asserts_initial_state_on_the_hardware() {
        let (_tree, sim, _protocol) = bind_sim();
        let strip = sim.track_state(5).unwrap();
        assert_eq!(strip.slider_pos, 0);
        assert_eq!(strip.knob_mask, 0x0200);
        assert_eq!(strip.display[0], "ch-6");
    }

    #[test]
    fn toggle_buttons_flip_on_press_edges_only() {
        let (tree, sim, _protocol) = bind_sim();
        let play = 120 + GlobalButton::Play as u16;
        let node = tree.find("/play").unwrap();
        sim.record_ops(true);

        sim.inject_button(play, 127);
        sim.inject_button(play, 0);
        sim.inject_button(play, 127);
        sim.inject_button(play, 0);
        sim.inject_button(play, 127);

        assert_eq!(node.value(), Value::Bool(true));
        let led_states: Vec<bool> = sim
            .drain_ops()
            .into_iter()
            .filter_map(|op| match op {
                SurfaceOp::ButtonLed { button, lit } if button == play => Some(lit),
                _ => None,
            })
            .collect();
        assert_eq!(led_states, vec![true, false, true]);
    }

    #[test]
    fn touch_release_clears_the_feedback_line_and_pushes_false() {
        let (tree, sim, _protocol) = bind_sim();
        let touch = 3 * TRACK_BUTTON_KINDS; // track 3 fader touch
        let node = tree.find("/Channel-4/faderTouch").unwrap();

        sim.inject_button(touch, 127);
        assert_eq!(node.value(), Value::Bool(true));

        sim.inject_slider(3, 512);
        assert_eq!(sim.track_state(3).unwrap().display[1], "0.50");

        sim.inject_button(touch, 0);
        assert_eq!(node.value(), Value::Bool(false));
        assert_eq!(sim.track_state(3).unwrap().display[1], "");
    }

    #[test]
    fn slider_moves_update_the_tree_without_redriving_the_motor() {
        let (tree, sim, _protocol) = bind_sim();
        sim.record_ops(true);
        sim.inject_slider(2, 512);

        let value = tree
            .find("/Channel-3/slider")
            .unwrap()
            .value()
            .as_float()
            .unwrap();
        assert!((value - 512.0 / 1023.0).abs() < 1e-6);

        let ops = sim.drain_ops();
        assert!(ops
            .iter()
            .all(|op| !matches!(op, SurfaceOp::SliderPos { .. })));
        assert!(ops.contains(&SurfaceOp::Display {
            track: 2,
            line: 1,
            text: "0.50".into()
        }));
    }

    #[test]
    fn pan_knob_steps_accumulate_and_relight_the_ring() {
        let (tree, sim, _protocol) = bind_sim();
        let node = tree.find("/Channel-6/panKnob").unwrap();

        // +20 detents from center: 0.025 * 20 = 0.5
        sim.inject_knob(5, 84);
        assert!((node.value().as_float().unwrap() - 0.5).abs() < 1e-6);
        assert_eq!(sim.track_state(5).unwrap().knob_mask, 0x0080);

        // Saturates at 1.0 and stays there.
        sim.inject_knob(5, 84);
        assert!((node.value().as_float().unwrap() - 1.0).abs() < 1e-6);
        sim.inject_knob(5, 84);
        assert!((node.value().as_float().unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(sim.track_state(5).unwrap().knob_mask, 0x0020);

        // Counter-clockwise steps walk back down.
        sim.inject_knob(5, 44);
        assert!((node.value().as_float().unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn pitch_wheel_accumulates_without_clamping() {
        let (tree, sim, _protocol) = bind_sim();
        let node = tree.find("/pitchWheel").unwrap();

        for _ in 0..4 {
            sim.inject_knob(PITCH_WHEEL, 84);
        }
        assert!((node.value().as_float().unwrap() - 2.0).abs() < 1e-5);
        assert!(node.remote_push(Value::Float(0.0)).is_err());
    }

    #[test]
    fn reconnect_reasserts_persistent_state_only() {
        let (tree, sim, _protocol) = bind_sim();
        let select = 2 * TRACK_BUTTON_KINDS + 1; // track 2 select, has an LED

        tree.find("/Channel-4/slider")
            .unwrap()
            .remote_push(Value::Float(0.75))
            .unwrap();
        tree.find("/Channel-4/panKnob")
            .unwrap()
            .remote_push(Value::Float(-0.2))
            .unwrap();
        tree.find("/Channel-4/trackName")
            .unwrap()
            .remote_push(Value::Str("ch-4".into()))
            .unwrap();
        tree.find("/Channel-4/vuMeter1")
            .unwrap()
            .remote_push(Value::Float(0.9))
            .unwrap();
        tree.find("/Channel-3/select")
            .unwrap()
            .remote_push(Value::Bool(true))
            .unwrap();

        sim.record_ops(true);
        sim.inject_reconnect();
        let ops = sim.drain_ops();

        // Every slider, pan ring, display and button LED, nothing else.
        assert_eq!(ops.len(), TRACK_COUNT * 3 + BUTTON_COUNT);
        assert!(ops.contains(&SurfaceOp::SliderPos {
            track: 3,
            position: 767
        }));
        assert!(ops.contains(&SurfaceOp::KnobLedMask {
            track: 3,
            mask: 0x0800
        }));
        assert!(ops.contains(&SurfaceOp::Display {
            track: 3,
            line: 0,
            text: "ch-4".into()
        }));
        assert!(ops.contains(&SurfaceOp::ButtonLed {
            button: select,
            lit: true
        }));
        assert!(ops
            .iter()
            .all(|op| !matches!(op, SurfaceOp::VumeterMask { .. })));
    }

    #[test]
    fn out_of_range_hardware_indices_are_dropped_at_the_boundary() {
        let (tree, sim, _protocol) = bind_sim();
        sim.record_ops(true);
        sim.inject_button(999, 127);
        sim.inject_slider(99, 512);
        sim.inject_knob(99, 84);
        assert!(sim.drain_ops().is_empty());
        assert_eq!(
            tree.find("/Channel-1/slider").unwrap().value(),
            Value::Float(0.0)
        );
    }

    #[test]
    fn shim_operations_report_their_fixed_outcomes() {
        let (tree, _sim, protocol) = bind_sim();
        let node = tree.find("/Channel-1/slider").unwrap();
        assert!(protocol.pull(&node));
        assert!(protocol.push(&node, &Value::Float(0.5)));
        assert!(!protocol.observe(&node, true));
        assert!(!protocol.push_raw("/nowhere", &Value::Float(0.5)));
    }
}
