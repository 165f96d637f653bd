use c24_library::controls::{BUTTON_COUNT, TRACK_COUNT};
use c24_library::surface::Surface;
use std::sync::Arc;
use std::{thread, time};

/// Power-on sweep across the whole setter surface: fader travel, knob-ring
/// walk, meter ramp, button cascade. Purely cosmetic; the caller re-asserts
/// the bound tree state afterwards.
pub(crate) fn self_test(surface: &Arc<dyn Surface>) {
    // Faders ride up together in five steps (~250ms)
    for step in 0..5u16 {
        for track in 0..TRACK_COUNT as u8 {
            surface.set_slider_pos(track, step * 255);
        }
        thread::sleep(time::Duration::from_millis(50));
    }

    // Single LED chases around every pan ring (~220ms)
    for index in 0..11u32 {
        for track in 0..TRACK_COUNT as u8 {
            surface.set_knob_led_mask(track, 0x8000 >> index);
        }
        thread::sleep(time::Duration::from_millis(20));
    }

    // Meters ramp to full and back (~300ms)
    for index in (0..15u32).rev().chain(0..15u32) {
        for track in 0..TRACK_COUNT as u8 {
            let mask = 0xffffu16 >> index;
            surface.set_vumeter_mask(track, 0, mask);
            surface.set_vumeter_mask(track, 1, mask);
        }
        thread::sleep(time::Duration::from_millis(10));
    }

    // Button cascade (~250ms), then everything dark
    for button in 0..BUTTON_COUNT as u16 {
        surface.set_button_led_state(button, true);
        thread::sleep(time::Duration::from_millis(2));
    }
    for button in 0..BUTTON_COUNT as u16 {
        surface.set_button_led_state(button, false);
    }
    for track in 0..TRACK_COUNT as u8 {
        surface.set_slider_pos(track, 0);
        surface.set_knob_led_mask(track, 0);
        surface.set_vumeter_mask(track, 0, 0);
        surface.set_vumeter_mask(track, 1, 0);
        surface.display("", track, 0);
        surface.display("", track, 1);
    }
}
