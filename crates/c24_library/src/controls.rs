use num_derive::FromPrimitive;

/// Channel strips on the surface.
pub const TRACK_COUNT: usize = 24;

/// Button kinds repeated on every channel strip, in flat-index order.
pub const TRACK_BUTTON_KINDS: u16 = 5;

/// Buttons not tied to any channel strip (transport section).
pub const GLOBAL_BUTTON_COUNT: u16 = 6;

/// Total flat button addresses: 24 strips of 5, then the transport block.
pub const BUTTON_COUNT: usize = TRACK_COUNT * TRACK_BUTTON_KINDS as usize + GLOBAL_BUTTON_COUNT as usize;

/// Knob addresses 0..24 are the per-strip pan knobs; the pitch wheel sits
/// right after them as a fixed singleton address.
pub const PITCH_WHEEL: u16 = TRACK_COUNT as u16;

#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackButton {
    FaderTouch = 0,
    Select,
    Mute,
    Solo,
    RecArm,
}

#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalButton {
    Rewind = 0,
    FastForward,
    Stop,
    Play,
    Record,
    Loop,
}

/// Strip owning a flat button address, or `None` for transport buttons and
/// addresses past the end of the map.
pub fn button_track(button: u16) -> Option<u8> {
    if button < (TRACK_COUNT as u16) * TRACK_BUTTON_KINDS {
        Some((button / TRACK_BUTTON_KINDS) as u8)
    } else {
        None
    }
}

pub fn track_button_kind(button: u16) -> Option<TrackButton> {
    if button < (TRACK_COUNT as u16) * TRACK_BUTTON_KINDS {
        num::FromPrimitive::from_u16(button % TRACK_BUTTON_KINDS)
    } else {
        None
    }
}

pub fn global_button_kind(button: u16) -> Option<GlobalButton> {
    let first_global = (TRACK_COUNT as u16) * TRACK_BUTTON_KINDS;
    if button >= first_global {
        num::FromPrimitive::from_u16(button - first_global)
    } else {
        None
    }
}

/// True for the fader touch sensors, which ride along with the motorized
/// sliders instead of acting as free-standing switches.
pub fn button_is_slider(button: u16) -> bool {
    track_button_kind(button) == Some(TrackButton::FaderTouch)
}

/// Touch sensors carry no LED; every other mapped button does.
pub fn button_has_led(button: u16) -> bool {
    match track_button_kind(button) {
        Some(TrackButton::FaderTouch) => false,
        Some(_) => true,
        None => global_button_kind(button).is_some(),
    }
}

/// Path segment used when the button's tree node is created.
pub fn button_name(button: u16) -> Option<&'static str> {
    if let Some(kind) = track_button_kind(button) {
        return Some(match kind {
            TrackButton::FaderTouch => "faderTouch",
            TrackButton::Select => "select",
            TrackButton::Mute => "mute",
            TrackButton::Solo => "solo",
            TrackButton::RecArm => "recArm",
        });
    }
    global_button_kind(button).map(|kind| match kind {
        GlobalButton::Rewind => "rewind",
        GlobalButton::FastForward => "fastForward",
        GlobalButton::Stop => "stop",
        GlobalButton::Play => "play",
        GlobalButton::Record => "record",
        GlobalButton::Loop => "loop",
    })
}

pub fn knob_is_pan_knob(knob: u16) -> bool {
    (knob as usize) < TRACK_COUNT
}

pub fn knob_track(knob: u16) -> Option<u8> {
    if knob_is_pan_knob(knob) {
        Some(knob as u8)
    } else {
        None
    }
}
