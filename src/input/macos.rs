//! macOS pointer injection using Core Graphics

use std::thread;
use std::time::Duration;

use core_graphics::event::{
    CGEvent, CGEventTapLocation, CGEventType, CGMouseButton, ScrollEventUnit,
};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use core_graphics::geometry::CGPoint;
use tracing::debug;

use crate::action::ActionKind;
use crate::error::{Error, ErrorCode, Result};
use crate::geometry::Point;

const CLICK_HOLD: Duration = Duration::from_millis(50);
const SETTLE: Duration = Duration::from_millis(10);

fn event_source() -> Result<CGEventSource> {
    CGEventSource::new(CGEventSourceStateID::HIDSystemState)
        .map_err(|_| Error::new(ErrorCode::ActionFailed, "failed to create event source"))
}

fn post_mouse(kind: CGEventType, point: Point, button: CGMouseButton) -> Result<()> {
    let location = CGPoint::new(point.x as f64, point.y as f64);
    let event = CGEvent::new_mouse_event(event_source()?, kind, location, button)
        .map_err(|_| Error::new(ErrorCode::ActionFailed, "failed to create mouse event"))?;
    event.post(CGEventTapLocation::HID);
    Ok(())
}

fn edges(button: CGMouseButton) -> (CGEventType, CGEventType) {
    match button {
        CGMouseButton::Left => (CGEventType::LeftMouseDown, CGEventType::LeftMouseUp),
        CGMouseButton::Right => (CGEventType::RightMouseDown, CGEventType::RightMouseUp),
        CGMouseButton::Center => (CGEventType::OtherMouseDown, CGEventType::OtherMouseUp),
    }
}

/// Current pointer location in global display coordinates.
pub fn cursor_position() -> Point {
    event_source()
        .ok()
        .and_then(|source| CGEvent::new(source).ok())
        .map(|event| {
            let p = event.location();
            Point::new(p.x.round() as i32, p.y.round() as i32)
        })
        .unwrap_or_default()
}

pub fn move_mouse(point: Point) -> Result<()> {
    post_mouse(CGEventType::MouseMoved, point, CGMouseButton::Left)?;
    thread::sleep(SETTLE);
    Ok(())
}

/// Injects `kind` at `point`. Clicks post down, hold, up, and optionally
/// put the cursor back where it was.
pub fn perform(kind: ActionKind, point: Point, restore_cursor: bool) -> Result<()> {
    debug!("[Input] {} at ({}, {})", kind, point.x, point.y);
    let button = match kind {
        ActionKind::RightClick => CGMouseButton::Right,
        ActionKind::MiddleClick => CGMouseButton::Center,
        _ => CGMouseButton::Left,
    };
    let (down, up) = edges(button);

    match kind {
        ActionKind::LeftClick | ActionKind::RightClick | ActionKind::MiddleClick => {
            let before = cursor_position();
            post_mouse(down, point, button)?;
            thread::sleep(CLICK_HOLD);
            post_mouse(up, point, button)?;
            thread::sleep(SETTLE);
            if restore_cursor {
                move_mouse(before)?;
            }
            Ok(())
        }
        ActionKind::MouseDown => post_mouse(down, point, button),
        ActionKind::MouseUp => post_mouse(up, point, button),
        ActionKind::MoveMouse => move_mouse(point),
        ActionKind::Scroll => Err(Error::new(
            ErrorCode::InvalidInput,
            "scroll must use the scroll entry point",
        )),
    }
}

/// Posts a pixel-unit scroll event at the current cursor position.
pub fn scroll(delta_x: i32, delta_y: i32) -> Result<()> {
    let event = CGEvent::new_scroll_event(
        event_source()?,
        ScrollEventUnit::PIXEL,
        2,
        delta_y,
        delta_x,
        0,
    )
    .map_err(|_| Error::new(ErrorCode::ActionFailed, "failed to create scroll event"))?;
    event.post(CGEventTapLocation::HID);
    Ok(())
}
