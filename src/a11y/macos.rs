/*!
 * macOS Accessibility Client
 *
 * AxClient over the ApplicationServices AXUIElement API. Handles are
 * retained CFTypeRefs released through CFRelease when the owning AxHandle
 * drops. Bundle ids come from NSRunningApplication; pointer injection is
 * delegated to the Core Graphics helpers in `input::macos`.
 */

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_void, CStr};
use std::sync::Arc;

use core_foundation::array::{CFArrayGetCount, CFArrayGetTypeID, CFArrayGetValueAtIndex, CFArrayRef};
use core_foundation::base::{CFGetTypeID, CFHash, CFRelease, CFRetain, CFTypeRef, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::string::{CFString, CFStringGetTypeID, CFStringRef};
use core_graphics::display::CGDisplay;
use core_graphics::geometry::{CGPoint, CGSize};
use objc::runtime::Object;
use objc::{class, msg_send, sel, sel_impl};
use tracing::{debug, info, warn};

use super::{AxAttributes, AxClient, AxHandle, ElementKey, HandleRelease, Role};
use crate::action::ActionKind;
use crate::error::{Error, ErrorCode, Result};
use crate::geometry::{Point, Rect, Size};
use crate::input;

type AXUIElementRef = CFTypeRef;
type AXValueRef = CFTypeRef;
type AXError = i32;
type pid_t = i32;

const kAXErrorSuccess: AXError = 0;
const kAXErrorAPIDisabled: AXError = -25211;
const kAXValueCGPointType: u32 = 1;
const kAXValueCGSizeType: u32 = 2;

/// Seconds before an unresponsive application fails an AX call.
const MESSAGING_TIMEOUT: f32 = 0.5;

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXIsProcessTrusted() -> bool;
    fn AXUIElementCreateSystemWide() -> AXUIElementRef;
    fn AXUIElementCreateApplication(pid: pid_t) -> AXUIElementRef;
    fn AXUIElementCopyAttributeValue(element: AXUIElementRef, attribute: CFStringRef, value: *mut CFTypeRef) -> AXError;
    fn AXUIElementSetAttributeValue(element: AXUIElementRef, attribute: CFStringRef, value: CFTypeRef) -> AXError;
    fn AXUIElementCopyActionNames(element: AXUIElementRef, names: *mut CFArrayRef) -> AXError;
    fn AXUIElementGetPid(element: AXUIElementRef, pid: *mut pid_t) -> AXError;
    fn AXUIElementSetMessagingTimeout(element: AXUIElementRef, seconds: f32) -> AXError;
    fn AXValueGetValue(value: AXValueRef, kind: u32, out: *mut c_void) -> bool;
}

#[link(name = "AppKit", kind = "framework")]
extern "C" {}

struct CfRelease;

impl HandleRelease for CfRelease {
    fn release(&self, raw: usize) {
        if raw != 0 {
            unsafe { CFRelease(raw as CFTypeRef) };
        }
    }
}

fn ax_error(err: AXError, attribute: &str) -> Error {
    let code = if err == kAXErrorAPIDisabled {
        ErrorCode::AccessibilityDenied
    } else {
        ErrorCode::AccessibilityFailed
    };
    Error::new(code, format!("AX call failed for {}", attribute)).with_context("ax_error", err)
}

/// Runs `f` inside an autorelease pool so Foundation temporaries created off
/// the main thread are reclaimed.
fn with_pool<T>(f: impl FnOnce() -> T) -> T {
    unsafe {
        let pool: *mut Object = msg_send![class!(NSAutoreleasePool), new];
        let out = f();
        let _: () = msg_send![pool, drain];
        out
    }
}

unsafe fn nsstring(value: *mut Object) -> Option<String> {
    if value.is_null() {
        return None;
    }
    let utf8: *const c_char = msg_send![value, UTF8String];
    if utf8.is_null() {
        return None;
    }
    Some(CStr::from_ptr(utf8).to_string_lossy().into_owned())
}

fn bundle_id_for_pid(pid: i32) -> Option<String> {
    with_pool(|| unsafe {
        let app: *mut Object =
            msg_send![class!(NSRunningApplication), runningApplicationWithProcessIdentifier: pid];
        if app.is_null() {
            return None;
        }
        let bundle: *mut Object = msg_send![app, bundleIdentifier];
        nsstring(bundle)
    })
}

fn pid_for_bundle(bundle_id: &str) -> Option<i32> {
    let id = CFString::new(bundle_id);
    with_pool(|| unsafe {
        let apps: *mut Object = msg_send![
            class!(NSRunningApplication),
            runningApplicationsWithBundleIdentifier: id.as_concrete_TypeRef() as *mut Object
        ];
        if apps.is_null() {
            return None;
        }
        let first: *mut Object = msg_send![apps, firstObject];
        if first.is_null() {
            return None;
        }
        let pid: i32 = msg_send![first, processIdentifier];
        Some(pid)
    })
}

/// Accessibility client backed by the running macOS session.
pub struct MacAxClient {
    system_wide: AXUIElementRef,
    releaser: Arc<dyn HandleRelease>,
}

// The system-wide element is immutable and AX calls are thread-safe.
unsafe impl Send for MacAxClient {}
unsafe impl Sync for MacAxClient {}

impl MacAxClient {
    pub fn new() -> Result<Self> {
        let system_wide = unsafe { AXUIElementCreateSystemWide() };
        if system_wide.is_null() {
            return Err(Error::new(ErrorCode::AccessibilityFailed, "could not create system-wide element"));
        }
        unsafe { AXUIElementSetMessagingTimeout(system_wide, MESSAGING_TIMEOUT) };
        info!("[MacAx] Accessibility client ready (trusted: {})", unsafe { AXIsProcessTrusted() });
        Ok(Self {
            system_wide,
            releaser: Arc::new(CfRelease),
        })
    }

    /// Takes ownership of a +1 reference. The cache key pairs the owning
    /// pid with `CFHash`, so equal hashes from different apps stay apart.
    fn own(&self, raw: CFTypeRef) -> AxHandle {
        let pid = self.pid_of(raw as AXUIElementRef).unwrap_or(0);
        let key = ElementKey::new(pid, unsafe { CFHash(raw) } as u64);
        AxHandle::new(raw as usize, key, self.releaser.clone())
    }

    /// Copies an attribute value. The caller owns the returned reference.
    fn copy_attribute(&self, element: AXUIElementRef, attribute: &str) -> Result<CFTypeRef> {
        let name = CFString::new(attribute);
        let mut value: CFTypeRef = std::ptr::null();
        let err = unsafe { AXUIElementCopyAttributeValue(element, name.as_concrete_TypeRef(), &mut value) };
        if err != kAXErrorSuccess || value.is_null() {
            return Err(ax_error(err, attribute));
        }
        Ok(value)
    }

    fn element_attribute(&self, element: AXUIElementRef, attribute: &str) -> Result<AxHandle> {
        let value = self.copy_attribute(element, attribute)?;
        Ok(self.own(value))
    }

    fn string_attribute(&self, element: AXUIElementRef, attribute: &str) -> Option<String> {
        let value = self.copy_attribute(element, attribute).ok()?;
        unsafe {
            if CFGetTypeID(value) != CFStringGetTypeID() {
                CFRelease(value);
                return None;
            }
            Some(CFString::wrap_under_create_rule(value as CFStringRef).to_string())
        }
    }

    fn bool_attribute(&self, element: AXUIElementRef, attribute: &str) -> Option<bool> {
        let value = self.copy_attribute(element, attribute).ok()?;
        unsafe {
            if CFGetTypeID(value) != CFBoolean::type_id() {
                CFRelease(value);
                return None;
            }
            Some(CFBoolean::wrap_under_create_rule(value as _).into())
        }
    }

    fn value_attribute<T>(&self, element: AXUIElementRef, attribute: &str, kind: u32, mut out: T) -> Option<T> {
        let value = self.copy_attribute(element, attribute).ok()?;
        let ok = unsafe { AXValueGetValue(value, kind, &mut out as *mut T as *mut c_void) };
        unsafe { CFRelease(value) };
        ok.then_some(out)
    }

    fn action_names(&self, element: AXUIElementRef) -> Vec<String> {
        let mut names: CFArrayRef = std::ptr::null();
        let err = unsafe { AXUIElementCopyActionNames(element, &mut names) };
        if err != kAXErrorSuccess || names.is_null() {
            return Vec::new();
        }
        let mut out = Vec::new();
        unsafe {
            for i in 0..CFArrayGetCount(names) {
                let item = CFArrayGetValueAtIndex(names, i);
                if !item.is_null() && CFGetTypeID(item) == CFStringGetTypeID() {
                    out.push(CFString::wrap_under_get_rule(item as CFStringRef).to_string());
                }
            }
            CFRelease(names as CFTypeRef);
        }
        out
    }

    fn pid_of(&self, element: AXUIElementRef) -> Option<i32> {
        let mut pid: pid_t = 0;
        let err = unsafe { AXUIElementGetPid(element, &mut pid) };
        (err == kAXErrorSuccess && pid > 0).then_some(pid)
    }

    fn application(&self, pid: i32) -> Result<AxHandle> {
        let app = unsafe { AXUIElementCreateApplication(pid) };
        if app.is_null() {
            return Err(Error::new(ErrorCode::ElementNotFound, "no application for pid").with_context("pid", pid));
        }
        unsafe { AXUIElementSetMessagingTimeout(app, MESSAGING_TIMEOUT) };
        Ok(self.own(app))
    }
}

impl Drop for MacAxClient {
    fn drop(&mut self) {
        unsafe { CFRelease(self.system_wide) };
    }
}

impl AxClient for MacAxClient {
    fn frontmost_window(&self) -> Result<AxHandle> {
        let app = self.focused_application()?;
        let app_ref = app.raw() as AXUIElementRef;
        self.element_attribute(app_ref, "AXFocusedWindow")
            .or_else(|_| self.element_attribute(app_ref, "AXMainWindow"))
            .map_err(|e| Error::wrap(e, ErrorCode::ElementNotFound, "no frontmost window"))
    }

    fn focused_application(&self) -> Result<AxHandle> {
        self.element_attribute(self.system_wide, "AXFocusedApplication")
    }

    fn application_by_bundle(&self, bundle_id: &str) -> Result<AxHandle> {
        let pid = pid_for_bundle(bundle_id).ok_or_else(|| {
            Error::new(ErrorCode::ElementNotFound, "application is not running").with_context("bundle", bundle_id)
        })?;
        self.application(pid)
    }

    fn menu_bar(&self, app: &AxHandle) -> Result<AxHandle> {
        self.element_attribute(app.raw() as AXUIElementRef, "AXMenuBar")
    }

    fn children_of(&self, handle: &AxHandle) -> Result<Vec<AxHandle>> {
        let value = match self.copy_attribute(handle.raw() as AXUIElementRef, "AXChildren") {
            Ok(v) => v,
            Err(e) if e.is(ErrorCode::AccessibilityFailed) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut children = Vec::new();
        unsafe {
            if CFGetTypeID(value) == CFArrayGetTypeID() {
                let array = value as CFArrayRef;
                for i in 0..CFArrayGetCount(array) {
                    let child = CFArrayGetValueAtIndex(array, i);
                    if !child.is_null() {
                        CFRetain(child);
                        children.push(self.own(child));
                    }
                }
            }
            CFRelease(value);
        }
        Ok(children)
    }

    fn attributes_of(&self, handle: &AxHandle) -> Result<AxAttributes> {
        let element = handle.raw() as AXUIElementRef;
        let role = self
            .string_attribute(element, "AXRole")
            .ok_or_else(|| Error::new(ErrorCode::AccessibilityFailed, "element has no role"))?;
        let role = Role::parse(&role);

        let position: CGPoint = self
            .value_attribute(element, "AXPosition", kAXValueCGPointType, CGPoint::new(0.0, 0.0))
            .unwrap_or(CGPoint::new(0.0, 0.0));
        let size: CGSize = self
            .value_attribute(element, "AXSize", kAXValueCGSizeType, CGSize::new(0.0, 0.0))
            .unwrap_or(CGSize::new(0.0, 0.0));

        let pid = self.pid_of(element);
        let bundle_id = if role == Role::Application {
            pid.and_then(bundle_id_for_pid)
        } else {
            None
        };

        Ok(AxAttributes {
            role,
            subrole: self.string_attribute(element, "AXSubrole"),
            title: self.string_attribute(element, "AXTitle").unwrap_or_default(),
            description: self.string_attribute(element, "AXDescription").unwrap_or_default(),
            position: Point::new(position.x.round() as i32, position.y.round() as i32),
            size: Size::new(size.width.round() as i32, size.height.round() as i32),
            enabled: self.bool_attribute(element, "AXEnabled").unwrap_or(true),
            actions: self.action_names(element),
            pid,
            bundle_id,
        })
    }

    fn set_app_attribute(&self, pid: i32, name: &str, value: bool) -> bool {
        let app = match self.application(pid) {
            Ok(app) => app,
            Err(e) => {
                warn!("[MacAx] {}", e);
                return false;
            }
        };
        let attribute = CFString::new(name);
        let flag = if value { CFBoolean::true_value() } else { CFBoolean::false_value() };
        let err = unsafe {
            AXUIElementSetAttributeValue(
                app.raw() as AXUIElementRef,
                attribute.as_concrete_TypeRef(),
                flag.as_CFTypeRef(),
            )
        };
        debug!("[MacAx] set {}={} on pid {} -> {}", name, value, pid, err);
        err == kAXErrorSuccess
    }

    fn perform_action(&self, kind: ActionKind, point: Point, restore_cursor: bool) -> Result<()> {
        input::macos::perform(kind, point, restore_cursor)
    }

    fn scroll_at_cursor(&self, delta_x: i32, delta_y: i32) -> Result<()> {
        input::macos::scroll(delta_x, delta_y)
    }

    fn cursor_position(&self) -> Point {
        input::macos::cursor_position()
    }

    fn active_screen_bounds(&self) -> Rect {
        let cursor = self.cursor_position();
        let to_rect = |display: CGDisplay| {
            let b = display.bounds();
            Rect::new(
                b.origin.x.round() as i32,
                b.origin.y.round() as i32,
                b.size.width.round() as i32,
                b.size.height.round() as i32,
            )
        };
        CGDisplay::active_displays()
            .unwrap_or_default()
            .into_iter()
            .map(|id| to_rect(CGDisplay::new(id)))
            .find(|r| r.contains(cursor))
            .unwrap_or_else(|| to_rect(CGDisplay::main()))
    }

    fn check_permissions(&self) -> bool {
        unsafe { AXIsProcessTrusted() }
    }

    /// Mission Control shows up as a Dock child with identifier `mc`.
    fn is_system_overview_active(&self) -> bool {
        let Ok(dock) = self.application_by_bundle(super::collector::DOCK_BUNDLE_ID) else {
            return false;
        };
        let Ok(children) = self.children_of(&dock) else {
            return false;
        };
        children.iter().any(|child| {
            self.string_attribute(child.raw() as AXUIElementRef, "AXIdentifier")
                .is_some_and(|id| id == "mc")
        })
    }
}
