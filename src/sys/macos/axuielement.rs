use std::ffi::c_void;
use std::fmt;
use std::ptr::{self, NonNull};

use objc2_application_services::{AXError, AXUIElement as RawAXUIElement, AXValue, AXValueType};
use objc2_core_foundation::{
    CFArray, CFBoolean, CFRetained, CFString, CFType, CGPoint, CGSize, ConcreteType,
};

use crate::sys::ax::{self, AxError, WindowButtons, pid_t};
use crate::sys::geometry::{Point, Size};

unsafe extern "C" {
    fn _AXUIElementGetWindow(elem: *mut RawAXUIElement, wid: *mut u32) -> AXError;
}

/// A retained accessibility element.
#[derive(Clone)]
pub struct AXUIElement {
    inner: CFRetained<RawAXUIElement>,
}

impl From<AXError> for AxError {
    fn from(err: AXError) -> Self {
        match err {
            AXError::NoValue => AxError::NoValue,
            AXError::InvalidUIElement => AxError::InvalidElement,
            AXError::CannotComplete => AxError::CannotComplete,
            AXError::AttributeUnsupported | AXError::ActionUnsupported => AxError::NotSupported,
            err => AxError::Other(err.0),
        }
    }
}

fn check(status: AXError) -> ax::Result<()> {
    if status == AXError::Success { Ok(()) } else { Err(status.into()) }
}

impl AXUIElement {
    fn new(inner: CFRetained<RawAXUIElement>) -> Self { Self { inner } }

    pub fn application(pid: pid_t) -> Self {
        // SAFETY: The returned object follows the Create rule.
        Self::new(unsafe { RawAXUIElement::new_application(pid) })
    }

    pub fn system_wide() -> Self {
        // SAFETY: The returned object follows the Create rule.
        Self::new(unsafe { RawAXUIElement::new_system_wide() })
    }

    /// # Safety
    ///
    /// `ptr` must be a valid element the caller does not own.
    pub unsafe fn from_get_rule(ptr: NonNull<RawAXUIElement>) -> Self {
        Self::new(unsafe { CFRetained::retain(ptr) })
    }

    pub fn raw(&self) -> &RawAXUIElement { &self.inner }

    fn raw_ptr(&self) -> *mut RawAXUIElement { CFRetained::as_ptr(&self.inner).as_ptr() }

    /// The window server id of a window element.
    pub fn window_server_id(&self) -> ax::Result<u32> {
        let mut id = 0;
        check(unsafe { _AXUIElementGetWindow(self.raw_ptr(), &mut id) })?;
        Ok(id)
    }

    pub fn set_messaging_timeout(&self, seconds: f32) {
        _ = check(unsafe { self.inner.set_messaging_timeout(seconds) });
    }

    fn copy_attribute(&self, name: &'static str) -> ax::Result<Option<CFRetained<CFType>>> {
        let attr = CFString::from_static_str(name);
        let mut value: *const CFType = ptr::null();
        let status = unsafe {
            self.inner.copy_attribute_value(&attr, NonNull::from(&mut value))
        };
        match status {
            AXError::Success => {
                // SAFETY: The function follows the Copy rule.
                Ok(NonNull::new(value.cast_mut()).map(|value| unsafe { CFRetained::from_raw(value) }))
            }
            AXError::NoValue => Ok(None),
            err => Err(err.into()),
        }
    }

    fn required<T: ConcreteType>(&self, name: &'static str) -> ax::Result<CFRetained<T>> {
        let value = self.copy_attribute(name)?.ok_or(AxError::NoValue)?;
        value.downcast::<T>().map_err(|_| AxError::NoValue)
    }

    pub fn bool_attribute(&self, name: &'static str) -> ax::Result<bool> {
        Ok(self.required::<CFBoolean>(name)?.value())
    }

    pub fn string_attribute(&self, name: &'static str) -> ax::Result<String> {
        Ok(self.required::<CFString>(name)?.to_string())
    }

    pub fn element_attribute(&self, name: &'static str) -> ax::Result<AXUIElement> {
        Ok(AXUIElement::new(self.required::<RawAXUIElement>(name)?))
    }

    pub fn set_bool_attribute(&self, name: &'static str, value: bool) -> ax::Result<()> {
        let attr = CFString::from_static_str(name);
        check(unsafe { self.inner.set_attribute_value(&attr, CFBoolean::new(value)) })
    }

    pub fn windows(&self) -> ax::Result<Vec<AXUIElement>> {
        let Some(value) = self.copy_attribute("AXWindows")? else {
            return Ok(Vec::new());
        };
        let array = value.downcast::<CFArray>().map_err(|_| AxError::NoValue)?;
        let array = unsafe { CFRetained::cast_unchecked::<CFArray<CFType>>(array) };
        Ok(array
            .iter()
            .filter_map(|entry| entry.downcast::<RawAXUIElement>().ok())
            .map(AXUIElement::new)
            .collect())
    }

    pub fn position(&self) -> ax::Result<Point> {
        let value = self.required::<AXValue>("AXPosition")?;
        let mut point = CGPoint::default();
        read_axvalue(&value, AXValueType::CGPoint, &mut point)?;
        Ok(Point::new(point.x, point.y))
    }

    pub fn size(&self) -> ax::Result<Size> {
        let value = self.required::<AXValue>("AXSize")?;
        let mut size = CGSize::default();
        read_axvalue(&value, AXValueType::CGSize, &mut size)?;
        Ok(Size::new(size.width, size.height))
    }

    pub fn set_position(&self, point: Point) -> ax::Result<()> {
        let mut point = CGPoint::new(point.x, point.y);
        let value = make_axvalue(AXValueType::CGPoint, &mut point)?;
        let attr = CFString::from_static_str("AXPosition");
        check(unsafe { self.inner.set_attribute_value(&attr, &value) })
    }

    pub fn set_size(&self, size: Size) -> ax::Result<()> {
        let mut size = CGSize::new(size.width, size.height);
        let value = make_axvalue(AXValueType::CGSize, &mut size)?;
        let attr = CFString::from_static_str("AXSize");
        check(unsafe { self.inner.set_attribute_value(&attr, &value) })
    }

    pub fn perform_action(&self, action: &'static str) -> ax::Result<()> {
        let action = CFString::from_static_str(action);
        check(unsafe { self.inner.perform_action(&action) })
    }

    /// Buttons present on a window, and the subset of them that is enabled.
    pub fn buttons(&self) -> (WindowButtons, WindowButtons) {
        const BUTTONS: [(&str, WindowButtons); 4] = [
            ("AXCloseButton", WindowButtons::CLOSE),
            ("AXFullScreenButton", WindowButtons::FULLSCREEN),
            ("AXZoomButton", WindowButtons::ZOOM),
            ("AXMinimizeButton", WindowButtons::MINIMIZE),
        ];
        let mut present = WindowButtons::empty();
        let mut enabled = WindowButtons::empty();
        for (attr, flag) in BUTTONS {
            let Ok(button) = self.element_attribute(attr) else { continue };
            present |= flag;
            if button.bool_attribute("AXEnabled").unwrap_or(false) {
                enabled |= flag;
            }
        }
        (present, enabled)
    }
}

impl PartialEq for AXUIElement {
    fn eq(&self, other: &Self) -> bool { CFRetained::as_ptr(&self.inner) == CFRetained::as_ptr(&other.inner) }
}

impl Eq for AXUIElement {}

impl fmt::Debug for AXUIElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.inner.fmt(f) }
}

fn read_axvalue<T>(value: &AXValue, ty: AXValueType, out: &mut T) -> ax::Result<()> {
    let ptr = NonNull::from(out).cast::<c_void>();
    if unsafe { value.value(ty, ptr) } { Ok(()) } else { Err(AxError::NoValue) }
}

fn make_axvalue<T>(ty: AXValueType, value: &mut T) -> ax::Result<CFRetained<AXValue>> {
    let ptr = NonNull::from(value).cast::<c_void>();
    unsafe { AXValue::new(ty, ptr) }.ok_or(AxError::Other(AXError::Failure.0))
}
