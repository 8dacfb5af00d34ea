use std::ffi::c_void;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ptr::{self, NonNull};

use objc2_application_services::{AXError, AXObserver, AXUIElement as RawAXUIElement};
use objc2_core_foundation::{CFRetained, CFRunLoop, CFString, kCFRunLoopCommonModes};

use super::axuielement::AXUIElement;
use crate::sys::ax::{self, AxError, pid_t};

/// An accessibility observer for one process.
///
/// Notifications are delivered on the main thread, which runs the run loop
/// the observer is installed into. The observer itself stays on the thread
/// that created it.
pub struct Observer {
    callback: *mut (),
    dtor: unsafe fn(*mut ()),
    observer: ManuallyDrop<CFRetained<AXObserver>>,
}

/// Helper type for building an [`Observer`].
pub struct ObserverBuilder<F>(CFRetained<AXObserver>, PhantomData<F>);

impl Observer {
    /// Creates an observer for the app with the given `pid`. It has no effect
    /// until [`ObserverBuilder::install`] is called.
    pub fn new<F>(pid: pid_t) -> ax::Result<ObserverBuilder<F>>
    where
        F: Fn(AXUIElement, &str) + Send + Sync + 'static,
    {
        let mut observer_ptr: *mut AXObserver = ptr::null_mut();
        let status = unsafe {
            AXObserver::create(pid, Some(internal_callback::<F>), NonNull::from(&mut observer_ptr))
        };
        make_result(status)?;
        let observer = NonNull::new(observer_ptr).ok_or(AxError::CannotComplete)?;
        // SAFETY: AXObserverCreate follows the Create rule.
        Ok(ObserverBuilder(unsafe { CFRetained::from_raw(observer) }, PhantomData))
    }
}

impl<F: Fn(AXUIElement, &str) + Send + Sync + 'static> ObserverBuilder<F> {
    /// Installs the observer with the supplied callback into the main run
    /// loop.
    pub fn install(self, callback: F) -> Observer {
        let source = unsafe { self.0.run_loop_source() };
        if let (Some(run_loop), Some(mode)) = (CFRunLoop::main(), unsafe { kCFRunLoopCommonModes }) {
            run_loop.add_source(Some(&source), Some(mode));
        }
        Observer {
            callback: Box::into_raw(Box::new(callback)) as *mut (),
            dtor: destruct::<F>,
            observer: ManuallyDrop::new(self.0),
        }
    }
}

unsafe fn destruct<T>(ptr: *mut ()) {
    let _ = unsafe { Box::from_raw(ptr as *mut T) };
}

impl Drop for Observer {
    fn drop(&mut self) {
        let source = unsafe { self.observer.run_loop_source() };
        if let (Some(run_loop), Some(mode)) = (CFRunLoop::main(), unsafe { kCFRunLoopCommonModes }) {
            run_loop.remove_source(Some(&source), Some(mode));
        }
        unsafe {
            ManuallyDrop::drop(&mut self.observer);
            (self.dtor)(self.callback);
        }
    }
}

impl Observer {
    pub fn add_notification(&self, elem: &AXUIElement, notification: &'static str) -> ax::Result<()> {
        let notification = CFString::from_static_str(notification);
        let status = unsafe {
            self.observer.add_notification(elem.raw(), &notification, self.callback as *mut c_void)
        };
        match status {
            AXError::NotificationAlreadyRegistered => Ok(()),
            status => make_result(status),
        }
    }

    pub fn remove_notification(&self, elem: &AXUIElement, notification: &'static str) -> ax::Result<()> {
        let notification = CFString::from_static_str(notification);
        make_result(unsafe { self.observer.remove_notification(elem.raw(), &notification) })
    }
}

unsafe extern "C-unwind" fn internal_callback<F: Fn(AXUIElement, &str) + 'static>(
    _observer: NonNull<AXObserver>,
    elem: NonNull<RawAXUIElement>,
    notif: NonNull<CFString>,
    data: *mut c_void,
) {
    let callback = unsafe { &*(data as *const F) };
    let elem = unsafe { AXUIElement::from_get_rule(elem) };
    let notif = unsafe { CFRetained::retain(notif) };
    callback(elem, &notif.to_string());
}

fn make_result(err: AXError) -> ax::Result<()> {
    if err == AXError::Success { Ok(()) } else { Err(err.into()) }
}
