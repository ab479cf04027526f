//! Bridge between the C-variadic FMI 1.0 / 2.0 logger callbacks and Rust closures.
//!
//! `logger.c` formats the variadic message and calls `fmi_sys_log_forward`, which resolves a
//! [`LogSink`] either from the component environment (FMI 2.0) or from the sink that is current on
//! the calling thread (FMI 1.0, see [`LogSink::enter`]).

use std::{
    cell::Cell,
    ffi::{CStr, c_void},
    marker::PhantomData,
    os::raw::{c_char, c_int},
    ptr,
};

use crate::{fmi1, fmi2};

/// Receives `(status, category, message)` for every message a unit logs.
pub type LogFn = dyn Fn(c_int, &str, &str) + Send + Sync;

/// Destination of formatted unit messages.
///
/// A `LogSink` must outlive every unit it has been registered with, since its address is handed
/// to the unit as `componentEnvironment`.
pub struct LogSink {
    callback: Box<LogFn>,
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink").finish_non_exhaustive()
    }
}

thread_local! {
    static CURRENT: Cell<*const LogSink> = const { Cell::new(ptr::null()) };
}

impl LogSink {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(c_int, &str, &str) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    pub fn log(&self, status: c_int, category: &str, message: &str) {
        (self.callback)(status, category, message)
    }

    /// The pointer passed to the unit as its logger environment.
    pub fn as_environment(&self) -> *mut c_void {
        self as *const Self as *mut c_void
    }

    /// Make this sink the target of environment-less log calls on the current thread until the
    /// returned guard is dropped. Guards nest; dropping one restores the previous sink.
    pub fn enter(&self) -> SinkGuard<'_> {
        let previous = CURRENT.with(|current| current.replace(self as *const Self));
        SinkGuard {
            previous,
            _sink: PhantomData,
        }
    }

    /// Resolve the sink behind a logger environment, falling back to the thread's current sink
    /// when `environment` is null.
    ///
    /// # Safety
    /// A non-null `environment` must have been obtained from [`LogSink::as_environment`] on a sink
    /// that is still alive.
    pub unsafe fn resolve<'a>(environment: *mut c_void) -> Option<&'a LogSink> {
        let sink = if environment.is_null() {
            CURRENT.with(Cell::get)
        } else {
            environment as *const LogSink
        };
        unsafe { sink.as_ref() }
    }
}

/// Restores the previously current sink when dropped.
#[must_use]
pub struct SinkGuard<'a> {
    previous: *const LogSink,
    _sink: PhantomData<&'a LogSink>,
}

impl Drop for SinkGuard<'_> {
    fn drop(&mut self) {
        CURRENT.with(|current| current.set(self.previous));
    }
}

fn lossy<'a>(s: *const c_char) -> std::borrow::Cow<'a, str> {
    if s.is_null() {
        "".into()
    } else {
        unsafe { CStr::from_ptr(s) }.to_string_lossy()
    }
}

/// This function gets called from logger.c
#[unsafe(no_mangle)]
extern "C" fn fmi_sys_log_forward(
    environment: *mut c_void,
    _instance_name: *const c_char,
    status: c_int,
    category: *const c_char,
    message: *const c_char,
) {
    if let Some(sink) = unsafe { LogSink::resolve(environment) } {
        sink.log(status, &lossy(category), &lossy(message));
    }
}

// Linked through the `fmilogger` static library emitted by build.rs
unsafe extern "C" {
    /// FMI 1.0 logger, implemented in logger.c. Routes to the thread's current [`LogSink`].
    pub fn fmi1_callback_logger(
        c: fmi1::fmiComponent,
        instanceName: fmi1::fmiString,
        status: fmi1::fmiStatus,
        category: fmi1::fmiString,
        message: fmi1::fmiString,
        ...
    );

    /// FMI 2.0 logger, implemented in logger.c. `componentEnvironment` must be a [`LogSink`].
    pub fn fmi2_callback_logger(
        componentEnvironment: fmi2::fmi2ComponentEnvironment,
        instanceName: fmi2::fmi2String,
        status: fmi2::fmi2Status,
        category: fmi2::fmi2String,
        message: fmi2::fmi2String,
        ...
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording_sink() -> (LogSink, Arc<Mutex<Vec<(c_int, String, String)>>>) {
        let records = Arc::new(Mutex::new(Vec::new()));
        let sink = LogSink::new({
            let records = records.clone();
            move |status, category, message| {
                records
                    .lock()
                    .unwrap()
                    .push((status, category.to_owned(), message.to_owned()))
            }
        });
        (sink, records)
    }

    #[test]
    fn test_fmi2_logger_formats_variadic_message() {
        let (sink, records) = recording_sink();
        unsafe {
            fmi2_callback_logger(
                sink.as_environment(),
                c"inst".as_ptr(),
                fmi2::fmi2Status_fmi2Warning,
                c"logAll".as_ptr(),
                c"x=%d, y=%s".as_ptr(),
                42 as c_int,
                c"abc".as_ptr(),
            );
        }
        let records = records.lock().unwrap();
        assert_eq!(
            records.as_slice(),
            &[(1, "logAll".to_owned(), "x=42, y=abc".to_owned())]
        );
    }

    #[test]
    fn test_fmi1_logger_uses_thread_current_sink() {
        let (outer, outer_records) = recording_sink();
        let (inner, inner_records) = recording_sink();

        let _outer = outer.enter();
        {
            let _inner = inner.enter();
            unsafe {
                fmi1_callback_logger(
                    ptr::null_mut(),
                    c"inst".as_ptr(),
                    fmi1::fmiStatus_fmiOK,
                    c"cat".as_ptr(),
                    c"%g".as_ptr(),
                    1.5f64,
                );
            }
        }
        unsafe {
            fmi1_callback_logger(
                ptr::null_mut(),
                c"inst".as_ptr(),
                fmi1::fmiStatus_fmiError,
                c"cat".as_ptr(),
                c"after".as_ptr(),
            );
        }

        assert_eq!(inner_records.lock().unwrap()[0].2, "1.5");
        assert_eq!(
            outer_records.lock().unwrap()[0],
            (3, "cat".to_owned(), "after".to_owned())
        );
    }

    #[test]
    fn test_message_without_sink_is_dropped() {
        // No sink entered on this thread
        fmi_sys_log_forward(
            ptr::null_mut(),
            ptr::null(),
            0,
            ptr::null(),
            c"ignored".as_ptr(),
        );
    }
}
