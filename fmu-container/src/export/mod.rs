//! The container's own FMI entry points.
//!
//! The instance handed out to the importer is a boxed [`Container`]. Strings returned through
//! `GetString` stay valid until the next call on the same instance.
//!
//! # Safety
//!
//! The entry points trust the importer to pass instances created by this library and arrays of
//! the stated lengths.
#![allow(clippy::missing_safety_doc)]

use std::{
    borrow::Cow,
    ffi::{CStr, CString},
    os::raw::c_char,
};

use fmi_unit::Status;

use crate::System;

pub mod fmi2;
pub mod fmi3;

/// Setup recorded by `fmi2SetupExperiment` until `fmi2EnterInitializationMode`
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Experiment {
    pub tolerance: Option<f64>,
    pub start_time: f64,
    pub stop_time: Option<f64>,
}

#[derive(Debug)]
pub struct Container {
    pub system: System,
    pub experiment: Experiment,
    strings: Vec<CString>,
}

impl Container {
    pub fn new(system: System) -> Self {
        Self {
            system,
            experiment: Experiment::default(),
            strings: Vec::new(),
        }
    }

    /// Keep `values` alive until the next call and return pointers to them
    fn hold_strings(&mut self, values: Vec<String>) -> Vec<*const c_char> {
        self.strings = values.into_iter().map(truncated).collect();
        self.strings.iter().map(|s| s.as_ptr()).collect()
    }

    fn not_implemented(&self, function: &str) -> Status {
        self.system.log(
            Status::Error,
            "logError",
            &format!("{function}: Function is not implemented."),
        );
        Status::Error
    }
}

/// `value` up to its first NUL
fn truncated(value: impl Into<Vec<u8>>) -> CString {
    CString::new(value).unwrap_or_else(|e| {
        let nul = e.nul_position();
        let mut bytes = e.into_vec();
        bytes.truncate(nul);
        CString::new(bytes).unwrap_or_default()
    })
}

/// Borrow a C string, treating null as empty
fn lossy<'a>(s: *const c_char) -> Cow<'a, str> {
    if s.is_null() {
        Cow::Borrowed("")
    } else {
        unsafe { CStr::from_ptr(s) }.to_string_lossy()
    }
}

/// Borrow `n` elements at `ptr`, treating null as empty
unsafe fn slice<'a, T>(ptr: *const T, n: usize) -> &'a [T] {
    if ptr.is_null() || n == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(ptr, n) }
    }
}

unsafe fn slice_mut<'a, T>(ptr: *mut T, n: usize) -> &'a mut [T] {
    if ptr.is_null() || n == 0 {
        &mut []
    } else {
        unsafe { std::slice::from_raw_parts_mut(ptr, n) }
    }
}

/// Dereference the instance handle, returning Error from the calling function if it is null
macro_rules! checked_deref {
    ($ptr:expr, $error:expr) => {{
        if ($ptr as *mut ::std::os::raw::c_void).is_null() {
            log::error!("Invalid container instance");
            return $error;
        }
        unsafe { &mut *($ptr as *mut $crate::export::Container) }
    }};
}

pub(crate) use checked_deref;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slices() {
        let values = [1, 2, 3];
        assert_eq!(unsafe { slice(values.as_ptr(), 2) }, &[1, 2]);
        assert!(unsafe { slice::<i32>(std::ptr::null(), 2) }.is_empty());
        assert!(unsafe { slice_mut::<i32>(std::ptr::null_mut(), 2) }.is_empty());
        assert_eq!(lossy(std::ptr::null()), "");
        assert_eq!(lossy(c"abc".as_ptr()), "abc");
    }

    #[test]
    fn test_truncated_at_nul() {
        assert_eq!(truncated("value 1\0 hidden").as_bytes(), b"value 1");
        assert_eq!(truncated("plain").as_bytes(), b"plain");
        assert_eq!(truncated("\0").as_bytes(), b"");
    }
}
