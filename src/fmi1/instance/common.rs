use std::ptr;

use crate::{
    Error, Status,
    fmi1::binding,
    unit::{c_strings, lossy, owned_str},
};

use super::{Instance, call, impl_getter_setter};

impl<Tag> Instance<Tag> {
    pub fn get_version(&mut self) -> Result<String, Error> {
        let get_version = self
            .functions
            .fmiGetVersion
            .ok_or(Error::Unavailable("fmiGetVersion"))?;
        let version = owned_str(unsafe { get_version() })?;
        self.unit.trace(Status::OK, "fmiGetVersion()");
        Ok(version)
    }

    pub fn set_debug_logging(&mut self, logging_on: bool) -> Status {
        let status = call!(self.fmiSetDebugLogging(logging_on as binding::fmiBoolean));
        self.unit.trace_with(status, |_| {
            format!("fmiSetDebugLogging(loggingOn={})", logging_on as i32)
        });
        status
    }

    impl_getter_setter!(binding::fmiReal, get_real, set_real, fmiGetReal, fmiSetReal);
    impl_getter_setter!(
        binding::fmiInteger,
        get_integer,
        set_integer,
        fmiGetInteger,
        fmiSetInteger
    );

    pub fn get_boolean(&mut self, vrs: &[binding::fmiValueReference], values: &mut [bool]) -> Status {
        if values.len() < vrs.len() {
            return self.invalid_arguments("fmiGetBoolean", "fewer values than value references");
        }
        let mut raw = vec![binding::fmiFalse; vrs.len()];
        let status = call!(self.fmiGetBoolean(vrs.as_ptr(), vrs.len(), raw.as_mut_ptr()));
        for (value, raw) in values.iter_mut().zip(&raw) {
            *value = *raw != binding::fmiFalse;
        }
        self.unit.trace_with(status, |fmt| {
            let raw: Vec<i8> = raw.iter().map(|&b| b as i8).collect();
            let (vrs_str, values_str) = fmt.format(vrs, &raw);
            format!("fmiGetBoolean(vr={vrs_str}, nvr={}, value={values_str})", vrs.len())
        });
        status
    }

    pub fn set_boolean(&mut self, vrs: &[binding::fmiValueReference], values: &[bool]) -> Status {
        if values.len() < vrs.len() {
            return self.invalid_arguments("fmiSetBoolean", "fewer values than value references");
        }
        let raw: Vec<binding::fmiBoolean> = values[..vrs.len()]
            .iter()
            .map(|&value| value as binding::fmiBoolean)
            .collect();
        let status = call!(self.fmiSetBoolean(vrs.as_ptr(), vrs.len(), raw.as_ptr()));
        self.unit.trace_with(status, |fmt| {
            let (vrs_str, values_str) = fmt.format(vrs, &values[..vrs.len()]);
            format!("fmiSetBoolean(vr={vrs_str}, nvr={}, value={values_str})", vrs.len())
        });
        status
    }

    pub fn get_string(&mut self, vrs: &[binding::fmiValueReference], values: &mut [String]) -> Status {
        if values.len() < vrs.len() {
            return self.invalid_arguments("fmiGetString", "fewer values than value references");
        }
        let mut raw: Vec<binding::fmiString> = vec![ptr::null(); vrs.len()];
        let status = call!(self.fmiGetString(vrs.as_ptr(), vrs.len(), raw.as_mut_ptr()));
        for (value, raw) in values.iter_mut().zip(&raw) {
            *value = lossy(*raw).into_owned();
        }
        self.unit.trace_with(status, |fmt| {
            let (vrs_str, values_str) = fmt.format(vrs, &raw);
            format!("fmiGetString(vr={vrs_str}, nvr={}, value={values_str})", vrs.len())
        });
        status
    }

    pub fn set_string(&mut self, vrs: &[binding::fmiValueReference], values: &[&str]) -> Status {
        if values.len() < vrs.len() {
            return self.invalid_arguments("fmiSetString", "fewer values than value references");
        }
        let Ok(values_c) = c_strings(&values[..vrs.len()]) else {
            return self.invalid_arguments("fmiSetString", "value contains a nul byte");
        };
        let raw: Vec<binding::fmiString> = values_c.iter().map(|v| v.as_ptr()).collect();
        let status = call!(self.fmiSetString(vrs.as_ptr(), vrs.len(), raw.as_ptr()));
        self.unit.trace_with(status, |fmt| {
            let (vrs_str, values_str) = fmt.format(vrs, &values[..vrs.len()]);
            format!("fmiSetString(vr={vrs_str}, nvr={}, value={values_str})", vrs.len())
        });
        status
    }
}
