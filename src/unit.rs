//! A loaded simulation-unit shared library, the callbacks it reports to, and the state the typed
//! wrappers keep about it.

use std::{
    borrow::Cow,
    ffi::{CStr, CString},
    os::raw::c_char,
    path::Path,
    sync::Arc,
};

use fmi_sys::logger::LogSink;

use crate::{Error, Status, format::Formatter};

/// Receives `(unit name, status, category, message)` for every message a unit logs
pub type LogMessageFn = dyn Fn(&str, Status, &str, &str) + Send + Sync;

/// Receives `(unit name, status, formatted call)` after every call into a unit
pub type LogCallFn = dyn Fn(&str, Status, &str) + Send + Sync;

/// Lifecycle state of a unit.
///
/// Each state occupies one bit so that callers can test against a set of allowed states.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum State {
    #[default]
    StartAndEnd = 1 << 0,
    Instantiated = 1 << 1,
    InitializationMode = 1 << 2,
    EventMode = 1 << 3,
    ContinuousTimeMode = 1 << 4,
    StepComplete = 1 << 5,
    StepInProgress = 1 << 6,
    StepFailed = 1 << 7,
    StepCanceled = 1 << 8,
    Terminated = 1 << 9,
    Error = 1 << 10,
    Fatal = 1 << 11,
}

impl State {
    #[inline]
    pub fn bits(self) -> u32 {
        self as u32
    }

    /// True if this state is contained in the `mask` of states
    #[inline]
    pub fn is_in(self, mask: u32) -> bool {
        self.bits() & mask != 0
    }
}

pub struct UnitHandle {
    name: String,
    library: libloading::Library,
    sink: Arc<LogSink>,
    log_call: Option<Arc<LogCallFn>>,
    pub(crate) time: f64,
    pub(crate) state: State,
    pub(crate) status: Status,
    formatter: Formatter,
}

impl std::fmt::Debug for UnitHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitHandle")
            .field("name", &self.name)
            .field("time", &self.time)
            .field("state", &self.state)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl UnitHandle {
    /// Load the shared library at `library_path`.
    ///
    /// Dependencies that ship next to the library are resolved from its own directory.
    pub fn new(
        name: &str,
        library_path: impl AsRef<Path>,
        log_message: Option<Arc<LogMessageFn>>,
        log_call: Option<Arc<LogCallFn>>,
    ) -> Result<Self, Error> {
        let library_path = library_path.as_ref();
        log::debug!("Loading shared library {library_path:?}");
        let library = load_library(library_path)?;
        Ok(Self::from_library(name, library, log_message, log_call))
    }

    /// Wrap an already loaded library
    pub fn from_library(
        name: &str,
        library: libloading::Library,
        log_message: Option<Arc<LogMessageFn>>,
        log_call: Option<Arc<LogCallFn>>,
    ) -> Self {
        let sink = {
            let name = name.to_owned();
            match log_message {
                Some(log_message) => LogSink::new(move |status, category, message| {
                    log_message(&name, Status::from(status), category, message)
                }),
                None => LogSink::new(move |status, category, message| {
                    log_to_facade(&name, Status::from(status), category, message)
                }),
            }
        };

        Self {
            name: name.to_owned(),
            library,
            sink: Arc::new(sink),
            log_call,
            time: 0.0,
            state: State::StartAndEnd,
            status: Status::OK,
            formatter: Formatter::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The most severe status returned so far
    pub fn status(&self) -> Status {
        self.status
    }

    pub fn library(&self) -> &libloading::Library {
        &self.library
    }

    pub(crate) fn sink(&self) -> &Arc<LogSink> {
        &self.sink
    }

    /// Report a message through the unit's message logger
    pub fn log_message(&self, status: Status, category: &str, message: &str) {
        self.sink.log(status.into(), category, message);
    }

    /// True if a call-trace logger is registered
    pub fn is_tracing(&self) -> bool {
        self.log_call.is_some()
    }

    /// Emit a call trace. `message` is only evaluated when a call-trace logger is registered.
    pub(crate) fn trace_with<F>(&mut self, status: Status, message: F)
    where
        F: FnOnce(&mut Formatter) -> String,
    {
        if let Some(log_call) = &self.log_call {
            let message = message(&mut self.formatter);
            log_call(&self.name, status, &message);
        }
    }

    pub(crate) fn trace(&mut self, status: Status, call: &str) {
        if let Some(log_call) = &self.log_call {
            log_call(&self.name, status, call);
        }
    }

    /// Record the outcome of a communication step in the lifecycle state
    pub(crate) fn finish_step(&mut self, status: Status) {
        self.state = match status {
            Status::Pending => State::StepInProgress,
            status if status.is_failure() => State::StepFailed,
            _ => State::StepComplete,
        };
    }

    /// Fold `status` into the worst status seen so far
    pub(crate) fn fold_status(&mut self, status: Status) -> Status {
        self.status = self.status.max(status);
        status
    }

    /// Resolve a function table, reporting a missing symbol through the message logger
    pub(crate) fn load_functions<T>(
        &self,
        load: impl FnOnce(&libloading::Library) -> Result<T, Error>,
    ) -> Result<T, Error> {
        load(&self.library).inspect_err(|err| {
            if let Error::MissingSymbol { name, .. } = err {
                self.log_message(
                    Status::Error,
                    "error",
                    &format!("Symbol {name} is missing in shared library."),
                );
            }
        })
    }
}

fn log_to_facade(name: &str, status: Status, category: &str, message: &str) {
    log::logger().log(
        &log::Record::builder()
            .args(format_args!("[{name}] {category}: {message}"))
            .level(status.log_level())
            .module_path(Some("fmu"))
            .target(name)
            .build(),
    );
}

#[cfg(windows)]
fn load_library(path: &Path) -> Result<libloading::Library, Error> {
    use libloading::os::windows::{
        LOAD_LIBRARY_SEARCH_DEFAULT_DIRS, LOAD_LIBRARY_SEARCH_DLL_LOAD_DIR, Library,
    };
    // The DLL's own directory is searched for its dependencies for this load only
    let path = std::path::absolute(path)?;
    let library = unsafe {
        Library::load_with_flags(
            &path,
            LOAD_LIBRARY_SEARCH_DLL_LOAD_DIR | LOAD_LIBRARY_SEARCH_DEFAULT_DIRS,
        )
    }?;
    Ok(library.into())
}

#[cfg(not(windows))]
fn load_library(path: &Path) -> Result<libloading::Library, Error> {
    Ok(unsafe { libloading::Library::new(path) }?)
}

/// Copy a C string returned by a unit, treating null as empty
pub(crate) fn owned_str(s: *const c_char) -> Result<String, Error> {
    if s.is_null() {
        return Ok(String::new());
    }
    Ok(unsafe { CStr::from_ptr(s) }.to_str()?.to_owned())
}

pub(crate) fn c_strings(values: &[&str]) -> Result<Vec<CString>, Error> {
    values
        .iter()
        .map(|value| CString::new(*value).map_err(Error::from))
        .collect()
}

/// Borrow a C string, treating null as empty
pub(crate) fn lossy<'a>(s: *const c_char) -> Cow<'a, str> {
    if s.is_null() {
        Cow::Borrowed("")
    } else {
        unsafe { CStr::from_ptr(s) }.to_string_lossy()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Messages and call traces recorded by a test unit
    #[derive(Default)]
    pub(crate) struct Recorder {
        pub messages: Mutex<Vec<(String, Status, String, String)>>,
        pub calls: Mutex<Vec<(Status, String)>>,
    }

    impl Recorder {
        pub fn calls(&self) -> Vec<(Status, String)> {
            self.calls.lock().unwrap().clone()
        }

        pub fn last_call(&self) -> String {
            self.calls.lock().unwrap().last().unwrap().1.clone()
        }

        pub fn messages(&self) -> Vec<(String, Status, String, String)> {
            self.messages.lock().unwrap().clone()
        }
    }

    /// A unit backed by the test executable itself, recording everything it reports
    pub(crate) fn recording_unit(name: &str) -> (UnitHandle, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let log_message: Arc<LogMessageFn> = {
            let recorder = recorder.clone();
            Arc::new(move |name: &str, status, category: &str, message: &str| {
                recorder.messages.lock().unwrap().push((
                    name.to_owned(),
                    status,
                    category.to_owned(),
                    message.to_owned(),
                ))
            })
        };
        let log_call: Arc<LogCallFn> = {
            let recorder = recorder.clone();
            Arc::new(move |_: &str, status, call: &str| {
                recorder.calls.lock().unwrap().push((status, call.to_owned()))
            })
        };
        (
            UnitHandle::from_library(name, this_library(), Some(log_message), Some(log_call)),
            recorder,
        )
    }

    #[cfg(unix)]
    pub(crate) fn this_library() -> libloading::Library {
        libloading::os::unix::Library::this().into()
    }

    #[cfg(windows)]
    pub(crate) fn this_library() -> libloading::Library {
        libloading::os::windows::Library::this().unwrap().into()
    }

    #[test_log::test]
    fn test_load_failure() {
        let result = UnitHandle::new("missing", "/nonexistent/libnothing.so", None, None);
        assert!(matches!(result, Err(Error::LibLoading { .. })));
    }

    #[test_log::test]
    fn test_new_handle_defaults() {
        let (unit, recorder) = recording_unit("unit");
        assert_eq!(unit.name(), "unit");
        assert_eq!(unit.time(), 0.0);
        assert_eq!(unit.state(), State::StartAndEnd);
        assert_eq!(unit.status(), Status::OK);
        assert!(unit.is_tracing());
        assert!(recorder.calls().is_empty());
    }

    #[test_log::test]
    fn test_trace_is_lazy_without_logger() {
        let mut unit = UnitHandle::from_library("quiet", this_library(), None, None);
        unit.trace_with(Status::OK, |_| panic!("formatted without a call logger"));
    }

    #[test_log::test]
    fn test_messages_carry_unit_name() {
        let (unit, recorder) = recording_unit("unit");
        unit.log_message(Status::Warning, "logEvents", "hello");
        assert_eq!(
            recorder.messages(),
            vec![(
                "unit".to_owned(),
                Status::Warning,
                "logEvents".to_owned(),
                "hello".to_owned()
            )]
        );
    }

    #[test_log::test]
    fn test_fold_status_keeps_worst() {
        let (mut unit, _) = recording_unit("unit");
        unit.fold_status(Status::Discard);
        unit.fold_status(Status::Warning);
        assert_eq!(unit.status(), Status::Discard);
    }

    #[test]
    fn test_state_mask() {
        let mask = State::StepComplete.bits() | State::EventMode.bits();
        assert!(State::EventMode.is_in(mask));
        assert!(!State::Terminated.is_in(mask));
    }
}
