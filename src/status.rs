use std::os::raw::c_int;

/// Status returned by every FMI function, ordered by severity.
///
/// `Pending` compares worse than `Fatal`, so folding statuses with [`Ord::max`] treats an
/// asynchronous step that has not finished as the most severe outcome.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum Status {
    #[default]
    OK = 0,
    Warning = 1,
    Discard = 2,
    Error = 3,
    Fatal = 4,
    Pending = 5,
}

impl Status {
    /// True for any status worse than [`Status::Warning`]
    #[inline]
    pub fn is_failure(self) -> bool {
        self > Status::Warning
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::OK => "OK",
            Status::Warning => "Warning",
            Status::Discard => "Discard",
            Status::Error => "Error",
            Status::Fatal => "Fatal",
            Status::Pending => "Pending",
        }
    }

    pub fn log_level(self) -> log::Level {
        match self {
            Status::OK => log::Level::Info,
            Status::Warning | Status::Discard => log::Level::Warn,
            Status::Error | Status::Fatal => log::Level::Error,
            Status::Pending => log::Level::Debug,
        }
    }
}

impl From<c_int> for Status {
    fn from(status: c_int) -> Self {
        match status {
            0 => Status::OK,
            1 => Status::Warning,
            2 => Status::Discard,
            3 => Status::Error,
            4 => Status::Fatal,
            5 => Status::Pending,
            other => {
                log::warn!("Unknown status value {other}");
                Status::Error
            }
        }
    }
}

impl From<Status> for c_int {
    fn from(status: Status) -> Self {
        status as c_int
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        let ordered = [
            Status::OK,
            Status::Warning,
            Status::Discard,
            Status::Error,
            Status::Fatal,
            Status::Pending,
        ];
        assert!(ordered.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(ordered.into_iter().max(), Some(Status::Pending));
    }

    #[test]
    fn test_pending_is_worse_than_fatal() {
        assert_eq!(Status::Fatal.max(Status::Pending), Status::Pending);
        assert!(Status::Pending.is_failure());
    }

    #[test]
    fn test_failure_threshold() {
        assert!(!Status::OK.is_failure());
        assert!(!Status::Warning.is_failure());
        assert!(Status::Discard.is_failure());
    }

    #[test]
    fn test_raw_conversion() {
        assert_eq!(Status::from(2), Status::Discard);
        assert_eq!(Status::from(42), Status::Error);
        assert_eq!(c_int::from(Status::Fatal), 4);
    }
}
