//! Resolution of unit entry points into typed function tables.

use libloading::Library;

use crate::Error;

/// Declares a table of optional entry points and its loader.
///
/// Fields are named exactly like the exported symbols, their types are the matching `<name>TYPE`
/// aliases of the `fmi-sys` module given after `for`. Symbols in `required` must always resolve,
/// the `model_exchange`, `co_simulation` and `scheduled_execution` groups must resolve when the
/// instance is of that interface type, and `optional` symbols may be absent.
macro_rules! function_table {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident for $sys:ident {
            required: [$($required:ident),* $(,)?],
            optional: [$($optional:ident),* $(,)?],
            model_exchange: [$($me:ident),* $(,)?],
            co_simulation: [$($cs:ident),* $(,)?],
            scheduled_execution: [$($se:ident),* $(,)?] $(,)?
        }
    ) => {
        paste::paste! {
            $(#[$meta])*
            #[allow(non_snake_case)]
            #[derive(Default, Clone, Copy)]
            $vis struct $name {
                $(pub $required: Option<$sys::[<$required TYPE>]>,)*
                $(pub $optional: Option<$sys::[<$optional TYPE>]>,)*
                $(pub $me: Option<$sys::[<$me TYPE>]>,)*
                $(pub $cs: Option<$sys::[<$cs TYPE>]>,)*
                $(pub $se: Option<$sys::[<$se TYPE>]>,)*
            }

            impl $name {
                /// Resolve the table from `library`. `symbol` maps a function name to the name
                /// exported by the library.
                ///
                /// # Safety
                /// The symbols must have the signatures declared by the standard.
                #[allow(unused_variables)]
                pub unsafe fn load(
                    library: &libloading::Library,
                    interface_type: $crate::InterfaceType,
                    symbol: impl Fn(&str) -> String,
                ) -> Result<Self, $crate::Error> {
                    use $crate::binding::{optional, require};
                    #[allow(unused_mut)]
                    let mut table = Self::default();
                    $(table.$required = Some(unsafe { require(library, &symbol(stringify!($required))) }?);)*
                    $(table.$optional = unsafe { optional(library, &symbol(stringify!($optional))) };)*
                    match interface_type {
                        $crate::InterfaceType::ModelExchange => {
                            $(table.$me = Some(unsafe { require(library, &symbol(stringify!($me))) }?);)*
                        }
                        $crate::InterfaceType::CoSimulation => {
                            $(table.$cs = Some(unsafe { require(library, &symbol(stringify!($cs))) }?);)*
                        }
                        $crate::InterfaceType::ScheduledExecution => {
                            $(table.$se = Some(unsafe { require(library, &symbol(stringify!($se))) }?);)*
                        }
                    }
                    Ok(table)
                }
            }
        }
    };
}

/// Call an entry point of `$self.functions`, converting the return value into a [`Status`].
/// An unresolved entry point is reported through the unit's message logger and yields
/// [`Status::Error`].
///
/// [`Status`]: crate::Status
/// [`Status::Error`]: crate::Status::Error
macro_rules! invoke {
    ($self:ident . $f:ident ( $($arg:expr),* $(,)? )) => {
        match $self.functions.$f {
            Some(f) => $crate::Status::from(unsafe { f($self.component, $($arg),*) }),
            None => {
                $self.unit.log_message(
                    $crate::Status::Error,
                    "error",
                    concat!("Function ", stringify!($f), " is not available in shared library."),
                );
                $crate::Status::Error
            }
        }
    };
}

pub(crate) use function_table;
pub(crate) use invoke;

pub(crate) unsafe fn require<T: Copy>(library: &Library, name: &str) -> Result<T, Error> {
    unsafe { library.get::<T>(name.as_bytes()) }
        .map(|symbol| *symbol)
        .map_err(|source| Error::MissingSymbol {
            name: name.to_owned(),
            source,
        })
}

pub(crate) unsafe fn optional<T: Copy>(library: &Library, name: &str) -> Option<T> {
    match unsafe { library.get::<T>(name.as_bytes()) } {
        Ok(symbol) => Some(*symbol),
        Err(_) => {
            log::trace!("Optional symbol {name} not found");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::tests::this_library;

    #[cfg(target_os = "linux")]
    #[test]
    fn test_require_resolves_libc() {
        let library = this_library();
        let strlen: unsafe extern "C" fn(*const std::os::raw::c_char) -> usize =
            unsafe { require(&library, "strlen") }.unwrap();
        assert_eq!(unsafe { strlen(c"four".as_ptr()) }, 4);
    }

    #[test]
    fn test_missing_symbols() {
        let library = this_library();
        let err = unsafe { require::<unsafe extern "C" fn()>(&library, "fmi2NoSuchFunction") }
            .unwrap_err();
        assert!(matches!(err, Error::MissingSymbol { name, .. } if name == "fmi2NoSuchFunction"));

        let missing = unsafe { optional::<unsafe extern "C" fn()>(&library, "fmi2NoSuchFunction") };
        assert!(missing.is_none());
    }
}
