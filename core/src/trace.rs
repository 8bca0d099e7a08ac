//! Logging macros that compile to nothing unless the `tracing` feature is on.

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, info, warn};

#[cfg(not(feature = "tracing"))]
macro_rules! debug {
    ($($t: tt)*) => {
        if false {
            let _ = ::std::format!($($t)*);
        }
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! info {
    ($($t: tt)*) => {
        if false {
            let _ = ::std::format!($($t)*);
        }
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! warn_ {
    ($($t: tt)*) => {
        if false {
            let _ = ::std::format!($($t)*);
        }
    };
}

#[cfg(not(feature = "tracing"))]
pub(crate) use {debug, info, warn_ as warn};
