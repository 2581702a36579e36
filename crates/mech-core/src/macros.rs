/// Return early with a generic error
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::Generic(format!($($arg)*)))
    };
}

/// Return early with an internal invariant violation
#[macro_export]
macro_rules! invariant_bail {
    ($pass:expr, $node:expr, $span:expr, $($arg:tt)*) => {
        return Err($crate::error::Error::internal(
            $pass,
            $node,
            $span,
            format!($($arg)*),
        ))
    };
}

/// Ensure a tree-shape condition holds, or return an internal invariant violation
#[macro_export]
macro_rules! invariant_ensure {
    ($cond:expr, $pass:expr, $node:expr, $span:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::invariant_bail!($pass, $node, $span, $($arg)*);
        }
    };
}

/// Log a warning message
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::tracing::warn!($($arg)*)
    };
}

/// Log a debug message
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::tracing::debug!($($arg)*)
    };
}

/// Log an info message
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::tracing::info!($($arg)*)
    };
}

/// Log a trace message
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::tracing::trace!($($arg)*)
    };
}

/// A macro to generate a common set of derives for a struct.
/// especially Clone, Debug, PartialEq, Eq, Hash and serde
#[macro_export]
macro_rules! common_struct {
    (
        $(#[$attr:meta])*
        pub struct $name:ident { $($t:tt)* }
    ) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $(#[$attr])*
        pub struct $name {
            $($t)*
        }
    };
    (
        $(#[$attr:meta])*
        pub struct $name:ident;
    ) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
        $(#[$attr])*
        pub struct $name;
    };
}

/// Same as [`common_struct!`] for fieldless or payload enums.
#[macro_export]
macro_rules! common_enum {
    (
        $(#[$attr:meta])*
        pub enum $name:ident { $($t:tt)* }
    ) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $(#[$attr])*
        pub enum $name {
            $($t)*
        }
    };
}
