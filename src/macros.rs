macro_rules! function {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        type_name_of(f)
            .rsplit("::")
            .find(|&part| part != "f" && part != "{{closure}}")
            .unwrap_or("<unknown>")
    }};
}

/// Aborts compilation after an internal invariant of the compiler was
/// violated. These are bugs in the compiler (or in whatever constructed the
/// HIR), never problems with the user's program.
macro_rules! ice {
    ($($arg:tt)+) => {{
        let message = format!($($arg)+);

        #[cfg(feature = "error-backtrace")]
        let message = format!(
            "{}\n  at {}::{} (at {}:{}:{})",
            message,
            module_path!(),
            $crate::macros::function!(),
            file!(),
            line!(),
            column!()
        );

        panic!("internal compiler error: {message}")
    }};
}

pub(crate) use {function, ice};
