//! Error handling foundation for teller.
//!
//! Only the `Result` alias lives here. Each crate defines its own error
//! enums in its `error` module and wraps them in rootcause reports, adding
//! layer context with `.context()` as they cross crate boundaries (the
//! gateway into the orchestrator, the orchestrator into the runner).

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "boom")
        }
    }

    impl std::error::Error for Boom {}

    fn fails() -> Result<(), Boom> {
        Err(Boom.into())
    }

    #[test]
    fn domain_errors_convert_into_reports() {
        let err = fails().unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn result_type_works() {
        let ok: Result<i32> = Ok(42);
        assert_eq!(ok.expect("should be ok"), 42);
    }
}
