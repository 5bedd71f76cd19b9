//! The `utils` module provides shared definitions used across `upsub`:
//! the error types and logging setup.

pub mod error;
pub mod logging;

#[cfg(test)]
mod tests {
    use super::error::{BrokerError, PatternError, StoreError};
    use super::logging;

    #[test]
    fn logging_init_accepts_levels() {
        // Should not panic
        logging::init("info");
        logging::init("debug");
        logging::init("warn");
    }

    #[test]
    fn parse_level_falls_back_to_info() {
        assert_eq!(logging::parse_level("DEBUG"), tracing::Level::DEBUG);
        assert_eq!(logging::parse_level("warning"), tracing::Level::WARN);
        assert_eq!(logging::parse_level("loud"), tracing::Level::INFO);
    }

    #[test]
    fn already_exists_is_recognised() {
        let err = StoreError::AlreadyExists {
            kind: "collection",
            name: "MQ/messages".to_string(),
        };
        assert!(err.is_already_exists());
        assert!(!StoreError::Disconnected.is_already_exists());
        assert_eq!(err.to_string(), "collection 'MQ/messages' already exists");
    }

    #[test]
    fn pattern_errors_convert_into_broker_errors() {
        let err: BrokerError = PatternError::NoBindings.into();
        assert!(matches!(err, BrokerError::Pattern(PatternError::NoBindings)));
    }
}
