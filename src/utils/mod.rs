//! The `utils` module provides definitions shared across the `dispatchhub`
//! application: the error taxonomy and logging initialisation.

pub mod error;
pub mod logging;

pub use error::{DispatchError, EntityKind, Result};

#[cfg(test)]
mod tests {
    use super::logging::{self, parse_level};
    use crate::config::LogSettings;
    use tracing::Level;

    #[test]
    fn parse_level_accepts_synonyms_and_case() {
        assert_eq!(parse_level("WARNING"), Some(Level::WARN));
        assert_eq!(parse_level(" debug "), Some(Level::DEBUG));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn logging_init_is_repeatable() {
        let mut settings = LogSettings::default();
        logging::init(&settings);
        settings.level = "nonsense".to_string();
        logging::init(&settings);
    }
}
