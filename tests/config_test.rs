//! Tests for reading the configuration from the process environment

#[cfg(test)]
mod tests {
    use std::env;

    use serial_test::serial;

    use edge_welcome::core::{AppConfig, ConfigError};

    const VARS: [&str; 3] = ["API_KEY", "GEMINI_API_KEY", "EDGE_GEMINI_MODEL"];

    fn clear_env() {
        for var in VARS {
            // SAFETY: tests touching the environment are serialized
            unsafe { env::remove_var(var) };
        }
    }

    /// Tests a missing key stops start up
    #[test]
    #[serial]
    fn it_fails_without_api_key() {
        clear_env();

        let result = AppConfig::from_env();

        assert_eq!(result.unwrap_err(), ConfigError::MissingApiKey);
    }

    /// Tests values are read from the environment
    #[test]
    #[serial]
    fn it_reads_the_environment() {
        clear_env();
        // SAFETY: tests touching the environment are serialized
        unsafe {
            env::set_var("GEMINI_API_KEY", "env-secret");
            env::set_var("EDGE_GEMINI_MODEL", "gemini-env");
        }

        let config = AppConfig::from_env().unwrap();

        assert_eq!(config.gemini_api_key, "env-secret");
        assert_eq!(config.gemini_model, "gemini-env");
        clear_env();
    }
}
