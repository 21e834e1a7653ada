use crate::config::types::{
    ClientConfig, Config, ContentLengthConfig, CrawlerConfig, FrontierSettings, OutputConfig,
};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_client_config(&config.client)?;
    validate_content_length_config(&config.content_length)?;
    validate_frontier_settings(&config.frontier)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.session_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "session-id cannot be empty".to_string(),
        ));
    }

    if config.thread_count < 1 || config.thread_count > 100 {
        return Err(ConfigError::Validation(format!(
            "thread-count must be between 1 and 100, got {}",
            config.thread_count
        )));
    }

    if config.max_thread_check_count < 1 {
        return Err(ConfigError::Validation(format!(
            "max-thread-check-count must be >= 1, got {}",
            config.max_thread_check_count
        )));
    }

    for seed in &config.seeds {
        validate_seed(seed)?;
    }

    for pattern in config.include.iter().chain(&config.exclude) {
        Regex::new(pattern).map_err(|e| {
            ConfigError::InvalidPattern(format!("Invalid url filter '{}': {}", pattern, e))
        })?;
    }

    Ok(())
}

/// Seeds must be absolute URLs with a scheme a bundled client can serve
fn validate_seed(seed: &str) -> Result<(), ConfigError> {
    let url = Url::parse(seed)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

    match url.scheme() {
        "http" | "https" | "file" => Ok(()),
        other => Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' uses unsupported scheme '{}'",
            seed, other
        ))),
    }
}

/// Validates client configuration
fn validate_client_config(config: &ClientConfig) -> Result<(), ConfigError> {
    if config.max_retry_count < 1 {
        return Err(ConfigError::Validation(format!(
            "max-retry-count must be >= 1, got {}",
            config.max_retry_count
        )));
    }

    if config.access_timeout == Some(0) {
        return Err(ConfigError::Validation(
            "access-timeout must be > 0 when set".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    for rule in &config.rules {
        Regex::new(&rule.pattern).map_err(|e| {
            ConfigError::InvalidPattern(format!("Invalid client pattern '{}': {}", rule.pattern, e))
        })?;
    }

    Ok(())
}

/// Validates content length limits
fn validate_content_length_config(config: &ContentLengthConfig) -> Result<(), ConfigError> {
    if config.default == 0 {
        return Err(ConfigError::Validation(
            "content-length default must be > 0".to_string(),
        ));
    }

    for (mime_type, limit) in &config.mime_types {
        if mime_type.trim().is_empty() {
            return Err(ConfigError::Validation(
                "content-length mime type cannot be empty".to_string(),
            ));
        }
        if *limit == 0 {
            return Err(ConfigError::Validation(format!(
                "content-length limit for '{}' must be > 0",
                mime_type
            )));
        }
    }

    Ok(())
}

/// Validates frontier sizing
fn validate_frontier_settings(settings: &FrontierSettings) -> Result<(), ConfigError> {
    let sizes = [
        ("page-size", settings.page_size),
        ("buffer-size", settings.buffer_size),
        ("visited-cache-size", settings.visited_cache_size),
        ("generated-page-size", settings.generated_page_size),
    ];

    for (name, value) in sizes {
        if value == 0 {
            return Err(ConfigError::Validation(format!(
                "frontier {} must be > 0",
                name
            )));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
