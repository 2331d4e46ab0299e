use emdr_domain::config::{Config, ConfigSeverity};

/// Print every config issue.  Returns `true` when there are no errors
/// (warnings are allowed).
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }
    println!("\n{error_count} error(s), {warning_count} warning(s) in {config_path}");

    error_count == 0
}

/// Render the resolved config (all defaults filled in) as TOML.
pub fn show(config: &Config) -> anyhow::Result<String> {
    toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("serializing config: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates_with_warnings_only() {
        assert!(validate(&Config::default(), "config.toml"));
    }

    #[test]
    fn show_includes_session_limit() {
        let rendered = show(&Config::default()).unwrap();
        assert!(rendered.contains("max_sessions = 50"));
        assert!(rendered.contains("[sessions.eviction]"));
    }
}
