//! INI parsing: maps `config.ini` keys onto [`EngineSettings`].
//!
//! ```ini
//! [endpoint]
//! base_url = http://localhost/tile
//!
//! [output]
//! root = ~/tiles
//! worker_root = /data/tiles
//! tile_check = png
//!
//! [worker]
//! template = python
//! container = osm-tools
//! fetch_attempts = 3
//! backoff_ms = 500
//! request_timeout_secs = 30
//!
//! [supervisor]
//! timeout_secs = 3600
//! grace_secs = 10
//!
//! [retry]
//! max_rounds = 3
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};

use super::settings::{ConfigFileError, EngineSettings};
use crate::reconcile::TileCheck;
use crate::worker::template_by_name;

/// Starts from `EngineSettings::default()` and overlays any values found.
pub(super) fn parse_ini(ini: &Ini) -> Result<EngineSettings, ConfigFileError> {
    let mut config = EngineSettings::default();

    // [endpoint] section
    if let Some(section) = ini.section(Some("endpoint")) {
        if let Some(v) = non_empty(section, "base_url") {
            if !v.contains("://") {
                return Err(invalid("endpoint", "base_url", v, "must be a URL like http://host/tile"));
            }
            config.endpoint.base_url = v.to_string();
        }
    }

    // [output] section
    if let Some(section) = ini.section(Some("output")) {
        if let Some(v) = non_empty(section, "root") {
            config.output.root = expand_tilde(v);
        }
        if let Some(v) = non_empty(section, "worker_root") {
            config.output.worker_root = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty(section, "tile_check") {
            config.output.tile_check = TileCheck::from_str(v)
                .map_err(|_| invalid("output", "tile_check", v, "must be 'nonempty' or 'png'"))?;
        }
    }

    // [worker] section
    if let Some(section) = ini.section(Some("worker")) {
        if let Some(v) = non_empty(section, "template") {
            let v = v.to_lowercase();
            if template_by_name(&v).is_none() {
                return Err(invalid("worker", "template", &v, "must be 'python' or 'shell'"));
            }
            config.worker.template = v;
        }
        if let Some(v) = non_empty(section, "launcher") {
            config.worker.launcher = Some(v.to_string());
        }
        if let Some(v) = non_empty(section, "container") {
            config.worker.container = Some(v.to_string());
        }
        if let Some(v) = non_empty(section, "fetch_attempts") {
            config.worker.fetch.attempts = parse_positive("worker", "fetch_attempts", v)?;
        }
        if let Some(v) = non_empty(section, "backoff_ms") {
            let ms: u64 = v
                .parse()
                .map_err(|_| invalid("worker", "backoff_ms", v, "must be an integer (milliseconds)"))?;
            config.worker.fetch.backoff = Duration::from_millis(ms);
        }
        if let Some(v) = non_empty(section, "request_timeout_secs") {
            let secs: u32 = parse_positive("worker", "request_timeout_secs", v)?;
            config.worker.fetch.request_timeout = Duration::from_secs(u64::from(secs));
        }
    }

    // [supervisor] section
    if let Some(section) = ini.section(Some("supervisor")) {
        if let Some(v) = non_empty(section, "timeout_secs") {
            let secs: u64 = v.parse().map_err(|_| {
                invalid("supervisor", "timeout_secs", v, "must be an integer (seconds, 0 = none)")
            })?;
            config.supervisor.timeout = (secs > 0).then_some(Duration::from_secs(secs));
        }
        if let Some(v) = non_empty(section, "grace_secs") {
            let secs: u64 = v
                .parse()
                .map_err(|_| invalid("supervisor", "grace_secs", v, "must be an integer (seconds)"))?;
            config.supervisor.grace_period = Duration::from_secs(secs);
        }
    }

    // [retry] section
    if let Some(section) = ini.section(Some("retry")) {
        if let Some(v) = non_empty(section, "max_rounds") {
            config.retry.max_rounds = v
                .parse()
                .map_err(|_| invalid("retry", "max_rounds", v, "must be a non-negative integer"))?;
        }
    }

    Ok(config)
}

fn non_empty<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn parse_positive(section: &str, key: &str, v: &str) -> Result<u32, ConfigFileError> {
    match v.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(invalid(section, key, v, "must be a positive integer")),
    }
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Expands a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<EngineSettings, ConfigFileError> {
        EngineSettings::from_ini_str(content)
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        assert_eq!(parse("").unwrap(), EngineSettings::default());
    }

    #[test]
    fn test_full_file() {
        let settings = parse(
            r#"
[endpoint]
base_url = http://renderer:8080/tile

[output]
root = /srv/tiles
worker_root = /data/tiles
tile_check = png

[worker]
template = Shell
container = osm-tools
fetch_attempts = 5
backoff_ms = 250
request_timeout_secs = 10

[supervisor]
timeout_secs = 3600
grace_secs = 2

[retry]
max_rounds = 1
"#,
        )
        .unwrap();

        assert_eq!(settings.endpoint.base_url, "http://renderer:8080/tile");
        assert_eq!(settings.output.root, PathBuf::from("/srv/tiles"));
        assert_eq!(settings.output.worker_root, Some(PathBuf::from("/data/tiles")));
        assert_eq!(settings.output.tile_check, TileCheck::PngSignature);
        assert_eq!(settings.worker.template, "shell");
        assert_eq!(settings.worker.container.as_deref(), Some("osm-tools"));
        assert_eq!(settings.worker.fetch.attempts, 5);
        assert_eq!(settings.worker.fetch.backoff, Duration::from_millis(250));
        assert_eq!(settings.worker.fetch.request_timeout, Duration::from_secs(10));
        assert_eq!(settings.supervisor.timeout, Some(Duration::from_secs(3600)));
        assert_eq!(settings.supervisor.grace_period, Duration::from_secs(2));
        assert_eq!(settings.retry.max_rounds, 1);
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let settings = parse("[supervisor]\ntimeout_secs = 0\n").unwrap();
        assert!(settings.supervisor.timeout.is_none());
    }

    #[test]
    fn test_invalid_values_name_the_key() {
        let cases = [
            ("[endpoint]\nbase_url = localhost\n", "base_url"),
            ("[output]\ntile_check = size\n", "tile_check"),
            ("[worker]\ntemplate = perl\n", "template"),
            ("[worker]\nfetch_attempts = 0\n", "fetch_attempts"),
            ("[worker]\nbackoff_ms = soon\n", "backoff_ms"),
            ("[retry]\nmax_rounds = -1\n", "max_rounds"),
        ];
        for (content, expected_key) in cases {
            match parse(content) {
                Err(ConfigFileError::InvalidValue { key, .. }) => assert_eq!(key, expected_key),
                other => panic!("expected InvalidValue for {}, got {:?}", expected_key, other),
            }
        }
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/tiles"), home.join("tiles"));
        }
    }
}
