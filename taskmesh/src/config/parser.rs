//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::Ini;

use super::defaults::clamp_io_threads;
use super::file::ConfigError;
use super::settings::ConfigFile;
use super::size::parse_size;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the
/// INI. Unknown sections and keys are ignored; malformed values are errors.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigError> {
    let mut config = ConfigFile::default();

    // [transport] section
    if let Some(section) = ini.section(Some("transport")) {
        if let Some(v) = section.get("listen_host") {
            let v = v.trim();
            if !v.is_empty() {
                config.transport.listen_host = v.to_string();
            }
        }
        if let Some(v) = section.get("listen_port") {
            config.transport.listen_port =
                parse_value("transport", "listen_port", v, "must be a port number (1-65535)")?;
        }
        if let Some(v) = section.get("io_threads") {
            let threads: usize =
                parse_value("transport", "io_threads", v, "must be a thread count")?;
            config.transport.io_threads = clamp_io_threads(threads);
        }
    }

    // [worker] section
    if let Some(section) = ini.section(Some("worker")) {
        if let Some(v) = section.get("mode") {
            config.worker.mode = v.trim().parse().map_err(|reason| ConfigError::InvalidValue {
                section: "worker".to_string(),
                key: "mode".to_string(),
                value: v.to_string(),
                reason,
            })?;
        }
        if let Some(v) = section.get("manager_host") {
            let v = v.trim();
            if !v.is_empty() {
                config.worker.manager_host = v.to_string();
            }
        }
        if let Some(v) = section.get("manager_port") {
            config.worker.manager_port =
                parse_value("worker", "manager_port", v, "must be a port number (1-65535)")?;
        }
        if let Some(v) = section.get("ui") {
            config.worker.ui = parse_bool("worker", "ui", v)?;
        }
    }

    // [protocol] section
    if let Some(section) = ini.section(Some("protocol")) {
        if let Some(v) = section.get("max_frame_size") {
            config.protocol.max_frame_size =
                parse_size(v).map_err(|e| ConfigError::InvalidValue {
                    section: "protocol".to_string(),
                    key: "max_frame_size".to_string(),
                    value: v.to_string(),
                    reason: e.to_string(),
                })?;
        }
        if let Some(v) = section.get("accept_timeout_ms") {
            config.protocol.accept_timeout_ms =
                parse_value("protocol", "accept_timeout_ms", v, "must be milliseconds")?;
        }
        if let Some(v) = section.get("maintenance_interval_ms") {
            config.protocol.maintenance_interval_ms =
                parse_value("protocol", "maintenance_interval_ms", v, "must be milliseconds")?;
        }
        if let Some(v) = section.get("poll_interval_ms") {
            config.protocol.poll_interval_ms =
                parse_value("protocol", "poll_interval_ms", v, "must be milliseconds")?;
        }
    }

    Ok(config)
}

fn parse_value<T: std::str::FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    })
}

fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be true or false".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerMode;

    fn parse(text: &str) -> Result<ConfigFile, ConfigError> {
        let ini = Ini::load_from_str(text).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_ini_is_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.transport.listen_port, 8080);
        assert_eq!(config.protocol.max_frame_size, 16 * 1024 * 1024);
    }

    #[test]
    fn test_transport_section() {
        let config = parse(
            "[transport]\nlisten_host = 10.0.0.5\nlisten_port = 9000\nio_threads = 4\n",
        )
        .unwrap();
        assert_eq!(config.transport.listen_host, "10.0.0.5");
        assert_eq!(config.transport.listen_port, 9000);
        assert_eq!(config.transport.io_threads, 4);
    }

    #[test]
    fn test_io_threads_clamped() {
        let config = parse("[transport]\nio_threads = 0\n").unwrap();
        assert_eq!(config.transport.io_threads, 1);

        let config = parse("[transport]\nio_threads = 100000\n").unwrap();
        assert_eq!(config.transport.io_threads, 512);
    }

    #[test]
    fn test_worker_section() {
        let config = parse(
            "[worker]\nmode = async\nmanager_host = manager.local\nmanager_port = 9000\nui = true\n",
        )
        .unwrap();
        assert_eq!(config.worker.mode, WorkerMode::Async);
        assert_eq!(config.worker.manager_host, "manager.local");
        assert_eq!(config.worker.manager_port, 9000);
        assert!(config.worker.ui);
    }

    #[test]
    fn test_worker_mode_invalid() {
        let err = parse("[worker]\nmode = turbo\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_protocol_section() {
        let config = parse(
            "[protocol]\nmax_frame_size = 8MB\naccept_timeout_ms = 250\n\
             maintenance_interval_ms = 1000\npoll_interval_ms = 5\n",
        )
        .unwrap();
        assert_eq!(config.protocol.max_frame_size, 8 * 1024 * 1024);
        assert_eq!(config.protocol.accept_timeout_ms, 250);
        assert_eq!(config.protocol.maintenance_interval_ms, 1000);
        assert_eq!(config.protocol.poll_interval_ms, 5);
    }

    #[test]
    fn test_invalid_port() {
        let err = parse("[transport]\nlisten_port = not-a-port\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let config = parse("[transport]\nfancy_option = yes\n[mystery]\nkey = 1\n").unwrap();
        assert_eq!(config.transport.listen_port, 8080);
    }
}
