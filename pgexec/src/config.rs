//! Session configuration.
use std::{env::var, str::FromStr};

use crate::temporal::Zone;

/// Session wide execution settings.
#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) prepare_threshold: i32,
    pub(crate) cache_queries: usize,
    pub(crate) cache_size_mib: usize,
    pub(crate) default_fetch_size: usize,
    pub(crate) binary_transfer: bool,
    pub(crate) escape_processing: bool,
    pub(crate) auto_commit: bool,
    pub(crate) timezone: Zone,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prepare_threshold: 5,
            cache_queries: 256,
            cache_size_mib: 5,
            default_fetch_size: 0,
            binary_transfer: true,
            escape_processing: true,
            auto_commit: true,
            timezone: Zone::UTC,
        }
    }
}

impl Config {
    /// Retrieve configuration from environment variable.
    ///
    /// It reads:
    /// - `PGEXEC_PREPARE_THRESHOLD`
    /// - `PGEXEC_STATEMENT_CACHE_QUERIES`
    /// - `PGEXEC_STATEMENT_CACHE_SIZE_MIB`
    /// - `PGEXEC_DEFAULT_FETCH_SIZE`
    /// - `PGEXEC_BINARY_TRANSFER`
    /// - `PGTZ`
    ///
    /// Missing or unparsable values fallback to the default.
    pub fn from_env() -> Config {
        let def = Config::default();

        macro_rules! env {
            ($name:literal,$field:ident) => {
                var($name).ok().and_then(|v| parse(&v)).unwrap_or(def.$field)
            };
        }

        Self {
            prepare_threshold: env!("PGEXEC_PREPARE_THRESHOLD", prepare_threshold),
            cache_queries: env!("PGEXEC_STATEMENT_CACHE_QUERIES", cache_queries),
            cache_size_mib: env!("PGEXEC_STATEMENT_CACHE_SIZE_MIB", cache_size_mib),
            default_fetch_size: env!("PGEXEC_DEFAULT_FETCH_SIZE", default_fetch_size),
            binary_transfer: var("PGEXEC_BINARY_TRANSFER")
                .ok()
                .and_then(|v| crate::value::parse_bool(&v))
                .unwrap_or(def.binary_transfer),
            escape_processing: def.escape_processing,
            auto_commit: def.auto_commit,
            timezone: var("PGTZ").ok().and_then(|v| Zone::parse(&v)).unwrap_or(def.timezone),
        }
    }

    /// Executions of the same query before it is prepared server side.
    ///
    /// Zero disables server side prepare, a negative value forces binary
    /// transfer and prepares on the first execution.
    pub fn with_prepare_threshold(mut self, value: i32) -> Self {
        self.prepare_threshold = value;
        self
    }

    /// Max number of cached queries.
    pub fn with_cache_queries(mut self, value: usize) -> Self {
        self.cache_queries = value;
        self
    }

    /// Max total sql size of cached queries, in mebibytes.
    pub fn with_cache_size_mib(mut self, value: usize) -> Self {
        self.cache_size_mib = value;
        self
    }

    pub fn with_default_fetch_size(mut self, value: usize) -> Self {
        self.default_fetch_size = value;
        self
    }

    pub fn with_binary_transfer(mut self, value: bool) -> Self {
        self.binary_transfer = value;
        self
    }

    pub fn with_escape_processing(mut self, value: bool) -> Self {
        self.escape_processing = value;
        self
    }

    pub fn with_auto_commit(mut self, value: bool) -> Self {
        self.auto_commit = value;
        self
    }

    /// Zone used for values that carry no offset.
    pub fn with_timezone(mut self, zone: Zone) -> Self {
        self.timezone = zone;
        self
    }

    pub fn prepare_threshold(&self) -> i32 {
        self.prepare_threshold
    }

    pub fn default_fetch_size(&self) -> usize {
        self.default_fetch_size
    }

    pub fn timezone(&self) -> &Zone {
        &self.timezone
    }

    pub(crate) fn cache_bytes(&self) -> usize {
        self.cache_size_mib.saturating_mul(1024 * 1024)
    }
}

fn parse<T: FromStr>(value: &str) -> Option<T> {
    value.trim().parse().ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_and_builder() {
        let config = Config::default()
            .with_prepare_threshold(-1)
            .with_default_fetch_size(50)
            .with_timezone(Zone::Fixed(3600));
        assert_eq!(config.prepare_threshold(), -1);
        assert_eq!(config.default_fetch_size(), 50);
        assert_eq!(config.timezone(), &Zone::Fixed(3600));
        assert_eq!(config.cache_bytes(), 5 * 1024 * 1024);
        assert!(config.binary_transfer);
    }

    #[test]
    fn lenient_parse() {
        assert_eq!(parse::<i32>(" 7 "), Some(7));
        assert_eq!(parse::<usize>("-1"), None);
        assert_eq!(parse::<usize>("many"), None);
    }
}
