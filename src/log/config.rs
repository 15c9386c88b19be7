// Log config

/// Logger configuration
pub struct LogConfig {
    // Prefix for all the logs
    pub prefix: String,

    // Error messages enabled?
    pub error_enabled: bool,

    // Warning messages enabled?
    pub warning_enabled: bool,

    // Info messages enabled?
    pub info_enabled: bool,

    // Debug messages enabled?
    pub debug_enabled: bool,

    // Trace messages enabled?
    pub trace_enabled: bool,
}

impl LogConfig {
    /// Builds a configuration from the `log.level` setting of the
    /// configuration file: 0 = errors only, 1 = +warnings, 2 = +info
    /// (the default), 3 = +debug, 4 = +trace
    pub fn from_level(level: u32, prefix: &str) -> LogConfig {
        LogConfig {
            prefix: prefix.to_string(),
            error_enabled: true,
            warning_enabled: level >= 1,
            info_enabled: level >= 2,
            debug_enabled: level >= 3,
            trace_enabled: level >= 4,
        }
    }

    /// Creates a child configuration for a child logger
    ///
    /// The prefix parameter will be added to the parent's prefix,
    /// concatenated with a space
    ///
    /// Returns a new configuration for the child logger
    pub fn child_config(&self, prefix: &str) -> LogConfig {
        LogConfig {
            prefix: format!("{}{}", self.prefix, prefix),
            error_enabled: self.error_enabled,
            warning_enabled: self.warning_enabled,
            info_enabled: self.info_enabled,
            debug_enabled: self.debug_enabled,
            trace_enabled: self.trace_enabled,
        }
    }
}
