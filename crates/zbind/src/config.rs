//! Session configuration shared by the parser, the writer and the mapper

/// Default layout for date-time values, `yyyy-MM-dd HH:mm:ss`
pub const DEFAULT_DATE_FORMAT: &str = "[year]-[month]-[day] [hour]:[minute]:[second]";

/// Configuration for one serialize/deserialize call
///
/// Setters consume and return the configuration so they can be chained:
///
/// ```
/// use zbind::Config;
///
/// let config = Config::new()
///     .with_pretty_print(true)
///     .with_indent_symbol("  ")
///     .with_line_symbol("\r\n");
/// assert!(config.pretty_print());
/// assert_eq!(config.indent_symbol(), "  ");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pretty_print: bool,
    line_symbol: String,
    indent_symbol: String,
    date_format: String,
    max_depth: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pretty_print: false,
            line_symbol: "\n".to_string(),
            indent_symbol: "\t".to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            max_depth: 128,
        }
    }
}

impl Config {
    /// Compact output, default symbols and date format
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretty printed output with default symbols
    pub fn pretty() -> Self {
        Self::default().with_pretty_print(true)
    }

    pub fn with_pretty_print(mut self, pretty_print: bool) -> Self {
        self.pretty_print = pretty_print;
        self
    }

    pub fn with_line_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.line_symbol = symbol.into();
        self
    }

    pub fn with_indent_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.indent_symbol = symbol.into();
        self
    }

    /// Set the date-time layout, written in `time` format description syntax
    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    /// Maximum element/object nesting depth (0 means unlimited)
    pub fn with_max_depth(mut self, max_depth: u16) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn pretty_print(&self) -> bool {
        self.pretty_print
    }

    pub fn line_symbol(&self) -> &str {
        &self.line_symbol
    }

    pub fn indent_symbol(&self) -> &str {
        &self.indent_symbol
    }

    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    pub fn max_depth(&self) -> u16 {
        self.max_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.pretty_print());
        assert_eq!(config.line_symbol(), "\n");
        assert_eq!(config.indent_symbol(), "\t");
        assert_eq!(config.date_format(), DEFAULT_DATE_FORMAT);
        assert_eq!(config.max_depth(), 128);
    }

    #[test]
    fn test_chaining() {
        let config = Config::pretty()
            .with_date_format("[year]/[month]/[day]")
            .with_max_depth(0);
        assert!(config.pretty_print());
        assert_eq!(config.date_format(), "[year]/[month]/[day]");
        assert_eq!(config.max_depth(), 0);

        let compact = config.with_pretty_print(false);
        assert!(!compact.pretty_print());
    }
}
