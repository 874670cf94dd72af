//! Per-call mapping state

use std::cell::Cell;

use time::format_description::{self, OwnedFormatItem};
use time::PrimitiveDateTime;

use crate::config::Config;
use crate::error::{Error, ErrorKind, Result, Span};

/// State shared by one serialize or deserialize call
///
/// Holds the compiled date format and the current object nesting depth.
#[derive(Debug)]
pub struct Context<'c> {
    config: &'c Config,
    date_format: OwnedFormatItem,
    depth: Cell<u16>,
}

impl<'c> Context<'c> {
    pub fn new(config: &'c Config) -> Result<Self> {
        let date_format = format_description::parse_owned::<2>(config.date_format())
            .map_err(|err| {
                Error::with_message(
                    ErrorKind::InvalidValue {
                        expected: "date format description".to_string(),
                        found: config.date_format().to_string(),
                    },
                    Span::empty(),
                    format!("invalid date format `{}`: {err}", config.date_format()),
                )
            })?;
        Ok(Self {
            config,
            date_format,
            depth: Cell::new(0),
        })
    }

    pub fn config(&self) -> &'c Config {
        self.config
    }

    pub fn depth(&self) -> u16 {
        self.depth.get()
    }

    /// Enter one nesting level; the level is left when the guard drops
    pub fn descend(&self) -> Result<DepthGuard<'_>> {
        let depth = self.depth.get().saturating_add(1);
        let max = self.config.max_depth();
        if max != 0 && depth > max {
            return Err(Error::new(ErrorKind::MaxDepthExceeded { max }, Span::empty()));
        }
        self.depth.set(depth);
        Ok(DepthGuard { depth: &self.depth })
    }

    pub fn format_date(&self, value: &PrimitiveDateTime) -> Result<String> {
        value.format(&self.date_format).map_err(|err| {
            Error::with_message(
                ErrorKind::InvalidValue {
                    expected: self.config.date_format().to_string(),
                    found: value.to_string(),
                },
                Span::empty(),
                format!("cannot format date: {err}"),
            )
        })
    }

    pub fn parse_date(&self, text: &str) -> Result<PrimitiveDateTime> {
        PrimitiveDateTime::parse(text, &self.date_format)
            .map_err(|_| Error::invalid_value(self.config.date_format(), text))
    }
}

/// Restores the depth counter of a [`Context`] on drop
#[derive(Debug)]
pub struct DepthGuard<'a> {
    depth: &'a Cell<u16>,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_default_date_format() -> Result<()> {
        let config = Config::default();
        let ctx = Context::new(&config)?;
        let value = datetime!(2024-03-09 07:05:00);
        assert_eq!(ctx.format_date(&value)?, "2024-03-09 07:05:00");
        assert_eq!(ctx.parse_date("2024-03-09 07:05:00")?, value);
        Ok(())
    }

    #[test]
    fn test_custom_date_format() -> Result<()> {
        let config = Config::default().with_date_format("[day].[month].[year] [hour]:[minute]:[second]");
        let ctx = Context::new(&config)?;
        let value = datetime!(2001-12-31 23:59:58);
        assert_eq!(ctx.format_date(&value)?, "31.12.2001 23:59:58");
        assert!(ctx.parse_date("2001-12-31 23:59:58").is_err());
        Ok(())
    }

    #[test]
    fn test_invalid_date_format() {
        let config = Config::default().with_date_format("[year");
        let err = Context::new(&config).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidValue { .. }));
    }

    #[test]
    fn test_depth_guard() -> Result<()> {
        let config = Config::default().with_max_depth(2);
        let ctx = Context::new(&config)?;
        {
            let _outer = ctx.descend()?;
            let _inner = ctx.descend()?;
            assert_eq!(ctx.depth(), 2);
            let err = ctx.descend().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::MaxDepthExceeded { max: 2 });
        }
        assert_eq!(ctx.depth(), 0);
        Ok(())
    }
}
