//! User supplied text conversions for individual fields

/// Result type returned by adapter implementations
pub type AdapterResult<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Converts a field value to and from a single text node
///
/// Registered with [`Schema::adapted`](crate::bind::Schema::adapted). The
/// adapter runs in both directions: `serialize` produces the element (or
/// attribute) text, `deserialize` rebuilds the value from it.
///
/// ```
/// use zbind::bind::{Adapter, AdapterResult};
///
/// struct Celsius;
///
/// impl Adapter<f64> for Celsius {
///     fn serialize(&self, value: &f64) -> AdapterResult<String> {
///         Ok(format!("{value}C"))
///     }
///
///     fn deserialize(&self, text: &str) -> AdapterResult<f64> {
///         let number = text.strip_suffix('C').ok_or("missing unit")?;
///         Ok(number.trim().parse()?)
///     }
/// }
///
/// assert_eq!(Celsius.serialize(&21.5).unwrap(), "21.5C");
/// assert_eq!(Celsius.deserialize("21.5C").unwrap(), 21.5);
/// ```
pub trait Adapter<T> {
    fn serialize(&self, value: &T) -> AdapterResult<String>;

    fn deserialize(&self, text: &str) -> AdapterResult<T>;
}

/// Adapter built from a pair of plain functions
pub struct FnAdapter<T> {
    serialize: fn(&T) -> AdapterResult<String>,
    deserialize: fn(&str) -> AdapterResult<T>,
}

impl<T> FnAdapter<T> {
    pub const fn new(
        serialize: fn(&T) -> AdapterResult<String>,
        deserialize: fn(&str) -> AdapterResult<T>,
    ) -> Self {
        Self {
            serialize,
            deserialize,
        }
    }
}

impl<T> std::fmt::Debug for FnAdapter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnAdapter").finish_non_exhaustive()
    }
}

impl<T> Adapter<T> for FnAdapter<T> {
    fn serialize(&self, value: &T) -> AdapterResult<String> {
        (self.serialize)(value)
    }

    fn deserialize(&self, text: &str) -> AdapterResult<T> {
        (self.deserialize)(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_out(value: &u32) -> AdapterResult<String> {
        Ok(format!("{value:#x}"))
    }

    fn hex_in(text: &str) -> AdapterResult<u32> {
        let digits = text.strip_prefix("0x").ok_or("expected 0x prefix")?;
        Ok(u32::from_str_radix(digits, 16)?)
    }

    #[test]
    fn test_fn_adapter_both_directions() {
        let adapter = FnAdapter::new(hex_out, hex_in);
        assert_eq!(adapter.serialize(&255).ok(), Some("0xff".to_string()));
        assert_eq!(adapter.deserialize("0x10").ok(), Some(16));
        assert!(adapter.deserialize("16").is_err());
    }
}
