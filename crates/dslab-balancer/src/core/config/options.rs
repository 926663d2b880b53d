//! Config utils.

use std::collections::HashMap;
use std::str::FromStr;

use crate::core::config::ConfigError;

/// Parses config value string, which consists of two parts - name and options.
/// Example: BestFitThreshold[threshold=0.8] parts are name BestFitThreshold and options string "threshold=0.8".
pub fn parse_config_value(config_str: &str) -> (String, Option<String>) {
    match config_str.split_once('[') {
        Some((l, r)) => (l.trim().to_string(), Some(r.replace(']', ""))),
        None => (config_str.trim().to_string(), None),
    }
}

/// Parses options string from config value, returns map with option names and values.
///
/// # Examples
///
/// ```rust
/// use dslab_balancer::core::config::options::parse_options;
///
/// let options = parse_options("threshold=0.8, order=asc");
/// assert_eq!(options.get("threshold").unwrap(), "0.8");
/// assert_eq!(options.get("order").unwrap(), "asc");
/// assert_eq!(options.get("other"), None);
/// ```
pub fn parse_options(options_str: &str) -> HashMap<String, String> {
    let mut options = HashMap::new();
    for option_str in options_str.split(',') {
        if let Some((name, value)) = option_str.split_once('=') {
            options.insert(name.trim().to_string(), value.trim().to_string());
        }
    }
    options
}

/// Reads typed option value, falls back to default if the option is absent.
///
/// `field` is the config path used in the error message when the value can't be parsed.
pub fn option_or<T: FromStr>(
    options: &HashMap<String, String>,
    name: &str,
    default: T,
    field: &str,
) -> Result<T, ConfigError> {
    match options.get(name) {
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
            field: format!("{}.{}", field, name),
            reason: format!("can't parse '{}'", value),
        }),
        None => Ok(default),
    }
}
