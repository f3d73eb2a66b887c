//! GDS-style layer identifiers.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A `(layer, datatype)` pair, written `"layer/datatype"`.
///
/// # Example
///
/// ```
/// # use shuttle::layer::LayerSpec;
/// let text: LayerSpec = "10/0".parse().unwrap();
/// assert_eq!(text, LayerSpec::new(10, 0));
/// assert_eq!(text.to_string(), "10/0");
/// ```
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LayerSpec {
    pub layer: u16,
    pub datatype: u16,
}

impl LayerSpec {
    pub const fn new(layer: u16, datatype: u16) -> Self {
        Self { layer, datatype }
    }
}

impl Display for LayerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.layer, self.datatype)
    }
}

impl FromStr for LayerSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ConfigError::InvalidLayer(s.to_string());
        let (layer, datatype) = s.trim().split_once('/').ok_or_else(err)?;
        Ok(Self {
            layer: layer.parse().map_err(|_| err())?,
            datatype: datatype.parse().map_err(|_| err())?,
        })
    }
}

impl TryFrom<String> for LayerSpec {
    type Error = ConfigError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LayerSpec> for String {
    fn from(value: LayerSpec) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_layers() {
        assert!("10".parse::<LayerSpec>().is_err());
        assert!("10/x".parse::<LayerSpec>().is_err());
        assert!("-1/0".parse::<LayerSpec>().is_err());
        assert_eq!(" 1/10 ".parse::<LayerSpec>().unwrap(), LayerSpec::new(1, 10));
    }
}
