//! This module handles parsing the model config file (`model.toml` by default)
//!
//! ```toml
//! name = "my_model"
//! platform = "noop"
//!
//! [[input]]
//! name = "x"
//! dtype = "float32"
//! shape = ["batch_size", "*", 3]
//! ```
//!
//! In a shape, integers are fixed extents, `"*"` accepts any extent and any other string is a symbol.
use std::str::FromStr;

use serde::{de::Visitor, Deserialize, Serialize};

use crate::info::{Dimension, TensorSpec};
use crate::types::TensorType;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub(crate) struct ModelToml {
    /// The name of the model
    pub(crate) name: String,

    /// The platform (backend) used to run the model
    pub(crate) platform: String,

    /// A list of inputs for the model
    /// Can be empty
    pub(crate) input: Option<Vec<TensorSpecToml>>,

    /// A list of outputs for the model
    /// Can be empty
    pub(crate) output: Option<Vec<TensorSpecToml>>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub(crate) struct TensorSpecToml {
    name: String,

    dtype: DataTypeToml,

    #[serde(default)]
    shape: Vec<Dimension>,
}

impl From<TensorSpecToml> for TensorSpec {
    fn from(value: TensorSpecToml) -> Self {
        Self {
            name: value.name,
            dtype: value.dtype.0,
            dims: value.shape,
        }
    }
}

#[derive(Debug, PartialEq)]
struct DataTypeToml(TensorType);

impl Serialize for DataTypeToml {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.0.config_name())
    }
}

impl<'de> Deserialize<'de> for DataTypeToml {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        TensorType::from_str(&raw)
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

struct DimensionVisitor;

impl<'de> Visitor<'de> for DimensionVisitor {
    type Value = Dimension;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("A string or a nonnegative integer")
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        u64::try_from(v).map(Dimension::Value).map_err(|_| {
            E::custom("`Dimension`s can only be strings or nonnegative integers, but got a negative integer")
        })
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(Dimension::Value(v))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        if v == "*" {
            Ok(Dimension::Any)
        } else {
            Ok(Dimension::Symbol(v.to_owned()))
        }
    }
}

impl<'de> Deserialize<'de> for Dimension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(DimensionVisitor)
    }
}

impl Serialize for Dimension {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Dimension::Any => serializer.serialize_str("*"),
            Dimension::Symbol(s) => serializer.serialize_str(s.as_str()),
            Dimension::Value(v) => v.serialize(serializer),
        }
    }
}

pub(crate) fn parse(data: &[u8]) -> crate::error::Result<ModelToml> {
    Ok(toml::from_slice(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_model_toml() {
        let config = parse(
            br#"
            name = "test_model"
            platform = "noop"

            [[input]]
            name = "x"
            dtype = "float32"
            shape = ["batch_size", "*", 3]

            [[output]]
            name = "out"
            dtype = "string"
            "#,
        )
        .unwrap();

        assert_eq!(config.name, "test_model");
        assert_eq!(config.platform, "noop");

        let inputs: Vec<TensorSpec> = config.input.unwrap().into_iter().map(Into::into).collect();
        assert_eq!(
            inputs,
            vec![TensorSpec {
                name: "x".into(),
                dtype: TensorType::Float,
                dims: vec![
                    Dimension::Symbol("batch_size".into()),
                    Dimension::Any,
                    Dimension::Value(3)
                ],
            }]
        );

        let outputs = config.output.unwrap();
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].shape.is_empty());
    }

    #[test]
    fn negative_dimensions_are_rejected() {
        let res = parse(
            br#"
            name = "test_model"
            platform = "noop"

            [[input]]
            name = "x"
            dtype = "float32"
            shape = [-3]
            "#,
        );

        assert!(res.is_err());
    }

    #[test]
    fn unknown_dtypes_are_rejected() {
        let res = parse(
            br#"
            name = "test_model"
            platform = "noop"

            [[input]]
            name = "x"
            dtype = "complex64"
            "#,
        );

        assert!(res.is_err());
    }

    #[test]
    fn roundtrip() {
        let config = parse(
            br#"
            name = "test_model"
            platform = "noop"

            [[input]]
            name = "x"
            dtype = "int64"
            shape = ["n", 2]
            "#,
        )
        .unwrap();

        let serialized = toml::to_string_pretty(&config).unwrap();
        let config2 = parse(serialized.as_bytes()).unwrap();
        assert_eq!(config, config2);
    }
}
