use std::fmt::Display;

use crate::types::TensorType;

/// A dimension can be either a fixed value, a symbol, or any value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dimension {
    Value(u64),

    /// Any extent is accepted
    Any,

    /// A named extent. All dimensions that share a symbol must have the same extent
    Symbol(String),
}

impl Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dimension::Value(v) => write!(f, "{v}"),
            Dimension::Any => f.write_str("None"),
            Dimension::Symbol(s) => f.write_str(s),
        }
    }
}

/// The name, type and shape of one model input or output
#[derive(Debug, Clone, PartialEq)]
pub struct TensorSpec {
    pub name: String,

    /// The datatype
    pub dtype: TensorType,

    /// Tensor shape. An empty vec is considered a scalar
    pub dims: Vec<Dimension>,
}

impl TensorSpec {
    /// A concrete shape that satisfies this spec. Wildcards and symbols become 1
    pub fn default_dims(&self) -> Vec<u64> {
        self.dims
            .iter()
            .map(|d| match d {
                Dimension::Value(v) => *v,
                Dimension::Any | Dimension::Symbol(_) => 1,
            })
            .collect()
    }

    /// A human readable version of the shape, e.g. `[batch_size, None, 3]`
    pub fn shape_string(&self) -> String {
        let dims: Vec<_> = self.dims.iter().map(|d| d.to_string()).collect();
        format!("[{}]", dims.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dims() {
        let spec = TensorSpec {
            name: "x".into(),
            dtype: TensorType::Float,
            dims: vec![
                Dimension::Symbol("batch_size".into()),
                Dimension::Any,
                Dimension::Value(3),
            ],
        };

        assert_eq!(spec.default_dims(), vec![1, 1, 3]);
        assert_eq!(spec.shape_string(), "[batch_size, None, 3]");
    }
}
