// Copyright 2023 Vivek Panyam
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Shapes that may contain wildcards and symbols are sent across the boundary as a list of
//! integers plus a parallel list of symbol names

use modelbridge_core::info::Dimension;

use crate::error::{BoundaryError, Result};
use crate::types::{BRIDGE_ANY_DIM, BRIDGE_SYMBOL_DIM};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireShape {
    /// A nonnegative extent, `BRIDGE_ANY_DIM` or `BRIDGE_SYMBOL_DIM`
    pub dims: Vec<i64>,

    /// One entry per dim. Only `Some` for `BRIDGE_SYMBOL_DIM` dims
    pub symbols: Vec<Option<String>>,
}

impl WireShape {
    pub fn encode(dims: &[Dimension]) -> Result<Self> {
        let mut out = WireShape {
            dims: Vec::with_capacity(dims.len()),
            symbols: Vec::with_capacity(dims.len()),
        };

        for dim in dims {
            let (value, symbol) = match dim {
                Dimension::Value(v) => {
                    let v = i64::try_from(*v).map_err(|_| {
                        BoundaryError::MalformedShape(format!("extent {v} does not fit in an i64"))
                    })?;
                    (v, None)
                }
                Dimension::Any => (BRIDGE_ANY_DIM, None),
                Dimension::Symbol(s) => (BRIDGE_SYMBOL_DIM, Some(s.clone())),
            };

            out.dims.push(value);
            out.symbols.push(symbol);
        }

        Ok(out)
    }

    pub fn decode(&self) -> Result<Vec<Dimension>> {
        if self.dims.len() != self.symbols.len() {
            return Err(BoundaryError::MalformedShape(format!(
                "got {} dims but {} symbol entries",
                self.dims.len(),
                self.symbols.len()
            )));
        }

        self.dims
            .iter()
            .zip(&self.symbols)
            .map(|(dim, symbol)| match (*dim, symbol) {
                (BRIDGE_SYMBOL_DIM, Some(s)) => Ok(Dimension::Symbol(s.clone())),
                (BRIDGE_SYMBOL_DIM, None) => Err(BoundaryError::MalformedShape(
                    "symbolic dimension without a symbol".into(),
                )),
                (v, Some(s)) => Err(BoundaryError::MalformedShape(format!(
                    "dimension {v} is not symbolic but has symbol `{s}`"
                ))),
                (BRIDGE_ANY_DIM, None) => Ok(Dimension::Any),
                (v, None) if v >= 0 => Ok(Dimension::Value(v as u64)),
                (v, None) => Err(BoundaryError::MalformedShape(format!(
                    "invalid dimension marker {v}"
                ))),
            })
            .collect()
    }
}
