pub use modelbridge_macros::{for_each_numeric_tensor_type, for_each_tensor_type};

use std::{
    collections::HashMap,
    fmt::Display,
    str::FromStr,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::error::{ModelError, Result};

for_each_tensor_type! {
    /// The element type of a tensor
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum TensorType {
        $($TensorType,)*
    }
}

impl TensorType {
    /// The integer tag used for this type across the boundary
    pub fn tag(self) -> i32 {
        match self {
            TensorType::Float => 0,
            TensorType::Double => 1,
            TensorType::Int32 => 2,
            TensorType::Int64 => 3,
            TensorType::String => 5,
            TensorType::Int8 => 6,
            TensorType::Int16 => 7,
            TensorType::Uint8 => 8,
            TensorType::Uint16 => 9,
            TensorType::Uint32 => 10,
            TensorType::Uint64 => 11,
        }
    }

    pub fn from_tag(tag: i32) -> Result<Self> {
        Ok(match tag {
            0 => TensorType::Float,
            1 => TensorType::Double,
            2 => TensorType::Int32,
            3 => TensorType::Int64,
            5 => TensorType::String,
            6 => TensorType::Int8,
            7 => TensorType::Int16,
            8 => TensorType::Uint8,
            9 => TensorType::Uint16,
            10 => TensorType::Uint32,
            11 => TensorType::Uint64,
            other => return Err(ModelError::UnknownTensorTag(other)),
        })
    }

    /// The name used for this type in model config files
    pub fn config_name(self) -> &'static str {
        for_each_tensor_type! {
            return match self {
                $(TensorType::$TensorType => $ConfigName,)*
            }
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, TensorType::String)
    }

    /// The size of one element in bytes. `None` for strings
    pub fn element_size(self) -> Option<usize> {
        for_each_numeric_tensor_type! {
            return match self {
                $(TensorType::$TensorType => Some(std::mem::size_of::<$RustType>()),)*
                TensorType::String => None,
            }
        }
    }
}

impl Display for TensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for_each_tensor_type! {
            return match self {
                $(TensorType::$TensorType => f.write_str($TypeName),)*
            }
        }
    }
}

impl FromStr for TensorType {
    type Err = String;

    /// Accepts either the config name (`float32`) or the boundary name (`FLOAT_TENSOR`)
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        for_each_tensor_type! {
            return match s {
                $($ConfigName | $TypeName => Ok(TensorType::$TensorType),)*
                other => Err(format!("Got an unknown datatype: {other}")),
            }
        }
    }
}

for_each_tensor_type! {
    /// The core tensor type
    #[derive(Debug, Clone, PartialEq)]
    pub enum Tensor {
        $($TensorType(ndarray::ArrayD::<$RustType>),)*
    }
}

for_each_tensor_type! {
    $(
        /// Implement conversions from ndarray types
        impl From<ndarray::ArrayD<$RustType>> for Tensor {
            fn from(item: ndarray::ArrayD<$RustType>) -> Self {
                Tensor::$TensorType(item)
            }
        }
    )*
}

impl Tensor {
    /// Create a tensor filled with default values (zeros or empty strings).
    /// Shapes too large to address are malformed and allocation failures are returned as errors
    pub fn zeros(dtype: TensorType, shape: &[usize]) -> Result<Self> {
        let too_large = || {
            ModelError::MalformedShape(format!("shape {shape:?} is too large to allocate"))
        };

        // The other axes must be addressable even when one of them is empty
        let nonzero_len = shape
            .iter()
            .filter(|d| **d != 0)
            .try_fold(1usize, |acc, d| acc.checked_mul(*d))
            .filter(|len| *len <= isize::MAX as usize)
            .ok_or_else(too_large)?;

        let len = if shape.contains(&0) { 0 } else { nonzero_len };

        for_each_tensor_type! {
            return match dtype {
                $(TensorType::$TensorType => {
                    let len_bytes = len
                        .checked_mul(std::mem::size_of::<$RustType>())
                        .filter(|b| *b <= isize::MAX as usize)
                        .ok_or_else(too_large)?;
                    log::trace!("Allocating {len_bytes} bytes for a {dtype} tensor with shape {shape:?}");

                    let mut data = Vec::<$RustType>::new();
                    data.try_reserve_exact(len)?;
                    data.resize(len, Default::default());

                    ndarray::ArrayD::from_shape_vec(shape.to_vec(), data)
                        .map(Into::into)
                        .map_err(|e| ModelError::MalformedShape(e.to_string()))
                },)*
            }
        }
    }

    pub fn tensor_type(&self) -> TensorType {
        for_each_tensor_type! {
            return match self {
                $(Tensor::$TensorType(_) => TensorType::$TensorType,)*
            }
        }
    }

    pub fn dims(&self) -> Vec<u64> {
        for_each_tensor_type! {
            return match self {
                $(Tensor::$TensorType(v) => v.shape().iter().map(|d| *d as u64).collect(),)*
            }
        }
    }

    pub fn num_elements(&self) -> usize {
        for_each_tensor_type! {
            return match self {
                $(Tensor::$TensorType(v) => v.len(),)*
            }
        }
    }
}

/// A raw view of the data of a numeric tensor.
/// The pointer is only valid while the `Value` it came from is alive
#[derive(Debug, Clone, Copy)]
pub struct RawData {
    pub ptr: *const u8,
    pub len_bytes: usize,
    pub dtype: TensorType,
}

/// A value that can be passed to and returned from a model.
/// Values are shared (e.g. between a `ValueMap` and a handle held by a caller) so the tensor
/// lives behind a lock.
#[derive(Debug)]
pub struct Value {
    inner: RwLock<Tensor>,
}

impl Value {
    pub fn new(tensor: Tensor) -> Self {
        Self {
            inner: RwLock::new(tensor),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Tensor> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tensor> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn tensor_type(&self) -> TensorType {
        self.read().tensor_type()
    }

    pub fn dims(&self) -> Vec<u64> {
        self.read().dims()
    }

    pub fn num_elements(&self) -> usize {
        self.read().num_elements()
    }

    /// Get a pointer to the underlying data. This only works for numeric tensors.
    /// Tensors are always allocated in standard layout so the data is contiguous.
    pub fn raw_data(&self) -> Result<RawData> {
        let guard = self.read();
        for_each_numeric_tensor_type! {
            return match &*guard {
                $(Tensor::$TensorType(v) => Ok(RawData {
                    ptr: v.as_ptr() as *const u8,
                    len_bytes: v.len() * std::mem::size_of::<$RustType>(),
                    dtype: TensorType::$TensorType,
                }),)*
                Tensor::String(_) => Err(ModelError::UnsupportedTensorType(TensorType::String)),
            }
        }
    }

    /// Overwrite the contents of a numeric tensor in place with native-endian bytes.
    /// `bytes` must contain exactly `num_elements * element_size` bytes
    pub fn copy_from_bytes(&self, bytes: &[u8]) -> Result<()> {
        let mut guard = self.write();
        let dtype = guard.tensor_type();
        for_each_numeric_tensor_type! {
            match &mut *guard {
                $(Tensor::$TensorType(v) => {
                    let expected = v.len() * std::mem::size_of::<$RustType>();
                    if bytes.len() != expected {
                        return Err(ModelError::SizeMismatch { expected, actual: bytes.len(), unit: "bytes" });
                    }

                    let dst = v
                        .as_slice_memory_order_mut()
                        .ok_or(ModelError::UnsupportedTensorType(dtype))?;

                    // SAFETY: `dst` is exactly `bytes.len()` bytes long and every bit pattern is a valid
                    // value for numeric types
                    unsafe {
                        std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst.as_mut_ptr() as *mut u8, bytes.len())
                    };
                },)*
                Tensor::String(_) => return Err(ModelError::UnsupportedTensorType(TensorType::String)),
            }
        }

        Ok(())
    }

    /// Overwrite the contents of a string tensor. `items` must have exactly `num_elements` items
    pub fn copy_from_strings(&self, items: Vec<String>) -> Result<()> {
        let mut guard = self.write();
        match &mut *guard {
            Tensor::String(v) => {
                if items.len() != v.len() {
                    return Err(ModelError::SizeMismatch {
                        expected: v.len(),
                        actual: items.len(),
                        unit: "elements",
                    });
                }

                for (dst, src) in v.iter_mut().zip(items) {
                    *dst = src;
                }

                Ok(())
            }
            other => Err(ModelError::UnsupportedTensorType(other.tensor_type())),
        }
    }

    /// Copy the elements of a string tensor out in (flattened) logical order
    pub fn string_elements(&self) -> Result<Vec<String>> {
        match &*self.read() {
            Tensor::String(v) => Ok(v.iter().cloned().collect()),
            other => Err(ModelError::UnsupportedTensorType(other.tensor_type())),
        }
    }
}

impl From<Tensor> for Value {
    fn from(value: Tensor) -> Self {
        Value::new(value)
    }
}

/// The input and output type of `Model::infer`
pub type ValueMap = HashMap<String, Arc<Value>>;

/// Supported device types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    CPU,
    GPU(u32),
}

impl Device {
    /// -1 is the CPU. Anything nonnegative is a GPU index
    pub fn from_index(index: i32) -> Result<Self> {
        match index {
            -1 => Ok(Device::CPU),
            i if i >= 0 => Ok(Device::GPU(i as u32)),
            other => Err(ModelError::InvalidDevice(other)),
        }
    }

    pub fn index(&self) -> i32 {
        match self {
            Device::CPU => -1,
            Device::GPU(i) => *i as i32,
        }
    }
}

/// Options provided when loading a model
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeOptions {
    /// Whether the backend should release memory after every inference
    pub free_memory_every_cycle: bool,

    /// The name of an existing control queue to use when running out of process.
    /// Empty means a new one is created
    pub control_queue_name: String,

    /// The device that is visible to this model.
    /// Note: a visible device does not necessarily mean that the model
    /// will use that device
    pub visible_device: Device,

    /// Whether to load the model when it is constructed. If false, `Model::load_model`
    /// must be called before running inference
    pub load_model_at_construction: bool,

    /// Skip validating inputs against the model's input spec
    pub disable_shape_and_type_checking: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        let config = &crate::config::CONFIG;
        Self {
            free_memory_every_cycle: true,
            control_queue_name: String::new(),
            visible_device: device_or_cpu(config.default_visible_device),
            load_model_at_construction: config.load_model_at_construction,
            disable_shape_and_type_checking: false,
        }
    }
}

/// The device for a configured index, falling back to the CPU if the index is invalid
fn device_or_cpu(index: i32) -> Device {
    Device::from_index(index).unwrap_or_else(|e| {
        log::warn!("Ignoring invalid default_visible_device ({e}). Using the CPU");
        Device::CPU
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_default_device_falls_back_to_cpu() {
        assert_eq!(device_or_cpu(-5), Device::CPU);
        assert_eq!(device_or_cpu(-1), Device::CPU);
        assert_eq!(device_or_cpu(2), Device::GPU(2));
    }

    #[test]
    fn zeros_rejects_unaddressable_shapes() {
        let huge = usize::MAX / 2;
        assert!(matches!(
            Tensor::zeros(TensorType::Float, &[huge, huge]),
            Err(ModelError::MalformedShape(_))
        ));

        // Fits in an isize as an element count, but not as a byte count
        assert!(matches!(
            Tensor::zeros(TensorType::Int64, &[isize::MAX as usize / 4]),
            Err(ModelError::MalformedShape(_))
        ));

        // Empty tensors are fine as long as the other axes are addressable
        let empty = Tensor::zeros(TensorType::Double, &[0, 1 << 40]).unwrap();
        assert_eq!(empty.num_elements(), 0);
        assert_eq!(empty.dims(), vec![0, 1 << 40]);
    }

    #[test]
    fn zeros_fills_defaults() {
        let strings = Tensor::zeros(TensorType::String, &[2]).unwrap();
        assert_eq!(strings, Tensor::String(ndarray::ArrayD::from_elem(vec![2], String::new())));

        let floats = Tensor::zeros(TensorType::Float, &[2, 2]).unwrap();
        assert_eq!(floats.tensor_type(), TensorType::Float);
        assert_eq!(floats.num_elements(), 4);
    }
}
