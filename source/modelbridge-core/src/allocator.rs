use std::sync::{Arc, OnceLock};

use crate::error::{ModelError, Result};
use crate::types::{Tensor, TensorType, Value};

/// Something that can create tensors. Backends can provide their own allocator
/// (e.g. to place tensors in memory the backend can use directly)
pub trait TensorAllocator: Send + Sync {
    /// Allocate a tensor filled with default values
    fn allocate(&self, dtype: TensorType, dims: &[i64]) -> Result<Arc<Value>>;

    /// Allocate a string tensor and fill it with `items`
    fn allocate_strings(&self, items: Vec<String>, dims: &[i64]) -> Result<Arc<Value>> {
        let value = self.allocate(TensorType::String, dims)?;
        value.copy_from_strings(items)?;
        Ok(value)
    }
}

/// Allocates tensors on the heap
#[derive(Debug, Default)]
pub struct GenericAllocator;

impl TensorAllocator for GenericAllocator {
    fn allocate(&self, dtype: TensorType, dims: &[i64]) -> Result<Arc<Value>> {
        let shape = validate_dims(dims)?;
        Ok(Arc::new(Tensor::zeros(dtype, &shape)?.into()))
    }
}

/// The allocator used when there is no model to allocate from
pub fn default_allocator() -> Arc<dyn TensorAllocator> {
    static CELL: OnceLock<Arc<dyn TensorAllocator>> = OnceLock::new();
    CELL.get_or_init(|| Arc::new(GenericAllocator)).clone()
}

/// Convert a list of extents into a shape, rejecting negative extents
pub(crate) fn validate_dims(dims: &[i64]) -> Result<Vec<usize>> {
    dims.iter()
        .map(|d| {
            usize::try_from(*d).map_err(|_| {
                ModelError::MalformedShape(format!(
                    "all dimensions must be nonnegative, but got {dims:?}"
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_numeric() {
        let value = default_allocator()
            .allocate(TensorType::Double, &[2, 2])
            .unwrap();

        assert_eq!(value.tensor_type(), TensorType::Double);
        assert_eq!(value.dims(), vec![2, 2]);
        assert_eq!(value.num_elements(), 4);
        assert_eq!(value.raw_data().unwrap().len_bytes, 32);
    }

    #[test]
    fn allocate_strings() {
        let value = GenericAllocator
            .allocate_strings(vec!["a".into(), "b".into(), "c".into()], &[3])
            .unwrap();

        assert_eq!(value.string_elements().unwrap(), vec!["a", "b", "c"]);
        assert!(matches!(
            value.raw_data(),
            Err(ModelError::UnsupportedTensorType(TensorType::String))
        ));
    }

    #[test]
    fn string_count_must_match_shape() {
        let res = GenericAllocator.allocate_strings(vec!["a".into()], &[2, 2]);
        assert!(matches!(res, Err(ModelError::SizeMismatch { expected: 4, actual: 1, .. })));
    }

    #[test]
    fn negative_dims_are_malformed() {
        let res = GenericAllocator.allocate(TensorType::Float, &[2, -1]);
        assert!(matches!(res, Err(ModelError::MalformedShape(_))));
    }

    #[test]
    fn oversized_shapes_are_errors() {
        // The element count overflows
        let res = GenericAllocator.allocate(TensorType::Float, &[i64::MAX, i64::MAX]);
        assert!(matches!(res, Err(ModelError::MalformedShape(_))));

        // Addressable, but far more memory than any machine has
        let res = GenericAllocator.allocate(TensorType::Float, &[1 << 30, 1 << 29]);
        assert!(matches!(res, Err(ModelError::OutOfMemory(_))));

        let res = GenericAllocator.allocate_strings(vec![], &[i64::MAX, 4]);
        assert!(matches!(res, Err(ModelError::MalformedShape(_))));
    }

    #[test]
    fn copy_from_bytes_checks_length() {
        let value = GenericAllocator.allocate(TensorType::Int32, &[3]).unwrap();

        let data: Vec<u8> = [7i32, 8, 9].iter().flat_map(|v| v.to_ne_bytes()).collect();
        value.copy_from_bytes(&data).unwrap();

        let raw = value.raw_data().unwrap();
        let view = unsafe { std::slice::from_raw_parts(raw.ptr as *const i32, 3) };
        assert_eq!(view, &[7, 8, 9]);

        assert!(matches!(
            value.copy_from_bytes(&data[..8]),
            Err(ModelError::SizeMismatch { expected: 12, actual: 8, .. })
        ));
    }
}
