//! Conversion between host tensors and device buffer views.

use crate::backend::{ListHandle, RuntimeBackend, SessionHandle};
use crate::error::{RuntimeError, RuntimeResult};
use crate::sys;
use lib_types::{ElementType, HostTensor, OwnedTensor};

/// Ranks up to this size keep their dimensions on the stack.
pub const INLINE_RANK: usize = 8;

/// Map an element type to the runtime's native code.
pub fn to_native(element_type: ElementType) -> sys::iree_hal_element_type_t {
    match element_type {
        ElementType::F16 => sys::IREE_HAL_ELEMENT_TYPE_FLOAT_16,
        ElementType::Bf16 => sys::IREE_HAL_ELEMENT_TYPE_BFLOAT_16,
        ElementType::F32 => sys::IREE_HAL_ELEMENT_TYPE_FLOAT_32,
        ElementType::F64 => sys::IREE_HAL_ELEMENT_TYPE_FLOAT_64,
        ElementType::I32 => sys::IREE_HAL_ELEMENT_TYPE_SINT_32,
        ElementType::I64 => sys::IREE_HAL_ELEMENT_TYPE_SINT_64,
    }
}

/// Map a native code back to an element type.
pub fn from_native(code: sys::iree_hal_element_type_t) -> RuntimeResult<ElementType> {
    match code {
        sys::IREE_HAL_ELEMENT_TYPE_FLOAT_16 => Ok(ElementType::F16),
        sys::IREE_HAL_ELEMENT_TYPE_BFLOAT_16 => Ok(ElementType::Bf16),
        sys::IREE_HAL_ELEMENT_TYPE_FLOAT_32 => Ok(ElementType::F32),
        sys::IREE_HAL_ELEMENT_TYPE_FLOAT_64 => Ok(ElementType::F64),
        sys::IREE_HAL_ELEMENT_TYPE_SINT_32 => Ok(ElementType::I32),
        sys::IREE_HAL_ELEMENT_TYPE_SINT_64 => Ok(ElementType::I64),
        other => Err(RuntimeError::UnsupportedElementType {
            code: i64::from(other),
        }),
    }
}

/// Device dimensions for one tensor.
enum Dims {
    Inline { dims: [u64; INLINE_RANK], rank: usize },
    Heap(Vec<u64>),
}

impl Dims {
    /// Shapes must already be validated as non-negative.
    fn from_shape(shape: &[i64]) -> Self {
        if shape.len() <= INLINE_RANK {
            let mut dims = [0u64; INLINE_RANK];
            for (slot, &dim) in dims.iter_mut().zip(shape) {
                *slot = dim as u64;
            }
            Self::Inline {
                dims,
                rank: shape.len(),
            }
        } else {
            Self::Heap(shape.iter().map(|&dim| dim as u64).collect())
        }
    }

    fn as_slice(&self) -> &[u64] {
        match self {
            Self::Inline { dims, rank } => &dims[..*rank],
            Self::Heap(dims) => dims,
        }
    }

    #[cfg(test)]
    fn is_inline(&self) -> bool {
        matches!(self, Self::Inline { .. })
    }
}

/// Check every input before any of them is handed to the runtime.
pub fn validate_inputs(inputs: &[HostTensor<'_>]) -> RuntimeResult<()> {
    for (index, tensor) in inputs.iter().enumerate() {
        tensor.validate().map_err(|err| match RuntimeError::from(err) {
            RuntimeError::InvalidArgument { reason, .. } => {
                RuntimeError::invalid_argument(format!("inputs[{index}]"), reason)
            }
            other => other,
        })?;
    }
    Ok(())
}

/// Copy one validated tensor to the device and move it into `list`.
pub(crate) fn push_input<B: RuntimeBackend>(
    backend: &B,
    session: SessionHandle,
    list: ListHandle,
    tensor: &HostTensor<'_>,
) -> RuntimeResult<()> {
    let dims = Dims::from_shape(tensor.shape);
    let view = backend.allocate_buffer_copy(
        session,
        dims.as_slice(),
        to_native(tensor.element_type),
        tensor.data,
    )?;
    backend.push_buffer_view(list, view)
}

/// Copy one output buffer view into host memory.
pub(crate) fn read_output<B: RuntimeBackend>(
    backend: &B,
    list: ListHandle,
    index: usize,
) -> RuntimeResult<OwnedTensor> {
    let view = backend
        .list_buffer_view(list, index)
        .ok_or(RuntimeError::MissingOutput { index })?;

    let element_type = from_native(backend.buffer_view_element_type(view))?;

    let dims = backend.buffer_view_dims(view);
    let mut shape = Vec::new();
    shape
        .try_reserve_exact(dims.len())
        .map_err(|_| RuntimeError::ResourceExhausted(format!("shape of output {index}")))?;
    for dim in dims {
        let dim = i64::try_from(dim).map_err(|_| {
            RuntimeError::ResourceExhausted(format!("output {index} dimension {dim} exceeds i64"))
        })?;
        shape.push(dim);
    }

    let byte_length = usize::try_from(backend.buffer_view_byte_length(view)).map_err(|_| {
        RuntimeError::ResourceExhausted(format!("output {index} does not fit in host memory"))
    })?;
    let mut data = Vec::new();
    data.try_reserve_exact(byte_length).map_err(|_| {
        RuntimeError::ResourceExhausted(format!("{byte_length} bytes for output {index}"))
    })?;
    data.resize(byte_length, 0);
    backend.read_buffer_view(view, &mut data)?;

    Ok(OwnedTensor {
        element_type,
        shape,
        data,
    })
}

/// Copy every output of `list`, in order. Nothing is returned on failure.
pub(crate) fn read_outputs<B: RuntimeBackend>(
    backend: &B,
    list: ListHandle,
) -> RuntimeResult<Vec<OwnedTensor>> {
    let count = backend.list_len(list);
    let mut results = Vec::new();
    results
        .try_reserve_exact(count)
        .map_err(|_| RuntimeError::ResourceExhausted(format!("{count} output descriptors")))?;
    for index in 0..count {
        results.push(read_output(backend, list, index)?);
    }
    Ok(results)
}
