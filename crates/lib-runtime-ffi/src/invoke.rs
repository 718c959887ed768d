//! Driving a single synchronous call into a loaded module.

use crate::backend::{ListHandle, RuntimeBackend, SessionHandle};
use crate::error::{RuntimeError, RuntimeResult};
use crate::marshal;
use lib_types::{HostTensor, OwnedTensor};

/// Initial capacity of the output list. The runtime grows it as needed.
pub const OUTPUT_LIST_CAPACITY: usize = 4;

/// A VM list released on drop.
struct VmList<'b, B: RuntimeBackend> {
    backend: &'b B,
    handle: ListHandle,
}

impl<'b, B: RuntimeBackend> VmList<'b, B> {
    fn create(backend: &'b B, capacity: usize) -> RuntimeResult<Self> {
        let handle = backend.create_list(capacity)?;
        Ok(Self { backend, handle })
    }
}

impl<B: RuntimeBackend> Drop for VmList<'_, B> {
    fn drop(&mut self) {
        self.backend.release_list(self.handle);
    }
}

/// Marshal `inputs`, call `entry`, and copy the outputs back to the host.
///
/// Both argument lists are released before returning, whatever the outcome.
/// On failure no partial results are returned.
pub(crate) fn invoke_entry<B: RuntimeBackend>(
    backend: &B,
    session: SessionHandle,
    entry: &str,
    inputs: &[HostTensor<'_>],
) -> RuntimeResult<Vec<OwnedTensor>> {
    if entry.is_empty() {
        return Err(RuntimeError::invalid_argument(
            "entry",
            "entry point name is empty",
        ));
    }
    marshal::validate_inputs(inputs)?;

    let input_list = VmList::create(backend, inputs.len())?;
    let output_list = VmList::create(backend, OUTPUT_LIST_CAPACITY)?;

    for tensor in inputs {
        marshal::push_input(backend, session, input_list.handle, tensor)?;
    }

    backend.call(session, entry, input_list.handle, output_list.handle)?;

    let results = marshal::read_outputs(backend, output_list.handle)?;
    tracing::debug!(
        entry,
        inputs = inputs.len(),
        outputs = results.len(),
        "Invocation complete"
    );
    Ok(results)
}
