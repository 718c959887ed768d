//! In-memory backend for exercising the bridge without a native runtime.
//!
//! Buffer views are reference counted the way the real runtime counts them,
//! so tests can assert that every handle is released.
//!
//! Entry points are dispatched on the name after the last `.`:
//! `identity` returns its inputs, `discard` returns nothing, `int8` returns
//! one tensor of an unsupported type, `opaque` returns a non-view value.
//! Anything else fails with `NOT_FOUND`.

use crate::backend::{
    BufferViewHandle, DeviceHandle, InstanceHandle, ListHandle, RuntimeBackend, SessionHandle,
};
use crate::error::{RuntimeError, RuntimeResult};
use crate::status::StatusCode;
use std::collections::{HashMap, HashSet};
use std::ffi::c_void;
use std::sync::Mutex;

/// Runtime calls recorded by [`FakeRuntime`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    CreateInstance,
    CreateDevice(String),
    CreateSession,
    AppendModule(usize),
    ReleaseSession,
    ReleaseDevice,
    ReleaseInstance,
    CreateList(usize),
    ReleaseList,
    AllocateView,
    Push,
    Call(String),
    Read,
}

/// A call that should fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    Instance,
    Session,
    Module,
    Upload,
    Push,
    Call,
    Read,
}

enum Slot {
    View(usize),
    Opaque,
}

struct View {
    element_type: u32,
    dims: Vec<u64>,
    data: Vec<u8>,
    refs: usize,
}

#[derive(Default)]
struct State {
    next_id: usize,
    events: Vec<Event>,
    faults: Vec<Fault>,
    failing_drivers: Vec<String>,
    live: HashSet<usize>,
    views: HashMap<usize, View>,
    lists: HashMap<usize, Vec<Slot>>,
    last_upload_dims: Option<Vec<u64>>,
}

impl State {
    fn allocate(&mut self) -> usize {
        self.next_id += 1;
        self.live.insert(self.next_id);
        self.next_id
    }

    fn failing(&self, fault: Fault) -> bool {
        self.faults.contains(&fault)
    }

    fn release_view_ref(&mut self, id: usize) {
        if let Some(view) = self.views.get_mut(&id) {
            view.refs -= 1;
            if view.refs == 0 {
                self.views.remove(&id);
            }
        }
    }

    fn new_view(&mut self, element_type: u32, dims: Vec<u64>, data: Vec<u8>) -> usize {
        self.next_id += 1;
        self.views.insert(
            self.next_id,
            View {
                element_type,
                dims,
                data,
                refs: 1,
            },
        );
        self.next_id
    }
}

fn injected(call: &'static str) -> RuntimeError {
    RuntimeError::status(call, StatusCode::Internal, "injected failure")
}

fn raw(id: usize) -> *mut c_void {
    id as *mut c_void
}

fn id(ptr: *mut c_void) -> usize {
    ptr as usize
}

/// Recording in-memory runtime.
#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<State>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Make every subsequent call of the given kind fail.
    pub fn inject(&self, fault: Fault) {
        self.state().faults.push(fault);
    }

    /// Make device creation fail for `driver`.
    pub fn fail_driver(&self, driver: &str) {
        self.state().failing_drivers.push(driver.to_string());
    }

    pub fn events(&self) -> Vec<Event> {
        self.state().events.clone()
    }

    /// Instances, devices, sessions, lists, and buffer views not yet released.
    pub fn live_handles(&self) -> usize {
        let state = self.state();
        state.live.len() + state.views.len()
    }

    pub fn last_upload_dims(&self) -> Option<Vec<u64>> {
        self.state().last_upload_dims.clone()
    }

    fn create(&self, event: Event, fault: Option<Fault>, call: &'static str) -> RuntimeResult<usize> {
        let mut state = self.state();
        state.events.push(event);
        if fault.map_or(false, |f| state.failing(f)) {
            return Err(injected(call));
        }
        Ok(state.allocate())
    }

    fn release(&self, event: Event, ptr: *mut c_void) {
        let mut state = self.state();
        state.events.push(event);
        assert!(state.live.remove(&id(ptr)), "double release of {ptr:?}");
    }
}

impl RuntimeBackend for FakeRuntime {
    fn describe(&self) -> String {
        "fake runtime".to_string()
    }

    fn create_instance(&self) -> RuntimeResult<InstanceHandle> {
        let id = self.create(Event::CreateInstance, Some(Fault::Instance), "create_instance")?;
        Ok(InstanceHandle::from_raw(raw(id)).unwrap())
    }

    fn release_instance(&self, instance: InstanceHandle) {
        self.release(Event::ReleaseInstance, instance.as_ptr());
    }

    fn create_device(&self, _instance: InstanceHandle, driver: &str) -> RuntimeResult<DeviceHandle> {
        let mut state = self.state();
        state.events.push(Event::CreateDevice(driver.to_string()));
        if state.failing_drivers.iter().any(|d| d == driver) {
            return Err(RuntimeError::status(
                "create_device",
                StatusCode::Unavailable,
                format!("driver '{driver}' unavailable"),
            ));
        }
        Ok(DeviceHandle::from_raw(raw(state.allocate())).unwrap())
    }

    fn release_device(&self, device: DeviceHandle) {
        self.release(Event::ReleaseDevice, device.as_ptr());
    }

    fn create_session(
        &self,
        _instance: InstanceHandle,
        _device: DeviceHandle,
    ) -> RuntimeResult<SessionHandle> {
        let id = self.create(Event::CreateSession, Some(Fault::Session), "create_session")?;
        Ok(SessionHandle::from_raw(raw(id)).unwrap())
    }

    fn release_session(&self, session: SessionHandle) {
        self.release(Event::ReleaseSession, session.as_ptr());
    }

    fn append_module(&self, _session: SessionHandle, module: &[u8]) -> RuntimeResult<()> {
        let mut state = self.state();
        state.events.push(Event::AppendModule(module.len()));
        if state.failing(Fault::Module) {
            return Err(injected("append_module"));
        }
        Ok(())
    }

    fn create_list(&self, capacity: usize) -> RuntimeResult<ListHandle> {
        let id = self.create(Event::CreateList(capacity), None, "create_list")?;
        self.state().lists.insert(id, Vec::new());
        Ok(ListHandle::from_raw(raw(id)).unwrap())
    }

    fn release_list(&self, list: ListHandle) {
        self.release(Event::ReleaseList, list.as_ptr());
        let mut state = self.state();
        let slots = state.lists.remove(&id(list.as_ptr())).unwrap_or_default();
        for slot in slots {
            if let Slot::View(view) = slot {
                state.release_view_ref(view);
            }
        }
    }

    fn list_len(&self, list: ListHandle) -> usize {
        self.state().lists[&id(list.as_ptr())].len()
    }

    fn allocate_buffer_copy(
        &self,
        _session: SessionHandle,
        dims: &[u64],
        element_type: u32,
        data: &[u8],
    ) -> RuntimeResult<BufferViewHandle> {
        let mut state = self.state();
        state.events.push(Event::AllocateView);
        if state.failing(Fault::Upload) {
            return Err(injected("allocate_buffer_copy"));
        }
        state.last_upload_dims = Some(dims.to_vec());
        let view = state.new_view(element_type, dims.to_vec(), data.to_vec());
        Ok(BufferViewHandle::from_raw(raw(view)).unwrap())
    }

    fn push_buffer_view(&self, list: ListHandle, view: BufferViewHandle) -> RuntimeResult<()> {
        let mut state = self.state();
        state.events.push(Event::Push);
        let view = id(view.as_ptr());
        if state.failing(Fault::Push) {
            state.release_view_ref(view);
            return Err(injected("push_buffer_view"));
        }
        state
            .lists
            .get_mut(&id(list.as_ptr()))
            .unwrap()
            .push(Slot::View(view));
        Ok(())
    }

    fn call(
        &self,
        _session: SessionHandle,
        entry: &str,
        inputs: ListHandle,
        outputs: ListHandle,
    ) -> RuntimeResult<()> {
        let mut state = self.state();
        state.events.push(Event::Call(entry.to_string()));
        if state.failing(Fault::Call) {
            return Err(injected("call"));
        }

        let function = entry.rsplit('.').next().unwrap_or(entry);
        let results = match function {
            "identity" => {
                let ids: Vec<usize> = state.lists[&id(inputs.as_ptr())]
                    .iter()
                    .filter_map(|slot| match slot {
                        Slot::View(view) => Some(*view),
                        Slot::Opaque => None,
                    })
                    .collect();
                for view in &ids {
                    state.views.get_mut(view).unwrap().refs += 1;
                }
                ids.into_iter().map(Slot::View).collect()
            }
            "discard" => Vec::new(),
            "int8" => vec![Slot::View(state.new_view(0x1000_0008, vec![1], vec![7]))],
            "opaque" => vec![Slot::Opaque],
            _ => {
                return Err(RuntimeError::status(
                    "call",
                    StatusCode::NotFound,
                    format!("function '{entry}' not found"),
                ))
            }
        };
        state
            .lists
            .get_mut(&id(outputs.as_ptr()))
            .unwrap()
            .extend(results);
        Ok(())
    }

    fn list_buffer_view(&self, list: ListHandle, index: usize) -> Option<BufferViewHandle> {
        match self.state().lists[&id(list.as_ptr())].get(index)? {
            Slot::View(view) => BufferViewHandle::from_raw(raw(*view)),
            Slot::Opaque => None,
        }
    }

    fn buffer_view_dims(&self, view: BufferViewHandle) -> Vec<u64> {
        self.state().views[&id(view.as_ptr())].dims.clone()
    }

    fn buffer_view_element_type(&self, view: BufferViewHandle) -> u32 {
        self.state().views[&id(view.as_ptr())].element_type
    }

    fn buffer_view_byte_length(&self, view: BufferViewHandle) -> u64 {
        self.state().views[&id(view.as_ptr())].data.len() as u64
    }

    fn read_buffer_view(&self, view: BufferViewHandle, target: &mut [u8]) -> RuntimeResult<()> {
        let mut state = self.state();
        state.events.push(Event::Read);
        if state.failing(Fault::Read) {
            return Err(injected("read_buffer_view"));
        }
        target.copy_from_slice(&state.views[&id(view.as_ptr())].data);
        Ok(())
    }
}
