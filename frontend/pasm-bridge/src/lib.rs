//! The single mutex-guarded record through which the execution thread and
//! the visualisation thread talk. Mirrors a classic command/status bridge:
//! one side writes a request into an otherwise-`None` slot, the other side
//! drains it and clears it back to `None`. A slot that's still occupied is
//! back-pressure -- the new request is dropped and logged, never queued.

use std::sync::Mutex;

use pasm_vm::{Cache, CacheEvent, Disassembly, EventQueue};

/// Default capacity of the bridge's cache-event queue. Chosen generously
/// relative to a single instruction's event fan-out (at most one eviction
/// writeback plus one update) so a visualisation thread running behind by a
/// full timer tick still won't lose events under normal load.
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuiInterrupt {
    None,
    OpenFile,
    CloseFile,
    ChangeCacheBits,
    StartStep,
    Reset,
    SingleStepToggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendInterrupt {
    None,
    Reset,
}

/// A drained gui-to-backend request, paired with whatever payload it carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuiRequest {
    OpenFile(String),
    CloseFile,
    ChangeCacheBits(u8),
    StartStep,
    Reset,
    SingleStepToggle,
}

/// The read-only view the visualisation thread polls every tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeSnapshot {
    pub accumulator: i32,
    pub instruction_size: u8,
    pub instruction_counter: u32,
    pub instruction: String,
    pub coinstruction: String,
    pub cocoinstruction: String,
    pub executing: bool,
    pub single_step_mode: bool,
}

struct Inner {
    gui_interrupt: GuiInterrupt,
    backend_interrupt: BackendInterrupt,
    pending_filename: Option<String>,
    pending_cache_bits: Option<u8>,
    snapshot: BridgeSnapshot,
    cache_snapshot: Option<Cache>,
    ram_snapshot: Vec<u8>,
    events: EventQueue,
}

/// The bridge itself. Cheaply `Clone`-able via `Arc` at the call site, same
/// as the original thread handle; internally it's one `Mutex`.
pub struct Bridge {
    inner: Mutex<Inner>,
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Bridge {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                gui_interrupt: GuiInterrupt::None,
                backend_interrupt: BackendInterrupt::None,
                pending_filename: None,
                pending_cache_bits: None,
                snapshot: BridgeSnapshot::default(),
                cache_snapshot: None,
                ram_snapshot: Vec::new(),
                events: EventQueue::new(EVENT_QUEUE_CAPACITY),
            }),
        }
    }

    fn request(&self, code: GuiInterrupt, payload: impl FnOnce(&mut Inner)) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.gui_interrupt != GuiInterrupt::None {
            log::warn!(
                "dropping gui request {code:?}: backend hasn't acknowledged {:?} yet",
                inner.gui_interrupt
            );
            return false;
        }
        payload(&mut inner);
        inner.gui_interrupt = code;
        true
    }

    pub fn request_open_file(&self, path: String) -> bool {
        self.request(GuiInterrupt::OpenFile, |inner| inner.pending_filename = Some(path))
    }

    pub fn request_close_file(&self) -> bool {
        self.request(GuiInterrupt::CloseFile, |_| {})
    }

    pub fn request_change_cache_bits(&self, cache_bits: u8) -> bool {
        self.request(GuiInterrupt::ChangeCacheBits, |inner| {
            inner.pending_cache_bits = Some(cache_bits);
        })
    }

    pub fn request_start_step(&self) -> bool {
        self.request(GuiInterrupt::StartStep, |_| {})
    }

    pub fn request_reset(&self) -> bool {
        self.request(GuiInterrupt::Reset, |_| {})
    }

    pub fn request_single_step_toggle(&self) -> bool {
        self.request(GuiInterrupt::SingleStepToggle, |_| {})
    }

    /// Backend side: reads and clears the pending gui request, if any.
    pub fn poll_gui_request(&self) -> Option<GuiRequest> {
        let mut inner = self.inner.lock().unwrap();
        let code = inner.gui_interrupt;
        let request = match code {
            GuiInterrupt::None => return None,
            GuiInterrupt::OpenFile => GuiRequest::OpenFile(inner.pending_filename.take()?),
            GuiInterrupt::CloseFile => GuiRequest::CloseFile,
            GuiInterrupt::ChangeCacheBits => GuiRequest::ChangeCacheBits(inner.pending_cache_bits.take()?),
            GuiInterrupt::StartStep => GuiRequest::StartStep,
            GuiInterrupt::Reset => GuiRequest::Reset,
            GuiInterrupt::SingleStepToggle => GuiRequest::SingleStepToggle,
        };
        inner.gui_interrupt = GuiInterrupt::None;
        Some(request)
    }

    /// Backend side: announces a reset to the visualisation thread.
    pub fn notify_backend_reset(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.backend_interrupt != BackendInterrupt::None {
            log::warn!("dropping backend reset notification: gui hasn't acknowledged the last one");
            return false;
        }
        inner.backend_interrupt = BackendInterrupt::Reset;
        true
    }

    /// Gui side: reads and clears the pending backend notification, if any.
    pub fn poll_backend_interrupt(&self) -> BackendInterrupt {
        let mut inner = self.inner.lock().unwrap();
        let code = inner.backend_interrupt;
        inner.backend_interrupt = BackendInterrupt::None;
        code
    }

    /// Backend side: publishes the retired instruction's read views.
    pub fn publish_step(
        &self,
        accumulator: i32,
        instruction_size: u8,
        instruction_counter: u32,
        disasm: &Disassembly,
        executing: bool,
        single_step_mode: bool,
    ) {
        let mut inner = self.inner.lock().unwrap();
        inner.snapshot = BridgeSnapshot {
            accumulator,
            instruction_size,
            instruction_counter,
            instruction: disasm.instruction.clone(),
            coinstruction: disasm.coinstruction.clone(),
            cocoinstruction: disasm.cocoinstruction.clone(),
            executing,
            single_step_mode,
        };
    }

    /// Gui side: the latest published read views.
    pub fn snapshot(&self) -> BridgeSnapshot {
        self.inner.lock().unwrap().snapshot.clone()
    }

    /// Backend side: rebuilds the duplicated cache/RAM image. Called on
    /// reset so the visualisation thread never races the live image.
    pub fn refresh_memory_snapshot(&self, cache: &Cache, ram: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        inner.cache_snapshot = Some(cache.clone());
        inner.ram_snapshot = ram.to_vec();
    }

    /// Gui side: the duplicated cache image, if one has been published yet.
    pub fn cache_snapshot(&self) -> Option<Cache> {
        self.inner.lock().unwrap().cache_snapshot.clone()
    }

    /// Gui side: the duplicated RAM image.
    pub fn ram_snapshot(&self) -> Vec<u8> {
        self.inner.lock().unwrap().ram_snapshot.clone()
    }

    /// Backend side: publishes a cache event, dropping it silently if the
    /// queue is full (the visualisation thread is falling behind).
    pub fn publish_event(&self, event: CacheEvent) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.events.enqueue(event) {
            log::warn!("event queue full, dropping {event:?}");
        }
    }

    /// Gui side: drains every event currently queued.
    pub fn drain_events(&self) -> Vec<CacheEvent> {
        let mut inner = self.inner.lock().unwrap();
        let mut drained = Vec::new();
        while let Some(event) = inner.events.dequeue() {
            drained.push(event);
        }
        drained
    }
}
