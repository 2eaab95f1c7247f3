//! Occlusion, timer and primitive queries.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::device::Device;
use crate::error::{GlError, Result};
use crate::resource::{allocate, GlHandle, ObjectKind};

/// What a [`Query`] counts.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum QueryKind {
    SamplesPassed,
    AnySamplesPassed,
    /// Nanoseconds between `begin` and `end` on the device timeline.
    TimeElapsed,
    PrimitivesGenerated,
}

impl QueryKind {
    /// Kinds counted by a query created with an empty kind list.
    pub const DEFAULT: [QueryKind; 3] = [QueryKind::SamplesPassed, QueryKind::TimeElapsed, QueryKind::PrimitivesGenerated];

    fn target(self) -> u32 {
        match self {
            QueryKind::SamplesPassed => glow::SAMPLES_PASSED,
            QueryKind::AnySamplesPassed => glow::ANY_SAMPLES_PASSED,
            QueryKind::TimeElapsed => glow::TIME_ELAPSED,
            QueryKind::PrimitivesGenerated => glow::PRIMITIVES_GENERATED,
        }
    }
}

struct Slot {
    kind: QueryKind,
    handle: GlHandle,
}

struct QueryShared {
    slots: Vec<Slot>,
    active: Cell<bool>,
}

/// A set of native queries that begin and end together.
#[derive(Clone)]
pub struct Query {
    shared: Rc<QueryShared>,
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("kinds", &self.kinds())
            .field("active", &self.shared.active.get())
            .finish()
    }
}

impl Device {
    /// One native query per distinct entry of `kinds`, or
    /// [`QueryKind::DEFAULT`] when `kinds` is empty.
    ///
    /// `SamplesPassed` and `AnySamplesPassed` share a native target and cannot
    /// be combined.
    pub fn query(&self, kinds: &[QueryKind]) -> Result<Query> {
        let kinds = if kinds.is_empty() { &QueryKind::DEFAULT[..] } else { kinds };
        let mut slots: Vec<Slot> = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            if slots.iter().any(|s| s.kind == kind) {
                continue;
            }
            let occlusion = |k: QueryKind| matches!(k, QueryKind::SamplesPassed | QueryKind::AnySamplesPassed);
            if occlusion(kind) && slots.iter().any(|s| occlusion(s.kind)) {
                return Err(GlError::invalid("SamplesPassed and AnySamplesPassed cannot be combined"));
            }
            // Slots created so far are freed by their handles on early return.
            slots.push(Slot { kind, handle: allocate(self.inner(), ObjectKind::Query)? });
        }
        Ok(Query { shared: Rc::new(QueryShared { slots, active: Cell::new(false) }) })
    }
}

impl Query {
    pub fn kinds(&self) -> Vec<QueryKind> {
        self.shared.slots.iter().map(|s| s.kind).collect()
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.get()
    }

    pub fn begin(&self) {
        assert!(!self.shared.active.get(), "query begun twice without end");
        let device = self.first().handle.device();
        let gl = device.gl();
        for slot in &self.shared.slots {
            gl.begin_query(slot.kind.target(), slot.handle.glo());
        }
        self.shared.active.set(true);
    }

    pub fn end(&self) {
        assert!(self.shared.active.get(), "query ended without begin");
        let device = self.first().handle.device();
        let gl = device.gl();
        for slot in self.shared.slots.iter().rev() {
            gl.end_query(slot.kind.target());
        }
        self.shared.active.set(false);
        device.check("ending a query");
    }

    /// Runs `f` between `begin` and `end`.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        self.begin();
        let out = f();
        self.end();
        out
    }

    /// Waits for and returns the result of `kind`. `None` when the query does
    /// not count `kind`.
    pub fn result(&self, kind: QueryKind) -> Option<u64> {
        assert!(!self.shared.active.get(), "query results are unavailable while the query is active");
        let slot = self.shared.slots.iter().find(|s| s.kind == kind)?;
        let device = slot.handle.device();
        Some(device.gl().get_query_result(slot.handle.glo()))
    }

    pub fn samples(&self) -> Option<u64> {
        self.result(QueryKind::SamplesPassed)
    }

    pub fn any_samples(&self) -> Option<bool> {
        self.result(QueryKind::AnySamplesPassed).map(|n| n != 0)
    }

    /// Nanoseconds.
    pub fn elapsed(&self) -> Option<u64> {
        self.result(QueryKind::TimeElapsed)
    }

    pub fn primitives(&self) -> Option<u64> {
        self.result(QueryKind::PrimitivesGenerated)
    }

    fn first(&self) -> &Slot {
        // `Device::query` always creates at least one slot.
        &self.shared.slots[0]
    }

    pub fn release(&self) {
        for slot in &self.shared.slots {
            slot.handle.release();
        }
    }

    pub fn released(&self) -> bool {
        self.first().handle.released()
    }
}
