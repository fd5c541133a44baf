//! The host environment the core runs inside: timers, display-refresh frame
//! requests, window events and viewport sizes.
//!
//! Everything here is single-threaded and cooperative. A host must never
//! invoke a callback synchronously from inside the call that registered it;
//! callbacks run later, from the host's own loop.

use fnv::FnvHashMap;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

// Intervals shorter than this are clamped so a zero period cannot spin.
const MIN_INTERVAL_SEC: f64 = 0.001;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerHandle(pub u32);

/// Width/height in physical pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_vec2(self) -> glam::Vec2 {
        glam::Vec2::new(self.width as f32, self.height as f32)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Resize,
    PointerMove,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HostEvent {
    Resize,
    /// Pointer position in window (client) pixels.
    PointerMove { x: f32, y: f32 },
}

impl HostEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            HostEvent::Resize => EventKind::Resize,
            HostEvent::PointerMove { .. } => EventKind::PointerMove,
        }
    }
}

pub type IntervalCallback = Box<dyn FnMut()>;
pub type FrameCallback = Box<dyn FnOnce(f64)>;
pub type ListenerCallback = Box<dyn FnMut(HostEvent)>;

pub trait Host {
    /// Monotonic seconds on the frame/wall-clock timeline.
    fn now(&self) -> f64;
    fn set_interval(&self, period: Duration, callback: IntervalCallback) -> TimerHandle;
    /// Unknown or already-cleared handles are ignored.
    fn clear_interval(&self, handle: TimerHandle);
    /// Run `callback` once on the next display refresh with that frame's timestamp.
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle;
    fn cancel_frame(&self, handle: FrameHandle);
    fn add_listener(&self, kind: EventKind, callback: ListenerCallback) -> ListenerHandle;
    fn remove_listener(&self, handle: ListenerHandle);
    /// Size used to normalize pointer positions.
    fn window_size(&self) -> Resolution;
    /// Size of the attachment point the render target fills.
    fn surface_size(&self) -> Resolution;
}

struct Interval {
    period: f64,
    next_due: f64,
    callback: Option<IntervalCallback>,
}

struct Listener {
    kind: EventKind,
    callback: Option<ListenerCallback>,
}

struct LocalHostState {
    now: f64,
    next_id: u32,
    intervals: FnvHashMap<u32, Interval>,
    frames: Vec<(u32, FrameCallback)>,
    listeners: FnvHashMap<u32, Listener>,
    window_size: Resolution,
    surface_size: Resolution,
}

impl LocalHostState {
    fn next_id(&mut self) -> u32 {
        self.next_id = self.next_id.wrapping_add(1);
        self.next_id
    }
}

/// Cooperative host with an explicit clock.
///
/// The owner drives it: `advance_to` runs due intervals, `run_frame` flushes
/// the frame queue for one display refresh, `dispatch` delivers window
/// events. The native front-end pumps it from the winit event loop; tests
/// pump it by hand.
pub struct LocalHost {
    state: RefCell<LocalHostState>,
}

impl LocalHost {
    pub fn new(window_size: Resolution, surface_size: Resolution) -> Rc<Self> {
        Rc::new(Self {
            state: RefCell::new(LocalHostState {
                now: 0.0,
                next_id: 0,
                intervals: FnvHashMap::default(),
                frames: Vec::new(),
                listeners: FnvHashMap::default(),
                window_size,
                surface_size,
            }),
        })
    }

    pub fn set_window_size(&self, size: Resolution) {
        self.state.borrow_mut().window_size = size;
    }

    pub fn set_surface_size(&self, size: Resolution) {
        self.state.borrow_mut().surface_size = size;
    }

    /// Move the clock forward, running every interval that is due in
    /// due-time order. Each interval runs at most once per call; one that fell
    /// several periods behind skips ahead to its next deadline after `now`.
    /// Returns how many callbacks ran.
    pub fn advance_to(&self, now: f64) -> usize {
        let mut ran = 0;
        loop {
            let due = {
                let mut st = self.state.borrow_mut();
                let next = st
                    .intervals
                    .iter()
                    .filter(|(_, iv)| iv.next_due <= now && iv.callback.is_some())
                    .min_by(|a, b| a.1.next_due.total_cmp(&b.1.next_due).then(a.0.cmp(b.0)))
                    .map(|(id, _)| *id);
                match next {
                    Some(id) => {
                        let iv = st.intervals.get_mut(&id).map(|iv| {
                            let at = iv.next_due;
                            let behind = ((now - at) / iv.period).floor().max(0.0);
                            iv.next_due = at + (behind + 1.0) * iv.period;
                            if iv.next_due <= now {
                                iv.next_due += iv.period;
                            }
                            (at, iv.callback.take())
                        });
                        if let Some((at, _)) = iv {
                            st.now = st.now.max(at);
                        }
                        iv.and_then(|(_, cb)| cb).map(|cb| (id, cb))
                    }
                    None => None,
                }
            };
            let Some((id, mut callback)) = due else {
                break;
            };
            callback();
            ran += 1;
            // The callback may have cleared its own interval.
            if let Some(iv) = self.state.borrow_mut().intervals.get_mut(&id) {
                iv.callback = Some(callback);
            }
        }
        let mut st = self.state.borrow_mut();
        st.now = st.now.max(now);
        ran
    }

    /// One display refresh: run every frame callback queued before this call
    /// with `timestamp`. Callbacks queued while running wait for the next refresh.
    pub fn run_frame(&self, timestamp: f64) -> usize {
        let frames = {
            let mut st = self.state.borrow_mut();
            st.now = st.now.max(timestamp);
            std::mem::take(&mut st.frames)
        };
        let count = frames.len();
        for (_, callback) in frames {
            callback(timestamp);
        }
        count
    }

    /// Deliver a window event to every listener registered for its kind.
    pub fn dispatch(&self, event: HostEvent) -> usize {
        let ids: Vec<u32> = {
            let st = self.state.borrow();
            let mut ids: Vec<u32> = st
                .listeners
                .iter()
                .filter(|(_, l)| l.kind == event.kind())
                .map(|(id, _)| *id)
                .collect();
            ids.sort_unstable();
            ids
        };
        let mut delivered = 0;
        for id in ids {
            let callback = self
                .state
                .borrow_mut()
                .listeners
                .get_mut(&id)
                .and_then(|l| l.callback.take());
            if let Some(mut callback) = callback {
                callback(event);
                delivered += 1;
                if let Some(l) = self.state.borrow_mut().listeners.get_mut(&id) {
                    l.callback = Some(callback);
                }
            }
        }
        delivered
    }

    /// Earliest pending interval deadline, for sleeping the driving loop.
    pub fn next_deadline(&self) -> Option<f64> {
        self.state
            .borrow()
            .intervals
            .values()
            .map(|iv| iv.next_due)
            .min_by(|a, b| a.total_cmp(b))
    }

    pub fn active_intervals(&self) -> usize {
        self.state.borrow().intervals.len()
    }

    pub fn pending_frames(&self) -> usize {
        self.state.borrow().frames.len()
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }
}

impl Host for LocalHost {
    fn now(&self) -> f64 {
        self.state.borrow().now
    }

    fn set_interval(&self, period: Duration, callback: IntervalCallback) -> TimerHandle {
        let mut st = self.state.borrow_mut();
        let id = st.next_id();
        let period = period.as_secs_f64().max(MIN_INTERVAL_SEC);
        let next_due = st.now + period;
        st.intervals.insert(
            id,
            Interval {
                period,
                next_due,
                callback: Some(callback),
            },
        );
        log::debug!("[host] interval {} every {:.0}ms", id, period * 1000.0);
        TimerHandle(id)
    }

    fn clear_interval(&self, handle: TimerHandle) {
        if self.state.borrow_mut().intervals.remove(&handle.0).is_some() {
            log::debug!("[host] interval {} cleared", handle.0);
        }
    }

    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let mut st = self.state.borrow_mut();
        let id = st.next_id();
        st.frames.push((id, callback));
        FrameHandle(id)
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.state
            .borrow_mut()
            .frames
            .retain(|(id, _)| *id != handle.0);
    }

    fn add_listener(&self, kind: EventKind, callback: ListenerCallback) -> ListenerHandle {
        let mut st = self.state.borrow_mut();
        let id = st.next_id();
        st.listeners.insert(
            id,
            Listener {
                kind,
                callback: Some(callback),
            },
        );
        ListenerHandle(id)
    }

    fn remove_listener(&self, handle: ListenerHandle) {
        self.state.borrow_mut().listeners.remove(&handle.0);
    }

    fn window_size(&self) -> Resolution {
        self.state.borrow().window_size
    }

    fn surface_size(&self) -> Resolution {
        self.state.borrow().surface_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn intervals_run_in_due_order_and_repeat() {
        let host = LocalHost::new(Resolution::new(1, 1), Resolution::new(1, 1));
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = log.clone();
        host.set_interval(Duration::from_millis(10), Box::new(move || a.borrow_mut().push('a')));
        let b = log.clone();
        host.set_interval(Duration::from_millis(25), Box::new(move || b.borrow_mut().push('b')));
        assert_eq!(host.advance_to(0.011), 1);
        assert_eq!(host.advance_to(0.021), 1);
        assert_eq!(host.advance_to(0.026), 1);
        assert_eq!(host.advance_to(0.031), 1);
        assert_eq!(host.advance_to(0.034), 0);
        assert_eq!(&*log.borrow(), &['a', 'a', 'b', 'a']);

        // Both due in one call: earlier deadline first.
        assert_eq!(host.advance_to(0.053), 2);
        assert_eq!(&*log.borrow(), &['a', 'a', 'b', 'a', 'a', 'b']);
    }

    #[test]
    fn stalled_clock_runs_each_interval_once() {
        let host = LocalHost::new(Resolution::new(1, 1), Resolution::new(1, 1));
        let runs = Rc::new(Cell::new(0));
        for ms in [10, 50] {
            let r = runs.clone();
            host.set_interval(Duration::from_millis(ms), Box::new(move || r.set(r.get() + 1)));
        }
        assert_eq!(host.advance_to(600.0), 2);
        assert_eq!(runs.get(), 2);

        let next = host.next_deadline().unwrap();
        assert!(next > 600.0 && next <= 600.0 + 0.01 + 1e-9, "next deadline {next}");
        assert_eq!(host.advance_to(600.0), 0);
        assert_eq!(host.advance_to(600.0105), 1);
    }

    #[test]
    fn interval_may_clear_itself() {
        let host = LocalHost::new(Resolution::new(1, 1), Resolution::new(1, 1));
        let runs = Rc::new(Cell::new(0));
        let handle: Rc<Cell<Option<TimerHandle>>> = Rc::new(Cell::new(None));
        let (r, h, host2) = (runs.clone(), handle.clone(), host.clone());
        let id = host.set_interval(
            Duration::from_millis(10),
            Box::new(move || {
                r.set(r.get() + 1);
                if let Some(id) = h.get() {
                    host2.clear_interval(id);
                }
            }),
        );
        handle.set(Some(id));
        host.advance_to(1.0);
        assert_eq!(runs.get(), 1);
        assert_eq!(host.active_intervals(), 0);
    }

    #[test]
    fn frames_requested_during_a_frame_wait_for_the_next_refresh() {
        let host = LocalHost::new(Resolution::new(1, 1), Resolution::new(1, 1));
        let host2 = host.clone();
        host.request_frame(Box::new(move |_| {
            host2.request_frame(Box::new(|_| {}));
        }));
        assert_eq!(host.run_frame(0.016), 1);
        assert_eq!(host.pending_frames(), 1);
        let cancel = host.request_frame(Box::new(|_| panic!("cancelled frame ran")));
        host.cancel_frame(cancel);
        assert_eq!(host.run_frame(0.033), 1);
    }
}
