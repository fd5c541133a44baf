//! `Host` over the browser: `setInterval` timers, one shared
//! `requestAnimationFrame` callback that flushes a frame queue, and window
//! event listeners. Closures of removed timers and listeners are released by
//! a zero-delay `setTimeout` sweep, so they never depend on a frame running.

use art_core::host::{FrameCallback, IntervalCallback, ListenerCallback};
use art_core::{EventKind, FrameHandle, Host, HostEvent, ListenerHandle, Resolution, TimerHandle};
use crate::retired::Retired;
use fnv::FnvHashMap;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys as web;

struct JsListener {
    event: &'static str,
    closure: Closure<dyn FnMut(web::Event)>,
}

// Held only so the closure is dropped later.
#[allow(dead_code)]
enum RetiredClosure {
    Interval(Closure<dyn FnMut()>),
    Listener(Closure<dyn FnMut(web::Event)>),
}

#[derive(Default)]
struct WebHostState {
    next_id: u32,
    intervals: FnvHashMap<u32, (i32, Closure<dyn FnMut()>)>,
    frames: Vec<(u32, FrameCallback)>,
    raf_pending: Option<i32>,
    listeners: FnvHashMap<u32, JsListener>,
    // Closures removed while JS might still be running them.
    retired: Retired<RetiredClosure>,
}

impl WebHostState {
    fn next_id(&mut self) -> u32 {
        self.next_id = self.next_id.wrapping_add(1);
        self.next_id
    }
}

pub struct WebHost {
    window: web::Window,
    element: web::Element,
    state: RefCell<WebHostState>,
    raf: RefCell<Option<Closure<dyn FnMut(f64)>>>,
    sweep: RefCell<Option<Closure<dyn FnMut()>>>,
}

impl WebHost {
    /// `element` is the attachment point whose client size the renderer fills.
    pub fn new(window: web::Window, element: web::Element) -> Rc<Self> {
        let host = Rc::new(Self {
            window,
            element,
            state: RefCell::new(WebHostState::default()),
            raf: RefCell::new(None),
            sweep: RefCell::new(None),
        });
        let weak: Weak<Self> = Rc::downgrade(&host);
        *host.raf.borrow_mut() = Some(Closure::wrap(Box::new(move |ts: f64| {
            if let Some(host) = weak.upgrade() {
                host.flush_frames(ts / 1000.0);
            }
        }) as Box<dyn FnMut(f64)>));
        let weak: Weak<Self> = Rc::downgrade(&host);
        *host.sweep.borrow_mut() = Some(Closure::wrap(Box::new(move || {
            if let Some(host) = weak.upgrade() {
                // Dropped outside the borrow.
                let released = host.state.borrow_mut().retired.sweep();
                if !released.is_empty() {
                    log::debug!("[host] released {} closures", released.len());
                }
            }
        }) as Box<dyn FnMut()>));
        host
    }

    /// Park a removed closure until the current JS callback has returned.
    fn retire(&self, closure: RetiredClosure) {
        if !self.state.borrow_mut().retired.retire(closure) {
            return;
        }
        let sweep = self.sweep.borrow();
        let Some(callback) = sweep.as_ref() else {
            return;
        };
        if let Err(e) = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.as_ref().unchecked_ref(), 0)
        {
            log::error!("[host] setTimeout failed: {:?}", e);
            self.state.borrow_mut().retired.sweep_failed();
        }
    }

    fn flush_frames(&self, ts: f64) {
        let frames = {
            let mut st = self.state.borrow_mut();
            st.raf_pending = None;
            std::mem::take(&mut st.frames)
        };
        for (_, callback) in frames {
            callback(ts);
        }
    }

    fn schedule_raf(&self) {
        if self.state.borrow().raf_pending.is_some() {
            return;
        }
        let raf = self.raf.borrow();
        let Some(closure) = raf.as_ref() else {
            return;
        };
        match self
            .window
            .request_animation_frame(closure.as_ref().unchecked_ref())
        {
            Ok(id) => self.state.borrow_mut().raf_pending = Some(id),
            Err(e) => log::error!("[host] requestAnimationFrame failed: {:?}", e),
        }
    }
}

impl Host for WebHost {
    fn now(&self) -> f64 {
        instant::now() / 1000.0
    }

    fn set_interval(&self, period: Duration, mut callback: IntervalCallback) -> TimerHandle {
        let closure = Closure::wrap(Box::new(move || callback()) as Box<dyn FnMut()>);
        let js_id = self
            .window
            .set_interval_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                period.as_millis().min(i32::MAX as u128) as i32,
            )
            .unwrap_or_else(|e| {
                log::error!("[host] setInterval failed: {:?}", e);
                -1
            });
        let mut st = self.state.borrow_mut();
        let id = st.next_id();
        st.intervals.insert(id, (js_id, closure));
        TimerHandle(id)
    }

    fn clear_interval(&self, handle: TimerHandle) {
        let removed = self.state.borrow_mut().intervals.remove(&handle.0);
        if let Some((js_id, closure)) = removed {
            self.window.clear_interval_with_handle(js_id);
            self.retire(RetiredClosure::Interval(closure));
        }
    }

    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let id = {
            let mut st = self.state.borrow_mut();
            let id = st.next_id();
            st.frames.push((id, callback));
            id
        };
        self.schedule_raf();
        FrameHandle(id)
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        let mut st = self.state.borrow_mut();
        st.frames.retain(|(id, _)| *id != handle.0);
        if st.frames.is_empty() {
            if let Some(raf) = st.raf_pending.take() {
                let _ = self.window.cancel_animation_frame(raf);
            }
        }
    }

    fn add_listener(&self, kind: EventKind, mut callback: ListenerCallback) -> ListenerHandle {
        let (event, closure) = match kind {
            EventKind::Resize => (
                "resize",
                Closure::wrap(
                    Box::new(move |_: web::Event| callback(HostEvent::Resize))
                        as Box<dyn FnMut(web::Event)>,
                ),
            ),
            EventKind::PointerMove => (
                "mousemove",
                Closure::wrap(Box::new(move |ev: web::Event| {
                    if let Some(m) = ev.dyn_ref::<web::MouseEvent>() {
                        callback(HostEvent::PointerMove {
                            x: m.client_x() as f32,
                            y: m.client_y() as f32,
                        });
                    }
                }) as Box<dyn FnMut(web::Event)>),
            ),
        };
        let _ = self
            .window
            .add_event_listener_with_callback(event, closure.as_ref().unchecked_ref());
        let mut st = self.state.borrow_mut();
        let id = st.next_id();
        st.listeners.insert(id, JsListener { event, closure });
        ListenerHandle(id)
    }

    fn remove_listener(&self, handle: ListenerHandle) {
        let removed = self.state.borrow_mut().listeners.remove(&handle.0);
        if let Some(l) = removed {
            let _ = self
                .window
                .remove_event_listener_with_callback(l.event, l.closure.as_ref().unchecked_ref());
            self.retire(RetiredClosure::Listener(l.closure));
        }
    }

    fn window_size(&self) -> Resolution {
        let dim = |v: Result<wasm_bindgen::JsValue, wasm_bindgen::JsValue>| {
            v.ok().and_then(|v| v.as_f64()).unwrap_or(0.0).max(0.0) as u32
        };
        Resolution::new(
            dim(self.window.inner_width()),
            dim(self.window.inner_height()),
        )
    }

    fn surface_size(&self) -> Resolution {
        Resolution::new(
            self.element.client_width().max(0) as u32,
            self.element.client_height().max(0) as u32,
        )
    }
}
