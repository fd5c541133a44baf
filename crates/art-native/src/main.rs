mod audio;
mod surface;

use art_core::{App, AudioConfig, HostEvent, LocalHost, Resolution, ShaderSource, Topology};
use art_render::GpuContext;
use audio::CpalBackend;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use surface::WindowSurface;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

const TITLE: &str = "digital-art";

fn resolution(size: PhysicalSize<u32>) -> Resolution {
    Resolution::new(size.width, size.height)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let [w, h] = art_core::constants::FALLBACK_VIEWPORT;
    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(TITLE)
            .with_inner_size(LogicalSize::new(w, h))
            .build(&event_loop)?,
    );

    let gpu = {
        let instance = wgpu::Instance::default();
        let probe = instance.create_surface(window.clone())?;
        let gpu = pollster::block_on(GpuContext::new(instance, Some(&probe)))?;
        drop(probe);
        Rc::new(gpu)
    };

    let size = resolution(window.inner_size());
    let host = LocalHost::new(size, size);
    let clock = Instant::now();
    let mut app = App::new(
        CpalBackend,
        WindowSurface::new(gpu, window.clone()),
        ShaderSource::bundled(),
        Topology::digital_art()?,
        AudioConfig::default(),
        host.clone(),
    );
    app.mount()?;
    window.set_title(&format!("{} - {}", TITLE, app.label()));
    log::info!("[app] space toggles music, V toggles visuals");

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { event, .. } => match event {
            WindowEvent::CloseRequested => {
                app.unmount();
                elwt.exit();
            }
            WindowEvent::Resized(size) => {
                host.set_window_size(resolution(size));
                host.set_surface_size(resolution(size));
                host.dispatch(HostEvent::Resize);
            }
            WindowEvent::CursorMoved { position, .. } => {
                host.dispatch(HostEvent::PointerMove {
                    x: position.x as f32,
                    y: position.y as f32,
                });
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match code {
                KeyCode::Space => {
                    if let Err(e) = app.toggle() {
                        log::error!("[app] {}", e);
                    }
                    window.set_title(&format!("{} - {}", TITLE, app.label()));
                }
                KeyCode::KeyV => {
                    if app.visualizer.is_attached() {
                        app.visualizer.detach();
                    } else if let Err(e) = app.visualizer.attach() {
                        log::error!("[app] {}", e);
                    }
                }
                KeyCode::Escape => {
                    app.unmount();
                    elwt.exit();
                }
                _ => {}
            },
            WindowEvent::RedrawRequested => {
                host.run_frame(clock.elapsed().as_secs_f64());
            }
            _ => {}
        },
        Event::AboutToWait => {
            host.advance_to(clock.elapsed().as_secs_f64());
            if host.pending_frames() > 0 {
                window.request_redraw();
            }
            // Wake for the next scheduler or sampling tick even with no redraws pending.
            match host.next_deadline() {
                Some(due) => elwt.set_control_flow(ControlFlow::WaitUntil(
                    clock + Duration::from_secs_f64(due.max(0.0)),
                )),
                None => elwt.set_control_flow(ControlFlow::Wait),
            }
        }
        _ => {}
    })?;
    Ok(())
}
