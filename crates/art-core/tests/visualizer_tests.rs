// Host-side tests for the visualizer attach/detach lifecycle, frame loop and
// uniform inputs.

mod support;

use art_core::*;
use glam::Vec2;
use std::rc::Rc;
use support::*;

#[test]
fn attach_builds_once_and_registers_loop_and_listeners() {
    let host = host();
    let (vis, log) = visualizer(&host);
    vis.attach().unwrap();
    vis.attach().unwrap();
    assert!(vis.is_attached());
    assert_eq!(log.count(|c| matches!(c, RenderCall::Created(_))), 1);
    assert_eq!(log.count(|c| matches!(c, RenderCall::Program(_))), 1);
    assert_eq!(host.listener_count(), 2);
    assert_eq!(host.pending_frames(), 1);

    let u = vis.uniforms().unwrap();
    assert_eq!(u.time, 1.0);
    assert_eq!(u.resolution, Vec2::new(640.0, 480.0));
}

#[test]
fn detach_releases_everything_and_is_idempotent() {
    let host = host();
    let (vis, log) = visualizer(&host);
    vis.attach().unwrap();
    host.run_frame(0.016);
    vis.detach();
    vis.detach();

    assert!(!vis.is_attached());
    assert!(vis.uniforms().is_none());
    assert_eq!(log.count(|c| matches!(c, RenderCall::Released(_))), 2);
    assert_eq!(log.count(|c| *c == RenderCall::Disposed), 1);
    assert_eq!(log.last(), Some(RenderCall::Disposed));
    assert_eq!(host.listener_count(), 0);
    assert_eq!(host.pending_frames(), 0);

    assert_eq!(host.run_frame(0.033), 0);
    assert_eq!(log.renders().len(), 1);
}

#[test]
fn reattach_after_detach_starts_fresh() {
    let host = host();
    let (vis, log) = visualizer(&host);
    vis.attach().unwrap();
    vis.set_input("meter", 0.6);
    vis.detach();
    vis.attach().unwrap();
    assert_eq!(log.count(|c| matches!(c, RenderCall::Created(_))), 2);
    assert_eq!(vis.uniforms().unwrap().meter, 0.0);
    assert_eq!(host.pending_frames(), 1);
}

#[test]
fn meter_input_passes_through_exactly() {
    let host = host();
    let (vis, _log) = visualizer(&host);
    vis.attach().unwrap();
    vis.set_input("meter", 0.73);
    assert_eq!(vis.uniform("meter"), Some(UniformValue::Float(0.73)));

    vis.input().set_input("meter", 1.7);
    assert_eq!(vis.uniforms().unwrap().meter, 1.7);
}

#[test]
fn unknown_inputs_are_ignored() {
    let host = host();
    let (vis, _log) = visualizer(&host);
    vis.attach().unwrap();
    let before = vis.uniforms().unwrap();
    vis.set_input("time", 99.0);
    vis.set_input("brightness", 0.5);
    assert_eq!(vis.uniforms().unwrap(), before);
}

#[test]
fn frame_stamped_before_attach_reports_zero_time() {
    let host = host();
    host.advance_to(2.0);
    let (vis, log) = visualizer(&host);
    vis.attach().unwrap();
    host.run_frame(1.9);
    host.run_frame(2.1);
    let times: Vec<f32> = log.renders().iter().map(|u| u.time).collect();
    assert_eq!(times.len(), 2);
    assert_eq!(times[0], 0.0);
    assert!((times[1] - 0.1).abs() < 1e-6);
}

#[test]
fn time_uniform_tracks_frame_timestamps() {
    let host = host();
    host.advance_to(2.0);
    let (vis, log) = visualizer(&host);
    vis.attach().unwrap();
    host.run_frame(2.5);
    host.run_frame(3.25);
    let times: Vec<f32> = log.renders().iter().map(|u| u.time).collect();
    assert_eq!(times, vec![0.5, 1.25]);
    assert_eq!(vis.frames_rendered(), 2);
}

#[test]
fn resize_updates_resolution_before_next_render() {
    let host = host();
    let (vis, log) = visualizer(&host);
    vis.attach().unwrap();
    host.set_surface_size(Resolution::new(800, 600));
    host.dispatch(HostEvent::Resize);
    assert_eq!(log.last(), Some(RenderCall::Resized(Resolution::new(800, 600))));
    host.run_frame(0.016);
    let renders = log.renders();
    assert_eq!(renders.last().unwrap().resolution, Vec2::new(800.0, 600.0));
}

#[test]
fn pointer_is_normalised_against_the_window() {
    let host = host();
    let (vis, _log) = visualizer(&host);
    vis.attach().unwrap();
    host.dispatch(HostEvent::PointerMove { x: 250.0, y: 375.0 });
    let u = vis.uniforms().unwrap();
    assert_eq!((u.mouse_x, u.mouse_y), (-0.25, 0.25));
}

#[test]
fn blank_shader_text_fails_at_construction() {
    let host = host();
    let log = Rc::new(RenderLog::default());
    let result = Visualizer::new(
        DEFAULT_VERTEX_WGSL,
        "",
        RecordingSurface { log: log.clone() },
        host.clone(),
    );
    assert!(matches!(
        result,
        Err(VisualError::MissingShaderSource(ShaderStage::Fragment))
    ));
    assert!(log.calls.borrow().is_empty());
}

#[test]
fn failed_attach_cleans_up_and_can_be_retried() {
    let host = host();
    let (vis, log) = visualizer(&host);
    log.fail_compile.set(true);
    assert!(matches!(vis.attach(), Err(VisualError::Compile(_))));
    assert!(!vis.is_attached());
    assert_eq!(log.count(|c| matches!(c, RenderCall::Released(_))), 1);
    assert_eq!(log.last(), Some(RenderCall::Disposed));
    assert_eq!(host.listener_count(), 0);
    assert_eq!(host.pending_frames(), 0);

    log.fail_compile.set(false);
    vis.attach().unwrap();
    assert!(vis.is_attached());
}

#[test]
fn render_errors_do_not_stop_the_loop() {
    let host = host();
    let (vis, log) = visualizer(&host);
    vis.attach().unwrap();
    log.fail_render.set(true);
    host.run_frame(0.016);
    assert_eq!(host.pending_frames(), 1);
    log.fail_render.set(false);
    host.run_frame(0.033);
    assert_eq!(log.renders().len(), 1);
}

#[test]
fn frame_dispatched_before_detach_does_not_render() {
    let host = host();
    let (vis, log) = visualizer(&host);
    let vis = Rc::new(vis);
    // Queued ahead of the visualizer's first frame, so both run in one refresh.
    let detacher = vis.clone();
    host.request_frame(Box::new(move |_| detacher.detach()));
    vis.attach().unwrap();
    assert_eq!(host.run_frame(0.016), 2);
    assert!(log.renders().is_empty());
    assert_eq!(host.pending_frames(), 0);
}
