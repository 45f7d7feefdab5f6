use super::*;
use crate::calibration::transform::LayerDefaults;
use crate::composite::compositor::{CompositorOpts, LayerCompositor};
use crate::composite::layer::LayerSpec;
use crate::keying::classify::ColorClassifier;
use crate::runtime::scheduler::ManualScheduler;
use crate::runtime::sink::InMemorySink;
use crate::sources::frame::{FrameRgba, FrameSource};
use crate::sources::sequence::{FrameSequence, PlaybackControl};
use crate::sources::talking::talking_channel;

fn make_loop(sources: SourceRegistry) -> RenderLoop<ManualScheduler> {
    let layers = vec![LayerSpec::raw("legs"), LayerSpec::keyed("head")];
    let store = CalibrationStore::new(
        layers
            .iter()
            .map(|l| (l.name.clone(), LayerDefaults::default())),
    );
    let comp =
        LayerCompositor::new(layers, ColorClassifier::default(), &CompositorOpts::default())
            .unwrap();
    RenderLoop::new(
        comp,
        sources,
        Arc::new(store),
        ManualScheduler::new(),
        CanvasSizing {
            default_width: 8,
            aspect: 1.5,
            ..CanvasSizing::default()
        },
    )
    .unwrap()
}

fn ready_sources() -> SourceRegistry {
    let mut reg = SourceRegistry::new();
    reg.insert("legs", Box::new(FrameRgba::solid(4, 4, [0, 0, 255, 255])));
    let mut head = FrameSequence::live();
    head.push_frame(FrameRgba::solid(4, 4, [255, 0, 0, 255]))
        .unwrap();
    reg.insert("head", Box::new(head));
    reg
}

fn fire(lp: &mut RenderLoop<ManualScheduler>) -> TickOutcome {
    let h = lp.scheduler_mut().fire().expect("a tick should be pending");
    lp.tick(h, Instant::now())
}

#[test]
fn starting_twice_schedules_exactly_one_tick() {
    let mut lp = make_loop(ready_sources());
    lp.start();
    lp.start();
    assert_eq!(lp.scheduler().requests(), 1);
    assert_eq!(lp.scheduler().pending().len(), 1);
    assert_eq!(lp.state(), LoopState::WaitingForReady);
}

#[test]
fn stop_cancels_pending_tick_and_is_idempotent() {
    let mut lp = make_loop(ready_sources());
    lp.start();
    lp.stop();
    lp.stop();
    assert_eq!(lp.state(), LoopState::Idle);
    assert!(lp.scheduler().pending().is_empty());
    assert_eq!(lp.scheduler().cancellations(), 1);

    lp.start();
    assert_eq!(lp.scheduler().pending().len(), 1);
}

#[test]
fn waits_until_every_required_source_is_ready() {
    let mut reg = SourceRegistry::new();
    reg.insert("legs", Box::new(FrameRgba::solid(4, 4, [0, 0, 255, 255])));
    reg.insert("head", Box::new(FrameSequence::live()));
    let mut lp = make_loop(reg);
    lp.start();

    assert!(matches!(fire(&mut lp), TickOutcome::Waiting { .. }));
    assert!(matches!(fire(&mut lp), TickOutcome::Waiting { .. }));
    assert_eq!(lp.state(), LoopState::WaitingForReady);

    lp.sources_mut()
        .remove("head")
        .expect("head registered");
    let mut head = FrameSequence::live();
    head.push_frame(FrameRgba::solid(2, 2, [255, 0, 0, 255]))
        .unwrap();
    lp.sources_mut().insert("head", Box::new(head));

    assert!(matches!(fire(&mut lp), TickOutcome::Drawn(_)));
    assert_eq!(lp.state(), LoopState::Rendering);
    let stats = lp.stats();
    assert_eq!((stats.ticks, stats.frames_skipped, stats.frames_drawn), (3, 2, 1));
}

#[test]
fn dropping_a_required_source_returns_to_waiting() {
    let mut lp = make_loop(ready_sources());
    lp.start();
    assert!(matches!(fire(&mut lp), TickOutcome::Drawn(_)));
    lp.sources_mut().remove("legs");
    assert!(matches!(fire(&mut lp), TickOutcome::Waiting { .. }));
    assert_eq!(lp.state(), LoopState::WaitingForReady);
}

#[test]
fn every_tick_keeps_exactly_one_successor() {
    let mut lp = make_loop(ready_sources());
    lp.start();
    for _ in 0..5 {
        fire(&mut lp);
        assert_eq!(lp.scheduler().pending().len(), 1);
    }
    assert_eq!(lp.scheduler().requests(), 6);
}

#[test]
fn stale_handles_are_ignored() {
    let mut lp = make_loop(ready_sources());
    lp.start();
    let h = lp.pending_tick().unwrap();
    lp.stop();
    assert_eq!(lp.tick(h, Instant::now()), TickOutcome::Stale);
    assert_eq!(lp.stats().ticks, 0);
    assert_eq!(lp.stats().stale_ticks, 1);
}

#[test]
fn resize_is_picked_up_on_the_next_tick() {
    let mut lp = make_loop(ready_sources());
    assert_eq!(lp.canvas(), Canvas::new(8, 12).unwrap());
    lp.start();
    lp.resize(20);
    assert_eq!(lp.canvas().width, 8);
    fire(&mut lp);
    assert_eq!(lp.canvas(), Canvas::new(20, 30).unwrap());
    assert_eq!(lp.frame().pixels().len(), 20 * 30 * 4);

    lp.resize(0);
    fire(&mut lp);
    assert_eq!(lp.canvas().width, 8);
}

#[test]
fn oversized_resize_is_rejected_and_the_loop_keeps_drawing() {
    let mut lp = make_loop(ready_sources());
    lp.start();
    fire(&mut lp);
    let before = lp.canvas();

    lp.resize(u32::MAX);
    assert!(matches!(fire(&mut lp), TickOutcome::Drawn(_)));
    assert_eq!(lp.canvas(), before);
    assert_eq!(lp.stats().errors, 1);

    lp.resize(200_000);
    assert!(matches!(fire(&mut lp), TickOutcome::Drawn(_)));
    assert_eq!(lp.canvas(), before);
    assert_eq!(lp.stats().errors, 2);
    assert_eq!(lp.scheduler().pending().len(), 1);
}

#[derive(Default)]
struct Probe {
    log: Arc<std::sync::Mutex<Vec<String>>>,
}

impl FrameSink for Probe {
    fn begin(&mut self, cfg: SinkConfig) -> CompositeResult<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("begin {}x{}", cfg.width, cfg.height));
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, _frame: &CompositeFrame) -> CompositeResult<()> {
        self.log.lock().unwrap().push(format!("frame {}", idx.0));
        Ok(())
    }

    fn end(&mut self) -> CompositeResult<()> {
        self.log.lock().unwrap().push("end".to_owned());
        Ok(())
    }
}

#[test]
fn frames_reach_the_sink_in_order() {
    let probe = Probe::default();
    let log = Arc::clone(&probe.log);
    let mut lp = make_loop(ready_sources());
    lp.set_sink(Box::new(probe));
    lp.start();
    for _ in 0..3 {
        fire(&mut lp);
    }
    lp.unmount();
    assert_eq!(
        *log.lock().unwrap(),
        vec!["begin 8x12", "frame 0", "frame 1", "frame 2", "end"]
    );
    assert_eq!(lp.state(), LoopState::Idle);
    assert!(lp.scheduler().pending().is_empty());
}

#[test]
fn in_memory_sink_keeps_premultiplied_copies() {
    let mut lp = make_loop(ready_sources());
    let mut sink = InMemorySink::new();
    lp.start();
    fire(&mut lp);
    sink.begin(SinkConfig {
        width: 8,
        height: 12,
        fps: None,
    })
    .unwrap();
    sink.push_frame(FrameIndex(0), lp.frame()).unwrap();
    sink.end().unwrap();
    assert!(sink.ended());
    let (_, f) = &sink.frames()[0];
    assert!(f.premultiplied);
    assert_eq!((f.width, f.height), (8, 12));
}

#[test]
fn talking_events_pause_and_resume_synced_sources() {
    let mut reg = ready_sources();
    let mut clip = FrameSequence::clip(10.0).unwrap();
    clip.push_frame(FrameRgba::solid(1, 1, [0; 4])).unwrap();
    clip.push_frame(FrameRgba::solid(1, 1, [1, 0, 0, 0])).unwrap();
    reg.remove("legs");
    reg.insert_talking_synced("legs", Box::new(clip));

    let mut lp = make_loop(reg);
    let (signal, events) = talking_channel();
    lp.attach_talking(events);
    lp.start();

    signal.stopped();
    fire(&mut lp);
    let legs = lp.sources_mut().get_mut("legs").unwrap();
    assert!(!legs.playback().unwrap().is_playing());

    signal.started();
    fire(&mut lp);
    let legs = lp.sources_mut().get_mut("legs").unwrap();
    assert!(legs.playback().unwrap().is_playing());
}

#[test]
fn canvas_sizing_follows_container_width() {
    let s = CanvasSizing::default();
    assert_eq!(s.canvas_for(None).unwrap(), Canvas::new(480, 720).unwrap());
    assert_eq!(s.canvas_for(Some(0)).unwrap(), Canvas::new(480, 720).unwrap());
    assert_eq!(s.canvas_for(Some(301)).unwrap(), Canvas::new(301, 452).unwrap());
    assert!(
        CanvasSizing {
            aspect: 0.0,
            ..CanvasSizing::default()
        }
        .canvas_for(None)
        .is_err()
    );
    assert_eq!(s.canvas_for(Some(3344)).unwrap(), Canvas::new(3344, 5016).unwrap());
    assert!(s.canvas_for(Some(3345)).is_err());
    assert!(s.canvas_for(Some(u32::MAX)).is_err());
}
