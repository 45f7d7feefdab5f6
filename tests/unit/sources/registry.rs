use super::*;
use crate::sources::frame::FrameRgba;
use crate::sources::sequence::FrameSequence;

fn clip() -> Box<FrameSequence> {
    let mut seq = FrameSequence::clip(10.0).unwrap();
    seq.push_frame(FrameRgba::solid(1, 1, [0, 0, 0, 255])).unwrap();
    seq.push_frame(FrameRgba::solid(1, 1, [1, 0, 0, 255])).unwrap();
    Box::new(seq)
}

#[test]
fn lookup_by_layer_name() {
    let mut reg = SourceRegistry::new();
    reg.insert("legs", Box::new(FrameRgba::solid(4, 6, [9, 9, 9, 255])));
    assert!(reg.contains("legs"));
    assert_eq!(reg.source("legs").unwrap().dimensions(), (4, 6));
    assert!(reg.source("head").is_none());
    assert!(reg.remove("legs").is_some());
    assert!(reg.is_empty());
}

#[test]
fn talking_events_only_touch_synced_sources() {
    let mut reg = SourceRegistry::new();
    reg.insert("head", clip());
    reg.insert_talking_synced("legs", clip());
    // Still images have no playback control and are skipped.
    reg.insert_talking_synced("poster", Box::new(FrameRgba::solid(1, 1, [0; 4])));

    assert_eq!(reg.apply_talking(TalkingEvent::Stopped), 1);
    reg.advance_all(Duration::from_millis(100));

    let legs = reg.source("legs").unwrap().current_frame().unwrap();
    assert_eq!(legs.data[0], 0);
    let head = reg.source("head").unwrap().current_frame().unwrap();
    assert_eq!(head.data[0], 1);

    reg.apply_talking(TalkingEvent::Started);
    reg.advance_all(Duration::from_millis(100));
    let legs = reg.source("legs").unwrap().current_frame().unwrap();
    assert_eq!(legs.data[0], 1);
}
