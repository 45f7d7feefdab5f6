use super::*;

#[test]
fn straight_frames_check_their_length() {
    assert!(FrameRgba::from_straight(2, 2, vec![0; 16]).is_ok());
    let err = FrameRgba::from_straight(2, 2, vec![0; 15]).unwrap_err();
    assert!(err.to_string().contains("expects 16 bytes"));
    assert!(FrameView::new(1, 1, &[0; 3], false).is_err());
}

#[test]
fn empty_frames_are_not_ready() {
    let empty = FrameRgba::solid(0, 0, [1, 2, 3, 4]);
    assert!(!empty.is_ready());
    assert!(empty.current_frame().is_none());

    let one = FrameRgba::solid(1, 1, [1, 2, 3, 4]);
    assert!(one.is_ready());
    let v = one.current_frame().unwrap();
    assert_eq!(v.data, &[1, 2, 3, 4]);
    assert!(!v.premultiplied);
}

#[test]
fn still_frames_have_no_playback_control() {
    let mut f = FrameRgba::solid(1, 1, [0; 4]);
    f.advance(Duration::from_secs(1));
    assert!(f.playback().is_none());
}
