use super::*;
use crate::calibration::config::MemoryBackend;
use crate::calibration::transform::{LayerDefaults, ScaleBounds};
use crate::foundation::core::Vec2;

fn store() -> Arc<CalibrationStore> {
    Arc::new(CalibrationStore::new([
        (
            "legs".to_owned(),
            LayerDefaults {
                transform: LayerTransform::default(),
                scale_bounds: ScaleBounds::new(0.5, 2.0).unwrap(),
            },
        ),
        ("head".to_owned(), LayerDefaults::default()),
    ]))
}

fn scale_of(outcome: &InputOutcome) -> f64 {
    match outcome {
        InputOutcome::Updated { transform, .. } => transform.scale,
        other => panic!("expected an update, got {other:?}"),
    }
}

#[test]
fn unknown_target_is_rejected() {
    assert!(InputController::new(store(), "torso").is_err());
}

#[test]
fn wheel_needs_shift_and_scroll_down_zooms_out() {
    let mut c = InputController::new(store(), "legs").unwrap();
    let plain = c.handle(InputEvent::Wheel {
        delta_y: 120.0,
        modifiers: Modifiers::default(),
    });
    assert_eq!(plain, InputOutcome::Ignored);

    let down = c.handle(InputEvent::Wheel {
        delta_y: 120.0,
        modifiers: Modifiers::SHIFT,
    });
    assert!((scale_of(&down) - 0.9).abs() < 1e-12);

    let up = c.handle(InputEvent::Wheel {
        delta_y: -3.0,
        modifiers: Modifiers::SHIFT,
    });
    assert!((scale_of(&up) - 1.0).abs() < 1e-12);
}

#[test]
fn ungated_wheel_scales_without_modifier() {
    let bindings = InputBindings {
        wheel_modifier: None,
        ..InputBindings::default()
    };
    let mut c = InputController::new(store(), "legs")
        .unwrap()
        .with_bindings(bindings);
    let out = c.handle(InputEvent::Wheel {
        delta_y: -1.0,
        modifiers: Modifiers::default(),
    });
    assert!((scale_of(&out) - 1.1).abs() < 1e-12);
}

#[test]
fn repeated_zoom_settles_on_the_bounds() {
    let s = store();
    let mut c = InputController::new(Arc::clone(&s), "legs").unwrap();
    for _ in 0..50 {
        c.handle(InputEvent::Button(ControlButton::ZoomIn));
    }
    assert_eq!(s.get("legs").unwrap().scale, 2.0);
    for _ in 0..50 {
        c.handle(InputEvent::Button(ControlButton::ZoomOut));
    }
    assert_eq!(s.get("legs").unwrap().scale, 0.5);
}

#[test]
fn buttons_move_by_the_offset_step() {
    let s = store();
    let mut c = InputController::new(Arc::clone(&s), "head").unwrap();
    c.handle(InputEvent::Button(ControlButton::Up));
    c.handle(InputEvent::Button(ControlButton::Up));
    c.handle(InputEvent::Button(ControlButton::Right));
    assert_eq!(s.get("head").unwrap().offset, Vec2::new(10.0, -20.0));

    c.handle(InputEvent::Button(ControlButton::Left));
    c.handle(InputEvent::Button(ControlButton::Down));
    assert_eq!(s.get("head").unwrap().offset, Vec2::new(0.0, -10.0));

    let out = c.handle(InputEvent::Button(ControlButton::Reset));
    assert!(matches!(out, InputOutcome::Updated { .. }));
    assert_eq!(s.get("head").unwrap(), LayerTransform::default());
}

#[test]
fn drag_requires_shift_or_handle() {
    let s = store();
    let mut c = InputController::new(Arc::clone(&s), "legs").unwrap();

    c.handle(InputEvent::PointerDown {
        at: Point::new(10.0, 10.0),
        modifiers: Modifiers::default(),
        on_handle: false,
    });
    assert!(!c.is_dragging());
    assert_eq!(
        c.handle(InputEvent::PointerMove {
            at: Point::new(50.0, 50.0)
        }),
        InputOutcome::Ignored
    );

    c.handle(InputEvent::PointerDown {
        at: Point::new(10.0, 10.0),
        modifiers: Modifiers::SHIFT,
        on_handle: false,
    });
    c.handle(InputEvent::PointerMove {
        at: Point::new(15.0, 7.0),
    });
    c.handle(InputEvent::PointerMove {
        at: Point::new(20.0, 7.0),
    });
    c.handle(InputEvent::PointerUp);
    assert!(!c.is_dragging());
    assert_eq!(s.get("legs").unwrap().offset, Vec2::new(10.0, -3.0));

    c.handle(InputEvent::PointerDown {
        at: Point::new(0.0, 0.0),
        modifiers: Modifiers::default(),
        on_handle: true,
    });
    c.handle(InputEvent::PointerMove {
        at: Point::new(0.0, 5.0),
    });
    assert_eq!(s.get("legs").unwrap().offset, Vec2::new(10.0, 2.0));
}

#[test]
fn ctrl_j_toggles_the_panel() {
    let mut c = InputController::new(store(), "legs").unwrap();
    assert!(!c.panel_visible());
    assert_eq!(
        c.handle(InputEvent::Key {
            key: 'J',
            modifiers: Modifiers::CTRL
        }),
        InputOutcome::PanelToggled { visible: true }
    );
    assert_eq!(
        c.handle(InputEvent::Key {
            key: 'j',
            modifiers: Modifiers::default()
        }),
        InputOutcome::Ignored
    );
    assert_eq!(
        c.handle(InputEvent::Key {
            key: 'j',
            modifiers: Modifiers::CTRL
        }),
        InputOutcome::PanelToggled { visible: false }
    );
}

#[test]
fn save_reports_failure_once_and_keeps_memory_state() {
    let s = store();
    let backend = MemoryBackend::new();
    let mut c = InputController::new(Arc::clone(&s), "legs")
        .unwrap()
        .with_backend(Arc::new(backend.clone()));

    c.handle(InputEvent::Button(ControlButton::Right));
    backend.set_fail_saves(true);
    let out = c.handle(InputEvent::Button(ControlButton::Save));
    assert!(matches!(out, InputOutcome::SaveFailed { .. }));
    assert_eq!(s.get("legs").unwrap().offset, Vec2::new(10.0, 0.0));
    assert_eq!(backend.saves(), 0);

    backend.set_fail_saves(false);
    let out = c.handle(InputEvent::Key {
        key: 's',
        modifiers: Modifiers::CTRL,
    });
    assert_eq!(out, InputOutcome::Saved);
    assert_eq!(backend.saves(), 1);
    assert_eq!(backend.stored().unwrap()["legs"]["offset"]["x"], 10.0);
}

#[test]
fn save_without_backend_fails() {
    let mut c = InputController::new(store(), "legs").unwrap();
    assert!(matches!(
        c.handle(InputEvent::Button(ControlButton::Save)),
        InputOutcome::SaveFailed { .. }
    ));
}

#[test]
fn select_layer_switches_target() {
    let s = store();
    let mut c = InputController::new(Arc::clone(&s), "legs").unwrap();
    assert_eq!(
        c.handle(InputEvent::SelectLayer("torso".into())),
        InputOutcome::Ignored
    );
    assert_eq!(
        c.handle(InputEvent::SelectLayer("head".into())),
        InputOutcome::TargetChanged {
            layer: "head".into()
        }
    );
    c.handle(InputEvent::Button(ControlButton::ZoomIn));
    assert!((s.get("head").unwrap().scale - 1.1).abs() < 1e-12);
    assert_eq!(s.get("legs").unwrap().scale, 1.0);
}

#[test]
fn buttons_parse_from_cli_names() {
    assert_eq!("zoom-in".parse::<ControlButton>().unwrap(), ControlButton::ZoomIn);
    assert_eq!("Up".parse::<ControlButton>().unwrap(), ControlButton::Up);
    assert!("sideways".parse::<ControlButton>().is_err());
}
