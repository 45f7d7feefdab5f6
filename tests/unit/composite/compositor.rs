use super::*;
use crate::calibration::transform::LayerTransform;
use crate::composite::geometry::{FitPolicy, VerticalAnchor};
use crate::foundation::core::Vec2;
use crate::keying::classify::KeyColorSpec;
use crate::sources::registry::SourceRegistry;
use crate::sources::sequence::FrameSequence;

fn canvas() -> Canvas {
    Canvas::new(4, 6).unwrap()
}

fn compositor(layers: Vec<LayerSpec>) -> LayerCompositor {
    LayerCompositor::new(
        layers,
        ColorClassifier::hsv(KeyColorSpec::green()),
        &CompositorOpts {
            seam: SeamBlend {
                enabled: false,
                ..SeamBlend::default()
            },
            ..CompositorOpts::default()
        },
    )
    .unwrap()
}

fn solid(w: u32, h: u32, rgba: [u8; 4]) -> Box<FrameRgba> {
    Box::new(FrameRgba::solid(w, h, rgba))
}

#[test]
fn rejects_keyed_layer_before_raw_layer() {
    let res = LayerCompositor::new(
        vec![LayerSpec::keyed("head"), LayerSpec::raw("legs")],
        ColorClassifier::default(),
        &CompositorOpts::default(),
    );
    assert!(res.is_err());
}

#[test]
fn skips_whole_frame_while_required_source_is_missing() {
    let mut comp = compositor(vec![LayerSpec::raw("legs"), LayerSpec::keyed("head")]);
    let mut reg = SourceRegistry::new();
    reg.insert("legs", solid(4, 6, [0, 0, 255, 255]));

    let out = comp.render(canvas(), &reg, &CalibrationConfig::default());
    assert_eq!(
        out,
        RenderOutcome::Skipped {
            waiting_on: vec!["head".to_owned()]
        }
    );
    assert!(comp.frame().pixels().is_empty());

    reg.insert("head", Box::new(FrameSequence::live()));
    assert!(!comp.render(canvas(), &reg, &CalibrationConfig::default()).is_drawn());
}

#[test]
fn keyed_backdrop_reveals_the_raw_layer_below() {
    let mut comp = compositor(vec![
        LayerSpec::raw("legs").with_fit(FitPolicy::Cover),
        LayerSpec::keyed("head").with_fit(FitPolicy::Cover),
    ]);
    let mut reg = SourceRegistry::new();
    reg.insert("legs", solid(4, 6, [0, 0, 255, 255]));
    // Head: green backdrop everywhere except a red top row.
    let mut head = FrameRgba::solid(4, 6, [0, 255, 0, 255]);
    head.data[..16].copy_from_slice(&[255, 0, 0, 255].repeat(4));
    reg.insert("head", Box::new(head));

    let RenderOutcome::Drawn(report) = comp.render(canvas(), &reg, &CalibrationConfig::default())
    else {
        panic!("expected a drawn frame");
    };
    assert_eq!(report.drawn, vec!["legs", "head"]);
    assert_eq!(report.draw_calls, 2);

    let f = comp.frame();
    assert_eq!((f.width(), f.height()), (4, 6));
    assert_eq!(f.pixel(1, 0), Some([255, 0, 0, 255]));
    assert_eq!(f.pixel(1, 5), Some([0, 0, 255, 255]));
}

#[test]
fn zero_size_optional_source_gets_no_draw_call() {
    let mut comp = compositor(vec![
        LayerSpec::raw("legs"),
        LayerSpec::raw("poster").with_required(false),
    ]);
    let mut reg = SourceRegistry::new();
    reg.insert("legs", solid(4, 6, [9, 9, 9, 255]));
    reg.insert("poster", solid(0, 0, [255, 0, 0, 255]));

    let RenderOutcome::Drawn(report) = comp.render(canvas(), &reg, &CalibrationConfig::default())
    else {
        panic!("expected a drawn frame");
    };
    assert_eq!(report.draw_calls, 1);
    assert_eq!(
        report.skipped,
        vec![("poster".to_owned(), SkipReason::NotReady)]
    );
}

#[test]
fn background_shows_where_no_layer_draws() {
    let mut comp = compositor(vec![LayerSpec::raw("legs").with_anchor(VerticalAnchor::Bottom)]);
    let mut reg = SourceRegistry::new();
    // 4x2 source contained in 4x6 canvas sits on the bottom two rows.
    reg.insert("legs", solid(4, 2, [0, 0, 0, 255]));
    assert!(comp.render(canvas(), &reg, &CalibrationConfig::default()).is_drawn());
    assert_eq!(comp.frame().pixel(0, 0), Some([255, 255, 255, 255]));
    assert_eq!(comp.frame().pixel(0, 5), Some([0, 0, 0, 255]));
}

#[test]
fn calibration_offsets_move_layers_and_off_canvas_is_reported() {
    let mut comp = compositor(vec![LayerSpec::raw("legs")]);
    let mut reg = SourceRegistry::new();
    reg.insert("legs", solid(4, 6, [0, 0, 0, 255]));
    let mut cal = CalibrationConfig::default();
    cal.layers.insert(
        "legs".to_owned(),
        LayerTransform {
            offset: Vec2::new(100.0, 0.0),
            ..LayerTransform::default()
        },
    );
    let RenderOutcome::Drawn(report) = comp.render(canvas(), &reg, &cal) else {
        panic!("expected a drawn frame");
    };
    assert!(report.drawn.is_empty());
    assert_eq!(report.skipped, vec![("legs".to_owned(), SkipReason::OffCanvas)]);
}

#[test]
fn frame_buffer_follows_canvas_resizes() {
    let mut comp = compositor(vec![LayerSpec::raw("legs")]);
    let mut reg = SourceRegistry::new();
    reg.insert("legs", solid(2, 2, [0, 0, 0, 255]));
    comp.render(canvas(), &reg, &CalibrationConfig::default());
    comp.render(Canvas::new(8, 12).unwrap(), &reg, &CalibrationConfig::default());
    assert_eq!(comp.frame().pixels().len(), 8 * 12 * 4);
    let img = comp.frame().to_rgba_image().unwrap();
    assert_eq!(img.dimensions(), (8, 12));
}
