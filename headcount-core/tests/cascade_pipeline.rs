use headcount_core::{CascadeSet, FusionConfig, PeopleCounter};
use headcount_utils::{ResolvedCascades, config::DetectionSettings, fixture_path};
use image::{DynamicImage, GrayImage, Luma};

const EDGE: u32 = 60;

fn fixture_cascades() -> ResolvedCascades {
    let path = fixture_path("cascades/edge_cascade.xml").expect("cascade fixture");
    ResolvedCascades {
        frontal: path.clone(),
        frontal_alt: path.clone(),
        profile: path,
    }
}

fn raw_hit_settings() -> DetectionSettings {
    DetectionSettings {
        min_neighbors: 0,
        ..DetectionSettings::default()
    }
}

fn dark_to_bright(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, _| Luma([if x < EDGE { 0 } else { 255 }]))
}

#[test]
fn edge_cascade_detections_sit_on_the_edge() {
    let cascades = CascadeSet::load(&fixture_cascades()).expect("load cascades");
    let counter = PeopleCounter::new(cascades, raw_hit_settings(), FusionConfig::default());

    let output = counter.count_gray(&dark_to_bright(120, 120)).expect("count");

    assert!(!output.passes.frontal.is_empty());
    assert_eq!(output.passes.frontal, output.passes.profile);
    // The flipped frame goes bright to dark, which this cascade never accepts.
    assert!(output.passes.mirrored_profile.is_empty());

    assert!(output.count() >= 1);
    for detection in &output.detections {
        let (cx, _) = detection.center();
        assert!(
            (cx - EDGE as i32).abs() <= detection.width,
            "{detection:?} is far from the edge"
        );
    }
}

#[test]
fn featureless_image_counts_zero() {
    let cascades = CascadeSet::load(&fixture_cascades()).expect("load cascades");
    let counter = PeopleCounter::new(cascades, raw_hit_settings(), FusionConfig::default())
        .with_parallel_detectors(true);
    let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(96, 64, Luma([77])));
    let output = counter.count_image(&image).expect("count");
    assert_eq!(output.count(), 0);
    assert!(output.candidates.is_empty());
}

#[test]
fn missing_cascade_file_is_reported() {
    let mut paths = fixture_cascades();
    paths.profile = paths.profile.with_file_name("does_not_exist.xml");
    let err = CascadeSet::load(&paths).err().expect("load should fail");
    assert!(format!("{err:#}").contains("does_not_exist.xml"));
}
