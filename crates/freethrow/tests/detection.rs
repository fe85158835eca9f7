#![cfg(feature = "image")]

use freethrow::detect::{default_chess_config, detect_checkerboard, detect_pairs, split_pair};
use freethrow::{CalibrationPattern, CheckerboardDetector, CheckerboardParams};
use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn detector() -> CheckerboardDetector {
    CheckerboardDetector::new(CalibrationPattern::default(), CheckerboardParams::default())
        .expect("detector")
}

fn noise(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    GrayImage::from_fn(width, height, |_, _| Luma([rng.gen::<u8>()]))
}

#[test]
fn blank_frame_has_no_board() {
    let img = GrayImage::from_pixel(320, 240, Luma([128]));
    assert!(detect_checkerboard(&img, &default_chess_config(), &detector()).is_none());
}

#[test]
fn noise_has_no_board() {
    let det = detector();
    let cfg = default_chess_config();
    for seed in [1, 7, 42] {
        let img = noise(320, 240, seed);
        assert!(
            detect_checkerboard(&img, &cfg, &det).is_none(),
            "seed {seed}"
        );
    }
}

#[test]
fn pairs_without_boards_are_reported_per_side() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut paths = Vec::new();
    for i in 0..3 {
        let path = dir.path().join(format!("pair_{i}.png"));
        noise(256, 96, i).save(&path).expect("save");
        paths.push(path);
    }
    let found = detect_pairs(&paths, &default_chess_config(), &detector()).expect("detect");
    assert_eq!(128, found.image_size.width);
    assert_eq!(96, found.image_size.height);
    assert_eq!(3, found.left.len());
    assert!(found.left.iter().chain(&found.right).all(Option::is_none));
}

#[test]
fn halves_keep_their_content() {
    let img = GrayImage::from_fn(200, 50, |x, _| Luma([if x < 100 { 20 } else { 220 }]));
    let (l, r) = split_pair(&img);
    assert!(l.pixels().all(|p| p[0] == 20));
    assert!(r.pixels().all(|p| p[0] == 220));
}
