use criterion::{black_box, criterion_group, criterion_main, Criterion};
use freethrow::core::{ImageSize, Joint, JointMap, Keypoint2, KeypointSeries};
use freethrow::stereo::{Camera, CameraIntrinsics, Distortion, StereoCalibration, Triangulator};
use nalgebra::{Point3, Rotation3, Vector3};

fn rig() -> StereoCalibration {
    StereoCalibration {
        image_size: ImageSize::new(640, 640),
        left: Camera::new(
            CameraIntrinsics::new(610.0, 608.0, 321.0, 318.0),
            Distortion {
                k1: -0.1,
                k2: 0.02,
                ..Distortion::default()
            },
        ),
        right: Camera::new(
            CameraIntrinsics::new(602.0, 600.0, 317.0, 322.0),
            Distortion {
                k1: -0.08,
                ..Distortion::default()
            },
        ),
        rotation: Rotation3::new(Vector3::new(0.0, 0.18, 0.0)).into_inner(),
        translation: Vector3::new(-40.0, 0.5, 6.0),
        rms: 0.2,
    }
}

/// A 120-frame throw with every declared joint visible in both views.
fn throw(c: &StereoCalibration) -> (KeypointSeries, KeypointSeries) {
    let joints: Vec<Joint> = Joint::ALL.to_vec();
    let mut left = KeypointSeries::new(joints.clone()).expect("joints");
    let mut right = KeypointSeries::new(joints.clone()).expect("joints");
    for f in 0..120 {
        let mut l = JointMap::new();
        let mut r = JointMap::new();
        for (j, joint) in joints.iter().enumerate() {
            let a = f as f64 * 0.05 + j as f64 * 0.3;
            let p = Point3::new(10.0 * a.cos(), -30.0 + 2.0 * j as f64, 200.0 + 5.0 * a.sin());
            let pr = Point3::from(c.rotation * p.coords + c.translation);
            if let (Some(pl), Some(prr)) = (c.left.project(&p), c.right.project(&pr)) {
                l.insert(*joint, Keypoint2::new(pl.x / 640.0, pl.y / 640.0, 1.0));
                r.insert(*joint, Keypoint2::new(prr.x / 640.0, prr.y / 640.0, 1.0));
            }
        }
        left.push(l);
        right.push(r);
    }
    (left, right)
}

fn bench_triangulate_series(c: &mut Criterion) {
    let calib = rig();
    let (left, right) = throw(&calib);
    let triangulator = Triangulator::new(&calib);
    c.bench_function("triangulate_series_120x33", |b| {
        b.iter(|| {
            triangulator
                .triangulate_series(black_box(&left), black_box(&right))
                .expect("triangulation")
        })
    });
}

criterion_group!(benches, bench_triangulate_series);
criterion_main!(benches);
