use image_registration::data::synthetic::blob_scene;
use image_registration::*;

fn create_test_pattern<T: Pixel>(width: usize, height: usize) -> Image<T> {
    Image::from_fn(width, height, |x, y| T::saturate_from(((x * 7 + y * 13) % 50) as f64 + 1.0))
}

macro_rules! identity_nearest_reproduces {
    ($($name:ident: $t:ty,)*) => {
        $(
            #[test]
            fn $name() {
                let source = create_test_pattern::<$t>(9, 7);
                let out = image_registration::resample::resample(
                    &source,
                    &AffineTransform::identity(source.center()),
                    InterpolationMode::NearestNeighbor,
                )
                .unwrap();
                assert_eq!(out, source);
            }
        )*
    };
}

identity_nearest_reproduces! {
    identity_nearest_u8: u8,
    identity_nearest_i8: i8,
    identity_nearest_u16: u16,
    identity_nearest_i16: i16,
    identity_nearest_u32: u32,
    identity_nearest_i32: i32,
    identity_nearest_u64: u64,
    identity_nearest_i64: i64,
    identity_nearest_f32: f32,
    identity_nearest_f64: f64,
}

#[test]
fn test_identity_bspline_within_rounding() {
    let source = blob_scene::<u8>(24, 20);
    let out = Resampler::new()
        .resample(&source, &AffineTransform::identity(source.center()), InterpolationMode::CubicBSpline)
        .unwrap();

    for (a, b) in source.as_slice().iter().zip(out.as_slice()) {
        assert!((*a as i32 - *b as i32).abs() <= 1, "{a} vs {b}");
    }
}

#[test]
fn test_shift_then_inverse_restores_interior() {
    let source = create_test_pattern::<i32>(16, 12);
    let forward = AffineTransform::translation([3.0, -2.0], source.center());

    let shifted = Resampler::new()
        .resample(&source, &forward, InterpolationMode::NearestNeighbor)
        .unwrap();
    let restored = Resampler::new()
        .resample(&shifted, &forward.inverse().unwrap(), InterpolationMode::NearestNeighbor)
        .unwrap();

    // Pixels whose shifted position stayed inside the image
    for y in 2..12 {
        for x in 0..13 {
            assert_eq!(restored.get(x, y), source.get(x, y), "pixel ({x}, {y})");
        }
    }
}

#[test]
fn test_affine_then_inverse_bspline_within_tolerance() {
    let source = blob_scene::<f32>(64, 64);
    let (s, c) = 0.08f64.sin_cos();
    let scale = 1.04;
    let forward = AffineTransform {
        linear: [scale * c, -scale * s, scale * s, scale * c],
        translation: [0.35, -0.6],
        origin: source.center(),
    };

    let warped = Resampler::new()
        .resample(&source, &forward, InterpolationMode::CubicBSpline)
        .unwrap();
    let restored = Resampler::new()
        .resample(&warped, &forward.inverse().unwrap(), InterpolationMode::CubicBSpline)
        .unwrap();

    // Interior pixels whose round trip never sampled near the border
    let mut worst = 0.0f64;
    let mut total = 0.0f64;
    let mut count = 0usize;
    for y in 10..54 {
        for x in 10..54 {
            let diff = (restored.get(x, y).unwrap() as f64 - source.get(x, y).unwrap() as f64).abs();
            worst = worst.max(diff);
            total += diff;
            count += 1;
        }
    }
    assert!(worst < 2.0, "max deviation {worst}");
    assert!(total / (count as f64) < 0.5, "mean deviation {}", total / count as f64);
}

#[test]
fn test_rotation_about_center_keeps_center_pixel() {
    let source = create_test_pattern::<f64>(11, 11);
    let (s, c) = std::f64::consts::FRAC_PI_2.sin_cos();
    let rotation = AffineTransform {
        linear: [c, -s, s, c],
        translation: [0.0, 0.0],
        origin: source.center(),
    };
    let out = image_registration::resample::resample(&source, &rotation, InterpolationMode::NearestNeighbor).unwrap();

    assert_eq!(out.get(5, 5), source.get(5, 5));
    // A quarter turn maps (x, y) to (c - (y - c), c + (x - c)) with c = 5
    assert_eq!(out.get(10, 5), source.get(5, 0));
}

#[test]
fn test_singular_transform_is_rejected() {
    let source = create_test_pattern::<u16>(8, 8);
    let degenerate = AffineTransform {
        linear: [0.0, 0.0, 0.0, 0.0],
        ..AffineTransform::identity(source.center())
    };
    for mode in [InterpolationMode::NearestNeighbor, InterpolationMode::CubicBSpline] {
        let err = Resampler::new().resample(&source, &degenerate, mode).unwrap_err();
        assert!(matches!(err, Error::SingularTransform { .. }));
    }
}

#[test]
fn test_outside_samples_take_the_default_value() {
    let source = create_test_pattern::<i8>(6, 6);
    let far = AffineTransform::translation([100.0, 0.0], source.center());
    let out = Resampler::new()
        .with_default_value(-5.0)
        .resample(&source, &far, InterpolationMode::CubicBSpline)
        .unwrap();
    assert!(out.as_slice().iter().all(|&v| v == -5));
}

#[test]
fn test_bspline_half_pixel_at_a_step_edge() {
    let source = Image::<u8>::from_fn(12, 12, |x, _| if x < 6 { 0 } else { 255 });
    let half = AffineTransform::translation([0.5, 0.0], source.center());
    let out = Resampler::new()
        .resample(&source, &half, InterpolationMode::CubicBSpline)
        .unwrap();

    // x = 6 samples the source at 5.5, halfway up the step
    let mid = out.get(6, 3).unwrap();
    assert!((120..=135).contains(&mid), "{mid}");
}
