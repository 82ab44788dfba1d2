use image_registration::bindings::{self, Status};
use image_registration::data::synthetic::{blob_scene, checkerboard};
use image_registration::*;

const IDENTITY: [f64; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

#[test]
fn test_safe_interpolate_identity_keeps_pixels() {
    let original: Vec<i32> = (0..20).map(|v| v * 1000 - 7000).collect();
    let mut image = original.clone();
    bindings::interpolate(5, 4, &IDENTITY, &[2.0, 1.5], &mut image, InterpolationMode::NearestNeighbor).unwrap();
    assert_eq!(image, original);
}

#[test]
fn test_safe_interpolate_rejects_wrong_buffer_length() {
    let mut image = vec![1u8; 11];
    let err = bindings::interpolate(4, 3, &IDENTITY, &[0.0, 0.0], &mut image, InterpolationMode::CubicBSpline)
        .unwrap_err();
    assert!(matches!(err, Error::BufferSize { expected: 12, actual: 11 }));
    assert_eq!(image, vec![1u8; 11]);
}

#[test]
fn test_singular_transform_leaves_buffer_untouched() {
    let mut image: Vec<u8> = (0..16).collect();
    let flat = [1.0, 2.0, 0.5, 1.0, 0.0, 0.0];
    let status = unsafe {
        bindings::imreg_interpolate_u8(4, 4, flat.as_ptr(), [1.5, 1.5].as_ptr(), image.as_mut_ptr(), 1)
    };
    assert_eq!(status, Status::SingularTransform.code());
    assert_eq!(image, (0..16).collect::<Vec<u8>>());
}

#[test]
fn test_mismatched_registration_leaves_output_untouched() {
    let fixed = vec![0.5f32; 16];
    let moving = vec![0.5f32; 20];
    let mut out = [9.0; 6];
    let err = bindings::register(
        4,
        4,
        &fixed,
        &moving,
        TransformClass::Affine,
        BackendKind::StepDescent,
        &mut out,
    )
    .unwrap_err();
    assert!(matches!(err, Error::BufferSize { .. }));
    assert_eq!(out, [9.0; 6]);
}

#[test]
fn test_c_registration_of_a_checkerboard() {
    let board = checkerboard::<u8>(8, 8, 2, 0.0, 255.0);
    let mut out = [f64::NAN; 6];
    let status = unsafe {
        bindings::imreg_register_u8(
            8,
            8,
            board.as_slice().as_ptr(),
            board.as_slice().as_ptr(),
            0,
            0,
            out.as_mut_ptr(),
        )
    };
    assert_eq!(status, Status::Ok.code());
    assert_eq!(&out[..4], &[1.0, 0.0, 0.0, 1.0]);
    assert!(out[4].abs() < 0.05 && out[5].abs() < 0.05, "{out:?}");
}

#[test]
fn test_c_registration_reports_failures_by_code() {
    let flat = vec![3u16; 64];
    let scene = blob_scene::<u16>(8, 8);
    let mut out = [7.0; 6];
    let status = unsafe {
        bindings::imreg_register_u16(8, 8, flat.as_ptr(), scene.as_slice().as_ptr(), 1, 0, out.as_mut_ptr())
    };
    assert_eq!(status, Status::RegistrationFailed.code());
    assert_eq!(out, [7.0; 6]);

    let status = unsafe {
        bindings::imreg_register_u16(8, 8, flat.as_ptr(), flat.as_ptr(), 2, 0, out.as_mut_ptr())
    };
    assert_eq!(status, Status::InvalidArgument.code());
}
