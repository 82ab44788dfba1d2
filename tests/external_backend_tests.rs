//! The external backend driven by stand-in shell scripts instead of the real tool.
#![cfg(unix)]

use image_registration::data::synthetic::blob_scene;
use image_registration::utils::TempWorkspace;
use image_registration::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Script that checks its inputs and writes `result` to `<out>/TransformParameters.0.txt`
fn fake_tool(dir: &Path, result: &str) -> PathBuf {
    let body = format!(
        r#"out=""
fixed=""
params=""
while [ $# -gt 0 ]; do
  case "$1" in
    -out) out="$2"; shift 2 ;;
    -f) fixed="$2"; shift 2 ;;
    -p) params="$2"; shift 2 ;;
    *) shift ;;
  esac
done
[ -f "$fixed" ] || {{ echo "missing fixed image" >&2; exit 2; }}
grep -q "ElementType = MET_USHORT" "$fixed" || {{ echo "unexpected element type" >&2; exit 3; }}
grep -q "NumberOfResolutions" "$params" || {{ echo "no parameter map" >&2; exit 4; }}
cat > "$out/TransformParameters.0.txt" <<'EOF'
{result}
EOF
"#
    );
    write_script(dir, "fake-elastix", &body)
}

fn backend(tool: PathBuf, root: &Path) -> ElastixBackend {
    ElastixBackend::new()
        .with_executable(tool)
        .with_workspace(Arc::new(TempWorkspace::new().with_root(root)))
}

fn pair() -> (Image<u16>, Image<u16>) {
    (blob_scene::<u16>(16, 16), blob_scene::<u16>(16, 16))
}

#[test]
fn test_translation_result_is_marshaled_and_inverted() {
    let scripts = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let tool = fake_tool(
        scripts.path(),
        "(Transform \"TranslationTransform\")\n(NumberOfParameters 2)\n(TransformParameters -2.000000 1.500000)",
    );

    let (fixed, moving) = pair();
    let parameters = ImageRegistration::new()
        .with_backend(Box::new(backend(tool, root.path())))
        .register(&fixed, &moving, TransformClass::Translation)
        .unwrap();

    assert_eq!(parameters.as_array(), &[1.0, 0.0, 0.0, 1.0, 2.0, -1.5]);
    assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
}

#[test]
fn test_affine_result_uses_reported_center() {
    let scripts = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let tool = fake_tool(
        scripts.path(),
        "(Transform \"AffineTransform\")\n\
         (TransformParameters 0.5 0 0 2 1 -1)\n\
         (CenterOfRotationPoint 7.5 7.5)",
    );

    let (fixed, moving) = pair();
    let result = ImageRegistration::new()
        .with_backend(Box::new(backend(tool, root.path())))
        .register_detailed(&fixed, &moving, TransformClass::Affine)
        .unwrap();

    let [m00, m01, m10, m11, tx, ty] = result.parameters.0;
    assert_eq!([m00, m01, m10, m11], [2.0, 0.0, 0.0, 0.5]);
    assert!((tx + 2.0).abs() < 1e-12 && (ty - 0.5).abs() < 1e-12, "{tx}, {ty}");
    assert_eq!(result.backend, "elastix");
    assert!(result.report.is_none());
}

#[test]
fn test_failing_tool_is_a_registration_failure() {
    let scripts = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let tool = write_script(scripts.path(), "broken-elastix", "echo 'boom: cannot read image' >&2\nexit 1\n");

    let (fixed, moving) = pair();
    let err = ImageRegistration::new()
        .with_backend(Box::new(backend(tool, root.path())))
        .register(&fixed, &moving, TransformClass::Translation)
        .unwrap_err();

    match err {
        Error::RegistrationFailed(message) => assert!(message.contains("boom"), "{message}"),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
}

#[test]
fn test_wrong_parameter_count_is_a_registration_failure() {
    let scripts = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let tool = fake_tool(scripts.path(), "(TransformParameters 1 2 3)");

    let (fixed, moving) = pair();
    let err = backend(tool, root.path())
        .estimate(&fixed, &moving, TransformClass::Translation)
        .unwrap_err();
    assert!(matches!(err, Error::RegistrationFailed(_)));
}

#[test]
fn test_missing_working_root_is_a_provisioning_failure() {
    let scripts = tempfile::tempdir().unwrap();
    let tool = fake_tool(scripts.path(), "(TransformParameters 0 0)");
    let missing = scripts.path().join("does/not/exist");

    let (fixed, moving) = pair();
    let err = backend(tool, &missing)
        .estimate(&fixed, &moving, TransformClass::Translation)
        .unwrap_err();
    assert!(matches!(err, Error::ResourceProvisioning(_)));
}
