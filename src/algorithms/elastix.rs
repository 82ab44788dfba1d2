use crate::algorithms::{BackendEstimate, RegistrationBackend};
use crate::config::{ElastixConfig, RegistrationConfig};
use crate::data::{image_center, ImageData};
use crate::error::{Error, Result};
use crate::transform::{parse_parameter_values, TransformClass};
use crate::utils::metaimage;
use crate::utils::{TempWorkspace, WorkspaceProvider};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

/// Key to list-of-values map in the tool's `(Key value ...)` text format
pub type ParameterMap = BTreeMap<String, Vec<String>>;

fn entry(map: &mut ParameterMap, key: &str, values: &[&str]) {
    map.insert(key.to_string(), values.iter().map(|v| v.to_string()).collect());
}

/// The tool's stock map for a translation or affine registration
pub fn default_parameter_map(class: TransformClass) -> ParameterMap {
    let mut map = ParameterMap::new();
    entry(&mut map, "AutomaticParameterEstimation", &["true"]);
    entry(&mut map, "CheckNumberOfSamples", &["true"]);
    entry(&mut map, "DefaultPixelValue", &["0"]);
    entry(&mut map, "FinalBSplineInterpolationOrder", &["3"]);
    entry(&mut map, "FixedImageDimension", &["2"]);
    entry(&mut map, "FixedImagePyramid", &["FixedSmoothingImagePyramid"]);
    entry(&mut map, "FixedInternalImagePixelType", &["float"]);
    entry(&mut map, "HowToCombineTransforms", &["Compose"]);
    entry(&mut map, "ImageSampler", &["RandomCoordinate"]);
    entry(&mut map, "Interpolator", &["LinearInterpolator"]);
    entry(&mut map, "MaximumNumberOfIterations", &["256"]);
    entry(&mut map, "MaximumNumberOfSamplingAttempts", &["8"]);
    entry(&mut map, "Metric", &["AdvancedMattesMutualInformation"]);
    entry(&mut map, "MovingImageDimension", &["2"]);
    entry(&mut map, "MovingImagePyramid", &["MovingSmoothingImagePyramid"]);
    entry(&mut map, "MovingInternalImagePixelType", &["float"]);
    entry(&mut map, "NewSamplesEveryIteration", &["true"]);
    entry(&mut map, "NumberOfHistogramBins", &["32"]);
    entry(&mut map, "NumberOfResolutions", &["4"]);
    entry(&mut map, "NumberOfSamplesForExactGradient", &["4096"]);
    entry(&mut map, "NumberOfSpatialSamples", &["2048"]);
    entry(&mut map, "Optimizer", &["AdaptiveStochasticGradientDescent"]);
    entry(&mut map, "Registration", &["MultiResolutionRegistration"]);
    entry(&mut map, "ResampleInterpolator", &["FinalBSplineInterpolator"]);
    entry(&mut map, "Resampler", &["DefaultResampler"]);
    entry(&mut map, "WriteIterationInfo", &["false"]);
    entry(&mut map, "WriteResultImage", &["false"]);

    match class {
        TransformClass::Translation => {
            entry(&mut map, "AutomaticTransformInitialization", &["true"]);
            entry(&mut map, "Transform", &["TranslationTransform"]);
        }
        TransformClass::Affine => {
            entry(&mut map, "AutomaticScalesEstimation", &["true"]);
            entry(&mut map, "AutomaticTransformInitialization", &["true"]);
            entry(&mut map, "Transform", &["AffineTransform"]);
        }
    }
    map
}

fn format_value(value: &str) -> String {
    if value.parse::<f64>().is_ok() {
        value.to_string()
    } else {
        format!("\"{value}\"")
    }
}

pub fn write_parameter_map(map: &ParameterMap, path: &Path) -> Result<()> {
    let mut text = String::new();
    for (key, values) in map {
        let values: Vec<String> = values.iter().map(|v| format_value(v)).collect();
        text.push_str(&format!("({key} {})\n", values.join(" ")));
    }
    fs::write(path, text)?;
    Ok(())
}

fn tokenize(body: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for ch in body.chars() {
        match ch {
            '"' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

pub fn parse_parameter_map(text: &str) -> ParameterMap {
    text.lines()
        .map(|line| line.split("//").next().unwrap_or("").trim())
        .filter_map(|line| line.strip_prefix('(')?.strip_suffix(')'))
        .filter_map(|body| {
            let mut tokens = tokenize(body).into_iter();
            let key = tokens.next()?;
            Some((key, tokens.collect()))
        })
        .collect()
}

/// Runs the external `elastix` executable in a scratch directory
pub struct ElastixBackend {
    executable: PathBuf,
    result_file: String,
    overrides: ParameterMap,
    workspace: Arc<dyn WorkspaceProvider>,
}

impl Default for ElastixBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ElastixBackend {
    pub fn new() -> Self {
        Self::from_config(&ElastixConfig::default())
    }

    pub fn from_config(config: &ElastixConfig) -> Self {
        let mut workspace = TempWorkspace::new();
        if let Some(root) = &config.working_root {
            workspace = workspace.with_root(root);
        }
        Self {
            executable: config.executable.clone(),
            result_file: config.result_file.clone(),
            overrides: config.parameter_overrides.clone(),
            workspace: Arc::new(workspace),
        }
    }

    pub fn with_executable<P: Into<PathBuf>>(mut self, executable: P) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn with_override(mut self, key: &str, values: &[&str]) -> Self {
        entry(&mut self.overrides, key, values);
        self
    }

    pub fn with_workspace(mut self, workspace: Arc<dyn WorkspaceProvider>) -> Self {
        self.workspace = workspace;
        self
    }

    pub fn parameter_map(&self, class: TransformClass) -> ParameterMap {
        let mut map = default_parameter_map(class);
        map.extend(self.overrides.clone());
        map
    }

    fn run(&self, dir: &Path, fixed: &Path, moving: &Path, parameters: &Path) -> Result<()> {
        let output = Command::new(&self.executable)
            .arg("-f")
            .arg(fixed)
            .arg("-m")
            .arg(moving)
            .arg("-p")
            .arg(parameters)
            .arg("-out")
            .arg(dir)
            .output()
            .map_err(|e| Error::registration(format!("failed to launch {}: {e}", self.executable.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(Error::registration(format!(
                "{} exited with {}: {}",
                self.executable.display(),
                output.status,
                last_lines(&detail, 5)
            )));
        }
        Ok(())
    }
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(n)..].join(" | ")
}

fn io_stage(stage: &'static str) -> impl Fn(Error) -> Error {
    move |e| match e {
        Error::Io(io) => Error::registration(format!("{stage}: {io}")),
        other => other,
    }
}

impl RegistrationBackend for ElastixBackend {
    fn name(&self) -> &str {
        "elastix"
    }

    fn configure(&mut self, config: &RegistrationConfig) -> Result<()> {
        let workspace = Arc::clone(&self.workspace);
        *self = Self::from_config(&config.elastix);
        if config.elastix.working_root.is_none() {
            self.workspace = workspace;
        }
        Ok(())
    }

    fn estimate(&self, fixed: &dyn ImageData, moving: &dyn ImageData, class: TransformClass) -> Result<BackendEstimate> {
        let workdir = self.workspace.provision()?;
        let dir = workdir.path();

        let fixed_path = metaimage::write(&dir.join("fixed.mhd"), fixed).map_err(io_stage("writing fixed image"))?;
        let moving_path =
            metaimage::write(&dir.join("moving.mhd"), moving).map_err(io_stage("writing moving image"))?;
        let parameters_path = dir.join("parameters.txt");
        write_parameter_map(&self.parameter_map(class), &parameters_path)
            .map_err(io_stage("writing parameter file"))?;

        tracing::debug!(
            executable = %self.executable.display(),
            workdir = %dir.display(),
            %class,
            "Running external registration"
        );
        self.run(dir, &fixed_path, &moving_path, &parameters_path)?;

        let result_path = dir.join(&self.result_file);
        let text = fs::read_to_string(&result_path)
            .map_err(|e| Error::registration(format!("no result at {}: {e}", result_path.display())))?;
        let result = parse_parameter_map(&text);

        let raw = result
            .get("TransformParameters")
            .ok_or_else(|| Error::registration("result lacks TransformParameters"))?;
        let parameters = parse_parameter_values(raw.as_slice())?;
        if parameters.len() != class.parameter_count() {
            return Err(Error::registration(format!(
                "expected {} {class} parameters, tool returned {}",
                class.parameter_count(),
                parameters.len()
            )));
        }

        let center = match result.get("CenterOfRotationPoint") {
            Some(values) => match parse_parameter_values(values.as_slice())?.as_slice() {
                &[cx, cy] => [cx, cy],
                _ => return Err(Error::registration("CenterOfRotationPoint must have 2 values")),
            },
            None => image_center(fixed.width(), fixed.height()),
        };

        Ok(BackendEstimate {
            class,
            parameters,
            center,
            report: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.txt");
        let map = default_parameter_map(TransformClass::Affine);
        write_parameter_map(&map, &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("(Transform \"AffineTransform\")"));
        assert!(text.contains("(NumberOfResolutions 4)"));
        assert_eq!(parse_parameter_map(&text), map);
    }

    #[test]
    fn parses_tool_output() {
        let text = "// header comment\n\
                    (Transform \"AffineTransform\")\n\
                    (NumberOfParameters 6)\n\
                    (TransformParameters 1.000000 0.000000 0.000000 1.000000 -2.500000 1.000000)\n\
                    (CenterOfRotationPoint 15.5000000000 11.5000000000)\n";
        let map = parse_parameter_map(text);
        assert_eq!(map["Transform"], vec!["AffineTransform"]);
        let values = parse_parameter_values(map["TransformParameters"].as_slice()).unwrap();
        assert_eq!(values, vec![1.0, 0.0, 0.0, 1.0, -2.5, 1.0]);
    }

    #[test]
    fn overrides_replace_defaults() {
        let backend = ElastixBackend::new().with_override("NumberOfResolutions", &["1"]);
        let map = backend.parameter_map(TransformClass::Translation);
        assert_eq!(map["NumberOfResolutions"], vec!["1"]);
        assert_eq!(map["Transform"], vec!["TranslationTransform"]);
    }

    #[test]
    fn missing_executable_is_a_registration_failure() {
        let root = tempfile::tempdir().unwrap();
        let backend = ElastixBackend::new()
            .with_executable(root.path().join("no-such-elastix"))
            .with_workspace(Arc::new(TempWorkspace::new().with_root(root.path())));
        let image = crate::data::Image::<u8>::from_fn(4, 4, |x, y| (x * 4 + y) as u8);

        let err = backend
            .estimate(&image, &image, TransformClass::Translation)
            .unwrap_err();
        assert!(matches!(err, Error::RegistrationFailed(_)));
        // The scratch directory is gone after the failure
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
