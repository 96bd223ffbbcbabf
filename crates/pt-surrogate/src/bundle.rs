//! Loading and validating the pair of surrogate models.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

use pt_types::{AxialGrid, ParameterBounds, ProfileKind, PtError, PtResult, Range};

use crate::model::{ModelArtifact, RegressionModel};
use crate::reference::ReferenceProfileModel;

/// File name of the cure model inside a bundle directory.
pub const CURE_MODEL_FILE: &str = "cure_model.json";

/// File name of the temperature model inside a bundle directory.
pub const TEMPERATURE_MODEL_FILE: &str = "temperature_model.json";

/// On-disk unit: one fitted model plus the grid and domain it was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub name: String,
    pub target: ProfileKind,
    pub axial_positions_mm: Vec<f64>,
    pub trained_domain: ParameterBounds,
    pub model: ModelArtifact,
}

impl ModelFile {
    /// Read and validate a model file. Every failure is `ModelNotLoaded`.
    pub fn read(path: &Path, expected: ProfileKind) -> PtResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PtError::model_not_loaded(format!("cannot read {}: {e}", path.display()))
        })?;
        let file: ModelFile = serde_json::from_str(&contents).map_err(|e| {
            PtError::model_not_loaded(format!("corrupt model file {}: {e}", path.display()))
        })?;

        if file.target != expected {
            return Err(PtError::model_not_loaded(format!(
                "{} holds a {} model, expected {}",
                path.display(),
                file.target.name(),
                expected.name()
            )));
        }
        file.validate()
            .map_err(|e| PtError::model_not_loaded(format!("{}: {e}", path.display())))?;
        Ok(file)
    }

    pub fn write(&self, path: &Path) -> PtResult<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn validate(&self) -> PtResult<()> {
        AxialGrid::validate(&self.axial_positions_mm)?;
        self.trained_domain.validate()?;
        self.model.validate()?;
        let outputs = self.model.output_len();
        if outputs != self.axial_positions_mm.len() {
            return Err(PtError::Validation(format!(
                "model {} emits {outputs} values for a {}-point grid",
                self.name,
                self.axial_positions_mm.len()
            )));
        }
        Ok(())
    }
}

/// The cure and temperature surrogates with their shared grid.
///
/// Built once at startup and shared read-only behind an `Arc`.
pub struct ModelBundle {
    axial_positions_mm: Vec<f64>,
    trained_domain: ParameterBounds,
    cure: Box<dyn RegressionModel>,
    temperature: Box<dyn RegressionModel>,
}

impl fmt::Debug for ModelBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBundle")
            .field("grid_points", &self.axial_positions_mm.len())
            .field("trained_domain", &self.trained_domain)
            .field("cure", &self.cure.name())
            .field("temperature", &self.temperature.name())
            .finish()
    }
}

impl ModelBundle {
    /// Assemble a bundle from in-memory models.
    pub fn new(
        axial_positions_mm: Vec<f64>,
        trained_domain: ParameterBounds,
        cure: Box<dyn RegressionModel>,
        temperature: Box<dyn RegressionModel>,
    ) -> PtResult<Self> {
        AxialGrid::validate(&axial_positions_mm)?;
        trained_domain.validate()?;
        for model in [&cure, &temperature] {
            if model.output_len() != axial_positions_mm.len() {
                return Err(PtError::model_not_loaded(format!(
                    "model {} emits {} values for a {}-point grid",
                    model.name(),
                    model.output_len(),
                    axial_positions_mm.len()
                )));
            }
        }
        Ok(Self {
            axial_positions_mm,
            trained_domain,
            cure,
            temperature,
        })
    }

    /// Load `cure_model.json` and `temperature_model.json` from `dir`.
    pub fn load(dir: &Path) -> PtResult<Self> {
        if !dir.is_dir() {
            return Err(PtError::model_not_loaded(format!(
                "model directory {} does not exist",
                dir.display()
            )));
        }
        Self::load_files(&dir.join(CURE_MODEL_FILE), &dir.join(TEMPERATURE_MODEL_FILE))
    }

    /// Load the two model files from explicit paths.
    pub fn load_files(cure_path: &Path, temperature_path: &Path) -> PtResult<Self> {
        let cure = ModelFile::read(cure_path, ProfileKind::Cure)?;
        let temperature = ModelFile::read(temperature_path, ProfileKind::Temperature)?;

        if cure.axial_positions_mm != temperature.axial_positions_mm {
            return Err(PtError::model_not_loaded(
                "cure and temperature models use different axial grids",
            ));
        }

        let trained_domain = if cure.trained_domain == temperature.trained_domain {
            cure.trained_domain
        } else {
            let domain = intersect(&cure.trained_domain, &temperature.trained_domain)?;
            warn!(
                ?domain,
                "Cure and temperature models were trained on different domains, using the overlap"
            );
            domain
        };

        info!(
            cure = %cure.name,
            cure_family = cure.model.family(),
            temperature = %temperature.name,
            temperature_family = temperature.model.family(),
            grid_points = cure.axial_positions_mm.len(),
            "Loaded surrogate model bundle"
        );

        Self::new(
            cure.axial_positions_mm,
            trained_domain,
            Box::new(cure.model),
            Box::new(temperature.model),
        )
    }

    /// Bundle of closed-form reference models on the default grid.
    pub fn reference() -> Self {
        Self {
            cure: Box::new(ModelArtifact::Reference(
                ReferenceProfileModel::with_default_grid(ProfileKind::Cure),
            )),
            temperature: Box::new(ModelArtifact::Reference(
                ReferenceProfileModel::with_default_grid(ProfileKind::Temperature),
            )),
            axial_positions_mm: AxialGrid::default_grid(),
            trained_domain: ParameterBounds::default(),
        }
    }

    /// Write a reference bundle into `dir`, creating it if needed.
    pub fn export_reference(dir: &Path) -> PtResult<()> {
        std::fs::create_dir_all(dir)?;
        let grid = AxialGrid::default_grid();
        for (target, file_name) in [
            (ProfileKind::Cure, CURE_MODEL_FILE),
            (ProfileKind::Temperature, TEMPERATURE_MODEL_FILE),
        ] {
            let file = ModelFile {
                name: format!("reference-{}", target.name()),
                target,
                axial_positions_mm: grid.clone(),
                trained_domain: ParameterBounds::default(),
                model: ModelArtifact::Reference(ReferenceProfileModel::new(target, grid.clone())),
            };
            file.write(&dir.join(file_name))?;
        }
        info!(dir = %dir.display(), "Exported reference model bundle");
        Ok(())
    }

    pub fn axial_positions_mm(&self) -> &[f64] {
        &self.axial_positions_mm
    }

    pub fn trained_domain(&self) -> &ParameterBounds {
        &self.trained_domain
    }

    pub fn cure_model(&self) -> &dyn RegressionModel {
        self.cure.as_ref()
    }

    pub fn temperature_model(&self) -> &dyn RegressionModel {
        self.temperature.as_ref()
    }
}

fn intersect(a: &ParameterBounds, b: &ParameterBounds) -> PtResult<ParameterBounds> {
    let overlap = |x: Range, y: Range| Range::new(x.min.max(y.min), x.max.min(y.max));
    let domain = ParameterBounds {
        rate: overlap(a.rate, b.rate),
        die_temperature: overlap(a.die_temperature, b.die_temperature),
    };
    domain
        .validate()
        .map_err(|e| PtError::model_not_loaded(format!("trained domains do not overlap: {e}")))?;
    Ok(domain)
}
