//! Template surface data: overwrite the single cell with point parameters.

use std::path::PathBuf;

use clmu_common::{wrap_lon_360, GeoPoint};
use netcdf_io::{open_dataset, write_dataset, Dataset};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{SurfDataError, SurfDataResult};
use crate::fractions::{PctUrbanPolicy, UrbanFractions};
use crate::soil::{find_soil, SoilSample, SoilSearch};
use crate::urban::extract_urban;

/// Template dimensions of the single grid cell.
pub const CELL_DIMS: [&str; 2] = ["lsmlat", "lsmlon"];

const CELL: [(&str, usize); 2] = [("lsmlat", 0), ("lsmlon", 0)];

/// Surface data settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfDataConfig {
    #[serde(default = "default_max_search_radius")]
    pub max_search_radius: u32,

    /// Probe spacing in degrees; the soil raster's resolution when unset
    #[serde(default)]
    pub search_step_deg: Option<f64>,

    #[serde(default)]
    pub pct_urban_policy: PctUrbanPolicy,
}

fn default_max_search_radius() -> u32 {
    SoilSearch::default().max_radius
}

impl Default for SurfDataConfig {
    fn default() -> Self {
        Self {
            max_search_radius: default_max_search_radius(),
            search_step_deg: None,
            pct_urban_policy: PctUrbanPolicy::default(),
        }
    }
}

impl SurfDataConfig {
    pub fn soil_search(&self) -> SoilSearch {
        SoilSearch {
            step_deg: self.search_step_deg,
            max_radius: self.max_search_radius,
        }
    }
}

/// Input and output files of one surface data run.
#[derive(Debug, Clone)]
pub struct SurfacePaths {
    pub template: PathBuf,
    pub urban: PathBuf,
    pub soil: PathBuf,
    pub output: PathBuf,
}

/// What a run wrote into the template.
#[derive(Debug, Clone)]
pub struct InjectionReport {
    pub region_id: u32,
    pub urban_cell: GeoPoint,
    pub soil: SoilSample,
    /// Urban variables copied into the template
    pub overwritten: Vec<String>,
    /// Shared variables left alone because they are not on the template cell
    pub skipped: Vec<String>,
}

/// Fail unless the template is a single `lsmlat` x `lsmlon` cell.
pub fn check_template(template: &Dataset) -> SurfDataResult<()> {
    for dim in CELL_DIMS {
        match template.dimension(dim) {
            Some(d) if d.len == 1 => {}
            Some(d) => {
                return Err(SurfDataError::InvalidConfig(format!(
                    "template dimension '{}' has length {}, expected a single cell",
                    dim, d.len
                )))
            }
            None => {
                return Err(SurfDataError::InvalidConfig(format!(
                    "template has no '{}' dimension",
                    dim
                )))
            }
        }
    }
    Ok(())
}

fn on_cell(template: &Dataset, name: &str) -> bool {
    template
        .variable(name)
        .map(|v| CELL_DIMS.iter().all(|d| v.has_dim(d)))
        .unwrap_or(false)
}

/// Overwrite the template cell of variable `name` with `values`.
fn write_cell(template: &mut Dataset, name: &str, values: &[f64]) -> SurfDataResult<()> {
    if !on_cell(template, name) {
        return Err(SurfDataError::MissingVariable(format!(
            "{} on the template cell",
            name
        )));
    }
    let var = template.require_mut(name)?;
    let expected: usize = var
        .dims
        .iter()
        .filter(|d| !CELL_DIMS.contains(&d.name.as_str()))
        .map(|d| d.len)
        .product();
    if expected != values.len() {
        return Err(SurfDataError::shape(
            name,
            format!("template holds {} values per cell, got {}", expected, values.len()),
        ));
    }
    var.assign_at(&CELL, values)?;
    Ok(())
}

/// Copy every variable present in both `params` and the template onto the
/// template cell.
///
/// The template layout without `lsmlat`/`lsmlon` must match the source
/// layout in length, dimension by dimension; names may differ. Missing
/// values are written as 0 and negative `LONGXY` is moved into [0, 360).
///
/// Returns the names written and the shared names skipped because the
/// template variable is not on the cell.
pub fn inject_shared(
    template: &mut Dataset,
    params: &Dataset,
) -> SurfDataResult<(Vec<String>, Vec<String>)> {
    let mut overwritten = Vec::new();
    let mut skipped = Vec::new();

    for source in params.variables() {
        let Some(target) = template.variable(&source.name) else {
            continue;
        };
        if !on_cell(template, &source.name) {
            debug!(variable = %source.name, "Shared variable is not on the template cell");
            skipped.push(source.name.clone());
            continue;
        }

        let target_shape: Vec<usize> = target
            .dims
            .iter()
            .filter(|d| !CELL_DIMS.contains(&d.name.as_str()))
            .map(|d| d.len)
            .collect();
        if target_shape != source.shape() {
            return Err(SurfDataError::shape(
                &source.name,
                format!(
                    "template cell shape {:?} does not match source shape {:?}",
                    target_shape,
                    source.shape()
                ),
            ));
        }

        let wrap = source.name == "LONGXY";
        let values: Vec<f64> = source
            .data
            .iter()
            .map(|v| if v.is_nan() { 0.0 } else { *v })
            .map(|v| if wrap { wrap_lon_360(v) } else { v })
            .collect();

        write_cell(template, &source.name, &values)?;
        overwritten.push(source.name.clone());
    }

    Ok((overwritten, skipped))
}

/// Fill the template in place with urban and soil parameters for `point`.
#[instrument(skip_all, fields(point = %point, fractions = %fractions))]
pub fn build_surface(
    template: &mut Dataset,
    urban: &Dataset,
    soil: &Dataset,
    point: &GeoPoint,
    fractions: &UrbanFractions,
    config: &SurfDataConfig,
) -> SurfDataResult<InjectionReport> {
    let search = config.soil_search();
    search.validate()?;
    fractions.check(config.pct_urban_policy)?;
    check_template(template)?;

    let record = extract_urban(urban, point)?;
    let (overwritten, skipped) = inject_shared(template, &record.params)?;
    info!(
        overwritten = overwritten.len(),
        skipped = skipped.len(),
        "Injected urban parameters"
    );

    write_cell(template, "URBAN_REGION_ID", &[record.region_id as f64])?;
    write_cell(template, "PCT_URBAN", fractions.as_slice())?;

    let sample = find_soil(soil, point, &search)?;
    write_cell(template, "PCT_SAND", &sample.sand)?;
    write_cell(template, "PCT_CLAY", &sample.clay)?;

    Ok(InjectionReport {
        region_id: record.region_id,
        urban_cell: record.cell,
        soil: sample,
        overwritten,
        skipped,
    })
}

/// Read the inputs, fill the template and write the surface file.
#[instrument(skip_all, fields(output = %paths.output.display()))]
pub fn prepare_surface_file(
    paths: &SurfacePaths,
    point: &GeoPoint,
    fractions: &UrbanFractions,
    config: &SurfDataConfig,
) -> SurfDataResult<InjectionReport> {
    let mut template = open_dataset(&paths.template)?;
    let urban = open_dataset(&paths.urban)?;
    let soil = open_dataset(&paths.soil)?;

    let report = build_surface(&mut template, &urban, &soil, point, fractions, config)?;
    write_dataset(&template, &paths.output)?;

    info!(
        path = %paths.output.display(),
        region_id = report.region_id,
        soil_radius = report.soil.radius,
        "Wrote surface data file"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use netcdf_io::{Dimension, VarType, Variable};
    use test_utils::generators::template_dataset;

    #[test]
    fn test_check_template_single_cell() {
        assert!(check_template(&template_dataset()).is_ok());

        let mut wide = Dataset::new();
        wide.insert(
            Variable::new(
                "LONGXY",
                vec![Dimension::new("lsmlat", 2), Dimension::new("lsmlon", 1)],
                VarType::F64,
                vec![0.0, 0.0],
            )
            .unwrap(),
        )
        .unwrap();
        assert!(matches!(
            check_template(&wide),
            Err(SurfDataError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_longxy_wrapped_and_nan_zeroed() {
        let mut template = template_dataset();
        let mut params = Dataset::new();
        params.insert(Variable::scalar("LONGXY", -0.12)).unwrap();
        params
            .insert(
                Variable::new(
                    "CANYON_HWR",
                    vec![Dimension::new("density_class", 3)],
                    VarType::F64,
                    vec![1.0, f64::NAN, 3.0],
                )
                .unwrap(),
            )
            .unwrap();

        let (written, skipped) = inject_shared(&mut template, &params).unwrap();
        assert_eq!(written, vec!["LONGXY", "CANYON_HWR"]);
        assert!(skipped.is_empty());
        assert!((template.require("LONGXY").unwrap().data[0] - 359.88).abs() < 1e-9);
        assert_eq!(template.require("CANYON_HWR").unwrap().data, vec![1.0, 0.0, 3.0]);
    }

    #[test]
    fn test_shape_mismatch_names_variable() {
        let mut template = template_dataset();
        let mut params = Dataset::new();
        params
            .insert(
                Variable::new(
                    "CANYON_HWR",
                    vec![Dimension::new("density_class", 4)],
                    VarType::F64,
                    vec![1.0; 4],
                )
                .unwrap(),
            )
            .unwrap();

        let err = inject_shared(&mut template, &params).unwrap_err();
        match err {
            SurfDataError::Shape { variable, .. } => assert_eq!(variable, "CANYON_HWR"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_off_cell_variable_skipped() {
        let mut template = template_dataset();
        template
            .insert(
                Variable::new("mxsoil_color", vec![], VarType::I32, vec![20.0]).unwrap(),
            )
            .unwrap();
        let mut params = Dataset::new();
        params.insert(Variable::scalar("mxsoil_color", 8.0)).unwrap();

        let (written, skipped) = inject_shared(&mut template, &params).unwrap();
        assert!(written.is_empty());
        assert_eq!(skipped, vec!["mxsoil_color"]);
        assert_eq!(template.require("mxsoil_color").unwrap().data, vec![20.0]);
    }

    #[test]
    fn test_config_defaults() {
        let config = SurfDataConfig::default();
        assert_eq!(config.max_search_radius, 64);
        assert_eq!(config.pct_urban_policy, PctUrbanPolicy::Warn);
        assert_eq!(config.search_step_deg, None);
        assert_eq!(config.soil_search().max_radius, 64);
    }
}
