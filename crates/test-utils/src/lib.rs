//! Shared test utilities for the CLMU preparation workspace.
//!
//! - Test data path helpers
//! - Skip macros for optional real-world inputs (soil rasters, urban tables)
//! - Synthetic reanalysis, soil, urban and template datasets
//! - Common points and dimension sizes
//!
//! ```ignore
//! use test_utils::{generators::template_dataset, fixtures::points, require_test_file};
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

pub use paths::*;

/// Macro to skip a test if the required file is not found.
///
/// The global soil and urban rasters are large and not checked in.
///
/// # Usage
///
/// ```ignore
/// use test_utils::require_test_file;
///
/// #[test]
/// fn test_real_soil_raster() {
///     let path = require_test_file!("soil_texture.nc");
///     // Test code using path...
/// }
/// ```
///
/// If the file is not found, the test will print a skip message and return early.
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        match $crate::find_test_file($name) {
            Some(path) => path,
            None => {
                eprintln!(
                    "SKIPPED: Test file '{}' not found. Download test data or set TEST_DATA_DIR.",
                    $name
                );
                return;
            }
        }
    }};
}

/// Macro to skip a test if any of the required files are not found.
///
/// # Usage
///
/// ```ignore
/// use test_utils::require_test_files;
///
/// #[test]
/// fn test_real_inputs() {
///     let paths = require_test_files!("soil_texture.nc", "urban_properties.nc");
///     // paths is Vec<PathBuf>
/// }
/// ```
#[macro_export]
macro_rules! require_test_files {
    ($($name:expr),+ $(,)?) => {{
        let mut paths = Vec::new();
        $(
            match $crate::find_test_file($name) {
                Some(path) => paths.push(path),
                None => {
                    eprintln!(
                        "SKIPPED: Test file '{}' not found. Download test data or set TEST_DATA_DIR.",
                        $name
                    );
                    return;
                }
            }
        )+
        paths
    }};
}

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(100_989.3, 100_989.0, 1.0); // passes
/// assert_approx_eq!(0.0051_f32, 0.005, 1e-6);     // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Compares the cell a search snapped to with the expected `(lat, lon)`.
///
/// ```ignore
/// use test_utils::assert_coords_approx_eq;
///
/// assert_coords_approx_eq!((sample.cell.lat, sample.cell.lon), (51.52, -0.30), 1e-9);
/// ```
#[macro_export]
macro_rules! assert_coords_approx_eq {
    (($x1:expr, $y1:expr), ($x2:expr, $y2:expr), $epsilon:expr) => {{
        $crate::assert_approx_eq!($x1, $x2, $epsilon);
        $crate::assert_approx_eq!($y1, $y2, $epsilon);
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    fn test_assert_coords_approx_eq_passes() {
        let step = 1.0 / 12.0;
        assert_coords_approx_eq!((8.0 * step, 0.0), (2.0 / 3.0, 0.0), 1e-12);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_coords_approx_eq_checks_longitude() {
        assert_coords_approx_eq!((51.5, 359.75), (51.5, -0.25), 1e-6);
    }
}
