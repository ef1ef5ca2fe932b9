//! Conditional grids: cubes gated by predicates over earlier draws.

use std::fmt;
use std::sync::Arc;

use mt_types::{HyperParams, ParameterValue, TunerError, TunerResult};

use crate::cube::CubeGrid;
use crate::grid::SearchGrid;

/// Predicate deciding whether a cube takes part in the current draw.
pub type Condition = Arc<dyn Fn(&PartialAssignment<'_>) -> TunerResult<bool> + Send + Sync>;

/// Read-only view of the hyperparameters drawn so far in one `pick`.
///
/// Every accessor fails with [`TunerError::Dependency`] when the key has not
/// been drawn yet, so conditions can use `?` and the grid reports the
/// unresolved name instead of a generic lookup failure.
#[derive(Debug, Clone, Copy)]
pub struct PartialAssignment<'a> {
    values: &'a HyperParams,
}

impl<'a> PartialAssignment<'a> {
    pub fn new(values: &'a HyperParams) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> TunerResult<&'a ParameterValue> {
        self.values.get(key).ok_or_else(|| TunerError::Dependency {
            key: key.to_string(),
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn f64(&self, key: &str) -> TunerResult<f64> {
        let value = self.get(key)?;
        value.as_f64().ok_or_else(|| mismatch(key, "number", value))
    }

    pub fn i64(&self, key: &str) -> TunerResult<i64> {
        let value = self.get(key)?;
        value.as_i64().ok_or_else(|| mismatch(key, "int", value))
    }

    pub fn str(&self, key: &str) -> TunerResult<&'a str> {
        let value = self.get(key)?;
        value.as_str().ok_or_else(|| mismatch(key, "string", value))
    }

    pub fn bool(&self, key: &str) -> TunerResult<bool> {
        let value = self.get(key)?;
        value.as_bool().ok_or_else(|| mismatch(key, "bool", value))
    }

    pub fn is_null(&self, key: &str) -> TunerResult<bool> {
        Ok(self.get(key)?.is_null())
    }

    pub fn as_map(&self) -> &'a HyperParams {
        self.values
    }
}

fn mismatch(key: &str, expected: &'static str, actual: &ParameterValue) -> TunerError {
    TunerError::TypeMismatch {
        key: key.to_string(),
        expected,
        actual: actual.type_name().to_string(),
    }
}

fn always(_: &PartialAssignment<'_>) -> TunerResult<bool> {
    Ok(true)
}

#[derive(Clone)]
struct ConditionalCube {
    cube: CubeGrid,
    condition: Condition,
}

/// Ordered sequence of cubes, each drawn only when its condition holds for
/// the values drawn by the cubes before it.
#[derive(Clone)]
pub struct ConditionalGrid {
    name: String,
    seed: Option<u64>,
    cubes: Vec<ConditionalCube>,
}

impl ConditionalGrid {
    pub fn new() -> Self {
        Self {
            name: "conditional".to_string(),
            seed: None,
            cubes: Vec::new(),
        }
    }

    /// A grid whose seed overrides the seed of every cube added to it.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::new()
        }
    }

    /// Builder-style variant of [`ConditionalGrid::with_seed`] taking an optional seed.
    pub fn with_optional_seed(seed: Option<u64>) -> Self {
        Self {
            seed,
            ..Self::new()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Append a cube that is drawn on every pick.
    pub fn add_cube(&mut self, cube: &CubeGrid) {
        self.push(cube, Arc::new(always));
    }

    /// Append a cube drawn only when `condition` holds for the partial assignment.
    pub fn add_conditional_cube<F>(&mut self, cube: &CubeGrid, condition: F)
    where
        F: Fn(&PartialAssignment<'_>) -> TunerResult<bool> + Send + Sync + 'static,
    {
        self.push(cube, Arc::new(condition));
    }

    fn push(&mut self, cube: &CubeGrid, condition: Condition) {
        let mut cube = cube.clone();
        if let Some(seed) = self.seed {
            cube.set_seed(seed);
        }
        self.cubes.push(ConditionalCube { cube, condition });
    }

    /// Draw one assignment, evaluating conditions in insertion order.
    /// Later cubes overwrite values of earlier cubes with the same name.
    pub fn pick(&mut self) -> TunerResult<HyperParams> {
        let mut assignment = HyperParams::new();
        for entry in &mut self.cubes {
            let active = (entry.condition)(&PartialAssignment::new(&assignment))?;
            if active {
                assignment.extend(entry.cube.pick());
            }
        }
        Ok(assignment)
    }

    pub fn reset_seed(&mut self) {
        for entry in &mut self.cubes {
            entry.cube.reset_seed();
        }
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn len(&self) -> usize {
        self.cubes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cubes.is_empty()
    }

    pub fn cubes(&self) -> impl Iterator<Item = &CubeGrid> {
        self.cubes.iter().map(|entry| &entry.cube)
    }
}

impl Default for ConditionalGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConditionalGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalGrid")
            .field("name", &self.name)
            .field("seed", &self.seed)
            .field("cubes", &self.cubes.iter().map(|c| &c.cube).collect::<Vec<_>>())
            .finish()
    }
}

impl SearchGrid for ConditionalGrid {
    fn pick(&mut self) -> TunerResult<HyperParams> {
        ConditionalGrid::pick(self)
    }

    fn reset_seed(&mut self) {
        ConditionalGrid::reset_seed(self)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cube::{Distribution, Space, ValueSpec};

    fn real_cube(name: &str, low: f64, high: f64) -> CubeGrid {
        CubeGrid::new().add_real(name, low, high).unwrap()
    }

    fn fixed_int_cube(name: &str, value: i64) -> CubeGrid {
        CubeGrid::new().add_fixed(name, value, Space::Int).unwrap()
    }

    #[test]
    fn reset_seed_replays_conditional_draws() {
        let grid_1 = real_cube("param_1", 0.0, 1.0);
        let grid_2 = real_cube("param_2", 0.0, 1.0);
        let grid_3 = real_cube("param_2", 1.0, 2.0);

        let mut cond = ConditionalGrid::with_seed(123);
        cond.add_cube(&grid_1);
        cond.add_conditional_cube(&grid_2, |hpo| Ok(hpo.f64("param_1")? > 0.5));
        cond.add_conditional_cube(&grid_3, |hpo| Ok(hpo.f64("param_1")? <= 0.5));

        let first = cond.pick().unwrap();
        assert!(first.contains_key("param_1"));
        assert!(first.contains_key("param_2"));

        for _ in 0..10 {
            cond.reset_seed();
            assert_eq!(cond.pick().unwrap(), first);
        }
    }

    #[test]
    fn conditions_see_only_earlier_draws() {
        let grid_1 = real_cube("param_1", 0.0, 0.5);
        let grid_2 = fixed_int_cube("param_2", 1);
        let grid_3 = fixed_int_cube("param_2", 2);

        let mut cond = ConditionalGrid::with_seed(123);
        cond.add_cube(&grid_1);
        cond.add_conditional_cube(&grid_2, |hpo| Ok(hpo.f64("param_1")? <= 0.5));
        cond.add_conditional_cube(&grid_3, |hpo| Ok(hpo.f64("param_1")? > 0.5));

        for _ in 0..100 {
            assert_eq!(cond.pick().unwrap()["param_2"], ParameterValue::Int(1));
        }
    }

    #[test]
    fn last_write_wins() {
        let mut cond = ConditionalGrid::new();
        cond.add_cube(&fixed_int_cube("x", 1));
        cond.add_cube(&fixed_int_cube("x", 2));
        assert_eq!(cond.pick().unwrap()["x"], ParameterValue::Int(2));
    }

    #[test]
    fn missing_key_is_a_dependency_error_every_call() {
        let mut cond = ConditionalGrid::with_seed(123);
        cond.add_cube(&real_cube("param_1", 0.0, 1.0));
        cond.add_conditional_cube(&fixed_int_cube("param_2", 1), |hpo| {
            Ok(hpo.f64("notExists")? > 0.5)
        });

        for _ in 0..5 {
            match cond.pick() {
                Err(TunerError::Dependency { key }) => assert_eq!(key, "notExists"),
                other => panic!("expected dependency error, got {other:?}"),
            }
        }
    }

    #[test]
    fn wrong_type_is_reported() {
        let mut cond = ConditionalGrid::new();
        cond.add_cube(&CubeGrid::new().add_choice("solver", ["gd"]).unwrap());
        cond.add_conditional_cube(&fixed_int_cube("x", 1), |hpo| Ok(hpo.f64("solver")? > 0.0));

        let err = cond.pick().unwrap_err();
        assert!(matches!(err, TunerError::TypeMismatch { expected: "number", .. }));
    }

    #[test]
    fn added_cube_is_a_copy() {
        let mut cube = CubeGrid::new();
        cube.add("a", ValueSpec::fixed(1i64), Space::Int, Distribution::Uniform)
            .unwrap();

        let mut cond = ConditionalGrid::new();
        cond.add_cube(&cube);

        cube.add("b", ValueSpec::fixed(2i64), Space::Int, Distribution::Uniform)
            .unwrap();

        let draw = cond.pick().unwrap();
        assert_eq!(draw.len(), 1);
        assert!(!draw.contains_key("b"));
    }

    #[test]
    fn grid_seed_overrides_cube_seed() {
        let cube = CubeGrid::with_seed(1).add_real("x", 0.0, 1.0).unwrap();
        let cond = {
            let mut cond = ConditionalGrid::with_seed(99);
            cond.add_cube(&cube);
            cond
        };
        assert_eq!(cond.cubes().next().unwrap().seed(), Some(99));
        assert_eq!(cond.len(), 1);
    }

    #[test]
    fn string_conditions_drive_nested_spaces() {
        let base = CubeGrid::new().add_choice("solver", ["gd", "proximal"]).unwrap();
        let proximal = CubeGrid::new()
            .add_choice("penalty", ["l1", "elasticnet"])
            .unwrap();
        let gd = CubeGrid::new().add_choice("penalty", ["l2"]).unwrap();

        let mut cond = ConditionalGrid::with_seed(5);
        cond.add_cube(&base);
        cond.add_conditional_cube(&proximal, |hpo| Ok(hpo.str("solver")? == "proximal"));
        cond.add_conditional_cube(&gd, |hpo| Ok(hpo.str("solver")? == "gd"));

        for _ in 0..50 {
            let draw = cond.pick().unwrap();
            match draw["solver"].as_str().unwrap() {
                "gd" => assert_eq!(draw["penalty"], "l2"),
                _ => assert!(draw["penalty"] == "l1" || draw["penalty"] == "elasticnet"),
            }
        }
    }
}
