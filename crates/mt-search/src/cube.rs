//! Independent multi-dimensional sampling spaces.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use mt_types::{config_error, HyperParams, ParameterValue, TunerError, TunerResult};

use crate::grid::SearchGrid;

/// Value type of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Space {
    Real,
    Int,
    Categorical,
}

impl FromStr for Space {
    type Err = TunerError;

    fn from_str(s: &str) -> TunerResult<Self> {
        match s {
            "real" => Ok(Self::Real),
            "int" => Ok(Self::Int),
            "cat" | "categorical" => Ok(Self::Categorical),
            other => Err(config_error!(
                "unknown space '{other}': only \"real\", \"int\" and \"cat\" are allowed"
            )),
        }
    }
}

/// Distribution used for real ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distribution {
    Uniform,
    LogUniform,
}

impl Default for Distribution {
    fn default() -> Self {
        Self::Uniform
    }
}

impl FromStr for Distribution {
    type Err = TunerError;

    fn from_str(s: &str) -> TunerResult<Self> {
        match s {
            "uniform" => Ok(Self::Uniform),
            "loguniform" | "log-uniform" => Ok(Self::LogUniform),
            other => Err(config_error!(
                "unknown distribution '{other}': only \"uniform\" and \"loguniform\" are allowed"
            )),
        }
    }
}

/// The values a dimension may take, as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSpec {
    /// One constant value, returned on every draw.
    Fixed(ParameterValue),
    /// Half-open numeric range `[low, high)`.
    Range(f64, f64),
    /// Enumerated values, drawn with replacement.
    Choices(Vec<ParameterValue>),
}

impl ValueSpec {
    pub fn fixed(value: impl Into<ParameterValue>) -> Self {
        Self::Fixed(value.into())
    }

    pub fn range(low: f64, high: f64) -> Self {
        Self::Range(low, high)
    }

    pub fn choices<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParameterValue>,
    {
        Self::Choices(values.into_iter().map(Into::into).collect())
    }
}

/// Validated sampling rule of a single dimension.
#[derive(Debug, Clone, PartialEq)]
enum Sampler {
    Constant(ParameterValue),
    Uniform { low: f64, high: f64 },
    LogUniform { log_low: f64, log_high: f64 },
    Integer { low: i64, high: i64 },
    Choice(Vec<ParameterValue>),
}

impl Sampler {
    fn build(
        name: &str,
        values: ValueSpec,
        space: Space,
        distribution: Distribution,
    ) -> TunerResult<Self> {
        if distribution == Distribution::LogUniform
            && !(space == Space::Real && matches!(values, ValueSpec::Range(..)))
        {
            return Err(config_error!(
                "dimension '{name}': log-uniform distribution requires a real range"
            ));
        }

        match (space, values) {
            (Space::Real, ValueSpec::Fixed(value)) if value.is_numeric() => Ok(Self::Constant(
                ParameterValue::Float(value.as_f64().unwrap_or_default()),
            )),
            (Space::Real, ValueSpec::Range(low, high)) => {
                check_range(name, low, high)?;
                match distribution {
                    Distribution::Uniform => Ok(Self::Uniform { low, high }),
                    // ln(0) is undefined, so log-uniform ranges must stay positive.
                    Distribution::LogUniform if low <= 0.0 => Err(config_error!(
                        "dimension '{name}': log-uniform range needs a strictly positive lower bound, got {low}"
                    )),
                    Distribution::LogUniform => Ok(Self::LogUniform {
                        log_low: low.ln(),
                        log_high: high.ln(),
                    }),
                }
            }
            (Space::Int, ValueSpec::Fixed(ParameterValue::Int(value))) => {
                Ok(Self::Constant(ParameterValue::Int(value)))
            }
            (Space::Int, ValueSpec::Range(low, high)) => {
                check_range(name, low, high)?;
                if low.fract() != 0.0 || high.fract() != 0.0 {
                    return Err(config_error!(
                        "dimension '{name}': int range bounds must be integral, got [{low}, {high})"
                    ));
                }
                if low < i64::MIN as f64 || high > i64::MAX as f64 {
                    return Err(config_error!(
                        "dimension '{name}': int range [{low}, {high}) does not fit in i64"
                    ));
                }
                Ok(Self::Integer {
                    low: low as i64,
                    high: high as i64,
                })
            }
            (Space::Categorical, ValueSpec::Fixed(value @ ParameterValue::Str(_))) => {
                Ok(Self::Constant(value))
            }
            (Space::Categorical, ValueSpec::Choices(values)) if !values.is_empty() => {
                Ok(Self::Choice(values))
            }
            (space, values) => Err(config_error!(
                "dimension '{name}': values {values:?} are not valid for space {space:?}"
            )),
        }
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> ParameterValue {
        match self {
            Self::Constant(value) => value.clone(),
            Self::Uniform { low, high } => ParameterValue::Float(rng.gen_range(*low..*high)),
            Self::LogUniform { log_low, log_high } => {
                let log_val: f64 = rng.gen_range(*log_low..*log_high);
                ParameterValue::Float(log_val.exp())
            }
            Self::Integer { low, high } => ParameterValue::Int(rng.gen_range(*low..*high)),
            Self::Choice(values) => values[rng.gen_range(0..values.len())].clone(),
        }
    }
}

fn check_range(name: &str, low: f64, high: f64) -> TunerResult<()> {
    if !low.is_finite() || !high.is_finite() {
        return Err(config_error!(
            "dimension '{name}': range bounds must be finite, got [{low}, {high})"
        ));
    }
    if low >= high {
        return Err(config_error!(
            "dimension '{name}': empty range [{low}, {high})"
        ));
    }
    if !(high - low).is_finite() {
        return Err(config_error!(
            "dimension '{name}': range [{low}, {high}) is too wide to sample"
        ));
    }
    Ok(())
}

/// One named dimension of a cube.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub name: String,
    pub space: Space,
    sampler: Sampler,
}

impl Dimension {
    /// Whether every draw returns the same value.
    pub fn is_constant(&self) -> bool {
        matches!(self.sampler, Sampler::Constant(_))
    }
}

/// A set of independent dimensions sampled together.
///
/// Dimensions share one generator owned by the cube. With a seed,
/// [`reset_seed`](Self::reset_seed) rewinds the generator so the following
/// draws repeat the sequence produced right after construction.
#[derive(Debug, Clone)]
pub struct CubeGrid {
    seed: Option<u64>,
    dimensions: Vec<Dimension>,
    rng: ChaCha8Rng,
}

impl CubeGrid {
    pub fn new() -> Self {
        Self {
            seed: None,
            dimensions: Vec::new(),
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            dimensions: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Register one dimension.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        values: ValueSpec,
        space: Space,
        distribution: Distribution,
    ) -> TunerResult<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(config_error!("dimension name must not be empty"));
        }
        if self.dimensions.iter().any(|d| d.name == name) {
            return Err(config_error!("dimension '{name}' is already defined"));
        }
        let sampler = Sampler::build(&name, values, space, distribution)?;
        self.dimensions.push(Dimension {
            name,
            space,
            sampler,
        });
        Ok(())
    }

    /// Register one dimension with space and distribution given by name.
    pub fn add_from_str(
        &mut self,
        name: impl Into<String>,
        values: ValueSpec,
        space: &str,
        distribution: &str,
    ) -> TunerResult<()> {
        self.add(name, values, space.parse()?, distribution.parse()?)
    }

    pub fn add_real(mut self, name: impl Into<String>, low: f64, high: f64) -> TunerResult<Self> {
        self.add(name, ValueSpec::Range(low, high), Space::Real, Distribution::Uniform)?;
        Ok(self)
    }

    pub fn add_log_real(
        mut self,
        name: impl Into<String>,
        low: f64,
        high: f64,
    ) -> TunerResult<Self> {
        self.add(name, ValueSpec::Range(low, high), Space::Real, Distribution::LogUniform)?;
        Ok(self)
    }

    pub fn add_int(mut self, name: impl Into<String>, low: i64, high: i64) -> TunerResult<Self> {
        self.add(
            name,
            ValueSpec::Range(low as f64, high as f64),
            Space::Int,
            Distribution::Uniform,
        )?;
        Ok(self)
    }

    pub fn add_choice<I, V>(mut self, name: impl Into<String>, values: I) -> TunerResult<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<ParameterValue>,
    {
        self.add(
            name,
            ValueSpec::choices(values),
            Space::Categorical,
            Distribution::Uniform,
        )?;
        Ok(self)
    }

    pub fn add_fixed(
        mut self,
        name: impl Into<String>,
        value: impl Into<ParameterValue>,
        space: Space,
    ) -> TunerResult<Self> {
        self.add(name, ValueSpec::Fixed(value.into()), space, Distribution::Uniform)?;
        Ok(self)
    }

    /// Draw one value for every dimension.
    pub fn pick(&mut self) -> HyperParams {
        let rng = &mut self.rng;
        self.dimensions
            .iter()
            .map(|dim| (dim.name.clone(), dim.sampler.sample(rng)))
            .collect()
    }

    pub fn pick_many(&mut self, count: usize) -> Vec<HyperParams> {
        (0..count).map(|_| self.pick()).collect()
    }

    pub fn reset_seed(&mut self) {
        if let Some(seed) = self.seed {
            self.rng = ChaCha8Rng::seed_from_u64(seed);
        }
    }

    /// Replace the seed and rewind the generator to it.
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = Some(seed);
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn names(&self) -> Vec<&str> {
        self.dimensions.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }
}

impl Default for CubeGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchGrid for CubeGrid {
    fn pick(&mut self) -> TunerResult<HyperParams> {
        Ok(CubeGrid::pick(self))
    }

    fn reset_seed(&mut self) {
        CubeGrid::reset_seed(self)
    }

    fn name(&self) -> &str {
        "cube"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn mean_and_std(values: &[f64]) -> (f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        (mean, var.sqrt())
    }

    fn draw_floats(cube: &mut CubeGrid, name: &str, n: usize) -> Vec<f64> {
        (0..n)
            .map(|_| cube.pick()[name].as_f64().unwrap())
            .collect()
    }

    #[test]
    fn fixed_values_repeat_every_draw() {
        let mut cube = CubeGrid::new();
        cube.add("param", ValueSpec::fixed(999i64), Space::Int, Distribution::Uniform)
            .unwrap();
        assert!((0..100).all(|_| cube.pick()["param"] == ParameterValue::Int(999)));

        let mut cube = CubeGrid::new();
        cube.add("param", ValueSpec::fixed(999i64), Space::Real, Distribution::Uniform)
            .unwrap();
        assert!((0..100).all(|_| cube.pick()["param"] == ParameterValue::Float(999.0)));

        let mut cube = CubeGrid::new();
        cube.add("param", ValueSpec::fixed("category"), Space::Categorical, Distribution::Uniform)
            .unwrap();
        assert!((0..100).all(|_| cube.pick()["param"] == "category"));
        assert!(cube.dimensions()[0].is_constant());
    }

    #[test]
    fn int_range_is_half_open() {
        let mut cube = CubeGrid::new().add_int("param", 0, 2).unwrap();
        let mut counts: HashMap<i64, usize> = HashMap::new();
        for _ in 0..200 {
            let v = cube.pick()["param"].as_i64().unwrap();
            *counts.entry(v).or_default() += 1;
        }
        assert!(counts[&0] > 0);
        assert!(counts[&1] > 0);
        assert!(!counts.contains_key(&2));
    }

    #[test]
    fn real_uniform_moments() {
        let mut cube = CubeGrid::with_seed(7).add_real("param", 0.0, 1.0).unwrap();
        let values = draw_floats(&mut cube, "param", 10_000);
        assert!(values.iter().all(|v| (0.0..1.0).contains(v)));

        let (mean, std) = mean_and_std(&values);
        assert!((mean - 0.5).abs() < 1e-2, "mean {mean}");
        assert!((std - 1.0 / 12f64.sqrt()).abs() < 1e-2, "std {std}");
    }

    #[test]
    fn real_log_uniform_moments() {
        let mut cube = CubeGrid::with_seed(11).add_log_real("param", 1.0, 2.0).unwrap();
        let values = draw_floats(&mut cube, "param", 10_000);

        let ln2 = 2f64.ln();
        let theoretical_mean = 1.0 / ln2;
        let theoretical_std = (3.0 / (2.0 * ln2) - theoretical_mean.powi(2)).sqrt();
        let (mean, std) = mean_and_std(&values);
        assert!((mean - theoretical_mean).abs() < 3e-2, "mean {mean}");
        assert!((std - theoretical_std).abs() < 3e-2, "std {std}");
    }

    #[test]
    fn log_uniform_stays_in_bounds() {
        let mut cube = CubeGrid::new().add_log_real("lr", 1e-5, 1e-1).unwrap();
        for v in draw_floats(&mut cube, "lr", 1_000) {
            assert!((1e-5..=1e-1).contains(&v), "lr out of bounds: {v}");
        }
    }

    #[test]
    fn categorical_draws_every_value_and_nothing_else() {
        let mut cube = CubeGrid::new().add_choice("param", ["a", "b", "c"]).unwrap();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..10_000 {
            let v = cube.pick()["param"].to_string();
            *counts.entry(v).or_default() += 1;
        }
        assert_eq!(counts.len(), 3);
        for key in ["a", "b", "c"] {
            assert!(counts[key] > 0);
        }
    }

    #[test]
    fn categorical_choices_may_mix_types() {
        let mut cube = CubeGrid::new()
            .add_choice(
                "penalty",
                [
                    ParameterValue::from("l1"),
                    ParameterValue::from("l2"),
                    ParameterValue::Null,
                ],
            )
            .unwrap();
        let draws = cube.pick_many(300);
        assert_eq!(draws.len(), 300);
        assert!(draws.iter().any(|d| d["penalty"].is_null()));
    }

    #[test]
    fn invalid_combinations_fail_fast() {
        let mut cube = CubeGrid::new();
        let err = cube
            .add_from_str("param", ValueSpec::range(1.0, 2.0), "notExists", "uniform")
            .unwrap_err();
        assert!(matches!(err, TunerError::Configuration(_)));

        let cases = [
            (ValueSpec::fixed(1i64), Space::Categorical, Distribution::Uniform),
            (ValueSpec::fixed("x"), Space::Real, Distribution::Uniform),
            (ValueSpec::range(2.0, 1.0), Space::Real, Distribution::Uniform),
            (ValueSpec::range(-f64::MAX, f64::MAX), Space::Real, Distribution::Uniform),
            (ValueSpec::range(0.0, 1.0), Space::Real, Distribution::LogUniform),
            (ValueSpec::range(0.5, 3.0), Space::Int, Distribution::Uniform),
            (ValueSpec::range(1.0, 3.0), Space::Int, Distribution::LogUniform),
            (ValueSpec::range(0.0, 1.0), Space::Categorical, Distribution::Uniform),
            (ValueSpec::Choices(vec![]), Space::Categorical, Distribution::Uniform),
            (ValueSpec::choices([1i64, 2]), Space::Int, Distribution::Uniform),
        ];
        for (values, space, distribution) in cases {
            let result = cube.add("param", values.clone(), space, distribution);
            assert!(
                matches!(result, Err(TunerError::Configuration(_))),
                "{values:?} / {space:?} / {distribution:?} should be rejected"
            );
        }
        assert!(cube.is_empty());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut cube = CubeGrid::new().add_real("param", 0.0, 1.0).unwrap();
        let err = cube
            .add("param", ValueSpec::range(0.0, 1.0), Space::Real, Distribution::Uniform)
            .unwrap_err();
        assert!(err.to_string().contains("already defined"));
        assert_eq!(cube.len(), 1);
    }

    #[test]
    fn reset_seed_replays_draws() {
        let mut cube = CubeGrid::with_seed(123)
            .add_real("param_1", 0.0, 1.0)
            .unwrap()
            .add_real("param_2", 0.0, 1.0)
            .unwrap();

        let first = cube.pick_many(5);
        for _ in 0..10 {
            cube.reset_seed();
            assert_eq!(cube.pick_many(5), first);
        }
    }

    #[test]
    fn reset_without_seed_is_noop() {
        let mut cube = CubeGrid::new().add_real("param", 0.0, 1.0).unwrap();
        let before = cube.pick();
        cube.reset_seed();
        let after = cube.pick();
        assert_eq!(cube.seed(), None);
        assert_ne!(before, after);
    }

    #[test]
    fn space_and_distribution_parse() {
        assert_eq!("cat".parse::<Space>().unwrap(), Space::Categorical);
        assert_eq!("categorical".parse::<Space>().unwrap(), Space::Categorical);
        assert_eq!("loguniform".parse::<Distribution>().unwrap(), Distribution::LogUniform);
        assert!("gaussian".parse::<Distribution>().is_err());
    }
}
