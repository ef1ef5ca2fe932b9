//! Predefined search spaces for the reference models.

use mt_search::{ConditionalGrid, CubeGrid};
use mt_types::{ParameterValue, TunerResult};

use crate::logistic::LogisticRegression;

/// Search space for [`LogisticRegression`].
///
/// Every draw samples `tol`, `C` and `solver`. The penalty space then depends
/// on the solver: `gd` and `sgd` only choose between `l2` and no penalty,
/// `sgd` additionally tunes its step size, and `proximal` may pick any
/// penalty together with `l1_ratio` and `intercept_scaling`. A `proximal`
/// draw with an `l2` penalty also decides whether to fit the intercept.
pub fn logistic_regression_grid(seed: Option<u64>) -> TunerResult<ConditionalGrid> {
    let base = CubeGrid::new()
        .add_log_real("tol", 1e-4, 1e-3)?
        .add_log_real("C", 1e-4, 1e4)?
        .add_choice("solver", ["gd", "sgd", "proximal"])?;

    let smooth_penalty = CubeGrid::new().add_choice(
        "penalty",
        [ParameterValue::from("l2"), ParameterValue::Null],
    )?;

    let sgd = CubeGrid::new().add_log_real("learning_rate", 1e-3, 1.0)?;

    let proximal = CubeGrid::new()
        .add_real("intercept_scaling", 1e-3, 1.0)?
        .add_choice(
            "penalty",
            [
                ParameterValue::from("elasticnet"),
                ParameterValue::from("l1"),
                ParameterValue::from("l2"),
                ParameterValue::Null,
            ],
        )?
        .add_real("l1_ratio", 0.0, 1.0)?;

    let proximal_l2 = CubeGrid::new().add_choice("fit_intercept", [true, false])?;

    let mut grid = ConditionalGrid::with_optional_seed(seed).named("logistic_regression");
    grid.add_cube(&base);
    grid.add_conditional_cube(&smooth_penalty, |hpo| Ok(hpo.str("solver")? != "proximal"));
    grid.add_conditional_cube(&sgd, |hpo| Ok(hpo.str("solver")? == "sgd"));
    grid.add_conditional_cube(&proximal, |hpo| Ok(hpo.str("solver")? == "proximal"));
    grid.add_conditional_cube(&proximal_l2, |hpo| {
        Ok(hpo.str("solver")? == "proximal" && hpo.get("penalty")? == &ParameterValue::from("l2"))
    });
    Ok(grid)
}

/// The model the logistic-regression experiments start from.
pub fn predefined_logistic_regression() -> LogisticRegression {
    LogisticRegression::new()
        .with_random_state(123)
        .with_max_iter(500)
}

/// Search space for [`crate::RidgeRegression`].
pub fn ridge_grid(seed: Option<u64>) -> TunerResult<ConditionalGrid> {
    let base = CubeGrid::new()
        .add_log_real("alpha", 1e-4, 1e4)?
        .add_log_real("tol", 1e-6, 1e-3)?
        .add_choice("fit_intercept", [true])?;

    let mut grid = ConditionalGrid::with_optional_seed(seed).named("ridge");
    grid.add_cube(&base);
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt_types::Estimator;

    #[test]
    fn logistic_draws_are_always_valid_models() {
        let mut grid = logistic_regression_grid(Some(42)).unwrap();
        for _ in 0..300 {
            let params = grid.pick().unwrap();
            let mut model = predefined_logistic_regression();
            model
                .set_params(&params)
                .unwrap_or_else(|e| panic!("{params:?}: {e}"));
        }
    }

    #[test]
    fn logistic_penalty_space_depends_on_solver() {
        let mut grid = logistic_regression_grid(Some(7)).unwrap();
        let mut seen_l1 = false;
        for _ in 0..300 {
            let params = grid.pick().unwrap();
            let solver = params["solver"].as_str().unwrap().to_string();
            match solver.as_str() {
                "gd" | "sgd" => {
                    assert!(params["penalty"] == "l2" || params["penalty"].is_null());
                    assert!(!params.contains_key("l1_ratio"));
                    assert_eq!(params.contains_key("learning_rate"), solver == "sgd");
                }
                "proximal" => {
                    assert!(params.contains_key("l1_ratio"));
                    seen_l1 |= params["penalty"] == "l1";
                    assert_eq!(
                        params.contains_key("fit_intercept"),
                        params["penalty"] == "l2"
                    );
                }
                other => panic!("unexpected solver {other}"),
            }
        }
        assert!(seen_l1);
    }

    #[test]
    fn seeded_grids_replay_after_reset() {
        let mut grid = logistic_regression_grid(Some(3)).unwrap();
        let first: Vec<_> = (0..20).map(|_| grid.pick().unwrap()).collect();
        grid.reset_seed();
        let second: Vec<_> = (0..20).map(|_| grid.pick().unwrap()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn ridge_grid_matches_the_model() {
        let mut grid = ridge_grid(None).unwrap();
        let params = grid.pick().unwrap();
        let mut model = crate::RidgeRegression::new();
        model.set_params(&params).unwrap();
        assert_eq!(params["fit_intercept"], ParameterValue::Bool(true));
    }
}
