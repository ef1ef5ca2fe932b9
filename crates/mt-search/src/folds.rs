//! Cross-validation fold generation.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use mt_types::{config_error, TunerResult};

/// One train/test partition of row indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split `0..size` into `cv` folds.
///
/// Each test fold holds `size / cv` indices drawn without replacement from the
/// indices not yet used by an earlier test fold; the train side is every other
/// index. The `size % cv` leftover indices never appear in a test fold and
/// are always part of training.
pub fn cv_folds<R: Rng + ?Sized>(size: usize, cv: usize, rng: &mut R) -> TunerResult<Vec<Fold>> {
    if cv < 2 {
        return Err(config_error!("cross-validation needs at least 2 folds, got {cv}"));
    }
    let fold_size = size / cv;
    if fold_size == 0 {
        return Err(config_error!(
            "cannot split {size} rows into {cv} folds"
        ));
    }

    let mut remaining: Vec<usize> = (0..size).collect();
    let mut folds = Vec::with_capacity(cv);

    for _ in 0..cv {
        let (mut test, rest) = {
            let (chosen, rest) = remaining.partial_shuffle(rng, fold_size);
            (chosen.to_vec(), rest.to_vec())
        };
        remaining = rest;
        test.sort_unstable();

        let mut in_test = vec![false; size];
        for &idx in &test {
            in_test[idx] = true;
        }
        let train = (0..size).filter(|&idx| !in_test[idx]).collect();

        folds.push(Fold { train, test });
    }

    Ok(folds)
}
