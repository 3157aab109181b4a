//! The weight optimizer — gradient descent on log-weights against mean
//! relative squared error.
//!
//! Weights are parameterized as `w = exp(theta)` so positivity holds
//! without explicit constraints. The loss is
//!
//! ```text
//! L(theta) = mean_j ((w . M_j - t_j) / d_j)^2
//! ```
//!
//! where `M_j` is the design matrix's j-th column, `t_j` the target,
//! and `d_j` a guarded denominator: `t_j` normally, 1.0 when
//! `|t_j| < zero_target_epsilon` (absolute-error fallback for
//! degenerate zero targets). Relative error keeps counts and
//! multi-billion-dollar totals on comparable scales.
//!
//! The gradient is closed-form, no autodiff:
//!
//! ```text
//! dL/dtheta_i = w_i * (2/T) * sum_j M_ij (e_j - t_j) / d_j^2
//! ```
//!
//! The loop always runs its fixed iteration budget; there is no early
//! stopping. Per-parameter steps follow the Adam moment rules with bias
//! correction.

use crate::error::{CalibError, CalibResult};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReweightConfig {
    /// Fixed iteration budget. Always exhausted.
    pub iterations: usize,
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    /// Targets with |t| below this fall back to absolute error.
    pub zero_target_epsilon: f64,
    /// Emit a debug progress line every this many iterations.
    pub log_every: usize,
}

impl Default for ReweightConfig {
    fn default() -> Self {
        Self {
            iterations: 1_000,
            learning_rate: 1e-2,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            zero_target_epsilon: 1e-12,
            log_every: 100,
        }
    }
}

/// Result of one reweighting run.
#[derive(Debug, Clone)]
pub struct ReweightOutcome {
    /// Calibrated weights, strictly positive.
    pub weights: Array1<f64>,
    /// Loss evaluated at the returned weights.
    pub final_loss: f64,
    /// Loss before each iteration's update, in iteration order.
    pub loss_history: Vec<f64>,
}

/// Optimize `initial_weights` (all strictly positive, one per design
/// matrix row) toward `targets`. An empty target vector is a no-op:
/// the initial weights come back unchanged with zero loss.
pub fn reweight(
    initial_weights: &[f64],
    matrix: &Array2<f64>,
    targets: &Array1<f64>,
    cfg: &ReweightConfig,
) -> CalibResult<ReweightOutcome> {
    if initial_weights.len() != matrix.nrows() {
        return Err(CalibError::WeightLengthMismatch {
            weights: initial_weights.len(),
            rows:    matrix.nrows(),
        });
    }
    if targets.len() != matrix.ncols() {
        return Err(CalibError::TargetLengthMismatch {
            targets: targets.len(),
            cols:    matrix.ncols(),
        });
    }
    for (index, &value) in initial_weights.iter().enumerate() {
        if !(value > 0.0) {
            return Err(CalibError::NonPositiveWeight { index, value });
        }
    }

    if targets.is_empty() {
        // Degenerate, already-converged case: nothing to calibrate
        // against.
        log::info!("reweight: no targets, weights returned unchanged");
        return Ok(ReweightOutcome {
            weights:      Array1::from(initial_weights.to_vec()),
            final_loss:   0.0,
            loss_history: Vec::new(),
        });
    }

    let target_count = targets.len() as f64;
    let denoms = targets.mapv(|t| if t.abs() < cfg.zero_target_epsilon { 1.0 } else { t });

    let mut theta: Array1<f64> = initial_weights.iter().map(|w| w.ln()).collect();
    let mut m = Array1::<f64>::zeros(theta.len());
    let mut v = Array1::<f64>::zeros(theta.len());
    let mut loss_history = Vec::with_capacity(cfg.iterations);

    for step in 1..=cfg.iterations {
        let weights = theta.mapv(f64::exp);
        let estimate = weights.dot(matrix);
        let rel = (&estimate - targets) / &denoms;
        let loss = rel.mapv(|r| r * r).mean().unwrap_or(0.0);
        loss_history.push(loss);

        if cfg.log_every > 0 && step % cfg.log_every == 0 {
            log::debug!("reweight: iter={step} loss={loss:.6}");
        }

        // dL/dw = (2/T) M (e - t)/d^2, then chain through w = exp(theta).
        let scaled = &rel / &denoms * (2.0 / target_count);
        let grad = matrix.dot(&scaled) * &weights;

        m = &m * cfg.beta1 + &grad * (1.0 - cfg.beta1);
        v = &v * cfg.beta2 + grad.mapv(|g| g * g) * (1.0 - cfg.beta2);
        let m_hat = &m / (1.0 - cfg.beta1.powi(step as i32));
        let v_hat = &v / (1.0 - cfg.beta2.powi(step as i32));
        theta = theta - m_hat * cfg.learning_rate / (v_hat.mapv(f64::sqrt) + cfg.epsilon);
    }

    let weights = theta.mapv(f64::exp);
    let estimate = weights.dot(matrix);
    let final_loss = ((&estimate - targets) / &denoms)
        .mapv(|r| r * r)
        .mean()
        .unwrap_or(0.0);

    log::info!(
        "reweight: {} iterations complete, final loss {final_loss:.6}",
        cfg.iterations,
    );

    Ok(ReweightOutcome {
        weights,
        final_loss,
        loss_history,
    })
}

/// Per-target residual at a given weight vector. Used for diagnostics:
/// a persistently large residual marks a coverage gap or unsatisfiable
/// target, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct TargetResidual {
    pub label:     String,
    pub target:    f64,
    pub estimate:  f64,
    pub rel_error: f64,
}

/// Evaluate residuals for each target column at `weights`.
pub fn target_residuals(
    weights: &Array1<f64>,
    matrix: &Array2<f64>,
    targets: &Array1<f64>,
    labels: &[String],
    zero_target_epsilon: f64,
) -> Vec<TargetResidual> {
    let estimate = weights.dot(matrix);
    labels
        .iter()
        .zip(targets.iter())
        .zip(estimate.iter())
        .map(|((label, &target), &estimate)| {
            let denom = if target.abs() < zero_target_epsilon { 1.0 } else { target };
            TargetResidual {
                label: label.clone(),
                target,
                estimate,
                rel_error: (estimate - target) / denom,
            }
        })
        .collect()
}
