//! SOM training algorithms.
//!
//! Training is online: every sampled data vector pulls *all* prototypes
//! towards itself, weighted by a Gaussian kernel over the map-space distance
//! to the sample's best matching unit. Two schedules control how the step
//! size and kernel width shrink:
//!
//! - **Progressive** ([`TrainingMode::Progressive`]): per-epoch geometric decay
//!   of the learning rate from 1 towards `eta`, and of the kernel width from
//!   half the mean node separation towards 0.5.
//! - **Exponential** ([`TrainingMode::Exponential`]): per-sample exponential
//!   decay between fixed start and end constants, with the kernel shrinking
//!   from the largest node separation down to the adjacent-node spacing.

use crate::config::{InitMode, TrainingConfig, TrainingMode};
use crate::error::{Result, SomError};
use crate::geometry::MapGeometry;
use crate::som::bmu::argmin;
use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

/// Progress information emitted after every training epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    /// Zero-based epoch index.
    pub epoch: usize,
    /// Total number of epochs.
    pub maxiter: usize,
    /// Quantization loss accumulated over the epoch's samples.
    pub loss: f64,
    /// Schedule progress in `[0, 1]`.
    pub progress: f64,
    /// Learning rate in effect at the start of the epoch.
    pub learning_rate: f64,
    /// Neighborhood kernel width in effect at the start of the epoch.
    pub width: f64,
}

/// SOM trainer with configurable hyperparameters.
///
/// Owns the seeded generator used for initialization and sampling, so two
/// trainers built from the same configuration produce identical maps.
pub struct SomTrainer {
    config: TrainingConfig,
    rng: ChaCha8Rng,
}

impl SomTrainer {
    /// Creates a new trainer with the given configuration.
    pub fn new(config: TrainingConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self { config, rng }
    }

    /// Returns the trainer configuration.
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Creates the initial `(D, size)` prototype matrix for `data`.
    pub fn initialize(&mut self, data: ArrayView2<'_, f64>, size: usize) -> Result<Array2<f64>> {
        let (n, dim) = data.dim();
        if n == 0 || dim == 0 {
            return Err(SomError::EmptyInput(format!(
                "Cannot initialize prototypes from a {}x{} dataset",
                n, dim
            )));
        }

        let rng = &mut self.rng;
        let weights = match self.config.init {
            InitMode::Random => {
                let sigmas = data.std_axis(Axis(0), 0.0);
                Array2::from_shape_fn((dim, size), |(k, _)| {
                    sigmas[k] * rng.sample::<f64, _>(StandardNormal)
                })
            }
            InitMode::UniformOffset => {
                let offset = data[[0, 0]];
                Array2::from_shape_fn((dim, size), |_| rng.gen::<f64>() + offset)
            }
        };
        Ok(weights)
    }

    /// Fraction of `maxiter` completed at the start of `epoch`.
    #[inline]
    fn fraction(&self, epoch: usize) -> f64 {
        epoch as f64 / self.config.maxiter as f64
    }

    /// Reported progress of the progressive schedule: reaches 1 at the
    /// midpoint of training and stays there.
    #[inline]
    pub fn progress(&self, epoch: usize) -> f64 {
        (2.0 * self.fraction(epoch)).min(1.0)
    }

    /// Learning rate of the progressive schedule: decays from 1 towards `eta`.
    #[inline]
    pub fn learning_rate(&self, epoch: usize) -> f64 {
        self.config.eta.powf(self.fraction(epoch))
    }

    /// Kernel width of the progressive schedule: decays from half of
    /// `large_scale` towards 0.5.
    #[inline]
    pub fn gauss_width(&self, epoch: usize, large_scale: f64) -> f64 {
        0.5 * large_scale.powf(1.0 - self.fraction(epoch))
    }

    /// Trains `weights` in place and returns the per-epoch loss history.
    ///
    /// `on_epoch` is called once per epoch, after the epoch's updates.
    pub fn train<G, F>(
        &mut self,
        weights: &mut Array2<f64>,
        data: ArrayView2<'_, f64>,
        geometry: &G,
        on_epoch: F,
    ) -> Result<Array1<f64>>
    where
        G: MapGeometry + ?Sized,
        F: FnMut(&EpochReport),
    {
        let (n, dim) = data.dim();
        let (weight_dim, size) = weights.dim();
        if dim != weight_dim {
            return Err(SomError::DimensionMismatch {
                expected: weight_dim,
                found: dim,
            });
        }
        if size != geometry.size() {
            return Err(SomError::LengthMismatch {
                expected: geometry.size(),
                found: size,
            });
        }
        if n == 0 {
            return Err(SomError::EmptyInput("No training samples provided".to_string()));
        }

        info!(
            "Training SOM: {} samples, {} nodes, {} dim, {} epochs of {} samples",
            n,
            size,
            dim,
            self.config.maxiter,
            self.config.batch_size(n)
        );

        match self.config.mode {
            TrainingMode::Progressive => self.train_progressive(weights, data, geometry, on_epoch),
            TrainingMode::Exponential => self.train_exponential(weights, data, geometry, on_epoch),
        }
    }

    fn train_progressive<G, F>(
        &mut self,
        weights: &mut Array2<f64>,
        data: ArrayView2<'_, f64>,
        geometry: &G,
        mut on_epoch: F,
    ) -> Result<Array1<f64>>
    where
        G: MapGeometry + ?Sized,
        F: FnMut(&EpochReport),
    {
        let maxiter = self.config.maxiter;
        let n = data.nrows();
        let batch_size = self.config.batch_size(n);
        let separations = geometry.separations();
        let mut buffers = UpdateBuffers::new(weights.dim());
        let mut losses = Array1::<f64>::zeros(maxiter);

        // Mean separation between nodes as a representative large scale.
        let large_scale = geometry.mean_separation();
        debug!("Progressive schedule: large scale {:.3}", large_scale);

        for i in 0..maxiter {
            let progress = self.progress(i);
            let learn_rate = self.learning_rate(i);
            let gauss_width = self.gauss_width(i, large_scale);

            let mut loss = 0.0;
            for _ in 0..batch_size {
                let idx = self.rng.gen_range(0..n);
                loss += update_sample(
                    weights,
                    data.row(idx),
                    separations,
                    learn_rate,
                    gauss_width,
                    &mut buffers,
                );
            }
            losses[i] = loss;

            info!(
                "Finished iter {}/{} with loss {:.3} (progress={:.2})",
                i + 1,
                maxiter,
                loss,
                progress
            );
            on_epoch(&EpochReport {
                epoch: i,
                maxiter,
                loss,
                progress,
                learning_rate: learn_rate,
                width: gauss_width,
            });
        }

        Ok(losses)
    }

    fn train_exponential<G, F>(
        &mut self,
        weights: &mut Array2<f64>,
        data: ArrayView2<'_, f64>,
        geometry: &G,
        mut on_epoch: F,
    ) -> Result<Array1<f64>>
    where
        G: MapGeometry + ?Sized,
        F: FnMut(&EpochReport),
    {
        let maxiter = self.config.maxiter;
        let n = data.nrows();
        let batch_size = self.config.batch_size(n);
        let separations = geometry.separations();
        let mut buffers = UpdateBuffers::new(weights.dim());
        let mut losses = Array1::<f64>::zeros(maxiter);

        let sigma0 = geometry.max_separation();
        let schedule = ExponentialSchedule {
            alpha_start: self.config.alpha_start,
            alpha_end: self.config.alpha_end,
            sigma_start: sigma0,
            sigma_end: geometry.min_positive_separation().unwrap_or(sigma0),
            total_steps: maxiter * n,
        };
        debug!("Exponential schedule: {:?}", schedule);

        let mut tt = 0usize;
        for it in 0..maxiter {
            let alpha = schedule.alpha(tt);
            let sigma = schedule.sigma(tt);

            let mut loss = 0.0;
            for _ in 0..batch_size {
                let idx = self.rng.gen_range(0..n);
                loss += update_sample(
                    weights,
                    data.row(idx),
                    separations,
                    schedule.alpha(tt),
                    schedule.sigma(tt),
                    &mut buffers,
                );
                tt += 1;
            }
            losses[it] = loss;

            let progress = schedule.progress(tt);
            info!(
                "Finished iter {}/{} with loss {:.3} (progress={:.2})",
                it + 1,
                maxiter,
                loss,
                progress
            );
            on_epoch(&EpochReport {
                epoch: it,
                maxiter,
                loss,
                progress,
                learning_rate: alpha,
                width: sigma,
            });
        }

        Ok(losses)
    }
}

/// Per-sample exponential decay used by [`TrainingMode::Exponential`].
#[derive(Debug, Clone, Copy)]
struct ExponentialSchedule {
    alpha_start: f64,
    alpha_end: f64,
    sigma_start: f64,
    sigma_end: f64,
    total_steps: usize,
}

impl ExponentialSchedule {
    #[inline]
    fn progress(&self, step: usize) -> f64 {
        if self.total_steps == 0 {
            return 1.0;
        }
        step as f64 / self.total_steps as f64
    }

    #[inline]
    fn alpha(&self, step: usize) -> f64 {
        self.alpha_start * (self.alpha_end / self.alpha_start).powf(self.progress(step))
    }

    #[inline]
    fn sigma(&self, step: usize) -> f64 {
        if self.sigma_start <= 0.0 {
            return 0.0;
        }
        self.sigma_start * (self.sigma_end / self.sigma_start).powf(self.progress(step))
    }
}

/// Scratch space reused by every per-sample update.
struct UpdateBuffers {
    /// Data-space differences `x - w`, shape `(D, size)`.
    dx: Array2<f64>,
    /// Squared distance to each prototype.
    distsq: Array1<f64>,
    /// Per-node update coefficient.
    coeff: Array1<f64>,
}

impl UpdateBuffers {
    fn new((dim, size): (usize, usize)) -> Self {
        Self {
            dx: Array2::zeros((dim, size)),
            distsq: Array1::zeros(size),
            coeff: Array1::zeros(size),
        }
    }
}

/// Gaussian neighborhood kernel over map-space distance.
///
/// A zero width collapses the kernel onto the BMU itself.
#[inline]
pub fn neighborhood(distance: f64, width: f64) -> f64 {
    if width > 0.0 {
        let z = distance / width;
        (-0.5 * z * z).exp()
    } else if distance == 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Applies one online update for sample `x` and returns its BMU distance.
fn update_sample(
    weights: &mut Array2<f64>,
    x: ArrayView1<'_, f64>,
    separations: &Array2<f64>,
    rate: f64,
    width: f64,
    buffers: &mut UpdateBuffers,
) -> f64 {
    Zip::from(&mut buffers.dx)
        .and(&*weights)
        .and_broadcast(&x.insert_axis(Axis(1)))
        .for_each(|d, &w, &xk| *d = xk - w);

    buffers.distsq.fill(0.0);
    for row in buffers.dx.rows() {
        Zip::from(&mut buffers.distsq)
            .and(&row)
            .for_each(|s, &d| *s += d * d);
    }

    let bmu = argmin(buffers.distsq.view());

    // Map-space distances from the BMU to every node.
    Zip::from(&mut buffers.coeff)
        .and(separations.row(bmu))
        .for_each(|c, &dz| *c = rate * neighborhood(dz, width));

    Zip::from(weights)
        .and(&buffers.dx)
        .and_broadcast(&buffers.coeff)
        .for_each(|w, &d, &c| *w += c * d);

    buffers.distsq[bmu].sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Grid, Metric};
    use ndarray::array;

    fn test_config() -> TrainingConfig {
        TrainingConfig {
            maxiter: 10,
            iterfrac: 0.5,
            seed: 42,
            ..Default::default()
        }
    }

    fn test_data() -> Array2<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        Array2::from_shape_fn((40, 3), |(i, _)| {
            let center = if i % 2 == 0 { -1.0 } else { 1.0 };
            center + rng.gen_range(-0.2..0.2)
        })
    }

    #[test]
    fn test_learning_rate_decay() {
        let trainer = SomTrainer::new(test_config());

        assert!((trainer.learning_rate(0) - 1.0).abs() < 1e-12);
        let last = trainer.learning_rate(9);
        assert!(last < 1.0);
        assert!(last > 0.5);
    }

    #[test]
    fn test_gauss_width_decay() {
        let trainer = SomTrainer::new(test_config());

        assert!((trainer.gauss_width(0, 4.0) - 2.0).abs() < 1e-12);
        let last = trainer.gauss_width(9, 4.0);
        assert!(last < 2.0);
        assert!(last > 0.5);
    }

    #[test]
    fn test_progress_caps_at_midpoint() {
        let trainer = SomTrainer::new(test_config());
        assert_eq!(trainer.progress(0), 0.0);
        assert!((trainer.progress(2) - 0.4).abs() < 1e-12);
        assert_eq!(trainer.progress(5), 1.0);
        assert_eq!(trainer.progress(9), 1.0);
    }

    #[test]
    fn test_exponential_schedule_endpoints() {
        let schedule = ExponentialSchedule {
            alpha_start: 0.8,
            alpha_end: 0.5,
            sigma_start: 6.0,
            sigma_end: 1.0,
            total_steps: 100,
        };
        assert!((schedule.alpha(0) - 0.8).abs() < 1e-12);
        assert!((schedule.alpha(100) - 0.5).abs() < 1e-12);
        assert!((schedule.sigma(0) - 6.0).abs() < 1e-12);
        assert!((schedule.sigma(100) - 1.0).abs() < 1e-12);
        assert!(schedule.sigma(50) < 6.0 && schedule.sigma(50) > 1.0);
    }

    #[test]
    fn test_neighborhood_kernel() {
        assert_eq!(neighborhood(0.0, 2.0), 1.0);
        assert!((neighborhood(2.0, 2.0) - (-0.5f64).exp()).abs() < 1e-12);
        assert_eq!(neighborhood(0.0, 0.0), 1.0);
        assert_eq!(neighborhood(1.0, 0.0), 0.0);
    }

    #[test]
    fn test_random_init_scales_with_std() {
        let data = array![[0.0, 10.0], [0.0, -10.0], [0.0, 10.0], [0.0, -10.0]];
        let mut trainer = SomTrainer::new(test_config());

        let weights = trainer.initialize(data.view(), 50).unwrap();
        assert_eq!(weights.dim(), (2, 50));
        // Constant feature has zero spread.
        assert!(weights.row(0).iter().all(|&w| w == 0.0));
        assert!(weights.row(1).iter().any(|&w| w.abs() > 1.0));
    }

    #[test]
    fn test_uniform_offset_init() {
        let data = array![[5.0, 0.0], [1.0, 1.0]];
        let config = TrainingConfig {
            init: InitMode::UniformOffset,
            ..test_config()
        };
        let mut trainer = SomTrainer::new(config);

        let weights = trainer.initialize(data.view(), 9).unwrap();
        assert!(weights.iter().all(|&w| (5.0..6.0).contains(&w)));
    }

    #[test]
    fn test_init_rejects_empty_data() {
        let data = Array2::<f64>::zeros((0, 3));
        let mut trainer = SomTrainer::new(test_config());
        assert!(matches!(
            trainer.initialize(data.view(), 4),
            Err(SomError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_update_moves_bmu_towards_sample() {
        let grid = Grid::new(&[3], Metric::L2).unwrap();
        let mut weights = array![[0.0, 1.0, 2.0]];
        let x = array![0.2];
        let mut buffers = UpdateBuffers::new(weights.dim());

        let dist = update_sample(
            &mut weights,
            x.view(),
            grid.separations(),
            0.5,
            1.0,
            &mut buffers,
        );

        assert!((dist - 0.2).abs() < 1e-12);
        // BMU (node 0) moves half way; neighbors move less.
        assert!((weights[[0, 0]] - 0.1).abs() < 1e-12);
        let pull_1 = 1.0 - weights[[0, 1]];
        let pull_2 = 2.0 - weights[[0, 2]];
        assert!(pull_1 > pull_2);
        assert!(pull_2 > 0.0);
    }

    #[test]
    fn test_train_progressive_reports_every_epoch() {
        let grid = Grid::new(&[4, 4], Metric::L2).unwrap();
        let data = test_data();
        let mut trainer = SomTrainer::new(test_config());
        let mut weights = trainer.initialize(data.view(), grid.size()).unwrap();

        let mut reports = Vec::new();
        let losses = trainer
            .train(&mut weights, data.view(), &grid, |r| reports.push(*r))
            .unwrap();

        assert_eq!(losses.len(), 10);
        assert_eq!(reports.len(), 10);
        assert!(losses.iter().all(|&l| l >= 0.0));
        for (i, report) in reports.iter().enumerate() {
            assert_eq!(report.epoch, i);
            assert_eq!(report.loss, losses[i]);
        }
        assert!(weights.iter().all(|w| w.is_finite()));
    }

    #[test]
    fn test_train_exponential() {
        let grid = Grid::new(&[-3, 3], Metric::L1).unwrap();
        let data = test_data();
        let mut trainer = SomTrainer::new(TrainingConfig {
            seed: 3,
            maxiter: 5,
            ..TrainingConfig::somz()
        });
        let mut weights = trainer.initialize(data.view(), grid.size()).unwrap();

        let mut reports = Vec::new();
        let losses = trainer
            .train(&mut weights, data.view(), &grid, |r| reports.push(*r))
            .unwrap();

        assert_eq!(losses.len(), 5);
        assert!(losses.iter().all(|&l| l >= 0.0));
        assert!((reports[0].learning_rate - 0.8).abs() < 1e-12);
        assert!(reports.windows(2).all(|w| w[1].progress > w[0].progress));
        assert!(reports.windows(2).all(|w| w[1].width < w[0].width));
    }

    #[test]
    fn test_exponential_decays_per_sample() {
        // Identical rows make sampling irrelevant, so the run can be replayed
        // step by step with the schedule advancing once per sample.
        let grid = Grid::new(&[3], Metric::L2).unwrap();
        let data = Array2::from_elem((2, 1), 1.5);
        let config = TrainingConfig {
            maxiter: 3,
            iterfrac: 1.0,
            seed: 11,
            ..TrainingConfig::somz()
        };
        let mut trainer = SomTrainer::new(config.clone());
        let mut weights = trainer.initialize(data.view(), grid.size()).unwrap();
        let mut expected = weights.clone();

        let mut reports = Vec::new();
        trainer
            .train(&mut weights, data.view(), &grid, |r| reports.push(*r))
            .unwrap();

        let schedule = ExponentialSchedule {
            alpha_start: config.alpha_start,
            alpha_end: config.alpha_end,
            sigma_start: 2.0,
            sigma_end: 1.0,
            total_steps: 6,
        };
        let sep = grid.separations();
        for step in 0..6 {
            let bmu = argmin(expected.row(0).mapv(|w| (1.5 - w).powi(2)).view());
            for j in 0..3 {
                let h = neighborhood(sep[[bmu, j]], schedule.sigma(step));
                expected[[0, j]] += schedule.alpha(step) * h * (1.5 - expected[[0, j]]);
            }
        }

        for (w, e) in weights.iter().zip(expected.iter()) {
            assert!((w - e).abs() < 1e-12, "{} != {}", w, e);
        }
        // Reports carry the values at the first sample of each epoch.
        for (epoch, report) in reports.iter().enumerate() {
            assert!((report.learning_rate - schedule.alpha(2 * epoch)).abs() < 1e-12);
            assert!((report.width - schedule.sigma(2 * epoch)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_exponential_single_node_rate_per_sample() {
        let grid = Grid::new(&[1], Metric::L2).unwrap();
        let data = Array2::from_elem((2, 1), 4.0);
        let config = TrainingConfig {
            maxiter: 2,
            iterfrac: 1.0,
            seed: 5,
            ..TrainingConfig::somz()
        };
        let mut trainer = SomTrainer::new(config);
        let mut weights = trainer.initialize(data.view(), 1).unwrap();
        let gap = 4.0 - weights[[0, 0]];
        trainer.train(&mut weights, data.view(), &grid, |_| {}).unwrap();

        // Four updates, each with its own rate 0.8 * (0.5 / 0.8)^(t / 4).
        let shrink: f64 = (0..4)
            .map(|t| 1.0 - 0.8 * (0.5f64 / 0.8).powf(t as f64 / 4.0))
            .product();
        assert!((4.0 - weights[[0, 0]] - gap * shrink).abs() < 1e-12);
    }

    #[test]
    fn test_zero_epochs_leaves_weights() {
        let grid = Grid::new(&[2, 2], Metric::L2).unwrap();
        let data = test_data();
        let mut trainer = SomTrainer::new(TrainingConfig {
            maxiter: 0,
            ..test_config()
        });
        let mut weights = trainer.initialize(data.view(), grid.size()).unwrap();
        let initial = weights.clone();

        let losses = trainer
            .train(&mut weights, data.view(), &grid, |_| panic!("no epochs expected"))
            .unwrap();

        assert!(losses.is_empty());
        assert_eq!(weights, initial);
    }

    #[test]
    fn test_single_node_stays_finite() {
        let grid = Grid::new(&[1], Metric::L2).unwrap();
        let data = test_data();
        for config in [test_config(), TrainingConfig::somz()] {
            let mut trainer = SomTrainer::new(config);
            let mut weights = trainer.initialize(data.view(), 1).unwrap();
            trainer.train(&mut weights, data.view(), &grid, |_| {}).unwrap();
            assert!(weights.iter().all(|w| w.is_finite()));
        }
    }

    #[test]
    fn test_train_dimension_mismatch() {
        let grid = Grid::new(&[2], Metric::L2).unwrap();
        let data = test_data();
        let mut weights = Array2::<f64>::zeros((5, 2));
        let mut trainer = SomTrainer::new(test_config());

        assert!(matches!(
            trainer.train(&mut weights, data.view(), &grid, |_| {}),
            Err(SomError::DimensionMismatch { expected: 5, found: 3 })
        ));
    }
}
