use light_curve_transit::{
    BoxLeastSquares, Detrender, Fit, ParameterBlock, PeriodGrid, PipelineConfig, TransitSearch,
};
use light_curve_transit_test_util::{SyntheticSystem, two_planet_system};
use std::sync::LazyLock;

static SYSTEM: LazyLock<SyntheticSystem> = LazyLock::new(|| two_planet_system(0));

static FIT: LazyLock<Fit> = LazyLock::new(|| {
    let config = PipelineConfig {
        detrender: Detrender::new(301, 3, 3.0, 10),
        search: TransitSearch::new(
            PeriodGrid::geometric(5.0, 30.0, 20_000),
            BoxLeastSquares::new(vec![0.1, 0.15, 0.2], BoxLeastSquares::default_oversample()),
            2,
            3.0,
        ),
        light_curve: SYSTEM.settings.clone(),
        rv_trend_degree: 2,
        fine_grid_size: 200,
        ..PipelineConfig::default()
    };
    config.fit(&SYSTEM.light_curve, &SYSTEM.rv).unwrap()
});

/// Index of the fitted planet closest in period to every injected planet
fn matching_planets(periods: &[f64]) -> Vec<usize> {
    SYSTEM
        .planets
        .iter()
        .map(|truth| {
            (0..periods.len())
                .min_by(|&a, &b| {
                    (periods[a] - truth.period)
                        .abs()
                        .total_cmp(&(periods[b] - truth.period).abs())
                })
                .unwrap()
        })
        .collect()
}

#[test]
fn search_recovers_periods() {
    let periods: Vec<_> = FIT.candidates.iter().map(|c| c.period).collect();
    let matches = matching_planets(&periods);
    assert_ne!(matches[0], matches[1]);
    for (truth, &i) in SYSTEM.planets.iter().zip(&matches) {
        let relative = (periods[i] - truth.period).abs() / truth.period;
        assert!(relative < 1e-3, "{} vs {}", periods[i], truth.period);
    }
}

#[test]
fn map_periods_within_three_sigma() {
    let laplace = FIT.laplace().unwrap();
    let std = laplace.std();
    let physical = &FIT.solution.physical;
    let periods: Vec<_> = physical.planets.iter().map(|p| p.period).collect();
    let layout = FIT.model.layout();
    for (truth, &i) in SYSTEM.planets.iter().zip(&matching_planets(&periods)) {
        let sigma = periods[i] * std[layout.index(ParameterBlock::LogPeriod, i)];
        assert!(
            (periods[i] - truth.period).abs() < 3.0 * sigma,
            "P = {} +- {sigma}, true {}",
            periods[i],
            truth.period
        );
    }
}

#[test]
fn refinement_rejects_injected_outliers() {
    let retained = &FIT.detrended.retained;
    for i in &SYSTEM.outliers {
        assert!(retained.contains(i), "outlier {i} removed by the detrender");
    }
    let rejected: Vec<usize> = FIT
        .solution
        .mask
        .rejected()
        .into_iter()
        .map(|j| retained[j])
        .collect();
    assert_eq!(rejected, SYSTEM.outliers);
    let input_mask = FIT.input_mask(SYSTEM.light_curve.lenu());
    assert!(SYSTEM.outliers.iter().all(|&i| !input_mask[i]));
}

#[test]
fn stages_never_increase_cost() {
    let stages = &FIT.solution.stages;
    assert_eq!(stages.len(), 14);
    for stage in stages {
        assert!(stage.end <= stage.start, "{stage:?}");
    }
}

#[test]
fn model_curves_cover_the_fine_grid() {
    let solution = &FIT.solution;
    assert_eq!(solution.planets.len(), 2);
    for planet in &solution.planets {
        assert_eq!(planet.flux.len(), 200);
        assert_eq!(planet.rv.len(), 200);
        let deepest = planet.flux.iter().copied().fold(f64::INFINITY, f64::min);
        assert!(deepest < -0.3, "{deepest}");
    }
    assert_eq!(solution.rv_model.len(), 200);
    assert_eq!(solution.prediction.total().len(), FIT.detrended.retained.len());
    assert_eq!(solution.names.len(), solution.theta.len());
}
