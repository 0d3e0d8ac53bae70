mod common;

use approx::assert_relative_eq;

use moco_core::error::MocoError;
use moco_core::pipeline::types::NoOpReporter;
use moco_core::registration::CentroidEngine;
use moco_core::template::{build_template, TemplateConfig};

use common::{blob_volume, RecordingEngine};

fn volumes(n: usize) -> Vec<moco_core::volume::Volume> {
    (0..n)
        .map(|i| blob_volume((16, 16, 16), (8.0, 8.0, 8.0), i))
        .collect()
}

#[test]
fn budget_below_two_is_rejected() {
    let engine = RecordingEngine::new();
    let config = TemplateConfig {
        iterations: 1,
        ..TemplateConfig::default()
    };
    let err = build_template(&volumes(3), &config, &engine, &NoOpReporter).unwrap_err();
    assert!(matches!(err, MocoError::InvalidConfiguration(_)));
    assert_eq!(engine.call_count(), 0);
}

#[test]
fn empty_input_is_rejected() {
    let engine = RecordingEngine::new();
    let err = build_template(&[], &TemplateConfig::default(), &engine, &NoOpReporter).unwrap_err();
    assert!(matches!(err, MocoError::EmptySequence));
}

#[test]
fn engine_runs_once_per_volume_per_iteration() {
    let engine = RecordingEngine::new();
    let config = TemplateConfig {
        iterations: 3,
        ..TemplateConfig::default()
    };
    let result = build_template(&volumes(5), &config, &engine, &NoOpReporter).unwrap();

    assert_eq!(engine.call_count(), 15);
    assert_eq!(result.iteration_templates.len(), 3);
    assert_eq!(result.states.len(), 3);
    assert_eq!(result.forward_transforms.len(), 5);
    for history in &result.history {
        assert_eq!(history.entries().len(), 3);
    }
}

#[test]
fn first_iteration_uses_the_coarse_profile() {
    let engine = RecordingEngine::new();
    let config = TemplateConfig {
        iterations: 2,
        ..TemplateConfig::default()
    };
    build_template(&volumes(2), &config, &engine, &NoOpReporter).unwrap();

    let log = engine.log.lock().unwrap();
    assert_eq!(log.len(), 4);
    // coarse profile has 2 levels, fine has 3
    assert!(log[..2].iter().all(|&(_, levels)| levels == 2));
    assert!(log[2..].iter().all(|&(_, levels)| levels == 3));
}

#[test]
fn failure_stops_at_the_iteration_barrier() {
    let engine = RecordingEngine::failing_on(2);
    let config = TemplateConfig {
        iterations: 3,
        ..TemplateConfig::default()
    };
    let err = build_template(&volumes(5), &config, &engine, &NoOpReporter).unwrap_err();

    match err {
        MocoError::RegistrationFailed {
            volume, iteration, ..
        } => {
            assert_eq!(volume, 2);
            assert_eq!(iteration, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
    // every volume of iteration 0 ran, nothing from iteration 1
    assert_eq!(engine.call_count(), 5);
}

#[test]
fn final_template_is_the_last_registration_target() {
    let engine = RecordingEngine::new();
    let config = TemplateConfig {
        iterations: 3,
        ..TemplateConfig::default()
    };
    let result = build_template(&volumes(4), &config, &engine, &NoOpReporter).unwrap();

    let last = result.iteration_templates.last().unwrap();
    assert_eq!(result.final_template.data, last.data);
    assert_eq!(
        result.states.last().unwrap().template.data,
        result.final_template.data
    );
}

#[test]
fn identical_runs_are_deterministic() {
    let config = TemplateConfig {
        iterations: 3,
        ..TemplateConfig::default()
    };
    let input: Vec<_> = (0..5)
        .map(|i| blob_volume((16, 16, 16), (8.0 + i as f64 * 0.5, 8.0, 8.0), i))
        .collect();

    let engine = CentroidEngine::default();
    let a = build_template(&input, &config, &engine, &NoOpReporter).unwrap();
    let b = build_template(&input, &config, &engine, &NoOpReporter).unwrap();

    assert_eq!(a.final_template.data, b.final_template.data);
    for (ta, tb) in a.forward_transforms.iter().zip(&b.forward_transforms) {
        assert_eq!(ta.matrix, tb.matrix);
    }
}

#[test]
fn residual_alignment_shrinks_every_iteration() {
    let input: Vec<_> = [-2.0f64, -1.0, 0.0, 1.0, 2.0]
        .iter()
        .enumerate()
        .map(|(i, &s)| blob_volume((16, 16, 16), (8.0 + s, 8.0, 8.0), i))
        .collect();
    let config = TemplateConfig {
        iterations: 3,
        ..TemplateConfig::default()
    };
    let engine = CentroidEngine::default();
    let result = build_template(&input, &config, &engine, &NoOpReporter).unwrap();

    // mean incremental translation magnitude per iteration
    let magnitudes: Vec<f64> = result
        .states
        .iter()
        .map(|state| {
            state
                .transforms
                .iter()
                .map(|t| t.translation().norm())
                .sum::<f64>()
                / state.transforms.len() as f64
        })
        .collect();

    assert_eq!(magnitudes.len(), 3);
    assert!(magnitudes[0] > 0.5, "first iteration did no work");
    for pair in magnitudes.windows(2) {
        assert!(
            pair[1] <= pair[0] + 1e-6,
            "residual grew between iterations: {magnitudes:?}"
        );
    }
}

#[test]
fn recovers_opposed_shifts() {
    // Two blobs offset symmetrically about the grid center; the recentered
    // template should sit between them and the motion should mirror.
    let input = vec![
        blob_volume((16, 16, 16), (6.0, 8.0, 8.0), 0),
        blob_volume((16, 16, 16), (10.0, 8.0, 8.0), 1),
    ];
    let config = TemplateConfig {
        iterations: 3,
        ..TemplateConfig::default()
    };
    let engine = CentroidEngine::default();
    let result = build_template(&input, &config, &engine, &NoOpReporter).unwrap();

    let tx0 = result.motion[0].translation[0];
    let tx1 = result.motion[1].translation[0];
    assert_relative_eq!(tx0, 2.0, epsilon = 0.5);
    assert_relative_eq!(tx1, -2.0, epsilon = 0.5);
}
