use comet_mcda::{
    Comet, CometError, CriterionType, DomainPolicy, ExpertFunction, FunctionExpert, MethodExpert,
    Topsis,
};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn sum_expert() -> ExpertFunction {
    ExpertFunction::Function(FunctionExpert::new(Box::new(|a, b| {
        let (sa, sb) = (a.iter().sum::<f64>(), b.iter().sum::<f64>());
        if sa > sb {
            1.0
        } else if sa < sb {
            0.0
        } else {
            0.5
        }
    })))
}

fn two_criteria_model() -> Comet {
    let cvalues = vec![vec![0.0, 500.0, 1000.0], vec![1.0, 5.0]];
    Comet::new(cvalues, sum_expert()).unwrap()
}

#[test]
fn evaluation_is_exact_at_the_characteristic_objects() {
    let comet = two_criteria_model();
    let lattice = comet.characteristic_objects().clone();
    let evaluated = comet.evaluate(&lattice).unwrap();
    for (got, expected) in evaluated.iter().zip(comet.p()) {
        assert_eq!(got, expected);
    }
}

#[test]
fn one_dimensional_interpolation_is_linear_between_landmarks() {
    let comet = Comet::new(vec![vec![0.0, 1.0]], sum_expert()).unwrap();
    assert_eq!(comet.p(), &[0.0, 1.0]);

    let probes = DMatrix::from_row_slice(4, 1, &[0.0, 0.25, 0.5, 1.0]);
    let p = comet.evaluate(&probes).unwrap();
    assert_eq!(p, vec![0.0, 0.25, 0.5, 1.0]);
}

#[test]
fn preferences_stay_monotone_along_profit_criteria() {
    let comet = two_criteria_model();
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..200 {
        let x0 = rng.gen_range(0.0..=1000.0);
        let y0 = rng.gen_range(1.0..=5.0);
        let x1 = rng.gen_range(x0..=1000.0);
        let y1 = rng.gen_range(y0..=5.0);

        let probes = DMatrix::from_row_slice(2, 2, &[x0, y0, x1, y1]);
        let p = comet.evaluate(&probes).unwrap();
        assert!(
            p[1] >= p[0] - 1e-12,
            "dominating alternative lost: ({x0}, {y0}) -> {}, ({x1}, {y1}) -> {}",
            p[0],
            p[1]
        );
        assert!(p.iter().all(|&v| (-1e-12..=1.0 + 1e-12).contains(&v)));
    }
}

#[test]
fn out_of_domain_values_are_rejected_with_coordinates() {
    let comet = two_criteria_model();
    let probes = DMatrix::from_row_slice(2, 2, &[500.0, 3.0, 1500.0, 3.0]);
    let err = comet.evaluate(&probes).unwrap_err();
    match err {
        CometError::OutOfDomain {
            alternative,
            criterion,
            value,
            lo,
            hi,
        } => {
            assert_eq!(alternative, 1);
            assert_eq!(criterion, 0);
            assert_eq!(value, 1500.0);
            assert_eq!(lo, 0.0);
            assert_eq!(hi, 1000.0);
        }
        other => panic!("expected OutOfDomain, got {other:?}"),
    }
}

#[test]
fn non_finite_values_are_rejected() {
    let comet = two_criteria_model();
    let probes = DMatrix::from_row_slice(1, 2, &[f64::NAN, 3.0]);
    assert!(matches!(
        comet.evaluate(&probes),
        Err(CometError::OutOfDomain { criterion: 0, .. })
    ));
}

#[test]
fn clamp_policy_evaluates_as_the_nearest_boundary_point() {
    let cvalues = vec![vec![0.0, 500.0, 1000.0], vec![1.0, 5.0]];
    let comet = Comet::with_policy(cvalues, sum_expert(), DomainPolicy::Clamp).unwrap();
    assert_eq!(comet.domain_policy(), DomainPolicy::Clamp);

    let outside = DMatrix::from_row_slice(2, 2, &[1500.0, 3.0, -20.0, 7.0]);
    let boundary = DMatrix::from_row_slice(2, 2, &[1000.0, 3.0, 0.0, 5.0]);
    assert_eq!(
        comet.evaluate(&outside).unwrap(),
        comet.evaluate(&boundary).unwrap()
    );
}

#[test]
fn clamp_policy_still_rejects_non_finite_values() {
    let cvalues = vec![vec![0.0, 500.0, 1000.0], vec![1.0, 5.0]];
    let comet = Comet::with_policy(cvalues, sum_expert(), DomainPolicy::Clamp).unwrap();
    for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let probes = DMatrix::from_row_slice(1, 2, &[bad, 3.0]);
        assert!(
            matches!(
                comet.evaluate(&probes),
                Err(CometError::OutOfDomain { criterion: 0, .. })
            ),
            "{bad} must not clamp"
        );
    }
}

#[test]
fn matrix_width_must_match_the_criteria_count() {
    let comet = two_criteria_model();
    let probes = DMatrix::from_row_slice(1, 3, &[500.0, 3.0, 1.0]);
    let err = comet.evaluate(&probes).unwrap_err();
    assert!(matches!(err, CometError::Validation(_)));
}

#[test]
fn ranking_is_competitive_and_ties_share_a_rank() {
    let comet = two_criteria_model();
    let ranking = comet.rank(&[0.9, 0.5, 0.9, 0.1]);
    assert_eq!(ranking, vec![1, 3, 1, 4]);
}

#[test]
fn local_weights_sum_to_one_and_ignore_inert_criteria() {
    // Only the first criterion ever moves the judgement.
    let expert = ExpertFunction::Function(FunctionExpert::new(Box::new(|a, b| {
        if a[0] > b[0] {
            1.0
        } else if a[0] < b[0] {
            0.0
        } else {
            0.5
        }
    })));
    let cvalues = vec![vec![0.0, 500.0, 1000.0], vec![1.0, 5.0]];
    let comet = Comet::new(cvalues, expert).unwrap();

    let weights = comet.local_weights(&[500.0, 3.0], 0.1).unwrap();
    assert_eq!(weights.len(), 2);
    assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    assert_eq!(weights[1], 0.0, "inert criterion must carry no weight");
    assert_eq!(weights[0], 1.0);
}

#[test]
fn local_weights_names_the_offending_criterion() {
    let comet = two_criteria_model();
    let err = comet.local_weights(&[2000.0, 3.0], 0.1).unwrap_err();
    match err {
        CometError::SweepPointOutOfDomain {
            criterion,
            value,
            lo,
            hi,
        } => {
            assert_eq!(criterion, 0);
            assert_eq!(value, 2000.0);
            assert_eq!(lo, 0.0);
            assert_eq!(hi, 1000.0);
        }
        other => panic!("expected SweepPointOutOfDomain, got {other:?}"),
    }

    // Under Clamp the point is snapped and the sweep proceeds.
    let cvalues = vec![vec![0.0, 500.0, 1000.0], vec![1.0, 5.0]];
    let clamping = Comet::with_policy(cvalues, sum_expert(), DomainPolicy::Clamp).unwrap();
    let weights = clamping.local_weights(&[2000.0, 3.0], 0.1).unwrap();
    assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-12);
}

#[test]
fn local_weights_rejects_a_degenerate_step() {
    let comet = two_criteria_model();
    for step in [0.0, 1.0, -0.5] {
        assert!(matches!(
            comet.local_weights(&[500.0, 3.0], step),
            Err(CometError::InvalidStep(_))
        ));
    }
}

#[test]
fn domain_policy_round_trips_through_serde() {
    let json = serde_json::to_string(&DomainPolicy::Clamp).unwrap();
    assert_eq!(json, "\"clamp\"");
    let restored: DomainPolicy = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, DomainPolicy::Clamp);
    assert_eq!(
        serde_json::from_str::<DomainPolicy>("\"reject\"").unwrap(),
        DomainPolicy::Reject
    );
}

#[test]
fn method_expert_and_pairwise_expert_agree_on_a_dominated_lattice() {
    let cvalues = vec![vec![0.0, 500.0, 1000.0], vec![1.0, 5.0]];
    let types = vec![CriterionType::Profit, CriterionType::Profit];
    let by_method = Comet::new(
        cvalues.clone(),
        ExpertFunction::Method(MethodExpert::new(Topsis, vec![0.5, 0.5], types)),
    )
    .unwrap();
    let by_pairs = Comet::new(cvalues, sum_expert()).unwrap();

    // Different judges, same extremes: both pin the corners of the domain.
    assert_eq!(by_method.p()[0], 0.0);
    assert_eq!(by_pairs.p()[0], 0.0);
    assert_eq!(*by_method.p().last().unwrap(), 1.0);
    assert_eq!(*by_pairs.p().last().unwrap(), 1.0);
}
