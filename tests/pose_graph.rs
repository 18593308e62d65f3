//! End-to-end 2D pose-graph tests.

use std::f64::consts::FRAC_PI_2;

use approx::assert_relative_eq;
use nalgebra::DMatrix;

use arbor_solver::optimizer::{GaussNewton, LevenbergMarquardt, SparseOptimizer};
use arbor_solver::se2::{Se2, Se2Edge, Se2PriorEdge, Se2Vertex, normalize_angle};

/// Square loop: four poses, relative motion (1, 0, pi/2) between
/// consecutive poses plus the closing edge. `noise` perturbs every
/// non-fixed initial estimate.
fn square_loop(noise: f64) -> SparseOptimizer {
    let step = Se2::new(1.0, 0.0, FRAC_PI_2);
    let mut truth = vec![Se2::identity()];
    for i in 1..4 {
        truth.push(truth[i - 1].compose(&step));
    }

    let mut optimizer = SparseOptimizer::new();
    for (i, &pose) in truth.iter().enumerate() {
        let initial = if i == 0 {
            pose
        } else {
            Se2::new(
                pose.x + noise * (i as f64),
                pose.y - noise * (i as f64),
                pose.theta + 0.1 * noise * (i as f64),
            )
        };
        let vertex = Se2Vertex::new(i, initial);
        let vertex = if i == 0 { vertex.fixed() } else { vertex };
        optimizer.graph_mut().add_vertex(Box::new(vertex)).unwrap();
    }
    for i in 0..4 {
        let edge = Se2Edge::new(i, i, (i + 1) % 4, step);
        optimizer.graph_mut().add_edge(Box::new(edge)).unwrap();
    }
    optimizer
}

fn assert_matches_truth(optimizer: &SparseOptimizer) {
    let step = Se2::new(1.0, 0.0, FRAC_PI_2);
    let mut expected = Se2::identity();
    for i in 0..4 {
        let pose = Se2::from_vector(&optimizer.graph().vertex(i).unwrap().estimate());
        assert_relative_eq!(pose.x, expected.x, epsilon = 1e-6);
        assert_relative_eq!(pose.y, expected.y, epsilon = 1e-6);
        // compare headings through the wrap at +/- pi
        assert_relative_eq!(
            normalize_angle(pose.theta - expected.theta),
            0.0,
            epsilon = 1e-6
        );
        expected = expected.compose(&step);
    }
}

#[test]
fn gauss_newton_closes_the_loop() {
    let mut optimizer = square_loop(0.1);
    optimizer.set_algorithm(Box::new(GaussNewton::new()));
    optimizer.initialize_optimization().unwrap();

    let performed = optimizer.optimize(20, false).unwrap();
    assert!(performed >= 1);
    assert!(performed <= 20);

    optimizer.compute_active_errors().unwrap();
    assert_relative_eq!(optimizer.active_chi2(), 0.0, epsilon = 1e-10);
    assert_matches_truth(&optimizer);
}

#[test]
fn levenberg_marquardt_closes_the_loop() {
    let mut optimizer = square_loop(0.3);
    optimizer.set_algorithm(Box::new(LevenbergMarquardt::new()));
    optimizer.initialize_optimization().unwrap();

    let performed = optimizer.optimize(50, false).unwrap();
    // refinement must continue past the first accepted step
    assert!(performed > 1);

    optimizer.compute_active_errors().unwrap();
    assert_relative_eq!(optimizer.active_chi2(), 0.0, epsilon = 1e-8);
    assert_matches_truth(&optimizer);
}

#[test]
fn optimization_resumes_online() {
    let mut optimizer = square_loop(0.3);
    optimizer.set_algorithm(Box::new(LevenbergMarquardt::new()));
    optimizer.initialize_optimization().unwrap();

    let first = optimizer.optimize(2, false).unwrap();
    assert!(first <= 2);
    let second = optimizer.optimize(50, true).unwrap();
    assert!(second <= 50);

    optimizer.compute_active_errors().unwrap();
    assert_relative_eq!(optimizer.active_chi2(), 0.0, epsilon = 1e-8);
}

#[test]
fn initial_guess_follows_the_chain() {
    let mut optimizer = SparseOptimizer::new();
    let a = Se2::new(1.0, 2.0, FRAC_PI_2);
    optimizer
        .graph_mut()
        .add_vertex(Box::new(Se2Vertex::new(0, a).fixed()))
        .unwrap();
    for i in 1..3 {
        optimizer
            .graph_mut()
            .add_vertex(Box::new(Se2Vertex::new(i, Se2::identity())))
            .unwrap();
    }
    optimizer
        .graph_mut()
        .add_edge(Box::new(Se2Edge::new(0, 0, 1, Se2::new(1.0, 0.0, 0.0))))
        .unwrap();
    optimizer
        .graph_mut()
        .add_edge(Box::new(Se2Edge::new(1, 1, 2, Se2::new(2.0, 0.0, -FRAC_PI_2))))
        .unwrap();

    optimizer.initialize_optimization().unwrap();
    optimizer.compute_initial_guess().unwrap();

    let b = Se2::from_vector(&optimizer.graph().vertex(1).unwrap().estimate());
    assert_relative_eq!(b.x, 1.0, epsilon = 1e-12);
    assert_relative_eq!(b.y, 3.0, epsilon = 1e-12);
    assert_relative_eq!(b.theta, FRAC_PI_2, epsilon = 1e-12);

    let c = Se2::from_vector(&optimizer.graph().vertex(2).unwrap().estimate());
    assert_relative_eq!(c.x, 1.0, epsilon = 1e-12);
    assert_relative_eq!(c.y, 5.0, epsilon = 1e-12);
    assert_relative_eq!(c.theta, 0.0, epsilon = 1e-12);
}

#[test]
fn gauge_freedom_detects_anchors() {
    // no fixed vertex and no prior: the loop is free to drift
    let mut optimizer = SparseOptimizer::new();
    let step = Se2::new(1.0, 0.0, FRAC_PI_2);
    let mut pose = Se2::identity();
    for i in 0..4 {
        optimizer
            .graph_mut()
            .add_vertex(Box::new(Se2Vertex::new(i, pose)))
            .unwrap();
        pose = pose.compose(&step);
    }
    for i in 0..4 {
        optimizer
            .graph_mut()
            .add_edge(Box::new(Se2Edge::new(i, i, (i + 1) % 4, step)))
            .unwrap();
    }
    optimizer.initialize_optimization().unwrap();
    assert!(optimizer.gauge_freedom());
    assert_eq!(optimizer.find_gauge(), Some(0));

    // a full-dimension prior removes the freedom
    optimizer
        .graph_mut()
        .add_edge(Box::new(Se2PriorEdge::new(10, 0, Se2::identity())))
        .unwrap();
    optimizer.initialize_optimization().unwrap();
    assert!(!optimizer.gauge_freedom());
}

#[test]
fn marginals_of_an_anchored_pair() {
    // fixed anchor, one relative edge with information 2*I: the free
    // pose's covariance block is (J^T 2I J)^-1 = 0.5 * I because the
    // Jacobian block is orthonormal
    let mut optimizer = SparseOptimizer::new();
    optimizer.set_algorithm(Box::new(GaussNewton::new()));
    optimizer
        .graph_mut()
        .add_vertex(Box::new(Se2Vertex::new(0, Se2::identity()).fixed()))
        .unwrap();
    optimizer
        .graph_mut()
        .add_vertex(Box::new(Se2Vertex::new(1, Se2::new(1.0, 0.0, 0.3))))
        .unwrap();
    optimizer
        .graph_mut()
        .add_edge(Box::new(
            Se2Edge::new(0, 0, 1, Se2::new(1.0, 0.0, 0.3))
                .with_information(2.0 * DMatrix::identity(3, 3)),
        ))
        .unwrap();

    optimizer.initialize_optimization().unwrap();
    optimizer.compute_active_errors().unwrap();
    optimizer.linearize_system().unwrap();

    let marginals = optimizer.compute_marginals(&[(0, 0)]).unwrap();
    let block = &marginals[&(0, 0)];
    for r in 0..3 {
        for c in 0..3 {
            let expected = if r == c { 0.5 } else { 0.0 };
            assert_relative_eq!(block[(r, c)], expected, epsilon = 1e-9);
        }
    }
}
