//! Optimize a noisy ring of 2D poses.
//!
//! ```bash
//! cargo run --example pose_graph -- --poses 100 --noise 0.05 --algorithm lm
//! ```

use std::f64::consts::PI;

use clap::{Parser, ValueEnum};
use tracing::info;

use arbor_solver::logger::init_logger;
use arbor_solver::optimizer::{GaussNewton, LevenbergMarquardt, SparseOptimizer};
use arbor_solver::se2::{Se2, Se2Edge, Se2Vertex};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Algorithm {
    Gn,
    Lm,
}

#[derive(Parser, Debug)]
#[command(about = "Optimize a noisy ring of 2D poses")]
struct Args {
    /// Number of poses on the ring
    #[arg(long, default_value_t = 50)]
    poses: usize,

    /// Amplitude of the deterministic perturbation of the initial guess
    #[arg(long, default_value_t = 0.05)]
    noise: f64,

    /// Maximum number of iterations
    #[arg(long, default_value_t = 25)]
    iterations: usize,

    /// Solver to use
    #[arg(long, value_enum, default_value_t = Algorithm::Lm)]
    algorithm: Algorithm,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();
    let args = Args::parse();

    let n = args.poses.max(3);
    let step = Se2::new(1.0, 0.0, 2.0 * PI / n as f64);

    let mut optimizer = SparseOptimizer::new();
    match args.algorithm {
        Algorithm::Gn => optimizer.set_algorithm(Box::new(GaussNewton::new())),
        Algorithm::Lm => optimizer.set_algorithm(Box::new(LevenbergMarquardt::new())),
    }
    optimizer.set_verbose(true);
    optimizer.set_compute_batch_statistics(true);

    let mut pose = Se2::identity();
    for i in 0..n {
        let initial = if i == 0 {
            pose
        } else {
            // reproducible perturbation instead of a rand dependency
            let wobble = (i as f64 * 12.9898).sin();
            Se2::new(
                pose.x + args.noise * wobble,
                pose.y - args.noise * wobble,
                pose.theta + 0.2 * args.noise * wobble,
            )
        };
        let vertex = Se2Vertex::new(i, initial);
        let vertex = if i == 0 { vertex.fixed() } else { vertex };
        optimizer.graph_mut().add_vertex(Box::new(vertex))?;
        pose = pose.compose(&step);
    }
    for i in 0..n {
        optimizer
            .graph_mut()
            .add_edge(Box::new(Se2Edge::new(i, i, (i + 1) % n, step)))?;
    }

    optimizer.initialize_optimization()?;
    optimizer.compute_active_errors()?;
    let initial_chi2 = optimizer.active_chi2();

    let performed = optimizer.optimize(args.iterations, false)?;

    optimizer.compute_active_errors()?;
    info!(
        poses = n,
        iterations = performed,
        initial_chi2,
        final_chi2 = optimizer.active_chi2(),
        "ring optimization finished"
    );
    for record in optimizer.batch_statistics() {
        info!("{record}");
    }
    Ok(())
}
