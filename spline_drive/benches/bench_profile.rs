//! # Profile and Trajectory Benchmark

use criterion::{criterion_group, criterion_main, Criterion};
use rand::Rng;

use spline_drive::{
    profile::{
        generate_jerk_limited_profile, generate_motion_profile, MotionState,
        SampledMotionConstraints, DEFAULT_RESOLUTION,
    },
    trajectory::{DriveConstraints, TrajectoryBuilder},
    Pose2d, Vector2d,
};

fn profile_benchmark(c: &mut Criterion) {
    // ---- Build randomly varying constraints ----

    let mut rng = rand::thread_rng();
    let num_samples = 200;
    let length = 50.0;

    let max_vels: Vec<f64> = (0..num_samples).map(|_| rng.gen_range(5.0..30.0)).collect();
    let max_accels: Vec<f64> = (0..num_samples).map(|_| rng.gen_range(10.0..40.0)).collect();
    let constraints = SampledMotionConstraints::new(
        0.0,
        length / (num_samples - 1) as f64,
        max_vels,
        max_accels,
    )
    .unwrap();

    let start = MotionState::new(0.0, 0.0, 0.0);
    let goal = MotionState::new(length, 0.0, 0.0);

    c.bench_function("generate_motion_profile", |b| {
        b.iter(|| generate_motion_profile(start, goal, &constraints, DEFAULT_RESOLUTION).unwrap())
    });

    c.bench_function("generate_jerk_limited_profile", |b| {
        b.iter(|| generate_jerk_limited_profile(start, goal, 25.0, 40.0, 100.0).unwrap())
    });
}

fn trajectory_benchmark(c: &mut Criterion) {
    let constraints = DriveConstraints::new(30.0, 30.0, 2.0, 2.0).with_centripetal_accel(20.0);

    let build = || {
        TrajectoryBuilder::new(Pose2d::new(0.0, 0.0, 0.0), constraints.clone())
            .spline_to(Pose2d::new(30.0, 30.0, std::f64::consts::FRAC_PI_2))
            .line_to(Vector2d::new(30.0, 50.0))
            .turn(std::f64::consts::PI)
            .spline_to(Pose2d::new(0.0, 10.0, -std::f64::consts::FRAC_PI_2))
            .build()
            .unwrap()
    };

    c.bench_function("TrajectoryBuilder::build", |b| b.iter(|| build()));

    let trajectory = build();
    let duration = trajectory.duration();

    c.bench_function("Trajectory::get", |b| {
        b.iter(|| {
            let mut t = 0.0;
            while t < duration {
                criterion::black_box(trajectory.get(t));
                criterion::black_box(trajectory.velocity(t));
                t += 0.01;
            }
        })
    });
}

criterion_group!(benches, profile_benchmark, trajectory_benchmark);
criterion_main!(benches);
