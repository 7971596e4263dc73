//! # Control Tick Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use nalgebra::{SVector, Vector3};
use quad_lib::{
    robot::{KinematicState, LegId, Robot, RobotParams, NUM_LEGS, NUM_MOTORS},
    stance::StanceCtrl,
    vel_cmd::VelocityCmd,
    wbc::{ContactConstraint, ContactStack},
};

fn control_tick_benchmark(c: &mut Criterion) {
    // ---- Build the robot from the example parameters ----

    let params: RobotParams = toml::from_str(include_str!("../../params/robot.toml")).unwrap();
    let mut robot = Robot::new(params.clone()).unwrap();

    let vel_cmd = VelocityCmd {
        linear_ms_rb: Vector3::new(0.3, 0.0, 0.0),
        angular_rads_rb: Vector3::new(0.0, 0.0, 0.2),
    };

    // Standing joint angles with some motion on every joint
    let targets = StanceCtrl::foot_targets_m_rb(&params, &vel_cmd);
    let mut q = SVector::<f64, NUM_MOTORS>::zeros();
    for leg in LegId::ALL.iter() {
        q.fixed_rows_mut::<3>(leg.first_joint())
            .copy_from(&params.foot_position_in_base_frame_to_joint_angles(
                &targets.column(leg.index()).into_owned(),
                *leg,
            ));
    }
    let state = KinematicState {
        base_ang_vel_rads_rb: Vector3::new(0.1, -0.05, 0.2),
        joint_pos_rad: q,
        joint_rate_rads: SVector::<f64, NUM_MOTORS>::from_fn(|i, _| 0.1 * (i as f64 - 6.0)),
    };

    // ---- Kinematics ----

    let foot_m_hip =
        params.joint_angles_to_foot_position_in_hip_frame(&state.leg_pos_rad(LegId::FL), LegId::FL);
    let rr_pos_rad = state.leg_pos_rad(LegId::RR);

    c.bench_function("RobotParams::foot_position_in_hip_frame_to_joint_angles", |b| {
        b.iter(|| {
            params.foot_position_in_hip_frame_to_joint_angles(black_box(&foot_m_hip), LegId::FL)
        })
    });

    c.bench_function("RobotParams::analytical_leg_jacobian", |b| {
        b.iter(|| params.analytical_leg_jacobian(black_box(&rr_pos_rad), LegId::RR))
    });

    // ---- Contacts ----

    let mut point = ContactConstraint::point_foot(LegId::FR);
    c.bench_function("ContactConstraint::update_contact_constraint::point_foot", |b| {
        b.iter(|| point.update_contact_constraint(&params, black_box(&state)).unwrap())
    });

    let mut edge = ContactConstraint::edge_foot(LegId::FR);
    c.bench_function("ContactConstraint::update_contact_constraint::edge_foot", |b| {
        b.iter(|| edge.update_contact_constraint(&params, black_box(&state)).unwrap())
    });

    let mut contacts: Vec<ContactConstraint> = LegId::ALL
        .iter()
        .map(|leg| ContactConstraint::point_foot(*leg))
        .collect();
    for contact in contacts.iter_mut() {
        contact.update_contact_constraint(&params, &state).unwrap();
    }
    c.bench_function("ContactStack::from_contacts", |b| {
        b.iter(|| ContactStack::from_contacts(black_box(&contacts)))
    });

    // ---- Full tick ----

    let mut stance_ctrl = StanceCtrl::new();
    c.bench_function("StanceCtrl::proc", |b| {
        b.iter(|| stance_ctrl.proc(&mut robot, black_box(&state), &vel_cmd, &[true; NUM_LEGS]))
    });
}

criterion_group!(benches, control_tick_benchmark);
criterion_main!(benches);
