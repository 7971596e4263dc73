//! Leg kinematics calculations

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, trace, warn};
use nalgebra::{Matrix3, Matrix3x4, Rotation3, SVector, Vector3};
use serde::Serialize;

// Internal imports
use super::*;
use util::maths::{clamp, inverse_condition3, pseudo_inverse3, square};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Effective leg lengths below this are treated as a fully folded leg.
///
/// Units: meters
const MIN_EFFECTIVE_LENGTH_M: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The result of an inverse kinematics calculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IkSolution {
    /// Joint angles (abduction, hip, knee) of the leg.
    ///
    /// Units: radians
    pub angles: Vector3<f64>,

    /// True if the requested position could not be reached and was moved to
    /// the nearest reachable position along the same direction.
    pub reach_limited: bool,
}

/// Terms of the leg geometry which depend only on the knee angle.
struct KneeTerms {
    /// Distance from the hip pitch axis to the foot.
    l_eff: f64,
    /// First derivative of `l_eff` with respect to the knee angle.
    dl_eff: f64,
    /// Second derivative of `l_eff` with respect to the knee angle.
    ddl_eff: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RobotParams {
    /// Calculate the foot position of a leg in its hip frame.
    ///
    /// The leg is modelled as an abduction joint about the hip frame's X axis
    /// carrying a hip link of length `hip_length_m * hip_sign` along Y,
    /// followed by a planar two-link chain (hip pitch and knee) in the plane
    /// normal to Y. With all joints at zero the leg points straight down.
    pub fn joint_angles_to_foot_position_in_hip_frame(
        &self,
        q: &Vector3<f64>,
        leg: LegId,
    ) -> Vector3<f64> {
        let knee = self.knee_terms(q[2]);
        let eff_swing = q[1] + q[2] / 2.0;

        Rotation3::from_axis_angle(&Vector3::x_axis(), q[0])
            * Vector3::new(
                -knee.l_eff * eff_swing.sin(),
                self.signed_hip_length_m(leg),
                -knee.l_eff * eff_swing.cos(),
            )
    }

    /// Calculate the foot positions of all legs in the robot body frame.
    ///
    /// Each column is the leg's hip frame foot position shifted by its hip
    /// offset and default hip position.
    pub fn joint_angles_to_foot_position_in_base_frame(
        &self,
        q: &SVector<f64, NUM_MOTORS>,
    ) -> Matrix3x4<f64> {
        let mut foot_positions = Matrix3x4::zeros();

        for leg in LegId::ALL.iter() {
            let pos = self.joint_angles_to_foot_position_in_hip_frame(&leg_joints(q, *leg), *leg)
                + self.hip_origin_m_rb(*leg);

            foot_positions.set_column(leg.index(), &pos);
        }

        foot_positions
    }

    /// Convert a foot position in the hip frame into joint angles.
    ///
    /// See [`RobotParams::foot_position_in_hip_frame_to_joint_angles`] for
    /// how unreachable positions are handled.
    pub fn foot_position_to_joint_angles(
        &self,
        position: &Vector3<f64>,
        leg: LegId,
    ) -> Vector3<f64> {
        self.foot_position_in_hip_frame_to_joint_angles(position, leg)
            .angles
    }

    /// Convert a foot position in the robot body frame into joint angles.
    pub fn foot_position_in_base_frame_to_joint_angles(
        &self,
        position_m_rb: &Vector3<f64>,
        leg: LegId,
    ) -> Vector3<f64> {
        self.foot_position_to_joint_angles(&(position_m_rb - self.hip_origin_m_rb(leg)), leg)
    }

    /// Closed form inverse kinematics of a leg.
    ///
    /// The knee angle is found from the law of cosines on the planar leg
    /// length, always taking the negative (knee backwards) branch. The hip
    /// pitch then places the foot at the requested X, and the abduction angle
    /// rotates the leg plane onto the requested Y/Z.
    ///
    /// A position outside the reachable shell is moved along the ray from the
    /// hip origin onto the nearest reachable radius, and `reach_limited` is
    /// raised. A non-finite position gives zero angles.
    ///
    /// A position at a reachable distance but with `y^2 + z^2 < hip_length^2`
    /// needs more forward or backward reach than the leg has at that
    /// distance. The hip pitch then saturates at +/- pi/2, leaving the leg
    /// horizontal: the foot stays at the requested distance from the hip, with
    /// its X as close to the requested X as the leg allows, but it is no
    /// longer on the requested ray. `reach_limited` is raised in this case
    /// too. If `y` and `z` are both zero the abduction angle is zero.
    pub fn foot_position_in_hip_frame_to_joint_angles(
        &self,
        position: &Vector3<f64>,
        leg: LegId,
    ) -> IkSolution {
        if !position.iter().all(|v| v.is_finite()) {
            warn!("Non-finite foot position demanded for leg {:?}", leg);
            return IkSolution {
                angles: Vector3::zeros(),
                reach_limited: true,
            };
        }

        let l_hip = self.signed_hip_length_m(leg);
        let l_up = self.upper_length_m;
        let l_low = self.lower_length_m;

        let mut reach_limited = false;
        let mut pos = *position;

        // Squared length of the planar (pitch/knee) part of the leg
        let planar_sq = pos.norm_squared() - square(l_hip);
        let min_planar = (l_up - l_low).abs();
        let max_planar = l_up + l_low;

        if planar_sq < square(min_planar) || planar_sq > square(max_planar) {
            reach_limited = true;

            let planar = if planar_sq < square(min_planar) {
                min_planar
            }
            else {
                max_planar
            };
            let radius = (square(l_hip) + square(planar)).sqrt();

            let norm = pos.norm();
            let dir = if norm > MIN_EFFECTIVE_LENGTH_M {
                pos / norm
            }
            else {
                -Vector3::z()
            };

            pos = dir * radius;

            debug!(
                "Leg {:?} target {:?} out of reach, limited to {:?}",
                leg,
                position.as_slice(),
                pos.as_slice()
            );
        }

        let (x, y, z) = (pos[0], pos[1], pos[2]);

        // Knee
        let cos_knee = clamp(
            &((pos.norm_squared() - square(l_hip) - square(l_low) - square(l_up))
                / (2.0 * l_low * l_up)),
            &-1.0,
            &1.0,
        );
        let knee_rad = -cos_knee.acos();

        // Hip pitch
        let l_eff = self.knee_terms(knee_rad).l_eff;
        let sin_swing = if l_eff > MIN_EFFECTIVE_LENGTH_M {
            -x / l_eff
        }
        else {
            0.0
        };
        // Lateral offset shorter than the hip link, see above
        if sin_swing.abs() > 1.0 {
            reach_limited = true;
        }
        let hip_rad = clamp(&sin_swing, &-1.0, &1.0).asin() - knee_rad / 2.0;

        // Abduction
        let l_plane = l_eff * (hip_rad + knee_rad / 2.0).cos();
        let c1 = l_hip * y - l_plane * z;
        let s1 = l_plane * y + l_hip * z;
        // With no lateral target the abduction is free, keep the leg on its
        // own side (atan2 of signed zeros can give pi)
        let abd_rad = if square(y) + square(z) > square(MIN_EFFECTIVE_LENGTH_M) {
            s1.atan2(c1)
        }
        else {
            0.0
        };

        IkSolution {
            angles: Vector3::new(abd_rad, hip_rad, knee_rad),
            reach_limited,
        }
    }

    /// Analytic Jacobian of a leg's hip frame foot position with respect to
    /// its joint angles.
    ///
    /// Column `j` is the foot velocity produced by a unit rate of joint `j`.
    /// When the leg is fully folded the effective length vanishes and the
    /// Jacobian loses rank, which shows up in its conditioning.
    pub fn analytical_leg_jacobian(&self, q: &Vector3<f64>, leg: LegId) -> Matrix3<f64> {
        let l_hip = self.signed_hip_length_m(leg);
        let (t1, t2, t3) = (q[0], q[1], q[2]);

        let knee = self.knee_terms(t3);
        let l_eff = knee.l_eff;
        let dl_eff = knee.dl_eff;
        let t_eff = t2 + t3 / 2.0;

        let (s1, c1) = t1.sin_cos();
        let (se, ce) = t_eff.sin_cos();

        Matrix3::new(
            0.0,
            -l_eff * ce,
            -dl_eff * se - l_eff * ce / 2.0,
            -l_hip * s1 + l_eff * c1 * ce,
            -l_eff * s1 * se,
            dl_eff * s1 * ce - l_eff * s1 * se / 2.0,
            l_hip * c1 + l_eff * s1 * ce,
            l_eff * c1 * se,
            -dl_eff * c1 * ce + l_eff * c1 * se / 2.0,
        )
    }

    /// Velocity product term of the foot acceleration, `dJ/dt * qd`.
    ///
    /// This is the foot acceleration in the hip frame when the joint
    /// accelerations are zero.
    pub fn leg_jacobian_dot_qdot(
        &self,
        q: &Vector3<f64>,
        qd: &Vector3<f64>,
        leg: LegId,
    ) -> Vector3<f64> {
        let l_hip = self.signed_hip_length_m(leg);
        let knee = self.knee_terms(q[2]);

        let swing = q[1] + q[2] / 2.0;
        let swing_rate = qd[1] + qd[2] / 2.0;
        let (ss, cs) = swing.sin_cos();

        let l = knee.l_eff;
        let l_rate = knee.dl_eff * qd[2];
        let l_acc = knee.ddl_eff * square(qd[2]);

        // Foot position in the rotating leg plane and its time derivatives
        let w = Vector3::new(-l * ss, l_hip, -l * cs);
        let w_rate = Vector3::new(
            -l_rate * ss - l * cs * swing_rate,
            0.0,
            -l_rate * cs + l * ss * swing_rate,
        );
        let w_acc = Vector3::new(
            -l_acc * ss - 2.0 * l_rate * cs * swing_rate + l * ss * square(swing_rate),
            0.0,
            -l_acc * cs + 2.0 * l_rate * ss * swing_rate + l * cs * square(swing_rate),
        );

        let rot = Rotation3::from_axis_angle(&Vector3::x_axis(), q[0]);
        let abd_axis = Vector3::x() * qd[0];

        let rot_w_rate = rot * w_rate;
        let pos_rate = abd_axis.cross(&(rot * w)) + rot_w_rate;

        abd_axis.cross(&pos_rate) + abd_axis.cross(&rot_w_rate) + rot * w_acc
    }

    /// Convert a foot velocity in the hip frame into joint velocities.
    ///
    /// The Jacobian is inverted directly unless it is close to singular, in
    /// which case the pseudo-inverse is used so that the joint velocities
    /// stay bounded.
    pub fn foot_velocity_to_joint_velocity(
        &self,
        q: &Vector3<f64>,
        v: &Vector3<f64>,
        leg: LegId,
    ) -> Vector3<f64> {
        let jac = self.analytical_leg_jacobian(q, leg);

        self.invert_leg_jacobian(&jac, leg) * v
    }

    /// Convert joint velocities into a foot velocity in the hip frame.
    pub fn joint_velocity_to_foot_velocity(
        &self,
        q: &Vector3<f64>,
        v: &Vector3<f64>,
        leg: LegId,
    ) -> Vector3<f64> {
        self.analytical_leg_jacobian(q, leg) * v
    }

    /// Returns true if the leg Jacobian is far enough from singular for a
    /// direct inverse.
    pub fn is_leg_jacobian_well_conditioned(&self, jac: &Matrix3<f64>) -> bool {
        inverse_condition3(jac) >= self.kinematics.min_condition_ratio
    }

    fn invert_leg_jacobian(&self, jac: &Matrix3<f64>, leg: LegId) -> Matrix3<f64> {
        if self.is_leg_jacobian_well_conditioned(jac) {
            if let Some(inv) = jac.try_inverse() {
                return inv;
            }
        }

        trace!("Leg {:?} Jacobian close to singular, using pseudo-inverse", leg);

        pseudo_inverse3(jac, self.kinematics.singular_value_threshold)
    }

    /// Effective leg length and its derivatives at the given knee angle.
    fn knee_terms(&self, knee_rad: f64) -> KneeTerms {
        let l_up = self.upper_length_m;
        let l_low = self.lower_length_m;
        let (sk, ck) = knee_rad.sin_cos();

        // Rounding can push this slightly negative when fully folded
        let l_eff = (square(l_up) + square(l_low) + 2.0 * l_up * l_low * ck)
            .max(0.0)
            .sqrt();

        if l_eff > MIN_EFFECTIVE_LENGTH_M {
            let dl_eff = -l_up * l_low * sk / l_eff;
            let ddl_eff = (-l_up * l_low * ck - square(dl_eff)) / l_eff;
            KneeTerms {
                l_eff,
                dl_eff,
                ddl_eff,
            }
        }
        else {
            KneeTerms {
                l_eff,
                dl_eff: 0.0,
                ddl_eff: 0.0,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Extract the three joint values of a leg from a 12-joint vector.
pub fn leg_joints(q: &SVector<f64, NUM_MOTORS>, leg: LegId) -> Vector3<f64> {
    let i = leg.first_joint();
    Vector3::new(q[i], q[i + 1], q[i + 2])
}
