//! # Constraints
//!
//! Fixed, hinge and slider joints between two bodies, with optional
//! motors. The world keeps a registry of every constraint so it can tell
//! whether a body is constrained and drop constraints together with
//! their bodies.

use glam::{Quat, Vec3};
use rapier3d::dynamics::{
    FixedJointBuilder, GenericJoint, ImpulseJointHandle, JointAxis, PrismaticJointBuilder,
    RevoluteJointBuilder,
};
use rapier3d::na::Unit;
use serde::{Deserialize, Serialize};

use crate::body::BodyHandle;
use crate::convert::{from_isometry, to_point, to_vector};
use crate::error::{PhysicsError, PhysicsResult};
use crate::system::PhysicsSystem;

/// Default gain of hinge and slider velocity motors.
pub const DEFAULT_MOTOR_VELOCITY_GAIN: f32 = 100.0;

/// Hinge (revolute) parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HingeDesc {
    /// Rotation axis, shared by both bodies' local frames.
    pub axis: Vec3,
    /// Angle limits in radians, if any.
    pub limits: Option<[f32; 2]>,
    /// Torque resisting free rotation. Zero for a frictionless hinge.
    pub max_friction_torque: f32,
    /// Torque cap for the motor.
    pub max_motor_torque: f32,
    /// Gain of the velocity motor. Higher values reach the target speed
    /// faster, up to `max_motor_torque`.
    pub motor_velocity_gain: f32,
    /// Position motor stiffness.
    pub motor_stiffness: f32,
    /// Position motor damping.
    pub motor_damping: f32,
}

impl Default for HingeDesc {
    fn default() -> Self {
        Self {
            axis: Vec3::Y,
            limits: None,
            max_friction_torque: 0.0,
            max_motor_torque: 1.0e4,
            motor_velocity_gain: DEFAULT_MOTOR_VELOCITY_GAIN,
            motor_stiffness: 100.0,
            motor_damping: 20.0,
        }
    }
}

/// Slider (prismatic) parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SliderDesc {
    /// Slide axis, shared by both bodies' local frames.
    pub axis: Vec3,
    /// Travel limits, if any.
    pub limits: Option<[f32; 2]>,
    /// Force resisting free sliding.
    pub max_friction_force: f32,
    /// Force cap for the motor.
    pub max_motor_force: f32,
    /// Gain of the velocity motor, capped by `max_motor_force`.
    pub motor_velocity_gain: f32,
    /// Position motor stiffness.
    pub motor_stiffness: f32,
    /// Position motor damping.
    pub motor_damping: f32,
}

impl Default for SliderDesc {
    fn default() -> Self {
        Self {
            axis: Vec3::X,
            limits: None,
            max_friction_force: 0.0,
            max_motor_force: 1.0e4,
            motor_velocity_gain: DEFAULT_MOTOR_VELOCITY_GAIN,
            motor_stiffness: 100.0,
            motor_damping: 20.0,
        }
    }
}

/// Joint type and its parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Welds the two bodies together.
    Fixed,
    /// Rotation about one axis.
    Hinge(HingeDesc),
    /// Translation along one axis.
    Slider(SliderDesc),
}

/// Everything needed to create a constraint.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstraintDesc {
    /// Joint type.
    pub kind: ConstraintKind,
    /// Anchor in body A's local space.
    pub anchor_a: Vec3,
    /// Anchor in body B's local space.
    pub anchor_b: Vec3,
}

/// Motor mode of a hinge or slider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotorState {
    /// Only friction acts on the free axis.
    #[default]
    Off,
    /// Drive towards a target velocity.
    Velocity,
    /// Drive towards a target angle or offset.
    Position,
}

/// Handle to a constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ConstraintHandle(ImpulseJointHandle);

#[derive(Clone, Copy, Debug)]
struct Motor {
    axis: JointAxis,
    state: MotorState,
    target_velocity: f32,
    target_position: f32,
    friction: f32,
    max_force: f32,
    velocity_gain: f32,
    stiffness: f32,
    damping: f32,
}

impl Motor {
    fn apply(&self, joint: &mut GenericJoint) {
        match self.state {
            MotorState::Off if self.friction > 0.0 => {
                joint
                    .set_motor_velocity(self.axis, 0.0, self.velocity_gain)
                    .set_motor_max_force(self.axis, self.friction);
            }
            MotorState::Off => {
                joint.set_motor(self.axis, 0.0, 0.0, 0.0, 0.0);
            }
            MotorState::Velocity => {
                joint
                    .set_motor_velocity(self.axis, self.target_velocity, self.velocity_gain)
                    .set_motor_max_force(self.axis, self.max_force);
            }
            MotorState::Position => {
                joint
                    .set_motor_position(self.axis, self.target_position, self.stiffness, self.damping)
                    .set_motor_max_force(self.axis, self.max_force);
            }
        }
    }
}

#[derive(Clone, Debug)]
struct ConstraintRecord {
    handle: ImpulseJointHandle,
    body_a: BodyHandle,
    body_b: BodyHandle,
    desc: ConstraintDesc,
    motor: Option<Motor>,
    /// Relative rotation of B in A's frame at creation.
    reference: Quat,
    enabled: bool,
}

/// Every constraint alive in the world.
#[derive(Debug, Default)]
pub(crate) struct ConstraintRegistry {
    records: Vec<ConstraintRecord>,
}

impl ConstraintRegistry {
    fn find(&self, handle: ConstraintHandle) -> Option<&ConstraintRecord> {
        self.records.iter().find(|r| r.handle == handle.0)
    }

    fn find_mut(&mut self, handle: ConstraintHandle) -> Option<&mut ConstraintRecord> {
        self.records.iter_mut().find(|r| r.handle == handle.0)
    }

    fn involves_enabled(&self, body: BodyHandle) -> bool {
        self.records
            .iter()
            .any(|r| r.enabled && (r.body_a == body || r.body_b == body))
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

fn unit_axis(axis: Vec3) -> PhysicsResult<Unit<rapier3d::math::Vector<f32>>> {
    let axis = axis
        .try_normalize()
        .ok_or_else(|| PhysicsError::InvalidConstraint("axis must be non-zero".into()))?;
    Ok(Unit::new_normalize(to_vector(axis)))
}

/// Twist of `rotation` about `axis`, in (-pi, pi].
fn twist_angle(rotation: Quat, axis: Vec3) -> f32 {
    let projection = Vec3::new(rotation.x, rotation.y, rotation.z).dot(axis);
    let angle = 2.0 * projection.atan2(rotation.w);
    if angle > std::f32::consts::PI {
        angle - std::f32::consts::TAU
    } else if angle <= -std::f32::consts::PI {
        angle + std::f32::consts::TAU
    } else {
        angle
    }
}

impl PhysicsSystem {
    /// Creates a constraint between two bodies and adds it to the world.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::UnknownBody`] for stale handles,
    /// [`PhysicsError::InvalidConstraint`] when both handles are the same
    /// body or an axis is zero.
    pub fn create_constraint(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        desc: &ConstraintDesc,
    ) -> PhysicsResult<ConstraintHandle> {
        if body_a == body_b {
            return Err(PhysicsError::InvalidConstraint(
                "a body cannot be constrained to itself".into(),
            ));
        }
        let (Some(pose_a), Some(pose_b)) = (self.body_pose(body_a), self.body_pose(body_b)) else {
            return Err(PhysicsError::UnknownBody);
        };

        let anchor_a = to_point(desc.anchor_a);
        let anchor_b = to_point(desc.anchor_b);
        let (mut joint, motor): (GenericJoint, Option<Motor>) = match desc.kind {
            ConstraintKind::Fixed => (
                FixedJointBuilder::new()
                    .local_anchor1(anchor_a)
                    .local_anchor2(anchor_b)
                    .build()
                    .into(),
                None,
            ),
            ConstraintKind::Hinge(hinge) => {
                let mut builder = RevoluteJointBuilder::new(unit_axis(hinge.axis)?)
                    .local_anchor1(anchor_a)
                    .local_anchor2(anchor_b);
                if let Some(limits) = hinge.limits {
                    builder = builder.limits(limits);
                }
                let motor = Motor {
                    axis: JointAxis::AngX,
                    state: MotorState::Off,
                    target_velocity: 0.0,
                    target_position: 0.0,
                    friction: hinge.max_friction_torque,
                    max_force: hinge.max_motor_torque,
                    velocity_gain: hinge.motor_velocity_gain,
                    stiffness: hinge.motor_stiffness,
                    damping: hinge.motor_damping,
                };
                (builder.build().into(), Some(motor))
            }
            ConstraintKind::Slider(slider) => {
                let mut builder = PrismaticJointBuilder::new(unit_axis(slider.axis)?)
                    .local_anchor1(anchor_a)
                    .local_anchor2(anchor_b);
                if let Some(limits) = slider.limits {
                    builder = builder.limits(limits);
                }
                let motor = Motor {
                    axis: JointAxis::LinX,
                    state: MotorState::Off,
                    target_velocity: 0.0,
                    target_position: 0.0,
                    friction: slider.max_friction_force,
                    max_force: slider.max_motor_force,
                    velocity_gain: slider.motor_velocity_gain,
                    stiffness: slider.motor_stiffness,
                    damping: slider.motor_damping,
                };
                (builder.build().into(), Some(motor))
            }
        };
        if let Some(motor) = &motor {
            motor.apply(&mut joint);
        }

        let handle = self.impulse_joints.insert(body_a.0, body_b.0, joint, true);
        self.constraints.records.push(ConstraintRecord {
            handle,
            body_a,
            body_b,
            desc: *desc,
            motor,
            reference: pose_a.1.inverse() * pose_b.1,
            enabled: true,
        });
        tracing::debug!(kind = ?desc.kind, "constraint created");
        Ok(ConstraintHandle(handle))
    }

    /// Removes a constraint.
    pub fn remove_constraint(&mut self, handle: ConstraintHandle) -> bool {
        let before = self.constraints.records.len();
        self.constraints.records.retain(|r| r.handle != handle.0);
        if self.constraints.records.len() == before {
            return false;
        }
        self.impulse_joints.remove(handle.0, true);
        true
    }

    /// Removes every constraint that references `body`.
    ///
    /// # Returns
    ///
    /// Number of constraints removed.
    pub fn remove_constraints_for_body(&mut self, body: BodyHandle) -> usize {
        let (doomed, kept): (Vec<_>, Vec<_>) = self
            .constraints
            .records
            .drain(..)
            .partition(|r| r.body_a == body || r.body_b == body);
        self.constraints.records = kept;
        for record in &doomed {
            self.impulse_joints.remove(record.handle, true);
        }
        doomed.len()
    }

    /// Checks if any enabled constraint references `body`.
    #[must_use]
    pub fn body_has_constraint(&self, body: BodyHandle) -> bool {
        self.constraints.involves_enabled(body)
    }

    /// Number of live constraints.
    #[must_use]
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Enables or disables a constraint without removing it.
    pub fn set_constraint_enabled(&mut self, handle: ConstraintHandle, enabled: bool) -> bool {
        let Some(record) = self.constraints.find_mut(handle) else {
            return false;
        };
        record.enabled = enabled;
        let (a, b) = (record.body_a, record.body_b);
        let Some(joint) = self.impulse_joints.get_mut(handle.0) else {
            return false;
        };
        joint.data.set_enabled(enabled);
        self.wake_pair(a, b);
        true
    }

    /// Whether a constraint is enabled.
    #[must_use]
    pub fn is_constraint_enabled(&self, handle: ConstraintHandle) -> bool {
        self.constraints.find(handle).is_some_and(|r| r.enabled)
    }

    /// Switches the motor mode of a hinge or slider.
    pub fn set_motor_state(&mut self, handle: ConstraintHandle, state: MotorState) -> bool {
        self.update_motor(handle, |motor| motor.state = state)
    }

    /// Sets the velocity target (rad/s for hinges, m/s for sliders).
    pub fn set_motor_target_velocity(&mut self, handle: ConstraintHandle, velocity: f32) -> bool {
        self.update_motor(handle, |motor| motor.target_velocity = velocity)
    }

    /// Sets the position target (radians for hinges, metres for sliders).
    pub fn set_motor_target_position(&mut self, handle: ConstraintHandle, position: f32) -> bool {
        self.update_motor(handle, |motor| motor.target_position = position)
    }

    /// Current motor mode.
    #[must_use]
    pub fn motor_state(&self, handle: ConstraintHandle) -> Option<MotorState> {
        self.constraints.find(handle)?.motor.map(|m| m.state)
    }

    /// Current hinge angle or slider offset, measured from the pose the
    /// bodies had when the constraint was created.
    #[must_use]
    pub fn constraint_position(&self, handle: ConstraintHandle) -> Option<f32> {
        let record = self.constraints.find(handle)?;
        let body_a = self.bodies.get(record.body_a.0)?;
        let body_b = self.bodies.get(record.body_b.0)?;
        let (pos_a, rot_a) = from_isometry(body_a.position());
        let (pos_b, rot_b) = from_isometry(body_b.position());

        match record.desc.kind {
            ConstraintKind::Fixed => None,
            ConstraintKind::Hinge(hinge) => {
                let relative = record.reference.inverse() * (rot_a.inverse() * rot_b);
                Some(twist_angle(relative, hinge.axis.normalize_or_zero()))
            }
            ConstraintKind::Slider(slider) => {
                let world_a = pos_a + rot_a * record.desc.anchor_a;
                let world_b = pos_b + rot_b * record.desc.anchor_b;
                let axis = rot_a * slider.axis.normalize_or_zero();
                Some((world_b - world_a).dot(axis))
            }
        }
    }

    fn update_motor(&mut self, handle: ConstraintHandle, change: impl FnOnce(&mut Motor)) -> bool {
        let Some(record) = self.constraints.find_mut(handle) else {
            return false;
        };
        let Some(motor) = record.motor.as_mut() else {
            return false;
        };
        change(motor);
        let motor = *motor;
        let (a, b) = (record.body_a, record.body_b);
        let Some(joint) = self.impulse_joints.get_mut(handle.0) else {
            return false;
        };
        motor.apply(&mut joint.data);
        self.wake_pair(a, b);
        true
    }

    fn wake_pair(&mut self, a: BodyHandle, b: BodyHandle) {
        for handle in [a, b] {
            if let Some(body) = self.bodies.get_mut(handle.0) {
                body.wake_up(true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_twist_angle_about_axis() {
        let rotation = Quat::from_rotation_y(FRAC_PI_2);
        assert!((twist_angle(rotation, Vec3::Y) - FRAC_PI_2).abs() < 1e-5);
        assert!((twist_angle(rotation.inverse(), Vec3::Y) + FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_twist_ignores_swing() {
        let rotation = Quat::from_rotation_x(0.5);
        assert!(twist_angle(rotation, Vec3::Y).abs() < 1e-5);
    }

    #[test]
    fn test_zero_axis_rejected() {
        assert!(unit_axis(Vec3::ZERO).is_err());
        assert!(unit_axis(Vec3::Z).is_ok());
    }

    #[test]
    fn test_hinge_desc_defaults() {
        let hinge = HingeDesc::default();
        assert_eq!(hinge.axis, Vec3::Y);
        assert!(hinge.limits.is_none());
        assert!(hinge.max_friction_torque.abs() < f32::EPSILON);
    }
}
