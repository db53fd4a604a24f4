//! glam <-> nalgebra conversions. The public API speaks glam; the engine
//! speaks nalgebra.

use glam::{Quat, Vec3};
use rapier3d::math::{Isometry, Point, Real, Rotation, Vector};
use rapier3d::na::{Quaternion, Translation3, UnitQuaternion};

#[inline]
pub(crate) fn to_vector(v: Vec3) -> Vector<Real> {
    Vector::new(v.x, v.y, v.z)
}

#[inline]
pub(crate) fn to_point(v: Vec3) -> Point<Real> {
    Point::new(v.x, v.y, v.z)
}

#[inline]
pub(crate) fn from_vector(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

#[inline]
pub(crate) fn from_point(p: &Point<Real>) -> Vec3 {
    Vec3::new(p.x, p.y, p.z)
}

#[inline]
pub(crate) fn to_rotation(q: Quat) -> Rotation<Real> {
    UnitQuaternion::new_normalize(Quaternion::new(q.w, q.x, q.y, q.z))
}

#[inline]
pub(crate) fn from_rotation(r: &Rotation<Real>) -> Quat {
    let c = r.quaternion().coords;
    Quat::from_xyzw(c.x, c.y, c.z, c.w)
}

#[inline]
pub(crate) fn to_isometry(position: Vec3, rotation: Quat) -> Isometry<Real> {
    Isometry::from_parts(Translation3::from(to_vector(position)), to_rotation(rotation))
}

#[inline]
pub(crate) fn from_isometry(iso: &Isometry<Real>) -> (Vec3, Quat) {
    (
        from_vector(&iso.translation.vector),
        from_rotation(&iso.rotation),
    )
}
