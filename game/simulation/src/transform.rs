use common::*;

use crate::ecs::*;
use crate::spatial::Aabb;

/// Position and heading in continuous world units (§3 "Transform").
#[derive(Debug, Clone, Copy, Component, EcsComponent)]
#[storage(VecStorage)]
#[name("transform")]
pub struct TransformComponent {
    pub x: f32,
    pub y: f32,

    /// Radians, `0` pointing along +x. Optional in spec; `None` means "no facing".
    pub heading: Option<f32>,
}

impl TransformComponent {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            heading: None,
        }
    }

    pub fn position(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }

    pub fn set_position(&mut self, p: Point2) {
        self.x = p.x;
        self.y = p.y;
    }

    pub fn distance2(&self, other: Point2) -> f32 {
        (self.x - other.x).powi(2) + (self.y - other.y).powi(2)
    }
}

/// Linear velocity and the limits movement is clamped to (§3 "Kinematics").
#[derive(Debug, Clone, Copy, Component, EcsComponent)]
#[storage(VecStorage)]
#[name("kinematics")]
pub struct KinematicsComponent {
    pub vx: f32,
    pub vy: f32,
    pub max_speed: f32,
    pub accel: f32,
}

impl KinematicsComponent {
    pub fn new(max_speed: f32, accel: f32) -> Self {
        Self {
            vx: 0.0,
            vy: 0.0,
            max_speed,
            accel,
        }
    }

    pub fn velocity(&self) -> Vector2 {
        Vector2::new(self.vx, self.vy)
    }

    pub fn set_velocity(&mut self, v: Vector2) {
        self.vx = v.x;
        self.vy = v.y;
    }
}

/// A circle or axis-aligned half-extent collision shape (§3 "Collider").
#[derive(Debug, Clone, Copy, Component, EcsComponent)]
#[storage(VecStorage)]
#[name("collider")]
pub enum ColliderComponent {
    Circle { radius: f32 },
    Aabb { half_extent_x: f32, half_extent_y: f32 },
}

impl ColliderComponent {
    pub fn circle(radius: f32) -> Self {
        Self::Circle { radius }
    }

    pub fn aabb(half_extent_x: f32, half_extent_y: f32) -> Self {
        Self::Aabb {
            half_extent_x,
            half_extent_y,
        }
    }

    /// Bounding radius used for separation/steering calculations, regardless of underlying shape.
    pub fn bounding_radius(&self) -> f32 {
        match *self {
            ColliderComponent::Circle { radius } => radius,
            ColliderComponent::Aabb {
                half_extent_x,
                half_extent_y,
            } => half_extent_x.max(half_extent_y),
        }
    }

    /// Derives the AABB used to key this entity in the spatial index (§4.3).
    pub fn derive_aabb(&self, centre: Point2) -> Aabb {
        match *self {
            ColliderComponent::Circle { radius } => Aabb::from_radius(centre, radius),
            ColliderComponent::Aabb {
                half_extent_x,
                half_extent_y,
            } => Aabb::new(
                centre.x - half_extent_x,
                centre.y - half_extent_y,
                centre.x + half_extent_x,
                centre.y + half_extent_y,
            ),
        }
    }

    /// Point-in-shape test, used by hit-testing (§4.6).
    pub fn contains_point(&self, centre: Point2, point: Point2) -> bool {
        match *self {
            ColliderComponent::Circle { radius } => {
                (centre.x - point.x).powi(2) + (centre.y - point.y).powi(2) <= radius * radius
            }
            ColliderComponent::Aabb {
                half_extent_x,
                half_extent_y,
            } => {
                (point.x - centre.x).abs() <= half_extent_x
                    && (point.y - centre.y).abs() <= half_extent_y
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circle_contains_point() {
        let c = ColliderComponent::circle(2.0);
        assert!(c.contains_point(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)));
        assert!(!c.contains_point(Point2::new(0.0, 0.0), Point2::new(2.0, 2.0)));
    }

    #[test]
    fn aabb_collider_derives_correct_box() {
        let c = ColliderComponent::aabb(1.0, 2.0);
        let aabb = c.derive_aabb(Point2::new(5.0, 5.0));
        assert_eq!(aabb.min_x, 4.0);
        assert_eq!(aabb.max_y, 7.0);
    }
}
