use crate::error::Error;
use ordered_float::NotNan;
use std::ops::{Add, Sub};

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Point {
    x: f32,
    y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Result<Self, Error> {
        Ok(Self {
            x: NotNan::new(x)
                .map_err(|e| Error::ConstructNotNan(e, x))?
                .into_inner(),
            y: NotNan::new(y)
                .map_err(|e| Error::ConstructNotNan(e, y))?
                .into_inner(),
        })
    }

    pub fn squared_distance(self, other: Self) -> f32 {
        let delta = other - self;
        delta.dot(delta)
    }

    /// Euclidean distance between two points.
    pub fn distance(self, other: Self) -> f32 {
        self.squared_distance(other).sqrt()
    }

    #[inline]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// z component of the 2-D cross product.
    #[inline]
    pub fn cross(self, other: Self) -> f32 {
        self.x * other.y - self.y * other.x
    }

    #[inline]
    pub fn norm(self) -> f32 {
        self.dot(self).sqrt()
    }

    #[inline]
    pub fn x(self) -> f32 {
        self.x
    }

    #[inline]
    pub fn y(self) -> f32 {
        self.y
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::Output {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::Output {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Point;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn xy_points() {
        let a = Point::new(0.5, 0.5).unwrap();
        let b = Point::new(1.0, 1.0).unwrap();
        assert_eq!(a.squared_distance(b), 0.5);
    }

    #[test]
    fn distance_is_euclidean() {
        let a = Point::new(0.0, 0.0).unwrap();
        let b = Point::new(3.0, 4.0).unwrap();
        assert_approx_eq!(a.distance(b), 5.0);
    }

    #[test]
    fn cross_sign_follows_winding() {
        let x = Point::new(1.0, 0.0).unwrap();
        let y = Point::new(0.0, 1.0).unwrap();
        assert_approx_eq!(x.cross(y), 1.0);
        assert_approx_eq!(y.cross(x), -1.0);
    }

    #[test]
    fn nan_is_rejected() {
        assert!(Point::new(f32::NAN, 0.0).is_err());
    }
}
