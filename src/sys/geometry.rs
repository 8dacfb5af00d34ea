//! Screen geometry in global display coordinates.
//!
//! The origin is the top-left corner of the main display and `y` grows
//! downwards, matching what the accessibility API reports.

use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self { Point { x, y } }

    pub fn distance_to(self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point { Point::new(self.x + rhs.x, self.y + rhs.y) }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point { Point::new(self.x - rhs.x, self.y - rhs.y) }
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self { Size { width, height } }
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn from_parts(origin: Point, size: Size) -> Self { Rect { origin, size } }

    pub fn min_x(&self) -> f64 { self.origin.x }
    pub fn min_y(&self) -> f64 { self.origin.y }
    pub fn max_x(&self) -> f64 { self.origin.x + self.size.width }
    pub fn max_y(&self) -> f64 { self.origin.y + self.size.height }
    pub fn width(&self) -> f64 { self.size.width }
    pub fn height(&self) -> f64 { self.size.height }

    pub fn top_left(&self) -> Point { self.origin }
    pub fn bottom_left(&self) -> Point { Point::new(self.min_x(), self.max_y()) }
    pub fn bottom_right(&self) -> Point { Point::new(self.max_x(), self.max_y()) }

    pub fn center(&self) -> Point {
        Point::new(
            self.origin.x + self.size.width / 2.0,
            self.origin.y + self.size.height / 2.0,
        )
    }

    /// Edges are part of the rectangle.
    pub fn contains(&self, point: Point) -> bool {
        (self.min_x()..=self.max_x()).contains(&point.x)
            && (self.min_y()..=self.max_y()).contains(&point.y)
    }

    pub fn intersection(&self, other: &Rect) -> Rect {
        let min_x = f64::max(self.min_x(), other.min_x());
        let max_x = f64::min(self.max_x(), other.max_x());
        let min_y = f64::max(self.min_y(), other.min_y());
        let max_y = f64::min(self.max_y(), other.max_y());
        Rect::new(min_x, min_y, f64::max(max_x - min_x, 0.), f64::max(max_y - min_y, 0.))
    }

    pub fn area(&self) -> f64 { self.size.width * self.size.height }

    /// Shrinks the rectangle by the given amount on each side.
    pub fn inset(&self, top: f64, left: f64, bottom: f64, right: f64) -> Rect {
        Rect::new(
            self.min_x() + left,
            self.min_y() + top,
            f64::max(self.width() - left - right, 0.),
            f64::max(self.height() - top - bottom, 0.),
        )
    }
}

pub trait Round {
    fn round(&self) -> Self;
}

impl Round for Point {
    fn round(&self) -> Self { Point::new(self.x.round(), self.y.round()) }
}

impl Round for Size {
    fn round(&self) -> Self { Size::new(self.width.round(), self.height.round()) }
}

impl Round for Rect {
    /// Rounds both corners, so the size is derived from the rounded edges.
    fn round(&self) -> Self {
        let min = Point::new(self.min_x(), self.min_y()).round();
        let max = Point::new(self.max_x(), self.max_y()).round();
        Rect::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }
}

pub trait IsWithin {
    fn is_within(&self, how_much: f64, other: Self) -> bool;
}

impl IsWithin for f64 {
    fn is_within(&self, how_much: f64, other: Self) -> bool { (self - other).abs() < how_much }
}

impl IsWithin for Point {
    fn is_within(&self, how_much: f64, other: Self) -> bool {
        self.x.is_within(how_much, other.x) && self.y.is_within(how_much, other.y)
    }
}

impl IsWithin for Size {
    fn is_within(&self, how_much: f64, other: Self) -> bool {
        self.width.is_within(how_much, other.width) && self.height.is_within(how_much, other.height)
    }
}

impl IsWithin for Rect {
    fn is_within(&self, how_much: f64, other: Self) -> bool {
        self.origin.is_within(how_much, other.origin) && self.size.is_within(how_much, other.size)
    }
}

pub trait SameAs: IsWithin + Sized {
    fn same_as(&self, other: Self) -> bool { self.is_within(0.1, other) }
}

impl SameAs for Point {}
impl SameAs for Size {}
impl SameAs for Rect {}
