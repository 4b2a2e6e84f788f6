use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use ordered_float::OrderedFloat;
use std::hash::{Hash, Hasher};

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub struct Point {
    pub x: OrderedFloat<f64>,
    pub y: OrderedFloat<f64>,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: OrderedFloat(x),
            y: OrderedFloat(y),
        }
    }

    pub fn x(&self) -> f64 {
        self.x.into_inner()
    }

    pub fn y(&self) -> f64 {
        self.y.into_inner()
    }

    pub fn offset_by(&self, other: Point) -> Point {
        Point::new(self.x() + other.x(), self.y() + other.y())
    }
}

impl Hash for Point {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.hash(state);
        self.y.hash(state);
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Colour {
    pub const BLACK: Colour = Colour {
        r: 0,
        g: 0,
        b: 0,
        a: 255,
    };

    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Dash pattern for stroked geometry: units drawn, units skipped, phase.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct Dash {
    pub units_on: OrderedFloat<f64>,
    pub units_off: OrderedFloat<f64>,
    pub phase: OrderedFloat<f64>,
}

impl Dash {
    pub fn new(units_on: f64, units_off: f64, phase: f64) -> Self {
        Self {
            units_on: OrderedFloat(units_on),
            units_off: OrderedFloat(units_off),
            phase: OrderedFloat(phase),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Hash)]
pub struct Font {
    pub family: String,
    pub size: OrderedFloat<f64>,
}

impl Font {
    pub fn new(family: &str, size: f64) -> Self {
        Self {
            family: family.to_string(),
            size: OrderedFloat(size),
        }
    }

    pub fn size(&self) -> f64 {
        self.size.into_inner()
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Stroke {
    pub colour: Colour,
    pub width: f64,
    pub dash: Option<Dash>,
}

impl Stroke {
    pub fn solid(colour: Colour, width: f64) -> Self {
        Self {
            colour,
            width,
            dash: None,
        }
    }
}

/// Axis-aligned extent of emitted geometry.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub const EMPTY: BoundingBox = BoundingBox {
        min_x: f64::INFINITY,
        min_y: f64::INFINITY,
        max_x: f64::NEG_INFINITY,
        max_y: f64::NEG_INFINITY,
    };

    pub fn around(points: impl IntoIterator<Item = Point>) -> Self {
        let mut bounds = Self::EMPTY;
        for point in points {
            bounds.include(point);
        }
        bounds
    }

    pub fn include(&mut self, point: Point) {
        self.min_x = self.min_x.min(point.x());
        self.min_y = self.min_y.min(point.y());
        self.max_x = self.max_x.max(point.x());
        self.max_y = self.max_y.max(point.y());
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }
}

/// One plotting position per node id, produced by the coordinate stage.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct CoordinateSet {
    points: HashMap<usize, Point>,
}

impl CoordinateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: usize, point: Point) {
        self.points.insert(node, point);
    }

    pub fn get(&self, node: usize) -> Option<Point> {
        self.points.get(&node).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, Point)> + '_ {
        self.points.iter().map(|(node, point)| (*node, *point))
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::around(self.points.values().copied())
    }
}

/// One recorded drawing primitive. Rendering backends replay these in order.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub enum PlotCommand {
    Line {
        from: Point,
        to: Point,
        stroke: Stroke,
    },
    Circle {
        centre: Point,
        radius: f64,
        fill: Colour,
    },
    Text {
        anchor: Point,
        text: String,
        font: Font,
        colour: Colour,
    },
}
