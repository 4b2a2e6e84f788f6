pub mod graphics;
pub mod property;
pub mod tree;

pub use graphics::{
    BoundingBox, Colour, CoordinateSet, Dash, Font, PlotCommand, Point, Stroke,
};
pub use property::{PropertyMapExt, PropertyValue};
pub use tree::{AttributeValue, Tree, TreeCollection, TreeNode};
