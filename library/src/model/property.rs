use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use ordered_float::OrderedFloat;
use std::hash::{Hash, Hasher};

use crate::model::graphics::{Colour, Dash, Font, Point};

/// A single parameter value held by a stage's parameter store.
///
/// The variant set is closed: every control a module can declare maps to
/// exactly one of these.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub enum PropertyValue {
    Number(OrderedFloat<f64>),
    Text(String),
    Boolean(bool),
    /// Index into the options of a dropdown control.
    Choice(usize),
    Point(Point),
    Colour(Colour),
    Dash(Dash),
    Font(Font),
    /// Leaf names addressing a set of nodes in the current tree.
    NodeSet(Vec<String>),
    SourceCode(String),
    /// Name of an attachment in the session cache, if one is selected.
    AttachmentRef(Option<String>),
}

impl Hash for PropertyValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            PropertyValue::Number(n) => n.hash(state),
            PropertyValue::Text(s) => s.hash(state),
            PropertyValue::Boolean(b) => b.hash(state),
            PropertyValue::Choice(i) => i.hash(state),
            PropertyValue::Point(p) => p.hash(state),
            PropertyValue::Colour(c) => c.hash(state),
            PropertyValue::Dash(d) => d.hash(state),
            PropertyValue::Font(f) => f.hash(state),
            PropertyValue::NodeSet(names) => names.hash(state),
            PropertyValue::SourceCode(s) => s.hash(state),
            PropertyValue::AttachmentRef(name) => name.hash(state),
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Number(OrderedFloat(value))
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl PropertyValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(n.into_inner()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_choice(&self) -> Option<usize> {
        match self {
            PropertyValue::Choice(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_point(&self) -> Option<Point> {
        match self {
            PropertyValue::Point(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_colour(&self) -> Option<Colour> {
        match self {
            PropertyValue::Colour(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_dash(&self) -> Option<Dash> {
        match self {
            PropertyValue::Dash(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_font(&self) -> Option<&Font> {
        match self {
            PropertyValue::Font(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_node_set(&self) -> Option<&[String]> {
        match self {
            PropertyValue::NodeSet(names) => Some(names.as_slice()),
            _ => None,
        }
    }

    pub fn as_source_code(&self) -> Option<&str> {
        match self {
            PropertyValue::SourceCode(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_attachment(&self) -> Option<&str> {
        match self {
            PropertyValue::AttachmentRef(Some(name)) => Some(name.as_str()),
            _ => None,
        }
    }
}

/// Convenience accessors over a raw value map, for module implementations.
pub trait PropertyMapExt {
    fn get_f64(&self, key: &str) -> Option<f64>;
    fn get_bool(&self, key: &str) -> Option<bool>;
    fn get_text(&self, key: &str) -> Option<&str>;
    fn get_choice(&self, key: &str) -> Option<usize>;
}

impl PropertyMapExt for HashMap<String, PropertyValue> {
    fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(PropertyValue::as_number)
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(PropertyValue::as_bool)
    }

    fn get_text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PropertyValue::as_text)
    }

    fn get_choice(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(PropertyValue::as_choice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(value: &PropertyValue) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn typed_accessors_reject_other_variants() {
        let number = PropertyValue::from(2.5);
        assert_eq!(number.as_number(), Some(2.5));
        assert_eq!(number.as_text(), None);
        assert_eq!(number.as_choice(), None);

        let choice = PropertyValue::Choice(3);
        assert_eq!(choice.as_choice(), Some(3));
        assert_eq!(choice.as_number(), None);
    }

    #[test]
    fn attachment_accessor_skips_empty_reference() {
        assert_eq!(PropertyValue::AttachmentRef(None).as_attachment(), None);
        assert_eq!(
            PropertyValue::AttachmentRef(Some("alignment".into())).as_attachment(),
            Some("alignment")
        );
    }

    #[test]
    fn equal_values_hash_equal() {
        let a = PropertyValue::NodeSet(vec!["A".into(), "B".into()]);
        let b = PropertyValue::NodeSet(vec!["A".into(), "B".into()]);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn discriminant_participates_in_hash() {
        // Choice(0) と Number(0.0) が衝突しないこと
        let choice = PropertyValue::Choice(0);
        let number = PropertyValue::from(0.0);
        assert_ne!(choice, number);
        assert_ne!(hash_of(&choice), hash_of(&number));
    }
}
