//! JSON encoding of ground-truth cells
//!
//! Cells arrive as loosely-typed nested arrays. Decoding first captures the raw
//! structure and then classifies it:
//!
//! * `null`, `[]`, strings, booleans and objects are [`CellValue::Empty`]
//! * a bare number is a 0-D [`NumericArray`]
//! * an array of numbers is a 1-D [`NumericArray`]
//! * an array of equally long arrays of numbers is a 2-D [`NumericArray`]
//! * any other array is a [`CellValue::Container`] of its classified elements

use serde::de::{self, Deserialize, Deserializer, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::fmt;

use crate::types::{CellValue, NumericArray};

// Raw JSON structure before classification
#[derive(Debug)]
enum RawNode {
    Number(f64),
    Array(Vec<RawNode>),
    Other,
}

impl<'de> Deserialize<'de> for RawNode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RawNodeVisitor;

        impl<'de> Visitor<'de> for RawNodeVisitor {
            type Value = RawNode;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a number, an array or null")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<RawNode, E> {
                Ok(RawNode::Number(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<RawNode, E> {
                Ok(RawNode::Number(v as f64))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<RawNode, E> {
                Ok(RawNode::Number(v as f64))
            }

            fn visit_bool<E: de::Error>(self, _: bool) -> Result<RawNode, E> {
                Ok(RawNode::Other)
            }

            fn visit_str<E: de::Error>(self, _: &str) -> Result<RawNode, E> {
                Ok(RawNode::Other)
            }

            fn visit_unit<E: de::Error>(self) -> Result<RawNode, E> {
                Ok(RawNode::Other)
            }

            fn visit_none<E: de::Error>(self) -> Result<RawNode, E> {
                Ok(RawNode::Other)
            }

            fn visit_some<D>(self, deserializer: D) -> Result<RawNode, D::Error>
            where
                D: Deserializer<'de>,
            {
                RawNode::deserialize(deserializer)
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<RawNode, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(item) = seq.next_element()? {
                    items.push(item);
                }
                Ok(RawNode::Array(items))
            }

            fn visit_map<A>(self, mut map: A) -> Result<RawNode, A::Error>
            where
                A: de::MapAccess<'de>,
            {
                // Skip unknown objects
                while map
                    .next_entry::<de::IgnoredAny, de::IgnoredAny>()?
                    .is_some()
                {}
                Ok(RawNode::Other)
            }
        }

        deserializer.deserialize_any(RawNodeVisitor)
    }
}

fn as_number(node: &RawNode) -> Option<f64> {
    match node {
        RawNode::Number(v) => Some(*v),
        _ => None,
    }
}

fn as_numeric_row(node: &RawNode) -> Option<Vec<f64>> {
    match node {
        RawNode::Array(items) => items.iter().map(as_number).collect(),
        _ => None,
    }
}

// Interpret the elements of an array as a dense 1-D or 2-D numeric array
fn numeric_array(items: &[RawNode]) -> Option<NumericArray> {
    if let Some(values) = items.iter().map(as_number).collect::<Option<Vec<_>>>() {
        return Some(NumericArray::vector(values));
    }

    let rows = items
        .iter()
        .map(as_numeric_row)
        .collect::<Option<Vec<_>>>()?;
    let cols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|row| row.len() != cols) {
        return None;
    }
    NumericArray::new(vec![rows.len(), cols], rows.concat())
}

// Release nested arrays through a heap stack so very deep input cannot
// overflow the call stack on drop
impl Drop for RawNode {
    fn drop(&mut self) {
        let RawNode::Array(items) = self else {
            return;
        };
        let mut pending = std::mem::take(items);
        while let Some(mut node) = pending.pop() {
            if let RawNode::Array(children) = &mut node {
                pending.append(children);
            }
        }
    }
}

// Result of classifying one raw node without looking at its children
enum Step {
    Leaf(CellValue),
    Nested(Vec<RawNode>),
}

fn classify_node(mut node: RawNode) -> Step {
    match &mut node {
        RawNode::Other => Step::Leaf(CellValue::Empty),
        RawNode::Number(v) => Step::Leaf(CellValue::Polygon(NumericArray::scalar(*v))),
        RawNode::Array(items) if items.is_empty() => Step::Leaf(CellValue::Empty),
        RawNode::Array(items) => match numeric_array(items) {
            Some(array) => Step::Leaf(CellValue::Polygon(array)),
            None => Step::Nested(std::mem::take(items)),
        },
    }
}

// Containers are built bottom-up with an explicit stack of partially
// classified arrays, so nesting depth is not limited by the call stack.
fn classify(node: RawNode) -> CellValue {
    let children = match classify_node(node) {
        Step::Leaf(cell) => return cell,
        Step::Nested(children) => children,
    };

    let mut stack = vec![(Vec::with_capacity(children.len()), children.into_iter())];
    loop {
        let Some((_, pending)) = stack.last_mut() else {
            return CellValue::Empty;
        };
        match pending.next() {
            Some(child) => match classify_node(child) {
                Step::Leaf(cell) => {
                    if let Some((cells, _)) = stack.last_mut() {
                        cells.push(cell);
                    }
                }
                Step::Nested(grandchildren) => stack.push((
                    Vec::with_capacity(grandchildren.len()),
                    grandchildren.into_iter(),
                )),
            },
            None => {
                let Some((cells, _)) = stack.pop() else {
                    return CellValue::Empty;
                };
                let container = CellValue::Container(cells);
                match stack.last_mut() {
                    Some((parent, _)) => parent.push(container),
                    None => return container,
                }
            }
        }
    }
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        RawNode::deserialize(deserializer).map(classify)
    }
}

// Row-major view over part of a numeric array
struct ArrayView<'a> {
    shape: &'a [usize],
    values: &'a [f64],
}

impl Serialize for ArrayView<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let Some((&len, inner_shape)) = self.shape.split_first() else {
            return serializer.serialize_f64(self.values.first().copied().unwrap_or_default());
        };

        let stride = inner_shape.iter().product::<usize>();
        let mut seq = serializer.serialize_seq(Some(len))?;
        for i in 0..len {
            seq.serialize_element(&ArrayView {
                shape: inner_shape,
                values: &self.values[i * stride..(i + 1) * stride],
            })?;
        }
        seq.end()
    }
}

impl Serialize for NumericArray {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        ArrayView {
            shape: self.shape(),
            values: self.values(),
        }
        .serialize(serializer)
    }
}

impl Serialize for CellValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            CellValue::Empty => serializer.serialize_seq(Some(0))?.end(),
            CellValue::Polygon(array) => array.serialize(serializer),
            CellValue::Container(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}
