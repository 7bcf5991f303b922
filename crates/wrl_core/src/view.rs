//! Node validation and the read-only validated view.
//!
//! [`validate`] canonicalizes a raw node's header and checks its fields
//! against the node type's schema. The resulting [`NodeView`] gives typed
//! access to field values with schema defaults filled in, and validates
//! child nodes on demand.
//!
//! # Value coercion
//!
//! The grammar infers a value's shape from how it is written, which is not
//! always the shape the schema wants. Validation accepts:
//!
//! - an integer where a float is expected, and an integral float where an
//!   integer is expected
//! - any numeric array where another numeric array is expected, as long as
//!   the flattened components fit the target (integral for integer arrays,
//!   a multiple of the vector width for vector arrays); `[]` fits anything
//! - a single node or `USE` where a node array is expected
//!
//! # References
//!
//! Node-valued fields are checked without descending into the children:
//! every `USE` must name a binding, and the target of a single-node field
//! must be one of the field's allowed types. A target with an unknown header
//! is left for its own validation to report.

use std::borrow::Cow;
use std::collections::HashMap;

use glam::{Vec2, Vec3, Vec4};

use crate::error::{ValidationError, ValidationResult};
use crate::headers::{CanonicalHeaderTable, NodeType};
use crate::model::{Document, FieldKind, FieldValue, NodeId, NodeRef, WrongKindError};
use crate::schema::{FieldShape, NodeSchema};

/// Validate one node of a document.
pub fn validate<'a>(
    document: &'a Document,
    headers: &'a CanonicalHeaderTable,
    id: NodeId,
) -> ValidationResult<NodeView<'a>> {
    let node = &document[id];
    let node_type = headers
        .canonicalize(&node.header)
        .ok_or_else(|| ValidationError::UnknownHeader {
            header: node.header.clone(),
            offset: node.offset,
        })?;

    for (i, field) in node.fields.iter().enumerate() {
        if node.fields[..i].iter().any(|f| f.name == field.name) {
            return Err(ValidationError::DuplicateField {
                header: node.header.clone(),
                field: field.name.clone(),
                offset: node.offset,
            });
        }
    }

    let schema = headers.schema(node_type);
    let mut fields = HashMap::with_capacity(node.fields.len());
    for field in &node.fields {
        let spec = schema
            .spec(&field.name)
            .ok_or_else(|| ValidationError::InvalidField {
                node_type,
                field: field.name.clone(),
                offset: node.offset,
            })?;

        let value = conform(&field.value, spec.shape).ok_or_else(|| ValidationError::WrongKind {
            node_type,
            field: field.name.clone(),
            offset: node.offset,
            source: WrongKindError {
                expected: spec.shape.kind(),
                found: field.value.kind(),
            },
        })?;

        if let (FieldShape::Enum(allowed), FieldValue::String(s)) = (spec.shape, value.as_ref()) {
            if !allowed.contains(&s.as_str()) {
                return Err(ValidationError::InvalidStringValue {
                    node_type,
                    field: field.name.clone(),
                    offset: node.offset,
                    value: s.clone(),
                    allowed: allowed
                        .iter()
                        .map(|v| format!("\"{}\"", v))
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
        }

        check_references(document, headers, node_type, spec.shape, &field.name, &value, node.offset)?;
        fields.insert(spec.name, value);
    }

    Ok(NodeView {
        document,
        headers,
        id,
        node_type,
        schema,
        fields,
    })
}

/// Convert a parsed value to the shape a schema asks for, if it fits.
fn conform(value: &FieldValue, shape: FieldShape) -> Option<Cow<'_, FieldValue>> {
    let expected = shape.kind();
    if value.kind() == expected {
        return Some(Cow::Borrowed(value));
    }

    match (expected, value) {
        (FieldKind::Float, FieldValue::Int32(i)) => Some(Cow::Owned(FieldValue::Float(*i as f32))),
        (FieldKind::Int32, FieldValue::Float(f)) => {
            integral(*f).map(|i| Cow::Owned(FieldValue::Int32(i)))
        }
        (FieldKind::Node, FieldValue::Use(_)) => Some(Cow::Borrowed(value)),
        (FieldKind::NodeArray, FieldValue::Node(id)) => {
            Some(Cow::Owned(FieldValue::NodeArray(vec![NodeRef::Node(*id)])))
        }
        (FieldKind::NodeArray, FieldValue::Use(name)) => {
            Some(Cow::Owned(FieldValue::NodeArray(vec![NodeRef::Use(name.clone())])))
        }
        (FieldKind::NodeArray, FieldValue::Vec3Array(v)) if v.is_empty() => {
            Some(Cow::Owned(FieldValue::NodeArray(Vec::new())))
        }
        (kind, _) if kind.is_numeric_array() => value
            .numeric_components()
            .and_then(|components| rechunk(kind, components))
            .map(Cow::Owned),
        _ => None,
    }
}

/// Resolve the `USE`s of a node-valued field and apply the allow-list of a
/// single-node field.
fn check_references(
    document: &Document,
    headers: &CanonicalHeaderTable,
    node_type: NodeType,
    shape: FieldShape,
    name: &str,
    value: &FieldValue,
    offset: usize,
) -> ValidationResult<()> {
    match (shape, value) {
        (FieldShape::Node(allowed), value) => {
            let Some(node_ref) = value.as_node_ref() else {
                return Ok(());
            };
            let id = document.resolve(&node_ref)?;
            match headers.canonicalize(&document[id].header) {
                Some(found) if !allowed.contains(&found) => Err(ValidationError::InvalidNodeForField {
                    node_type,
                    field: name.to_string(),
                    offset,
                    found,
                }),
                _ => Ok(()),
            }
        }
        (FieldShape::NodeArray, FieldValue::NodeArray(items)) => {
            for item in items {
                document.resolve(item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// `i32::MAX as f32` rounds up to 2^31, so the upper bound is exclusive.
fn integral(f: f32) -> Option<i32> {
    if f.fract() == 0.0 && f >= i32::MIN as f32 && f < 2_147_483_648.0 {
        Some(f as i32)
    } else {
        None
    }
}

fn rechunk(kind: FieldKind, components: Vec<f32>) -> Option<FieldValue> {
    match kind {
        FieldKind::Int32Array => components
            .into_iter()
            .map(integral)
            .collect::<Option<Vec<i32>>>()
            .map(FieldValue::Int32Array),
        FieldKind::FloatArray => Some(FieldValue::FloatArray(components)),
        FieldKind::Vec2Array if components.len() % 2 == 0 => Some(FieldValue::Vec2Array(
            components.chunks_exact(2).map(Vec2::from_slice).collect(),
        )),
        FieldKind::Vec3Array if components.len() % 3 == 0 => Some(FieldValue::Vec3Array(
            components.chunks_exact(3).map(Vec3::from_slice).collect(),
        )),
        _ => None,
    }
}

/// A validated node: its canonical type plus schema-checked field values.
///
/// Views are cheap to build and borrow the document, so handlers can hold
/// several at once and send them across threads.
#[derive(Clone, Debug)]
pub struct NodeView<'a> {
    document: &'a Document,
    headers: &'a CanonicalHeaderTable,
    id: NodeId,
    node_type: NodeType,
    schema: &'a NodeSchema,
    fields: HashMap<&'static str, Cow<'a, FieldValue>>,
}

impl<'a> NodeView<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Header as written in the source.
    pub fn header(&self) -> &'a str {
        &self.document[self.id].header
    }

    pub fn binding(&self) -> Option<&'a str> {
        self.document[self.id].binding.as_deref()
    }

    pub fn offset(&self) -> usize {
        self.document[self.id].offset
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    pub fn headers(&self) -> &'a CanonicalHeaderTable {
        self.headers
    }

    /// Whether the field was written explicitly.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    fn not_in_schema(&self, name: &str) -> ValidationError {
        ValidationError::InvalidField {
            node_type: self.node_type,
            field: name.to_string(),
            offset: self.offset(),
        }
    }

    fn wrong_kind(&self, name: &str, source: WrongKindError) -> ValidationError {
        ValidationError::WrongKind {
            node_type: self.node_type,
            field: name.to_string(),
            offset: self.offset(),
            source,
        }
    }

    /// Explicit value, else schema default, else "field not found".
    pub fn extract(&self, name: &str) -> ValidationResult<&FieldValue> {
        if let Some(value) = self.fields.get(name) {
            return Ok(value.as_ref());
        }
        let spec = self.schema.spec(name).ok_or_else(|| self.not_in_schema(name))?;
        spec.default
            .as_ref()
            .ok_or_else(|| ValidationError::FieldNotFound {
                node_type: self.node_type,
                field: name.to_string(),
                offset: self.offset(),
            })
    }

    /// Like [`extract`](Self::extract), but falls back to `default` instead
    /// of failing when the field has no value.
    pub fn extract_or<'s>(&'s self, name: &str, default: FieldValue) -> Cow<'s, FieldValue> {
        match self.extract(name) {
            Ok(value) => Cow::Borrowed(value),
            Err(_) => Cow::Owned(default),
        }
    }

    pub fn get_bool(&self, name: &str) -> ValidationResult<bool> {
        self.extract(name)?
            .as_bool()
            .map_err(|e| self.wrong_kind(name, e))
    }

    pub fn get_int32(&self, name: &str) -> ValidationResult<i32> {
        self.extract(name)?
            .as_int32()
            .map_err(|e| self.wrong_kind(name, e))
    }

    pub fn get_float(&self, name: &str) -> ValidationResult<f32> {
        self.extract(name)?
            .as_float()
            .map_err(|e| self.wrong_kind(name, e))
    }

    pub fn get_vec2(&self, name: &str) -> ValidationResult<Vec2> {
        self.extract(name)?
            .as_vec2()
            .map_err(|e| self.wrong_kind(name, e))
    }

    pub fn get_vec3(&self, name: &str) -> ValidationResult<Vec3> {
        self.extract(name)?
            .as_vec3()
            .map_err(|e| self.wrong_kind(name, e))
    }

    pub fn get_vec4(&self, name: &str) -> ValidationResult<Vec4> {
        self.extract(name)?
            .as_vec4()
            .map_err(|e| self.wrong_kind(name, e))
    }

    pub fn get_int32_array(&self, name: &str) -> ValidationResult<&[i32]> {
        self.extract(name)?
            .as_int32_array()
            .map_err(|e| self.wrong_kind(name, e))
    }

    pub fn get_float_array(&self, name: &str) -> ValidationResult<&[f32]> {
        self.extract(name)?
            .as_float_array()
            .map_err(|e| self.wrong_kind(name, e))
    }

    pub fn get_vec2_array(&self, name: &str) -> ValidationResult<&[Vec2]> {
        self.extract(name)?
            .as_vec2_array()
            .map_err(|e| self.wrong_kind(name, e))
    }

    pub fn get_vec3_array(&self, name: &str) -> ValidationResult<&[Vec3]> {
        self.extract(name)?
            .as_vec3_array()
            .map_err(|e| self.wrong_kind(name, e))
    }

    pub fn get_str(&self, name: &str) -> ValidationResult<&str> {
        self.extract(name)?
            .as_str()
            .map_err(|e| self.wrong_kind(name, e))
    }

    /// Unresolved elements of a node-array field.
    pub fn child_refs(&self, name: &str) -> ValidationResult<&[NodeRef]> {
        self.extract(name)?
            .as_node_array()
            .map_err(|e| self.wrong_kind(name, e))
    }

    /// Resolve and validate every element of a node-array field.
    pub fn extract_child_array(&self, name: &str) -> ValidationResult<Vec<NodeView<'a>>> {
        self.child_refs(name)?
            .iter()
            .map(|node_ref| -> ValidationResult<NodeView<'a>> {
                let id = self.document.resolve(node_ref)?;
                validate(self.document, self.headers, id)
            })
            .collect()
    }

    /// The node in a single-node field, checked against the schema's
    /// allow-list. `Ok(None)` when the field is not set.
    pub fn extract_child(&self, name: &str) -> ValidationResult<Option<NodeView<'a>>> {
        let spec = self.schema.spec(name).ok_or_else(|| self.not_in_schema(name))?;
        let FieldShape::Node(allowed) = spec.shape else {
            return Err(self.wrong_kind(
                name,
                WrongKindError {
                    expected: spec.shape.kind(),
                    found: FieldKind::Node,
                },
            ));
        };
        if !self.has_field(name) {
            return Ok(None);
        }
        self.extract_reference(name, allowed).map(Some)
    }

    /// Resolve a single-node field (an inline node or a `USE`), validate the
    /// target and require its type to be one of `allowed`.
    pub fn extract_reference(&self, name: &str, allowed: &[NodeType]) -> ValidationResult<NodeView<'a>> {
        let value = self.extract(name)?;
        let node_ref = value.as_node_ref().ok_or_else(|| {
            self.wrong_kind(
                name,
                WrongKindError {
                    expected: FieldKind::Node,
                    found: value.kind(),
                },
            )
        })?;
        let id = self.document.resolve(&node_ref)?;
        let target = validate(self.document, self.headers, id)?;
        if !allowed.contains(&target.node_type) {
            return Err(ValidationError::InvalidNodeForField {
                node_type: self.node_type,
                field: name.to_string(),
                offset: self.offset(),
                found: target.node_type,
            });
        }
        Ok(target)
    }
}
