//! Raw scene data model.
//!
//! A parsed document is an arena of [`Node`]s addressed by [`NodeId`].
//! Ownership is strictly tree-shaped: a child node is owned by the field of
//! exactly one parent (or is a root). `USE` references never own anything,
//! they are resolved by name through the document's [`BindingTable`].
//!
//! Nothing in this module validates anything. Header names are kept as
//! written and field values keep the shape the grammar inferred for them.

use std::fmt;
use std::ops::Index;

use glam::{Vec2, Vec3, Vec4};
use thiserror::Error;

use crate::binding::{BindingError, BindingTable};

/// Index of a node in a [`Document`] arena.
pub type NodeId = usize;

/// The variant tag of a [`FieldValue`], used for introspection and errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Bool,
    Int32,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int32Array,
    FloatArray,
    Vec2Array,
    Vec3Array,
    String,
    Node,
    NodeArray,
    Use,
}

impl FieldKind {
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Bool => "bool",
            FieldKind::Int32 => "int32",
            FieldKind::Float => "float",
            FieldKind::Vec2 => "vec2",
            FieldKind::Vec3 => "vec3",
            FieldKind::Vec4 => "vec4",
            FieldKind::Int32Array => "int32 array",
            FieldKind::FloatArray => "float array",
            FieldKind::Vec2Array => "vec2 array",
            FieldKind::Vec3Array => "vec3 array",
            FieldKind::String => "string",
            FieldKind::Node => "node",
            FieldKind::NodeArray => "node array",
            FieldKind::Use => "USE reference",
        }
    }

    /// Numeric arrays can be re-chunked into each other during validation.
    pub fn is_numeric_array(self) -> bool {
        matches!(
            self,
            FieldKind::Int32Array | FieldKind::FloatArray | FieldKind::Vec2Array | FieldKind::Vec3Array
        )
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A field value was read as a variant it does not hold.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected {expected} value, found {found}")]
pub struct WrongKindError {
    pub expected: FieldKind,
    pub found: FieldKind,
}

/// An element of a node array: either an owned child or a `USE` reference.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeRef {
    Node(NodeId),
    Use(String),
}

/// A parsed field value. Immutable once the parser has produced it.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int32(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Int32Array(Vec<i32>),
    FloatArray(Vec<f32>),
    Vec2Array(Vec<Vec2>),
    Vec3Array(Vec<Vec3>),
    String(String),
    /// A single owned child node.
    Node(NodeId),
    /// A bracketed list of children and references.
    NodeArray(Vec<NodeRef>),
    /// A single `USE name` reference in a node-valued position.
    Use(String),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::Int32(_) => FieldKind::Int32,
            FieldValue::Float(_) => FieldKind::Float,
            FieldValue::Vec2(_) => FieldKind::Vec2,
            FieldValue::Vec3(_) => FieldKind::Vec3,
            FieldValue::Vec4(_) => FieldKind::Vec4,
            FieldValue::Int32Array(_) => FieldKind::Int32Array,
            FieldValue::FloatArray(_) => FieldKind::FloatArray,
            FieldValue::Vec2Array(_) => FieldKind::Vec2Array,
            FieldValue::Vec3Array(_) => FieldKind::Vec3Array,
            FieldValue::String(_) => FieldKind::String,
            FieldValue::Node(_) => FieldKind::Node,
            FieldValue::NodeArray(_) => FieldKind::NodeArray,
            FieldValue::Use(_) => FieldKind::Use,
        }
    }

    fn wrong_kind(&self, expected: FieldKind) -> WrongKindError {
        WrongKindError {
            expected,
            found: self.kind(),
        }
    }

    pub fn as_bool(&self) -> Result<bool, WrongKindError> {
        match self {
            FieldValue::Bool(v) => Ok(*v),
            other => Err(other.wrong_kind(FieldKind::Bool)),
        }
    }

    pub fn as_int32(&self) -> Result<i32, WrongKindError> {
        match self {
            FieldValue::Int32(v) => Ok(*v),
            other => Err(other.wrong_kind(FieldKind::Int32)),
        }
    }

    pub fn as_float(&self) -> Result<f32, WrongKindError> {
        match self {
            FieldValue::Float(v) => Ok(*v),
            other => Err(other.wrong_kind(FieldKind::Float)),
        }
    }

    pub fn as_vec2(&self) -> Result<Vec2, WrongKindError> {
        match self {
            FieldValue::Vec2(v) => Ok(*v),
            other => Err(other.wrong_kind(FieldKind::Vec2)),
        }
    }

    pub fn as_vec3(&self) -> Result<Vec3, WrongKindError> {
        match self {
            FieldValue::Vec3(v) => Ok(*v),
            other => Err(other.wrong_kind(FieldKind::Vec3)),
        }
    }

    pub fn as_vec4(&self) -> Result<Vec4, WrongKindError> {
        match self {
            FieldValue::Vec4(v) => Ok(*v),
            other => Err(other.wrong_kind(FieldKind::Vec4)),
        }
    }

    pub fn as_int32_array(&self) -> Result<&[i32], WrongKindError> {
        match self {
            FieldValue::Int32Array(v) => Ok(v),
            other => Err(other.wrong_kind(FieldKind::Int32Array)),
        }
    }

    pub fn as_float_array(&self) -> Result<&[f32], WrongKindError> {
        match self {
            FieldValue::FloatArray(v) => Ok(v),
            other => Err(other.wrong_kind(FieldKind::FloatArray)),
        }
    }

    pub fn as_vec2_array(&self) -> Result<&[Vec2], WrongKindError> {
        match self {
            FieldValue::Vec2Array(v) => Ok(v),
            other => Err(other.wrong_kind(FieldKind::Vec2Array)),
        }
    }

    pub fn as_vec3_array(&self) -> Result<&[Vec3], WrongKindError> {
        match self {
            FieldValue::Vec3Array(v) => Ok(v),
            other => Err(other.wrong_kind(FieldKind::Vec3Array)),
        }
    }

    pub fn as_str(&self) -> Result<&str, WrongKindError> {
        match self {
            FieldValue::String(v) => Ok(v),
            other => Err(other.wrong_kind(FieldKind::String)),
        }
    }

    pub fn as_node(&self) -> Result<NodeId, WrongKindError> {
        match self {
            FieldValue::Node(v) => Ok(*v),
            other => Err(other.wrong_kind(FieldKind::Node)),
        }
    }

    pub fn as_node_array(&self) -> Result<&[NodeRef], WrongKindError> {
        match self {
            FieldValue::NodeArray(v) => Ok(v),
            other => Err(other.wrong_kind(FieldKind::NodeArray)),
        }
    }

    pub fn as_use(&self) -> Result<&str, WrongKindError> {
        match self {
            FieldValue::Use(v) => Ok(v),
            other => Err(other.wrong_kind(FieldKind::Use)),
        }
    }

    /// Interpret a single node-valued field (`Node` or `Use`) as a [`NodeRef`].
    pub fn as_node_ref(&self) -> Option<NodeRef> {
        match self {
            FieldValue::Node(id) => Some(NodeRef::Node(*id)),
            FieldValue::Use(name) => Some(NodeRef::Use(name.clone())),
            _ => None,
        }
    }

    /// Flatten any numeric array into its scalar components.
    pub fn numeric_components(&self) -> Option<Vec<f32>> {
        match self {
            FieldValue::Int32Array(v) => Some(v.iter().map(|&i| i as f32).collect()),
            FieldValue::FloatArray(v) => Some(v.clone()),
            FieldValue::Vec2Array(v) => Some(v.iter().flat_map(|p| p.to_array()).collect()),
            FieldValue::Vec3Array(v) => Some(v.iter().flat_map(|p| p.to_array()).collect()),
            _ => None,
        }
    }
}

/// A named field of a raw node.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

/// A raw, unvalidated node as written in the source text.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    /// Header exactly as written (`Box`, `VRMLTransform`, ...)
    pub header: String,

    /// Name declared with `DEF`, if any
    pub binding: Option<String>,

    /// Fields in declaration order; duplicates are kept for the validator to reject
    pub fields: Vec<Field>,

    /// Absolute byte offset of the node's first token
    pub offset: usize,
}

impl Node {
    /// First field with the given name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// One parsed unit: the node arena, its roots and the bindings it declares.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    bindings: BindingTable,
}

impl Document {
    /// Assemble a document and register every `DEF` it contains.
    ///
    /// Registration walks the arena in id order, which is document order,
    /// so the first declaration of a name is the one that sticks.
    pub fn new(nodes: Vec<Node>, roots: Vec<NodeId>) -> Self {
        let bindings = BindingTable::populate(&nodes);
        Self {
            nodes,
            roots,
            bindings,
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Follow a node-array element to the node it denotes.
    pub fn resolve(&self, node_ref: &NodeRef) -> Result<NodeId, BindingError> {
        match node_ref {
            NodeRef::Node(id) => Ok(*id),
            NodeRef::Use(name) => self.bindings.resolve(name),
        }
    }

    fn write_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId, indent: usize) -> fmt::Result {
        let node = &self.nodes[id];
        if let Some(name) = &node.binding {
            write!(f, "DEF {} ", name)?;
        }
        writeln!(f, "{} {{", node.header)?;
        for field in &node.fields {
            write!(f, "{:width$}{} ", "", field.name, width = indent + 2)?;
            self.write_value(f, &field.value, indent + 2)?;
            writeln!(f)?;
        }
        write!(f, "{:width$}}}", "", width = indent)
    }

    fn write_value(&self, f: &mut fmt::Formatter<'_>, value: &FieldValue, indent: usize) -> fmt::Result {
        match value {
            FieldValue::Bool(true) => f.write_str("TRUE"),
            FieldValue::Bool(false) => f.write_str("FALSE"),
            FieldValue::Int32(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{:?}", v),
            FieldValue::Vec2(v) => write!(f, "{:?} {:?}", v.x, v.y),
            FieldValue::Vec3(v) => write!(f, "{:?} {:?} {:?}", v.x, v.y, v.z),
            FieldValue::Vec4(v) => write!(f, "{:?} {:?} {:?} {:?}", v.x, v.y, v.z, v.w),
            FieldValue::Int32Array(v) => write_list(f, v.iter().map(|i| i.to_string())),
            FieldValue::FloatArray(v) => write_list(f, v.iter().map(|x| format!("{:?}", x))),
            FieldValue::Vec2Array(v) => {
                write_list(f, v.iter().map(|p| format!("{:?} {:?}", p.x, p.y)))
            }
            FieldValue::Vec3Array(v) => {
                write_list(f, v.iter().map(|p| format!("{:?} {:?} {:?}", p.x, p.y, p.z)))
            }
            FieldValue::String(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    if c == '"' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{}", c)?;
                }
                f.write_str("\"")
            }
            FieldValue::Node(id) => self.write_node(f, *id, indent),
            FieldValue::Use(name) => write!(f, "USE {}", name),
            FieldValue::NodeArray(items) => {
                writeln!(f, "[")?;
                for item in items {
                    write!(f, "{:width$}", "", width = indent + 2)?;
                    match item {
                        NodeRef::Node(id) => self.write_node(f, *id, indent + 2)?,
                        NodeRef::Use(name) => write!(f, "USE {}", name)?,
                    }
                    writeln!(f)?;
                }
                write!(f, "{:width$}]", "", width = indent)
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: impl Iterator<Item = String>) -> fmt::Result {
    let items: Vec<String> = items.collect();
    write!(f, "[{}]", items.join(", "))
}

impl Index<NodeId> for Document {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }
}

/// Prints the tree back as scene text that parses to an equal document.
impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &root in &self.roots {
            self.write_node(f, root, 0)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(header: &str, binding: Option<&str>, fields: Vec<Field>) -> Node {
        Node {
            header: header.to_string(),
            binding: binding.map(str::to_string),
            fields,
            offset: 0,
        }
    }

    #[test]
    fn test_typed_accessors() {
        let v = FieldValue::Vec3(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(v.as_vec3().unwrap(), Vec3::new(1.0, 2.0, 3.0));

        let err = v.as_float().unwrap_err();
        assert_eq!(err.expected, FieldKind::Float);
        assert_eq!(err.found, FieldKind::Vec3);
        assert_eq!(err.to_string(), "expected float value, found vec3");
    }

    #[test]
    fn test_numeric_components() {
        let v = FieldValue::Vec2Array(vec![Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0)]);
        assert_eq!(v.numeric_components().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
        assert!(FieldValue::Bool(true).numeric_components().is_none());
    }

    #[test]
    fn test_document_registers_first_binding() {
        let nodes = vec![
            node("Box", Some("A"), vec![]),
            node("Sphere", Some("A"), vec![]),
        ];
        let doc = Document::new(nodes, vec![0, 1]);

        assert_eq!(doc.resolve(&NodeRef::Use("A".into())).unwrap(), 0);
        assert_eq!(doc.resolve(&NodeRef::Node(1)).unwrap(), 1);
        assert!(doc.resolve(&NodeRef::Use("B".into())).is_err());
    }

    #[test]
    fn test_display_tree() {
        let nodes = vec![
            node(
                "Transform",
                None,
                vec![Field {
                    name: "children".into(),
                    value: FieldValue::NodeArray(vec![NodeRef::Node(1), NodeRef::Use("A".into())]),
                }],
            ),
            node(
                "Box",
                Some("A"),
                vec![Field {
                    name: "size".into(),
                    value: FieldValue::Vec3(Vec3::splat(2.0)),
                }],
            ),
        ];
        let doc = Document::new(nodes, vec![0]);
        let text = doc.to_string();

        assert!(text.starts_with("Transform {"));
        assert!(text.contains("DEF A Box {"));
        assert!(text.contains("size 2.0 2.0 2.0"));
        assert!(text.contains("USE A"));
    }
}
