//! Per-node-type field schemas.
//!
//! A schema lists every field a node type accepts, the value shape it must
//! have and, where the node type defines one, its default value.

use glam::{Vec2, Vec3, Vec4};

use crate::headers::NodeType;
use crate::model::{FieldKind, FieldValue};

/// Expected shape of a field's value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldShape {
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
    /// A string restricted to the listed values.
    Enum(&'static [&'static str]),
    /// A single child node (or `USE`) of one of the listed types.
    Node(&'static [NodeType]),
    NodeArray,
}

impl FieldShape {
    /// The value variant this shape is stored as after validation.
    pub fn kind(self) -> FieldKind {
        match self {
            FieldShape::Bool => FieldKind::Bool,
            FieldShape::Int32 => FieldKind::Int32,
            FieldShape::Float => FieldKind::Float,
            FieldShape::Vec2 => FieldKind::Vec2,
            FieldShape::Vec3 => FieldKind::Vec3,
            FieldShape::Vec4 => FieldKind::Vec4,
            FieldShape::Int32Array => FieldKind::Int32Array,
            FieldShape::FloatArray => FieldKind::FloatArray,
            FieldShape::Vec2Array => FieldKind::Vec2Array,
            FieldShape::Vec3Array => FieldKind::Vec3Array,
            FieldShape::String | FieldShape::Enum(_) => FieldKind::String,
            FieldShape::Node(_) => FieldKind::Node,
            FieldShape::NodeArray => FieldKind::NodeArray,
        }
    }
}

/// One field of a schema.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub shape: FieldShape,
    /// `None` for single-node fields, which have no default child.
    pub default: Option<FieldValue>,
}

/// The closed field set of a node type.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeSchema {
    node_type: NodeType,
    fields: Vec<FieldSpec>,
}

impl NodeSchema {
    pub fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            fields: Vec::new(),
        }
    }

    /// Add a field with a default value.
    pub fn field(mut self, name: &'static str, shape: FieldShape, default: FieldValue) -> Self {
        self.fields.push(FieldSpec {
            name,
            shape,
            default: Some(default),
        });
        self
    }

    /// Add a single-node field accepting the given types.
    pub fn node(mut self, name: &'static str, allowed: &'static [NodeType]) -> Self {
        self.fields.push(FieldSpec {
            name,
            shape: FieldShape::Node(allowed),
            default: None,
        });
        self
    }

    /// Add a node-array field, empty by default.
    pub fn node_array(self, name: &'static str) -> Self {
        self.field(name, FieldShape::NodeArray, FieldValue::NodeArray(Vec::new()))
    }

    fn flag(self, name: &'static str, default: bool) -> Self {
        self.field(name, FieldShape::Bool, FieldValue::Bool(default))
    }

    fn float(self, name: &'static str, default: f32) -> Self {
        self.field(name, FieldShape::Float, FieldValue::Float(default))
    }

    fn int(self, name: &'static str, default: i32) -> Self {
        self.field(name, FieldShape::Int32, FieldValue::Int32(default))
    }

    fn vec2(self, name: &'static str, default: Vec2) -> Self {
        self.field(name, FieldShape::Vec2, FieldValue::Vec2(default))
    }

    fn vec3(self, name: &'static str, default: Vec3) -> Self {
        self.field(name, FieldShape::Vec3, FieldValue::Vec3(default))
    }

    fn rotation(self, name: &'static str) -> Self {
        self.field(name, FieldShape::Vec4, FieldValue::Vec4(Vec4::new(0.0, 0.0, 1.0, 0.0)))
    }

    fn string(self, name: &'static str) -> Self {
        self.field(name, FieldShape::String, FieldValue::String(String::new()))
    }

    fn index_array(self, name: &'static str) -> Self {
        self.field(name, FieldShape::Int32Array, FieldValue::Int32Array(Vec::new()))
    }

    fn choice(self, name: &'static str, allowed: &'static [&'static str], default: &str) -> Self {
        self.field(name, FieldShape::Enum(allowed), FieldValue::String(default.to_string()))
    }

    /// `bboxCenter` / `bboxSize` shared by grouping nodes.
    fn bounded(self) -> Self {
        self.vec3("bboxCenter", Vec3::ZERO)
            .vec3("bboxSize", Vec3::splat(-1.0))
    }

    fn grouping(self) -> Self {
        self.node_array("children").bounded()
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

const GEOMETRY: &[NodeType] = &[
    NodeType::Box,
    NodeType::Cone,
    NodeType::Cylinder,
    NodeType::ElevationGrid,
    NodeType::Extrusion,
    NodeType::IndexedFaceSet,
    NodeType::IndexedLineSet,
    NodeType::PointSet,
    NodeType::Sphere,
    NodeType::Text,
];

const CHILD_NODES: &[NodeType] = &[
    NodeType::Anchor,
    NodeType::Billboard,
    NodeType::Collision,
    NodeType::Group,
    NodeType::Inline,
    NodeType::Lod,
    NodeType::Shape,
    NodeType::Switch,
    NodeType::Transform,
    NodeType::WorldInfo,
];

const TEXTURES: &[NodeType] = &[NodeType::ImageTexture, NodeType::PixelTexture];

const FONT_FAMILIES: &[&str] = &["SERIF", "SANS", "TYPEWRITER", ""];
const FONT_JUSTIFY: &[&str] = &["FIRST", "BEGIN", "MIDDLE", "END", ""];
const FONT_STYLES: &[&str] = &["PLAIN", "BOLD", "ITALIC", "BOLDITALIC", ""];

/// Schema of a builtin node type.
pub fn builtin_schema(node_type: NodeType) -> NodeSchema {
    let schema = NodeSchema::new(node_type);
    match node_type {
        NodeType::Anchor => schema
            .grouping()
            .string("description")
            .string("parameter")
            .string("url"),
        NodeType::Appearance => schema
            .node("material", &[NodeType::Material])
            .node("texture", TEXTURES)
            .node("textureTransform", &[NodeType::TextureTransform]),
        NodeType::Billboard => schema.grouping().vec3("axisOfRotation", Vec3::Y),
        NodeType::Box => schema.vec3("size", Vec3::splat(2.0)),
        NodeType::Collision => schema
            .grouping()
            .flag("collide", true)
            .node("proxy", CHILD_NODES),
        NodeType::Color => schema.field("color", FieldShape::Vec3Array, FieldValue::Vec3Array(Vec::new())),
        NodeType::Cone => schema
            .float("bottomRadius", 1.0)
            .float("height", 2.0)
            .flag("side", true)
            .flag("bottom", true),
        NodeType::Coordinate => schema.field("point", FieldShape::Vec3Array, FieldValue::Vec3Array(Vec::new())),
        NodeType::Cylinder => schema
            .flag("bottom", true)
            .float("height", 2.0)
            .float("radius", 1.0)
            .flag("side", true)
            .flag("top", true),
        NodeType::ElevationGrid => schema
            .node("color", &[NodeType::Color])
            .node("normal", &[NodeType::Normal])
            .node("texCoord", &[NodeType::TextureCoordinate])
            .field("height", FieldShape::FloatArray, FieldValue::FloatArray(Vec::new()))
            .flag("ccw", true)
            .flag("colorPerVertex", true)
            .float("creaseAngle", 0.0)
            .flag("normalPerVertex", true)
            .flag("solid", true)
            .int("xDimension", 0)
            .float("xSpacing", 0.0)
            .int("zDimension", 0)
            .float("zSpacing", 0.0),
        NodeType::Extrusion => schema
            .flag("beginCap", true)
            .flag("ccw", true)
            .flag("convex", true)
            .float("creaseAngle", 0.0)
            .field(
                "crossSection",
                FieldShape::Vec2Array,
                FieldValue::Vec2Array(vec![
                    Vec2::new(1.0, 1.0),
                    Vec2::new(1.0, -1.0),
                    Vec2::new(-1.0, -1.0),
                    Vec2::new(-1.0, 1.0),
                    Vec2::new(1.0, 1.0),
                ]),
            )
            .flag("endCap", true)
            .rotation("orientation")
            .vec2("scale", Vec2::ONE)
            .flag("solid", true)
            .field(
                "spine",
                FieldShape::Vec3Array,
                FieldValue::Vec3Array(vec![Vec3::ZERO, Vec3::Y]),
            ),
        NodeType::FontStyle => schema
            .choice("family", FONT_FAMILIES, "SERIF")
            .flag("horizontal", true)
            .choice("justify", FONT_JUSTIFY, "BEGIN")
            .string("language")
            .flag("leftToRight", true)
            .float("size", 1.0)
            .float("spacing", 1.0)
            .choice("style", FONT_STYLES, "PLAIN")
            .flag("topToBottom", true),
        NodeType::Group => schema.grouping(),
        NodeType::ImageTexture => schema
            .string("url")
            .flag("repeatS", true)
            .flag("repeatT", true),
        NodeType::IndexedFaceSet => schema
            .node("color", &[NodeType::Color])
            .node("coord", &[NodeType::Coordinate])
            .node("normal", &[NodeType::Normal])
            .node("texCoord", &[NodeType::TextureCoordinate])
            .flag("ccw", true)
            .index_array("colorIndex")
            .flag("colorPerVertex", true)
            .flag("convex", true)
            .index_array("coordIndex")
            .float("creaseAngle", 0.0)
            .index_array("normalIndex")
            .flag("normalPerVertex", true)
            .flag("solid", true)
            .index_array("texCoordIndex"),
        NodeType::IndexedLineSet => schema
            .node("color", &[NodeType::Color])
            .node("coord", &[NodeType::Coordinate])
            .index_array("colorIndex")
            .flag("colorPerVertex", true)
            .index_array("coordIndex"),
        NodeType::Inline => schema.bounded().string("url"),
        NodeType::Lod => schema
            .node_array("level")
            .vec3("center", Vec3::ZERO)
            .field("range", FieldShape::FloatArray, FieldValue::FloatArray(Vec::new())),
        NodeType::Material => schema
            .float("ambientIntensity", 0.2)
            .vec3("diffuseColor", Vec3::splat(0.8))
            .vec3("emissiveColor", Vec3::ZERO)
            .float("shininess", 0.2)
            .vec3("specularColor", Vec3::ZERO)
            .float("transparency", 0.0),
        NodeType::Normal => schema.field("vector", FieldShape::Vec3Array, FieldValue::Vec3Array(Vec::new())),
        NodeType::PixelTexture => schema
            .vec3("image", Vec3::ZERO)
            .flag("repeatS", true)
            .flag("repeatT", true),
        NodeType::PointSet => schema
            .node("color", &[NodeType::Color])
            .node("coord", &[NodeType::Coordinate]),
        NodeType::Shape => schema
            .node("appearance", &[NodeType::Appearance])
            .node("geometry", GEOMETRY),
        NodeType::Sphere => schema.float("radius", 1.0),
        NodeType::Switch => schema.node_array("choice").int("whichChoice", -1),
        NodeType::Text => schema
            .string("string")
            .node("fontStyle", &[NodeType::FontStyle])
            .float("maxExtent", 0.0)
            .field("length", FieldShape::FloatArray, FieldValue::FloatArray(Vec::new())),
        NodeType::TextureCoordinate => schema.field("point", FieldShape::Vec2Array, FieldValue::Vec2Array(Vec::new())),
        NodeType::TextureTransform => schema
            .vec2("center", Vec2::ZERO)
            .float("rotation", 0.0)
            .vec2("scale", Vec2::ONE)
            .vec2("translation", Vec2::ZERO),
        NodeType::Transform => schema
            .grouping()
            .vec3("center", Vec3::ZERO)
            .rotation("rotation")
            .vec3("scale", Vec3::ONE)
            .rotation("scaleOrientation")
            .vec3("translation", Vec3::ZERO),
        NodeType::WorldInfo => schema.string("info").string("title"),
    }
}
