//! Canonical node types and the header spelling table.
//!
//! Raw headers are matched case-insensitively, ignoring whitespace, against
//! every accepted spelling: the canonical name, its `VRML`-prefixed form and
//! any synonyms supplied through configuration. The builtin table is built
//! once per process and never mutated; tables with extra synonyms are new
//! values derived from it.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use thiserror::Error;

use crate::schema::{builtin_schema, NodeSchema};

/// The closed set of node types the validator understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeType {
    Anchor,
    Appearance,
    Billboard,
    Box,
    Collision,
    Color,
    Cone,
    Coordinate,
    Cylinder,
    ElevationGrid,
    Extrusion,
    FontStyle,
    Group,
    ImageTexture,
    IndexedFaceSet,
    IndexedLineSet,
    Inline,
    Lod,
    Material,
    Normal,
    PixelTexture,
    PointSet,
    Shape,
    Sphere,
    Switch,
    Text,
    TextureCoordinate,
    TextureTransform,
    Transform,
    WorldInfo,
}

impl NodeType {
    /// Every node type, in declaration order.
    pub const ALL: [NodeType; 30] = [
        NodeType::Anchor,
        NodeType::Appearance,
        NodeType::Billboard,
        NodeType::Box,
        NodeType::Collision,
        NodeType::Color,
        NodeType::Cone,
        NodeType::Coordinate,
        NodeType::Cylinder,
        NodeType::ElevationGrid,
        NodeType::Extrusion,
        NodeType::FontStyle,
        NodeType::Group,
        NodeType::ImageTexture,
        NodeType::IndexedFaceSet,
        NodeType::IndexedLineSet,
        NodeType::Inline,
        NodeType::Lod,
        NodeType::Material,
        NodeType::Normal,
        NodeType::PixelTexture,
        NodeType::PointSet,
        NodeType::Shape,
        NodeType::Sphere,
        NodeType::Switch,
        NodeType::Text,
        NodeType::TextureCoordinate,
        NodeType::TextureTransform,
        NodeType::Transform,
        NodeType::WorldInfo,
    ];

    /// Canonical header name.
    pub fn name(self) -> &'static str {
        match self {
            NodeType::Anchor => "Anchor",
            NodeType::Appearance => "Appearance",
            NodeType::Billboard => "Billboard",
            NodeType::Box => "Box",
            NodeType::Collision => "Collision",
            NodeType::Color => "Color",
            NodeType::Cone => "Cone",
            NodeType::Coordinate => "Coordinate",
            NodeType::Cylinder => "Cylinder",
            NodeType::ElevationGrid => "ElevationGrid",
            NodeType::Extrusion => "Extrusion",
            NodeType::FontStyle => "FontStyle",
            NodeType::Group => "Group",
            NodeType::ImageTexture => "ImageTexture",
            NodeType::IndexedFaceSet => "IndexedFaceSet",
            NodeType::IndexedLineSet => "IndexedLineSet",
            NodeType::Inline => "Inline",
            NodeType::Lod => "LOD",
            NodeType::Material => "Material",
            NodeType::Normal => "Normal",
            NodeType::PixelTexture => "PixelTexture",
            NodeType::PointSet => "PointSet",
            NodeType::Shape => "Shape",
            NodeType::Sphere => "Sphere",
            NodeType::Switch => "Switch",
            NodeType::Text => "Text",
            NodeType::TextureCoordinate => "TextureCoordinate",
            NodeType::TextureTransform => "TextureTransform",
            NodeType::Transform => "Transform",
            NodeType::WorldInfo => "WorldInfo",
        }
    }

    /// Look up a canonical name, ignoring case.
    pub fn from_name(name: &str) -> Option<NodeType> {
        let name = name.trim();
        NodeType::ALL
            .into_iter()
            .find(|ty| ty.name().eq_ignore_ascii_case(name))
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors building a header table with extra synonyms.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderTableError {
    #[error("Synonym '{synonym}' is ambiguous: it already names {existing}, cannot also name {requested}")]
    AmbiguousSynonym {
        synonym: String,
        existing: NodeType,
        requested: NodeType,
    },

    #[error("Synonym '{synonym}' targets unknown canonical header '{canonical}'")]
    UnknownCanonical { synonym: String, canonical: String },
}

/// Lookup key for a header spelling.
fn normalize(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Read-only mapping from header spellings to node types, plus the schema of
/// each node type.
#[derive(Clone, Debug)]
pub struct CanonicalHeaderTable {
    spellings: HashMap<String, NodeType>,
    schemas: Vec<NodeSchema>,
}

impl CanonicalHeaderTable {
    /// The process-wide builtin table.
    pub fn builtin() -> &'static CanonicalHeaderTable {
        static TABLE: OnceLock<CanonicalHeaderTable> = OnceLock::new();
        TABLE.get_or_init(Self::build_builtin)
    }

    fn build_builtin() -> Self {
        let mut spellings = HashMap::with_capacity(NodeType::ALL.len() * 2);
        for ty in NodeType::ALL {
            spellings.insert(normalize(ty.name()), ty);
            spellings.insert(normalize(&format!("VRML{}", ty.name())), ty);
        }
        let schemas = NodeType::ALL.into_iter().map(builtin_schema).collect();
        log::debug!("Built canonical header table with {} spellings", spellings.len());
        Self { spellings, schemas }
    }

    /// A new table accepting additional `synonym -> canonical` spellings.
    ///
    /// Re-stating an existing mapping is accepted; mapping a spelling to a
    /// second node type is not.
    pub fn with_synonyms<I, K, V>(&self, synonyms: I) -> Result<Self, HeaderTableError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut table = self.clone();
        for (synonym, canonical) in synonyms {
            let (synonym, canonical) = (synonym.as_ref(), canonical.as_ref());
            let requested =
                NodeType::from_name(canonical).ok_or_else(|| HeaderTableError::UnknownCanonical {
                    synonym: synonym.to_string(),
                    canonical: canonical.to_string(),
                })?;

            let key = normalize(synonym);
            match table.spellings.get(&key).copied() {
                Some(existing) if existing != requested => {
                    return Err(HeaderTableError::AmbiguousSynonym {
                        synonym: synonym.to_string(),
                        existing,
                        requested,
                    });
                }
                Some(_) => {}
                None => {
                    table.spellings.insert(key, requested);
                }
            }
        }
        Ok(table)
    }

    /// Map a raw header to its node type.
    pub fn canonicalize(&self, header: &str) -> Option<NodeType> {
        self.spellings.get(&normalize(header)).copied()
    }

    pub fn schema(&self, node_type: NodeType) -> &NodeSchema {
        &self.schemas[node_type.index()]
    }

    /// Every accepted (normalized) spelling of a node type, sorted.
    pub fn spellings_of(&self, node_type: NodeType) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .spellings
            .iter()
            .filter(|(_, ty)| **ty == node_type)
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn spelling_count(&self) -> usize {
        self.spellings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_names_round_trip() {
        for ty in NodeType::ALL {
            assert_eq!(NodeType::from_name(ty.name()), Some(ty));
            assert_eq!(CanonicalHeaderTable::builtin().schema(ty).node_type(), ty);
        }
    }

    #[test]
    fn test_canonicalize_synonyms() {
        let table = CanonicalHeaderTable::builtin();
        assert_eq!(table.canonicalize("Box"), Some(NodeType::Box));
        assert_eq!(table.canonicalize("VRMLBox"), Some(NodeType::Box));
        assert_eq!(table.canonicalize("box"), Some(NodeType::Box));
        assert_eq!(table.canonicalize(" Transform "), Some(NodeType::Transform));
        assert_eq!(table.canonicalize("lod"), Some(NodeType::Lod));
        assert_eq!(table.canonicalize("Teapot"), None);
        assert_eq!(table.spelling_count(), 60);
    }

    #[test]
    fn test_user_synonyms() {
        let table = CanonicalHeaderTable::builtin()
            .with_synonyms([("Cube", "Box"), ("Xform", "transform")])
            .unwrap();
        assert_eq!(table.canonicalize("cube"), Some(NodeType::Box));
        assert_eq!(table.canonicalize("XFORM"), Some(NodeType::Transform));
        assert_eq!(table.spellings_of(NodeType::Box), vec!["box", "cube", "vrmlbox"]);

        // The builtin table is untouched.
        assert_eq!(CanonicalHeaderTable::builtin().canonicalize("Cube"), None);
    }

    #[test]
    fn test_ambiguous_synonym_rejected() {
        let err = CanonicalHeaderTable::builtin()
            .with_synonyms([("BOX", "Sphere")])
            .unwrap_err();
        assert_eq!(
            err,
            HeaderTableError::AmbiguousSynonym {
                synonym: "BOX".into(),
                existing: NodeType::Box,
                requested: NodeType::Sphere,
            }
        );

        assert!(CanonicalHeaderTable::builtin()
            .with_synonyms([("Ball", "Sphere"), ("ball", "Box")])
            .is_err());
    }

    #[test]
    fn test_unknown_canonical_rejected() {
        let err = CanonicalHeaderTable::builtin()
            .with_synonyms([("Pot", "Teapot")])
            .unwrap_err();
        assert!(matches!(err, HeaderTableError::UnknownCanonical { .. }));
    }
}
