//! End-to-end parse, validate and traverse runs.

use glam::{Mat4, Vec3};
use wrl_core::{
    parse_str, traverse_roots, CanonicalHeaderTable, Config, ConversionContext, DispatchTable, ErrorKind,
    FieldShape, HandlerError, HandlerParams, NodeId, NodeType, TraversalError, ValidationError,
};

/// Emits each node's id, then recurses into node-valued fields in the order
/// they are written.
fn identity(mut params: HandlerParams<'_, NodeId>) -> Result<ConversionContext<NodeId>, HandlerError> {
    params.context.push(params.view.id());

    let view = params.view.clone();
    let schema = view.headers().schema(view.node_type());
    for field in &view.document()[view.id()].fields {
        let child = match schema.spec(&field.name).map(|spec| spec.shape) {
            Some(FieldShape::Node(_)) => params.traverse_child(&field.name)?,
            Some(FieldShape::NodeArray) => params.traverse_children(&field.name)?,
            _ => continue,
        };
        params.context.merge(child);
    }
    Ok(params.context)
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn identity_table() -> DispatchTable<NodeId> {
    let mut table = DispatchTable::new();
    table.register_many(&NodeType::ALL, identity);
    table
}

fn parallel() -> Config {
    Config {
        parallelism: 4,
        parallel_threshold: 0,
        ..Config::default()
    }
}

/// A reference-free scene with a few hundred nodes.
fn large_scene() -> String {
    let mut text = String::from("#VRML V2.0 utf8\nWorldInfo { title \"generated\" }\n");
    for i in 0..40 {
        text.push_str(&format!(
            "Transform {{\n  translation {i} 0 0\n  children [\n    Shape {{\n      geometry IndexedFaceSet {{ coord Coordinate {{ point [ 0 0 0, 1 0 0, 1 1 0 ] }} coordIndex [ 0 1 2 -1 ] }}\n      appearance Appearance {{ material Material {{ diffuseColor 1 0 0 }} }}\n    }}\n    Group {{ children [ Shape {{ geometry Sphere {{ radius {r} }} }} Switch {{ whichChoice 0 choice [ Shape {{ geometry Cone {{ }} }} ] }} ] }}\n  ]\n}}\n",
            i = i,
            r = 0.5 + i as f32
        ));
    }
    text
}

#[test]
fn test_identity_handlers_follow_declaration_order() {
    init_logger();
    let doc = parse_str(&large_scene()).unwrap();
    let result = traverse_roots(&doc, CanonicalHeaderTable::builtin(), &identity_table(), &Config::sequential()).unwrap();

    let expected: Vec<NodeId> = (0..doc.node_count()).collect();
    assert_eq!(result.contributions(), expected.as_slice());
}

#[test]
fn test_identity_order_with_reordered_fields() {
    init_logger();
    // Written order, not schema order, decides the output.
    let doc = parse_str("Shape { geometry Box { } appearance Appearance { material Material { } } }").unwrap();
    let result = traverse_roots(&doc, CanonicalHeaderTable::builtin(), &identity_table(), &Config::sequential()).unwrap();
    assert_eq!(result.contributions(), &[0, 1, 2, 3]);
}

#[test]
fn test_sequential_and_parallel_are_identical() {
    init_logger();
    let doc = parse_str(&large_scene()).unwrap();
    let table = identity_table();

    let sequential = traverse_roots(&doc, CanonicalHeaderTable::builtin(), &table, &Config::sequential()).unwrap();
    for _ in 0..4 {
        let parallel = traverse_roots(&doc, CanonicalHeaderTable::builtin(), &table, &parallel()).unwrap();
        assert_eq!(parallel, sequential);
    }
}

#[test]
fn test_bound_document_always_resolves() {
    init_logger();
    let text = "DEF Leaf Shape { geometry DEF Ball Sphere { } }\n\
                Group { children [ USE Leaf Transform { children [ USE Leaf Shape { geometry USE Ball } ] } ] }";
    let doc = parse_str(text).unwrap();
    for config in [Config::sequential(), parallel()] {
        let result = traverse_roots(&doc, CanonicalHeaderTable::builtin(), &identity_table(), &config).unwrap();
        assert_eq!(result.len(), 2 + 1 + 2 + 1 + 2 + 2);
    }
}

#[test]
fn test_use_before_def_resolves() {
    init_logger();
    let text = "Group { children [ USE Later Transform { children [ USE Later ] } ] }\n\
                DEF Later Shape { geometry Box { } }";
    let doc = parse_str(text).unwrap();
    for config in [Config::sequential(), parallel()] {
        let result = traverse_roots(&doc, CanonicalHeaderTable::builtin(), &identity_table(), &config).unwrap();
        // Group, Later, Box, Transform, Later, Box, then the root Later and its Box.
        assert_eq!(result.contributions(), &[0, 2, 3, 1, 2, 3, 2, 3]);
    }
}

#[test]
fn test_removed_binding_reports_its_name() {
    init_logger();
    let text = "Shape { geometry Sphere { } }\n\
                Group { children [ USE Leaf Transform { children [ USE Leaf ] } ] }";
    let doc = parse_str(text).unwrap();
    for config in [Config::sequential(), parallel()] {
        let failure = traverse_roots(&doc, CanonicalHeaderTable::builtin(), &identity_table(), &config).unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::BindingResolution);
        match &failure.error {
            TraversalError::Validation(ValidationError::Binding(err)) => assert_eq!(err.name, "Leaf"),
            other => panic!("Expected a binding error, got {:?}", other),
        }
        assert_eq!(failure.partial.contributions(), &[0, 1]);
    }
}

#[test]
fn test_unknown_header_rejects_regardless_of_fields() {
    init_logger();
    for text in ["Teapot { }", "Teapot { size 2 2 2 }", "Teapot { children [ Box { } ] }", "Teapot { bogus \"x\" bogus 1 }"] {
        let doc = parse_str(text).unwrap();
        let failure = traverse_roots(&doc, CanonicalHeaderTable::builtin(), &identity_table(), &Config::sequential()).unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::HeaderValidation, "{}", text);
    }
}

#[test]
fn test_duplicate_field_always_rejects() {
    init_logger();
    for text in ["Box { size 1 1 1 size 2 2 2 }", "Sphere { radius 1 radius 1 }", "Group { children [ Box { } Box { bogus 1 bogus 1 } ] }"] {
        let doc = parse_str(text).unwrap();
        let failure = traverse_roots(&doc, CanonicalHeaderTable::builtin(), &identity_table(), &Config::sequential()).unwrap_err();
        assert!(
            matches!(failure.error, TraversalError::Validation(ValidationError::DuplicateField { .. })),
            "{}: {:?}",
            text,
            failure.error
        );
    }
}

#[test]
fn test_scaled_unit_cube() {
    init_logger();
    let doc = parse_str("Box { size 2 2 2 }").unwrap();
    let mut table: DispatchTable<Mat4> = DispatchTable::new();
    table.register_fn(NodeType::Box, |mut params| {
        let size = params.view.get_vec3("size")?;
        params.context.push(Mat4::from_scale(size));
        Ok(params.context)
    });

    let result = traverse_roots(&doc, CanonicalHeaderTable::builtin(), &table, &Config::default()).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.contributions()[0].transform_point3(Vec3::ONE), Vec3::splat(2.0));
}

#[test]
fn test_use_inside_transform_dispatches_bound_box() {
    init_logger();
    let doc = parse_str("DEF A Box {} Transform { children [ USE A ] }").unwrap();
    let mut table: DispatchTable<(&'static str, NodeId)> = DispatchTable::new();
    table.register_fn(NodeType::Transform, |mut params| {
        let children = params.traverse_children("children")?;
        params.context.merge(children);
        Ok(params.context)
    });
    // A root-level DEF only declares the box; it is instanced by the Transform.
    table.register_fn(NodeType::Box, |mut params| {
        if params.has_ancestor(NodeType::Transform) {
            params.context.push(("Box", params.view.id()));
        }
        Ok(params.context)
    });

    let result = traverse_roots(&doc, CanonicalHeaderTable::builtin(), &table, &Config::sequential()).unwrap();
    assert_eq!(result.contributions(), &[("Box", 0)]);
}

#[test]
fn test_missing_binding_keeps_nothing() {
    init_logger();
    let doc = parse_str("Transform { children [ USE Missing ] }").unwrap();
    let mut table: DispatchTable<&'static str> = DispatchTable::new();
    table.register_fn(NodeType::Transform, |mut params| {
        params.context.push("transform");
        let children = params.traverse_children("children")?;
        params.context.merge(children);
        Ok(params.context)
    });
    table.register_fn(NodeType::Box, |mut params| {
        params.context.push("box");
        Ok(params.context)
    });

    let failure = traverse_roots(&doc, CanonicalHeaderTable::builtin(), &table, &Config::sequential()).unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::BindingResolution);
    assert!(failure.to_string().contains("Missing"));
    assert!(failure.partial.is_empty());
}

#[test]
fn test_config_from_json_drives_traversal() {
    init_logger();
    let config = Config::from_json(r#"{ "parallelism": 2, "parallelThreshold": 1, "synonyms": { "Cube": "Box" } }"#).unwrap();
    let headers = config.header_table().unwrap();
    let doc = parse_str("Group { children [ Cube { } VRMLBox { } box { } ] }").unwrap();

    let result = traverse_roots(&doc, &headers, &identity_table(), &config).unwrap();
    assert_eq!(result.contributions(), &[0, 1, 2, 3]);
}
