use glam::Vec3;
use wrl_core::{BufferView, Config, ErrorKind};
use wrl_mesh::{convert, Mesh};

const TRIANGLE: &str = "IndexedFaceSet { coord Coordinate { point [ 0 0 0, 1 0 0, 0 1 0 ] } coordIndex [ 0 1 2 -1 ] }";

fn convert_str(text: &str) -> Vec<Mesh> {
    let _ = env_logger::builder().is_test(true).try_init();
    convert(BufferView::from(text), &Config::sequential()).unwrap()
}

#[test]
fn test_box_in_shape() {
    let meshes = convert_str("#VRML V2.0 utf8\nShape { geometry Box { size 2 2 2 } }");
    assert_eq!(meshes.len(), 1);
    assert_eq!(meshes[0].triangle_count(), 12);
    assert_eq!(meshes[0].bounds.extent(), Vec3::splat(2.0));
}

#[test]
fn test_geometry_outside_shape_is_ignored() {
    let meshes = convert_str("DEF A Box { } Transform { children [ USE A Shape { geometry USE A } ] }");
    assert_eq!(meshes.len(), 1);
}

#[test]
fn test_nested_transforms() {
    let text = "Transform { translation 10 0 0 children [\n\
                  Transform { scale 2 2 2 children [ Shape { geometry Box { } } ] }\n\
                ] }";
    let meshes = convert_str(text);
    assert_eq!(meshes.len(), 1);
    assert_eq!(meshes[0].bounds.min, Vec3::new(8.0, -2.0, -2.0));
    assert_eq!(meshes[0].bounds.max, Vec3::new(12.0, 2.0, 2.0));
}

#[test]
fn test_transform_rotation_about_center() {
    let text = format!(
        "Transform {{ center 1 0 0 rotation 0 0 1 3.14159265 children [ Shape {{ geometry {} }} ] }}",
        TRIANGLE
    );
    let meshes = convert_str(&text);
    let positions = &meshes[0].positions;
    assert!(positions[0].abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 1e-5));
    assert!(positions[1].abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-5));
    assert!(positions[2].abs_diff_eq(Vec3::new(2.0, -1.0, 0.0), 1e-5));
}

#[test]
fn test_shared_geometry_is_instanced() {
    let text = format!(
        "DEF Tri Shape {{ geometry {} }}\n\
         Transform {{ translation 5 0 0 children [ USE Tri ] }}",
        TRIANGLE
    );
    let meshes = convert_str(&text);
    assert_eq!(meshes.len(), 2);
    assert_eq!(meshes[0].bounds.min, Vec3::ZERO);
    assert_eq!(meshes[1].bounds.min, Vec3::new(5.0, 0.0, 0.0));
}

#[test]
fn test_switch_and_lod_pick_one_child() {
    let text = "Switch { whichChoice 1 choice [ Shape { geometry Box { size 1 1 1 } } Shape { geometry Box { size 3 3 3 } } ] }\n\
                Switch { choice [ Shape { geometry Box { } } ] }\n\
                LOD { level [ Shape { geometry Box { size 4 4 4 } } Shape { geometry Box { } } ] range [ 10 ] }";
    let meshes = convert_str(text);
    let extents: Vec<Vec3> = meshes.iter().map(|m| m.bounds.extent()).collect();
    assert_eq!(extents, vec![Vec3::splat(3.0), Vec3::splat(4.0)]);
}

#[test]
fn test_clockwise_faces_are_flipped() {
    let text = "Shape { geometry IndexedFaceSet { ccw FALSE coord Coordinate { point [ 0 0 0, 1 0 0, 0 1 0 ] } coordIndex [ 0 1 2 ] } }";
    let meshes = convert_str(text);
    assert_eq!(meshes[0].indices, vec![0, 2, 1]);
    assert_eq!(meshes[0].face_normals(), vec![Vec3::NEG_Z]);
}

#[test]
fn test_sequential_and_parallel_agree() {
    let mut text = String::new();
    for i in 0..50 {
        text.push_str(&format!(
            "Transform {{ translation {} 0 0 rotation 0 1 0 0.5 children [ Shape {{ geometry Box {{ size 1 2 3 }} }} Group {{ children [ Shape {{ geometry {} }} ] }} ] }}\n",
            i, TRIANGLE
        ));
    }
    let sequential = convert(BufferView::from(text.as_str()), &Config::sequential()).unwrap();
    let config = Config {
        parallelism: 4,
        parallel_threshold: 4,
        ..Config::default()
    };
    let parallel = convert(BufferView::from(text.as_str()), &config).unwrap();
    assert_eq!(sequential.len(), 100);
    assert_eq!(sequential, parallel);
}

#[test]
fn test_mesh_errors_carry_node_context() {
    let err = convert(
        BufferView::from("Group { children [ Shape { geometry Box { size 0 1 1 } } ] }"),
        &Config::sequential(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Handler);
    assert!(err.to_string().contains("Box"));

    let err = convert(
        BufferView::from("Shape { geometry IndexedFaceSet { coord Coordinate { point [ 0 0 0 ] } coordIndex [ 0 0 5 -1 ] } }"),
        &Config::sequential(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Handler);
}

#[test]
fn test_wrong_geometry_type_rejected() {
    let err = convert(BufferView::from("Shape { geometry Material { } }"), &Config::sequential()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FieldValidation);
}

#[test]
fn test_unvisited_fields_are_validated() {
    let cases = [
        ("Shape { appearance Appearance { material Teapot { } } geometry Box { } }", ErrorKind::HeaderValidation),
        ("Shape { appearance USE Missing geometry Box { } }", ErrorKind::BindingResolution),
        (
            "Switch { whichChoice 0 choice [ Shape { geometry Box { } } Teapot { } ] }",
            ErrorKind::HeaderValidation,
        ),
        (
            "Switch { whichChoice 0 choice [ Shape { geometry Box { } } USE Missing ] }",
            ErrorKind::BindingResolution,
        ),
        (
            "Collision { proxy USE Missing children [ Shape { geometry Box { } } ] }",
            ErrorKind::BindingResolution,
        ),
        ("WorldInfo { } Group { children [ Teapot { } ] }", ErrorKind::HeaderValidation),
    ];
    for (text, kind) in cases {
        let err = convert(BufferView::from(text), &Config::sequential()).unwrap_err();
        assert_eq!(err.kind(), kind, "{}", text);
    }
}

#[test]
fn test_ignore_unknown_node() {
    let config = Config::sequential().with_ignore_unknown_node(true);
    let text = "Teapot { } Group { children [ Teapot { } Shape { appearance Appearance { material Teapot { } } geometry Box { } } ] }";
    let meshes = convert(BufferView::from(text), &config).unwrap();
    assert_eq!(meshes.len(), 1);

    assert_eq!(
        convert(BufferView::from(text), &Config::sequential()).unwrap_err().kind(),
        ErrorKind::HeaderValidation
    );
}
