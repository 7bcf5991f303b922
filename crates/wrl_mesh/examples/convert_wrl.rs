//! Example: Convert a VRML file to meshes and print a summary.
//!
//! Run with: cargo run --example convert_wrl -- scene.wrl [config.json]

use std::env;
use std::fs;
use std::time::Instant;

use anyhow::{Context, Result};
use wrl_core::{BufferView, Config};
use wrl_mesh::Mesh;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: convert_wrl <path-to-wrl-file> [config.json]");
        println!("\nExamples:");
        println!("  cargo run --example convert_wrl -- scene.wrl");
        println!("  RUST_LOG=debug cargo run --example convert_wrl -- scene.wrl config.json");
        return Ok(());
    }

    let path = &args[1];
    let config = match args.get(2) {
        Some(config_path) => {
            let text = fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config {}", config_path))?;
            Config::from_json(&text).with_context(|| format!("Invalid config {}", config_path))?
        }
        None => Config::default(),
    };

    println!("Loading VRML file: {}", path);
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path))?;

    let start = Instant::now();
    let meshes = wrl_mesh::convert(BufferView::whole(&bytes), &config)
        .with_context(|| format!("Failed to convert {}", path))?;
    println!("Converted in {:?}", start.elapsed());

    println!("\n--- Meshes ---");
    for (i, mesh) in meshes.iter().enumerate() {
        println!(
            "  [{}] {} vertices, {} triangles",
            i,
            mesh.vertex_count(),
            mesh.triangle_count()
        );
    }

    let combined: Mesh = meshes.iter().collect();
    let bounds = combined.bounds;
    println!("\n--- Scene ---");
    println!("  Meshes: {}", meshes.len());
    println!("  Total triangles: {}", combined.triangle_count());
    if !bounds.is_empty() {
        println!("  Min: ({:.2}, {:.2}, {:.2})", bounds.min.x, bounds.min.y, bounds.min.z);
        println!("  Max: ({:.2}, {:.2}, {:.2})", bounds.max.x, bounds.max.y, bounds.max.z);
    }

    Ok(())
}
