use std::env;
use std::fs;
use std::path::PathBuf;

use assembly::globe::assemble;
use mesh::worker::new_triangulator;
use picking::asset::{LookupDocument, encode_id_map};
use picking::codec::CountryIdCodec;
use picking::raster::RasterSize;
use topology::builder::{TopologyOptions, build_topology};
use topology::document::Topology;
use topology::geojson::FeatureCollection;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = real_main() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<(), String> {
    let mut args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(usage());
    }

    let cmd = args[1].clone();
    args.drain(0..2);

    match cmd.as_str() {
        "topology" => cmd_topology(args),
        "id-map" => cmd_id_map(args),
        "mesh-stats" => cmd_mesh_stats(args),
        _ => Err(usage()),
    }
}

fn cmd_topology(args: Vec<String>) -> Result<(), String> {
    // globe topology <input.geojson> <output.json> [--tolerance T] [--quantization Q]
    if args.len() < 2 {
        return Err(usage());
    }

    let input = PathBuf::from(&args[0]);
    let output = PathBuf::from(&args[1]);

    let mut options = TopologyOptions::default();

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--tolerance" => {
                i += 1;
                if i >= args.len() {
                    return Err("--tolerance requires a value".to_string());
                }
                options.simplify_tolerance = args[i]
                    .parse::<f64>()
                    .map_err(|_| "--tolerance must be a number".to_string())?;
            }
            "--quantization" => {
                i += 1;
                if i >= args.len() {
                    return Err("--quantization requires a value".to_string());
                }
                options.quantization = args[i]
                    .parse::<f64>()
                    .map_err(|_| "--quantization must be a number".to_string())?;
            }
            other => {
                return Err(format!("unknown arg: {other}\n\n{}", usage()));
            }
        }
        i += 1;
    }

    let text = fs::read_to_string(&input).map_err(|e| format!("read {input:?}: {e}"))?;
    let collection =
        FeatureCollection::from_geojson_str(&text).map_err(|e| format!("parse geojson: {e}"))?;

    let topo = build_topology(&collection, &options);
    topo.validate().map_err(|e| format!("topology: {e}"))?;

    let payload = topo
        .to_json_string_pretty()
        .map_err(|e| format!("encode topology: {e}"))?;
    fs::write(&output, &payload).map_err(|e| format!("write {output:?}: {e}"))?;

    let feature_count: usize = topo.objects.values().map(|o| o.features.len()).sum();
    eprintln!(
        "wrote {} ({} arcs, {} features, blake3={})",
        output.display(),
        topo.arcs.len(),
        feature_count,
        blake3::hash(payload.as_bytes()).to_hex()
    );
    Ok(())
}

fn cmd_id_map(args: Vec<String>) -> Result<(), String> {
    // globe id-map <input.geojson> <output_dir> [--width W] [--height H]
    if args.len() < 2 {
        return Err(usage());
    }

    let input = PathBuf::from(&args[0]);
    let out_dir = PathBuf::from(&args[1]);

    let mut width: u32 = 2048;
    let mut height: u32 = 1024;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--width" => {
                i += 1;
                if i >= args.len() {
                    return Err("--width requires a value".to_string());
                }
                width = args[i]
                    .parse::<u32>()
                    .map_err(|_| "--width must be an integer".to_string())?;
            }
            "--height" => {
                i += 1;
                if i >= args.len() {
                    return Err("--height requires a value".to_string());
                }
                height = args[i]
                    .parse::<u32>()
                    .map_err(|_| "--height must be an integer".to_string())?;
            }
            other => {
                return Err(format!("unknown arg: {other}\n\n{}", usage()));
            }
        }
        i += 1;
    }

    let text = fs::read_to_string(&input).map_err(|e| format!("read {input:?}: {e}"))?;
    let collection =
        FeatureCollection::from_geojson_str(&text).map_err(|e| format!("parse geojson: {e}"))?;

    let codec = CountryIdCodec::build(&collection.features, RasterSize::new(width, height))
        .map_err(|e| format!("id map: {e}"))?;

    fs::create_dir_all(&out_dir).map_err(|e| format!("create {out_dir:?}: {e}"))?;

    let gidm = encode_id_map(codec.texture());
    let gidm_path = out_dir.join("countries.gidm");
    fs::write(&gidm_path, &gidm).map_err(|e| format!("write {gidm_path:?}: {e}"))?;

    let lookup = LookupDocument::from_codec(&codec, &iso_timestamp_now());
    let lookup_path = out_dir.join("countries.lookup.json");
    let payload = lookup
        .to_json_string_pretty()
        .map_err(|e| format!("encode lookup: {e}"))?;
    fs::write(&lookup_path, payload).map_err(|e| format!("write {lookup_path:?}: {e}"))?;

    eprintln!(
        "wrote {} ({} countries, {}x{}, blake3={})",
        gidm_path.display(),
        codec.entries().len(),
        width,
        height,
        blake3::hash(&gidm).to_hex()
    );
    eprintln!("wrote {}", lookup_path.display());
    Ok(())
}

fn cmd_mesh_stats(args: Vec<String>) -> Result<(), String> {
    // globe mesh-stats <topology.json> [--radius R]
    if args.is_empty() {
        return Err(usage());
    }

    let input = PathBuf::from(&args[0]);
    let mut radius: f64 = 1.0;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--radius" => {
                i += 1;
                if i >= args.len() {
                    return Err("--radius requires a value".to_string());
                }
                radius = args[i]
                    .parse::<f64>()
                    .map_err(|_| "--radius must be a number".to_string())?;
            }
            other => {
                return Err(format!("unknown arg: {other}\n\n{}", usage()));
            }
        }
        i += 1;
    }

    let text = fs::read_to_string(&input).map_err(|e| format!("read {input:?}: {e}"))?;
    let topo = Topology::from_json_str(&text).map_err(|e| format!("parse topology: {e}"))?;

    let mut triangulator = new_triangulator();
    let globe =
        assemble(&topo, triangulator.as_mut(), radius).map_err(|e| format!("assemble: {e}"))?;

    println!(
        "borders: {} vertices, {} segments",
        globe.borders.vertex_count(),
        globe.borders.segment_count()
    );
    for (country, mesh) in &globe.fills {
        println!(
            "{country}: {} vertices, {} triangles",
            mesh.vertex_count(),
            mesh.triangle_count()
        );
    }
    Ok(())
}

fn iso_timestamp_now() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let (year, month, day) = civil_from_days((secs / 86_400) as i64);
    let rem = secs % 86_400;
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}Z",
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60
    )
}

/// Gregorian date from days since the unix epoch.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

fn usage() -> String {
    let exe = env::args().next().unwrap_or_else(|| "globe".to_string());
    format!(
        "Usage:\n  {exe} topology <input.geojson> <output.json> [--tolerance T] [--quantization Q]\n  {exe} id-map <input.geojson> <output_dir> [--width W] [--height H]\n  {exe} mesh-stats <topology.json> [--radius R]\n\nNotes:\n- `topology` deduplicates shared borders into arcs and writes a quantized Topology document.\n- `id-map` writes a GIDM picking raster plus a JSON color lookup next to it.\n- `mesh-stats` assembles border and fill meshes from a topology and prints their sizes.\n"
    )
}
