use std::fs;
use std::path::PathBuf;
use coverage_vrp_solver::visualization::svg_to_png_file;

/// Converts every SVG of a directory (default `results`) to PNG.
fn main() {
    env_logger::init();

    let dir = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("results"));
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("Cannot read {:?}: {}", dir, e);
            std::process::exit(1);
        }
    };

    let mut converted = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().map(|ext| ext == "svg").unwrap_or(false) {
            let svg = match fs::read_to_string(&path) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Failed to read {:?}: {}", path, e);
                    continue;
                }
            };
            let out = path.with_extension("png");
            match svg_to_png_file(&svg, &out) {
                Ok(()) => {
                    converted += 1;
                    println!("Converted {:?} -> {:?}", path, out);
                }
                Err(e) => eprintln!("Failed to convert {:?}: {}", path, e),
            }
        }
    }

    println!("{} file(s) converted", converted);
}
