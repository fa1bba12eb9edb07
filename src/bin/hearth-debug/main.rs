// src/bin/hearth-debug/main.rs
mod program;

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use hearth_core::BoxId;
use hearth_layout::{LayoutUpdate, SolverConfig, DEFAULT_EPSILON};
use serde::Serialize;
use tracing::{info, warn};

use program::{Loaded, Program, Size};

#[derive(Parser)]
#[command(name = "hearth-debug")]
#[command(about = "Solve a Hearth layout program and print the resulting box geometry")]
struct Args {
    /// Path to the JSON layout program
    program: PathBuf,

    /// Viewport width. Overrides the value in the program.
    #[arg(long)]
    width: Option<f64>,

    /// Viewport height. Overrides the value in the program.
    #[arg(long)]
    height: Option<f64>,

    /// Extra resize to replay after the program's own, as WIDTHxHEIGHT
    #[arg(long, value_parser = parse_size)]
    resize: Vec<Size>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Tree)]
    format: Format,

    /// Save output to file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Solver tolerance
    #[arg(long, default_value_t = DEFAULT_EPSILON)]
    epsilon: f64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Tree,
    Json,
}

fn parse_size(text: &str) -> std::result::Result<Size, String> {
    let (width, height) = text
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{text}'"))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid dimension '{part}': {e}"))
    };
    Ok(Size {
        width: parse(width)?,
        height: parse(height)?,
    })
}

#[derive(Serialize)]
struct Frame {
    viewport: [f64; 2],
    /// Size the listed geometry was solved for.
    layout_viewport: [f64; 2],
    boxes: Vec<BoxReport>,
    changed: Vec<BoxId>,
    diagnostics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct BoxReport {
    id: BoxId,
    name: Option<String>,
    parent: Option<BoxId>,
    geometry: Option<hearth_core::Geometry>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let program = Program::load(&args.program)?;
    let viewport = Size {
        width: args.width.unwrap_or(program.viewport.width),
        height: args.height.unwrap_or(program.viewport.height),
    };
    info!("Loaded {} boxes, {} constraints", program.boxes.len(), program.constraints.len());

    let config = SolverConfig::default().with_epsilon(args.epsilon);
    let mut loaded = program.build(viewport, config)?;

    let initial = LayoutUpdate {
        changed: loaded.session.tree().preorder(),
        stats: loaded.session.last_update().stats,
    };
    let mut frames = vec![frame(&loaded, &initial, None)];

    for size in program.resizes.iter().chain(&args.resize) {
        match loaded.session.on_resize(size.width, size.height) {
            Ok(update) => frames.push(frame(&loaded, &update, None)),
            Err(err) => {
                warn!("Resize to {}x{} failed: {}", size.width, size.height, err);
                frames.push(frame(&loaded, &LayoutUpdate::default(), Some(err.to_string())));
            }
        }
    }

    let output_text = match args.format {
        Format::Tree => tree_output(&loaded, &frames),
        Format::Json => serde_json::to_string_pretty(&frames)
            .context("Failed to serialize layout")?
            + "\n",
    };

    if let Some(output_file) = args.output {
        fs::write(&output_file, output_text)
            .with_context(|| format!("Failed to write to file: {}", output_file.display()))?;
        println!("Output written to: {}", output_file.display());
    } else {
        print!("{}", output_text);
    }

    Ok(())
}

fn frame(loaded: &Loaded, update: &LayoutUpdate, error: Option<String>) -> Frame {
    let session = &loaded.session;
    let tree = session.tree();
    let boxes = tree
        .preorder()
        .into_iter()
        .filter_map(|id| tree.get(id))
        .map(|b| BoxReport {
            id: b.id,
            name: b.name.clone(),
            parent: b.parent,
            geometry: b.geometry,
        })
        .collect();
    Frame {
        viewport: session.viewport().to_array(),
        layout_viewport: session.layout_viewport().to_array(),
        boxes,
        changed: update.changed.clone(),
        diagnostics: session.diagnostics().iter().map(ToString::to_string).collect(),
        error,
    }
}

fn tree_output(loaded: &Loaded, frames: &[Frame]) -> String {
    let mut output = String::new();
    for (index, frame) in frames.iter().enumerate() {
        let _ = writeln!(
            output,
            "== {} {}x{} ==",
            if index == 0 { "layout" } else { "resize" },
            frame.viewport[0],
            frame.viewport[1]
        );
        if let Some(error) = &frame.error {
            let _ = writeln!(output, "error: {error} (previous layout kept)");
            continue;
        }
        let root = loaded.session.root();
        render_box_tree(&mut output, frame, root, "", true, true);
        if index > 0 {
            let changed: Vec<String> = frame
                .changed
                .iter()
                .map(|&id| loaded.name_of(id).map_or_else(|| id.to_string(), str::to_string))
                .collect();
            let _ = writeln!(output, "changed: [{}]", changed.join(", "));
        }
        for diagnostic in &frame.diagnostics {
            let _ = writeln!(output, "note: {diagnostic}");
        }
    }
    output
}

fn render_box_tree(
    output: &mut String,
    frame: &Frame,
    id: BoxId,
    prefix: &str,
    is_last: bool,
    is_root: bool,
) {
    let Some(report) = frame.boxes.iter().find(|b| b.id == id) else {
        return;
    };
    let branch = match (is_root, is_last) {
        (true, _) => "",
        (false, true) => "└── ",
        (false, false) => "├── ",
    };
    let label = report.name.as_deref().unwrap_or("<anon>");
    let _ = write!(output, "{prefix}{branch}{label} {}", report.id);
    match report.geometry {
        Some(g) => {
            let _ = writeln!(
                output,
                " pos:({:.1},{:.1}) size:({:.1},{:.1})",
                g.left, g.top, g.width, g.height
            );
        }
        None => output.push('\n'),
    }

    let children: Vec<BoxId> = frame
        .boxes
        .iter()
        .filter(|b| b.parent == Some(id))
        .map(|b| b.id)
        .collect();
    let child_prefix = match (is_root, is_last) {
        (true, _) => String::new(),
        (false, true) => format!("{prefix}    "),
        (false, false) => format!("{prefix}│   "),
    };
    for (i, &child) in children.iter().enumerate() {
        render_box_tree(output, frame, child, &child_prefix, i + 1 == children.len(), false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        let size = |width, height| -> std::result::Result<Size, String> {
            Ok(Size { width, height })
        };
        assert_eq!(parse_size("800x600"), size(800.0, 600.0));
        assert_eq!(parse_size("1024X768.5"), size(1024.0, 768.5));
        assert!(parse_size("800").is_err());
        assert!(parse_size("axb").is_err());
    }

    #[test]
    fn test_tree_output_lists_boxes() {
        let program = Program::parse(
            r#"{ "viewport": { "width": 100, "height": 50 },
                 "boxes": [ { "name": "a", "intrinsic": { "width": 10, "height": 10 } },
                            { "name": "b", "parent": "a" } ] }"#,
        )
        .unwrap();
        let loaded = program.build(program.viewport, SolverConfig::default()).unwrap();
        let update = LayoutUpdate::default();
        let text = tree_output(&loaded, &[frame(&loaded, &update, None)]);
        assert!(text.starts_with("== layout 100x50 ==\nroot #0 pos:(0.0,0.0) size:(100.0,50.0)\n"));
        assert!(text.contains("└── a #1 pos:(0.0,0.0) size:(10.0,10.0)\n"));
        assert!(text.contains("    └── b #2"));
    }
}
