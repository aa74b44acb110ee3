use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use skilltree_editor::editor::FileStorage;
use skilltree_editor::export::{calculate_bounds, validate_import};
use skilltree_editor::images::FileImageSource;
use skilltree_editor::{
    export_game_bundle, load_config, EditorConfig, EditorDocument, EditorStore, ExportOptions,
    PerkCatalog, TreeDocument, TreeViewer, ValidationErrors,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about = "Validate, import and export skill tree documents", long_about = None)]
struct Args {
    /// Editor configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a document for problems that would block a game export
    Validate {
        /// Editor document (JSON)
        document: PathBuf,
        /// Perk catalog (JSON)
        #[arg(long)]
        perks: PathBuf,
    },
    /// Write the game bundle for a document
    Export {
        /// Editor document (JSON)
        document: PathBuf,
        /// Perk catalog (JSON)
        #[arg(long)]
        perks: PathBuf,
        /// Output directory
        #[arg(long, short)]
        out: PathBuf,
        /// Directory relative icon and image paths resolve against
        #[arg(long)]
        assets: Option<PathBuf>,
        /// Also write preview.svg rendered the way the viewer draws the tree
        #[arg(long)]
        preview: bool,
    },
    /// Replace the editor's saved document with an exported one
    Import {
        /// Editor document to import (JSON)
        document: PathBuf,
        /// Perk catalog (JSON)
        #[arg(long)]
        perks: PathBuf,
        /// Snapshot file of the editor
        #[arg(long)]
        store: PathBuf,
    },
    /// Print a summary of a document
    Info {
        /// Editor document (JSON)
        document: PathBuf,
    },
}

fn read_document(path: &Path) -> Result<EditorDocument> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    EditorDocument::from_json(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_problems(header: &str, problems: &[String]) {
    eprintln!("{header}");
    for problem in problems {
        eprintln!("  - {problem}");
    }
}

fn main() -> Result<()> {
    // Set up logging
    env_logger::init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path),
        None => EditorConfig::default(),
    };

    match args.command {
        Command::Validate { document, perks } => {
            let doc = read_document(&document)?;
            let catalog = PerkCatalog::load(&perks)?;
            let problems = skilltree_editor::export::validate_for_export(&doc, &catalog);
            if !problems.is_empty() {
                print_problems("Document cannot be exported:", &problems);
                bail!("{} problem(s) found", problems.len());
            }
            println!("{} is ready for export", document.display());
        }
        Command::Export {
            document,
            perks,
            out,
            assets,
            preview,
        } => {
            let doc = read_document(&document)?;
            let catalog = PerkCatalog::load(&perks)?;
            let base = assets.unwrap_or_else(|| {
                document
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default()
            });
            let source = FileImageSource::new(base);
            let options = ExportOptions {
                atlas: config.atlas,
                borders: None,
            };

            let bundle = match export_game_bundle(&doc, &catalog, &source, &options) {
                Ok(bundle) => bundle,
                Err(e) => {
                    if let Some(validation) = e.downcast_ref::<ValidationErrors>() {
                        print_problems("Document cannot be exported:", &validation.0);
                    }
                    return Err(e);
                }
            };
            bundle.write_to_dir(&out)?;

            if preview {
                let mut viewer = TreeViewer::new(TreeDocument::from_game_export(&bundle.game));
                viewer.initialize_precomputed();
                if let Some(svg) = viewer.render_svg(Some(skilltree_editor::export::ATLAS_FILE)) {
                    let path = out.join("preview.svg");
                    std::fs::write(&path, svg)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                }
            }
            println!(
                "Exported {} nodes and {} connections to {}",
                bundle.game.nodes.len(),
                bundle.game.connections.len(),
                out.display()
            );
        }
        Command::Import {
            document,
            perks,
            store,
        } => {
            let doc = read_document(&document)?;
            let catalog = PerkCatalog::load(&perks)?;
            let unknown = validate_import(&doc, &catalog);
            if !unknown.is_empty() {
                print_problems("Document uses perks missing from the catalog:", &unknown);
                bail!("import aborted");
            }

            let mut editor = EditorStore::new(config, Box::new(FileStorage::new(&store)));
            editor.import_data(doc);
            editor.flush();
            let warnings = editor.take_warnings();
            if !warnings.is_empty() {
                print_problems("Import finished with warnings:", &warnings);
            }
            println!("Imported {} into {}", document.display(), store.display());
        }
        Command::Info { document } => {
            let doc = read_document(&document)?;
            let bounds = calculate_bounds(&doc);
            println!("nodes:       {}", doc.nodes.len());
            println!("connections: {}", doc.connections.len());
            println!("images:      {}", doc.images.len());
            println!("orbits:      {}", doc.orbits.len());
            println!(
                "bounds:      {}x{} at ({}, {})",
                bounds.width, bounds.height, bounds.x, bounds.y
            );
        }
    }
    Ok(())
}
