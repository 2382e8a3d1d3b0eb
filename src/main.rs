//! Landmark Annotator - command-line front end for the annotation engine.
//!
//! Drives a [`Session`] against the annotation backend to render slices,
//! run landmark inference and export annotation views.

use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use landmark_annotator::{
    config::{
        BackendArgs, CheckConfig, Cli, Command, RenderConfig, SuggestConfig, VisualizeConfig,
        VisualizeMode,
    },
    first_annotated_file, AnnotationPersistence, Axis, Completion, DrawOutcome, EngineConfig,
    HttpBackend, Session, SessionError,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Render(config) => run_render(config).await,
        Command::Suggest(config) => run_suggest(config).await,
        Command::Visualize(config) => run_visualize(config).await,
        Command::Check(config) => run_check(config).await,
    }
}

// =============================================================================
// Shared setup
// =============================================================================

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "landmark_annotator=debug"
    } else {
        "landmark_annotator=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn connect(args: &BackendArgs) -> Result<HttpBackend, String> {
    HttpBackend::with_timeout(&args.server, Duration::from_secs(args.timeout))
        .map_err(|e| e.to_string())
}

/// Build a session over every image the backend lists and open `file`.
async fn open_session(
    backend: HttpBackend,
    file: &str,
    make_config: impl FnOnce(Vec<String>) -> EngineConfig,
) -> Result<Session<HttpBackend>, String> {
    let files = backend
        .list_images()
        .await
        .map_err(|e| format!("Failed to list images: {}", e))?;
    let index = files
        .iter()
        .position(|f| f == file)
        .ok_or_else(|| format!("'{}' is not one of the {} images on the backend", file, files.len()))?;

    let config = make_config(files);
    config.validate()?;

    let mut session = Session::new(backend, config).map_err(|e| e.to_string())?;
    let nav = session
        .select_file(index)
        .await
        .map_err(|e| format!("Failed to open {}: {}", file, e))?;
    info!(
        "Opened {} with {} saved annotations",
        nav.filename, nav.annotation_count
    );
    Ok(session)
}

fn draw_ok(outcome: Result<DrawOutcome, SessionError>) -> Result<(), String> {
    match outcome.map_err(|e| e.to_string())? {
        DrawOutcome::Drawn => Ok(()),
        DrawOutcome::Stale => Err("slice changed while drawing".to_string()),
        DrawOutcome::Failed(e) => Err(format!("Failed to draw slice: {}", e)),
    }
}

fn write_snapshot(session: &Session<HttpBackend>, path: &Path) -> Result<(), String> {
    let image = session
        .snapshot()
        .ok_or_else(|| "no slice has been drawn".to_string())?;
    image
        .save(path)
        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))
}

fn fail(message: impl std::fmt::Display) -> ExitCode {
    error!("{}", message);
    ExitCode::FAILURE
}

// =============================================================================
// Render Command
// =============================================================================

async fn run_render(config: RenderConfig) -> ExitCode {
    init_logging(config.backend.verbose);

    if let Err(e) = config.validate() {
        return fail(format!("Configuration error: {}", e));
    }

    match render(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

async fn render(config: &RenderConfig) -> Result<(), String> {
    let backend = connect(&config.backend)?;
    let display = &config.display;
    let mut session =
        open_session(backend, &config.file, |files| display.engine_config(files, false)).await?;

    draw_ok(session.set_axis(config.axis).await)?;
    if let Some(slice) = config.slice {
        draw_ok(session.set_slice(i64::from(slice)).await)?;
    }
    if config.reference.is_some() {
        draw_ok(session.set_histogram_reference(config.reference.clone()).await)?;
    }
    session.set_binarize(config.binarize);
    session.set_edges(config.edges);

    let image = if config.no_overlays {
        session.frame().map(|frame| frame.image.clone())
    } else {
        session.snapshot()
    };
    let image = image.ok_or_else(|| "no slice has been drawn".to_string())?;
    image
        .save(&config.output)
        .map_err(|e| format!("Failed to write {}: {}", config.output.display(), e))?;

    let state = session.display();
    println!(
        "{} {} slice {} -> {} ({}x{})",
        config.file,
        state.axis,
        state.slice_index,
        config.output.display(),
        image.width(),
        image.height()
    );

    if let Some((x, y)) = config.magnify_point()? {
        session.set_magnifier(true);
        match session.magnify(x, y).map_err(|e| e.to_string())? {
            Some(view) => {
                let path = config.output.with_extension("magnifier.png");
                view.image
                    .save(&path)
                    .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
                println!(
                    "Magnifier at ({}, {}) -> {} (crop {}x{} at {},{})",
                    x,
                    y,
                    path.display(),
                    view.crop.width,
                    view.crop.height,
                    view.crop.x,
                    view.crop.y
                );
            }
            None => warn!("Magnifier point ({}, {}) is outside the slice", x, y),
        }
    }

    Ok(())
}

// =============================================================================
// Suggest Command
// =============================================================================

async fn run_suggest(config: SuggestConfig) -> ExitCode {
    init_logging(config.backend.verbose);

    if let Err(e) = config.validate() {
        return fail(format!("Configuration error: {}", e));
    }

    match suggest(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

async fn suggest(config: &SuggestConfig) -> Result<(), String> {
    let backend = connect(&config.backend)?;
    let display = &config.display;
    let mut session =
        open_session(backend, &config.file, |files| display.engine_config(files, false)).await?;

    let completion = session
        .request_suggestions(config.z_index)
        .await
        .map_err(|e| e.to_string())?;

    let z_index = match completion {
        Some(Completion::Presented { z_index, .. }) => z_index,
        Some(Completion::Failed(e)) => return Err(e.to_string()),
        Some(Completion::Stale) | None => {
            return Err("inference result was superseded".to_string())
        }
    };

    println!("Suggestions for {} (axial slice {}):", config.file, z_index);
    for annotation in session.suggestions().suggestions() {
        println!(
            "  {:<6} x={:<4} y={:<4} z={:<4}",
            annotation.label, annotation.x, annotation.y, annotation.z
        );
    }

    if config.accept {
        let accepted = session.accept_suggestions();
        let saved = session.save().await.map_err(|e| e.to_string())?;
        println!();
        println!("Accepted {} suggestions; saved {} annotations", accepted, saved);
    }

    Ok(())
}

// =============================================================================
// Visualize Command
// =============================================================================

async fn run_visualize(config: VisualizeConfig) -> ExitCode {
    init_logging(config.backend.verbose);

    if let Err(e) = config.validate() {
        return fail(format!("Configuration error: {}", e));
    }

    match visualize(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

async fn visualize(config: &VisualizeConfig) -> Result<(), String> {
    let backend = connect(&config.backend)?;
    let file = match &config.file {
        Some(file) if !config.auto_select() => file.clone(),
        _ => auto_select_file(&backend).await?,
    };
    let display = &config.display;
    let mut session =
        open_session(backend, &file, |files| display.engine_config(files, false)).await?;

    if session.annotations().is_empty() {
        return Err(format!("{} has no saved annotations", file));
    }

    std::fs::create_dir_all(&config.output_dir)
        .map_err(|e| format!("Failed to create {}: {}", config.output_dir.display(), e))?;
    let stem = file
        .trim_end_matches(".gz")
        .trim_end_matches(".nii")
        .replace('/', "_");

    match config.mode {
        VisualizeMode::Overview => {
            let index = annotation_index(&session, &file, config.label.as_deref())?;
            let focus = session.annotations()[index].clone();
            println!(
                "{}: centered on {} at ({}, {}, {})",
                file, focus.label, focus.x, focus.y, focus.z
            );
            write_axis_views(&mut session, index, &config.output_dir, &stem).await?;
        }
        VisualizeMode::Detail => {
            let indices: Vec<usize> = match config.label.as_deref() {
                Some(label) => vec![annotation_index(&session, &file, Some(label))?],
                None => (0..session.annotations().len()).collect(),
            };
            println!("{}: {} annotation(s)", file, indices.len());
            for index in indices {
                let focus = session.annotations()[index].clone();
                println!("{} at ({}, {}, {})", focus.label, focus.x, focus.y, focus.z);
                let prefix = format!("{}_{}", stem, focus.label);
                write_axis_views(&mut session, index, &config.output_dir, &prefix).await?;
            }
        }
    }

    Ok(())
}

/// First file in listing order that has saved annotations.
async fn auto_select_file(backend: &HttpBackend) -> Result<String, String> {
    let files = backend
        .list_images()
        .await
        .map_err(|e| format!("Failed to list images: {}", e))?;
    let annotated = backend
        .list_annotated_files()
        .await
        .map_err(|e| format!("Failed to list annotated files: {}", e))?;
    let file = first_annotated_file(&files, &annotated)
        .ok_or_else(|| "no annotated files on the backend".to_string())?;
    info!("Selected {} automatically", file);
    Ok(file.to_string())
}

fn annotation_index(
    session: &Session<HttpBackend>,
    file: &str,
    label: Option<&str>,
) -> Result<usize, String> {
    match label {
        Some(label) => session
            .annotations()
            .iter()
            .position(|a| a.label == label)
            .ok_or_else(|| format!("{} has no '{}' annotation", file, label)),
        None => Ok(0),
    }
}

/// Write one PNG per axis, each on the slice through annotation `index`.
async fn write_axis_views(
    session: &mut Session<HttpBackend>,
    index: usize,
    output_dir: &Path,
    prefix: &str,
) -> Result<(), String> {
    for axis in Axis::ALL {
        draw_ok(session.set_axis(axis).await)?;
        draw_ok(session.focus_annotation(index).await)?;

        let path = output_dir.join(format!("{}_{}.png", prefix, axis));
        write_snapshot(session, &path)?;
        println!(
            "  {:<9} slice {:<4} -> {}",
            axis,
            session.display().slice_index,
            path.display()
        );
    }
    Ok(())
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    // Initialize minimal logging for check command
    if config.backend.verbose {
        init_logging(true);
    }

    println!("Landmark Annotator Backend Check");
    println!("═════════════════════════════════");
    println!();

    if let Err(e) = config.validate() {
        println!("✗ Configuration: {}", e);
        return ExitCode::FAILURE;
    }
    println!("✓ Server: {}", config.backend.server);
    println!();

    let backend = match connect(&config.backend) {
        Ok(backend) => backend,
        Err(e) => {
            println!("✗ Client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    print!("Listing images... ");
    let images = match backend.list_images().await {
        Ok(images) => {
            println!("✓ {} image(s)", images.len());
            images
        }
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            println!();
            println!("Please check:");
            println!("  - The backend is running at {}", config.backend.server);
            println!("  - The server's data directory contains .nii/.nii.gz files");
            return ExitCode::FAILURE;
        }
    };

    print!("Listing annotated files... ");
    let annotated = match backend.list_annotated_files().await {
        Ok(annotated) => {
            println!("✓ {} annotated", annotated.len());
            annotated
        }
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if config.list_files {
        println!();
        println!("Images:");
        println!("───────");

        if images.is_empty() {
            println!("  (no images found)");
        } else {
            for image in &images {
                let mark = if annotated.contains(image) { "✓" } else { " " };
                println!("  {} {}", mark, image);
            }
        }
    }

    println!();
    println!("═════════════════════════════════");
    println!("✓ All checks passed!");

    ExitCode::SUCCESS
}
