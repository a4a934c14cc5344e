use anyhow::Context;
use clap::{Parser, Subcommand};
use face_align::config::{load_config_or_default, ConfigFormat};
use face_align::consistency::{render_composite, render_overlay, ConsistencyRun, ConsistencyValidator};
use face_align::logging::init_logging;
use face_align::pipeline::{AlignmentPipeline, OutcomeSummary};
use face_align::utils::{batch_output_paths, collect_images, load_image, save_image};
use face_align::{Bypass, Config, DetectorSet};
use opencv::core::Mat;
use opencv::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

const COMPOSITE_PANEL_HEIGHT: i32 = 420;

#[derive(Parser)]
#[command(name = "align")]
#[command(about = "Align generated face images onto template faces using facial landmarks")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Align one generated image onto a template
    Align {
        /// Template image whose face position, scale and canvas are kept
        #[arg(short, long)]
        template: PathBuf,

        /// Generated image to reposition
        #[arg(short, long)]
        generated: PathBuf,

        /// Where to write the aligned (or passthrough) image
        #[arg(short, long)]
        output: PathBuf,

        /// Skip the YuNet backend
        #[arg(long)]
        bypass_yunet: bool,

        /// Skip the LBF backend
        #[arg(long)]
        bypass_lbf: bool,

        /// Also write the outcome summary as JSON
        #[arg(short, long)]
        summary: Option<PathBuf>,
    },

    /// Align every image in a directory onto one template
    Batch {
        #[arg(short, long)]
        template: PathBuf,

        /// Directory of generated images
        #[arg(short, long)]
        generated_dir: PathBuf,

        /// Directory for aligned images and batch_results.json
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Worker threads (defaults to the number of CPUs)
        #[arg(short = 'j', long)]
        threads: Option<usize>,
    },

    /// Align with each backend forced and measure cross-backend disagreement
    Consistency {
        #[arg(short, long)]
        template: PathBuf,

        #[arg(short, long)]
        generated: PathBuf,

        /// Directory for aligned outputs and consistency_results.json
        #[arg(short, long, default_value = "results/consistency")]
        work_dir: PathBuf,

        /// Write landmark overlays for every image and backend, plus one
        /// side-by-side composite per backend
        #[arg(long)]
        overlays: bool,
    },

    /// Write the default configuration to a file
    InitConfig {
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config_or_default(cli.config.as_deref());
    let logging = match cli.verbose {
        0 => config.logging.clone(),
        1 => config.logging.clone().with_min_level("debug"),
        _ => config.logging.clone().with_min_level("trace"),
    };
    let _log_guard = init_logging(&logging)?;

    match cli.command {
        Commands::Align {
            template,
            generated,
            output,
            bypass_yunet,
            bypass_lbf,
            summary,
        } => {
            let bypass = Bypass {
                yunet: bypass_yunet,
                lbf: bypass_lbf,
            };
            handle_align(&config, &template, &generated, &output, bypass, summary)?;
        }
        Commands::Batch {
            template,
            generated_dir,
            output_dir,
            threads,
        } => {
            handle_batch(&config, &template, &generated_dir, &output_dir, threads)?;
        }
        Commands::Consistency {
            template,
            generated,
            work_dir,
            overlays,
        } => {
            handle_consistency(&config, &template, &generated, &work_dir, overlays)?;
        }
        Commands::InitConfig { output } => {
            Config::default().save_to_file(&output, ConfigFormat::from_path(&output))?;
            println!("Default configuration written to {}", output.display());
        }
    }

    Ok(())
}

fn load_detectors(config: &Config) -> anyhow::Result<DetectorSet> {
    DetectorSet::load(&config.detectors).context("failed to load landmark models")
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, serde_json::to_string_pretty(value)?)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn handle_align(
    config: &Config,
    template: &Path,
    generated: &Path,
    output: &Path,
    bypass: Bypass,
    summary_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let detectors = load_detectors(config)?;
    let pipeline = AlignmentPipeline::new(&detectors, config.alignment.clone());

    let outcome = pipeline.align_files(generated, template, output, bypass)?;
    let summary = outcome.summary().with_paths(generated, output);

    if summary.success {
        let backend = summary.backend_used.map(|b| b.name()).unwrap_or("none");
        println!("Aligned with {} -> {}", backend, output.display());
        if let Some(t) = &summary.transform {
            println!(
                "  rotation={:.2}°, scale={:.3}x, translation=({:.1}, {:.1})",
                t.rotation_degrees(),
                t.scale,
                t.translation.0,
                t.translation.1
            );
        }
    } else if let Some(reason) = &summary.fallback {
        println!(
            "Alignment skipped ({} failure during {}): {}",
            reason.kind,
            reason.stage,
            reason.message
        );
        println!("Unaligned image written to {}", output.display());
    }

    match summary_path {
        Some(path) => write_json(&path, &summary)?,
        None => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(())
}

#[derive(Serialize)]
struct BatchEntry {
    generated: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<OutcomeSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct BatchResults {
    template: PathBuf,
    total: usize,
    aligned: usize,
    fallbacks: usize,
    failed: usize,
    generated_at: chrono::DateTime<chrono::Utc>,
    results: Vec<BatchEntry>,
}

fn handle_batch(
    config: &Config,
    template: &Path,
    generated_dir: &Path,
    output_dir: &Path,
    threads: Option<usize>,
) -> anyhow::Result<()> {
    let images = collect_images(generated_dir)
        .with_context(|| format!("failed to read {}", generated_dir.display()))?;
    if images.is_empty() {
        anyhow::bail!("no images found in {}", generated_dir.display());
    }
    std::fs::create_dir_all(output_dir)?;
    let outputs = batch_output_paths(&images, output_dir);

    let detectors = load_detectors(config)?;
    let pipeline = AlignmentPipeline::new(&detectors, config.alignment.clone());

    let mut pool = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        pool = pool.num_threads(n);
    }
    let pool = pool.build()?;

    println!("Aligning {} images onto {}...", images.len(), template.display());
    let results: Vec<BatchEntry> = pool.install(|| {
        images
            .par_iter()
            .zip(outputs.par_iter())
            .map(|(generated, output)| {
                match pipeline.align_files(generated, template, output, Bypass::none()) {
                    Ok(outcome) => BatchEntry {
                        generated: generated.clone(),
                        summary: Some(outcome.summary().with_paths(generated, output)),
                        error: None,
                    },
                    Err(e) => {
                        tracing::error!(path = %generated.display(), error = %e, "Batch item failed");
                        BatchEntry {
                            generated: generated.clone(),
                            summary: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            })
            .collect()
    });

    let aligned = results
        .iter()
        .filter(|r| r.summary.as_ref().is_some_and(|s| s.success))
        .count();
    let failed = results.iter().filter(|r| r.error.is_some()).count();
    let report = BatchResults {
        template: template.to_path_buf(),
        total: results.len(),
        aligned,
        fallbacks: results.len() - aligned - failed,
        failed,
        generated_at: chrono::Utc::now(),
        results,
    };

    let results_path = output_dir.join("batch_results.json");
    write_json(&results_path, &report)?;
    println!(
        "Done: {} aligned, {} passed through unaligned, {} failed. Results in {}",
        report.aligned,
        report.fallbacks,
        report.failed,
        results_path.display()
    );
    Ok(())
}

#[derive(Serialize)]
struct ConsistencyResults<'a> {
    alignments: Vec<OutcomeSummary>,
    report: &'a face_align::ConsistencyReport,
}

fn handle_consistency(
    config: &Config,
    template_path: &Path,
    generated_path: &Path,
    work_dir: &Path,
    overlays: bool,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(work_dir)?;
    let detectors = load_detectors(config)?;
    let pipeline = AlignmentPipeline::new(&detectors, config.alignment.clone());
    let validator = ConsistencyValidator::new(&detectors, &config.consistency);

    let template = load_image(template_path)?;
    let generated = load_image(generated_path)?;
    let run = validator.run(&pipeline, &template, &generated)?;

    let mut alignments = Vec::new();
    for (backend, outcome) in &run.alignments {
        let output = work_dir.join(format!("{}.png", ConsistencyRun::output_label(*backend)));
        save_image(&outcome.output, &output)?;
        alignments.push(outcome.summary().with_paths(generated_path, &output));
    }

    if overlays {
        let overlay_dir = work_dir.join("overlays");
        for image in &run.report.images {
            let source = if image.label == "template" {
                &template
            } else {
                match run
                    .alignments
                    .iter()
                    .find(|(b, _)| ConsistencyRun::output_label(*b) == image.label)
                {
                    Some((_, outcome)) => &outcome.output,
                    None => continue,
                }
            };
            for (backend, landmarks) in &image.detections {
                let overlay = render_overlay(source, landmarks)?;
                let path = overlay_dir.join(format!("{}_{}.png", image.label, backend.name()));
                save_image(&overlay, &path)?;
            }
        }

        for (backend, outcome) in &run.alignments {
            let overlaid = |label: &str, image: &Mat| -> anyhow::Result<Mat> {
                match run.report.image(label).and_then(|i| i.detections.get(backend)) {
                    Some(landmarks) => Ok(render_overlay(image, landmarks)?),
                    None => Ok(image.try_clone()?),
                }
            };
            let template_panel = overlaid("template", &template)?;
            let aligned_panel = overlaid(&ConsistencyRun::output_label(*backend), &outcome.output)?;
            let composite = render_composite(
                &[
                    ("template (overlays)", &template_panel),
                    ("generated", &generated),
                    ("aligned (overlays)", &aligned_panel),
                ],
                COMPOSITE_PANEL_HEIGHT,
            )?;
            save_image(&composite, &overlay_dir.join(format!("composite_{}.png", backend.name())))?;
        }
        println!("Overlays and composites written to {}", overlay_dir.display());
    }

    for image in &run.report.images {
        println!(
            "{:<16} {}",
            image.label,
            if image.pass { "PASS" } else { "FAIL" }
        );
        for (name, delta) in &image.per_landmark_deltas {
            println!("  {:<10} dx={:>7.2} dy={:>7.2}", name.name(), delta.dx, delta.dy);
        }
        for note in &image.notes {
            println!("  note: {}", note);
        }
    }
    for note in &run.report.notes {
        println!("note: {}", note);
    }

    let results_path = work_dir.join("consistency_results.json");
    write_json(
        &results_path,
        &ConsistencyResults {
            alignments,
            report: &run.report,
        },
    )?;
    println!(
        "Overall: {}. Results in {}",
        if run.report.pass { "PASS" } else { "FAIL" },
        results_path.display()
    );
    Ok(())
}
