use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "mockup", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a PSD/PSB template and print it as JSON.
    Inspect(InspectArgs),
    /// Render designs into a PSD/PSB template and write a PNG or JPEG.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Input PSD/PSB file.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Also decode layer pixels and report snapshot counts.
    #[arg(long)]
    snapshots: bool,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input PSD/PSB file.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Design image as `TARGET=PATH` (TARGET matches a smart-object id or name). Repeatable.
    #[arg(long = "design", value_name = "TARGET=PATH")]
    designs: Vec<String>,

    /// How designs are fitted into their areas.
    #[arg(long, value_enum, default_value_t = FitChoice::Fill)]
    fit: FitChoice,

    /// Output path; `.png`, `.jpg` or `.jpeg`.
    #[arg(long)]
    out: PathBuf,

    /// Uniform output scale.
    #[arg(long, default_value_t = 1.0)]
    scale: f64,

    /// Perspective backend (defaults to `MOCKUP_PERSPECTIVE` or mesh).
    #[arg(long, value_enum)]
    perspective: Option<PerspectiveChoice>,

    /// Grid size for the subdivide backend.
    #[arg(long)]
    grid: Option<u32>,

    /// JPEG quality (1-100).
    #[arg(long, default_value_t = mockup::DEFAULT_JPEG_QUALITY)]
    quality: u8,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FitChoice {
    Fill,
    Contain,
    Cover,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PerspectiveChoice {
    Mesh,
    Subdivide,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Inspect(args) => cmd_inspect(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn import(path: &Path, snapshots: bool) -> anyhow::Result<mockup::ImportResult> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read template '{}'", path.display()))?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Untitled");
    let opts = mockup::ImportOpts::default()
        .with_name(name)
        .with_extract_raster_snapshots(snapshots);

    let result = mockup::parse_layered_scene(&bytes, &opts);
    print_warnings(&result.warnings);
    if !result.success {
        anyhow::bail!(
            "import '{}' failed: {}",
            path.display(),
            result.errors.join("; ")
        );
    }
    Ok(result)
}

fn print_warnings(warnings: &[mockup::Warning]) {
    for w in warnings {
        eprintln!("warning: {w}");
    }
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let result = import(&args.in_path, args.snapshots)?;
    let template = result
        .template
        .context("import succeeded without a template")?;
    println!("{}", template.to_json()?);

    if args.snapshots {
        let snaps = result.raster_snapshots.unwrap_or_default();
        eprintln!(
            "snapshots: {} layer(s), {} mask(s)",
            snaps.layers.len(),
            snaps.masks.len()
        );
    }
    Ok(())
}

fn parse_design(arg: &str, fit: mockup::FitMode) -> anyhow::Result<mockup::DesignInput> {
    let (target, path) = arg.split_once('=').unwrap_or(("", arg));
    let bytes = std::fs::read(path).with_context(|| format!("read design '{path}'"))?;
    Ok(mockup::DesignInput::new(target, mockup::DesignSource::Encoded(bytes)).with_fit(fit))
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let format = mockup::ImageFormat::from_path(&args.out).with_context(|| {
        format!(
            "cannot tell output format of '{}' (use .png or .jpg)",
            args.out.display()
        )
    })?;

    let imported = import(&args.in_path, true)?;
    let template = imported
        .template
        .context("import succeeded without a template")?;
    let snapshots = imported.raster_snapshots.unwrap_or_default();

    let fit = match args.fit {
        FitChoice::Fill => mockup::FitMode::Fill,
        FitChoice::Contain => mockup::FitMode::Contain,
        FitChoice::Cover => mockup::FitMode::Cover,
    };
    let designs = args
        .designs
        .iter()
        .map(|d| parse_design(d, fit))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut opts = mockup::RendererOpts::from_env();
    match (args.perspective, args.grid) {
        (Some(PerspectiveChoice::Mesh), _) => {
            opts = opts.with_perspective(mockup::PerspectiveMode::Mesh);
        }
        (Some(PerspectiveChoice::Subdivide), grid) => {
            opts = opts.with_perspective(mockup::PerspectiveMode::Subdivide {
                grid: grid.unwrap_or(mockup::DEFAULT_SUBDIVISIONS).max(1),
            });
        }
        (None, Some(grid)) => {
            if let mockup::PerspectiveMode::Subdivide { .. } = opts.perspective {
                opts = opts.with_perspective(mockup::PerspectiveMode::Subdivide {
                    grid: grid.max(1),
                });
            }
        }
        (None, None) => {}
    }

    let mut renderer = mockup::Renderer::new(opts);
    let render_opts = mockup::RenderOpts::default()
        .with_scale(args.scale)
        .with_output(mockup::OutputKind::Encoded {
            format,
            quality: args.quality.clamp(1, 100),
        });
    let result = renderer.render(&template, &designs, &snapshots, &render_opts);
    print_warnings(&result.warnings);
    if !result.success {
        anyhow::bail!(
            "render failed: {}",
            result.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    let bytes = result
        .image
        .as_ref()
        .and_then(mockup::RenderedImage::encoded_bytes)
        .context("renderer returned no encoded image")?;

    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, bytes)
        .with_context(|| format!("write {} '{}'", format.extension(), args.out.display()))?;

    eprintln!(
        "wrote {} in {:.1} ms",
        args.out.display(),
        result.render_time_ms
    );
    Ok(())
}
