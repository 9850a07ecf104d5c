//! idforge – employee ID-card exporter.
//!
//! Usage:
//!   idforge preview <employee.json> [output.pdf] [--config cfg.json] [--frame-json dir]
//!   idforge export <employees.json> [--out dir] [--config cfg.json]
//!   idforge route-poc <employees.json> [--config cfg.json]
//!
//! `preview` renders locally and never contacts the object store or the
//! record system. `export` runs the full approve workflow for every
//! employee in the file and writes each released PDF into `--out`.

use std::{env, fs, path::Path, path::PathBuf, process, sync::Arc};

use id_forge::batch::BatchRunner;
use id_forge::card::CardRenderer;
use id_forge::codec::CodecService;
use id_forge::config::ExportConfig;
use id_forge::fonts::FontManager;
use id_forge::images::HttpImageFetcher;
use id_forge::pipeline::CardPipeline;
use id_forge::raster::Rasterizer;
use id_forge::remote::{HttpObjectStore, HttpRecordSystem};
use id_forge::status::StatusBoard;
use id_forge::workflow::{ExportResult, ExportWorkflow};
use id_forge::EmployeeRecord;

struct Args {
    command: String,
    positional: Vec<PathBuf>,
    config: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    frame_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let argv: Vec<String> = env::args().collect();
    let prog = argv.first().map(String::as_str).unwrap_or("idforge");
    let args = match parse_args(&argv) {
        Ok(a) => a,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("Error: {msg}");
            }
            print_usage(prog);
            process::exit(if msg.is_empty() { 0 } else { 1 });
        }
    };

    let config = match &args.config {
        Some(path) => match ExportConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        },
        None => ExportConfig::default(),
    };

    let outcome = match args.command.as_str() {
        "preview" => preview(&args, &config).await,
        "export" => export(&args, &config).await,
        "route-poc" => route_poc(&args, &config).await,
        other => Err(format!("unknown command: {other}")),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn parse_args(argv: &[String]) -> Result<Args, String> {
    let mut iter = argv.iter().skip(1);
    let command = match iter.next().map(String::as_str) {
        Some("--help") | Some("-h") | None => return Err(String::new()),
        Some(c) => c.to_string(),
    };

    let mut args = Args {
        command,
        positional: Vec::new(),
        config: None,
        out_dir: None,
        frame_dir: None,
    };
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .map(PathBuf::from)
                .ok_or_else(|| format!("{flag} needs a value"))
        };
        match arg.as_str() {
            "--config" | "-c" => args.config = Some(value("--config")?),
            "--out" | "-o" => args.out_dir = Some(value("--out")?),
            "--frame-json" => args.frame_dir = Some(value("--frame-json")?),
            "--help" | "-h" => return Err(String::new()),
            other if other.starts_with('-') => return Err(format!("unknown flag: {other}")),
            path => args.positional.push(PathBuf::from(path)),
        }
    }

    let max_positional = if args.command == "preview" { 2 } else { 1 };
    if args.positional.is_empty() {
        return Err("no input file specified".into());
    }
    if args.positional.len() > max_positional {
        return Err(format!(
            "unexpected argument: {}",
            args.positional[max_positional].display()
        ));
    }
    Ok(args)
}

/// Accepts a single record or an array of records.
fn read_employees(path: &Path) -> Result<Vec<EmployeeRecord>, String> {
    let json =
        fs::read_to_string(path).map_err(|e| format!("cannot read '{}': {e}", path.display()))?;
    match serde_json::from_str::<Vec<EmployeeRecord>>(&json) {
        Ok(list) => Ok(list),
        Err(_) => serde_json::from_str::<EmployeeRecord>(&json)
            .map(|e| vec![e])
            .map_err(|e| format!("'{}' is not an employee record: {e}", path.display())),
    }
}

fn build_pipeline(config: &ExportConfig) -> Result<CardPipeline, String> {
    let mut fonts = FontManager::new();
    if let Some(path) = &config.font_path {
        fonts.load_font_file("Helvetica", false, path)?;
    }
    if let Some(path) = &config.bold_font_path {
        fonts.load_font_file("Helvetica", true, path)?;
    }

    let client = reqwest::Client::builder()
        .timeout(config.http_timeout())
        .build()
        .map_err(|e| format!("http client: {e}"))?;
    let pipeline = config.pipeline();
    let rasterizer = Rasterizer::new(
        Arc::new(fonts),
        Arc::new(HttpImageFetcher::new(client)),
        pipeline.image_timeout,
    );
    let codec = CodecService::new(&config.codec_base_url)?;
    let renderer = CardRenderer::new(codec, &config.issuer, &config.profile_base_url);
    Ok(CardPipeline::new(renderer, rasterizer, pipeline))
}

fn build_workflow(
    config: &ExportConfig,
    pipeline: Arc<CardPipeline>,
    board: Arc<StatusBoard>,
) -> Result<ExportWorkflow, String> {
    let store = HttpObjectStore::new(&config.upload_url, config.http_timeout())
        .map_err(|e| format!("object store: {e}"))?;
    let records = HttpRecordSystem::new(&config.record_base_url, config.http_timeout())
        .map_err(|e| format!("record system: {e}"))?;
    Ok(
        ExportWorkflow::new(pipeline, Arc::new(store), Arc::new(records), board)
            .with_max_artifact_bytes(config.max_artifact_bytes),
    )
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| format!("creating output directory: {e}"))?;
        }
    }
    fs::write(path, bytes).map_err(|e| format!("writing '{}': {e}", path.display()))
}

async fn preview(args: &Args, config: &ExportConfig) -> Result<bool, String> {
    let input = &args.positional[0];
    let employee = read_employees(input)?
        .into_iter()
        .next()
        .ok_or_else(|| format!("'{}' holds no employee", input.display()))?;

    let pipeline = Arc::new(build_pipeline(config)?);
    if let Some(dir) = &args.frame_dir {
        let frames = pipeline.frames(&employee).map_err(|e| e.to_string())?;
        for (variant, frame) in frames {
            let json = frame.to_json().map_err(|e| e.to_string())?;
            let path = dir.join(format!("{}_{}.json", employee.id, variant.label()));
            write_file(&path, json.as_bytes())?;
        }
    }

    let workflow = build_workflow(config, Arc::clone(&pipeline), Arc::new(StatusBoard::new()))?;
    let artifact = workflow
        .preview(&employee)
        .await
        .map_err(|e| e.to_string())?;

    let output = args.positional.get(1).cloned().unwrap_or_else(|| {
        let mut o = input.clone();
        o.set_file_name(&artifact.file_name);
        o
    });
    write_file(&output, &artifact.bytes)?;
    eprintln!(
        "Wrote '{}' ({} bytes, {} page{})",
        output.display(),
        artifact.len(),
        artifact.page_count,
        if artifact.page_count == 1 { "" } else { "s" }
    );
    Ok(true)
}

async fn export(args: &Args, config: &ExportConfig) -> Result<bool, String> {
    let employees = read_employees(&args.positional[0])?;
    let out_dir = args.out_dir.clone().unwrap_or_else(|| PathBuf::from("."));

    let pipeline = Arc::new(build_pipeline(config)?);
    let board = Arc::new(StatusBoard::new());
    board.register_all(&employees);
    let workflow = Arc::new(build_workflow(config, pipeline, board)?);

    let runner = BatchRunner::new(config.batch_options());
    let mut progress = runner.subscribe();
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let p = *progress.borrow();
            eprintln!("[{}/{}]", p.processed, p.total);
        }
    });

    let wf = Arc::clone(&workflow);
    let summary = runner
        .run_all(employees, move |employee| {
            let wf = Arc::clone(&wf);
            async move { wf.generate_and_approve(&employee).await }
        })
        .await;

    for ok in &summary.succeeded {
        let receipt = &ok.value;
        let path = out_dir.join(&receipt.artifact.file_name);
        write_file(&path, &receipt.artifact.bytes)?;
        let result = ExportResult::released(receipt);
        let line = serde_json::to_string(&result).map_err(|e| e.to_string())?;
        println!("{} {line}", ok.id);
    }
    for failed in &summary.failed {
        let result = ExportResult::failed(&failed.error);
        let line = serde_json::to_string(&result).map_err(|e| e.to_string())?;
        println!("{} {line}", failed.id);
    }
    eprintln!(
        "{} exported, {} failed",
        summary.succeeded.len(),
        summary.failed.len()
    );
    Ok(summary.all_succeeded())
}

async fn route_poc(args: &Args, config: &ExportConfig) -> Result<bool, String> {
    let employees = read_employees(&args.positional[0])?;
    let pipeline = Arc::new(build_pipeline(config)?);
    let board = Arc::new(StatusBoard::new());
    board.register_all(&employees);
    let workflow = build_workflow(config, pipeline, board)?;

    let report = workflow
        .route_approved_to_poc()
        .await
        .map_err(|e| e.to_string())?;
    for r in &report.routed {
        println!("{} routed to {}", r.id, r.destination);
    }
    for f in &report.failed {
        println!("{} failed: {}", f.id, f.reason);
    }
    Ok(report.failed.is_empty())
}

fn print_usage(prog: &str) {
    eprintln!("idforge – employee ID-card exporter");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} preview <employee.json> [output.pdf] [--config cfg.json] [--frame-json dir]");
    eprintln!("  {prog} export <employees.json> [--out dir] [--config cfg.json]");
    eprintln!("  {prog} route-poc <employees.json> [--config cfg.json]");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --config, -c    JSON config file (default: built-in local settings)");
    eprintln!("  --out, -o       Directory for released PDFs (default: current directory)");
    eprintln!("  --frame-json    Also write each page's laid-out frame as JSON");
    eprintln!("  --help          Print this message");
}
