//! `clemini-fmt` — thin CLI wiring around the library's coordinator and
//! renderers (§6.5). Owns argument parsing, stdin/file I/O, and TTY color
//! decisions; everything else is delegated to `clemini_stream`.

use std::fs::File;
use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;

use clemini_stream::coordinator::{StreamOptions, StreamingCoordinator};
use clemini_stream::registry::ParserRegistry;
use clemini_stream::render::{
    AnsiRenderer, Format, HtmlRenderer, JsonRenderer, RenderCoordinator, RenderOptions, Renderer,
};

#[derive(Parser)]
#[command(name = "clemini-fmt")]
#[command(version)]
#[command(about = "Normalizes heterogeneous AI-agent CLI JSONL traces and renders them")]
struct Args {
    /// Input file; reads stdin if omitted.
    input: Option<PathBuf>,

    /// Vendor to parse as, or `auto` to detect from the first line.
    #[arg(long, default_value = "auto")]
    vendor: String,

    /// Output format.
    #[arg(long, value_enum, default_value_t = CliFormat::Ansi)]
    format: CliFormat,

    /// Shorthand for `--format html`.
    #[arg(long)]
    html: bool,

    /// Shorthand for `--format json` with compact (newline-delimited) mode.
    #[arg(long)]
    json: bool,

    /// Accumulate tool stdout/stderr and summarize at `end` instead of streaming it.
    #[arg(long)]
    collapse_tools: bool,

    /// Suppress all `tool` events.
    #[arg(long)]
    hide_tools: bool,

    /// Suppress `cost` events.
    #[arg(long)]
    hide_cost: bool,

    /// Suppress `debug` events.
    #[arg(long)]
    hide_debug: bool,

    /// Restrict output to a comma-separated list of event tags.
    #[arg(long, value_delimiter = ',')]
    only: Option<Vec<String>>,

    /// Write output to a file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum CliFormat {
    Ansi,
    Html,
    Json,
}

fn main() -> Result<()> {
    clemini_stream::logging::init_logging();
    let mut args = Args::parse();

    if args.html {
        args.format = CliFormat::Html;
    }
    let compact_json = args.json;
    if args.json {
        args.format = CliFormat::Json;
    }

    let format = match args.format {
        CliFormat::Ansi => Format::Ansi,
        CliFormat::Html => Format::Html,
        CliFormat::Json => Format::Json,
    };

    let mut render_options = RenderOptions::new(format);
    render_options.collapse_tools = args.collapse_tools;
    render_options.hide_tools = args.hide_tools;
    render_options.hide_cost = args.hide_cost;
    render_options.hide_debug = args.hide_debug;
    render_options.compact_mode = compact_json;

    render_options.color_disabled = format == Format::Ansi && !io::stdout().is_terminal();

    let registry = Arc::new(ParserRegistry::with_defaults());
    let stream_options = StreamOptions {
        vendor: Some(args.vendor.clone()),
        ..Default::default()
    };

    let source: Box<dyn Read> = match &args.input {
        Some(path) => Box::new(
            File::open(path).with_context(|| format!("opening input file {}", path.display()))?,
        ),
        None => Box::new(io::stdin()),
    };

    let coordinator = StreamingCoordinator::new(source, registry, stream_options);

    let only: Option<Vec<&'static str>> = args.only.as_ref().map(|tags| {
        tags.iter()
            .map(|t| match t.as_str() {
                "msg" => "msg",
                "tool" => "tool",
                "cost" => "cost",
                "error" => "error",
                "debug" => "debug",
                other => {
                    eprintln!("warning: unrecognized --only tag \"{other}\", ignoring");
                    ""
                }
            })
            .filter(|t| !t.is_empty())
            .collect()
    });

    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("creating output file {}", path.display()))?,
        ),
        None => Box::new(io::stdout()),
    };

    let exit = match format {
        Format::Ansi => run(
            coordinator,
            AnsiRenderer::new(render_options),
            only,
            writer.as_mut(),
        ),
        Format::Html => run(
            coordinator,
            HtmlRenderer::new(render_options),
            only,
            writer.as_mut(),
        ),
        Format::Json => run(
            coordinator,
            JsonRenderer::new(render_options),
            only,
            writer.as_mut(),
        ),
    };

    writer.flush().ok();
    drop(writer);

    match exit {
        Ok(()) => Ok(()),
        Err(message) => bail!(message),
    }
}

fn run<R: Read, V: Renderer>(
    coordinator: StreamingCoordinator<R>,
    renderer: V,
    only: Option<Vec<&'static str>>,
    writer: &mut dyn Write,
) -> Result<(), String> {
    let mut render_coordinator = RenderCoordinator::new(coordinator, renderer);
    if let Some(tags) = only {
        render_coordinator = render_coordinator.with_event_filter(tags);
    }
    for chunk in render_coordinator {
        match chunk {
            Ok(text) => {
                if writer.write_all(text.as_bytes()).is_err() {
                    return Err("failed writing output".to_string());
                }
            }
            Err(e) => return Err(e.to_string()),
        }
    }
    Ok(())
}
