// ABOUTME: CLI for marginalia: enhances rendered HTML pages with popovers and endnotes.
// ABOUTME: Reads files or stdin, writes HTML (or JSON reports) to stdout, a file or a directory.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use marginalia_notes::{read_document, EnhanceResult, Enhancer, Options};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "marginalia")]
#[command(about = "Add citation popovers, footnote popovers and endnotes to HTML pages")]
struct Args {
    /// HTML files to enhance. Reads stdin when empty or "-".
    #[arg()]
    files: Vec<PathBuf>,

    /// Output file, or output directory when several files are given (default: stdout)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// JSON options file layered over the defaults
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Skip citation popovers
    #[arg(long = "no-citations")]
    no_citations: bool,

    /// Skip footnote popovers
    #[arg(long = "no-footnotes")]
    no_footnotes: bool,

    /// Skip turning inline footnote blocks into endnotes
    #[arg(long = "no-endnotes")]
    no_endnotes: bool,

    /// Decode input with this encoding instead of detecting it
    #[arg(long = "charset")]
    charset: Option<String>,

    /// Print the enhancement reports as JSON instead of HTML
    #[arg(long = "json")]
    json_output: bool,

    /// Print elapsed time in ms to stderr
    #[arg(long = "timing")]
    timing: bool,

    /// Debug logging
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

/// One enhanced input.
struct Enhanced {
    name: String,
    result: EnhanceResult,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        "marginalia=debug,marginalia_notes=debug"
    } else {
        "marginalia=info,marginalia_notes=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn load_options(args: &Args) -> Result<Options> {
    let mut opts = match &args.config {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            Options::from_json(&json)?
        }
        None => Options::default(),
    };

    if args.no_citations {
        opts.citations = None;
    }
    if args.no_footnotes {
        opts.footnotes = None;
    }
    if args.no_endnotes {
        opts.endnotes = None;
    }
    Ok(opts)
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn enhance_one(enhancer: &Enhancer, path: &Path, charset: Option<&str>) -> Result<Enhanced> {
    let result = if is_stdin(path) {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        enhancer.enhance_bytes(&buf, charset)?
    } else {
        if !path.exists() {
            return Err(anyhow!("file not found: {}", path.display()));
        }
        enhancer.enhance(&read_document(path, charset)?)
    };
    let name = if is_stdin(path) {
        "stdin.html".to_string()
    } else {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    };
    Ok(Enhanced { name, result })
}

fn report_json(enhanced: &Enhanced) -> serde_json::Value {
    json!({
        "source": enhanced.name,
        "bubbles": enhanced.result.bubble_count(),
        "endnotes": enhanced.result.endnotes,
        "citations": enhanced.result.citations,
        "footnotes": enhanced.result.footnotes,
    })
}

/// Format output based on whether JSON output is requested.
fn format_output(results: &[Enhanced], json_output: bool) -> Result<String> {
    if json_output {
        let value = if results.len() == 1 {
            report_json(&results[0])
        } else {
            serde_json::Value::Array(results.iter().map(report_json).collect())
        };
        Ok(serde_json::to_string_pretty(&value)?)
    } else {
        Ok(results
            .iter()
            .map(|r| r.result.html.as_str())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

/// Several HTML results go to a directory, one file per input. Nothing is
/// written when two inputs share a file name.
fn write_directory(dir: &Path, results: &[Enhanced]) -> Result<()> {
    let mut names = HashSet::new();
    for enhanced in results {
        if !names.insert(enhanced.name.as_str()) {
            return Err(anyhow!(
                "two inputs would both be written to {}",
                dir.join(&enhanced.name).display()
            ));
        }
    }

    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    for enhanced in results {
        let path = dir.join(&enhanced.name);
        fs::write(&path, &enhanced.result.html)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let enhancer = match load_options(&args).and_then(|opts| Ok(Enhancer::new(opts)?)) {
        Ok(enhancer) => enhancer,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::from(1);
        }
    };

    let inputs = if args.files.is_empty() {
        vec![PathBuf::from("-")]
    } else {
        args.files.clone()
    };

    let start = Instant::now();
    let mut results: Vec<Enhanced> = Vec::new();
    let mut had_error = false;

    for path in &inputs {
        tracing::debug!(input = %path.display(), "enhancing");
        match enhance_one(&enhancer, path, args.charset.as_deref()) {
            Ok(enhanced) => results.push(enhanced),
            Err(e) => {
                eprintln!("error enhancing {}: {:#}", path.display(), e);
                had_error = true;
            }
        }
    }

    let elapsed = start.elapsed();

    if !results.is_empty() {
        let written = match &args.output {
            Some(dir) if inputs.len() > 1 && !args.json_output => write_directory(dir, &results),
            Some(file) => format_output(&results, args.json_output).and_then(|out| {
                fs::write(file, out).with_context(|| format!("writing {}", file.display()))
            }),
            None => format_output(&results, args.json_output).map(|out| println!("{}", out)),
        };
        if let Err(e) = written {
            eprintln!("error: {:#}", e);
            had_error = true;
        }
    }

    if args.timing {
        let _ = writeln!(io::stderr(), "elapsed: {}ms", elapsed.as_millis());
    }

    if had_error {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
