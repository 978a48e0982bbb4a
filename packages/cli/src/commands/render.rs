use super::headless_composer;
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use dcstruct_evaluator::headless::CapturedError;
use dcstruct_evaluator::{Descriptor, Diagnostic, DiagnosticLevel, RenderNode};
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Descriptor JSON file to render
    pub input: PathBuf,

    /// Output format (json, text)
    #[arg(short, long, default_value = "json")]
    pub format: String,

    /// Write the result to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Outcome of composing one descriptor source
#[derive(Debug)]
pub struct Rendered {
    pub node: RenderNode,
    pub diagnostics: Vec<Diagnostic>,
    pub errors: Vec<CapturedError>,
}

pub fn render(args: RenderArgs, config: &Config) -> Result<()> {
    let source = fs::read_to_string(&args.input)
        .map_err(|err| anyhow::anyhow!("Cannot read {}: {}", args.input.display(), err))?;
    let rendered = render_source(&source, config)?;

    let output = match args.format.as_str() {
        "json" => serde_json::to_string_pretty(&rendered.node)?,
        "text" => outline(&rendered.node),
        other => {
            return Err(anyhow::anyhow!(
                "Invalid format: {}. Use: json or text",
                other
            ))
        }
    };

    for diagnostic in &rendered.diagnostics {
        let level = match diagnostic.level {
            DiagnosticLevel::Error => "error".red().bold(),
            DiagnosticLevel::Warning => "warning".yellow().bold(),
        };
        eprintln!("{} {}", level, diagnostic.message);
    }
    for error in &rendered.errors {
        eprintln!("{} {}", "captured".red().bold(), error.message);
    }

    match args.output {
        Some(path) => {
            fs::write(&path, output)?;
            eprintln!("{} Wrote {}", "✓".green(), path.display());
        }
        None => println!("{}", output),
    }

    Ok(())
}

/// Compose a JSON descriptor against a fresh headless host
pub fn render_source(source: &str, config: &Config) -> Result<Rendered> {
    let descriptor = Descriptor::from_json_str(source)?;
    let (host, composer) = headless_composer(config);
    let node = composer.compose(&descriptor)?;
    debug!(instances = composer.instance_uids().len(), "Rendered descriptor");

    Ok(Rendered {
        node,
        diagnostics: composer.take_diagnostics(),
        errors: host.errors(),
    })
}

/// Indented one-line-per-node view of a render tree
pub fn outline(node: &RenderNode) -> String {
    let mut out = String::new();
    write_outline(node, 0, &mut out);
    out
}

fn write_outline(node: &RenderNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match node {
        RenderNode::Element(element) => {
            let _ = write!(out, "{}<{}", indent, element.ty.name());
            if let Some(uid) = &element.uid {
                let _ = write!(out, " #{}", uid.as_str());
            }
            if let Some(key) = &element.key {
                let _ = write!(out, " key={}", key);
            }
            for (name, value) in &element.attrs {
                let _ = write!(out, " {}={}", name, value);
            }
            out.push_str(">\n");
            for (name, nodes) in &element.slots {
                let _ = writeln!(out, "{}  [{}]", indent, name);
                for child in nodes {
                    write_outline(child, depth + 2, out);
                }
            }
            for child in &element.children {
                write_outline(child, depth + 1, out);
            }
        }
        RenderNode::Text { content } => {
            let _ = writeln!(out, "{}{:?}", indent, content);
        }
        RenderNode::Fragment { children, .. } => {
            for child in children {
                write_outline(child, depth, out);
            }
        }
        RenderNode::Empty { uid } => {
            let _ = match uid {
                Some(uid) => writeln!(out, "{}(empty #{})", indent, uid.as_str()),
                None => writeln!(out, "{}(empty)", indent),
            };
        }
    }
}
