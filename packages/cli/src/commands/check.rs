use super::{find_descriptor_files, headless_composer};
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use dcstruct_evaluator::{Descriptor, Diagnostic, DiagnosticLevel, Validator};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Descriptor file or directory (defaults to the configured source directory)
    pub input: Option<PathBuf>,

    /// Also list files without problems
    #[arg(short, long)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

pub fn check(args: CheckArgs, cwd: &Path, config: &Config) -> Result<()> {
    let input = args.input.clone().unwrap_or_else(|| config.get_src_dir(cwd));

    let files = if input.is_file() {
        vec![input.clone()]
    } else if input.is_dir() {
        find_descriptor_files(&input)
    } else {
        return Err(anyhow::anyhow!(
            "Input path does not exist: {}",
            input.display()
        ));
    };

    println!("🔍 {} dcstruct check", "Starting".green().bold());
    println!("   Input: {}", input.display());
    println!("   Found {} descriptor files", files.len());
    println!();

    let mut total_errors = 0;
    let mut total_warnings = 0;

    for file in &files {
        let diagnostics = check_file(file, config)?;
        total_errors += count(&diagnostics, DiagnosticLevel::Error);
        total_warnings += count(&diagnostics, DiagnosticLevel::Warning);
        report(file, &diagnostics, &args)?;
    }

    println!();
    println!(
        "✨ {} Check complete!",
        if total_errors > 0 {
            "Done".red().bold()
        } else {
            "Done".green().bold()
        }
    );
    println!("   Files checked: {}", files.len());

    if total_errors > 0 {
        println!("   {} {}", "Errors:".red(), total_errors);
    }
    if total_warnings > 0 {
        println!("   {} {}", "Warnings:".yellow(), total_warnings);
    }
    if total_errors == 0 && total_warnings == 0 {
        println!("   {} No issues found!", "✓".green());
    }

    if total_errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}

/// Load, validate and compose one file, collecting every problem found.
///
/// Composition only runs when validation found no errors.
pub fn check_file(path: &Path, config: &Config) -> Result<Vec<Diagnostic>> {
    let source = fs::read_to_string(path)?;
    check_source(&source, config)
}

pub fn check_source(source: &str, config: &Config) -> Result<Vec<Diagnostic>> {
    let descriptor = match Descriptor::from_json_str(source) {
        Ok(descriptor) => descriptor,
        Err(err) => return Ok(vec![Diagnostic::error(err.to_string())]),
    };

    let mut diagnostics = Validator::new().validate(&descriptor);
    if count(&diagnostics, DiagnosticLevel::Error) > 0 {
        return Ok(diagnostics);
    }

    let (host, composer) = headless_composer(config);
    if let Err(err) = composer.compose(&descriptor) {
        diagnostics.push(Diagnostic::error(err.to_string()));
    }
    diagnostics.extend(composer.take_diagnostics());
    for captured in host.errors() {
        let diagnostic = Diagnostic::error(captured.message);
        if !diagnostics.contains(&diagnostic) {
            diagnostics.push(diagnostic);
        }
    }
    Ok(diagnostics)
}

fn count(diagnostics: &[Diagnostic], level: DiagnosticLevel) -> usize {
    diagnostics.iter().filter(|d| d.level == level).count()
}

fn report(file: &Path, diagnostics: &[Diagnostic], args: &CheckArgs) -> Result<()> {
    if diagnostics.is_empty() {
        if args.verbose {
            println!("{} {}", "✓".green(), file.display());
        }
        return Ok(());
    }

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(diagnostics)?);
        return Ok(());
    }

    println!("{}", file.display());
    for diagnostic in diagnostics {
        let level_str = match diagnostic.level {
            DiagnosticLevel::Error => "error".red().bold(),
            DiagnosticLevel::Warning => "warning".yellow().bold(),
        };
        match &diagnostic.uid {
            Some(uid) => println!("  {} [{}] {}", level_str, uid.as_str(), diagnostic.message),
            None => println!("  {} {}", level_str, diagnostic.message),
        }
    }
    println!();
    Ok(())
}
