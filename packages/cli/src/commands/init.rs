use crate::config::{Config, DEFAULT_CONFIG_NAME};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::Path;

const EXAMPLE_DESCRIPTOR: &str = r#"{
  "type": "form",
  "namespace": "signup",
  "props": { "modelValue": { "email": "", "newsletter": false } },
  "children": [
    { "type": "input", "key": "email", "props": { "modelValue": { "path": "email" } } },
    { "type": "input", "key": "newsletter", "props": { "modelValue": { "path": "newsletter" } } },
    { "type": "button", "directives": { "dcShow": true }, "children": "Sign up" }
  ]
}
"#;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Directory holding descriptor files
    #[arg(short, long, default_value = "descriptors")]
    pub src_dir: String,

    /// Component names the headless host should resolve
    #[arg(short, long, value_delimiter = ',')]
    pub components: Vec<String>,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

pub fn init(args: InitArgs, cwd: &Path) -> Result<()> {
    let config_path = cwd.join(DEFAULT_CONFIG_NAME);

    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    println!("{}", "📝 Initializing dcstruct project...".bright_blue().bold());

    let src_dir = cwd.join(&args.src_dir);
    if !src_dir.exists() {
        fs::create_dir_all(&src_dir)?;
        println!("  {} Created {}/", "✓".green(), args.src_dir);
    }

    let example_file = src_dir.join("example.json");
    if !example_file.exists() {
        fs::write(&example_file, EXAMPLE_DESCRIPTOR)?;
        println!("  {} Created example.json", "✓".green());
    }

    let config = Config {
        src_dir: args.src_dir.clone(),
        components: args.components,
        ..Config::default()
    };
    fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;

    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);
    println!();
    println!("{}", "✅ Project initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Edit {}/example.json", args.src_dir);
    println!("  2. Run: dcstruct check");
    println!("  3. Run: dcstruct render {}/example.json", args.src_dir);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::check::check_file;

    #[test]
    fn test_init_writes_a_checkable_project() {
        let dir = tempfile::tempdir().unwrap();
        init(
            InitArgs {
                src_dir: "ui".to_string(),
                components: vec!["Card".to_string()],
                force: false,
            },
            dir.path(),
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.src_dir, "ui");
        assert_eq!(config.components, vec!["Card"]);

        let example = dir.path().join("ui/example.json");
        assert!(check_file(&example, &config).unwrap().is_empty());
    }

    #[test]
    fn test_init_keeps_existing_config_without_force() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(DEFAULT_CONFIG_NAME), r#"{ "srcDir": "mine" }"#).unwrap();
        init(
            InitArgs {
                src_dir: "descriptors".to_string(),
                components: vec![],
                force: false,
            },
            dir.path(),
        )
        .unwrap();
        assert_eq!(Config::load(dir.path()).unwrap().src_dir, "mine");
    }
}
