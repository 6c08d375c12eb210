//! Command-line interface.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};

use crate::formatter::{format_report, OutputFormat};
use crate::report::AnalysisReport;
use crate::score::Grade;
use crate::types::Tool;
use crate::{badge, compose, k8s, prompt, samples, share};

#[derive(Parser)]
#[command(name = "manifest-lint")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validate and score Docker Compose files and Kubernetes manifests")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Analyze a manifest and print the report
    Analyze {
        /// Path to the manifest; the built-in sample when omitted
        file: Option<PathBuf>,

        /// Which validator to run
        #[arg(long, value_enum, default_value_t)]
        tool: ToolArg,

        /// Report format
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// List the rule catalog
    Rules {
        /// Restrict the listing to one tool
        #[arg(long, value_enum)]
        tool: Option<ToolArg>,
    },

    /// Encode or decode a shareable document fragment
    Share {
        #[command(subcommand)]
        action: ShareAction,
    },

    /// Render the SVG score badge for a manifest
    Badge {
        file: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t)]
        tool: ToolArg,
    },

    /// Generate a remediation prompt for a manifest
    Prompt {
        file: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t)]
        tool: ToolArg,
    },
}

#[derive(Subcommand)]
pub enum ShareAction {
    /// Compress a manifest into a URL-safe fragment
    Encode { file: Option<PathBuf> },
    /// Recover a manifest from a fragment
    Decode { fragment: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ToolArg {
    /// Pick by content: apiVersion + kind means Kubernetes
    #[default]
    Auto,
    Compose,
    K8s,
}

impl ToolArg {
    fn resolve(self, content: &str) -> Tool {
        match self {
            Self::Compose => Tool::Compose,
            Self::K8s => Tool::K8s,
            Self::Auto => detect_tool(content),
        }
    }
}

/// Content-based tool detection.
pub fn detect_tool(content: &str) -> Tool {
    let has_key = |key: &str| {
        content
            .lines()
            .map(str::trim_start)
            .any(|l| l.starts_with(key) && !l.starts_with('#'))
    };
    if has_key("apiVersion:") && has_key("kind:") {
        Tool::K8s
    } else {
        Tool::Compose
    }
}

fn read_input(file: Option<&Path>, tool: ToolArg) -> Result<String> {
    match file {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
        }
        None => {
            let tool = match tool {
                ToolArg::K8s => Tool::K8s,
                _ => Tool::Compose,
            };
            Ok(samples::for_tool(tool).to_string())
        }
    }
}

fn analyze_with(tool: Tool, content: &str) -> AnalysisReport {
    match tool {
        Tool::Compose => compose::analyze(content),
        Tool::K8s => k8s::analyze(content),
    }
}

/// Execute a parsed command; returns the process exit code.
///
/// The tool is advisory: only a failing grade (F) or unusable input is a
/// non-zero exit.
pub fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Analyze { file, tool, format } => {
            let content = read_input(file.as_deref(), tool)?;
            let report = analyze_with(tool.resolve(&content), &content);
            println!("{}", format_report(&report, format));
            Ok(if report.score.grade == Grade::F { 1 } else { 0 })
        }
        Command::Rules { tool } => {
            match tool {
                Some(ToolArg::Compose) => print_rules(Tool::Compose),
                Some(ToolArg::K8s) => print_rules(Tool::K8s),
                _ => {
                    print_rules(Tool::Compose);
                    println!();
                    print_rules(Tool::K8s);
                }
            }
            Ok(0)
        }
        Command::Share { action } => match action {
            ShareAction::Encode { file } => {
                let content = read_input(file.as_deref(), ToolArg::Auto)?;
                let encoded = share::encode(&content).context("compression failed")?;
                if encoded.len() >= share::SAFE_URL_LENGTH {
                    log::warn!("encoded fragment exceeds the safe URL length");
                }
                println!("{}", encoded);
                Ok(0)
            }
            ShareAction::Decode { fragment } => match share::decode(&fragment) {
                Some(text) => {
                    print!("{}", text);
                    Ok(0)
                }
                None => {
                    eprintln!("fragment did not decode; printing the sample document instead");
                    print!("{}", samples::COMPOSE_SAMPLE);
                    Ok(1)
                }
            },
        },
        Command::Badge { file, tool } => {
            let content = read_input(file.as_deref(), tool)?;
            let report = analyze_with(tool.resolve(&content), &content);
            println!("{}", badge::render(&report.score));
            Ok(0)
        }
        Command::Prompt { file, tool } => {
            let content = read_input(file.as_deref(), tool)?;
            let report = analyze_with(tool.resolve(&content), &content);
            match prompt::remediation_prompt(&report, &content) {
                Some(text) => {
                    println!("{}", text);
                    Ok(0)
                }
                None => {
                    println!("Nothing to remediate.");
                    Ok(if report.parse_success { 0 } else { 1 })
                }
            }
        }
    }
}

fn print_rules(tool: Tool) {
    println!("{} rules:", tool);
    let print_line = |code: &str, severity: &str, category: &str, title: &str| {
        println!("  {:<8} {:<9} {:<14} {}", code, severity, category, title);
    };
    match tool {
        Tool::Compose => {
            for rule in compose::REGISTRY.all() {
                print_line(
                    rule.meta.code,
                    rule.meta.severity.as_str(),
                    rule.meta.category.as_str(),
                    rule.meta.title,
                );
            }
        }
        Tool::K8s => {
            for rule in k8s::REGISTRY.all() {
                print_line(
                    rule.meta.code,
                    rule.meta.severity.as_str(),
                    rule.meta.category.as_str(),
                    rule.meta.title,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_tool_detection() {
        assert_eq!(detect_tool(samples::K8S_SAMPLE), Tool::K8s);
        assert_eq!(detect_tool(samples::COMPOSE_SAMPLE), Tool::Compose);
        // A Compose file mentioning "kind" in a comment stays Compose.
        assert_eq!(
            detect_tool("# kind: of a web stack\nservices:\n  web:\n    image: nginx\n"),
            Tool::Compose
        );
    }

    #[test]
    fn test_explicit_tool_overrides_detection() {
        assert_eq!(ToolArg::Compose.resolve(samples::K8S_SAMPLE), Tool::Compose);
        assert_eq!(ToolArg::K8s.resolve(samples::COMPOSE_SAMPLE), Tool::K8s);
    }
}
