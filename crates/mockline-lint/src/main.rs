//! Mockline Rule File Linter CLI
//!
//! Validates mock rule files before they are loaded into the extension,
//! reporting rules the engine would skip, never match, or shadow.
//!
//! Usage:
//!   mockline-lint <file_or_directory> [OPTIONS]

use clap::Parser;
use mockline_lint::{fix_file, lint_path, LintIssue, LintOptions, LintResult, Severity};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Mockline Rule File Linter
#[derive(Parser, Debug)]
#[command(name = "mockline-lint")]
#[command(author, version, about = "Validate mock rule files before loading them")]
struct Args {
    /// Path to a rule file or a directory of rule files
    #[arg(required = true)]
    path: PathBuf,

    /// Fix issues automatically where possible
    #[arg(short, long)]
    fix: bool,

    /// Output format: text (default), json
    #[arg(short, long, default_value = "text")]
    output: String,

    /// Only show errors (hide warnings and info)
    #[arg(short = 'e', long)]
    errors_only: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Strict mode - treat warnings as errors
    #[arg(short, long)]
    strict: bool,

    /// Do not warn about unknown rule fields
    #[arg(long)]
    allow_unknown_fields: bool,
}

fn main() {
    let args = Args::parse();
    let json_output = args.output == "json";
    let options = LintOptions {
        verbose: args.verbose,
        allow_unknown_fields: args.allow_unknown_fields,
    };

    if args.fix {
        apply_fixes(&args.path, json_output);
    }

    let result = lint_path(&args.path, &options);

    if json_output {
        print_results_json(&result);
    } else {
        println!("{BOLD}{CYAN}Mockline Rule Linter{RESET}");
        println!("{DIM}{RULE}{RESET}");
        println!("{DIM}Scanning:{RESET} {CYAN}{}{RESET}", args.path.display());
        print_results(&result, &args);
    }

    std::process::exit(if result.passes(args.strict) { 0 } else { 1 });
}

fn rule_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(path)
        .map(|entries| {
            entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|file| file.is_file() && file.extension().is_some_and(|ext| ext == "json"))
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    files
}

fn apply_fixes(path: &Path, quiet: bool) {
    let mut fixes_applied = 0;

    for file in rule_files(path) {
        match fix_file(&file) {
            Ok(applied) if applied.is_empty() => {}
            Ok(applied) => {
                fixes_applied += applied.len();
                if !quiet {
                    println!("{GREEN}Fixed: {}{RESET}", file.display());
                    for change in applied {
                        println!("  {DIM}{change}{RESET}");
                    }
                }
            }
            Err(e) => eprintln!("{RED}Error: {e}{RESET}"),
        }
    }

    if !quiet {
        println!("{GREEN}Applied {fixes_applied} fixes{RESET}\n");
    }
}

fn print_results_json(result: &LintResult) {
    match serde_json::to_string_pretty(result) {
        Ok(output) => println!("{output}"),
        Err(e) => eprintln!("Failed to serialize results: {e}"),
    }
}

fn print_results(result: &LintResult, args: &Args) {
    println!();

    let visible: Vec<&LintIssue> = result
        .issues
        .iter()
        .filter(|issue| !args.errors_only || issue.severity == Severity::Error)
        .collect();

    if visible.is_empty() {
        println!("{GREEN}{BOLD}No issues found!{RESET}");
    } else {
        let mut issues_by_file: BTreeMap<&PathBuf, Vec<&LintIssue>> = BTreeMap::new();
        for issue in visible {
            issues_by_file.entry(&issue.file).or_default().push(issue);
        }

        for (file, issues) in issues_by_file {
            let file_errors = issues
                .iter()
                .filter(|i| i.severity == Severity::Error)
                .count();
            let file_warnings = issues
                .iter()
                .filter(|i| i.severity == Severity::Warning)
                .count();

            let file_name = file.file_name().unwrap_or_default().to_string_lossy();

            let status_indicator = if file_errors > 0 {
                format!("{RED}FAIL{RESET}")
            } else if file_warnings > 0 {
                format!("{YELLOW}WARN{RESET}")
            } else {
                format!("{CYAN}INFO{RESET}")
            };

            let counts = match (file_errors, file_warnings) {
                (0, 0) => String::new(),
                (e, 0) => format!(" {DIM}({RED}{e} error(s){RESET}{DIM}){RESET}"),
                (0, w) => format!(" {DIM}({YELLOW}{w} warning(s){RESET}{DIM}){RESET}"),
                (e, w) => format!(
                    " {DIM}({RED}{e} error(s){RESET}{DIM}, {YELLOW}{w} warning(s){RESET}{DIM}){RESET}"
                ),
            };

            println!("{status_indicator} {BOLD}{CYAN}{file_name}{RESET}{counts}");
            if args.verbose {
                println!("  {DIM}{}{RESET}", file.display());
            }

            for issue in issues {
                let color = severity_color(&issue.severity);
                let severity_marker = format!("{color}|{RESET}");
                let severity_str = format!("{BOLD}{color}{}{RESET}", issue.severity.label());

                let location_str = issue
                    .location
                    .as_ref()
                    .map(|l| format!("{DIM}[{RESET}{CYAN}{l}{RESET}{DIM}]{RESET}"))
                    .unwrap_or_default();

                let fixable = if issue.fixable {
                    format!(" {GREEN}[fixable]{RESET}")
                } else {
                    String::new()
                };

                println!(
                    "  {severity_marker} {location_str} {severity_str}: {} {DIM}({color}{}{DIM}){RESET}{fixable}",
                    issue.message, issue.code
                );

                if let Some(suggestion) = &issue.suggestion {
                    println!("  {severity_marker}   {GREEN}-> {suggestion}{RESET}");
                }
            }
            println!();
        }
    }

    println!("{DIM}{RULE}{RESET}");
    println!("{BOLD}{CYAN}Summary{RESET}");
    println!("{DIM}{RULE}{RESET}");
    println!(
        "  {DIM}Files checked:{RESET} {BOLD}{}{RESET}",
        result.files_checked
    );
    println!(
        "  {DIM}Rules checked:{RESET} {BOLD}{}{RESET}",
        result.rules_checked
    );

    if result.errors > 0 {
        println!(
            "  {RED}Errors:{RESET}    {BOLD}{RED}{}{RESET}",
            result.errors
        );
    } else {
        println!("  {GREEN}Errors:{RESET}    {BOLD}{GREEN}0{RESET}");
    }

    if result.warnings > 0 {
        println!(
            "  {YELLOW}Warnings:{RESET}  {BOLD}{YELLOW}{}{RESET}",
            result.warnings
        );
    } else {
        println!("  {DIM}Warnings:{RESET}  {BOLD}0{RESET}");
    }

    println!();

    if result.has_fixable() && !args.fix {
        println!("{DIM}Some issues can be repaired with --fix{RESET}");
    }

    if result.errors == 0 && result.warnings == 0 {
        println!("{GREEN}{BOLD}All checks passed!{RESET}");
    } else if result.passes(args.strict) {
        println!("{YELLOW}{BOLD}Passed with warnings{RESET}");
    } else {
        println!("{RED}{BOLD}Linting failed{RESET}");
    }
}

fn severity_color(severity: &Severity) -> &'static str {
    match severity {
        Severity::Error => RED,
        Severity::Warning => YELLOW,
        Severity::Info => CYAN,
    }
}
