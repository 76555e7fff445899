mod config;
mod logging;
mod prompt;
mod shell;
mod test_runner;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use runner::{
    ActiveDocument, Affordance, AutoConfirm, BlockLens, Confirm, ExecuteOutcome, ExecutionState,
    Executor, StatusChange, StatusStore, render,
};
use termbook::block::key::BlockKey;
use termbook::parser::ParseError;
use termbook::{EnvLookup, ProcessEnv, Termbook, expand_variables, sanitize_command};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::config::Config;
use crate::prompt::StdinConfirm;
use crate::shell::ShellSessions;

const SUBCOMMANDS: &[&str] = &["run", "expand", "list", "vars", "env", "check", "test", "help"];

#[derive(Parser)]
#[command(name = "termbook", version, about = "Run named command blocks from a termbook file")]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file (default: ./termbook.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute blocks in a shell session
    Run(RunArgs),

    /// Print the fully expanded command of a block without running it
    Expand(BlockArgs),

    /// List executable blocks and their actions
    List(FileArgs),

    /// Print the custom variables of a termbook
    Vars(FileArgs),

    /// Print the value of an environment variable
    Env {
        /// Variable name, e.g. HOME or PATH
        name: String,
    },

    /// Report missing includes, include cycles and shadowed blocks
    Check(FileArgs),

    /// Run .test.term fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct FileArgs {
    /// Termbook file
    file: PathBuf,
}

#[derive(clap::Args)]
struct BlockArgs {
    /// Termbook file
    file: PathBuf,

    /// Block name
    block: String,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Termbook file
    file: PathBuf,

    /// Blocks to execute, in order
    #[arg(required = true)]
    blocks: Vec<String>,

    /// Answer yes to every confirmation
    #[arg(short, long)]
    yes: bool,

    /// Ask before every execution, not only for dangerous commands
    #[arg(long)]
    confirm: bool,

    /// Shell program that receives the commands
    #[arg(long)]
    shell: Option<String>,

    /// Keep executing remaining blocks after a failure
    #[arg(short, long)]
    keep_going: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.term file or directory containing them
    path: PathBuf,

    /// Run only fixtures in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

/// Global options that consume the following argument.
const GLOBAL_OPTIONS_WITH_VALUE: &[&str] = &["--config"];

/// `termbook file.term block` is shorthand for `termbook run file.term block`.
fn with_implicit_run(mut args: Vec<String>) -> Vec<String> {
    let mut skip_value = false;
    let mut first_positional = None;
    for (i, arg) in args.iter().enumerate().skip(1) {
        if skip_value {
            skip_value = false;
            continue;
        }
        if arg.starts_with('-') {
            skip_value = GLOBAL_OPTIONS_WITH_VALUE.contains(&arg.as_str());
            continue;
        }
        first_positional = Some(i);
        break;
    }
    if let Some(pos) = first_positional {
        if !SUBCOMMANDS.contains(&args[pos].as_str()) {
            args.insert(pos, "run".to_string());
        }
    }
    args
}

fn main() {
    let args = with_implicit_run(std::env::args().collect());
    let cli = Cli::parse_from(&args);
    logging::init_logging(cli.verbose, cli.no_color);

    let result = match cli.command {
        Command::Run(run_args) => Config::load(cli.config.as_deref())
            .and_then(|config| do_run(run_args, config, cli.no_color)),
        Command::Expand(args) => do_expand(&args, cli.no_color),
        Command::List(args) => do_list(&args.file),
        Command::Vars(args) => do_vars(&args.file),
        Command::Env { name } => Ok(do_env(&name)),
        Command::Check(args) => do_check(&args.file, cli.no_color),
        Command::Test(test_args) => {
            if test_args.list_categories {
                test_runner::list_categories(&test_args.path);
                Ok(0)
            } else {
                Ok(test_runner::run_tests(
                    &test_args.path,
                    cli.no_color,
                    &test_args.category,
                ))
            }
        }
    };

    match result {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            process::exit(1);
        }
    }
}

/// A termbook read from disk, ready for rendering and diagnostics.
struct Loaded {
    files: SimpleFiles<String, String>,
    document: ActiveDocument,
    termbook: Termbook,
}

fn load(path: &Path) -> anyhow::Result<Loaded> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read '{}'", path.display()))?;
    let uri = path
        .canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string();

    let mut files = SimpleFiles::new();
    let file_id = files.add(path.display().to_string(), source.clone());
    let termbook = termbook::parser::Parser::new(source.as_str(), file_id).parse();

    Ok(Loaded {
        files,
        document: ActiveDocument::new(uri, source).with_source_id(file_id),
        termbook,
    })
}

fn emit_diagnostics(files: &SimpleFiles<String, String>, diagnostics: &[ParseError], no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();
    for diagnostic in diagnostics {
        let _ = term::emit_to_write_style(
            &mut writer.lock(),
            &config,
            files,
            &diagnostic.to_diagnostic(),
        );
    }
}

fn available_blocks(termbook: &Termbook) -> String {
    let names: Vec<&str> = termbook.executable_blocks().map(|b| b.name.as_str()).collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

fn do_run(args: RunArgs, mut config: Config, no_color: bool) -> anyhow::Result<i32> {
    if args.confirm {
        config.executor.confirm_before_execute = true;
    }
    if let Some(shell) = args.shell.clone() {
        config.shell = shell;
    }

    let loaded = load(&args.file)?;
    emit_diagnostics(&loaded.files, &loaded.termbook.warnings, no_color);

    let runtime = tokio::runtime::Runtime::new().context("cannot start async runtime")?;
    runtime.block_on(run_blocks(args, config, loaded))
}

async fn run_blocks(args: RunArgs, config: Config, loaded: Loaded) -> anyhow::Result<i32> {
    let Loaded {
        document, termbook, ..
    } = loaded;

    let store = Arc::new(StatusStore::new());
    let sessions = Arc::new(ShellSessions::new(config.shell.clone()));
    let confirm: Arc<dyn Confirm> = if args.yes {
        Arc::new(AutoConfirm(true))
    } else {
        Arc::new(StdinConfirm)
    };
    let executor = Executor::new(store.clone(), sessions.clone(), confirm, config.executor);

    let lenses = render(&termbook, &document, &store);
    let watcher = tokio::spawn(print_status_changes(
        store.subscribe(),
        block_names(&lenses),
    ));

    let mut failed = false;
    for name in &args.blocks {
        let Some(request) = lenses
            .iter()
            .rev()
            .find(|lens| &lens.name == name)
            .and_then(BlockLens::execute_request)
            .cloned()
        else {
            eprintln!(
                "error: no block named '{name}' (available blocks: {})",
                available_blocks(&termbook)
            );
            failed = true;
            if args.keep_going {
                continue;
            }
            break;
        };

        match executor.execute(Some(&document), request).await {
            Ok(ExecuteOutcome::Executed { .. }) => {}
            Ok(ExecuteOutcome::Cancelled) => eprintln!("cancelled: {name}"),
            Err(err) => {
                eprintln!("Error executing command: {err}");
                failed = true;
                if !args.keep_going {
                    break;
                }
            }
        }
    }

    let mut shell_failed = false;
    for (session, status) in sessions.shutdown().await {
        let status = status.with_context(|| format!("session '{session}' did not exit cleanly"))?;
        if !status.success() {
            eprintln!("session '{session}' exited with {status}");
            shell_failed = true;
        }
    }
    // The watcher stops once the last handle on the store is gone and every
    // queued change has been printed.
    drop(executor);
    drop(store);
    if let Err(err) = watcher.await {
        tracing::debug!(error = %err, "status watcher ended abnormally");
    }

    Ok(if failed || shell_failed { 1 } else { 0 })
}

fn block_names(lenses: &[BlockLens]) -> HashMap<BlockKey, String> {
    lenses
        .iter()
        .map(|lens| (lens.key.clone(), lens.name.clone()))
        .collect()
}

/// Print the badge of every status change until the store is dropped.
async fn print_status_changes(
    mut changes: broadcast::Receiver<StatusChange>,
    names: HashMap<BlockKey, String>,
) {
    loop {
        let change = match changes.recv().await {
            Ok(change) => change,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "status watcher lagged");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        let Some(name) = names.get(&change.key) else {
            continue;
        };
        let badge = match change.record.map(|r| r.state()) {
            Some(ExecutionState::Pending) => Affordance::Executing,
            Some(ExecutionState::Success) => Affordance::Succeeded { clear: change.key },
            Some(ExecutionState::Failure) => Affordance::Failed { clear: change.key },
            None => continue,
        };
        eprintln!("[{name}] {}", badge.title());
    }
}

fn do_expand(args: &BlockArgs, no_color: bool) -> anyhow::Result<i32> {
    let loaded = load(&args.file)?;
    emit_diagnostics(&loaded.files, &loaded.termbook.warnings, no_color);
    let termbook = &loaded.termbook;

    if termbook.get(&args.block).is_none() {
        eprintln!(
            "error: no block named '{}' (available blocks: {})",
            args.block,
            available_blocks(termbook)
        );
        return Ok(1);
    }

    let expanded = match termbook.expand_block(&args.block) {
        Ok(expanded) => expanded,
        Err(err) => {
            eprintln!("error: {err}");
            return Ok(1);
        }
    };
    if let Err(err) = sanitize_command(&expanded) {
        eprintln!("warning: {err}");
    }
    println!(
        "{}",
        expand_variables(&expanded, termbook.variables(), &ProcessEnv)
    );
    Ok(0)
}

fn do_list(file: &Path) -> anyhow::Result<i32> {
    let loaded = load(file)?;
    let lenses = render(&loaded.termbook, &loaded.document, &StatusStore::new());
    for lens in &lenses {
        let titles: Vec<String> = lens.affordances.iter().map(Affordance::title).collect();
        println!("{:>4}  {}  {}", lens.line + 1, lens.name, titles.join(" | "));
    }
    Ok(0)
}

fn do_vars(file: &Path) -> anyhow::Result<i32> {
    let loaded = load(file)?;
    for (name, value) in loaded.termbook.variables().iter() {
        println!("{name}={value}");
    }
    Ok(0)
}

fn do_env(name: &str) -> i32 {
    match ProcessEnv.lookup(name).filter(|v| !v.is_empty()) {
        Some(value) => {
            println!("{name}={value}");
            0
        }
        None => {
            eprintln!("warning: environment variable '{name}' not found");
            1
        }
    }
}

fn do_check(file: &Path, no_color: bool) -> anyhow::Result<i32> {
    let loaded = load(file)?;
    let diagnostics = loaded.termbook.lint();
    emit_diagnostics(&loaded.files, &diagnostics, no_color);

    if diagnostics.iter().any(|d| !d.is_warning()) {
        return Ok(1);
    }
    eprintln!("ok: {} checked successfully", file.display());
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::with_implicit_run;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_file_gets_run_inserted() {
        assert_eq!(
            with_implicit_run(args(&["termbook", "-v", "book.term", "greet"])),
            args(&["termbook", "-v", "run", "book.term", "greet"])
        );
    }

    #[test]
    fn config_value_is_not_a_positional() {
        assert_eq!(
            with_implicit_run(args(&["termbook", "--config", "my.toml", "book.term", "greet"])),
            args(&["termbook", "--config", "my.toml", "run", "book.term", "greet"])
        );
        assert_eq!(
            with_implicit_run(args(&["termbook", "--config", "my.toml", "run", "book.term", "greet"])),
            args(&["termbook", "--config", "my.toml", "run", "book.term", "greet"])
        );
    }

    #[test]
    fn explicit_subcommands_are_left_alone() {
        let list = args(&["termbook", "--no-color", "check", "book.term"]);
        assert_eq!(with_implicit_run(list.clone()), list);
    }
}
