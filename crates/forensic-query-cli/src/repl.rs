//! Interactive REPL for the forensic query DSL.
//!
//! Launch with `fq repl` (or plain `fq`). Paste a JSON query to run it, or
//! type `/help` for commands. Tab completes commands, datasets and samples.

use rustyline::completion::{Completer, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, ConditionalEventHandler, Config, Editor, Event, EventContext, EventHandler, Helper,
    KeyEvent, RepeatCount,
};

use forensic_query::samples;
use forensic_query::{CompilerConfig, Dataset, ForensicStore};

use crate::commands;
use crate::config::{home_dir, resolve_database_path};
use crate::output::OutputMode;

/// Available REPL commands.
const COMMANDS: &[(&str, &str)] = &[
    ("/run", "Run a JSON query (bare JSON lines run too)"),
    ("/validate", "Validate a JSON query"),
    ("/compile", "Show the SQL and params for a JSON query"),
    ("/sample", "Run a named sample query"),
    ("/samples", "List sample queries"),
    ("/schema", "Show datasets and fields"),
    ("/countries", "List country names for the country operator"),
    ("/open", "Open a database file"),
    ("/seed", "Replace database contents with sample data"),
    ("/json", "Toggle JSON output"),
    ("/clear", "Clear the screen"),
    ("/help", "Show available commands"),
    ("/exit", "Quit the REPL"),
];

/// REPL helper for tab completion.
#[derive(Default)]
struct QueryHelper;

fn candidates(values: &[String], typed: &str) -> Vec<Pair> {
    values
        .iter()
        .filter(|v| v.starts_with(typed))
        .map(|v| Pair {
            display: v.clone(),
            replacement: format!("{v} "),
        })
        .collect()
}

fn db_files() -> Vec<String> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(".") {
        for entry in entries.flatten() {
            let path = entry.path();
            if path
                .extension()
                .is_some_and(|e| e == "db" || e == "sqlite")
            {
                if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                    files.push(name.to_string());
                }
            }
        }
    }
    files.sort();
    files
}

impl Completer for QueryHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let input = &line[..pos];

        if !input.contains(' ') {
            let matches: Vec<Pair> = COMMANDS
                .iter()
                .filter(|(cmd, _)| cmd.starts_with(input))
                .map(|(cmd, desc)| Pair {
                    display: format!("{cmd:<16} {desc}"),
                    replacement: format!("{cmd} "),
                })
                .collect();
            return Ok((0, matches));
        }

        let parts: Vec<&str> = input.splitn(2, ' ').collect();
        let cmd = parts[0];
        let args = if parts.len() > 1 { parts[1] } else { "" };
        let start = input.len() - args.len();

        let options: Vec<String> = match cmd {
            "/schema" => Dataset::ALL.iter().map(|d| d.to_string()).collect(),
            "/sample" => samples::samples()
                .iter()
                .map(|s| s.name.to_string())
                .collect(),
            "/open" => db_files(),
            _ => return Ok((pos, Vec::new())),
        };
        Ok((start, candidates(&options, args.trim())))
    }
}

impl Hinter for QueryHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() || line.is_empty() {
            return None;
        }
        if line.starts_with('/') && !line.contains(' ') {
            for (cmd, _) in COMMANDS {
                if cmd.starts_with(line) && *cmd != line {
                    return Some(cmd[line.len()..].to_string());
                }
            }
        }
        None
    }
}

impl Highlighter for QueryHelper {}
impl Validator for QueryHelper {}
impl Helper for QueryHelper {}

struct TabCompleteOrAcceptHint;

impl ConditionalEventHandler for TabCompleteOrAcceptHint {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext<'_>,
    ) -> Option<Cmd> {
        if ctx.has_hint() {
            Some(Cmd::CompleteHint)
        } else {
            Some(Cmd::Complete)
        }
    }
}

/// Session state.
struct ReplState {
    db_path: String,
    store: Option<ForensicStore>,
    mode: OutputMode,
}

impl ReplState {
    /// The open store, opening `db_path` on first use.
    fn store(&mut self) -> Option<&mut ForensicStore> {
        if self.store.is_none() {
            match ForensicStore::open(&self.db_path) {
                Ok(store) => self.store = Some(store),
                Err(e) => {
                    eprintln!("  Cannot open {}: {e}", self.db_path);
                    return None;
                }
            }
        }
        self.store.as_mut()
    }
}

/// Run the interactive REPL.
pub fn run(db: Option<&str>, mode: OutputMode) -> anyhow::Result<()> {
    eprintln!();
    eprintln!(
        "  \x1b[32m\u{25c9}\x1b[0m \x1b[1mfq v{}\x1b[0m \x1b[90m\u{2014} forensic query DSL\x1b[0m",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!();
    eprintln!(
        "    Paste a JSON query to run it. Press \x1b[36m/\x1b[0m to browse commands, \x1b[90mTab\x1b[0m to complete, \x1b[90m/exit\x1b[0m to quit."
    );
    eprintln!();

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .completion_prompt_limit(20)
        .build();

    let mut rl: Editor<QueryHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(config)?;
    rl.set_helper(Some(QueryHelper));
    rl.bind_sequence(
        KeyEvent::from('\t'),
        EventHandler::Conditional(Box::new(TabCompleteOrAcceptHint)),
    );

    let hist_path = std::path::PathBuf::from(home_dir()).join(".forensic_query_history");
    if hist_path.exists() {
        let _ = rl.load_history(&hist_path);
    }

    let mut state = ReplState {
        db_path: resolve_database_path(db),
        store: None,
        mode,
    };
    let prompt = " \x1b[36mfq>\x1b[0m ";

    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                if line.starts_with('{') {
                    cmd_run(line, &mut state);
                    continue;
                }

                let input = line.strip_prefix('/').unwrap_or(line);
                if input.is_empty() {
                    cmd_help();
                    continue;
                }

                let mut parts = input.splitn(2, ' ');
                let cmd = parts.next().unwrap_or("");
                let args = parts.next().unwrap_or("").trim();

                match cmd {
                    "exit" | "quit" => {
                        eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                        break;
                    }
                    "help" | "h" | "?" => cmd_help(),
                    "clear" | "cls" => eprint!("\x1b[2J\x1b[H"),
                    "run" => cmd_run(args, &mut state),
                    "validate" => report(commands::validate(args, state.mode, &mut std::io::stdout())),
                    "compile" => report(commands::compile(
                        args,
                        CompilerConfig::from_env(),
                        state.mode,
                        &mut std::io::stdout(),
                    )),
                    "sample" => cmd_sample(args, &mut state),
                    "samples" => report(commands::list_samples(state.mode, &mut std::io::stdout())),
                    "schema" => cmd_schema(args, state.mode),
                    "countries" => report(commands::countries(state.mode, &mut std::io::stdout())),
                    "open" => cmd_open(args, &mut state),
                    "seed" => cmd_seed(&mut state),
                    "json" => {
                        state.mode = if state.mode.is_json() {
                            OutputMode::Text
                        } else {
                            OutputMode::Json
                        };
                        eprintln!(
                            "  JSON output {}",
                            if state.mode.is_json() { "on" } else { "off" }
                        );
                    }
                    _ => {
                        eprintln!("  Unknown command '/{cmd}'. Type /help for commands.");
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("  \x1b[90m(Ctrl+C)\x1b[0m Type \x1b[1m/exit\x1b[0m to quit.");
            }
            Err(ReadlineError::Eof) => {
                eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("  Error: {err}");
                break;
            }
        }
    }

    let _ = std::fs::create_dir_all(hist_path.parent().unwrap_or(std::path::Path::new(".")));
    let _ = rl.save_history(&hist_path);

    Ok(())
}

fn report<T>(result: anyhow::Result<T>) {
    if let Err(e) = result {
        eprintln!("  Error: {e:#}");
    }
}

fn cmd_help() {
    eprintln!();
    eprintln!("  Commands:");
    eprintln!();
    for (cmd, desc) in COMMANDS {
        eprintln!("    {cmd:<18} {desc}");
    }
    eprintln!();
    eprintln!("  Example: {{\"dataset\": \"calls\", \"filters\": [{{\"field\": \"duration\", \"op\": \">\", \"value\": 600}}]}}");
    eprintln!();
}

fn cmd_run(text: &str, state: &mut ReplState) {
    if text.is_empty() {
        eprintln!("  Usage: /run <json>");
        return;
    }
    let mode = state.mode;
    if let Some(store) = state.store() {
        report(commands::run_with_store(store, text, mode, &mut std::io::stdout()));
    }
}

fn cmd_sample(name: &str, state: &mut ReplState) {
    let Some(sample) = samples::sample(name) else {
        eprintln!("  Unknown sample '{name}'. Type /samples to list them.");
        return;
    };
    eprintln!("  {}", sample.description);
    cmd_run(&sample.query.to_string(), state);
}

fn cmd_schema(args: &str, mode: OutputMode) {
    let dataset = if args.is_empty() {
        None
    } else {
        match args.parse::<Dataset>() {
            Ok(d) => Some(d),
            Err(e) => {
                eprintln!("  {e}");
                return;
            }
        }
    };
    report(commands::schema(dataset, mode, &mut std::io::stdout()));
}

fn cmd_open(args: &str, state: &mut ReplState) {
    if args.is_empty() {
        eprintln!("  Current database: {}", state.db_path);
        return;
    }
    let path = args.split_whitespace().next().unwrap_or(args).to_string();
    match ForensicStore::open(&path).and_then(|s| s.ensure_schema().map(|_| s)) {
        Ok(store) => {
            eprintln!("  Opened {path}");
            state.db_path = path;
            state.store = Some(store);
        }
        Err(e) => eprintln!("  Failed to open {path}: {e}"),
    }
}

fn cmd_seed(state: &mut ReplState) {
    let path = state.db_path.clone();
    if let Some(store) = state.store() {
        match store.seed_sample() {
            Ok(s) => eprintln!(
                "  Seeded {path}: {} messages, {} calls, {} contacts, {} entities",
                s.messages, s.calls, s.contacts, s.entities
            ),
            Err(e) => eprintln!("  Seeding failed: {e}"),
        }
    }
}
