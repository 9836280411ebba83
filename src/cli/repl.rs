//! # REPL - Read-Eval-Print Loop
//!
//! The interactive loop for the dbite CLI. Handles:
//!
//! - Reading input with rustyline (history, line editing)
//! - Dispatching store commands (`get`, `put`, `del`, `commit`, `abort`)
//!   and dot commands (`.stat`, `.help`, `.quit`)
//! - Reporting errors without terminating the session
//!
//! ## Transaction Semantics
//!
//! Mutations buffer in the store until an explicit `commit`; `abort`
//! rolls the session back to the last commit. Quitting with uncommitted
//! changes prints a warning so data is never silently dropped; the
//! changes are simply not durable.
//!
//! ## Input Handling
//!
//! Keys never contain whitespace in this shell; a `put` value is the
//! remainder of the line, so values may contain spaces. Keys and values
//! are stored as the raw bytes typed.

use eyre::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::Store;

const PROMPT: &str = "dbite> ";

pub struct Repl {
    store: Store,
    editor: DefaultEditor,
}

impl Repl {
    pub fn new(store: Store) -> Result<Self> {
        let editor = DefaultEditor::new()?;
        Ok(Self { store, editor })
    }

    pub fn run(&mut self) -> Result<()> {
        println!("dbite {} (type .help for commands)", env!("CARGO_PKG_VERSION"));

        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = self.editor.add_history_entry(line);
                    match self.dispatch(line) {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(e) => eprintln!("error: {:#}", e),
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            }
        }

        if self.store.has_uncommitted() {
            eprintln!("warning: uncommitted changes were discarded");
        }
        Ok(())
    }

    /// Executes one input line. Returns true when the session should end.
    fn dispatch(&mut self, line: &str) -> Result<bool> {
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((c, r)) => (c, r.trim()),
            None => (line, ""),
        };

        match command {
            ".quit" | ".exit" => return Ok(true),
            ".help" => print_help(),
            ".stat" => self.print_stat(),
            "get" => {
                eyre::ensure!(!rest.is_empty(), "usage: get <key>");
                match self.store.get(rest.as_bytes())? {
                    Some(value) => println!("{}", String::from_utf8_lossy(&value)),
                    None => println!("(not found)"),
                }
            }
            "put" => {
                let (key, value) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| eyre::eyre!("usage: put <key> <value>"))?;
                self.store.put(key.as_bytes(), value.trim().as_bytes())?;
                println!("ok");
            }
            "del" => {
                eyre::ensure!(!rest.is_empty(), "usage: del <key>");
                if self.store.delete(rest.as_bytes())? {
                    println!("ok");
                } else {
                    println!("(not found)");
                }
            }
            "commit" => {
                self.store.commit()?;
                println!("committed txn {}", self.store.txn_id());
            }
            "abort" => {
                self.store.abort()?;
                println!("rolled back to txn {}", self.store.txn_id());
            }
            other => eprintln!("unknown command '{}', type .help", other),
        }
        Ok(false)
    }

    fn print_stat(&self) {
        println!("path:        {}", self.store.path().display());
        println!("txn id:      {}", self.store.txn_id());
        println!("root page:   {}", self.store.root_page());
        println!("dirty pages: {}", self.store.dirty_count());
        println!(
            "uncommitted: {}",
            if self.store.has_uncommitted() { "yes" } else { "no" }
        );
    }
}

fn print_help() {
    println!("COMMANDS:");
    println!("    get <key>            Look up a key");
    println!("    put <key> <value>    Insert or replace a key");
    println!("    del <key>            Remove a key");
    println!("    commit               Make buffered changes durable");
    println!("    abort                Discard buffered changes");
    println!();
    println!("DOT COMMANDS:");
    println!("    .stat                Show store state");
    println!("    .help                Show this help");
    println!("    .quit                Exit (uncommitted changes are discarded)");
}
