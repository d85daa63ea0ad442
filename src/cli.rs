// src/cli.rs
use crate::config::{normalize_base_url, Config};
use crate::dashboard::Action;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Terminal dashboard for the TradeLab paper-trading API", long_about = None)]
pub struct Cli {
    /// Backend base URL, overriding TRADELAB_API_BASE_URL.
    #[arg(long)]
    pub api_base_url: Option<String>,

    /// Keep the signed-in user in this file instead of asking the backend.
    #[arg(long)]
    pub session_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in, then open the dashboard.
    SignIn(Credentials),

    /// Create an account, then open the dashboard.
    SignUp(SignUpArgs),

    /// Open the dashboard with the existing session (default).
    Dashboard,

    /// End the current session.
    SignOut,

    /// Report API liveness and exit.
    Health,
}

#[derive(Args, Debug)]
pub struct Credentials {
    #[arg(long)]
    pub email: String,

    #[arg(long, env = "TRADELAB_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Args, Debug)]
pub struct SignUpArgs {
    #[command(flatten)]
    pub credentials: Credentials,

    #[arg(long)]
    pub full_name: Option<String>,
}

impl Cli {
    pub fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.api_base_url {
            config.api_base_url = normalize_base_url(url);
        }
        if let Some(path) = &self.session_file {
            config.session_file = Some(path.clone());
        }
    }
}

/// One line typed into the running dashboard.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Dispatch(Action),
    Show,
    SignOut,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  add <SYMBOL> [name]   add a symbol to the watchlist
  rm <SYMBOL>           remove a symbol
  clear                 empty the watchlist
  view <SYMBOL>         select a symbol and load its chart
  search [text]         search symbols (blank clears)
  pick <N>              add the N-th search result
  filter [text]         filter watchlist rows (blank shows all)
  show                  redraw
  logout                sign out
  quit                  exit";

pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_lowercase().as_str() {
        "" | "show" | "ls" => Command::Show,
        "add" => {
            let (symbol, name) = match rest.split_once(char::is_whitespace) {
                Some((symbol, name)) => (symbol, Some(name.trim().to_string())),
                None => (rest, None),
            };
            if symbol.is_empty() {
                return Err("usage: add <SYMBOL> [name]".to_string());
            }
            Command::Dispatch(Action::Add {
                symbol: symbol.to_string(),
                name: name.filter(|n| !n.is_empty()),
            })
        }
        "rm" | "remove" => Command::Dispatch(Action::Remove(required(rest, "rm <SYMBOL>")?)),
        "clear" => Command::Dispatch(Action::Clear),
        "view" | "select" => Command::Dispatch(Action::Select(required(rest, "view <SYMBOL>")?)),
        "search" => Command::Dispatch(Action::Search(rest.to_string())),
        "pick" => {
            let position: usize = rest
                .parse()
                .map_err(|_| "usage: pick <N> (1-based)".to_string())?;
            if position == 0 {
                return Err("search results are numbered from 1".to_string());
            }
            Command::Dispatch(Action::Choose(position - 1))
        }
        "filter" => Command::Dispatch(Action::Filter(rest.to_string())),
        "logout" | "signout" => Command::SignOut,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command {:?}, try `help`", other)),
    };
    Ok(command)
}

fn required(rest: &str, usage: &str) -> Result<String, String> {
    if rest.is_empty() {
        Err(format!("usage: {}", usage))
    } else {
        Ok(rest.to_string())
    }
}
