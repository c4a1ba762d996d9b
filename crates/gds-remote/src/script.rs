//! A small script AST that serialises to shell-safe text.
//!
//! Statements cover simple commands with redirections, here-docs, comments,
//! and raw control-flow lines; every generated script goes through the
//! non-executing `bash -n` pre-check before it reaches the user.

use std::fmt::Write as _;

/// Redirection target for one stream.
#[derive(Debug, Clone)]
pub enum Redirect {
    /// `> "path"`
    File(String),
    /// `>> "path"`
    Append(String),
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Comment(String),
    /// One simple command; program and args are quoted on render.
    Command {
        program: String,
        args: Vec<String>,
        stdout: Option<Redirect>,
        stderr: Option<Redirect>,
    },
    /// A pre-rendered line (control flow, special-cased quoting).
    Raw(String),
    /// `command <<'TAG' [> "file"]` ... body ... `TAG`
    HereDoc {
        command: String,
        tag: String,
        body: String,
        stdout: Option<String>,
    },
    Blank,
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    stmts: Vec<Stmt>,
}

impl Script {
    pub fn new() -> Self {
        Script::default()
    }

    pub fn comment(&mut self, text: impl Into<String>) -> &mut Self {
        self.stmts.push(Stmt::Comment(text.into()));
        self
    }

    pub fn command(&mut self, program: impl Into<String>, args: &[&str]) -> &mut Self {
        self.stmts.push(Stmt::Command {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            stdout: None,
            stderr: None,
        });
        self
    }

    pub fn command_redirected(
        &mut self,
        program: impl Into<String>,
        args: &[&str],
        stdout: Option<Redirect>,
        stderr: Option<Redirect>,
    ) -> &mut Self {
        self.stmts.push(Stmt::Command {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            stdout,
            stderr,
        });
        self
    }

    pub fn raw(&mut self, line: impl Into<String>) -> &mut Self {
        self.stmts.push(Stmt::Raw(line.into()));
        self
    }

    pub fn heredoc(
        &mut self,
        command: impl Into<String>,
        tag: impl Into<String>,
        body: impl Into<String>,
        stdout: Option<String>,
    ) -> &mut Self {
        self.stmts.push(Stmt::HereDoc {
            command: command.into(),
            tag: tag.into(),
            body: body.into(),
            stdout,
        });
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.stmts.push(Stmt::Blank);
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for stmt in &self.stmts {
            match stmt {
                Stmt::Comment(text) => {
                    let _ = writeln!(out, "# {text}");
                }
                Stmt::Command {
                    program,
                    args,
                    stdout,
                    stderr,
                } => {
                    let mut line = quote(program);
                    for arg in args {
                        let _ = write!(line, " {}", quote(arg));
                    }
                    match stdout {
                        Some(Redirect::File(path)) => {
                            let _ = write!(line, " > {}", dquote(path));
                        }
                        Some(Redirect::Append(path)) => {
                            let _ = write!(line, " >> {}", dquote(path));
                        }
                        None => {}
                    }
                    match stderr {
                        Some(Redirect::File(path)) => {
                            let _ = write!(line, " 2> {}", dquote(path));
                        }
                        Some(Redirect::Append(path)) => {
                            let _ = write!(line, " 2>> {}", dquote(path));
                        }
                        None => {}
                    }
                    let _ = writeln!(out, "{line}");
                }
                Stmt::Raw(line) => {
                    let _ = writeln!(out, "{line}");
                }
                Stmt::HereDoc {
                    command,
                    tag,
                    body,
                    stdout,
                } => {
                    match stdout {
                        Some(path) => {
                            let _ = writeln!(out, "{command} <<'{tag}' > {}", dquote(path));
                        }
                        None => {
                            let _ = writeln!(out, "{command} <<'{tag}'");
                        }
                    }
                    let _ = writeln!(out, "{body}");
                    let _ = writeln!(out, "{tag}");
                }
                Stmt::Blank => out.push('\n'),
            }
        }
        out
    }
}

/// POSIX single-quote quoting of one word.
pub fn quote(word: &str) -> String {
    shlex::try_quote(word)
        .map(|q| q.into_owned())
        .unwrap_or_else(|_| format!("'{}'", word.replace('\'', r"'\''")))
}

/// Wrap in double quotes, escaping what stays special inside them.
pub fn dquote(text: &str) -> String {
    format!("\"{}\"", escape_double_quoted(text, true))
}

/// Escape for interpolation inside a double-quoted bash string. Backslash
/// first, then quote; `$` and backtick only when `full` is set.
pub fn escape_double_quoted(text: &str, full: bool) -> String {
    let mut escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    if full {
        escaped = escaped.replace('$', "\\$").replace('`', "\\`");
    }
    escaped
}

/// Escape a command for display inside an `echo "..."`.
pub fn escape_for_display(command: &str) -> String {
    escape_double_quoted(command, true)
}

/// Render the user invocation, shell-quoted. `python -c`, `bash -c`, and
/// `sh -c` keep their program text as one double-quoted argument instead of
/// letting shlex mangle it.
pub fn quote_invocation(cmd: &str, args: &[String]) -> String {
    if args.len() >= 2 && args[0] == "-c" {
        match cmd {
            "python" | "python3" => {
                let code = escape_double_quoted(&args[1], true);
                return format!("{cmd} -c \"{code}\"");
            }
            "bash" | "sh" => {
                let body = escape_double_quoted(&args[1], false);
                return format!("{cmd} -c \"{body}\"");
            }
            _ => {}
        }
    }
    if args.is_empty() {
        quote(cmd)
    } else {
        let mut line = quote(cmd);
        for arg in args {
            line.push(' ');
            line.push_str(&quote(arg));
        }
        line
    }
}
