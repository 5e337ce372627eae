use std::{ops::Range, path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use codesnake::{Block, CodeWidth, Label, LineIndex};
use sprig::{lexer, CompileError, LexError, Session, SourceLocation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use yansi::Paint;

/// Compile and run sprig programs
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Program text to run once. Starts a prompt if neither this nor --file is given.
    source: Option<String>,
    /// Read the program from a file
    #[arg(short, long, conflicts_with = "source")]
    file: Option<PathBuf>,
    /// Print the output of a pipeline stage before the result
    #[arg(short, long, value_enum)]
    dump: Vec<Stage>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Tokens,
    Ast,
    Bytecode,
}

fn dump(session: &Session, stages: &[Stage]) {
    for stage in stages {
        match stage {
            Stage::Tokens => {
                let tokens: Vec<_> = session.tokens().iter().map(|t| t.to_string()).collect();
                println!("{}", tokens.join(" ").dim());
            }
            Stage::Ast => {
                if let Some(module) = session.module() {
                    println!("{}", module.to_string().dim());
                }
            }
            Stage::Bytecode => print!("{}", session.program().to_string().dim()),
        }
    }
}

/// The source range to underline for an error at `location`
fn error_span(
    session: &Session,
    index: &lexer::LineIndex,
    location: SourceLocation,
    error: &CompileError,
) -> Option<Range<usize>> {
    let start = index.offset(location)?;
    let len = match error {
        CompileError::Lex(LexError::UnrecognizedCharacter { character, .. }) => {
            character.len_utf8()
        }
        _ => session
            .tokens()
            .iter()
            .find(|token| token.location == location)
            .map_or(1, |token| token.source_len()),
    };
    Some(start..start + len)
}

fn location_of(error: &CompileError) -> Option<SourceLocation> {
    let location = match error {
        CompileError::Lex(err) => err.location(),
        CompileError::Parse(err) => err.location,
        CompileError::Emit(err) => err.location(),
        CompileError::NoModule | CompileError::ResidualStack { .. } => return None,
    };
    location.is_valid().then_some(location)
}

/// An annotated source snippet pointing at where `error` happened
fn snippet(session: &Session, name: &str, source: &str, error: &CompileError) -> Option<String> {
    let location = location_of(error)?;
    let span = error_span(session, &lexer::LineIndex::new(source), location, error)?;
    let idx = LineIndex::new(source);
    let label = Label::new(span)
        .with_text(error.to_string().red().to_string())
        .with_style(|s| s.red().to_string());
    let block = Block::new(&idx, [label])?.map_code(|c| CodeWidth::new(c, c.len()));
    Some(format!(
        "{}[{name}]\n{block}{}",
        block.prologue(),
        block.epilogue()
    ))
}

fn report(session: &Session, name: &str, source: &str, error: &CompileError) {
    eprintln!("{} {error}", "error:".red().bold());
    if let Some(snippet) = snippet(session, name, source, error) {
        eprintln!("{snippet}");
    }
}

/// Compile `source` and print its value. Returns whether it succeeded.
fn run(session: &mut Session, name: &str, source: &str, stages: &[Stage]) -> bool {
    let result = session.compile(source);
    dump(session, stages);
    match result {
        Ok(Some(value)) => {
            println!("{value}");
            true
        }
        Ok(None) => true,
        Err(err) => {
            report(session, name, source, &err);
            false
        }
    }
}

fn repl(stages: &[Stage]) -> anyhow::Result<()> {
    let mut readline = rustyline::DefaultEditor::new()?;
    let mut session = Session::new();

    while let Ok(input) = readline.readline(">> ") {
        if input.trim().is_empty() {
            continue;
        }
        readline.add_history_entry(input.as_str())?;
        run(&mut session, "<repl>", &input, stages);
    }

    Ok(())
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let (name, source) = match (args.source, args.file) {
        (Some(source), _) => ("<arg>".to_string(), source),
        (None, Some(path)) => {
            let source = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            (path.display().to_string(), source)
        }
        (None, None) => {
            repl(&args.dump)?;
            return Ok(ExitCode::SUCCESS);
        }
    };

    let mut session = Session::new();
    if run(&mut session, &name, &source, &args.dump) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
