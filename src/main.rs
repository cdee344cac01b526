use std::collections::BTreeSet;
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use clap::Parser;
use clap::Subcommand;
use expr::Environment;
use miette::IntoDiagnostic;
use miette::WrapErr;
use miette::miette;

#[derive(Parser, Debug)]
#[command(version, about = "Tokenize, parse and evaluate arithmetic expressions")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the tokens of every line
    Tokenize { filename: Option<PathBuf> },
    /// Print every line in its fully parenthesised form
    Parse { filename: Option<PathBuf> },
    /// Check every line and evaluate it with all variables set to 0
    Check { filename: Option<PathBuf> },
    /// Evaluate every line; all variables must be bound with --var
    Eval {
        filename: Option<PathBuf>,
        /// A binding such as `x=1.5`
        #[arg(short = 'v', long = "var", value_parser = parse_binding)]
        vars: Vec<(String, f64)>,
    },
    /// Tabulate an expression of one variable over [from, to)
    Sweep {
        expression: String,
        #[arg(long, default_value = "x")]
        var: String,
        #[arg(long, default_value_t = 0.0)]
        from: f64,
        #[arg(long, default_value_t = 1.0)]
        to: f64,
        #[arg(long, default_value_t = 0.1)]
        step: f64,
    },
}

fn parse_binding(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{s}`"))?;
    let value = value
        .trim()
        .parse()
        .map_err(|e| format!("bad value for `{name}`: {e}"))?;
    Ok((name.trim().to_string(), value))
}

fn read_lines(filename: Option<&Path>) -> miette::Result<Vec<String>> {
    match filename {
        Some(filename) => {
            let file_contents = fs::read_to_string(filename)
                .into_diagnostic()
                .wrap_err_with(|| format!("reading `{}` failed", filename.display()))?;
            Ok(file_contents.lines().map(str::to_owned).collect())
        }
        None => io::stdin()
            .lock()
            .lines()
            .collect::<Result<_, _>>()
            .into_diagnostic()
            .wrap_err("reading standard input failed"),
    }
}

fn source_name(filename: Option<&Path>) -> String {
    filename.map_or_else(|| "<stdin>".to_string(), |path| path.display().to_string())
}

fn main() -> miette::Result<()> {
    env_logger::init();

    let args = Args::parse();

    let mut failed = false;
    match args.command {
        Commands::Tokenize { filename } => {
            let name = source_name(filename.as_deref());
            for line in read_lines(filename.as_deref())? {
                for token in expr::Lexer::new(Some(name.as_str()), &line) {
                    match token {
                        Ok(token) => println!("{token}"),
                        Err(e) => {
                            eprintln!("{e:?}");
                            failed = true;
                        }
                    }
                }
            }
        }
        Commands::Parse { filename } => {
            let name = source_name(filename.as_deref());
            for line in read_lines(filename.as_deref())? {
                match expr::Parser::new(Some(name.as_str()), &line).parse_expr() {
                    Ok(expr) => println!("{expr}"),
                    Err(e) => {
                        eprintln!("{e:?}");
                        failed = true;
                    }
                }
            }
        }
        Commands::Check { filename } => {
            let name = source_name(filename.as_deref());
            let env = Environment::new();
            for line in read_lines(filename.as_deref())? {
                let expr = match expr::Parser::new(Some(name.as_str()), &line).parse_expr() {
                    Ok(expr) => expr,
                    Err(e) => {
                        eprintln!("{e:?}");
                        failed = true;
                        continue;
                    }
                };
                println!("Parsed: {expr}");

                let mut vars = BTreeSet::new();
                if let Err(e) = expr.check(&mut vars) {
                    eprintln!("{:?}", miette::Report::new(e));
                    failed = true;
                    continue;
                }
                println!("Vars: {vars:?} (all set to 0)");
                println!("Eval: {}", expr.eval(&env)?);
            }
        }
        Commands::Eval { filename, vars } => {
            let env: Environment = vars.into_iter().collect();
            for line in read_lines(filename.as_deref())? {
                match expr::evaluate(&line, &env) {
                    Ok(value) => println!("{value}"),
                    Err(e) => {
                        eprintln!("{e:?}");
                        failed = true;
                    }
                }
            }
        }
        Commands::Sweep {
            expression,
            var,
            from,
            to,
            step,
        } => {
            if !(step > 0.0) {
                return Err(miette!("step must be positive, got {step}"));
            }

            let expr = expr::Parser::new(Some("<expression>"), &expression).parse_expr()?;
            let mut vars = BTreeSet::new();
            expr.check(&mut vars)?;
            if let Some(name) = vars.iter().find(|name| **name != var) {
                return Err(miette!("undefined variable: {name}"));
            }

            let mut env = Environment::new();
            let mut x = from;
            while x < to {
                env.define(var.as_str(), x);
                println!("{x:.6}\t{:.6}", expr.eval(&env)?);
                x += step;
            }
        }
    }

    if failed {
        std::process::exit(65);
    }
    Ok(())
}
