use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use feature_evaluator::config::Config;
use feature_evaluator::errors::{EvalError, Result};
use feature_evaluator::repository::InMemoryRepository;
use feature_evaluator::validation::validate_constraints;
use feature_evaluator::{Constraint, Context, Evaluator, Playground};

/// Evaluate feature toggles from a client-features JSON document.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Settings file (defaults to ./fev.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate one feature, or every feature in the document
    Eval {
        /// Client-features JSON file
        features: PathBuf,
        /// Only evaluate this feature
        #[arg(long)]
        feature: Option<String>,
        #[command(flatten)]
        context: ContextArgs,
    },
    /// Resolve the variant a context receives
    Variant {
        features: PathBuf,
        feature: String,
        #[command(flatten)]
        context: ContextArgs,
    },
    /// Evaluate everything across environments, expanding comma-separated context values
    Playground {
        /// `env=features.json`; a bare path uses the configured default environment
        #[arg(required = true)]
        environments: Vec<String>,
        /// Override the configured query limit
        #[arg(long)]
        limit: Option<usize>,
        /// Only include features of these projects
        #[arg(long = "project")]
        projects: Vec<String>,
        #[command(flatten)]
        context: ContextArgs,
    },
    /// Check a JSON array of constraints
    ValidateConstraints {
        constraints: PathBuf,
        /// Comma-separated legal values of the constrained context field
        #[arg(long, value_delimiter = ',')]
        legal_values: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct ContextArgs {
    /// Context as JSON, e.g. '{"userId":"42","properties":{"tier":"gold"}}'
    #[arg(long)]
    context: Option<String>,
    /// Set a context field; repeatable. Unknown names become properties.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,
}

impl ContextArgs {
    fn build(&self) -> Result<Context> {
        let mut context = match &self.context {
            Some(json) => serde_json::from_str(json)?,
            None => Context::new(),
        };
        for pair in &self.set {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                EvalError::BadData(format!("expected KEY=VALUE, got '{pair}'"))
            })?;
            match key {
                "userId" | "sessionId" | "remoteAddress" | "environment" | "appName" | "currentTime" => {
                    context.set(key, value)?
                }
                _ => {
                    context.properties.insert(key.to_string(), value.to_string());
                }
            }
        }
        Ok(context)
    }
}

fn load_evaluator(path: &Path) -> Result<Evaluator> {
    let repository = InMemoryRepository::from_path(path)?;
    debug!(path = %path.display(), features = repository.len(), "loaded features");
    Ok(Evaluator::with_builtins(repository))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Command::Eval {
            features,
            feature,
            context,
        } => {
            let evaluator = load_evaluator(&features)?;
            let context = context.build()?;
            match feature {
                Some(name) => print_json(&evaluator.is_enabled(&name, &context, false)),
                None => {
                    let all: BTreeMap<_, _> = evaluator
                        .repository()
                        .get_toggles()
                        .into_iter()
                        .map(|f| (f.name.clone(), evaluator.is_enabled(&f.name, &context, false)))
                        .collect();
                    print_json(&all)
                }
            }
        }
        Command::Variant {
            features,
            feature,
            context,
        } => {
            let evaluator = load_evaluator(&features)?;
            print_json(&evaluator.get_variant(&feature, &context.build()?, None))
        }
        Command::Playground {
            environments,
            limit,
            projects,
            context,
        } => {
            let mut playground = Playground::new(limit.unwrap_or(config.playground.limit));
            let mut names = Vec::with_capacity(environments.len());
            for arg in &environments {
                let (name, path) = match arg.split_once('=') {
                    Some((name, path)) => (name.to_string(), PathBuf::from(path)),
                    None => (config.playground.default_environment.clone(), PathBuf::from(arg)),
                };
                playground.add_environment(name.clone(), load_evaluator(&path)?);
                names.push(name);
            }
            let projects = (!projects.is_empty()).then_some(projects.as_slice());
            print_json(&playground.evaluate_advanced_query(&names, projects, &context.build()?)?)
        }
        Command::ValidateConstraints {
            constraints,
            legal_values,
        } => {
            let contents = fs::read_to_string(&constraints)?;
            let parsed: Vec<Constraint> = serde_json::from_str(&contents)?;
            validate_constraints(&parsed, &legal_values)?;
            print_json(&json!({ "valid": true, "constraints": parsed.len() }))
        }
    }
}

fn main() {
    // Parse CLI arguments.
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    // RUST_LOG wins over the configured filter.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.filter));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    if let Err(e) = run(cli, config) {
        eprintln!("{}", e.to_json());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(context: Option<&str>, set: &[&str]) -> ContextArgs {
        ContextArgs {
            context: context.map(str::to_string),
            set: set.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn set_routes_known_fields_and_properties() {
        let ctx = args(None, &["userId=42", "appName=web", "tier=gold"]).build().unwrap();
        assert_eq!(ctx.user_id.as_deref(), Some("42"));
        assert_eq!(ctx.app_name.as_deref(), Some("web"));
        assert_eq!(ctx.properties.get("tier").map(String::as_str), Some("gold"));
        assert!(!ctx.properties.contains_key("userId"));
    }

    #[test]
    fn set_overrides_the_json_context() {
        let ctx = args(Some(r#"{"userId":"1","properties":{"tier":"silver"}}"#), &["tier=gold"])
            .build()
            .unwrap();
        assert_eq!(ctx.user_id.as_deref(), Some("1"));
        assert_eq!(ctx.properties.get("tier").map(String::as_str), Some("gold"));
    }

    #[test]
    fn malformed_pairs_are_bad_data() {
        let err = args(None, &["userId"]).build().unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
