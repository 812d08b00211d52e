use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;

use chordmap::cli::{
    parse_keys, resolve_sequence, CheckArgs, CliArgs, CliCommand, EvalArgs, ListArgs, ResolveArgs,
};
use chordmap::config::EngineConfig;
use chordmap::keymap::{
    lint_keymap, load_keymap_file, load_registry, merge_layer, KeybindingResolver, WhenClause,
};

fn main() -> Result<()> {
    chordmap::tracing::init();

    let args = CliArgs::parse();
    let keymap = args.keymap.as_deref();

    match args.command {
        CliCommand::Resolve(resolve) => run_resolve(resolve, keymap),
        CliCommand::Eval(eval) => run_eval(eval),
        CliCommand::List(list) => run_list(list, keymap),
        CliCommand::Check(check) => run_check(check),
    }
}

/// Effective keymap (defaults, project, user, then `--keymap`) and engine config
fn load_resolver(extra_keymap: Option<&Path>) -> Result<KeybindingResolver> {
    let mut registry = load_registry();

    if let Some(path) = extra_keymap {
        let file = load_keymap_file(path)
            .with_context(|| format!("Failed to load keymap {}", path.display()))?;
        merge_layer(&mut registry, file, path);
    }

    let config = EngineConfig::load();
    Ok(KeybindingResolver::from_config(registry, &config))
}

fn run_resolve(args: ResolveArgs, keymap: Option<&Path>) -> Result<()> {
    let keystrokes = parse_keys(&args.keys).map_err(anyhow::Error::msg)?;
    let ctx = args.context.into_context().map_err(anyhow::Error::msg)?;
    let mut resolver = load_resolver(keymap)?;

    let steps = resolve_sequence(
        &mut resolver,
        &keystrokes,
        &ctx,
        Duration::from_millis(args.delay_ms),
        Instant::now(),
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&steps)?);
    } else {
        for step in &steps {
            println!("{}", step);
        }
    }

    Ok(())
}

fn run_eval(args: EvalArgs) -> Result<()> {
    let ctx = args.context.into_context().map_err(anyhow::Error::msg)?;

    match WhenClause::try_parse(&args.expr) {
        Ok(expr) => {
            tracing::debug!("Parsed when-clause as {}", expr);
            println!("{}", expr.eval(&ctx));
        }
        Err(e) => {
            // Same outcome as a broken clause in a keymap: never true
            eprintln!("invalid when-clause: {}", e);
            println!("false");
        }
    }

    Ok(())
}

fn run_list(args: ListArgs, keymap: Option<&Path>) -> Result<()> {
    let resolver = load_resolver(keymap)?;

    for binding in resolver.registry().iter() {
        if let Some(category) = &args.category {
            if !binding.category.eq_ignore_ascii_case(category) {
                continue;
            }
        }

        let keys = binding
            .effective_keybinding()
            .map(|kb| resolver.format_keybinding(kb))
            .unwrap_or_else(|| "-".to_string());
        let marker = if binding.is_customized() { "*" } else { " " };
        let when = binding
            .effective_when()
            .map(|w| w.source().to_string())
            .unwrap_or_default();

        println!(
            "{}{:<12} {:<22} {:<45} {}",
            marker, binding.category, keys, binding.command_id, when
        );
    }

    Ok(())
}

fn run_check(args: CheckArgs) -> Result<()> {
    let path = &args.file;
    let file = load_keymap_file(path)
        .with_context(|| format!("Failed to load keymap {}", path.display()))?;

    let mut problems = lint_keymap(&file);

    let known = load_registry();
    for over in &file.overrides {
        let declared = file.bindings.iter().any(|b| b.command_id == over.command_id);
        if !declared && !known.contains(&over.command_id) {
            problems.push(format!("override for unknown command '{}'", over.command_id));
        }
    }

    for problem in &problems {
        println!("warning: {}", problem);
    }
    println!(
        "{}: {} bindings, {} overrides",
        path.display(),
        file.bindings.len(),
        file.overrides.len()
    );

    if !problems.is_empty() {
        anyhow::bail!("{} problem(s) found in {}", problems.len(), path.display());
    }
    Ok(())
}
