//! Benchmarks for keystroke resolution hot paths
//!
//! Run with: cargo bench resolution

use std::time::Instant;

use chordmap::keymap::{
    default_registry, parse_keymap_yaml, BindingRegistry, CommandBinding, ContextKeys,
    KeybindingResolver, Keystroke, Modifiers, WhenClause,
};

fn main() {
    divan::main();
}

fn cmd(c: char) -> Keystroke {
    Keystroke::char_with_mods(c, Modifiers::cmd())
}

fn editor_ctx() -> ContextKeys {
    ContextKeys::new()
        .with("editorFocus", true)
        .with("editorTextFocus", true)
        .with("editorLangId", "rust")
}

/// Registry with `n` single-key commands on top of the defaults
fn large_registry(n: usize) -> BindingRegistry {
    let mut registry = default_registry();
    for i in 0..n {
        let stroke = Keystroke::new(&format!("F{}", 1 + i % 24), Modifiers::ALT);
        registry.register(
            CommandBinding::new(&format!("bench.command{}", i), "Bench", "Bench")
                .keys(stroke)
                .when("editorTextFocus && !terminalFocus"),
        );
    }
    registry
}

// ============================================================================
// Resolution
// ============================================================================

#[divan::bench]
fn single_key(bencher: divan::Bencher) {
    let ctx = editor_ctx();
    let stroke = cmd('s');
    bencher
        .with_inputs(|| KeybindingResolver::new(default_registry()))
        .bench_local_refs(|resolver| resolver.handle_keystroke_at(&stroke, &ctx, Instant::now()));
}

#[divan::bench]
fn two_key_chord(bencher: divan::Bencher) {
    let ctx = editor_ctx();
    let (first, second) = (cmd('k'), cmd('s'));
    bencher
        .with_inputs(|| KeybindingResolver::new(default_registry()))
        .bench_local_refs(|resolver| {
            let now = Instant::now();
            resolver.handle_keystroke_at(&first, &ctx, now);
            resolver.handle_keystroke_at(&second, &ctx, now)
        });
}

#[divan::bench(args = [100, 1_000, 10_000])]
fn crowded_first_stroke(bencher: divan::Bencher, n: usize) {
    let ctx = editor_ctx();
    let stroke = Keystroke::new("F1", Modifiers::ALT);
    bencher
        .with_inputs(|| KeybindingResolver::new(large_registry(n)))
        .bench_local_refs(|resolver| resolver.handle_keystroke_at(&stroke, &ctx, Instant::now()));
}

// ============================================================================
// When-clauses
// ============================================================================

#[divan::bench]
fn parse_when_clause() -> WhenClause {
    WhenClause::parse(divan::black_box(
        "editorTextFocus && !editorReadonly && (editorLangId == rust || editorLangId == 'toml')",
    ))
}

#[divan::bench]
fn evaluate_when_clause(bencher: divan::Bencher) {
    let clause =
        WhenClause::parse("editorTextFocus && !editorReadonly && editorLangId != plaintext");
    let ctx = editor_ctx();
    bencher.bench(|| clause.evaluate(divan::black_box(&ctx)));
}

// ============================================================================
// Keymap loading
// ============================================================================

#[divan::bench]
fn parse_default_keymap() -> usize {
    let yaml = chordmap::keymap::get_default_keymap_yaml();
    parse_keymap_yaml(divan::black_box(yaml))
        .map(|file| file.bindings.len())
        .unwrap_or(0)
}
