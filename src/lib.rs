//! Compiler core for Rugo, a Ruby-flavored scripting language that compiles
//! ahead-of-time into a host systems language.
//!
//! Pipeline: `ParseFile(path)` → read file → preprocess (L2) → parser
//! (external, L3 boundary) → walk into typed AST (L3) → merge
//! required/imported modules (L5, recursing through the remote fetcher L6)
//! → semantic checks (L8) → type inference (L7) → codegen (L10) emitting a
//! host-language IR (L9) → print to host source → binary cache lookup/store
//! (L11).
//!
//! `preprocess`, `parser`, `ast`, `walker`, `resolve`, `checks`, `types`,
//! `hostir`, `codegen`, and `cache` are wired below; [`compile`] is the
//! top-level entry point tying all eleven layers together.

#![allow(clippy::result_large_err)]

pub mod ast;
pub mod cache;
pub mod checks;
pub mod codegen;
pub mod error;
pub mod hostir;
pub mod lineinfo;
pub mod parser;
pub mod preprocess;
pub mod resolve;
pub mod types;
pub mod walker;

use std::path::{Path, PathBuf};

use anyhow::Context as _;

pub use error::{ErrorMessage, ErrorMessages, SourceLocation};
pub use resolve::Grammar;

/// Runs preprocessing (L2) over raw source, returning parser-ready text and
/// the line map back to the original file.
pub fn preprocess_source(source: &str) -> Result<(String, lineinfo::LineMap), ErrorMessages> {
    preprocess::preprocess(source).map_err(error::downcast)
}

/// Everything `compile` needs besides the entry file itself: the standard
/// module/bridge catalog, the external grammar to hand every compile unit
/// (root or `require`d) to, and where fetched remote modules are cached.
pub struct CompileOptions<'a> {
    pub registry: &'a resolve::Registry,
    pub grammar: Grammar<'a>,
    pub module_dir: PathBuf,
    pub lock_file: Option<PathBuf>,
}

/// The generated host source plus the module manifest content it was
/// compiled against — exactly the pair [`cache::BinCache::key`] hashes.
pub struct Compiled {
    pub go_source: String,
    pub go_mod: String,
}

/// Runs the full pipeline (L1–L10) over the file at `path`: read, preprocess,
/// parse, walk, resolve, check, infer, generate, print. Does not touch the
/// binary cache or invoke a host toolchain — callers combine this with
/// [`cache::BinCache`] and their own `go build` invocation (or skip both on
/// a cache hit).
pub fn compile(path: &Path, opts: &CompileOptions<'_>) -> Result<Compiled, ErrorMessages> {
    compile_inner(path, opts).map_err(error::downcast)
}

fn compile_inner(path: &Path, opts: &CompileOptions<'_>) -> anyhow::Result<Compiled> {
    let source = std::fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
    let (preprocessed, line_map) = preprocess::preprocess(&source)?;
    let root_node = (opts.grammar)(&preprocessed).with_context(|| format!("parsing {path:?}"))?;

    let file = path.to_string_lossy().to_string();
    let mut program = walker::walk_program(&root_node, &line_map, &file, &source)?;

    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut resolver = resolve::Resolver::new(opts.registry, opts.module_dir.clone(), opts.grammar);
    if let Some(lock_path) = &opts.lock_file {
        resolver = resolver.with_lock_file(lock_path.clone())?;
    }
    let module = resolver.resolve(&mut program, &base_dir)?;

    checks::check_program(&program, &module, opts.registry, &file)?;
    let types = types::infer_program(&program);

    let host_file = codegen::generate(&program, &module, opts.registry, &types);
    let go_source = hostir::print_file(&host_file);
    let go_mod = render_go_mod(&module, opts.registry);

    Ok(Compiled { go_source, go_mod })
}

/// The generated program's module manifest: a `require` line per distinct
/// bridge package a compile unit (root or merged-in) pulled in, which is
/// everything the binary cache key needs to distinguish builds that differ
/// only in their host dependencies.
fn render_go_mod(module: &resolve::Module, registry: &resolve::Registry) -> String {
    let mut packages: Vec<&str> = module
        .names
        .values()
        .filter_map(|decl| match &decl.kind {
            resolve::DeclKind::Bridge { package } => Some(package.as_str()),
            _ => None,
        })
        .collect();
    packages.sort_unstable();
    packages.dedup();

    let mut out = String::from("module rugo-program\n\ngo 1.21\n");
    for package in packages {
        if registry.has_bridge(package) {
            out.push_str(&format!("require {package}\n"));
        }
    }
    out
}
