//! The set of standard-library modules (`use`) and host bridges (`import`)
//! a [`crate::resolve::Resolver`] can see. Built once per [`Registry::new`]
//! call via explicit `register_*` calls rather than a process-wide static —
//! a `Compiler` owns its own `Registry` the way the teacher's own
//! `semantic::load_std_lib` built a fresh `Module` per compile invocation
//! rather than reaching for a `lazy_static`.

use std::collections::{HashMap, HashSet};

/// A runtime code blob embedded verbatim into generated output whenever the
/// owning std module is used — e.g. a small hand-written Go helper function
/// the dispatch entry's host function calls into.
#[derive(Debug, Clone, Copy)]
pub struct DispatchEntry {
    pub host_function: &'static str,
    pub runtime_code: &'static str,
}

#[derive(Debug, Clone, Default)]
pub struct StdModule {
    pub funcs: HashSet<String>,
    pub dispatch: HashMap<String, DispatchEntry>,
}

/// Declared parameter shape for a bridge function, used by codegen (L10) to
/// pick the right per-argument host-type conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoParamType {
    String,
    Int,
    Float,
    Bool,
    Any,
}

/// How a bridge call's host-side return value gets wrapped back into a
/// Rugo value (spec.md §4.10's bridge-call return-wrapping variants).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnShape {
    Single,
    ValueError,
    ValueBool,
    Struct(Vec<String>),
    FixedArray(usize),
    Multi(usize),
}

#[derive(Debug, Clone)]
pub struct BridgeFunction {
    pub params: Vec<GoParamType>,
    pub variadic: bool,
    pub returns: ReturnShape,
    /// Decision record for Open Question 4: a bridge entry names its own
    /// codegen helper instead of codegen matching on package name, so
    /// adding a bridge never requires touching `src/codegen/`.
    pub needs_helper: Option<&'static str>,
}

#[derive(Debug, Clone, Default)]
pub struct BridgeModule {
    pub functions: HashMap<String, BridgeFunction>,
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    std_modules: HashMap<String, StdModule>,
    bridges: HashMap<String, BridgeModule>,
}

impl Registry {
    /// Builds the registry a fresh `Compiler` starts with: the curated set
    /// of `use`-able stdlib modules and `import`-able host bridges.
    pub fn new() -> Self {
        let mut registry = Registry::default();
        registry.register_std("strings", &["upcase", "downcase", "split", "join", "trim"]);
        registry.register_std("os", &["getenv", "args", "exit"]);
        registry.register_std("json", &["parse", "stringify"]);
        registry.register_std("time", &["now", "sleep"]);
        registry.register_std("math", &["sqrt", "abs", "max", "min"]);

        registry.register_bridge(
            "os/exec",
            vec![(
                "run",
                BridgeFunction {
                    params: vec![GoParamType::String, GoParamType::Any],
                    variadic: true,
                    returns: ReturnShape::ValueError,
                    needs_helper: None,
                },
            )],
        );
        registry
    }

    fn register_std(&mut self, name: &str, funcs: &[&str]) {
        let dispatch = funcs
            .iter()
            .map(|f| {
                (
                    f.to_string(),
                    DispatchEntry { host_function: "", runtime_code: "" },
                )
            })
            .collect();
        self.std_modules.insert(
            name.to_string(),
            StdModule { funcs: funcs.iter().map(|f| f.to_string()).collect(), dispatch },
        );
    }

    fn register_bridge(&mut self, package: &str, functions: Vec<(&str, BridgeFunction)>) {
        self.bridges.insert(
            package.to_string(),
            BridgeModule { functions: functions.into_iter().map(|(k, v)| (k.to_string(), v)).collect() },
        );
    }

    pub fn std_module(&self, name: &str) -> Option<&StdModule> {
        self.std_modules.get(name)
    }

    pub fn bridge(&self, package: &str) -> Option<&BridgeModule> {
        self.bridges.get(package)
    }

    pub fn has_std_module(&self, name: &str) -> bool {
        self.std_modules.contains_key(name)
    }

    pub fn has_bridge(&self, package: &str) -> bool {
        self.bridges.contains_key(package)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn strings_module_exposes_upcase() {
        let registry = Registry::new();
        let module = registry.std_module("strings").unwrap();
        assert!(module.funcs.contains("upcase"));
    }

    #[test]
    fn unknown_module_is_absent() {
        let registry = Registry::new();
        assert!(registry.std_module("not_a_real_module").is_none());
    }
}
