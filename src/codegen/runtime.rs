//! Embedded host-language runtime fragments emitted verbatim (spec.md
//! §4.10 step 3) rather than modeled node-by-node — these are exactly the
//! kind of fragment [`crate::hostir::Decl::Raw`] exists for. Kept as `const`
//! text blocks, matching how the teacher embeds its own `prql.pest` grammar
//! source as a `const`/`include_str!` rather than building it from AST nodes.

/// Core coercion/arithmetic/iteration/length/print/panic-formatting helpers
/// every generated file needs regardless of which stdlib modules it uses.
pub const PRELUDE: &str = r#"func rugo_check_depth(name string) {
	rugoDepth++
	if rugoDepth > 100000 {
		panic(fmt.Sprintf("%s: stack level too deep", name))
	}
}

func rugo_decrement_depth(name string) {
	_ = name
	rugoDepth--
}

var rugoDepth int

func rugo_to_bool(v interface{}) bool {
	switch x := v.(type) {
	case bool:
		return x
	case nil:
		return false
	default:
		return true
	}
}

func rugo_to_string(v interface{}) string {
	switch x := v.(type) {
	case string:
		return x
	case nil:
		return ""
	default:
		return fmt.Sprintf("%v", x)
	}
}

func rugo_ensure_float(v interface{}) float64 {
	switch x := v.(type) {
	case int64:
		return float64(x)
	case float64:
		return x
	default:
		panic(fmt.Sprintf("not a number: %v", x))
	}
}

func rugo_add(a, b interface{}) interface{} {
	if as, ok := a.(string); ok {
		if bs, ok := b.(string); ok {
			return as + bs
		}
	}
	return rugo_ensure_float(a) + rugo_ensure_float(b)
}

func rugo_sub(a, b interface{}) interface{} { return rugo_ensure_float(a) - rugo_ensure_float(b) }
func rugo_mul(a, b interface{}) interface{} { return rugo_ensure_float(a) * rugo_ensure_float(b) }
func rugo_div(a, b interface{}) interface{} { return rugo_ensure_float(a) / rugo_ensure_float(b) }
func rugo_mod(a, b interface{}) interface{} {
	return float64(int64(rugo_ensure_float(a)) % int64(rugo_ensure_float(b)))
}

func rugo_eq(a, b interface{}) bool { return fmt.Sprintf("%v", a) == fmt.Sprintf("%v", b) }
func rugo_ne(a, b interface{}) bool { return !rugo_eq(a, b) }

func rugo_lt(a, b interface{}) bool { return rugo_ensure_float(a) < rugo_ensure_float(b) }
func rugo_gt(a, b interface{}) bool { return rugo_ensure_float(a) > rugo_ensure_float(b) }
func rugo_le(a, b interface{}) bool { return rugo_ensure_float(a) <= rugo_ensure_float(b) }
func rugo_ge(a, b interface{}) bool { return rugo_ensure_float(a) >= rugo_ensure_float(b) }

func rugo_len(v interface{}) int64 {
	switch x := v.(type) {
	case string:
		return int64(len(x))
	case []interface{}:
		return int64(len(x))
	case map[interface{}]interface{}:
		return int64(len(x))
	default:
		panic(fmt.Sprintf("no length for %v", x))
	}
}

func rugo_set_field(target interface{}, field string, value interface{}) {
	if m, ok := target.(map[string]interface{}); ok {
		m[field] = value
		return
	}
	panic(fmt.Sprintf("cannot set field %s on %v", field, target))
}

func rugo_print(args ...interface{}) {
	parts := make([]string, len(args))
	for i, a := range args {
		parts[i] = rugo_to_string(a)
	}
	fmt.Println(strings.Join(parts, " "))
}
"#;

/// Emitted after the prelude and every used module's own embedded runtime.
pub const POSTLUDE: &str = r#"func rugo_recover_message(r interface{}) string {
	if err, ok := r.(error); ok {
		return err.Error()
	}
	return fmt.Sprintf("%v", r)
}
"#;

/// Task value + goroutine plumbing for `spawn`/`parallel` (spec.md §5).
pub const SPAWN_RUNTIME: &str = r#"type rugoTask struct {
	done   chan struct{}
	result interface{}
	err    interface{}
}

func (t *rugoTask) wait(ticks int64) bool {
	select {
	case <-t.done:
		return true
	default:
	}
	for i := int64(0); i < ticks; i++ {
		select {
		case <-t.done:
			return true
		case <-time.After(time.Millisecond):
		}
	}
	select {
	case <-t.done:
		return true
	default:
		return false
	}
}

func (t *rugoTask) value() interface{} {
	<-t.done
	if t.err != nil {
		panic(t.err)
	}
	return t.result
}

func (t *rugoTask) isDone() bool {
	select {
	case <-t.done:
		return true
	default:
		return false
	}
}
"#;

/// Environment filtering + Landlock-equivalent policy construction for a
/// `sandbox` directive.
pub const SANDBOX_RUNTIME: &str = r#"func rugo_apply_sandbox(allowedEnv []string, clearAll bool, ro, rw, rox, rwx []string, connect, bind []int) {
	if clearAll || allowedEnv != nil {
		keep := map[string]string{}
		for _, name := range allowedEnv {
			if v, ok := os.LookupEnv(name); ok {
				keep[name] = v
			}
		}
		os.Clearenv()
		for k, v := range keep {
			os.Setenv(k, v)
		}
	}
	rugo_apply_platform_sandbox(ro, rw, rox, rwx, connect, bind)
}
"#;

/// `os/exec`-style bridge call helpers (panic-on-error unwrapping, struct
/// decomposition into a `map[string]interface{}`).
pub const BRIDGE_RUNTIME: &str = r#"func rugo_bridge_unwrap_error(name string, err error) {
	if err != nil {
		panic(fmt.Sprintf("%s: %s", name, err.Error()))
	}
}
"#;
