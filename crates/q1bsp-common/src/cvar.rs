// cvar.rs — dynamic variable tracking
//
// Console variables are the loader's configuration layer. Front ends register the
// defaults once (`cvar_init`), let the user override them (`+set` on the command line),
// and snapshot what the loader needs into `LoadOptions` and `VisCache`.

use std::collections::HashMap;

use parking_lot::Mutex;

/// A console variable.
#[derive(Debug, Clone)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub value: f32,
}

/// The full cvar system context.
#[derive(Debug, Default)]
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    /// name -> index in cvar_vars
    cvar_index: HashMap<String, usize>,
}

fn parse_value(s: &str) -> f32 {
    s.trim().parse::<f32>().unwrap_or(0.0)
}

impl CvarContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.cvar_index.get(name).map(|&idx| &self.cvar_vars[idx])
    }

    /// Floating-point value of a cvar. Unknown names and non-numeric strings read as 0.
    pub fn variable_value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |var| var.value)
    }

    /// Registers `name` with a default. An existing variable keeps its value.
    pub fn get(&mut self, name: &str, value: &str) -> usize {
        if let Some(&idx) = self.cvar_index.get(name) {
            return idx;
        }

        let idx = self.cvar_vars.len();
        self.cvar_vars.push(Cvar { name: name.to_string(), string: value.to_string(), value: parse_value(value) });
        self.cvar_index.insert(name.to_string(), idx);
        idx
    }

    /// Sets a cvar, creating it if needed. Used for command line `+set`.
    pub fn set(&mut self, name: &str, value: &str) -> usize {
        let idx = self.get(name, value);
        let var = &mut self.cvar_vars[idx];
        if var.string != value {
            var.string = value.to_string();
            var.value = parse_value(value);
        }
        idx
    }

    /// Register the variables the map loader reads.
    pub fn register_defaults(&mut self) {
        self.get("developer", "0");
        self.get("bsp_parallel_threshold", "64");
        self.get("bsp_novis", "0");
    }
}

// ============================================================
// Global singleton and free-function wrappers
// ============================================================

static CVAR_CTX: Mutex<Option<CvarContext>> = Mutex::new(None);

pub fn cvar_init() {
    let mut ctx = CvarContext::new();
    ctx.register_defaults();
    *CVAR_CTX.lock() = Some(ctx);
}

pub fn cvar_shutdown() {
    *CVAR_CTX.lock() = None;
}

pub fn cvar_force_set(name: &str, value: &str) {
    if let Some(c) = CVAR_CTX.lock().as_mut() {
        c.set(name, value);
    }
}

pub fn cvar_variable_value(name: &str) -> f32 {
    CVAR_CTX.lock().as_ref().map_or(0.0, |c| c.variable_value(name))
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_registered() {
        let mut ctx = CvarContext::new();
        ctx.register_defaults();
        assert_eq!(ctx.variable_value("bsp_parallel_threshold"), 64.0);
        assert_eq!(ctx.variable_value("bsp_novis"), 0.0);
        assert_eq!(ctx.cvar_vars.len(), 3);
    }

    #[test]
    fn test_set_overrides_default() {
        let mut ctx = CvarContext::new();
        ctx.register_defaults();
        ctx.set("bsp_novis", "1");
        assert_eq!(ctx.variable_value("bsp_novis"), 1.0);
        assert_eq!(ctx.find_var("bsp_novis").unwrap().string, "1");
    }

    #[test]
    fn test_register_keeps_override() {
        let mut ctx = CvarContext::new();
        ctx.set("developer", "1");
        ctx.register_defaults();
        assert_eq!(ctx.variable_value("developer"), 1.0);
    }

    #[test]
    fn test_set_creates_unknown() {
        let mut ctx = CvarContext::new();
        let idx = ctx.set("bsp_extra", "2.5");
        assert_eq!(ctx.cvar_vars[idx].name, "bsp_extra");
        assert_eq!(ctx.variable_value("bsp_extra"), 2.5);
    }

    #[test]
    fn test_unknown_and_non_numeric_read_zero() {
        let mut ctx = CvarContext::new();
        assert_eq!(ctx.variable_value("nonexistent"), 0.0);
        ctx.set("bsp_parallel_threshold", "lots");
        assert_eq!(ctx.variable_value("bsp_parallel_threshold"), 0.0);
    }
}
