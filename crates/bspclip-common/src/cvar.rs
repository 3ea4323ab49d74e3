// cvar.rs — console variables used to configure collision behaviour

use bitflags::bitflags;
use parking_lot::Mutex;
use std::collections::HashMap;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CvarFlags: u32 {
        /// Saved to the config file.
        const ARCHIVE = 1;
    }
}

/// A console variable.
#[derive(Debug, Clone)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub flags: CvarFlags,
    pub value: f32,
}

/// Registry of console variables.
#[derive(Debug, Default)]
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
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

    /// Get the floating-point value of a cvar. Returns 0 if not found.
    pub fn variable_value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |var| var.value)
    }

    /// Get or create a cvar. An existing cvar keeps its value; flags are OR'd in.
    pub fn get(&mut self, name: &str, value: &str, flags: CvarFlags) -> usize {
        if let Some(&idx) = self.cvar_index.get(name) {
            self.cvar_vars[idx].flags |= flags;
            return idx;
        }

        let idx = self.cvar_vars.len();
        self.cvar_vars.push(Cvar {
            name: name.to_string(),
            string: value.to_string(),
            flags,
            value: parse_value(value),
        });
        self.cvar_index.insert(name.to_string(), idx);
        idx
    }

    /// Set a cvar value, creating it if needed. Takes effect on the next
    /// `refresh_config` or level load.
    pub fn set(&mut self, name: &str, value: &str) -> usize {
        let idx = match self.cvar_index.get(name) {
            Some(&idx) => idx,
            None => return self.get(name, value, CvarFlags::empty()),
        };
        let var = &mut self.cvar_vars[idx];
        if value != var.string {
            var.string = value.to_string();
            var.value = parse_value(value);
        }
        idx
    }
}

// ============================================================
// Global registry and free-function wrappers
// ============================================================

static CVAR_CTX: Mutex<Option<CvarContext>> = parking_lot::const_mutex(None);

pub fn cvar_init() {
    let mut g = CVAR_CTX.lock();
    if g.is_none() {
        *g = Some(CvarContext::new());
    }
}

pub fn cvar_get(name: &str, value: &str, flags: CvarFlags) -> Option<usize> {
    CVAR_CTX.lock().as_mut().map(|c| c.get(name, value, flags))
}

pub fn cvar_set(name: &str, value: &str) {
    if let Some(c) = CVAR_CTX.lock().as_mut() {
        c.set(name, value);
    }
}

pub fn cvar_variable_value(name: &str) -> f32 {
    CVAR_CTX.lock().as_ref().map_or(0.0, |c| c.variable_value(name))
}

/// Access the global registry with a closure. Returns None if not initialized.
pub fn with_cvar_ctx<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut CvarContext) -> R,
{
    CVAR_CTX.lock().as_mut().map(f)
}
