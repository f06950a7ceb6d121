//! Identifier synthesis for generated types, fields and enum constants.

use std::collections::{BTreeMap, BTreeSet};

/// `user_profile` → `UserProfile`. Splits on `_` only; empty segments vanish
/// and single-character segments are uppercased.
pub fn pascal_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for part in s.split('_') {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// `userName` / `user-name` / `User Name` → `user_name`. Runs of separators
/// collapse; leading and trailing ones vanish.
pub fn snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev: Option<char> = None;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            let boundary = c.is_ascii_uppercase()
                && prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit());
            if boundary && !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
        prev = Some(c);
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Identifier of a record field from its (already de-suffixed) external name.
/// Characters outside `[A-Za-z0-9_]` separate words.
pub fn field_identifier(external_name: &str) -> String {
    let words: String = external_name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    pascal_case(&words)
}

/// `LanguageEnum` + `zh-cn` → `LanguageEnumZhCn`.
pub fn enum_constant_name(enum_name: &str, literal: &str) -> String {
    let mut out = enum_name.to_string();
    out.push_str(&pascal_case(&literal.replace('-', "_")));
    out
}

/// `ClassifyHabits` style base name for a prompt file stem. Dashes and dots
/// separate words like underscores do.
pub fn prompt_type_names(stem: &str) -> (String, String) {
    let base = pascal_case(&stem.replace(['-', '.'], "_"));
    (format!("{base}Input"), format!("{base}Output"))
}

// ————————————————————————————————————————————————————————————————————————————
// REGISTRY
// ————————————————————————————————————————————————————————————————————————————

/// Allocates globally unique type names for one parse call.
///
/// Each synthesized type asks for a name with the path it was found at. The
/// same path always gets the same name back; a different path whose base name
/// is already taken gets the first free numeric suffix (`Name2`, `Name3`, ...).
#[derive(Debug, Default, Clone)]
pub struct NameRegistry {
    by_path: BTreeMap<String, String>,
    taken: BTreeSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a name as used without a path, e.g. the root type chosen by the caller.
    pub fn reserve(&mut self, name: &str) {
        self.taken.insert(name.to_string());
    }

    pub fn allocate(&mut self, path: &str, base: &str) -> String {
        if let Some(name) = self.by_path.get(path) {
            return name.clone();
        }
        let name = self.free_name(base);
        if name != base {
            tracing::warn!(path, base, renamed = %name, "type name collision; applying numeric suffix");
        }
        self.taken.insert(name.clone());
        self.by_path.insert(path.to_string(), name.clone());
        name
    }

    pub fn contains(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    fn free_name(&self, base: &str) -> String {
        if !self.taken.contains(base) {
            return base.to_string();
        }
        (2u32..)
            .map(|n| format!("{base}{n}"))
            .find(|candidate| !self.taken.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }
}

/// Unique constant names inside one enum, in declaration order.
pub fn enum_constant_names<'a, I>(enum_name: &str, literals: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for literal in literals {
        let base = enum_constant_name(enum_name, literal);
        let mut name = base.clone();
        let mut n = 2u32;
        while !seen.insert(name.clone()) {
            name = format!("{base}{n}");
            n += 1;
        }
        out.push(name);
    }
    out
}
