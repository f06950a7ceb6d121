//! Handlebars template checks for prompt bodies.
//!
//! [`validate`] compiles the template with the `handlebars` crate and walks
//! the element tree for variables, helper calls and block helpers. [`check_against_schema`] and
//! [`check_helpers`] then judge those usages against the input schema and
//! the helper set a dotprompt runtime provides.

use std::fmt;

use handlebars::template::{BlockParam, HelperTemplate, Parameter, Subexpression, Template, TemplateElement};
use serde::Serialize;
use serde_json::Value as Json;
use thiserror::Error;

// ------------------------------- Policy ---------------------------------- //

const VALID_ROLES: &[&str] = &["system", "user", "assistant"];

/// Inline helpers a dotprompt runtime registers (plus Handlebars built-ins).
const KNOWN_HELPERS: &[&str] = &["role", "media", "history", "section", "json", "lookup", "log"];

/// Helpers that take no arguments, so `{{history}}` is a call and not a variable.
const NO_ARG_HELPERS: &[&str] = &["history"];

const KNOWN_BLOCK_HELPERS: &[&str] = &["each", "if", "unless", "with", "ifEquals", "unlessEquals"];

// -------------------------------- Types ---------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateErrorKind {
    Syntax,
    Variable,
    Helper,
}

impl fmt::Display for TemplateErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TemplateErrorKind::Syntax => "syntax",
            TemplateErrorKind::Variable => "variable",
            TemplateErrorKind::Helper => "helper",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{line}:{column}: {kind} error: {message}")]
pub struct TemplateError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub kind: TemplateErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HelperParam {
    Path(String),
    Literal(String),
    /// `(helper ...)`, named by its helper.
    SubExpression(String),
    Hash { key: String, value: Box<HelperParam> },
}

/// One variable reference, e.g. `user.name` in `{{user.name}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableUse {
    pub path: String,
    pub line: usize,
    pub column: usize,
    /// Inside a block that changes the context (`each`, `with`, sections)
    /// or rooted at a block parameter; not resolvable against the root schema.
    pub scoped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HelperCall {
    pub name: String,
    pub params: Vec<HelperParam>,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemplateReport {
    pub variables: Vec<VariableUse>,
    pub helper_calls: Vec<HelperCall>,
    pub block_helpers: Vec<HelperCall>,
    pub syntax_errors: Vec<TemplateError>,
}

impl VariableUse {
    pub fn root(&self) -> &str {
        self.path.split('.').next().unwrap_or_default()
    }

    /// `this`, `.`, parent (`../`) and data (`@index`) references.
    pub fn is_contextual(&self) -> bool {
        let p = self.path.as_str();
        p == "this" || p == "." || p.starts_with("this.") || p.starts_with("..") || p.starts_with('@')
    }
}

impl TemplateReport {
    pub fn is_valid(&self) -> bool {
        self.syntax_errors.is_empty()
    }

    /// Distinct variable paths in first-use order.
    pub fn variable_names(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for v in &self.variables {
            if !out.contains(&v.path.as_str()) {
                out.push(&v.path);
            }
        }
        out
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CHECKS
// ————————————————————————————————————————————————————————————————————————————

/// Syntax errors alone when there are any; otherwise schema and helper
/// findings. `field_names` is `None` when the prompt has no input schema.
pub fn check_template(text: &str, field_names: Option<&[&str]>) -> Vec<TemplateError> {
    let report = validate(text);
    if !report.is_valid() {
        return report.syntax_errors;
    }
    let mut errors = Vec::new();
    if let Some(names) = field_names {
        errors.extend(check_against_schema(&report.variables, names));
    }
    errors.extend(check_helpers(&report.helper_calls, &report.block_helpers));
    errors
}

/// Root-relative variables must start with a root field of the schema.
pub fn check_against_schema(variables: &[VariableUse], field_names: &[&str]) -> Vec<TemplateError> {
    variables.iter()
        .filter(|v| !v.scoped && !v.is_contextual())
        .filter(|v| !field_names.contains(&v.root()))
        .map(|v| TemplateError {
            message: format!("variable '{}' not found in input schema", v.path),
            line: v.line,
            column: v.column,
            kind: TemplateErrorKind::Variable,
        })
        .collect()
}

pub fn check_helpers(helpers: &[HelperCall], blocks: &[HelperCall]) -> Vec<TemplateError> {
    let mut errors = Vec::new();
    for helper in helpers {
        let message = match helper.name.as_str() {
            "role" => role_problem(helper),
            name if KNOWN_HELPERS.contains(&name) => None,
            name => Some(format!("unknown helper '{name}'")),
        };
        errors.extend(message.map(|m| helper_error(helper, m)));
    }
    for block in blocks {
        let message = match block.name.as_str() {
            "each" if block.params.is_empty() => Some("each helper requires a collection parameter".to_string()),
            "with" if block.params.is_empty() => Some("with helper requires a context parameter".to_string()),
            name @ ("if" | "unless") if block.params.is_empty() => {
                Some(format!("{name} helper requires a condition parameter"))
            }
            name @ ("ifEquals" | "unlessEquals") if block.params.len() != 2 => {
                Some(format!("{name} helper expects 2 parameters, got {}", block.params.len()))
            }
            name if KNOWN_BLOCK_HELPERS.contains(&name) => None,
            name => Some(format!("unknown block helper '{name}'")),
        };
        errors.extend(message.map(|m| helper_error(block, m)));
    }
    errors
}

fn role_problem(helper: &HelperCall) -> Option<String> {
    match helper.params.as_slice() {
        [HelperParam::Literal(role)] if VALID_ROLES.contains(&role.as_str()) => None,
        [HelperParam::Literal(role)] => Some(format!(
            "invalid role '{role}'. Valid roles: {}", VALID_ROLES.join(", ")
        )),
        [_] => Some("role helper expects a string literal".to_string()),
        params => Some(format!("role helper expects 1 parameter, got {}", params.len())),
    }
}

fn helper_error(call: &HelperCall, message: String) -> TemplateError {
    TemplateError { message, line: call.line, column: call.column, kind: TemplateErrorKind::Helper }
}

// ————————————————————————————————————————————————————————————————————————————
// WALKER
// ————————————————————————————————————————————————————————————————————————————

/// Compile `text` with the handlebars grammar and collect its usages. The
/// compiler stops at the first syntax error, so an invalid template reports
/// exactly one.
pub fn validate(text: &str) -> TemplateReport {
    let mut walker = Walker::default();
    match Template::compile(text) {
        Ok(template) => walker.template(&template, &Scope::default(), (1, 1)),
        Err(error) => walker.report.syntax_errors.push(syntax_error(&error)),
    }
    walker.report
}

fn syntax_error(error: &handlebars::TemplateError) -> TemplateError {
    let (line, column) = error.pos().unwrap_or((1, 1));
    TemplateError {
        message: error.reason().to_string(),
        line,
        column,
        kind: TemplateErrorKind::Syntax,
    }
}

type Position = (usize, usize);

#[derive(Debug, Clone, Default)]
struct Scope {
    changes_context: bool,
    locals: Vec<String>,
}

impl Scope {
    fn enter(&self, changes_context: bool, locals: Vec<String>) -> Scope {
        let mut inner = self.clone();
        inner.changes_context |= changes_context;
        inner.locals.extend(locals);
        inner
    }

    fn resolves(&self, root: &str) -> bool {
        self.changes_context || self.locals.iter().any(|l| l == root)
    }
}

#[derive(Default)]
struct Walker {
    report: TemplateReport,
}

impl Walker {
    /// `fallback` stands in for elements without a mapping entry, such as
    /// the nodes of an `{{else if}}` chain.
    fn template(&mut self, template: &Template, scope: &Scope, fallback: Position) {
        for (index, element) in template.elements.iter().enumerate() {
            let at = template.mapping.get(index).map_or(fallback, |m| (m.0, m.1));
            self.element(element, scope, at);
        }
    }

    fn element(&mut self, element: &TemplateElement, scope: &Scope, at: Position) {
        match element {
            TemplateElement::Expression(ht) | TemplateElement::HtmlExpression(ht) => {
                self.expression(ht, scope, at)
            }
            TemplateElement::HelperBlock(ht) => self.block(ht, scope, at),
            TemplateElement::PartialBlock(dt) | TemplateElement::DecoratorBlock(dt) => {
                if let Some(body) = &dt.template {
                    self.template(body, scope, at);
                }
            }
            _ => {}
        }
    }

    fn expression(&mut self, ht: &HelperTemplate, scope: &Scope, at: Position) {
        let bare = ht.params.is_empty() && ht.hash.is_empty();
        match &ht.name {
            Parameter::Path(_) if bare && !NO_ARG_HELPERS.contains(&name_of(&ht.name)) => {
                self.variable(path_of(&ht.name), scope, at)
            }
            Parameter::Subexpression(sub) if bare => self.subexpression(sub, scope, at),
            name => {
                let call = self.call(name_of(name).to_string(), ht, scope, at);
                self.report.helper_calls.push(call);
            }
        }
    }

    fn block(&mut self, ht: &HelperTemplate, scope: &Scope, at: Position) {
        let name = name_of(&ht.name).to_string();
        let section = ht.params.is_empty()
            && ht.hash.is_empty()
            && !KNOWN_BLOCK_HELPERS.contains(&name.as_str());
        let inner = if section {
            // `{{#items}}...{{/items}}` over a context value
            self.variable(path_of(&ht.name), scope, at);
            scope.enter(true, Vec::new())
        } else {
            let changes_context = matches!(name.as_str(), "each" | "with");
            let call = self.call(name, ht, scope, at);
            self.report.block_helpers.push(call);
            scope.enter(changes_context, block_param_names(ht.block_param.as_ref()))
        };
        if let Some(body) = &ht.template {
            self.template(body, &inner, at);
        }
        if let Some(inverse) = &ht.inverse {
            self.template(inverse, scope, at);
        }
    }

    /// Build a helper call and record the variables its parameters reference.
    fn call(&mut self, name: String, ht: &HelperTemplate, scope: &Scope, at: Position) -> HelperCall {
        let mut params: Vec<HelperParam> = ht.params.iter()
            .map(|p| self.param(p, scope, at))
            .collect();
        let mut keys: Vec<&String> = ht.hash.keys().collect();
        keys.sort();
        for key in keys {
            let value = self.param(&ht.hash[key], scope, at);
            params.push(HelperParam::Hash { key: key.clone(), value: Box::new(value) });
        }
        HelperCall { name, params, line: at.0, column: at.1 }
    }

    fn param(&mut self, param: &Parameter, scope: &Scope, at: Position) -> HelperParam {
        match param {
            Parameter::Path(_) => {
                let path = path_of(param);
                self.variable(path.clone(), scope, at);
                HelperParam::Path(path)
            }
            Parameter::Literal(Json::String(s)) => HelperParam::Literal(s.clone()),
            Parameter::Literal(other) => HelperParam::Literal(other.to_string()),
            Parameter::Subexpression(sub) => {
                let name = match sub.as_element() {
                    TemplateElement::Expression(ht) => name_of(&ht.name).to_string(),
                    _ => String::new(),
                };
                self.subexpression(sub, scope, at);
                HelperParam::SubExpression(name)
            }
            other => HelperParam::Literal(name_of(other).to_string()),
        }
    }

    fn subexpression(&mut self, sub: &Subexpression, scope: &Scope, at: Position) {
        if let TemplateElement::Expression(ht) = sub.as_element() {
            if ht.params.is_empty() && ht.hash.is_empty() && matches!(ht.name, Parameter::Path(_)) {
                self.variable(path_of(&ht.name), scope, at);
            } else {
                let call = self.call(name_of(&ht.name).to_string(), ht, scope, at);
                self.report.helper_calls.push(call);
            }
        }
    }

    fn variable(&mut self, path: String, scope: &Scope, at: Position) {
        let root = path.split('.').next().unwrap_or_default();
        let scoped = scope.resolves(root);
        self.report.variables.push(VariableUse { path, line: at.0, column: at.1, scoped });
    }
}

fn name_of(param: &Parameter) -> &str {
    param.as_name().unwrap_or_default()
}

fn path_of(param: &Parameter) -> String {
    normalize_path(name_of(param))
}

fn block_param_names(param: Option<&BlockParam>) -> Vec<String> {
    match param {
        Some(BlockParam::Single(p)) => vec![name_of(p).to_string()],
        Some(BlockParam::Pair((a, b))) => vec![name_of(a).to_string(), name_of(b).to_string()],
        _ => Vec::new(),
    }
}

/// `user/name` → `user.name`, `./name` → `this.name`; leading `../`
/// segments are kept.
fn normalize_path(path: &str) -> String {
    let mut rest = path;
    let mut prefix = String::new();
    while let Some(stripped) = rest.strip_prefix("../") {
        prefix.push_str("../");
        rest = stripped;
    }
    if let Some(stripped) = rest.strip_prefix("./") {
        prefix.push_str("this.");
        rest = stripped;
    }
    prefix + &rest.replace('/', ".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn helper_names(calls: &[HelperCall]) -> Vec<&str> {
        calls.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn plain_variables() {
        let report = validate("Hello {{name}}, you are {{age}} years old!");
        assert!(report.is_valid());
        assert_eq!(report.variable_names(), vec!["name", "age"]);
        assert!(report.helper_calls.is_empty());
    }

    #[test]
    fn role_helper_is_a_call_not_a_variable() {
        let report = validate("{{role \"system\"}}You are helpful.{{role \"user\"}}{{question}}");
        assert!(report.is_valid());
        assert_eq!(report.variable_names(), vec!["question"]);
        assert_eq!(helper_names(&report.helper_calls), vec!["role", "role"]);
        assert_eq!(report.helper_calls[0].params, vec![HelperParam::Literal("system".into())]);
    }

    #[test]
    fn unterminated_tag_is_a_syntax_error() {
        let report = validate("Hello {{name!");
        assert_eq!(report.syntax_errors.len(), 1);
        assert_eq!(report.syntax_errors[0].kind, TemplateErrorKind::Syntax);
        assert_eq!(report.syntax_errors[0].line, 1);
        assert!(report.syntax_errors[0].message.starts_with("invalid handlebars syntax"));
    }

    #[test]
    fn malformed_and_empty_expressions() {
        for text in ["{{name!}}", "a {{ }} b", "{{foo (bar}}"] {
            let report = validate(text);
            assert_eq!(report.syntax_errors.len(), 1, "{text}");
            assert!(report.variables.is_empty(), "{text}");
        }
    }

    #[test]
    fn nested_paths_normalize_slashes() {
        let report = validate("User: {{user.name}} ({{user/email}})");
        assert_eq!(report.variable_names(), vec!["user.name", "user.email"]);
    }

    #[test]
    fn each_block_scopes_its_body() {
        let report = validate("{{#each items}}{{name}} - {{value}}{{/each}}");
        assert!(report.is_valid());
        assert_eq!(report.variable_names(), vec!["items", "name", "value"]);
        let scoped: Vec<_> = report.variables.iter().map(|v| v.scoped).collect();
        assert_eq!(scoped, vec![false, true, true]);
        assert_eq!(helper_names(&report.block_helpers), vec!["each"]);
    }

    #[test]
    fn block_structure_errors() {
        let report = validate(indoc! {"
            {{#if ready}}
              {{/each}}
            {{/if}}
        "});
        assert_eq!(report.syntax_errors.len(), 1);
        assert_eq!(report.syntax_errors[0].line, 2);
        assert_eq!(report.syntax_errors[0].message, r#"helper "if" was opened, but "each" is closing"#);

        for text in ["{{/if}}", "{{else}}", "{{#with user}}\n{{name}}"] {
            let report = validate(text);
            assert_eq!(report.syntax_errors.len(), 1, "{text}");
            assert!(report.block_helpers.is_empty(), "{text}");
        }
    }

    #[test]
    fn unclosed_block_reports_where_parsing_stopped() {
        let report = validate("{{#if a}}x");
        let error = &report.syntax_errors[0];
        assert_eq!((error.line, error.column), (1, 11));
        assert_eq!(error.kind, TemplateErrorKind::Syntax);
    }

    #[test]
    fn comments_whitespace_control_and_triple_stash() {
        let report = validate(indoc! {"
            {{!-- {{ignored}} --}}
            {{! also ignored }}
            {{~ name ~}}
            {{{ raw_html }}}
            \\{{literal}}
            {{> footer}}
        "});
        assert!(report.is_valid(), "{:?}", report.syntax_errors);
        assert_eq!(report.variable_names(), vec!["name", "raw_html"]);
    }

    #[test]
    fn else_chains_and_block_params() {
        let report = validate(indoc! {"
            {{#if a}}x{{else if b}}y{{else}}z{{/if}}
            {{#each rows as |row idx|}}{{row.id}} {{idx}}{{/each}}
        "});
        assert!(report.is_valid(), "{:?}", report.syntax_errors);
        assert_eq!(helper_names(&report.block_helpers), vec!["if", "if", "each"]);
        let row = report.variables.iter().find(|v| v.path == "row.id").unwrap();
        assert!(row.scoped);
    }

    #[test]
    fn schema_check_uses_root_segment_and_skips_context() {
        let text = "Hello {{name}}, {{user.email}} {{undefined_var}} {{this}} {{@root.x}} {{../up}}";
        let errors = check_against_schema(&validate(text).variables, &["name", "user"]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "variable 'undefined_var' not found in input schema");
        assert_eq!(errors[0].kind, TemplateErrorKind::Variable);
    }

    #[test]
    fn helper_rules() {
        let report = validate(indoc! {r#"
            {{role "system"}}{{role "narrator"}}{{role}}
            {{media url=image}}{{history}}{{shout name}}
            {{#each}}{{/each}}{{#if}}{{/if}}{{#loop xs}}{{/loop}}
        "#});
        assert!(report.is_valid(), "{:?}", report.syntax_errors);
        let errors = check_helpers(&report.helper_calls, &report.block_helpers);
        let messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec![
            "invalid role 'narrator'. Valid roles: system, user, assistant",
            "unknown helper 'shout'",
            "each helper requires a collection parameter",
            "if helper requires a condition parameter",
            "unknown block helper 'loop'",
        ]);
    }

    #[test]
    fn sections_subexpressions_and_hash_values() {
        let report = validate(indoc! {r#"
            {{#items}}{{label}}{{/items}}
            {{json (lookup user "name") indent=2 key=field}}
        "#});
        assert!(report.is_valid(), "{:?}", report.syntax_errors);
        assert_eq!(report.variable_names(), vec!["items", "label", "user", "field"]);
        assert!(report.variables[1].scoped);
        assert_eq!(helper_names(&report.helper_calls), vec!["lookup", "json"]);
        assert_eq!(report.helper_calls[1].params, vec![
            HelperParam::SubExpression("lookup".into()),
            HelperParam::Hash { key: "indent".into(), value: Box::new(HelperParam::Literal("2".into())) },
            HelperParam::Hash { key: "key".into(), value: Box::new(HelperParam::Path("field".into())) },
        ]);
    }

    #[test]
    fn bare_role_is_a_variable_not_a_call() {
        // `{{role}}` has no parameters, so it reads as a plain variable
        let report = validate("{{role}}");
        assert_eq!(report.variable_names(), vec!["role"]);
    }

    #[test]
    fn check_template_short_circuits_on_syntax() {
        let errors = check_template("{{#if x}}", Some(&["y"]));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, TemplateErrorKind::Syntax);

        let errors = check_template("{{x}} {{y}}", Some(&["y"]));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, TemplateErrorKind::Variable);
        assert!(check_template("{{x}}", None).is_empty());
    }

    #[test]
    fn positions_count_lines_and_characters() {
        let report = validate("first line\n  hello {{ name }}");
        assert_eq!((report.variables[0].line, report.variables[0].column), (2, 9));
    }
}
