//! Language registry: maps file extensions to tree-sitter grammars and
//! capture queries.
//!
//! Each entry pairs a grammar with an S-expression query that captures
//! top-level definitions. Queries must bind the outer node as `@chunk` and
//! may bind an identifier as `@name`. Adding a language is purely data;
//! nothing downstream is language-specific.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tree_sitter::Language;

/// Grammar + capture query + extensions for one language.
#[derive(Clone)]
pub struct LanguageSpec {
    pub language: Language,
    pub query: &'static str,
    pub extensions: &'static [&'static str],
}

/// Immutable extension → language table, built once at startup.
pub struct Registry {
    by_ext: HashMap<&'static str, (LanguageSpec, &'static str)>,
}

impl Registry {
    /// Builds a registry with all built-in language bindings.
    pub fn builtin() -> Self {
        let mut by_ext = HashMap::new();
        for (name, spec) in builtin_specs() {
            for ext in spec.extensions {
                by_ext.insert(*ext, (spec.clone(), name));
            }
        }
        Registry { by_ext }
    }

    /// Returns the spec and language name for a file path, by extension.
    pub fn lookup(&self, path: &str) -> Option<(&LanguageSpec, &'static str)> {
        let ext = Path::new(path).extension()?.to_str()?;
        self.by_ext.get(ext).map(|(spec, name)| (spec, *name))
    }

    /// Returns the language name for a file path, or "" if unrecognized.
    pub fn language_name(&self, path: &str) -> &'static str {
        self.lookup(path).map(|(_, name)| name).unwrap_or("")
    }

    /// All registered extensions, without the leading dot.
    pub fn extensions(&self) -> HashSet<String> {
        self.by_ext.keys().map(|e| e.to_string()).collect()
    }
}

fn builtin_specs() -> Vec<(&'static str, LanguageSpec)> {
    vec![
        (
            "go",
            LanguageSpec {
                language: tree_sitter_go::LANGUAGE.into(),
                query: r#"
                    (function_declaration name: (identifier) @name) @chunk
                    (method_declaration name: (field_identifier) @name) @chunk
                    (type_declaration (type_spec name: (type_identifier) @name)) @chunk
                "#,
                extensions: &["go"],
            },
        ),
        (
            "python",
            LanguageSpec {
                language: tree_sitter_python::LANGUAGE.into(),
                query: r#"
                    (function_definition name: (identifier) @name) @chunk
                    (class_definition name: (identifier) @name) @chunk
                    (decorated_definition definition: (function_definition name: (identifier) @name)) @chunk
                    (decorated_definition definition: (class_definition name: (identifier) @name)) @chunk
                "#,
                extensions: &["py", "pyi"],
            },
        ),
        (
            "javascript",
            LanguageSpec {
                language: tree_sitter_javascript::LANGUAGE.into(),
                query: r#"
                    (function_declaration name: (identifier) @name) @chunk
                    (class_declaration name: (identifier) @name) @chunk
                    (method_definition name: (property_identifier) @name) @chunk
                    (export_statement (function_declaration name: (identifier) @name)) @chunk
                    (export_statement (class_declaration name: (identifier) @name)) @chunk
                    (lexical_declaration (variable_declarator name: (identifier) @name value: (arrow_function))) @chunk
                "#,
                extensions: &["js", "jsx", "mjs", "cjs"],
            },
        ),
        (
            "typescript",
            LanguageSpec {
                language: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
                query: r#"
                    (function_declaration name: (identifier) @name) @chunk
                    (class_declaration name: (type_identifier) @name) @chunk
                    (method_definition name: (property_identifier) @name) @chunk
                    (export_statement (function_declaration name: (identifier) @name)) @chunk
                    (export_statement (class_declaration name: (type_identifier) @name)) @chunk
                    (lexical_declaration (variable_declarator name: (identifier) @name value: (arrow_function))) @chunk
                    (interface_declaration name: (type_identifier) @name) @chunk
                    (type_alias_declaration name: (type_identifier) @name) @chunk
                "#,
                extensions: &["ts", "tsx"],
            },
        ),
    ]
}
