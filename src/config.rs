//! Configuration for the resolver: framework marker names and loader limits.

use serde::{Deserialize, Serialize};

/// Configuration controlling how the resolver recognizes the framework's
/// component protocol and how it groups files into modules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolverConfig {
    /// Import specifier of the framework runtime (ensured present in every overlay).
    pub framework_module: String,

    /// Name of the marker return type a template function stub is given.
    pub component_marker: String,

    /// Name of the marker return type a CSS template function stub is given.
    pub css_class_marker: String,

    /// Name of the marker return type a script template function stub is given.
    pub component_script_marker: String,

    /// Name of the render method a component value must carry.
    pub render_method_name: String,

    /// Canonical name of the render method's first parameter type.
    pub render_context_type: String,

    /// Canonical name of the render method's second parameter type.
    pub writer_type: String,

    /// Canonical name of the render method's result type.
    pub render_result_type: String,

    /// File names recognized as a module manifest when walking up to find a module root.
    pub module_manifest_names: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            framework_module: String::from("@templ/runtime"),
            component_marker: String::from("Component"),
            css_class_marker: String::from("CSSClass"),
            component_script_marker: String::from("ComponentScript"),
            render_method_name: String::from("render"),
            render_context_type: String::from("RenderContext"),
            writer_type: String::from("Writer"),
            render_result_type: String::from("RenderResult"),
            module_manifest_names: vec![String::from("package.json"), String::from("tsconfig.json")],
        }
    }
}

impl ResolverConfig {
    /// Whether `name` is recognized as a module manifest file.
    pub fn is_manifest(&self, name: &str) -> bool {
        self.module_manifest_names.iter().any(|m| m == name)
    }
}
