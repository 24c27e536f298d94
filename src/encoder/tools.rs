//! Renders a tool catalog as interface declarations for the system turn.

use crate::catalog::{ToolCatalog, ToolDeclaration};

/// Render every declaration in catalog order, separated by a blank line
///
/// The output is a pure function of the catalog, so the same catalog always
/// renders byte-identical text. Parameters appear sorted by name.
pub fn render_tool_catalog(catalog: &ToolCatalog) -> String {
    catalog
        .iter()
        .map(render_declaration)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_declaration(tool: &ToolDeclaration) -> String {
    let mut out = String::new();
    if !tool.description.is_empty() {
        push_comment(&mut out, &tool.description);
    }

    if tool.parameters.is_empty() {
        out.push_str(&format!("type {} = () => any;", tool.name));
        return out;
    }

    out.push_str(&format!("type {} = (_: {{\n", tool.name));
    for (name, param) in &tool.parameters {
        out.push_str(&format!("  {}: {},", name, param.kind.token()));
        if !param.description.is_empty() {
            // Keep multi-line descriptions inside the comment
            out.push_str(&format!(" // {}", param.description.replace('\n', " ")));
        }
        out.push('\n');
    }
    out.push_str("}) => any;");
    out
}

fn push_comment(out: &mut String, text: &str) {
    for line in text.lines() {
        out.push_str("// ");
        out.push_str(line);
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ParamType;

    fn sample_catalog() -> ToolCatalog {
        ToolCatalog::new(vec![
            ToolDeclaration::new("get_time", "Current time in a timezone")
                .with_parameter("tz", ParamType::String, "IANA timezone name")
                .with_parameter("verbose", ParamType::Boolean, ""),
            ToolDeclaration::new("list_files", "")
                .with_parameter("paths", ParamType::Array, "Directories to list")
                .with_parameter("options", ParamType::Object, "")
                .with_parameter("depth", ParamType::Number, "")
                .with_parameter("extra", ParamType::Any, ""),
            ToolDeclaration::new("ping", "Health check"),
        ])
        .unwrap()
    }

    #[test]
    fn test_render_catalog() {
        let expected = "\
// Current time in a timezone
type get_time = (_: {
  tz: string, // IANA timezone name
  verbose: boolean,
}) => any;

type list_files = (_: {
  depth: number,
  extra: any,
  options: object,
  paths: any[], // Directories to list
}) => any;

// Health check
type ping = () => any;";

        assert_eq!(render_tool_catalog(&sample_catalog()), expected);
    }

    #[test]
    fn test_render_is_deterministic() {
        let catalog = sample_catalog();
        assert_eq!(render_tool_catalog(&catalog), render_tool_catalog(&catalog));
        assert_eq!(
            render_tool_catalog(&catalog),
            render_tool_catalog(&catalog.clone())
        );
    }

    #[test]
    fn test_render_empty_catalog() {
        assert_eq!(render_tool_catalog(&ToolCatalog::default()), "");
    }

    #[test]
    fn test_multiline_tool_description() {
        let catalog =
            ToolCatalog::new(vec![ToolDeclaration::new("noop", "Does nothing.\nReally.")]).unwrap();
        assert_eq!(
            render_tool_catalog(&catalog),
            "// Does nothing.\n// Really.\ntype noop = () => any;"
        );
    }
}
