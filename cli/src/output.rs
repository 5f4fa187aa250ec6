use clap::ValueEnum;
use coordination::TokenMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON object
    Json,
    /// CSS custom properties inside a selector block
    Css,
}

/// Render `tokens` in the requested format. `selector` is only used for CSS.
pub fn render(tokens: &TokenMap, format: OutputFormat, selector: &str) -> serde_json::Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(tokens),
        OutputFormat::Css => Ok(render_css(tokens, selector)),
    }
}

fn render_css(tokens: &TokenMap, selector: &str) -> String {
    let mut css = format!("{selector} {{\n");
    for (name, value) in tokens {
        css.push_str(&format!("  --{}: {};\n", css_ident(name), css_value(value)));
    }
    css.push('}');
    css
}

fn css_ident(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '_' | ' ' | '.' => '-',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Quote values that are not plain CSS literals, such as status glyphs.
fn css_value(value: &str) -> String {
    let plain = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '#' | '-' | '.' | '%' | '(' | ')' | ',' | ' '));
    if plain && !value.is_empty() {
        value.to_string()
    } else {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    }
}
