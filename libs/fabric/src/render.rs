use glimpse_core::Node;

/// Renders dumps in-process instead of sending them to a viewer
///
/// Every hook has a line-printing fallback, so implementors only override
/// what they care about.
pub trait LocalRenderer: Send + Sync {
    fn render_data(&self, node: &Node, title: Option<&str>) {
        if let Some(title) = title {
            println!("{}", title);
        }
        println!("{}", serde_json::to_string_pretty(node).unwrap_or_default());
    }

    fn render_clear(&self) {}

    fn render_markup(&self, markup: &str, _title: Option<&str>) {
        println!("{}", markup);
    }
}

/// Prints dumps to stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleRenderer;

impl LocalRenderer for ConsoleRenderer {}
