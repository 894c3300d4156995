use tracing::debug;

pub fn run(config_path: &str, template: Option<&str>) -> anyhow::Result<()> {
    let stack = super::declare(config_path, template)?;
    let nodes = stack.nodes();
    debug!(resources = nodes.len(), "previewing declared graph");

    println!("{} resources:", nodes.len());
    for node in &nodes {
        if node.deps.is_empty() {
            println!("  {} ({})", node.name, node.kind);
        } else {
            println!(
                "  {} ({}) ← {}",
                node.name,
                node.kind,
                node.deps.join(", ")
            );
        }
    }
    Ok(())
}
