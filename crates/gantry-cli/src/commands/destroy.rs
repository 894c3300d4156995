use tracing::info;

pub async fn run(config_path: &str, template: Option<&str>) -> anyhow::Result<()> {
    let stack = super::declare(config_path, template)?;
    let resources = stack.nodes().len();
    info!(resources, "destroying stack");

    stack.down().await?;
    info!("stack destroyed");

    println!("✓ Destroyed (project-level API activations retained)");
    println!("  {resources} resources processed");
    Ok(())
}
