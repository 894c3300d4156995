use tracing::info;

pub async fn run(
    config_path: &str,
    template: Option<&str>,
    show_secrets: bool,
) -> anyhow::Result<()> {
    let stack = super::declare(config_path, template)?;
    let resources = stack.nodes().len();
    info!(resources, "applying stack");

    let outputs = stack.up().await?;
    info!(gateway_url = %outputs.gateway_url, "stack applied");

    println!("✓ Applied {resources} resources");
    println!("  gatewayUrl:  {}", outputs.gateway_url);
    println!("  cloudRunUrl: {}", outputs.cloud_run_url);
    println!("  imageName:   {}", outputs.image_name);
    if show_secrets {
        println!("  apiKey:      {}", outputs.api_key);
    } else {
        println!("  apiKey:      [redacted, pass --show-secrets to print]");
    }
    Ok(())
}
