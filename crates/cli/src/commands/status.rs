//! `workloom status` — show the effective configuration.

use workloom_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("WorkLoom Status");
    println!("===============");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Provider:     {}", config.model.provider);
    println!("  Model:        {}", config.model.name);
    println!("  Temperature:  {}", config.model.temperature);
    println!("  Max steps:    {}", config.agent.max_steps);
    println!(
        "  Queue:        {} (concurrency {}, {} attempts)",
        config.queue.name, config.queue.concurrency, config.queue.max_attempts
    );
    println!("  Bus capacity: {}", config.bus.capacity);
    println!(
        "  Gateway:      {}:{}",
        config.gateway.host, config.gateway.port
    );
    println!(
        "  API key:      {}",
        if config.has_api_key() {
            "configured"
        } else {
            "missing"
        }
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file — run `workloom init` first");
    }

    Ok(())
}
