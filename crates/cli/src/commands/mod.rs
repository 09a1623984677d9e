pub mod ask;
pub mod chat;
pub mod events;
pub mod init;
pub mod persona;

use std::sync::Arc;
use alterego_agent::ResponseLoop;
use alterego_config::{AppConfig, ConfigError};
use alterego_core::error::Error;
use alterego_core::event::EventBus;
use alterego_core::notify::Notifier;
use alterego_core::persona::{Persona, PersonaPaths};
use alterego_providers::OpenAiCompatProvider;
use alterego_tools::{default_registry, LogNotifier, NotificationSink};

/// Load and validate the config.
pub fn load_config() -> Result<AppConfig, Error> {
    AppConfig::load().map_err(config_error)
}

fn config_error(e: ConfigError) -> Error {
    Error::Config { message: e.to_string() }
}

/// Read the persona documents named in the config.
pub fn load_persona(config: &AppConfig) -> Result<Persona, Box<dyn std::error::Error>> {
    let paths = PersonaPaths {
        summary: config.persona.summary_path.clone(),
        profile: config.persona.profile_path.clone(),
    };
    Ok(Persona::load(config.persona.name.clone(), &paths)?)
}

/// Resolves on the next Ctrl-C; never resolves if the handler cannot be installed.
pub async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Assemble the response loop from config: provider, tools and persona.
pub fn build_loop(config: &AppConfig) -> Result<ResponseLoop, Box<dyn std::error::Error>> {
    let Some(api_key) = config.api_key.as_deref() else {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    ALTEREGO_API_KEY = 'sk-...'");
        eprintln!("    OPENAI_API_KEY   = 'sk-...'");
        eprintln!();
        eprintln!("  Or add `api_key` to {}", AppConfig::config_path().display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    };

    let persona = Arc::new(load_persona(config)?);
    let provider = Arc::new(OpenAiCompatProvider::new("openai", &config.api_url, api_key)?);

    let event_bus = Arc::new(EventBus::default());
    tokio::spawn(events::log_events(event_bus.subscribe()));
    let sink = if config.notifications.enabled {
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
        NotificationSink::new(notifier, event_bus.clone())
    } else {
        NotificationSink::disabled(event_bus.clone())
    };
    let tools = Arc::new(default_registry(sink));

    let mut agent = ResponseLoop::new(provider, &config.model, tools, persona, event_bus)
        .with_temperature(config.temperature)
        .with_max_tool_rounds(config.max_tool_rounds);
    if let Some(max) = config.max_tokens {
        agent = agent.with_max_tokens(max);
    }
    Ok(agent)
}
