pub mod books;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use shelf_authz::TokenVerifier;
use shelf_kernel::{settings::Settings, ModuleRegistry};
use shelf_platform::PlatformClient;

use books::{BooksState, PlatformBookStore};

/// Register all project-specific modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, settings: &Settings) -> anyhow::Result<()> {
    let platform = &settings.platform;

    let client = PlatformClient::new(
        &platform.url,
        &platform.anon_key,
        Duration::from_millis(settings.server.request_timeout_ms),
    )
    .context("failed to create platform client")?;

    let state = BooksState {
        store: Arc::new(PlatformBookStore::new(client, platform.table.clone())),
        verifier: Arc::new(TokenVerifier::new(&platform.jwt_secret, &platform.audience)),
    };

    registry.register(books::create_module(state))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(url: &str) -> Settings {
        let mut settings = Settings::default();
        settings.platform.url = url.to_string();
        settings.platform.anon_key = "anon".to_string();
        settings.platform.jwt_secret = "secret".to_string();
        settings
    }

    #[test]
    fn registers_books_module() {
        let mut registry = ModuleRegistry::new();
        register_all(&mut registry, &settings("https://project.example.co")).unwrap();

        assert!(registry.get_module("books").is_some());
    }

    #[test]
    fn invalid_platform_url_fails_startup() {
        let mut registry = ModuleRegistry::new();
        assert!(register_all(&mut registry, &settings("not a url")).is_err());
    }
}
