//! Turning the catalog into entities for a particular connection.

use crate::catalog;
use crate::connection::EcomaxConnection;
use crate::descriptor::{EntityDescription, Platform};
use crate::entity::Entity;
use crate::filter;
use std::sync::Arc;
use strum::VariantArray as _;
use tracing::{debug, info};

/// One entity per descriptor that applies to the controller itself.
pub fn top_level_entities(
    connection: &Arc<EcomaxConnection>,
    descriptions: &'static [EntityDescription],
) -> Vec<Entity> {
    filter::top_level(connection.product_type(), connection.modules(), descriptions)
        .map(|description| Entity::new(Arc::clone(connection), description))
        .collect()
}

/// One entity per mixer in `indexes` and descriptor that applies to that mixer.
///
/// Each mixer is filtered on its own, as descriptors may be limited to specific mixer numbers.
pub fn mixer_entities(
    connection: &Arc<EcomaxConnection>,
    descriptions: &'static [EntityDescription],
    indexes: &[u8],
) -> Vec<Entity> {
    let product_type = connection.product_type();
    let modules = connection.modules();
    let mut entities = Vec::new();
    for &index in indexes {
        entities.extend(
            filter::for_mixer(index, product_type, modules, descriptions)
                .map(|description| Entity::for_mixer(Arc::clone(connection), description, index)),
        );
    }
    entities
}

/// Create every entity of `platform`.
///
/// Mixer entities are only created when the controller has mixers and reports them in time.
pub async fn setup_platform(connection: &Arc<EcomaxConnection>, platform: Platform) -> Vec<Entity> {
    let mut entities = top_level_entities(connection, catalog::descriptions(platform));
    let mixer_descriptions = catalog::mixer_descriptions(platform);
    if !mixer_descriptions.is_empty() && connection.has_mixers() && connection.setup_mixers().await
    {
        let indexes = connection.device().mixers().into_iter().map(|(i, _)| i).collect::<Vec<_>>();
        connection.cover_mixers(indexes.iter().copied());
        entities.extend(mixer_entities(connection, mixer_descriptions, &indexes));
    }
    debug!(%platform, count = entities.len(), "set up platform");
    entities
}

/// Create the mixer entities of every platform for the mixers at `indexes`.
pub fn sub_device_entities(connection: &Arc<EcomaxConnection>, indexes: &[u8]) -> Vec<Entity> {
    let mut entities = Vec::new();
    for &platform in Platform::VARIANTS {
        entities.extend(mixer_entities(connection, catalog::mixer_descriptions(platform), indexes));
    }
    debug!(mixers = ?indexes, count = entities.len(), "set up sub-device entities");
    entities
}

/// Create the entities of every platform.
pub async fn setup_all(connection: &Arc<EcomaxConnection>) -> Vec<Entity> {
    let mut entities = Vec::new();
    for &platform in Platform::VARIANTS {
        entities.extend(setup_platform(connection, platform).await);
    }
    info!(name = connection.name(), count = entities.len(), "set up entities");
    entities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::tests::connection;
    use crate::product::ProductType;

    fn ids(entities: &[Entity]) -> Vec<String> {
        entities.iter().map(Entity::unique_id).collect()
    }

    #[tokio::test]
    async fn no_mixer_entities_without_mixers() {
        let (connection, _) = connection(ProductType::EcomaxP, serde_json::json!({}));
        let entities = setup_platform(&connection, Platform::Number).await;
        assert_eq!(entities.len(), 12);
        assert!(entities.iter().all(|e| e.mixer_index().is_none()));
    }

    #[tokio::test]
    async fn mixer_entities_per_mixer() {
        let (connection, _) = connection(ProductType::EcomaxP, serde_json::json!({}));
        connection.device().add_mixer(0);
        connection.device().add_mixer(1);
        // Capabilities are collected on creation.
        let connection = Arc::new(EcomaxConnection::new(
            connection.name().to_string(),
            Arc::clone(connection.device()),
            connection.product().clone(),
            connection.modules().clone(),
            std::time::Duration::from_millis(20),
        ));
        let entities = setup_platform(&connection, Platform::Sensor).await;
        let mixers = ids(&entities)
            .into_iter()
            .filter(|id| id.contains("-mixer-"))
            .collect::<Vec<_>>();
        assert_eq!(mixers, [
            "UID-mixer-0-current_temp",
            "UID-mixer-0-target_temp",
            "UID-mixer-1-current_temp",
            "UID-mixer-1-target_temp",
        ]);
    }

    #[tokio::test]
    async fn circuits_are_filtered_by_number() {
        let (connection, _) =
            connection(ProductType::EcomaxI, serde_json::json!({"mixers": 2}));
        connection.device().add_mixer(0);
        connection.device().add_mixer(1);
        let entities =
            mixer_entities(&connection, catalog::mixer_descriptions(Platform::Number), &[0, 1]);
        let first = entities.iter().filter(|e| e.mixer_index() == Some(0)).count();
        let second = entities.iter().filter(|e| e.mixer_index() == Some(1)).count();
        assert_eq!((first, second), (1, 5));
    }

    #[tokio::test]
    async fn no_mixers_reported_in_time() {
        let (connection, _) =
            connection(ProductType::EcomaxP, serde_json::json!({"mixer_count": 2}));
        assert!(connection.has_mixers());
        let entities = setup_platform(&connection, Platform::Switch).await;
        assert_eq!(entities.len(), 7);
        assert!(entities.iter().all(|e| e.mixer_index().is_none()));
    }

    #[tokio::test]
    async fn every_platform_is_set_up() {
        let (connection, _) = connection(ProductType::EcomaxP, serde_json::json!({}));
        let entities = setup_all(&connection).await;
        for &platform in Platform::VARIANTS {
            assert!(entities.iter().any(|e| e.platform() == platform), "{platform}");
        }
        assert_eq!(ids(&entities).iter().filter(|id| id.ends_with("-detect_sub_devices")).count(), 1);
    }

    #[tokio::test]
    async fn set_up_mixers_are_covered() {
        let (connection, _) = connection(ProductType::EcomaxP, serde_json::json!({"mixer_count": 2}));
        connection.device().add_mixer(0);
        setup_all(&connection).await;
        assert_eq!(connection.detect_sub_devices().await, Vec::<u8>::new());

        connection.device().add_mixer(1);
        let found = connection.detect_sub_devices().await;
        assert_eq!(found, [1]);
        let entities = sub_device_entities(&connection, &found);
        assert!(!entities.is_empty());
        assert!(entities.iter().all(|e| e.mixer_index() == Some(1)));
        assert!(ids(&entities).contains(&"UID-mixer-1-current_temp".to_string()));
    }
}
