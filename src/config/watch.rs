//! # ConfigMap Watch
//!
//! Hot-reloads engine and server configuration from a ConfigMap.

use super::{SharedAdmConfig, SharedServerConfig};
use futures::{pin_mut, StreamExt};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{Api, Client};
use kube_runtime::watcher;
use tracing::{info, warn};

/// Start watching the configuration ConfigMap
///
/// Spawns a background task; every apply event re-applies the ConfigMap
/// data over the current configuration.
pub fn start_configmap_watch(
    client: Client,
    namespace: String,
    name: String,
    adm_config: SharedAdmConfig,
    server_config: SharedServerConfig,
) {
    tokio::spawn(async move {
        let config_maps: Api<ConfigMap> = Api::namespaced(client, &namespace);
        let watch_config = watcher::Config::default().fields(&format!("metadata.name={name}"));

        info!(configmap = %name, namespace = %namespace, "Starting configuration watch");

        let stream = watcher(config_maps, watch_config);
        pin_mut!(stream);

        while let Some(event_result) = stream.next().await {
            match event_result {
                Ok(watcher::Event::Apply(cm) | watcher::Event::InitApply(cm)) => {
                    let data = cm.data.unwrap_or_default();
                    {
                        let mut guard = adm_config.write().await;
                        let updated = guard.apply(&data);
                        if *guard != updated {
                            info!(configmap = %name, "Engine configuration reloaded");
                            *guard = updated;
                        }
                    }
                    let mut guard = server_config.write().await;
                    *guard = guard.apply(&data);
                }
                Ok(watcher::Event::Delete(_)) => {
                    warn!(
                        configmap = %name,
                        "Configuration ConfigMap deleted, keeping current values"
                    );
                }
                Ok(watcher::Event::Init | watcher::Event::InitDone) => {}
                Err(e) => {
                    warn!("Error watching configuration ConfigMap: {}", e);
                }
            }
        }

        warn!("Configuration watch stream ended");
    });
}
