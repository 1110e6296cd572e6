//! # Secret Materializer
//!
//! Per-application secrets of a deployment:
//!
//! | Kind | Name | Created when |
//! |------|------|--------------|
//! | profile | `<d>-<app>-<chart version>-profile` | always |
//! | overrides | `<d>-<app>-<chart version>-overrides` | the app has override values |
//! | overrides-masked | `<overrides>-masked` | the app has secret parameters |
//! | helmrepo | `<d>-<app>-<chart version>-helmrepo` | CA certs or username and password |
//! | imagerepo | `<d>-<app>-<chart version>-imagerepo` | username and password |
//! | parameter secret | `<d>-<app>-<profile>-secret` | the app has secret parameters |
//!
//! Owner references are installed in a second pass, once the Deployment UID
//! is known.

use super::builder::DeploymentDraft;
use super::templates::flatten;
use crate::catalog::ResolvedApp;
use crate::config::AdmConfig;
use crate::constants::{
    API_GROUP_VERSION, BASIC_AUTH_SECRET_TYPE, DEPLOYMENT_KIND, FLEET_DEFAULT_NAMESPACE,
    GIT_CREDENTIAL_SECRET_NAME,
};
use crate::credentials::CredentialStore;
use crate::crd::Deployment;
use crate::error::{AdmError, AdmResult};
use crate::labels::{DEPLOYMENT_ID, FLEET_RS_SECRET, TENANT};
use crate::observability::metrics;
use crate::store::ObjectStore;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::api::rbac::v1::{RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::ByteString;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

const OPAQUE: &str = "Opaque";

/// Secret names of one application; empty when the kind is not created
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppSecretNames {
    pub profile: String,
    pub values: String,
    pub masked: String,
    pub repo: String,
    pub image: String,
    pub parameter: String,
}

impl AppSecretNames {
    /// Names the engine creates, in creation order
    pub fn owned(&self, config: &AdmConfig) -> Vec<&str> {
        [
            self.profile.as_str(),
            self.values.as_str(),
            self.masked.as_str(),
            self.repo.as_str(),
            self.image.as_str(),
            self.parameter.as_str(),
        ]
        .into_iter()
        .filter(|name| !name.is_empty() && *name != config.rs_proxy_repo_secret)
        .collect()
    }
}

fn has_overrides(draft: &DeploymentDraft, app: &str) -> bool {
    draft
        .override_values
        .iter()
        .any(|o| o.app_name == app && o.values.as_ref().is_some_and(|v| !v.is_empty()))
}

fn has_helm_credentials(app: &ResolvedApp) -> bool {
    let c = &app.helm_credential;
    !app.repo.is_empty()
        && (!c.cacerts.is_empty() || (!c.username.is_empty() && !c.password.is_empty()))
}

fn has_docker_credentials(app: &ResolvedApp) -> bool {
    let c = &app.docker_credential;
    !app.image_registry.is_empty() && !c.username.is_empty() && !c.password.is_empty()
}

/// Secret names of `app` within `draft`
pub fn app_secret_names(
    draft: &DeploymentDraft,
    app: &ResolvedApp,
    config: &AdmConfig,
) -> AppSecretNames {
    let base = format!("{}-{}-{}", draft.name, app.name, app.version.to_lowercase());
    let has_secrets = draft.parameter_template_secrets.contains_key(&app.name);
    let values = if has_overrides(draft, &app.name) {
        format!("{base}-overrides")
    } else {
        String::new()
    };
    AppSecretNames {
        profile: format!("{base}-profile"),
        masked: if values.is_empty() {
            String::new()
        } else {
            format!("{values}-masked")
        },
        values,
        repo: if config.is_rs_proxy_repo(&app.repo) {
            config.rs_proxy_repo_secret.clone()
        } else if has_helm_credentials(app) {
            format!("{base}-helmrepo")
        } else {
            String::new()
        },
        image: if has_docker_credentials(app) {
            format!("{base}-imagerepo")
        } else {
            String::new()
        },
        parameter: if has_secrets {
            parameter_secret_name(&draft.name, &app.name, &draft.profile_name)
        } else {
            String::new()
        },
    }
}

/// Secret holding the secret parameter values of one application
pub fn parameter_secret_name(deployment: &str, app: &str, profile: &str) -> String {
    format!("{deployment}-{app}-{profile}-secret")
}

fn secret(
    name: &str,
    namespace: &str,
    type_: &str,
    data: BTreeMap<&str, &str>,
) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(TENANT.to_string(), namespace.to_string())])),
            ..Default::default()
        },
        type_: Some(type_.to_string()),
        data: Some(
            data.into_iter()
                .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                .collect(),
        ),
        ..Default::default()
    }
}

/// `values` key of a secret as UTF-8
pub fn secret_value(secret: &Secret, key: &str) -> Option<String> {
    secret
        .data
        .as_ref()
        .and_then(|d| d.get(key))
        .map(|b| String::from_utf8_lossy(&b.0).into_owned())
}

fn to_yaml(values: &serde_json::Map<String, serde_json::Value>) -> AdmResult<String> {
    serde_yaml::to_string(values)
        .map_err(|e| AdmError::internal(format!("cannot render override values: {e}")))
}

async fn create(store: &dyn ObjectStore, ns: &str, secret: Secret) -> AdmResult<()> {
    let name = secret.metadata.name.clone().unwrap_or_default();
    store.create_secret(ns, &secret).await.map_err(|e| {
        warn!(secret = %name, error = %e, "cannot create secret");
        e
    })?;
    metrics::increment_secrets_created();
    debug!(secret = %name, namespace = ns, "Created secret");
    Ok(())
}

/// Create every secret of `draft`
pub async fn create_secrets(
    store: &dyn ObjectStore,
    config: &AdmConfig,
    draft: &DeploymentDraft,
) -> AdmResult<()> {
    let ns = draft.namespace.as_str();
    let mut rs_proxy_configured = false;

    for app in &draft.apps {
        let names = app_secret_names(draft, app, config);

        let profile = BTreeMap::from([("values", app.values.as_str())]);
        create(store, ns, secret(&names.profile, ns, OPAQUE, profile)).await?;

        if !names.values.is_empty() {
            let values = draft
                .override_values
                .iter()
                .find(|o| o.app_name == app.name)
                .and_then(|o| o.values.clone())
                .unwrap_or_default();
            let yaml = to_yaml(&values)?;
            let data = BTreeMap::from([("values", yaml.as_str())]);
            create(store, ns, secret(&names.values, ns, OPAQUE, data)).await?;

            let masked = draft
                .masked_override_values
                .iter()
                .find(|o| o.app_name == app.name)
                .and_then(|o| o.values.clone())
                .unwrap_or_default();
            let yaml = to_yaml(&masked)?;
            let data = BTreeMap::from([("values", yaml.as_str())]);
            create(store, ns, secret(&names.masked, ns, OPAQUE, data)).await?;
        }

        if !names.repo.is_empty() && names.repo != config.rs_proxy_repo_secret {
            let c = &app.helm_credential;
            let data = BTreeMap::from([
                ("cacerts", c.cacerts.as_str()),
                ("password", c.password.as_str()),
                ("username", c.username.as_str()),
            ]);
            create(store, ns, secret(&names.repo, ns, OPAQUE, data)).await?;
        }

        if !names.image.is_empty() {
            let c = &app.docker_credential;
            let data = BTreeMap::from([
                ("password", c.password.as_str()),
                ("username", c.username.as_str()),
            ]);
            create(store, ns, secret(&names.image, ns, OPAQUE, data)).await?;
        }

        if let Some(blob) = draft.parameter_template_secrets.get(&app.name) {
            let data = BTreeMap::from([("values", blob.as_str())]);
            create(store, ns, secret(&names.parameter, ns, OPAQUE, data)).await?;
        }

        if config.is_rs_proxy_repo(&app.repo) && !rs_proxy_configured {
            configure_rs_proxy(store, config, ns).await?;
            rs_proxy_configured = true;
        }
    }
    Ok(())
}

/// Owner reference pointing at a Deployment
pub fn owner_reference(name: &str, uid: &str) -> OwnerReference {
    OwnerReference {
        api_version: API_GROUP_VERSION.to_string(),
        kind: DEPLOYMENT_KIND.to_string(),
        name: name.to_string(),
        uid: uid.to_string(),
        controller: Some(true),
        block_owner_deletion: None,
    }
}

/// Install the Deployment as owner of every secret of `draft`
pub async fn set_owner_references(
    store: &dyn ObjectStore,
    config: &AdmConfig,
    draft: &DeploymentDraft,
) -> AdmResult<()> {
    let ns = draft.namespace.as_str();
    let owner = owner_reference(&draft.name, &draft.deploy_id);
    for app in &draft.apps {
        let names = app_secret_names(draft, app, config);
        for name in names.owned(config) {
            let result = async {
                let mut secret = store.get_secret(ns, name).await?;
                secret.metadata.owner_references = Some(vec![owner.clone()]);
                if let Some(labels) = secret.metadata.labels.as_mut() {
                    labels.insert(DEPLOYMENT_ID.to_string(), draft.deploy_id.clone());
                }
                store.update_secret(ns, &secret).await
            }
            .await;
            match result {
                Ok(_) => {}
                Err(e) if name == names.masked && e.is_not_found() => {
                    warn!(
                        secret = %name,
                        "masked overrides secret vanished before owner reference"
                    );
                }
                Err(e) => {
                    warn!(secret = %name, error = %e, "cannot set owner reference on secret");
                    return Err(e);
                }
            }
        }
    }
    Ok(())
}

/// Secrets referenced by a stored Deployment
pub fn record_secret_names(deployment: &Deployment, config: &AdmConfig) -> Vec<String> {
    let name = deployment.name();
    let profile = &deployment.spec.deployment_package_ref.profile_name;
    let mut names = Vec::new();
    for app in &deployment.spec.applications {
        names.push(app.profile_secret_name.clone());
        if !app.value_secret_name.is_empty() {
            names.push(app.value_secret_name.clone());
            names.push(format!("{}-masked", app.value_secret_name));
        }
        if let Some(helm) = &app.helm_app {
            if helm.repo_secret_name != config.rs_proxy_repo_secret {
                names.push(helm.repo_secret_name.clone());
            }
            names.push(helm.image_registry_secret_name.clone());
        }
        names.push(parameter_secret_name(name, &app.name, profile));
    }
    names.retain(|n| !n.is_empty());
    names
}

/// Delete the secrets of a stored Deployment; missing secrets are skipped
pub async fn delete_secrets(
    store: &dyn ObjectStore,
    config: &AdmConfig,
    deployment: &Deployment,
) -> AdmResult<()> {
    let ns = deployment.metadata.namespace.as_deref().unwrap_or_default();
    for name in record_secret_names(deployment, config) {
        match store.delete_secret(ns, &name).await {
            Ok(()) => metrics::increment_secrets_deleted(),
            Err(e) if e.is_not_found() => {
                debug!(secret = %name, "Secret not found, continuing");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Previous secret parameter values of one application, keyed by dotted name
pub async fn previous_secret_values(
    store: &dyn ObjectStore,
    ns: &str,
    name: &str,
) -> Option<serde_json::Map<String, serde_json::Value>> {
    let secret = store.get_secret(ns, name).await.ok()?;
    let raw = secret_value(&secret, "values")?;
    let value: serde_json::Value = serde_yaml::from_str(&raw).ok()?;
    match value {
        serde_json::Value::Object(map) => flatten(&map).ok().map(|flat| flat.into_iter().collect()),
        _ => None,
    }
}

/// Create the git credential secret of a tenant when it is missing
pub async fn create_git_credential_secret(
    store: &dyn ObjectStore,
    credentials: &dyn CredentialStore,
    config: &AdmConfig,
    ns: &str,
) -> AdmResult<()> {
    match store.get_secret(ns, GIT_CREDENTIAL_SECRET_NAME).await {
        Ok(_) => return Ok(()),
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
    }
    if !config.secret_service_enabled {
        info!(
            "Secret service disabled, cannot create {} secret",
            GIT_CREDENTIAL_SECRET_NAME
        );
        return Ok(());
    }
    let creds = credentials.git_credentials().await?;
    let data = BTreeMap::from([
        ("username", creds.username.as_str()),
        ("password", creds.password.as_str()),
    ]);
    create(
        store,
        ns,
        secret(GIT_CREDENTIAL_SECRET_NAME, ns, BASIC_AUTH_SECRET_TYPE, data),
    )
    .await
}

fn rs_role_binding(name: &str, ns: &str, role: &str, tenant: &str) -> RoleBinding {
    RoleBinding {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(ns.to_string()),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "Role".to_string(),
            name: role.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: "default".to_string(),
            namespace: Some(tenant.to_string()),
            api_group: None,
        }]),
    }
}

/// Mark the tenant namespace and grant it the registry proxy secret
async fn configure_rs_proxy(
    store: &dyn ObjectStore,
    config: &AdmConfig,
    tenant: &str,
) -> AdmResult<()> {
    store
        .label_namespace(
            tenant,
            &BTreeMap::from([(FLEET_RS_SECRET.to_string(), "true".to_string())]),
        )
        .await?;
    let name = format!("{}-{tenant}", config.rs_proxy_repo_secret);
    for ns in [config.rs_proxy_remote_ns.as_str(), FLEET_DEFAULT_NAMESPACE] {
        let binding = rs_role_binding(&name, ns, &config.rs_proxy_repo_secret, tenant);
        match store.create_role_binding(ns, &binding).await {
            Ok(_) => {
                info!(namespace = ns, binding = %name, "Created registry proxy role binding");
            }
            Err(e) if e.is_already_exists() => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DockerCredential, HelmCredential};
    use crate::deployment::model::OverrideValues;
    use crate::store::MemoryStore;

    fn draft() -> DeploymentDraft {
        DeploymentDraft {
            name: "deployment-abcde".to_string(),
            namespace: "tenant".to_string(),
            profile_name: "default".to_string(),
            apps: vec![ResolvedApp {
                name: "wordpress".to_string(),
                version: "15.2.42".to_string(),
                repo: "https://charts.bitnami.com/bitnami".to_string(),
                values: "replicaCount: 1\n".to_string(),
                helm_credential: HelmCredential {
                    username: "user".to_string(),
                    password: "token".to_string(),
                    cacerts: String::new(),
                },
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_secret_names() {
        let config = AdmConfig::default();
        let mut d = draft();
        let names = app_secret_names(&d, &d.apps[0], &config);
        assert_eq!(names.profile, "deployment-abcde-wordpress-15.2.42-profile");
        assert_eq!(names.repo, "deployment-abcde-wordpress-15.2.42-helmrepo");
        assert!(names.values.is_empty());
        assert!(names.image.is_empty());

        d.apps[0].image_registry = "registry".to_string();
        d.apps[0].docker_credential = DockerCredential {
            username: "u".to_string(),
            password: String::new(),
        };
        assert!(app_secret_names(&d, &d.apps[0], &config).image.is_empty());
    }

    #[test]
    fn test_rs_proxy_repo_uses_shared_secret() {
        let config = AdmConfig {
            rs_proxy_repo: "https://charts.bitnami.com/bitnami".to_string(),
            rs_proxy_repo_secret: "rs-secret".to_string(),
            ..Default::default()
        };
        let d = draft();
        let names = app_secret_names(&d, &d.apps[0], &config);
        assert_eq!(names.repo, "rs-secret");
        assert_eq!(names.owned(&config), vec!["deployment-abcde-wordpress-15.2.42-profile"]);
    }

    #[tokio::test]
    async fn test_create_and_own_secrets() {
        let store = MemoryStore::new();
        let config = AdmConfig::default();
        let mut d = draft();
        d.override_values = vec![OverrideValues {
            app_name: "wordpress".to_string(),
            target_namespace: String::new(),
            values: serde_json::json!({"a": "b"}).as_object().cloned(),
        }];
        create_secrets(&store, &config, &d).await.unwrap();
        let mut names = store.secret_names("tenant").await;
        names.sort();
        assert_eq!(
            names,
            vec![
                "deployment-abcde-wordpress-15.2.42-helmrepo",
                "deployment-abcde-wordpress-15.2.42-overrides",
                "deployment-abcde-wordpress-15.2.42-overrides-masked",
                "deployment-abcde-wordpress-15.2.42-profile",
            ]
        );

        d.deploy_id = "uid-1".to_string();
        set_owner_references(&store, &config, &d).await.unwrap();
        let secret = store
            .get_secret("tenant", "deployment-abcde-wordpress-15.2.42-overrides")
            .await
            .unwrap();
        let owners = secret.metadata.owner_references.clone().unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].uid, "uid-1");
        assert_eq!(secret_value(&secret, "values").unwrap(), "a: b\n");
    }

    #[tokio::test]
    async fn test_git_secret_skipped_when_disabled() {
        let store = MemoryStore::new();
        let creds = crate::credentials::StaticCredentialStore::new("git", "pw");
        let config = AdmConfig::default();
        create_git_credential_secret(&store, &creds, &config, "tenant").await.unwrap();
        assert!(store.secret_names("tenant").await.is_empty());

        let config = AdmConfig {
            secret_service_enabled: true,
            ..Default::default()
        };
        create_git_credential_secret(&store, &creds, &config, "tenant").await.unwrap();
        create_git_credential_secret(&store, &creds, &config, "tenant").await.unwrap();
        let secret = store.get_secret("tenant", GIT_CREDENTIAL_SECRET_NAME).await.unwrap();
        assert_eq!(secret.type_.as_deref(), Some(BASIC_AUTH_SECRET_TYPE));
        assert_eq!(secret_value(&secret, "username").unwrap(), "git");
    }

    #[tokio::test]
    async fn test_rs_proxy_configured_once() {
        let store = MemoryStore::new();
        store.ensure_namespace("tenant").await.unwrap();
        let config = AdmConfig {
            rs_proxy_repo: "https://charts.bitnami.com/bitnami".to_string(),
            rs_proxy_repo_secret: "rs-secret".to_string(),
            rs_proxy_remote_ns: "orch-harbor".to_string(),
            ..Default::default()
        };
        create_secrets(&store, &config, &draft()).await.unwrap();
        configure_rs_proxy(&store, &config, "tenant").await.unwrap();
        let labels = store.namespace_labels("tenant").await.unwrap();
        assert_eq!(labels.get(FLEET_RS_SECRET).map(String::as_str), Some("true"));
        let bindings = store.role_bindings().await;
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].1.metadata.name.as_deref(), Some("rs-secret-tenant"));
    }
}
