//! # API Extensions
//!
//! APIExtension records expose a deployment's services through the
//! orchestrator gateway. They are created with the root deployment when
//! extensions are enabled and removed with it.

use super::builder::DeploymentDraft;
use super::init::catalog_error;
use super::model::{ApiExtensionToken, UiExtension};
use super::secrets::owner_reference;
use super::{incomplete_request, observe, DeploymentService};
use crate::catalog::{list_api_extensions, ApiExtensionTemplate};
use crate::constants::DEPLOYMENT_PROJECT;
use crate::crd::{
    APIExtension, APIExtensionSpec, APIGroup, Deployment, ProxyEndpoint, UIExtension,
};
use crate::error::{AdmError, AdmResult};
use crate::labels::{tenant_selector, DEPLOYMENT_ID, TENANT};
use crate::tenant::{require_tenant, RequestMetadata};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info, info_span, Instrument};

/// APIExtension record of one catalog extension of `draft`
fn extension_record(draft: &DeploymentDraft, template: &ApiExtensionTemplate) -> APIExtension {
    let name = format!("{}-{}-ae", draft.name, template.name);
    let spec = APIExtensionSpec {
        display_name: if template.display_name.is_empty() {
            template.name.clone()
        } else {
            template.display_name.clone()
        },
        project: DEPLOYMENT_PROJECT.to_string(),
        api_group: APIGroup {
            name: template.name.clone(),
            version: template.version.clone(),
        },
        proxy_endpoints: template
            .endpoints
            .iter()
            .map(|e| ProxyEndpoint {
                service_name: e.service_name.clone(),
                path: e.external_path.clone(),
                backend: e.internal_path.clone(),
                scheme: e.scheme.clone(),
                auth_type: e.auth_type.clone(),
                app_name: e.app_name.clone(),
            })
            .collect(),
        ui_extensions: template
            .ui_extension
            .iter()
            .map(|ui| UIExtension {
                service_name: ui.service_name.clone(),
                description: ui.description.clone(),
                label: ui.label.clone(),
                file_name: ui.file_name.clone(),
                app_name: ui.app_name.clone(),
                module_name: ui.module_name.clone(),
            })
            .collect(),
        agent_cluster_labels: BTreeMap::new(),
    };
    let mut record = APIExtension::new(&name, spec);
    record.metadata = ObjectMeta {
        name: Some(name),
        namespace: Some(draft.namespace.clone()),
        labels: Some(BTreeMap::from([
            (TENANT.to_string(), draft.namespace.clone()),
            (DEPLOYMENT_ID.to_string(), draft.deploy_id.clone()),
        ])),
        owner_references: Some(vec![owner_reference(&draft.name, &draft.deploy_id)]),
        ..Default::default()
    };
    record
}

fn disabled(operation: &str) -> AdmError {
    AdmError::NotFound(format!("{operation}: extensions are disabled"))
}

impl DeploymentService {
    /// Create the APIExtension records the root's package declares
    pub(super) async fn create_api_extensions(&self, root: &DeploymentDraft) -> AdmResult<()> {
        let templates =
            list_api_extensions(self.catalog.as_ref(), &root.package_name, &root.package_version)
                .await
                .map_err(catalog_error)?;
        for template in &templates {
            let record = extension_record(root, template);
            self.store
                .create_api_extension(&root.namespace, &record)
                .await?;
            info!(
                extension = %template.name,
                deployment.name = %root.name,
                "Created API extension"
            );
        }
        Ok(())
    }

    /// Remove the APIExtension records of a deployment
    pub(super) async fn delete_api_extensions(&self, deployment: &Deployment) -> AdmResult<()> {
        let ns = deployment.metadata.namespace.as_deref().unwrap_or_default();
        let mut selector = tenant_selector(ns);
        selector.insert(DEPLOYMENT_ID.to_string(), deployment.uid().to_string());
        for extension in self.store.list_api_extensions(ns, &selector).await? {
            let name = extension.metadata.name.clone().unwrap_or_default();
            match self.store.delete_api_extension(ns, &name).await {
                Ok(()) => debug!(extension = %name, "Deleted API extension"),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Gateway token minted for an API extension
    pub async fn get_api_extension(
        &self,
        metadata: &RequestMetadata,
        name: &str,
    ) -> AdmResult<ApiExtensionToken> {
        let span = info_span!("adm.get_api_extension", extension = %name);
        observe("GetAPIExtension", async move {
            if !self.config().await.api_ext_enabled {
                return Err(disabled("cannot get API extension"));
            }
            if name.is_empty() {
                return Err(incomplete_request());
            }
            self.authorize(
                "GetAPIExtension",
                &json!({ "name": name }),
                metadata,
                "cannot get API extension",
            )
            .await?;
            let tenant = require_tenant(metadata)?;

            let extension = self
                .store
                .get_api_extension(&tenant, name)
                .await
                .map_err(|e| match e {
                    AdmError::NotFound(_) => {
                        AdmError::NotFound(format!("API extension {name} not found"))
                    }
                    other => other,
                })?;
            Ok(ApiExtensionToken {
                name: name.to_string(),
                token: extension
                    .status
                    .map(|s| s.token_secret_ref.token)
                    .unwrap_or_default(),
            })
        })
        .instrument(span)
        .await
    }

    /// UI extensions of the tenant, optionally restricted to some services
    pub async fn list_ui_extensions(
        &self,
        metadata: &RequestMetadata,
        service_names: &[String],
    ) -> AdmResult<Vec<UiExtension>> {
        let span = info_span!("adm.list_ui_extensions", services = ?service_names);
        observe("ListUIExtensions", async move {
            if !self.config().await.api_ext_enabled {
                return Err(disabled("cannot list UI extensions"));
            }
            self.authorize(
                "ListUIExtensions",
                &json!({ "serviceName": service_names }),
                metadata,
                "cannot list UI extensions",
            )
            .await?;
            let tenant = require_tenant(metadata)?;

            let extensions = self
                .store
                .list_api_extensions(&tenant, &tenant_selector(&tenant))
                .await?;
            Ok(extensions
                .iter()
                .flat_map(|e| &e.spec.ui_extensions)
                .filter(|ui| service_names.is_empty() || service_names.contains(&ui.service_name))
                .map(|ui| UiExtension {
                    service_name: ui.service_name.clone(),
                    description: ui.description.clone(),
                    label: ui.label.clone(),
                    file_name: ui.file_name.clone(),
                    app_name: ui.app_name.clone(),
                    module_name: ui.module_name.clone(),
                })
                .collect())
        })
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EndpointTemplate, UiExtensionTemplate};

    #[test]
    fn test_extension_record_shape() {
        let draft = DeploymentDraft {
            name: "deployment-aaaaa".to_string(),
            namespace: "tenant".to_string(),
            deploy_id: "uid-1".to_string(),
            ..Default::default()
        };
        let template = ApiExtensionTemplate {
            name: "dashboard".to_string(),
            version: "v1".to_string(),
            endpoints: vec![EndpointTemplate {
                service_name: "grafana".to_string(),
                external_path: "/dash".to_string(),
                internal_path: "/".to_string(),
                ..Default::default()
            }],
            ui_extension: Some(UiExtensionTemplate {
                label: "Dashboards".to_string(),
                service_name: "grafana".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let record = extension_record(&draft, &template);
        assert_eq!(record.metadata.name.as_deref(), Some("deployment-aaaaa-dashboard-ae"));
        assert_eq!(record.spec.display_name, "dashboard");
        assert_eq!(record.spec.proxy_endpoints[0].path, "/dash");
        assert_eq!(record.spec.ui_extensions[0].label, "Dashboards");
        let labels = record.metadata.labels.unwrap();
        assert_eq!(labels.get(DEPLOYMENT_ID).map(String::as_str), Some("uid-1"));
        let owners = record.metadata.owner_references.unwrap();
        assert_eq!(owners[0].uid, "uid-1");
    }
}
