//! # Dependency Resolver
//!
//! Applications may require other deployment packages. Each required package
//! becomes a child Deployment of the requesting one:
//!
//! | Case | Condition | Outcome |
//! |------|-----------|---------|
//! | 1 | package allows multiple deployments | new child |
//! | 2 | forbids multiple, already produced in this request | reuse it |
//! | 3 | forbids multiple, none stored in the tenant | new child |
//! | 4 | forbids multiple, exactly one stored | adopt the stored record |
//!
//! Several stored records for a forbids-multiple package fail already-exists.
//! Traversal is bounded by [`MAX_DEPTH`].

use super::builder::DeploymentDraft;
use super::init::{catalog_error, Scenario};
use super::model::{ApiDeployment, TargetClusters};
use super::targets::{build_app_targets, target_present, TargetMap};
use super::DeploymentService;
use crate::config::AdmConfig;
use crate::constants::MAX_DEPTH;
use crate::crd::{Deployment, DeploymentPackageRef, DeploymentType};
use crate::error::{AdmError, AdmResult};
use crate::labels::tenant_selector;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Children produced while initializing one request
#[derive(Debug, Default)]
pub struct Traversal {
    /// Package id to child name, forbids-multiple packages only
    by_package: BTreeMap<String, String>,
    drafts: BTreeMap<String, DeploymentDraft>,
    /// Child names in creation order, leaves first
    order: Vec<String>,
}

impl Traversal {
    /// Children in the order they have to be written, leaves first
    pub fn into_children(mut self) -> Vec<DeploymentDraft> {
        self.order
            .iter()
            .filter_map(|name| self.drafts.remove(name))
            .collect()
    }

    fn record(&mut self, draft: DeploymentDraft) {
        if draft.forbids_multiple_deployments {
            self.by_package
                .entry(draft.package_id())
                .or_insert_with(|| draft.name.clone());
        }
        self.order.push(draft.name.clone());
        self.drafts.insert(draft.name.clone(), draft);
    }
}

impl DeploymentService {
    /// Resolve the required packages of `draft` and, on create, its children
    pub(crate) async fn add_dependencies(
        &self,
        draft: &mut DeploymentDraft,
        create: bool,
        config: &AdmConfig,
        traversal: &mut Traversal,
        depth: usize,
    ) -> AdmResult<()> {
        let required: Vec<_> = draft
            .apps
            .iter()
            .flat_map(|app| app.required_deployment_packages.iter().cloned())
            .collect();

        for dep in required {
            let id = dep.id();
            let package = self
                .catalog
                .get_deployment_package(&dep.name, &dep.version)
                .await
                .map_err(catalog_error)?;
            let reference = DeploymentPackageRef {
                name: dep.name.clone(),
                version: dep.version.clone(),
                profile_name: dep.profile.clone(),
                forbids_multiple_deployments: package.forbids_multiple_deployments,
                namespaces: Vec::new(),
            };
            draft.required_packages.insert(id.clone(), reference.clone());
            if !create {
                continue;
            }

            let Some(inherited) = draft.target_clusters.first().cloned() else {
                return Err(AdmError::invalid("missing targetClusters in request"));
            };

            let reused = if reference.forbids_multiple_deployments {
                traversal.by_package.get(&id).cloned()
            } else {
                None
            };
            let child_name = match reused {
                Some(name) => {
                    debug!(package = %id, child = %name, "Reusing child from this request");
                    name
                }
                None => {
                    let adopted = if reference.forbids_multiple_deployments {
                        self.adoptable(&draft.namespace, &id).await?
                    } else {
                        None
                    };
                    let child = match adopted {
                        Some(record) => {
                            info!(
                                package = %id,
                                child = %record.name(),
                                "Adopting stored deployment"
                            );
                            adopted_draft(&record, &inherited)
                        }
                        None => {
                            let request = ApiDeployment {
                                app_name: dep.name.clone(),
                                app_version: dep.version.clone(),
                                profile_name: dep.profile.clone(),
                                deployment_type: draft.deployment_type.as_str().to_string(),
                                target_clusters: package
                                    .application_references
                                    .iter()
                                    .map(|app| TargetClusters {
                                        app_name: app.name.clone(),
                                        labels: inherited.labels.clone(),
                                        cluster_id: inherited.cluster_id.clone(),
                                    })
                                    .collect(),
                                ..Default::default()
                            };
                            let tenant = draft.namespace.clone();
                            self.init_draft(
                                request,
                                Scenario::Create,
                                &tenant,
                                config,
                                traversal,
                                depth + 1,
                            )
                            .await?
                        }
                    };
                    let name = child.name.clone();
                    traversal.record(child);
                    name
                }
            };

            draft.children.insert(
                child_name,
                DeploymentPackageRef {
                    forbids_multiple_deployments: false,
                    ..reference
                },
            );
        }
        Ok(())
    }

    /// The single stored deployment of a forbids-multiple package, if any
    async fn adoptable(&self, tenant: &str, id: &str) -> AdmResult<Option<Deployment>> {
        let mut matching: Vec<Deployment> = self
            .store
            .list_deployments(tenant, &tenant_selector(tenant))
            .await?
            .into_iter()
            .filter(|d| d.spec.deployment_package_ref.package_id() == id)
            .collect();
        match matching.len() {
            0 | 1 => Ok(matching.pop()),
            _ => Err(AdmError::AlreadyExists(
                "confused the target Deployment: the deployment package forbids multiple deployment package but there are multiple deployments for the deployment package".to_string(),
            )),
        }
    }
}

fn adopted_draft(record: &Deployment, inherited: &TargetClusters) -> DeploymentDraft {
    let package = &record.spec.deployment_package_ref;
    DeploymentDraft {
        name: record.name().to_string(),
        namespace: record.metadata.namespace.clone().unwrap_or_default(),
        deploy_id: record.uid().to_string(),
        display_name: record.spec.display_name.clone(),
        package_name: package.name.clone(),
        package_version: package.version.clone(),
        profile_name: package.profile_name.clone(),
        deployment_type: record.spec.deployment_type,
        forbids_multiple_deployments: true,
        target_clusters: record
            .spec
            .applications
            .iter()
            .map(|app| TargetClusters {
                app_name: app.name.clone(),
                labels: inherited.labels.clone(),
                cluster_id: inherited.cluster_id.clone(),
            })
            .collect(),
        adopted: true,
        ..Default::default()
    }
}

/// Add the targets `entries` select to every application of `record`
///
/// Returns whether anything was added.
pub fn add_target_entries(
    record: &mut Deployment,
    deployment_type: DeploymentType,
    entries: &[TargetClusters],
    tenant: &str,
) -> bool {
    let mut changed = false;
    for app in &mut record.spec.applications {
        for target in build_app_targets(deployment_type, entries, &app.name, tenant) {
            if !target_present(&app.targets, &target) {
                app.targets.push(target);
                changed = true;
            }
        }
    }
    changed
}

/// Add every target of `parent` to every application of `child`
pub fn propagate_targets(parent: &Deployment, child: &mut Deployment) -> bool {
    let mut union: Vec<&TargetMap> = Vec::new();
    for target in parent.spec.applications.iter().flat_map(|a| &a.targets) {
        if !union.contains(&target) {
            union.push(target);
        }
    }
    let mut changed = false;
    for app in &mut child.spec.applications {
        for target in &union {
            if !target_present(&app.targets, target) {
                app.targets.push((*target).clone());
                changed = true;
            }
        }
    }
    changed
}

/// Names of `root` and every deployment reachable through child lists
pub fn collect_descendants(
    root: &str,
    all: &BTreeMap<String, Deployment>,
    closure: &mut BTreeMap<String, Deployment>,
    depth: usize,
) -> AdmResult<()> {
    if depth > MAX_DEPTH {
        return Err(AdmError::internal("maximum recursion depth reached"));
    }
    let Some(deployment) = all.get(root) else {
        return Ok(());
    };
    closure.insert(root.to_string(), deployment.clone());
    for child in deployment.spec.child_deployment_list.keys() {
        collect_descendants(child, all, closure, depth + 1)?;
    }
    Ok(())
}

/// Whether every parent of every member lies inside the closure
pub fn closure_is_self_contained(closure: &BTreeMap<String, Deployment>) -> bool {
    closure
        .values()
        .all(|d| d.parents().keys().all(|parent| closure.contains_key(parent)))
}
