//! # Target Clusters
//!
//! Request target validation and the label maps written into
//! `applications[*].targets`.

use super::model::{ApiDeployment, TargetClusters};
use crate::crd::DeploymentType;
use crate::error::{AdmError, AdmResult};
use crate::labels::{CLUSTER_NAME, TARGET_TENANT};
use std::collections::BTreeMap;

pub type TargetMap = BTreeMap<String, String>;

fn check_entry(
    entry: &TargetClusters,
    field: &str,
    deployment_type: DeploymentType,
) -> AdmResult<()> {
    let no_labels = entry.labels.as_ref().is_none_or(BTreeMap::is_empty);
    if entry.labels.is_none() && entry.cluster_id.is_empty() {
        return Err(AdmError::invalid(format!(
            "missing {field}.labels or {field}.clusterId in request"
        )));
    }
    match deployment_type {
        DeploymentType::AutoScaling if no_labels => Err(AdmError::invalid(format!(
            "deployment type is auto-scaling but missing {field}.labels"
        ))),
        DeploymentType::Targeted if entry.cluster_id.is_empty() => Err(AdmError::invalid(
            format!("deployment type is targeted but missing {field}.clusterId"),
        )),
        _ => Ok(()),
    }
}

fn tag_tenant(entry: &mut TargetClusters, deployment_type: DeploymentType, tenant: &str) {
    let labels = match deployment_type {
        DeploymentType::Targeted => entry.labels.insert(BTreeMap::new()),
        DeploymentType::AutoScaling => entry.labels.get_or_insert_with(BTreeMap::new),
    };
    labels.insert(TARGET_TENANT.to_string(), tenant.to_string());
}

/// Validate the target entries and tag each with the tenant
///
/// Targeted entries keep only the tenant key in their labels; the cluster
/// id carries the selection.
pub fn normalize_targets(request: &mut ApiDeployment, tenant: &str) -> AdmResult<()> {
    let deployment_type = DeploymentType::parse(&request.deployment_type);
    if request.target_clusters.is_empty() && request.all_app_target_clusters.is_none() {
        return Err(AdmError::invalid("missing targetClusters in request"));
    }
    for entry in &mut request.target_clusters {
        if entry.app_name.is_empty() {
            return Err(AdmError::invalid("missing targetClusters.appName in request"));
        }
        check_entry(entry, "targetClusters", deployment_type)?;
        tag_tenant(entry, deployment_type, tenant);
    }
    if let Some(entry) = request.all_app_target_clusters.as_mut() {
        check_entry(entry, "allAppTargetClusters", deployment_type)?;
        tag_tenant(entry, deployment_type, tenant);
    }
    Ok(())
}

/// Spread `allAppTargetClusters` over every application without an equal entry
pub fn merge_all_app_target_clusters(request: &mut ApiDeployment, app_names: &[String]) {
    let Some(all) = request.all_app_target_clusters.clone() else {
        return;
    };
    for app in app_names {
        let present = request.target_clusters.iter().any(|t| {
            &t.app_name == app && t.labels == all.labels && t.cluster_id == all.cluster_id
        });
        if !present {
            request.target_clusters.push(TargetClusters {
                app_name: app.clone(),
                labels: all.labels.clone(),
                cluster_id: all.cluster_id.clone(),
            });
        }
    }
}

fn push_unique(targets: &mut Vec<TargetMap>, map: TargetMap) {
    if !targets.contains(&map) {
        targets.push(map);
    }
}

/// Target maps of one application
///
/// Targeted entries become `{clustername, tenant}` maps, merged by cluster.
/// Auto-scaling entries split into one map per label, and a comma separated
/// value into one map per value; duplicates are dropped.
pub fn build_app_targets(
    deployment_type: DeploymentType,
    entries: &[TargetClusters],
    app_name: &str,
    tenant: &str,
) -> Vec<TargetMap> {
    let mut targets: Vec<TargetMap> = Vec::new();
    for entry in entries.iter().filter(|t| t.app_name == app_name) {
        match deployment_type {
            DeploymentType::Targeted => {
                let present = targets
                    .iter()
                    .any(|t| t.get(CLUSTER_NAME) == Some(&entry.cluster_id));
                if !present {
                    targets.push(TargetMap::from([
                        (CLUSTER_NAME.to_string(), entry.cluster_id.clone()),
                        (TARGET_TENANT.to_string(), tenant.to_string()),
                    ]));
                }
            }
            DeploymentType::AutoScaling => {
                let labels: Vec<(&String, &String)> = entry
                    .labels
                    .iter()
                    .flatten()
                    .filter(|(k, _)| k.as_str() != TARGET_TENANT)
                    .collect();
                for (key, value) in &labels {
                    if value.contains(',') {
                        for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                            push_unique(&mut targets, single_label(key, part, tenant));
                        }
                    } else if labels.len() > 1 {
                        push_unique(&mut targets, single_label(key, value, tenant));
                    } else {
                        let mut map: TargetMap = entry.labels.clone().unwrap_or_default();
                        map.insert(TARGET_TENANT.to_string(), tenant.to_string());
                        push_unique(&mut targets, map);
                    }
                }
            }
        }
    }
    targets
}

fn single_label(key: &str, value: &str, tenant: &str) -> TargetMap {
    TargetMap::from([
        (key.to_string(), value.to_string()),
        (TARGET_TENANT.to_string(), tenant.to_string()),
    ])
}

/// Whether `targets` already selects what `candidate` selects
///
/// Cluster-bound maps compare by cluster name, label maps by equality.
pub fn target_present(targets: &[TargetMap], candidate: &TargetMap) -> bool {
    match candidate.get(CLUSTER_NAME) {
        Some(cluster) => targets.iter().any(|t| t.get(CLUSTER_NAME) == Some(cluster)),
        None => targets.contains(candidate),
    }
}

/// Request-shaped view of a stored target map
pub fn target_view(app_name: &str, target: &TargetMap) -> TargetClusters {
    let labels: BTreeMap<String, String> = target
        .iter()
        .filter(|(k, _)| k.as_str() != TARGET_TENANT && k.as_str() != CLUSTER_NAME)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    TargetClusters {
        app_name: app_name.to_string(),
        labels: (!labels.is_empty()).then_some(labels),
        cluster_id: target.get(CLUSTER_NAME).cloned().unwrap_or_default(),
    }
}
