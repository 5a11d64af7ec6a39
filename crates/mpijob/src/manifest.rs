use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Capabilities, Container, FlexVolumeSource, PodSpec, PodTemplateSpec, ResourceRequirements,
    SecurityContext, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

use crate::schema::{
    Role, DEFAULT_DATA_CONTAINER, DEFAULT_IMAGE, DEFAULT_MOUNT_PATH, DEFAULT_WORKING_DIR,
    FLEX_VOLUME_DRIVER, GPU_RESOURCE_KEY, VOLUME_NAME,
};

/// Fully-assembled MPIJob custom resource, ready to serialize or submit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MpiJobManifest {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: MpiJobSpec,
}

/// Spec body in one of the two historical layouts. Serialized untagged so
/// the wire form matches what the API server expects for each version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MpiJobSpec {
    Single(SingleRoleSpec),
    Dual(DualRoleSpec),
}

/// `v1alpha1` layout: one template, replica count at the job level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleRoleSpec {
    pub replicas: i32,
    pub template: PodTemplateSpec,
}

/// `v1alpha2`/`v1` layout: launcher and worker replica specs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DualRoleSpec {
    pub slots_per_worker: i32,
    pub mpi_replica_specs: MpiReplicaSpecs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpiReplicaSpecs {
    #[serde(rename = "Launcher")]
    pub launcher: ReplicaSpec,
    #[serde(rename = "Worker")]
    pub worker: ReplicaSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    pub template: PodTemplateSpec,
}

/// Seed a pod template with the defaults for one role.
///
/// Both roles get the default image, working directory, `IPC_LOCK`
/// capability and a storage volume pointed at the user container. Workers
/// additionally mount the volume and request one GPU.
pub fn seed_template(role: Role) -> PodTemplateSpec {
    let mut container = Container {
        name: String::new(),
        image: Some(DEFAULT_IMAGE.to_string()),
        working_dir: Some(DEFAULT_WORKING_DIR.to_string()),
        security_context: Some(SecurityContext {
            capabilities: Some(Capabilities {
                add: Some(vec!["IPC_LOCK".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    };

    if role == Role::Worker {
        container.volume_mounts = Some(vec![VolumeMount {
            name: VOLUME_NAME.to_string(),
            mount_path: DEFAULT_MOUNT_PATH.to_string(),
            ..Default::default()
        }]);
        container.resources = Some(gpu_limits(1, GPU_RESOURCE_KEY));
    }

    PodTemplateSpec {
        metadata: None,
        spec: Some(PodSpec {
            containers: vec![container],
            volumes: Some(vec![storage_volume(DEFAULT_DATA_CONTAINER, "", "")]),
            ..Default::default()
        }),
    }
}

/// Build the flexVolume definition for a resolved (container, subpath)
/// pair and access key.
pub fn storage_volume(data_container: &str, subpath: &str, access_key: &str) -> Volume {
    let mut options = BTreeMap::new();
    options.insert("container".to_string(), data_container.to_string());
    options.insert("subPath".to_string(), subpath.to_string());
    options.insert("accessKey".to_string(), access_key.to_string());

    Volume {
        name: VOLUME_NAME.to_string(),
        flex_volume: Some(FlexVolumeSource {
            driver: FLEX_VOLUME_DRIVER.to_string(),
            options: Some(options),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Resource requirements with a single GPU limit under the given key.
pub fn gpu_limits(count: u32, resource_key: &str) -> ResourceRequirements {
    let mut limits = BTreeMap::new();
    limits.insert(resource_key.to_string(), Quantity(count.to_string()));

    ResourceRequirements {
        limits: Some(limits),
        ..Default::default()
    }
}

/// First container of a template, created if the template is empty.
pub fn container_mut(template: &mut PodTemplateSpec) -> &mut Container {
    let spec = template.spec.get_or_insert_with(PodSpec::default);
    if spec.containers.is_empty() {
        spec.containers.push(Container::default());
    }
    &mut spec.containers[0]
}

/// Pod spec of a template, created if the template is empty.
pub fn pod_spec_mut(template: &mut PodTemplateSpec) -> &mut PodSpec {
    template.spec.get_or_insert_with(PodSpec::default)
}
