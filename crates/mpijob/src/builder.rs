use k8s_openapi::api::core::v1::{Container, PodTemplateSpec, VolumeMount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::{error, info};

use crate::client::JobClient;
use crate::config::StorageSettings;
use crate::manifest::{
    container_mut, gpu_limits, pod_spec_mut, seed_template, storage_volume, DualRoleSpec,
    MpiJobManifest, MpiJobSpec, MpiReplicaSpecs, ReplicaSpec, SingleRoleSpec,
};
use crate::paths;
use crate::schema::{
    Role, RoleLayout, SchemaVariant, DEFAULT_NAMESPACE, LAUNCH_PREFIX, VOLUME_NAME,
};
use crate::{Error, Result};

/// Builder for MPIJob custom resources.
///
/// One builder targets one [`SchemaVariant`] for its whole lifetime and
/// owns a pod template per role, seeded from the variant's defaults.
/// Mutators overwrite their target field entirely (last write wins) and
/// return the builder for chaining.
///
/// ```no_run
/// use mpijob_builder::{MpiJobBuilder, SchemaVariant, StorageSettings};
///
/// # fn main() -> mpijob_builder::Result<()> {
/// let settings = StorageSettings::from_env();
/// let mut job = MpiJobBuilder::new(SchemaVariant::V1, "train", settings)?;
/// job.with_image("myrepo/train:latest")
///     .with_command(["train.py", "--epochs", "10"])
///     .with_replicas(4)?
///     .with_gpus(1, "nvidia.com/gpu");
/// println!("{}", job.to_yaml()?);
/// # Ok(())
/// # }
/// ```
pub struct MpiJobBuilder {
    variant: SchemaVariant,
    name: String,
    namespace: String,
    worker_replicas: i32,
    settings: StorageSettings,
    launcher: PodTemplateSpec,
    worker: PodTemplateSpec,
    client: Option<JobClient>,
}

impl MpiJobBuilder {
    /// Create a builder for `variant` with templates seeded from its
    /// defaults. The container name on every role is set to the job name
    /// and the volume access key and subpath are seeded from `settings`.
    pub fn new(variant: SchemaVariant, name: &str, settings: StorageSettings) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "job name must not be empty".to_string(),
            ));
        }

        let mut builder = Self {
            variant,
            name: name.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            worker_replicas: 1,
            launcher: seed_template(Role::Launcher),
            worker: seed_template(Role::Worker),
            client: None,
            settings,
        };

        let container_name = name.to_string();
        builder.update_containers(variant.roles(), |c| c.name = container_name.clone());

        let access_key = builder.settings.access_key.clone();
        let subpath = format!("/{}", builder.settings.username);
        builder.update_volume_options(variant.roles(), |options| {
            options.insert("accessKey".to_string(), access_key.clone());
            options.insert("subPath".to_string(), subpath.clone());
        });

        Ok(builder)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn variant(&self) -> SchemaVariant {
        self.variant
    }

    pub fn with_namespace(&mut self, namespace: &str) -> &mut Self {
        self.namespace = namespace.to_string();
        self
    }

    /// Overwrite the container image on every role.
    pub fn with_image(&mut self, image: &str) -> &mut Self {
        let image = image.to_string();
        self.update_containers(self.variant.roles(), |c| c.image = Some(image.clone()));
        self
    }

    /// Store the command on worker-bearing roles, prefixed with the fixed
    /// `mpirun python` invocation. The launcher command stays unset; the
    /// MPI operator injects its own launch command there.
    pub fn with_command<I, S>(&mut self, command: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv: Vec<String> = LAUNCH_PREFIX.iter().map(|s| s.to_string()).collect();
        argv.extend(command.into_iter().map(Into::into));
        self.update_containers(&[Role::Worker], |c| c.command = Some(argv.clone()));
        self
    }

    /// Mount a logical storage path on every role.
    ///
    /// A leading `~/` is expanded first (see [`paths::expand_home`]), the
    /// result is resolved into a (container, subpath) pair, and the
    /// volume definition plus mount are overwritten on all templates. An
    /// empty `access_key` falls back to the builder's settings.
    pub fn with_volume(
        &mut self,
        mount_path: &str,
        logical_path: &str,
        access_key: &str,
    ) -> Result<&mut Self> {
        let expanded = paths::expand_home(logical_path, &self.settings);
        let (data_container, subpath) = paths::split_path(&expanded)?;
        let access_key = if access_key.is_empty() {
            self.settings.access_key.clone()
        } else {
            access_key.to_string()
        };

        let mount = VolumeMount {
            name: VOLUME_NAME.to_string(),
            mount_path: mount_path.to_string(),
            ..Default::default()
        };
        self.update_containers(self.variant.roles(), |c| {
            c.volume_mounts = Some(vec![mount.clone()]);
        });

        let volume = storage_volume(&data_container, &subpath, &access_key);
        for role in self.variant.roles() {
            pod_spec_mut(self.template_mut(*role)).volumes = Some(vec![volume.clone()]);
        }

        Ok(self)
    }

    /// Mount the user's home directory at the default mount path.
    pub fn with_home_volume(&mut self) -> Result<&mut Self> {
        self.with_volume(crate::schema::DEFAULT_MOUNT_PATH, "~/", "")
    }

    /// Set the GPU limit on every role whose default template declares a
    /// resources block. A count of zero clears the request.
    pub fn with_gpus(&mut self, count: u32, resource_key: &str) -> &mut Self {
        let roles = self.variant.gpu_roles();
        if count == 0 {
            self.update_containers(roles, |c| c.resources = None);
        } else {
            let resources = gpu_limits(count, resource_key);
            self.update_containers(roles, |c| c.resources = Some(resources.clone()));
        }
        self
    }

    /// Set the worker replica count. The launcher always runs a single
    /// instance.
    pub fn with_replicas(&mut self, count: i32) -> Result<&mut Self> {
        if count < 1 {
            return Err(Error::InvalidArgument(format!(
                "worker replica count must be at least 1, got {}",
                count
            )));
        }
        self.worker_replicas = count;
        Ok(self)
    }

    /// Overwrite the working directory on every role.
    pub fn with_working_dir(&mut self, working_dir: &str) -> &mut Self {
        let working_dir = working_dir.to_string();
        self.update_containers(self.variant.roles(), |c| {
            c.working_dir = Some(working_dir.clone());
        });
        self
    }

    /// Use an already-constructed client for submit and delete instead of
    /// the default in-cluster/kubeconfig lookup.
    pub fn bind(&mut self, client: JobClient) -> &mut Self {
        self.client = Some(client);
        self
    }

    /// Assemble the manifest in the layout of the builder's variant.
    ///
    /// Every template is cloned into the output, so repeated renders and
    /// shared sub-structures never alias.
    pub fn to_manifest(&self) -> MpiJobManifest {
        let spec = match self.variant.role_layout() {
            RoleLayout::SingleRole => MpiJobSpec::Single(SingleRoleSpec {
                replicas: self.worker_replicas,
                template: self.worker.clone(),
            }),
            RoleLayout::DualRole => MpiJobSpec::Dual(DualRoleSpec {
                slots_per_worker: 1,
                mpi_replica_specs: MpiReplicaSpecs {
                    launcher: ReplicaSpec {
                        replicas: None,
                        template: self.launcher.clone(),
                    },
                    worker: ReplicaSpec {
                        replicas: Some(self.worker_replicas),
                        template: self.worker.clone(),
                    },
                },
            }),
        };

        MpiJobManifest {
            api_version: self.variant.api_version(),
            kind: SchemaVariant::KIND.to_string(),
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.namespace.clone()),
                ..Default::default()
            },
            spec,
        }
    }

    /// Render the manifest as block-style YAML with keys in declaration
    /// order and no anchors or aliases.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.to_manifest())?)
    }

    /// Submit the job to the cluster, binding a default client first if
    /// none was injected with [`bind`](Self::bind).
    pub async fn submit(&mut self) -> Result<()> {
        if self.client.is_none() {
            self.client = Some(JobClient::new().await?);
        }
        let client = self.client.as_ref().ok_or(Error::NotBound)?;

        let manifest = self.to_manifest();
        match client.create(self.variant, &self.namespace, &manifest).await {
            Ok(_) => {
                info!("Submitted MPIJob {}/{}", self.namespace, self.name);
                Ok(())
            }
            Err(e) => {
                error!("Failed to submit MPIJob {}/{}: {}", self.namespace, self.name, e);
                Err(e)
            }
        }
    }

    /// Delete the job by name and namespace. Requires a client bound by a
    /// prior [`submit`](Self::submit) or [`bind`](Self::bind).
    pub async fn delete(&mut self) -> Result<()> {
        let client = self.client.as_ref().ok_or(Error::NotBound)?;

        match client.delete(self.variant, &self.namespace, &self.name).await {
            Ok(()) => {
                info!("Deleted MPIJob {}/{}", self.namespace, self.name);
                Ok(())
            }
            Err(e) => {
                error!("Failed to delete MPIJob {}/{}: {}", self.namespace, self.name, e);
                Err(e)
            }
        }
    }

    fn template_mut(&mut self, role: Role) -> &mut PodTemplateSpec {
        match role {
            Role::Launcher => &mut self.launcher,
            Role::Worker => &mut self.worker,
        }
    }

    fn update_containers<F>(&mut self, roles: &[Role], mut update: F)
    where
        F: FnMut(&mut Container),
    {
        for role in roles {
            update(container_mut(self.template_mut(*role)));
        }
    }

    fn update_volume_options<F>(&mut self, roles: &[Role], mut update: F)
    where
        F: FnMut(&mut std::collections::BTreeMap<String, String>),
    {
        for role in roles {
            let spec = pod_spec_mut(self.template_mut(*role));
            let volumes = spec.volumes.get_or_insert_with(Vec::new);
            if volumes.is_empty() {
                volumes.push(storage_volume(crate::schema::DEFAULT_DATA_CONTAINER, "", ""));
            }
            if let Some(flex) = volumes[0].flex_volume.as_mut() {
                update(flex.options.get_or_insert_with(Default::default));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> StorageSettings {
        StorageSettings::new("test-key", "bob", "")
    }

    fn dual_builder() -> MpiJobBuilder {
        MpiJobBuilder::new(SchemaVariant::V1, "job1", settings()).unwrap()
    }

    fn worker_container(manifest: &MpiJobManifest) -> &Container {
        match &manifest.spec {
            MpiJobSpec::Dual(spec) => {
                &spec.mpi_replica_specs.worker.template.spec.as_ref().unwrap().containers[0]
            }
            MpiJobSpec::Single(spec) => &spec.template.spec.as_ref().unwrap().containers[0],
        }
    }

    fn launcher_container(manifest: &MpiJobManifest) -> &Container {
        match &manifest.spec {
            MpiJobSpec::Dual(spec) => {
                &spec.mpi_replica_specs.launcher.template.spec.as_ref().unwrap().containers[0]
            }
            MpiJobSpec::Single(_) => panic!("single-role manifest has no launcher"),
        }
    }

    #[test]
    fn test_empty_name_fails() {
        let result = MpiJobBuilder::new(SchemaVariant::V1, "", settings());
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_worker_command_gets_launch_prefix() {
        let mut job = dual_builder();
        job.with_image("img").with_command(["a", "b"]);
        let manifest = job.to_manifest();

        assert_eq!(
            worker_container(&manifest).command.as_ref().unwrap(),
            &vec!["mpirun", "python", "a", "b"]
        );
        assert!(launcher_container(&manifest).command.is_none());
        assert_eq!(launcher_container(&manifest).image.as_deref(), Some("img"));
        assert_eq!(worker_container(&manifest).image.as_deref(), Some("img"));
    }

    #[test]
    fn test_container_name_is_job_name() {
        let manifest = dual_builder().to_manifest();
        assert_eq!(launcher_container(&manifest).name, "job1");
        assert_eq!(worker_container(&manifest).name, "job1");
    }

    #[test]
    fn test_replicas_validation() {
        let mut job = dual_builder();
        assert!(matches!(job.with_replicas(0), Err(Error::InvalidArgument(_))));
        assert!(matches!(job.with_replicas(-1), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_replicas_in_manifest() {
        let mut job = dual_builder();
        job.with_replicas(3).unwrap();
        match job.to_manifest().spec {
            MpiJobSpec::Dual(spec) => {
                assert_eq!(spec.mpi_replica_specs.worker.replicas, Some(3));
                assert_eq!(spec.mpi_replica_specs.launcher.replicas, None);
                assert_eq!(spec.slots_per_worker, 1);
            }
            MpiJobSpec::Single(_) => panic!("expected dual-role spec"),
        }
    }

    #[test]
    fn test_single_role_layout() {
        let mut job = MpiJobBuilder::new(SchemaVariant::V1Alpha1, "job1", settings()).unwrap();
        job.with_replicas(2).unwrap();
        let manifest = job.to_manifest();

        assert_eq!(manifest.api_version, "kubeflow.org/v1alpha1");
        match manifest.spec {
            MpiJobSpec::Single(spec) => assert_eq!(spec.replicas, 2),
            MpiJobSpec::Dual(_) => panic!("expected single-role spec"),
        }

        let yaml = job.to_yaml().unwrap();
        assert!(yaml.contains("replicas: 2"));
        assert!(!yaml.contains("mpiReplicaSpecs"));
        assert!(!yaml.contains("slotsPerWorker"));
    }

    #[test]
    fn test_fixed_top_level_fields() {
        let manifest = dual_builder().to_manifest();
        assert_eq!(manifest.api_version, "kubeflow.org/v1");
        assert_eq!(manifest.kind, "MPIJob");
        assert_eq!(manifest.metadata.name.as_deref(), Some("job1"));
        assert_eq!(manifest.metadata.namespace.as_deref(), Some("default-tenant"));
    }

    #[test]
    fn test_volume_resolution_applies_to_all_roles() {
        let mut job = dual_builder();
        job.with_volume("/data", "myctr/sub", "").unwrap();
        let manifest = job.to_manifest();

        for container in [launcher_container(&manifest), worker_container(&manifest)] {
            let mounts = container.volume_mounts.as_ref().unwrap();
            assert_eq!(mounts[0].mount_path, "/data");
            assert_eq!(mounts[0].name, "v3io");
        }

        let templates = match &manifest.spec {
            MpiJobSpec::Dual(spec) => vec![
                &spec.mpi_replica_specs.launcher.template,
                &spec.mpi_replica_specs.worker.template,
            ],
            MpiJobSpec::Single(spec) => vec![&spec.template],
        };
        for template in templates {
            let volumes = template.spec.as_ref().unwrap().volumes.as_ref().unwrap();
            let options = volumes[0].flex_volume.as_ref().unwrap().options.as_ref().unwrap();
            assert_eq!(options["container"], "myctr");
            assert_eq!(options["subPath"], "/sub");
            // Empty access key falls back to the settings default.
            assert_eq!(options["accessKey"], "test-key");
        }
    }

    #[test]
    fn test_volume_home_expansion() {
        let mut job = dual_builder();
        job.with_home_volume().unwrap();
        let manifest = job.to_manifest();

        let template = match &manifest.spec {
            MpiJobSpec::Dual(spec) => &spec.mpi_replica_specs.worker.template,
            MpiJobSpec::Single(spec) => &spec.template,
        };
        let volumes = template.spec.as_ref().unwrap().volumes.as_ref().unwrap();
        let options = volumes[0].flex_volume.as_ref().unwrap().options.as_ref().unwrap();
        assert_eq!(options["container"], "users");
        assert_eq!(options["subPath"], "/bob/");
    }

    #[test]
    fn test_settings_seed_volume_options() {
        let manifest = dual_builder().to_manifest();
        let template = match &manifest.spec {
            MpiJobSpec::Dual(spec) => &spec.mpi_replica_specs.worker.template,
            MpiJobSpec::Single(spec) => &spec.template,
        };
        let volumes = template.spec.as_ref().unwrap().volumes.as_ref().unwrap();
        let options = volumes[0].flex_volume.as_ref().unwrap().options.as_ref().unwrap();
        assert_eq!(options["accessKey"], "test-key");
        assert_eq!(options["subPath"], "/bob");
    }

    #[test]
    fn test_gpus_apply_to_worker_only() {
        let mut job = dual_builder();
        job.with_gpus(4, "nvidia.com/gpu");
        let manifest = job.to_manifest();

        let limits = worker_container(&manifest)
            .resources
            .as_ref()
            .unwrap()
            .limits
            .as_ref()
            .unwrap();
        assert_eq!(limits["nvidia.com/gpu"].0, "4");
        assert!(launcher_container(&manifest).resources.is_none());
    }

    #[test]
    fn test_zero_gpus_clears_request() {
        let mut job = dual_builder();
        job.with_gpus(0, "nvidia.com/gpu");
        let manifest = job.to_manifest();
        assert!(worker_container(&manifest).resources.is_none());
    }

    #[test]
    fn test_working_dir_applies_to_all_roles() {
        let mut job = dual_builder();
        job.with_working_dir("/workspace");
        let manifest = job.to_manifest();
        assert_eq!(launcher_container(&manifest).working_dir.as_deref(), Some("/workspace"));
        assert_eq!(worker_container(&manifest).working_dir.as_deref(), Some("/workspace"));
    }

    #[test]
    fn test_last_write_wins() {
        let mut job = dual_builder();
        job.with_image("first").with_image("second");
        job.with_working_dir("/a").with_working_dir("/b");
        let manifest = job.to_manifest();
        assert_eq!(worker_container(&manifest).image.as_deref(), Some("second"));
        assert_eq!(worker_container(&manifest).working_dir.as_deref(), Some("/b"));
    }

    #[test]
    fn test_yaml_round_trip_matches_manifest() {
        let mut job = dual_builder();
        job.with_image("img")
            .with_command(["train.py"])
            .with_replicas(2)
            .unwrap();
        job.with_volume("/data", "myctr/sub", "k").unwrap();

        let yaml = job.to_yaml().unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        let expected = serde_yaml::to_value(job.to_manifest()).unwrap();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_yaml_has_no_anchors() {
        // Launcher and worker share identical volume definitions; each must
        // still serialize as an independent block.
        let mut job = dual_builder();
        job.with_volume("/data", "myctr/sub", "k").unwrap();
        let yaml = job.to_yaml().unwrap();
        assert!(!yaml.contains('&'));
        assert!(!yaml.contains('*'));
        assert_eq!(yaml.matches("driver: v3io/fuse").count(), 2);
    }

    #[tokio::test]
    async fn test_delete_before_submit_fails() {
        let mut job = dual_builder();
        assert!(matches!(job.delete().await, Err(Error::NotBound)));
    }
}
