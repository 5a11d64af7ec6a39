/// Default container image for launcher and worker pods.
pub const DEFAULT_IMAGE: &str = "iguaziodocker/horovod:0.1.1";

/// Resource key used for GPU limits unless the caller overrides it.
pub const GPU_RESOURCE_KEY: &str = "nvidia.com/gpu";

/// Name shared by the storage volume and its mounts.
pub const VOLUME_NAME: &str = "v3io";

/// FlexVolume driver for the shared storage plugin.
pub const FLEX_VOLUME_DRIVER: &str = "v3io/fuse";

/// Data container the default volume points at.
pub const DEFAULT_DATA_CONTAINER: &str = "users";

/// Working directory and mount path defaults inside every pod.
pub const DEFAULT_WORKING_DIR: &str = "/User";
pub const DEFAULT_MOUNT_PATH: &str = "/User";

/// Namespace jobs land in unless overridden.
pub const DEFAULT_NAMESPACE: &str = "default-tenant";

/// Fixed invocation prefix prepended to every worker command.
pub const LAUNCH_PREFIX: [&str; 2] = ["mpirun", "python"];

/// How the custom resource lays out its pod templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleLayout {
    /// One pod template, worker replica count at the job level.
    SingleRole,
    /// Distinct launcher and worker templates; the launcher always runs a
    /// single instance.
    DualRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Launcher,
    Worker,
}

/// One historical shape of the MPIJob custom resource.
///
/// All three live under the `kubeflow.org` group and differ in API version
/// and spec layout: `v1alpha1` carried a single pod template with a
/// job-level replica count, `v1alpha2` and `v1` split launcher and worker
/// into separate replica specs. Selected once at builder construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVariant {
    V1Alpha1,
    V1Alpha2,
    V1,
}

impl SchemaVariant {
    pub const GROUP: &'static str = "kubeflow.org";
    pub const KIND: &'static str = "MPIJob";
    pub const PLURAL: &'static str = "mpijobs";

    pub fn version(self) -> &'static str {
        match self {
            SchemaVariant::V1Alpha1 => "v1alpha1",
            SchemaVariant::V1Alpha2 => "v1alpha2",
            SchemaVariant::V1 => "v1",
        }
    }

    pub fn api_version(self) -> String {
        format!("{}/{}", Self::GROUP, self.version())
    }

    pub fn role_layout(self) -> RoleLayout {
        match self {
            SchemaVariant::V1Alpha1 => RoleLayout::SingleRole,
            SchemaVariant::V1Alpha2 | SchemaVariant::V1 => RoleLayout::DualRole,
        }
    }

    /// Roles present in this variant's layout. The single-role layout is
    /// modeled as a lone worker since that template carries the volume
    /// mount and GPU defaults.
    pub fn roles(self) -> &'static [Role] {
        match self.role_layout() {
            RoleLayout::SingleRole => &[Role::Worker],
            RoleLayout::DualRole => &[Role::Launcher, Role::Worker],
        }
    }

    /// Roles whose default template declares a resources block; GPU
    /// requests apply to exactly these.
    pub fn gpu_roles(self) -> &'static [Role] {
        &[Role::Worker]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_versions() {
        assert_eq!(SchemaVariant::V1Alpha1.api_version(), "kubeflow.org/v1alpha1");
        assert_eq!(SchemaVariant::V1Alpha2.api_version(), "kubeflow.org/v1alpha2");
        assert_eq!(SchemaVariant::V1.api_version(), "kubeflow.org/v1");
    }

    #[test]
    fn test_role_layouts() {
        assert_eq!(SchemaVariant::V1Alpha1.role_layout(), RoleLayout::SingleRole);
        assert_eq!(SchemaVariant::V1Alpha2.role_layout(), RoleLayout::DualRole);
        assert_eq!(SchemaVariant::V1.role_layout(), RoleLayout::DualRole);
        assert_eq!(SchemaVariant::V1Alpha1.roles(), &[Role::Worker]);
        assert_eq!(SchemaVariant::V1.roles(), &[Role::Launcher, Role::Worker]);
    }

    #[test]
    fn test_gpu_roles_exclude_launcher() {
        for variant in [SchemaVariant::V1Alpha1, SchemaVariant::V1Alpha2, SchemaVariant::V1] {
            assert!(!variant.gpu_roles().contains(&Role::Launcher));
            assert!(variant.gpu_roles().contains(&Role::Worker));
        }
    }
}
