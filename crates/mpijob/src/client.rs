use kube::{
    api::{Api, DeleteParams, DynamicObject, PostParams},
    discovery::ApiResource,
    Client,
};

use crate::manifest::MpiJobManifest;
use crate::schema::SchemaVariant;
use crate::Result;

/// Thin wrapper over the dynamic custom-objects API for MPIJob resources.
pub struct JobClient {
    client: Client,
}

impl JobClient {
    /// Connect using the default lookup (in-cluster config, then
    /// kubeconfig).
    pub async fn new() -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn jobs(&self, variant: SchemaVariant, namespace: &str) -> Api<DynamicObject> {
        let resource = ApiResource {
            group: SchemaVariant::GROUP.to_string(),
            version: variant.version().to_string(),
            api_version: variant.api_version(),
            kind: SchemaVariant::KIND.to_string(),
            plural: SchemaVariant::PLURAL.to_string(),
        };
        Api::namespaced_with(self.client.clone(), namespace, &resource)
    }

    pub async fn create(
        &self,
        variant: SchemaVariant,
        namespace: &str,
        manifest: &MpiJobManifest,
    ) -> Result<DynamicObject> {
        let object: DynamicObject = serde_json::from_value(serde_json::to_value(manifest)?)?;
        let created = self
            .jobs(variant, namespace)
            .create(&PostParams::default(), &object)
            .await?;
        Ok(created)
    }

    pub async fn delete(
        &self,
        variant: SchemaVariant,
        namespace: &str,
        name: &str,
    ) -> Result<()> {
        self.jobs(variant, namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }
}
