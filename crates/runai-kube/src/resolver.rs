//! Versioned resource resolution
//!
//! RunAI releases serve the same concept under different group/version
//! pairs. The resolver walks a descriptor's candidates in declared order and
//! returns the first successful response. When every candidate fails, only
//! the last candidate's error is returned.

use crate::catalog::{ResourceCatalog, ResourceCoordinate};
use crate::client::DynamicApi;
use crate::error::ClusterError;
use crate::render;
use kube::api::DynamicObject;

/// First-success resolver over a [`ResourceCatalog`]
pub struct VersionedResolver<'a, A: DynamicApi + ?Sized> {
    api: &'a A,
    catalog: &'a ResourceCatalog,
}

impl<'a, A: DynamicApi + ?Sized> VersionedResolver<'a, A> {
    pub fn new(api: &'a A, catalog: &'a ResourceCatalog) -> Self {
        Self { api, catalog }
    }

    /// Fetch a single object by logical resource name
    pub async fn get(
        &self,
        resource: &str,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject, ClusterError> {
        let candidates = self.candidates(resource)?;
        let mut last_err = None;

        for coord in candidates {
            match self.api.get_dynamic(coord, namespace, name).await {
                Ok(obj) => return Ok(obj),
                Err(e) => {
                    tracing::debug!("{} {} via {} failed: {}", resource, name, coord, e);
                    last_err = Some(e);
                }
            }
        }

        Err(unresolved(resource, last_err))
    }

    /// List objects by logical resource name
    pub async fn list(
        &self,
        resource: &str,
        namespace: Option<&str>,
        selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>, ClusterError> {
        let candidates = self.candidates(resource)?;
        let mut last_err = None;

        for coord in candidates {
            match self.api.list_dynamic(coord, namespace, selector).await {
                Ok(items) => return Ok(items),
                Err(e) => {
                    tracing::debug!("list {} via {} failed: {}", resource, coord, e);
                    last_err = Some(e);
                }
            }
        }

        Err(unresolved(resource, last_err))
    }

    /// [`Self::get`], rendered as a YAML manifest
    pub async fn get_manifest(
        &self,
        resource: &str,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<String, ClusterError> {
        let obj = self.get(resource, namespace, name).await?;
        render::to_yaml(&obj)
    }

    fn candidates(&self, resource: &str) -> Result<&'a [ResourceCoordinate], ClusterError> {
        match self.catalog.descriptor(resource) {
            Some(descriptor) if !descriptor.candidates.is_empty() => Ok(&descriptor.candidates),
            _ => Err(ClusterError::UnknownResource(resource.to_string())),
        }
    }
}

fn unresolved(resource: &str, last_err: Option<ClusterError>) -> ClusterError {
    match last_err {
        Some(source) => ClusterError::Unresolved {
            resource: resource.to_string(),
            source: Box::new(source),
        },
        None => ClusterError::UnknownResource(resource.to_string()),
    }
}
