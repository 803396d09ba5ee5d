//! # Resource Locator
//!
//! Resolves prerequisite resources by their `Name` tag. Absence is an ordinary
//! result ([`Lookup::NotFound`]); only genuine remote failures are errors.

use crate::error::{NotFound, RemoteError};
use crate::remote::{InventoryApi, InventoryKind};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

/// Outcome of a tag lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(String),
    NotFound { kind: InventoryKind, tag: String },
}

impl Lookup {
    pub fn id(&self) -> Option<&str> {
        match self {
            Lookup::Found(id) => Some(id),
            Lookup::NotFound { .. } => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    /// Converts absence into a [`NotFound`] error for callers that cannot proceed
    /// without the resource.
    pub fn required(self) -> Result<String, NotFound> {
        match self {
            Lookup::Found(id) => Ok(id),
            Lookup::NotFound { kind, tag } => Err(NotFound { kind, tag }),
        }
    }
}

/// Tag-based lookups against an [`InventoryApi`].
///
/// Every lookup goes to the remote service. The one exception is the
/// instance-type listing, which is fetched once per locator and then shared.
pub struct ResourceLocator {
    inventory: Arc<dyn InventoryApi>,
    instance_types: OnceCell<Arc<BTreeSet<String>>>,
}

impl ResourceLocator {
    pub fn new(inventory: Arc<dyn InventoryApi>) -> Self {
        Self {
            inventory,
            instance_types: OnceCell::new(),
        }
    }

    /// Finds the `kind` item whose `Name` tag equals `tag_value`.
    ///
    /// When several match, the first one the service returned wins and the
    /// rest are ignored. Uniqueness is not enforced.
    #[instrument(skip(self))]
    pub async fn find_by_tag(
        &self,
        kind: InventoryKind,
        tag_value: &str,
    ) -> Result<Lookup, RemoteError> {
        let ids = self.inventory.find_ids_by_tag(kind, tag_value).await?;
        let mut ids = ids.into_iter();
        match ids.next() {
            Some(first) => {
                let ignored: Vec<String> = ids.collect();
                if !ignored.is_empty() {
                    warn!(
                        %kind,
                        tag = tag_value,
                        id = %first,
                        ?ignored,
                        "Ambiguous lookup, using first match"
                    );
                }
                debug!(%kind, tag = tag_value, id = %first, "Found");
                Ok(Lookup::Found(first))
            }
            None => {
                info!(%kind, tag = tag_value, "Not found");
                Ok(Lookup::NotFound {
                    kind,
                    tag: tag_value.to_string(),
                })
            }
        }
    }

    pub async fn find_vpc(&self, vpc_name: &str) -> Result<Lookup, RemoteError> {
        self.find_by_tag(InventoryKind::Vpc, vpc_name).await
    }

    /// Subnets are tagged `"{vpc_name}-{subnet_name}"`.
    pub async fn find_subnet(
        &self,
        vpc_name: &str,
        subnet_name: &str,
    ) -> Result<Lookup, RemoteError> {
        let tag = format!("{vpc_name}-{subnet_name}");
        self.find_by_tag(InventoryKind::Subnet, &tag).await
    }

    pub async fn find_security_group(&self, group_name: &str) -> Result<Lookup, RemoteError> {
        self.find_by_tag(InventoryKind::SecurityGroup, group_name).await
    }

    /// Every instance type available in the region, across all pages.
    ///
    /// Fetched at most once; concurrent first callers share a single fetch.
    /// A failed fetch is not cached.
    pub async fn instance_types(&self) -> Result<Arc<BTreeSet<String>>, RemoteError> {
        let types = self
            .instance_types
            .get_or_try_init(|| async {
                let mut all = BTreeSet::new();
                let mut next_token = None;
                let mut pages = 0usize;
                loop {
                    let page = self.inventory.list_instance_types(next_token).await?;
                    pages += 1;
                    for entry in page.instance_types {
                        all.extend(entry.split('|').map(str::to_string));
                    }
                    match page.next_token {
                        Some(token) => next_token = Some(token),
                        None => break,
                    }
                }
                info!(pages, count = all.len(), "Listed instance types");
                Ok::<_, RemoteError>(Arc::new(all))
            })
            .await?;
        Ok(Arc::clone(types))
    }

    pub async fn is_known_instance_type(&self, instance_type: &str) -> Result<bool, RemoteError> {
        Ok(self.instance_types().await?.contains(instance_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockInventory;

    #[tokio::test]
    async fn test_not_found_is_a_result_not_an_error() {
        let mut mock = MockInventory::new();
        mock.expect_find(InventoryKind::Vpc, "nonexistent")
            .return_ids(Vec::<String>::new());

        let locator = ResourceLocator::new(mock.api());
        let lookup = locator.find_vpc("nonexistent").await.unwrap();
        assert_eq!(
            lookup,
            Lookup::NotFound {
                kind: InventoryKind::Vpc,
                tag: "nonexistent".to_string()
            }
        );
        assert!(lookup.required().is_err());
        mock.verify();
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let mut mock = MockInventory::new();
        mock.expect_find(InventoryKind::SecurityGroup, "base-sg")
            .return_ids(["sg-1", "sg-2"]);

        let locator = ResourceLocator::new(mock.api());
        let lookup = locator.find_security_group("base-sg").await.unwrap();
        assert_eq!(lookup.id(), Some("sg-1"));
        mock.verify();
    }

    #[tokio::test]
    async fn test_subnet_tag_is_prefixed_with_vpc_name() {
        let mut mock = MockInventory::new();
        mock.expect_find(InventoryKind::Subnet, "dev-PublicWebSubnet1a")
            .return_ids(["subnet-7"]);

        let locator = ResourceLocator::new(mock.api());
        let id = locator
            .find_subnet("dev", "PublicWebSubnet1a")
            .await
            .unwrap()
            .required()
            .unwrap();
        assert_eq!(id, "subnet-7");
    }

    #[tokio::test]
    async fn test_remote_failure_propagates() {
        let mut mock = MockInventory::new();
        mock.expect_find(InventoryKind::Vpc, "dev")
            .return_err(RemoteError::call_failed("DescribeVpcs", "throttled"));

        let locator = ResourceLocator::new(mock.api());
        let err = locator.find_vpc("dev").await.unwrap_err();
        assert_eq!(err, RemoteError::call_failed("DescribeVpcs", "throttled"));
    }

    #[tokio::test]
    async fn test_instance_types_are_paged_once_and_cached() {
        let mut mock = MockInventory::new();
        mock.expect_instance_types(None)
            .return_page(["t2.small", "t3.micro|t3.nano"], Some("page-2"));
        mock.expect_instance_types(Some("page-2"))
            .return_page(["m5.large"], None);

        let locator = ResourceLocator::new(mock.api());
        let first = locator.instance_types().await.unwrap();
        assert_eq!(first.len(), 4);
        assert!(first.contains("t3.nano"));

        // Served from cache: the mock would panic on an unexpected third call.
        assert!(locator.is_known_instance_type("m5.large").await.unwrap());
        assert!(!locator.is_known_instance_type("x9.huge").await.unwrap());
        mock.verify();
    }
}
