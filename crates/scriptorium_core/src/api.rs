//! Response envelopes for the request layer.
//!
//! # Responsibility
//! - Map service results into stable, serializable camelCase envelopes.
//! - Never let an operation failure escape as anything but an envelope.
//!
//! # Invariants
//! - `success = false` always carries a human-readable `error`.
//! - Optional fields are omitted from JSON when absent.

use crate::index::backlinks::Backlink;
use crate::model::record::EntityId;
use crate::namespace::Namespace;
use crate::service::error::{ErrorKind, VaultError, VaultResult};
use crate::service::tree_service::DeleteFolderOutcome;
use serde::Serialize;

/// One backlink row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacklinkItem {
    pub id: EntityId,
    pub name: String,
}

impl From<Backlink> for BacklinkItem {
    fn from(value: Backlink) -> Self {
        Self {
            id: value.id,
            name: value.name,
        }
    }
}

/// Generic action envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl ActionResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            error_kind: None,
        }
    }

    pub fn failure(err: &VaultError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
        }
    }

    pub fn from_result<T>(result: &VaultResult<T>) -> Self {
        match result {
            Ok(_) => Self::ok(),
            Err(err) => Self::failure(err),
        }
    }
}

/// Folder delete envelope.
///
/// A refused non-recursive delete reports `canRecurse = true` and the
/// subtree document count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFolderResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_recurse: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeleteFolderResponse {
    pub fn from_result(result: VaultResult<DeleteFolderOutcome>) -> Self {
        match result {
            Ok(DeleteFolderOutcome::Deleted { .. }) => Self {
                success: true,
                can_recurse: None,
                document_count: None,
                error: None,
            },
            Ok(DeleteFolderOutcome::NeedsConfirmation { document_count }) => Self {
                success: false,
                can_recurse: Some(true),
                document_count: Some(document_count),
                error: Some(format!(
                    "folder is not empty; {document_count} document(s) would be deleted"
                )),
            },
            Err(err) => Self {
                success: false,
                can_recurse: None,
                document_count: None,
                error: Some(err.to_string()),
            },
        }
    }
}

/// Folder copy envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyFolderResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_folder_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CopyFolderResponse {
    pub fn from_result(result: VaultResult<EntityId>) -> Self {
        match result {
            Ok(new_folder_id) => Self {
                success: true,
                new_folder_id: Some(new_folder_id),
                error: None,
            },
            Err(err) => Self {
                success: false,
                new_folder_id: None,
                error: Some(err.to_string()),
            },
        }
    }
}

/// Link rewrite envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelinkResponse {
    pub success: bool,
    pub updated: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RelinkResponse {
    pub fn from_result(result: VaultResult<usize>) -> Self {
        match result {
            Ok(updated) => Self {
                success: true,
                updated,
                error: None,
            },
            Err(err) => Self {
                success: false,
                updated: 0,
                error: Some(err.to_string()),
            },
        }
    }
}

/// `deleteFolder(id, {recursive})`.
pub fn delete_folder(namespace: &Namespace, id: &str, recursive: bool) -> DeleteFolderResponse {
    DeleteFolderResponse::from_result(namespace.tree().delete_folder(id, recursive))
}

/// `copyFolder(sourceId, targetParentId, newName?)`.
pub fn copy_folder(
    namespace: &Namespace,
    source_id: &str,
    target_parent_id: Option<&str>,
    new_name: Option<&str>,
) -> CopyFolderResponse {
    CopyFolderResponse::from_result(namespace.tree().copy_folder(
        source_id,
        target_parent_id,
        new_name,
    ))
}

/// `updateLinks(oldName, newName)`.
pub fn update_links(namespace: &Namespace, old_name: &str, new_name: &str) -> RelinkResponse {
    RelinkResponse::from_result(namespace.documents().update_links(old_name, new_name))
}

/// Rename followed by relinking; `updated` counts rewritten documents.
pub fn rename_and_relink(namespace: &Namespace, id: &str, new_name: &str) -> RelinkResponse {
    RelinkResponse::from_result(
        namespace
            .documents()
            .rename_and_relink(id, new_name)
            .map(|outcome| outcome.relinked),
    )
}

/// `backlinksOf(id)`.
pub fn backlinks_of(namespace: &Namespace, id: &str) -> VaultResult<Vec<BacklinkItem>> {
    Ok(namespace
        .documents()
        .backlinks_of(id)?
        .into_iter()
        .map(BacklinkItem::from)
        .collect())
}
