//! Wire protocol: client requests and server events.
//!
//! Every frame is a JSON envelope `{ "type": <string>, "payload": … }`,
//! expressed here as tagged enums so malformed payloads surface as decode
//! errors instead of missing-field panics deep in a handler. The one
//! exception is the literal `"keep-alive"` text frame, which is not JSON
//! and is filtered before decoding.
//!
//! Server events mirror requests as past-tense/noun forms (`page_add` →
//! `add_page`). Receivers must be idempotent to duplicate delivery: the
//! originating connection hears its own broadcast twice (once directly,
//! once via its topic subscription).

use crate::topics::Topic;
use folio_types::{Content, ContentStyle, EntityId, Folder, Page, SubscriberId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Literal text frame accepted and ignored without JSON parsing.
pub const KEEP_ALIVE: &str = "keep-alive";

/// An inbound client request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientRequest {
    Subscribe(Topic),
    Unsubscribe(Topic),
    FoldersUpdate(Vec<EntityId>),
    FolderPreview(FolderPreviewPayload),
    FolderAdd(FolderAddPayload),
    FolderRemove(EntityId),
    FolderRemoveCascade(EntityId),
    FolderGet(FolderGetPayload),
    FolderUpdate(FolderUpdatePayload),
    PageAdd(PageAddPayload),
    PageRemove(PageRemovePayload),
    PageGet(EntityId),
    PageUpdate(PageUpdatePayload),
    PageMerge(PageMergePayload),
    PageInsertBefore(PageInsertPayload),
    PageInsertAfter(PageInsertPayload),
    ContentAdd(ContentAddPayload),
    ContentRemove(ContentRemovePayload),
    ContentGet(EntityId),
    ContentUpdate(ContentUpdatePayload),
    ContentMerge(ContentMergePayload),
    ContentInsertBefore(ContentInsertPayload),
    ContentInsertAfter(ContentInsertPayload),
}

impl ClientRequest {
    /// Decodes a text frame. Unknown `type` values and malformed payloads
    /// are protocol errors; the connection layer treats them as fatal.
    pub fn decode(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }

    /// The wire name of this operation, for logging.
    #[must_use]
    pub fn op_name(&self) -> &'static str {
        match self {
            Self::Subscribe(_) => "subscribe",
            Self::Unsubscribe(_) => "unsubscribe",
            Self::FoldersUpdate(_) => "folders_update",
            Self::FolderPreview(_) => "folder_preview",
            Self::FolderAdd(_) => "folder_add",
            Self::FolderRemove(_) => "folder_remove",
            Self::FolderRemoveCascade(_) => "folder_remove_cascade",
            Self::FolderGet(_) => "folder_get",
            Self::FolderUpdate(_) => "folder_update",
            Self::PageAdd(_) => "page_add",
            Self::PageRemove(_) => "page_remove",
            Self::PageGet(_) => "page_get",
            Self::PageUpdate(_) => "page_update",
            Self::PageMerge(_) => "page_merge",
            Self::PageInsertBefore(_) => "page_insert_before",
            Self::PageInsertAfter(_) => "page_insert_after",
            Self::ContentAdd(_) => "content_add",
            Self::ContentRemove(_) => "content_remove",
            Self::ContentGet(_) => "content_get",
            Self::ContentUpdate(_) => "content_update",
            Self::ContentMerge(_) => "content_merge",
            Self::ContentInsertBefore(_) => "content_insert_before",
            Self::ContentInsertAfter(_) => "content_insert_after",
        }
    }
}

// ── Request payloads ─────────────────────────────────────────────

/// Read-only preview of what a folder delete would destroy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderPreviewPayload {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub page_ids: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderAddPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Folder lookup is by display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderGetPayload {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderUpdatePayload {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_ids: Option<Vec<EntityId>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageAddPayload {
    pub folder_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRemovePayload {
    pub folder_id: EntityId,
    pub page_id: EntityId,
}

/// Partial page update; at least one field must be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<EntityId>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageUpdatePayload {
    pub folder_id: EntityId,
    pub page_id: EntityId,
    pub args: PageArgs,
}

/// Merge-into-previous for pages: `source` is deleted, `target` (the
/// previous page) absorbs its name and content list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMergePayload {
    pub folder_id: EntityId,
    pub source_id: EntityId,
    pub target_id: EntityId,
    pub args: PageMergeArgs,
}

/// The source page's data as the client last saw it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMergeArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub content: Vec<EntityId>,
}

/// Split at the cursor: the anchor page keeps `update_name`, the new page
/// is created from `args` and spliced next to the anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInsertPayload {
    pub folder_id: EntityId,
    pub page_id: EntityId,
    pub update_name: String,
    pub args: PageMergeArgs,
}

/// Partial content update; at least one field must be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<ContentStyle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentAddPayload {
    pub folder_id: EntityId,
    pub page_id: EntityId,
    #[serde(default)]
    pub args: ContentArgs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRemovePayload {
    pub folder_id: EntityId,
    pub page_id: EntityId,
    pub content_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentUpdatePayload {
    pub folder_id: EntityId,
    pub page_id: EntityId,
    pub content_id: EntityId,
    pub args: ContentArgs,
}

/// Merge-into-previous for content: `source` is deleted, `target` absorbs
/// the leftover text the client supplies in `args.value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMergePayload {
    pub folder_id: EntityId,
    pub page_id: EntityId,
    pub source_id: EntityId,
    pub target_id: EntityId,
    pub args: ContentMergeArgs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentMergeArgs {
    pub value: String,
}

/// Split at the cursor: the anchor fragment keeps `update_value` (text
/// before the cursor), the new fragment is created from `args` (text
/// after) and spliced next to the anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentInsertPayload {
    pub folder_id: EntityId,
    pub page_id: EntityId,
    pub content_id: EntityId,
    pub update_value: String,
    pub args: ContentInsertArgs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentInsertArgs {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<ContentStyle>,
}

// ── Server events ────────────────────────────────────────────────

/// An outbound server event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    /// First frame on every connection: the assigned subscriber id.
    #[serde(rename = "sub-id")]
    SubId(SubscriberId),
    UpdateFolders(Vec<EntityId>),
    AddFolder(Folder),
    RemoveFolder(EntityId),
    /// Combined cascade event: the folder id plus every descendant id, so
    /// subscribers can purge local state in one step.
    RemoveFolderCascade(CascadeRemovedPayload),
    GetFolder(Folder),
    UpdateFolder(FolderUpdatePayload),
    AddPage(Page),
    RemovePage(EntityId),
    GetPage(Page),
    UpdatePage(PageUpdatedPayload),
    InsertPage(PageInsertedPayload),
    AddContent(ContentAddedPayload),
    RemoveContent(ContentRemovedPayload),
    GetContent(Content),
    UpdateContent(ContentUpdatedPayload),
    InsertContent(ContentInsertedPayload),
    PreviewFolder(FolderPreviewResult),
}

impl ServerEvent {
    /// Encodes the event as a text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeRemovedPayload {
    pub id: EntityId,
    pub page_ids: Vec<EntityId>,
    pub content_ids: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageUpdatedPayload {
    pub page_id: EntityId,
    pub args: PageArgs,
}

/// Carries the full resulting page list: receivers never see the new id
/// without the list that contains it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInsertedPayload {
    pub page_ids: Vec<EntityId>,
    pub args: Page,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentAddedPayload {
    pub page_id: EntityId,
    pub args: Content,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRemovedPayload {
    pub page_id: EntityId,
    pub content_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentUpdatedPayload {
    pub page_id: EntityId,
    pub content_id: EntityId,
    pub args: ContentArgs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentInsertedPayload {
    pub page_id: EntityId,
    pub content_ids: Vec<EntityId>,
    pub args: Content,
}

/// Reply to `folder_preview`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderPreviewResult {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub page_ids: Vec<EntityId>,
    pub summary: BTreeMap<EntityId, PagePreview>,
}

/// One page's preview rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagePreview {
    pub name: String,
    pub contents: Vec<ContentPreview>,
}

/// A content fragment truncated for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPreview {
    pub id: EntityId,
    pub value: String,
}
