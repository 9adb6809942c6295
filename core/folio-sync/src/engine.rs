//! Mutation engine: one stateless handler per operation.
//!
//! Every handler follows the same shape: validate the payload, read the
//! entities needed to compute the new state, write all affected entities,
//! then broadcast one event per distinct observable change in dependency
//! order. Shape and referential failures are logged and abort the handler
//! without a broadcast; the connection stays open. Storage failures abort
//! at the point of failure — earlier writes in the same handler are not
//! rolled back.

use crate::error::{EngineError, EngineResult};
use crate::locks::AggregateLocks;
use crate::now_ms;
use crate::protocol::{
    CascadeRemovedPayload, ClientRequest, ContentAddPayload, ContentAddedPayload, ContentArgs,
    ContentInsertPayload, ContentInsertedPayload, ContentMergePayload, ContentPreview,
    ContentRemovePayload, ContentRemovedPayload, ContentUpdatePayload, ContentUpdatedPayload,
    FolderAddPayload, FolderGetPayload, FolderPreviewPayload, FolderPreviewResult,
    FolderUpdatePayload, PageAddPayload, PageArgs, PageInsertPayload, PageInsertedPayload,
    PageMergePayload, PagePreview, PageRemovePayload, PageUpdatePayload, PageUpdatedPayload,
    ServerEvent,
};
use crate::topics::{ConnectionId, Topic, TopicRegistry, FOLDERS_TOPIC};
use folio_storage::EntityStore;
use folio_types::{
    id_list, Content, EntityId, Folder, Page, SubscriberId, Subscription, MAX_CONTENT_LEN,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// Characters of each content value kept in a folder preview row.
const PREVIEW_LEN: usize = 20;

/// Where a split inserts the new entity relative to its anchor.
#[derive(Debug, Clone, Copy)]
enum InsertPosition {
    Before,
    After,
}

/// Per-connection context handed to every handler.
#[derive(Debug, Clone)]
pub struct ConnectionCtx {
    /// Registry handle for this socket.
    pub conn_id: ConnectionId,
    /// Persistent identity, reused across reconnects.
    pub subscriber_id: SubscriberId,
    /// Outbound frame channel; the connection's writer task drains it.
    pub outbound: UnboundedSender<String>,
}

/// Dispatches client requests to per-operation handlers.
///
/// Owned by the composition root and shared across all connections; it
/// holds no per-connection state.
pub struct MutationEngine {
    store: Arc<EntityStore>,
    topics: Arc<TopicRegistry>,
    locks: AggregateLocks,
}

impl MutationEngine {
    /// Creates an engine over the shared store and topic registry.
    pub fn new(store: Arc<EntityStore>, topics: Arc<TopicRegistry>) -> Self {
        Self {
            store,
            topics,
            locks: AggregateLocks::new(),
        }
    }

    /// Handles one inbound request. Errors are logged here — a bad or
    /// failed mutation never takes the connection down.
    pub async fn handle(&self, ctx: &ConnectionCtx, request: ClientRequest) {
        let op = request.op_name();
        let result = self.dispatch(ctx, request).await;
        match result {
            Ok(()) => {}
            Err(EngineError::Validation(msg)) => {
                warn!(op, %msg, "rejected request");
            }
            Err(err) => {
                warn!(op, %err, "handler aborted");
            }
        }
    }

    async fn dispatch(&self, ctx: &ConnectionCtx, request: ClientRequest) -> EngineResult<()> {
        match request {
            ClientRequest::Subscribe(topic) => self.subscribe(ctx, topic),
            ClientRequest::Unsubscribe(topic) => self.unsubscribe(ctx, topic),
            ClientRequest::FoldersUpdate(ids) => self.folders_update(ctx, ids).await,
            ClientRequest::FolderPreview(p) => self.folder_preview(ctx, p),
            ClientRequest::FolderAdd(p) => self.folder_add(ctx, p).await,
            ClientRequest::FolderRemove(id) => self.folder_remove(ctx, id).await,
            ClientRequest::FolderRemoveCascade(id) => self.folder_remove_cascade(ctx, id).await,
            ClientRequest::FolderGet(p) => self.folder_get(ctx, p),
            ClientRequest::FolderUpdate(p) => self.folder_update(ctx, p).await,
            ClientRequest::PageAdd(p) => self.page_add(ctx, p).await,
            ClientRequest::PageRemove(p) => self.page_remove(ctx, p).await,
            ClientRequest::PageGet(id) => self.page_get(ctx, id),
            ClientRequest::PageUpdate(p) => self.page_update(ctx, p).await,
            ClientRequest::PageMerge(p) => self.page_merge(ctx, p).await,
            ClientRequest::PageInsertBefore(p) => {
                self.page_insert(ctx, p, InsertPosition::Before).await
            }
            ClientRequest::PageInsertAfter(p) => {
                self.page_insert(ctx, p, InsertPosition::After).await
            }
            ClientRequest::ContentAdd(p) => self.content_add(ctx, p).await,
            ClientRequest::ContentRemove(p) => self.content_remove(ctx, p).await,
            ClientRequest::ContentGet(id) => self.content_get(ctx, id),
            ClientRequest::ContentUpdate(p) => self.content_update(ctx, p).await,
            ClientRequest::ContentMerge(p) => self.content_merge(ctx, p).await,
            ClientRequest::ContentInsertBefore(p) => {
                self.content_insert(ctx, p, InsertPosition::Before).await
            }
            ClientRequest::ContentInsertAfter(p) => {
                self.content_insert(ctx, p, InsertPosition::After).await
            }
        }
    }

    // ── Delivery helpers ─────────────────────────────────────────

    /// Direct reply to the requesting connection only.
    fn reply(&self, ctx: &ConnectionCtx, event: &ServerEvent) -> EngineResult<()> {
        let frame = event.encode()?;
        if ctx.outbound.send(frame).is_err() {
            debug!(conn = ctx.conn_id, "reply dropped, connection gone");
        }
        Ok(())
    }

    /// Sender-first broadcast to a topic (the sender hears it twice when
    /// subscribed — receivers are idempotent to duplicates).
    fn broadcast(&self, ctx: &ConnectionCtx, topic: &str, event: &ServerEvent) -> EngineResult<()> {
        let frame = event.encode()?;
        self.topics.broadcast(&ctx.outbound, topic, &frame);
        Ok(())
    }

    // ── Subscriptions ────────────────────────────────────────────

    fn subscribe(&self, ctx: &ConnectionCtx, topic: Topic) -> EngineResult<()> {
        self.topics
            .subscribe(&topic.name(), ctx.conn_id, ctx.outbound.clone());

        // Only folder subscriptions are durable; the folders topic holds
        // connection-scoped state only.
        if let Topic::Folder(folder_id) = topic {
            // Grow the durable record idempotently and refresh its
            // timestamp.
            let mut sub = self
                .store
                .get_subscription(&ctx.subscriber_id)?
                .unwrap_or_else(|| Subscription::new(ctx.subscriber_id, now_ms()));
            sub.subscribe(folder_id);
            sub.touch(now_ms());
            self.store.put_subscription(&sub)?;
        }
        Ok(())
    }

    fn unsubscribe(&self, ctx: &ConnectionCtx, topic: Topic) -> EngineResult<()> {
        self.topics.unsubscribe(&topic.name(), ctx.conn_id);

        if let Topic::Folder(folder_id) = topic {
            if let Some(mut sub) = self.store.get_subscription(&ctx.subscriber_id)? {
                // Exact-token removal; ids that are substrings of other
                // ids must never corrupt unrelated entries.
                sub.unsubscribe(&folder_id);
                sub.touch(now_ms());
                self.store.put_subscription(&sub)?;
            }
        }
        Ok(())
    }

    // ── Root index ───────────────────────────────────────────────

    async fn folders_update(&self, ctx: &ConnectionCtx, ids: Vec<EntityId>) -> EngineResult<()> {
        let _root = self.locks.acquire_root().await;
        // Client-supplied replacement lists are sanitized before they
        // become the new ordering: duplicates collapse, unknown ids drop.
        let folder_ids: Vec<EntityId> = self
            .store
            .folders_by_ids(&dedupe(ids))?
            .into_iter()
            .map(|folder| folder.id)
            .collect();
        self.store.put_root_index(&folio_types::RootIndex {
            folder_ids: folder_ids.clone(),
        })?;
        self.broadcast(ctx, FOLDERS_TOPIC, &ServerEvent::UpdateFolders(folder_ids))
    }

    // ── Folders ──────────────────────────────────────────────────

    fn folder_preview(&self, ctx: &ConnectionCtx, p: FolderPreviewPayload) -> EngineResult<()> {
        let mut summary = BTreeMap::new();
        for page in self.store.pages_by_ids(&p.page_ids)? {
            let contents = self
                .store
                .contents_by_ids(&page.content)?
                .into_iter()
                .map(|content| ContentPreview {
                    id: content.id,
                    value: truncate_preview(&content.value),
                })
                .collect();
            summary.insert(
                page.id,
                PagePreview {
                    name: page.name.unwrap_or_default(),
                    contents,
                },
            );
        }
        self.reply(
            ctx,
            &ServerEvent::PreviewFolder(FolderPreviewResult {
                id: p.id,
                name: p.name,
                page_ids: p.page_ids,
                summary,
            }),
        )
    }

    async fn folder_add(&self, ctx: &ConnectionCtx, p: FolderAddPayload) -> EngineResult<()> {
        let _root = self.locks.acquire_root().await;
        let folder = Folder::new(p.name);
        self.store.put_folder(&folder)?;

        let mut index = self.store.root_index()?;
        if !index.folder_ids.contains(&folder.id) {
            index.folder_ids.push(folder.id);
            self.store.put_root_index(&index)?;
        }
        self.broadcast(ctx, FOLDERS_TOPIC, &ServerEvent::AddFolder(folder))
    }

    async fn folder_remove(&self, ctx: &ConnectionCtx, id: EntityId) -> EngineResult<()> {
        let _root = self.locks.acquire_root().await;
        let _folder = self.locks.acquire(id).await;

        if !self.store.delete_folder(&id)? {
            debug!(%id, "folder already removed");
        }
        let mut index = self.store.root_index()?;
        if id_list::remove(&mut index.folder_ids, &id) {
            self.store.put_root_index(&index)?;
        }
        self.broadcast(ctx, FOLDERS_TOPIC, &ServerEvent::RemoveFolder(id))
    }

    /// Deletes the folder, then its pages, then their content, and emits
    /// one combined event so subscribers can purge local state in one
    /// step.
    async fn folder_remove_cascade(&self, ctx: &ConnectionCtx, id: EntityId) -> EngineResult<()> {
        let _root = self.locks.acquire_root().await;
        let _folder = self.locks.acquire(id).await;

        let Some(folder) = self.store.get_folder(&id)? else {
            return Err(EngineError::validation(format!("unknown folder: {id}")));
        };
        let page_ids = folder.page_ids.clone();
        let content_ids: Vec<EntityId> = self
            .store
            .pages_by_ids(&page_ids)?
            .into_iter()
            .flat_map(|page| page.content)
            .collect();

        self.store.delete_folder(&id)?;
        for page_id in &page_ids {
            self.store.delete_page(page_id)?;
        }
        for content_id in &content_ids {
            self.store.delete_content(content_id)?;
        }
        let mut index = self.store.root_index()?;
        if id_list::remove(&mut index.folder_ids, &id) {
            self.store.put_root_index(&index)?;
        }

        self.broadcast(
            ctx,
            FOLDERS_TOPIC,
            &ServerEvent::RemoveFolderCascade(CascadeRemovedPayload {
                id,
                page_ids,
                content_ids,
            }),
        )
    }

    fn folder_get(&self, ctx: &ConnectionCtx, p: FolderGetPayload) -> EngineResult<()> {
        let Some(folder) = self.store.find_folder_by_name(&p.name)? else {
            return Err(EngineError::validation(format!(
                "unknown folder name: {}",
                p.name
            )));
        };
        self.reply(ctx, &ServerEvent::GetFolder(folder))
    }

    async fn folder_update(&self, ctx: &ConnectionCtx, p: FolderUpdatePayload) -> EngineResult<()> {
        if p.name.is_none() && p.page_ids.is_none() {
            return Err(EngineError::validation("folder_update with empty args"));
        }
        let _folder_lock = self.locks.acquire(p.id).await;

        let Some(mut folder) = self.store.get_folder(&p.id)? else {
            return Err(EngineError::validation(format!("unknown folder: {}", p.id)));
        };
        if let Some(name) = &p.name {
            folder.name = Some(name.clone());
        }
        // Replacement page lists are sanitized like the root index:
        // duplicates collapse, unknown ids drop.
        let page_ids = match p.page_ids {
            Some(page_ids) => {
                folder.page_ids = self
                    .store
                    .pages_by_ids(&dedupe(page_ids))?
                    .into_iter()
                    .map(|page| page.id)
                    .collect();
                Some(folder.page_ids.clone())
            }
            None => None,
        };
        self.store.put_folder(&folder)?;
        self.broadcast(
            ctx,
            FOLDERS_TOPIC,
            &ServerEvent::UpdateFolder(FolderUpdatePayload {
                id: folder.id,
                name: p.name,
                page_ids,
            }),
        )
    }

    // ── Pages ────────────────────────────────────────────────────

    async fn page_add(&self, ctx: &ConnectionCtx, p: PageAddPayload) -> EngineResult<()> {
        let topic = p.folder_id.to_string();
        if !self.topics.is_subscribed(&topic, ctx.conn_id) {
            self.topics
                .subscribe(&topic, ctx.conn_id, ctx.outbound.clone());
        }
        let _folder_lock = self.locks.acquire(p.folder_id).await;

        let Some(mut folder) = self.store.get_folder(&p.folder_id)? else {
            return Err(EngineError::validation(format!(
                "unknown folder: {}",
                p.folder_id
            )));
        };
        let page = Page::new(p.name);
        self.store.put_page(&page)?;
        folder.page_ids.push(page.id);
        self.store.put_folder(&folder)?;

        self.broadcast(ctx, &topic, &ServerEvent::AddPage(page))
    }

    async fn page_remove(&self, ctx: &ConnectionCtx, p: PageRemovePayload) -> EngineResult<()> {
        let _folder_lock = self.locks.acquire(p.folder_id).await;

        if !self.store.delete_page(&p.page_id)? {
            debug!(id = %p.page_id, "page already removed");
        }
        if let Some(mut folder) = self.store.get_folder(&p.folder_id)? {
            if id_list::remove(&mut folder.page_ids, &p.page_id) {
                self.store.put_folder(&folder)?;
            }
        }
        self.broadcast(
            ctx,
            &p.folder_id.to_string(),
            &ServerEvent::RemovePage(p.page_id),
        )
    }

    fn page_get(&self, ctx: &ConnectionCtx, id: EntityId) -> EngineResult<()> {
        let Some(page) = self.store.get_page(&id)? else {
            return Err(EngineError::validation(format!("unknown page: {id}")));
        };
        self.reply(ctx, &ServerEvent::GetPage(page))
    }

    async fn page_update(&self, ctx: &ConnectionCtx, p: PageUpdatePayload) -> EngineResult<()> {
        if p.args.name.is_none() && p.args.content.is_none() {
            return Err(EngineError::validation("page_update with empty args"));
        }
        let _folder_lock = self.locks.acquire(p.folder_id).await;

        let Some(mut page) = self.store.get_page(&p.page_id)? else {
            return Err(EngineError::validation(format!(
                "unknown page: {}",
                p.page_id
            )));
        };
        if let Some(name) = &p.args.name {
            page.name = Some(name.clone());
        }
        // Replacement content lists are sanitized like the root index:
        // duplicates collapse, unknown ids drop.
        let content = match p.args.content {
            Some(content) => {
                page.content = self
                    .store
                    .contents_by_ids(&dedupe(content))?
                    .into_iter()
                    .map(|content| content.id)
                    .collect();
                Some(page.content.clone())
            }
            None => None,
        };
        self.store.put_page(&page)?;

        self.broadcast(
            ctx,
            &p.folder_id.to_string(),
            &ServerEvent::UpdatePage(PageUpdatedPayload {
                page_id: p.page_id,
                args: PageArgs {
                    name: p.args.name,
                    content,
                },
            }),
        )
    }

    /// Merge-into-previous: the target page absorbs the source's name and
    /// content list, the source is removed from the folder and deleted.
    async fn page_merge(&self, ctx: &ConnectionCtx, p: PageMergePayload) -> EngineResult<()> {
        let _folder_lock = self.locks.acquire(p.folder_id).await;

        let Some(mut target) = self.store.get_page(&p.target_id)? else {
            return Err(EngineError::validation(format!(
                "unknown merge target: {}",
                p.target_id
            )));
        };
        target.name = match (target.name.take(), p.args.name) {
            (Some(t), Some(s)) => Some(format!("{t} {s}")),
            (Some(t), None) => Some(t),
            (None, s) => s,
        };
        target.content.extend(p.args.content.iter().copied());
        self.store.put_page(&target)?;

        if let Some(mut folder) = self.store.get_folder(&p.folder_id)? {
            if id_list::remove(&mut folder.page_ids, &p.source_id) {
                self.store.put_folder(&folder)?;
            }
        }
        if !self.store.delete_page(&p.source_id)? {
            debug!(id = %p.source_id, "merge source already removed");
        }

        let topic = p.folder_id.to_string();
        self.broadcast(
            ctx,
            &topic,
            &ServerEvent::UpdatePage(PageUpdatedPayload {
                page_id: p.target_id,
                args: PageArgs {
                    name: target.name.clone(),
                    content: Some(target.content.clone()),
                },
            }),
        )?;
        self.broadcast(ctx, &topic, &ServerEvent::RemovePage(p.source_id))
    }

    /// Split: creates a page from `args`, splices it next to the anchor,
    /// and renames the anchor to its truncated name. The anchor update is
    /// broadcast before the insertion so receivers never see the new id
    /// outside a list that contains it.
    async fn page_insert(
        &self,
        ctx: &ConnectionCtx,
        p: PageInsertPayload,
        position: InsertPosition,
    ) -> EngineResult<()> {
        let _folder_lock = self.locks.acquire(p.folder_id).await;

        let Some(mut folder) = self.store.get_folder(&p.folder_id)? else {
            return Err(EngineError::validation(format!(
                "unknown folder: {}",
                p.folder_id
            )));
        };
        if !folder.page_ids.contains(&p.page_id) {
            return Err(EngineError::validation(format!(
                "insert anchor {} not in folder {}",
                p.page_id, p.folder_id
            )));
        }

        let page = Page {
            id: EntityId::new(),
            name: p.args.name,
            content: p.args.content,
        };
        self.store.put_page(&page)?;

        let spliced = match position {
            InsertPosition::Before => id_list::insert_before(&mut folder.page_ids, &p.page_id, page.id),
            InsertPosition::After => id_list::insert_after(&mut folder.page_ids, &p.page_id, page.id),
        };
        debug_assert!(spliced, "anchor presence checked above");
        self.store.put_folder(&folder)?;

        if let Some(mut anchor) = self.store.get_page(&p.page_id)? {
            anchor.name = Some(p.update_name.clone());
            self.store.put_page(&anchor)?;
        }

        let topic = p.folder_id.to_string();
        self.broadcast(
            ctx,
            &topic,
            &ServerEvent::UpdatePage(PageUpdatedPayload {
                page_id: p.page_id,
                args: PageArgs {
                    name: Some(p.update_name),
                    content: None,
                },
            }),
        )?;
        self.broadcast(
            ctx,
            &topic,
            &ServerEvent::InsertPage(PageInsertedPayload {
                page_ids: folder.page_ids,
                args: page,
            }),
        )
    }

    // ── Content fragments ────────────────────────────────────────

    async fn content_add(&self, ctx: &ConnectionCtx, p: ContentAddPayload) -> EngineResult<()> {
        let value = p.args.value.unwrap_or_default();
        check_value_len(&value)?;
        let _folder_lock = self.locks.acquire(p.folder_id).await;

        let Some(mut page) = self.store.get_page(&p.page_id)? else {
            return Err(EngineError::validation(format!(
                "unknown page: {}",
                p.page_id
            )));
        };
        let content = Content::new(value, p.args.style.unwrap_or_default());
        self.store.put_content(&content)?;
        page.content.push(content.id);
        self.store.put_page(&page)?;

        self.broadcast(
            ctx,
            &p.folder_id.to_string(),
            &ServerEvent::AddContent(ContentAddedPayload {
                page_id: p.page_id,
                args: content,
            }),
        )
    }

    async fn content_remove(&self, ctx: &ConnectionCtx, p: ContentRemovePayload) -> EngineResult<()> {
        let _folder_lock = self.locks.acquire(p.folder_id).await;

        if !self.store.delete_content(&p.content_id)? {
            debug!(id = %p.content_id, "content already removed");
        }
        if let Some(mut page) = self.store.get_page(&p.page_id)? {
            if id_list::remove(&mut page.content, &p.content_id) {
                self.store.put_page(&page)?;
            }
        }
        self.broadcast(
            ctx,
            &p.folder_id.to_string(),
            &ServerEvent::RemoveContent(ContentRemovedPayload {
                page_id: p.page_id,
                content_id: p.content_id,
            }),
        )
    }

    fn content_get(&self, ctx: &ConnectionCtx, id: EntityId) -> EngineResult<()> {
        let Some(content) = self.store.get_content(&id)? else {
            return Err(EngineError::validation(format!("unknown content: {id}")));
        };
        self.reply(ctx, &ServerEvent::GetContent(content))
    }

    async fn content_update(&self, ctx: &ConnectionCtx, p: ContentUpdatePayload) -> EngineResult<()> {
        if p.args.value.is_none() && p.args.style.is_none() {
            return Err(EngineError::validation("content_update with empty args"));
        }
        if let Some(value) = &p.args.value {
            check_value_len(value)?;
        }
        let _folder_lock = self.locks.acquire(p.folder_id).await;

        let Some(mut content) = self.store.get_content(&p.content_id)? else {
            return Err(EngineError::validation(format!(
                "unknown content: {}",
                p.content_id
            )));
        };
        if let Some(value) = &p.args.value {
            content.value = value.clone();
        }
        if let Some(style) = p.args.style {
            content.style = style;
        }
        self.store.put_content(&content)?;

        self.broadcast(
            ctx,
            &p.folder_id.to_string(),
            &ServerEvent::UpdateContent(ContentUpdatedPayload {
                page_id: p.page_id,
                content_id: p.content_id,
                args: p.args,
            }),
        )
    }

    /// Merge-into-previous: the target absorbs the source's leftover text
    /// (joined with a single space), the source leaves the page list and
    /// is deleted. Target update is broadcast before the removal.
    async fn content_merge(&self, ctx: &ConnectionCtx, p: ContentMergePayload) -> EngineResult<()> {
        let _folder_lock = self.locks.acquire(p.folder_id).await;

        let Some(mut target) = self.store.get_content(&p.target_id)? else {
            return Err(EngineError::validation(format!(
                "unknown merge target: {}",
                p.target_id
            )));
        };
        target.value = if target.value.is_empty() {
            p.args.value
        } else {
            format!("{} {}", target.value, p.args.value)
        };
        self.store.put_content(&target)?;

        if let Some(mut page) = self.store.get_page(&p.page_id)? {
            if id_list::remove(&mut page.content, &p.source_id) {
                self.store.put_page(&page)?;
            }
        }
        if !self.store.delete_content(&p.source_id)? {
            debug!(id = %p.source_id, "merge source already removed");
        }

        let topic = p.folder_id.to_string();
        self.broadcast(
            ctx,
            &topic,
            &ServerEvent::UpdateContent(ContentUpdatedPayload {
                page_id: p.page_id,
                content_id: p.target_id,
                args: ContentArgs {
                    value: Some(target.value.clone()),
                    style: Some(target.style),
                },
            }),
        )?;
        self.broadcast(
            ctx,
            &topic,
            &ServerEvent::RemoveContent(ContentRemovedPayload {
                page_id: p.page_id,
                content_id: p.source_id,
            }),
        )
    }

    /// Split at the cursor: creates a fragment holding the text after the
    /// cursor, splices it next to the anchor, truncates the anchor to the
    /// text before the cursor. Anchor update broadcasts first.
    async fn content_insert(
        &self,
        ctx: &ConnectionCtx,
        p: ContentInsertPayload,
        position: InsertPosition,
    ) -> EngineResult<()> {
        check_value_len(&p.args.value)?;
        check_value_len(&p.update_value)?;
        let _folder_lock = self.locks.acquire(p.folder_id).await;

        let Some(mut page) = self.store.get_page(&p.page_id)? else {
            return Err(EngineError::validation(format!(
                "unknown page: {}",
                p.page_id
            )));
        };
        if !page.content.contains(&p.content_id) {
            return Err(EngineError::validation(format!(
                "insert anchor {} not in page {}",
                p.content_id, p.page_id
            )));
        }

        let content = Content::new(p.args.value, p.args.style.unwrap_or_default());
        self.store.put_content(&content)?;

        let spliced = match position {
            InsertPosition::Before => {
                id_list::insert_before(&mut page.content, &p.content_id, content.id)
            }
            InsertPosition::After => {
                id_list::insert_after(&mut page.content, &p.content_id, content.id)
            }
        };
        debug_assert!(spliced, "anchor presence checked above");
        self.store.put_page(&page)?;

        if let Some(mut anchor) = self.store.get_content(&p.content_id)? {
            anchor.value = p.update_value.clone();
            self.store.put_content(&anchor)?;
        }

        let topic = p.folder_id.to_string();
        self.broadcast(
            ctx,
            &topic,
            &ServerEvent::UpdateContent(ContentUpdatedPayload {
                page_id: p.page_id,
                content_id: p.content_id,
                args: ContentArgs {
                    value: Some(p.update_value),
                    style: None,
                },
            }),
        )?;
        self.broadcast(
            ctx,
            &topic,
            &ServerEvent::InsertContent(ContentInsertedPayload {
                page_id: p.page_id,
                content_ids: page.content,
                args: content,
            }),
        )
    }
}

/// Collapses duplicates, first occurrence wins. Replacement lists also
/// pass an existence filter at the call sites, so persisted lists hold
/// unique, known ids only.
fn dedupe(ids: Vec<EntityId>) -> Vec<EntityId> {
    let mut seen = BTreeSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

fn check_value_len(value: &str) -> EngineResult<()> {
    if value.chars().count() > MAX_CONTENT_LEN {
        return Err(EngineError::validation(format!(
            "content value exceeds {MAX_CONTENT_LEN} characters"
        )));
    }
    Ok(())
}

/// Trims and truncates a content value for the delete-confirmation
/// preview, marking truncation with an ellipsis.
fn truncate_preview(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.chars().count() > PREVIEW_LEN {
        let mut out: String = trimmed.chars().take(PREVIEW_LEN).collect();
        out.push_str("...");
        out
    } else {
        trimmed.to_string()
    }
}
