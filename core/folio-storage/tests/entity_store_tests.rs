use folio_storage::EntityStore;
use folio_types::{Content, ContentStyle, EntityId, Folder, Page, RootIndex, SubscriberId, Subscription};
use pretty_assertions::assert_eq;

fn store() -> EntityStore {
    EntityStore::open_in_memory().unwrap()
}

// ── Folders ──────────────────────────────────────────────────────

#[test]
fn folder_put_get_roundtrip() {
    let store = store();
    let mut folder = Folder::new(Some("work".into()));
    folder.page_ids = vec![EntityId::new(), EntityId::new()];

    store.put_folder(&folder).unwrap();
    let loaded = store.get_folder(&folder.id).unwrap().unwrap();
    assert_eq!(loaded, folder);
}

#[test]
fn folder_get_absent_is_none() {
    let store = store();
    assert!(store.get_folder(&EntityId::new()).unwrap().is_none());
}

#[test]
fn folder_put_replaces() {
    let store = store();
    let mut folder = Folder::new(Some("before".into()));
    store.put_folder(&folder).unwrap();

    folder.name = Some("after".into());
    folder.page_ids.push(EntityId::new());
    store.put_folder(&folder).unwrap();

    let loaded = store.get_folder(&folder.id).unwrap().unwrap();
    assert_eq!(loaded.name.as_deref(), Some("after"));
    assert_eq!(loaded.page_ids.len(), 1);
}

#[test]
fn folder_delete_twice_reports_absence() {
    let store = store();
    let folder = Folder::new(None);
    store.put_folder(&folder).unwrap();

    assert!(store.delete_folder(&folder.id).unwrap());
    assert!(!store.delete_folder(&folder.id).unwrap());
}

#[test]
fn find_folder_by_name() {
    let store = store();
    let folder = Folder::new(Some("notes".into()));
    store.put_folder(&folder).unwrap();

    let found = store.find_folder_by_name("notes").unwrap().unwrap();
    assert_eq!(found.id, folder.id);
    assert!(store.find_folder_by_name("missing").unwrap().is_none());
}

#[test]
fn multi_get_preserves_order_and_skips_absent() {
    let store = store();
    let a = Folder::new(Some("a".into()));
    let b = Folder::new(Some("b".into()));
    store.put_folder(&a).unwrap();
    store.put_folder(&b).unwrap();

    let missing = EntityId::new();
    let loaded = store.folders_by_ids(&[b.id, missing, a.id]).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].id, b.id);
    assert_eq!(loaded[1].id, a.id);
}

// ── Pages and content ────────────────────────────────────────────

#[test]
fn page_roundtrip_with_content_list() {
    let store = store();
    let mut page = Page::new(Some("todo".into()));
    page.content = vec![EntityId::new(), EntityId::new(), EntityId::new()];

    store.put_page(&page).unwrap();
    assert_eq!(store.get_page(&page.id).unwrap().unwrap(), page);
}

#[test]
fn page_with_no_name_roundtrips() {
    let store = store();
    let page = Page::new(None);
    store.put_page(&page).unwrap();
    assert_eq!(store.get_page(&page.id).unwrap().unwrap().name, None);
}

#[test]
fn content_roundtrip_preserves_style() {
    let store = store();
    let content = Content::new("buy milk", ContentStyle::Heading2);
    store.put_content(&content).unwrap();

    let loaded = store.get_content(&content.id).unwrap().unwrap();
    assert_eq!(loaded.value, "buy milk");
    assert_eq!(loaded.style, ContentStyle::Heading2);
}

#[test]
fn contents_multi_get_in_input_order() {
    let store = store();
    let a = Content::new("a", ContentStyle::Default);
    let b = Content::new("b", ContentStyle::Bold);
    store.put_content(&a).unwrap();
    store.put_content(&b).unwrap();

    let loaded = store.contents_by_ids(&[b.id, a.id]).unwrap();
    assert_eq!(loaded[0].value, "b");
    assert_eq!(loaded[1].value, "a");
}

// ── Root index ───────────────────────────────────────────────────

#[test]
fn root_index_created_lazily() {
    let store = store();
    let index = store.root_index().unwrap();
    assert!(index.folder_ids.is_empty());
}

#[test]
fn root_index_roundtrip() {
    let store = store();
    let index = RootIndex {
        folder_ids: vec![EntityId::new(), EntityId::new()],
    };
    store.put_root_index(&index).unwrap();
    assert_eq!(store.root_index().unwrap(), index);
}

// ── Subscriptions ────────────────────────────────────────────────

#[test]
fn subscription_roundtrip() {
    let store = store();
    let mut sub = Subscription::new(SubscriberId::new(), 1_000);
    sub.subscribe(EntityId::new());
    sub.subscribe(EntityId::new());

    store.put_subscription(&sub).unwrap();
    assert_eq!(store.get_subscription(&sub.id).unwrap().unwrap(), sub);
}

#[test]
fn touch_subscription_updates_timestamp() {
    let store = store();
    let sub = Subscription::new(SubscriberId::new(), 1_000);
    store.put_subscription(&sub).unwrap();

    assert!(store.touch_subscription(&sub.id, 5_000).unwrap());
    let loaded = store.get_subscription(&sub.id).unwrap().unwrap();
    assert_eq!(loaded.last_active, 5_000);
}

#[test]
fn touch_missing_subscription_reports_absence() {
    let store = store();
    assert!(!store.touch_subscription(&SubscriberId::new(), 0).unwrap());
}

#[test]
fn sweep_removes_only_stale_records() {
    let store = store();
    let stale = Subscription::new(SubscriberId::new(), 100);
    let fresh = Subscription::new(SubscriberId::new(), 10_000);
    store.put_subscription(&stale).unwrap();
    store.put_subscription(&fresh).unwrap();

    let removed = store.sweep_subscriptions(5_000).unwrap();
    assert_eq!(removed, 1);
    assert!(store.get_subscription(&stale.id).unwrap().is_none());
    assert!(store.get_subscription(&fresh.id).unwrap().is_some());
}

// ── Durability across reopen ─────────────────────────────────────

#[test]
fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("folio.db");

    let folder = Folder::new(Some("persisted".into()));
    {
        let store = EntityStore::open(&path).unwrap();
        store.put_folder(&folder).unwrap();
    }

    let store = EntityStore::open(&path).unwrap();
    let loaded = store.get_folder(&folder.id).unwrap().unwrap();
    assert_eq!(loaded.name.as_deref(), Some("persisted"));
}
