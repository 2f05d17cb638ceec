mod common;

use common::{session, session_with};
use folio_canvas::Canvas;
use folio_core::{FolioError, PageUpdate, SessionConfig, SessionEvent};
use folio_model::{Color, PageId, PageSize, PageSpec};
use folio_storage::Storage;
use std::fs;

#[test]
fn save_and_open_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("diagram.epz");

    let (mut session, _) = session(1);
    let first = session.page_ids()[0];
    let child = session.new_page(PageSpec::new("child", PageSize::new(320, 240)).with_parent(first)).unwrap();
    let overlay = session
        .new_page(
            PageSpec::new("overlay", PageSize::new(640, 480))
                .with_background_page(first)
                .with_background_color(Color::rgba(10, 20, 30, 255))
                .with_note("<i>review</i>"),
        )
        .unwrap();
    session.set_property("author", "Lan");
    session.edit_page(first, |canvas| canvas.append_content("<g id=\"first\"/>")).unwrap();
    session.edit_page(overlay, |canvas| canvas.append_content("<g id=\"overlay\"/>")).unwrap();

    session.save_as(&target).unwrap();
    assert!(!session.is_modified());
    assert_eq!(session.path(), Some(target.as_path()));
    assert!(session.drain_events().contains(&SessionEvent::DocumentSaved(target.clone())));

    let expected: Vec<_> = session.store().pages().map(|page| page.meta.clone()).collect();
    let contents: Vec<String> = session.page_ids().iter().map(|id| session.page_content(*id).unwrap()).collect();

    let (mut reopened, _) = common::session(1);
    reopened.open(&target).unwrap();

    assert_eq!(reopened.page_ids(), vec![first, child, overlay]);
    let loaded: Vec<_> = reopened.store().pages().map(|page| page.meta.clone()).collect();
    assert_eq!(loaded, expected);
    let reloaded: Vec<String> = reopened.page_ids().iter().map(|id| reopened.page_content(*id).unwrap()).collect();
    assert_eq!(reloaded, contents);

    assert_eq!(reopened.properties().get("author").map(String::as_str), Some("Lan"));
    assert_eq!(reopened.page(first).unwrap().children, vec![child]);
    assert_eq!(reopened.active_page(), Some(first));
    assert_eq!(reopened.document_name(), "diagram");
    assert!(!reopened.is_modified());
}

#[test]
fn saved_thumbnails_are_reused_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("thumbs.epz");

    let (mut session, rasterizer) = session(1);
    let page = session.page_ids()[0];
    session.edit_page(page, |canvas| canvas.append_content("<rect/>")).unwrap();
    session.save_as(&target).unwrap();
    assert_eq!(rasterizer.thumbnails_for(page), 1);
    assert!(!session.thumbnail_pending(page));

    let (mut reopened, reopened_rasterizer) = common::session(1);
    reopened.open(&target).unwrap();

    let thumb = reopened.page(page).unwrap().thumb_path.clone().unwrap();
    assert!(thumb.is_file());
    assert_eq!(reopened_rasterizer.thumbnails_for(page), 0);
}

#[test]
fn save_reuses_document_path() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("again.epz");

    let (mut session, _) = session(1);
    session.save_as(&target).unwrap();
    let page = session.page_ids()[0];
    session.update_page_properties(page, PageUpdate::default().name("Renamed")).unwrap();
    assert!(session.is_modified());

    assert_eq!(session.save().unwrap(), target);

    let (mut reopened, _) = common::session(1);
    reopened.open(&target).unwrap();
    assert_eq!(reopened.page(page).unwrap().meta.name, "Renamed");
}

#[test]
fn opening_a_missing_file_starts_fresh_and_forgets_it() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::with_root(dir.path().join("state"));
    let missing = dir.path().join("gone.epz");
    storage.add_recent(&missing, None).unwrap();

    let (mut session, _) = session_with(1, SessionConfig::default().with_storage(storage.clone()));
    let result = session.open(&missing);

    assert!(matches!(result, Err(FolioError::DocumentNotFound(_))));
    assert_eq!(session.store().len(), 1);
    assert!(session.active_page().is_some());
    assert!(storage.load_recent().unwrap().files().is_empty());
}

#[test]
fn corrupt_archive_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("broken.epz");
    fs::write(&broken, b"PK\x03\x04garbage").unwrap();

    let (mut session, _) = session(1);
    let result = session.open(&broken);

    assert!(result.is_err());
    assert_eq!(session.store().len(), 1);
    assert_eq!(session.path(), None);
}

#[test]
fn unknown_format_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let text = dir.path().join("notes.txt");
    fs::write(&text, "just text").unwrap();

    let (mut session, _) = session(1);
    let result = session.open(&text);

    assert!(matches!(result, Err(FolioError::UnsupportedFormat(_))));
    assert_eq!(session.store().len(), 1);
}

#[test]
fn legacy_document_is_imported_with_fresh_thumbnails() {
    let dir = tempfile::tempdir().unwrap();
    let legacy = dir.path().join("old.ep");
    let (a, b) = (PageId::new(), PageId::new());
    fs::write(
        &legacy,
        format!(
            "<?xml version=\"1.0\"?>\n<p:Document xmlns:p=\"http://www.evolus.vn/Namespace/Pencil\">\
             <p:Properties><p:Property name=\"title\">Legacy</p:Property></p:Properties><p:Pages>\
             <p:Page><p:Properties><p:Property name=\"id\">{a}</p:Property><p:Property name=\"name\">One</p:Property></p:Properties>\
             <p:Content><g id=\"one\"/></p:Content></p:Page>\
             <p:Page><p:Properties><p:Property name=\"id\">{b}</p:Property><p:Property name=\"background\">{a}</p:Property></p:Properties>\
             <p:Content><g id=\"two\"/></p:Content></p:Page>\
             </p:Pages></p:Document>"
        ),
    )
    .unwrap();

    let (mut session, rasterizer) = session(1);
    session.open(&legacy).unwrap();

    assert_eq!(session.page_ids(), vec![a, b]);
    assert_eq!(session.page(b).unwrap().meta.background_page_id, Some(a));
    assert_eq!(session.page_content(b).unwrap(), "<g id=\"two\"/>");
    assert_eq!(session.properties().get("title").map(String::as_str), Some("Legacy"));
    assert_eq!(rasterizer.thumbnails_for(a), 1);
    assert_eq!(rasterizer.thumbnails_for(b), 1);
    assert_eq!(session.path(), None);
    assert!(matches!(session.save(), Err(FolioError::InvalidState(_))));
}

#[test]
fn saving_records_recent_document_with_thumbnail() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::with_root(dir.path().join("state"));
    let target = dir.path().join("recent.epz");

    let (mut session, _) = session_with(1, SessionConfig::default().with_storage(storage.clone()));
    session.save_as(&target).unwrap();

    let recent = storage.load_recent().unwrap();
    assert_eq!(recent.files(), &[target.clone()]);
    let thumb = recent.thumbnail(&target).unwrap();
    assert!(thumb.starts_with(storage.thumb_cache_dir().unwrap()));
    assert!(thumb.is_file());
}

#[test]
fn archive_thumbnail_can_be_read_without_opening() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("preview.epz");

    let (mut session, _) = session(1);
    session.save_as(&target).unwrap();

    let output = dir.path().join("preview.png");
    assert!(folio_core::archive::read_archive_thumbnail(&target, &output).unwrap());
    assert!(fs::read_to_string(&output).unwrap().starts_with("raster:"));
}

#[test]
fn reference_assets_travel_with_the_document() {
    let dir = tempfile::tempdir().unwrap();
    let asset = dir.path().join("logo.svg");
    fs::write(&asset, "<svg/>").unwrap();
    let target = dir.path().join("refs.epz");

    let (mut session, _) = session(1);
    let id = session.copy_as_ref(&asset).unwrap();
    assert!(session.ref_id_to_url(&id).ends_with(&id));
    session.save_as(&target).unwrap();

    let (mut reopened, _) = common::session(1);
    reopened.open(&target).unwrap();
    assert_eq!(fs::read_to_string(reopened.workspace().ref_path(&id)).unwrap(), "<svg/>");
}
