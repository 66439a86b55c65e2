#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Editor lifecycle and in-block upload/link tests.

use std::sync::Arc;

use agora_composer::block::{BlockKind, RawBlock};
use agora_composer::editor::{BufferHost, EditorManager, EditorState};
use agora_composer::tools::ToolSettings;
use agora_composer::upload::LocalFile;
use agora_composer::{ComposerConfig, ComposerError, LifecyclePhase, UploadError};
use agora_test_utils::{
    GatedHost, MockLinkPreview, MockUploader, TestComposer, header_block, png_file,
};
use serde_json::json;

fn settings() -> ToolSettings {
    ToolSettings::new(
        &ComposerConfig::default(),
        Arc::new(MockUploader::new()),
        Arc::new(MockLinkPreview::new()),
    )
}

#[tokio::test]
async fn initialize_twice_keeps_one_surface() {
    let host = Arc::new(BufferHost::new());
    let editor = EditorManager::new(host.clone(), settings());

    editor.initialize().await.unwrap();
    editor.initialize().await.unwrap();

    assert_eq!(editor.state(), EditorState::Ready);
    assert_eq!(host.surfaces().len(), 1);
    assert_eq!(host.live_surfaces(), 1);
}

#[tokio::test]
async fn initialize_while_initializing_is_a_no_op() {
    let host = Arc::new(GatedHost::new());
    let editor = EditorManager::new(host.clone(), settings());

    let (first, second) = tokio::join!(editor.initialize(), async {
        host.entered().await;
        assert_eq!(editor.state(), EditorState::Initializing);
        let second = editor.initialize().await;
        host.release();
        second
    });

    first.unwrap();
    second.unwrap();
    assert_eq!(editor.state(), EditorState::Ready);
    assert_eq!(host.buffer().surfaces().len(), 1);
}

#[tokio::test]
async fn destroy_during_initialization_discards_the_late_surface() {
    let host = Arc::new(GatedHost::new());
    let editor = EditorManager::new(host.clone(), settings());

    let (init, ()) = tokio::join!(editor.initialize(), async {
        host.entered().await;
        editor.destroy();
        host.release();
    });

    assert!(matches!(init, Err(ComposerError::EditorDestroyed)));
    assert_eq!(editor.state(), EditorState::Destroyed);
    assert!(editor.handle().is_none());
    assert_eq!(host.buffer().surfaces().len(), 1);
    assert_eq!(host.buffer().live_surfaces(), 0);
}

#[tokio::test]
async fn destroy_is_a_no_op_when_absent_or_destroyed() {
    let host = Arc::new(BufferHost::new());
    let editor = EditorManager::new(host.clone(), settings());

    editor.destroy();
    assert_eq!(editor.state(), EditorState::Absent);

    editor.initialize().await.unwrap();
    editor.destroy();
    editor.destroy();
    assert_eq!(editor.state(), EditorState::Destroyed);
    assert_eq!(host.live_surfaces(), 0);
}

#[tokio::test]
async fn serialize_requires_ready() {
    let host = Arc::new(BufferHost::new());
    let editor = EditorManager::new(host.clone(), settings());
    assert!(matches!(
        editor.serialize().await,
        Err(ComposerError::EditorNotReady)
    ));

    editor.initialize().await.unwrap();
    host.surface()
        .unwrap()
        .load(vec![header_block("Hello World", 2)])
        .unwrap();
    let output = editor.serialize().await.unwrap();
    assert_eq!(output.blocks.len(), 1);
    assert!(output.version.starts_with("agora-buffer/"));

    editor.destroy();
    assert!(matches!(
        editor.serialize().await,
        Err(ComposerError::EditorNotReady)
    ));
}

#[tokio::test]
async fn missing_mount_point_is_fatal() {
    let host = Arc::new(BufferHost::with_holders(["sidebar"]));
    let editor = EditorManager::new(host.clone(), settings());

    let err = editor.initialize().await.unwrap_err();

    assert!(matches!(err, ComposerError::Initialization(_)));
    assert!(err.is_fatal());
    assert_eq!(editor.state(), EditorState::Absent);
    assert!(host.surfaces().is_empty());
}

#[tokio::test]
async fn remounting_is_idempotent_and_refocuses() {
    let t = TestComposer::new();

    assert!(t.composer.mount(LifecyclePhase::Ready).await.unwrap());
    assert!(t.composer.mount(LifecyclePhase::Ready).await.unwrap());

    assert_eq!(t.host.surfaces().len(), 1);
    assert_eq!(t.focus_count(), 2);
}

#[tokio::test]
async fn not_ready_phase_mounts_nothing() {
    let t = TestComposer::new();

    assert!(!t.composer.mount(LifecyclePhase::NotReady).await.unwrap());

    assert!(t.host.surfaces().is_empty());
    assert_eq!(t.focus_count(), 0);
    assert_eq!(t.composer.editor().state(), EditorState::Absent);
}

#[tokio::test]
async fn unmount_leaves_no_surface_behind() {
    let t = TestComposer::new();
    t.composer.mount(LifecyclePhase::Ready).await.unwrap();

    t.composer.unmount();
    t.composer.unmount();

    assert_eq!(t.host.live_surfaces(), 0);
    assert_eq!(t.composer.editor().state(), EditorState::Destroyed);
}

#[tokio::test]
async fn remount_after_unmount_gets_a_working_editor() {
    let t = TestComposer::new();
    t.composer.mount(LifecyclePhase::Ready).await.unwrap();
    t.composer.unmount();

    assert!(t.composer.mount(LifecyclePhase::Ready).await.unwrap());
    t.surface().load(vec![header_block("Hello World", 2)]).unwrap();

    assert_eq!(t.composer.editor().state(), EditorState::Ready);
    assert_eq!(t.host.live_surfaces(), 1);
    assert_eq!(t.focus_count(), 2);
    let output = t.composer.editor().serialize().await.unwrap();
    assert_eq!(output.blocks.len(), 1);
}

#[tokio::test]
async fn image_block_gets_uploaded_url() {
    let t = TestComposer::new();
    t.composer.mount(LifecyclePhase::Ready).await.unwrap();

    let id = t.surface().attach_image(png_file("cat.png")).await.unwrap();

    assert_eq!(t.uploader.uploads(), ["cat.png"]);
    let blocks = t.surface().blocks();
    assert_eq!(blocks[0].id.as_deref(), Some(id.as_str()));
    assert_eq!(blocks[0].data["file"]["url"], json!("https://utfs.io/f/cat.png"));

    let output = t.composer.editor().serialize().await.unwrap();
    let BlockKind::Image(image) = &output.blocks[0].kind else {
        panic!("expected image block");
    };
    assert_eq!(image.file.url, "https://utfs.io/f/cat.png");
}

#[tokio::test]
async fn failed_upload_stays_with_the_block() {
    let t = TestComposer::new();
    t.composer.mount(LifecyclePhase::Ready).await.unwrap();

    let err = t
        .surface()
        .attach_image(LocalFile::new("notes.txt", b"plain text".to_vec()))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<UploadError>(),
        Some(UploadError::UnsupportedType(_))
    ));
    assert!(t.surface().is_empty());
    assert!(t.uploader.uploads().is_empty());
    assert_eq!(t.notifier.count(), 0);
}

#[tokio::test]
async fn pasted_image_url_is_used_as_is() {
    let t = TestComposer::new();
    t.composer.mount(LifecyclePhase::Ready).await.unwrap();

    t.surface()
        .attach_image_url("https://cdn.example/a.png")
        .await
        .unwrap();
    assert!(t.surface().attach_image_url("ftp://cdn.example/a.png").await.is_err());

    assert_eq!(t.surface().len(), 1);
    assert!(t.uploader.uploads().is_empty());
}

#[tokio::test]
async fn link_block_carries_preview_metadata() {
    let t = TestComposer::new();
    t.composer.mount(LifecyclePhase::Ready).await.unwrap();

    t.surface().attach_link("https://example.com").await.unwrap();

    assert_eq!(
        t.links.fetched(),
        ["http://localhost:3000/api/link?url=https://example.com"]
    );
    let output = t.composer.editor().serialize().await.unwrap();
    let BlockKind::Link(link) = &output.blocks[0].kind else {
        panic!("expected link block");
    };
    assert_eq!(link.link, "https://example.com");
    assert_eq!(
        link.meta.title.as_deref(),
        Some("Preview of https://example.com")
    );
}

#[tokio::test]
async fn inline_link_autocomplete_uses_search_param() {
    let t = TestComposer::new();
    t.composer.mount(LifecyclePhase::Ready).await.unwrap();

    let tools = t.composer.editor().tools().unwrap();
    let suggestions = tools.link_search("rust").await;

    assert_eq!(suggestions[0].href, "https://example.com/rust");
    assert_eq!(t.links.searched(), ["search=rust"]);
}

#[tokio::test]
async fn inline_tools_cannot_form_blocks() {
    let t = TestComposer::new();
    t.composer.mount(LifecyclePhase::Ready).await.unwrap();

    let err = t
        .surface()
        .load(vec![RawBlock::new("inlineCode", json!({ "text": "x" }))])
        .unwrap_err();

    assert!(err.to_string().contains("inlineCode"));
    assert!(t.surface().is_empty());
}
