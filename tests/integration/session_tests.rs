//! Navigation and persistence integration tests.
//!
//! Tests verify:
//! - Saved annotations load when a file opens
//! - Save is issued and completes before switching files
//! - A failed save leaves the session on the current file
//! - Unsaved edits survive navigating away and back
//! - Slice fetches go through the cache and filters never refetch

use landmark_annotator::{
    Annotation, Axis, Completion, DrawOutcome, ServiceError, SessionError, SuggestionState,
    Upsert,
};

use super::test_utils::{three_file_session, Call, PLAIN_LEVEL};

// =============================================================================
// Opening and navigation
// =============================================================================

#[tokio::test]
async fn test_open_loads_saved_annotations() {
    let (mut session, backend) = three_file_session();

    let nav = session.open().await.unwrap();

    assert_eq!(nav.filename, "a.nii.gz");
    assert_eq!(nav.annotation_count, 2);
    assert!(nav.draw.is_drawn());
    assert!(nav.suggestion.is_none());
    assert_eq!(session.annotations()[1], Annotation::new("L2", 6, 8, 4));
    assert!(session.is_file_annotated("a.nii.gz"));
    assert!(!session.is_file_annotated("b.nii.gz"));
    assert_eq!(backend.infer_calls().await, 0);
}

#[tokio::test]
async fn test_open_draws_middle_slice_scaled_to_region() {
    let (mut session, _backend) = three_file_session();
    session.open().await.unwrap();

    let display = session.display();
    assert_eq!(display.axis, Axis::Axial);
    assert_eq!(display.slice_index, 5);
    assert_eq!(display.scale_ratio, 2.0);

    let frame = session.frame().unwrap();
    assert_eq!((frame.raw_width, frame.raw_height), (20, 30));
    assert_eq!(frame.image.dimensions(), (40, 60));
    assert_eq!(frame.image.get_pixel(0, 0).0[0], PLAIN_LEVEL);
}

#[tokio::test]
async fn test_save_completes_before_switch() {
    let (mut session, backend) = three_file_session();
    session.open().await.unwrap();
    backend.clear_calls().await;

    session.next_file().await.unwrap().unwrap();

    let calls = backend.calls().await;
    let save = calls
        .iter()
        .position(|c| *c == Call::Save("a.nii.gz".into(), 2))
        .expect("current file saved");
    let info = calls
        .iter()
        .position(|c| *c == Call::Info("b.nii.gz".into()))
        .expect("next file metadata fetched");
    assert!(save < info);
    assert_eq!(session.current_file(), Some("b.nii.gz"));
}

#[tokio::test]
async fn test_switch_from_empty_file_skips_save() {
    let (mut session, backend) = three_file_session();
    session.open().await.unwrap();
    session.select_file(2).await.unwrap();
    backend.clear_calls().await;

    session.previous_file().await.unwrap().unwrap();

    let calls = backend.calls().await;
    assert!(!calls.iter().any(|c| matches!(c, Call::Save(..))));
    assert_eq!(session.current_file(), Some("b.nii.gz"));
}

#[tokio::test]
async fn test_failed_save_aborts_switch() {
    let (mut session, backend) = three_file_session();
    session.open().await.unwrap();
    session.select_label("L3").unwrap();
    session.click(10.0, 10.0).unwrap();
    backend.fail_saves(true);
    backend.clear_calls().await;

    let result = session.next_file().await;

    assert!(matches!(
        result,
        Err(SessionError::Service(ServiceError::Status { status: 500, .. }))
    ));
    assert_eq!(session.current_file(), Some("a.nii.gz"));
    assert_eq!(session.annotations().len(), 3);
    assert!(session.frame().is_some());
    assert!(!backend
        .calls()
        .await
        .iter()
        .any(|c| *c == Call::Info("b.nii.gz".into())));
}

#[tokio::test]
async fn test_navigation_bounds() {
    let (mut session, _backend) = three_file_session();

    assert!(matches!(
        session.next_file().await,
        Err(SessionError::NotOpen)
    ));

    session.open().await.unwrap();
    assert!(session.previous_file().await.unwrap().is_none());

    session.select_file(2).await.unwrap();
    assert!(session.next_file().await.unwrap().is_none());

    assert!(matches!(
        session.select_file(3).await,
        Err(SessionError::FileOutOfRange { index: 3, count: 3 })
    ));
    assert_eq!(session.current_file(), Some("c.nii.gz"));
}

#[tokio::test]
async fn test_edits_survive_navigation() {
    let (mut session, backend) = three_file_session();
    session.open().await.unwrap();

    let removed = session.delete(0).unwrap();
    assert_eq!(removed.label, "L1");

    session.next_file().await.unwrap();
    session.previous_file().await.unwrap();

    assert_eq!(session.annotations(), &[Annotation::new("L2", 6, 8, 4)]);
    assert_eq!(
        backend.saved("a.nii.gz").await.unwrap(),
        vec![Annotation::new("L2", 6, 8, 4)]
    );
    // Returning to a file never reloads it from the backend
    let loads = backend
        .calls()
        .await
        .iter()
        .filter(|c| **c == Call::Load("a.nii.gz".into()))
        .count();
    assert_eq!(loads, 1);
}

#[tokio::test]
async fn test_explicit_save_of_empty_collection() {
    let (mut session, backend) = three_file_session();
    session.open().await.unwrap();
    session.select_file(2).await.unwrap();

    assert_eq!(session.save().await.unwrap(), 0);
    assert_eq!(backend.saved("c.nii.gz").await, Some(vec![]));
    assert!(session.is_file_annotated("c.nii.gz"));
}

// =============================================================================
// Annotation editing
// =============================================================================

#[tokio::test]
async fn test_click_through_scaled_frame() {
    let (mut session, _backend) = three_file_session();
    session.open().await.unwrap();
    session.select_file(2).await.unwrap();
    session.set_slice(7).await.unwrap();
    session.select_label("L1").unwrap();

    // Display (10, 44) at 2x is raw (5, 22) on a 30-row slice
    assert_eq!(session.click(10.0, 44.0).unwrap(), Upsert::Inserted(0));
    assert_eq!(session.annotations(), &[Annotation::new("L1", 5, 7, 7)]);

    session.set_slice(2).await.unwrap();
    assert_eq!(session.click(0.0, 0.0).unwrap(), Upsert::Replaced(0));
    assert_eq!(session.annotations(), &[Annotation::new("L1", 0, 29, 2)]);
}

#[tokio::test]
async fn test_delete_out_of_range_is_rejected() {
    let (mut session, _backend) = three_file_session();
    session.open().await.unwrap();

    assert!(matches!(
        session.delete(5),
        Err(SessionError::Annotation(_))
    ));
    assert_eq!(session.annotations().len(), 2);
}

#[tokio::test]
async fn test_focus_annotation_on_each_axis() {
    let (mut session, _backend) = three_file_session();
    session.open().await.unwrap();

    // L2 sits at (6, 8, 4)
    for (axis, expected) in [(Axis::Sagittal, 6), (Axis::Coronal, 8), (Axis::Axial, 4)] {
        session.set_axis(axis).await.unwrap();
        session.focus_annotation(1).await.unwrap();
        assert_eq!(session.display().slice_index, expected, "{}", axis);

        let overlays = session.overlays();
        assert!(overlays.iter().any(|o| o.label == "L2"), "{}", axis);
    }
}

// =============================================================================
// Drawing and caching
// =============================================================================

#[tokio::test]
async fn test_revisited_slice_is_served_from_cache() {
    let (mut session, backend) = three_file_session();
    session.open().await.unwrap();

    session.set_slice(3).await.unwrap();
    session.set_slice(4).await.unwrap();
    session.set_slice(3).await.unwrap();

    let fetches = backend
        .slice_fetches(|r| r.axis == Axis::Axial && r.slice_index == 3)
        .await;
    assert_eq!(fetches, 1);
    assert_eq!(session.drawn_request().unwrap().slice_index, 3);
}

#[tokio::test]
async fn test_filter_toggles_do_not_refetch() {
    let (mut session, backend) = three_file_session();
    session.open().await.unwrap();
    let before = backend.slice_fetches(|_| true).await;

    session.set_binarize(Some(128));
    let frame = session.frame().unwrap();
    assert_eq!(frame.image.get_pixel(3, 3).0, [0, 0, 0, 255]);

    session.set_binarize(Some(10));
    let frame = session.frame().unwrap();
    assert_eq!(frame.image.get_pixel(3, 3).0, [255, 255, 255, 255]);

    session.set_edges(true);
    session.set_binarize(None);
    assert_eq!(backend.slice_fetches(|_| true).await, before);
}

#[tokio::test]
async fn test_failed_fetch_keeps_previous_frame() {
    let (mut session, backend) = three_file_session();
    session.open().await.unwrap();
    backend.fail_slices(true);

    let outcome = session.set_slice(8).await.unwrap();

    assert!(matches!(outcome, DrawOutcome::Failed(ServiceError::Connection(_))));
    assert_eq!(session.display().slice_index, 8);
    assert_eq!(session.drawn_request().unwrap().slice_index, 5);
}

#[tokio::test]
async fn test_click_after_failed_fetch_lands_on_visible_slice() {
    let (mut session, backend) = three_file_session();
    session.open().await.unwrap();
    session.select_file(2).await.unwrap();
    backend.fail_slices(true);
    session.set_slice(8).await.unwrap();
    session.select_label("L1").unwrap();

    // Slice 5 is still on screen: display (10, 10) is raw (5, 5)
    assert_eq!(session.click(10.0, 10.0).unwrap(), Upsert::Inserted(0));
    assert_eq!(session.annotations(), &[Annotation::new("L1", 5, 24, 5)]);

    let overlays = session.overlays();
    assert_eq!(overlays.len(), 1);
    assert_eq!((overlays[0].x, overlays[0].y), (10.0, 10.0));
}

#[tokio::test]
async fn test_stale_draw_after_file_switch() {
    let (mut session, _backend) = three_file_session();
    session.open().await.unwrap();

    let pending = session.draw_request().unwrap();
    assert_eq!(pending.filename, "a.nii.gz");
    session.select_file(2).await.unwrap();

    let outcome = session.finish_draw(pending, Ok(super::test_utils::gray_png(20, 30, 0)));
    assert!(matches!(outcome, DrawOutcome::Stale));
    assert_eq!(session.drawn_request().unwrap().filename, "c.nii.gz");
    assert_eq!(
        session.frame().unwrap().image.get_pixel(0, 0).0[0],
        PLAIN_LEVEL
    );
}

#[tokio::test]
async fn test_stale_draw_after_slice_change() {
    let (mut session, _backend) = three_file_session();
    session.open().await.unwrap();

    let pending = session.draw_request().unwrap();
    session.set_axis(Axis::Coronal).await.unwrap();

    let outcome = session.finish_draw(pending, Ok(super::test_utils::gray_png(20, 30, 0)));
    assert!(matches!(outcome, DrawOutcome::Stale));
    assert_eq!(session.drawn_request().unwrap().axis, Axis::Coronal);
}

#[tokio::test]
async fn test_empty_file_auto_suggests_on_open() {
    let (mut session, _backend) = three_file_session();
    session.open().await.unwrap();

    let nav = session.next_file().await.unwrap().unwrap();
    assert_eq!(nav.annotation_count, 0);
    assert!(matches!(
        nav.suggestion,
        Some(Completion::Presented { count: 2, z_index: 3 })
    ));
    assert!(matches!(session.suggestions().state(), SuggestionState::Present(_)));
}
