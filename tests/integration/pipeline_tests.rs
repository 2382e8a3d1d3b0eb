//! Display pipeline integration tests.
//!
//! Tests verify:
//! - Histogram matching fetches a matched raster and keys the cache by reference
//! - The reference is cleared when the user opens the reference file itself
//! - Snapshots carry annotation markers at the mapped position
//! - The magnifier samples the raw raster around a display-space cursor

use landmark_annotator::{Axis, OverlayKind, SessionError};

use super::test_utils::{three_file_session, MATCHED_LEVEL, PLAIN_LEVEL};

#[tokio::test]
async fn test_histogram_reference_fetches_matched_slice() {
    let (mut session, backend) = three_file_session();
    session.open().await.unwrap();

    assert_eq!(session.reference_candidates(), vec!["b.nii.gz", "c.nii.gz"]);

    session
        .set_histogram_reference(Some("c.nii.gz".into()))
        .await
        .unwrap();
    let frame = session.frame().unwrap();
    assert_eq!(frame.image.get_pixel(1, 1).0[0], MATCHED_LEVEL);
    assert_eq!(
        backend
            .slice_fetches(|r| r.reference.as_deref() == Some("c.nii.gz"))
            .await,
        1
    );

    // Clearing the reference reuses the cached plain slice
    session.set_histogram_reference(None).await.unwrap();
    let frame = session.frame().unwrap();
    assert_eq!(frame.image.get_pixel(1, 1).0[0], PLAIN_LEVEL);
    assert_eq!(backend.slice_fetches(|r| r.reference.is_none()).await, 1);
}

#[tokio::test]
async fn test_reference_cleared_when_opening_reference_file() {
    let (mut session, _backend) = three_file_session();
    session.open().await.unwrap();
    session
        .set_histogram_reference(Some("c.nii.gz".into()))
        .await
        .unwrap();

    session.next_file().await.unwrap();
    assert_eq!(
        session.display().filters.histogram_reference.as_deref(),
        Some("c.nii.gz")
    );

    session.next_file().await.unwrap();
    assert_eq!(session.current_file(), Some("c.nii.gz"));
    assert!(session.display().filters.histogram_reference.is_none());
    assert!(session.drawn_request().unwrap().reference.is_none());
}

#[tokio::test]
async fn test_invalid_reference_is_rejected_before_fetch() {
    let (mut session, backend) = three_file_session();
    session.open().await.unwrap();
    let before = backend.slice_fetches(|_| true).await;

    let result = session
        .set_histogram_reference(Some("a.nii.gz".into()))
        .await;

    assert!(matches!(result, Err(SessionError::InvalidReference(_))));
    assert_eq!(backend.slice_fetches(|_| true).await, before);
    assert!(session.display().filters.histogram_reference.is_none());
}

#[tokio::test]
async fn test_snapshot_burns_in_annotation_marker() {
    let (mut session, _backend) = three_file_session();
    session.open().await.unwrap();

    // L1 sits at (5, 7, 7): axial slice 7, raw pixel (5, 22), display (10, 44)
    session.set_slice(7).await.unwrap();
    let overlays = session.overlays();
    assert_eq!(overlays.len(), 1);
    assert_eq!(overlays[0].kind, OverlayKind::Annotation);
    assert_eq!((overlays[0].x, overlays[0].y), (10.0, 44.0));

    let snapshot = session.snapshot().unwrap();
    let marker = snapshot.get_pixel(10, 44).0;
    assert_ne!(marker, [PLAIN_LEVEL, PLAIN_LEVEL, PLAIN_LEVEL, 255]);
    assert_eq!(
        snapshot.get_pixel(30, 5).0,
        [PLAIN_LEVEL, PLAIN_LEVEL, PLAIN_LEVEL, 255]
    );

    // The frame itself is left clean
    assert_eq!(
        session.frame().unwrap().image.get_pixel(10, 44).0,
        [PLAIN_LEVEL, PLAIN_LEVEL, PLAIN_LEVEL, 255]
    );
}

#[tokio::test]
async fn test_no_overlays_on_other_slices() {
    let (mut session, _backend) = three_file_session();
    session.open().await.unwrap();
    session.set_slice(0).await.unwrap();

    assert!(session.overlays().is_empty());
}

#[tokio::test]
async fn test_magnifier_samples_raw_raster() {
    let (mut session, _backend) = three_file_session();
    session.open().await.unwrap();
    session.set_magnifier(true);

    // Display (20, 30) is raw (10, 15)
    let view = session.magnify(20.0, 30.0).unwrap().unwrap();
    let side = session.config().magnifier.crop_side();
    assert_eq!(view.crop.width, side.min(20));
    assert_eq!(view.crop.height, side.min(30));
    assert_eq!(view.image.dimensions(), (150, 150));

    // Off the raster
    assert!(session.magnify(-4.0, 10.0).unwrap().is_none());
}

#[tokio::test]
async fn test_sagittal_frame_geometry() {
    let (mut session, _backend) = three_file_session();
    session.open().await.unwrap();

    session.set_axis(Axis::Sagittal).await.unwrap();

    // Sagittal slices are coronal_range wide and axial_range tall
    let frame = session.frame().unwrap();
    assert_eq!((frame.raw_width, frame.raw_height), (30, 10));
    assert_eq!(session.display().slice_index, 10);
}
