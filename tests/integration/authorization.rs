//! Role checks on mutations; reads stay open

use crate::integration::test_utils::{admin, clear_cell_request, editor, placement, viewer, Harness};
use routine::error::ApiError;
use routine::request::ClearSubjectRequest;
use routine::routine::{RoutineStore, SectionRef};

#[test]
fn test_viewer_cannot_mutate() {
    let h = Harness::new();
    let outcome = h
        .engine
        .assign(&editor(), &placement("AB", 1, &[4, 5], &["T1"], "R1"))
        .unwrap();
    let span = outcome.span_id.unwrap();

    assert!(matches!(
        h.engine.assign(&viewer(), &placement("AB", 2, &[1], &["T1"], "R1")),
        Err(ApiError::Unauthorized(_))
    ));
    assert!(matches!(
        h.engine.clear_cell(&viewer(), &clear_cell_request("AB", 1, 4, None)),
        Err(ApiError::Unauthorized(_))
    ));
    assert!(matches!(
        h.engine.clear_span(&viewer(), &span),
        Err(ApiError::Unauthorized(_))
    ));
    assert!(matches!(
        h.engine.clear_subject(
            &viewer(),
            &ClearSubjectRequest {
                program_code: "BCT".to_string(),
                semester: 3,
                section: "AB".to_string(),
                subject_code: "CT461".to_string(),
            }
        ),
        Err(ApiError::Unauthorized(_))
    ));
    assert_eq!(h.store.list_all().unwrap().len(), 2);
}

#[test]
fn test_reads_are_open() {
    let h = Harness::new();
    h.engine
        .assign(&editor(), &placement("AB", 1, &[1], &["T1"], "R1"))
        .unwrap();

    let routine = h.engine.routine(&SectionRef::new("BCT", 3, "AB")).unwrap();
    assert_eq!(routine.entries().count(), 1);
    assert!(h.engine.teacher_schedule("T1").is_ok());
}

#[test]
fn test_unauthorized_check_runs_before_validation() {
    let h = Harness::new();
    let err = h
        .engine
        .assign(&viewer(), &placement("", 9, &[], &[], ""))
        .unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));
}

#[test]
fn test_rebuild_views_needs_admin() {
    let h = Harness::new();
    assert!(matches!(
        h.engine.rebuild_all_views(&editor()),
        Err(ApiError::Unauthorized(_))
    ));
    assert!(h.queue.is_idle());
    assert_eq!(h.engine.rebuild_all_views(&admin()).unwrap(), 4);
}
