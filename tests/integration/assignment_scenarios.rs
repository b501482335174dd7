//! End-to-end placement scenarios through the engine

use crate::integration::test_utils::{
    clear_cell_request, editor, lab_placement, placement, Harness,
};
use routine::conflict::ConflictKind;
use routine::error::ApiError;
use routine::request::{ClearSubjectRequest, ReassignSpanRequest};
use routine::routine::{RoutineStore, SectionRef};

const MONDAY: u8 = 1;

fn conflict_kinds(err: ApiError) -> Vec<ConflictKind> {
    match err {
        ApiError::Conflict(report) => report.conflicts.iter().map(|c| c.kind).collect(),
        other => panic!("expected conflict, got {:?}", other),
    }
}

#[test]
fn test_teacher_double_booked_across_sections() {
    let h = Harness::new();
    h.engine
        .assign(&editor(), &placement("AB", MONDAY, &[1], &["T1"], "R1"))
        .unwrap();

    let err = h
        .engine
        .assign(&editor(), &placement("CD", MONDAY, &[1], &["T1"], "R2"))
        .unwrap_err();
    assert_eq!(conflict_kinds(err), vec![ConflictKind::TeacherDoubleBooked]);
    assert_eq!(h.store.list_all().unwrap().len(), 1);
}

#[test]
fn test_every_violation_reported_at_once() {
    let h = Harness::new();
    h.engine
        .assign(&editor(), &placement("AB", MONDAY, &[1], &["T1"], "R1"))
        .unwrap();

    let err = h
        .engine
        .assign(&editor(), &placement("CD", MONDAY, &[1], &["T1"], "R1"))
        .unwrap_err();
    let kinds = conflict_kinds(err);
    assert!(kinds.contains(&ConflictKind::TeacherDoubleBooked));
    assert!(kinds.contains(&ConflictKind::RoomDoubleBooked));
}

#[test]
fn test_same_cell_is_slot_occupied() {
    let h = Harness::new();
    h.engine
        .assign(&editor(), &placement("AB", MONDAY, &[2], &["T1"], "R1"))
        .unwrap();
    let err = h
        .engine
        .assign(&editor(), &placement("AB", MONDAY, &[2], &["T2"], "R2"))
        .unwrap_err();
    assert_eq!(conflict_kinds(err), vec![ConflictKind::SlotOccupied]);
}

#[test]
fn test_break_period_is_invalid_slot() {
    let h = Harness::new();
    let err = h
        .engine
        .assign(&editor(), &placement("AB", MONDAY, &[3], &["T1"], "R1"))
        .unwrap_err();
    assert_eq!(conflict_kinds(err), vec![ConflictKind::InvalidSlot]);
}

#[test]
fn test_span_across_break_is_rejected_without_writes() {
    let h = Harness::new();
    let err = h
        .engine
        .assign(&editor(), &placement("AB", MONDAY, &[2, 3, 4], &["T1"], "R1"))
        .unwrap_err();
    assert!(conflict_kinds(err).contains(&ConflictKind::InvalidSlot));
    assert!(h.store.list_all().unwrap().is_empty());
    assert!(h.queue.is_idle());
}

#[test]
fn test_reassign_span_shrinks_to_two_slots() {
    let h = Harness::new();
    let first = h
        .engine
        .assign(&editor(), &placement("AB", MONDAY, &[4, 5, 6], &["T1"], "R1"))
        .unwrap();
    let old_span = first.span_id.clone().unwrap();

    let outcome = h
        .engine
        .reassign_span(
            &editor(),
            &ReassignSpanRequest {
                span_id: old_span.clone(),
                placement: placement("AB", MONDAY, &[4, 5], &["T1"], "R1"),
            },
        )
        .unwrap();

    let new_span = outcome.span_id.clone().unwrap();
    assert_ne!(new_span, old_span);
    let rows = h.store.span_entries(&new_span).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows.iter().map(|r| r.slot_index).collect::<Vec<_>>(),
        vec![4, 5]
    );
    assert!(h.store.span_entries(&old_span).unwrap().is_empty());

    let routine = h.engine.routine(&SectionRef::new("BCT", 3, "AB")).unwrap();
    assert!(routine.cell(MONDAY, 6).is_empty());
    assert_eq!(routine.entries().count(), 2);
}

#[test]
fn test_reassign_does_not_conflict_with_itself() {
    let h = Harness::new();
    let first = h
        .engine
        .assign(&editor(), &placement("AB", MONDAY, &[4, 5], &["T1"], "R1"))
        .unwrap();
    let span = first.span_id.unwrap();

    let outcome = h
        .engine
        .reassign_span(
            &editor(),
            &ReassignSpanRequest {
                span_id: span,
                placement: placement("AB", MONDAY, &[5, 6], &["T1", "T2"], "R1"),
            },
        )
        .unwrap();
    assert_eq!(outcome.rows.len(), 2);
    assert_eq!(h.store.teacher_entries("T2").unwrap().len(), 2);
}

#[test]
fn test_reassign_unknown_span_is_not_found() {
    let h = Harness::new();
    let err = h
        .engine
        .reassign_span(
            &editor(),
            &ReassignSpanRequest {
                span_id: routine::types::SpanId::generate("nowhere", &[1, 2]),
                placement: placement("AB", MONDAY, &[1, 2], &["T1"], "R1"),
            },
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::SpanNotFound(_)));
}

#[test]
fn test_lab_groups_share_a_cell_but_exclude_whole_section() {
    let h = Harness::new();
    h.engine
        .assign(&editor(), &lab_placement("AB", MONDAY, &[1], Some("A"), "T1", "L1"))
        .unwrap();
    h.engine
        .assign(&editor(), &lab_placement("AB", MONDAY, &[1], Some("B"), "T2", "L2"))
        .unwrap();

    let err = h
        .engine
        .assign(&editor(), &lab_placement("AB", MONDAY, &[1], None, "T3", "R1"))
        .unwrap_err();
    assert_eq!(
        conflict_kinds(err),
        vec![ConflictKind::SectionLabGroupCollision]
    );

    let routine = h.engine.routine(&SectionRef::new("BCT", 3, "AB")).unwrap();
    let groups: Vec<_> = routine
        .cell(MONDAY, 1)
        .iter()
        .map(|c| c.entry.lab_group.clone())
        .collect();
    assert_eq!(groups, vec![Some("A".to_string()), Some("B".to_string())]);
}

#[test]
fn test_lab_group_rejected_on_whole_section_cell() {
    let h = Harness::new();
    h.engine
        .assign(&editor(), &placement("AB", MONDAY, &[2], &["T1"], "R1"))
        .unwrap();
    let err = h
        .engine
        .assign(&editor(), &lab_placement("AB", MONDAY, &[2], Some("A"), "T2", "L1"))
        .unwrap_err();
    assert_eq!(
        conflict_kinds(err),
        vec![ConflictKind::SectionLabGroupCollision]
    );
}

#[test]
fn test_clear_subject_removes_whole_week() {
    let h = Harness::new();
    h.engine
        .assign(&editor(), &placement("AB", 1, &[1], &["T1"], "R1"))
        .unwrap();
    h.engine
        .assign(&editor(), &placement("AB", 2, &[4, 5], &["T2"], "R1"))
        .unwrap();
    h.engine
        .assign(&editor(), &lab_placement("AB", 3, &[1], Some("A"), "T3", "L1"))
        .unwrap();
    h.engine
        .assign(&editor(), &placement("CD", 4, &[1], &["T4"], "R2"))
        .unwrap();

    let outcome = h
        .engine
        .clear_subject(
            &editor(),
            &ClearSubjectRequest {
                program_code: "BCT".to_string(),
                semester: 3,
                section: "AB".to_string(),
                subject_code: "CT461".to_string(),
            },
        )
        .unwrap();

    assert_eq!(outcome.deleted_count, 3);
    assert_eq!(outcome.affected_teacher_ids, vec!["T1".to_string(), "T2".to_string()]);

    let remaining = h.store.section_entries(&SectionRef::new("BCT", 3, "AB")).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].subject_id, "S2");
    assert_eq!(h.store.section_entries(&SectionRef::new("BCT", 3, "CD")).unwrap().len(), 1);
}

#[test]
fn test_clear_subject_unknown_code_is_not_found() {
    let h = Harness::new();
    let err = h
        .engine
        .clear_subject(
            &editor(),
            &ClearSubjectRequest {
                program_code: "BCT".to_string(),
                semester: 3,
                section: "AB".to_string(),
                subject_code: "XX999".to_string(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::SubjectNotFound(_)));
}

#[test]
fn test_clear_cell_twice_is_idempotent() {
    let h = Harness::new();
    h.engine
        .assign(&editor(), &placement("AB", MONDAY, &[1], &["T1"], "R1"))
        .unwrap();

    let request = clear_cell_request("AB", MONDAY, 1, None);
    assert_eq!(h.engine.clear_cell(&editor(), &request).unwrap().deleted_count, 1);
    assert_eq!(h.engine.clear_cell(&editor(), &request).unwrap().deleted_count, 0);
    assert_eq!(h.engine.clear_cell(&editor(), &request).unwrap().deleted_count, 0);
}

#[test]
fn test_clear_cell_addresses_one_lab_group() {
    let h = Harness::new();
    h.engine
        .assign(&editor(), &lab_placement("AB", MONDAY, &[1], Some("A"), "T1", "L1"))
        .unwrap();
    h.engine
        .assign(&editor(), &lab_placement("AB", MONDAY, &[1], Some("B"), "T2", "L2"))
        .unwrap();

    assert_eq!(
        h.engine
            .clear_cell(&editor(), &clear_cell_request("AB", MONDAY, 1, None))
            .unwrap()
            .deleted_count,
        0
    );
    let outcome = h
        .engine
        .clear_cell(&editor(), &clear_cell_request("AB", MONDAY, 1, Some("B")))
        .unwrap();
    assert_eq!(outcome.deleted_count, 1);
    assert_eq!(outcome.affected_teacher_ids, vec!["T2".to_string()]);
}

#[test]
fn test_assign_then_routine_round_trip() {
    let h = Harness::new();
    let mut request = placement("AB", MONDAY, &[1], &["T1", "T2"], "R1");
    request.notes = Some("bring projector".to_string());
    let outcome = h.engine.assign(&editor(), &request).unwrap();
    assert!(outcome.span_id.is_none());

    let routine = h.engine.routine(&SectionRef::new("BCT", 3, "AB")).unwrap();
    let cells = routine.cell(MONDAY, 1);
    assert_eq!(cells.len(), 1);
    assert_eq!(cells[0].entry, outcome.rows[0]);
    assert_eq!(cells[0].subject_code, "CT461");
    assert_eq!(cells[0].teacher_names, vec!["Asha Karki", "Bikash Thapa"]);
    assert_eq!(cells[0].room_name, "Room 101");
    assert_eq!(cells[0].slot_label, "10:15-11:05");
}

#[test]
fn test_clear_span_then_routine_has_no_span_rows() {
    let h = Harness::new();
    let outcome = h
        .engine
        .assign(&editor(), &placement("AB", MONDAY, &[4, 5, 6], &["T1"], "R1"))
        .unwrap();
    let span = outcome.span_id.unwrap();

    let cleared = h.engine.clear_span(&editor(), &span).unwrap();
    assert_eq!(cleared.deleted_count, 3);

    let routine = h.engine.routine(&SectionRef::new("BCT", 3, "AB")).unwrap();
    assert!(routine.entries().all(|e| e.span_id.as_ref() != Some(&span)));
    assert_eq!(h.engine.clear_span(&editor(), &span).unwrap().deleted_count, 0);
}

#[test]
fn test_unknown_program_and_bad_section() {
    let h = Harness::new();
    let mut request = placement("AB", MONDAY, &[1], &["T1"], "R1");
    request.program_code = "BARCH".to_string();
    assert!(matches!(
        h.engine.assign(&editor(), &request),
        Err(ApiError::ProgramNotFound(_))
    ));

    let request = placement("ZZ", MONDAY, &[1], &["T1"], "R1");
    match h.engine.assign(&editor(), &request) {
        Err(ApiError::Validation(errors)) => assert_eq!(errors.fields(), vec!["section"]),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_malformed_request_lists_every_field() {
    let h = Harness::new();
    let mut request = placement("AB", 9, &[], &[], "");
    request.subject_id = String::new();
    match h.engine.assign(&editor(), &request) {
        Err(ApiError::Validation(errors)) => {
            let fields = errors.fields();
            assert!(fields.contains(&"day_index"));
            assert!(fields.contains(&"slot_indexes"));
            assert!(fields.contains(&"teacher_ids"));
            assert!(fields.contains(&"room_id"));
            assert!(fields.contains(&"subject_id"));
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}
