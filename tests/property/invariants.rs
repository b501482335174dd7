//! Random mutation sequences never break the committed-state invariants

use proptest::prelude::*;
use proptest::test_runner::{Config, TestRunner};
use routine::auth::{Caller, Role};
use routine::catalog::SlotCatalog;
use routine::engine::RoutineEngine;
use routine::error::ApiError;
use routine::projection::{ProjectionQueue, TeacherViewStore};
use routine::registry::{InMemoryRegistry, ProgramRecord, RoomRecord, SubjectRecord, TeacherRecord};
use routine::request::{ClearCellRequest, ClearSubjectRequest, PlacementRequest, ReassignSpanRequest};
use routine::routine::{RoutineSlotEntry, RoutineStore, SledRoutineStore};
use routine::types::{SessionType, SpanId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tempfile::TempDir;

const SECTIONS: [&str; 2] = ["AB", "CD"];
const TEACHERS: [&str; 4] = ["T1", "T2", "T3", "T4"];
const ROOMS: [&str; 3] = ["R1", "R2", "R3"];
const SUBJECTS: [(&str, &str); 2] = [("S1", "CT461"), ("S2", "CT462")];
const GROUPS: [Option<&str>; 3] = [None, Some("A"), Some("B")];

#[derive(Debug, Clone)]
struct Placement {
    section: usize,
    day: u8,
    start: u8,
    len: u8,
    group: usize,
    subject: usize,
    teachers: Vec<usize>,
    room: usize,
}

#[derive(Debug, Clone)]
enum Op {
    Assign(Placement),
    Reassign { span: usize, placement: Placement },
    ClearCell { section: usize, day: u8, slot: u8, group: usize },
    ClearSpan { span: usize },
    ClearSubject { section: usize, subject: usize },
}

fn placement_strategy() -> impl Strategy<Value = Placement> {
    (
        0..SECTIONS.len(),
        0u8..3,
        0u8..8,
        1u8..4,
        0..GROUPS.len(),
        0..SUBJECTS.len(),
        prop::collection::vec(0..TEACHERS.len(), 1..3),
        0..ROOMS.len(),
    )
        .prop_map(|(section, day, start, len, group, subject, teachers, room)| Placement {
            section,
            day,
            start,
            len,
            group,
            subject,
            teachers,
            room,
        })
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => placement_strategy().prop_map(Op::Assign),
        1 => (0usize..8, placement_strategy())
            .prop_map(|(span, placement)| Op::Reassign { span, placement }),
        1 => (0..SECTIONS.len(), 0u8..3, 0u8..8, 0..GROUPS.len())
            .prop_map(|(section, day, slot, group)| Op::ClearCell { section, day, slot, group }),
        1 => (0usize..8).prop_map(|span| Op::ClearSpan { span }),
        1 => (0..SECTIONS.len(), 0..SUBJECTS.len())
            .prop_map(|(section, subject)| Op::ClearSubject { section, subject }),
    ]
}

fn registry() -> InMemoryRegistry {
    let mut registry = InMemoryRegistry::new();
    registry.register_program(ProgramRecord {
        code: "BCT".to_string(),
        name: "Computer Engineering".to_string(),
        semesters: Some(8),
        sections: vec![],
    });
    for id in TEACHERS {
        registry.register_teacher(TeacherRecord {
            id: id.to_string(),
            name: id.to_string(),
            department: None,
        });
    }
    for id in ROOMS {
        registry.register_room(RoomRecord {
            id: id.to_string(),
            name: id.to_string(),
            capacity: None,
        });
    }
    for (id, code) in SUBJECTS {
        registry.register_subject(SubjectRecord {
            id: id.to_string(),
            code: code.to_string(),
            name: code.to_string(),
        });
    }
    registry
}

fn request(p: &Placement) -> PlacementRequest {
    let mut teachers: Vec<String> = Vec::new();
    for t in &p.teachers {
        let id = TEACHERS[*t].to_string();
        if !teachers.contains(&id) {
            teachers.push(id);
        }
    }
    PlacementRequest {
        program_code: "BCT".to_string(),
        semester: 3,
        section: SECTIONS[p.section].to_string(),
        day_index: p.day,
        slot_indexes: (p.start..p.start + p.len).collect(),
        lab_group: GROUPS[p.group].map(str::to_string),
        subject_id: SUBJECTS[p.subject].0.to_string(),
        teacher_ids: teachers,
        room_id: ROOMS[p.room].to_string(),
        session_type: if GROUPS[p.group].is_some() {
            SessionType::Lab
        } else {
            SessionType::Theory
        },
        notes: None,
    }
}

/// Errors a well-formed random operation may legitimately produce
fn expected_refusal(err: &ApiError) -> bool {
    matches!(
        err,
        ApiError::Conflict(_) | ApiError::Validation(_) | ApiError::SpanNotFound(_)
    )
}

fn check_invariants(rows: &[RoutineSlotEntry], catalog: &SlotCatalog) -> Result<(), String> {
    let mut keys = HashSet::new();
    let mut teacher_slots: HashMap<(String, u8, u8), &RoutineSlotEntry> = HashMap::new();
    let mut room_slots: HashMap<(String, u8, u8), &RoutineSlotEntry> = HashMap::new();
    let mut cells: HashMap<String, Vec<Option<String>>> = HashMap::new();
    let mut spans: BTreeMap<SpanId, Vec<&RoutineSlotEntry>> = BTreeMap::new();

    for row in rows {
        if !keys.insert(row.key().encode()) {
            return Err(format!("duplicate cell key {}", row.key()));
        }
        if !catalog
            .status(&row.program_code, row.day_index, row.slot_index)
            .is_assignable()
        {
            return Err(format!("row committed in unassignable slot {}", row.key()));
        }
        for teacher in &row.teacher_ids {
            let slot = (teacher.clone(), row.day_index, row.slot_index);
            if let Some(other) = teacher_slots.insert(slot, row) {
                if other.span_id.is_none() || other.span_id != row.span_id {
                    return Err(format!("teacher {} double booked at {}", teacher, row.key()));
                }
            }
        }
        let slot = (row.room_id.clone(), row.day_index, row.slot_index);
        if room_slots.insert(slot, row).is_some() {
            return Err(format!("room {} double booked at {}", row.room_id, row.key()));
        }
        cells
            .entry(row.key().cell_encode())
            .or_default()
            .push(row.lab_group.clone());
        if let Some(span) = &row.span_id {
            spans.entry(span.clone()).or_default().push(row);
        }
    }

    for (cell, groups) in &cells {
        if groups.len() > 1 && groups.iter().any(Option::is_none) {
            return Err(format!("cell {} mixes whole-section and lab groups", cell));
        }
    }

    for (span, mut members) in spans {
        if members.len() < 2 {
            return Err(format!("span {} has a single member", span));
        }
        members.sort_by_key(|r| r.slot_index);
        let first = members[0];
        for pair in members.windows(2) {
            if pair[1].span_signature() != first.span_signature()
                || pair[1].day_index != first.day_index
            {
                return Err(format!("span {} members disagree", span));
            }
            if !catalog.is_adjacent(pair[0].slot_index, pair[1].slot_index) {
                return Err(format!("span {} is not contiguous", span));
            }
        }
    }
    Ok(())
}

fn run_sequence(ops: Vec<Op>) -> Result<(), TestCaseError> {
    let dir = TempDir::new().map_err(|e| TestCaseError::fail(e.to_string()))?;
    let store = SledRoutineStore::new(dir.path()).map_err(|e| TestCaseError::fail(e.to_string()))?;
    let views = TeacherViewStore::new(store.db()).map_err(|e| TestCaseError::fail(e.to_string()))?;
    let catalog = Arc::new(SlotCatalog::default());
    let engine = RoutineEngine::new(
        Arc::new(store.clone()),
        Arc::clone(&catalog),
        Arc::new(registry()),
        Arc::new(ProjectionQueue::new(1000)),
        views,
    );
    let caller = Caller::new("prop", Role::Editor);
    let mut known_spans: Vec<SpanId> = Vec::new();

    for op in ops {
        let result: Result<(), ApiError> = match &op {
            Op::Assign(p) => engine.assign(&caller, &request(p)).map(|outcome| {
                known_spans.extend(outcome.span_id);
            }),
            Op::Reassign { span, placement } => {
                let target = known_spans.get(*span).cloned();
                match target {
                    Some(span_id) => engine
                        .reassign_span(
                            &caller,
                            &ReassignSpanRequest {
                                span_id,
                                placement: request(placement),
                            },
                        )
                        .map(|outcome| known_spans.extend(outcome.span_id)),
                    None => Ok(()),
                }
            }
            Op::ClearCell {
                section,
                day,
                slot,
                group,
            } => engine
                .clear_cell(
                    &caller,
                    &ClearCellRequest {
                        program_code: "BCT".to_string(),
                        semester: 3,
                        section: SECTIONS[*section].to_string(),
                        day_index: *day,
                        slot_index: *slot,
                        lab_group: GROUPS[*group].map(str::to_string),
                    },
                )
                .map(|_| ()),
            Op::ClearSpan { span } => match known_spans.get(*span) {
                Some(span_id) => engine.clear_span(&caller, span_id).map(|_| ()),
                None => Ok(()),
            },
            Op::ClearSubject { section, subject } => engine
                .clear_subject(
                    &caller,
                    &ClearSubjectRequest {
                        program_code: "BCT".to_string(),
                        semester: 3,
                        section: SECTIONS[*section].to_string(),
                        subject_code: SUBJECTS[*subject].1.to_string(),
                    },
                )
                .map(|_| ()),
        };

        if let Err(err) = &result {
            prop_assert!(expected_refusal(err), "{:?} failed unexpectedly: {}", op, err);
        }

        let rows = store
            .list_all()
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        if let Err(violation) = check_invariants(&rows, &catalog) {
            return Err(TestCaseError::fail(format!("after {:?}: {}", op, violation)));
        }
    }
    Ok(())
}

#[test]
fn test_random_mutations_preserve_invariants() {
    let mut runner = TestRunner::new(Config {
        cases: 48,
        ..Config::default()
    });

    runner
        .run(&prop::collection::vec(op_strategy(), 1..24), run_sequence)
        .unwrap();
}

#[test]
fn test_rejected_placement_leaves_store_unchanged() {
    let mut runner = TestRunner::new(Config {
        cases: 24,
        ..Config::default()
    });

    runner
        .run(
            &(placement_strategy(), placement_strategy()),
            |(first, second)| {
                let dir = TempDir::new().unwrap();
                let store = SledRoutineStore::new(dir.path()).unwrap();
                let views = TeacherViewStore::new(store.db()).unwrap();
                let engine = RoutineEngine::new(
                    Arc::new(store.clone()),
                    Arc::new(SlotCatalog::default()),
                    Arc::new(registry()),
                    Arc::new(ProjectionQueue::new(100)),
                    views,
                );
                let caller = Caller::new("prop", Role::Editor);

                let _ = engine.assign(&caller, &request(&first));
                let before = store.list_all().unwrap();
                if let Err(err) = engine.assign(&caller, &request(&second)) {
                    prop_assert!(expected_refusal(&err));
                    prop_assert_eq!(store.list_all().unwrap(), before);
                }
                Ok(())
            },
        )
        .unwrap();
}
