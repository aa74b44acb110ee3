use super::*;
use crate::perks::GamePerk;
use anyhow::anyhow;
use pretty_assertions::assert_eq;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

fn store_with_cap(cap: usize) -> EditorStore {
    let config = EditorConfig {
        undo_history_cap: cap,
        ..EditorConfig::default()
    };
    EditorStore::new(config, Box::new(MemoryStorage::new()))
}

/// Three nodes A(0,0), B(100,0), C(50,100) with A-B and B-C connected.
fn triangle(store: &mut EditorStore) -> (NodeId, NodeId, NodeId) {
    let a = store.add_node(0.0, 0.0);
    let b = store.add_node(100.0, 0.0);
    let c = store.add_node(50.0, 100.0);
    store.add_connection(&a, &b).unwrap();
    store.add_connection(&b, &c).unwrap();
    (a, b, c)
}

fn no_dangling_connections(doc: &EditorDocument) -> bool {
    doc.connections
        .values()
        .all(|c| doc.nodes.contains_key(&c.from_id) && doc.nodes.contains_key(&c.to_id))
}

struct FailingStorage;

impl Storage for FailingStorage {
    fn load(&self) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    fn save(&mut self, _snapshot: &str) -> anyhow::Result<()> {
        Err(anyhow!("disk full"))
    }

    fn clear(&mut self) -> anyhow::Result<()> {
        Err(anyhow!("read-only"))
    }
}

#[test]
fn deleting_middle_node_removes_its_connections() {
    let mut store = EditorStore::in_memory();
    let (a, b, c) = triangle(&mut store);

    store.delete_node(&b);

    assert!(store.document().connections.is_empty());
    assert!(store.node(&a).is_some());
    assert!(store.node(&c).is_some());
    assert!(store.node(&b).is_none());
}

#[test]
fn random_edit_sequences_never_leave_dangling_connections() {
    let mut store = EditorStore::in_memory();
    let mut state = 0x2545_f491_4f6c_dd1d_u64;
    let mut next = move |bound: usize| {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state % bound as u64) as usize
    };

    let mut ids: Vec<NodeId> = Vec::new();
    for _ in 0..300 {
        match next(4) {
            0 => ids.push(store.add_node(next(500) as f64, next(500) as f64)),
            1 if ids.len() > 1 => {
                let a = ids[next(ids.len())].clone();
                let b = ids[next(ids.len())].clone();
                store.add_connection(&a, &b);
            }
            2 if !ids.is_empty() => {
                let id = ids.swap_remove(next(ids.len()));
                store.delete_node(&id);
            }
            3 if !ids.is_empty() => {
                let id = ids[next(ids.len())].clone();
                store.update_node(&id, NodePatch::position(1.0, 2.0));
            }
            _ => {}
        }
        assert!(no_dangling_connections(store.document()));
    }
}

#[test]
fn connections_are_unique_per_unordered_pair() {
    let mut store = EditorStore::in_memory();
    let a = store.add_node(0.0, 0.0);
    let b = store.add_node(10.0, 0.0);

    assert!(store.add_connection(&a, &b).is_some());
    assert!(store.add_connection(&b, &a).is_none());
    assert!(store.add_connection(&a, &a).is_none());
    assert!(store.add_connection(&a, "missing").is_none());
    assert_eq!(store.document().connections.len(), 1);
    assert_eq!(store.history().undo_len(), 3);
}

#[test]
fn undo_restores_state_before_each_mutation() {
    let mut store = EditorStore::in_memory();
    let (a, b, c) = triangle(&mut store);
    let image = store.add_image(5.0, 5.0);
    let orbit = store.add_orbit(0.0, 0.0);
    let conn = store.document().connection_between(&a, &b).unwrap().clone();

    let mutations: Vec<Box<dyn Fn(&mut EditorStore) + '_>> = vec![
        Box::new(|s| {
            s.add_node(1.0, 1.0);
        }),
        Box::new(|s| {
            s.update_node(
                &a,
                NodePatch {
                    title: Some("Armsman".into()),
                    node_type: Some(NodeType::Master),
                    ..NodePatch::default()
                },
            )
        }),
        Box::new(|s| s.delete_node(&b)),
        Box::new(|s| {
            s.add_connection(&a, &c);
        }),
        Box::new(|s| s.remove_connection(&conn)),
        Box::new(|s| s.update_connection(&conn, ConnectionPatch::curvature(80.0))),
        Box::new(|s| s.remove_all_connections(&b)),
        Box::new(|s| s.update_image(&image, ImagePatch::position(40.0, 40.0))),
        Box::new(|s| s.delete_image(&image)),
        Box::new(|s| {
            s.update_orbit(
                &orbit,
                OrbitPatch {
                    point_count: Some(12),
                    ..OrbitPatch::default()
                },
            )
        }),
        Box::new(|s| s.delete_orbit(&orbit)),
    ];

    for mutation in mutations {
        let before = store.export_data();
        mutation(&mut store);
        assert_ne!(store.export_data(), before);

        assert!(store.undo());
        assert_eq!(store.export_data(), before);
    }
}

#[test]
fn capped_history_reverses_only_the_latest_add() {
    let mut store = store_with_cap(2);
    let first = store.add_node(0.0, 0.0);
    let second = store.add_node(1.0, 0.0);
    let third = store.add_node(2.0, 0.0);

    assert_eq!(store.history().undo_len(), 2);

    assert!(store.undo());
    assert!(store.node(&third).is_none());
    assert!(store.node(&second).is_some());

    assert!(store.undo());
    assert!(!store.can_undo());
    assert!(!store.undo());
    assert!(store.node(&first).is_some());
}

#[test]
fn undo_of_delete_restores_cascaded_connections() {
    let mut store = EditorStore::in_memory();
    let (a, b, c) = triangle(&mut store);
    let conn = store.document().connection_between(&b, &c).unwrap().clone();
    store.update_connection(&conn, ConnectionPatch::curvature(-42.0));
    let before = store.export_data();

    store.delete_node(&b);
    store.undo();

    assert_eq!(store.export_data(), before);
    assert!(store.document().connection_between(&a, &b).is_some());
    assert_eq!(store.connection(&conn).unwrap().curvature, -42.0);
}

#[test]
fn remove_all_connections_is_fully_undoable() {
    let mut store = EditorStore::in_memory();
    let (_, b, _) = triangle(&mut store);
    let ids: Vec<ConnectionId> = store.document().connections.keys().cloned().collect();
    for (i, id) in ids.iter().enumerate() {
        store.update_connection(id, ConnectionPatch::curvature(10.0 * (i + 1) as f64));
    }
    let before = store.export_data();

    store.remove_all_connections(&b);
    assert!(store.document().connections.is_empty());

    store.undo();
    assert_eq!(store.export_data(), before);

    store.redo();
    assert!(store.document().connections.is_empty());
}

#[test]
fn remove_all_connections_without_connections_records_nothing() {
    let mut store = EditorStore::in_memory();
    let a = store.add_node(0.0, 0.0);

    store.remove_all_connections(&a);

    assert_eq!(store.history().undo_len(), 1);
}

#[test]
fn unknown_ids_are_silent_no_ops() {
    let mut store = EditorStore::in_memory();
    store.add_node(0.0, 0.0);
    let before = store.export_data();

    store.update_node("nope", NodePatch::position(1.0, 1.0));
    store.delete_node("nope");
    store.remove_connection("nope");
    store.update_connection("nope", ConnectionPatch::curvature(5.0));
    store.update_image("nope", ImagePatch::position(1.0, 1.0));
    store.delete_image("nope");
    store.update_orbit("nope", OrbitPatch::position(1.0, 1.0));
    store.delete_orbit("nope");

    assert_eq!(store.export_data(), before);
    assert_eq!(store.history().undo_len(), 1);
}

#[test]
fn redo_replays_undone_mutation_and_new_edit_clears_it() {
    let mut store = EditorStore::in_memory();
    let id = store.add_node(0.0, 0.0);
    store.update_node(&id, NodePatch::position(50.0, 60.0));

    store.undo();
    assert_eq!(store.node(&id).unwrap().position(), Point::new(0.0, 0.0));
    assert!(store.can_redo());

    assert!(store.redo());
    assert_eq!(store.node(&id).unwrap().position(), Point::new(50.0, 60.0));

    store.undo();
    store.add_node(5.0, 5.0);
    assert!(!store.can_redo());
    assert!(!store.redo());
}

#[test]
fn redo_of_added_node_keeps_its_id() {
    let mut store = EditorStore::in_memory();
    let id = store.add_node(3.0, 4.0);

    store.undo();
    assert!(store.node(&id).is_none());

    store.redo();
    assert_eq!(store.node(&id).unwrap().position(), Point::new(3.0, 4.0));
}

#[test]
fn multi_element_update_is_one_undo_step() {
    let mut store = EditorStore::in_memory();
    let node = store.add_node(0.0, 0.0);
    let image = store.add_image(10.0, 10.0);
    let orbit = store.add_orbit(20.0, 20.0);
    let before = store.export_data();
    let depth = store.history().undo_len();

    store.update_multiple_elements(vec![
        ElementUpdate::Node {
            id: node.clone(),
            patch: NodePatch::position(100.0, 0.0),
        },
        ElementUpdate::Image {
            id: image.clone(),
            patch: ImagePatch::position(110.0, 10.0),
        },
        ElementUpdate::Orbit {
            id: orbit.clone(),
            patch: OrbitPatch::position(120.0, 20.0),
        },
        ElementUpdate::Node {
            id: "missing".into(),
            patch: NodePatch::position(1.0, 1.0),
        },
    ]);

    assert_eq!(store.history().undo_len(), depth + 1);
    assert_eq!(store.image(&image).unwrap().x, 110.0);

    store.undo();
    assert_eq!(store.export_data(), before);

    store.update_multiple_elements(Vec::new());
    assert_eq!(store.history().undo_len(), depth);
}

#[test]
fn move_selection_by_shifts_every_selected_element() {
    let mut store = EditorStore::in_memory();
    let node = store.add_node(0.0, 0.0);
    let orbit = store.add_orbit(50.0, 50.0);
    store.toggle_element_selection(ElementRef::node(&node));
    store.toggle_element_selection(ElementRef::orbit(&orbit));

    store.move_selection_by(10.0, -5.0);

    assert_eq!(store.node(&node).unwrap().position(), Point::new(10.0, -5.0));
    assert_eq!(store.orbit(&orbit).unwrap().x, 60.0);
    store.undo();
    assert_eq!(store.orbit(&orbit).unwrap().x, 50.0);
    assert_eq!(store.node(&node).unwrap().x, 0.0);
}

#[test]
fn toggle_selection_switches_to_multi_and_ignores_connections() {
    let mut store = EditorStore::in_memory();
    let (a, b, _) = triangle(&mut store);
    let conn = store.document().connection_between(&a, &b).unwrap().clone();

    store.select_element(ElementRef::node(&a));
    assert_eq!(store.selection().single(), Some(&ElementRef::node(&a)));

    store.toggle_element_selection(ElementRef::node(&b));
    assert_eq!(store.selection(), &Selection::Multi(vec![ElementRef::node(&b)]));

    store.toggle_element_selection(ElementRef::connection(&conn));
    assert_eq!(store.selection().elements().len(), 1);

    store.toggle_element_selection(ElementRef::node(&b));
    assert!(store.selection().is_empty());

    store.select_element(ElementRef::connection(&conn));
    store.clear_selection();
    assert!(store.selection().is_empty());
}

#[test]
fn deleting_selected_node_clears_selection() {
    let mut store = EditorStore::in_memory();
    let (a, b, _) = triangle(&mut store);
    let conn = store.document().connection_between(&a, &b).unwrap().clone();

    store.select_element(ElementRef::connection(&conn));
    store.delete_node(&a);
    assert!(store.selection().is_empty());

    store.toggle_element_selection(ElementRef::node(&b));
    store.undo();
    assert!(store.selection().contains(&b));
}

#[test]
fn update_clamps_ranges() {
    let mut store = EditorStore::in_memory();
    let (a, b, _) = triangle(&mut store);
    let conn = store.document().connection_between(&a, &b).unwrap().clone();
    let orbit = store.add_orbit(0.0, 0.0);
    let image = store.add_image(0.0, 0.0);

    store.update_connection(&conn, ConnectionPatch::curvature(1000.0));
    store.update_orbit(
        &orbit,
        OrbitPatch {
            radius: Some(5.0),
            point_count: Some(40),
            ..OrbitPatch::default()
        },
    );
    store.update_image(
        &image,
        ImagePatch {
            opacity: Some(Some(1.5)),
            ..ImagePatch::default()
        },
    );

    assert_eq!(store.connection(&conn).unwrap().curvature, 300.0);
    assert_eq!(store.orbit(&orbit).unwrap().radius, 50.0);
    assert_eq!(store.orbit(&orbit).unwrap().point_count, 18);
    assert_eq!(store.image(&image).unwrap().opacity, Some(1.0));
}

#[test]
fn update_connection_rejects_duplicate_endpoints() {
    let mut store = EditorStore::in_memory();
    let (a, b, c) = triangle(&mut store);
    let bc = store.document().connection_between(&b, &c).unwrap().clone();
    let depth = store.history().undo_len();

    store.update_connection(
        &bc,
        ConnectionPatch {
            from_id: Some(a.clone()),
            to_id: Some(b.clone()),
            ..ConnectionPatch::default()
        },
    );
    store.update_connection(
        &bc,
        ConnectionPatch {
            to_id: Some(b.clone()),
            ..ConnectionPatch::default()
        },
    );
    assert_eq!(store.history().undo_len(), depth);

    store.update_connection(
        &bc,
        ConnectionPatch {
            from_id: Some(a.clone()),
            ..ConnectionPatch::default()
        },
    );
    assert!(store.connection(&bc).unwrap().joins(&a, &c));
}

#[test]
fn update_connection_rejects_unknown_endpoint() {
    let mut store = EditorStore::in_memory();
    let (a, b, _) = triangle(&mut store);
    let ab = store.document().connection_between(&a, &b).unwrap().clone();
    let before = store.export_data();
    let depth = store.history().undo_len();

    store.update_connection(
        &ab,
        ConnectionPatch {
            to_id: Some("ghost".into()),
            curvature: Some(80.0),
            ..ConnectionPatch::default()
        },
    );

    assert_eq!(store.export_data(), before);
    assert_eq!(store.history().undo_len(), depth);
    assert!(no_dangling_connections(store.document()));
}

#[test]
fn assign_perk_copies_catalog_text_in_one_step() {
    let mut store = EditorStore::in_memory();
    let id = store.add_node(0.0, 0.0);
    let catalog: PerkCatalog = [(
        "0x58F5F".to_string(),
        GamePerk {
            name: "Armsman".into(),
            description: "One-handed weapons do 20% more damage.".into(),
        },
    )]
    .into_iter()
    .collect();

    store.assign_perk(&id, "0x58F5F", &catalog);
    let node = store.node(&id).unwrap();
    assert_eq!(node.perk_id, "0x58F5F");
    assert_eq!(node.title, "Armsman");

    store.undo();
    let node = store.node(&id).unwrap();
    assert_eq!(node.perk_id, "");
    assert_eq!(node.title, "");

    store.assign_perk(&id, "0xDEAD", &catalog);
    assert_eq!(store.node(&id).unwrap().perk_id, "0xDEAD");
    assert_eq!(store.node(&id).unwrap().title, "");
}

#[test]
fn dragging_near_orbit_point_snaps_to_it() {
    let mut store = EditorStore::in_memory();
    let orbit = store.add_orbit(0.0, 0.0);
    store.update_orbit(
        &orbit,
        OrbitPatch {
            radius: Some(100.0),
            point_count: Some(4),
            ..OrbitPatch::default()
        },
    );
    let node = store.add_node(300.0, 300.0);

    store.drop_node(&node, Point::new(95.0, 5.0));

    let position = store.node(&node).unwrap().position();
    assert!((position.x - 100.0).abs() < 1e-9);
    assert!(position.y.abs() < 1e-9);
}

#[test]
fn dragging_falls_back_to_grid_then_raw_position() {
    let mut store = EditorStore::in_memory();

    assert_eq!(store.snap_drag_position(Point::new(37.0, 24.0)), Point::new(37.0, 24.0));

    store.update_grid_settings(GridSettings {
        enabled: true,
        size: 50.0,
        rotation: 0.0,
    });
    assert_eq!(store.snap_drag_position(Point::new(37.0, 24.0)), Point::new(50.0, 0.0));
}

#[test]
fn node_at_follows_node_changes() {
    let mut store = EditorStore::in_memory();
    let id = store.add_node(0.0, 0.0);

    assert_eq!(store.node_at(5.0, 5.0), Some(&id));
    assert_eq!(store.node_at(25.0, 0.0), None);

    store.update_node(
        &id,
        NodePatch {
            node_type: Some(NodeType::Large),
            ..NodePatch::default()
        },
    );
    assert_eq!(store.node_at(25.0, 0.0), Some(&id));

    store.update_node(&id, NodePatch::position(500.0, 500.0));
    assert_eq!(store.node_at(5.0, 5.0), None);
    assert_eq!(store.node_at(505.0, 500.0), Some(&id));
}

#[test]
fn settings_changes_are_not_undoable() {
    let mut store = EditorStore::in_memory();

    store.set_viewport(ViewportState {
        x: 10.0,
        y: 20.0,
        scale: 2.0,
    });
    store.update_web_settings(WebSettings {
        enabled: true,
        ..WebSettings::default()
    });

    assert!(!store.can_undo());
    assert!(store.has_pending_changes());
    assert_eq!(store.document().viewport.scale, 2.0);
    assert!(store.document().web_settings.enabled);
}

#[test]
fn import_replaces_document_and_resets_history() {
    let mut store = EditorStore::in_memory();
    let old = store.add_node(0.0, 0.0);
    store.select_element(ElementRef::node(&old));

    let mut other = EditorStore::in_memory();
    let (a, _, _) = triangle(&mut other);
    let doc = other.export_data();

    store.import_data(doc.clone());

    assert_eq!(store.export_data(), doc);
    assert!(store.node(&a).is_some());
    assert!(store.node(&old).is_none());
    assert!(!store.can_undo());
    assert!(store.selection().is_empty());
}

#[test]
fn clear_all_resets_everything_and_storage() {
    let storage = MemoryStorage::new();
    let mut store = EditorStore::new(EditorConfig::default(), Box::new(storage.clone()));
    let (a, _, _) = triangle(&mut store);
    store.select_element(ElementRef::node(&a));
    store.update_grid_settings(GridSettings {
        enabled: true,
        ..GridSettings::default()
    });
    store.flush();
    assert!(storage.snapshot().is_some());

    store.clear_all();

    assert_eq!(store.export_data(), EditorDocument::new());
    assert!(!store.can_undo());
    assert!(!store.can_redo());
    assert!(store.selection().is_empty());
    assert!(!store.has_pending_changes());
    assert_eq!(storage.snapshot(), None);
}

#[test]
fn bursts_of_edits_are_written_once_after_quiet_period() {
    let storage = MemoryStorage::new();
    let mut store = EditorStore::new(EditorConfig::default(), Box::new(storage.clone()));
    let id = store.add_node(0.0, 0.0);
    for step in 0..20 {
        store.update_node(&id, NodePatch::position(step as f64, 0.0));
        store.poll_persistence(Instant::now());
    }
    assert_eq!(storage.write_count(), 0);

    assert!(store.poll_persistence(Instant::now() + Duration::from_millis(300)));
    assert_eq!(storage.write_count(), 1);
    assert!(!store.poll_persistence(Instant::now() + Duration::from_secs(5)));

    let saved = EditorDocument::from_json(&storage.snapshot().unwrap()).unwrap();
    assert_eq!(saved.nodes[&id].x, 19.0);
}

#[test]
fn pending_changes_are_flushed_on_drop() {
    let storage = MemoryStorage::new();
    let id = {
        let mut store = EditorStore::new(EditorConfig::default(), Box::new(storage.clone()));
        store.add_node(7.0, 8.0)
    };

    assert_eq!(storage.write_count(), 1);
    let restored = EditorStore::new(EditorConfig::default(), Box::new(storage.clone()));
    assert_eq!(restored.node(&id).unwrap().position(), Point::new(7.0, 8.0));
    assert!(!restored.can_undo());
}

#[test]
fn corrupt_snapshot_starts_empty_with_warning() {
    let store = EditorStore::new(
        EditorConfig::default(),
        Box::new(MemoryStorage::with_snapshot("{\"nodes\": 42}")),
    );

    assert!(store.document().nodes.is_empty());
    assert_eq!(store.warnings().len(), 1);
}

/// Storage whose writes fail while the shared switch is on.
#[derive(Clone, Default)]
struct FlakyStorage {
    failing: Rc<Cell<bool>>,
    inner: MemoryStorage,
}

impl Storage for FlakyStorage {
    fn load(&self) -> anyhow::Result<Option<String>> {
        self.inner.load()
    }

    fn save(&mut self, snapshot: &str) -> anyhow::Result<()> {
        if self.failing.get() {
            return Err(anyhow!("disk full"));
        }
        self.inner.save(snapshot)
    }

    fn clear(&mut self) -> anyhow::Result<()> {
        self.inner.clear()
    }
}

#[test]
fn repeated_save_failures_warn_once() {
    let mut store = EditorStore::new(EditorConfig::default(), Box::new(FailingStorage));
    store.add_node(0.0, 0.0);

    let later = Instant::now() + Duration::from_secs(5);
    for step in 0..1000 {
        assert!(!store.poll_persistence(later + Duration::from_millis(step)));
    }

    assert_eq!(store.warnings().len(), 1);
    assert!(store.has_pending_changes());
}

#[test]
fn save_failure_warns_again_after_recovery() {
    let storage = FlakyStorage::default();
    storage.failing.set(true);
    let mut store = EditorStore::new(EditorConfig::default(), Box::new(storage.clone()));

    store.add_node(0.0, 0.0);
    assert!(!store.flush());
    assert!(!store.flush());
    assert_eq!(store.warnings().len(), 1);

    storage.failing.set(false);
    assert!(store.flush());
    assert_eq!(storage.inner.write_count(), 1);

    storage.failing.set(true);
    store.add_node(10.0, 0.0);
    assert!(!store.flush());
    assert_eq!(store.warnings().len(), 2);
}

#[test]
fn storage_failures_become_warnings() {
    let mut store = EditorStore::new(EditorConfig::default(), Box::new(FailingStorage));
    store.add_node(0.0, 0.0);

    assert!(!store.flush());
    assert!(store.has_pending_changes());
    store.clear_all();

    let warnings = store.take_warnings();
    assert_eq!(warnings.len(), 2);
    assert!(warnings[0].contains("disk full"));
    assert!(store.warnings().is_empty());
}
