use super::*;

use crate::error::SchematicError;
use crate::schematic::{
    Canvas, ConnectorId, EntityClass, EntityState, HandleId, ItemRef, SceneEvent, TerminalId,
    VertexId,
};

/// Two vertices `a` (one output) and `b` (one input) joined by `S1`
struct Pair {
    a: VertexId,
    b: VertexId,
    out: HandleId,
    inp: HandleId,
    conn: ConnectorId,
}

fn make_pair(canvas: &mut Canvas) -> Pair {
    let a = canvas.create_vertex("a");
    let b = canvas.create_vertex("b");
    let out = canvas.create_handle(a, EntityClass::Out).unwrap();
    let inp = canvas.create_handle(b, EntityClass::Inp).unwrap();
    let conn = canvas.connect(out, inp).unwrap();
    Pair { a, b, out, inp, conn }
}

fn record_vertex(manager: &mut ActionsManager, canvas: &mut Canvas, name: &str) -> VertexId {
    let v = canvas.create_vertex(name);
    let action: Action = CreateEntityAction::new(canvas, v).unwrap().into();
    manager.do_action(canvas, action);
    v
}

fn is_connected(canvas: &Canvas, handle: HandleId) -> bool {
    canvas.handle(handle).unwrap().connected
}

fn hidden_vertices(events: &[SceneEvent]) -> Vec<VertexId> {
    events
        .iter()
        .filter_map(|e| match e {
            SceneEvent::StateChanged(ItemRef::Vertex(v), EntityState::Hidden) => Some(*v),
            _ => None,
        })
        .collect()
}

// === Manager properties ===

#[test]
fn test_undo_stack_stays_bounded() {
    let mut canvas = Canvas::new();
    let mut manager = ActionsManager::new();

    for i in 0..10 {
        record_vertex(&mut manager, &mut canvas, &format!("v{}", i));
        assert!(manager.undo_count() <= MAX_UNDO);
    }
    assert_eq!(manager.undo_count(), MAX_UNDO);
}

#[test]
fn test_do_clears_redo() {
    let mut canvas = Canvas::new();
    let mut manager = ActionsManager::new();
    let a = record_vertex(&mut manager, &mut canvas, "a");
    let b = record_vertex(&mut manager, &mut canvas, "b");
    manager.undo(&mut canvas);
    manager.undo(&mut canvas);
    assert_eq!(manager.redo_count(), 2);

    record_vertex(&mut manager, &mut canvas, "c");
    assert_eq!(manager.redo_count(), 0);
    // Draining redo cleaned up both hidden vertices
    assert!(canvas.vertex(a).is_none());
    assert!(canvas.vertex(b).is_none());
}

#[test]
fn test_empty_undo_is_harmless() {
    let mut canvas = Canvas::new();
    let mut manager = ActionsManager::new();
    let revision = canvas.revision();

    assert!(!manager.undo(&mut canvas));
    assert_eq!(manager.undo_count(), 0);
    assert_eq!(manager.redo_count(), 0);
    assert_eq!(canvas.revision(), revision);
}

#[test]
fn test_prune_runs_before_execute() {
    let mut canvas = Canvas::new();
    let mut manager = ActionsManager::with_limit(1).unwrap();
    let v1 = canvas.create_vertex("v1");
    let v2 = canvas.create_vertex("v2");

    let action: Action = RemoveEntityAction::new(&canvas, v1).unwrap().into();
    manager.do_action(&mut canvas, action);
    canvas.drain_events();
    let action: Action = RemoveEntityAction::new(&canvas, v2).unwrap().into();
    manager.do_action(&mut canvas, action);

    let events = canvas.drain_events();
    let destroyed = events
        .iter()
        .position(|e| *e == SceneEvent::Destroyed(v1.into()))
        .unwrap();
    let hidden = events
        .iter()
        .position(|e| *e == SceneEvent::StateChanged(v2.into(), EntityState::Hidden))
        .unwrap();
    assert!(destroyed < hidden);
}

#[test]
fn test_eviction_cleans_up_hidden_vertex() {
    let mut canvas = Canvas::new();
    let mut manager = ActionsManager::new();
    let v = record_vertex(&mut manager, &mut canvas, "v");

    manager.undo(&mut canvas);
    assert_eq!(canvas.node_state(v), Some(EntityState::Hidden));
    assert!(!canvas.is_visible(v.into()));

    manager.redo(&mut canvas);
    assert_eq!(canvas.node_state(v), Some(EntityState::Active));
    assert!(canvas.is_visible(v.into()));

    // An active vertex survives eviction, so hide it again first
    let action: Action = RemoveEntityAction::new(&canvas, v).unwrap().into();
    manager.do_action(&mut canvas, action);
    for i in 0..MAX_UNDO {
        record_vertex(&mut manager, &mut canvas, &format!("w{}", i));
    }

    assert_eq!(canvas.node_state(v), None);
    assert!(canvas.vertex(v).is_none());
}

#[test]
fn test_eviction_keeps_active_vertex() {
    let mut canvas = Canvas::new();
    let mut manager = ActionsManager::new();
    let v = record_vertex(&mut manager, &mut canvas, "v");
    for i in 0..MAX_UNDO {
        record_vertex(&mut manager, &mut canvas, &format!("w{}", i));
    }
    assert_eq!(canvas.node_state(v), Some(EntityState::Active));
    assert!(canvas.vertex(v).is_some());
}

#[test]
fn test_connect_undo_redo() {
    let mut canvas = Canvas::new();
    let mut manager = ActionsManager::new();
    let p = make_pair(&mut canvas);
    let action: Action = ConnectAction::new(&canvas, p.conn).unwrap().into();
    manager.do_action(&mut canvas, action);

    manager.undo(&mut canvas);
    assert!(!is_connected(&canvas, p.out));
    assert!(!is_connected(&canvas, p.inp));

    manager.redo(&mut canvas);
    let out = canvas.handle(p.out).unwrap();
    let inp = canvas.handle(p.inp).unwrap();
    assert!(out.connected && inp.connected);
    assert_eq!(out.conjugate, Some(p.inp));
    assert_eq!(inp.conjugate, Some(p.out));
    assert_eq!(out.connector, Some(p.conn));
}

#[test]
fn test_remove_vertex_hides_connectors_until_cleanup() {
    let mut canvas = Canvas::new();
    let up = canvas.create_vertex("up");
    let mid = canvas.create_vertex("mid");
    let down = canvas.create_vertex("down");
    let up_out = canvas.create_handle(up, EntityClass::Out).unwrap();
    let mid_in = canvas.create_handle(mid, EntityClass::Inp).unwrap();
    let mid_out = canvas.create_handle(mid, EntityClass::Out).unwrap();
    let down_in = canvas.create_handle(down, EntityClass::Inp).unwrap();
    let c1 = canvas.connect(up_out, mid_in).unwrap();
    let c2 = canvas.connect(mid_out, down_in).unwrap();

    let mut action: Action = RemoveEntityAction::new(&canvas, mid).unwrap().into();
    action.execute(&mut canvas);

    assert_eq!(canvas.connector_state(c1), Some(EntityState::Hidden));
    assert_eq!(canvas.connector_state(c2), Some(EntityState::Hidden));
    assert!(canvas.connector(c1).is_some());
    assert!(canvas.connector(c2).is_some());
    assert!(!is_connected(&canvas, up_out));
    assert!(!is_connected(&canvas, down_in));

    canvas.drain_events();
    action.cleanup(&mut canvas);
    let events = canvas.drain_events();
    assert!(events.contains(&SceneEvent::Destroyed(c1.into())));
    assert!(events.contains(&SceneEvent::Destroyed(c2.into())));
    assert!(canvas.vertex(mid).is_none());
    assert_eq!(canvas.connector_count(), 0);
}

// === Round trips ===

#[test]
fn test_remove_vertex_round_trip() {
    let mut canvas = Canvas::new();
    let mut manager = ActionsManager::new();
    let p = make_pair(&mut canvas);

    let action: Action = RemoveEntityAction::new(&canvas, p.a).unwrap().into();
    manager.do_action(&mut canvas, action);
    assert_eq!(canvas.node_state(p.a), Some(EntityState::Hidden));
    assert!(canvas.find_connector("S1").is_none());

    manager.undo(&mut canvas);
    assert_eq!(canvas.node_state(p.a), Some(EntityState::Active));
    assert_eq!(canvas.connector_state(p.conn), Some(EntityState::Active));
    assert!(canvas.is_visible(p.conn.into()));
    assert_eq!(canvas.handle(p.inp).unwrap().conjugate, Some(p.out));

    manager.redo(&mut canvas);
    assert_eq!(canvas.node_state(p.a), Some(EntityState::Hidden));
    assert!(!canvas.is_visible(p.a.into()));
    assert!(canvas.is_blocked(p.a.into()));
    assert_eq!(canvas.connector_state(p.conn), Some(EntityState::Hidden));
    assert!(!is_connected(&canvas, p.inp));
}

#[test]
fn test_hidden_connector_frees_its_symbol() {
    let mut canvas = Canvas::new();
    let p = make_pair(&mut canvas);
    let mut action: Action = RemoveEntityAction::new(&canvas, p.a).unwrap().into();
    action.execute(&mut canvas);

    let c = canvas.create_vertex("c");
    let c_out = canvas.create_handle(c, EntityClass::Out).unwrap();
    let fresh = canvas.connect(c_out, p.inp).unwrap();
    assert_eq!(canvas.connector(fresh).unwrap().uid, "S1");
}

#[test]
fn test_stream_remove_round_trip() {
    let mut canvas = Canvas::new();
    let v = canvas.create_vertex("v");
    let inp = canvas.create_handle(v, EntityClass::Inp).unwrap();
    let t = canvas.create_terminal("feed", EntityClass::Out);
    let t_handle = canvas.terminal(t).unwrap().handle;
    let conn = canvas.connect(t_handle, inp).unwrap();

    let mut action: Action = RemoveStreamAction::new(&canvas, t).unwrap().into();
    action.execute(&mut canvas);
    assert_eq!(canvas.terminal_state(t), Some(EntityState::Hidden));
    assert_eq!(canvas.connector_state(conn), Some(EntityState::Hidden));
    assert!(!is_connected(&canvas, inp));
    assert!(canvas.find_terminal("feed").is_none());

    action.undo(&mut canvas);
    assert_eq!(canvas.terminal_state(t), Some(EntityState::Active));
    assert_eq!(canvas.connector_state(conn), Some(EntityState::Active));
    assert_eq!(canvas.handle(inp).unwrap().conjugate, Some(t_handle));

    action.redo(&mut canvas);
    action.cleanup(&mut canvas);
    assert!(canvas.terminal(t).is_none());
    assert!(canvas.handle(t_handle).is_none());
    assert!(canvas.connector(conn).is_none());
    assert!(!is_connected(&canvas, inp));
}

#[test]
fn test_stream_create_cleanup_gated() {
    let mut canvas = Canvas::new();
    let t: TerminalId = canvas.create_terminal("product", EntityClass::Inp);
    let mut action: Action = CreateStreamAction::new(&canvas, t).unwrap().into();

    action.cleanup(&mut canvas);
    assert!(canvas.terminal(t).is_some());

    action.undo(&mut canvas);
    assert!(!canvas.is_visible(t.into()));
    action.cleanup(&mut canvas);
    assert!(canvas.terminal(t).is_none());
    assert_eq!(canvas.terminal_state(t), None);
}

#[test]
fn test_create_handle_round_trip() {
    let mut canvas = Canvas::new();
    let v = canvas.create_vertex("v");
    let h = canvas.create_handle(v, EntityClass::Out).unwrap();
    let mut action: Action = CreateHandleAction::new(&canvas, v, h).unwrap().into();

    action.undo(&mut canvas);
    assert_eq!(canvas.handle_state(v, h), Some(EntityState::Hidden));
    assert!(!canvas.is_handle_active(h));
    assert!(!canvas.is_visible(h.into()));

    action.redo(&mut canvas);
    assert_eq!(canvas.handle_state(v, h), Some(EntityState::Active));
    assert!(canvas.is_visible(h.into()));

    action.undo(&mut canvas);
    action.cleanup(&mut canvas);
    assert!(canvas.handle(h).is_none());
    assert_eq!(canvas.vertex(v).unwrap().all_handles(), Vec::<HandleId>::new());
}

#[test]
fn test_remove_connected_handle() {
    let mut canvas = Canvas::new();
    let p = make_pair(&mut canvas);
    let mut action: Action = RemoveHandleAction::new(&canvas, p.a, p.out).unwrap().into();

    action.execute(&mut canvas);
    assert_eq!(canvas.handle_state(p.a, p.out), Some(EntityState::Hidden));
    assert_eq!(canvas.connector_state(p.conn), Some(EntityState::Hidden));
    assert!(!is_connected(&canvas, p.inp));

    action.undo(&mut canvas);
    assert_eq!(canvas.handle_state(p.a, p.out), Some(EntityState::Active));
    assert_eq!(canvas.connector_state(p.conn), Some(EntityState::Active));
    assert_eq!(canvas.handle(p.inp).unwrap().conjugate, Some(p.out));

    action.redo(&mut canvas);
    action.cleanup(&mut canvas);
    assert!(canvas.handle(p.out).is_none());
    assert!(canvas.connector(p.conn).is_none());
    assert!(canvas.handle(p.inp).is_some());
    assert!(!is_connected(&canvas, p.inp));
}

#[test]
fn test_handle_action_rejects_terminal_handle() {
    let mut canvas = Canvas::new();
    let v = canvas.create_vertex("v");
    let t = canvas.create_terminal("t", EntityClass::Out);
    let h = canvas.terminal(t).unwrap().handle;
    let uid = canvas.handle(h).unwrap().uid.clone();

    assert_eq!(
        CreateHandleAction::new(&canvas, v, h).unwrap_err(),
        SchematicError::NotVertexHandle(uid)
    );
}

#[test]
fn test_disconnect_removes_from_database() {
    let mut canvas = Canvas::new();
    let p = make_pair(&mut canvas);
    let mut action: Action = DisconnectAction::new(&canvas, p.conn).unwrap().into();

    action.execute(&mut canvas);
    assert_eq!(canvas.connector_state(p.conn), None);
    assert!(canvas.connector(p.conn).is_some());
    assert!(!canvas.is_visible(p.conn.into()));
    assert!(!is_connected(&canvas, p.out));

    action.undo(&mut canvas);
    assert_eq!(canvas.connector_state(p.conn), Some(EntityState::Active));
    assert!(is_connected(&canvas, p.out) && is_connected(&canvas, p.inp));

    // Active again: cleanup keeps it
    action.cleanup(&mut canvas);
    assert!(canvas.connector(p.conn).is_some());

    action.redo(&mut canvas);
    action.cleanup(&mut canvas);
    assert!(canvas.connector(p.conn).is_none());
}

#[test]
fn test_connect_cleanup_gated_on_state() {
    let mut canvas = Canvas::new();
    let p = make_pair(&mut canvas);
    let mut action: Action = ConnectAction::new(&canvas, p.conn).unwrap().into();

    action.cleanup(&mut canvas);
    assert_eq!(canvas.connector_state(p.conn), Some(EntityState::Active));

    action.undo(&mut canvas);
    assert_eq!(canvas.connector_state(p.conn), Some(EntityState::Hidden));
    action.cleanup(&mut canvas);
    assert!(canvas.connector(p.conn).is_none());
    assert_eq!(canvas.connector_state(p.conn), None);
}

// === Batches ===

#[test]
fn test_batch_undo_runs_in_reverse() {
    let mut canvas = Canvas::new();
    let mut manager = ActionsManager::new();
    let ids: Vec<VertexId> = ["a1", "a2", "a3"].iter().map(|n| canvas.create_vertex(n)).collect();

    let batch: BatchActions = ids
        .iter()
        .map(|v| Action::from(CreateEntityAction::new(&canvas, *v).unwrap()))
        .collect();
    manager.do_action(&mut canvas, batch.into());
    canvas.drain_events();

    manager.undo(&mut canvas);
    let order = hidden_vertices(&canvas.drain_events());
    assert_eq!(order, vec![ids[2], ids[1], ids[0]]);
}

#[test]
fn test_batch_execute_runs_forward() {
    let mut canvas = Canvas::new();
    let ids: Vec<VertexId> = ["a1", "a2"].iter().map(|n| canvas.create_vertex(n)).collect();
    let mut batch = BatchActions::new();
    batch.add_to_batch(
        ids.iter()
            .map(|v| Action::from(RemoveEntityAction::new(&canvas, *v).unwrap())),
    );
    assert_eq!(batch.size(), 2);

    canvas.drain_events();
    batch.execute(&mut canvas);
    assert_eq!(hidden_vertices(&canvas.drain_events()), ids);
}

#[test]
fn test_batch_of_handle_and_vertex_cleans_up_once() {
    let mut canvas = Canvas::new();
    let p = make_pair(&mut canvas);
    let mut batch = BatchActions::new();
    batch.push(RemoveHandleAction::new(&canvas, p.a, p.out).unwrap());
    batch.push(RemoveEntityAction::new(&canvas, p.a).unwrap());
    let mut action: Action = batch.into();

    action.execute(&mut canvas);
    action.cleanup(&mut canvas);
    action.cleanup(&mut canvas);

    assert!(canvas.vertex(p.a).is_none());
    assert!(canvas.handle(p.out).is_none());
    assert!(canvas.connector(p.conn).is_none());
    assert!(canvas.vertex(p.b).is_some());
    assert!(!is_connected(&canvas, p.inp));
}

#[test]
fn test_batch_undo_restores_handle_and_vertex() {
    let mut canvas = Canvas::new();
    let p = make_pair(&mut canvas);
    let mut batch = BatchActions::new();
    batch.push(RemoveHandleAction::new(&canvas, p.a, p.out).unwrap());
    batch.push(RemoveEntityAction::new(&canvas, p.a).unwrap());
    let mut action: Action = batch.into();

    action.execute(&mut canvas);
    action.undo(&mut canvas);
    assert_eq!(canvas.node_state(p.a), Some(EntityState::Active));
    assert_eq!(canvas.handle_state(p.a, p.out), Some(EntityState::Active));
    assert_eq!(canvas.connector_state(p.conn), Some(EntityState::Active));
    assert!(is_connected(&canvas, p.inp));
}

#[test]
fn test_batch_obsolete_only_when_all_children_are() {
    let mut canvas = Canvas::new();
    let a = canvas.create_vertex("a");
    let b = canvas.create_vertex("b");
    let mut batch = BatchActions::new();
    batch.add_to_batch([Action::from(CreateEntityAction::new(&canvas, a).unwrap())]);
    batch.add_to_batch([Action::from(CreateEntityAction::new(&canvas, b).unwrap())]);

    canvas.destroy(a.into());
    assert!(!batch.is_obsolete(&canvas));
    canvas.destroy(b.into());
    assert!(batch.is_obsolete(&canvas));
    assert!(!BatchActions::new().is_obsolete(&canvas));
}

// === Obsolescence ===

#[test]
fn test_obsolete_action_does_nothing() {
    let mut canvas = Canvas::new();
    let p = make_pair(&mut canvas);
    let feed = canvas.create_terminal("feed", EntityClass::Out);
    let batch: BatchActions = [
        Action::from(RemoveEntityAction::new(&canvas, p.b).unwrap()),
        Action::from(RemoveStreamAction::new(&canvas, feed).unwrap()),
    ]
    .into_iter()
    .collect();
    let mut actions: Vec<Action> = vec![
        CreateEntityAction::new(&canvas, p.a).unwrap().into(),
        RemoveEntityAction::new(&canvas, p.a).unwrap().into(),
        CreateStreamAction::new(&canvas, feed).unwrap().into(),
        RemoveStreamAction::new(&canvas, feed).unwrap().into(),
        CreateHandleAction::new(&canvas, p.b, p.inp).unwrap().into(),
        RemoveHandleAction::new(&canvas, p.a, p.out).unwrap().into(),
        ConnectAction::new(&canvas, p.conn).unwrap().into(),
        DisconnectAction::new(&canvas, p.conn).unwrap().into(),
        batch.into(),
    ];

    for action in &mut actions {
        action.set_obsolete();
        assert!(action.is_obsolete(&canvas));
        let revision = canvas.revision();
        action.execute(&mut canvas);
        action.undo(&mut canvas);
        action.redo(&mut canvas);
        action.cleanup(&mut canvas);
        assert_eq!(canvas.revision(), revision, "{} mutated the canvas", action.label());
    }
}

#[test]
fn test_remove_vertex_leaves_rewired_conjugate_alone() {
    let mut canvas = Canvas::new();
    let mut manager = ActionsManager::new();
    let p = make_pair(&mut canvas);

    let action: Action = RemoveHandleAction::new(&canvas, p.a, p.out).unwrap().into();
    manager.do_action(&mut canvas, action);
    assert!(!is_connected(&canvas, p.inp));

    // inp moves to a new connector while a.out still remembers S1
    let c = canvas.create_vertex("c");
    let c_out = canvas.create_handle(c, EntityClass::Out).unwrap();
    let y = canvas.connect(c_out, p.inp).unwrap();
    let action: Action = ConnectAction::new(&canvas, y).unwrap().into();
    manager.do_action(&mut canvas, action);

    let action: Action = RemoveEntityAction::new(&canvas, p.a).unwrap().into();
    manager.do_action(&mut canvas, action);
    let inp = canvas.handle(p.inp).unwrap();
    assert!(inp.connected);
    assert_eq!(inp.connector, Some(y));
    assert_eq!(canvas.connector_state(y), Some(EntityState::Active));
    assert_eq!(canvas.connector_state(p.conn), Some(EntityState::Hidden));

    assert!(manager.undo(&mut canvas));
    let inp = canvas.handle(p.inp).unwrap();
    assert_eq!(inp.connector, Some(y));
    assert_eq!(inp.conjugate, Some(c_out));
    assert_eq!(canvas.connector_state(p.conn), Some(EntityState::Hidden));

    // Unwinding the rest hands inp back to S1
    assert!(manager.undo(&mut canvas));
    assert!(manager.undo(&mut canvas));
    let inp = canvas.handle(p.inp).unwrap();
    assert_eq!(inp.connector, Some(p.conn));
    assert_eq!(inp.conjugate, Some(p.out));
    assert_eq!(canvas.connector_state(p.conn), Some(EntityState::Active));
    assert_eq!(canvas.connector_state(y), Some(EntityState::Hidden));
}

#[test]
fn test_set_relevant_clears_flag() {
    let mut canvas = Canvas::new();
    let v = canvas.create_vertex("v");
    let mut action: Action = CreateEntityAction::new(&canvas, v).unwrap().into();

    action.set_obsolete();
    assert!(action.is_obsolete(&canvas));
    action.set_relevant();
    assert!(!action.is_obsolete(&canvas));

    action.undo(&mut canvas);
    assert_eq!(canvas.node_state(v), Some(EntityState::Hidden));
}

#[test]
fn test_out_of_band_destroy_makes_action_obsolete() {
    let mut canvas = Canvas::new();
    let mut manager = ActionsManager::new();
    let v = record_vertex(&mut manager, &mut canvas, "v");

    canvas.destroy(v.into());
    let revision = canvas.revision();
    assert!(manager.peek_undo().is_some_and(|a| a.is_obsolete(&canvas)));

    assert!(manager.undo(&mut canvas));
    assert!(manager.redo(&mut canvas));
    manager.wipe_stack(&mut canvas);
    assert_eq!(canvas.revision(), revision);
}

#[test]
fn test_obsolete_stays_latched_after_skip() {
    let mut canvas = Canvas::new();
    let v = canvas.create_vertex("v");
    let mut action: Action = CreateEntityAction::new(&canvas, v).unwrap().into();
    canvas.destroy(v.into());

    action.undo(&mut canvas);
    action.set_relevant();
    // The key is still dead, so the action stays obsolete
    assert!(action.is_obsolete(&canvas));
}

#[test]
fn test_canvas_reset_makes_actions_obsolete() {
    let mut canvas = Canvas::new();
    let p = make_pair(&mut canvas);
    let action: Action = ConnectAction::new(&canvas, p.conn).unwrap().into();
    assert!(!action.is_obsolete(&canvas));

    canvas.reset();
    assert!(action.is_obsolete(&canvas));
}

#[test]
fn test_dead_reference_rejected_at_construction() {
    let mut canvas = Canvas::new();
    let p = make_pair(&mut canvas);
    canvas.destroy(p.conn.into());
    canvas.destroy(p.b.into());

    assert_eq!(
        ConnectAction::new(&canvas, p.conn).unwrap_err(),
        SchematicError::DeadConnector
    );
    assert_eq!(
        RemoveEntityAction::new(&canvas, p.b).unwrap_err(),
        SchematicError::DeadVertex
    );
}
