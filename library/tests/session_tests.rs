//! Integration tests for the session facade: selection, snapshots and
//! on-demand plotting.

use std::collections::HashMap;

use library::create_plugin_manager;
use library::error::LibraryError;
use library::model::graphics::PlotCommand;
use library::model::property::PropertyValue;
use library::model::tree::{Tree, TreeCollection};
use library::pipeline::StageSnapshot;
use library::plugin::PluginCategory;
use library::session::Session;

fn sample_collection() -> TreeCollection {
    let mut tree = Tree::new();
    let inner = tree.add_child(0, None, Some(1.0));
    tree.add_child(inner, Some("A"), Some(1.0));
    tree.add_child(inner, Some("B"), Some(2.0));
    tree.add_child(0, Some("C"), Some(3.0));
    vec![tree]
}

fn setup_full_pipeline() -> Session {
    let mut session = Session::new(create_plugin_manager());
    session.load_subject(sample_collection()).unwrap();
    session
        .enable_module(PluginCategory::Transformer, "first_tree", HashMap::new())
        .unwrap();
    session
        .enable_module(
            PluginCategory::FurtherTransformation,
            "sort_nodes",
            HashMap::new(),
        )
        .unwrap();
    session
        .enable_module(PluginCategory::Coordinate, "rectangular", HashMap::new())
        .unwrap();
    session
        .enable_module(PluginCategory::PlotAction, "branches", HashMap::new())
        .unwrap();
    session
        .enable_module(PluginCategory::PlotAction, "labels", HashMap::new())
        .unwrap();
    session
}

#[test]
fn selection_degrades_to_none_when_the_stage_is_removed() {
    let mut session = setup_full_pipeline();
    let handle = session
        .enable_module(
            PluginCategory::FurtherTransformation,
            "add_attribute",
            HashMap::from([("attribute_name".to_string(), PropertyValue::from("x"))]),
        )
        .unwrap();

    session.select_module(handle).unwrap();
    session.select_option("attribute_name").unwrap();
    assert!(session.selected_module().is_some());
    assert_eq!(session.selected_option(), Some("attribute_name"));

    // 選択中のステージを外すと選択は「なし」に戻る
    session.disable_module(handle).unwrap();
    assert!(session.selected_module().is_none());
    assert!(session.selected_option().is_none());
}

#[test]
fn selecting_a_stale_handle_is_an_error() {
    let mut session = setup_full_pipeline();
    let handle = session
        .enable_module(
            PluginCategory::FurtherTransformation,
            "add_attribute",
            HashMap::new(),
        )
        .unwrap();
    session.disable_module(handle).unwrap();
    assert!(matches!(
        session.select_module(handle),
        Err(LibraryError::StageNotFound(_))
    ));
}

#[test]
fn selecting_an_unknown_option_is_an_error() {
    let mut session = setup_full_pipeline();
    let handle = session.graph().transformer().unwrap().handle();
    session.select_module(handle).unwrap();
    assert!(matches!(
        session.select_option("ghost"),
        Err(LibraryError::InvalidArgument(_))
    ));
}

#[test]
fn snapshot_lists_stages_in_pipeline_order() {
    let mut session = setup_full_pipeline();
    session.recompute().unwrap();

    let snapshot = session.snapshot();
    let categories: Vec<_> = snapshot.iter().map(|stage| stage.category).collect();
    assert_eq!(
        categories,
        [
            PluginCategory::Transformer,
            PluginCategory::FurtherTransformation,
            PluginCategory::Coordinate,
            PluginCategory::PlotAction,
            PluginCategory::PlotAction,
        ]
    );
    assert_eq!(snapshot[0].module_id, "first_tree");
    assert!(snapshot[0].values.contains_key("tree_index"));

    // 外部永続化のための JSON 往復
    let json = serde_json::to_string(&snapshot).unwrap();
    let restored: Vec<StageSnapshot> = serde_json::from_str(&json).unwrap();
    assert_eq!(snapshot, restored);
}

#[test]
fn render_replays_actions_in_stage_order() {
    let mut session = setup_full_pipeline();
    session.recompute().unwrap();

    let output = session.render().unwrap();
    assert!(!output.commands.is_empty());
    assert_eq!(output.action_bounds.len(), 2);
    assert!(!output.bounds.is_empty());

    // branches が先、labels が後 (ステージ順)
    let first_text = output
        .commands
        .iter()
        .position(|command| matches!(command, PlotCommand::Text { .. }))
        .unwrap();
    let last_line = output
        .commands
        .iter()
        .rposition(|command| matches!(command, PlotCommand::Line { .. }))
        .unwrap();
    assert!(last_line < first_text);

    // 葉は 3 枚 → ラベルも 3 つ
    let labels = output
        .commands
        .iter()
        .filter(|command| matches!(command, PlotCommand::Text { .. }))
        .count();
    assert_eq!(labels, 3);
}

#[test]
fn render_requires_coordinates() {
    let mut session = Session::new(create_plugin_manager());
    session.load_subject(sample_collection()).unwrap();
    session
        .enable_module(PluginCategory::Transformer, "first_tree", HashMap::new())
        .unwrap();
    session.recompute().unwrap();
    assert!(matches!(
        session.render(),
        Err(LibraryError::MissingPrerequisite(_))
    ));
}

#[test]
fn plot_parameter_changes_do_not_dirty_the_graph() {
    let mut session = setup_full_pipeline();
    session.recompute().unwrap();
    assert!(session.graph().dirty().is_clean());

    let handle = session.graph().plot_actions()[0].handle();
    assert!(session
        .set_parameter(handle, "line_width", PropertyValue::from(2.5))
        .unwrap());
    // プロットはキャッシュされないので再計算は不要
    assert!(session.graph().dirty().is_clean());
    assert!(session.render().is_ok());
}

#[test]
fn progress_callback_receives_fractions() {
    let mut session = setup_full_pipeline();
    let mut reports = Vec::new();
    session
        .recompute_with_progress(&mut |fraction| reports.push(fraction))
        .unwrap();
    assert!(!reports.is_empty());
    assert!(reports.iter().all(|f| (0.0..=1.0).contains(f)));
}

#[test]
fn attribute_index_tracks_the_final_tree() {
    let mut session = setup_full_pipeline();
    session.recompute().unwrap();
    assert!(session.attribute_names().is_empty());

    session
        .enable_module(
            PluginCategory::FurtherTransformation,
            "add_attribute",
            HashMap::from([
                ("attribute_name".to_string(), PropertyValue::from("habitat")),
                ("new_value".to_string(), PropertyValue::from("marine")),
            ]),
        )
        .unwrap();
    session.recompute().unwrap();
    assert_eq!(session.attribute_names(), ["habitat"]);
}

#[test]
fn moving_plot_actions_reorders_the_replay() {
    let mut session = setup_full_pipeline();
    session.recompute().unwrap();

    let labels = session.graph().plot_actions()[1].handle();
    session.move_module_up(labels).unwrap();
    // プロットの並べ替えは何もダーティにしない
    assert!(session.graph().dirty().is_clean());

    let output = session.render().unwrap();
    let first_line = output
        .commands
        .iter()
        .position(|command| matches!(command, PlotCommand::Line { .. }))
        .unwrap();
    let first_text = output
        .commands
        .iter()
        .position(|command| matches!(command, PlotCommand::Text { .. }))
        .unwrap();
    assert!(first_text < first_line);
}
