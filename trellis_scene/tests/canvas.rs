// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Whole-canvas scenarios: indexed queries agree with brute force.

use kurbo::{Point, Rect};
use trellis_scene::{NodeId, QueryFilter, Tree};

/// Cards in nested frames, some rotated, some hidden.
fn build(tree: &mut Tree) -> (NodeId, Vec<NodeId>) {
    let canvas = tree.create_node(20_000.0, 20_000.0);
    let mut cards = Vec::new();
    for f in 0..6_u32 {
        let frame = tree.create_node(1200.0, 1200.0);
        tree.set_position(frame, f64::from(f % 3) * 1500.0, f64::from(f / 3) * 1500.0);
        tree.add_child_untracked(canvas, frame);
        for i in 0..60_u32 {
            let card = tree.create_node(80.0, 50.0);
            tree.set_position(card, f64::from(i % 10) * 110.0 + 20.0, f64::from(i / 10) * 90.0 + 20.0);
            if i % 7 == 0 {
                tree.set_rotation(card, 0.3);
            }
            if i % 11 == 0 {
                tree.set_visible(card, false);
            }
            tree.add_child_untracked(frame, card);
            cards.push(card);
        }
        tree.rebuild_child_index(frame);
    }
    tree.rebuild_child_index(canvas);
    (canvas, cards)
}

fn brute_force_pick(tree: &mut Tree, cards: &[NodeId], p: Point) -> Option<NodeId> {
    cards
        .iter()
        .rev()
        .copied()
        .find(|&c| tree.flags(c).unwrap().contains(trellis_scene::NodeFlags::VISIBLE) && tree.hit_test_node(c, p))
}

#[test]
fn indexed_picking_matches_brute_force() {
    let mut tree = Tree::new();
    let (canvas, cards) = build(&mut tree);
    for step in 0..400_u32 {
        let p = Point::new(f64::from(step * 37 % 4200), f64::from(step * 53 % 2800));
        let expected = brute_force_pick(&mut tree, &cards, p);
        let got = tree
            .hit_test(canvas, p, QueryFilter::PICKING)
            .map(|h| h.node)
            .filter(|n| cards.contains(n));
        assert_eq!(got, expected, "point {p:?}");
    }
}

#[test]
fn moved_cards_are_found_at_their_new_place() {
    let mut tree = Tree::new();
    let (canvas, cards) = build(&mut tree);
    let card = cards[5];
    let frame = tree.parent(card).unwrap();
    tree.set_position(card, 900.0, 1100.0);
    let p = Point::new(910.0, 1110.0);
    let hit = tree.hit_test(canvas, p, QueryFilter::PICKING).unwrap();
    assert_eq!(hit.path, [canvas, frame, card]);

    // Moving the frame moves the card with it.
    tree.set_position(frame, 5000.0, 5000.0);
    let hit = tree
        .hit_test(canvas, Point::new(5910.0, 6110.0), QueryFilter::PICKING)
        .unwrap();
    assert_eq!(hit.node, card);
}

#[test]
fn visible_set_matches_brute_force() {
    let mut tree = Tree::new();
    let (canvas, cards) = build(&mut tree);
    let view = Rect::new(300.0, 200.0, 1700.0, 700.0);
    let mut visible = Vec::new();
    tree.visit_visible(canvas, view, &mut visible);
    for &card in &cards {
        let frame = tree.parent(card).unwrap();
        let shown = tree.flags(card).unwrap().contains(trellis_scene::NodeFlags::VISIBLE);
        let world = tree.world_transform(card).unwrap();
        let bounds = trellis_scene::util::transform_rect_bbox(
            world,
            Rect::from_origin_size(Point::ORIGIN, tree.size(card).unwrap()),
        );
        let frame_world = tree.world_transform(frame).unwrap();
        let frame_bounds = trellis_scene::util::transform_rect_bbox(
            frame_world,
            Rect::from_origin_size(Point::ORIGIN, tree.size(frame).unwrap()),
        );
        let expected = shown
            && trellis_scene::util::rects_touch(bounds, view)
            && trellis_scene::util::rects_touch(frame_bounds, view);
        assert_eq!(visible.contains(&card), expected, "card {card:?}");
    }
    // Paint order: every card comes after its frame.
    for (i, &n) in visible.iter().enumerate() {
        if let Some(p) = tree.parent(n) {
            assert!(visible[..i].contains(&p));
        }
    }
}
