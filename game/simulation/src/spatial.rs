use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ahash::AHashMap;
use common::*;

use crate::ecs::*;
use crate::{ColliderComponent, TransformComponent};

/// Axis-aligned bounding box in world units (§4.3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Aabb {
    pub fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        debug_assert!(min_x <= max_x && min_y <= max_y);
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn from_radius(centre: Point2, radius: f32) -> Self {
        Self::new(
            centre.x - radius,
            centre.y - radius,
            centre.x + radius,
            centre.y + radius,
        )
    }

    pub fn from_point(p: Point2) -> Self {
        Self::new(p.x, p.y, p.x, p.y)
    }

    pub fn centre(&self) -> Point2 {
        Point2::new((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// §4.3 edge policy: an entity is only homed in a child if *all four corners* fit inside it.
    pub fn fully_contains(&self, other: &Aabb) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    pub fn contains_point(&self, p: Point2) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    /// Squared distance from a point to the nearest point on this box; `0` if inside.
    pub fn distance2_to_point(&self, p: Point2) -> f32 {
        let dx = (self.min_x - p.x).max(0.0).max(p.x - self.max_x);
        let dy = (self.min_y - p.y).max(0.0).max(p.y - self.max_y);
        dx * dx + dy * dy
    }

    fn quadrant(&self, idx: usize) -> Aabb {
        let cx = (self.min_x + self.max_x) / 2.0;
        let cy = (self.min_y + self.max_y) / 2.0;
        match idx {
            0 => Aabb::new(self.min_x, self.min_y, cx, cy), // bottom-left
            1 => Aabb::new(cx, self.min_y, self.max_x, cy), // bottom-right
            2 => Aabb::new(self.min_x, cy, cx, self.max_y), // top-left
            _ => Aabb::new(cx, cy, self.max_x, self.max_y), // top-right
        }
    }
}

struct Node {
    bounds: Aabb,
    depth: u32,
    entries: Vec<(Entity, Aabb)>,
    children: Option<Box<[Node; 4]>>,
}

impl Node {
    fn new(bounds: Aabb, depth: u32) -> Self {
        Self {
            bounds,
            depth,
            entries: Vec::new(),
            children: None,
        }
    }

    fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

/// Quadtree over entity AABBs, parameterised by `max_entities_per_node` and `max_depth` (§4.3).
///
/// Entities are homed at the deepest node whose bounds fully contain their AABB (all four
/// corners); an entity straddling a child boundary stays at the parent. Traversal is done with an
/// explicit stack rather than recursion so query cost is bounded regardless of tree depth.
pub struct QuadTree {
    root: Node,
    max_entities_per_node: usize,
    max_depth: u32,
    locations: AHashMap<Entity, Aabb>,
    len: usize,
}

impl QuadTree {
    pub fn new(world_bounds: Aabb, max_entities_per_node: usize, max_depth: u32) -> Self {
        Self {
            root: Node::new(world_bounds, 0),
            max_entities_per_node,
            max_depth,
            locations: AHashMap::default(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, id: Entity) -> bool {
        self.locations.contains_key(&id)
    }

    /// O(log n) amortized; subdivides the target node when it exceeds capacity (§4.3).
    pub fn insert(&mut self, id: Entity, aabb: Aabb) {
        if self.locations.insert(id, aabb).is_some() {
            // already present under a (possibly) different box; treat as update
            self.remove_from_tree(id, aabb);
        }
        self.len += 1;
        Self::insert_into(
            &mut self.root,
            id,
            aabb,
            self.max_entities_per_node,
            self.max_depth,
        );
    }

    fn insert_into(node: &mut Node, id: Entity, aabb: Aabb, max_entries: usize, max_depth: u32) {
        if node.is_leaf() {
            node.entries.push((id, aabb));
            if node.entries.len() > max_entries && node.depth < max_depth {
                Self::subdivide(node, max_entries, max_depth);
            }
            return;
        }

        let children = node.children.as_mut().unwrap();
        if let Some(child) = children.iter_mut().find(|c| c.bounds.fully_contains(&aabb)) {
            Self::insert_into(child, id, aabb, max_entries, max_depth);
        } else {
            // straddles a boundary: stays at this (ancestor) level
            node.entries.push((id, aabb));
        }
    }

    fn subdivide(node: &mut Node, max_entries: usize, max_depth: u32) {
        let depth = node.depth + 1;
        let mut children = Box::new([
            Node::new(node.bounds.quadrant(0), depth),
            Node::new(node.bounds.quadrant(1), depth),
            Node::new(node.bounds.quadrant(2), depth),
            Node::new(node.bounds.quadrant(3), depth),
        ]);

        let entries = std::mem::take(&mut node.entries);
        for (id, aabb) in entries {
            if let Some(child) = children.iter_mut().find(|c| c.bounds.fully_contains(&aabb)) {
                Self::insert_into(child, id, aabb, max_entries, max_depth);
            } else {
                node.entries.push((id, aabb));
            }
        }

        node.children = Some(children);
    }

    /// O(log n); re-homes the entity if its new AABB crosses a node boundary (§4.3).
    pub fn update(&mut self, id: Entity, new_aabb: Aabb) {
        if let Some(&old_aabb) = self.locations.get(&id) {
            self.remove_from_tree(id, old_aabb);
            self.len -= 1;
        }
        self.insert(id, new_aabb);
    }

    /// O(log n).
    pub fn remove(&mut self, id: Entity) {
        if let Some(aabb) = self.locations.remove(&id) {
            self.remove_from_tree(id, aabb);
            self.len -= 1;
        }
    }

    fn remove_from_tree(&mut self, id: Entity, aabb: Aabb) {
        Self::remove_from(&mut self.root, id, &aabb);
    }

    fn remove_from(node: &mut Node, id: Entity, aabb: &Aabb) -> bool {
        if let Some(idx) = node.entries.iter().position(|(e, _)| *e == id) {
            node.entries.swap_remove(idx);
            return true;
        }
        if let Some(children) = node.children.as_mut() {
            if let Some(child) = children.iter_mut().find(|c| c.bounds.fully_contains(aabb)) {
                return Self::remove_from(child, id, aabb);
            }
        }
        false
    }

    pub fn clear(&mut self) {
        let bounds = self.root.bounds;
        self.root = Node::new(bounds, 0);
        self.locations.clear();
        self.len = 0;
    }

    /// All ids whose stored AABB intersects `query`; no false negatives (§4.3).
    pub fn query_rect(&self, query: Aabb) -> Vec<Entity> {
        let mut out = Vec::new();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if !node.bounds.intersects(&query) {
                continue;
            }
            for (id, aabb) in &node.entries {
                if aabb.intersects(&query) {
                    out.push(*id);
                }
            }
            if let Some(children) = &node.children {
                stack.extend(children.iter());
            }
        }
        out
    }

    /// All ids whose stored AABB intersects the circle `(centre, radius)`.
    pub fn query_radius(&self, centre: Point2, radius: f32) -> Vec<Entity> {
        let query = Aabb::from_radius(centre, radius);
        let radius2 = radius * radius;
        self.query_rect(query)
            .into_iter()
            .filter(|id| {
                let aabb = self.locations[id];
                aabb_circle_distance2(&aabb, centre) <= radius2
            })
            .collect()
    }

    /// Best-first nearest-neighbour search pruning by node distance (§4.3).
    pub fn nearest<F: Fn(Entity) -> bool>(&self, p: Point2, filter: F) -> Option<Entity> {
        #[derive(PartialEq)]
        struct HeapEntry<'a> {
            dist2: f32,
            item: Item<'a>,
        }
        enum Item<'a> {
            Node(&'a Node),
            Entity(Entity),
        }
        impl Eq for HeapEntry<'_> {}
        impl PartialOrd for HeapEntry<'_> {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }
        impl Ord for HeapEntry<'_> {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                OrderedFloat(self.dist2).cmp(&OrderedFloat(other.dist2))
            }
        }

        let mut heap: BinaryHeap<Reverse<HeapEntry>> = BinaryHeap::new();
        heap.push(Reverse(HeapEntry {
            dist2: self.root.bounds.distance2_to_point(p),
            item: Item::Node(&self.root),
        }));

        while let Some(Reverse(HeapEntry { item, .. })) = heap.pop() {
            match item {
                Item::Entity(id) => {
                    if filter(id) {
                        return Some(id);
                    }
                }
                Item::Node(node) => {
                    for (id, aabb) in &node.entries {
                        heap.push(Reverse(HeapEntry {
                            dist2: aabb.distance2_to_point(p),
                            item: Item::Entity(*id),
                        }));
                    }
                    if let Some(children) = &node.children {
                        for child in children.iter() {
                            heap.push(Reverse(HeapEntry {
                                dist2: child.bounds.distance2_to_point(p),
                                item: Item::Node(child),
                            }));
                        }
                    }
                }
            }
        }

        None
    }
}

fn aabb_circle_distance2(aabb: &Aabb, centre: Point2) -> f32 {
    aabb.distance2_to_point(centre)
}

/// Resource wrapper owning the quadtree plus the bookkeeping needed to keep it in sync with
/// `Transform`+`Collider` each tick (invariant 2, §3).
pub struct Spatial {
    tree: QuadTree,
    moved_since_rebuild: usize,
    total_tracked: usize,
    rebuild_threshold: f32,
}

impl Spatial {
    pub fn new(world_bounds: Aabb) -> Self {
        let cfg = config::get();
        Self {
            tree: QuadTree::new(
                world_bounds,
                cfg.spatial.max_entities_per_node,
                cfg.spatial.max_depth,
            ),
            moved_since_rebuild: 0,
            total_tracked: 0,
            rebuild_threshold: cfg.spatial.rebuild_threshold,
        }
    }

    pub fn tree(&self) -> &QuadTree {
        &self.tree
    }

    pub fn query_rect(&self, aabb: Aabb) -> Vec<Entity> {
        self.tree.query_rect(aabb)
    }

    pub fn query_radius(&self, centre: Point2, radius: f32) -> Vec<Entity> {
        self.tree.query_radius(centre, radius)
    }

    pub fn nearest<F: Fn(Entity) -> bool>(&self, p: Point2, filter: F) -> Option<Entity> {
        self.tree.nearest(p, filter)
    }

    fn note_move(&mut self) {
        self.moved_since_rebuild += 1;
    }

    /// §4.3 rebuild policy: full rebuild is permitted once enough of the tracked population has
    /// moved since the last one; otherwise incremental `update` calls are used.
    fn should_rebuild(&self) -> bool {
        self.total_tracked > 0
            && (self.moved_since_rebuild as f32 / self.total_tracked as f32) > self.rebuild_threshold
    }
}

impl Default for Spatial {
    fn default() -> Self {
        // sized generously; callers should construct via `new` with the real map bounds once
        // known, this only exists to satisfy `specs::World`'s `Default` resource requirement
        Self::new(Aabb::new(-1.0e6, -1.0e6, 1.0e6, 1.0e6))
    }
}

/// Keeps [Spatial] synchronised with every live `Transform`+`Collider` entity (invariant 2, §3).
pub struct SpatialSystem;

impl<'a> System<'a> for SpatialSystem {
    type SystemData = (
        Read<'a, EntitiesRes>,
        ReadStorage<'a, TransformComponent>,
        ReadStorage<'a, ColliderComponent>,
        Write<'a, Spatial>,
    );

    fn run(&mut self, (entities, transforms, colliders, mut spatial): Self::SystemData) {
        if spatial.should_rebuild() {
            spatial.tree.clear();
            spatial.total_tracked = 0;
            spatial.moved_since_rebuild = 0;
        }

        let mut seen = 0usize;
        for (e, transform, collider) in (&entities, &transforms, &colliders).join() {
            let id: Entity = e.into();
            let aabb = collider.derive_aabb(transform.position());
            seen += 1;

            if spatial.tree.contains(id) {
                spatial.tree.update(id, aabb);
                spatial.note_move();
            } else {
                spatial.tree.insert(id, aabb);
            }
        }

        spatial.total_tracked = seen;

        // drop entries for entities that no longer have Transform+Collider (destroyed, or
        // component removed this tick) - collected separately to avoid borrow conflicts
        let stale: Vec<Entity> = spatial
            .tree
            .locations
            .keys()
            .copied()
            .filter(|id| {
                let raw: specs::Entity = (*id).into();
                !entities.is_alive(raw) || !transforms.contains(raw) || !colliders.contains(raw)
            })
            .collect();
        for id in stale {
            spatial.tree.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use specs::WorldExt;

    fn bounds() -> Aabb {
        Aabb::new(-1000.0, -1000.0, 1000.0, 1000.0)
    }

    fn make_entities(n: usize) -> (specs::World, Vec<specs::Entity>) {
        let mut world = specs::World::new();
        let entities: Vec<_> = (0..n).map(|_| world.create_entity().build()).collect();
        (world, entities)
    }

    #[test]
    fn empty_tree_returns_empty_for_all_queries() {
        let tree = QuadTree::new(bounds(), 4, 4);
        assert!(tree.query_rect(bounds()).is_empty());
        assert!(tree.query_radius(Point2::new(0.0, 0.0), 10.0).is_empty());
        assert!(tree.nearest(Point2::new(0.0, 0.0), |_| true).is_none());
    }

    #[test]
    fn insert_remove_round_trip_leaves_tree_empty() {
        let (_world, ids) = make_entities(50);
        let mut tree = QuadTree::new(bounds(), 4, 6);
        for (i, &e) in ids.iter().enumerate() {
            let x = (i as f32) * 3.0 - 75.0;
            tree.insert(e.into(), Aabb::from_radius(Point2::new(x, 0.0), 1.0));
        }
        assert_eq!(tree.len(), ids.len());
        for &e in &ids {
            tree.remove(e.into());
        }
        assert_eq!(tree.len(), 0);
        assert!(tree.query_rect(bounds()).is_empty());
    }

    #[test]
    fn quadtree_completeness_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(42);
        let (_world, ids) = make_entities(200);
        let mut tree = QuadTree::new(bounds(), 10, 8);
        let mut brute: Vec<(Entity, Aabb)> = Vec::new();

        for &e in &ids {
            let x = rng.gen_range(-900.0, 900.0);
            let y = rng.gen_range(-900.0, 900.0);
            let r = rng.gen_range(0.5, 5.0);
            let aabb = Aabb::from_radius(Point2::new(x, y), r);
            tree.insert(e.into(), aabb);
            brute.push((e.into(), aabb));
        }

        for _ in 0..20 {
            let x = rng.gen_range(-900.0, 900.0);
            let y = rng.gen_range(-900.0, 900.0);
            let query = Aabb::new(x, y, x + rng.gen_range(1.0, 200.0), y + rng.gen_range(1.0, 200.0));

            let mut expected: Vec<Entity> = brute
                .iter()
                .filter(|(_, aabb)| aabb.intersects(&query))
                .map(|(id, _)| *id)
                .collect();
            let mut actual = tree.query_rect(query);

            expected.sort_by_key(|e| e.id());
            actual.sort_by_key(|e| e.id());
            assert_eq!(expected, actual);
        }
    }

    #[test]
    fn nearest_finds_closest_matching_filter() {
        let (_world, ids) = make_entities(3);
        let mut tree = QuadTree::new(bounds(), 10, 4);
        tree.insert(ids[0].into(), Aabb::from_radius(Point2::new(0.0, 0.0), 0.1));
        tree.insert(ids[1].into(), Aabb::from_radius(Point2::new(10.0, 0.0), 0.1));
        tree.insert(ids[2].into(), Aabb::from_radius(Point2::new(20.0, 0.0), 0.1));

        let nearest = tree.nearest(Point2::new(9.0, 0.0), |_| true);
        assert_eq!(nearest, Some(ids[1].into()));
    }

    #[test]
    fn zero_size_aabb_is_treated_as_a_point() {
        let (_world, ids) = make_entities(1);
        let mut tree = QuadTree::new(bounds(), 10, 4);
        let point = Aabb::from_point(Point2::new(5.0, 5.0));
        tree.insert(ids[0].into(), point);
        let hits = tree.query_rect(Aabb::new(4.0, 4.0, 6.0, 6.0));
        assert_eq!(hits.len(), 1);
    }
}
