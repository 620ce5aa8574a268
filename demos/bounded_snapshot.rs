//! Demo: the snapshotter surviving hostile object graphs.
//!
//! Run with: cargo run --example bounded_snapshot

use appsec_gateway::{Field, FieldError, Introspect, Limits, Shape, Snapshotter};

/// A structure whose only field is itself: an infinite graph.
struct Ouroboros;

impl Introspect for Ouroboros {
    fn shape(&self) -> Shape<'_> {
        Shape::Structure(vec![Field::new("tail", self)])
    }
}

/// A structure with one readable field and one that fails to read.
struct Flaky {
    fine: u32,
}

impl Introspect for Flaky {
    fn shape(&self) -> Shape<'_> {
        Shape::Structure(vec![
            Field::new("fine", &self.fine),
            Field::failed("cursed", FieldError::new("backing store unavailable")),
        ])
    }
}

fn main() {
    let snapshotter = Snapshotter::new();

    // A crafted payload: one huge flat array.
    let huge: Vec<u32> = (0..1_000_000).collect();
    let snapshot = snapshotter.convert(&huge);
    println!(
        "huge array: {} nodes survive out of 1000000 (budget {})",
        snapshot.node_count(),
        snapshotter.limits().max_elements()
    );

    // A cyclic graph terminates at the depth limit.
    let snapshot = snapshotter.convert(&Ouroboros);
    println!("cyclic graph: {} nodes, no hang", snapshot.node_count());

    // A failing field is absorbed, its sibling survives.
    let snapshot = snapshotter.convert(&Flaky { fine: 7 });
    println!("flaky struct: {}", snapshot);

    // Limits are configurable per snapshotter.
    let tight = Snapshotter::with_limits(Limits::new(2, 16));
    let nested = vec![vec![vec![vec![1, 2, 3]]]];
    println!("tight limits: {}", tight.convert(&nested));
}
