//! Pending-move search benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use turnflow::actions::{Action, Choice, Selection};
use turnflow::core::{Argument, Args, ElementRef, Game};
use turnflow::flow::{actions, every_player, sequence, ActionStep};
use turnflow::manager::GameManager;

struct Board {
    free: Vec<u32>,
}

impl Game for Board {
    fn player_count(&self) -> usize {
        4
    }
}

fn board(cells: u32) -> Board {
    Board {
        free: (0..cells).filter(|cell| cell % 3 != 0).collect(),
    }
}

fn free_cells(board: &Board, _: &Args) -> Vec<Argument> {
    board.free.iter().map(|&cell| ElementRef(cell).into()).collect()
}

/// Pick a cell, then a worker that fits it.
fn place() -> Action<Board> {
    Action::new()
        .choose(Selection::board("cell", free_cells))
        .choose(Selection::choices_with("worker", |_: &Board, args: &Args| {
            match args.get("cell").and_then(Argument::as_element) {
                Some(ElementRef(cell)) if cell % 2 == 0 => vec![Choice::from("farmer"), Choice::from("miner")],
                Some(_) => vec![Choice::from("farmer")],
                None => Vec::new(),
            }
        }))
}

/// Pick two cells at once.
fn swap() -> Action<Board> {
    Action::new().choose(Selection::board("cells", free_cells).count(2))
}

fn bench_action_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("action_pending_moves");
    for cells in [12, 48] {
        let game = board(cells);
        let place = place();
        let swap = swap();
        group.bench_function(format!("place_{cells}"), |b| {
            b.iter(|| place.pending_moves(black_box(&game), &Args::new()))
        });
        group.bench_function(format!("swap_{cells}"), |b| {
            b.iter(|| swap.pending_moves(black_box(&game), &Args::new()))
        });
    }
    group.finish();
}

fn bench_manager_pending(c: &mut Criterion) {
    let main = sequence(vec![every_player(vec![actions(
        ActionStep::new().action("place").action("swap"),
    )
    .named("turn")
    .into()])
    .into()]);
    let mut manager = GameManager::builder(main)
        .action("place", |_: &Board, _| place())
        .action("swap", |_: &Board, _| swap())
        .build()
        .expect("flow is valid");
    let mut game = board(48);
    manager.start(&game).expect("fresh manager");
    manager.play(&mut game).expect("flow settles");

    c.bench_function("manager_pending_moves", |b| {
        b.iter(|| {
            for player in manager.awaiting_players(black_box(&game)) {
                black_box(manager.pending_moves(&game, player, None, None));
            }
        })
    });
}

criterion_group!(benches, bench_action_search, bench_manager_pending);
criterion_main!(benches);
