use codspeed_criterion_compat::{Criterion, black_box, criterion_group, criterion_main};
use graff::{Environment, Folder, NodePool, Session, Tag, Tree, compile, export, import};
use std::time::Duration;

// ============================================================================
// Parsing Benchmarks
// ============================================================================

fn bench_parse_small(c: &mut Criterion) {
    c.bench_function("parse small expr", |b| {
        b.iter(|| {
            let mut session = Session::default();
            black_box(session.parse_line(black_box("1 + 2 ^ 3 - 4.")))
        })
    });
}

fn bench_parse_large_list(c: &mut Criterion) {
    // A list literal with 1000 elements on one line
    let elements: Vec<String> = (0..1000).map(|i| i.to_string()).collect();
    let line = format!("[{}].", elements.join(", "));

    c.bench_function("parse large list (1000 elements)", |b| {
        b.iter(|| {
            let mut session = Session::default();
            black_box(session.parse_line(&line))
        })
    });
}

fn bench_parse_many_lines(c: &mut Criterion) {
    let lines: Vec<String> = (0..200)
        .map(|i| format!("let f{i} x = x + {i}.. f{i} {i}."))
        .collect();

    c.bench_function("parse 200 lines", |b| {
        b.iter(|| {
            let mut session = Session::default();
            for line in &lines {
                black_box(session.parse_line(line));
            }
        })
    });
}

fn bench_checkpoint(c: &mut Criterion) {
    let mut session = Session::default();
    for i in 0..100 {
        session.parse_line(&format!("let f{i} x = x + {i}.."));
    }

    c.bench_function("checkpoint after 100 lets", |b| {
        b.iter(|| black_box(session.checkpoint()))
    });
}

// ============================================================================
// Folding Benchmarks
// ============================================================================

fn bench_compile_arithmetic(c: &mut Criterion) {
    c.bench_function("compile arithmetic", |b| {
        b.iter(|| black_box(compile(black_box("(1 + 2) ^ 3 / 4 - 5 % 6.")).unwrap()))
    });
}

fn bench_compile_application(c: &mut Criterion) {
    let src = "let add3 a b c = a + b + c.. add3 1 2 3. add3 4 5. <x y: x - y> 10 4.";
    c.bench_function("compile lambda application", |b| {
        b.iter(|| black_box(compile(black_box(src)).unwrap()))
    });
}

fn bench_compile_case(c: &mut Criterion) {
    let src = "case 9 of 1: 10 of 2: 20 of 3: 30 of 9: 90 end. if 1 lt 2 then 'a' else 'b' end.";
    c.bench_function("compile case", |b| {
        b.iter(|| black_box(compile(black_box(src)).unwrap()))
    });
}

fn bench_fold_deep_nesting(c: &mut Criterion) {
    // (ADD (ADD ... (ADD 1 1) ...) 1), 100 levels
    let mut tree = Tree::num(1.0);
    for _ in 0..100 {
        tree = Tree::node(Tag::Add, vec![tree, Tree::num(1.0)]);
    }

    c.bench_function("fold deep nesting (100 levels)", |b| {
        b.iter(|| {
            let mut pool = NodePool::new();
            let mut env = Environment::new();
            let id = pool.intern_tree(&tree);
            black_box(Folder::new(&mut pool, &mut env).fold(id).unwrap())
        })
    });
}

// ============================================================================
// Pool Benchmarks
// ============================================================================

fn bench_intern_repeated(c: &mut Criterion) {
    let tree = Tree::node(
        Tag::List,
        (0..100i64).map(|i| Tree::node(Tag::Add, vec![Tree::num(i), Tree::ident("x")])).collect(),
    );

    c.bench_function("intern repeated tree", |b| {
        let mut pool = NodePool::new();
        b.iter(|| black_box(pool.intern_tree(&tree)))
    });
}

fn bench_export_import(c: &mut Criterion) {
    let elements: Vec<String> = (0..500).map(|i| format!("{{k: {i}, v: 'v{i}'}}")).collect();
    let src = format!("[{}].", elements.join(" "));
    let (session, outcome) = compile(&src).unwrap();

    c.bench_function("export 500 records", |b| {
        b.iter(|| black_box(export(session.pool(), outcome.root, "1")))
    });

    let table = session.export(outcome.root);
    c.bench_function("import 500 records", |b| {
        b.iter(|| black_box(import(&table).unwrap()))
    });
}

criterion_group!(
    parsing_benches,
    bench_parse_small,
    bench_parse_large_list,
    bench_parse_many_lines,
    bench_checkpoint
);

criterion_group! {
    name = folding_benches;
    config = Criterion::default()
        .sample_size(100)
        .measurement_time(Duration::from_secs(10));
    targets =
        bench_compile_arithmetic,
        bench_compile_application,
        bench_compile_case,
        bench_fold_deep_nesting
}

criterion_group!(pool_benches, bench_intern_repeated, bench_export_import);

criterion_main!(parsing_benches, folding_benches, pool_benches);
